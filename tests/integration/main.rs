//! Integration tests for apt-fetch

mod cli_tests {
    use apt_fetch::history::LogStore;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use chrono::Local;
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Isolated filesystem layout for one invocation
    struct Sandbox {
        dir: TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("config.toml"), "").unwrap();
            std::fs::create_dir(dir.path().join("archives")).unwrap();
            std::fs::create_dir(dir.path().join("log")).unwrap();
            std::fs::create_dir(dir.path().join("bin")).unwrap();
            Self { dir }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn lock_file(&self) -> PathBuf {
            self.path("apt-fetch.lock")
        }

        fn today_log(&self) -> PathBuf {
            self.path("log")
                .join(LogStore::slot_file_name(Local::now().date_naive()))
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("apt-fetch");
            for var in [
                "APT_FETCH_CACHE_DIR",
                "APT_FETCH_LOCK_FILE",
                "APT_FETCH_LOG_DIR",
                "APT_FETCH_RATE_LIMIT",
                "APT_FETCH_STALE_AFTER",
            ] {
                cmd.env_remove(var);
            }
            cmd.env("APT_FETCH_CONFIG", self.path("config.toml"))
                // No package tools reachable: every tool step fails to spawn
                .env("PATH", self.path("bin"))
                .arg("--cache-dir")
                .arg(self.path("archives"))
                .arg("--lock-file")
                .arg(self.lock_file())
                .arg("--log-dir")
                .arg(self.path("log"));
            cmd
        }
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    fn json_stdout(cmd: &mut Command) -> serde_json::Value {
        let output = cmd.assert().success().get_output().stdout.clone();
        serde_json::from_slice(&output).unwrap()
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("apt-fetch")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--status"))
            .stdout(predicate::str::contains("--prune"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("apt-fetch")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("apt-fetch"));
    }

    #[test]
    fn json_status_on_fresh_system() {
        let sandbox = Sandbox::new();
        let status = json_stdout(sandbox.cmd().arg("-j"));

        assert_eq!(status["runs_today"], 0);
        assert_eq!(status["runs_complete_today"], 0);
        assert_eq!(status["fetch_errors"], 0);
        assert_eq!(status["archived_count"], 0);
        assert_eq!(status["installed_count"], 0);
        assert!(status["last_run"].is_null());
        assert_eq!(status["logfile_exists"], false);
        assert_eq!(status["fetch_in_progress"], false);
        assert_eq!(status["num_archived"], 0);
        assert_eq!(status["runs_complete"], 0);
    }

    #[test]
    fn json_status_counts_todays_runs() {
        let sandbox = Sandbox::new();
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        std::fs::write(
            sandbox.today_log(),
            format!(
                "[{stamp}] Checking latest apt..\n\
                 Err:1 http://deb.debian.org/debian bookworm InRelease\n\
                 [{stamp}] Failed: apt-get update exited with status 100\n\
                 [{stamp}] apt-fetch complete.\n"
            ),
        )
        .unwrap();

        let status = json_stdout(sandbox.cmd().arg("-j"));

        assert_eq!(status["runs_today"], 1);
        assert_eq!(status["runs_complete_today"], 1);
        assert_eq!(status["runs_complete"], 1);
        assert_eq!(status["fetch_errors"], 1);
        assert_eq!(status["last_run"], stamp.as_str());
        assert_eq!(status["logfile_exists"], true);
    }

    #[test]
    fn human_status_displays() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .arg("-s")
            .assert()
            .success()
            .stdout(predicate::str::contains("Runs today"))
            .stdout(predicate::str::contains("Archived packages"));
    }

    #[test]
    fn prune_on_empty_cache() {
        let sandbox = Sandbox::new();
        let report = json_stdout(sandbox.cmd().args(["-p", "-j"]));

        assert_eq!(report["cleaned"], 0);
        assert_eq!(report["errors"], 0);
        assert_eq!(report["entries"], serde_json::json!([]));
    }

    #[test]
    fn fetch_refuses_when_another_instance_runs() {
        let sandbox = Sandbox::new();
        // The test process itself is alive and the lock is brand new
        let holder = std::process::id().to_string();
        std::fs::write(sandbox.lock_file(), &holder).unwrap();

        sandbox
            .cmd()
            .assert()
            .failure()
            .stderr(predicate::str::contains("already running"));

        assert_eq!(read(&sandbox.lock_file()), holder);
        assert!(read(&sandbox.today_log()).contains("already running"));
    }

    #[test]
    fn fetch_without_apt_logs_failure_and_completes() {
        let sandbox = Sandbox::new();

        sandbox.cmd().assert().success();

        let log = read(&sandbox.today_log());
        assert!(log.contains("Checking latest apt.."));
        assert!(log.contains("Failed: Command failed: apt-get update"));
        assert!(log.contains("apt-fetch complete."));
        assert!(!sandbox.lock_file().exists());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let sandbox = Sandbox::new();
        std::fs::write(sandbox.path("config.toml"), "[fetch]\nrate_limit = \"fast\"\n").unwrap();

        sandbox
            .cmd()
            .arg("-s")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }
}
