//! Integration tests for gococo

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn gococo() -> Command {
        cargo_bin_cmd!("gococo")
    }

    /// gococo isolated from the user's config and environment
    fn gococo_in(dir: &Path) -> Command {
        let mut cmd = gococo();
        cmd.current_dir(dir)
            .env("GOCOCO_CONFIG", dir.join("no-config.toml"))
            .env_remove("GOCOCO_CACHE_DIR")
            .env_remove("GOCOCO_DEBUG")
            .env("CI", "true");
        cmd
    }

    #[test]
    fn help_displays() {
        gococo()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Go coverage instrumentation"));
    }

    #[test]
    fn version_displays() {
        gococo()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("gococo"));
    }

    #[test]
    fn build_help() {
        gococo()
            .args(["build", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("go build"));
    }

    #[test]
    fn unknown_go_flag_is_rejected() {
        let temp = TempDir::new().unwrap();
        gococo_in(temp.path())
            .args(["build", "-frobnicate", "./..."])
            .assert()
            .failure()
            .stderr(predicate::str::contains("flag provided but not defined: -frobnicate"));
    }

    #[test]
    fn build_outside_module_fails() {
        let temp = TempDir::new().unwrap();
        // Fails as "not a module project" with go installed, or on the
        // missing go binary otherwise
        gococo_in(temp.path())
            .env("GOWORK", "off")
            .env("GO111MODULE", "on")
            .arg("build")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn clean_removes_cache() {
        let temp = TempDir::new().unwrap();
        let mirror = temp.path().join(".gococo/project");
        fs::create_dir_all(&mirror).unwrap();
        fs::write(mirror.join("main.go"), "package main\n").unwrap();

        gococo_in(temp.path())
            .args(["clean", "--project"])
            .arg(temp.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed shadow cache"));

        assert!(!temp.path().join(".gococo").exists());
    }

    #[test]
    fn clean_without_cache() {
        let temp = TempDir::new().unwrap();
        gococo_in(temp.path())
            .args(["clean", "--project", "."])
            .assert()
            .success()
            .stdout(predicate::str::contains("No shadow cache"));
    }

    #[test]
    fn clean_honors_cache_dir_env() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".cov/project")).unwrap();
        fs::create_dir_all(temp.path().join(".gococo/project")).unwrap();

        gococo_in(temp.path())
            .env("GOCOCO_CACHE_DIR", ".cov")
            .args(["clean", "--project", "."])
            .assert()
            .success();

        assert!(!temp.path().join(".cov").exists());
        assert!(temp.path().join(".gococo").exists());
    }

    #[test]
    fn clean_waits_for_compile_lock() {
        use fs2::FileExt;

        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".gococo/project")).unwrap();
        let config = temp.path().join("config.toml");
        fs::write(&config, "[lock]\ntimeout_secs = 0\npoll_interval_ms = 10\n").unwrap();

        let held = fs::File::create(temp.path().join(".gococo.lock")).unwrap();
        held.lock_exclusive().unwrap();

        gococo_in(temp.path())
            .env("GOCOCO_CONFIG", &config)
            .args(["clean", "--project", "."])
            .assert()
            .failure()
            .stderr(predicate::str::contains("waiting for the compile lock"));
        assert!(temp.path().join(".gococo/project").exists());

        FileExt::unlock(&held).unwrap();
        gococo_in(temp.path())
            .env("GOCOCO_CONFIG", &config)
            .args(["clean", "--project", "."])
            .assert()
            .success();
        assert!(!temp.path().join(".gococo").exists());
    }

    #[test]
    fn cache_dir_outside_project_is_rejected() {
        let temp = TempDir::new().unwrap();
        gococo_in(temp.path())
            .env("GOCOCO_CACHE_DIR", "../elsewhere")
            .args(["clean", "--project", "."])
            .assert()
            .failure()
            .stderr(predicate::str::contains("single directory name"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        fs::write(&config, "[lock]\ntimeout_secs = \"soon\"\n").unwrap();

        gococo_in(temp.path())
            .env("GOCOCO_CONFIG", &config)
            .args(["clean", "--project", "."])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn invalid_cover_mode_is_reported() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        fs::write(&config, "[toolchain]\ncover_mode = \"often\"\n").unwrap();

        gococo_in(temp.path())
            .env("GOCOCO_CONFIG", &config)
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("unknown cover mode"));
    }
}
