//! Integration tests for shellcache

mod lifecycle;

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn shellcache() -> Command {
        cargo_bin_cmd!("shellcache")
    }

    /// Config file with stores and manifest inside `dir`
    fn write_config(dir: &Path) -> PathBuf {
        write_config_for(dir, "http://127.0.0.1:9", "")
    }

    fn write_config_for(dir: &Path, origin: &str, extra: &str) -> PathBuf {
        let config_path = dir.join("config.toml");
        let stores = dir.join("stores");
        fs::write(
            &config_path,
            format!(
                "[cache]\ndir = {:?}\n\n[app]\norigin = {:?}\nmanifest = \"resources.json\"\ncore = [\"index.html\"]\n{}",
                stores.display().to_string(),
                origin,
                extra
            ),
        )
        .unwrap();
        fs::write(
            dir.join("resources.json"),
            r#"{"/": "h0", "index.html": "h0", "main.dart.js": "h1"}"#,
        )
        .unwrap();
        config_path
    }

    #[test]
    fn help_displays() {
        shellcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Offline asset cache"));
    }

    #[test]
    fn version_displays() {
        shellcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("shellcache"));
    }

    #[test]
    fn config_path_uses_flag() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[app]"))
            .stdout(predicate::str::contains("flutter-app-cache"));
    }

    #[test]
    fn config_init_then_set() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("nested").join("config.toml");

        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["config", "init"])
            .assert()
            .success();
        assert!(config.exists());

        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["config", "set", "network.root_timeout_secs", "3"])
            .assert()
            .success();
        assert!(fs::read_to_string(&config)
            .unwrap()
            .contains("root_timeout_secs = 3"));

        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn manifest_build_hashes_directory() {
        let dir = TempDir::new().unwrap();
        let web = dir.path().join("web");
        fs::create_dir_all(web.join("assets")).unwrap();
        fs::write(web.join("index.html"), "<html></html>").unwrap();
        fs::write(web.join("assets").join("FontManifest.json"), "[]").unwrap();
        let out = dir.path().join("resources.json");

        shellcache()
            .args(["manifest", "build"])
            .arg(&web)
            .arg("--out")
            .arg(&out)
            .assert()
            .success();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["/"], json["index.html"]);
        assert!(json.get("assets/FontManifest.json").is_some());
    }

    #[test]
    fn manifest_build_rejects_missing_dir() {
        shellcache()
            .args(["manifest", "build", "/nonexistent/build/web"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not a directory"));
    }

    #[test]
    fn status_before_sync() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"stored_manifest\": \"absent\""))
            .stdout(predicate::str::contains("main.dart.js"));
    }

    #[test]
    fn sync_against_unreachable_origin_fails() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        shellcache()
            .arg("--config")
            .arg(&config)
            .arg("sync")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn reset_with_yes() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["reset", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Deleted 0 store(s)"));
    }

    #[test]
    fn missing_manifest_has_error() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());
        fs::remove_file(dir.path().join("resources.json")).unwrap();

        shellcache()
            .arg("--config")
            .arg(&config)
            .arg("status")
            .assert()
            .failure()
            .stderr(predicate::str::contains("resources.json"));
    }

    #[test]
    fn explicit_missing_config_is_error() {
        let dir = TempDir::new().unwrap();

        shellcache()
            .arg("--config")
            .arg(dir.path().join("absent.toml"))
            .arg("status")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"))
            .stderr(predicate::str::contains("config init"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn skip_waiting_activates_a_waiting_generation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let config = write_config_for(
            dir.path(),
            &server.uri(),
            "\n[lifecycle]\nskip_waiting_on_install = false\n",
        );

        shellcache()
            .arg("--config")
            .arg(&config)
            .arg("sync")
            .assert()
            .success()
            .stdout(predicate::str::contains("Left waiting"));

        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["sync", "--skip-waiting"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Activated fresh cache with 1 resources"));

        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"stored_manifest\": \"current\""));
    }
}
