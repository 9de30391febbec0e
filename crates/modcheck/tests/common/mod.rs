use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Working directory with its own HOME so no user config leaks in
pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn write_config(&self, content: &str) -> PathBuf {
        let path = self.root.path().join("modcheck.yaml");
        fs::write(&path, content).unwrap();
        path
    }

    /// `modcheck` running inside the project
    #[allow(deprecated)]
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("modcheck").unwrap();
        cmd.current_dir(self.root.path())
            .env("HOME", self.root.path())
            .env("XDG_CONFIG_HOME", self.root.path().join(".config"))
            .env("NO_COLOR", "1")
            .env_remove("MODCHECK_CONFIG_PATH")
            .env_remove("MODCHECK_REGION")
            .env_remove("MODCHECK_MODULE_DIR")
            .env_remove("MODCHECK_AWS_PROFILE")
            .env_remove("RUST_LOG");
        cmd
    }
}

/// Shell script standing in for terraform; logs each subcommand to
/// `calls.log` next to itself
#[cfg(unix)]
#[allow(dead_code)]
pub fn write_fake_terraform(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let log = dir.join("calls.log");
    let script = format!(
        r#"#!/bin/sh
echo "$1" >> "{log}"
case "$1" in
  output)
    echo '{{"repository_url":{{"sensitive":false,"type":"string","value":"123456789012.dkr.ecr.us-west-1.amazonaws.com/cs-pmod-fixed1-testing"}}}}'
    ;;
esac
"#,
        log = log.display()
    );
    let binary = dir.join("terraform");
    fs::write(&binary, script).unwrap();
    fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();
    binary
}
