#![allow(deprecated)]

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A project directory the CLI runs in, isolated from the caller's settings
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

    #[allow(dead_code)]
    pub fn write_settings(&self, content: &str) {
        fs::write(self.root.path().join("licdata-iac.yaml"), content).unwrap();
    }

    /// `licdata-iac` running inside the project
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("licdata-iac").unwrap();
        cmd.current_dir(self.root.path())
            .env("XDG_CONFIG_HOME", self.root.path().join("xdg"))
            .env("NO_COLOR", "1")
            .env_remove("LICDATA_IAC_CONFIG")
            .env_remove("LICDATA_STACK")
            .env_remove("LICDATA_PROJECT")
            .env_remove("LICDATA_LOCATION")
            .env_remove("LICDATA_BACKEND")
            .env_remove("RUST_LOG");
        cmd
    }

    #[allow(dead_code)]
    pub fn state_file(&self, project: &str, stack: &str) -> PathBuf {
        self.root
            .path()
            .join(".licdata-iac")
            .join(project)
            .join(format!("{}.json", stack))
    }

    #[allow(dead_code)]
    pub fn lock_file(&self, project: &str, stack: &str) -> PathBuf {
        self.root
            .path()
            .join(".licdata-iac")
            .join(project)
            .join(format!("{}.lock", stack))
    }

    /// Number of resources recorded for a stack by the local backend
    #[allow(dead_code)]
    pub fn resource_count(&self, project: &str, stack: &str) -> usize {
        let content = fs::read_to_string(self.state_file(project, stack)).unwrap();
        let state: serde_json::Value = serde_json::from_str(&content).unwrap();
        state["resources"].as_object().map_or(0, |r| r.len())
    }
}

/// Parses the JSON lines a command printed on stdout
#[allow(dead_code)]
pub fn events(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[allow(dead_code)]
pub fn event_types(stdout: &[u8]) -> Vec<String> {
    events(stdout)
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect()
}
