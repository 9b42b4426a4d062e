pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{Backend, PulumiSettings, Settings};

use std::path::PathBuf;

/// Environment variable pointing straight at a settings file
pub const CONFIG_ENV: &str = "LICDATA_IAC_CONFIG";

const APP_DIR: &str = "licdata-iac";
const CANDIDATES: [&str; 4] = [
    "licdata-iac.local.yaml",
    ".licdata-iac.local.yaml",
    "licdata-iac.yaml",
    ".licdata-iac.yaml",
];

/// `~/.config/licdata-iac` (platform equivalent elsewhere)
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join(APP_DIR))
}

/// Finds the settings file
///
/// Search order:
/// 1. `LICDATA_IAC_CONFIG`
/// 2. current directory: licdata-iac.local.yaml, .licdata-iac.local.yaml, licdata-iac.yaml, .licdata-iac.yaml
/// 3. `./.licdata-iac/`, same order
/// 4. `~/.config/licdata-iac/licdata-iac.yaml`
///
/// `None` means no file exists and the defaults apply.
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let project_dir = current_dir.join(licdata_iac_core::state::STATE_DIR);
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(Some(path));
            }
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("licdata-iac.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    /// Runs `f` inside `dir` with no settings path in the environment
    fn in_dir<T>(dir: &std::path::Path, f: impl FnOnce() -> T) -> T {
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        let result = temp_env::with_var_unset(CONFIG_ENV, f);
        std::env::set_current_dir(original_dir).unwrap();
        result
    }

    #[test]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with("licdata-iac"));
    }

    #[test]
    #[serial]
    fn test_find_config_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("licdata-iac.yaml"), "backend: local\n").unwrap();

        let found = in_dir(temp_dir.path(), find_config_file).unwrap().unwrap();
        assert!(found.ends_with("licdata-iac.yaml"));
    }

    #[test]
    #[serial]
    fn test_local_file_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("licdata-iac.yaml"), "backend: pulumi\n").unwrap();
        fs::write(temp_dir.path().join(".licdata-iac.local.yaml"), "backend: local\n").unwrap();

        let found = in_dir(temp_dir.path(), find_config_file).unwrap().unwrap();
        assert!(found.ends_with(".licdata-iac.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_dir = temp_dir.path().join(".licdata-iac");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("licdata-iac.yaml"), "backend: local\n").unwrap();

        let found = in_dir(temp_dir.path(), find_config_file).unwrap().unwrap();
        assert!(found.ends_with(".licdata-iac/licdata-iac.yaml"));
    }

    #[test]
    #[serial]
    fn test_env_var_has_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "backend: pulumi\n").unwrap();
        fs::write(temp_dir.path().join("licdata-iac.yaml"), "backend: local\n").unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp_dir.path()).unwrap();
        let found = temp_env::with_var(CONFIG_ENV, Some(&config_path), find_config_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert_eq!(found.unwrap(), Some(config_path));
    }

    #[test]
    #[serial]
    fn test_discover_falls_back_to_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();

        let settings = in_dir(temp_dir.path(), Settings::discover).unwrap();
        if settings.source.is_none() {
            assert_eq!(settings, Settings::default());
        }
    }
}
