use crate::error::{ConfigError, Result};
use licdata_iac_core::ImageSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which StackRunner provisions the stacks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// State file only, nothing is provisioned
    #[default]
    Local,
    /// pulumi CLI with a generated YAML program
    Pulumi,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Local => write!(f, "local"),
            Backend::Pulumi => write!(f, "pulumi"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            "pulumi" => Ok(Backend::Pulumi),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulumiSettings {
    /// Executable name or path
    pub binary: String,

    /// Root of the generated per-stack projects
    pub work_dir: Option<PathBuf>,

    /// `PULUMI_BACKEND_URL` for state storage; pulumi's login is used when unset
    pub backend_url: Option<String>,
}

impl Default for PulumiSettings {
    fn default() -> Self {
        Self {
            binary: "pulumi".to_string(),
            work_dir: None,
            backend_url: None,
        }
    }
}

/// Contents of `licdata-iac.yaml`
///
/// ```yaml
/// backend: pulumi
/// state_dir: /var/lib/licdata-iac
/// pulumi:
///   binary: /usr/local/bin/pulumi
///   backend_url: azblob://licdata-state
/// image:
///   name: licdata
///   version: latest
///   metadata:
///     variant: azure
///     python_version: "3.11"
///     azure_base_image_version: "4"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: Backend,

    /// Project root holding `.licdata-iac/` state; current directory when unset
    pub state_dir: Option<PathBuf>,

    pub pulumi: PulumiSettings,

    /// Image requested once infrastructure is up
    pub image: ImageSettings,

    /// File these settings were read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Settings {
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut settings = Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::Yaml(source) => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        settings.source = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Loads the first settings file found, or the defaults when there is none
    pub fn discover() -> Result<Self> {
        match crate::find_config_file()? {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Project root for the local state backend
    pub fn state_root(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Root of the generated pulumi projects
    pub fn pulumi_work_dir(&self) -> PathBuf {
        self.pulumi.work_dir.clone().unwrap_or_else(|| {
            self.state_root()
                .join(licdata_iac_core::state::STATE_DIR)
                .join("pulumi")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_yaml("").unwrap();

        assert_eq!(settings.backend, Backend::Local);
        assert_eq!(settings.pulumi.binary, "pulumi");
        assert_eq!(settings.image, ImageSettings::default());
        assert_eq!(settings.state_root(), PathBuf::from("."));
        assert_eq!(
            settings.pulumi_work_dir(),
            PathBuf::from("./.licdata-iac/pulumi")
        );
    }

    #[test]
    fn test_partial_settings_keep_defaults() {
        let settings = Settings::from_yaml(
            r#"
backend: pulumi
state_dir: /srv/licdata
image:
  version: "1.2.3"
"#,
        )
        .unwrap();

        assert_eq!(settings.backend, Backend::Pulumi);
        assert_eq!(settings.image.name, "licdata");
        assert_eq!(settings.image.version, "1.2.3");
        assert_eq!(
            settings.image.metadata.get("variant").map(String::as_str),
            Some("azure")
        );
        assert_eq!(
            settings.pulumi_work_dir(),
            PathBuf::from("/srv/licdata/.licdata-iac/pulumi")
        );
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("Pulumi".parse::<Backend>().unwrap(), Backend::Pulumi);
        assert_eq!("local".parse::<Backend>().unwrap(), Backend::Local);
        assert!(matches!(
            "terraform".parse::<Backend>(),
            Err(ConfigError::UnknownBackend(_))
        ));
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("licdata-iac.yaml");
        std::fs::write(&path, "backend: terraform\n").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("licdata-iac.yaml"));
    }

    #[test]
    fn test_load_records_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("licdata-iac.yaml");
        std::fs::write(&path, "backend: pulumi\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.source.as_deref(), Some(path.as_path()));
    }
}
