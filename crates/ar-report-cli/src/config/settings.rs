use ar_report_core::Timeouts;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Optional TOML settings. Everything here has a working default.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl Settings {
    /// Loads `path`, or the default location when `path` is `None`. Read and
    /// parse problems are reported and fall back to defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let explicit = path.is_some();
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        if !path.exists() {
            if explicit {
                eprintln!("Warning: Config file {} not found", path.display());
            }
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(settings) => settings,
                Err(err) => {
                    eprintln!("Warning: Failed to parse config: {err}");
                    Self::default()
                }
            },
            Err(err) => {
                eprintln!("Warning: Failed to read config: {err}");
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ar-report")
            .join("config.toml")
    }
}
