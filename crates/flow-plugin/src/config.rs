//! Runtime configuration loaded from YAML.

use std::path::{Path, PathBuf};

use flow_plugin_rpc::DEFAULT_MAX_FRAME_BYTES;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{Error, Result};

/// Default tracing filter when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "flow_plugin=info,flow_plugin_rpc=warn";

/// Name of the configuration file looked up in the plugin directory.
pub const CONFIG_FILE_NAME: &str = "flow-plugin.yaml";

/// Settings for the plugin process itself, as opposed to the user settings
/// the host sends with each query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct RuntimeConfig {
    /// Tracing filter directive.
    pub log_filter: String,

    /// Append logs to this file instead of standard error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Largest accepted frame body, in bytes.
    pub max_frame_bytes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_file: None,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Config`]
    /// if it is not valid YAML for this type.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        serde_yaml::from_str(&content).map_err(|e| Error::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Load configuration from `path`, or defaults if the file does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be checked, read or
    /// parsed.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        match fs::try_exists(path).await {
            Ok(true) => Self::load(path).await,
            Ok(false) => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if serialization fails and [`Error::Io`] if
    /// the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(|e| Error::Config {
            path: path.display().to_string(),
            reason: format!("YAML error: {e}"),
        })?;
        fs::write(path, content).await?;
        Ok(())
    }
}
