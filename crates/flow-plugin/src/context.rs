//! Per-session plugin state shared with every handler.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{HostActions, HostApi};
use crate::error::Result;
use crate::session::HostClient;

/// Plugin description sent by the host in `initialize`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginMetadata {
    /// Unique plugin id.
    #[serde(alias = "ID")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Author.
    pub author: String,
    /// Version string.
    pub version: String,
    /// Plugin language as the host knows it.
    pub language: String,
    /// Description.
    pub description: String,
    /// Website.
    pub website: String,
    /// Whether the user disabled the plugin.
    pub disabled: bool,
    /// Path of the plugin executable.
    pub execute_file_path: String,
    /// File name of the plugin executable.
    pub execute_file_name: String,
    /// Plugin install directory.
    pub plugin_directory: PathBuf,
    /// Primary action keyword.
    pub action_keyword: String,
    /// Every action keyword.
    pub action_keywords: Vec<String>,
    /// Plugin icon; the default for results without one.
    pub ico_path: String,
}

struct ContextInner {
    metadata: PluginMetadata,
    settings: RwLock<Value>,
    api: HostApi,
    actions: HostActions,
}

/// What a handler can see of its plugin: metadata, settings and the host.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct PluginContext {
    inner: Arc<ContextInner>,
}

impl PluginContext {
    /// Creates the context for `metadata`, calling the host through `client`.
    #[must_use]
    pub fn new(metadata: PluginMetadata, client: HostClient) -> Self {
        let api = HostApi::new(client, metadata.id.clone(), metadata.ico_path.clone());
        let actions = HostActions::new(metadata.id.clone(), metadata.ico_path.clone());
        Self {
            inner: Arc::new(ContextInner {
                metadata,
                settings: RwLock::new(Value::Null),
                api,
                actions,
            }),
        }
    }

    /// The plugin metadata.
    #[must_use]
    pub fn metadata(&self) -> &PluginMetadata {
        &self.inner.metadata
    }

    /// Icon path used for results that set none.
    #[must_use]
    pub fn default_icon(&self) -> &str {
        &self.inner.metadata.ico_path
    }

    /// The settings sent with the latest query; `Null` before the first one.
    ///
    /// # Panics
    ///
    /// Panics if the settings lock is poisoned.
    #[must_use]
    pub fn settings(&self) -> Value {
        self.inner
            .settings
            .read()
            .expect("settings lock should not be poisoned")
            .clone()
    }

    /// The latest settings parsed as `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings do not deserialize into `T`.
    pub fn settings_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.settings())?)
    }

    pub(crate) fn update_settings(&self, settings: Value) {
        *self
            .inner
            .settings
            .write()
            .expect("settings lock should not be poisoned") = settings;
    }

    /// Calls into the host.
    #[must_use]
    pub fn api(&self) -> &HostApi {
        &self.inner.api
    }

    /// Builds host action references.
    #[must_use]
    pub fn actions(&self) -> &HostActions {
        &self.inner.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use serde_json::json;

    #[test]
    fn metadata_deserializes_from_host_payload() {
        let metadata: PluginMetadata = serde_json::from_value(json!({
            "id": "abc",
            "name": "Demo",
            "executeFilePath": "C:/plugins/demo/demo.exe",
            "actionKeywords": ["fp", "demo"],
            "icoPath": "C:/plugins/demo/icon.png",
            "somethingNew": 1
        }))
        .unwrap();

        assert_eq!(metadata.id, "abc");
        assert_eq!(metadata.action_keywords, vec!["fp", "demo"]);
        assert_eq!(metadata.ico_path, "C:/plugins/demo/icon.png");
        assert!(!metadata.disabled);
    }

    #[test]
    fn settings_update_and_parse() {
        #[derive(Deserialize)]
        struct Settings {
            greeting: String,
        }

        let context = PluginContext::new(PluginMetadata::default(), Session::new().client());
        assert_eq!(context.settings(), Value::Null);

        context.update_settings(json!({"greeting": "Hey"}));
        let parsed: Settings = context.settings_as().unwrap();
        assert_eq!(parsed.greeting, "Hey");
    }
}
