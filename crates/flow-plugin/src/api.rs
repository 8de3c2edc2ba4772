//! The host's API: direct calls and deferred action references.
//!
//! [`HostApi`] calls a host method now and returns its reply.
//! [`HostActions`] builds an [`ActionRef`] that makes the host call the same
//! method later, when the user activates a result.

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::Result;
use crate::results::{ActionRef, Output, normalize};
use crate::session::HostClient;

/// Host method names.
pub mod methods {
    /// Replace the query box text.
    pub const CHANGE_QUERY: &str = "ChangeQuery";
    /// Restart the launcher.
    pub const RESTART_APP: &str = "RestartApp";
    /// Run a shell command.
    pub const SHELL_RUN: &str = "ShellRun";
    /// Copy text or a file to the clipboard.
    pub const COPY_TO_CLIPBOARD: &str = "CopyToClipboard";
    /// Save the launcher settings.
    pub const SAVE_APP_SETTINGS: &str = "SaveAppAllSettings";
    /// Save every plugin's settings.
    pub const SAVE_PLUGIN_SETTINGS: &str = "SavePluginSettings";
    /// Reload plugin data.
    pub const RELOAD_ALL_PLUGIN_DATA: &str = "ReloadAllPluginData";
    /// Check for a launcher update.
    pub const CHECK_FOR_NEW_UPDATE: &str = "CheckForNewUpdate";
    /// Show an error notification.
    pub const SHOW_MSG_ERROR: &str = "ShowMsgError";
    /// Show the launcher window.
    pub const SHOW_MAIN_WINDOW: &str = "ShowMainWindow";
    /// Hide the launcher window.
    pub const HIDE_MAIN_WINDOW: &str = "HideMainWindow";
    /// Ask whether the launcher window is visible.
    pub const IS_MAIN_WINDOW_VISIBLE: &str = "IsMainWindowVisible";
    /// Show a notification.
    pub const SHOW_MSG: &str = "ShowMsg";
    /// Open the settings dialog.
    pub const OPEN_SETTING_DIALOG: &str = "OpenSettingDialog";
    /// Look up a translated string.
    pub const GET_TRANSLATION: &str = "GetTranslation";
    /// List installed plugins.
    pub const GET_ALL_PLUGINS: &str = "GetAllPlugins";
    /// Fuzzy-match a needle against a haystack.
    pub const FUZZY_SEARCH: &str = "FuzzySearch";
    /// Fetch a URL as text.
    pub const HTTP_GET_STRING: &str = "HttpGetStringAsync";
    /// Download a URL to a file.
    pub const HTTP_DOWNLOAD: &str = "HttpDownloadAsync";
    /// Add an action keyword.
    pub const ADD_ACTION_KEYWORD: &str = "AddActionKeyword";
    /// Remove an action keyword.
    pub const REMOVE_ACTION_KEYWORD: &str = "RemoveActionKeyword";
    /// Ask whether an action keyword is taken.
    pub const ACTION_KEYWORD_ASSIGNED: &str = "ActionKeywordAssigned";
    /// Write to the host log at debug level.
    pub const LOG_DEBUG: &str = "LogDebug";
    /// Write to the host log at info level.
    pub const LOG_INFO: &str = "LogInfo";
    /// Write to the host log at warn level.
    pub const LOG_WARN: &str = "LogWarn";
    /// Open a directory in the file manager.
    pub const OPEN_DIRECTORY: &str = "OpenDirectory";
    /// Open a URL in the browser.
    pub const OPEN_URL: &str = "OpenUrl";
    /// Open an application URI.
    pub const OPEN_APP_URI: &str = "OpenAppUri";
    /// Toggle game mode.
    pub const TOGGLE_GAME_MODE: &str = "ToggleGameMode";
    /// Set game mode.
    pub const SET_GAME_MODE: &str = "SetGameMode";
    /// Ask whether game mode is on.
    pub const IS_GAME_MODE_ON: &str = "IsGameModeOn";
    /// Re-run the current query.
    pub const RE_QUERY: &str = "ReQuery";
    /// Push results for a query.
    pub const UPDATE_RESULTS: &str = "UpdateResults";
}

use methods::*;

/// Shell used by [`HostApi::shell_run`] when none is given.
pub const DEFAULT_SHELL: &str = "cmd.exe";

/// Calls into the host on behalf of one plugin.
#[derive(Clone)]
pub struct HostApi {
    client: HostClient,
    plugin_id: String,
    icon_path: String,
}

impl HostApi {
    /// Creates an API handle for the plugin `plugin_id`, whose results default
    /// to `icon_path`.
    #[must_use]
    pub fn new(client: HostClient, plugin_id: impl Into<String>, icon_path: impl Into<String>) -> Self {
        Self {
            client,
            plugin_id: plugin_id.into(),
            icon_path: icon_path.into(),
        }
    }

    /// The underlying client, for methods not wrapped here.
    #[must_use]
    pub fn client(&self) -> &HostClient {
        &self.client
    }

    async fn run(&self, method: &str, params: Value) -> Result<()> {
        self.client.send_request(method, params).await.map(drop)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let value = self.client.send_request(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Replaces the query text, optionally re-running it.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn change_query(&self, query: &str, requery: bool) -> Result<()> {
        self.run(CHANGE_QUERY, json!([query, requery])).await
    }

    /// Restarts the launcher.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn restart_app(&self) -> Result<()> {
        self.run(RESTART_APP, json!([])).await
    }

    /// Runs `command` in `shell`, or [`DEFAULT_SHELL`].
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn shell_run(&self, command: &str, shell: Option<&str>) -> Result<()> {
        self.run(SHELL_RUN, json!([command, shell.unwrap_or(DEFAULT_SHELL)]))
            .await
    }

    /// Copies `text` (or the file it names) to the clipboard.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn copy_to_clipboard(&self, text: &str, copy_file: bool, notify: bool) -> Result<()> {
        self.run(COPY_TO_CLIPBOARD, json!([text, copy_file, notify]))
            .await
    }

    /// Saves the launcher settings.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn save_app_settings(&self) -> Result<()> {
        self.run(SAVE_APP_SETTINGS, json!([])).await
    }

    /// Saves every plugin's settings.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn save_plugin_settings(&self) -> Result<()> {
        self.run(SAVE_PLUGIN_SETTINGS, json!([])).await
    }

    /// Reloads all plugin data.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn reload_all_plugin_data(&self) -> Result<()> {
        self.run(RELOAD_ALL_PLUGIN_DATA, json!([])).await
    }

    /// Asks the launcher to check for updates.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn check_for_updates(&self) -> Result<()> {
        self.run(CHECK_FOR_NEW_UPDATE, json!([])).await
    }

    /// Shows an error notification.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn show_error_message(&self, title: &str, subtitle: &str) -> Result<()> {
        self.run(SHOW_MSG_ERROR, json!([title, subtitle])).await
    }

    /// Shows the launcher window.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn show_main_window(&self) -> Result<()> {
        self.run(SHOW_MAIN_WINDOW, json!([])).await
    }

    /// Hides the launcher window.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn hide_main_window(&self) -> Result<()> {
        self.run(HIDE_MAIN_WINDOW, json!([])).await
    }

    /// Returns whether the launcher window is visible.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error, the reply is not a boolean, or
    /// the session is closed.
    pub async fn is_main_window_visible(&self) -> Result<bool> {
        self.call(IS_MAIN_WINDOW_VISIBLE, json!([])).await
    }

    /// Shows a notification. An empty `icon_path` uses the plugin icon.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn show_message(&self, title: &str, subtitle: &str, icon_path: &str) -> Result<()> {
        let icon = if icon_path.is_empty() {
            self.icon_path.as_str()
        } else {
            icon_path
        };
        self.run(SHOW_MSG, json!([title, subtitle, icon, true])).await
    }

    /// Opens the settings dialog.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn open_settings(&self) -> Result<()> {
        self.run(OPEN_SETTING_DIALOG, json!([])).await
    }

    /// Looks up the translation of `key`.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn get_translation(&self, key: &str) -> Result<String> {
        self.call(GET_TRANSLATION, json!([key])).await
    }

    /// Lists installed plugins as the host describes them.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn get_all_plugins(&self) -> Result<Vec<Value>> {
        self.call(GET_ALL_PLUGINS, json!([])).await
    }

    /// Runs the host's fuzzy matcher, returning its raw match data.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn fuzzy_search(&self, needle: &str, haystack: &str) -> Result<Value> {
        self.call(FUZZY_SEARCH, json!([needle, haystack])).await
    }

    /// Fetches `url` through the host and returns the body.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn http_get_string(&self, url: &str) -> Result<String> {
        self.call(HTTP_GET_STRING, json!([url])).await
    }

    /// Fetches `url` through the host and parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Fails if the fetch fails or the body does not parse as `T`.
    pub async fn http_get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.http_get_string(url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Downloads `url` to `file_path`.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn http_download(&self, url: &str, file_path: &str) -> Result<()> {
        self.run(HTTP_DOWNLOAD, json!([url, file_path])).await
    }

    /// Adds an action keyword to this plugin.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn add_action_keyword(&self, keyword: &str) -> Result<()> {
        self.run(ADD_ACTION_KEYWORD, json!([self.plugin_id, keyword]))
            .await
    }

    /// Removes an action keyword from this plugin.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn remove_action_keyword(&self, keyword: &str) -> Result<()> {
        self.run(REMOVE_ACTION_KEYWORD, json!([self.plugin_id, keyword]))
            .await
    }

    /// Returns whether any plugin already uses `keyword`.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn is_action_keyword_assigned(&self, keyword: &str) -> Result<bool> {
        self.call(ACTION_KEYWORD_ASSIGNED, json!([keyword])).await
    }

    /// Writes to the host log at debug level.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn log_debug(&self, class_name: &str, message: &str, method_name: &str) -> Result<()> {
        self.run(LOG_DEBUG, json!([class_name, message, method_name]))
            .await
    }

    /// Writes to the host log at info level.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn log_info(&self, class_name: &str, message: &str, method_name: &str) -> Result<()> {
        self.run(LOG_INFO, json!([class_name, message, method_name]))
            .await
    }

    /// Writes to the host log at warn level.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn log_warn(&self, class_name: &str, message: &str, method_name: &str) -> Result<()> {
        self.run(LOG_WARN, json!([class_name, message, method_name]))
            .await
    }

    /// Opens `directory`, optionally selecting `file`.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn open_directory(&self, directory: &str, file: Option<&str>) -> Result<()> {
        self.run(OPEN_DIRECTORY, json!([directory, file])).await
    }

    /// Opens `url`; `incognito` of `None` leaves the choice to the host.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn open_url(&self, url: &str, incognito: Option<bool>) -> Result<()> {
        self.run(OPEN_URL, json!([url, incognito])).await
    }

    /// Opens an application URI.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn open_app_uri(&self, uri: &str) -> Result<()> {
        self.run(OPEN_APP_URI, json!([uri])).await
    }

    /// Toggles game mode.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn toggle_game_mode(&self) -> Result<()> {
        self.run(TOGGLE_GAME_MODE, json!([])).await
    }

    /// Turns game mode on or off.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn set_game_mode(&self, on: bool) -> Result<()> {
        self.run(SET_GAME_MODE, json!([on])).await
    }

    /// Returns whether game mode is on.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn is_game_mode_on(&self) -> Result<bool> {
        self.call(IS_GAME_MODE_ON, json!([])).await
    }

    /// Re-runs the current query.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn requery(&self, reselect: bool) -> Result<()> {
        self.run(RE_QUERY, json!([reselect])).await
    }

    /// Pushes `results` for `raw_query` outside the normal query cycle.
    ///
    /// # Errors
    ///
    /// Fails if the host reports an error or the session is closed.
    pub async fn update_results(&self, raw_query: &str, results: impl Into<Output>) -> Result<()> {
        let records = normalize(results.into(), &self.icon_path);
        self.run(UPDATE_RESULTS, json!([raw_query, { "result": records }]))
            .await
    }
}

/// Builds action references that make the host call its API later.
#[derive(Debug, Clone)]
pub struct HostActions {
    plugin_id: String,
    icon_path: String,
}

fn action(method: &str, args: Value) -> ActionRef {
    let args = match args {
        Value::Array(args) => args,
        other => vec![other],
    };
    ActionRef::host(method, args)
}

impl HostActions {
    /// Creates an action builder for the plugin `plugin_id`.
    #[must_use]
    pub fn new(plugin_id: impl Into<String>, icon_path: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            icon_path: icon_path.into(),
        }
    }

    /// Replace the query text.
    #[must_use]
    pub fn change_query(&self, query: &str, requery: bool) -> ActionRef {
        action(CHANGE_QUERY, json!([query, requery]))
    }

    /// Restart the launcher.
    #[must_use]
    pub fn restart_app(&self) -> ActionRef {
        action(RESTART_APP, json!([]))
    }

    /// Run a shell command.
    #[must_use]
    pub fn shell_run(&self, command: &str, shell: Option<&str>) -> ActionRef {
        action(SHELL_RUN, json!([command, shell.unwrap_or(DEFAULT_SHELL)]))
    }

    /// Copy text to the clipboard.
    #[must_use]
    pub fn copy_to_clipboard(&self, text: &str, copy_file: bool, notify: bool) -> ActionRef {
        action(COPY_TO_CLIPBOARD, json!([text, copy_file, notify]))
    }

    /// Show an error notification.
    #[must_use]
    pub fn show_error_message(&self, title: &str, subtitle: &str) -> ActionRef {
        action(SHOW_MSG_ERROR, json!([title, subtitle]))
    }

    /// Show a notification with the plugin icon.
    #[must_use]
    pub fn show_message(&self, title: &str, subtitle: &str) -> ActionRef {
        action(SHOW_MSG, json!([title, subtitle, self.icon_path, true]))
    }

    /// Show the launcher window.
    #[must_use]
    pub fn show_main_window(&self) -> ActionRef {
        action(SHOW_MAIN_WINDOW, json!([]))
    }

    /// Hide the launcher window.
    #[must_use]
    pub fn hide_main_window(&self) -> ActionRef {
        action(HIDE_MAIN_WINDOW, json!([]))
    }

    /// Open the settings dialog.
    #[must_use]
    pub fn open_settings(&self) -> ActionRef {
        action(OPEN_SETTING_DIALOG, json!([]))
    }

    /// Download a URL to a file.
    #[must_use]
    pub fn http_download(&self, url: &str, file_path: &str) -> ActionRef {
        action(HTTP_DOWNLOAD, json!([url, file_path]))
    }

    /// Add an action keyword to this plugin.
    #[must_use]
    pub fn add_action_keyword(&self, keyword: &str) -> ActionRef {
        action(ADD_ACTION_KEYWORD, json!([self.plugin_id, keyword]))
    }

    /// Remove an action keyword from this plugin.
    #[must_use]
    pub fn remove_action_keyword(&self, keyword: &str) -> ActionRef {
        action(REMOVE_ACTION_KEYWORD, json!([self.plugin_id, keyword]))
    }

    /// Open a directory.
    #[must_use]
    pub fn open_directory(&self, directory: &str, file: Option<&str>) -> ActionRef {
        action(OPEN_DIRECTORY, json!([directory, file]))
    }

    /// Open a URL.
    #[must_use]
    pub fn open_url(&self, url: &str, incognito: Option<bool>) -> ActionRef {
        action(OPEN_URL, json!([url, incognito]))
    }

    /// Open an application URI.
    #[must_use]
    pub fn open_app_uri(&self, uri: &str) -> ActionRef {
        action(OPEN_APP_URI, json!([uri]))
    }

    /// Toggle game mode.
    #[must_use]
    pub fn toggle_game_mode(&self) -> ActionRef {
        action(TOGGLE_GAME_MODE, json!([]))
    }

    /// Re-run the current query.
    #[must_use]
    pub fn requery(&self, reselect: bool) -> ActionRef {
        action(RE_QUERY, json!([reselect]))
    }

    /// Any other host method.
    #[must_use]
    pub fn call(&self, method: &str, args: Vec<Value>) -> ActionRef {
        ActionRef::host(method, args)
    }
}
