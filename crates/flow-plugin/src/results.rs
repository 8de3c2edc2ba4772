//! Result records and the normalizer that turns handler output into them.
//!
//! Handlers return anything convertible into an [`Output`]: nothing, a
//! string, a [`SearchResult`], a list of those, or raw JSON. [`normalize`]
//! flattens that into the [`ResultRecord`] list the host renders, filling in
//! the plugin's icon where a record has none.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Method name of actions the host performs itself.
pub const HOST_ACTION_METHOD: &str = "FlowLauncher.Action";

/// Method name of actions routed back to this plugin.
pub const PLUGIN_ACTION_METHOD: &str = "Plugin.Action";

/// Preview pane content for a result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    /// Image shown in the preview pane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image_path: Option<String>,
    /// Whether the preview is a media file.
    #[serde(default)]
    pub is_media: bool,
    /// Description text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// File the preview refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// Reference to a named context menu, with its arguments.
///
/// Serialized as the two-element array `[name, args]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, Vec<Value>)", into = "(String, Vec<Value>)")]
pub struct MenuRef {
    /// Registered context menu name.
    pub name: String,
    /// Arguments passed to the menu handler.
    pub args: Vec<Value>,
}

impl MenuRef {
    /// A reference to the menu `name` with no arguments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }
}

impl From<(String, Vec<Value>)> for MenuRef {
    fn from((name, args): (String, Vec<Value>)) -> Self {
        Self { name, args }
    }
}

impl From<MenuRef> for (String, Vec<Value>) {
    fn from(menu: MenuRef) -> Self {
        (menu.name, menu.args)
    }
}

/// Who performs an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTarget {
    /// The host runs `name` as one of its API methods.
    Host,
    /// The host sends the action back to this plugin's action registry.
    Plugin,
}

impl ActionTarget {
    /// The JSON-RPC method the host uses for this target.
    #[must_use]
    pub fn method(self) -> &'static str {
        match self {
            Self::Host => HOST_ACTION_METHOD,
            Self::Plugin => PLUGIN_ACTION_METHOD,
        }
    }
}

/// Reference to an action run when the user activates a result.
///
/// Serialized as `{"method": ..., "parameters": [name, args, hide]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireAction", into = "WireAction")]
pub struct ActionRef {
    /// Who runs the action.
    pub target: ActionTarget,
    /// Action name (a host method name for [`ActionTarget::Host`]).
    pub name: String,
    /// Arguments.
    pub args: Vec<Value>,
    /// Hide the launcher window afterwards.
    pub hide: bool,
}

impl ActionRef {
    /// A reference to the plugin action `name`.
    #[must_use]
    pub fn plugin(name: impl Into<String>) -> Self {
        Self {
            target: ActionTarget::Plugin,
            name: name.into(),
            args: Vec::new(),
            hide: true,
        }
    }

    /// A reference to the host method `method`.
    #[must_use]
    pub fn host(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            target: ActionTarget::Host,
            name: method.into(),
            args,
            hide: true,
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Keeps the launcher window open after the action runs.
    #[must_use]
    pub fn dont_hide(mut self) -> Self {
        self.hide = false;
        self
    }
}

#[derive(Serialize, Deserialize)]
struct WireAction {
    method: String,
    parameters: Vec<Value>,
}

impl From<ActionRef> for WireAction {
    fn from(action: ActionRef) -> Self {
        Self {
            method: action.target.method().to_string(),
            parameters: vec![
                Value::String(action.name),
                Value::Array(action.args),
                Value::Bool(action.hide),
            ],
        }
    }
}

impl TryFrom<WireAction> for ActionRef {
    type Error = String;

    fn try_from(wire: WireAction) -> Result<Self, Self::Error> {
        let target = match wire.method.as_str() {
            HOST_ACTION_METHOD => ActionTarget::Host,
            PLUGIN_ACTION_METHOD => ActionTarget::Plugin,
            other => return Err(format!("unknown action method `{other}`")),
        };
        let mut parameters = wire.parameters.into_iter();
        let Some(Value::String(name)) = parameters.next() else {
            return Err("action name must be a string".to_string());
        };
        let args = match parameters.next() {
            Some(Value::Array(args)) => args,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => return Err("action arguments must be an array".to_string()),
        };
        let hide = !matches!(parameters.next(), Some(Value::Bool(false)));
        Ok(Self {
            target,
            name,
            args,
            hide,
        })
    }
}

/// Author-facing result, built with chained setters or parsed from JSON.
///
/// # Examples
///
/// ```
/// use flow_plugin::results::{ActionRef, SearchResult};
///
/// let result = SearchResult::new("Open docs")
///     .subtitle("https://example.org")
///     .score(50)
///     .action(ActionRef::host("OpenUrl", vec!["https://example.org".into()]));
/// assert_eq!(result.title, "Open docs");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchResult {
    /// Main line.
    pub title: String,
    /// Second line.
    pub subtitle: Option<String>,
    /// Text copied when the user copies the result.
    #[serde(alias = "textToCopyOnCtrlC")]
    pub copy_text: Option<String>,
    /// Text placed in the query box on autocomplete.
    #[serde(alias = "autoCompleteText")]
    pub autocomplete_text: Option<String>,
    /// Icon path; defaults to the plugin icon.
    #[serde(alias = "icoPath")]
    pub icon_path: Option<String>,
    /// Draw the icon rounded.
    #[serde(alias = "isIconRounded")]
    pub rounded_icon: Option<bool>,
    /// Ranking score.
    pub score: Option<i64>,
    /// Character positions of the title to highlight.
    #[serde(alias = "titleHighlightData")]
    pub title_highlight: Option<Vec<usize>>,
    /// Tooltip for the title.
    pub title_tooltip: Option<String>,
    /// Tooltip for the subtitle.
    pub subtitle_tooltip: Option<String>,
    /// Progress bar value, 0 to 100.
    #[serde(alias = "progressBar")]
    pub progress: Option<u32>,
    /// Progress bar color.
    #[serde(alias = "progressBarColor")]
    pub progress_color: Option<String>,
    /// Preview pane content.
    pub preview: Option<Preview>,
    /// Context menu opened for this result.
    #[serde(alias = "contextData")]
    pub context_menu: Option<MenuRef>,
    /// Action run when the result is activated.
    #[serde(alias = "jsonRPCAction")]
    pub action: Option<ActionRef>,
}

impl SearchResult {
    /// A result with the given title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the subtitle.
    #[must_use]
    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    /// Sets the text copied with the result.
    #[must_use]
    pub fn copy_text(mut self, text: impl Into<String>) -> Self {
        self.copy_text = Some(text.into());
        self
    }

    /// Sets the autocomplete text.
    #[must_use]
    pub fn autocomplete(mut self, text: impl Into<String>) -> Self {
        self.autocomplete_text = Some(text.into());
        self
    }

    /// Sets the icon.
    #[must_use]
    pub fn icon(mut self, path: impl Into<String>) -> Self {
        self.icon_path = Some(path.into());
        self
    }

    /// Draws the icon rounded.
    #[must_use]
    pub fn rounded_icon(mut self, rounded: bool) -> Self {
        self.rounded_icon = Some(rounded);
        self
    }

    /// Sets the score.
    #[must_use]
    pub fn score(mut self, score: i64) -> Self {
        self.score = Some(score);
        self
    }

    /// Highlights the given title character positions.
    #[must_use]
    pub fn highlight(mut self, positions: Vec<usize>) -> Self {
        self.title_highlight = Some(positions);
        self
    }

    /// Sets the title tooltip.
    #[must_use]
    pub fn title_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.title_tooltip = Some(tooltip.into());
        self
    }

    /// Sets the subtitle tooltip.
    #[must_use]
    pub fn subtitle_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.subtitle_tooltip = Some(tooltip.into());
        self
    }

    /// Shows a progress bar.
    #[must_use]
    pub fn progress(mut self, value: u32, color: Option<String>) -> Self {
        self.progress = Some(value);
        self.progress_color = color;
        self
    }

    /// Sets the preview pane content.
    #[must_use]
    pub fn preview(mut self, preview: Preview) -> Self {
        self.preview = Some(preview);
        self
    }

    /// Attaches a context menu.
    #[must_use]
    pub fn context_menu(mut self, menu: MenuRef) -> Self {
        self.context_menu = Some(menu);
        self
    }

    /// Attaches an action.
    #[must_use]
    pub fn action(mut self, action: ActionRef) -> Self {
        self.action = Some(action);
        self
    }

    /// Converts into the wire record, using `default_icon` if no icon is set.
    #[must_use]
    pub fn into_record(self, default_icon: &str) -> ResultRecord {
        ResultRecord {
            title: self.title,
            subtitle: self.subtitle,
            copy_text: self.copy_text,
            auto_complete_text: self.autocomplete_text,
            ico_path: Some(self.icon_path.unwrap_or_else(|| default_icon.to_string())),
            rounded_icon: self.rounded_icon,
            score: self.score,
            title_highlight_data: self.title_highlight,
            title_tooltip: self.title_tooltip,
            subtitle_tooltip: self.subtitle_tooltip,
            progress_bar: self.progress,
            progress_bar_color: self.progress_color,
            preview: self.preview,
            context_data: self.context_menu,
            json_rpc_action: self.action,
        }
    }
}

/// A result in the shape the host renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    /// Main line.
    pub title: String,
    /// Second line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Copy text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_text: Option<String>,
    /// Autocomplete text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_complete_text: Option<String>,
    /// Icon path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ico_path: Option<String>,
    /// Rounded icon flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounded_icon: Option<bool>,
    /// Score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    /// Highlighted title positions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_highlight_data: Option<Vec<usize>>,
    /// Title tooltip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_tooltip: Option<String>,
    /// Subtitle tooltip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_tooltip: Option<String>,
    /// Progress bar value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_bar: Option<u32>,
    /// Progress bar color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_bar_color: Option<String>,
    /// Preview pane content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<Preview>,
    /// Context menu reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_data: Option<MenuRef>,
    /// Activation action.
    #[serde(
        default,
        rename = "jsonRPCAction",
        skip_serializing_if = "Option::is_none"
    )]
    pub json_rpc_action: Option<ActionRef>,
}

/// One element of handler output.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// A full result.
    Record(Box<SearchResult>),
    /// Bare text, becoming a result titled with it.
    Text(String),
}

impl From<SearchResult> for Item {
    fn from(result: SearchResult) -> Self {
        Self::Record(Box::new(result))
    }
}

impl From<String> for Item {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Item {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<i64> for Item {
    fn from(value: i64) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for Item {
    fn from(value: f64) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for Item {
    fn from(value: bool) -> Self {
        Self::Text(value.to_string())
    }
}

impl Item {
    /// Interprets a non-null JSON value. Objects that do not parse as a
    /// result are kept as their JSON text.
    fn from_json(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            Value::Object(_) => match serde_json::from_value::<SearchResult>(value.clone()) {
                Ok(result) => Self::from(result),
                Err(_) => Self::Text(value.to_string()),
            },
            other => Self::Text(other.to_string()),
        }
    }

    fn into_record(self, default_icon: &str) -> ResultRecord {
        match self {
            Self::Record(result) => result.into_record(default_icon),
            Self::Text(text) => SearchResult::new(text).into_record(default_icon),
        }
    }
}

/// Everything a search or context-menu handler may return.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Output {
    /// No results.
    #[default]
    None,
    /// A single result.
    Single(Item),
    /// A list of results.
    List(Vec<Item>),
}

impl From<()> for Output {
    fn from((): ()) -> Self {
        Self::None
    }
}

impl From<Item> for Output {
    fn from(item: Item) -> Self {
        Self::Single(item)
    }
}

impl From<SearchResult> for Output {
    fn from(result: SearchResult) -> Self {
        Self::Single(result.into())
    }
}

impl From<String> for Output {
    fn from(text: String) -> Self {
        Self::Single(text.into())
    }
}

impl From<&str> for Output {
    fn from(text: &str) -> Self {
        Self::Single(text.into())
    }
}

impl From<i64> for Output {
    fn from(value: i64) -> Self {
        Self::Single(value.into())
    }
}

impl From<f64> for Output {
    fn from(value: f64) -> Self {
        Self::Single(value.into())
    }
}

impl From<bool> for Output {
    fn from(value: bool) -> Self {
        Self::Single(value.into())
    }
}

impl<T: Into<Item>> From<Vec<T>> for Output {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Output>> From<Option<T>> for Output {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::None,
            Value::Array(items) => Self::List(
                items
                    .into_iter()
                    .filter(|item| !item.is_null())
                    .map(Item::from_json)
                    .collect(),
            ),
            other => Self::Single(Item::from_json(other)),
        }
    }
}

/// Flattens handler output into result records.
///
/// Nothing becomes an empty list, a single item becomes a one-element list,
/// and every record without an icon gets `default_icon`.
#[must_use]
pub fn normalize(output: Output, default_icon: &str) -> Vec<ResultRecord> {
    match output {
        Output::None => Vec::new(),
        Output::Single(item) => vec![item.into_record(default_icon)],
        Output::List(items) => items
            .into_iter()
            .map(|item| item.into_record(default_icon))
            .collect(),
    }
}

/// A record reporting a handler that could not be run.
#[must_use]
pub fn handler_error(handler: &str, reason: &str, default_icon: &str) -> ResultRecord {
    SearchResult::new(format!("Error: in handler `{handler}`"))
        .subtitle(reason)
        .into_record(default_icon)
}
