//! Named context-menu and action callbacks.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::context::PluginContext;
use crate::error::{Error, Result};
use crate::results::{Output, ResultRecord, normalize};

/// Arguments and context passed to a context-menu or action callback.
#[derive(Clone)]
pub struct Invocation {
    /// Arguments recorded in the menu or action reference.
    pub args: Vec<Value>,
    /// Plugin context.
    pub context: PluginContext,
}

impl Invocation {
    /// Argument `index` as a string, if it is one.
    #[must_use]
    pub fn str_arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(Value::as_str)
    }
}

/// Produces the entries of a context menu.
#[async_trait]
pub trait MenuHandler: Send + Sync {
    /// Builds the menu entries.
    async fn open(&self, invocation: Invocation) -> anyhow::Result<Output>;
}

#[async_trait]
impl<F, Fut, O> MenuHandler for F
where
    F: Fn(Invocation) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
    O: Into<Output> + Send + 'static,
{
    async fn open(&self, invocation: Invocation) -> anyhow::Result<Output> {
        (self)(invocation).await.map(Into::into)
    }
}

/// Whether the launcher window should hide after an action.
///
/// Only an explicit `false` keeps the window open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HideWindow(pub bool);

impl From<()> for HideWindow {
    fn from((): ()) -> Self {
        Self(true)
    }
}

impl From<bool> for HideWindow {
    fn from(hide: bool) -> Self {
        Self(hide)
    }
}

impl From<Option<bool>> for HideWindow {
    fn from(hide: Option<bool>) -> Self {
        Self(hide != Some(false))
    }
}

/// Runs when the user activates a result carrying a plugin action.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Performs the action.
    async fn run(&self, invocation: Invocation) -> anyhow::Result<HideWindow>;
}

#[async_trait]
impl<F, Fut, O> ActionHandler for F
where
    F: Fn(Invocation) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
    O: Into<HideWindow> + Send + 'static,
{
    async fn run(&self, invocation: Invocation) -> anyhow::Result<HideWindow> {
        (self)(invocation).await.map(Into::into)
    }
}

/// Name-keyed table of callbacks.
pub struct Registry<H: ?Sized> {
    kind: &'static str,
    entries: HashMap<String, Arc<H>>,
}

impl<H: ?Sized> Registry<H> {
    /// Creates an empty registry; `kind` names it in errors and logs.
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    /// Registers `handler` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateName`] if `name` is taken.
    pub fn insert(&mut self, name: &str, handler: Arc<H>) -> Result<()> {
        if self.entries.contains_key(name) {
            return Err(Error::DuplicateName {
                kind: self.kind,
                name: name.to_string(),
            });
        }
        self.entries.insert(name.to_string(), handler);
        Ok(())
    }

    /// The handler registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<H>> {
        self.entries.get(name).cloned()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Context menus by name.
pub type MenuRegistry = Registry<dyn MenuHandler>;

/// Plugin actions by name.
pub type ActionRegistry = Registry<dyn ActionHandler>;

/// A parsed activation request: which callback, with which arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    /// Callback name.
    pub name: String,
    /// Arguments.
    pub args: Vec<Value>,
    /// Hide flag, for actions that carry one.
    pub hide: Option<bool>,
}

impl Activation {
    /// Parses `[name, args]`.
    #[must_use]
    pub fn parse_menu(value: &Value) -> Option<Self> {
        match value.as_array()?.as_slice() {
            [Value::String(name), Value::Array(args)] => Some(Self {
                name: name.clone(),
                args: args.clone(),
                hide: None,
            }),
            _ => None,
        }
    }

    /// Parses `[name, args]` or `[name, args, hide]`, where `hide` is a
    /// boolean or null.
    #[must_use]
    pub fn parse_action(value: &Value) -> Option<Self> {
        match value.as_array()?.as_slice() {
            [Value::String(name), Value::Array(args)] => Some(Self {
                name: name.clone(),
                args: args.clone(),
                hide: None,
            }),
            [Value::String(name), Value::Array(args), hide @ (Value::Bool(_) | Value::Null)] => {
                Some(Self {
                    name: name.clone(),
                    args: args.clone(),
                    hide: hide.as_bool(),
                })
            }
            _ => None,
        }
    }
}

impl MenuRegistry {
    /// Opens the menu named by `activation`. An unknown name yields no
    /// entries.
    ///
    /// # Errors
    ///
    /// Propagates the menu handler's error.
    pub async fn activate(
        &self,
        activation: Activation,
        context: PluginContext,
    ) -> anyhow::Result<Vec<ResultRecord>> {
        let Some(handler) = self.get(&activation.name) else {
            debug!(name = %activation.name, "Unknown context menu");
            return Ok(Vec::new());
        };
        let icon = context.default_icon().to_string();
        let output = handler
            .open(Invocation {
                args: activation.args,
                context,
            })
            .await?;
        Ok(normalize(output, &icon))
    }
}

impl ActionRegistry {
    /// Runs the action named by `activation`, returning whether to hide the
    /// window. An unknown name does nothing and hides.
    ///
    /// # Errors
    ///
    /// Propagates the action handler's error.
    pub async fn activate(&self, activation: Activation, context: PluginContext) -> anyhow::Result<bool> {
        let Some(handler) = self.get(&activation.name) else {
            debug!(name = %activation.name, "Unknown action");
            return Ok(true);
        };
        let HideWindow(hide) = handler
            .run(Invocation {
                args: activation.args,
                context,
            })
            .await?;
        Ok(hide)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PluginMetadata;
    use crate::session::Session;
    use rstest::rstest;
    use serde_json::json;

    fn context() -> PluginContext {
        let metadata = PluginMetadata {
            ico_path: "icon.png".to_string(),
            ..PluginMetadata::default()
        };
        PluginContext::new(metadata, Session::new().client())
    }

    async fn greetings(invocation: Invocation) -> anyhow::Result<Vec<String>> {
        let name = invocation.str_arg(0).unwrap_or("stranger").to_string();
        Ok(vec![format!("Hello, {name}"), format!("Bye, {name}")])
    }

    async fn keep_open(_: Invocation) -> anyhow::Result<bool> {
        Ok(false)
    }

    #[rstest]
    #[case::unit(HideWindow::from(()), true)]
    #[case::explicit_true(HideWindow::from(true), true)]
    #[case::explicit_false(HideWindow::from(false), false)]
    #[case::absent(HideWindow::from(None), true)]
    #[case::some_false(HideWindow::from(Some(false)), false)]
    fn hide_rule(#[case] hide: HideWindow, #[case] expected: bool) {
        assert_eq!(hide.0, expected);
    }

    #[rstest]
    #[case::pair(json!(["copy", [1]]), Some(None))]
    #[case::with_hide(json!(["copy", [], false]), Some(Some(false)))]
    #[case::null_hide(json!(["copy", [], null]), Some(None))]
    #[case::bad_hide(json!(["copy", [], "no"]), None)]
    #[case::name_not_string(json!([1, []]), None)]
    #[case::args_not_array(json!(["copy", "x"]), None)]
    #[case::not_array(json!({"name": "copy"}), None)]
    fn action_params(#[case] value: Value, #[case] expected: Option<Option<bool>>) {
        assert_eq!(Activation::parse_action(&value).map(|a| a.hide), expected);
    }

    #[test]
    fn menu_params_require_exactly_two_elements() {
        assert!(Activation::parse_menu(&json!(["m", []])).is_some());
        assert!(Activation::parse_menu(&json!(["m", [], true])).is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut menus = MenuRegistry::new("context menu");
        menus.insert("greetings", Arc::new(greetings)).unwrap();
        let err = menus.insert("greetings", Arc::new(greetings)).unwrap_err();
        assert!(err.to_string().contains("greetings"));
        assert_eq!(menus.len(), 1);
    }

    #[tokio::test]
    async fn menu_activation_normalizes_output() {
        let mut menus = MenuRegistry::new("context menu");
        menus.insert("greetings", Arc::new(greetings)).unwrap();

        let activation = Activation::parse_menu(&json!(["greetings", ["Sam"]])).unwrap();
        let records = menus.activate(activation, context()).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Hello, Sam");
        assert_eq!(records[0].ico_path.as_deref(), Some("icon.png"));
    }

    #[tokio::test]
    async fn unknown_menu_is_empty() {
        let menus = MenuRegistry::new("context menu");
        let activation = Activation::parse_menu(&json!(["missing", []])).unwrap();
        assert!(menus.activate(activation, context()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn action_result_controls_hiding() {
        let mut actions = ActionRegistry::new("action");
        actions.insert("keep", Arc::new(keep_open)).unwrap();

        let keep = Activation::parse_action(&json!(["keep", []])).unwrap();
        assert!(!actions.activate(keep, context()).await.unwrap());

        let unknown = Activation::parse_action(&json!(["missing", []])).unwrap();
        assert!(actions.activate(unknown, context()).await.unwrap());
    }
}
