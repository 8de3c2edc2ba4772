//! Plugin assembly and the host-facing method table.
//!
//! A [`PluginBuilder`] collects init callbacks, search handlers, context
//! menus and actions. [`Plugin::into_session`] wires them to the five
//! methods the host calls: `initialize`, `query`, `context_menu`,
//! `Plugin.Action` and `FlowLauncher.Action`.

use std::future::Future;
use std::sync::{Arc, RwLock};

use flow_plugin_rpc::Request;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::cancel::{Generation, GenerationController};
use crate::context::{PluginContext, PluginMetadata};
use crate::error::{Error, Result};
use crate::query::QueryData;
use crate::registry::{ActionHandler, ActionRegistry, Activation, MenuHandler, MenuRegistry};
use crate::restriction::Restriction;
use crate::results::{HOST_ACTION_METHOD, PLUGIN_ACTION_METHOD};
use crate::router::{Param, Registration, RouteOutcome, Router, SearchHandler};
use crate::session::{HostClient, Session};

/// Host method that starts the session.
pub const INITIALIZE_METHOD: &str = "initialize";
/// Host method carrying each query.
pub const QUERY_METHOD: &str = "query";
/// Host method requesting a context menu.
pub const CONTEXT_MENU_METHOD: &str = "context_menu";

type InitCallback = Arc<dyn Fn(PluginContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Collects the callbacks that make up a plugin.
///
/// # Examples
///
/// ```
/// use flow_plugin::{Plugin, Restriction, SearchRequest};
///
/// async fn hello(request: SearchRequest) -> anyhow::Result<String> {
///     Ok(format!("Hello, {}!", request.query.search()))
/// }
///
/// let plugin = Plugin::builder()
///     .search("hello", Restriction::starts_with("hello "), hello)
///     .build()
///     .expect("names are unique");
/// # drop(plugin);
/// ```
#[derive(Default)]
pub struct PluginBuilder {
    inits: Vec<InitCallback>,
    searches: Vec<Registration>,
    menus: Vec<(String, Arc<dyn MenuHandler>)>,
    actions: Vec<(String, Arc<dyn ActionHandler>)>,
}

impl PluginBuilder {
    /// Runs `callback` during `initialize`, after earlier init callbacks.
    #[must_use]
    pub fn on_init<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(PluginContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.inits.push(Arc::new(
            move |context: PluginContext| -> BoxFuture<'static, anyhow::Result<()>> { Box::pin(callback(context)) },
        ));
        self
    }

    /// Declares a search handler. Later declarations take precedence.
    #[must_use]
    pub fn search<H>(self, name: &str, restriction: Restriction, handler: H) -> Self
    where
        H: SearchHandler + 'static,
    {
        self.search_with_params(name, restriction, Vec::new(), handler)
    }

    /// Declares a search handler whose parameters are bound from its regex
    /// match.
    #[must_use]
    pub fn search_with_params<H>(
        mut self,
        name: &str,
        restriction: Restriction,
        params: Vec<Param>,
        handler: H,
    ) -> Self
    where
        H: SearchHandler + 'static,
    {
        self.searches
            .push(Registration::new(name, restriction, Arc::new(handler)).with_params(params));
        self
    }

    /// Declares a context menu.
    #[must_use]
    pub fn context_menu<H>(mut self, name: &str, handler: H) -> Self
    where
        H: MenuHandler + 'static,
    {
        self.menus.push((name.to_string(), Arc::new(handler)));
        self
    }

    /// Declares a plugin action.
    #[must_use]
    pub fn action<H>(mut self, name: &str, handler: H) -> Self
    where
        H: ActionHandler + 'static,
    {
        self.actions.push((name.to_string(), Arc::new(handler)));
        self
    }

    /// Finishes the plugin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateName`] if two context menus or two actions
    /// share a name.
    pub fn build(self) -> Result<Plugin> {
        let mut menus = MenuRegistry::new("context menu");
        for (name, handler) in self.menus {
            menus.insert(&name, handler)?;
        }
        let mut actions = ActionRegistry::new("action");
        for (name, handler) in self.actions {
            actions.insert(&name, handler)?;
        }

        Ok(Plugin {
            shared: Arc::new(Shared {
                inits: self.inits,
                router: Router::new(self.searches),
                menus,
                actions,
                generations: GenerationController::new(),
                context: RwLock::new(None),
            }),
        })
    }
}

struct Shared {
    inits: Vec<InitCallback>,
    router: Router,
    menus: MenuRegistry,
    actions: ActionRegistry,
    generations: GenerationController,
    context: RwLock<Option<PluginContext>>,
}

impl Shared {
    fn context(&self) -> Result<PluginContext> {
        self.context
            .read()
            .expect("context lock should not be poisoned")
            .clone()
            .ok_or(Error::NotInitialized)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
    #[serde(default)]
    current_plugin_metadata: PluginMetadata,
}

/// A built plugin, ready to serve a host.
pub struct Plugin {
    shared: Arc<Shared>,
}

impl Plugin {
    /// Starts building a plugin.
    #[must_use]
    pub fn builder() -> PluginBuilder {
        PluginBuilder::default()
    }

    /// Wires the plugin into a new session.
    #[must_use]
    pub fn into_session(self) -> Session {
        let mut session = Session::new();
        self.register(&mut session);
        session
    }

    /// Serves the host over `reader` and `writer` until end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the transport fails.
    pub async fn serve<R, W>(self, reader: R, writer: W, max_frame_bytes: usize) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut session = Session::new().with_max_frame_bytes(max_frame_bytes);
        self.register(&mut session);
        session.run(reader, writer).await
    }

    /// Serves the host over standard input and output.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from standard input fails.
    pub async fn serve_stdio(self, max_frame_bytes: usize) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout(), max_frame_bytes)
            .await
    }

    fn register(&self, session: &mut Session) {
        let client = session.client();

        let (shared, host) = (Arc::clone(&self.shared), client.clone());
        session.on_request(INITIALIZE_METHOD, move |request| {
            initialize(Arc::clone(&shared), host.clone(), request)
        });

        let shared = Arc::clone(&self.shared);
        session.on_request(QUERY_METHOD, move |request| {
            // Generations follow arrival order.
            let generation = shared.generations.begin();
            query(Arc::clone(&shared), generation, request)
        });

        let shared = Arc::clone(&self.shared);
        session.on_request(CONTEXT_MENU_METHOD, move |request| {
            context_menu(Arc::clone(&shared), request)
        });

        let shared = Arc::clone(&self.shared);
        session.on_request(PLUGIN_ACTION_METHOD, move |request| {
            plugin_action(Arc::clone(&shared), request)
        });

        session.on_request(HOST_ACTION_METHOD, move |request| {
            host_action(client.clone(), request)
        });
    }
}

fn parse_param<T: DeserializeOwned>(method: &str, value: &Value) -> Result<T> {
    T::deserialize(value).map_err(|e| Error::InvalidParams {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

async fn initialize(shared: Arc<Shared>, client: HostClient, request: Request) -> anyhow::Result<Value> {
    let params: InitializeParams = match request.param(0) {
        Some(value) => parse_param(INITIALIZE_METHOD, value)?,
        None => InitializeParams {
            current_plugin_metadata: PluginMetadata::default(),
        },
    };
    let metadata = params.current_plugin_metadata;
    info!(plugin = %metadata.name, id = %metadata.id, "Initializing");

    let context = PluginContext::new(metadata, client);
    {
        let mut slot = shared
            .context
            .write()
            .expect("context lock should not be poisoned");
        if slot.is_some() {
            warn!("Repeated initialize; replacing plugin context");
        }
        *slot = Some(context.clone());
    }

    for init in &shared.inits {
        init(context.clone()).await?;
    }
    Ok(json!({}))
}

async fn query(shared: Arc<Shared>, generation: Generation, request: Request) -> anyhow::Result<Value> {
    let context = shared.context()?;
    let data: QueryData = match request.param(0) {
        Some(value) => parse_param(QUERY_METHOD, value)?,
        None => QueryData::default(),
    };
    if let Some(settings) = request.param(1) {
        context.update_settings(settings.clone());
    }

    let outcome = shared.router.route(&data, &generation, &context).await?;
    match outcome {
        RouteOutcome::Results(records) if !generation.is_cancelled() => {
            Ok(json!({ "result": records }))
        }
        _ => {
            debug!(generation = generation.number(), "Discarding superseded query");
            Ok(json!({}))
        }
    }
}

async fn context_menu(shared: Arc<Shared>, request: Request) -> anyhow::Result<Value> {
    let activation = request
        .param(0)
        .and_then(Activation::parse_menu)
        .or_else(|| Activation::parse_menu(&request.params));
    let Some(activation) = activation else {
        warn!(params = %request.params, "Invalid context menu params");
        return Ok(Value::Null);
    };
    let records = shared.menus.activate(activation, shared.context()?).await?;
    Ok(json!({ "result": records }))
}

async fn plugin_action(shared: Arc<Shared>, request: Request) -> anyhow::Result<Value> {
    let Some(activation) = Activation::parse_action(&request.params) else {
        warn!(params = %request.params, "Invalid action params");
        return Ok(Value::Null);
    };
    let hide = shared.actions.activate(activation, shared.context()?).await?;
    Ok(json!({ "hide": hide }))
}

/// Forwards a host action back to the host as a direct call.
async fn host_action(client: HostClient, request: Request) -> anyhow::Result<Value> {
    let Some(activation) = Activation::parse_action(&request.params) else {
        warn!(params = %request.params, "Invalid host action params");
        return Ok(Value::Null);
    };
    client
        .send_request(&activation.name, Value::Array(activation.args))
        .await?;
    Ok(json!({ "hide": activation.hide == Some(true) }))
}
