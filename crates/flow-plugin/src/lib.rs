//! Runtime for launcher plugins that talk JSON-RPC over standard streams.
//!
//! A plugin is a set of callbacks assembled with a [`PluginBuilder`] and
//! served to the host by [`Plugin::serve_stdio`]. The host drives it with
//! five methods:
//!
//! - `initialize` - Hand over plugin metadata and run init callbacks
//! - `query` - Route the query to a search handler and return its results
//! - `context_menu` - Open a named context menu
//! - `Plugin.Action` - Run a named plugin action
//! - `FlowLauncher.Action` - Forward an action to the host's own API
//!
//! # Architecture
//!
//! Framing and the message model live in the `flow-plugin-rpc` crate. This
//! crate adds the [`session`] (request correlation and dispatch), the
//! [`router`] with its [`restriction`]s, query [`cancel`]lation, the result
//! normalizer in [`results`], and the host [`api`].

pub mod api;
pub mod cancel;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod plugin;
pub mod query;
pub mod registry;
pub mod restriction;
pub mod results;
pub mod router;
pub mod session;

pub use api::{HostActions, HostApi};
pub use cancel::CancellationSignal;
pub use config::RuntimeConfig;
pub use context::{PluginContext, PluginMetadata};
pub use error::{Error, Result};
pub use plugin::{Plugin, PluginBuilder};
pub use query::{Query, QueryData};
pub use registry::{HideWindow, Invocation};
pub use restriction::Restriction;
pub use results::{ActionRef, MenuRef, Output, Preview, SearchResult};
pub use router::{Arguments, Param, SearchRequest};
