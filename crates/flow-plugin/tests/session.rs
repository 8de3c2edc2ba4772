//! Integration tests for a plugin served over an in-memory pipe.
//!
//! A scripted host drives the plugin through the same framed JSON-RPC
//! channel a launcher would use, covering:
//! - Initialization and query routing
//! - Superseded queries
//! - Context menus and both kinds of actions
//! - Outbound calls from handlers to the host
//! - Error responses

use std::time::Duration;

use flow_plugin::{
    ActionRef, Invocation, MenuRef, Param, Plugin, PluginContext, Restriction, SearchRequest,
    SearchResult,
};
use flow_plugin_rpc::{
    DEFAULT_MAX_FRAME_BYTES, FrameReader, INTERNAL_ERROR, Message, Request, RequestId, Response,
    encode,
};
use serde_json::{Value, json};

mod helpers {
    use super::*;
    use flow_plugin_rpc::FrameWriter;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
    use tokio::task::JoinHandle;

    /// Scripted host talking to a plugin through a duplex pipe.
    pub struct Host {
        reader: FrameReader<ReadHalf<DuplexStream>>,
        writer: FrameWriter<WriteHalf<DuplexStream>>,
        next_id: i64,
        pub session: JoinHandle<flow_plugin::Result<()>>,
    }

    impl Host {
        /// Start serving `plugin` and return the host end.
        pub fn start(plugin: Plugin) -> Self {
            let (host_end, plugin_end) = tokio::io::duplex(64 * 1024);
            let (plugin_read, plugin_write) = tokio::io::split(plugin_end);
            let session =
                tokio::spawn(plugin.serve(plugin_read, plugin_write, DEFAULT_MAX_FRAME_BYTES));
            let (host_read, host_write) = tokio::io::split(host_end);
            Self {
                reader: FrameReader::new(host_read),
                writer: FrameWriter::new(host_write),
                next_id: 1,
                session,
            }
        }

        /// Send a request and return its id without waiting.
        pub async fn send(&mut self, method: &str, params: Value) -> RequestId {
            let id = RequestId::Number(self.next_id);
            self.next_id += 1;
            let request = Request::new(id.clone(), method, params);
            self.writer
                .send(&Message::from(request))
                .await
                .expect("host write should succeed");
            id
        }

        /// Send a notification.
        pub async fn notify(&mut self, method: &str, params: Value) {
            self.writer
                .send(&Message::from(Request::notification(method, params)))
                .await
                .expect("host write should succeed");
        }

        /// Answer an outbound request from the plugin.
        pub async fn respond(&mut self, id: RequestId, result: Value) {
            self.writer
                .send(&Message::from(Response::result(id, result)))
                .await
                .expect("host write should succeed");
        }

        /// Read the next message from the plugin.
        pub async fn next(&mut self) -> Message {
            tokio::time::timeout(Duration::from_secs(5), self.reader.read_message())
                .await
                .expect("plugin should answer in time")
                .expect("host read should succeed")
                .expect("plugin should not close the pipe")
        }

        /// Read the next message, which must be a request from the plugin.
        pub async fn next_request(&mut self) -> Request {
            match self.next().await {
                Message::Request(request) => request,
                other => panic!("expected a request, got {other:?}"),
            }
        }

        /// Send a request and wait for its response.
        pub async fn call(&mut self, method: &str, params: Value) -> Response {
            let id = self.send(method, params).await;
            match self.next().await {
                Message::Response(response) if response.id == id => response,
                other => panic!("expected the response to {id}, got {other:?}"),
            }
        }

        /// Send `initialize` with test metadata.
        pub async fn initialize(&mut self) {
            let response = self
                .call(
                    "initialize",
                    json!([{
                        "currentPluginMetadata": {
                            "id": "demo-id",
                            "name": "Demo",
                            "actionKeyword": "fp",
                            "icoPath": "images/icon.png"
                        }
                    }]),
                )
                .await;
            assert_eq!(response.into_result().unwrap(), json!({}));
        }

        /// Close the host end and wait for the session to finish.
        pub async fn shutdown(self) -> flow_plugin::Result<()> {
            drop(self.writer);
            drop(self.reader);
            self.session.await.expect("session task should not panic")
        }
    }

    /// Query params as the host sends them.
    pub fn query(search: &str, settings: Value) -> Value {
        json!([
            {
                "rawQuery": format!("fp {search}"),
                "isReQuery": false,
                "search": search,
                "searchTerms": search.split_whitespace().collect::<Vec<_>>(),
                "actionKeyword": "fp"
            },
            settings
        ])
    }

    /// Titles of the records in a query or context menu response.
    pub fn titles(response: Response) -> Vec<String> {
        let result = response.into_result().expect("response should succeed");
        result["result"]
            .as_array()
            .expect("result should hold a list")
            .iter()
            .map(|record| record["title"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

use helpers::{Host, query, titles};

async fn fallback(request: SearchRequest) -> anyhow::Result<String> {
    Ok(format!("any:{}", request.query.search()))
}

async fn hello(request: SearchRequest) -> anyhow::Result<SearchResult> {
    Ok(SearchResult::new(format!("Hello, {}", request.query.search()))
        .context_menu(MenuRef::new("greetings").arg(request.query.search()))
        .action(ActionRef::plugin("keep").dont_hide()))
}

async fn slow(request: SearchRequest) -> anyhow::Result<String> {
    Ok(format!("slow:{}", request.query.search()))
}

async fn flight(request: SearchRequest) -> anyhow::Result<String> {
    if request.query.search() == "one" {
        request.context.api().is_main_window_visible().await?;
    }
    Ok(format!("flight:{}", request.query.search()))
}

async fn window(request: SearchRequest) -> anyhow::Result<String> {
    let visible = request.context.api().is_main_window_visible().await?;
    Ok(format!("visible:{visible}"))
}

async fn settings(request: SearchRequest) -> anyhow::Result<String> {
    let greeting = request.context.settings()["greeting"]
        .as_str()
        .unwrap_or("none")
        .to_string();
    Ok(greeting)
}

async fn fail(_: SearchRequest) -> anyhow::Result<String> {
    anyhow::bail!("lookup failed")
}

async fn add(request: SearchRequest) -> anyhow::Result<i64> {
    Ok(request.args.i64("a").unwrap_or_default() + request.args.i64("b").unwrap_or_default())
}

async fn greetings(invocation: Invocation) -> anyhow::Result<Vec<String>> {
    let name = invocation.str_arg(0).unwrap_or_default().to_string();
    Ok(vec![format!("Hi {name}"), format!("Bye {name}")])
}

async fn keep(_: Invocation) -> anyhow::Result<bool> {
    Ok(false)
}

async fn noted(context: PluginContext) -> anyhow::Result<()> {
    tracing::debug!(id = %context.metadata().id, "init callback ran");
    Ok(())
}

fn plugin() -> Plugin {
    Plugin::builder()
        .on_init(noted)
        .search("fallback", Restriction::none(), fallback)
        .search("hello", Restriction::starts_with("hello "), hello)
        .search(
            "slow",
            Restriction::starts_with("slow ").debounce(Duration::from_millis(200)),
            slow,
        )
        .search("flight", Restriction::starts_with("flight "), flight)
        .search("window", Restriction::equal_to("window"), window)
        .search("settings", Restriction::equal_to("settings"), settings)
        .search("fail", Restriction::equal_to("fail"), fail)
        .search_with_params(
            "add",
            Restriction::regex(r"^add (?<a>\d+) (?<b>\w+)$").unwrap(),
            vec![Param::integer("a"), Param::integer("b")],
            add,
        )
        .context_menu("greetings", greetings)
        .action("keep", keep)
        .build()
        .unwrap()
}

#[tokio::test]
async fn query_is_routed_after_initialize() {
    let mut host = Host::start(plugin());
    host.initialize().await;

    let response = host.call("query", query("hello Sam", json!({}))).await;
    let result = response.into_result().unwrap();
    let record = &result["result"][0];

    assert_eq!(record["title"], "Hello, Sam");
    assert_eq!(record["icoPath"], "images/icon.png");
    assert_eq!(record["contextData"], json!(["greetings", ["Sam"]]));
    assert_eq!(
        record["jsonRPCAction"],
        json!({"method": "Plugin.Action", "parameters": ["keep", [], false]})
    );

    let response = host.call("query", query("something else", json!({}))).await;
    assert_eq!(titles(response), vec!["any:something else"]);

    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn query_before_initialize_fails() {
    let mut host = Host::start(plugin());

    let response = host.call("query", query("hello Sam", json!({}))).await;
    let error = response.into_result().unwrap_err();

    assert_eq!(error.code, INTERNAL_ERROR);
    assert_eq!(error.message, "Plugin has not been initialized");
}

#[tokio::test]
async fn handler_error_becomes_internal_error() {
    let mut host = Host::start(plugin());
    host.initialize().await;

    let error = host
        .call("query", query("fail", json!({})))
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(error.code, INTERNAL_ERROR);
    assert_eq!(error.message, "lookup failed");
}

#[tokio::test]
async fn binding_failure_is_reported_as_a_result() {
    let mut host = Host::start(plugin());
    host.initialize().await;

    let response = host.call("query", query("add 1 two", json!({}))).await;
    assert_eq!(titles(response), vec!["Error: in handler `add`"]);

    let response = host.call("query", query("add 1 2", json!({}))).await;
    assert_eq!(titles(response), vec!["3"]);
}

#[tokio::test(start_paused = true)]
async fn newer_query_supersedes_debounced_one() {
    let mut host = Host::start(plugin());
    host.initialize().await;

    let first = host.send("query", query("slow one", json!({}))).await;
    let second = host.send("query", query("slow two", json!({}))).await;

    let mut responses = Vec::new();
    for _ in 0..2 {
        match host.next().await {
            Message::Response(response) => responses.push(response),
            other => panic!("expected a response, got {other:?}"),
        }
    }
    responses.sort_by_key(|response| response.id == second);

    assert_eq!(responses[0].id, first);
    assert_eq!(responses[0].clone().into_result().unwrap(), json!({}));
    assert_eq!(responses[1].id, second);
    assert_eq!(titles(responses[1].clone()), vec!["slow:two"]);
}

#[tokio::test]
async fn result_finished_after_newer_query_is_discarded() {
    let mut host = Host::start(plugin());
    host.initialize().await;

    let first = host.send("query", query("flight one", json!({}))).await;
    // The first handler is now waiting on the host.
    let outbound = host.next_request().await;
    assert_eq!(outbound.method, "IsMainWindowVisible");

    let second = host.send("query", query("flight two", json!({}))).await;
    host.respond(outbound.id.unwrap(), json!(true)).await;

    let mut responses = Vec::new();
    for _ in 0..2 {
        match host.next().await {
            Message::Response(response) => responses.push(response),
            other => panic!("expected a response, got {other:?}"),
        }
    }
    responses.sort_by_key(|response| response.id == second);

    assert_eq!(responses[0].id, first);
    assert_eq!(responses[0].clone().into_result().unwrap(), json!({}));
    assert_eq!(responses[1].id, second);
    assert_eq!(titles(responses[1].clone()), vec!["flight:two"]);
}

#[tokio::test]
async fn settings_travel_with_the_query() {
    let mut host = Host::start(plugin());
    host.initialize().await;

    let response = host
        .call("query", query("settings", json!({"greeting": "Howdy"})))
        .await;
    assert_eq!(titles(response), vec!["Howdy"]);
}

#[tokio::test]
async fn handler_can_call_the_host() {
    let mut host = Host::start(plugin());
    host.initialize().await;

    let query_id = host.send("query", query("window", json!({}))).await;

    let outbound = host.next_request().await;
    assert_eq!(outbound.method, "IsMainWindowVisible");
    assert_eq!(outbound.id, Some(RequestId::Number(0)));
    host.respond(RequestId::Number(0), json!(true)).await;

    let Message::Response(response) = host.next().await else {
        panic!("expected the query response");
    };
    assert_eq!(response.id, query_id);
    assert_eq!(titles(response), vec!["visible:true"]);
}

#[tokio::test]
async fn context_menu_is_opened_by_name() {
    let mut host = Host::start(plugin());
    host.initialize().await;

    let response = host
        .call("context_menu", json!([["greetings", ["Sam"]]]))
        .await;
    assert_eq!(titles(response), vec!["Hi Sam", "Bye Sam"]);

    let response = host.call("context_menu", json!([["missing", []]])).await;
    assert!(titles(response).is_empty());

    let response = host.call("context_menu", json!([42])).await;
    assert_eq!(response.into_result().unwrap(), Value::Null);
}

#[tokio::test]
async fn plugin_action_reports_hide() {
    let mut host = Host::start(plugin());
    host.initialize().await;

    let response = host.call("Plugin.Action", json!(["keep", [], false])).await;
    assert_eq!(response.into_result().unwrap(), json!({"hide": false}));

    let response = host.call("Plugin.Action", json!(["missing", []])).await;
    assert_eq!(response.into_result().unwrap(), json!({"hide": true}));

    let response = host.call("Plugin.Action", json!(["keep"])).await;
    assert_eq!(response.into_result().unwrap(), Value::Null);
}

#[tokio::test]
async fn host_action_is_forwarded_to_the_host() {
    let mut host = Host::start(plugin());
    host.initialize().await;

    let action_id = host
        .send("FlowLauncher.Action", json!(["ShowMsg", ["title", "sub"]]))
        .await;

    let forwarded = host.next_request().await;
    assert_eq!(forwarded.method, "ShowMsg");
    assert_eq!(forwarded.params, json!(["title", "sub"]));
    host.respond(forwarded.id.unwrap(), Value::Null).await;

    let Message::Response(response) = host.next().await else {
        panic!("expected the action response");
    };
    assert_eq!(response.id, action_id);
    assert_eq!(response.into_result().unwrap(), json!({"hide": false}));
}

#[tokio::test]
async fn unknown_method_gets_null_result() {
    let mut host = Host::start(plugin());
    host.notify("nothing_here", json!([])).await;

    let response = host.call("nothing_here", json!([])).await;
    assert_eq!(response.into_result().unwrap(), Value::Null);
}

#[tokio::test]
async fn pending_call_fails_when_host_disconnects() {
    let mut host = Host::start(plugin());
    host.initialize().await;

    host.send("query", query("window", json!({}))).await;
    assert_eq!(host.next_request().await.method, "IsMainWindowVisible");

    host.shutdown().await.unwrap();
}

#[test]
fn replies_are_written_before_serve_returns() {
    let mut input = Vec::new();
    for request in [
        Request::new(1_i64, "nothing_here", json!([])),
        Request::new(2_i64, "initialize", json!([{"currentPluginMetadata": {"id": "x"}}])),
    ] {
        input.extend(encode(&Message::from(request)).unwrap());
    }
    let (plugin_out, host_in) = tokio::io::duplex(64 * 1024);

    // Dropping the runtime right after `serve` returns cancels anything
    // still running, as the end of `main` does.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime
        .block_on(plugin().serve(std::io::Cursor::new(input), plugin_out, DEFAULT_MAX_FRAME_BYTES))
        .unwrap();
    drop(runtime);

    let reader = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let mut ids: Vec<RequestId> = reader.block_on(async {
        let mut reader = FrameReader::new(host_in);
        let mut ids = Vec::new();
        while let Some(message) = reader.read_message().await.unwrap() {
            ids.extend(message.id().cloned());
        }
        ids
    });
    ids.sort_by_key(ToString::to_string);

    assert_eq!(ids, vec![RequestId::Number(1), RequestId::Number(2)]);
}
