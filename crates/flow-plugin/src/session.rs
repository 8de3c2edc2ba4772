//! Bidirectional JSON-RPC session over a framed byte channel.
//!
//! A [`Session`] owns the method table for inbound requests and a
//! [`HostClient`] for outbound ones. Inbound messages are dispatched in the
//! order they arrive: each handler is called synchronously on the read loop
//! and the future it returns runs on its own task, so a slow handler never
//! holds up the next request. All outgoing frames go through a single
//! writer task, which keeps concurrent replies from interleaving. At end of
//! input the session waits for running handlers and for the writer to drain
//! before returning.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use flow_plugin_rpc::{
    DEFAULT_MAX_FRAME_BYTES, FrameReader, FrameWriter, Message, Request, RequestId, Response,
};
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};

/// Future returned by an inbound method handler.
pub type MethodFuture = BoxFuture<'static, anyhow::Result<Value>>;

/// Type-erased inbound method handler.
pub type MethodHandler = Arc<dyn Fn(Request) -> MethodFuture + Send + Sync>;

type Completion = oneshot::Sender<Result<Value>>;

/// Outbound calls awaiting a response.
#[derive(Default)]
struct CallTable {
    next_id: i64,
    calls: HashMap<i64, Completion>,
    closed: bool,
}

struct ClientInner {
    outbound: mpsc::UnboundedSender<Message>,
    table: Mutex<CallTable>,
}

/// Handle for sending messages to the host.
///
/// Cheap to clone; every clone shares the same pending-call table and
/// outbound queue.
#[derive(Clone)]
pub struct HostClient {
    inner: Arc<ClientInner>,
}

impl HostClient {
    fn new(outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                outbound,
                table: Mutex::new(CallTable::default()),
            }),
        }
    }

    /// Sends a request to the host and waits for its response.
    ///
    /// Ids are allocated from 0 upward and queued under the same lock, so the
    /// frames leave in id order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if the host answers with an error object and
    /// [`Error::SessionClosed`] if the transport ends first.
    pub async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        {
            let mut table = self
                .inner
                .table
                .lock()
                .expect("call table mutex should not be poisoned");
            if table.closed {
                return Err(Error::SessionClosed);
            }
            let id = table.next_id;
            table.next_id += 1;

            let request = Request::new(id, method, params);
            if self.inner.outbound.send(Message::from(request)).is_err() {
                return Err(Error::SessionClosed);
            }
            table.calls.insert(id, tx);
            trace!(id, method, "Sent request to host");
        }

        rx.await.map_err(|_| Error::SessionClosed)?
    }

    /// Sends a notification to the host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the writer has stopped.
    pub fn notify(&self, method: &str, params: Value) -> Result<()> {
        self.inner
            .outbound
            .send(Message::from(Request::notification(method, params)))
            .map_err(|_| Error::SessionClosed)
    }

    /// Returns the number of outbound calls still waiting for a response.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.inner
            .table
            .lock()
            .expect("call table mutex should not be poisoned")
            .calls
            .len()
    }

    fn respond(&self, response: Response) {
        if self.inner.outbound.send(Message::from(response)).is_err() {
            debug!("Writer stopped; dropping response");
        }
    }

    /// Resolves the pending call matching `response`. Returns `false` when
    /// nothing was waiting for it.
    fn complete(&self, response: Response) -> bool {
        let RequestId::Number(id) = response.id else {
            return false;
        };
        let completion = self
            .inner
            .table
            .lock()
            .expect("call table mutex should not be poisoned")
            .calls
            .remove(&id);
        let Some(completion) = completion else {
            return false;
        };

        let outcome = response.into_result().map_err(|error| Error::Host {
            code: error.code,
            message: error.message,
        });
        // The caller may have given up waiting.
        let _ = completion.send(outcome);
        true
    }

    /// Fails every pending call and refuses new ones.
    fn close(&self) {
        let calls = {
            let mut table = self
                .inner
                .table
                .lock()
                .expect("call table mutex should not be poisoned");
            table.closed = true;
            std::mem::take(&mut table.calls)
        };
        if !calls.is_empty() {
            debug!(count = calls.len(), "Failing pending calls");
        }
        for (_, completion) in calls {
            let _ = completion.send(Err(Error::SessionClosed));
        }
    }
}

/// A JSON-RPC session: inbound method table plus outbound client.
pub struct Session {
    client: HostClient,
    outbound: mpsc::UnboundedReceiver<Message>,
    handlers: HashMap<String, MethodHandler>,
    max_frame_bytes: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates a session with no registered methods.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            client: HostClient::new(tx),
            outbound: rx,
            handlers: HashMap::new(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Sets the largest accepted frame body.
    #[must_use]
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Returns a client for calling the host.
    #[must_use]
    pub fn client(&self) -> HostClient {
        self.client.clone()
    }

    /// Registers the handler for an inbound method, replacing any previous one.
    ///
    /// `handler` itself is invoked on the read loop in arrival order; only
    /// the future it returns is spawned. A handler error is answered with an
    /// internal error carrying its message.
    pub fn on_request<F, Fut>(&mut self, method: &str, handler: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let handler: MethodHandler =
            Arc::new(move |request: Request| -> MethodFuture { Box::pin(handler(request)) });
        self.handlers.insert(method.to_string(), handler);
    }

    /// Runs the session until `reader` reaches end of input.
    ///
    /// At end of input every pending outbound call is failed with
    /// [`Error::SessionClosed`], the handlers still running are awaited, and
    /// their replies are written out before this returns. A handler that
    /// never finishes therefore keeps the session open.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the transport fails.
    pub async fn run<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Self {
            client,
            outbound,
            handlers,
            max_frame_bytes,
        } = self;

        let drained = CancellationToken::new();
        let writer = tokio::spawn(write_loop(
            FrameWriter::new(writer),
            outbound,
            drained.clone(),
        ));

        let mut tasks = JoinSet::new();
        let mut reader = FrameReader::with_max_frame_bytes(reader, max_frame_bytes);
        let outcome = loop {
            while let Some(finished) = tasks.try_join_next() {
                log_join(finished);
            }
            match reader.read_message().await {
                Ok(Some(message)) => dispatch(&client, &handlers, &mut tasks, message),
                Ok(None) => break Ok(()),
                Err(e) => break Err(Error::from(e)),
            }
        };

        debug!(
            dropped_frames = reader.warnings().total(),
            running = tasks.len(),
            "Transport closed"
        );
        client.close();
        while let Some(finished) = tasks.join_next().await {
            log_join(finished);
        }

        drained.cancel();
        if let Err(e) = writer.await {
            error!("Writer task failed: {e}");
        }
        outcome
    }
}

/// Writes queued messages until `drained` fires and the queue is empty.
async fn write_loop<W>(
    mut writer: FrameWriter<W>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    drained: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let message = tokio::select! {
            biased;
            message = outbound.recv() => message,
            () = drained.cancelled() => outbound.try_recv().ok(),
        };
        let Some(message) = message else {
            break;
        };
        if let Err(e) = writer.send(&message).await {
            error!("Failed to write frame: {e}");
            break;
        }
    }
}

fn log_join(finished: std::result::Result<(), JoinError>) {
    if let Err(e) = finished {
        error!("Handler task failed: {e}");
    }
}

fn dispatch(
    client: &HostClient,
    handlers: &HashMap<String, MethodHandler>,
    tasks: &mut JoinSet<()>,
    message: Message,
) {
    match message {
        Message::Response(response) => {
            let id = response.id.clone();
            if !client.complete(response) {
                warn!(%id, "Dropping response with no pending request");
            }
        }
        Message::Request(request) => {
            let Some(handler) = handlers.get(&request.method) else {
                debug!(method = %request.method, "No handler registered");
                if let Some(id) = request.id {
                    client.respond(Response::result(id, Value::Null));
                }
                return;
            };

            let id = request.id.clone();
            let method = request.method.clone();
            let future = handler(request);
            let client = client.clone();
            tasks.spawn(async move {
                let outcome = future.await;
                match (id, outcome) {
                    (Some(id), Ok(value)) => client.respond(Response::result(id, value)),
                    (Some(id), Err(e)) => {
                        warn!(%method, "Handler failed: {e:#}");
                        client.respond(Response::internal_error(id, e.to_string()));
                    }
                    (None, Err(e)) => warn!(%method, "Notification handler failed: {e:#}"),
                    (None, Ok(_)) => {}
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unmatched_response_is_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = HostClient::new(tx);

        assert!(!client.complete(Response::result(RequestId::Number(9), json!(1))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn response_resolves_pending_call() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = HostClient::new(tx);

        let caller = client.clone();
        let call = tokio::spawn(async move { caller.send_request("IsMainWindowVisible", json!([])).await });

        let Some(Message::Request(request)) = rx.recv().await else {
            panic!("expected an outbound request");
        };
        assert_eq!(request.id, Some(RequestId::Number(0)));
        assert_eq!(client.pending_calls(), 1);

        assert!(client.complete(Response::result(RequestId::Number(0), json!(true))));
        assert_eq!(call.await.unwrap().unwrap(), json!(true));
        assert_eq!(client.pending_calls(), 0);
    }

    #[tokio::test]
    async fn error_response_fails_the_call() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = HostClient::new(tx);

        let caller = client.clone();
        let call = tokio::spawn(async move { caller.send_request("OpenUrl", json!(["x"])).await });
        rx.recv().await.unwrap();

        client.complete(Response::internal_error(RequestId::Number(0), "no browser"));
        match call.await.unwrap() {
            Err(Error::Host { code, message }) => {
                assert_eq!(code, flow_plugin_rpc::INTERNAL_ERROR);
                assert_eq!(message, "no browser");
            }
            other => panic!("expected a host error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_fails_pending_and_future_calls() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = HostClient::new(tx);

        let caller = client.clone();
        let call = tokio::spawn(async move { caller.send_request("ReQuery", json!([])).await });
        rx.recv().await.unwrap();

        client.close();
        assert!(matches!(call.await.unwrap(), Err(Error::SessionClosed)));
        assert!(matches!(
            client.send_request("ReQuery", json!([])).await,
            Err(Error::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn ids_increase_in_send_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = HostClient::new(tx);

        for _ in 0..3 {
            let caller = client.clone();
            tokio::spawn(async move { caller.send_request("LogInfo", json!([])).await });
        }

        let mut ids = Vec::new();
        for _ in 0..3 {
            if let Some(Message::Request(request)) = rx.recv().await {
                ids.push(request.id);
            }
        }
        assert_eq!(
            ids,
            vec![
                Some(RequestId::Number(0)),
                Some(RequestId::Number(1)),
                Some(RequestId::Number(2))
            ]
        );
    }
}
