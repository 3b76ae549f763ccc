//! IPC server
//!
//! Newline-delimited JSON-RPC over a Unix socket, plus an optional WebSocket
//! transport. Requests go to an `IpcHandler`; anything sent on the event
//! channel reaches every connected client as a notification.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::namespace::NamespacedHandler;
use crate::protocol::{
    classify, event_to_notification, Incoming, RpcResponse, PARSE_ERROR, SERVER_ERROR,
};
#[cfg(feature = "websocket")]
use crate::ws::WsAuth;

const EVENT_CAPACITY: usize = 256;

/// Request handler shared by every transport.
pub trait IpcHandler: Send + Sync + 'static {
    fn handle(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send + '_>>;
}

/// Handle one inbound message. Returns the serialized response line, if the
/// message calls for one.
pub(crate) async fn respond(handler: &dyn IpcHandler, text: &str) -> Option<String> {
    let response = match classify(text) {
        Ok(Incoming::Request(req)) => {
            debug!("RPC: {} (id={})", req.method, req.id);
            match handler.handle(&req.method, req.params).await {
                Ok(result) => RpcResponse::success(req.id, result),
                Err(msg) => RpcResponse::error(Some(req.id), SERVER_ERROR, msg),
            }
        }
        Ok(Incoming::Notification(note)) => {
            if let Err(e) = handler.handle(&note.method, note.params).await {
                debug!("Notification {} failed: {}", note.method, e);
            }
            return None;
        }
        Ok(Incoming::Response(resp)) => {
            warn!("Ignoring unsolicited response (id={:?})", resp.id);
            return None;
        }
        Err(e) => {
            warn!("Invalid JSON-RPC: {}", e);
            RpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e))
        }
    };
    Some(serde_json::to_string(&response).unwrap_or_default())
}

/// Serve one line-framed connection until either side hangs up.
#[cfg(unix)]
async fn serve_lines(
    stream: tokio::net::UnixStream,
    handler: Arc<dyn IpcHandler>,
    mut events: broadcast::Receiver<String>,
) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let outgoing = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match respond(handler.as_ref(), line.trim()).await {
                    Some(reply) => reply,
                    None => continue,
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("IPC read error: {}", e);
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(notification) => notification,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("IPC client lagged, dropped {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        let mut frame = outgoing.into_bytes();
        frame.push(b'\n');
        if writer.write_all(&frame).await.is_err() {
            break;
        }
    }
    debug!("IPC client disconnected");
}

#[cfg(unix)]
async fn serve_unix(
    listener: tokio::net::UnixListener,
    handler: Arc<dyn IpcHandler>,
    events: broadcast::Sender<String>,
) -> std::io::Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                tokio::spawn(serve_lines(stream, handler.clone(), events.subscribe()));
            }
            Err(e) => error!("Failed to accept IPC connection: {}", e),
        }
    }
}

/// A configured server, ready to run. Removes its socket file when dropped.
pub struct IpcServer {
    socket_path: String,
    handler: Arc<dyn IpcHandler>,
    events: broadcast::Sender<String>,
    #[cfg(feature = "websocket")]
    websocket: Option<(u16, WsAuth)>,
}

impl IpcServer {
    /// A Unix-socket server with a single handler for every method.
    pub fn new(socket_path: &str, handler: Arc<dyn IpcHandler>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            socket_path: socket_path.to_string(),
            handler,
            events,
            #[cfg(feature = "websocket")]
            websocket: None,
        }
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    /// Sender for pre-serialized notifications.
    pub fn event_sender(&self) -> broadcast::Sender<String> {
        self.events.clone()
    }

    /// Push a notification to every connected client.
    pub fn send_event(&self, method: &str, params: Value) {
        let _ = self.events.send(event_to_notification(method, params));
    }

    /// Serve every configured transport until one of them fails.
    #[cfg(unix)]
    pub async fn run(self) -> std::io::Result<()> {
        // Stale socket from a previous run
        let _ = std::fs::remove_file(&self.socket_path);
        let listener = tokio::net::UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {}", self.socket_path);

        let unix = serve_unix(listener, self.handler.clone(), self.events.clone());

        #[cfg(feature = "websocket")]
        if let Some((port, auth)) = self.websocket.clone() {
            let ws =
                crate::ws::run_ws_server(port, self.handler.clone(), auth, self.events.clone());
            return tokio::select! {
                res = unix => res,
                res = ws => res,
            };
        }

        unix.await
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Builds an [`IpcServer`] with namespaced method routing.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use aquabridge_ipc::ServerBuilder;
/// # async fn example(gateway: Arc<dyn aquabridge_ipc::IpcHandler>) -> std::io::Result<()> {
/// ServerBuilder::new("/tmp/aquabridge.sock")
///     .namespace("particle", gateway)
///     .run()
///     .await
/// # }
/// ```
pub struct ServerBuilder {
    socket_path: String,
    routes: NamespacedHandler,
    events: broadcast::Sender<String>,
    #[cfg(feature = "websocket")]
    ws_port: Option<u16>,
    #[cfg(feature = "websocket")]
    ws_auth: WsAuth,
}

impl ServerBuilder {
    pub fn new(socket_path: &str) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            socket_path: socket_path.to_string(),
            routes: NamespacedHandler::new(),
            events,
            #[cfg(feature = "websocket")]
            ws_port: None,
            #[cfg(feature = "websocket")]
            ws_auth: WsAuth::default(),
        }
    }

    /// Also serve `ws://0.0.0.0:<port>/ws`.
    #[cfg(feature = "websocket")]
    pub fn with_websocket(mut self, port: u16) -> Self {
        self.ws_port = Some(port);
        self
    }

    /// Require `?key=<key>` on WebSocket connections.
    #[cfg(feature = "websocket")]
    pub fn with_api_key(mut self, key: String) -> Self {
        self.ws_auth.api_key = Some(key);
        self
    }

    /// Route `prefix.*` methods to `handler`.
    pub fn namespace(mut self, prefix: &str, handler: Arc<dyn IpcHandler>) -> Self {
        self.routes.add_namespace(prefix, handler);
        self
    }

    pub fn default_handler(mut self, handler: Arc<dyn IpcHandler>) -> Self {
        self.routes.set_default(handler);
        self
    }

    /// Events sent here reach every client on every transport.
    pub fn event_sender(&self) -> broadcast::Sender<String> {
        self.events.clone()
    }

    pub fn build(self) -> IpcServer {
        IpcServer {
            socket_path: self.socket_path,
            handler: Arc::new(self.routes),
            events: self.events,
            #[cfg(feature = "websocket")]
            websocket: self.ws_port.map(|port| (port, self.ws_auth)),
        }
    }

    #[cfg(unix)]
    pub async fn run(self) -> std::io::Result<()> {
        self.build().run().await
    }
}
#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl IpcHandler for Upper {
        fn handle(
            &self,
            method: &str,
            params: Option<Value>,
        ) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send + '_>> {
            let method = method.to_string();
            Box::pin(async move {
                match (method.as_str(), params) {
                    ("upper", Some(Value::String(s))) => Ok(Value::String(s.to_uppercase())),
                    _ => Err(format!("unsupported: {}", method)),
                }
            })
        }
    }

    #[tokio::test]
    async fn test_respond_success() {
        let line = r#"{"jsonrpc":"2.0","method":"upper","params":"abc","id":3}"#;
        let json = respond(&Upper, line).await.unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["result"], "ABC");
        assert_eq!(value["id"], 3);
    }

    #[tokio::test]
    async fn test_respond_handler_error() {
        let line = r#"{"jsonrpc":"2.0","method":"lower","id":4}"#;
        let json = respond(&Upper, line).await.unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["error"]["code"], SERVER_ERROR);
        assert_eq!(value["id"], 4);
    }

    #[tokio::test]
    async fn test_respond_parse_error_has_null_id() {
        let json = respond(&Upper, "{oops").await.unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["error"]["code"], PARSE_ERROR);
        assert!(value["id"].is_null());
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let line = r#"{"jsonrpc":"2.0","method":"upper","params":"x"}"#;
        assert!(respond(&Upper, line).await.is_none());
    }

    #[test]
    fn test_event_broadcast() {
        let server = IpcServer::new("/tmp/test-aquabridge-event.sock", Arc::new(Upper));
        let mut rx = server.event_sender().subscribe();

        server.send_event("particle.call_service", serde_json::json!({"call_id": 1}));

        let msg = rx.try_recv().unwrap();
        let value: Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(value["method"], "particle.call_service");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_builder_shares_event_channel() {
        let builder = ServerBuilder::new("/tmp/test-aquabridge-builder.sock")
            .default_handler(Arc::new(Upper));
        let mut rx = builder.event_sender().subscribe();
        let server = builder.build();
        assert_eq!(server.socket_path(), "/tmp/test-aquabridge-builder.sock");

        server.send_event("peer.ready", Value::Null);
        assert!(rx.try_recv().unwrap().contains("peer.ready"));
    }
}
