//! Duplex IPC client
//!
//! Holds one long-lived connection to a gateway. A writer task drains an
//! outbound queue and a reader task correlates responses to pending requests
//! by id. Notifications pushed by the server are forwarded on an mpsc
//! channel handed back from `connect_*`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::protocol::{classify, Incoming, RpcNotification, RpcRequest, RpcResponse};

const OUTBOUND_CAPACITY: usize = 64;
const NOTIFICATION_CAPACITY: usize = 256;

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Remote error: code={code}, message={message}")]
    Remote { code: i32, message: String },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IpcError>;

type Waiter = oneshot::Sender<RpcResponse>;

#[derive(Default)]
struct PendingState {
    waiters: HashMap<u64, Waiter>,
    closed: bool,
}

/// Requests awaiting a response, keyed by request id. Once failed, the map
/// stays closed and refuses new waiters.
#[derive(Clone, Default)]
struct Pending {
    inner: Arc<Mutex<PendingState>>,
}

impl Pending {
    fn lock(&self) -> std::sync::MutexGuard<'_, PendingState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a waiter. Returns false, dropping `tx`, if the connection
    /// has already failed.
    fn insert(&self, id: u64, tx: Waiter) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.waiters.insert(id, tx);
        true
    }

    fn take(&self, id: u64) -> Option<Waiter> {
        self.lock().waiters.remove(&id)
    }

    /// Drop every sender so that waiting requests observe a closed channel.
    fn fail_all(&self) {
        let mut state = self.lock();
        state.closed = true;
        let drained = state.waiters.drain().count();
        if drained > 0 {
            debug!("Failing {} pending IPC requests", drained);
        }
    }
}

/// Persistent JSON-RPC 2.0 client.
pub struct RpcClient {
    outbound: mpsc::Sender<String>,
    pending: Pending,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RpcClient {
    fn from_parts(
        outbound: mpsc::Sender<String>,
        pending: Pending,
        closed: Arc<AtomicBool>,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            outbound,
            pending,
            next_id: AtomicU64::new(1),
            closed,
            tasks: Mutex::new(tasks),
        }
    }

    /// Connect to a newline-delimited JSON-RPC server on a Unix socket.
    #[cfg(unix)]
    pub async fn connect_unix(
        socket_path: &str,
    ) -> Result<(Self, mpsc::Receiver<RpcNotification>)> {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        use tokio::net::UnixStream;

        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|e| IpcError::Unreachable(format!("{}: {}", socket_path, e)))?;
        let (reader, mut writer) = stream.into_split();

        let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
        let (note_tx, note_rx) = mpsc::channel(NOTIFICATION_CAPACITY);
        let pending = Pending::default();
        let closed = Arc::new(AtomicBool::new(false));

        let writer_task = tokio::spawn(async move {
            while let Some(line) = out_rx.recv().await {
                if writer.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        let reader_pending = pending.clone();
        let reader_closed = closed.clone();
        let reader_task = tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!("IPC server closed the connection");
                        break;
                    }
                    Ok(_) => {
                        let line = line.trim();
                        if !line.is_empty() {
                            dispatch(line, &reader_pending, &note_tx).await;
                        }
                    }
                    Err(e) => {
                        warn!("IPC read error: {}", e);
                        break;
                    }
                }
            }
            reader_closed.store(true, Ordering::SeqCst);
            reader_pending.fail_all();
        });

        debug!("IPC client connected to {}", socket_path);
        Ok((
            Self::from_parts(out_tx, pending, closed, vec![writer_task, reader_task]),
            note_rx,
        ))
    }

    /// Connect to a JSON-RPC server over WebSocket, one message per frame.
    #[cfg(feature = "websocket")]
    pub async fn connect_ws(url: &str) -> Result<(Self, mpsc::Receiver<RpcNotification>)> {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::Message;

        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| IpcError::Unreachable(format!("{}: {}", url, e)))?;
        let (mut sink, mut stream) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
        let (note_tx, note_rx) = mpsc::channel(NOTIFICATION_CAPACITY);
        let pending = Pending::default();
        let closed = Arc::new(AtomicBool::new(false));

        let writer_task = tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_pending = pending.clone();
        let reader_closed = closed.clone();
        let reader_task = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => dispatch(&text, &reader_pending, &note_tx).await,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("WebSocket read error: {}", e);
                        break;
                    }
                }
            }
            reader_closed.store(true, Ordering::SeqCst);
            reader_pending.fail_all();
        });

        debug!("IPC client connected to {}", url);
        Ok((
            Self::from_parts(out_tx, pending, closed, vec![writer_task, reader_task]),
            note_rx,
        ))
    }

    /// Send a request and wait for its result.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if self.is_closed() {
            return Err(IpcError::ConnectionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(method, params, id);
        let json = serde_json::to_string(&request)
            .map_err(|e| IpcError::InvalidResponse(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        if !self.pending.insert(id, tx) {
            return Err(IpcError::ConnectionClosed);
        }

        debug!("IPC request: {}", json);
        if self.outbound.send(json).await.is_err() {
            self.pending.take(id);
            return Err(IpcError::ConnectionClosed);
        }

        let response = rx.await.map_err(|_| IpcError::ConnectionClosed)?;

        if let Some(err) = response.error {
            return Err(IpcError::Remote {
                code: err.code,
                message: err.message,
            });
        }

        response
            .result
            .ok_or_else(|| IpcError::InvalidResponse("No result in response".to_string()))
    }

    /// Send a notification. No response is expected.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if self.is_closed() {
            return Err(IpcError::ConnectionClosed);
        }
        let json = serde_json::to_string(&RpcNotification::new(method, params))
            .map_err(|e| IpcError::InvalidResponse(e.to_string()))?;
        self.outbound
            .send(json)
            .await
            .map_err(|_| IpcError::ConnectionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tear the connection down. Pending requests fail with `ConnectionClosed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for task in tasks {
            task.abort();
        }
        self.pending.fail_all();
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.close();
    }
}

async fn dispatch(text: &str, pending: &Pending, notifications: &mpsc::Sender<RpcNotification>) {
    debug!("IPC message: {}", text);
    match classify(text) {
        Ok(Incoming::Response(response)) => match response.id.and_then(|id| pending.take(id)) {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => warn!("Dropping response with unknown id {:?}", response.id),
        },
        Ok(Incoming::Notification(notification)) => {
            if notifications.send(notification).await.is_err() {
                debug!("Notification receiver dropped");
            }
        }
        Ok(Incoming::Request(request)) => {
            warn!("Ignoring server-initiated request: {}", request.method);
        }
        Err(e) => warn!("Invalid JSON-RPC message: {}", e),
    }
}
