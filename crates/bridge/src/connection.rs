//! Gateway connections
//!
//! [`Connection`] is the seam between a [`Peer`](crate::Peer) and whatever
//! carries particles into the network. [`RpcConnection`] speaks JSON-RPC to a
//! gateway over a Unix socket or a WebSocket:
//!
//! - request `particle.send` with the signed particle
//! - notification `particle.call_service` for each inbound service call
//! - request `particle.service_result` with the local answer

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use aquabridge_core::BridgeError;
use aquabridge_ipc::{IpcError, RpcClient, RpcNotification};
use aquabridge_network::{multiaddr_to_ws_url, Multiaddr, NetworkError};
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::particle::Particle;
use crate::service::{ServiceCall, ServiceCallResult};

pub const METHOD_SEND: &str = "particle.send";
pub const METHOD_CALL_SERVICE: &str = "particle.call_service";
pub const METHOD_SERVICE_RESULT: &str = "particle.service_result";

const INBOUND_CAPACITY: usize = 256;

pub trait Connection: Send + Sync + 'static {
    /// Open the transport. Inbound service calls arrive on the returned channel
    /// until the connection goes away.
    fn connect(&self) -> BoxFuture<'_, Result<mpsc::Receiver<ServiceCall>, BridgeError>>;

    fn disconnect(&self) -> BoxFuture<'_, ()>;

    fn send_particle(&self, particle: Particle) -> BoxFuture<'_, Result<(), BridgeError>>;

    fn send_service_result(
        &self,
        result: ServiceCallResult,
    ) -> BoxFuture<'_, Result<(), BridgeError>>;
}

/// Where the gateway listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    WebSocket(String),
}

impl Endpoint {
    /// WebSocket endpoint of a relay multiaddr.
    pub fn from_relay(addr: &Multiaddr) -> Result<Self, NetworkError> {
        multiaddr_to_ws_url(addr).map(Self::WebSocket)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::WebSocket(url) => f.write_str(url),
        }
    }
}

fn transport(e: IpcError) -> BridgeError {
    BridgeError::Transport(e.to_string())
}

/// [`Connection`] over the JSON-RPC duplex transport.
pub struct RpcConnection {
    endpoint: Endpoint,
    client: Mutex<Option<Arc<RpcClient>>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl RpcConnection {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            client: Mutex::new(None),
            forwarder: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn client(&self) -> Result<Arc<RpcClient>, BridgeError> {
        self.client
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(BridgeError::NotConnected)
    }

    async fn open(&self) -> Result<(RpcClient, mpsc::Receiver<RpcNotification>), IpcError> {
        match &self.endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => RpcClient::connect_unix(&path.to_string_lossy()).await,
            #[cfg(not(unix))]
            Endpoint::Unix(path) => Err(IpcError::Unreachable(path.display().to_string())),
            Endpoint::WebSocket(url) => RpcClient::connect_ws(url).await,
        }
    }

    async fn request(&self, method: &str, params: serde_json::Value) -> Result<(), BridgeError> {
        let client = self.client()?;
        client.request(method, Some(params)).await.map_err(transport)?;
        Ok(())
    }
}

/// Turn `particle.call_service` notifications into service calls.
async fn forward_calls(
    mut notifications: mpsc::Receiver<RpcNotification>,
    calls: mpsc::Sender<ServiceCall>,
) {
    while let Some(note) = notifications.recv().await {
        if note.method != METHOD_CALL_SERVICE {
            debug!("Ignoring notification {}", note.method);
            continue;
        }
        let params = note.params.unwrap_or_default();
        match serde_json::from_value::<ServiceCall>(params) {
            Ok(call) => {
                if calls.send(call).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Malformed service call: {}", e),
        }
    }
    debug!("Inbound call stream ended");
}

impl Connection for RpcConnection {
    fn connect(&self) -> BoxFuture<'_, Result<mpsc::Receiver<ServiceCall>, BridgeError>> {
        Box::pin(async move {
            let (client, notifications) = self.open().await.map_err(transport)?;
            let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
            let forwarder = tokio::spawn(forward_calls(notifications, tx));

            *self.client.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(client));
            if let Some(old) = self
                .forwarder
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .replace(forwarder)
            {
                old.abort();
            }
            info!("Connected to gateway at {}", self.endpoint);
            Ok(rx)
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Some(client) = self.client.lock().unwrap_or_else(|e| e.into_inner()).take() {
                client.close();
            }
            let forwarder = self.forwarder.lock().unwrap_or_else(|e| e.into_inner()).take();
            if let Some(forwarder) = forwarder {
                forwarder.abort();
            }
            info!("Disconnected from gateway at {}", self.endpoint);
        })
    }

    fn send_particle(&self, particle: Particle) -> BoxFuture<'_, Result<(), BridgeError>> {
        Box::pin(async move {
            debug!("Sending particle {} (ttl={} ms)", particle.id, particle.ttl);
            let params = serde_json::to_value(&particle)
                .map_err(|e| BridgeError::Serialization(e.to_string()))?;
            self.request(METHOD_SEND, params).await
        })
    }

    fn send_service_result(
        &self,
        result: ServiceCallResult,
    ) -> BoxFuture<'_, Result<(), BridgeError>> {
        Box::pin(async move {
            let params = serde_json::to_value(&result)
                .map_err(|e| BridgeError::Serialization(e.to_string()))?;
            self.request(METHOD_SERVICE_RESULT, params).await
        })
    }
}
