//! Peer lifecycle
//!
//! A [`Peer`] owns the local identity, the service registry, and one
//! [`Connection`]. Calls take `&Peer` explicitly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aquabridge_core::{BridgeError, DEFAULT_TTL_MS};
use aquabridge_network::PeerId;
use libp2p::identity::Keypair;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::service::{ServiceCall, ServiceHandler, ServiceRegistry};

pub struct Peer {
    keypair: Keypair,
    peer_id: PeerId,
    relay_peer_id: PeerId,
    default_ttl_ms: u64,
    connection: Arc<dyn Connection>,
    registry: Arc<ServiceRegistry>,
    connected: Arc<AtomicBool>,
    /// Serializes start/stop and holds the inbound dispatcher.
    lifecycle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("peer_id", &self.peer_id)
            .field("relay_peer_id", &self.relay_peer_id)
            .finish_non_exhaustive()
    }
}

impl Peer {
    pub fn new(keypair: Keypair, relay_peer_id: PeerId, connection: Arc<dyn Connection>) -> Self {
        let peer_id = keypair.public().to_peer_id();
        Self {
            keypair,
            peer_id,
            relay_peer_id,
            default_ttl_ms: DEFAULT_TTL_MS,
            connection,
            registry: Arc::new(ServiceRegistry::new()),
            connected: Arc::new(AtomicBool::new(false)),
            lifecycle: Mutex::new(None),
        }
    }

    pub fn with_default_ttl(mut self, ttl_ms: u64) -> Self {
        self.default_ttl_ms = ttl_ms;
        self
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn relay_peer_id(&self) -> PeerId {
        self.relay_peer_id
    }

    pub fn default_ttl_ms(&self) -> u64 {
        self.default_ttl_ms
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub(crate) fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub(crate) fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    /// Connect and start answering inbound service calls. No-op when
    /// already connected.
    pub async fn start(&self) -> Result<(), BridgeError> {
        let mut dispatcher = self.lifecycle.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let inbound = self.connection.connect().await?;
        self.connected.store(true, Ordering::SeqCst);
        *dispatcher = Some(tokio::spawn(dispatch_inbound(
            inbound,
            self.registry.clone(),
            self.connection.clone(),
            self.connected.clone(),
        )));

        info!("Peer {} connected via relay {}", self.peer_id, self.relay_peer_id);
        Ok(())
    }

    /// Disconnect. No-op when already stopped.
    pub async fn stop(&self) {
        let mut dispatcher = self.lifecycle.lock().await;
        if let Some(task) = dispatcher.take() {
            task.abort();
        }
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        self.connection.disconnect().await;
        info!("Peer {} disconnected", self.peer_id);
    }

    /// Register a peer-wide service function.
    pub fn register_service(
        &self,
        service_id: &str,
        fn_name: &str,
        handler: Arc<dyn ServiceHandler>,
    ) {
        self.registry.register(service_id, fn_name, handler);
    }

    pub fn remove_service(&self, service_id: &str, fn_name: &str) -> bool {
        self.registry.remove(service_id, fn_name)
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        if let Some(task) = self.lifecycle.get_mut().take() {
            task.abort();
        }
    }
}

async fn dispatch_inbound(
    mut inbound: mpsc::Receiver<ServiceCall>,
    registry: Arc<ServiceRegistry>,
    connection: Arc<dyn Connection>,
    connected: Arc<AtomicBool>,
) {
    while let Some(call) = inbound.recv().await {
        let registry = registry.clone();
        let connection = connection.clone();
        tokio::spawn(async move {
            let result = registry.dispatch(call).await;
            if let Err(e) = connection.send_service_result(result).await {
                warn!("Failed to send service result: {}", e);
            }
        });
    }
    debug!("Inbound dispatcher stopped");
    if connected.swap(false, Ordering::SeqCst) {
        warn!("Connection to gateway lost");
    }
}
