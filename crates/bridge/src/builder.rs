//! Peer construction
//!
//! Logging, identity, settings, and relay selection in one place, so a
//! binary gets a ready [`Peer`] from a handful of options.

use std::path::PathBuf;
use std::sync::Arc;

use aquabridge_core::DEFAULT_TTL_MS;
use aquabridge_keystore::KeystoreError;
use aquabridge_logging::LogLevel;
use aquabridge_network::{parse_bootstrap_addr, Network, NetworkError};
use aquabridge_settings::{Settings, SettingsError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::connection::{Endpoint, RpcConnection};
use crate::peer::Peer;

pub const DEFAULT_SERVICE: &str = "aquabridge";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Keystore error: {0}")]
    Keystore(#[from] KeystoreError),
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
}

/// Persistent bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Preset network used when no explicit relay is set.
    pub network: Network,
    /// Explicit relay multiaddr, overriding the preset.
    pub relay: Option<String>,
    /// Index into the preset network's relay list.
    pub relay_index: usize,
    pub default_ttl_ms: u64,
    /// Gateway socket. When unset, the relay's WebSocket endpoint is used.
    pub ipc_socket: Option<String>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            network: Network::Krasnodar,
            relay: None,
            relay_index: 0,
            default_ttl_ms: DEFAULT_TTL_MS,
            ipc_socket: None,
        }
    }
}

impl BridgeSettings {
    /// Relay multiaddr: the explicit one, else the preset node at `relay_index`.
    pub fn relay_multiaddr(&self) -> Result<String, NetworkError> {
        match &self.relay {
            Some(relay) => Ok(relay.clone()),
            None => Ok(self.network.relay(self.relay_index)?.multiaddr.to_string()),
        }
    }
}

pub struct PeerBuilder {
    service: String,
    log_level: LogLevel,
    skip_logging: bool,
    config_path: Option<PathBuf>,
    key_path: Option<PathBuf>,
    secret_key: Option<String>,
    network: Option<Network>,
    relay: Option<String>,
    relay_index: Option<usize>,
    endpoint: Option<Endpoint>,
    default_ttl_ms: Option<u64>,
}

impl Default for PeerBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

impl PeerBuilder {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            log_level: LogLevel::Info,
            skip_logging: false,
            config_path: None,
            key_path: None,
            secret_key: None,
            network: None,
            relay: None,
            relay_index: None,
            endpoint: None,
            default_ttl_ms: None,
        }
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.log_level = LogLevel::from_verbose(verbose);
        self
    }

    pub fn skip_logging(mut self) -> Self {
        self.skip_logging = true;
        self
    }

    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Use a fixed identity instead of the keystore file.
    pub fn secret_key_base64(mut self, secret: &str) -> Self {
        self.secret_key = Some(secret.to_string());
        self
    }

    pub fn network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }

    pub fn relay(mut self, multiaddr: &str) -> Self {
        self.relay = Some(multiaddr.to_string());
        self
    }

    pub fn relay_index(mut self, index: usize) -> Self {
        self.relay_index = Some(index);
        self
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn default_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.default_ttl_ms = Some(ttl_ms);
        self
    }

    /// Settings after builder overrides are applied.
    fn resolve_settings(&self) -> Result<BridgeSettings, BuildError> {
        let mut settings: Settings<BridgeSettings> =
            Settings::load_or_default(&self.service, self.config_path.as_deref())?;
        let config = &mut settings.config;
        if let Some(network) = self.network {
            config.network = network;
        }
        if let Some(relay) = &self.relay {
            config.relay = Some(relay.clone());
        }
        if let Some(index) = self.relay_index {
            config.relay_index = index;
        }
        if let Some(ttl) = self.default_ttl_ms {
            config.default_ttl_ms = ttl;
        }
        Ok(settings.config)
    }

    pub fn build(self) -> Result<Peer, BuildError> {
        if !self.skip_logging {
            let _ = aquabridge_logging::try_init(self.log_level);
        }

        let keypair = match &self.secret_key {
            Some(secret) => aquabridge_keystore::keypair_from_base64(secret)?,
            None => {
                let key_path = self
                    .key_path
                    .clone()
                    .unwrap_or_else(|| aquabridge_keystore::default_key_path_for(&self.service));
                aquabridge_keystore::load_or_generate_keypair(&key_path)?
            }
        };

        let settings = self.resolve_settings()?;
        let relay = settings.relay_multiaddr()?;
        let (relay_peer_id, relay_addr) = parse_bootstrap_addr(&relay)?;

        let endpoint = match (self.endpoint, &settings.ipc_socket) {
            (Some(endpoint), _) => endpoint,
            (None, Some(socket)) => Endpoint::Unix(PathBuf::from(socket)),
            (None, None) => Endpoint::from_relay(&relay_addr)?,
        };

        let peer = Peer::new(keypair, relay_peer_id, Arc::new(RpcConnection::new(endpoint.clone())))
            .with_default_ttl(settings.default_ttl_ms);

        info!(
            "{} {} peer {} via relay {} at {}",
            self.service,
            env!("CARGO_PKG_VERSION"),
            peer.peer_id(),
            relay_peer_id,
            endpoint,
        );
        Ok(peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquabridge_network::PeerId;

    const SECRET: &str = "Iz3HUmNIB78lkNNVmMkDKrju0nCivtkJNyObrFAr774=";

    fn builder(dir: &tempfile::TempDir) -> PeerBuilder {
        PeerBuilder::new("aquabridge-test")
            .skip_logging()
            .config_path(dir.path().join("settings.json"))
            .key_path(dir.path().join("peer.key"))
    }

    #[test]
    fn test_default_settings() {
        let settings = BridgeSettings::default();
        assert_eq!(settings.network, Network::Krasnodar);
        assert_eq!(settings.default_ttl_ms, 7000);
        assert_eq!(settings.relay_multiaddr().unwrap(), Network::Krasnodar.nodes()[0].multiaddr);
    }

    #[test]
    fn test_relay_index_out_of_range() {
        let settings = BridgeSettings {
            network: Network::Stage,
            relay_index: 99,
            ..Default::default()
        };
        assert!(matches!(
            settings.relay_multiaddr(),
            Err(NetworkError::RelayIndexOutOfRange { index: 99, .. })
        ));
    }

    #[test]
    fn test_partial_settings_file() {
        let settings: BridgeSettings =
            serde_json::from_str(r#"{"network":"testnet","relay_index":2}"#).unwrap();
        assert_eq!(settings.network, Network::Testnet);
        assert_eq!(settings.relay_index, 2);
        assert_eq!(settings.default_ttl_ms, DEFAULT_TTL_MS);
    }

    #[test]
    fn test_build_from_preset() {
        let dir = tempfile::tempdir().unwrap();
        let peer = builder(&dir)
            .network(Network::Stage)
            .relay_index(1)
            .default_ttl_ms(20_000)
            .build()
            .unwrap();

        let expected: PeerId = Network::Stage.nodes()[1].peer_id.parse().unwrap();
        assert_eq!(peer.relay_peer_id(), expected);
        assert_eq!(peer.default_ttl_ms(), 20_000);
        assert!(!peer.is_connected());
        assert!(dir.path().join("peer.key").exists());
    }

    #[test]
    fn test_identity_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let first = builder(&dir).build().unwrap().peer_id();
        let second = builder(&dir).build().unwrap().peer_id();
        assert_eq!(first, second);

        let fixed = builder(&dir).secret_key_base64(SECRET).build().unwrap().peer_id();
        let again = builder(&dir).secret_key_base64(SECRET).build().unwrap().peer_id();
        assert_eq!(fixed, again);
        assert_ne!(fixed, first);
    }

    #[test]
    fn test_relay_without_websocket_needs_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let relay = "/ip4/127.0.0.1/tcp/7777/p2p/12D3KooWDpJ7As7BWAwRMfu1VU2WCqNjvq387JEYKDBj4kx6nXTN";

        let err = builder(&dir).relay(relay).build().unwrap_err();
        assert!(matches!(err, BuildError::Network(NetworkError::NotWebSocket(_))));

        let peer = builder(&dir)
            .relay(relay)
            .endpoint(Endpoint::Unix(dir.path().join("gw.sock")))
            .build()
            .unwrap();
        assert_eq!(
            peer.relay_peer_id().to_string(),
            "12D3KooWDpJ7As7BWAwRMfu1VU2WCqNjvq387JEYKDBj4kx6nXTN"
        );
    }

    #[test]
    fn test_bad_secret() {
        let dir = tempfile::tempdir().unwrap();
        let err = builder(&dir).secret_key_base64("not base64!").build().unwrap_err();
        assert!(matches!(err, BuildError::Keystore(KeystoreError::InvalidFormat)));
    }
}
