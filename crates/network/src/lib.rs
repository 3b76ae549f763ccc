//! Aquabridge Network
//!
//! Static knowledge about the public peer-to-peer networks:
//! - Preset bootstrap relay lists per named network
//! - Multiaddr parsing (relay peer id, dial address)
//! - Websocket URL derivation for client connections

pub mod bootstrap;
pub mod error;
pub mod presets;

pub use bootstrap::{
    make_relay_addr, multiaddr_to_ws_url, parse_bootstrap_addr, parse_bootstrap_nodes, peer_id_of,
};
pub use error::NetworkError;
pub use presets::{Network, Node};

/// Re-export libp2p types used by callers of this crate
pub use libp2p::{Multiaddr, PeerId};
