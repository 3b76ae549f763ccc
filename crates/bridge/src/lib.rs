//! Aquabridge
//!
//! Client-side bridge from typed Rust calls to Aqua scripts running on a
//! peer-to-peer network. A [`Peer`] holds the identity and one gateway
//! [`Connection`]; [`call_function`] submits a signed [`Particle`] and waits
//! for the script to report back through local services.
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use aquabridge::{generated::misc, CallConfig, PeerBuilder};
//! use aquabridge_network::Network;
//!
//! let peer = PeerBuilder::new("aquabridge").network(Network::Stage).build()?;
//! peer.start().await?;
//! let neighbors = misc::get_neighbors(&peer, "resource-id", CallConfig::default()).await?;
//! peer.stop().await;
//! # let _ = neighbors;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod call;
pub mod connection;
pub mod generated;
pub mod particle;
pub mod peer;
pub mod service;

pub use aquabridge_core::{BridgeError, CallConfig, CallDescriptor, Result};
pub use builder::{BridgeSettings, BuildError, PeerBuilder};
pub use call::{call_function, CallArg};
pub use connection::{Connection, Endpoint, RpcConnection};
pub use particle::Particle;
pub use peer::Peer;
pub use service::{service_fn, ServiceCall, ServiceCallResult, ServiceHandler, ServiceRegistry};
