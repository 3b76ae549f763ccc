use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),
    #[error("Invalid multiaddr '{addr}': {reason}")]
    InvalidMultiaddr { addr: String, reason: String },
    #[error("Multiaddr has no /p2p peer id: {0}")]
    MissingPeerId(String),
    #[error("Multiaddr is not a websocket address: {0}")]
    NotWebSocket(String),
    #[error("Relay index {index} out of range for {network} ({len} nodes)")]
    RelayIndexOutOfRange {
        network: String,
        index: usize,
        len: usize,
    },
}
