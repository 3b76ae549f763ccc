//! Aquabridge IPC
//!
//! JSON-RPC 2.0 duplex transport over Unix sockets, with an optional
//! WebSocket transport behind the `websocket` feature. Both ends may push
//! notifications; the client keeps one persistent connection and correlates
//! responses by id.

pub mod client;
pub mod namespace;
pub mod protocol;
pub mod server;

#[cfg(feature = "websocket")]
pub mod ws;

pub use client::{IpcError, Result, RpcClient};
pub use namespace::NamespacedHandler;
pub use protocol::{event_to_notification, RpcError, RpcNotification, RpcRequest, RpcResponse};
pub use server::{IpcHandler, IpcServer, ServerBuilder};

#[cfg(feature = "websocket")]
pub use ws::WsAuth;

use std::path::PathBuf;

/// Default socket path for a service.
///
/// - Linux: `$XDG_RUNTIME_DIR/{service}.sock` or `/tmp/{service}.sock`
/// - other unix: `/tmp/{service}.sock`
pub fn default_socket_path(service: &str) -> String {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_RUNTIME_DIR")
            .map(|dir| format!("{}/{}.sock", dir, service))
            .unwrap_or_else(|_| format!("/tmp/{}.sock", service))
    }
    #[cfg(not(target_os = "linux"))]
    {
        format!("/tmp/{}.sock", service)
    }
}

pub fn default_socket_path_buf(service: &str) -> PathBuf {
    PathBuf::from(default_socket_path(service))
}
