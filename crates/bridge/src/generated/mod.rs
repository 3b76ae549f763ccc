//! Typed wrappers for compiled Aqua modules.
//!
//! Each module pairs a static [`CallDescriptor`](aquabridge_core::CallDescriptor)
//! with the script compiled for it. Scripts live under `aqua/` and are
//! embedded at build time.

pub mod misc;

use aquabridge_core::{BridgeError, CallDescriptor};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Deserialize a decoded call result into its Rust type.
pub(crate) fn decode<T: DeserializeOwned>(
    descriptor: &CallDescriptor,
    value: Value,
) -> Result<T, BridgeError> {
    serde_json::from_value(value).map_err(|e| BridgeError::MalformedResponse {
        function: descriptor.function_name.clone(),
        reason: e.to_string(),
    })
}
