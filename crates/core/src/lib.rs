//! Aquabridge Core
//!
//! Types shared by every bridge crate: the tagged type descriptors emitted by
//! the Aqua compiler, call descriptors, per-call config, wire marshalling of
//! argument and result values, and the bridge error taxonomy.

pub mod descriptor;
pub mod error;
pub mod types;
pub mod wire;

pub use descriptor::{CallConfig, CallDescriptor, ServiceNames, DEFAULT_TTL_MS};
pub use error::{BridgeError, Result};
pub use types::{ArrowType, ScalarType, TypeDescriptor};
pub use wire::{from_wire, to_wire, TypeMismatch};
