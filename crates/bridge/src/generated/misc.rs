//! Bindings for `misc.aqua`.

use aquabridge_core::{
    ArrowType, BridgeError, CallConfig, CallDescriptor, ScalarType, TypeDescriptor,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::decode;
use crate::call::call_function;
use crate::peer::Peer;

pub const GET_RESOURCE_HELPER_SCRIPT: &str = include_str!("../../aqua/misc/getResourceHelper.air");
pub const APPEND_ERRORS_SCRIPT: &str = include_str!("../../aqua/misc/appendErrors.air");
pub const GET_NEIGHBORS_SCRIPT: &str = include_str!("../../aqua/misc/getNeighbors.air");
pub const WAIT_SCRIPT: &str = include_str!("../../aqua/misc/wait.air");

/// Registry resource record (`Key` in the registry service).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub label: String,
    pub owner_peer_id: String,
    pub timestamp_created: u64,
    pub challenge: Vec<u8>,
    pub challenge_type: String,
    pub signature: Vec<u8>,
}

fn bytes() -> TypeDescriptor {
    TypeDescriptor::array(TypeDescriptor::scalar(ScalarType::U8))
}

fn strings() -> TypeDescriptor {
    TypeDescriptor::array(TypeDescriptor::string())
}

fn resource_type() -> TypeDescriptor {
    TypeDescriptor::structure(
        "Key",
        [
            ("challenge", bytes()),
            ("label", TypeDescriptor::string()),
            ("signature", bytes()),
            ("id", TypeDescriptor::string()),
            ("owner_peer_id", TypeDescriptor::string()),
            ("challenge_type", TypeDescriptor::string()),
            ("timestamp_created", TypeDescriptor::scalar(ScalarType::U64)),
        ],
    )
}

pub static GET_RESOURCE_HELPER: Lazy<CallDescriptor> = Lazy::new(|| {
    CallDescriptor::new(
        "getResourceHelper",
        ArrowType::new()
            .arg("resource_id", TypeDescriptor::string())
            .returns(vec![TypeDescriptor::option(resource_type()), strings()]),
    )
});

pub static APPEND_ERRORS: Lazy<CallDescriptor> = Lazy::new(|| {
    CallDescriptor::new(
        "appendErrors",
        ArrowType::new().arg("error1", strings()).arg("error2", strings()),
    )
});

pub static GET_NEIGHBORS: Lazy<CallDescriptor> = Lazy::new(|| {
    CallDescriptor::new(
        "getNeighbors",
        ArrowType::new()
            .arg("resource_id", TypeDescriptor::string())
            .returns(vec![strings()]),
    )
});

pub static WAIT: Lazy<CallDescriptor> = Lazy::new(|| {
    CallDescriptor::new(
        "wait",
        ArrowType::new()
            .arg("successful", TypeDescriptor::array(TypeDescriptor::bool()))
            .arg("len", TypeDescriptor::scalar(ScalarType::I16))
            .arg("timeout", TypeDescriptor::scalar(ScalarType::U16))
            .returns(vec![TypeDescriptor::bool()]),
    )
});

/// Look a resource up on its neighbourhood. Returns the resource, if any
/// node had it, and the errors collected along the way.
pub async fn get_resource_helper(
    peer: &Peer,
    resource_id: &str,
    config: CallConfig,
) -> Result<(Option<Resource>, Vec<String>), BridgeError> {
    let value = call_function(
        peer,
        &GET_RESOURCE_HELPER,
        GET_RESOURCE_HELPER_SCRIPT,
        vec![json!(resource_id).into()],
        config,
    )
    .await?;
    decode(&GET_RESOURCE_HELPER, value)
}

pub async fn append_errors(
    peer: &Peer,
    error1: &[String],
    error2: &[String],
    config: CallConfig,
) -> Result<(), BridgeError> {
    call_function(
        peer,
        &APPEND_ERRORS,
        APPEND_ERRORS_SCRIPT,
        vec![json!(error1).into(), json!(error2).into()],
        config,
    )
    .await?;
    Ok(())
}

/// Peer ids of the Kademlia neighbourhood of `resource_id`.
pub async fn get_neighbors(
    peer: &Peer,
    resource_id: &str,
    config: CallConfig,
) -> Result<Vec<String>, BridgeError> {
    let value = call_function(
        peer,
        &GET_NEIGHBORS,
        GET_NEIGHBORS_SCRIPT,
        vec![json!(resource_id).into()],
        config,
    )
    .await?;
    decode(&GET_NEIGHBORS, value)
}

/// Wait until `len` entries of `successful` are set or `timeout` ms pass.
pub async fn wait(
    peer: &Peer,
    successful: &[bool],
    len: i16,
    timeout: u16,
    config: CallConfig,
) -> Result<bool, BridgeError> {
    let value = call_function(
        peer,
        &WAIT,
        WAIT_SCRIPT,
        vec![json!(successful).into(), json!(len).into(), json!(timeout).into()],
        config,
    )
    .await?;
    decode(&WAIT, value)
}
