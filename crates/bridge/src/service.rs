//! Local services
//!
//! Scripts running in the network call back into the local peer by service
//! id and function name. Peer-wide services live for the life of the peer;
//! particle-scoped services are registered for one call and shadow
//! peer-wide services with the same name while that particle is in flight.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub const RET_SUCCESS: u32 = 0;
pub const RET_ERROR: u32 = 1;

/// An inbound call from a running script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCall {
    pub particle_id: String,
    pub call_id: u64,
    pub service_id: String,
    pub fn_name: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Answer to a [`ServiceCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCallResult {
    pub particle_id: String,
    pub call_id: u64,
    pub ret_code: u32,
    pub result: Value,
}

impl ServiceCallResult {
    pub fn success(call: &ServiceCall, result: Value) -> Self {
        Self {
            particle_id: call.particle_id.clone(),
            call_id: call.call_id,
            ret_code: RET_SUCCESS,
            result,
        }
    }

    pub fn error(call: &ServiceCall, message: String) -> Self {
        Self {
            particle_id: call.particle_id.clone(),
            call_id: call.call_id,
            ret_code: RET_ERROR,
            result: Value::String(message),
        }
    }
}

/// Handler for one service function.
pub trait ServiceHandler: Send + Sync + 'static {
    fn call(
        &self,
        call: ServiceCall,
    ) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send + '_>>;
}

struct FnService<F>(F);

impl<F, Fut> ServiceHandler for FnService<F>
where
    F: Fn(ServiceCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, String>> + Send + 'static,
{
    fn call(
        &self,
        call: ServiceCall,
    ) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send + '_>> {
        Box::pin((self.0)(call))
    }
}

/// Adapt an async closure into a [`ServiceHandler`].
pub fn service_fn<F, Fut>(f: F) -> Arc<dyn ServiceHandler>
where
    F: Fn(ServiceCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, String>> + Send + 'static,
{
    Arc::new(FnService(f))
}

type PeerKey = (String, String);
type ScopedKey = (String, String, String);

#[derive(Default)]
pub struct ServiceRegistry {
    peer_wide: Mutex<HashMap<PeerKey, Arc<dyn ServiceHandler>>>,
    scoped: Mutex<HashMap<ScopedKey, Arc<dyn ServiceHandler>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, service_id: &str, fn_name: &str, handler: Arc<dyn ServiceHandler>) {
        debug!("Registering service {}.{}", service_id, fn_name);
        lock(&self.peer_wide).insert((service_id.to_string(), fn_name.to_string()), handler);
    }

    pub fn remove(&self, service_id: &str, fn_name: &str) -> bool {
        lock(&self.peer_wide)
            .remove(&(service_id.to_string(), fn_name.to_string()))
            .is_some()
    }

    pub fn register_scoped(
        &self,
        particle_id: &str,
        service_id: &str,
        fn_name: &str,
        handler: Arc<dyn ServiceHandler>,
    ) {
        lock(&self.scoped).insert(
            (particle_id.to_string(), service_id.to_string(), fn_name.to_string()),
            handler,
        );
    }

    /// Drop every service scoped to `particle_id`. Returns how many were removed.
    pub fn remove_scoped(&self, particle_id: &str) -> usize {
        let mut scoped = lock(&self.scoped);
        let before = scoped.len();
        scoped.retain(|(pid, _, _), _| pid != particle_id);
        before - scoped.len()
    }

    pub fn scoped_count(&self, particle_id: &str) -> usize {
        lock(&self.scoped)
            .keys()
            .filter(|(pid, _, _)| pid == particle_id)
            .count()
    }

    pub fn scoped_len(&self) -> usize {
        lock(&self.scoped).len()
    }

    fn lookup(&self, call: &ServiceCall) -> Option<Arc<dyn ServiceHandler>> {
        let scoped_key = (
            call.particle_id.clone(),
            call.service_id.clone(),
            call.fn_name.clone(),
        );
        if let Some(handler) = lock(&self.scoped).get(&scoped_key) {
            return Some(handler.clone());
        }
        lock(&self.peer_wide)
            .get(&(call.service_id.clone(), call.fn_name.clone()))
            .cloned()
    }

    /// Route a call to its handler and build the reply.
    pub async fn dispatch(&self, call: ServiceCall) -> ServiceCallResult {
        let handler = match self.lookup(&call) {
            Some(handler) => handler,
            None => {
                let args = serde_json::to_string(&call.args).unwrap_or_default();
                warn!("No service for {}.{}", call.service_id, call.fn_name);
                return ServiceCallResult::error(
                    &call,
                    format!(
                        "No service found for service call: serviceId='{}', fnName='{}' args='{}'",
                        call.service_id, call.fn_name, args
                    ),
                );
            }
        };

        debug!(
            "Service call {}.{} (particle={}, call={})",
            call.service_id, call.fn_name, call.particle_id, call.call_id
        );
        match handler.call(call.clone()).await {
            Ok(result) => ServiceCallResult::success(&call, result),
            Err(message) => ServiceCallResult::error(&call, message),
        }
    }
}
