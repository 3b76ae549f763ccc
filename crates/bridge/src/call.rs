//! Remote calls
//!
//! [`call_function`] turns one typed call into one particle. Arguments are
//! served back to the script through particle-scoped `getDataSrv` entries,
//! callbacks through `callbackSrv`, and the call resumes on whichever of
//! response, error, or TTL expiry comes first.

use std::sync::{Arc, Mutex};

use aquabridge_core::{
    from_wire, to_wire, ArrowType, BridgeError, CallConfig, CallDescriptor, TypeDescriptor,
    TypeMismatch,
};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::particle::Particle;
use crate::peer::Peer;
use crate::service::{service_fn, ServiceCall, ServiceHandler, ServiceRegistry};

/// One positional argument.
#[derive(Clone)]
pub enum CallArg {
    Value(Value),
    /// Local function the script may call back into.
    Callback(Arc<dyn ServiceHandler>),
}

impl CallArg {
    pub fn callback(handler: Arc<dyn ServiceHandler>) -> Self {
        Self::Callback(handler)
    }
}

impl From<Value> for CallArg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl std::fmt::Debug for CallArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Callback(_) => f.write_str("Callback"),
        }
    }
}

type Completion = Arc<Mutex<Option<oneshot::Sender<Result<Value, BridgeError>>>>>;

/// Resolve the call at most once.
fn complete(slot: &Completion, outcome: Result<Value, BridgeError>) {
    let sender = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
    match sender {
        Some(tx) => {
            let _ = tx.send(outcome);
        }
        None => debug!("Call already completed, dropping late outcome"),
    }
}

/// Removes a particle's scoped services when the call ends, however it ends.
struct ScopedServices<'a> {
    registry: &'a ServiceRegistry,
    particle_id: String,
}

impl<'a> ScopedServices<'a> {
    fn new(registry: &'a ServiceRegistry, particle_id: &str) -> Self {
        Self {
            registry,
            particle_id: particle_id.to_string(),
        }
    }

    fn register(&self, service_id: &str, fn_name: &str, handler: Arc<dyn ServiceHandler>) {
        self.registry
            .register_scoped(&self.particle_id, service_id, fn_name, handler);
    }
}

impl Drop for ScopedServices<'_> {
    fn drop(&mut self) {
        let removed = self.registry.remove_scoped(&self.particle_id);
        debug!("Removed {} services for particle {}", removed, self.particle_id);
    }
}

fn constant(value: Value) -> Arc<dyn ServiceHandler> {
    service_fn(move |_| {
        let value = value.clone();
        async move { Ok(value) }
    })
}

/// Wraps a user callback so it sees caller-shaped arguments and its result
/// goes back in wire shape.
struct ArrowCallback {
    arrow: ArrowType,
    inner: Arc<dyn ServiceHandler>,
}

impl ServiceHandler for ArrowCallback {
    fn call(
        &self,
        mut call: ServiceCall,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Value, String>> + Send + '_>> {
        Box::pin(async move {
            let fields = self.arrow.domain_fields();
            if fields.len() != call.args.len() {
                return Err(format!(
                    "expected {} argument(s), got {}",
                    fields.len(),
                    call.args.len()
                ));
            }
            call.args = call
                .args
                .iter()
                .zip(&fields)
                .map(|(v, (name, ty))| from_wire(v, ty, name))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?;

            let result = self.inner.call(call).await?;
            match self.arrow.codomain_items() {
                [] => Ok(Value::Null),
                [ty] => to_wire(&result, ty, "result").map_err(|e| e.to_string()),
                items => to_wire(
                    &result,
                    &TypeDescriptor::UnlabeledProduct { items: items.to_vec() },
                    "result",
                )
                .map_err(|e| e.to_string()),
            }
        })
    }
}

/// Wire values and wrapped callbacks, each keyed by argument name.
type Marshalled = (Vec<(String, Value)>, Vec<(String, Arc<dyn ServiceHandler>)>);

fn marshal_args(
    descriptor: &CallDescriptor,
    args: Vec<CallArg>,
) -> Result<Marshalled, BridgeError> {
    let function = &descriptor.function_name;
    let fields = descriptor.arrow.domain_fields();
    if args.len() != fields.len() {
        return Err(BridgeError::ArityMismatch {
            function: function.clone(),
            expected: fields.len(),
            got: args.len(),
        });
    }

    let mut values = Vec::new();
    let mut callbacks = Vec::new();
    for ((name, ty), arg) in fields.into_iter().zip(args) {
        match (ty, arg) {
            (TypeDescriptor::Arrow(arrow), CallArg::Callback(handler)) => {
                let wrapped: Arc<dyn ServiceHandler> = Arc::new(ArrowCallback {
                    arrow: arrow.clone(),
                    inner: handler,
                });
                callbacks.push((name.to_string(), wrapped));
            }
            (TypeDescriptor::Arrow(_), CallArg::Value(_)) => {
                return Err(BridgeError::CallbackExpected {
                    function: function.clone(),
                    argument: name.to_string(),
                })
            }
            (ty, CallArg::Value(value)) => {
                let wire =
                    to_wire(&value, ty, name).map_err(|mismatch| BridgeError::InvalidArgument {
                        function: function.clone(),
                        mismatch,
                    })?;
                values.push((name.to_string(), wire));
            }
            (ty, CallArg::Callback(_)) => {
                return Err(BridgeError::InvalidArgument {
                    function: function.clone(),
                    mismatch: TypeMismatch {
                        path: name.to_string(),
                        expected: ty.display_name(),
                        found: "callback".to_string(),
                    },
                })
            }
        }
    }
    Ok((values, callbacks))
}

/// Decode the response service's arguments against the codomain.
fn decode_response(descriptor: &CallDescriptor, args: &[Value]) -> Result<Value, BridgeError> {
    let malformed = |reason: String| BridgeError::MalformedResponse {
        function: descriptor.function_name.clone(),
        reason,
    };

    let items = descriptor.arrow.codomain_items();
    if items.is_empty() {
        return Ok(Value::Null);
    }
    if args.len() != items.len() {
        return Err(malformed(format!("expected {} value(s), got {}", items.len(), args.len())));
    }

    let decoded = args
        .iter()
        .zip(items)
        .enumerate()
        .map(|(i, (v, ty))| from_wire(v, ty, &format!("result[{}]", i)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| malformed(e.to_string()))?;

    Ok(match <[Value; 1]>::try_from(decoded) {
        Ok([single]) => single,
        Err(many) => Value::Array(many),
    })
}

/// Text of the error the script reported. `%last_error%` arrives as an
/// object with a `message` field.
fn remote_message(args: &[Value]) -> String {
    match args.first() {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(obj)) => match obj.get("message") {
            Some(Value::String(s)) => s.clone(),
            _ => Value::Object(obj.clone()).to_string(),
        },
        Some(other) => other.to_string(),
        None => "unknown error".to_string(),
    }
}

/// Execute `script` on the network and wait for its typed result.
pub async fn call_function(
    peer: &Peer,
    descriptor: &CallDescriptor,
    script: &str,
    args: Vec<CallArg>,
    config: CallConfig,
) -> Result<Value, BridgeError> {
    let (values, callbacks) = marshal_args(descriptor, args)?;

    if !peer.is_connected() {
        return Err(BridgeError::NotConnected);
    }

    let names = &descriptor.names;
    let ttl = config.ttl_or(peer.default_ttl_ms());
    let timed_out = || BridgeError::Timeout {
        function: descriptor.function_name.clone(),
        ttl_ms: ttl,
    };
    let relay = peer.relay_peer_id().to_string();

    let mut particle = Particle::new(script, ttl, peer.peer_id().to_string());
    // The call lives exactly as long as its particle.
    let deadline = Instant::now() + particle.remaining();
    particle.data.insert(names.relay.clone(), Value::String(relay.clone()));
    for (name, value) in &values {
        particle.data.insert(name.clone(), value.clone());
    }

    let scope = ScopedServices::new(peer.registry(), &particle.id);
    scope.register(&names.get_data_srv, &names.relay, constant(Value::String(relay)));
    for (name, value) in values {
        scope.register(&names.get_data_srv, &name, constant(value));
    }
    for (name, handler) in callbacks {
        scope.register(&names.callback_srv, &name, handler);
    }

    let (tx, rx) = oneshot::channel();
    let slot: Completion = Arc::new(Mutex::new(Some(tx)));

    let response_slot = slot.clone();
    let response_descriptor = descriptor.clone();
    scope.register(
        &names.response_srv,
        &names.response_fn_name,
        service_fn(move |call| {
            complete(&response_slot, decode_response(&response_descriptor, &call.args));
            async { Ok(Value::Null) }
        }),
    );

    let error_slot = slot.clone();
    let function = descriptor.function_name.clone();
    scope.register(
        &names.error_handling_srv,
        &names.error_fn_name,
        service_fn(move |call| {
            let message = remote_message(&call.args);
            warn!("{} failed remotely: {}", function, message);
            complete(
                &error_slot,
                Err(BridgeError::RemoteError {
                    function: function.clone(),
                    message,
                }),
            );
            async { Ok(Value::Null) }
        }),
    );

    particle
        .sign(peer.keypair())
        .map_err(|e| BridgeError::Serialization(format!("signing failed: {}", e)))?;
    debug!("{}: submitting particle {}", descriptor.function_name, particle.id);
    timeout_at(deadline, peer.connection().send_particle(particle))
        .await
        .map_err(|_| timed_out())??;

    // Void functions have no response call in their script.
    if matches!(descriptor.arrow.codomain.as_ref(), TypeDescriptor::Nil) {
        let mut rx = rx;
        return match rx.try_recv() {
            Ok(Err(e)) => Err(e),
            _ => Ok(Value::Null),
        };
    }

    match timeout_at(deadline, rx).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => Err(BridgeError::Transport("call abandoned".to_string())),
        Err(_) => Err(timed_out()),
    }
}
