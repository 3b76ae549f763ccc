//! Call descriptors
//!
//! A [`CallDescriptor`] is produced once per compiled function and never
//! mutated. It names the function, gives its signature, and lists the
//! well-known services the script uses to fetch arguments and report back.

use serde::{Deserialize, Serialize};

use crate::types::ArrowType;

/// Default time-to-live for a call, in milliseconds.
pub const DEFAULT_TTL_MS: u64 = 7000;

/// Well-known service and function names baked into compiled scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceNames {
    pub relay: String,
    pub get_data_srv: String,
    pub callback_srv: String,
    pub response_srv: String,
    pub response_fn_name: String,
    pub error_handling_srv: String,
    pub error_fn_name: String,
}

impl Default for ServiceNames {
    fn default() -> Self {
        Self {
            relay: "-relay-".to_string(),
            get_data_srv: "getDataSrv".to_string(),
            callback_srv: "callbackSrv".to_string(),
            response_srv: "callbackSrv".to_string(),
            response_fn_name: "response".to_string(),
            error_handling_srv: "errorHandlingSrv".to_string(),
            error_fn_name: "error".to_string(),
        }
    }
}

/// Immutable description of one compiled function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallDescriptor {
    pub function_name: String,
    #[serde(with = "tagged_arrow")]
    pub arrow: ArrowType,
    pub names: ServiceNames,
}

impl CallDescriptor {
    pub fn new(function_name: &str, arrow: ArrowType) -> Self {
        Self {
            function_name: function_name.to_string(),
            arrow,
            names: ServiceNames::default(),
        }
    }

    /// Number of positional arguments the function takes.
    pub fn arity(&self) -> usize {
        self.arrow.domain_fields().len()
    }
}

/// Serializes an [`ArrowType`] with its `"tag": "arrow"` marker, as the
/// compiler emits it inside descriptors.
mod tagged_arrow {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::types::{ArrowType, TypeDescriptor};

    pub fn serialize<S: Serializer>(arrow: &ArrowType, serializer: S) -> Result<S::Ok, S::Error> {
        TypeDescriptor::Arrow(arrow.clone()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ArrowType, D::Error> {
        match TypeDescriptor::deserialize(deserializer)? {
            TypeDescriptor::Arrow(arrow) => Ok(arrow),
            other => Err(D::Error::custom(format!(
                "expected arrow type, got {}",
                other.display_name()
            ))),
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallConfig {
    /// Time-to-live in milliseconds. Falls back to the peer default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

impl CallConfig {
    pub fn with_ttl(ttl_ms: u64) -> Self {
        Self { ttl: Some(ttl_ms) }
    }

    pub fn ttl_or(&self, default_ms: u64) -> u64 {
        self.ttl.unwrap_or(default_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDescriptor;

    #[test]
    fn test_default_names() {
        let names = ServiceNames::default();
        assert_eq!(names.relay, "-relay-");
        assert_eq!(names.response_srv, names.callback_srv);
        assert_eq!(names.error_fn_name, "error");
    }

    #[test]
    fn test_descriptor_serializes_in_compiler_shape() {
        let descriptor = CallDescriptor::new(
            "getNeighbors",
            ArrowType::new()
                .arg("resource_id", TypeDescriptor::string())
                .returns(vec![TypeDescriptor::array(TypeDescriptor::string())]),
        );
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["functionName"], "getNeighbors");
        assert_eq!(json["names"]["getDataSrv"], "getDataSrv");
        assert_eq!(json["names"]["responseFnName"], "response");
        assert_eq!(json["arrow"]["tag"], "arrow");
        assert_eq!(json["arrow"]["domain"]["tag"], "labeledProduct");
        assert_eq!(descriptor.arity(), 1);

        let parsed: CallDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn test_call_config_ttl() {
        assert_eq!(CallConfig::default().ttl_or(DEFAULT_TTL_MS), 7000);
        assert_eq!(CallConfig::with_ttl(20000).ttl_or(DEFAULT_TTL_MS), 20000);
    }
}
