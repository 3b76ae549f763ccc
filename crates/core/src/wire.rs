//! Value marshalling between caller-facing JSON and the script wire format.
//!
//! The two shapes differ only for options: callers use `null` / `x`, scripts
//! see `[]` / `[x]`. Both directions type-check against the descriptor and
//! report the first mismatch with a path like `resource.challenge[3]`.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{ScalarType, TypeDescriptor};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}: expected {expected}, got {found}")]
pub struct TypeMismatch {
    pub path: String,
    pub expected: String,
    pub found: String,
}

static NULL_VALUE: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ToWire,
    FromWire,
}

/// Convert a caller value into its wire shape.
pub fn to_wire(value: &Value, ty: &TypeDescriptor, path: &str) -> Result<Value, TypeMismatch> {
    convert(value, ty, path, Direction::ToWire)
}

/// Convert a wire value back into its caller shape.
pub fn from_wire(value: &Value, ty: &TypeDescriptor, path: &str) -> Result<Value, TypeMismatch> {
    convert(value, ty, path, Direction::FromWire)
}

fn convert(
    value: &Value,
    ty: &TypeDescriptor,
    path: &str,
    dir: Direction,
) -> Result<Value, TypeMismatch> {
    match ty {
        TypeDescriptor::TopType | TypeDescriptor::BottomType => Ok(value.clone()),
        TypeDescriptor::Nil => match value {
            Value::Null => Ok(Value::Null),
            other => Err(mismatch(path, ty, other)),
        },
        TypeDescriptor::Scalar { name } => {
            if scalar_matches(value, *name) {
                Ok(value.clone())
            } else {
                Err(mismatch(path, ty, value))
            }
        }
        TypeDescriptor::Array { item } => {
            let items = value.as_array().ok_or_else(|| mismatch(path, ty, value))?;
            items
                .iter()
                .enumerate()
                .map(|(i, v)| convert(v, item, &format!("{}[{}]", path, i), dir))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        TypeDescriptor::Optional { item } => match dir {
            Direction::ToWire => match value {
                Value::Null => Ok(Value::Array(Vec::new())),
                v => Ok(Value::Array(vec![convert(v, item, path, dir)?])),
            },
            Direction::FromWire => match value.as_array().map(|a| a.as_slice()) {
                Some([]) => Ok(Value::Null),
                Some([v]) => convert(v, item, path, dir),
                _ => Err(mismatch(path, ty, value)),
            },
        },
        TypeDescriptor::Struct { fields, .. } | TypeDescriptor::LabeledProduct { fields } => {
            let object = value.as_object().ok_or_else(|| mismatch(path, ty, value))?;
            let mut out = Map::with_capacity(fields.len());
            for (name, field_ty) in fields {
                let field_path = format!("{}.{}", path, name);
                let field_value = match object.get(name) {
                    Some(v) => v,
                    // A missing optional field reads as absent.
                    None if matches!(field_ty, TypeDescriptor::Optional { .. })
                        && dir == Direction::ToWire =>
                    {
                        &NULL_VALUE
                    }
                    None => {
                        return Err(TypeMismatch {
                            path: field_path,
                            expected: field_ty.display_name(),
                            found: "missing field".to_string(),
                        })
                    }
                };
                out.insert(name.clone(), convert(field_value, field_ty, &field_path, dir)?);
            }
            Ok(Value::Object(out))
        }
        TypeDescriptor::UnlabeledProduct { items } => {
            let values = value.as_array().ok_or_else(|| mismatch(path, ty, value))?;
            if values.len() != items.len() {
                return Err(TypeMismatch {
                    path: path.to_string(),
                    expected: format!("{} items", items.len()),
                    found: format!("{} items", values.len()),
                });
            }
            values
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (v, t))| convert(v, t, &format!("{}[{}]", path, i), dir))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        TypeDescriptor::Arrow(_) => Err(TypeMismatch {
            path: path.to_string(),
            expected: "callback".to_string(),
            found: kind(value).to_string(),
        }),
    }
}

fn scalar_matches(value: &Value, scalar: ScalarType) -> bool {
    match scalar {
        ScalarType::Bool => value.is_boolean(),
        ScalarType::String => value.is_string(),
        ScalarType::F32 | ScalarType::F64 => value.is_number(),
        int => {
            let (min, max) = match int.int_bounds() {
                Some(bounds) => bounds,
                None => return false,
            };
            let n = match (value.as_i64(), value.as_u64()) {
                (Some(i), _) => i as i128,
                (None, Some(u)) => u as i128,
                _ => return false,
            };
            n >= min && n <= max
        }
    }
}

fn mismatch(path: &str, ty: &TypeDescriptor, found: &Value) -> TypeMismatch {
    TypeMismatch {
        path: path.to_string(),
        expected: ty.display_name(),
        found: kind(found).to_string(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource_type() -> TypeDescriptor {
        TypeDescriptor::structure(
            "Key",
            vec![
                ("id", TypeDescriptor::string()),
                ("challenge", TypeDescriptor::array(TypeDescriptor::scalar(ScalarType::U8))),
                ("timestamp_created", TypeDescriptor::scalar(ScalarType::U64)),
            ],
        )
    }

    #[test]
    fn test_option_to_wire() {
        let ty = TypeDescriptor::option(TypeDescriptor::string());
        assert_eq!(to_wire(&Value::Null, &ty, "x").unwrap(), json!([]));
        assert_eq!(to_wire(&json!("a"), &ty, "x").unwrap(), json!(["a"]));
    }

    #[test]
    fn test_option_from_wire() {
        let ty = TypeDescriptor::option(TypeDescriptor::string());
        assert_eq!(from_wire(&json!([]), &ty, "x").unwrap(), Value::Null);
        assert_eq!(from_wire(&json!(["a"]), &ty, "x").unwrap(), json!("a"));
        assert!(from_wire(&json!(["a", "b"]), &ty, "x").is_err());
        assert!(from_wire(&json!("a"), &ty, "x").is_err());
    }

    #[test]
    fn test_nested_option_struct() {
        let ty = TypeDescriptor::option(resource_type());
        let wire = json!([
            { "id": "r1", "challenge": [1, 2], "timestamp_created": 5, "extra": true }
        ]);
        let value = from_wire(&wire, &ty, "result").unwrap();
        assert_eq!(value, json!({ "id": "r1", "challenge": [1, 2], "timestamp_created": 5 }));
    }

    #[test]
    fn test_struct_missing_field() {
        let wire = json!({ "id": "r1", "challenge": [] });
        let err = from_wire(&wire, &resource_type(), "key").unwrap_err();
        assert_eq!(err.path, "key.timestamp_created");
        assert_eq!(err.found, "missing field");
    }

    #[test]
    fn test_integer_ranges() {
        let u8_ty = TypeDescriptor::scalar(ScalarType::U8);
        assert!(to_wire(&json!(255), &u8_ty, "b").is_ok());
        assert!(to_wire(&json!(256), &u8_ty, "b").is_err());
        assert!(to_wire(&json!(-1), &u8_ty, "b").is_err());

        let i16_ty = TypeDescriptor::scalar(ScalarType::I16);
        assert!(to_wire(&json!(-32768), &i16_ty, "n").is_ok());
        assert!(to_wire(&json!(1.5), &i16_ty, "n").is_err());

        let u64_ty = TypeDescriptor::scalar(ScalarType::U64);
        assert!(to_wire(&json!(u64::MAX), &u64_ty, "n").is_ok());
    }

    #[test]
    fn test_array_path_in_error() {
        let ty = TypeDescriptor::array(TypeDescriptor::bool());
        let err = to_wire(&json!([true, "no"]), &ty, "successful").unwrap_err();
        assert_eq!(err.path, "successful[1]");
        assert_eq!(err.expected, "bool");
        assert_eq!(err.found, "string");
    }

    #[test]
    fn test_unlabeled_product_length() {
        let ty = TypeDescriptor::UnlabeledProduct {
            items: vec![TypeDescriptor::bool(), TypeDescriptor::string()],
        };
        assert!(from_wire(&json!([true, "x"]), &ty, "r").is_ok());
        assert!(from_wire(&json!([true]), &ty, "r").is_err());
    }

    #[test]
    fn test_top_type_passes_anything() {
        let v = json!({ "any": [1, "two"] });
        assert_eq!(to_wire(&v, &TypeDescriptor::TopType, "t").unwrap(), v);
    }
}
