//! Bridging between [`Value`] trees and `serde_json` values.

use serde_json::{Map, Number, Value as Json};

use crate::error::ConvertError;
use crate::value::{Simple, Value};

impl Value {
    /// Renders the value as JSON. Byte strings become arrays of numbers,
    /// undefined becomes null and tags are dropped.
    pub fn to_json(&self) -> Result<Json, ConvertError> {
        Ok(match self {
            Value::UnsignedInt(n) => Json::Number(Number::from(*n)),
            Value::NegativeInt(n) => {
                let n = i64::try_from(*n)
                    .map_err(|_| ConvertError::Unsupported("negative integer below i64::MIN"))?;
                Json::Number(Number::from(-1 - n))
            }
            Value::ByteString(bytes) => Json::Array(
                bytes
                    .iter()
                    .map(|b| Json::Number(Number::from(*b)))
                    .collect(),
            ),
            Value::TextString(s) => Json::String(s.clone()),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.to_json()?);
                }
                Json::Array(out)
            }
            Value::Map(entries) => {
                let mut out = Map::new();
                for (k, v) in entries {
                    let key = match k.untagged() {
                        Value::TextString(s) => s.clone(),
                        _ => return Err(ConvertError::Unsupported("non-text map key")),
                    };
                    out.insert(key, v.to_json()?);
                }
                Json::Object(out)
            }
            Value::Tagged(_, inner) => inner.to_json()?,
            Value::Simple(Simple::True) => Json::Bool(true),
            Value::Simple(Simple::False) => Json::Bool(false),
            Value::Simple(Simple::Null | Simple::Undefined) => Json::Null,
            Value::Float { value, .. } => Number::from_f64(*value)
                .map(Json::Number)
                .ok_or(ConvertError::Unsupported("non-finite float"))?,
        })
    }

    /// Builds a value from JSON. Non-integral numbers become 64-bit floats.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::NULL,
            Json::Bool(b) => Value::from(*b),
            Json::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Value::UnsignedInt(u)
                } else if let Some(i) = n.as_i64() {
                    Value::integer(i)
                } else {
                    Value::from(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Value::TextString(s.clone()),
            Json::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (Value::TextString(k.clone()), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}
