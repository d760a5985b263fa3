//! [`Value`]: the self-describing tree every decoded item becomes.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::constants::{SIMPLE_FALSE, SIMPLE_NULL, SIMPLE_TRUE, SIMPLE_UNDEFINED};
use crate::float::FloatWidth;

/// Major type 7 values without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Simple {
    False,
    True,
    Null,
    Undefined,
}

impl Simple {
    pub(crate) fn info(self) -> u8 {
        match self {
            Simple::False => SIMPLE_FALSE,
            Simple::True => SIMPLE_TRUE,
            Simple::Null => SIMPLE_NULL,
            Simple::Undefined => SIMPLE_UNDEFINED,
        }
    }
}

/// A decoded CBOR item.
///
/// - `NegativeInt(n)` carries the magnitude form: its logical value is `-(n + 1)`.
/// - `Map` keeps wire order and may hold duplicate keys; uniqueness is the
///   producer's concern.
/// - `Float` remembers the width it was read with so it can be re-emitted
///   unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    UnsignedInt(u64),
    NegativeInt(u64),
    ByteString(Vec<u8>),
    TextString(String),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Tagged(u64, Box<Value>),
    Simple(Simple),
    Float { value: f64, width: FloatWidth },
}

impl Value {
    pub const NULL: Value = Value::Simple(Simple::Null);
    pub const UNDEFINED: Value = Value::Simple(Simple::Undefined);

    /// Builds an integer item from any value in `i64` range.
    pub fn integer(n: i64) -> Self {
        if n >= 0 {
            Value::UnsignedInt(n as u64)
        } else {
            Value::NegativeInt((-1 - n) as u64)
        }
    }

    pub fn tagged(tag: u64, value: Value) -> Self {
        Value::Tagged(tag, Box::new(value))
    }

    /// Human-readable name of the item's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::UnsignedInt(_) => "unsigned integer",
            Value::NegativeInt(_) => "negative integer",
            Value::ByteString(_) => "byte string",
            Value::TextString(_) => "text string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Tagged(..) => "tagged value",
            Value::Simple(Simple::False | Simple::True) => "boolean",
            Value::Simple(Simple::Null) => "null",
            Value::Simple(Simple::Undefined) => "undefined",
            Value::Float { .. } => "float",
        }
    }

    /// Strips any number of tag layers.
    pub fn untagged(&self) -> &Value {
        let mut value = self;
        while let Value::Tagged(_, inner) = value {
            value = inner;
        }
        value
    }

    /// The logical integer value, for either integer major type.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::UnsignedInt(n) => Some(i128::from(*n)),
            Value::NegativeInt(n) => Some(-1 - i128::from(*n)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Simple(Simple::True) => Some(true),
            Value::Simple(Simple::False) => Some(false),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::TextString(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::ByteString(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Null and undefined both count as absent.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Simple(Simple::Null | Simple::Undefined))
    }

    /// First entry of a map whose key is the text `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Simple(if b { Simple::True } else { Simple::False })
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UnsignedInt(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::integer(n)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float {
            value: f64::from(value),
            width: FloatWidth::Single,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float {
            value,
            width: FloatWidth::Double,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::TextString(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::TextString(s)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::ByteString(b.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

/// Serde rendering of a value. Tags are dropped (the payload is written) and
/// undefined becomes unit; use [`Encoder::encode_value`](crate::Encoder::encode_value)
/// for a lossless re-encode.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::UnsignedInt(n) => serializer.serialize_u64(*n),
            Value::NegativeInt(n) => match i64::try_from(*n) {
                Ok(n) => serializer.serialize_i64(-1 - n),
                Err(_) => serializer.serialize_i128(-1 - i128::from(*n)),
            },
            Value::ByteString(b) => serializer.serialize_bytes(b),
            Value::TextString(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Tagged(_, inner) => inner.serialize(serializer),
            Value::Simple(Simple::True) => serializer.serialize_bool(true),
            Value::Simple(Simple::False) => serializer.serialize_bool(false),
            Value::Simple(Simple::Null | Simple::Undefined) => serializer.serialize_unit(),
            Value::Float {
                value,
                width: FloatWidth::Double,
            } => serializer.serialize_f64(*value),
            Value::Float { value, .. } => serializer.serialize_f32(*value as f32),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any CBOR-representable value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::integer(v))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<Value, E> {
        if v >= 0 {
            return self.visit_u128(v as u128);
        }
        match u64::try_from(-1 - v) {
            Ok(n) if n != u64::MAX => Ok(Value::NegativeInt(n)),
            _ => Err(E::custom(format!("integer {v} is out of CBOR range"))),
        }
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::UnsignedInt(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Value, E> {
        u64::try_from(v)
            .map(Value::UnsignedInt)
            .map_err(|_| E::custom(format!("integer {v} is out of CBOR range")))
    }

    fn visit_f32<E: de::Error>(self, v: f32) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::TextString(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Value, E> {
        Ok(Value::ByteString(v))
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::NULL)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::NULL)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0).min(4096));
        while let Some(entry) = map.next_entry()? {
            entries.push(entry);
        }
        Ok(Value::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_magnitude_form() {
        assert_eq!(Value::integer(-1), Value::NegativeInt(0));
        assert_eq!(Value::integer(-1000), Value::NegativeInt(999));
        assert_eq!(Value::integer(i64::MIN).as_i128(), Some(i64::MIN as i128));
        assert_eq!(
            Value::NegativeInt(u64::MAX - 1).as_i128(),
            Some(-(u64::MAX as i128))
        );
    }

    #[test]
    fn kinds_and_accessors() {
        let map = Value::Map(vec![
            (Value::from("a"), Value::from(1u64)),
            (Value::from(2u64), Value::NULL),
        ]);
        assert_eq!(map.kind(), "map");
        assert_eq!(map.get("a"), Some(&Value::UnsignedInt(1)));
        assert_eq!(map.get("b"), None);
        assert_eq!(Value::from(true).kind(), "boolean");
        assert_eq!(Value::UNDEFINED.kind(), "undefined");
        assert!(Value::UNDEFINED.is_null());
        assert_eq!(Value::from(&b"ab"[..]).as_bytes(), Some(&b"ab"[..]));
    }

    #[test]
    fn untagged_strips_nested_tags() {
        let value = Value::tagged(1, Value::tagged(2, Value::from("x")));
        assert_eq!(value.kind(), "tagged value");
        assert_eq!(value.untagged(), &Value::from("x"));
    }

    #[test]
    fn value_bridges_through_serde_json() {
        let json = serde_json::json!({"a": [1, -2, 2.5, null, true], "b": "x"});
        let value: Value = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(value.get("b"), Some(&Value::from("x")));
        assert_eq!(
            value.get("a").and_then(Value::as_array).map(<[Value]>::len),
            Some(5)
        );
        assert_eq!(serde_json::to_value(&value).unwrap(), json);
    }
}
