//! Projection of a decoded [`Value`] into caller-chosen destination types.
//!
//! The destination's shape drives the walk: `Projector` is a
//! `serde::Deserializer` over a borrowed value, so a derived struct hands in
//! its field names, a fixed array its capacity, and each scalar its width.
//! Conversion rules:
//!
//! - integers range-check against the destination width ([`ProjectionError::NarrowingOverflow`]);
//! - `f32` accepts only floats it can hold exactly, `f64` accepts any float;
//! - integers and floats never convert into each other, and text or booleans
//!   need an exact kind match ([`ProjectionError::TypeMismatch`]);
//! - every key of a map projected into a struct must name one of its fields;
//! - a fixed-capacity destination must hold every source element.
//!
//! [`project_into_slice`] and [`project_into_vec`] write a sequence into
//! existing storage index by index: a shorter source leaves the remaining
//! elements as they were, and a `Vec` grows only when the source is longer.
//!
//! Tags are transparent: the tagged payload is projected.

use std::slice;

use serde::de::value::SeqDeserializer;
use serde::de::{self, Deserialize, DeserializeOwned, DeserializeSeed, Visitor};
use tracing::trace;

use crate::constants::is_f32_roundtrip;
use crate::error::ProjectionError;
use crate::float::FloatWidth;
use crate::value::{Simple, Value};

/// Builds a fresh `T` from `value`. Strings and byte strings may be borrowed.
pub fn from_value<'de, T: Deserialize<'de>>(value: &'de Value) -> Result<T, ProjectionError> {
    trace!(
        kind = value.kind(),
        target = std::any::type_name::<T>(),
        "projecting value"
    );
    T::deserialize(Projector::new(value))
}

/// Overwrites `destination` with the projection of `value`. On failure the
/// destination is left untouched.
pub fn project_into<T: DeserializeOwned>(
    value: &Value,
    destination: &mut T,
) -> Result<(), ProjectionError> {
    *destination = from_value(value)?;
    Ok(())
}

/// Assigns the elements of an array (or byte string) source to the front of
/// `destination`. Fails with [`ProjectionError::DestinationTooShort`] when the
/// source has more elements than the slice holds. On failure the destination
/// is left untouched.
pub fn project_into_slice<T: DeserializeOwned>(
    value: &Value,
    destination: &mut [T],
) -> Result<(), ProjectionError> {
    let items = project_elements(value, Some(destination.len()))?;
    for (slot, item) in destination.iter_mut().zip(items) {
        *slot = item;
    }
    Ok(())
}

/// Like [`project_into_slice`], but a destination shorter than the source is
/// grown to the source length.
pub fn project_into_vec<T: DeserializeOwned>(
    value: &Value,
    destination: &mut Vec<T>,
) -> Result<(), ProjectionError> {
    let mut items = project_elements(value, None)?.into_iter();
    for (slot, item) in destination.iter_mut().zip(items.by_ref()) {
        *slot = item;
    }
    destination.extend(items);
    Ok(())
}

/// [`project_into`] for an optional slot; an empty slot cannot be written.
pub fn project_into_slot<T: DeserializeOwned>(
    value: &Value,
    slot: Option<&mut T>,
) -> Result<(), ProjectionError> {
    match slot {
        Some(destination) => project_into(value, destination),
        None => Err(ProjectionError::DestinationNotAddressable),
    }
}

#[derive(Clone, Copy)]
struct Projector<'de> {
    value: &'de Value,
}

impl<'de> Projector<'de> {
    fn new(value: &'de Value) -> Self {
        Self {
            value: value.untagged(),
        }
    }

    fn mismatch(&self, expected: &str) -> ProjectionError {
        ProjectionError::TypeMismatch {
            expected: expected.to_owned(),
            found: self.value.kind().to_owned(),
        }
    }

    fn integer<T: TryFrom<i128>>(&self, target: &'static str) -> Result<T, ProjectionError> {
        let n = self.value.as_i128().ok_or_else(|| self.mismatch(target))?;
        T::try_from(n).map_err(|_| ProjectionError::NarrowingOverflow {
            value: n.to_string(),
            target,
        })
    }
}

/// Visits `items` as a sequence; elements the visitor leaves unread mean the
/// destination was too small.
fn visit_array<'de, V: Visitor<'de>>(
    items: &'de [Value],
    visitor: V,
) -> Result<V::Value, ProjectionError> {
    let mut seq = SeqProjector { iter: items.iter() };
    let value = visitor.visit_seq(&mut seq)?;
    match seq.iter.len() {
        0 => Ok(value),
        remaining => Err(ProjectionError::DestinationTooShort {
            capacity: items.len() - remaining,
            actual: items.len(),
        }),
    }
}

fn visit_byte_seq<'de, V: Visitor<'de>>(
    bytes: &'de [u8],
    visitor: V,
) -> Result<V::Value, ProjectionError> {
    let mut seq = SeqDeserializer::<_, ProjectionError>::new(bytes.iter().copied());
    let value = visitor.visit_seq(&mut seq)?;
    seq.end()?;
    Ok(value)
}

/// Projects every element of a sequence source, after checking it fits in
/// `capacity` when one is given.
fn project_elements<T: DeserializeOwned>(
    value: &Value,
    capacity: Option<usize>,
) -> Result<Vec<T>, ProjectionError> {
    let projector = Projector::new(value);
    let widened: Vec<Value>;
    let items: &[Value] = match projector.value {
        Value::Array(items) => items,
        Value::ByteString(bytes) => {
            widened = bytes.iter().map(|&b| Value::from(u64::from(b))).collect();
            &widened
        }
        _ => return Err(projector.mismatch("array")),
    };
    if let Some(capacity) = capacity {
        check_capacity(capacity, items.len())?;
    }
    items.iter().map(from_value::<T>).collect()
}

fn check_capacity(capacity: usize, actual: usize) -> Result<(), ProjectionError> {
    if actual > capacity {
        return Err(ProjectionError::DestinationTooShort { capacity, actual });
    }
    Ok(())
}

/// Every key must be text and must name a destination field.
fn check_fields(
    entries: &[(Value, Value)],
    fields: &'static [&'static str],
) -> Result<(), ProjectionError> {
    for (key, _) in entries {
        match key.untagged() {
            Value::TextString(name) if fields.iter().any(|field| *field == name.as_str()) => {}
            Value::TextString(name) => {
                return Err(ProjectionError::FieldNotFound {
                    field: name.clone(),
                })
            }
            other => {
                return Err(ProjectionError::TypeMismatch {
                    expected: "text string key".to_owned(),
                    found: other.kind().to_owned(),
                })
            }
        }
    }
    Ok(())
}

macro_rules! project_integer {
    ($($method:ident => $visit:ident($ty:ty);)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProjectionError> {
                visitor.$visit(self.integer::<$ty>(stringify!($ty))?)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for Projector<'de> {
    type Error = ProjectionError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProjectionError> {
        match self.value {
            Value::UnsignedInt(n) => visitor.visit_u64(*n),
            Value::NegativeInt(n) => match i64::try_from(*n) {
                Ok(n) => visitor.visit_i64(-1 - n),
                Err(_) => visitor.visit_i128(-1 - i128::from(*n)),
            },
            Value::ByteString(bytes) => visitor.visit_borrowed_bytes(bytes),
            Value::TextString(text) => visitor.visit_borrowed_str(text),
            Value::Array(items) => visit_array(items, visitor),
            Value::Map(entries) => visitor.visit_map(MapProjector::new(entries)),
            Value::Tagged(_, inner) => Projector::new(inner).deserialize_any(visitor),
            Value::Simple(Simple::True) => visitor.visit_bool(true),
            Value::Simple(Simple::False) => visitor.visit_bool(false),
            Value::Simple(Simple::Null | Simple::Undefined) => visitor.visit_unit(),
            Value::Float {
                value,
                width: FloatWidth::Double,
            } => visitor.visit_f64(*value),
            Value::Float { value, .. } => visitor.visit_f32(*value as f32),
        }
    }

    project_integer! {
        deserialize_i8 => visit_i8(i8);
        deserialize_i16 => visit_i16(i16);
        deserialize_i32 => visit_i32(i32);
        deserialize_i64 => visit_i64(i64);
        deserialize_i128 => visit_i128(i128);
        deserialize_u8 => visit_u8(u8);
        deserialize_u16 => visit_u16(u16);
        deserialize_u32 => visit_u32(u32);
        deserialize_u64 => visit_u64(u64);
        deserialize_u128 => visit_u128(u128);
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProjectionError> {
        match self.value {
            Value::Float { value, .. } if is_f32_roundtrip(*value) => {
                visitor.visit_f32(*value as f32)
            }
            Value::Float { value, .. } => Err(ProjectionError::NarrowingOverflow {
                value: value.to_string(),
                target: "f32",
            }),
            _ => Err(self.mismatch("f32")),
        }
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProjectionError> {
        match self.value {
            Value::Float { value, .. } => visitor.visit_f64(*value),
            _ => Err(self.mismatch("f64")),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProjectionError> {
        match self.value.as_bool() {
            Some(b) => visitor.visit_bool(b),
            None => Err(self.mismatch("boolean")),
        }
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProjectionError> {
        if let Value::TextString(text) = self.value {
            let mut chars = text.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return visitor.visit_char(c);
            }
        }
        Err(self.mismatch("single-character text string"))
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProjectionError> {
        match self.value {
            Value::TextString(text) => visitor.visit_borrowed_str(text),
            _ => Err(self.mismatch("text string")),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProjectionError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProjectionError> {
        match self.value {
            Value::ByteString(bytes) => visitor.visit_borrowed_bytes(bytes),
            Value::Array(items) => visit_array(items, visitor),
            _ => Err(self.mismatch("byte string")),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, ProjectionError> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProjectionError> {
        match self.value {
            Value::Simple(Simple::Null | Simple::Undefined) => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProjectionError> {
        match self.value {
            Value::Simple(Simple::Null | Simple::Undefined) => visitor.visit_unit(),
            _ => Err(self.mismatch("null")),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ProjectionError> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ProjectionError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProjectionError> {
        match self.value {
            Value::Array(items) => visit_array(items, visitor),
            Value::ByteString(bytes) => visit_byte_seq(bytes, visitor),
            _ => Err(self.mismatch("array")),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, ProjectionError> {
        match self.value {
            Value::Array(items) => {
                check_capacity(len, items.len())?;
                visit_array(items, visitor)
            }
            Value::ByteString(bytes) => {
                check_capacity(len, bytes.len())?;
                visit_byte_seq(bytes, visitor)
            }
            _ => Err(self.mismatch("array")),
        }
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, ProjectionError> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProjectionError> {
        match self.value {
            Value::Map(entries) => visitor.visit_map(MapProjector::new(entries)),
            _ => Err(self.mismatch("map")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ProjectionError> {
        match self.value {
            Value::Map(entries) => {
                check_fields(entries, fields)?;
                visitor.visit_map(MapProjector::new(entries))
            }
            Value::Array(items) => visit_array(items, visitor),
            _ => Err(self.mismatch("map")),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ProjectionError> {
        match self.value {
            Value::TextString(_) => visitor.visit_enum(EnumProjector {
                variant: self.value,
                payload: None,
            }),
            Value::Map(entries) if entries.len() == 1 => {
                let (variant, payload) = &entries[0];
                visitor.visit_enum(EnumProjector {
                    variant,
                    payload: Some(payload),
                })
            }
            _ => Err(self.mismatch("text string or single-entry map")),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, ProjectionError> {
        self.deserialize_any(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, ProjectionError> {
        visitor.visit_unit()
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

struct SeqProjector<'de> {
    iter: slice::Iter<'de, Value>,
}

impl<'de> de::SeqAccess<'de> for SeqProjector<'de> {
    type Error = ProjectionError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, ProjectionError> {
        match self.iter.next() {
            Some(item) => seed.deserialize(Projector::new(item)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapProjector<'de> {
    iter: slice::Iter<'de, (Value, Value)>,
    pending: Option<&'de Value>,
}

impl<'de> MapProjector<'de> {
    fn new(entries: &'de [(Value, Value)]) -> Self {
        Self {
            iter: entries.iter(),
            pending: None,
        }
    }
}

impl<'de> de::MapAccess<'de> for MapProjector<'de> {
    type Error = ProjectionError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, ProjectionError> {
        match self.iter.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                seed.deserialize(Projector::new(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, ProjectionError> {
        let value = self
            .pending
            .take()
            .ok_or_else(|| ProjectionError::Custom("map value requested before its key".into()))?;
        seed.deserialize(Projector::new(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

/// A variant name, plus its payload when the variant carries data.
struct EnumProjector<'de> {
    variant: &'de Value,
    payload: Option<&'de Value>,
}

impl<'de> EnumProjector<'de> {
    fn payload(&self, expected: &str) -> Result<Projector<'de>, ProjectionError> {
        self.payload
            .map(Projector::new)
            .ok_or_else(|| ProjectionError::TypeMismatch {
                expected: expected.to_owned(),
                found: "unit variant".to_owned(),
            })
    }
}

impl<'de> de::EnumAccess<'de> for EnumProjector<'de> {
    type Error = ProjectionError;
    type Variant = Self;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Self), ProjectionError> {
        let variant = seed.deserialize(Projector::new(self.variant))?;
        Ok((variant, self))
    }
}

impl<'de> de::VariantAccess<'de> for EnumProjector<'de> {
    type Error = ProjectionError;

    fn unit_variant(self) -> Result<(), ProjectionError> {
        match self.payload {
            None => Ok(()),
            Some(payload) => <()>::deserialize(Projector::new(payload)),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(
        self,
        seed: T,
    ) -> Result<T::Value, ProjectionError> {
        seed.deserialize(self.payload("newtype variant")?)
    }

    fn tuple_variant<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, ProjectionError> {
        de::Deserializer::deserialize_tuple(self.payload("tuple variant")?, len, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ProjectionError> {
        de::Deserializer::deserialize_struct(
            self.payload("struct variant")?,
            "",
            fields,
            visitor,
        )
    }
}
