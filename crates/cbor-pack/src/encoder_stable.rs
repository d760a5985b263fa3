//! Buffered map emission for deterministic (sorted) output.
//!
//! Entries are collected as pre-encoded `(key, value)` byte pairs, so the
//! entry count in the header always matches what is written and keys can be
//! ordered by their encoding.

use std::cmp::Ordering;
use std::io::Write;

use tracing::trace;

use crate::constants::*;
use crate::encoder::Encoder;
use crate::error::EncodeError;
use crate::header::Header;

/// Canonical key order: shorter encoding first, then bytewise.
///
/// ```
/// use std::cmp::Ordering;
/// use cbor_pack::canonical_key_cmp;
///
/// assert_eq!(canonical_key_cmp(&[0x61, 0x62], &[0x61, 0x61]), Ordering::Greater);
/// assert_eq!(canonical_key_cmp(&[0x0a], &[0x18, 0x18]), Ordering::Less);
/// ```
pub fn canonical_key_cmp(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Accepts keys of totally ordered kinds: integers, strings, booleans.
pub(crate) fn check_sortable_key(encoded: &[u8]) -> Result<(), EncodeError> {
    let Some(&first) = encoded.first() else {
        return Err(EncodeError::Custom("map key produced no bytes".into()));
    };
    let header = Header::from_byte(first);
    let kind = match header.major {
        MAJOR_UNSIGNED | MAJOR_NEGATIVE | MAJOR_BYTES | MAJOR_TEXT => return Ok(()),
        MAJOR_ARRAY => "array",
        MAJOR_MAP => "map",
        MAJOR_TAG => "tagged value",
        _ => match header.info {
            SIMPLE_FALSE | SIMPLE_TRUE => return Ok(()),
            SIMPLE_NULL => "null",
            SIMPLE_UNDEFINED => "undefined",
            FLOAT16 | FLOAT32 | FLOAT64 => "float",
            _ => "simple value",
        },
    };
    Err(EncodeError::UnsortableKeyType { kind })
}

pub(crate) struct MapBuffer {
    sorted: bool,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pending_key: Option<Vec<u8>>,
}

impl MapBuffer {
    pub fn new(sorted: bool) -> Self {
        Self {
            sorted,
            entries: Vec::new(),
            pending_key: None,
        }
    }

    pub fn push_key(&mut self, key: Vec<u8>) -> Result<(), EncodeError> {
        if self.sorted {
            check_sortable_key(&key)?;
        }
        self.pending_key = Some(key);
        Ok(())
    }

    pub fn push_value(&mut self, value: Vec<u8>) -> Result<(), EncodeError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| EncodeError::Custom("map value serialized before its key".into()))?;
        self.entries.push((key, value));
        Ok(())
    }

    pub fn finish<W: Write>(mut self, encoder: &mut Encoder<W>) -> Result<(), EncodeError> {
        if self.pending_key.is_some() {
            return Err(EncodeError::Custom("map key serialized without a value".into()));
        }
        if self.sorted {
            // Stable: equal keys keep insertion order.
            self.entries.sort_by(|a, b| canonical_key_cmp(&a.0, &b.0));
        }
        trace!(
            entries = self.entries.len(),
            sorted = self.sorted,
            "flushing buffered map"
        );
        encoder.write_header(MAJOR_MAP, self.entries.len() as u64)?;
        for (key, value) in &self.entries {
            encoder.write_raw(key)?;
            encoder.write_raw(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{encode, encode_value, EncoderConfig, Value};

    #[test]
    fn length_first_then_bytewise() {
        assert_eq!(canonical_key_cmp(b"a", b"b"), Ordering::Less);
        assert_eq!(canonical_key_cmp(b"aa", b"b"), Ordering::Greater);
        assert_eq!(canonical_key_cmp(b"", b""), Ordering::Equal);
    }

    #[test]
    fn sorted_map_orders_by_encoded_key() {
        let map: HashMap<&str, u32> = [("zebra", 1), ("apple", 2), ("banana", 3)]
            .into_iter()
            .collect();
        let bytes = encode(&map, EncoderConfig::CANONICAL).unwrap();
        let expected = [
            &[0xa3][..],
            &[0x65, b'a', b'p', b'p', b'l', b'e', 0x02],
            &[0x65, b'z', b'e', b'b', b'r', b'a', 0x01],
            &[0x66, b'b', b'a', b'n', b'a', b'n', b'a', 0x03],
        ]
        .concat();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn integer_keys_sort_before_longer_encodings() {
        let map: HashMap<i64, bool> = [(1000, true), (-1, false), (10, true)]
            .into_iter()
            .collect();
        let bytes = encode(&map, EncoderConfig::CANONICAL).unwrap();
        assert_eq!(
            bytes,
            vec![0xa3, 0x0a, 0xf5, 0x20, 0xf4, 0x19, 0x03, 0xe8, 0xf5]
        );
    }

    #[test]
    fn unsortable_keys_are_named() {
        let value = Value::Map(vec![(Value::from(1.5), Value::from(1u64))]);
        assert!(matches!(
            encode_value(&value, EncoderConfig::CANONICAL),
            Err(EncodeError::UnsortableKeyType { kind: "float" })
        ));

        let value = Value::Map(vec![(Value::Array(vec![]), Value::NULL)]);
        assert!(matches!(
            encode_value(&value, EncoderConfig::CANONICAL),
            Err(EncodeError::UnsortableKeyType { kind: "array" })
        ));

        let value = Value::Map(vec![(Value::NULL, Value::NULL)]);
        assert!(matches!(
            encode_value(&value, EncoderConfig::CANONICAL),
            Err(EncodeError::UnsortableKeyType { kind: "null" })
        ));
    }

    #[test]
    fn unsorted_config_accepts_any_key() {
        let value = Value::Map(vec![(Value::from(1.5), Value::NULL)]);
        assert_eq!(
            encode_value(&value, EncoderConfig::default()).unwrap(),
            vec![0xa1, 0xfb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0, 0xf6]
        );
    }
}
