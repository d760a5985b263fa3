//! Reads CBOR items from a byte source into generic [`Value`]s.
//!
//! Definite-length items only. Every item is read through a counting
//! wrapper, so [`Decoder::position`] always reports how many bytes the
//! decoder has consumed. Arrays, maps and tags nest at most
//! [`DEFAULT_MAX_DEPTH`] levels deep unless the limit is changed with
//! [`Decoder::with_max_depth`].

use std::io::{self, Read};
use std::iter::FusedIterator;

use tracing::trace;

use crate::constants::*;
use crate::error::DecodeError;
use crate::float::{decode_f16, FloatWidth};
use crate::header::{read_argument, read_array, read_header, Header};
use crate::value::{Simple, Value};

/// Upper bound on speculative preallocation driven by a length header.
const PREALLOC_LIMIT: usize = 4096;

/// Default bound on nested arrays, maps and tags.
pub const DEFAULT_MAX_DEPTH: usize = 512;

struct Counting<R> {
    inner: R,
    count: usize,
}

impl<R: Read> Read for Counting<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n;
        Ok(n)
    }
}

/// Reads one item per call from a byte source.
///
/// Also an [`Iterator`] over the items of a CBOR sequence; iteration stops
/// at a clean end of input or after the first error.
pub struct Decoder<R> {
    reader: Counting<R>,
    depth: usize,
    max_depth: usize,
    fused: bool,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Counting {
                inner: reader,
                count: 0,
            },
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            fused: false,
        }
    }

    /// Replaces the nesting bound. Items nested deeper fail with
    /// [`DecodeError::NestingTooDeep`].
    pub fn with_max_depth(mut self, limit: usize) -> Self {
        self.max_depth = limit;
        self
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.reader.count
    }

    pub fn get_ref(&self) -> &R {
        &self.reader.inner
    }

    pub fn into_inner(self) -> R {
        self.reader.inner
    }

    /// Reads exactly one item. Running out of input at any point, including
    /// before the first byte, is [`DecodeError::UnexpectedEndOfInput`].
    pub fn decode(&mut self) -> Result<Value, DecodeError> {
        self.depth = 0;
        self.read_value()
    }

    /// Like [`decode`](Self::decode), but a source that is already exhausted
    /// yields `Ok(None)` instead of an error.
    pub fn decode_next(&mut self) -> Result<Option<Value>, DecodeError> {
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        let start = self.reader.count - 1;
        self.depth = 0;
        let value = self.read_item(Header::from_byte(byte[0]))?;
        trace!(
            kind = value.kind(),
            start,
            end = self.reader.count,
            "decoded item"
        );
        Ok(Some(value))
    }

    fn read_value(&mut self) -> Result<Value, DecodeError> {
        let header = read_header(&mut self.reader)?;
        self.read_item(header)
    }

    fn read_item(&mut self, header: Header) -> Result<Value, DecodeError> {
        if header.major == MAJOR_SIMPLE {
            return self.read_simple(header);
        }
        let argument = read_argument(&mut self.reader, header)?;
        let nested = matches!(header.major, MAJOR_ARRAY | MAJOR_MAP | MAJOR_TAG);
        if nested {
            if self.depth == self.max_depth {
                return Err(DecodeError::NestingTooDeep {
                    limit: self.max_depth,
                });
            }
            self.depth += 1;
        }
        let value = match header.major {
            MAJOR_UNSIGNED => Value::UnsignedInt(argument),
            MAJOR_NEGATIVE if argument == u64::MAX => {
                return Err(DecodeError::NegativeIntegerOverflow)
            }
            MAJOR_NEGATIVE => Value::NegativeInt(argument),
            MAJOR_BYTES => Value::ByteString(self.read_payload(argument)?),
            MAJOR_TEXT => {
                let bytes = self.read_payload(argument)?;
                let text = String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
                Value::TextString(text)
            }
            MAJOR_ARRAY => {
                let len = length(argument)?;
                let mut items = Vec::with_capacity(len.min(PREALLOC_LIMIT));
                for _ in 0..len {
                    items.push(self.read_value()?);
                }
                Value::Array(items)
            }
            MAJOR_MAP => {
                let len = length(argument)?;
                let mut entries = Vec::with_capacity(len.min(PREALLOC_LIMIT));
                for _ in 0..len {
                    let key = self.read_value()?;
                    let value = self.read_value()?;
                    entries.push((key, value));
                }
                Value::Map(entries)
            }
            // MAJOR_TAG
            _ => Value::Tagged(argument, Box::new(self.read_value()?)),
        };
        if nested {
            self.depth -= 1;
        }
        Ok(value)
    }

    fn read_simple(&mut self, header: Header) -> Result<Value, DecodeError> {
        let value = match header.info {
            SIMPLE_FALSE => Value::Simple(Simple::False),
            SIMPLE_TRUE => Value::Simple(Simple::True),
            SIMPLE_NULL => Value::Simple(Simple::Null),
            SIMPLE_UNDEFINED => Value::Simple(Simple::Undefined),
            FLOAT16 => Value::Float {
                value: decode_f16(u16::from_be_bytes(read_array(&mut self.reader)?)),
                width: FloatWidth::Half,
            },
            FLOAT32 => Value::Float {
                value: f64::from(f32::from_be_bytes(read_array(&mut self.reader)?)),
                width: FloatWidth::Single,
            },
            FLOAT64 => Value::Float {
                value: f64::from_be_bytes(read_array(&mut self.reader)?),
                width: FloatWidth::Double,
            },
            info => {
                return Err(DecodeError::UnsupportedAdditionalInfo {
                    major: MAJOR_SIMPLE,
                    info,
                })
            }
        };
        Ok(value)
    }

    /// Reads a string payload in full, growing the buffer as bytes arrive
    /// rather than trusting the announced length up front.
    fn read_payload(&mut self, argument: u64) -> Result<Vec<u8>, DecodeError> {
        let len = length(argument)?;
        let mut buf = Vec::with_capacity(len.min(PREALLOC_LIMIT));
        self.reader.by_ref().take(argument).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(DecodeError::UnexpectedEndOfInput);
        }
        Ok(buf)
    }
}

/// A length that does not fit in memory cannot be backed by the input.
fn length(argument: u64) -> Result<usize, DecodeError> {
    usize::try_from(argument).map_err(|_| DecodeError::UnexpectedEndOfInput)
}

impl<R: Read> Iterator for Decoder<R> {
    type Item = Result<Value, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        match self.decode_next() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.fused = true;
                None
            }
            Err(err) => {
                self.fused = true;
                Some(Err(err))
            }
        }
    }
}

impl<R: Read> FusedIterator for Decoder<R> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(bytes: &[u8]) -> Result<Value, DecodeError> {
        Decoder::new(bytes).decode()
    }

    #[test]
    fn integers() {
        assert_eq!(dec(&[0x00]).unwrap(), Value::UnsignedInt(0));
        assert_eq!(dec(&[0x19, 0x03, 0xe8]).unwrap(), Value::UnsignedInt(1000));
        assert_eq!(dec(&[0x39, 0x03, 0xe7]).unwrap(), Value::NegativeInt(999));
        assert_eq!(dec(&[0x39, 0x03, 0xe7]).unwrap().as_i128(), Some(-1000));
        assert_eq!(
            dec(&[0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]).unwrap(),
            Value::UnsignedInt(u64::MAX)
        );
    }

    #[test]
    fn most_negative_integer_overflows() {
        let bytes = [0x3b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        assert!(matches!(dec(&bytes), Err(DecodeError::NegativeIntegerOverflow)));
        let bytes = [0x3b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe];
        assert_eq!(dec(&bytes).unwrap(), Value::NegativeInt(u64::MAX - 1));
    }

    #[test]
    fn strings() {
        assert_eq!(
            dec(&[0x44, 1, 2, 3, 4]).unwrap(),
            Value::ByteString(vec![1, 2, 3, 4])
        );
        assert_eq!(
            dec(&[0x64, b'I', b'E', b'T', b'F']).unwrap(),
            Value::TextString("IETF".into())
        );
        assert_eq!(dec(&[0x60]).unwrap(), Value::TextString(String::new()));
        assert!(matches!(dec(&[0x62, 0xc3, 0x28]), Err(DecodeError::InvalidUtf8)));
    }

    #[test]
    fn containers_and_tags() {
        assert_eq!(
            dec(&[0x83, 0x01, 0x82, 0x02, 0x03, 0x04]).unwrap(),
            Value::Array(vec![
                Value::UnsignedInt(1),
                Value::Array(vec![Value::UnsignedInt(2), Value::UnsignedInt(3)]),
                Value::UnsignedInt(4),
            ])
        );
        assert_eq!(
            dec(&[0xa1, 0x61, b'a', 0x20]).unwrap(),
            Value::Map(vec![(Value::from("a"), Value::NegativeInt(0))])
        );
        assert_eq!(
            dec(&[0xc1, 0x1a, 0x51, 0x4b, 0x67, 0xb0]).unwrap(),
            Value::tagged(1, Value::UnsignedInt(1_363_896_240))
        );
    }

    #[test]
    fn map_keys_may_be_any_kind() {
        let value = dec(&[0xa2, 0xf6, 0x01, 0x80, 0x02]).unwrap();
        assert_eq!(
            value,
            Value::Map(vec![
                (Value::NULL, Value::UnsignedInt(1)),
                (Value::Array(vec![]), Value::UnsignedInt(2)),
            ])
        );
    }

    #[test]
    fn simple_and_floats() {
        assert_eq!(dec(&[0xf4]).unwrap(), Value::from(false));
        assert_eq!(dec(&[0xf5]).unwrap(), Value::from(true));
        assert_eq!(dec(&[0xf6]).unwrap(), Value::NULL);
        assert_eq!(dec(&[0xf7]).unwrap(), Value::UNDEFINED);
        assert_eq!(
            dec(&[0xf9, 0x3e, 0x00]).unwrap(),
            Value::Float {
                value: 1.5,
                width: FloatWidth::Half
            }
        );
        assert_eq!(
            dec(&[0xfa, 0x47, 0xc3, 0x50, 0x00]).unwrap(),
            Value::Float {
                value: 100000.0,
                width: FloatWidth::Single
            }
        );
        let mut bytes = vec![0xfb];
        bytes.extend_from_slice(&1.1f64.to_be_bytes());
        assert_eq!(dec(&bytes).unwrap(), Value::from(1.1));
    }

    #[test]
    fn unassigned_simple_values_are_rejected() {
        for byte in [0xe0u8, 0xf0, 0xf3, 0xf8, 0xfc, 0xff] {
            assert!(
                matches!(
                    dec(&[byte, 0x00]),
                    Err(DecodeError::UnsupportedAdditionalInfo { major: 7, .. })
                ),
                "byte {byte:#04x}"
            );
        }
    }

    #[test]
    fn reserved_and_indefinite_lengths_are_rejected() {
        for byte in [0x1cu8, 0x3d, 0x5f, 0x7f, 0x9f, 0xbf] {
            assert!(
                matches!(
                    dec(&[byte, 0x00, 0xff]),
                    Err(DecodeError::UnsupportedAdditionalInfo { .. })
                ),
                "byte {byte:#04x}"
            );
        }
    }

    #[test]
    fn truncated_input() {
        let cases: &[&[u8]] = &[
            &[],
            &[0x19],
            &[0x19, 0x03],
            &[0x44, 1, 2],
            &[0x83, 0x01],
            &[0xa1, 0x01],
            &[0xc1],
            &[0xfa, 0x00, 0x00],
        ];
        for bytes in cases {
            assert!(
                matches!(dec(bytes), Err(DecodeError::UnexpectedEndOfInput)),
                "input {bytes:02x?}"
            );
        }
    }

    #[test]
    fn huge_announced_length_does_not_preallocate() {
        let bytes = [0x5b, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0xaa];
        assert!(matches!(dec(&bytes), Err(DecodeError::UnexpectedEndOfInput)));
        let bytes = [0x9b, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(dec(&bytes), Err(DecodeError::UnexpectedEndOfInput)));
    }

    #[test]
    fn position_tracks_consumed_bytes() {
        let mut decoder = Decoder::new(&[0x19, 0x03, 0xe8, 0x61, b'x', 0xff][..]);
        decoder.decode().unwrap();
        assert_eq!(decoder.position(), 3);
        decoder.decode().unwrap();
        assert_eq!(decoder.position(), 5);
        assert_eq!(decoder.into_inner(), &[0xff]);
    }

    #[test]
    fn decode_next_distinguishes_clean_end() {
        let mut decoder = Decoder::new(&[0x01][..]);
        assert_eq!(decoder.decode_next().unwrap(), Some(Value::UnsignedInt(1)));
        assert_eq!(decoder.decode_next().unwrap(), None);
        assert!(matches!(decoder.decode(), Err(DecodeError::UnexpectedEndOfInput)));
    }

    #[test]
    fn iterates_a_sequence() {
        let items: Vec<Value> = Decoder::new(&[0x01, 0x20, 0xf5][..])
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            items,
            vec![Value::UnsignedInt(1), Value::NegativeInt(0), Value::from(true)]
        );
    }

    #[test]
    fn iterator_stops_after_error() {
        let mut decoder = Decoder::new(&[0x01, 0x1c, 0x02][..]);
        assert!(matches!(decoder.next(), Some(Ok(_))));
        assert!(matches!(decoder.next(), Some(Err(_))));
        assert!(decoder.next().is_none());
        assert!(decoder.next().is_none());
    }

    #[test]
    fn deep_nesting() {
        let depth = 512;
        let mut bytes = vec![0x81; depth];
        bytes.push(0x00);
        let mut value = dec(&bytes).unwrap();
        for _ in 0..depth {
            value = match value {
                Value::Array(mut items) => items.remove(0),
                other => panic!("expected array, got {other:?}"),
            };
        }
        assert_eq!(value, Value::UnsignedInt(0));
    }

    #[test]
    fn nesting_beyond_the_limit_is_rejected() {
        let mut bytes = vec![0x81; 200_000];
        bytes.push(0x00);
        assert!(matches!(
            dec(&bytes),
            Err(DecodeError::NestingTooDeep { limit: DEFAULT_MAX_DEPTH })
        ));

        let mut bytes = vec![0x81; DEFAULT_MAX_DEPTH + 1];
        bytes.push(0x00);
        assert!(matches!(dec(&bytes), Err(DecodeError::NestingTooDeep { .. })));

        // Maps and tags count toward the same bound.
        let bytes = [0xa1, 0x00, 0xc1, 0x81, 0x00];
        assert!(matches!(
            Decoder::new(&bytes[..]).with_max_depth(2).decode(),
            Err(DecodeError::NestingTooDeep { limit: 2 })
        ));
        assert!(Decoder::new(&bytes[..]).with_max_depth(3).decode().is_ok());
    }

    #[test]
    fn depth_resets_between_items() {
        let bytes = [0x81, 0x81, 0x00, 0x81, 0x81, 0x00];
        let mut decoder = Decoder::new(&bytes[..]).with_max_depth(2);
        assert!(decoder.decode().is_ok());
        assert!(decoder.decode_next().unwrap().is_some());
        assert_eq!(decoder.position(), 6);

        let bytes = [0x81, 0x81, 0x81, 0x00, 0x81, 0x00];
        let mut decoder = Decoder::new(&bytes[..]).with_max_depth(2);
        assert!(decoder.next().unwrap().is_err());
        assert!(decoder.next().is_none());
    }

    #[test]
    fn decode_next_reports_position_after_each_item() {
        let mut decoder = Decoder::new(&[0x19, 0x03, 0xe8, 0x82, 0x01, 0x02][..]);
        assert_eq!(decoder.decode_next().unwrap(), Some(Value::UnsignedInt(1000)));
        assert_eq!(decoder.position(), 3);
        assert!(decoder.decode_next().unwrap().is_some());
        assert_eq!(decoder.position(), 6);
        assert_eq!(decoder.decode_next().unwrap(), None);
    }
}
