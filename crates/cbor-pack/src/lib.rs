//! Concise Binary Object Representation (CBOR) codec.
//!
//! - [`header`]: the initial byte and minimal-length argument grammar.
//! - [`Encoder`]: a `serde::Serializer` writing native values, plus lossless
//!   re-encoding of generic [`Value`]s.
//! - [`Decoder`]: parses definite-length items into [`Value`] trees.
//! - [`from_value`] and friends: projection of a [`Value`] into destination
//!   types with narrowing and structural checks.

mod config;
mod convert;
mod decoder;
mod encoder;
mod encoder_stable;
mod error;
mod float;
mod projection;
mod value;

pub mod constants;
pub mod header;

use std::io::Write;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use config::EncoderConfig;
pub use decoder::{Decoder, DEFAULT_MAX_DEPTH};
pub use encoder::{Compound, Encoder};
pub use encoder_stable::canonical_key_cmp;
pub use error::{ConvertError, DecodeError, EncodeError, Error, ProjectionError};
pub use float::{decode_f16, encode_f16, FloatWidth};
pub use projection::{
    from_value, project_into, project_into_slice, project_into_slot, project_into_vec,
};
pub use value::{Simple, Value};

/// Encodes `value` with `config`.
pub fn encode<T: Serialize + ?Sized>(
    value: &T,
    config: EncoderConfig,
) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    to_writer(&mut out, value, config)?;
    Ok(out)
}

/// Encodes `value` with the default configuration.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodeError> {
    encode(value, EncoderConfig::default())
}

pub fn to_writer<W: Write, T: Serialize + ?Sized>(
    writer: W,
    value: &T,
    config: EncoderConfig,
) -> Result<(), EncodeError> {
    Encoder::with_config(writer, config).encode(value)
}

/// Re-encodes a generic value, keeping tags, undefined and float widths.
pub fn encode_value(value: &Value, config: EncoderConfig) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = Encoder::with_config(Vec::new(), config);
    encoder.encode_value(value)?;
    Ok(encoder.into_inner())
}

/// Decodes the first item of `bytes` and reports how many bytes it used.
/// Anything after the item is ignored.
pub fn decode(bytes: &[u8]) -> Result<(Value, usize), DecodeError> {
    let mut decoder = Decoder::new(bytes);
    let value = decoder.decode()?;
    Ok((value, decoder.position()))
}

pub fn decode_value(bytes: &[u8]) -> Result<Value, DecodeError> {
    decode(bytes).map(|(value, _)| value)
}

/// Checks that the first item of `bytes` is exactly `expected` bytes long.
pub fn validate_exact_size(bytes: &[u8], expected: usize) -> Result<(), DecodeError> {
    let (_, actual) = decode(bytes)?;
    if actual != expected {
        return Err(DecodeError::SizeMismatch { expected, actual });
    }
    Ok(())
}

/// Decodes the first item of `bytes` and projects it into a fresh `T`.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    let value = decode_value(bytes)?;
    Ok(from_value(&value)?)
}

/// Decodes the first item of `bytes` and replaces `destination` with it.
///
/// Sequences that should be written into existing storage go through
/// [`decode_into_slice`] or [`decode_into_vec`] instead.
pub fn decode_into<T: DeserializeOwned>(bytes: &[u8], destination: &mut T) -> Result<(), Error> {
    let value = decode_value(bytes)?;
    project_into(&value, destination)?;
    Ok(())
}

/// Decodes an array into the front of a fixed-capacity destination.
pub fn decode_into_slice<T: DeserializeOwned>(
    bytes: &[u8],
    destination: &mut [T],
) -> Result<(), Error> {
    let value = decode_value(bytes)?;
    project_into_slice(&value, destination)?;
    Ok(())
}

/// Decodes an array into a growable destination, growing it if the array is
/// longer.
pub fn decode_into_vec<T: DeserializeOwned>(
    bytes: &[u8],
    destination: &mut Vec<T>,
) -> Result<(), Error> {
    let value = decode_value(bytes)?;
    project_into_vec(&value, destination)?;
    Ok(())
}
