//! Error taxonomy for encoding, decoding and projection.

use std::fmt::Display;
use std::io;

use serde::de::{Expected, Unexpected};
use thiserror::Error;

/// Failure while parsing a byte stream into a [`Value`](crate::Value).
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("unsupported additional info {info} for major type {major}")]
    UnsupportedAdditionalInfo { major: u8, info: u8 },
    #[error("negative integer -2^64 is not representable")]
    NegativeIntegerOverflow,
    #[error("nesting exceeds {limit} levels")]
    NestingTooDeep { limit: usize },
    #[error("invalid UTF-8 in text string")]
    InvalidUtf8,
    #[error("item is {actual} bytes long, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("i/o error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::UnexpectedEndOfInput
        } else {
            DecodeError::Io(err)
        }
    }
}

/// Failure while serializing a native value.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unsupported value type: {kind}")]
    UnsupportedValueType { kind: &'static str },
    #[error("map key of kind {kind} has no total order")]
    UnsortableKeyType { kind: &'static str },
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Custom(String),
}

impl serde::ser::Error for EncodeError {
    fn custom<T: Display>(msg: T) -> Self {
        EncodeError::Custom(msg.to_string())
    }
}

/// Failure while projecting a [`Value`](crate::Value) into a destination type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("field `{field}` not found in destination")]
    FieldNotFound { field: String },
    #[error("missing field `{field}`")]
    MissingField { field: &'static str },
    #[error("destination holds {capacity} elements but source has {actual}")]
    DestinationTooShort { capacity: usize, actual: usize },
    #[error("value {value} does not fit in {target}")]
    NarrowingOverflow { value: String, target: &'static str },
    #[error("destination is not addressable")]
    DestinationNotAddressable,
    #[error("{0}")]
    Custom(String),
}

impl serde::de::Error for ProjectionError {
    fn custom<T: Display>(msg: T) -> Self {
        ProjectionError::Custom(msg.to_string())
    }

    fn invalid_type(unexp: Unexpected<'_>, exp: &dyn Expected) -> Self {
        ProjectionError::TypeMismatch {
            expected: exp.to_string(),
            found: unexp.to_string(),
        }
    }

    fn unknown_field(field: &str, _expected: &'static [&'static str]) -> Self {
        ProjectionError::FieldNotFound {
            field: field.to_owned(),
        }
    }

    fn missing_field(field: &'static str) -> Self {
        ProjectionError::MissingField { field }
    }
}

/// Failure while bridging a [`Value`](crate::Value) to JSON.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("{0} has no JSON representation")]
    Unsupported(&'static str),
}

/// Umbrella error for entry points that both decode and project.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}
