//! Serializes native values (anything `serde::Serialize`) and
//! generic [`Value`] trees into a CBOR byte sink.
//!
//! Output is written incrementally; a failure inside a composite leaves the
//! sink holding a truncated item. Buffer externally when atomicity matters.

use std::io::Write;

use serde::ser::{self, Serialize};
use tracing::debug;

use crate::config::EncoderConfig;
use crate::constants::*;
use crate::encoder_stable::MapBuffer;
use crate::error::EncodeError;
use crate::float::{encode_f16, FloatWidth};
use crate::header;
use crate::value::{Simple, Value};

/// Writes CBOR items to one byte sink for its whole lifetime.
pub struct Encoder<W> {
    writer: W,
    config: EncoderConfig,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, EncoderConfig::default())
    }

    pub fn with_config(writer: W, config: EncoderConfig) -> Self {
        debug!(
            map_sort = config.map_sort,
            type_retention = config.type_retention,
            "cbor encoder configured"
        );
        if config.type_retention {
            debug!("type retention has no effect on output; integers use the shortest header");
        }
        Self::nested(writer, config)
    }

    /// Child encoder used for buffered sub-items; skips the config logging.
    pub(crate) fn nested(writer: W, config: EncoderConfig) -> Self {
        Self { writer, config }
    }

    pub fn config(&self) -> EncoderConfig {
        self.config
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Encodes one native value as one top-level item.
    pub fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        value.serialize(self)
    }

    /// Encodes a generic value losslessly: tags, undefined and float widths
    /// are written back exactly as held.
    pub fn encode_value(&mut self, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::UnsignedInt(n) => self.write_header(MAJOR_UNSIGNED, *n),
            Value::NegativeInt(n) => self.write_header(MAJOR_NEGATIVE, *n),
            Value::ByteString(bytes) => self.write_bytes(bytes),
            Value::TextString(text) => self.write_text(text),
            Value::Array(items) => {
                self.write_header(MAJOR_ARRAY, items.len() as u64)?;
                for item in items {
                    self.encode_value(item)?;
                }
                Ok(())
            }
            Value::Map(entries) if self.config.map_sort => {
                let mut buffer = MapBuffer::new(true);
                for (key, value) in entries {
                    buffer.push_key(self.value_to_vec(key)?)?;
                    buffer.push_value(self.value_to_vec(value)?)?;
                }
                buffer.finish(self)
            }
            Value::Map(entries) => {
                self.write_header(MAJOR_MAP, entries.len() as u64)?;
                for (key, value) in entries {
                    self.encode_value(key)?;
                    self.encode_value(value)?;
                }
                Ok(())
            }
            Value::Tagged(tag, inner) => {
                self.write_header(MAJOR_TAG, *tag)?;
                self.encode_value(inner)
            }
            Value::Simple(simple) => self.write_simple(*simple),
            Value::Float { value, width } => self.write_float(*value, *width),
        }
    }

    /// Writes a minimal header for `major` carrying `value`.
    pub fn write_header(&mut self, major: u8, value: u64) -> Result<(), EncodeError> {
        header::write_header(&mut self.writer, major, value)?;
        Ok(())
    }

    pub fn write_simple(&mut self, simple: Simple) -> Result<(), EncodeError> {
        self.write_raw(&[initial_byte(MAJOR_SIMPLE, simple.info())])
    }

    /// Writes `value` at `width`, widening when the requested width would
    /// lose information (a half that is not exact becomes single or double).
    pub fn write_float(&mut self, value: f64, width: FloatWidth) -> Result<(), EncodeError> {
        if width == FloatWidth::Half {
            if let Some(bits) = encode_f16(value) {
                return self.write_float_bits(FloatWidth::Half, &bits.to_be_bytes());
            }
        }
        if width != FloatWidth::Double && is_f32_roundtrip(value) {
            return self.write_float_bits(FloatWidth::Single, &(value as f32).to_be_bytes());
        }
        self.write_float_bits(FloatWidth::Double, &value.to_be_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.write_header(MAJOR_BYTES, bytes.len() as u64)?;
        self.write_raw(bytes)
    }

    pub fn write_text(&mut self, text: &str) -> Result<(), EncodeError> {
        self.write_header(MAJOR_TEXT, text.len() as u64)?;
        self.write_raw(text.as_bytes())
    }

    pub(crate) fn write_raw(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    fn write_float_bits(&mut self, width: FloatWidth, bits: &[u8]) -> Result<(), EncodeError> {
        self.write_raw(&[initial_byte(MAJOR_SIMPLE, width.info())])?;
        self.write_raw(bits)
    }

    fn write_i64(&mut self, v: i64) -> Result<(), EncodeError> {
        if v >= 0 {
            self.write_header(MAJOR_UNSIGNED, v as u64)
        } else {
            self.write_header(MAJOR_NEGATIVE, (-1 - v) as u64)
        }
    }

    /// 128-bit integers are accepted only inside the 64-bit argument range.
    fn write_i128(&mut self, v: i128) -> Result<(), EncodeError> {
        let unsupported = EncodeError::UnsupportedValueType { kind: "i128" };
        if v >= 0 {
            let n = u64::try_from(v).map_err(|_| unsupported)?;
            return self.write_header(MAJOR_UNSIGNED, n);
        }
        match u64::try_from(-1 - v) {
            // -2^64 would need an argument the decoder refuses.
            Ok(n) if n != u64::MAX => self.write_header(MAJOR_NEGATIVE, n),
            _ => Err(unsupported),
        }
    }

    fn to_vec<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        {
            let mut nested = Encoder::nested(&mut out, self.config);
            value.serialize(&mut nested)?;
        }
        Ok(out)
    }

    fn value_to_vec(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        Encoder::nested(&mut out, self.config).encode_value(value)?;
        Ok(out)
    }

    /// Known-length maps go straight to the sink unless they must be sorted.
    fn begin_map(&mut self, len: Option<usize>) -> Result<State, EncodeError> {
        match len {
            Some(len) if !self.config.map_sort => {
                self.write_header(MAJOR_MAP, len as u64)?;
                Ok(State::Direct)
            }
            _ => Ok(State::Map(MapBuffer::new(self.config.map_sort))),
        }
    }

    /// Opens the one-entry map that carries an enum variant with data.
    fn begin_variant(&mut self, variant: &str) -> Result<(), EncodeError> {
        self.write_header(MAJOR_MAP, 1)?;
        self.write_text(variant)
    }
}

/// In-progress composite returned by the compound `serialize_*` methods.
pub struct Compound<'a, W> {
    encoder: &'a mut Encoder<W>,
    state: State,
}

enum State {
    /// Header already written; members go straight to the sink.
    Direct,
    /// Unknown-length sequence: members are buffered until the count is known.
    Seq { items: Vec<u8>, count: u64 },
    Map(MapBuffer),
}

impl<'a, W: Write> Compound<'a, W> {
    fn new(encoder: &'a mut Encoder<W>, state: State) -> Self {
        Self { encoder, state }
    }

    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        match &mut self.state {
            State::Direct => value.serialize(&mut *self.encoder),
            State::Seq { items, count } => {
                let mut nested = Encoder::nested(items, self.encoder.config);
                value.serialize(&mut nested)?;
                *count += 1;
                Ok(())
            }
            State::Map(_) => Err(EncodeError::Custom(
                "sequence element serialized into a map".into(),
            )),
        }
    }

    fn key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), EncodeError> {
        match &mut self.state {
            State::Direct => key.serialize(&mut *self.encoder),
            State::Map(buffer) => buffer.push_key(self.encoder.to_vec(key)?),
            State::Seq { .. } => Err(EncodeError::Custom(
                "map key serialized into a sequence".into(),
            )),
        }
    }

    fn value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        match &mut self.state {
            State::Direct => value.serialize(&mut *self.encoder),
            State::Map(buffer) => buffer.push_value(self.encoder.to_vec(value)?),
            State::Seq { .. } => Err(EncodeError::Custom(
                "map value serialized into a sequence".into(),
            )),
        }
    }

    fn finish(self) -> Result<(), EncodeError> {
        match self.state {
            State::Direct => Ok(()),
            State::Seq { items, count } => {
                self.encoder.write_header(MAJOR_ARRAY, count)?;
                self.encoder.write_raw(&items)
            }
            State::Map(buffer) => buffer.finish(self.encoder),
        }
    }
}

impl<'a, W: Write> ser::Serializer for &'a mut Encoder<W> {
    type Ok = ();
    type Error = EncodeError;
    type SerializeSeq = Compound<'a, W>;
    type SerializeTuple = Compound<'a, W>;
    type SerializeTupleStruct = Compound<'a, W>;
    type SerializeTupleVariant = Compound<'a, W>;
    type SerializeMap = Compound<'a, W>;
    type SerializeStruct = Compound<'a, W>;
    type SerializeStructVariant = Compound<'a, W>;

    fn serialize_bool(self, v: bool) -> Result<(), EncodeError> {
        self.write_simple(if v { Simple::True } else { Simple::False })
    }

    fn serialize_i8(self, v: i8) -> Result<(), EncodeError> {
        self.write_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<(), EncodeError> {
        self.write_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<(), EncodeError> {
        self.write_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<(), EncodeError> {
        self.write_i64(v)
    }

    fn serialize_i128(self, v: i128) -> Result<(), EncodeError> {
        self.write_i128(v)
    }

    fn serialize_u8(self, v: u8) -> Result<(), EncodeError> {
        self.write_header(MAJOR_UNSIGNED, u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<(), EncodeError> {
        self.write_header(MAJOR_UNSIGNED, u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<(), EncodeError> {
        self.write_header(MAJOR_UNSIGNED, u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<(), EncodeError> {
        self.write_header(MAJOR_UNSIGNED, v)
    }

    fn serialize_u128(self, v: u128) -> Result<(), EncodeError> {
        let n = u64::try_from(v).map_err(|_| EncodeError::UnsupportedValueType { kind: "u128" })?;
        self.write_header(MAJOR_UNSIGNED, n)
    }

    fn serialize_f32(self, v: f32) -> Result<(), EncodeError> {
        self.write_float_bits(FloatWidth::Single, &v.to_be_bytes())
    }

    fn serialize_f64(self, v: f64) -> Result<(), EncodeError> {
        self.write_float_bits(FloatWidth::Double, &v.to_be_bytes())
    }

    fn serialize_char(self, v: char) -> Result<(), EncodeError> {
        let mut buf = [0u8; 4];
        self.write_text(v.encode_utf8(&mut buf))
    }

    fn serialize_str(self, v: &str) -> Result<(), EncodeError> {
        self.write_text(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<(), EncodeError> {
        self.write_bytes(v)
    }

    fn serialize_none(self) -> Result<(), EncodeError> {
        self.write_simple(Simple::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), EncodeError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), EncodeError> {
        self.write_simple(Simple::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), EncodeError> {
        self.write_simple(Simple::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<(), EncodeError> {
        self.write_text(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        self.begin_variant(variant)?;
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Compound<'a, W>, EncodeError> {
        let state = match len {
            Some(len) => {
                self.write_header(MAJOR_ARRAY, len as u64)?;
                State::Direct
            }
            None => State::Seq {
                items: Vec::new(),
                count: 0,
            },
        };
        Ok(Compound::new(self, state))
    }

    fn serialize_tuple(self, len: usize) -> Result<Compound<'a, W>, EncodeError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Compound<'a, W>, EncodeError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Compound<'a, W>, EncodeError> {
        self.begin_variant(variant)?;
        self.serialize_seq(Some(len))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Compound<'a, W>, EncodeError> {
        let state = self.begin_map(len)?;
        Ok(Compound::new(self, state))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Compound<'a, W>, EncodeError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Compound<'a, W>, EncodeError> {
        self.begin_variant(variant)?;
        self.serialize_map(Some(len))
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

impl<W: Write> ser::SerializeSeq for Compound<'_, W> {
    type Ok = ();
    type Error = EncodeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.element(value)
    }

    fn end(self) -> Result<(), EncodeError> {
        self.finish()
    }
}

impl<W: Write> ser::SerializeTuple for Compound<'_, W> {
    type Ok = ();
    type Error = EncodeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.element(value)
    }

    fn end(self) -> Result<(), EncodeError> {
        self.finish()
    }
}

impl<W: Write> ser::SerializeTupleStruct for Compound<'_, W> {
    type Ok = ();
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.element(value)
    }

    fn end(self) -> Result<(), EncodeError> {
        self.finish()
    }
}

impl<W: Write> ser::SerializeTupleVariant for Compound<'_, W> {
    type Ok = ();
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.element(value)
    }

    fn end(self) -> Result<(), EncodeError> {
        self.finish()
    }
}

impl<W: Write> ser::SerializeMap for Compound<'_, W> {
    type Ok = ();
    type Error = EncodeError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), EncodeError> {
        self.key(key)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.value(value)
    }

    fn end(self) -> Result<(), EncodeError> {
        self.finish()
    }
}

impl<W: Write> ser::SerializeStruct for Compound<'_, W> {
    type Ok = ();
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        self.key(key)?;
        self.value(value)
    }

    fn end(self) -> Result<(), EncodeError> {
        self.finish()
    }
}

impl<W: Write> ser::SerializeStructVariant for Compound<'_, W> {
    type Ok = ();
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        self.key(key)?;
        self.value(value)
    }

    fn end(self) -> Result<(), EncodeError> {
        self.finish()
    }
}
