//! Header codec: the initial byte (major type + additional info) and the
//! big-endian argument that may follow it.

use std::io::{self, Read, Write};

use crate::constants::*;
use crate::error::DecodeError;

/// A decoded initial byte. Not retained past the item that consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub major: u8,
    pub info: u8,
}

impl Header {
    #[inline]
    pub fn from_byte(byte: u8) -> Self {
        Self {
            major: byte >> 5,
            info: byte & MASK_INFO,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        initial_byte(self.major, self.info)
    }
}

/// An encoded header: initial byte plus up to eight argument bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderBytes {
    buf: [u8; 9],
    len: u8,
}

impl HeaderBytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }
}

impl AsRef<[u8]> for HeaderBytes {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Number of argument bytes the minimal encoding of `value` needs.
pub fn argument_len(value: u64) -> usize {
    match value {
        0..=MAX_INLINE => 0,
        24..=0xff => 1,
        0x100..=0xffff => 2,
        0x1_0000..=0xffff_ffff => 4,
        _ => 8,
    }
}

/// Encodes `major` with the shortest additional info that carries `value`.
pub fn encode_header(major: u8, value: u64) -> HeaderBytes {
    let mut buf = [0u8; 9];
    let len = match argument_len(value) {
        0 => {
            buf[0] = initial_byte(major, value as u8);
            1
        }
        1 => {
            buf[0] = initial_byte(major, INFO_U8);
            buf[1] = value as u8;
            2
        }
        2 => {
            buf[0] = initial_byte(major, INFO_U16);
            buf[1..3].copy_from_slice(&(value as u16).to_be_bytes());
            3
        }
        4 => {
            buf[0] = initial_byte(major, INFO_U32);
            buf[1..5].copy_from_slice(&(value as u32).to_be_bytes());
            5
        }
        _ => {
            buf[0] = initial_byte(major, INFO_U64);
            buf[1..9].copy_from_slice(&value.to_be_bytes());
            9
        }
    };
    HeaderBytes { buf, len }
}

/// Writes the minimal header for `major`/`value` to `writer`.
pub fn write_header<W: Write + ?Sized>(writer: &mut W, major: u8, value: u64) -> io::Result<()> {
    writer.write_all(encode_header(major, value).as_slice())
}

/// Reads exactly one initial byte.
pub fn read_header<R: Read + ?Sized>(reader: &mut R) -> Result<Header, DecodeError> {
    let [byte] = read_array::<1, R>(reader)?;
    Ok(Header::from_byte(byte))
}

/// Reads the argument announced by `header.info`.
///
/// Info values 28–31 are reserved (31 marks indefinite length) and fail with
/// [`DecodeError::UnsupportedAdditionalInfo`].
pub fn read_argument<R: Read + ?Sized>(reader: &mut R, header: Header) -> Result<u64, DecodeError> {
    match header.info {
        info if u64::from(info) <= MAX_INLINE => Ok(u64::from(info)),
        INFO_U8 => Ok(u64::from(read_array::<1, R>(reader)?[0])),
        INFO_U16 => Ok(u64::from(u16::from_be_bytes(read_array(reader)?))),
        INFO_U32 => Ok(u64::from(u32::from_be_bytes(read_array(reader)?))),
        INFO_U64 => Ok(u64::from_be_bytes(read_array(reader)?)),
        info => Err(DecodeError::UnsupportedAdditionalInfo {
            major: header.major,
            info,
        }),
    }
}

pub(crate) fn read_array<const N: usize, R: Read + ?Sized>(
    reader: &mut R,
) -> Result<[u8; N], DecodeError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_length_boundaries() {
        let cases: &[(u64, &[u8])] = &[
            (0, &[0x00]),
            (23, &[0x17]),
            (24, &[0x18, 0x18]),
            (255, &[0x18, 0xff]),
            (256, &[0x19, 0x01, 0x00]),
            (1000, &[0x19, 0x03, 0xe8]),
            (65_535, &[0x19, 0xff, 0xff]),
            (65_536, &[0x1a, 0x00, 0x01, 0x00, 0x00]),
            (u32::MAX as u64, &[0x1a, 0xff, 0xff, 0xff, 0xff]),
            (
                u32::MAX as u64 + 1,
                &[0x1b, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00],
            ),
            (
                u64::MAX,
                &[0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
            ),
        ];
        for (value, expected) in cases {
            assert_eq!(
                encode_header(MAJOR_UNSIGNED, *value).as_slice(),
                *expected,
                "value {value}"
            );
        }
    }

    #[test]
    fn major_type_lands_in_top_bits() {
        assert_eq!(encode_header(MAJOR_NEGATIVE, 999).as_slice(), &[0x39, 0x03, 0xe7]);
        assert_eq!(encode_header(MAJOR_MAP, 2).as_slice(), &[0xa2]);
        assert_eq!(encode_header(MAJOR_TAG, 24).as_slice(), &[0xd8, 0x18]);
    }

    #[test]
    fn header_round_trips_through_stream() {
        let mut out = Vec::new();
        write_header(&mut out, MAJOR_TEXT, 300).unwrap();
        let mut input = out.as_slice();
        let header = read_header(&mut input).unwrap();
        assert_eq!(header, Header { major: MAJOR_TEXT, info: INFO_U16 });
        assert_eq!(read_argument(&mut input, header).unwrap(), 300);
        assert!(input.is_empty());
    }

    #[test]
    fn empty_stream_has_no_header() {
        let mut input: &[u8] = &[];
        assert!(matches!(
            read_header(&mut input),
            Err(DecodeError::UnexpectedEndOfInput)
        ));
    }

    #[test]
    fn short_argument_is_truncation() {
        for bytes in [&[][..], &[0x03][..]] {
            let mut input = bytes;
            let header = Header::from_byte(0x19);
            assert!(matches!(
                read_argument(&mut input, header),
                Err(DecodeError::UnexpectedEndOfInput)
            ));
        }
    }

    #[test]
    fn reserved_info_is_rejected() {
        for info in 28..=31 {
            let mut input: &[u8] = &[0, 0, 0, 0, 0, 0, 0, 0];
            let header = Header { major: MAJOR_ARRAY, info };
            assert!(matches!(
                read_argument(&mut input, header),
                Err(DecodeError::UnsupportedAdditionalInfo { major: 4, info: i }) if i == info
            ));
        }
    }
}
