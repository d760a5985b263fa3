//! IEEE 754 width classes and half-precision conversion.

use crate::constants::{FLOAT16, FLOAT32, FLOAT64};

/// The width a float was (or will be) encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    Half,
    Single,
    Double,
}

impl FloatWidth {
    pub(crate) fn info(self) -> u8 {
        match self {
            FloatWidth::Half => FLOAT16,
            FloatWidth::Single => FLOAT32,
            FloatWidth::Double => FLOAT64,
        }
    }
}

/// Widens IEEE 754 binary16 bits to `f64`. Exact for every input.
pub fn decode_f16(bits: u16) -> f64 {
    let negative = bits & 0x8000 != 0;
    let exponent = i32::from((bits >> 10) & 0x1f);
    let mantissa = f64::from(bits & 0x03ff);

    let magnitude = match exponent {
        0 => mantissa * 2f64.powi(-24),
        0x1f if mantissa == 0.0 => f64::INFINITY,
        0x1f => f64::NAN,
        _ => (mantissa + 1024.0) * 2f64.powi(exponent - 25),
    };
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Narrows `value` to binary16 bits when that loses nothing.
///
/// NaN collapses to the canonical quiet NaN; the sign of zeros and
/// infinities is kept.
pub fn encode_f16(value: f64) -> Option<u16> {
    let bits = value.to_bits();
    let sign = ((bits >> 48) & 0x8000) as u16;

    if value.is_nan() {
        return Some(0x7e00);
    }
    if value.is_infinite() {
        return Some(sign | 0x7c00);
    }
    if value == 0.0 {
        return Some(sign);
    }

    let exponent = ((bits >> 52) & 0x7ff) as i32 - 1023;
    let mantissa = bits & ((1u64 << 52) - 1);

    if exponent > 15 {
        return None;
    }
    if exponent >= -14 {
        // Normal half: only the top 10 mantissa bits may be set.
        if mantissa & ((1u64 << 42) - 1) != 0 {
            return None;
        }
        let biased = (exponent + 15) as u16;
        return Some(sign | (biased << 10) | (mantissa >> 42) as u16);
    }

    // Subnormal half: value = m * 2^-24 with m in 1..1024.
    let scaled = value.abs() * 2f64.powi(24);
    if scaled.fract() != 0.0 || !(1.0..1024.0).contains(&scaled) {
        return None;
    }
    Some(sign | scaled as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_half_values() {
        assert_eq!(decode_f16(0x0000), 0.0);
        assert!(decode_f16(0x8000).is_sign_negative());
        assert_eq!(decode_f16(0x3c00), 1.0);
        assert_eq!(decode_f16(0x3e00), 1.5);
        assert_eq!(decode_f16(0x7bff), 65504.0);
        assert_eq!(decode_f16(0xc400), -4.0);
        assert_eq!(decode_f16(0x0001), 2f64.powi(-24));
        assert_eq!(decode_f16(0x0400), 6.103515625e-5);
        assert_eq!(decode_f16(0x7c00), f64::INFINITY);
        assert_eq!(decode_f16(0xfc00), f64::NEG_INFINITY);
        assert!(decode_f16(0x7e00).is_nan());
    }

    #[test]
    fn narrowing_is_exact_or_refused() {
        assert_eq!(encode_f16(1.5), Some(0x3e00));
        assert_eq!(encode_f16(-4.0), Some(0xc400));
        assert_eq!(encode_f16(65504.0), Some(0x7bff));
        assert_eq!(encode_f16(2f64.powi(-24)), Some(0x0001));
        assert_eq!(encode_f16(-0.0), Some(0x8000));
        assert_eq!(encode_f16(f64::NEG_INFINITY), Some(0xfc00));
        assert_eq!(encode_f16(f64::NAN), Some(0x7e00));
        assert_eq!(encode_f16(0.1), None);
        assert_eq!(encode_f16(65536.0), None);
        assert_eq!(encode_f16(1e-10), None);
    }

    #[test]
    fn every_finite_half_round_trips() {
        for bits in 0u16..=u16::MAX {
            let value = decode_f16(bits);
            if value.is_nan() {
                continue;
            }
            assert_eq!(encode_f16(value), Some(bits), "bits {bits:#06x}");
        }
    }
}
