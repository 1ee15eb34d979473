//! Decoding of the PostgreSQL NUMERIC binary format.

use std::fmt::Write;

use crate::error::{Error, Result};

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Converts PostgreSQL NUMERIC binary encoding to its exact decimal text.
///
/// Binary format:
/// - 2 bytes: ndigits (number of base-10000 digits)
/// - 2 bytes: weight (power of 10000 of the first digit)
/// - 2 bytes: sign (0x0000=positive, 0x4000=negative, 0xC000=NaN, 0xD000=+Inf, 0xF000=-Inf)
/// - 2 bytes: dscale (digits after the decimal point)
/// - ndigits * 2 bytes: digits (each 0-9999)
pub fn numeric_to_string(bytes: &[u8]) -> Result<String> {
    let [n0, n1, w0, w1, s0, s1, d0, d1, digits @ ..] = bytes else {
        return Err(Error::Decode(format!(
            "invalid NUMERIC length: {}",
            bytes.len()
        )));
    };
    let ndigits = usize::try_from(i16::from_be_bytes([*n0, *n1]))
        .map_err(|_| Error::Decode("negative NUMERIC digit count".into()))?;
    let weight = i32::from(i16::from_be_bytes([*w0, *w1]));
    let sign = u16::from_be_bytes([*s0, *s1]);
    let dscale = usize::from(u16::from_be_bytes([*d0, *d1]));

    match sign {
        NUMERIC_NAN => return Ok("NaN".into()),
        NUMERIC_PINF => return Ok("Infinity".into()),
        NUMERIC_NINF => return Ok("-Infinity".into()),
        _ => {}
    }

    if digits.len() < ndigits * 2 {
        return Err(Error::Decode(format!(
            "invalid NUMERIC length: {} (expected {})",
            bytes.len(),
            8 + ndigits * 2
        )));
    }

    // Digit at base-10000 position `i` counted from the first stored digit;
    // positions outside the stored range are implicit zeros.
    let digit = |i: i32| -> i16 {
        match usize::try_from(i) {
            Ok(i) if i < ndigits => i16::from_be_bytes([digits[2 * i], digits[2 * i + 1]]),
            _ => 0,
        }
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG && ndigits > 0 {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        let _ = write!(out, "{}", digit(0));
        for i in 1..=weight {
            let _ = write!(out, "{:04}", digit(i));
        }
    }

    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while frac.len() < dscale {
            let _ = write!(frac, "{:04}", digit(i));
            i += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_numeric(weight: i16, sign: u16, dscale: u16, digits: &[i16]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(digits.len() as i16).to_be_bytes());
        buf.extend_from_slice(&weight.to_be_bytes());
        buf.extend_from_slice(&sign.to_be_bytes());
        buf.extend_from_slice(&dscale.to_be_bytes());
        for &d in digits {
            buf.extend_from_slice(&d.to_be_bytes());
        }
        buf
    }

    #[test]
    fn test_zero() {
        assert_eq!(numeric_to_string(&make_numeric(0, 0, 0, &[])).unwrap(), "0");
        assert_eq!(numeric_to_string(&make_numeric(0, 0, 2, &[])).unwrap(), "0.00");
    }

    #[test]
    fn test_integer_with_trailing_groups() {
        // 12345 = 1 * 10000 + 2345
        assert_eq!(numeric_to_string(&make_numeric(1, 0, 0, &[1, 2345])).unwrap(), "12345");
        // 1000000 = 100 * 10000, trailing zero group not stored
        assert_eq!(numeric_to_string(&make_numeric(1, 0, 0, &[100])).unwrap(), "1000000");
    }

    #[test]
    fn test_decimal_and_negative() {
        let bytes = make_numeric(0, 0, 2, &[123, 4500]);
        assert_eq!(numeric_to_string(&bytes).unwrap(), "123.45");
        let bytes = make_numeric(0, NUMERIC_NEG, 2, &[123, 4500]);
        assert_eq!(numeric_to_string(&bytes).unwrap(), "-123.45");
    }

    #[test]
    fn test_small_fraction() {
        assert_eq!(numeric_to_string(&make_numeric(-1, 0, 4, &[1])).unwrap(), "0.0001");
        // 0.00000123: first stored group sits at 10000^-2
        assert_eq!(
            numeric_to_string(&make_numeric(-2, 0, 8, &[123])).unwrap(),
            "0.00000123"
        );
    }

    #[test]
    fn test_special_values() {
        assert_eq!(numeric_to_string(&make_numeric(0, NUMERIC_NAN, 0, &[])).unwrap(), "NaN");
        assert_eq!(
            numeric_to_string(&make_numeric(0, NUMERIC_PINF, 0, &[])).unwrap(),
            "Infinity"
        );
        assert_eq!(
            numeric_to_string(&make_numeric(0, NUMERIC_NINF, 0, &[])).unwrap(),
            "-Infinity"
        );
    }

    #[test]
    fn test_truncated_input() {
        assert!(numeric_to_string(&[0, 1]).is_err());
        let mut bytes = make_numeric(0, 0, 0, &[1, 2]);
        bytes.truncate(10);
        assert!(numeric_to_string(&bytes).is_err());
    }
}
