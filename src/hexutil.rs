//! Pure functions for converting hex-digit strings and raw bytes to
//! integers, bitstrings and engineering units.

use crate::error::ObdError;

/// Parse a hex-digit string into an integer.
pub fn hex_to_int(s: &str) -> Result<u32, ObdError> {
    u32::from_str_radix(s.trim(), 16).map_err(ObdError::from)
}

/// Parse a single 2-hex-digit byte token (e.g. `"4A"`).
pub fn hex_byte(s: &str) -> Result<u8, ObdError> {
    u8::from_str_radix(s.trim(), 16).map_err(ObdError::from)
}

/// Convert a hex-digit string to its bitstring representation: the
/// result has length `4 * len(hexstr)` and its value equals
/// `int(hexstr, 16)`.
pub fn hex_to_bitstring(s: &str) -> Result<String, ObdError> {
    let value = u128::from_str_radix(s.trim(), 16).map_err(ObdError::from)?;
    let width = s.trim().len() * 4;
    Ok(format!("{:0width$b}", value, width = width))
}

/// Convert a byte slice directly to its bitstring representation
/// (one byte = 8 bits), used by PID-support decoding.
pub fn bytes_to_bitstring(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:08b}", b)).collect()
}

/// Parse a whitespace-separated sequence of 2-hex-digit tokens into
/// raw bytes.
pub fn tokens_to_bytes(tokens: &[&str]) -> Result<Vec<u8>, ObdError> {
    tokens.iter().map(|t| hex_byte(t)).collect()
}

/// Interpret the high nibble of a byte as a signed two's-complement
/// delta against `128`, used by fuel-trim/torque style decoders.
pub fn signed_offset_128(byte: u8) -> i16 {
    i16::from(byte) - 128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_to_int_parses_radix_16() {
        assert_eq!(hex_to_int("1AF8").unwrap(), 0x1AF8);
        assert_eq!(hex_to_int("00").unwrap(), 0);
    }

    #[test]
    fn hex_to_int_rejects_garbage() {
        assert!(hex_to_int("zz").is_err());
    }

    #[test]
    fn hex_to_bitstring_length_and_value() {
        for h in ["00", "FF", "1A2B3C4D", "0"] {
            let bits = hex_to_bitstring(h).unwrap();
            assert_eq!(bits.len(), 4 * h.trim().len());
            let expected = u128::from_str_radix(h, 16).unwrap();
            assert_eq!(u128::from_str_radix(&bits, 2).unwrap(), expected);
        }
    }

    #[test]
    fn bytes_to_bitstring_is_msb_first_and_zero_padded() {
        assert_eq!(bytes_to_bitstring(&[0xBE, 0x1F, 0xA8, 0x13]), "10111110000111111010100000010011");
    }

    #[test]
    fn tokens_to_bytes_roundtrips() {
        assert_eq!(tokens_to_bytes(&["41", "00", "FF"]).unwrap(), vec![0x41, 0x00, 0xFF]);
    }
}
