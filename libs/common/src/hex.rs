//! Hex helpers for raw frame dumps in debug logs

use std::fmt::Write;

/// Encode bytes as space-separated uppercase hex pairs
/// Example: [0x24, 0x50, 0x0D] -> "24 50 0D"
pub fn encode_spaced(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            result.push(' ');
        }
        // Writing to String buffer is infallible - no need for expect
        let _ = write!(&mut result, "{:02X}", byte);
    }
    result
}

/// Render bytes as printable text, escaping control characters
/// Example: b"$PSMCFG\r\n" -> "$PSMCFG\\r\\n"
pub fn printable(data: &[u8]) -> String {
    data.escape_ascii().to_string()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_encode_spaced_basic() {
        assert_eq!(encode_spaced(&[0x24, 0x50, 0x0D]), "24 50 0D");
    }

    #[test]
    fn test_encode_spaced_empty() {
        assert_eq!(encode_spaced(&[]), "");
    }

    #[test]
    fn test_encode_spaced_single_byte() {
        assert_eq!(encode_spaced(&[0x0F]), "0F");
    }

    #[test]
    fn test_printable_escapes_terminators() {
        assert_eq!(printable(b"$PSMCFG,1*00\r\n"), "$PSMCFG,1*00\\r\\n");
    }
}
