//! PSMCFG sentence codec
//!
//! Outbound: `$PSMCFG,<f1>,...,<fN>*HH\r\n` where `HH` is the XOR of every byte
//! between `$` and `*`. Inbound: raw frame text split into positional fields.
//! Fields carry no names on the wire; position is the only identity.

use errors::{Result, SlcError};
use std::fmt::Write;
use tracing::trace;

/// Sentence start marker
pub const START_MARKER: u8 = b'$';

/// Separates the sentence body from the checksum
pub const CHECKSUM_MARKER: u8 = b'*';

/// Field separator
pub const FIELD_SEPARATOR: char = ',';

/// Address of the only sentence type the device speaks
pub const SENTENCE_ADDRESS: &str = "PSMCFG";

/// Line terminator appended after the checksum
pub const TERMINATOR: &[u8] = b"\r\n";

/// Largest complete sentence (terminator included) the device accepts
pub const MAX_SENTENCE_LEN: usize = 100;

/// XOR-fold of every byte strictly between the leading `$` and the `*`.
///
/// A missing `$` is tolerated (folding starts at the first byte); folding
/// stops at the first `*` or at the end of input.
pub fn checksum(body: &[u8]) -> u8 {
    let start = usize::from(body.first() == Some(&START_MARKER));
    body[start..]
        .iter()
        .take_while(|&&b| b != CHECKSUM_MARKER)
        .fold(0u8, |acc, &b| acc ^ b)
}

/// Build a transmittable sentence.
///
/// `None` fields are sent blank, which the device reads as "no change"
/// (or, for an all-blank sentence, as a status query).
pub fn build_sentence(fields: &[Option<i32>]) -> Result<Vec<u8>> {
    let mut body = String::with_capacity(MAX_SENTENCE_LEN);
    body.push(START_MARKER as char);
    body.push_str(SENTENCE_ADDRESS);
    for field in fields {
        body.push(FIELD_SEPARATOR);
        if let Some(value) = field {
            // Writing to String buffer is infallible
            let _ = write!(body, "{value}");
        }
    }

    let len = body.len() + 3 + TERMINATOR.len();
    if len > MAX_SENTENCE_LEN {
        return Err(SlcError::SentenceTooLong {
            len,
            max: MAX_SENTENCE_LEN,
        });
    }

    let crc = checksum(body.as_bytes());
    let _ = write!(body, "*{crc:02X}");

    let mut sentence = body.into_bytes();
    sentence.extend_from_slice(TERMINATOR);
    trace!("Built sentence: {}", common::hex::printable(&sentence));
    Ok(sentence)
}

/// One inbound sentence split into its parts
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedSentence {
    /// First token (normally `PSMCFG`); empty for an empty frame
    pub address: String,
    /// Positional fields after the address; empty fields stay empty strings
    pub fields: Vec<String>,
}

impl DecodedSentence {
    /// Whether the address is the PSMCFG sentence
    pub fn is_config_sentence(&self) -> bool {
        self.address == SENTENCE_ADDRESS
    }
}

/// Split raw sentence text into address and positional fields.
///
/// A leading `$` and trailing CR/LF are ignored. Everything from the first `*`
/// on (checksum included) is discarded and never validated.
pub fn decode_sentence(raw: &str) -> DecodedSentence {
    let raw = raw.trim_end_matches(['\r', '\n']);
    let raw = raw.strip_prefix(START_MARKER as char).unwrap_or(raw);
    let body = match raw.find(CHECKSUM_MARKER as char) {
        Some(pos) => &raw[..pos],
        None => raw,
    };

    let mut tokens = body.split(FIELD_SEPARATOR).map(str::to_string);
    let address = tokens.next().unwrap_or_default();
    DecodedSentence {
        address,
        fields: tokens.collect(),
    }
}

/// C `atoi` semantics: optional leading whitespace, optional sign, then digits.
/// Anything unparsable yields 0; values outside `i32` saturate.
pub fn parse_int_field(field: &str) -> i32 {
    let s = field.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value.saturating_mul(10).saturating_add(i64::from(b - b'0'));
        if value > i64::from(i32::MAX) + 1 {
            break;
        }
    }
    if negative {
        value = -value;
    }
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn xor_between_markers(sentence: &[u8]) -> u8 {
        let start = sentence.iter().position(|&b| b == b'$').unwrap() + 1;
        let end = sentence.iter().position(|&b| b == b'*').unwrap();
        sentence[start..end].iter().fold(0, |acc, b| acc ^ b)
    }

    #[test]
    fn test_checksum_matches_xor_between_markers() {
        let sentence = build_sentence(&[Some(12), None, Some(-3)]).unwrap();
        let text = String::from_utf8(sentence.clone()).unwrap();
        let star = text.find('*').unwrap();
        let hex = &text[star + 1..star + 3];
        assert_eq!(
            u8::from_str_radix(hex, 16).unwrap(),
            xor_between_markers(&sentence)
        );
        assert_eq!(hex, hex.to_uppercase());
    }

    #[test]
    fn test_checksum_known_value() {
        let expected = 0x0C;
        assert_eq!(checksum(b"$PSMCFG"), expected);
        assert_eq!(checksum(b"$PSMCFG*FF"), expected);
        assert_eq!(checksum(b"PSMCFG"), expected);
    }

    #[test]
    fn test_build_then_decode_fields() {
        let values: Vec<Option<i32>> = (1..=8).map(Some).collect();
        let sentence = build_sentence(&values).unwrap();
        let decoded = decode_sentence(std::str::from_utf8(&sentence).unwrap());
        assert!(decoded.is_config_sentence());
        assert_eq!(decoded.fields, vec!["1", "2", "3", "4", "5", "6", "7", "8"]);
    }

    #[test]
    fn test_empty_field_query_shape() {
        for n in [7usize, 8] {
            let sentence = build_sentence(&vec![None; n]).unwrap();
            let text = String::from_utf8(sentence).unwrap();
            let expected_prefix = format!("$PSMCFG{}*", ",".repeat(n));
            assert!(text.starts_with(&expected_prefix), "{text}");
            let rest = &text[expected_prefix.len()..];
            assert_eq!(rest.len(), 4);
            assert!(rest[..2].chars().all(|c| c.is_ascii_hexdigit()));
            assert!(rest.ends_with("\r\n"));
        }
    }

    #[test]
    fn test_single_field_edit_sentence() {
        let mut fields = vec![None; 8];
        fields[2] = Some(150);
        let sentence = build_sentence(&fields).unwrap();
        let text = String::from_utf8(sentence).unwrap();
        assert!(text.starts_with("$PSMCFG,,,150,,,,,*"));
    }

    #[test]
    fn test_build_rejects_oversized_sentence() {
        let fields = vec![Some(i32::MIN); 9];
        match build_sentence(&fields) {
            Err(SlcError::SentenceTooLong { len, max }) => {
                assert_eq!(max, MAX_SENTENCE_LEN);
                assert!(len > MAX_SENTENCE_LEN);
            },
            other => panic!("expected SentenceTooLong, got {other:?}"),
        }
    }

    #[test]
    fn test_build_largest_full_record_fits() {
        // Eight seven-digit negative values still fit the device buffer
        let fields = vec![Some(-1_000_000); 8];
        assert!(build_sentence(&fields).unwrap().len() <= MAX_SENTENCE_LEN);
    }

    #[test]
    fn test_decode_preserves_empty_fields() {
        let decoded = decode_sentence("PSMCFG,1,,3,*5A");
        assert_eq!(decoded.address, "PSMCFG");
        assert_eq!(decoded.fields, vec!["1", "", "3", ""]);
    }

    #[test]
    fn test_decode_discards_checksum_and_tail() {
        let decoded = decode_sentence("$PSMCFG,1,2*1A,9,9\r\n");
        assert_eq!(decoded.fields, vec!["1", "2"]);
    }

    #[test]
    fn test_decode_empty_frame() {
        let decoded = decode_sentence("");
        assert_eq!(decoded.address, "");
        assert!(decoded.fields.is_empty());
        assert!(!decoded.is_config_sentence());
    }

    #[test]
    fn test_parse_int_field_atoi_rules() {
        assert_eq!(parse_int_field("42"), 42);
        assert_eq!(parse_int_field("  -17"), -17);
        assert_eq!(parse_int_field("+5"), 5);
        assert_eq!(parse_int_field("12abc"), 12);
        assert_eq!(parse_int_field(""), 0);
        assert_eq!(parse_int_field("abc"), 0);
        assert_eq!(parse_int_field("-"), 0);
        assert_eq!(parse_int_field("99999999999"), i32::MAX);
        assert_eq!(parse_int_field("-99999999999"), i32::MIN);
    }
}
