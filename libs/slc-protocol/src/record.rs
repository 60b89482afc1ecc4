//! Configuration record and protocol variants
//!
//! A record is the ordered set of signed 32-bit fields the controller reports.
//! Wire order, in-memory order and backup order are the same and are fixed per
//! [`ProtocolVariant`].

use byteorder::{ByteOrder, LittleEndian};
use errors::{Result, SlcError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::codec::parse_int_field;

/// Size of one field in the backup byte image
pub const FIELD_SIZE: usize = 4;

/// How a field's raw integer is entered and shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain integer
    Integer,
    /// Stored as tenths, entered and shown as a decimal
    Tenths,
}

impl FieldKind {
    /// Parse operator input into the raw stored value.
    ///
    /// Input must start with a digit; negative or empty input is rejected.
    pub fn parse_input(self, input: &str) -> Result<i32> {
        let input = input.trim();
        if !input.as_bytes().first().is_some_and(u8::is_ascii_digit) {
            return Err(SlcError::MalformedFieldEdit(input.to_string()));
        }

        match self {
            Self::Integer => Ok(parse_int_field(input)),
            Self::Tenths => {
                let end = input
                    .char_indices()
                    .scan(false, |seen_dot, (i, c)| match c {
                        '0'..='9' => Some(i + 1),
                        '.' if !*seen_dot => {
                            *seen_dot = true;
                            Some(i + 1)
                        },
                        _ => None,
                    })
                    .last()
                    .unwrap_or(0);
                let degrees: f64 = input[..end]
                    .parse()
                    .map_err(|_| SlcError::MalformedFieldEdit(input.to_string()))?;
                Ok((degrees * 10.0 + 0.1) as i32)
            },
        }
    }

    /// Render a raw stored value for display
    pub fn format_value(self, raw: i32) -> String {
        match self {
            Self::Integer => raw.to_string(),
            Self::Tenths => format!("{:.1}", f64::from(raw) * 0.1),
        }
    }
}

/// Static description of one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Stable identifier used in config and logs
    pub key: &'static str,
    /// Operator-facing label
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn field(key: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { key, label, kind }
}

// Wire order. The reduced variant is the first seven entries.
const FIELDS: [FieldSpec; 8] = [
    field("gps_port_offset", "GPS offset from port side", FieldKind::Integer),
    field("gps_stern_offset", "GPS offset from stern", FieldKind::Integer),
    field("lamp_port_offset", "Lamp offset from port side", FieldKind::Integer),
    field("lamp_bow_offset", "Lamp offset from bow", FieldKind::Integer),
    field("lamp_height", "Lamp height", FieldKind::Integer),
    field("length_overall", "Ship length overall", FieldKind::Integer),
    field("breadth", "Ship breadth", FieldKind::Integer),
    field("bearing_correction", "Bearing correction", FieldKind::Tenths),
];

/// Protocol variant spoken by the attached controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVariant {
    /// Eight fields including bearing correction; backup/restore available
    #[default]
    Full,
    /// Seven fields, no bearing correction, no backup/restore
    Reduced,
}

impl ProtocolVariant {
    /// Fields in wire order
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            Self::Full => &FIELDS,
            Self::Reduced => &FIELDS[..7],
        }
    }

    pub fn field_count(self) -> usize {
        self.fields().len()
    }

    /// Byte size of the record image written to backup files
    pub fn record_size(self) -> usize {
        self.field_count() * FIELD_SIZE
    }

    pub fn supports_backup(self) -> bool {
        matches!(self, Self::Full)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Reduced => "reduced",
        }
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProtocolVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" | "a" => Ok(Self::Full),
            "reduced" | "b" => Ok(Self::Reduced),
            other => Err(format!(
                "unknown protocol variant '{other}' (expected 'full' or 'reduced')"
            )),
        }
    }
}

/// Current device configuration, one value per field of the variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationRecord {
    variant: ProtocolVariant,
    values: Vec<i32>,
}

impl ConfigurationRecord {
    /// Zeroed record
    pub fn new(variant: ProtocolVariant) -> Self {
        Self {
            variant,
            values: vec![0; variant.field_count()],
        }
    }

    /// Record from values in wire order; the count must match the variant
    pub fn from_values(variant: ProtocolVariant, values: &[i32]) -> Result<Self> {
        if values.len() != variant.field_count() {
            return Err(SlcError::SizeMismatch {
                stated: values.len() * FIELD_SIZE,
                expected: variant.record_size(),
            });
        }
        Ok(Self {
            variant,
            values: values.to_vec(),
        })
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<i32> {
        self.values.get(index).copied()
    }

    pub fn set(&mut self, index: usize, value: i32) -> Result<()> {
        let count = self.values.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or(SlcError::FieldIndexOutOfRange { index, count })?;
        *slot = value;
        Ok(())
    }

    /// Position of a field key in wire order
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.variant.fields().iter().position(|f| f.key == key)
    }

    pub fn get_by_key(&self, key: &str) -> Option<i32> {
        self.index_of(key).and_then(|i| self.get(i))
    }

    pub fn set_by_key(&mut self, key: &str, value: i32) -> Result<()> {
        let index = self
            .index_of(key)
            .ok_or_else(|| SlcError::UnknownField(key.to_string()))?;
        self.set(index, value)
    }

    /// Fields paired with their current values, in wire order
    pub fn iter(&self) -> impl Iterator<Item = (&'static FieldSpec, i32)> + '_ {
        self.variant.fields().iter().zip(self.values.iter().copied())
    }

    /// Overwrite every value from decoded wire fields.
    ///
    /// Missing or non-numeric fields become 0; surplus fields are ignored.
    /// Both count mismatches are logged.
    pub fn replace_from_fields<S: AsRef<str>>(&mut self, fields: &[S]) {
        let expected = self.values.len();
        if fields.len() != expected {
            warn!(
                "Field count mismatch for {} variant: received {}, expected {}",
                self.variant,
                fields.len(),
                expected
            );
        }
        for (i, slot) in self.values.iter_mut().enumerate() {
            *slot = fields.get(i).map(|f| parse_int_field(f.as_ref())).unwrap_or(0);
        }
    }

    /// Values as sentence fields (every field populated)
    pub fn to_sentence_fields(&self) -> Vec<Option<i32>> {
        self.values.iter().copied().map(Some).collect()
    }

    /// Little-endian byte image, `FIELD_SIZE` bytes per field
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.values.len() * FIELD_SIZE];
        LittleEndian::write_i32_into(&self.values, &mut bytes);
        bytes
    }

    /// Copy `bytes` over the start of the byte image.
    ///
    /// Returns the number of bytes copied; never writes past the record.
    pub fn overwrite_bytes(&mut self, bytes: &[u8]) -> usize {
        let mut image = self.to_bytes();
        let n = bytes.len().min(image.len());
        image[..n].copy_from_slice(&bytes[..n]);
        LittleEndian::read_i32_into(&image, &mut self.values);
        n
    }
}
