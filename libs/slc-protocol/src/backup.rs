//! Backup file format
//!
//! ```text
//! +-------+-----------+---------------------------+
//! | "SLC" | len (u16) | record image (len bytes)  |
//! +-------+-----------+---------------------------+
//!   3 B     2 B LE      i32 LE per field, wire order
//! ```

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use errors::{Result, SlcError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::record::ConfigurationRecord;

/// File signature
pub const SIGNATURE: &[u8; 3] = b"SLC";

/// Signature plus length
pub const HEADER_LEN: usize = 5;

pub const DEFAULT_BACKUP_FILE: &str = "slconfig.dat";

/// What to do when a backup's stated size differs from the record size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SizePolicy {
    /// Refuse with `SizeMismatch`
    Reject,
    /// Copy what fits and warn
    #[default]
    CopyMinimum,
}

/// Parsed backup contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupBlob {
    stated_len: u16,
    payload: Vec<u8>,
}

impl BackupBlob {
    /// Snapshot of a record's byte image
    pub fn from_record(record: &ConfigurationRecord) -> Result<Self> {
        ensure_backup_supported(record)?;
        let payload = record.to_bytes();
        let stated_len = u16::try_from(payload.len()).map_err(|_| SlcError::SizeMismatch {
            stated: payload.len(),
            expected: usize::from(u16::MAX),
        })?;
        Ok(Self {
            stated_len,
            payload,
        })
    }

    /// Parse file contents; only the signature is checked
    pub fn load(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..SIGNATURE.len()] != SIGNATURE {
            return Err(SlcError::InvalidSignature);
        }

        let stated_len = LittleEndian::read_u16(&bytes[SIGNATURE.len()..HEADER_LEN]);
        let body = &bytes[HEADER_LEN..];
        let take = body.len().min(usize::from(stated_len));
        if take < usize::from(stated_len) {
            warn!("Backup is short: {take} of {stated_len} stated bytes present");
        }
        debug!("Loaded backup with {stated_len} stated bytes");

        Ok(Self {
            stated_len,
            payload: body[..take].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(SIGNATURE);
        let mut len = [0u8; 2];
        LittleEndian::write_u16(&mut len, self.stated_len);
        bytes.extend_from_slice(&len);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Length written in the header
    pub fn stated_len(&self) -> usize {
        usize::from(self.stated_len)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Apply the payload to `record`; returns the number of bytes copied.
    ///
    /// Never writes past the end of the record.
    pub fn restore_into(&self, record: &mut ConfigurationRecord, policy: SizePolicy) -> Result<usize> {
        ensure_backup_supported(record)?;

        let expected = record.variant().record_size();
        let stated = self.stated_len();
        if stated != expected || self.payload.len() != expected {
            let err = SlcError::SizeMismatch {
                stated: stated.min(self.payload.len()),
                expected,
            };
            match policy {
                SizePolicy::Reject => return Err(err),
                SizePolicy::CopyMinimum => warn!("{err}; copying what fits"),
            }
        }

        Ok(record.overwrite_bytes(&self.payload))
    }
}

fn ensure_backup_supported(record: &ConfigurationRecord) -> Result<()> {
    if record.variant().supports_backup() {
        Ok(())
    } else {
        Err(SlcError::BackupUnsupported(record.variant().to_string()))
    }
}

/// Encode a record as backup file contents
pub fn save(record: &ConfigurationRecord) -> Result<Vec<u8>> {
    Ok(BackupBlob::from_record(record)?.to_bytes())
}

/// Decode backup file contents
pub fn load(bytes: &[u8]) -> Result<BackupBlob> {
    BackupBlob::load(bytes)
}

pub fn write_file(path: impl AsRef<Path>, record: &ConfigurationRecord) -> Result<()> {
    let path = path.as_ref();
    let bytes = save(record)?;
    std::fs::write(path, &bytes)?;
    info!("Wrote {} byte backup to {}", bytes.len(), path.display());
    Ok(())
}

pub fn read_file(path: impl AsRef<Path>) -> Result<BackupBlob> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    load(&bytes)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::record::ProtocolVariant;

    fn sample() -> ConfigurationRecord {
        ConfigurationRecord::from_values(ProtocolVariant::Full, &[1, -2, 3, 4, 5, 60, 12, 15])
            .unwrap()
    }

    #[test]
    fn test_save_layout() {
        let bytes = save(&sample()).unwrap();
        assert_eq!(&bytes[..3], b"SLC");
        assert_eq!(&bytes[3..5], &[32, 0]);
        assert_eq!(bytes.len(), HEADER_LEN + 32);
        assert_eq!(&bytes[9..13], &(-2i32).to_le_bytes());
    }

    #[test]
    fn test_restore_reproduces_record() {
        let bytes = save(&sample()).unwrap();
        let mut record = ConfigurationRecord::new(ProtocolVariant::Full);
        let copied = load(&bytes)
            .unwrap()
            .restore_into(&mut record, SizePolicy::Reject)
            .unwrap();
        assert_eq!(copied, 32);
        assert_eq!(record, sample());
    }

    #[test]
    fn test_bad_signature_is_rejected() {
        assert!(matches!(load(b"XYZ\x20\x00"), Err(SlcError::InvalidSignature)));
        assert!(matches!(load(b"SL"), Err(SlcError::InvalidSignature)));
        assert!(matches!(load(b""), Err(SlcError::InvalidSignature)));
    }

    #[test]
    fn test_short_payload_is_kept() {
        let mut bytes = save(&sample()).unwrap();
        bytes.truncate(HEADER_LEN + 10);
        let blob = load(&bytes).unwrap();
        assert_eq!(blob.stated_len(), 32);
        assert_eq!(blob.payload().len(), 10);
    }

    #[test]
    fn test_size_policy() {
        // Header claims 12 bytes: three fields
        let mut bytes = b"SLC\x0c\x00".to_vec();
        for v in [7i32, 8, 9] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let blob = load(&bytes).unwrap();

        let mut record = sample();
        assert!(matches!(
            blob.restore_into(&mut record, SizePolicy::Reject),
            Err(SlcError::SizeMismatch {
                stated: 12,
                expected: 32
            })
        ));
        assert_eq!(record, sample());

        assert_eq!(blob.restore_into(&mut record, SizePolicy::CopyMinimum).unwrap(), 12);
        assert_eq!(record.values(), &[7, 8, 9, 4, 5, 60, 12, 15]);
    }

    #[test]
    fn test_oversized_backup_never_overruns() {
        let mut bytes = b"SLC\x28\x00".to_vec();
        bytes.extend_from_slice(&[0x11; 40]);
        let mut record = sample();
        let copied = load(&bytes)
            .unwrap()
            .restore_into(&mut record, SizePolicy::CopyMinimum)
            .unwrap();
        assert_eq!(copied, 32);
        assert_eq!(record.len(), 8);
        assert!(record.values().iter().all(|&v| v == 0x1111_1111));
    }

    #[test]
    fn test_reduced_variant_has_no_backup() {
        let mut record = ConfigurationRecord::new(ProtocolVariant::Reduced);
        assert!(matches!(save(&record), Err(SlcError::BackupUnsupported(_))));

        let blob = load(&save(&sample()).unwrap()).unwrap();
        assert!(matches!(
            blob.restore_into(&mut record, SizePolicy::CopyMinimum),
            Err(SlcError::BackupUnsupported(_))
        ));
    }

    #[test]
    fn test_size_policy_serde_names() {
        let policy: SizePolicy = serde_yaml::from_str("copy-minimum").unwrap();
        assert_eq!(policy, SizePolicy::CopyMinimum);
        let policy: SizePolicy = serde_yaml::from_str("reject").unwrap();
        assert_eq!(policy, SizePolicy::Reject);
    }
}
