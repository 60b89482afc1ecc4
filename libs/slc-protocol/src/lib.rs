//! PSMCFG protocol engine for SeaMaster SearchLight controllers
//!
//! Layers, bottom up:
//! - [`codec`]: sentence build/decode and checksum
//! - [`framer`]: byte stream to frames, with idle-read timeout
//! - [`record`]: configuration record and protocol variants
//! - [`exchange`]: query/drain and edit cycles over a [`Transport`]
//! - [`backup`]: `SLC` backup file format
//! - [`transport`]: serial port, device simulator and scripted mock

pub mod backup;
pub mod codec;
pub mod exchange;
pub mod framer;
pub mod record;
pub mod transport;

pub use backup::{BackupBlob, SizePolicy, DEFAULT_BACKUP_FILE};
pub use codec::{build_sentence, checksum, decode_sentence, DecodedSentence};
pub use exchange::{ExchangeConfig, ExchangeEngine};
pub use framer::{FrameOutcome, Framer, FramerConfig};
pub use record::{ConfigurationRecord, FieldKind, FieldSpec, ProtocolVariant};
pub use transport::{
    DeviceSimulator, MockTransport, SerialTransport, SerialTransportConfig, Transport,
};
