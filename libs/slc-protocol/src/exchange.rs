//! Request/response exchange with the controller
//!
//! A refresh sends an all-blank query and then drains every status sentence
//! the device has queued; only the last one counts. Field edits are
//! fire-and-forget: the device never acknowledges them, the next refresh
//! shows whether they took effect.

use std::time::Duration;

use errors::{Result, SlcError};
use tracing::{debug, info, warn};

use crate::codec::{build_sentence, decode_sentence};
use crate::framer::{FrameOutcome, Framer, FramerConfig};
use crate::record::{ConfigurationRecord, ProtocolVariant};
use crate::transport::Transport;

/// Exchange timing and drain limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Pause before each status read
    pub settle_delay: Duration,
    /// Pause after each field edit or upload
    pub edit_delay: Duration,
    /// Keep draining while more than this many bytes are pending
    pub drain_threshold: usize,
    /// Upper bound on sentences read in one refresh
    pub max_drain_sentences: usize,
    pub framer: FramerConfig,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(100),
            edit_delay: Duration::from_millis(300),
            drain_threshold: 6,
            max_drain_sentences: 64,
            framer: FramerConfig::default(),
        }
    }
}

impl ExchangeConfig {
    /// Same limits without any pauses (simulator and tests)
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            edit_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Drives query, drain and edit cycles for one protocol variant
#[derive(Debug)]
pub struct ExchangeEngine {
    variant: ProtocolVariant,
    config: ExchangeConfig,
    framer: Framer,
}

impl ExchangeEngine {
    pub fn new(variant: ProtocolVariant, config: ExchangeConfig) -> Self {
        let framer = Framer::new(config.framer.clone());
        Self {
            variant,
            config,
            framer,
        }
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// All-blank status query
    pub fn query_sentence(&self) -> Result<Vec<u8>> {
        build_sentence(&vec![None; self.variant.field_count()])
    }

    /// Sentence setting one field and leaving the others blank
    pub fn edit_sentence(&self, index: usize, value: i32) -> Result<Vec<u8>> {
        let count = self.variant.field_count();
        if index >= count {
            return Err(SlcError::FieldIndexOutOfRange { index, count });
        }
        let mut fields = vec![None; count];
        fields[index] = Some(value);
        build_sentence(&fields)
    }

    /// Query the device and return the record from the last sentence drained.
    ///
    /// A framer timeout is logged and the partial buffer is decoded anyway,
    /// which normally leaves every field at zero.
    pub fn refresh<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<ConfigurationRecord> {
        let query = self.query_sentence()?;
        transport.write_bytes(&query)?;

        let mut record = ConfigurationRecord::new(self.variant);
        let mut sentences = 0usize;
        loop {
            pause(self.config.settle_delay);
            let outcome = self.framer.next_frame(transport)?;
            if let FrameOutcome::TimedOut { idle_reads, .. } = &outcome {
                let err = SlcError::TransportTimeout {
                    idle_reads: *idle_reads,
                };
                warn!("{} on {}: {err}", err.error_code(), transport.name());
            }

            let decoded = decode_sentence(outcome.text());
            if !decoded.is_config_sentence() && !decoded.address.is_empty() {
                debug!("Unexpected sentence address '{}'", decoded.address);
            }
            record.replace_from_fields(&decoded.fields);
            sentences += 1;

            if sentences >= self.config.max_drain_sentences {
                warn!(
                    "Stopped draining {} after {} sentences",
                    transport.name(),
                    sentences
                );
                break;
            }
            if transport.pending_inbound()? <= self.config.drain_threshold {
                break;
            }
        }

        debug!("Refresh drained {sentences} sentence(s): {:?}", record.values());
        Ok(record)
    }

    /// Send a single-field edit; no acknowledgement is read
    pub fn apply_field_edit<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        index: usize,
        value: i32,
    ) -> Result<()> {
        let sentence = self.edit_sentence(index, value)?;
        transport.write_bytes(&sentence)?;
        info!("Set {} = {value}", self.variant.fields()[index].key);
        pause(self.config.edit_delay);
        Ok(())
    }

    /// Send every field of `record` in one sentence
    pub fn upload_record<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        record: &ConfigurationRecord,
    ) -> Result<()> {
        if record.variant() != self.variant {
            return Err(SlcError::SizeMismatch {
                stated: record.variant().record_size(),
                expected: self.variant.record_size(),
            });
        }
        let sentence = build_sentence(&record.to_sentence_fields())?;
        transport.write_bytes(&sentence)?;
        info!("Uploaded {} fields to {}", record.len(), transport.name());
        pause(self.config.edit_delay);
        Ok(())
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn engine(variant: ProtocolVariant) -> ExchangeEngine {
        ExchangeEngine::new(variant, ExchangeConfig::immediate())
    }

    #[test]
    fn test_refresh_sends_blank_query() {
        let mut transport = MockTransport::with_bytes(b"$PSMCFG,1,2,3,4,5,6,7,8*00\r\n");
        let record = engine(ProtocolVariant::Full).refresh(&mut transport).unwrap();
        assert_eq!(record.values(), &[1, 2, 3, 4, 5, 6, 7, 8]);

        let sent = transport.sent_sentences();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("$PSMCFG,,,,,,,,*"));
    }

    #[test]
    fn test_refresh_keeps_last_sentence() {
        let mut transport = MockTransport::with_bytes(
            b"$PSMCFG,1,1,1,1,1,1,1*00\r\n$PSMCFG,2,2,2,2,2,2,2*00\r\n",
        );
        let record = engine(ProtocolVariant::Reduced).refresh(&mut transport).unwrap();
        assert_eq!(record.values(), &[2; 7]);
        assert_eq!(transport.remaining_bytes(), 1);
    }

    #[test]
    fn test_refresh_trailing_noise_is_the_last_sentence() {
        // Trailing noise after the first sentence keeps the drain going
        let mut transport = MockTransport::with_bytes(b"$PSMCFG,5*00\r\n123456\r\n");
        let config = ExchangeConfig {
            drain_threshold: 6,
            ..ExchangeConfig::immediate()
        };
        let record = ExchangeEngine::new(ProtocolVariant::Reduced, config)
            .refresh(&mut transport)
            .unwrap();
        assert_eq!(record.values(), &[0; 7]);
    }

    #[test]
    fn test_refresh_drain_is_bounded() {
        let mut transport = MockTransport::new();
        for _ in 0..10 {
            transport.push_bytes(b"$PSMCFG,3,3,3,3,3,3,3*00\r\n");
        }
        let config = ExchangeConfig {
            max_drain_sentences: 4,
            ..ExchangeConfig::immediate()
        };
        let record = ExchangeEngine::new(ProtocolVariant::Reduced, config)
            .refresh(&mut transport)
            .unwrap();
        assert_eq!(record.values(), &[3; 7]);
        assert!(transport.remaining_bytes() > 100);
    }

    #[test]
    fn test_refresh_timeout_yields_zeros() {
        let mut transport = MockTransport::new();
        let record = engine(ProtocolVariant::Full).refresh(&mut transport).unwrap();
        assert_eq!(record.values(), &[0; 8]);
    }

    #[test]
    fn test_field_edit_sentence() {
        let mut transport = MockTransport::new();
        engine(ProtocolVariant::Full)
            .apply_field_edit(&mut transport, 2, 150)
            .unwrap();
        let sent = transport.sent_sentences();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("$PSMCFG,,,150,,,,,*"));
        assert!(sent[0].ends_with("\r\n"));
    }

    #[test]
    fn test_field_edit_out_of_range() {
        let mut transport = MockTransport::new();
        let result = engine(ProtocolVariant::Reduced).apply_field_edit(&mut transport, 7, 1);
        assert!(matches!(
            result,
            Err(SlcError::FieldIndexOutOfRange { index: 7, count: 7 })
        ));
        assert!(transport.sent_data().is_empty());
    }

    #[test]
    fn test_upload_record_sends_every_field() {
        let mut transport = MockTransport::new();
        let record =
            ConfigurationRecord::from_values(ProtocolVariant::Full, &[1, 2, 3, 4, 5, 6, 7, -8])
                .unwrap();
        engine(ProtocolVariant::Full)
            .upload_record(&mut transport, &record)
            .unwrap();
        assert!(transport.sent_sentences()[0].starts_with("$PSMCFG,1,2,3,4,5,6,7,-8*"));
    }

    #[test]
    fn test_upload_record_rejects_other_variant() {
        let mut transport = MockTransport::new();
        let record = ConfigurationRecord::new(ProtocolVariant::Reduced);
        let result = engine(ProtocolVariant::Full).upload_record(&mut transport, &record);
        assert!(matches!(result, Err(SlcError::SizeMismatch { .. })));
    }
}
