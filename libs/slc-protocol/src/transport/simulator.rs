//! Simulated searchlight controller
//!
//! Behaves like the device on the other end of the serial line: every
//! sentence written to it applies its non-blank fields to the held record
//! and queues a status sentence carrying the full record.

use std::collections::VecDeque;

use errors::Result;
use tracing::{debug, warn};

use super::Transport;
use crate::codec::{build_sentence, decode_sentence, parse_int_field};
use crate::record::{ConfigurationRecord, ProtocolVariant};

/// In-process controller used by `--simulate` and by tests
#[derive(Debug, Clone)]
pub struct DeviceSimulator {
    record: ConfigurationRecord,
    /// Partial line written by the host
    line: Vec<u8>,
    /// Bytes waiting to be read by the host
    outbound: VecDeque<u8>,
    /// Status sentences queued per request
    burst: usize,
    received: Vec<String>,
}

impl DeviceSimulator {
    /// Controller holding a zeroed record
    pub fn new(variant: ProtocolVariant) -> Self {
        Self::with_record(ConfigurationRecord::new(variant))
    }

    pub fn with_record(record: ConfigurationRecord) -> Self {
        Self {
            record,
            line: Vec::new(),
            outbound: VecDeque::new(),
            burst: 1,
            received: Vec::new(),
        }
    }

    /// Answer each request with `burst` identical status sentences
    pub fn with_burst(mut self, burst: usize) -> Self {
        self.burst = burst.max(1);
        self
    }

    /// Current device-side record
    pub fn record(&self) -> &ConfigurationRecord {
        &self.record
    }

    /// Every complete sentence written so far
    pub fn received(&self) -> &[String] {
        &self.received
    }

    /// Queue raw bytes as if the device had sent them unprompted
    pub fn inject(&mut self, data: &[u8]) {
        self.outbound.extend(data);
    }

    fn handle_line(&mut self, line: &[u8]) {
        let text = String::from_utf8_lossy(line).trim_end_matches('\r').to_string();
        if text.is_empty() {
            return;
        }
        self.received.push(text.clone());

        let decoded = decode_sentence(&text);
        if !decoded.is_config_sentence() {
            debug!("Simulator ignoring sentence '{}'", decoded.address);
            return;
        }

        for (index, field) in decoded.fields.iter().enumerate() {
            if field.is_empty() {
                continue;
            }
            if let Err(e) = self.record.set(index, parse_int_field(field)) {
                debug!("Simulator dropped field: {e}");
            }
        }

        match build_sentence(&self.record.to_sentence_fields()) {
            Ok(status) => {
                for _ in 0..self.burst {
                    self.outbound.extend(&status);
                }
            },
            Err(e) => warn!("Simulator cannot report status: {e}"),
        }
    }
}

impl Transport for DeviceSimulator {
    fn name(&self) -> &str {
        "simulator"
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        Ok(self.outbound.pop_front())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize> {
        for &byte in data {
            if byte == b'\n' {
                let line = std::mem::take(&mut self.line);
                self.handle_line(&line);
            } else {
                self.line.push(byte);
            }
        }
        Ok(data.len())
    }

    fn pending_inbound(&mut self) -> Result<usize> {
        Ok(self.outbound.len())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_query_is_answered_with_status() {
        let record =
            ConfigurationRecord::from_values(ProtocolVariant::Reduced, &[1, 2, 3, 4, 5, 6, 7])
                .unwrap();
        let mut sim = DeviceSimulator::with_record(record);
        let query = build_sentence(&[None; 7]).unwrap();
        sim.write_bytes(&query).unwrap();

        let mut reply = Vec::new();
        while let Some(byte) = sim.read_byte().unwrap() {
            reply.push(byte);
        }
        let text = String::from_utf8(reply).unwrap();
        assert!(text.starts_with("$PSMCFG,1,2,3,4,5,6,7*"), "{text}");
        assert!(text.ends_with("\r\n"));
    }

    #[test]
    fn test_edit_applies_only_non_blank_fields() {
        let record = ConfigurationRecord::from_values(ProtocolVariant::Full, &[9; 8]).unwrap();
        let mut sim = DeviceSimulator::with_record(record);
        let mut fields = vec![None; 8];
        fields[4] = Some(33);
        sim.write_bytes(&build_sentence(&fields).unwrap()).unwrap();
        assert_eq!(sim.record().values(), &[9, 9, 9, 9, 33, 9, 9, 9]);
        assert_eq!(sim.received().len(), 1);
    }

    #[test]
    fn test_burst_queues_several_sentences() {
        let mut sim = DeviceSimulator::new(ProtocolVariant::Full).with_burst(3);
        sim.write_bytes(&build_sentence(&[None; 8]).unwrap()).unwrap();
        let single = build_sentence(&[Some(0); 8]).unwrap().len();
        assert_eq!(sim.pending_inbound().unwrap(), single * 3);
    }

    #[test]
    fn test_split_writes_are_reassembled() {
        let mut sim = DeviceSimulator::new(ProtocolVariant::Full);
        let query = build_sentence(&[None; 8]).unwrap();
        let (head, tail) = query.split_at(5);
        sim.write_bytes(head).unwrap();
        assert_eq!(sim.pending_inbound().unwrap(), 0);
        sim.write_bytes(tail).unwrap();
        assert!(sim.pending_inbound().unwrap() > 0);
    }
}
