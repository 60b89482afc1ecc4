//! Mock Transport for Testing
//!
//! Replays a scripted sequence of inbound bytes and idle reads, and records
//! everything written, so protocol logic can be tested without hardware.

use std::collections::VecDeque;

use errors::{Result, SlcError};
use tracing::debug;

use super::Transport;

/// One scripted read result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEvent {
    /// A byte arrives
    Byte(u8),
    /// The per-byte timeout expires with nothing read
    Idle,
}

/// Scripted in-memory transport
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Remaining read script; an empty script reads as idle forever
    script: VecDeque<ReadEvent>,
    /// History of written chunks
    sent_data: Vec<Vec<u8>>,
    /// Whether write operations should fail
    should_fail_send: bool,
}

impl MockTransport {
    /// Create an empty (permanently silent) mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock whose inbound stream is exactly `data`
    pub fn with_bytes(data: &[u8]) -> Self {
        let mut mock = Self::new();
        mock.push_bytes(data);
        mock
    }

    /// Append bytes to the inbound script
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.script.extend(data.iter().copied().map(ReadEvent::Byte));
    }

    /// Append `count` idle reads to the inbound script
    pub fn push_idle(&mut self, count: usize) {
        self.script
            .extend(std::iter::repeat(ReadEvent::Idle).take(count));
    }

    /// Make every following write fail
    pub fn fail_sends(&mut self, fail: bool) {
        self.should_fail_send = fail;
    }

    /// All written chunks, oldest first
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_data
    }

    /// Written chunks as text
    pub fn sent_sentences(&self) -> Vec<String> {
        self.sent_data
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect()
    }

    /// Clear all sent data
    pub fn clear_sent_data(&mut self) {
        self.sent_data.clear();
    }

    /// Scripted bytes not yet read
    pub fn remaining_bytes(&self) -> usize {
        self.script
            .iter()
            .filter(|event| matches!(event, ReadEvent::Byte(_)))
            .count()
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        match self.script.pop_front() {
            Some(ReadEvent::Byte(byte)) => Ok(Some(byte)),
            Some(ReadEvent::Idle) | None => Ok(None),
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize> {
        if self.should_fail_send {
            return Err(SlcError::transport("Mock send failure"));
        }
        debug!("Mock sent {} bytes", data.len());
        self.sent_data.push(data.to_vec());
        Ok(data.len())
    }

    fn pending_inbound(&mut self) -> Result<usize> {
        Ok(self.remaining_bytes())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_mock_replays_script() {
        let mut mock = MockTransport::with_bytes(b"$A");
        mock.push_idle(1);
        mock.push_bytes(b"B");

        assert_eq!(mock.pending_inbound().unwrap(), 3);
        assert_eq!(mock.read_byte().unwrap(), Some(b'$'));
        assert_eq!(mock.read_byte().unwrap(), Some(b'A'));
        assert_eq!(mock.read_byte().unwrap(), None);
        assert_eq!(mock.read_byte().unwrap(), Some(b'B'));
        assert_eq!(mock.read_byte().unwrap(), None);
        assert_eq!(mock.pending_inbound().unwrap(), 0);
    }

    #[test]
    fn test_mock_records_writes() {
        let mut mock = MockTransport::new();
        assert_eq!(mock.write_bytes(b"Hello").unwrap(), 5);
        assert_eq!(mock.sent_sentences(), vec!["Hello".to_string()]);

        mock.fail_sends(true);
        assert!(mock.write_bytes(b"again").is_err());
        assert_eq!(mock.sent_data().len(), 1);
    }
}
