//! Byte-stream framer
//!
//! Turns the inbound byte stream into sentence frames:
//! - `$` clears the buffer and restarts collection
//! - CR/LF ends the frame once at least two bytes were collected; an earlier
//!   terminator (a stray control character right after `$`) is dropped
//! - anything else is appended
//!
//! Idle reads (no byte within the transport's per-byte timeout) are counted;
//! enough consecutive ones end the attempt with whatever was collected.

use errors::Result;
use tracing::{debug, trace, warn};

use crate::codec::{MAX_SENTENCE_LEN, START_MARKER};
use crate::transport::Transport;

/// Bytes that must be buffered before a terminator may end a frame
pub const MIN_FRAME_LEN: usize = 2;

/// Framer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    Accumulating,
    FrameComplete,
}

/// Framer limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramerConfig {
    /// Consecutive idle reads before giving up on a frame
    pub max_idle_reads: u32,
    /// Buffer bound; an overflowing frame is dropped until the next `$`
    pub max_frame_len: usize,
    /// Bytes read in one attempt before giving up (guards a chattering line)
    pub max_bytes_per_frame: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            max_idle_reads: 3,
            max_frame_len: MAX_SENTENCE_LEN,
            max_bytes_per_frame: 1024,
        }
    }
}

/// Result of one framing attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A terminator ended the frame
    Complete(String),
    /// The transport went quiet (or kept chattering) before a terminator arrived
    TimedOut { partial: String, idle_reads: u32 },
}

impl FrameOutcome {
    /// Frame text, partial or not
    pub fn text(&self) -> &str {
        match self {
            Self::Complete(text) | Self::TimedOut { partial: text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Complete(text) | Self::TimedOut { partial: text, .. } => text,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

/// Sentence framer over a blocking byte source
#[derive(Debug)]
pub struct Framer {
    config: FramerConfig,
    state: FramerState,
    buffer: Vec<u8>,
    overflowed: bool,
}

impl Framer {
    pub fn new(config: FramerConfig) -> Self {
        Self {
            buffer: Vec::with_capacity(config.max_frame_len),
            config,
            state: FramerState::Accumulating,
            overflowed: false,
        }
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Bytes collected so far for the current frame
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = FramerState::Accumulating;
        self.overflowed = false;
    }

    /// Feed one byte; returns the frame (without terminator) when one completes
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        if self.state == FramerState::FrameComplete {
            self.reset();
        }

        match byte {
            START_MARKER => {
                if !self.buffer.is_empty() {
                    trace!("Resync on '$', dropping {} bytes", self.buffer.len());
                }
                self.buffer.clear();
                self.overflowed = false;
                None
            },
            _ if self.overflowed => None,
            b'\r' | b'\n' => {
                if self.buffer.len() < MIN_FRAME_LEN {
                    return None;
                }
                self.state = FramerState::FrameComplete;
                Some(std::mem::take(&mut self.buffer))
            },
            _ => {
                if self.buffer.len() >= self.config.max_frame_len {
                    warn!(
                        "Frame exceeds {} bytes, discarding until next '$'",
                        self.config.max_frame_len
                    );
                    self.buffer.clear();
                    self.overflowed = true;
                    return None;
                }
                self.buffer.push(byte);
                None
            },
        }
    }

    /// Read bytes until a frame completes or the line goes quiet.
    ///
    /// Transport errors propagate; timeouts come back as
    /// [`FrameOutcome::TimedOut`] carrying the partial buffer.
    pub fn next_frame<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<FrameOutcome> {
        self.reset();
        let mut idle_reads = 0u32;
        let mut bytes_read = 0usize;

        loop {
            match transport.read_byte()? {
                Some(byte) => {
                    idle_reads = 0;
                    bytes_read += 1;
                    if let Some(frame) = self.push(byte) {
                        let text = String::from_utf8_lossy(&frame).into_owned();
                        debug!("Frame from {}: {}", transport.name(), common::hex::printable(&frame));
                        return Ok(FrameOutcome::Complete(text));
                    }
                    if bytes_read >= self.config.max_bytes_per_frame {
                        return Ok(self.give_up(idle_reads));
                    }
                },
                None => {
                    idle_reads += 1;
                    if idle_reads >= self.config.max_idle_reads {
                        return Ok(self.give_up(idle_reads));
                    }
                },
            }
        }
    }

    fn give_up(&mut self, idle_reads: u32) -> FrameOutcome {
        let partial = String::from_utf8_lossy(&self.buffer).into_owned();
        self.reset();
        FrameOutcome::TimedOut {
            partial,
            idle_reads,
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(FramerConfig::default())
    }
}
