//! Transport layer
//!
//! The protocol engine only needs four operations from the link: read one
//! byte (with a per-byte timeout), write a whole sentence, report how many
//! inbound bytes are already queued, and a name for logs.

pub mod mock;
pub mod serial;
pub mod simulator;

use errors::Result;

pub use mock::{MockTransport, ReadEvent};
pub use serial::{port_name_for, SerialTransport, SerialTransportConfig};
pub use simulator::DeviceSimulator;

/// Blocking byte transport to the searchlight controller
pub trait Transport {
    /// Transport name for logs
    fn name(&self) -> &str;

    /// Read one byte; `Ok(None)` when nothing arrived within the per-byte timeout
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Write all bytes and flush; returns the count written
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize>;

    /// Inbound bytes already queued and readable without blocking
    fn pending_inbound(&mut self) -> Result<usize>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        (**self).read_byte()
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write_bytes(data)
    }

    fn pending_inbound(&mut self) -> Result<usize> {
        (**self).pending_inbound()
    }
}
