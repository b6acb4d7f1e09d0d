//! Transport - byte stream to the on-chip debugger
//!
//! The session only needs an ordered, byte-preserving duplex stream whose reads
//! give up after a bounded timeout. The serial port is the production
//! implementation; tests plug in scripted or simulated streams.

use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{DataBits, Parity, StopBits};

use super::error::DebugError;

/// A duplex byte stream to the device.
pub trait Transport: Read + Write {}

impl<T: Read + Write + ?Sized> Transport for T {}

/// Opens transports by port name.
pub trait Connector {
    fn open(&mut self, port: &str) -> Result<Box<dyn Transport>, DebugError>;
}

/// Serial link parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            timeout: Duration::from_secs(1),
        }
    }
}

/// Opens 8N1 serial ports with the configured baud rate and read timeout.
#[derive(Debug, Clone, Default)]
pub struct SerialConnector {
    config: SerialConfig,
}

impl SerialConnector {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> SerialConfig {
        self.config
    }
}

impl Connector for SerialConnector {
    fn open(&mut self, port: &str) -> Result<Box<dyn Transport>, DebugError> {
        log::debug!(
            "Opening {} at {} baud (timeout {:?})",
            port,
            self.config.baud_rate,
            self.config.timeout
        );

        let serial = serialport::new(port, self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(self.config.timeout)
            .open()
            .map_err(|e| DebugError::Connection(format!("Failed to open {}: {}", port, e)))?;

        Ok(Box::new(serial))
    }
}

/// Reads until `buf` is full, the stream ends or the read times out.
///
/// Returns the number of bytes actually read. A timeout is not an error here:
/// the caller sees it as a short read.
pub fn read_full(stream: &mut dyn Transport, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;

    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => break,
            Err(e) => return Err(e),
        }
    }

    Ok(filled)
}
