//! Session - the single connection to the on-chip debugger
//!
//! Owns the transport, frames commands, performs blocking round trips and
//! validates the status prefix of every response. The cached device state is
//! only ever changed after the device confirmed an exchange.

use std::io::Write;

use super::error::DebugError;
use super::protocol::{DeviceState, Opcode, OP_STATE, STATUS_LEN, STATUS_OK};
use super::transport::{read_full, Connector, Transport};

/// How often connect polls the device state before giving up.
pub const CONNECT_ATTEMPTS: usize = 5;

pub struct Session {
    connector: Box<dyn Connector>,
    transport: Option<Box<dyn Transport>>,
    port: Option<String>,
    show_responses: bool,
    state: DeviceState,
    breakpoint: Option<u32>,
    echo: Vec<String>,
}

impl Session {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            transport: None,
            port: None,
            show_responses: false,
            state: DeviceState::Disconnected,
            breakpoint: None,
            echo: Vec::new(),
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Port name of the current connection
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.state != DeviceState::Disconnected
    }

    pub fn show_responses(&self) -> bool {
        self.show_responses
    }

    pub fn set_show_responses(&mut self, show: bool) {
        self.show_responses = show;
    }

    /// Raw response lines recorded while `show_responses` is on, oldest first.
    /// Draining them hands them to whoever prints command output.
    pub fn take_echo(&mut self) -> Vec<String> {
        std::mem::take(&mut self.echo)
    }

    /// Last breakpoint address armed through this session
    pub fn breakpoint(&self) -> Option<u32> {
        self.breakpoint
    }

    pub(crate) fn set_state(&mut self, state: DeviceState) {
        if self.state != state {
            log::info!("Device state {} -> {}", self.state, state);
        }
        self.state = state;
    }

    pub(crate) fn set_breakpoint_address(&mut self, address: Option<u32>) {
        self.breakpoint = address;
    }

    /// Opens `port` and learns the device state.
    ///
    /// The debugger does not always answer the first state queries after the
    /// port is opened, so up to [`CONNECT_ATTEMPTS`] queries are made. Only
    /// exhaustion is reported.
    pub fn connect(&mut self, port: &str) -> Result<DeviceState, DebugError> {
        if self.transport.is_some() || self.is_connected() {
            return Err(DebugError::Connection("Already connected".into()));
        }

        log::info!("Connecting to {}", port);
        self.transport = Some(self.connector.open(port)?);

        for attempt in 1..=CONNECT_ATTEMPTS {
            match self.query_state() {
                Ok(state) => {
                    self.port = Some(port.to_string());
                    self.set_state(state);
                    log::info!("Connected to {} after {} attempt(s)", port, attempt);
                    return Ok(state);
                }
                Err(e) => {
                    log::debug!(
                        "State query attempt {}/{} failed: {}",
                        attempt,
                        CONNECT_ATTEMPTS,
                        e
                    );
                }
            }
        }

        // Dropping the handle closes the port.
        self.transport = None;
        log::warn!("Giving up on {} after {} state queries", port, CONNECT_ATTEMPTS);
        Err(DebugError::Connection(
            "Could not retrieve current debugger state".into(),
        ))
    }

    /// Closes the connection. Disconnect has no wire command.
    pub fn disconnect(&mut self) -> Result<(), DebugError> {
        if !self.is_connected() {
            return Err(DebugError::State("Can't disconnect: Not connected".into()));
        }

        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.flush() {
                log::debug!("Flush before close failed: {}", e);
            }
        }

        log::info!("Disconnected from {}", self.port.as_deref().unwrap_or("?"));
        self.port = None;
        self.breakpoint = None;
        self.set_state(DeviceState::Disconnected);
        Ok(())
    }

    /// Performs one round trip and returns the response payload.
    ///
    /// `response_len` includes the two byte status prefix. Anything other than
    /// a complete response starting with `OK` is a rejection of `opcode`.
    pub fn send_command(
        &mut self,
        opcode: Opcode,
        payload: &[u8],
        response_len: usize,
    ) -> Result<Vec<u8>, DebugError> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| DebugError::State("Debugger is disconnected".into()))?;

        let mut command = Vec::with_capacity(opcode.len() + payload.len());
        command.extend_from_slice(&opcode);
        command.extend_from_slice(payload);

        log::trace!("-> {}", hex::encode(&command));
        transport.write_all(&command)?;
        transport.flush()?;

        let mut response = vec![0u8; response_len.max(STATUS_LEN)];
        let received = read_full(transport.as_mut(), &mut response)?;
        response.truncate(received);

        log::trace!("<- {}", hex::encode(&response));
        if self.show_responses {
            self.echo
                .push(format!("Response contents: {}", format_raw(&response)));
        }

        if received < response_len || !response.starts_with(STATUS_OK) {
            return Err(DebugError::RejectedCommand { opcode });
        }

        Ok(response.split_off(STATUS_LEN))
    }

    /// Asks the device for its run state without touching the cached state.
    pub(crate) fn query_state(&mut self) -> Result<DeviceState, DebugError> {
        let payload = self.send_command(OP_STATE, &[], STATUS_LEN + 1)?;
        let code = payload
            .first()
            .copied()
            .ok_or_else(|| DebugError::Decode("empty state response".into()))?;
        DeviceState::from_wire(code)
    }
}

/// Hex plus escaped ASCII, e.g. `4f4b48 "OKH"`.
fn format_raw(bytes: &[u8]) -> String {
    let ascii: String = bytes
        .iter()
        .flat_map(|b| std::ascii::escape_default(*b))
        .map(char::from)
        .collect();
    format!("{} \"{}\"", hex::encode(bytes), ascii)
}
