//! A simulated on-chip debugger speaking the wire protocol.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::rc::Rc;

use rvdbg::app::Dispatcher;
use rvdbg::core::{Connector, DebugError, Session, Transport};
use rvdbg::disasm::Rv32Decoder;

/// Device side of the protocol
#[derive(Debug, Default)]
pub struct Device {
    pub memory: HashMap<u32, u32>,
    pub halted: bool,
    pub pc: u32,
    pub breakpoint: Option<u32>,
    /// State queries left unanswered before the device wakes up
    pub mute_state_queries: usize,
    /// Every command received, opcode and payload
    pub received: Vec<Vec<u8>>,
    pub open: bool,
}

impl Device {
    fn payload_len(opcode: &[u8]) -> usize {
        match opcode {
            b"+MR" | b"+BS" => 4,
            b"+MW" => 8,
            _ => 0,
        }
    }

    fn word(bytes: &[u8]) -> u32 {
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn handle(&mut self, command: &[u8]) -> Vec<u8> {
        self.received.push(command.to_vec());
        let (opcode, payload) = command.split_at(3);

        let mut response = b"OK".to_vec();
        match opcode {
            b"+ST" => {
                if self.mute_state_queries > 0 {
                    self.mute_state_queries -= 1;
                    return Vec::new();
                }
                response.push(if self.halted { b'H' } else { b'R' });
            }
            b"+PC" => response.extend_from_slice(&self.pc.to_be_bytes()),
            b"+HL" => self.halted = true,
            b"+RE" => match self.breakpoint {
                // Runs straight into the breakpoint.
                Some(address) => {
                    self.pc = address;
                    self.halted = true;
                }
                None => self.halted = false,
            },
            b"+SS" if self.halted => self.pc = self.pc.wrapping_add(4),
            b"+MR" => {
                let value = self.memory.get(&Self::word(payload)).copied().unwrap_or(0);
                response.extend_from_slice(&value.to_be_bytes());
            }
            b"+MW" => {
                self.memory
                    .insert(Self::word(payload), Self::word(&payload[4..]));
            }
            b"+BS" => self.breakpoint = Some(Self::word(payload)),
            b"+BC" => self.breakpoint = None,
            _ => return b"NO".to_vec(),
        }
        response
    }
}

pub type SharedDevice = Rc<RefCell<Device>>;

pub struct SimTransport {
    device: SharedDevice,
    incoming: Vec<u8>,
    outgoing: VecDeque<u8>,
}

impl Write for SimTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.incoming.extend_from_slice(buf);

        while self.incoming.len() >= 3 {
            let needed = 3 + Device::payload_len(&self.incoming[..3]);
            if self.incoming.len() < needed {
                break;
            }
            let command: Vec<u8> = self.incoming.drain(..needed).collect();
            let response = self.device.borrow_mut().handle(&command);
            self.outgoing.extend(response);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for SimTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.outgoing.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no response"));
        }
        let n = buf.len().min(self.outgoing.len());
        for (slot, byte) in buf.iter_mut().zip(self.outgoing.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Drop for SimTransport {
    fn drop(&mut self) {
        self.device.borrow_mut().open = false;
    }
}

pub struct SimConnector {
    device: SharedDevice,
}

impl Connector for SimConnector {
    fn open(&mut self, port: &str) -> Result<Box<dyn Transport>, DebugError> {
        if port != "/dev/sim" {
            return Err(DebugError::Connection(format!("No such port {}", port)));
        }
        self.device.borrow_mut().open = true;
        Ok(Box::new(SimTransport {
            device: self.device.clone(),
            incoming: Vec::new(),
            outgoing: VecDeque::new(),
        }))
    }
}

pub fn sim_session(device: Device) -> (Session, SharedDevice) {
    let device = Rc::new(RefCell::new(device));
    let connector = SimConnector {
        device: device.clone(),
    };
    (Session::new(Box::new(connector)), device)
}

pub fn connected_sim(device: Device) -> (Session, SharedDevice) {
    let (mut session, device) = sim_session(device);
    session.connect("/dev/sim").expect("simulated device must answer");
    device.borrow_mut().received.clear();
    (session, device)
}

pub fn sim_dispatcher(device: Device) -> (Dispatcher, SharedDevice) {
    let (session, device) = sim_session(device);
    (
        Dispatcher::new(session, Box::new(Rv32Decoder::new())),
        device,
    )
}

/// Runs `line` and returns everything written to the user.
pub fn run(dispatcher: &mut Dispatcher, line: &str) -> String {
    let mut out = Vec::new();
    dispatcher
        .execute(line, &mut out)
        .expect("writing to a Vec cannot fail");
    String::from_utf8(out).expect("output is UTF-8")
}
