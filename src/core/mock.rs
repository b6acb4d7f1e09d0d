//! Scripted transport used by the unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;

use super::error::DebugError;
use super::session::Session;
use super::transport::{Connector, Transport};

/// Everything the mock saw, plus the responses it still has to give.
#[derive(Debug, Default)]
pub struct MockLog {
    pub writes: Vec<Vec<u8>>,
    pub responses: VecDeque<Vec<u8>>,
    pub opens: usize,
    pub closed: bool,
}

impl MockLog {
    /// Opcodes of all commands written so far, in order.
    pub fn opcodes(&self) -> Vec<String> {
        self.writes
            .iter()
            .map(|w| String::from_utf8_lossy(&w[..3.min(w.len())]).into_owned())
            .collect()
    }
}

pub type SharedLog = Rc<RefCell<MockLog>>;

/// Answers each written command with the next scripted response.
pub struct ScriptedTransport {
    log: SharedLog,
    pending: VecDeque<u8>,
}

impl Write for ScriptedTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut log = self.log.borrow_mut();
        log.writes.push(buf.to_vec());
        self.pending = log.responses.pop_front().unwrap_or_default().into();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for ScriptedTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        self.log.borrow_mut().closed = true;
    }
}

pub struct ScriptedConnector {
    log: SharedLog,
    fail_open: bool,
}

impl Connector for ScriptedConnector {
    fn open(&mut self, port: &str) -> Result<Box<dyn Transport>, DebugError> {
        if self.fail_open {
            return Err(DebugError::Connection(format!("Failed to open {}", port)));
        }
        let mut log = self.log.borrow_mut();
        log.opens += 1;
        log.closed = false;
        Ok(Box::new(ScriptedTransport {
            log: self.log.clone(),
            pending: VecDeque::new(),
        }))
    }
}

/// A disconnected session whose transport answers with `responses`.
pub fn scripted_session(responses: &[&[u8]]) -> (Session, SharedLog) {
    let log = SharedLog::default();
    log.borrow_mut()
        .responses
        .extend(responses.iter().map(|r| r.to_vec()));
    let connector = ScriptedConnector {
        log: log.clone(),
        fail_open: false,
    };
    (Session::new(Box::new(connector)), log)
}

/// A session whose port cannot be opened.
pub fn unopenable_session() -> (Session, SharedLog) {
    let log = SharedLog::default();
    let connector = ScriptedConnector {
        log: log.clone(),
        fail_open: true,
    };
    (Session::new(Box::new(connector)), log)
}

/// A session already connected in the given state, with the connect traffic
/// removed from the log.
pub fn connected_session(halted: bool, responses: &[&[u8]]) -> (Session, SharedLog) {
    let state: &[u8] = if halted { b"OKH" } else { b"OKR" };
    let mut script = vec![state];
    script.extend_from_slice(responses);

    let (mut session, log) = scripted_session(&script);
    session
        .connect("/dev/mock")
        .expect("scripted connect must succeed");
    log.borrow_mut().writes.clear();
    (session, log)
}
