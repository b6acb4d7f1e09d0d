//! Dispatcher - from a raw input line to a guarded handler call
//!
//! Resolves abbreviated command names, runs the arity check and the guard
//! chain, then the handler. Handler errors end up as one failure line; they
//! never leave the dispatcher.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

use colored::Colorize;

use super::commands::{
    self, CommandContext, CommandDescriptor, Flow, ALIASES, COMMANDS, NO_SHORTCUT,
};
use super::guard::{check_arity, evaluate};
use crate::core::{SerialConfig, SerialConnector, Session};
use crate::disasm::{Decoder, Rv32Decoder};

/// Maps abbreviated command names to canonical ones.
///
/// A token is expanded only when exactly one canonical name starts with it
/// and that name is not in the no-shortcut set. Denylisted names still count
/// as candidates, so they make a prefix ambiguous.
#[derive(Debug, Clone)]
pub struct PrefixResolver {
    canonical: Vec<&'static str>,
    aliases: HashMap<&'static str, &'static str>,
    no_shortcut: HashSet<&'static str>,
}

impl PrefixResolver {
    pub fn new(
        canonical: impl IntoIterator<Item = &'static str>,
        aliases: impl IntoIterator<Item = (&'static str, &'static str)>,
        no_shortcut: impl IntoIterator<Item = &'static str>,
    ) -> Self {
        Self {
            canonical: canonical.into_iter().collect(),
            aliases: aliases.into_iter().collect(),
            no_shortcut: no_shortcut.into_iter().collect(),
        }
    }

    /// Resolver over the shell's command table.
    pub fn for_commands() -> Self {
        Self::new(
            COMMANDS.iter().map(|c| c.name),
            ALIASES.iter().copied(),
            NO_SHORTCUT.iter().copied(),
        )
    }

    /// Rewrites `token` to a canonical name if that is unambiguous.
    ///
    /// Exact names and aliases come back unchanged, as do tokens that match
    /// nothing or more than one command.
    pub fn resolve<'a>(&'a self, token: &'a str) -> &'a str {
        let exact = self.canonical.iter().any(|name| *name == token);
        if exact || self.aliases.contains_key(token) {
            return token;
        }

        let mut candidates = self
            .canonical
            .iter()
            .copied()
            .filter(|name| name.starts_with(token));

        match (candidates.next(), candidates.next()) {
            (Some(only), None) if !self.no_shortcut.contains(only) => {
                log::debug!("Expanded '{}' to '{}'", token, only);
                only
            }
            _ => token,
        }
    }

    /// Canonical name for an exact name or alias.
    pub fn canonical_name(&self, name: &str) -> Option<&'static str> {
        self.aliases
            .get(name)
            .copied()
            .or_else(|| self.canonical.iter().copied().find(|c| *c == name))
    }
}

/// Owns the session for the lifetime of the shell and runs commands on it.
pub struct Dispatcher {
    session: Session,
    decoder: Box<dyn Decoder>,
    resolver: PrefixResolver,
}

impl Dispatcher {
    pub fn new(session: Session, decoder: Box<dyn Decoder>) -> Self {
        Self {
            session,
            decoder,
            resolver: PrefixResolver::for_commands(),
        }
    }

    /// Dispatcher talking to a serial port, decoding RV32IM.
    pub fn with_serial(config: SerialConfig) -> Self {
        let session = Session::new(Box::new(SerialConnector::new(config)));
        Self::new(session, Box::new(Rv32Decoder::new()))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn resolver(&self) -> &PrefixResolver {
        &self.resolver
    }

    fn lookup(&self, token: &str) -> Option<&'static CommandDescriptor> {
        let resolved = self.resolver.resolve(token);
        self.resolver
            .canonical_name(resolved)
            .and_then(commands::find)
    }

    /// Runs one input line, writing all user-facing output to `out`.
    ///
    /// Only failures to write to `out` are returned; command failures are
    /// reported on `out`.
    pub fn execute(&mut self, line: &str, out: &mut dyn Write) -> io::Result<Flow> {
        let line = line.trim();
        let (token, rest) = line
            .split_once(char::is_whitespace)
            .unwrap_or((line, ""));
        if token.is_empty() {
            return Ok(Flow::Continue);
        }

        let Some(command) = self.lookup(token) else {
            writeln!(out, "{} Unknown command: '{}'", "[!]".red(), token)?;
            writeln!(out, "    Type 'help' for available commands")?;
            return Ok(Flow::Continue);
        };

        let args: Vec<&str> = rest.split_whitespace().collect();
        if let Err(usage) = check_arity(&args, command.arity, command.usage) {
            writeln!(out, "{}", usage)?;
            return Ok(Flow::Continue);
        }

        if let Err(message) = evaluate(command.guards, self.session.state()) {
            log::debug!("'{}' refused in state {}", command.name, self.session.state());
            writeln!(out, "{}", message)?;
            return Ok(Flow::Continue);
        }

        let mut ctx = CommandContext::new(&mut self.session, self.decoder.as_ref(), &mut *out);
        let result = (command.handler)(&mut ctx, &args);
        ctx.flush_echo()?;

        match result {
            Ok(flow) => Ok(flow),
            Err(e) => {
                log::debug!("'{}' failed: {:?}", command.name, e);
                writeln!(
                    out,
                    "{} Failed to execute '{}': {}",
                    "[!]".red(),
                    command.name,
                    e
                )?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Leaves the session disconnected, for shutdown paths that bypass `exit`.
    pub fn shutdown(&mut self) {
        if self.session.is_connected() {
            if let Err(e) = self.session.disconnect() {
                log::warn!("Disconnect on shutdown failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock::{connected_session, scripted_session, SharedLog};
    use crate::core::DeviceState;

    fn dispatcher(session: Session) -> Dispatcher {
        Dispatcher::new(session, Box::new(Rv32Decoder::new()))
    }

    fn run(dispatcher: &mut Dispatcher, line: &str) -> (Flow, String) {
        let mut out = Vec::new();
        let flow = dispatcher.execute(line, &mut out).unwrap();
        (flow, String::from_utf8(out).unwrap())
    }

    fn writes(log: &SharedLog) -> usize {
        log.borrow().writes.len()
    }

    #[test]
    fn test_prefix_resolution_with_denylist() {
        let resolver = PrefixResolver::new(
            ["halt", "hide_responses"],
            Vec::<(&'static str, &'static str)>::new(),
            ["hide_responses"],
        );

        assert_eq!(resolver.resolve("ha"), "halt");
        assert_eq!(resolver.resolve("halt"), "halt");
        // Two candidates, even though one of them is denylisted.
        assert_eq!(resolver.resolve("h"), "h");
        // The only candidate is denylisted.
        assert_eq!(resolver.resolve("hide"), "hide");
        assert_eq!(resolver.resolve("hide_responses"), "hide_responses");
        assert_eq!(resolver.resolve("x"), "x");
    }

    #[test]
    fn test_aliases_bypass_prefix_matching() {
        let resolver = PrefixResolver::for_commands();
        assert_eq!(resolver.resolve("mr"), "mr");
        assert_eq!(resolver.canonical_name("mr"), Some("read_memory"));
        assert_eq!(resolver.canonical_name("show"), Some("location"));
        assert_eq!(resolver.resolve("disas"), "disassemble");
        assert_eq!(resolver.resolve("read"), "read");
        assert_eq!(resolver.resolve("s"), "s");
    }

    #[test]
    fn test_ambiguous_prefix_is_unknown() {
        let (session, log) = connected_session(true, &[]);
        let mut dispatcher = dispatcher(session);

        let (flow, out) = run(&mut dispatcher, "h");
        assert_eq!(flow, Flow::Continue);
        assert!(out.contains("Unknown command: 'h'"));
        assert_eq!(writes(&log), 0);
    }

    #[test]
    fn test_abbreviated_halt() {
        let (session, log) = connected_session(false, &[b"OK"]);
        let mut dispatcher = dispatcher(session);

        run(&mut dispatcher, "ha");
        assert_eq!(dispatcher.session().state(), DeviceState::Halted);
        assert_eq!(log.borrow().opcodes(), vec!["+HL"]);
    }

    #[test]
    fn test_resume_while_running_is_refused() {
        let (session, log) = connected_session(false, &[]);
        let mut dispatcher = dispatcher(session);

        let (_, out) = run(&mut dispatcher, "resume");
        assert!(out.contains("already running"));
        assert_eq!(writes(&log), 0);
    }

    #[test]
    fn test_disconnected_guards() {
        let (session, log) = scripted_session(&[]);
        let mut dispatcher = dispatcher(session);

        for line in [
            "halt",
            "resume",
            "step",
            "location",
            "read_memory 0x100",
            "write_memory 0x100 1",
            "disassemble 0x100 8",
            "pc",
            "breakpoint 0x100",
            "clear_breakpoint",
            "query_state",
            "disconnect",
        ] {
            let (_, out) = run(&mut dispatcher, line);
            assert!(out.contains("disconnected"), "{}: {}", line, out);
        }
        assert_eq!(writes(&log), 0);
        assert_eq!(log.borrow().opens, 0);
    }

    #[test]
    fn test_arity_checked_before_state() {
        let (session, log) = scripted_session(&[]);
        let mut dispatcher = dispatcher(session);

        let (_, out) = run(&mut dispatcher, "read_memory");
        assert!(out.contains("expected exactly 1 argument"));
        assert!(out.contains("read_memory [source]"));

        let (_, out) = run(&mut dispatcher, "halt now");
        assert!(out.contains("expects no arguments"));
        assert_eq!(writes(&log), 0);
    }

    #[test]
    fn test_connect_then_refuse_second_connect() {
        let (session, log) = scripted_session(&[b"OKH"]);
        let mut dispatcher = dispatcher(session);

        let (_, out) = run(&mut dispatcher, "connect /dev/ttyUSB0");
        assert!(out.contains("Connected to /dev/ttyUSB0 (HALTED)"));

        let (_, out) = run(&mut dispatcher, "c /dev/ttyUSB1");
        assert!(out.contains("Already connected"));
        assert_eq!(log.borrow().opens, 1);
    }

    #[test]
    fn test_failed_connect_is_one_line() {
        let (session, _log) = scripted_session(&[b"NO_" as &[u8]; 5]);
        let mut dispatcher = dispatcher(session);

        let (flow, out) = run(&mut dispatcher, "connect /dev/ttyUSB0");
        assert_eq!(flow, Flow::Continue);
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("Failed to execute 'connect'"));
        assert_eq!(dispatcher.session().state(), DeviceState::Disconnected);
    }

    #[test]
    fn test_rejected_read_reports_opcode() {
        let (session, _log) = connected_session(true, &[b"NO\x00\x00\x00\x00"]);
        let mut dispatcher = dispatcher(session);

        let (_, out) = run(&mut dispatcher, "mr 0x100");
        assert!(out.contains("Failed to execute 'read_memory'"));
        assert!(out.contains("+MR"));
    }

    #[test]
    fn test_misaligned_write_does_no_io() {
        let (session, log) = connected_session(true, &[]);
        let mut dispatcher = dispatcher(session);

        let (_, out) = run(&mut dispatcher, "mw 0x102 7");
        assert!(out.contains("aligned"));
        assert_eq!(writes(&log), 0);
    }

    #[test]
    fn test_bad_number_is_reported() {
        let (session, log) = connected_session(true, &[]);
        let mut dispatcher = dispatcher(session);

        let (_, out) = run(&mut dispatcher, "mr banana");
        assert!(out.contains("invalid number 'banana'"));
        assert_eq!(writes(&log), 0);
    }

    #[test]
    fn test_read_memory_output() {
        let (session, _log) = connected_session(true, &[b"OK\x00\x00\x00\x2a"]);
        let mut dispatcher = dispatcher(session);

        let (_, out) = run(&mut dispatcher, "mr 0x40F0");
        assert_eq!(out.trim(), "Memory read result: 0x0000002a");
    }

    #[test]
    fn test_location_marks_pc() {
        let (session, log) = connected_session(
            true,
            &[
                b"OK\x00\x00\x01\x0c",
                b"OK\x00\x00\x00\x13",
                b"OK\x00\x00\x00\x13",
                b"OK\x05\x07\xa7\x03",
                b"OK\x00\x00\x00\x13",
                b"OK\x00\x00\x00\x13",
            ],
        );
        let mut dispatcher = dispatcher(session);

        let (_, out) = run(&mut dispatcher, "show");
        assert!(out.contains("-> 0000010c:  0507a703  lw a4,80(a5)"), "{}", out);
        assert_eq!(out.lines().count(), 5);
        assert_eq!(
            log.borrow().opcodes(),
            vec!["+PC", "+MR", "+MR", "+MR", "+MR", "+MR"]
        );
    }

    #[test]
    fn test_resume_polls_state() {
        let (session, log) = connected_session(true, &[b"OK", b"OKH"]);
        let mut dispatcher = dispatcher(session);

        let (_, out) = run(&mut dispatcher, "resume");
        assert!(out.contains("halted again"));
        assert_eq!(log.borrow().opcodes(), vec!["+RE", "+ST"]);
        assert_eq!(dispatcher.session().state(), DeviceState::Halted);
    }

    #[test]
    fn test_resume_survives_failed_poll() {
        let (session, log) = connected_session(true, &[b"OK", b"NO_"]);
        let mut dispatcher = dispatcher(session);

        let (flow, out) = run(&mut dispatcher, "resume");
        assert_eq!(flow, Flow::Continue);
        assert!(!out.contains("Failed to execute"), "{}", out);
        assert!(out.contains("CPU resumed, but the state poll failed"), "{}", out);
        assert!(out.contains("+ST"));
        assert_eq!(log.borrow().opcodes(), vec!["+RE", "+ST"]);
        assert_eq!(dispatcher.session().state(), DeviceState::Running);
    }

    #[test]
    fn test_raw_response_precedes_failure_line() {
        let (session, _log) = connected_session(true, &[b"NO\x00\x00\x00\x00"]);
        let mut dispatcher = dispatcher(session);

        run(&mut dispatcher, "show_responses");
        let (_, out) = run(&mut dispatcher, "mr 0x100");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2, "{}", out);
        assert_eq!(lines[0], "Response contents: 4e4f00000000 \"NO\\x00\\x00\\x00\\x00\"");
        assert!(lines[1].contains("Failed to execute 'read_memory'"));
    }

    #[test]
    fn test_raw_response_precedes_result() {
        let (session, _log) = connected_session(true, &[b"OK\x00\x00\x00\x2a"]);
        let mut dispatcher = dispatcher(session);

        run(&mut dispatcher, "show_responses");
        let (_, out) = run(&mut dispatcher, "mr 0x40F0");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Response contents: 4f4b0000002a \"OK\\x00\\x00\\x00*\"");
        assert_eq!(lines[1], "Memory read result: 0x0000002a");

        run(&mut dispatcher, "hide_responses");
        let (_, out) = run(&mut dispatcher, "query_state");
        assert!(!out.contains("Response contents"));
    }

    #[test]
    fn test_show_and_hide_responses() {
        let (session, _log) = scripted_session(&[]);
        let mut dispatcher = dispatcher(session);

        run(&mut dispatcher, "show_responses");
        assert!(dispatcher.session().show_responses());
        run(&mut dispatcher, "hide_responses");
        assert!(!dispatcher.session().show_responses());
    }

    #[test]
    fn test_exit_disconnects() {
        let (session, log) = connected_session(true, &[]);
        let mut dispatcher = dispatcher(session);

        let (flow, _) = run(&mut dispatcher, "exit");
        assert_eq!(flow, Flow::Exit);
        assert_eq!(dispatcher.session().state(), DeviceState::Disconnected);
        assert!(log.borrow().closed);
    }

    #[test]
    fn test_blank_line_is_ignored() {
        let (session, _log) = scripted_session(&[]);
        let mut dispatcher = dispatcher(session);

        let (flow, out) = run(&mut dispatcher, "   ");
        assert_eq!(flow, Flow::Continue);
        assert!(out.is_empty());
    }
}
