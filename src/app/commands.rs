//! Command processing
//!
//! The command table: every shell command with its arity, its guard chain and
//! the handler that runs once all guards passed.

use std::io::{self, Write};

use colored::Colorize;

use super::guard::{Guard, DISCONNECTED};
use crate::core::{DebugError, DeviceState, Session};
use crate::disasm::{format_assembly, location_start, Decoder, LOCATION_WINDOW};

/// What the shell should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Everything a handler may touch.
pub struct CommandContext<'a> {
    pub session: &'a mut Session,
    pub decoder: &'a dyn Decoder,
    pub(super) sink: &'a mut dyn Write,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        session: &'a mut Session,
        decoder: &'a dyn Decoder,
        sink: &'a mut dyn Write,
    ) -> Self {
        Self {
            session,
            decoder,
            sink,
        }
    }

    /// Output sink. Raw responses recorded by the session so far are written
    /// first, so they precede whatever the handler prints about them.
    pub fn out(&mut self) -> io::Result<&mut dyn Write> {
        self.flush_echo()?;
        Ok(&mut *self.sink)
    }

    pub fn flush_echo(&mut self) -> io::Result<()> {
        for line in self.session.take_echo() {
            writeln!(self.sink, "{}", line)?;
        }
        Ok(())
    }
}

pub type Handler = fn(&mut CommandContext<'_>, &[&str]) -> Result<Flow, DebugError>;

pub struct CommandDescriptor {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub arity: usize,
    pub guards: &'static [Guard],
    pub handler: Handler,
}

const NOT_DISCONNECTED: Guard = Guard::Exclude(DeviceState::Disconnected, DISCONNECTED);

pub static COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor {
        name: "connect",
        usage: "connect [port]",
        help: "Connect to the on-chip debugger using the given serial port",
        arity: 1,
        guards: &[Guard::Require(
            DeviceState::Disconnected,
            "Can't connect: Already connected",
        )],
        handler: do_connect,
    },
    CommandDescriptor {
        name: "disconnect",
        usage: "disconnect",
        help: "Close the connection to the on-chip debugger",
        arity: 0,
        guards: &[NOT_DISCONNECTED],
        handler: do_disconnect,
    },
    CommandDescriptor {
        name: "exit",
        usage: "exit",
        help: "Disconnect and quit the debugger",
        arity: 0,
        guards: &[],
        handler: do_exit,
    },
    CommandDescriptor {
        name: "halt",
        usage: "halt",
        help: "Halt CPU execution",
        arity: 0,
        guards: &[
            NOT_DISCONNECTED,
            Guard::Exclude(DeviceState::Halted, "CPU is already halted"),
        ],
        handler: do_halt,
    },
    CommandDescriptor {
        name: "resume",
        usage: "resume",
        help: "Resume CPU execution",
        arity: 0,
        guards: &[
            NOT_DISCONNECTED,
            Guard::Require(DeviceState::Halted, "CPU is already running"),
        ],
        handler: do_resume,
    },
    CommandDescriptor {
        name: "step",
        usage: "step",
        help: "Execute a single instruction",
        arity: 0,
        guards: &[
            NOT_DISCONNECTED,
            Guard::Require(
                DeviceState::Halted,
                "Can only single step when CPU execution is halted",
            ),
        ],
        handler: do_step,
    },
    CommandDescriptor {
        name: "step_location",
        usage: "step_location",
        help: "Execute a single instruction and show the new location",
        arity: 0,
        guards: &[
            NOT_DISCONNECTED,
            Guard::Require(
                DeviceState::Halted,
                "Can only single step when CPU execution is halted",
            ),
        ],
        handler: do_step_location,
    },
    CommandDescriptor {
        name: "location",
        usage: "location",
        help: "Show the instructions around the program counter",
        arity: 0,
        guards: &[
            NOT_DISCONNECTED,
            Guard::Require(
                DeviceState::Halted,
                "Can't show position in firmware when CPU is running. Halt execution first.",
            ),
        ],
        handler: do_location,
    },
    CommandDescriptor {
        name: "disassemble",
        usage: "disassemble [start address] [length]",
        help: "Disassemble a section of target memory",
        arity: 2,
        guards: &[NOT_DISCONNECTED],
        handler: do_disassemble,
    },
    CommandDescriptor {
        name: "read_memory",
        usage: "read_memory [source]",
        help: "Read the word at the given address",
        arity: 1,
        guards: &[
            NOT_DISCONNECTED,
            Guard::Require(
                DeviceState::Halted,
                "Can't perform memory read on running CPU. Halt execution first.",
            ),
        ],
        handler: do_read_memory,
    },
    CommandDescriptor {
        name: "write_memory",
        usage: "write_memory [destination] [value]",
        help: "Write a word to the given address",
        arity: 2,
        guards: &[
            NOT_DISCONNECTED,
            Guard::Require(
                DeviceState::Halted,
                "Can't perform memory write on running CPU. Halt execution first.",
            ),
        ],
        handler: do_write_memory,
    },
    CommandDescriptor {
        name: "pc",
        usage: "pc",
        help: "Show the current program counter",
        arity: 0,
        guards: &[NOT_DISCONNECTED],
        handler: do_pc,
    },
    CommandDescriptor {
        name: "breakpoint",
        usage: "breakpoint [address]",
        help: "Arm the hardware breakpoint, replacing any previous one",
        arity: 1,
        guards: &[NOT_DISCONNECTED],
        handler: do_breakpoint,
    },
    CommandDescriptor {
        name: "clear_breakpoint",
        usage: "clear_breakpoint",
        help: "Disarm the hardware breakpoint",
        arity: 0,
        guards: &[NOT_DISCONNECTED],
        handler: do_clear_breakpoint,
    },
    CommandDescriptor {
        name: "show_responses",
        usage: "show_responses",
        help: "Print the raw responses received over the serial connection",
        arity: 0,
        guards: &[],
        handler: do_show_responses,
    },
    CommandDescriptor {
        name: "hide_responses",
        usage: "hide_responses",
        help: "Stop printing raw responses",
        arity: 0,
        guards: &[],
        handler: do_hide_responses,
    },
    CommandDescriptor {
        name: "query_state",
        usage: "query_state",
        help: "Ask the device for its run state",
        arity: 0,
        guards: &[NOT_DISCONNECTED],
        handler: do_query_state,
    },
    CommandDescriptor {
        name: "help",
        usage: "help",
        help: "Show this help",
        arity: 0,
        guards: &[],
        handler: do_help,
    },
];

/// Shortcuts that resolve to a canonical command without prefix matching.
pub static ALIASES: &[(&str, &str)] = &[
    ("c", "connect"),
    ("r", "resume"),
    ("mr", "read_memory"),
    ("mw", "write_memory"),
    ("sl", "step_location"),
    ("show", "location"),
    ("q", "exit"),
    ("quit", "exit"),
    ("?", "help"),
];

/// Commands that are never reached through an abbreviation.
pub static NO_SHORTCUT: &[&str] = &[
    "help",
    "show_responses",
    "hide_responses",
    "read_memory",
    "write_memory",
    "step_location",
    "disconnect",
];

/// Looks up a command by its canonical name.
pub fn find(name: &str) -> Option<&'static CommandDescriptor> {
    COMMANDS.iter().find(|command| command.name == name)
}

/// Parses an integer argument, the radix given by its prefix.
///
/// Accepts `0x`, `0o` and `0b` prefixes or plain decimal, with optional `_`
/// separators. The value has to fit in 32 bits.
pub fn parse_number(s: &str) -> Result<u32, DebugError> {
    let cleaned = s.trim().replace('_', "");
    let lower = cleaned.to_ascii_lowercase();

    let (digits, radix) = if let Some(hex) = lower.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        (oct, 8)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (bin, 2)
    } else {
        (lower.as_str(), 10)
    };

    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(DebugError::InvalidArgument(format!("invalid number '{}'", s)));
    }

    u32::from_str_radix(digits, radix)
        .map_err(|e| DebugError::InvalidArgument(format!("invalid number '{}': {}", s, e)))
}

fn do_connect(ctx: &mut CommandContext<'_>, args: &[&str]) -> Result<Flow, DebugError> {
    let state = ctx.session.connect(args[0])?;
    writeln!(ctx.out()?, "Connected to {} ({})", args[0], state)?;
    Ok(Flow::Continue)
}

fn do_disconnect(ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<Flow, DebugError> {
    ctx.session.disconnect()?;
    Ok(Flow::Continue)
}

fn do_exit(ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<Flow, DebugError> {
    if ctx.session.is_connected() {
        ctx.session.disconnect()?;
    }
    Ok(Flow::Exit)
}

fn do_halt(ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<Flow, DebugError> {
    ctx.session.halt()?;
    Ok(Flow::Continue)
}

fn do_resume(ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<Flow, DebugError> {
    ctx.session.resume()?;

    // A breakpoint may already have stopped the CPU again. A failed poll
    // leaves the resume standing.
    match ctx.session.refresh_state() {
        Ok(DeviceState::Halted) => {
            writeln!(ctx.out()?, "CPU halted again right after resuming")?
        }
        Ok(_) => {}
        Err(e) => {
            log::warn!("State poll after resume failed: {}", e);
            writeln!(ctx.out()?, "CPU resumed, but the state poll failed: {}", e)?;
        }
    }
    Ok(Flow::Continue)
}

fn do_step(ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<Flow, DebugError> {
    ctx.session.step()?;
    Ok(Flow::Continue)
}

fn do_step_location(ctx: &mut CommandContext<'_>, args: &[&str]) -> Result<Flow, DebugError> {
    do_step(ctx, args)?;
    do_location(ctx, args)
}

fn do_location(ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<Flow, DebugError> {
    let pc = ctx.session.retrieve_pc()?;
    let start = location_start(pc);
    let instructions = ctx.session.read_block(start, LOCATION_WINDOW * 4)?;

    let listing = format_assembly(start, Some(pc), &instructions, ctx.decoder);
    write!(ctx.out()?, "{}", listing)?;
    Ok(Flow::Continue)
}

fn do_disassemble(ctx: &mut CommandContext<'_>, args: &[&str]) -> Result<Flow, DebugError> {
    let start = parse_number(args[0])?;
    let length = parse_number(args[1])?;
    let instructions = ctx.session.read_block(start, length)?;

    let listing = format_assembly(start, None, &instructions, ctx.decoder);
    write!(ctx.out()?, "{}", listing)?;
    Ok(Flow::Continue)
}

fn do_read_memory(ctx: &mut CommandContext<'_>, args: &[&str]) -> Result<Flow, DebugError> {
    let address = parse_number(args[0])?;
    let value = ctx.session.read_word(address)?;
    writeln!(ctx.out()?, "Memory read result: {:#010x}", value)?;
    Ok(Flow::Continue)
}

fn do_write_memory(ctx: &mut CommandContext<'_>, args: &[&str]) -> Result<Flow, DebugError> {
    let address = parse_number(args[0])?;
    let value = parse_number(args[1])?;
    ctx.session.write_word(address, value)?;
    Ok(Flow::Continue)
}

fn do_pc(ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<Flow, DebugError> {
    let pc = ctx.session.retrieve_pc()?;
    writeln!(ctx.out()?, "Current PC value: {:#010x}", pc)?;
    Ok(Flow::Continue)
}

fn do_breakpoint(ctx: &mut CommandContext<'_>, args: &[&str]) -> Result<Flow, DebugError> {
    let address = parse_number(args[0])?;
    let previous = ctx.session.breakpoint();
    ctx.session.set_breakpoint(address)?;

    match previous {
        Some(old) if old != address => writeln!(
            ctx.out()?,
            "Breakpoint set at {:#010x} (replaces {:#010x})",
            address, old
        )?,
        _ => writeln!(ctx.out()?, "Breakpoint set at {:#010x}", address)?,
    }
    Ok(Flow::Continue)
}

fn do_clear_breakpoint(ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<Flow, DebugError> {
    ctx.session.clear_breakpoint()?;
    writeln!(ctx.out()?, "Breakpoint cleared")?;
    Ok(Flow::Continue)
}

fn do_show_responses(ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<Flow, DebugError> {
    ctx.session.set_show_responses(true);
    Ok(Flow::Continue)
}

fn do_hide_responses(ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<Flow, DebugError> {
    ctx.session.set_show_responses(false);
    Ok(Flow::Continue)
}

fn do_query_state(ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<Flow, DebugError> {
    let state = ctx.session.refresh_state()?;
    writeln!(ctx.out()?, "CPU state: {}", state)?;
    Ok(Flow::Continue)
}

fn do_help(ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<Flow, DebugError> {
    writeln!(ctx.out()?, "{}", "rvdbg commands".bold().cyan())?;
    writeln!(ctx.out()?, "{}", "═".repeat(50).cyan())?;

    for command in COMMANDS {
        writeln!(ctx.out()?, "  {:38} {}", command.usage.green(), command.help)?;
    }

    writeln!(ctx.out()?, "\n{}", "Shortcuts:".bold().yellow())?;
    for (alias, target) in ALIASES {
        writeln!(ctx.out()?, "  {:6} -> {}", alias.green(), target)?;
    }
    writeln!(
        ctx.out()?,
        "\nCommands may be abbreviated to any unambiguous prefix."
    )?;
    Ok(Flow::Continue)
}
