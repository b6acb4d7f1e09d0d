//! rvdbg - Interactive RISC-V on-chip debugger client
//!
//! Entry point that handles CLI argument parsing, logging setup and starts
//! the interactive shell.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use rvdbg::app::Dispatcher;
use rvdbg::core::SerialConfig;
use rvdbg::ui::cli::{default_history_path, run_cli};

/// rvdbg: Interactive RISC-V debugger
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serial port to use. Connects on startup.
    #[arg(short, long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// Read timeout of a single response, in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// History file (defaults to ~/.local/share/rvdbg/.history)
    #[arg(long)]
    history: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    // 1. Parse command line arguments
    let args = Args::parse();

    // 2. Initialize logger with verbosity level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        },
    ))
    .init();

    log::debug!("{:?}", args);

    let config = SerialConfig {
        baud_rate: args.baud,
        timeout: Duration::from_millis(args.timeout_ms),
    };
    let history = args.history.or_else(default_history_path);

    // 3. Run the shell; it owns the one session for the whole process
    let mut dispatcher = Dispatcher::with_serial(config);
    run_cli(&mut dispatcher, args.port.as_deref(), history)?;

    Ok(())
}
