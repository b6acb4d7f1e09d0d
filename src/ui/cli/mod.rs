//! CLI - reedline-based REPL interface
//!
//! Reads lines with history support and hands them to the dispatcher. The
//! prompt always shows the cached device state.

use anyhow::Result;
use colored::Colorize;
use reedline::{
    FileBackedHistory, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus,
    Reedline, Signal,
};
use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::app::{Dispatcher, Flow};
use crate::core::{DeviceState, Session};

/// Number of history entries kept on disk
pub const HISTORY_SIZE: usize = 1024;

/// `~/.local/share/rvdbg/.history`
pub fn default_history_path() -> Option<PathBuf> {
    home::home_dir().map(|home| history_path_in(&home))
}

fn history_path_in(home: &Path) -> PathBuf {
    home.join(".local").join("share").join("rvdbg").join(".history")
}

/// Prompt showing port and device state, e.g. `/dev/ttyUSB0:HALTED> `
pub struct DebuggerPrompt {
    port: Option<String>,
    state: DeviceState,
}

impl DebuggerPrompt {
    pub fn new(session: &Session) -> Self {
        Self {
            port: session.port().map(str::to_string),
            state: session.state(),
        }
    }

    pub fn text(&self) -> String {
        match (&self.port, self.state) {
            (Some(port), state) if state != DeviceState::Disconnected => {
                format!("{}:{}", port, state)
            }
            _ => self.state.to_string(),
        }
    }
}

impl Prompt for DebuggerPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Owned(self.text())
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "(failed) ",
        };
        Cow::Owned(format!("(search: {}{}) ", prefix, history_search.term))
    }
}

fn create_editor(history: Option<PathBuf>) -> Reedline {
    let editor = Reedline::create();

    let Some(path) = history else {
        return editor;
    };

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            log::warn!("Cannot create history directory {}: {}", parent.display(), e);
            return editor;
        }
    }

    match FileBackedHistory::with_file(HISTORY_SIZE, path.clone()) {
        Ok(history) => {
            log::debug!("History file: {}", path.display());
            editor.with_history(Box::new(history))
        }
        Err(e) => {
            log::warn!("History disabled, cannot open {}: {}", path.display(), e);
            editor
        }
    }
}

/// Run the CLI REPL until `exit` or end of input.
///
/// With `port` set, a `connect` is issued before the first prompt.
pub fn run_cli(
    dispatcher: &mut Dispatcher,
    port: Option<&str>,
    history: Option<PathBuf>,
) -> Result<()> {
    let mut line_editor = create_editor(history);

    println!(
        "{}",
        "╔══════════════════════════════════════════════════════════════╗".cyan()
    );
    println!(
        "{}",
        "║  rvdbg - Type 'help' for commands, 'exit' to quit            ║".cyan()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════════════╝".cyan()
    );

    if let Some(port) = port {
        dispatcher.execute(&format!("connect {}", port), &mut io::stdout())?;
    }

    loop {
        let prompt = DebuggerPrompt::new(dispatcher.session());
        let sig = line_editor.read_line(&prompt)?;
        match sig {
            Signal::Success(buffer) => {
                if dispatcher.execute(&buffer, &mut io::stdout())? == Flow::Exit {
                    break;
                }
            }
            Signal::CtrlC => continue,
            Signal::CtrlD => {
                println!("\n[*] End of input");
                break;
            }
        }
    }

    dispatcher.shutdown();
    if let Err(e) = line_editor.sync_history() {
        log::warn!("Failed to save history: {}", e);
    }

    Ok(())
}
