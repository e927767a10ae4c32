//! Error types surfaced by the interpreter.

use rustyline::error::ReadlineError;
use thiserror::Error;

/// Everything that can go wrong while dispatching a line.
///
/// Builtins themselves report failures as [`anyhow::Error`] with context attached;
/// those end up in [`ShellError::Failed`] once they cross the command boundary.
#[derive(Error, Debug)]
pub enum ShellError {
    /// First token of the line does not name a registered command.
    #[error("Command not found: {0}")]
    UnknownCommand(String),

    /// Arguments were rejected by the command's parser.
    #[error("{message}\nusage: {usage}")]
    InvalidArgument {
        message: String,
        usage: &'static str,
    },

    /// The command ran and failed, usually on a filesystem call.
    #[error("{0:#}")]
    Failed(anyhow::Error),

    /// Console stream could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line editor failure other than end of input.
    #[error("readline error: {0}")]
    Readline(#[from] ReadlineError),
}
