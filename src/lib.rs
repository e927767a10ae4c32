//! A small interactive shell for everyday filesystem chores.
//!
//! Lines are split on whitespace; the first token picks a command from a fixed
//! registry (`ls`, `cd`, `pwd`, `mkdir`, `rm`, `cp`, `mv`, `touch`, `cat`,
//! `echo`, `clear`, `help`, `exit`) and the rest become its arguments. There is
//! no quoting, globbing or piping; the only redirection is `echo ... > file`.
//!
//! The main entry point is [`Interpreter`]. The public modules [`command`] and
//! [`env`] expose the traits and session state needed to plug in extra commands.

mod builtin;
pub mod command;
mod config;
pub mod env;
mod error;
mod interpreter;
mod io_adapters;
mod lexer;

pub use config::ShellConfig;
pub use error::ShellError;
pub use interpreter::Interpreter;
pub use io_adapters::{BufReadSource, LineSource};
