use crate::env::Environment;
use crate::error::ShellError;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Object-safe trait for any command that can be executed by the shell.
///
/// Builtins get this through a blanket impl; embedders may implement it directly.
pub trait ExecutableCommand {
    /// Executes the command, writing regular output to `stdout` and diagnostics to `stderr`.
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError>;
}

/// Registry entry that turns a name and its arguments into a runnable command.
pub trait CommandFactory {
    /// Name this factory answers to. Registering a second factory with the same
    /// name replaces the first.
    fn name(&self) -> &str;

    /// Attempt to create a command instance for the provided name and arguments.
    ///
    /// Returns `None` when the factory doesn't recognize the `name`.
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;
}
