use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::error::ShellError;
use crate::interpreter::Factory;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// One-line synopsis shown when the arguments don't parse.
    fn usage() -> &'static str;

    /// Executes the command using provided output streams and session state.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        T::execute(*self, stdout, stderr, env).map_err(|e| match e.downcast::<ShellError>() {
            Ok(shell_err) => shell_err,
            Err(other) => ShellError::Failed(other),
        })
    }
}

/// Stand-in produced when argh refuses the arguments or answers `--help`.
struct InvalidArgs {
    output: String,
    is_error: bool,
    usage: &'static str,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        if self.is_error {
            return Err(ShellError::InvalidArgument {
                message: self.output.trim_end().to_string(),
                usage: self.usage,
            });
        }
        stdout.write_all(self.output.as_bytes())?;
        if !self.output.ends_with('\n') {
            writeln!(stdout)?;
        }
        Ok(0)
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn name(&self) -> &str {
        T::name()
    }

    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                    usage: T::usage(),
                }),
            })
        } else {
            None
        }
    }
}

fn missing_operand<T: BuiltinCommand>() -> anyhow::Error {
    ShellError::InvalidArgument {
        message: format!("{}: missing operand", T::name()),
        usage: T::usage(),
    }
    .into()
}

#[derive(FromArgs)]
/// List the entries of a directory, marking each as [DIR] or [FILE].
pub struct Ls {
    #[argh(switch, short = 'a')]
    /// include entries whose names start with a dot.
    pub all: bool,

    #[argh(positional)]
    /// directory to list; defaults to the current directory.
    pub path: Option<String>,
}

impl BuiltinCommand for Ls {
    fn name() -> &'static str {
        "ls"
    }

    fn usage() -> &'static str {
        "ls [-a] [dir]"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let dir = match &self.path {
            Some(p) => env.resolve(p),
            None => env.current_dir.clone(),
        };

        let mut entries = fs::read_dir(&dir)
            .and_then(|it| it.collect::<io::Result<Vec<_>>>())
            .with_context(|| format!("ls: cannot access {}", dir.display()))?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.all && name.starts_with('.') {
                continue;
            }
            let kind = if entry.path().is_dir() { "[DIR]" } else { "[FILE]" };
            writeln!(stdout, "{} {}", kind, name)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: String,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn usage() -> &'static str {
        "cd <path>"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let new_dir = env.resolve(&self.target);

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        info!(from = %env.current_dir.display(), to = %canonical.display(), "changed directory");
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn usage() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Create a directory along with any missing parents.
pub struct Mkdir {
    #[argh(positional)]
    /// directory to create; succeeds if it already exists.
    pub path: String,
}

impl BuiltinCommand for Mkdir {
    fn name() -> &'static str {
        "mkdir"
    }

    fn usage() -> &'static str {
        "mkdir <dir>"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let path = env.resolve(&self.path);
        fs::create_dir_all(&path)
            .with_context(|| format!("mkdir: cannot create directory {}", self.path))?;
        Ok(0)
    }
}

/// Remove files or directories.
///
/// `-r` (or `--recursive`) may appear anywhere and removes directories with
/// their contents. Every other token is a path, including ones that start
/// with a dash; everything after `--` is a path.
pub struct Rm {
    pub recursive: bool,
    pub paths: Vec<String>,
}

const RM_HELP: &str = "\
Usage: rm [-r] [--] <path...>

Remove files or directories.

Options:
  -r, --recursive   remove directories and their contents recursively
  --help            display usage information
";

impl FromArgs for Rm {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        let (options, operands) = match args.iter().position(|arg| *arg == "--") {
            Some(end) => (&args[..end], &args[end + 1..]),
            None => (args, &[][..]),
        };
        if options.contains(&"--help") {
            return Err(EarlyExit {
                output: RM_HELP.to_string(),
                status: Ok(()),
            });
        }
        let mut rm = Self {
            recursive: false,
            paths: Vec::with_capacity(args.len()),
        };
        for arg in options {
            match *arg {
                "-r" | "--recursive" => rm.recursive = true,
                path => rm.paths.push(path.to_string()),
            }
        }
        rm.paths.extend(operands.iter().map(|arg| arg.to_string()));
        Ok(rm)
    }
}

fn remove_path(path: &Path, recursive: bool) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        if recursive {
            fs::remove_dir_all(path)
        } else {
            fs::remove_dir(path)
        }
    } else {
        fs::remove_file(path)
    }
}

impl BuiltinCommand for Rm {
    fn name() -> &'static str {
        "rm"
    }

    fn usage() -> &'static str {
        "rm [-r] <path>..."
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.paths.is_empty() {
            return Err(missing_operand::<Self>());
        }

        let mut exit_code = 0;
        for raw in &self.paths {
            let path = env.resolve(raw);
            debug!(path = %path.display(), recursive = self.recursive, "removing");
            if let Err(e) = remove_path(&path, self.recursive) {
                writeln!(stderr, "rm: cannot remove '{}': {}", raw, e)?;
                exit_code = 1;
            }
        }
        Ok(exit_code)
    }
}

#[derive(FromArgs)]
/// Copy a file or a directory tree, overwriting existing files at the destination.
pub struct Cp {
    #[argh(positional)]
    /// file or directory to copy.
    pub source: String,

    #[argh(positional)]
    /// target path; a file copied onto an existing directory lands inside it.
    pub destination: String,
}

/// Canonical form of `path` even when its tail doesn't exist yet: the deepest
/// existing ancestor is canonicalized and the missing components re-appended.
fn canonicalize_partial(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => break,
        }
    }
    let mut canonical = fs::canonicalize(existing)?;
    for name in missing.into_iter().rev() {
        canonical.push(name);
    }
    Ok(canonical)
}

fn copy_recursive(from: &Path, to: &Path) -> io::Result<()> {
    if from.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        let target = match from.file_name() {
            Some(file_name) if to.is_dir() => to.join(file_name),
            _ => to.to_path_buf(),
        };
        fs::copy(from, target).map(|_| ())
    }
}

impl BuiltinCommand for Cp {
    fn name() -> &'static str {
        "cp"
    }

    fn usage() -> &'static str {
        "cp <src> <dst>"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let from = env.resolve(&self.source);
        let to = env.resolve(&self.destination);
        if from.is_dir() && canonicalize_partial(&to)?.starts_with(fs::canonicalize(&from)?) {
            anyhow::bail!(
                "cp: cannot copy '{}' to '{}': cannot copy a directory into itself",
                self.source,
                self.destination
            );
        }
        copy_recursive(&from, &to).with_context(|| {
            format!("cp: cannot copy '{}' to '{}'", self.source, self.destination)
        })?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Move or rename a file or directory.
pub struct Mv {
    #[argh(positional)]
    /// path to move.
    pub source: String,

    #[argh(positional)]
    /// new path.
    pub destination: String,
}

impl BuiltinCommand for Mv {
    fn name() -> &'static str {
        "mv"
    }

    fn usage() -> &'static str {
        "mv <src> <dst>"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        fs::rename(env.resolve(&self.source), env.resolve(&self.destination)).with_context(
            || format!("mv: cannot move '{}' to '{}'", self.source, self.destination),
        )?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Create an empty file, or update the modification time of an existing one.
pub struct Touch {
    #[argh(positional)]
    /// file to create or touch; existing content is kept.
    pub path: String,
}

impl BuiltinCommand for Touch {
    fn name() -> &'static str {
        "touch"
    }

    fn usage() -> &'static str {
        "touch <file>"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let path = env.resolve(&self.path);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("touch: cannot touch {}", self.path))?;
        file.set_modified(SystemTime::now())
            .with_context(|| format!("touch: cannot set times on {}", self.path))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print a file's contents followed by a newline.
pub struct Cat {
    #[argh(positional)]
    /// file to display.
    pub path: String,
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn usage() -> &'static str {
        "cat <file>"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let mut file = File::open(env.resolve(&self.path))
            .with_context(|| format!("cat: {}", self.path))?;
        io::copy(&mut file, stdout).with_context(|| format!("cat: {}", self.path))?;
        writeln!(stdout)?;
        Ok(0)
    }
}

/// Write the arguments to standard output, separated by spaces.
///
/// `echo words... > file` writes every word before `>` followed by a space into
/// `file`, replacing its content. Arguments are taken verbatim, so nothing is
/// parsed as a flag.
pub struct Echo {
    pub args: Vec<String>,
}

impl FromArgs for Echo {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Self {
            args: args.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn usage() -> &'static str {
        "echo [text...] [> file]"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match self.args.iter().position(|arg| arg == ">") {
            Some(idx) if idx + 1 < self.args.len() => {
                let target = &self.args[idx + 1];
                let file = File::create(env.resolve(target))
                    .with_context(|| format!("echo: cannot write to {}", target))?;
                let mut file = BufWriter::new(file);
                for word in &self.args[..idx] {
                    write!(file, "{} ", word)?;
                }
                file.flush()
                    .with_context(|| format!("echo: cannot write to {}", target))?;
            }
            _ => writeln!(stdout, "{}", self.args.join(" "))?,
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Clear the terminal screen.
pub struct Clear {}

impl BuiltinCommand for Clear {
    fn name() -> &'static str {
        "clear"
    }

    fn usage() -> &'static str {
        "clear"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        // erase display, then home the cursor
        stdout.write_all(b"\x1b[2J\x1b[H")?;
        stdout.flush()?;
        Ok(0)
    }
}

const HELP_TEXT: &str = "\
Supported commands:
  ls [-a] [dir]         List directory contents
  cd <path>             Change directory
  pwd                   Print working directory
  mkdir <dir>           Create directory (with parents)
  rm [-r] <path>...     Remove files or directories
  cp <src> <dst>        Copy file or directory
  mv <src> <dst>        Move or rename
  touch <file>          Create empty file
  cat <file>            Display file content
  echo [text] [> file]  Print text or write it to a file
  clear                 Clear screen
  help                  Show this help
  exit                  Quit the shell
Run `<command> --help` for details on a single command.
Put `--` before names that start with a dash, e.g. `cat -- -notes`.
";

#[derive(FromArgs)]
/// Print a summary of every command.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn usage() -> &'static str {
        "help"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        stdout.write_all(HELP_TEXT.as_bytes())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn usage() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(0)
    }
}
