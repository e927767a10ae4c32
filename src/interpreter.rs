use crate::command::{CommandFactory, ExitCode};
use crate::config::ShellConfig;
use crate::env::Environment;
use crate::error::ShellError;
use crate::io_adapters::LineSource;
use crate::lexer;
use rustyline::DefaultEditor;
use std::io::{self, Write};
use tracing::debug;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate, i.e. builtins.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// A minimal shell that dispatches whitespace-separated command lines to a
/// registry of commands.
///
/// The interpreter owns the session [`Environment`] and the list of
/// [`CommandFactory`] objects queried by name. See [`Default`] for the commands
/// included out of the box.
///
/// Example
/// ```
/// use fshell::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.run("echo", &["hello", "world"]).unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    config: ShellConfig,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        let mut interpreter = Self {
            env: Environment::new(),
            config: ShellConfig::default(),
            commands: Vec::with_capacity(commands.len()),
        };
        for factory in commands {
            interpreter.register(factory);
        }
        interpreter
    }

    /// Replace the loop configuration.
    pub fn with_config(mut self, config: ShellConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from the given session state instead of the process working directory.
    pub fn with_environment(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    /// Current session state.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Add a command, replacing any previously registered command with the same name.
    pub fn register(&mut self, factory: Box<dyn CommandFactory>) {
        match self
            .commands
            .iter_mut()
            .find(|existing| existing.name() == factory.name())
        {
            Some(slot) => *slot = factory,
            None => self.commands.push(factory),
        }
    }

    /// Look up `name` and run it with `args`.
    ///
    /// Fails with [`ShellError::UnknownCommand`] when no factory recognizes the name.
    pub fn dispatch(
        &mut self,
        name: &str,
        args: &[&str],
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<ExitCode, ShellError> {
        let cmd = self
            .commands
            .iter()
            .find_map(|factory| factory.try_create(&self.env, name, args))
            .ok_or_else(|| ShellError::UnknownCommand(name.to_string()))?;

        debug!(command = name, ?args, "dispatching");
        match cmd.execute(stdout, stderr, &mut self.env) {
            Err(ShellError::InvalidArgument { message, .. }) if self.config.lenient_args => {
                debug!(command = name, %message, "ignoring invalid arguments");
                Ok(0)
            }
            other => other,
        }
    }

    /// Run a single command invocation by name with arguments on the process streams.
    pub fn run(&mut self, name: &str, args: &[&str]) -> Result<ExitCode, ShellError> {
        self.dispatch(name, args, &mut io::stdout(), &mut io::stderr())
    }

    /// Text shown before each line is read: the working directory and the marker.
    pub fn prompt(&self) -> String {
        let prompt = format!(
            "{} {} ",
            self.env.current_dir.display(),
            self.config.prompt_marker
        );
        if self.config.color_prompt {
            format!("\x1b[32m{}\x1b[0m", prompt)
        } else {
            prompt
        }
    }

    /// Read, dispatch and report lines from `source` until `exit` or end of input.
    ///
    /// Command failures are reported on `stderr` and never end the loop; only a
    /// failure of the console streams themselves is returned.
    pub fn run_loop(
        &mut self,
        source: &mut dyn LineSource,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<(), ShellError> {
        while !self.env.should_exit {
            let prompt = self.prompt();
            let Some(line) = source.read_line(&prompt)? else {
                debug!("end of input");
                break;
            };
            if line == "exit" {
                break;
            }

            let tokens = lexer::split_into_tokens(&line);
            let Some((name, args)) = tokens.split_first() else {
                continue;
            };

            match self.dispatch(name, args, stdout, stderr) {
                Ok(code) => debug!(command = name, code, "command finished"),
                Err(err @ ShellError::UnknownCommand(_)) => writeln!(stderr, "{}", err)?,
                Err(err) => {
                    debug!(command = name, error = %err, "command failed");
                    writeln!(stderr, "Error: {}", err)?;
                }
            }
            stdout.flush()?;
        }
        Ok(())
    }

    /// Interactive loop on the terminal using rustyline.
    pub fn repl(&mut self) -> Result<(), ShellError> {
        let mut rl = DefaultEditor::new()?;
        self.run_loop(&mut rl, &mut io::stdout(), &mut io::stderr())
    }
}

impl Default for Interpreter {
    /// Create an interpreter with every builtin: `ls`, `cd`, `pwd`, `mkdir`, `rm`,
    /// `cp`, `mv`, `touch`, `cat`, `echo`, `clear`, `help` and `exit`.
    fn default() -> Self {
        use crate::builtin::*;
        Self::new(vec![
            Box::new(Factory::<Ls>::default()),
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Mkdir>::default()),
            Box::new(Factory::<Rm>::default()),
            Box::new(Factory::<Cp>::default()),
            Box::new(Factory::<Mv>::default()),
            Box::new(Factory::<Touch>::default()),
            Box::new(Factory::<Cat>::default()),
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Clear>::default()),
            Box::new(Factory::<Help>::default()),
            Box::new(Factory::<Exit>::default()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ExecutableCommand;
    use crate::env::lock_current_dir;
    use crate::io_adapters::BufReadSource;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn shell_in_tempdir() -> (TempDir, Interpreter) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let canonical = fs::canonicalize(dir.path()).expect("canonicalize failed");
        let config = ShellConfig {
            color_prompt: false,
            ..ShellConfig::default()
        };
        let sh = Interpreter::default()
            .with_environment(Environment::with_current_dir(canonical))
            .with_config(config);
        (dir, sh)
    }

    /// Feeds `script` through the loop and returns (stdout, stderr).
    fn run_script(sh: &mut Interpreter, script: &str) -> (String, String) {
        let mut source = BufReadSource::new(Cursor::new(script.to_string()), io::sink());
        let mut out = Vec::new();
        let mut err = Vec::new();
        sh.run_loop(&mut source, &mut out, &mut err)
            .expect("console streams should not fail");
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    struct Greeting(String);

    impl ExecutableCommand for Greeting {
        fn execute(
            self: Box<Self>,
            stdout: &mut dyn Write,
            _stderr: &mut dyn Write,
            _env: &mut Environment,
        ) -> Result<ExitCode, ShellError> {
            writeln!(stdout, "{}", self.0)?;
            Ok(0)
        }
    }

    struct GreetingFactory(&'static str);

    impl CommandFactory for GreetingFactory {
        fn name(&self) -> &str {
            "greet"
        }

        fn try_create(
            &self,
            _env: &Environment,
            name: &str,
            _args: &[&str],
        ) -> Option<Box<dyn ExecutableCommand>> {
            if name != "greet" {
                return None;
            }
            Some(Box::new(Greeting(self.0.to_string())))
        }
    }

    #[test]
    fn test_unknown_command_reported_and_state_kept() {
        let (_tmp, mut sh) = shell_in_tempdir();
        let before = sh.env().current_dir.clone();

        let (out, err) = run_script(&mut sh, "frobnicate --now\n");

        assert!(out.is_empty());
        assert_eq!(err, "Command not found: frobnicate\n");
        assert_eq!(sh.env().current_dir, before);
    }

    #[test]
    fn test_dispatch_unknown_command_error() {
        let (_tmp, mut sh) = shell_in_tempdir();
        let res = sh.dispatch("nope", &[], &mut io::sink(), &mut io::sink());
        assert!(matches!(res, Err(ShellError::UnknownCommand(name)) if name == "nope"));
    }

    #[test]
    fn test_register_overwrites_same_name() {
        let (_tmp, mut sh) = shell_in_tempdir();
        sh.register(Box::new(GreetingFactory("hello")));
        sh.register(Box::new(GreetingFactory("bonjour")));

        let (out, err) = run_script(&mut sh, "greet\n");

        assert_eq!(out, "bonjour\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_cd_failure_reports_error_and_keeps_dir() {
        let _lock = lock_current_dir();
        let (_tmp, mut sh) = shell_in_tempdir();
        let before = sh.env().current_dir.clone();

        let (_, err) = run_script(&mut sh, "cd does/not/exist\npwd\n");

        assert!(err.starts_with("Error: cd: can't canonicalize"));
        assert_eq!(sh.env().current_dir, before);
    }

    #[test]
    fn test_mkdir_then_ls_shows_dir() {
        let (_tmp, mut sh) = shell_in_tempdir();
        let (out, err) = run_script(&mut sh, "mkdir a/b/c\nls a\n");
        assert!(err.is_empty(), "unexpected stderr: {}", err);
        assert_eq!(out, "[DIR] b\n");
    }

    #[test]
    fn test_touch_then_cat_prints_empty_line() {
        let (_tmp, mut sh) = shell_in_tempdir();
        let (out, err) = run_script(&mut sh, "touch f\ncat f\n");
        assert!(err.is_empty(), "unexpected stderr: {}", err);
        assert_eq!(out, "\n");
    }

    #[test]
    fn test_echo_redirect_then_cat() {
        let (tmp, mut sh) = shell_in_tempdir();
        let (out, err) = run_script(&mut sh, "echo hello world > out.txt\ncat out.txt\n");

        assert!(err.is_empty(), "unexpected stderr: {}", err);
        assert_eq!(out, "hello world \n");
        assert_eq!(
            fs::read_to_string(tmp.path().join("out.txt")).unwrap(),
            "hello world "
        );
    }

    #[test]
    fn test_rm_without_recursive_keeps_contents() {
        let (tmp, mut sh) = shell_in_tempdir();
        let (_, err) = run_script(&mut sh, "mkdir d/e\ntouch d/e/f\nrm d\n");
        assert!(err.starts_with("rm: cannot remove 'd'"));
        assert!(tmp.path().join("d/e/f").is_file());

        let (_, err) = run_script(&mut sh, "rm -r d\n");
        assert!(err.is_empty(), "unexpected stderr: {}", err);
        assert!(!tmp.path().join("d").exists());
    }

    #[test]
    fn test_ls_dotfile_visibility() {
        let (_tmp, mut sh) = shell_in_tempdir();
        let (out, _) = run_script(&mut sh, "touch .secret\ntouch visible\nls\n");
        assert_eq!(out, "[FILE] visible\n");

        let (out, _) = run_script(&mut sh, "ls -a\n");
        assert_eq!(out, "[FILE] .secret\n[FILE] visible\n");
    }

    #[test]
    fn test_literal_exit_stops_reading() {
        let (_tmp, mut sh) = shell_in_tempdir();
        let (out, err) = run_script(&mut sh, "echo before\nexit\necho after\n");
        assert_eq!(out, "before\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_exit_builtin_with_args_stops_reading() {
        let (_tmp, mut sh) = shell_in_tempdir();
        let (out, _) = run_script(&mut sh, "  exit 0\necho after\n");
        assert!(out.is_empty());
        assert!(sh.env().should_exit);
    }

    #[test]
    fn test_undecodable_line_does_not_stop_loop() {
        let (_tmp, mut sh) = shell_in_tempdir();
        let input = b"echo one\ncat \xff\xfe\necho two\n".to_vec();
        let mut source = BufReadSource::new(Cursor::new(input), io::sink());
        let mut out = Vec::new();
        let mut err = Vec::new();

        let res = sh.run_loop(&mut source, &mut out, &mut err);

        assert!(res.is_ok());
        assert_eq!(String::from_utf8(out).unwrap(), "one\ntwo\n");
        assert!(String::from_utf8(err).unwrap().starts_with("Error: cat: "));
    }

    #[test]
    fn test_dash_prefixed_names() {
        let (tmp, mut sh) = shell_in_tempdir();
        fs::write(tmp.path().join("-notes"), "remember").unwrap();

        let (out, err) = run_script(&mut sh, "cat -- -notes\nrm -notes\n");

        assert!(err.is_empty(), "unexpected stderr: {}", err);
        assert_eq!(out, "remember\n");
        assert!(!tmp.path().join("-notes").exists());
    }

    #[test]
    fn test_ls_all_flag_after_path() {
        let (_tmp, mut sh) = shell_in_tempdir();
        let (out, err) = run_script(&mut sh, "mkdir box\ntouch box/.dot\ntouch box/plain\nls box -a\n");
        assert!(err.is_empty(), "unexpected stderr: {}", err);
        assert_eq!(out, "[FILE] .dot\n[FILE] plain\n");
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let (_tmp, mut sh) = shell_in_tempdir();
        let (out, err) = run_script(&mut sh, "\n   \n\techo x\n");
        assert_eq!(out, "x\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_loop_survives_failures() {
        let (_tmp, mut sh) = shell_in_tempdir();
        let (out, err) = run_script(&mut sh, "cat missing.txt\nmv a b\necho still here\n");

        assert_eq!(out, "still here\n");
        let lines: Vec<&str> = err.lines().collect();
        assert!(lines[0].starts_with("Error: cat: missing.txt"));
        assert!(lines[1].starts_with("Error: mv: cannot move 'a' to 'b'"));
    }

    // Missing operands surface a usage error by default; `lenient_args` keeps
    // the old silent no-op.
    #[test]
    fn test_missing_operand_reports_usage() {
        let (_tmp, mut sh) = shell_in_tempdir();
        let (out, err) = run_script(&mut sh, "cp only-one\n");
        assert!(out.is_empty());
        assert!(err.starts_with("Error: "));
        assert!(err.ends_with("usage: cp <src> <dst>\n"));
    }

    #[test]
    fn test_missing_operand_silent_when_lenient() {
        let (_tmp, sh) = shell_in_tempdir();
        let mut sh = sh.with_config(ShellConfig {
            color_prompt: false,
            lenient_args: true,
            ..ShellConfig::default()
        });

        let (out, err) = run_script(&mut sh, "cd\nmkdir\nrm\ncat\n");

        assert!(out.is_empty());
        assert!(err.is_empty());
    }

    #[test]
    fn test_prompt_format() {
        let (_tmp, sh) = shell_in_tempdir();
        let expected = format!("{} $ ", sh.env().current_dir.display());
        assert_eq!(sh.prompt(), expected);

        let sh = sh.with_config(ShellConfig {
            color_prompt: true,
            prompt_marker: "%".to_string(),
            lenient_args: false,
        });
        let prompt = sh.prompt();
        assert!(prompt.starts_with("\x1b[32m"));
        assert!(prompt.ends_with(" % \x1b[0m"));
    }

    #[test]
    fn test_prompt_follows_cd() {
        let _lock = lock_current_dir();
        let orig = std::env::current_dir().unwrap();
        let (_tmp, mut sh) = shell_in_tempdir();
        let (_, err) = run_script(&mut sh, "mkdir sub\ncd sub\n");
        std::env::set_current_dir(&orig).expect("failed to restore cwd");

        assert!(err.is_empty(), "unexpected stderr: {}", err);
        assert!(sh.env().current_dir.ends_with("sub"));
        assert!(sh.prompt().starts_with(&sh.env().current_dir.display().to_string()));
    }
}
