use crate::error::ShellError;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, Write};

/// Where the interactive loop gets its lines from.
pub trait LineSource {
    /// Show `prompt` and block for one line, without its trailing newline.
    ///
    /// Returns `Ok(None)` once input is exhausted.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, ShellError>;
}

/// Terminal input through rustyline. History lives in memory for the session only.
impl LineSource for DefaultEditor {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, ShellError> {
        match self.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.add_history_entry(line.as_str())?;
                }
                Ok(Some(line))
            }
            // Ctrl-C abandons the current line, like most shells.
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            // The undecodable line has been consumed; report it and move on.
            Err(ReadlineError::Io(err)) if err.kind() == io::ErrorKind::InvalidData => {
                writeln!(io::stderr(), "Error: {}", err)?;
                Ok(Some(String::new()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Line source over any buffered reader; prompts go to `prompt_out`.
///
/// Used for scripted input and in tests.
pub struct BufReadSource<R, W> {
    reader: R,
    prompt_out: W,
}

impl<R: BufRead, W: Write> BufReadSource<R, W> {
    /// Read lines from `reader`, echoing each prompt to `prompt_out`.
    pub fn new(reader: R, prompt_out: W) -> Self {
        Self { reader, prompt_out }
    }
}

impl<R: BufRead, W: Write> LineSource for BufReadSource<R, W> {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, ShellError> {
        self.prompt_out.write_all(prompt.as_bytes())?;
        self.prompt_out.flush()?;

        let mut raw = Vec::new();
        if self.reader.read_until(b'\n', &mut raw)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&raw);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }
}
