//! Input/output used by the `Lread` and `Lwrite` builtins.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Cursor, Stdin, Stdout, Write};

use anyhow::{Context, Result, bail};

pub trait Console {
    /// Prompt for and read one integer.
    fn read_int(&mut self) -> Result<i32>;
    /// Print one integer on its own line.
    fn write_int(&mut self, value: i32) -> Result<()>;
}

/// Console over any buffered reader and writer. Input is consumed as
/// whitespace-separated tokens, so several numbers may share a line.
pub struct IoConsole<R, W> {
    input: R,
    output: W,
    pending: VecDeque<String>,
}

pub type StdConsole = IoConsole<BufReader<Stdin>, Stdout>;
pub type BufferConsole = IoConsole<Cursor<Vec<u8>>, Vec<u8>>;

impl<R: BufRead, W: Write> IoConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            pending: VecDeque::new(),
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn next_token(&mut self) -> Result<String> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(token);
            }
            let mut line = String::new();
            let read = self.input.read_line(&mut line).context("failed to read input")?;
            if read == 0 {
                bail!("unexpected end of input while reading an integer");
            }
            self.pending.extend(line.split_whitespace().map(str::to_owned));
        }
    }
}

impl StdConsole {
    pub fn stdio() -> Self {
        IoConsole::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl BufferConsole {
    pub fn with_input(input: &str) -> Self {
        IoConsole::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl<R: BufRead, W: Write> Console for IoConsole<R, W> {
    fn read_int(&mut self) -> Result<i32> {
        write!(self.output, "> ")?;
        self.output.flush()?;
        let token = self.next_token()?;
        token
            .parse::<i32>()
            .with_context(|| format!("expected an integer, got '{token}'"))
    }

    fn write_int(&mut self, value: i32) -> Result<()> {
        writeln!(self.output, "{}", itoa::Buffer::new().format(value))?;
        Ok(())
    }
}
