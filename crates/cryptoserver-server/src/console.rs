//! Operator console.
//!
//! Reads one command per line and writes results back. Generic over its
//! streams so the binary can attach stdin/stdout while tests use in-memory
//! buffers.

use std::{
    io::{self, BufRead, Write},
    sync::Arc,
};

use cryptoserver_core::Environment;

use crate::registry::ConnectionRegistry;

const PROMPT: &str = "Command (? for help) > ";

/// A parsed console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `?`
    Help,
    /// `c`, `cls`, `clear`
    Clear,
    /// `q`, `quit`
    Quit,
    /// `list_connections`
    ListConnections,
    /// Blank line
    Empty,
    /// Anything else
    Unknown,
}

impl ConsoleCommand {
    /// Parse one input line. Case and surrounding whitespace are ignored.
    pub fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "?" => Self::Help,
            "c" | "cls" | "clear" => Self::Clear,
            "q" | "quit" => Self::Quit,
            "list_connections" => Self::ListConnections,
            "" => Self::Empty,
            _ => Self::Unknown,
        }
    }
}

/// Why the console loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// The operator asked to shut the server down
    Quit,
    /// Input stream closed
    EndOfInput,
}

/// Interactive console over `input`/`output`.
pub struct Console<R, W, E: Environment> {
    input: R,
    output: W,
    registry: Arc<ConnectionRegistry<E>>,
}

impl<R: BufRead, W: Write, E: Environment> Console<R, W, E> {
    /// Create a console reporting on `registry`.
    pub fn new(input: R, output: W, registry: Arc<ConnectionRegistry<E>>) -> Self {
        Self { input, output, registry }
    }

    /// Prompt, read and execute commands until quit or end of input.
    pub fn run(&mut self) -> io::Result<ConsoleExit> {
        let mut line = String::new();

        loop {
            write!(self.output, "{PROMPT}")?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(ConsoleExit::EndOfInput);
            }

            match ConsoleCommand::parse(&line) {
                ConsoleCommand::Help => self.menu()?,
                ConsoleCommand::Clear => {
                    write!(self.output, "\x1B[2J\x1B[1;1H")?;
                },
                ConsoleCommand::Quit => {
                    tracing::info!("Exiting due to console request");
                    return Ok(ConsoleExit::Quit);
                },
                ConsoleCommand::ListConnections => self.list_connections()?,
                ConsoleCommand::Empty => {},
                ConsoleCommand::Unknown => {
                    writeln!(self.output, "Unknown command.  '?' for help.")?;
                },
            }
        }
    }

    fn menu(&mut self) -> io::Result<()> {
        writeln!(self.output, "{}", "-".repeat(79))?;
        writeln!(self.output, "  ?                         help / this menu")?;
        writeln!(self.output, "  cls / c                   clear the console")?;
        writeln!(self.output, "  quit / q                  exit the application")?;
        writeln!(self.output, "  list_connections          list active connections")?;
        writeln!(self.output)
    }

    fn list_connections(&mut self) -> io::Result<()> {
        let records = self.registry.list();

        if records.is_empty() {
            writeln!(self.output, "(null)")?;
        } else {
            writeln!(self.output, "{} Connections", records.len())?;
            for record in &records {
                writeln!(
                    self.output,
                    "  {}:{} {} {} {} {}",
                    record.source_ip,
                    record.source_port,
                    record.method,
                    record.raw_url,
                    record.http_host_name.as_deref().unwrap_or_default(),
                    record.node_name.as_deref().unwrap_or_default()
                )?;
            }
        }

        writeln!(self.output)
    }
}
