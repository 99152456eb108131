//! The `write` command.

use std::io::Write;
use std::sync::Arc;

use ops5_engine::{ActionContext, Command};
use ops5_foundation::{Error, Result, Value};
use parking_lot::Mutex;

#[derive(Clone, Debug)]
enum Sink {
    Stdout,
    Buffer(Arc<Mutex<Vec<String>>>),
}

/// `write args...` joins its arguments with spaces and writes one line.
#[derive(Clone, Debug)]
pub struct WriteCommand {
    sink: Sink,
}

impl Default for WriteCommand {
    fn default() -> Self {
        Self::stdout()
    }
}

impl WriteCommand {
    /// Writes to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self { sink: Sink::Stdout }
    }

    /// Captures lines in memory instead; read them with [`WriteCommand::lines`].
    #[must_use]
    pub fn buffered() -> Self {
        Self {
            sink: Sink::Buffer(Arc::default()),
        }
    }

    /// Lines captured so far. Always empty for stdout.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        match &self.sink {
            Sink::Stdout => Vec::new(),
            Sink::Buffer(lines) => lines.lock().clone(),
        }
    }

    fn render(args: &[Value]) -> String {
        args.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Command for WriteCommand {
    fn name(&self) -> &str {
        "write"
    }

    fn exec(&self, _ctx: &ActionContext, args: &[Value]) -> Result<()> {
        let line = Self::render(args);
        match &self.sink {
            Sink::Stdout => writeln!(std::io::stdout().lock(), "{line}")
                .map_err(|e| Error::internal(format!("write: {e}"))),
            Sink::Buffer(lines) => {
                lines.lock().push(line);
                Ok(())
            }
        }
    }
}
