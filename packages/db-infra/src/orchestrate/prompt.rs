//! Interactive yes/no confirmation.

use std::io::{self, BufRead, Write};

use tracing::warn;

/// Asks the operator to confirm a destructive step.
pub trait Prompter: Send + Sync {
    /// Show `message` and return the answer; an empty answer yields `default`.
    fn confirm(&self, message: &[String], default: bool) -> bool;
}

/// Prompter writing to stderr and reading one line from stdin.
///
/// Reading blocks the calling thread. A run is strictly sequential and
/// nothing else is scheduled while the operator answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrompter;

impl Prompter for ConsolePrompter {
    fn confirm(&self, message: &[String], default: bool) -> bool {
        ask(&mut io::stdin().lock(), &mut io::stderr().lock(), message, default)
    }
}

/// Write `message` to `output` and read one answer line from `input`.
///
/// Write and read errors are logged and yield `default`.
pub fn ask(input: &mut impl BufRead, output: &mut impl Write, message: &[String], default: bool) -> bool {
    if let Err(e) = show(output, message) {
        warn!("Could not show confirmation prompt, using default answer: {e}");
        return default;
    }

    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => parse_answer(&answer, default),
        Err(e) => {
            warn!("Could not read confirmation answer, using default answer: {e}");
            default
        }
    }
}

fn show(output: &mut impl Write, message: &[String]) -> io::Result<()> {
    writeln!(output)?;
    for line in message {
        writeln!(output, "  {line}")?;
    }
    write!(output, "> ")?;
    output.flush()
}

/// Anything starting with `y`/`Y` is yes, anything else non-blank is no.
pub fn parse_answer(answer: &str, default: bool) -> bool {
    let answer = answer.trim();
    if answer.is_empty() {
        return default;
    }
    answer.starts_with(['y', 'Y'])
}
