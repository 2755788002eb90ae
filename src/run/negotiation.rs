//! Operator intent
//!
//! The coordinator needs two values before a run can start: the mode and a
//! positive point budget. They either come fixed from the command line and
//! config file, or from an interactive prompt that re-asks until the input is
//! valid.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Stdin, Stdout, Write};

use crate::config::RunMode;
use crate::sampler::MAX_POINTS;

/// The operator's choice of mode and budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intent {
    pub mode: RunMode,
    pub points: u64,
}

/// Source of operator intent, consulted once by the coordinator
///
/// `obtain` may block; the coordinator runs it on a blocking thread.
pub trait IntentSource: Send {
    fn obtain(&mut self) -> Result<Intent>;
}

/// Intent known up front
pub struct FixedIntent {
    intent: Intent,
}

impl FixedIntent {
    pub fn new(mode: RunMode, points: u64) -> Self {
        Self {
            intent: Intent { mode, points },
        }
    }
}

impl IntentSource for FixedIntent {
    fn obtain(&mut self) -> Result<Intent> {
        Ok(self.intent)
    }
}

/// Interactive prompt over any line-oriented input
pub struct PromptIntent<R, W> {
    input: R,
    output: W,
    mode: Option<RunMode>,
    points: Option<u64>,
}

impl PromptIntent<BufReader<Stdin>, Stdout> {
    /// Prompt on the process's standard input and output
    pub fn stdio() -> Self {
        Self::new(BufReader::new(std::io::stdin()), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptIntent<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            mode: None,
            points: None,
        }
    }

    /// Skip the mode question
    pub fn with_mode(mut self, mode: Option<RunMode>) -> Self {
        self.mode = mode;
        self
    }

    /// Skip the budget question
    pub fn with_points(mut self, points: Option<u64>) -> Self {
        self.points = points;
        self
    }

    fn read_line(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read operator input")?;
        if read == 0 {
            anyhow::bail!("Operator input closed before the run parameters were chosen");
        }
        Ok(line.trim().to_string())
    }

    fn ask_mode(&mut self) -> Result<RunMode> {
        writeln!(self.output, "Select Mode:")?;
        writeln!(self.output, "1. Run for a specific number of points")?;
        writeln!(self.output, "2. Run repeatedly until stopped")?;

        loop {
            let answer = self.read_line("Enter choice (1 or 2): ")?;
            match answer.parse::<u8>() {
                Ok(1) => return Ok(RunMode::OneShot),
                Ok(2) => return Ok(RunMode::Indefinite),
                Ok(_) => writeln!(self.output, "Invalid choice. Please enter 1 or 2.")?,
                Err(_) => writeln!(
                    self.output,
                    "Invalid input. Please enter a numeric value (1 or 2)."
                )?,
            }
        }
    }

    fn ask_points(&mut self, mode: RunMode) -> Result<u64> {
        let question = match mode {
            RunMode::OneShot => "Enter the number of points for the Monte Carlo simulation: ",
            RunMode::Indefinite => "Enter the number of points per iteration: ",
        };

        loop {
            let answer = self.read_line(question)?;
            match answer.parse::<u64>() {
                Ok(points) if points > MAX_POINTS => writeln!(
                    self.output,
                    "Too many points. Please enter at most {}.",
                    MAX_POINTS
                )?,
                Ok(points) if points > 0 => return Ok(points),
                _ => writeln!(self.output, "Invalid input. Please enter a positive integer.")?,
            }
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> IntentSource for PromptIntent<R, W> {
    fn obtain(&mut self) -> Result<Intent> {
        let mode = match self.mode {
            Some(mode) => mode,
            None => self.ask_mode()?,
        };
        let points = match self.points {
            Some(points) if (1..=MAX_POINTS).contains(&points) => points,
            _ => self.ask_points(mode)?,
        };
        Ok(Intent { mode, points })
    }
}
