//! Point views
//!
//! A view receives every round's flattened, rank-ordered points at the
//! coordinator. Whether it is still open is one half of the continuation
//! predicate: closing the view ends an indefinite run at the next decision.

use anyhow::Context;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::sampler::{is_inside, Point};
use crate::stats::RoundResult;
use crate::Result;

/// Consumer of each round's sampled points
pub trait PointView: Send {
    fn update(&mut self, round: &RoundResult, points: &[Point]) -> Result<()>;

    /// Whether the operator still has the view open
    fn is_open(&self) -> bool {
        true
    }
}

/// View without a display; never closes
#[derive(Debug, Default)]
pub struct HeadlessView {
    frames: u64,
}

impl HeadlessView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rounds received so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl PointView for HeadlessView {
    fn update(&mut self, _round: &RoundResult, _points: &[Point]) -> Result<()> {
        self.frames += 1;
        Ok(())
    }
}

/// Writes the latest round's points as `x,y,inside` CSV
///
/// Each frame is staged in a sibling temporary file and renamed over the
/// target, so readers only ever see a complete frame.
pub struct CsvPointView {
    path: PathBuf,
}

impl CsvPointView {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PointView for CsvPointView {
    fn update(&mut self, _round: &RoundResult, points: &[Point]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let staged = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create points file in {}", dir.display()))?;
        let mut writer = BufWriter::new(staged);

        writeln!(writer, "x,y,inside")?;
        for &(x, y) in points {
            writeln!(writer, "{},{},{}", x, y, is_inside((x, y)) as u8)?;
        }

        let staged = writer.into_inner().map_err(|e| e.into_error())?;
        staged
            .persist(&self.path)
            .with_context(|| format!("Failed to replace points file: {}", self.path.display()))?;
        Ok(())
    }
}
