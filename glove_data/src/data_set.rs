//! Ordered collection of recorded instances used to train one gesture type.
//!
//! On disk a data set is JSON Lines: one [`GestureInstance`] object per line.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::gesture_type::GestureType;
use crate::instance::GestureInstance;

#[derive(Debug, Error)]
pub enum DataFileError {
    #[error("data file I/O: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: {source}")]
    Parse { line: usize, source: serde_json::Error },
    #[error("serialising instance {index}: {source}")]
    Serialize { index: usize, source: serde_json::Error },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GestureDataSet {
    instances: Vec<GestureInstance>,
}

impl GestureDataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, inst: GestureInstance) {
        self.instances.push(inst);
    }

    pub fn len(&self) -> usize { self.instances.len() }
    pub fn is_empty(&self) -> bool { self.instances.is_empty() }

    pub fn get(&self, index: usize) -> Option<&GestureInstance> {
        self.instances.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GestureInstance> {
        self.instances.iter()
    }

    /// Drop every instance whose hands do not match `gesture`'s handedness.
    /// Returns the number dropped.
    pub fn retain_for(&mut self, gesture: GestureType) -> usize {
        let before = self.instances.len();
        let handedness = gesture.handedness();
        self.instances.retain(|inst| handedness.matches(inst));
        let dropped = before - self.instances.len();
        if dropped > 0 {
            debug!(gesture = %gesture, dropped, "removed instances with the wrong hands");
        }
        dropped
    }

    // ── JSON Lines ────────────────────────────────────────────────────────

    pub fn write_json_lines<W: Write>(&self, mut w: W) -> Result<(), DataFileError> {
        for (index, inst) in self.instances.iter().enumerate() {
            serde_json::to_writer(&mut w, inst)
                .map_err(|source| DataFileError::Serialize { index, source })?;
            w.write_all(b"\n")?;
        }
        w.flush()?;
        Ok(())
    }

    /// Blank lines are skipped; line numbers in errors are 1-based.
    pub fn read_json_lines<R: BufRead>(r: R) -> Result<Self, DataFileError> {
        let mut set = GestureDataSet::new();
        for (i, line) in r.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let inst = serde_json::from_str(&line)
                .map_err(|source| DataFileError::Parse { line: i + 1, source })?;
            set.push(inst);
        }
        Ok(set)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), DataFileError> {
        let file = File::create(path)?;
        self.write_json_lines(BufWriter::new(file))
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, DataFileError> {
        let file = File::open(path)?;
        Self::read_json_lines(BufReader::new(file))
    }
}

impl From<Vec<GestureInstance>> for GestureDataSet {
    fn from(instances: Vec<GestureInstance>) -> Self {
        GestureDataSet { instances }
    }
}

impl FromIterator<GestureInstance> for GestureDataSet {
    fn from_iter<I: IntoIterator<Item = GestureInstance>>(iter: I) -> Self {
        GestureDataSet { instances: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a GestureDataSet {
    type Item = &'a GestureInstance;
    type IntoIter = std::slice::Iter<'a, GestureInstance>;
    fn into_iter(self) -> Self::IntoIter {
        self.instances.iter()
    }
}
