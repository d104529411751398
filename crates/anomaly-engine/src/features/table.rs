//! Feature rows as a JSON Lines table.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::RegionalFeatures;
use crate::error::Result;

/// An ordered collection of feature rows, one per valid date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    rows: Vec<RegionalFeatures>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: RegionalFeatures) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[RegionalFeatures] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&RegionalFeatures> {
        self.rows.iter().find(|row| row.valid_date == date)
    }

    /// Stable sort by valid date.
    pub fn sort_by_date(&mut self) {
        self.rows.sort_by_key(|row| row.valid_date);
    }

    /// Write one JSON object per line.
    pub fn write_jsonl<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = BufWriter::new(writer);
        for row in &self.rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read rows written by [`write_jsonl`](Self::write_jsonl). Blank lines are skipped.
    pub fn read_jsonl<R: BufRead>(reader: R) -> Result<Self> {
        let mut rows = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            rows.push(serde_json::from_str(&line)?);
        }
        Ok(Self { rows })
    }

    pub fn write_jsonl_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.write_jsonl(File::create(path)?)?;
        info!(path = %path.display(), rows = self.rows.len(), "Wrote feature table");
        Ok(())
    }

    pub fn read_jsonl_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::read_jsonl(BufReader::new(File::open(path)?))
    }
}

impl FromIterator<RegionalFeatures> for FeatureTable {
    fn from_iter<I: IntoIterator<Item = RegionalFeatures>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl Extend<RegionalFeatures> for FeatureTable {
    fn extend<I: IntoIterator<Item = RegionalFeatures>>(&mut self, iter: I) {
        self.rows.extend(iter);
    }
}
