use crate::classifier::Label;
use crate::error::{LexisError, Result};
use crate::similarity::Features;
use crate::store;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// One graded attempt, as written to the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: String,
    pub target: String,
    pub distance: usize,
    pub similarity: f64,
    pub label: Label,
    pub bucket: String,
    pub recorded_at: DateTime<Local>,
}

/// bucket -> word -> number of attempts
pub type AttemptCounts = BTreeMap<String, BTreeMap<String, u32>>;

/// Per-word totals computed from the audit log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordSummary {
    pub attempts: u32,
    pub correct: u32,
    pub almost: u32,
    pub incorrect: u32,
    pub last_attempt: Option<DateTime<Local>>,
}

impl WordSummary {
    fn add(&mut self, record: &AttemptRecord) {
        self.attempts += 1;
        match record.label {
            Label::Correct => self.correct += 1,
            Label::Almost => self.almost += 1,
            Label::Incorrect => self.incorrect += 1,
        }
        self.last_attempt = Some(match self.last_attempt {
            Some(prev) if prev > record.recorded_at => prev,
            _ => record.recorded_at,
        });
    }

    /// Share of attempts labelled correct, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.correct as f64 / self.attempts as f64 * 100.0
        }
    }
}

/// Durable record of every attempt: an append-only CSV log plus a
/// resettable per-word counter snapshot.
#[derive(Debug)]
pub struct AttemptLedger {
    log_path: PathBuf,
    counts_path: PathBuf,
    counts: AttemptCounts,
}

impl AttemptLedger {
    /// Open the ledger. Unreadable counters start over empty; the log is
    /// only touched on write.
    pub fn open(log_path: impl Into<PathBuf>, counts_path: impl Into<PathBuf>) -> Self {
        let counts_path = counts_path.into();
        let counts = store::read_json::<AttemptCounts>(&counts_path).unwrap_or_default();
        Self {
            log_path: log_path.into(),
            counts_path,
            counts,
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn counts(&self) -> &AttemptCounts {
        &self.counts
    }

    /// Make sure every listed word has a counter, creating missing ones
    /// at zero. Persists only when something was added.
    pub fn ensure_words<'a>(
        &mut self,
        bucket: &str,
        words: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        let entry = self.counts.entry(bucket.to_string()).or_default();
        let mut added = false;
        for word in words {
            if !entry.contains_key(word) {
                entry.insert(word.to_string(), 0);
                added = true;
            }
        }
        if added {
            self.save_counts()?;
        }
        Ok(())
    }

    /// Append the attempt to the log, then bump and persist its counter.
    /// Returns the new count for (bucket, target).
    pub fn record(
        &mut self,
        bucket: &str,
        attempt: &str,
        target: &str,
        features: Features,
        label: Label,
    ) -> Result<u32> {
        let record = AttemptRecord {
            attempt: attempt.to_string(),
            target: target.to_string(),
            distance: features.distance,
            similarity: features.similarity,
            label,
            bucket: bucket.to_string(),
            recorded_at: Local::now(),
        };
        self.append(&record)?;

        let mut next = self.counts.clone();
        let count = next
            .entry(bucket.to_string())
            .or_default()
            .entry(target.to_string())
            .or_insert(0);
        *count += 1;
        let count = *count;

        store::write_json_atomic(&self.counts_path, &next)?;
        self.counts = next;

        tracing::info!(bucket, target, %label, count, "attempt recorded");
        Ok(count)
    }

    fn append(&self, record: &AttemptRecord) -> Result<()> {
        if let Some(parent) = self.log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| LexisError::io(parent, e))?;
        }

        // A fresh (or empty) log gets its header row first
        let needs_header = fs::metadata(&self.log_path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.log_path)
            .map_err(|e| LexisError::io(&self.log_path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer
            .serialize(record)
            .map_err(|e| LexisError::log(&self.log_path, e))?;

        let file = writer
            .into_inner()
            .map_err(|e| LexisError::io(&self.log_path, e.into_error()))?;
        file.sync_all()
            .map_err(|e| LexisError::io(&self.log_path, e))
    }

    fn save_counts(&self) -> Result<()> {
        store::write_json_atomic(&self.counts_path, &self.counts)
    }

    pub fn get_count(&self, bucket: &str, word: &str) -> u32 {
        self.counts
            .get(bucket)
            .and_then(|words| words.get(word))
            .copied()
            .unwrap_or(0)
    }

    /// Clear counters for one bucket, or all of them. The log is kept.
    pub fn reset(&mut self, bucket: Option<&str>) -> Result<()> {
        let mut next = self.counts.clone();
        match bucket {
            Some(bucket) => {
                next.remove(bucket);
            }
            None => next.clear(),
        }
        store::write_json_atomic(&self.counts_path, &next)?;
        self.counts = next;
        tracing::info!(bucket = bucket.unwrap_or("*"), "attempt counters reset");
        Ok(())
    }

    /// Every logged attempt, oldest first.
    pub fn history(&self) -> Result<Vec<AttemptRecord>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let mut reader =
            csv::Reader::from_path(&self.log_path).map_err(|e| LexisError::log(&self.log_path, e))?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            records.push(row.map_err(|e| LexisError::log(&self.log_path, e))?);
        }
        Ok(records)
    }

    /// Totals per target word across the whole log.
    pub fn summary(&self) -> Result<BTreeMap<String, WordSummary>> {
        let mut summary: BTreeMap<String, WordSummary> = BTreeMap::new();
        for record in self.history()? {
            summary.entry(record.target.clone()).or_default().add(&record);
        }
        Ok(summary)
    }
}
