use crate::error::Result;
use crate::store;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Highest word index reached per bucket.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    reached: BTreeMap<String, usize>,
}

impl ProgressStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let reached = store::read_json(&path).unwrap_or_default();
        Self { path, reached }
    }

    pub fn get(&self, bucket: &str) -> usize {
        self.reached.get(bucket).copied().unwrap_or(0)
    }

    pub fn all(&self) -> &BTreeMap<String, usize> {
        &self.reached
    }

    /// Raise the bucket's mark to `reached`. Lower values are ignored.
    /// Returns the mark after the call.
    pub fn advance(&mut self, bucket: &str, reached: usize) -> Result<usize> {
        let current = self.get(bucket);
        if reached <= current {
            return Ok(current);
        }

        let mut next = self.reached.clone();
        next.insert(bucket.to_string(), reached);
        store::write_json_atomic(&self.path, &next)?;
        self.reached = next;
        tracing::debug!(bucket, reached, "progress advanced");
        Ok(reached)
    }

    pub fn reset(&mut self, bucket: Option<&str>) -> Result<()> {
        let mut next = self.reached.clone();
        match bucket {
            Some(bucket) => {
                next.remove(bucket);
            }
            None => next.clear(),
        }
        store::write_json_atomic(&self.path, &next)?;
        self.reached = next;
        tracing::info!(bucket = bucket.unwrap_or("*"), "progress reset");
        Ok(())
    }

    /// (words completed, words in bucket), capped at the bucket size.
    pub fn completion(&self, bucket: &str, total: usize) -> (usize, usize) {
        (self.get(bucket).min(total), total)
    }
}
