use crate::error::{LexisError, Result};
use crate::store;
use crate::syllables::Segmenter;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A practice word. Medium-level words also carry decoys for
/// multiple-choice rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordEntry {
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl WordEntry {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            hint: None,
            options: None,
        }
    }

    pub fn is_multiple_choice(&self) -> bool {
        self.options.as_ref().is_some_and(|o| !o.is_empty())
    }

    /// The choices in a fresh random order.
    pub fn shuffled_options(&self) -> Vec<String> {
        let mut options = self.options.clone().unwrap_or_default();
        options.shuffle(&mut rand::thread_rng());
        options
    }
}

/// bucket -> ordered words
pub type Buckets = BTreeMap<String, Vec<WordEntry>>;

/// Words grouped into difficulty buckets, stored as JSON.
#[derive(Debug)]
pub struct WordCatalog {
    path: PathBuf,
    buckets: Buckets,
}

impl WordCatalog {
    pub fn builtin() -> Buckets {
        store::builtin("words.json")
    }

    /// Load the catalog; on first run the built-in catalog is written out.
    /// A corrupt file is left alone and the built-in words are used.
    pub fn load_or_init(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(buckets) = store::read_json::<Buckets>(&path) {
            return Ok(Self { path, buckets });
        }

        let buckets = Self::builtin();
        if !path.exists() {
            tracing::info!(path = %path.display(), "writing default word catalog");
            store::write_json_atomic(&path, &buckets)?;
        }
        Ok(Self { path, buckets })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bucket_names(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn words(&self, bucket: &str) -> Result<&[WordEntry]> {
        self.buckets
            .get(bucket)
            .map(Vec::as_slice)
            .ok_or_else(|| LexisError::UnknownBucket(bucket.to_string()))
    }

    pub fn get(&self, bucket: &str, index: usize) -> Result<&WordEntry> {
        let words = self.words(bucket)?;
        if words.is_empty() {
            return Err(LexisError::EmptyBucket(bucket.to_string()));
        }
        Ok(&words[index % words.len()])
    }

    /// Add a word. Without an explicit bucket, short words (two syllables
    /// or fewer) go to "easy" and longer ones to "hard".
    pub fn add_word(
        &mut self,
        word: &str,
        bucket: Option<&str>,
        hint: Option<String>,
        segmenter: &Segmenter,
    ) -> Result<String> {
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            return Err(LexisError::InvalidWord {
                word,
                reason: "word is empty",
            });
        }

        let bucket = match bucket {
            Some(bucket) => bucket.to_string(),
            None if segmenter.count(&word) <= 2 => "easy".to_string(),
            None => "hard".to_string(),
        };

        let entries = self.buckets.entry(bucket.clone()).or_default();
        if entries.iter().any(|e| e.word == word) {
            return Err(LexisError::InvalidWord {
                word,
                reason: "already in this bucket",
            });
        }
        entries.push(WordEntry {
            hint,
            ..WordEntry::new(word.clone())
        });

        store::write_json_atomic(&self.path, &self.buckets)?;
        tracing::info!(word, bucket, "word added");
        Ok(bucket)
    }

    /// Randomly reorder one bucket for this session. Not persisted.
    pub fn shuffle(&mut self, bucket: &str) -> Result<()> {
        let words = self
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| LexisError::UnknownBucket(bucket.to_string()))?;
        words.shuffle(&mut rand::thread_rng());
        Ok(())
    }
}
