use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Edit distance: minimum number of single-character insertions,
/// deletions or substitutions turning `a` into `b`.
pub fn distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Jaccard index of the two strings' character-bigram sets, in `[0, 1]`.
///
/// A one-character string contributes itself as its only "bigram". When
/// both sets are empty (both strings empty) the overlap is 0.
pub fn overlap(a: &str, b: &str) -> f64 {
    let left = bigrams(a);
    let right = bigrams(b);

    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    shared as f64 / union as f64
}

fn bigrams(s: &str) -> HashSet<String> {
    let chars: Vec<char> = s.chars().collect();
    match chars.len() {
        0 => HashSet::new(),
        1 => HashSet::from([s.to_string()]),
        _ => chars.windows(2).map(|w| w.iter().collect()).collect(),
    }
}

/// The feature pair every attempt is judged on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub distance: usize,
    pub similarity: f64,
}

impl Features {
    pub fn new(distance: usize, similarity: f64) -> Self {
        Self {
            distance,
            similarity,
        }
    }

    /// Score an attempt against its target. An empty attempt ("no speech
    /// detected") is a valid input: it lands at distance = target length
    /// and similarity 0.
    pub fn of(attempt: &str, target: &str) -> Self {
        Self::new(distance(attempt, target), overlap(attempt, target))
    }

    /// Input vector for the learned model.
    pub fn as_vector(&self) -> [f64; 2] {
        [self.distance as f64, self.similarity]
    }
}
