use crate::error::{LexisError, Result};
use crate::similarity::Features;
use crate::store;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Three-way outcome of an attempt.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Label {
    Correct,
    Almost,
    Incorrect,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Correct, Label::Almost, Label::Incorrect];

    fn index(self) -> usize {
        match self {
            Label::Correct => 0,
            Label::Almost => 1,
            Label::Incorrect => 2,
        }
    }
}

impl FromStr for Label {
    type Err = LexisError;

    fn from_str(s: &str) -> Result<Self> {
        Label::ALL
            .into_iter()
            .find(|label| label.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LexisError::UnknownLabel(s.to_string()))
    }
}

/// Similarity cut-offs for the rule-based labeller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub correct_similarity: f64,
    pub almost_similarity: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            correct_similarity: 0.9,
            almost_similarity: 0.7,
        }
    }
}

/// Heuristic label: exact or near-identical is correct, one edit away or
/// mostly overlapping is almost, anything else is incorrect.
pub fn rule_label(features: Features, thresholds: &Thresholds) -> Label {
    if features.distance == 0 || features.similarity >= thresholds.correct_similarity {
        Label::Correct
    } else if features.distance == 1 || features.similarity >= thresholds.almost_similarity {
        Label::Almost
    } else {
        Label::Incorrect
    }
}

const L2_PENALTY: f64 = 1e-4;
const SEED_EPOCHS: usize = 100;

fn seed_examples() -> [([f64; 2], Label); 3] {
    [
        ([0.0, 1.0], Label::Correct),
        ([1.0, 0.0], Label::Incorrect),
        ([0.5, 0.5], Label::Almost),
    ]
}

/// Multinomial logistic regression over (distance, similarity), trained
/// one example at a time with stochastic gradient descent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineModel {
    pub classes: [Label; 3],
    pub weights: [[f64; 2]; 3],
    pub bias: [f64; 3],
    pub learning_rate: f64,
    pub updates: u64,
}

impl OnlineModel {
    fn untrained(learning_rate: f64) -> Self {
        Self {
            classes: Label::ALL,
            weights: [[0.0; 2]; 3],
            bias: [0.0; 3],
            learning_rate,
            updates: 0,
        }
    }

    /// A model fitted to the seed examples only, so it answers sensibly
    /// before the first real attempt.
    pub fn bootstrap(learning_rate: f64) -> Self {
        let mut model = Self::untrained(learning_rate);
        for _ in 0..SEED_EPOCHS {
            for (x, label) in seed_examples() {
                model.fit_one(x, label);
            }
        }
        model
    }

    fn scores(&self, x: [f64; 2]) -> [f64; 3] {
        let mut z = [0.0; 3];
        for (k, score) in z.iter_mut().enumerate() {
            *score = self.weights[k][0] * x[0] + self.weights[k][1] * x[1] + self.bias[k];
        }
        z
    }

    /// Class probabilities, in `classes` order.
    pub fn probabilities(&self, x: [f64; 2]) -> [f64; 3] {
        let z = self.scores(x);
        let max = z.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp = z.map(|v| (v - max).exp());
        let total: f64 = exp.iter().sum();
        exp.map(|v| v / total)
    }

    pub fn predict(&self, x: [f64; 2]) -> Label {
        let z = self.scores(x);
        let mut best = 0;
        for k in 1..z.len() {
            if z[k] > z[best] {
                best = k;
            }
        }
        self.classes[best]
    }

    /// Single gradient step on the cross-entropy loss.
    pub fn fit_one(&mut self, x: [f64; 2], label: Label) {
        let p = self.probabilities(x);
        let target = label.index();
        let eta = self.learning_rate;

        for k in 0..self.weights.len() {
            let grad = p[k] - if k == target { 1.0 } else { 0.0 };
            for (j, w) in self.weights[k].iter_mut().enumerate() {
                *w -= eta * (grad * x[j] + L2_PENALTY * *w);
            }
            self.bias[k] -= eta * grad;
        }
        self.updates += 1;
    }
}

/// Result of grading one attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub features: Features,
    pub label: Label,
}

/// Labels attempts and keeps learning from them. The model on disk is
/// rewritten after every update, so a restart resumes where we left off.
#[derive(Debug)]
pub struct AttemptClassifier {
    model: OnlineModel,
    path: PathBuf,
    thresholds: Thresholds,
}

impl AttemptClassifier {
    /// Load the persisted model, or bootstrap one from the seed examples
    /// when none exists (or the stored one is unreadable). The given
    /// learning rate applies to later updates either way.
    pub fn open(path: impl Into<PathBuf>, thresholds: Thresholds, learning_rate: f64) -> Self {
        let path = path.into();
        let model = match store::read_json::<OnlineModel>(&path) {
            Some(mut model) => {
                tracing::debug!(path = %path.display(), updates = model.updates, "loaded feedback model");
                model.learning_rate = learning_rate;
                model
            }
            None => {
                tracing::info!(path = %path.display(), "bootstrapping feedback model from seed examples");
                OnlineModel::bootstrap(learning_rate)
            }
        };

        Self {
            model,
            path,
            thresholds,
        }
    }

    pub fn model(&self) -> &OnlineModel {
        &self.model
    }

    /// Score the attempt, label it by rule, train on that label and
    /// persist. The returned label is the rule label.
    pub fn classify_and_update(&mut self, attempt: &str, target: &str) -> Result<Classification> {
        let features = Features::of(attempt, target);
        let label = rule_label(features, &self.thresholds);
        self.update_with_label(features, label)?;
        Ok(Classification { features, label })
    }

    /// Train on an externally supplied label (for example one confirmed by
    /// a tutor) instead of the rule label.
    pub fn update_with_label(&mut self, features: Features, label: Label) -> Result<()> {
        let mut next = self.model.clone();
        next.fit_one(features.as_vector(), label);
        store::write_json_atomic(&self.path, &next)?;
        self.model = next;
        tracing::debug!(
            distance = features.distance,
            similarity = features.similarity,
            %label,
            updates = self.model.updates,
            "feedback model updated"
        );
        Ok(())
    }

    /// The learned decision, without training.
    pub fn predict(&self, features: Features) -> Label {
        self.model.predict(features.as_vector())
    }
}

/// Query the model stored at `path` without updating it.
pub fn predict_persisted(path: &Path, features: Features, learning_rate: f64) -> Label {
    store::read_json::<OnlineModel>(path)
        .unwrap_or_else(|| OnlineModel::bootstrap(learning_rate))
        .predict(features.as_vector())
}
