use crate::classifier::Label;
use itertools::Itertools;
use serde::Serialize;

/// How the message should be presented (its color).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Success => "green",
            Severity::Warning => "yellow",
            Severity::Error => "red",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feedback {
    pub message: String,
    pub severity: Severity,
}

/// Learner-facing message for a graded attempt. The category and the
/// severity depend on the label only.
pub fn compose(label: Label, attempt: &str, target: &str) -> Feedback {
    match label {
        Label::Correct => Feedback {
            message: format!("Correct! You said \"{target}\" perfectly!"),
            severity: Severity::Success,
        },
        Label::Almost => Feedback {
            message: "Almost there! Try once more, nice and slowly.".to_string(),
            severity: Severity::Warning,
        },
        Label::Incorrect if attempt.trim().is_empty() => Feedback {
            message: "Try again. I didn't hear anything that time.".to_string(),
            severity: Severity::Error,
        },
        Label::Incorrect => Feedback {
            message: format!("Try again. You said: {}", capitalize(attempt.trim())),
            severity: Severity::Error,
        },
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A longer, kid-friendly explanation of what went wrong, naming the
/// letters that were missed or added.
pub fn coaching_hint(target: &str, attempt: &str) -> String {
    let target = target.trim().to_lowercase();
    let attempt = attempt.trim().to_lowercase();

    if attempt.is_empty() {
        return "I didn't hear anything. Let's try again together!".to_string();
    }
    if attempt == target {
        return "Awesome! You said it perfectly!".to_string();
    }

    let ratio = strsim::normalized_levenshtein(&target, &attempt);
    if ratio > 0.8 {
        "Great job! That was very close. Try saying each part slowly.".to_string()
    } else if ratio > 0.5 {
        let differences = letter_differences(&target, &attempt);
        let detail = if differences.is_empty() {
            "a small mistake".to_string()
        } else {
            differences.iter().join(" and ")
        };
        format!("Good try! I noticed {detail}. Let's listen and try again.")
    } else {
        "That's a good try. Let's break the word down and practice together!".to_string()
    }
}

/// Letters missing from or added to `attempt`, from a longest common
/// subsequence alignment against `target`.
fn letter_differences(target: &str, attempt: &str) -> Vec<String> {
    let t: Vec<char> = target.chars().collect();
    let a: Vec<char> = attempt.chars().collect();

    // lcs[i][j] = LCS length of t[i..] and a[j..]
    let mut lcs = vec![vec![0usize; a.len() + 1]; t.len() + 1];
    for i in (0..t.len()).rev() {
        for j in (0..a.len()).rev() {
            lcs[i][j] = if t[i] == a[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < t.len() && j < a.len() {
        if t[i] == a[j] {
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            out.push(format!("missing '{}'", t[i]));
            i += 1;
        } else {
            out.push(format!("extra '{}'", a[j]));
            j += 1;
        }
    }
    out.extend(t[i..].iter().map(|c| format!("missing '{c}'")));
    out.extend(a[j..].iter().map(|c| format!("extra '{c}'")));
    out
}
