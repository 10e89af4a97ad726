use crate::store;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Data behind the segmenter: irregular words and how syllables sound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyllableTable {
    /// word -> syllables, returned verbatim
    #[serde(default)]
    pub exceptions: HashMap<String, Vec<String>>,
    /// syllable -> token that a speech engine pronounces naturally
    #[serde(default)]
    pub phonetics: HashMap<String, String>,
}

impl SyllableTable {
    pub fn builtin() -> Self {
        store::builtin("syllables.json")
    }

    /// Entries of `other` win over ours.
    pub fn merge(&mut self, other: SyllableTable) {
        self.exceptions.extend(other.exceptions);
        self.phonetics.extend(other.phonetics);
    }
}

/// Splits words into syllables for spoken coaching.
#[derive(Debug, Clone)]
pub struct Segmenter {
    table: SyllableTable,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(SyllableTable::builtin())
    }
}

impl Segmenter {
    pub fn new(table: SyllableTable) -> Self {
        Self { table }
    }

    /// Built-in table extended by a user table at `path`, if it exists.
    pub fn load(path: &Path) -> Self {
        let mut table = SyllableTable::builtin();
        if let Some(extra) = store::read_json::<SyllableTable>(path) {
            tracing::debug!(
                path = %path.display(),
                exceptions = extra.exceptions.len(),
                "loaded user syllable table"
            );
            table.merge(extra);
        }
        Self::new(table)
    }

    pub fn table(&self) -> &SyllableTable {
        &self.table
    }

    /// Syllables of `word` in reading order. Never empty.
    pub fn segment(&self, word: &str) -> Vec<String> {
        if let Some(known) = self.table.exceptions.get(&word.to_lowercase()) {
            if !known.is_empty() {
                return known.clone();
            }
        }

        let groups = vowel_groups(word);
        if groups.is_empty() {
            vec![word.to_string()]
        } else {
            groups
        }
    }

    pub fn count(&self, word: &str) -> usize {
        self.segment(word).len()
    }

    pub fn phoneticize(&self, syllable: &str) -> String {
        self.table
            .phonetics
            .get(&syllable.to_lowercase())
            .cloned()
            .unwrap_or_else(|| syllable.to_string())
    }

    /// What to say when coaching a word: each syllable as it sounds,
    /// then the whole word.
    pub fn speech_script(&self, word: &str) -> Vec<String> {
        let mut script: Vec<String> = self
            .segment(word)
            .iter()
            .map(|s| self.phoneticize(s))
            .collect();
        script.push(word.to_string());
        script
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Generic segmentation: each syllable is a consonant onset, a vowel run,
/// and a coda. The coda is the whole remaining consonant cluster at the
/// end of the word, otherwise one consonant when another consonant
/// follows it. Returns nothing for a word without vowels.
pub fn vowel_groups(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let mut groups = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut i = start;
        while i < chars.len() && !is_vowel(chars[i]) {
            i += 1;
        }
        if i == chars.len() {
            break;
        }
        while i < chars.len() && is_vowel(chars[i]) {
            i += 1;
        }

        if chars[i..].iter().all(|&c| !is_vowel(c)) {
            i = chars.len();
        } else if i + 1 < chars.len() && !is_vowel(chars[i]) && !is_vowel(chars[i + 1]) {
            i += 1;
        }

        groups.push(chars[start..i].iter().collect());
        start = i;
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn segment(word: &str) -> Vec<String> {
        Segmenter::default().segment(word)
    }

    #[test]
    fn test_fallback_rule() {
        assert_eq!(segment("apple"), vec!["ap", "ple"]);
        assert_eq!(segment("hello"), vec!["hel", "lo"]);
        assert_eq!(segment("rocket"), vec!["roc", "ket"]);
        assert_eq!(segment("island"), vec!["is", "land"]);
        assert_eq!(segment("joy"), vec!["joy"]);
        assert_eq!(segment("sign"), vec!["sign"]);
    }

    #[test]
    fn test_exception_table_wins() {
        assert_eq!(segment("chocolate"), vec!["choc", "o", "late"]);
        assert_eq!(segment("Butterfly"), vec!["but", "ter", "fly"]);
        assert_eq!(segment("mouse"), vec!["mouse"]);
        assert_eq!(segment("banana"), vec!["ba", "na", "na"]);
    }

    #[test]
    fn test_never_empty() {
        assert_eq!(segment("rhythm"), vec!["rhythm"]);
        assert_eq!(segment(""), vec![""]);
        assert_eq!(segment("a"), vec!["a"]);
    }

    #[test]
    fn test_fallback_keeps_every_letter() {
        for word in ["apple", "strengths", "education", "queue", "aorta", "tsk"] {
            assert_eq!(segment(word).concat(), word);
        }
    }

    #[test]
    fn test_exceptions_reconstruct_their_word() {
        let segmenter = Segmenter::default();
        assert!(!segmenter.table().exceptions.is_empty());
        for (word, syllables) in &segmenter.table().exceptions {
            assert_eq!(&syllables.concat(), word);
            assert_eq!(&segmenter.segment(word), syllables);
        }
    }

    #[test]
    fn test_phoneticize() {
        let segmenter = Segmenter::default();
        assert_eq!(segmenter.phoneticize("ple"), "poll");
        assert_eq!(segmenter.phoneticize("IS"), "eye");
        assert_eq!(segmenter.phoneticize("zork"), "zork");
    }

    #[test]
    fn test_speech_script() {
        let segmenter = Segmenter::default();
        assert_eq!(
            segmenter.speech_script("apple"),
            vec!["app", "poll", "apple"]
        );
    }

    #[test]
    fn test_load_merges_user_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("syllables.json");
        std::fs::write(
            &path,
            r#"{ "exceptions": { "apple": ["app", "le"] }, "phonetics": { "le": "ull" } }"#,
        )
        .unwrap();

        let segmenter = Segmenter::load(&path);
        assert_eq!(segmenter.segment("apple"), vec!["app", "le"]);
        assert_eq!(segmenter.phoneticize("le"), "ull");
        // builtin entries survive
        assert_eq!(segmenter.segment("chocolate"), vec!["choc", "o", "late"]);
    }

    #[test]
    fn test_load_without_user_table() {
        let dir = tempdir().unwrap();
        let segmenter = Segmenter::load(&dir.path().join("missing.json"));
        assert_eq!(segmenter.table(), &SyllableTable::builtin());
    }
}
