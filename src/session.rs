use crate::app_dirs::AppDirs;
use crate::catalog::{WordCatalog, WordEntry};
use crate::classifier::{AttemptClassifier, Label};
use crate::config::Config;
use crate::error::{LexisError, Result};
use crate::feedback::{compose, Feedback};
use crate::ledger::AttemptLedger;
use crate::progress::ProgressStore;
use crate::similarity::Features;
use crate::syllables::Segmenter;

/// Everything the presentation layer needs after one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub target: String,
    pub attempt: String,
    pub label: Label,
    pub features: Features,
    pub feedback: Feedback,
    pub syllables: Vec<String>,
    /// attempts on this word so far, this one included
    pub attempts: u32,
    /// moved on to the next word
    pub advanced: bool,
    /// the last word of the bucket was just completed
    pub finished: bool,
}

/// Syllable coaching for the current word.
#[derive(Debug, Clone, PartialEq)]
pub struct Coaching {
    pub word: String,
    pub syllables: Vec<String>,
    pub speech: Vec<String>,
}

/// One learner working through one bucket. Owns all evaluation state;
/// each call runs to completion, persisted, before returning.
#[derive(Debug)]
pub struct PracticeSession {
    catalog: WordCatalog,
    classifier: AttemptClassifier,
    ledger: AttemptLedger,
    progress: ProgressStore,
    segmenter: Segmenter,
    bucket: String,
    index: usize,
    finished: bool,
}

impl PracticeSession {
    pub fn open(dirs: &AppDirs, config: &Config, bucket: &str) -> Result<Self> {
        let catalog = WordCatalog::load_or_init(dirs.words())?;
        let words = catalog.words(bucket)?;
        if words.is_empty() {
            return Err(LexisError::EmptyBucket(bucket.to_string()));
        }

        let mut ledger = AttemptLedger::open(dirs.training_log(), dirs.attempts());
        ledger.ensure_words(bucket, words.iter().map(|e| e.word.as_str()))?;

        let classifier =
            AttemptClassifier::open(dirs.model(), config.thresholds, config.learning_rate);

        tracing::debug!(bucket, words = words.len(), "practice session opened");
        Ok(Self {
            catalog,
            classifier,
            ledger,
            progress: ProgressStore::open(dirs.progress()),
            segmenter: Segmenter::load(&dirs.syllables()),
            bucket: bucket.to_string(),
            index: 0,
            finished: false,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.words().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn words(&self) -> &[WordEntry] {
        self.catalog.words(&self.bucket).unwrap_or_default()
    }

    /// The word being practised. Wraps to the start once the bucket is done.
    pub fn current(&self) -> Result<&WordEntry> {
        self.catalog.get(&self.bucket, self.index)
    }

    pub fn attempts(&self) -> Result<u32> {
        let word = &self.current()?.word;
        Ok(self.ledger.get_count(&self.bucket, word))
    }

    pub fn hint(&self) -> Result<Option<&str>> {
        Ok(self.current()?.hint.as_deref())
    }

    /// Decoys for a multiple-choice round, shuffled; empty for spoken words.
    pub fn options(&self) -> Result<Vec<String>> {
        Ok(self.current()?.shuffled_options())
    }

    pub fn coach(&self) -> Result<Coaching> {
        let word = self.current()?.word.clone();
        Ok(Coaching {
            syllables: self.segmenter.segment(&word),
            speech: self.segmenter.speech_script(&word),
            word,
        })
    }

    /// Grade a spoken or typed attempt at the current word. An empty
    /// attempt means nothing was heard.
    pub fn evaluate(&mut self, attempt: &str) -> Result<Evaluation> {
        let target = self.current()?.word.clone();
        let attempt = attempt.trim().to_lowercase();

        let classification = self.classifier.classify_and_update(&attempt, &target)?;
        self.finish(attempt, target, classification.features, classification.label)
    }

    /// Grade a multiple-choice pick. Exact match only; the feedback model
    /// is not trained on choices.
    pub fn choose(&mut self, option: &str) -> Result<Evaluation> {
        let target = self.current()?.word.clone();
        let option = option.trim().to_lowercase();

        let features = Features::of(&option, &target);
        let label = if option == target {
            Label::Correct
        } else {
            Label::Incorrect
        };
        self.finish(option, target, features, label)
    }

    fn finish(
        &mut self,
        attempt: String,
        target: String,
        features: Features,
        label: Label,
    ) -> Result<Evaluation> {
        let attempts = self
            .ledger
            .record(&self.bucket, &attempt, &target, features, label)?;
        let feedback = compose(label, &attempt, &target);
        let syllables = self.segmenter.segment(&target);

        let advanced = label == Label::Correct;
        let finished = advanced && self.advance()?;

        Ok(Evaluation {
            target,
            attempt,
            label,
            features,
            feedback,
            syllables,
            attempts,
            advanced,
            finished,
        })
    }

    /// Step past the current word. Returns true when that completed the
    /// bucket, in which case the session wraps back to the first word.
    fn advance(&mut self) -> Result<bool> {
        let len = self.len();
        let reached = (self.index + 1).min(len);
        self.progress.advance(&self.bucket, reached)?;

        let done = reached == len;
        self.index = if done { 0 } else { reached };
        self.finished = done;
        if done {
            tracing::info!(bucket = %self.bucket, "bucket completed");
        }
        Ok(done)
    }

    /// Move to the next word without grading; progress is unchanged.
    pub fn skip(&mut self) {
        if self.is_empty() {
            return;
        }
        self.index = (self.index + 1) % self.len();
        self.finished = false;
    }

    pub fn restart(&mut self) {
        self.index = 0;
        self.finished = false;
    }

    /// Shuffle this bucket's words and start over.
    pub fn shuffle(&mut self) -> Result<()> {
        self.catalog.shuffle(&self.bucket)?;
        self.restart();
        Ok(())
    }

    pub fn classifier(&self) -> &AttemptClassifier {
        &self.classifier
    }

    pub fn classifier_mut(&mut self) -> &mut AttemptClassifier {
        &mut self.classifier
    }

    pub fn ledger(&self) -> &AttemptLedger {
        &self.ledger
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::Severity;
    use assert_matches::assert_matches;
    use tempfile::{tempdir, TempDir};

    fn open(bucket: &str) -> (TempDir, PracticeSession) {
        let dir = tempdir().unwrap();
        let dirs = AppDirs::new(dir.path());
        let session = PracticeSession::open(&dirs, &Config::default(), bucket).unwrap();
        (dir, session)
    }

    #[test]
    fn test_open_unknown_bucket() {
        let dir = tempdir().unwrap();
        let dirs = AppDirs::new(dir.path());
        assert_matches!(
            PracticeSession::open(&dirs, &Config::default(), "expert"),
            Err(LexisError::UnknownBucket(_))
        );
    }

    #[test]
    fn test_open_creates_counters_for_bucket() {
        let (_dir, session) = open("easy");
        assert_eq!(session.ledger().counts()["easy"].len(), 5);
        assert_eq!(session.attempts().unwrap(), 0);
        assert_eq!(session.current().unwrap().word, "hello");
    }

    #[test]
    fn test_almost_stays_on_word() {
        let (_dir, mut session) = open("easy");
        let eval = session.evaluate("helo").unwrap();
        assert_eq!(eval.label, Label::Almost);
        assert_eq!(eval.feedback.severity, Severity::Warning);
        assert_eq!(eval.syllables, vec!["hel", "lo"]);
        assert_eq!(eval.attempts, 1);
        assert!(!eval.advanced);
        assert_eq!(session.index(), 0);
    }

    #[test]
    fn test_correct_advances_and_records_progress() {
        let (_dir, mut session) = open("easy");
        session.evaluate("").unwrap();
        let eval = session.evaluate(" Hello ").unwrap();
        assert_eq!(eval.attempt, "hello");
        assert_eq!(eval.label, Label::Correct);
        assert_eq!(eval.attempts, 2);
        assert!(eval.advanced);
        assert_eq!(session.current().unwrap().word, "apple");
        assert_eq!(session.progress().get("easy"), 1);
        assert_eq!(session.ledger().history().unwrap().len(), 2);
    }

    #[test]
    fn test_finishing_the_bucket() {
        let (_dir, mut session) = open("hard");
        let words: Vec<String> = session
            .words()
            .iter()
            .map(|e| e.word.clone())
            .collect();
        let mut last = None;
        for word in &words {
            last = Some(session.evaluate(word).unwrap());
        }
        let last = last.unwrap();
        assert!(last.finished);
        assert!(session.is_finished());
        assert_eq!(session.progress().completion("hard", words.len()), (5, 5));

        session.restart();
        assert!(!session.is_finished());
        assert_eq!(session.current().unwrap().word, words[0]);
    }

    #[test]
    fn test_evaluating_after_the_bucket_is_done() {
        let (_dir, mut session) = open("hard");
        let words: Vec<String> = session
            .words()
            .iter()
            .map(|e| e.word.clone())
            .collect();
        for word in &words {
            session.evaluate(word).unwrap();
        }
        assert!(session.is_finished());
        assert_eq!(session.index(), 0);

        // Another lap starts from the first word; completion is not re-reported
        let again = session.evaluate(&words[0]).unwrap();
        assert_eq!(again.target, words[0]);
        assert!(again.advanced);
        assert!(!again.finished);
        assert!(!session.is_finished());
        assert_eq!(session.index(), 1);
        assert_eq!(session.progress().get("hard"), words.len());

        session.evaluate(&words[1]).unwrap();
        assert_eq!(session.progress().get("hard"), words.len());
        session.skip();
        assert_eq!(session.index(), 3);
    }

    #[test]
    fn test_multiple_choice() {
        let (_dir, mut session) = open("medium");
        assert_eq!(session.options().unwrap().len(), 4);
        assert!(session.hint().unwrap().is_some());

        let wrong = session.choose("basset").unwrap();
        assert_eq!(wrong.label, Label::Incorrect);
        let updates = session.classifier().model().updates;

        let right = session.choose("basket").unwrap();
        assert_eq!(right.label, Label::Correct);
        assert_eq!(right.attempts, 2);
        assert!(right.advanced);
        assert_eq!(session.classifier().model().updates, updates);
    }

    #[test]
    fn test_coach() {
        let (_dir, mut session) = open("easy");
        session.skip();
        let coaching = session.coach().unwrap();
        assert_eq!(coaching.word, "apple");
        assert_eq!(coaching.syllables, vec!["ap", "ple"]);
        assert_eq!(coaching.speech, vec!["app", "poll", "apple"]);
    }

    #[test]
    fn test_skip_wraps_without_progress() {
        let (_dir, mut session) = open("easy");
        for _ in 0..5 {
            session.skip();
        }
        assert_eq!(session.index(), 0);
        assert_eq!(session.progress().get("easy"), 0);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let dirs = AppDirs::new(dir.path());
        {
            let mut session = PracticeSession::open(&dirs, &Config::default(), "easy").unwrap();
            session.evaluate("helo").unwrap();
            session.evaluate("hello").unwrap();
        }
        let session = PracticeSession::open(&dirs, &Config::default(), "easy").unwrap();
        assert_eq!(session.ledger().get_count("easy", "hello"), 2);
        assert_eq!(session.progress().get("easy"), 1);
        assert_eq!(session.classifier().model().updates, 302);
    }
}
