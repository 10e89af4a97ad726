use clap::{Parser, Subcommand};
use itertools::Itertools;
use lexis::{
    app_dirs::AppDirs,
    catalog::WordCatalog,
    classifier::{predict_persisted, AttemptClassifier, Label},
    config::{Config, ConfigStore, FileConfigStore},
    feedback::{coaching_hint, compose},
    ledger::AttemptLedger,
    logging::init_logging,
    progress::ProgressStore,
    session::{Evaluation, PracticeSession},
    similarity::Features,
    syllables::Segmenter,
};
use std::{
    error::Error,
    io::{self, BufRead, Write},
    path::PathBuf,
};

/// pronunciation practice with graded feedback and syllable coaching
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Practice reading words aloud. Attempts are graded as correct, almost or incorrect, logged, and used to keep training the feedback model."
)]
pub struct Cli {
    /// directory holding words, counters, progress, model and log
    #[clap(long, global = true, env = "LEXIS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// more logging (-v info, -vv debug, -vvv trace)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// grade one attempt at a target word
    Attempt {
        target: String,
        /// what was said or typed; omit when nothing was heard
        attempt: Option<String>,
        /// bucket the attempt is counted under
        #[clap(short, long)]
        bucket: Option<String>,
    },
    /// practice a bucket interactively, one attempt per line
    Practice {
        #[clap(short, long)]
        bucket: Option<String>,
        /// shuffle the words first
        #[clap(long)]
        shuffle: bool,
    },
    /// show how a word splits into syllables and how they are spoken
    Syllables { word: String },
    /// ask the feedback model for a label without training it
    Predict { distance: usize, similarity: f64 },
    /// list buckets, or the words of one bucket
    Words { bucket: Option<String> },
    /// add a word to the catalog
    Add {
        word: String,
        /// defaults to easy/hard by syllable count
        #[clap(short, long)]
        bucket: Option<String>,
        #[clap(long)]
        hint: Option<String>,
    },
    /// attempt counts, progress and per-word results
    Stats,
    /// most recent logged attempts
    History {
        #[clap(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// show settings, or change them with the flags
    Config {
        /// step size for feedback model updates
        #[clap(long)]
        learning_rate: Option<f64>,
        /// bucket used when none is given
        #[clap(long)]
        default_bucket: Option<String>,
    },
    /// clear attempt counters (the log is kept)
    Reset {
        #[clap(short, long)]
        bucket: Option<String>,
        /// also clear progress
        #[clap(long)]
        progress: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = FileConfigStore::new();
    let config = store.load();
    let dirs = AppDirs::resolve(cli.data_dir.as_deref().or(config.data_dir.as_deref()));
    tracing::debug!(data_dir = %dirs.data_dir().display(), "resolved data directory");

    let stdin = io::stdin();
    let stdout = io::stdout();
    run(
        cli.command,
        &dirs,
        &store,
        &config,
        stdin.lock(),
        &mut stdout.lock(),
    )
}

fn run<R: BufRead, W: Write>(
    command: Command,
    dirs: &AppDirs,
    store: &FileConfigStore,
    config: &Config,
    input: R,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let default_bucket = || config.default_bucket.clone();

    match command {
        Command::Attempt {
            target,
            attempt,
            bucket,
        } => {
            let bucket = bucket.unwrap_or_else(default_bucket);
            let target = target.trim().to_lowercase();
            let attempt = attempt.unwrap_or_default().trim().to_lowercase();

            let mut classifier =
                AttemptClassifier::open(dirs.model(), config.thresholds, config.learning_rate);
            let mut ledger = AttemptLedger::open(dirs.training_log(), dirs.attempts());

            let result = classifier.classify_and_update(&attempt, &target)?;
            let count = ledger.record(&bucket, &attempt, &target, result.features, result.label)?;
            let feedback = compose(result.label, &attempt, &target);
            let segmenter = Segmenter::load(&dirs.syllables());

            writeln!(out, "label: {}", result.label)?;
            writeln!(out, "message: {}", feedback.message)?;
            writeln!(out, "severity: {}", feedback.severity)?;
            writeln!(
                out,
                "distance: {}, similarity: {:.2}",
                result.features.distance, result.features.similarity
            )?;
            writeln!(out, "syllables: {}", segmenter.segment(&target).join(" - "))?;
            writeln!(out, "attempts: {count}")?;
        }
        Command::Practice { bucket, shuffle } => {
            let bucket = bucket.unwrap_or_else(default_bucket);
            let mut session = PracticeSession::open(dirs, config, &bucket)?;
            if shuffle {
                session.shuffle()?;
            }
            practice(&mut session, input, out)?;
        }
        Command::Syllables { word } => {
            let segmenter = Segmenter::load(&dirs.syllables());
            writeln!(out, "{}", segmenter.segment(&word).join(" - "))?;
            writeln!(out, "say: {}", segmenter.speech_script(&word).join(", "))?;
        }
        Command::Predict {
            distance,
            similarity,
        } => {
            let label = predict_persisted(
                &dirs.model(),
                Features::new(distance, similarity),
                config.learning_rate,
            );
            writeln!(out, "{label}")?;
        }
        Command::Words { bucket } => {
            let catalog = WordCatalog::load_or_init(dirs.words())?;
            match bucket {
                Some(bucket) => {
                    for entry in catalog.words(&bucket)? {
                        match &entry.hint {
                            Some(hint) => writeln!(out, "{} ({hint})", entry.word)?,
                            None => writeln!(out, "{}", entry.word)?,
                        }
                    }
                }
                None => {
                    writeln!(out, "catalog: {}", catalog.path().display())?;
                    for name in catalog.bucket_names() {
                        writeln!(out, "{name}: {} words", catalog.words(name)?.len())?;
                    }
                }
            }
        }
        Command::Add { word, bucket, hint } => {
            let mut catalog = WordCatalog::load_or_init(dirs.words())?;
            let segmenter = Segmenter::load(&dirs.syllables());
            let bucket = catalog.add_word(&word, bucket.as_deref(), hint, &segmenter)?;
            writeln!(out, "added '{}' to {bucket}", word.trim().to_lowercase())?;
        }
        Command::Stats => stats(dirs, out)?,
        Command::History { limit } => {
            let ledger = AttemptLedger::open(dirs.training_log(), dirs.attempts());
            let history = ledger.history()?;
            let skip = history.len().saturating_sub(limit);
            for record in history.iter().skip(skip) {
                writeln!(
                    out,
                    "{} [{}] {} -> {:?}: {} (d={}, s={:.2})",
                    record.recorded_at.format("%Y-%m-%d %H:%M"),
                    record.bucket,
                    record.target,
                    record.attempt,
                    record.label,
                    record.distance,
                    record.similarity,
                )?;
            }
        }
        Command::Config {
            learning_rate,
            default_bucket,
        } => {
            let mut updated = config.clone();
            if let Some(rate) = learning_rate {
                if !(rate.is_finite() && rate > 0.0) {
                    return Err(format!("learning rate must be positive, got {rate}").into());
                }
                updated.learning_rate = rate;
            }
            if let Some(bucket) = default_bucket {
                updated.default_bucket = bucket;
            }
            if &updated != config {
                store.save(&updated)?;
                tracing::info!(path = %store.path().display(), "config saved");
            }
            writeln!(out, "config: {}", store.path().display())?;
            writeln!(out, "{}", serde_json::to_string_pretty(&updated)?)?;
        }
        Command::Reset { bucket, progress } => {
            let mut ledger = AttemptLedger::open(dirs.training_log(), dirs.attempts());
            ledger.reset(bucket.as_deref())?;
            if progress {
                ProgressStore::open(dirs.progress()).reset(bucket.as_deref())?;
            }
            let scope = bucket.as_deref().unwrap_or("all buckets");
            writeln!(out, "reset attempt counters for {scope}")?;
        }
    }

    Ok(())
}

fn stats<W: Write>(dirs: &AppDirs, out: &mut W) -> Result<(), Box<dyn Error>> {
    let catalog = WordCatalog::load_or_init(dirs.words())?;
    let ledger = AttemptLedger::open(dirs.training_log(), dirs.attempts());
    let progress = ProgressStore::open(dirs.progress());

    for name in catalog.bucket_names() {
        let words = catalog.words(name)?;
        let (done, total) = progress.completion(name, words.len());
        writeln!(out, "{name}: {done} / {total} words completed")?;
        for entry in words {
            writeln!(
                out,
                "  {:<12} attempts: {}",
                entry.word,
                ledger.get_count(name, &entry.word)
            )?;
        }
    }

    let summary = ledger.summary()?;
    if !summary.is_empty() {
        writeln!(out, "results:")?;
        for (word, s) in summary
            .iter()
            .sorted_by(|a, b| b.1.attempts.cmp(&a.1.attempts).then(a.0.cmp(b.0)))
        {
            writeln!(
                out,
                "  {word:<12} {} correct, {} almost, {} incorrect ({:.0}% correct)",
                s.correct,
                s.almost,
                s.incorrect,
                s.success_rate()
            )?;
        }
    }
    Ok(())
}

/// Show the current word; returns the choices in the order displayed.
fn print_prompt<W: Write>(
    session: &PracticeSession,
    out: &mut W,
) -> Result<Vec<String>, Box<dyn Error>> {
    let entry = session.current()?;
    writeln!(
        out,
        "[{} {}/{}] {}  (attempts: {})",
        session.bucket(),
        session.index() + 1,
        session.len(),
        entry.word,
        session.attempts()?
    )?;
    let mut options = Vec::new();
    if entry.is_multiple_choice() {
        options = session.options()?;
        writeln!(
            out,
            "choose: {}",
            options
                .iter()
                .enumerate()
                .map(|(i, o)| format!("{}) {o}", i + 1))
                .join("  ")
        )?;
    }
    out.flush()?;
    Ok(options)
}

fn print_evaluation<W: Write>(eval: &Evaluation, out: &mut W) -> io::Result<()> {
    writeln!(out, "{} [{}]", eval.feedback.message, eval.label)?;
    if eval.label != Label::Correct {
        writeln!(out, "syllables: {}", eval.syllables.join(" - "))?;
        writeln!(out, "{}", coaching_hint(&eval.target, &eval.attempt))?;
    }
    Ok(())
}

/// Line-oriented practice loop. Each line is one attempt; an empty line
/// means nothing was heard. Lines starting with ':' are commands, and
/// `:mark <label>` retrains the model on the last spoken attempt.
fn practice<R: BufRead, W: Write>(
    session: &mut PracticeSession,
    input: R,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    writeln!(
        out,
        "commands: :skip :coach :hint :mark <label> :shuffle :quit"
    )?;
    let mut shown = print_prompt(session, out)?;
    let mut last: Option<Evaluation> = None;

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        match line {
            ":quit" | ":q" => break,
            ":skip" => session.skip(),
            ":shuffle" => session.shuffle()?,
            ":hint" => match session.hint()? {
                Some(hint) => writeln!(out, "hint: {hint}")?,
                None => writeln!(out, "no hint for this word")?,
            },
            ":coach" => {
                let coaching = session.coach()?;
                writeln!(out, "syllables: {}", coaching.syllables.join(" - "))?;
                writeln!(out, "say: {}", coaching.speech.join(", "))?;
            }
            _ if line == ":mark" || line.starts_with(":mark ") => {
                match (line[":mark".len()..].trim().parse::<Label>(), &last) {
                    (Ok(label), Some(eval)) => {
                        session
                            .classifier_mut()
                            .update_with_label(eval.features, label)?;
                        writeln!(out, "marked \"{}\" as {label}", eval.attempt)?;
                    }
                    (Ok(_), None) => writeln!(out, "nothing to mark yet")?,
                    (Err(e), _) => writeln!(out, "{e}")?,
                }
            }
            _ if line.starts_with(':') => {
                writeln!(out, "unknown command {line}")?;
            }
            _ => {
                let eval = if !shown.is_empty() {
                    let choice = line
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|i| shown.get(i).cloned())
                        .unwrap_or_else(|| line.to_string());
                    session.choose(&choice)?
                } else {
                    let eval = session.evaluate(line)?;
                    last = Some(eval.clone());
                    eval
                };
                print_evaluation(&eval, out)?;
                if eval.finished {
                    writeln!(
                        out,
                        "Congratulations! You finished the {} words. Practice makes perfect.",
                        session.bucket()
                    )?;
                    break;
                }
            }
        }
        shown = print_prompt(session, out)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, AppDirs) {
        let dir = tempdir().unwrap();
        let dirs = AppDirs::new(dir.path());
        (dir, dirs)
    }

    fn run_to_string(command: Command, dirs: &AppDirs, input: &str) -> String {
        let mut out = Vec::new();
        let store = FileConfigStore::with_path(dirs.data_dir().join("config.json"));
        run(
            command,
            dirs,
            &store,
            &store.load(),
            input.as_bytes(),
            &mut out,
        )
        .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_attempt() {
        let cli = Cli::try_parse_from(["lexis", "attempt", "apple", "aple", "-b", "hard"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Attempt {
                target: "apple".into(),
                attempt: Some("aple".into()),
                bucket: Some("hard".into()),
            }
        );
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_verbosity_and_data_dir() {
        let cli = Cli::try_parse_from(["lexis", "-vv", "--data-dir", "/tmp/x", "stats"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        assert_eq!(cli.command, Command::Stats);
    }

    #[test]
    fn test_cli_history_default_limit() {
        let cli = Cli::try_parse_from(["lexis", "history"]).unwrap();
        assert_eq!(cli.command, Command::History { limit: 20 });
    }

    #[test]
    fn test_attempt_command() {
        let (_dir, dirs) = setup();
        let output = run_to_string(
            Command::Attempt {
                target: "apple".into(),
                attempt: Some("aple".into()),
                bucket: None,
            },
            &dirs,
            "",
        );
        assert!(output.contains("label: almost"));
        assert!(output.contains("syllables: ap - ple"));
        assert!(output.contains("attempts: 1"));
        assert!(dirs.model().exists());
        assert!(dirs.training_log().exists());
    }

    #[test]
    fn test_attempt_without_speech() {
        let (_dir, dirs) = setup();
        let output = run_to_string(
            Command::Attempt {
                target: "joy".into(),
                attempt: None,
                bucket: Some("easy".into()),
            },
            &dirs,
            "",
        );
        assert!(output.contains("label: incorrect"));
        assert!(output.contains("distance: 3, similarity: 0.00"));
    }

    #[test]
    fn test_syllables_command() {
        let (_dir, dirs) = setup();
        let output = run_to_string(
            Command::Syllables {
                word: "chocolate".into(),
            },
            &dirs,
            "",
        );
        assert_eq!(output, "choc - o - late\nsay: chok, oh, late, chocolate\n");
    }

    #[test]
    fn test_predict_command_on_fresh_state() {
        let (_dir, dirs) = setup();
        let output = run_to_string(
            Command::Predict {
                distance: 0,
                similarity: 1.0,
            },
            &dirs,
            "",
        );
        assert_eq!(output.trim(), "correct");
        assert!(!dirs.model().exists());
    }

    #[test]
    fn test_practice_loop() {
        let (_dir, dirs) = setup();
        let output = run_to_string(
            Command::Practice {
                bucket: Some("easy".into()),
                shuffle: false,
            },
            &dirs,
            "helo\n:coach\nhello\n:hint\n:quit\n",
        );
        assert!(output.contains("[easy 1/5] hello  (attempts: 0)"));
        assert!(output.contains("Almost there!"));
        assert!(output.contains("say: hel, lo, hello"));
        assert!(output.contains("[easy 2/5] apple  (attempts: 0)"));
        assert!(output.contains("no hint for this word"));
    }

    #[test]
    fn test_practice_multiple_choice_by_number() {
        let (_dir, dirs) = setup();
        let output = run_to_string(
            Command::Practice {
                bucket: Some("medium".into()),
                shuffle: false,
            },
            &dirs,
            "basket\n:quit\n",
        );
        assert!(output.contains("choose: 1) "));
        assert!(output.contains("Correct!"));
        assert!(output.contains("] banana"));
    }

    #[test]
    fn test_practice_finishes_bucket() {
        let (_dir, dirs) = setup();
        let output = run_to_string(
            Command::Practice {
                bucket: Some("hard".into()),
                shuffle: false,
            },
            &dirs,
            "scissor\nchocolate\nbutterfly\nisland\nsign\n",
        );
        assert!(output.contains("Congratulations!"));
    }

    #[test]
    fn test_add_words_and_stats() {
        let (_dir, dirs) = setup();
        let output = run_to_string(
            Command::Add {
                word: "Tiger".into(),
                bucket: None,
                hint: None,
            },
            &dirs,
            "",
        );
        assert_eq!(output, "added 'tiger' to easy\n");

        run_to_string(
            Command::Attempt {
                target: "tiger".into(),
                attempt: Some("tiger".into()),
                bucket: Some("easy".into()),
            },
            &dirs,
            "",
        );

        let stats = run_to_string(Command::Stats, &dirs, "");
        assert!(stats.contains("easy: 0 / 6 words completed"));
        assert!(stats.contains("tiger        attempts: 1"));
        assert!(stats.contains("1 correct, 0 almost, 0 incorrect (100% correct)"));

        let words = run_to_string(Command::Words { bucket: None }, &dirs, "");
        assert!(words.contains("easy: 6 words"));
    }

    #[test]
    fn test_practice_mark_and_unknown_commands() {
        let (_dir, dirs) = setup();
        let output = run_to_string(
            Command::Practice {
                bucket: Some("easy".into()),
                shuffle: false,
            },
            &dirs,
            ":mark correct\n:help\nhxllo\n:mark correct\n:mark maybe\n:quit\n",
        );
        assert!(output.contains("nothing to mark yet"));
        assert!(output.contains("unknown command :help"));
        assert!(output.contains("marked \"hxllo\" as correct"));
        assert!(output.contains("unknown label 'maybe'"));

        // only the spoken attempt reaches the log; the mark trains the model
        let ledger = AttemptLedger::open(dirs.training_log(), dirs.attempts());
        assert_eq!(ledger.history().unwrap().len(), 1);
        let model = AttemptClassifier::open(dirs.model(), Default::default(), 0.1);
        assert_eq!(model.model().updates, 302);
    }

    #[test]
    fn test_config_command_saves_changes() {
        let (_dir, dirs) = setup();
        let output = run_to_string(
            Command::Config {
                learning_rate: Some(0.05),
                default_bucket: Some("hard".into()),
            },
            &dirs,
            "",
        );
        assert!(output.contains("\"default_bucket\": \"hard\""));

        let saved = FileConfigStore::with_path(dirs.data_dir().join("config.json")).load();
        assert_eq!(saved.learning_rate, 0.05);
        assert_eq!(saved.default_bucket, "hard");

        let shown = run_to_string(
            Command::Config {
                learning_rate: None,
                default_bucket: None,
            },
            &dirs,
            "",
        );
        assert!(shown.contains("\"learning_rate\": 0.05"));
    }

    #[test]
    fn test_reset_keeps_history() {
        let (_dir, dirs) = setup();
        for _ in 0..2 {
            run_to_string(
                Command::Attempt {
                    target: "apple".into(),
                    attempt: Some("apple".into()),
                    bucket: Some("easy".into()),
                },
                &dirs,
                "",
            );
        }
        let output = run_to_string(
            Command::Reset {
                bucket: Some("easy".into()),
                progress: true,
            },
            &dirs,
            "",
        );
        assert_eq!(output, "reset attempt counters for easy\n");

        let ledger = AttemptLedger::open(dirs.training_log(), dirs.attempts());
        assert_eq!(ledger.get_count("easy", "apple"), 0);
        let history = run_to_string(Command::History { limit: 10 }, &dirs, "");
        assert_eq!(history.lines().count(), 2);
    }
}
