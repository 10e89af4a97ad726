use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Where lexis keeps its state files.
#[derive(Debug, Clone, PartialEq)]
pub struct AppDirs {
    data_dir: PathBuf,
}

impl AppDirs {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// $HOME/.local/state/lexis when HOME is set, otherwise the platform
    /// data dir, otherwise the working directory.
    pub fn resolve(override_dir: Option<&Path>) -> Self {
        if let Some(dir) = override_dir {
            return Self::new(dir);
        }
        if let Ok(home) = std::env::var("HOME") {
            return Self::new(PathBuf::from(home).join(".local").join("state").join("lexis"));
        }
        match ProjectDirs::from("", "", "lexis") {
            Some(proj_dirs) => Self::new(proj_dirs.data_local_dir()),
            None => Self::new("."),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn words(&self) -> PathBuf {
        self.data_dir.join("words.json")
    }

    pub fn attempts(&self) -> PathBuf {
        self.data_dir.join("attempts.json")
    }

    pub fn progress(&self) -> PathBuf {
        self.data_dir.join("progress.json")
    }

    pub fn model(&self) -> PathBuf {
        self.data_dir.join("model.json")
    }

    pub fn training_log(&self) -> PathBuf {
        self.data_dir.join("training_log.csv")
    }

    /// Optional user additions to the syllable tables.
    pub fn syllables(&self) -> PathBuf {
        self.data_dir.join("syllables.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let dirs = AppDirs::resolve(Some(Path::new("/tmp/lexis-test")));
        assert_eq!(dirs.data_dir(), Path::new("/tmp/lexis-test"));
        assert_eq!(dirs.model(), Path::new("/tmp/lexis-test/model.json"));
        assert_eq!(
            dirs.training_log(),
            Path::new("/tmp/lexis-test/training_log.csv")
        );
    }

    #[test]
    fn test_default_dir_named_after_app() {
        let dirs = AppDirs::resolve(None);
        assert!(dirs.data_dir().ends_with("lexis"));
    }
}
