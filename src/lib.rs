// Library surface: attempt scoring, classification, persistence and the
// practice session that ties them together. main.rs is a thin CLI on top.
pub mod app_dirs;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod feedback;
pub mod ledger;
pub mod logging;
pub mod progress;
pub mod session;
pub mod similarity;
pub mod store;
pub mod syllables;

pub use classifier::Label;
pub use error::{LexisError, Result};
