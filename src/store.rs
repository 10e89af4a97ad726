use crate::error::{LexisError, Result};
use include_dir::{include_dir, Dir};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

static DATA_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/data");

/// Decode one of the JSON tables compiled into the binary.
pub(crate) fn builtin<T: DeserializeOwned + Default>(file_name: &str) -> T {
    DATA_DIR
        .get_file(file_name)
        .and_then(|file| file.contents_utf8())
        .and_then(|text| serde_json::from_str(text).ok())
        .unwrap_or_default()
}

/// Read a JSON state file.
///
/// Returns `None` when the file is missing or does not decode; callers
/// substitute their documented default in both cases.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice::<T>(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed state file");
            None
        }
    }
}

/// Write a JSON state file so that readers only ever see the old or the
/// new contents: the data goes to a sibling temp file, is synced, and is
/// then renamed over the target.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| LexisError::io(parent, e))?;
    }

    let data = serde_json::to_vec_pretty(value).map_err(|source| LexisError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = temp_path(path);
    let mut file = fs::File::create(&tmp).map_err(|e| LexisError::io(&tmp, e))?;
    file.write_all(&data)
        .and_then(|_| file.sync_all())
        .map_err(|e| LexisError::io(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| LexisError::io(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
