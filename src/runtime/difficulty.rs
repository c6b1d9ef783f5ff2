use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

use super::ui::info;

/// Lowest memory cost a workload can be built from.
pub(crate) const MIN_DIFFICULTY: u32 = 1;

#[derive(Debug, Error)]
pub(crate) enum DifficultySourceError {
    #[error("difficulty file {} could not be read: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("difficulty file {} is empty", path.display())]
    Empty { path: PathBuf },
    #[error("difficulty file {} starts with '{token}', expected a positive integer", path.display())]
    NotANumber { path: PathBuf, token: String },
}

/// Process-wide memory-cost value. Every access goes through one mutex whose
/// critical section never spans I/O; change logging happens after release.
#[derive(Debug)]
pub(crate) struct DifficultyStore {
    value: Mutex<u32>,
}

impl DifficultyStore {
    pub(crate) fn new(initial: u32) -> Self {
        Self {
            value: Mutex::new(initial.max(MIN_DIFFICULTY)),
        }
    }

    pub(crate) fn get(&self) -> u32 {
        *self.value.lock()
    }

    /// Stores `new_value` if it differs from the current one. Returns whether
    /// the value changed.
    pub(crate) fn set(&self, new_value: u32) -> bool {
        let new_value = new_value.max(MIN_DIFFICULTY);
        let changed = {
            let mut value = self.value.lock();
            if *value == new_value {
                false
            } else {
                *value = new_value;
                true
            }
        };

        if changed {
            info("DIFF", format!("Updated difficulty to {new_value}"));
        }
        changed
    }

    /// Read-modify-write under the store lock, clamped to the floor. Returns
    /// the new value when it changed.
    pub(crate) fn adjust(&self, f: impl FnOnce(u32) -> u32) -> Option<u32> {
        let mut value = self.value.lock();
        let next = f(*value).max(MIN_DIFFICULTY);
        if next == *value {
            return None;
        }
        *value = next;
        Some(next)
    }
}

/// Reads the leading whitespace-delimited integer from the difficulty file.
pub(crate) fn read_difficulty_file(path: &Path) -> Result<u32, DifficultySourceError> {
    let raw = std::fs::read_to_string(path).map_err(|source| DifficultySourceError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_difficulty(&raw).map_err(|token| match token {
        None => DifficultySourceError::Empty {
            path: path.to_path_buf(),
        },
        Some(token) => DifficultySourceError::NotANumber {
            path: path.to_path_buf(),
            token,
        },
    })
}

/// Parses the leading integer of `raw`. Trailing garbage after the digits is
/// ignored, like a stream extraction would. On failure returns the offending
/// token, or `None` if there was no token at all.
fn parse_difficulty(raw: &str) -> Result<u32, Option<String>> {
    let Some(token) = raw.split_whitespace().next() else {
        return Err(None);
    };

    let sign_len = usize::from(token.starts_with('+'));
    let digits_end = token[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(token.len(), |idx| idx + sign_len);
    let digits = &token[sign_len..digits_end];

    match digits.parse::<u32>() {
        Ok(value) if value >= MIN_DIFFICULTY => Ok(value),
        _ => Err(Some(token.to_string())),
    }
}
