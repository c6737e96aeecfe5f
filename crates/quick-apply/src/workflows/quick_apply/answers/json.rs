use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{AnswerBook, AnswerStore, AnswerStoreError, StoredAnswer};

/// Answer document kept as pretty-printed JSON on disk.
///
/// Every `load` re-reads the file, and every `upsert` is a read-merge-write of one entry
/// written through a sibling temp file and renamed into place.
#[derive(Debug, Clone)]
pub struct JsonAnswerStore {
    path: PathBuf,
}

impl JsonAnswerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    fn io_error(&self, source: std::io::Error) -> AnswerStoreError {
        AnswerStoreError::Io {
            path: self.display_path(),
            source,
        }
    }

    fn write(&self, book: &AnswerBook) -> Result<(), AnswerStoreError> {
        let body = serde_json::to_string_pretty(book).map_err(|source| {
            AnswerStoreError::Malformed {
                path: self.display_path(),
                source,
            }
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, body).map_err(|err| self.io_error(err))?;
        fs::rename(&tmp, &self.path).map_err(|err| self.io_error(err))
    }
}

impl AnswerStore for JsonAnswerStore {
    fn load(&self) -> Result<AnswerBook, AnswerStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "answer document missing, starting empty");
                return Ok(AnswerBook::default());
            }
            Err(err) => return Err(self.io_error(err)),
        };

        if raw.trim().is_empty() {
            return Ok(AnswerBook::default());
        }

        serde_json::from_str(&raw).map_err(|source| AnswerStoreError::Malformed {
            path: self.display_path(),
            source,
        })
    }

    fn upsert(&self, text: &str, answer: StoredAnswer) -> Result<(), AnswerStoreError> {
        let mut book = self.load()?;
        book.insert(text, answer);
        self.write(&book)
    }
}
