//! Durable question -> answer mapping shared by every application run.

mod json;
pub mod review;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::domain::{AnswerKind, AnswerValue, Question};

pub use json::JsonAnswerStore;
pub use review::{AnswerReview, AnswerView, ReviewError};

/// Human verification state of a stored answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    Pending,
    Approved,
}

/// Persisted record for one question, keyed by the question text in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAnswer {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub answer: Option<AnswerValue>,
    pub status: AnswerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AnswerKind>,
    #[serde(default)]
    pub required: bool,
}

impl StoredAnswer {
    pub fn pending(
        options: Vec<String>,
        answer: Option<AnswerValue>,
        kind: AnswerKind,
        required: bool,
    ) -> Self {
        Self {
            options,
            answer,
            status: AnswerStatus::Pending,
            kind: Some(kind),
            required,
        }
    }

    /// Only approved answers are pushed into forms.
    pub fn verified(&self) -> bool {
        self.status == AnswerStatus::Approved
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<Vec<String>>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// Result of resolving a question identity against the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Missing,
    Found(&'a StoredAnswer),
    /// Same text but a different option list: a different question sharing the key.
    Conflict(&'a StoredAnswer),
}

/// In-memory view of the whole answer document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerBook {
    entries: BTreeMap<String, StoredAnswer>,
}

impl AnswerBook {
    pub fn lookup(&self, question: &Question) -> Lookup<'_> {
        match self.entries.get(&question.text) {
            None => Lookup::Missing,
            Some(entry) if entry.options == question.options => Lookup::Found(entry),
            Some(entry) => Lookup::Conflict(entry),
        }
    }

    pub fn get(&self, text: &str) -> Option<&StoredAnswer> {
        self.entries.get(text)
    }

    pub fn insert(&mut self, text: impl Into<String>, answer: StoredAnswer) {
        self.entries.insert(text.into(), answer);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StoredAnswer)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Storage abstraction so the filler can be exercised without touching disk.
///
/// Implementations must re-read their backing document on every `load` so edits made by a
/// reviewer between runs are honored.
pub trait AnswerStore: Send + Sync {
    fn load(&self) -> Result<AnswerBook, AnswerStoreError>;
    /// Merges a single entry; entries not named here are left untouched.
    fn upsert(&self, text: &str, answer: StoredAnswer) -> Result<(), AnswerStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AnswerStoreError {
    #[error("answer document {path} unreadable: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("answer document {path} is not valid JSON: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("answer store unavailable: {0}")]
    Unavailable(String),
}

/// Mutex-guarded book for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryAnswerStore {
    book: Arc<Mutex<AnswerBook>>,
}

impl MemoryAnswerStore {
    pub fn with_book(book: AnswerBook) -> Self {
        Self {
            book: Arc::new(Mutex::new(book)),
        }
    }

    pub fn snapshot(&self) -> AnswerBook {
        self.book
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl AnswerStore for MemoryAnswerStore {
    fn load(&self) -> Result<AnswerBook, AnswerStoreError> {
        let guard = self
            .book
            .lock()
            .map_err(|_| AnswerStoreError::Unavailable("answer mutex poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn upsert(&self, text: &str, answer: StoredAnswer) -> Result<(), AnswerStoreError> {
        let mut guard = self
            .book
            .lock()
            .map_err(|_| AnswerStoreError::Unavailable("answer mutex poisoned".to_string()))?;
        guard.insert(text, answer);
        Ok(())
    }
}
