use std::sync::Arc;

use serde::Serialize;

use super::{AnswerStatus, AnswerStore, AnswerStoreError, StoredAnswer};
use crate::workflows::quick_apply::domain::{AnswerKind, AnswerValue};

/// Reviewer-facing operations over the answer store: list, approve, revoke.
pub struct AnswerReview<S> {
    store: Arc<S>,
}

/// Flattened entry exposed to the CLI and the review API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerView {
    pub question: String,
    pub options: Vec<String>,
    pub answer: Option<AnswerValue>,
    pub status: AnswerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<AnswerKind>,
    pub required: bool,
}

impl AnswerView {
    fn new(question: &str, entry: &StoredAnswer) -> Self {
        Self {
            question: question.to_string(),
            options: entry.options.clone(),
            answer: entry.answer.clone(),
            status: entry.status,
            kind: entry.kind,
            required: entry.required,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("no stored question named '{0}'")]
    UnknownQuestion(String),
    #[error("question '{0}' is required and cannot be approved without an answer")]
    MissingValue(String),
    #[error("'{value}' is not an option of question '{question}'")]
    OptionNotOffered { question: String, value: String },
    #[error("question '{0}' takes a single value")]
    SingleValueExpected(String),
    #[error(transparent)]
    Store(#[from] AnswerStoreError),
}

impl<S> AnswerReview<S>
where
    S: AnswerStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn list(&self, status: Option<AnswerStatus>) -> Result<Vec<AnswerView>, ReviewError> {
        let book = self.store.load()?;
        Ok(book
            .iter()
            .filter(|(_, entry)| status.map_or(true, |wanted| entry.status == wanted))
            .map(|(question, entry)| AnswerView::new(question, entry))
            .collect())
    }

    /// Marks an answer as verified so the filler starts pushing it into forms. Without a new
    /// `answer` the recorded value is approved as it stands.
    pub fn approve(
        &self,
        question: &str,
        answer: Option<AnswerValue>,
    ) -> Result<AnswerView, ReviewError> {
        let book = self.store.load()?;
        let mut entry = book
            .get(question)
            .cloned()
            .ok_or_else(|| ReviewError::UnknownQuestion(question.to_string()))?;

        let answer = match answer {
            Some(answer) => Some(normalize(question, &entry, answer)?),
            None => entry.answer.take(),
        };
        if entry.required && answer.as_ref().map_or(true, AnswerValue::is_blank) {
            return Err(ReviewError::MissingValue(question.to_string()));
        }

        entry.answer = answer;
        entry.status = AnswerStatus::Approved;
        self.store.upsert(question, entry.clone())?;
        Ok(AnswerView::new(question, &entry))
    }

    /// Returns an approved answer to the pending queue without discarding its value.
    pub fn revoke(&self, question: &str) -> Result<AnswerView, ReviewError> {
        let book = self.store.load()?;
        let mut entry = book
            .get(question)
            .cloned()
            .ok_or_else(|| ReviewError::UnknownQuestion(question.to_string()))?;

        entry.status = AnswerStatus::Pending;
        self.store.upsert(question, entry.clone())?;
        Ok(AnswerView::new(question, &entry))
    }
}

fn normalize(
    question: &str,
    entry: &StoredAnswer,
    answer: AnswerValue,
) -> Result<AnswerValue, ReviewError> {
    let answer = match (entry.kind, answer) {
        (Some(AnswerKind::MultiSelect), AnswerValue::Text(value)) => AnswerValue::Many(vec![value]),
        (Some(AnswerKind::MultiSelect), many) => many,
        (_, AnswerValue::Many(mut values)) if values.len() == 1 => {
            AnswerValue::Text(values.remove(0))
        }
        (_, AnswerValue::Many(_)) => {
            return Err(ReviewError::SingleValueExpected(question.to_string()));
        }
        (_, text) => text,
    };

    if !entry.options.is_empty() {
        if let Some(missing) = answer
            .values()
            .iter()
            .find(|value| !entry.options.contains(value))
        {
            return Err(ReviewError::OptionNotOffered {
                question: question.to_string(),
                value: missing.clone(),
            });
        }
    }

    Ok(answer)
}
