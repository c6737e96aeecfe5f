//! Reconciles classified fields against the answer store and mutates the form.
//!
//! Only approved answers ever reach the UI. Unknown questions are seeded as pending entries
//! from whatever the form currently shows, and pending entries are kept in sync with the
//! form without being promoted. A failure on one field is logged and skipped so the rest of
//! the page still gets filled.

use std::collections::{BTreeSet, HashSet};

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use super::answers::{AnswerBook, AnswerStore, Lookup, StoredAnswer};
use super::classifier::FieldClassifier;
use super::dom::DomNode;
use super::domain::{
    AnswerKind, AnswerValue, Attachment, FieldDescriptor, FieldKind, SectionClass, SelectStyle,
    UnknownReason,
};
use super::driver::{FieldAction, FormDriver, FormSection};
use super::machine::EngineError;
use super::profile::SiteProfile;

/// What happened to one section during a fill pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    /// Unknown question recorded as pending; form untouched.
    Seeded,
    /// Pending entry updated to the value the form shows now.
    Refreshed,
    PendingUnchanged,
    AlreadyCorrect,
    /// Approved answer pushed into the form with this many UI actions.
    Applied(usize),
    /// Empty date field filled with today's date.
    DateDefaulted(String),
    Informational,
    Skipped(SkipReason),
}

impl FillOutcome {
    pub fn mutated_form(&self) -> bool {
        matches!(self, FillOutcome::Applied(_) | FillOutcome::DateDefaulted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Unclassified(UnknownReason),
    IdentityConflict,
    NoApprovedValue,
    Failed(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FillError {
    #[error("'{value}' is not an option of '{question}'")]
    OptionNotOffered { question: String, value: String },
    #[error("stored answer for '{0}' does not fit the field")]
    ShapeMismatch(String),
}

/// Planned reaction to one field: UI actions to run, then an optional store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillPlan {
    pub actions: Vec<FieldAction>,
    pub record: Option<StoredAnswer>,
    pub outcome: FillOutcome,
}

impl FillPlan {
    fn only(outcome: FillOutcome) -> Self {
        Self {
            actions: Vec::new(),
            record: None,
            outcome,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionReport {
    pub index: usize,
    pub question: Option<String>,
    pub outcome: FillOutcome,
}

/// Per-section results of one classify+fill pass over the visible page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub sections: Vec<SectionReport>,
}

impl PassReport {
    pub fn mutations(&self) -> usize {
        self.sections
            .iter()
            .filter(|section| section.outcome.mutated_form())
            .count()
    }

    pub fn count(&self, predicate: impl Fn(&FillOutcome) -> bool) -> usize {
        self.sections
            .iter()
            .filter(|section| predicate(&section.outcome))
            .count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldFiller<'p> {
    classifier: FieldClassifier<'p>,
    today: Option<NaiveDate>,
}

impl<'p> FieldFiller<'p> {
    pub fn new(profile: &'p SiteProfile) -> Self {
        Self {
            classifier: FieldClassifier::new(profile),
            today: None,
        }
    }

    /// Pins the date used for empty date fields.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Classifies and fills every visible section. The store is re-read once per pass and
    /// written after each section that needs it.
    ///
    /// Answering a question can reveal follow-up sections and shift positions, so sections are
    /// re-read after every section that touched the form (or failed part way) and the pass
    /// resumes right after it. Each question is handled at most once per pass.
    pub fn fill_pass<D, S>(&self, driver: &mut D, store: &S) -> Result<PassReport, EngineError>
    where
        D: FormDriver + ?Sized,
        S: AnswerStore + ?Sized,
    {
        let mut book = store.load()?;
        let mut sections = driver.sections()?;
        let mut report = PassReport::default();
        let mut handled = HashSet::new();
        let mut cursor = 0;

        while let Some(section) = sections.get(cursor) {
            cursor += 1;
            if self
                .question_of(&section.node)
                .is_some_and(|question| handled.contains(&question))
            {
                continue;
            }

            let index = section.index;
            let (question, outcome) = self.fill_section(driver, store, &mut book, section);
            let mutated = outcome.mutated_form()
                || matches!(outcome, FillOutcome::Skipped(SkipReason::Failed(_)));
            if let Some(question) = &question {
                handled.insert(question.clone());
            }

            if mutated {
                sections = driver.sections()?;
                if let Some(position) = question
                    .as_deref()
                    .and_then(|question| self.position_of(&sections, question))
                {
                    if position + 1 != cursor {
                        debug!(section = index, moved_to = position, "form layout changed");
                    }
                    cursor = position + 1;
                }
            }

            report.sections.push(SectionReport {
                index,
                question,
                outcome,
            });
        }

        debug!(
            sections = report.sections.len(),
            mutations = report.mutations(),
            "fill pass finished"
        );
        Ok(report)
    }

    fn question_of(&self, node: &DomNode) -> Option<String> {
        match self.classifier.classify(node) {
            SectionClass::Field(field) => Some(field.question.text),
            SectionClass::Informational(attachment) => Some(attachment.question()),
            SectionClass::Unknown(_) => None,
        }
    }

    fn position_of(&self, sections: &[FormSection], question: &str) -> Option<usize> {
        sections
            .iter()
            .position(|section| self.question_of(&section.node).as_deref() == Some(question))
    }

    fn fill_section<D, S>(
        &self,
        driver: &mut D,
        store: &S,
        book: &mut AnswerBook,
        section: &FormSection,
    ) -> (Option<String>, FillOutcome)
    where
        D: FormDriver + ?Sized,
        S: AnswerStore + ?Sized,
    {
        match self.classifier.classify(&section.node) {
            SectionClass::Field(field) => {
                let question = field.question.text.clone();
                let outcome = self.fill_field(driver, store, book, section.index, &field);
                (Some(question), outcome)
            }
            SectionClass::Informational(attachment) => {
                let question = attachment.question();
                let outcome = record_attachment(store, book, &question, &attachment);
                (Some(question), outcome)
            }
            SectionClass::Unknown(reason) => {
                debug!(section = section.index, %reason, "section skipped");
                (None, FillOutcome::Skipped(SkipReason::Unclassified(reason)))
            }
        }
    }

    fn fill_field<D, S>(
        &self,
        driver: &mut D,
        store: &S,
        book: &mut AnswerBook,
        index: usize,
        field: &FieldDescriptor,
    ) -> FillOutcome
    where
        D: FormDriver + ?Sized,
        S: AnswerStore + ?Sized,
    {
        let question = field.question.text.as_str();
        let plan = match self.plan(field, book) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(section = index, question, error = %err, "field skipped");
                return FillOutcome::Skipped(SkipReason::Failed(err.to_string()));
            }
        };

        for action in &plan.actions {
            if let Err(err) = driver.apply(index, action) {
                warn!(section = index, question, error = %err, "unable to update field");
                return FillOutcome::Skipped(SkipReason::Failed(err.to_string()));
            }
        }

        if let Some(record) = plan.record {
            if let Err(err) = store.upsert(question, record.clone()) {
                warn!(section = index, question, error = %err, "unable to persist answer");
                return FillOutcome::Skipped(SkipReason::Failed(err.to_string()));
            }
            book.insert(question, record);
        }

        match &plan.outcome {
            FillOutcome::Seeded => {
                info!(section = index, question, "recorded new question for review")
            }
            FillOutcome::Refreshed => info!(section = index, question, "refreshed pending answer"),
            FillOutcome::Applied(actions) => {
                info!(section = index, question, actions, "applied approved answer")
            }
            FillOutcome::DateDefaulted(date) => {
                info!(section = index, question, date = %date, "filled date with today")
            }
            _ => {}
        }

        plan.outcome
    }

    /// Decides how to reconcile one field without touching the UI or the store.
    pub fn plan(&self, field: &FieldDescriptor, book: &AnswerBook) -> Result<FillPlan, FillError> {
        let kind = field.kind.answer_kind();

        let entry = match book.lookup(&field.question) {
            Lookup::Conflict(_) => {
                return Ok(FillPlan::only(FillOutcome::Skipped(
                    SkipReason::IdentityConflict,
                )))
            }
            Lookup::Missing => None,
            Lookup::Found(entry) => Some(entry),
        };

        if let Some(entry) = entry.filter(|entry| entry.verified()) {
            let Some(stored) = entry.answer.as_ref() else {
                return Ok(FillPlan::only(FillOutcome::Skipped(
                    SkipReason::NoApprovedValue,
                )));
            };
            if same_value(field.kind, stored, field.current.as_ref()) {
                return Ok(FillPlan::only(FillOutcome::AlreadyCorrect));
            }
            let actions = actions_for(field, stored)?;
            if actions.is_empty() {
                return Ok(FillPlan::only(FillOutcome::AlreadyCorrect));
            }
            let count = actions.len();
            return Ok(FillPlan {
                actions,
                record: None,
                outcome: FillOutcome::Applied(count),
            });
        }

        if let FieldKind::Date(format) = field.kind {
            if field.current.as_ref().map_or(true, AnswerValue::is_blank) {
                let today = format.render(self.today());
                let value = AnswerValue::Text(today.clone());
                let record = match entry {
                    Some(entry) if entry.answer.as_ref() == Some(&value) => None,
                    _ => Some(pending_record(field, Some(value), kind)),
                };
                return Ok(FillPlan {
                    actions: vec![FieldAction::ReplaceText { text: today.clone() }],
                    record,
                    outcome: FillOutcome::DateDefaulted(today),
                });
            }
        }

        match entry {
            None => Ok(FillPlan {
                actions: Vec::new(),
                record: Some(pending_record(field, field.current.clone(), kind)),
                outcome: FillOutcome::Seeded,
            }),
            Some(entry) if entry.answer != field.current => Ok(FillPlan {
                actions: Vec::new(),
                record: Some(StoredAnswer {
                    answer: field.current.clone(),
                    kind: Some(kind),
                    required: field.required,
                    ..entry.clone()
                }),
                outcome: FillOutcome::Refreshed,
            }),
            Some(_) => Ok(FillPlan::only(FillOutcome::PendingUnchanged)),
        }
    }
}

fn pending_record(
    field: &FieldDescriptor,
    answer: Option<AnswerValue>,
    kind: AnswerKind,
) -> StoredAnswer {
    StoredAnswer::pending(field.options().to_vec(), answer, kind, field.required)
}

fn record_attachment<S>(
    store: &S,
    book: &mut AnswerBook,
    question: &str,
    attachment: &Attachment,
) -> FillOutcome
where
    S: AnswerStore + ?Sized,
{
    if book.get(question).is_some() {
        return FillOutcome::Informational;
    }

    let record = StoredAnswer::pending(
        Vec::new(),
        Some(AnswerValue::Text(attachment.file_name.clone())),
        AnswerKind::FilePresence,
        false,
    );
    match store.upsert(question, record.clone()) {
        Ok(()) => {
            book.insert(question, record);
            FillOutcome::Informational
        }
        Err(err) => {
            warn!(question, error = %err, "unable to record attachment");
            FillOutcome::Skipped(SkipReason::Failed(err.to_string()))
        }
    }
}

fn same_value(kind: FieldKind, stored: &AnswerValue, current: Option<&AnswerValue>) -> bool {
    let Some(current) = current else {
        return false;
    };
    match kind {
        FieldKind::MultiSelect => {
            let stored: BTreeSet<&String> = stored.values().iter().collect();
            let current: BTreeSet<&String> = current.values().iter().collect();
            stored == current
        }
        _ => stored == current,
    }
}

fn actions_for(
    field: &FieldDescriptor,
    stored: &AnswerValue,
) -> Result<Vec<FieldAction>, FillError> {
    let question = &field.question.text;
    let offered = |value: &String| {
        if field.options().contains(value) {
            Ok(())
        } else {
            Err(FillError::OptionNotOffered {
                question: question.clone(),
                value: value.clone(),
            })
        }
    };

    match field.kind {
        FieldKind::FreeText(_) | FieldKind::Date(_) => {
            let text = stored
                .as_text()
                .ok_or_else(|| FillError::ShapeMismatch(question.clone()))?;
            Ok(vec![FieldAction::ReplaceText {
                text: text.to_string(),
            }])
        }
        FieldKind::SingleSelect(style) => {
            let option = stored
                .as_text()
                .map(str::to_string)
                .ok_or_else(|| FillError::ShapeMismatch(question.clone()))?;
            offered(&option)?;
            Ok(vec![match style {
                SelectStyle::Dropdown => FieldAction::SelectOption { option },
                SelectStyle::Radio => FieldAction::SetChoice {
                    option,
                    checked: true,
                },
            }])
        }
        FieldKind::MultiSelect => {
            let wanted = stored.values();
            for value in wanted {
                offered(value)?;
            }
            let checked: &[String] = field.current.as_ref().map_or(&[], AnswerValue::values);

            // Symmetric reconciliation: check what is missing, uncheck what is extra.
            Ok(field
                .options()
                .iter()
                .filter_map(|option| {
                    let want = wanted.contains(option);
                    let have = checked.contains(option);
                    (want != have).then(|| FieldAction::SetChoice {
                        option: option.clone(),
                        checked: want,
                    })
                })
                .collect())
        }
    }
}
