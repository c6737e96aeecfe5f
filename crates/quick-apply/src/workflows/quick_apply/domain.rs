use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of a job posting on the career site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A job pulled from the job source, ready to be opened in the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub job_id: JobId,
    pub apply_url: String,
}

/// Outcome taxonomy for one application attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Started,
    Completed,
    Failed,
    Resubmit,
    Already,
    Notavail,
}

impl ApplicationStatus {
    pub const TERMINAL: [ApplicationStatus; 5] = [
        ApplicationStatus::Completed,
        ApplicationStatus::Failed,
        ApplicationStatus::Resubmit,
        ApplicationStatus::Already,
        ApplicationStatus::Notavail,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Started => "STARTED",
            ApplicationStatus::Completed => "COMPLETED",
            ApplicationStatus::Failed => "FAILED",
            ApplicationStatus::Resubmit => "RESUBMIT",
            ApplicationStatus::Already => "ALREADY",
            ApplicationStatus::Notavail => "NOTAVAIL",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ApplicationStatus::Started)
    }

    /// Statuses a scheduler may safely retry without assuming corrupted state.
    pub fn is_retryable(self) -> bool {
        matches!(self, ApplicationStatus::Resubmit)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One application run. Only the state machine moves it out of `Started`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationAttempt {
    job_id: JobId,
    status: ApplicationStatus,
}

impl ApplicationAttempt {
    pub fn start(job_id: JobId) -> Self {
        Self {
            job_id,
            status: ApplicationStatus::Started,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    /// Moves the attempt to a terminal status. Returns `false` when the attempt had already
    /// finished or `status` is not terminal; the stored status is unchanged in that case.
    pub fn finish(&mut self, status: ApplicationStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }
}

/// Stable identity of a form question: the label text plus the ordered option list.
///
/// The site renders no durable field ids, so two fields showing the same text and the same
/// options are treated as the same question on every run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
}

impl Question {
    pub fn new(text: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
            options,
        }
    }

    pub fn free_text(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }
}

/// Value supplied for a question: a scalar or, for multi-select fields, an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Many(Vec<String>),
}

impl AnswerValue {
    pub fn text(value: impl Into<String>) -> Self {
        AnswerValue::Text(value.into())
    }

    pub fn many<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AnswerValue::Many(values.into_iter().map(Into::into).collect())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(value) => Some(value),
            AnswerValue::Many(_) => None,
        }
    }

    /// Borrowed view as a list; a scalar becomes a single-element slice.
    pub fn values(&self) -> &[String] {
        match self {
            AnswerValue::Text(value) => std::slice::from_ref(value),
            AnswerValue::Many(values) => values,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Text(value) => value.trim().is_empty(),
            AnswerValue::Many(values) => values.is_empty(),
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Text(value) => f.write_str(value),
            AnswerValue::Many(values) => f.write_str(&values.join(", ")),
        }
    }
}

/// Persisted category of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    FreeText,
    SingleSelect,
    MultiSelect,
    Date,
    FilePresence,
}

/// How a single-select question is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectStyle {
    Dropdown,
    Radio,
}

/// Typed text input flavours folded into free-text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextInput {
    Text,
    Email,
    Phone,
    Number,
    TextArea,
}

impl TextInput {
    pub(crate) fn from_type_attr(value: Option<&str>) -> Option<Self> {
        match value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("text") | Some("search") | Some("url") => Some(TextInput::Text),
            Some("email") => Some(TextInput::Email),
            Some("tel") => Some(TextInput::Phone),
            Some("number") => Some(TextInput::Number),
            _ => None,
        }
    }
}

/// Textual date layout expected by a date field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    MonthDayYear,
    DayMonthYear,
    Iso,
}

impl DateFormat {
    pub fn from_placeholder(placeholder: &str) -> Option<Self> {
        match placeholder.trim().to_ascii_lowercase().as_str() {
            "mm/dd/yyyy" => Some(DateFormat::MonthDayYear),
            "dd/mm/yyyy" => Some(DateFormat::DayMonthYear),
            "yyyy-mm-dd" => Some(DateFormat::Iso),
            _ => None,
        }
    }

    pub fn pattern(self) -> &'static str {
        match self {
            DateFormat::MonthDayYear => "%m/%d/%Y",
            DateFormat::DayMonthYear => "%d/%m/%Y",
            DateFormat::Iso => "%Y-%m-%d",
        }
    }

    pub fn render(self, date: NaiveDate) -> String {
        date.format(self.pattern()).to_string()
    }
}

/// Capability tag produced by the classifier for an answerable section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    FreeText(TextInput),
    Date(DateFormat),
    SingleSelect(SelectStyle),
    MultiSelect,
}

impl FieldKind {
    pub fn answer_kind(self) -> AnswerKind {
        match self {
            FieldKind::FreeText(_) => AnswerKind::FreeText,
            FieldKind::Date(_) => AnswerKind::Date,
            FieldKind::SingleSelect(_) => AnswerKind::SingleSelect,
            FieldKind::MultiSelect => AnswerKind::MultiSelect,
        }
    }
}

/// Ephemeral description of one observed field; rebuilt on every classification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub question: Question,
    pub kind: FieldKind,
    pub current: Option<AnswerValue>,
    pub required: bool,
}

impl FieldDescriptor {
    pub fn options(&self) -> &[String] {
        &self.question.options
    }
}

/// Attachment card shown inside the form (for example the selected resume).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub label: Option<String>,
    pub file_name: String,
    pub uploaded: Option<String>,
}

impl Attachment {
    /// Store key for the card: its label (or `Attachment`) qualified by the file name, so
    /// several unlabeled cards never share an entry or shadow a real question.
    pub fn question(&self) -> String {
        let label = self.label.as_deref().unwrap_or("Attachment");
        format!("{label}: {}", self.file_name)
    }
}

/// Why a section could not be turned into a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownReason {
    NoControl,
    MissingLabel,
}

impl fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownReason::NoControl => f.write_str("no answerable control"),
            UnknownReason::MissingLabel => f.write_str("question label not found"),
        }
    }
}

/// Classification of one rendered section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionClass {
    Field(FieldDescriptor),
    Informational(Attachment),
    Unknown(UnknownReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_finishes_once() {
        let mut attempt = ApplicationAttempt::start(JobId("42".to_string()));
        assert!(!attempt.finish(ApplicationStatus::Started));
        assert!(attempt.finish(ApplicationStatus::Resubmit));
        assert!(!attempt.finish(ApplicationStatus::Completed));
        assert_eq!(attempt.status(), ApplicationStatus::Resubmit);
    }

    #[test]
    fn status_serializes_as_upper_case_label() {
        let json = serde_json::to_string(&ApplicationStatus::Notavail).expect("serializes");
        assert_eq!(json, "\"NOTAVAIL\"");
        for status in ApplicationStatus::TERMINAL {
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn question_identity_ignores_surrounding_whitespace() {
        let options = || vec!["Yes".to_string(), "No".to_string()];
        let left = Question::new("  Are you authorized to work?\n", options());
        let right = Question::new("Are you authorized to work?", options());
        assert_eq!(left, right);
        let reordered =
            Question::new("Are you authorized to work?", vec!["No".into(), "Yes".into()]);
        assert_ne!(left, reordered);
    }

    #[test]
    fn date_format_follows_placeholder() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).expect("valid date");
        let format = DateFormat::from_placeholder("MM/DD/YYYY").expect("known placeholder");
        assert_eq!(format.render(date), "03/07/2025");
        assert_eq!(DateFormat::Iso.render(date), "2025-03-07");
        assert!(DateFormat::from_placeholder("Your answer").is_none());
    }

    #[test]
    fn answer_values_round_trip_through_untagged_json() {
        let scalar: AnswerValue = serde_json::from_str("\"Yes\"").expect("scalar parses");
        assert_eq!(scalar, AnswerValue::text("Yes"));
        let list: AnswerValue = serde_json::from_str("[\"Rust\",\"Go\"]").expect("list parses");
        assert_eq!(list.values(), ["Rust".to_string(), "Go".to_string()]);
    }
}
