//! Form automation engine for multi-step quick-apply job forms.
//!
//! A run classifies every visible form section, reconciles each field with the shared answer
//! store, presses the best footer control and repeats until the form is submitted, stalls or
//! fails. Only answers a human approved are ever written into a form.

pub mod answers;
pub mod classifier;
pub mod dom;
pub mod domain;
pub mod driver;
pub mod filler;
pub mod ledger;
pub mod machine;
pub mod profile;
pub mod progress;
pub mod router;
pub mod service;
pub mod webdriver;

#[cfg(test)]
mod tests;

pub use answers::{
    AnswerBook, AnswerReview, AnswerStatus, AnswerStore, AnswerStoreError, AnswerView,
    JsonAnswerStore, Lookup, MemoryAnswerStore, ReviewError, StoredAnswer,
};
pub use classifier::{ChoiceOption, FieldClassifier};
pub use dom::DomNode;
pub use domain::{
    AnswerKind, AnswerValue, ApplicationAttempt, ApplicationStatus, Attachment, DateFormat,
    FieldDescriptor, FieldKind, JobId, JobPosting, Question, SectionClass, SelectStyle,
    TextInput, UnknownReason,
};
pub use driver::{ActionControl, DriverError, FieldAction, FormDriver, FormSection, FormSnapshot};
pub use filler::{
    FieldFiller, FillError, FillOutcome, FillPlan, PassReport, SectionReport, SkipReason,
};
pub use ledger::{
    JobSource, JsonJobLedger, LedgerEntry, LedgerError, LedgerStatus, MemoryLedger,
    StatusTracker,
};
pub use machine::{locate_control, ApplicationStateMachine, ControlRole, EngineError};
pub use profile::SiteProfile;
pub use progress::{Progress, ProgressTracker};
pub use router::answer_review_router;
pub use service::{JobOutcome, QuickApplyService, QuickApplyServiceError, RunSummary};
pub use webdriver::WebDriverSession;
