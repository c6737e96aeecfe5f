use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::dom::DomNode;

/// UI mutation requested by the filler for one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FieldAction {
    /// Pick the dropdown option whose visible text matches.
    SelectOption { option: String },
    /// Drive a radio/checkbox choice (matched by display value) into the given state.
    SetChoice { option: String, checked: bool },
    /// Clear the text control and type the new content.
    ReplaceText { text: String },
}

/// One visible form section, positioned by its index within the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSection {
    pub index: usize,
    pub node: DomNode,
}

/// Footer button offered on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionControl {
    pub index: usize,
    pub label: String,
}

/// Serialized state of the whole multi-step form container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSnapshot(pub String);

impl FormSnapshot {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("element not found: {0}")]
    NotFound(String),
    #[error("section {0} is no longer on the page")]
    StaleSection(usize),
    #[error("option '{0}' is not offered by the control")]
    MissingOption(String),
    #[error("browser transport failed: {0}")]
    Transport(String),
    #[error("browser rejected the command: {0}")]
    Protocol(String),
}

/// Exclusive handle on the browser session driving one quick-apply flow at a time.
///
/// Every wait is bounded by the supplied timeout. An element that never shows up is reported
/// as absence (`None`/`false`) so callers can fall back; errors are reserved for transport or
/// protocol failures and for targets that vanished while being mutated.
pub trait FormDriver {
    fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Serialized job header (title card), if it renders within `timeout`.
    fn job_header(&mut self, timeout: Duration) -> Result<Option<DomNode>, DriverError>;

    /// Clicks the quick-apply entry control. `false` when the job offers none.
    fn start_apply(&mut self, timeout: Duration) -> Result<bool, DriverError>;

    /// Serialized form container, `None` when the form is not open.
    fn snapshot(&mut self, timeout: Duration) -> Result<Option<FormSnapshot>, DriverError>;

    fn sections(&mut self) -> Result<Vec<FormSection>, DriverError>;

    fn apply(&mut self, section: usize, action: &FieldAction) -> Result<(), DriverError>;

    fn action_controls(&mut self) -> Result<Vec<ActionControl>, DriverError>;

    fn invoke(&mut self, control: &ActionControl) -> Result<(), DriverError>;

    /// Checked state of the "follow this company" opt-in, `None` when not rendered.
    fn follow_company(&mut self) -> Result<Option<bool>, DriverError>;

    fn set_follow_company(&mut self, follow: bool) -> Result<(), DriverError>;

    /// Waits for the success confirmation after submitting.
    fn await_confirmation(&mut self, timeout: Duration) -> Result<bool, DriverError>;
}
