use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::workflows::quick_apply::answers::{AnswerBook, AnswerStatus, StoredAnswer};
use crate::workflows::quick_apply::classifier::{choice_inputs, FieldClassifier};
use crate::workflows::quick_apply::dom::DomNode;
use crate::workflows::quick_apply::domain::{
    AnswerKind, AnswerValue, FieldDescriptor, JobId, JobPosting, SectionClass,
};
use crate::workflows::quick_apply::driver::{
    ActionControl, DriverError, FieldAction, FormDriver, FormSection, FormSnapshot,
};
use crate::workflows::quick_apply::profile::SiteProfile;

pub(super) const SECTION_CLASS: &str = "jobs-easy-apply-form-section__grouping";

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 7).expect("valid date")
}

pub(super) fn engine_config() -> EngineConfig {
    EngineConfig {
        element_timeout: Duration::from_millis(10),
        confirmation_timeout: Duration::from_millis(10),
        settle_delay: Duration::ZERO,
        stall_threshold: 1,
    }
}

pub(super) fn posting(id: &str) -> JobPosting {
    JobPosting {
        job_id: JobId(id.to_string()),
        apply_url: format!("https://jobs.example.test/view/{id}/"),
    }
}

fn slug(label: &str) -> String {
    label
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_lowercase() } else { '-' })
        .collect()
}

fn section() -> DomNode {
    DomNode::element("div").class(SECTION_CLASS)
}

pub(super) fn text_section(label: &str, value: &str) -> DomNode {
    let id = format!("text-{}", slug(label));
    section()
        .child(DomNode::element("label").attr("for", &id).text(label))
        .child(
            DomNode::element("input")
                .attr("id", &id)
                .attr("type", "text")
                .value(value),
        )
}

pub(super) fn date_section(label: &str, placeholder: &str, value: &str) -> DomNode {
    let id = format!("date-{}", slug(label));
    section()
        .child(DomNode::element("label").attr("for", &id).text(label))
        .child(
            DomNode::element("input")
                .attr("id", &id)
                .attr("type", "text")
                .attr("placeholder", placeholder)
                .value(value),
        )
}

pub(super) fn dropdown_section(label: &str, options: &[&str], selected: Option<&str>) -> DomNode {
    let id = format!("select-{}", slug(label));
    let mut select = DomNode::element("select").attr("id", &id).child(
        DomNode::element("option")
            .text("Select an option")
            .selected(selected.is_none()),
    );
    for option in options {
        select = select.child(
            DomNode::element("option")
                .text(option)
                .selected(selected == Some(*option)),
        );
    }
    section()
        .child(
            DomNode::element("label").attr("for", &id).child(
                DomNode::element("span")
                    .attr("aria-hidden", "true")
                    .text(label),
            ),
        )
        .child(select)
}

fn choice_section(label: &str, input_type: &str, options: &[&str], checked: &[&str]) -> DomNode {
    let mut fieldset = DomNode::element("fieldset").child(
        DomNode::element("legend").child(
            DomNode::element("span")
                .attr("aria-hidden", "true")
                .text(label),
        ),
    );
    for (position, option) in options.iter().enumerate() {
        let id = format!("{input_type}-{}-{position}", slug(label));
        fieldset = fieldset.child(
            DomNode::element("div")
                .class("fb-text-selectable__option")
                .child(
                    DomNode::element("input")
                        .attr("id", &id)
                        .attr("type", input_type)
                        .attr("value", option)
                        .checked(checked.contains(option)),
                )
                .child(DomNode::element("label").attr("for", &id).text(option)),
        );
    }
    section().child(fieldset)
}

pub(super) fn radio_section(label: &str, options: &[&str], checked: Option<&str>) -> DomNode {
    let checked: Vec<&str> = checked.into_iter().collect();
    choice_section(label, "radio", options, &checked)
}

pub(super) fn checkbox_section(label: &str, options: &[&str], checked: &[&str]) -> DomNode {
    choice_section(label, "checkbox", options, checked)
}

pub(super) fn attachment_section(file_name: &str) -> DomNode {
    section().child(
        DomNode::element("div")
            .class("jobs-document-upload-redesign-card__container")
            .child(
                DomNode::element("h3")
                    .class("jobs-document-upload-redesign-card__file-name")
                    .text(file_name),
            )
            .child(
                DomNode::element("p")
                    .class("t-black--light")
                    .text("Last used on 3/1/2024"),
            ),
    )
}

pub(super) fn unlabeled_section() -> DomNode {
    section().child(DomNode::element("input").attr("type", "text").value(""))
}

pub(super) fn header(text: &str) -> DomNode {
    DomNode::element("div")
        .class("jobs-unified-top-card")
        .child(DomNode::element("h1").text("Platform Engineer"))
        .child(DomNode::element("span").text(text))
}

pub(super) fn classify(node: &DomNode) -> SectionClass {
    let profile = SiteProfile::default();
    FieldClassifier::new(&profile).classify(node)
}

pub(super) fn descriptor(node: &DomNode) -> FieldDescriptor {
    match classify(node) {
        SectionClass::Field(field) => field,
        other => panic!("expected a field, got {other:?}"),
    }
}

pub(super) fn approved(options: &[&str], answer: AnswerValue, kind: AnswerKind) -> StoredAnswer {
    StoredAnswer {
        options: options.iter().map(|option| option.to_string()).collect(),
        answer: Some(answer),
        status: AnswerStatus::Approved,
        kind: Some(kind),
        required: false,
    }
}

pub(super) fn pending(options: &[&str], answer: AnswerValue, kind: AnswerKind) -> StoredAnswer {
    StoredAnswer {
        status: AnswerStatus::Pending,
        ..approved(options, answer, kind)
    }
}

pub(super) fn book(entries: Vec<(&str, StoredAnswer)>) -> AnswerBook {
    let mut book = AnswerBook::default();
    for (question, entry) in entries {
        book.insert(question, entry);
    }
    book
}

/// One page of a scripted form: its sections and footer button labels.
#[derive(Debug, Clone, Serialize)]
pub(super) struct Page {
    pub sections: Vec<DomNode>,
    pub controls: Vec<String>,
}

impl Page {
    pub fn new(sections: Vec<DomNode>, controls: &[&str]) -> Self {
        Self {
            sections,
            controls: controls.iter().map(|label| label.to_string()).collect(),
        }
    }
}

/// In-memory stand-in for a browser session walking through a multi-page form.
///
/// Field actions mutate the scripted DOM so a second classification sees the new state.
#[derive(Debug, Clone)]
pub(super) struct ScriptedForm {
    pub header: Option<DomNode>,
    pub apply_offered: bool,
    pub pages: Vec<Page>,
    pub current: usize,
    pub open: bool,
    /// Advance/review presses leave the page unchanged.
    pub stuck: bool,
    pub confirms: bool,
    pub submitted: bool,
    pub follow: Option<bool>,
    pub fail_sections: bool,
    /// Follow-up section inserted at this position by the first field update.
    pub reveal: Option<(usize, DomNode)>,
    pub navigated: Vec<String>,
    pub applied: Vec<(usize, FieldAction)>,
    pub invoked: Vec<String>,
    pub apply_clicks: usize,
    pub profile: SiteProfile,
}

impl ScriptedForm {
    pub fn new(pages: Vec<Page>) -> Self {
        Self {
            header: Some(header("Easy Apply")),
            apply_offered: true,
            pages,
            current: 0,
            open: false,
            stuck: false,
            confirms: true,
            submitted: false,
            follow: None,
            fail_sections: false,
            reveal: None,
            navigated: Vec::new(),
            applied: Vec::new(),
            invoked: Vec::new(),
            apply_clicks: 0,
            profile: SiteProfile::default(),
        }
    }

    pub fn single_page(sections: Vec<DomNode>) -> Self {
        Self::new(vec![Page::new(sections, &["Submit application"])])
    }

    pub fn page(&self) -> &Page {
        &self.pages[self.current]
    }

    pub fn section(&self, index: usize) -> &DomNode {
        &self.page().sections[index]
    }

    fn section_mut(&mut self, index: usize) -> Result<&mut DomNode, DriverError> {
        let current = self.current;
        self.pages[current]
            .sections
            .get_mut(index)
            .ok_or(DriverError::StaleSection(index))
    }

    fn is_label(labels: &[String], label: &str) -> bool {
        labels.iter().any(|candidate| candidate == label)
    }
}

fn walk_mut(node: &mut DomNode, visit: &mut dyn FnMut(&mut DomNode)) {
    visit(node);
    for child in &mut node.children {
        walk_mut(child, visit);
    }
}

fn apply_action(section: &mut DomNode, action: &FieldAction) -> Result<(), DriverError> {
    match action {
        FieldAction::SelectOption { option } => {
            let offered = section
                .find_all(|node| node.is("option"))
                .iter()
                .any(|node| &node.text_content() == option);
            if !offered {
                return Err(DriverError::MissingOption(option.clone()));
            }
            walk_mut(section, &mut |node| {
                if node.is("option") {
                    let matches = node.text_content() == *option;
                    node.selected = matches;
                }
            });
            Ok(())
        }
        FieldAction::SetChoice { option, checked } => {
            let choices = choice_inputs(section, "radio")
                .into_iter()
                .map(|choice| ("radio", choice))
                .chain(
                    choice_inputs(section, "checkbox")
                        .into_iter()
                        .map(|choice| ("checkbox", choice)),
                )
                .collect::<Vec<_>>();
            let (kind, target) = choices
                .into_iter()
                .find(|(_, choice)| &choice.label == option)
                .ok_or_else(|| DriverError::MissingOption(option.clone()))?;
            let target_id = target.input_id;
            let checked = *checked;
            walk_mut(section, &mut |node| {
                if !node.is("input") {
                    return;
                }
                let is_target = node.id().map(str::to_string) == target_id;
                if is_target {
                    node.checked = checked;
                } else if kind == "radio" && checked && node.attr_is("type", "radio") {
                    node.checked = false;
                }
            });
            Ok(())
        }
        FieldAction::ReplaceText { text } => {
            let mut replaced = false;
            walk_mut(section, &mut |node| {
                let editable = node.is("textarea")
                    || (node.is("input")
                        && !node.attr_is("type", "radio")
                        && !node.attr_is("type", "checkbox"));
                if editable && !replaced {
                    node.value = Some(text.clone());
                    replaced = true;
                }
            });
            if replaced {
                Ok(())
            } else {
                Err(DriverError::NotFound("text control".to_string()))
            }
        }
    }
}

impl FormDriver for ScriptedForm {
    fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.navigated.push(url.to_string());
        Ok(())
    }

    fn job_header(&mut self, _timeout: Duration) -> Result<Option<DomNode>, DriverError> {
        Ok(self.header.clone())
    }

    fn start_apply(&mut self, _timeout: Duration) -> Result<bool, DriverError> {
        self.apply_clicks += 1;
        self.open = self.apply_offered;
        Ok(self.apply_offered)
    }

    fn snapshot(&mut self, _timeout: Duration) -> Result<Option<FormSnapshot>, DriverError> {
        if !self.open {
            return Ok(None);
        }
        let body = serde_json::to_string(&(self.current, self.page()))
            .map_err(|err| DriverError::Protocol(err.to_string()))?;
        Ok(Some(FormSnapshot(body)))
    }

    fn sections(&mut self) -> Result<Vec<FormSection>, DriverError> {
        if self.fail_sections {
            return Err(DriverError::Transport("session lost".to_string()));
        }
        Ok(self
            .page()
            .sections
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, node)| FormSection { index, node })
            .collect())
    }

    fn apply(&mut self, section: usize, action: &FieldAction) -> Result<(), DriverError> {
        apply_action(self.section_mut(section)?, action)?;
        self.applied.push((section, action.clone()));
        if let Some((position, node)) = self.reveal.take() {
            let current = self.current;
            self.pages[current].sections.insert(position, node);
        }
        Ok(())
    }

    fn action_controls(&mut self) -> Result<Vec<ActionControl>, DriverError> {
        Ok(self
            .page()
            .controls
            .iter()
            .enumerate()
            .map(|(index, label)| ActionControl {
                index,
                label: label.clone(),
            })
            .collect())
    }

    fn invoke(&mut self, control: &ActionControl) -> Result<(), DriverError> {
        self.invoked.push(control.label.clone());
        if Self::is_label(&self.profile.submit_labels, &control.label) {
            self.submitted = true;
            return Ok(());
        }
        let moves = Self::is_label(&self.profile.advance_labels, &control.label)
            || Self::is_label(&self.profile.review_labels, &control.label);
        if moves && !self.stuck && self.current + 1 < self.pages.len() {
            self.current += 1;
        }
        Ok(())
    }

    fn follow_company(&mut self) -> Result<Option<bool>, DriverError> {
        Ok(self.follow)
    }

    fn set_follow_company(&mut self, follow: bool) -> Result<(), DriverError> {
        self.follow = Some(follow);
        Ok(())
    }

    fn await_confirmation(&mut self, _timeout: Duration) -> Result<bool, DriverError> {
        Ok(self.submitted && self.confirms)
    }
}
