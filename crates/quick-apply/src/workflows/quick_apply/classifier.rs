//! Best-effort classification of one form section into a typed field descriptor.
//!
//! Sections do not declare their type, so the checks run in a fixed order and the first
//! match wins: dropdown, radio group, checkbox group, typed text input, attachment card.
//! Anything else is reported as `Unknown` instead of failing the pass.

use super::dom::DomNode;
use super::domain::{
    AnswerValue, Attachment, DateFormat, FieldDescriptor, FieldKind, Question, SectionClass,
    SelectStyle, TextInput, UnknownReason,
};
use super::profile::SiteProfile;

/// One toggleable choice inside a radio or checkbox group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    /// Display value: the associated label text, or the input value when unlabeled.
    pub label: String,
    pub input_id: Option<String>,
    pub value: Option<String>,
    pub checked: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldClassifier<'p> {
    profile: &'p SiteProfile,
}

impl<'p> FieldClassifier<'p> {
    pub fn new(profile: &'p SiteProfile) -> Self {
        Self { profile }
    }

    pub fn classify(&self, section: &DomNode) -> SectionClass {
        if let Some(select) = section.find_tag("select") {
            return self.dropdown(section, select);
        }

        let radios = choice_inputs(section, "radio");
        if !radios.is_empty() {
            return self.choice_group(section, &radios, FieldKind::SingleSelect(SelectStyle::Radio));
        }

        let checkboxes = choice_inputs(section, "checkbox");
        if !checkboxes.is_empty() {
            return self.choice_group(section, &checkboxes, FieldKind::MultiSelect);
        }

        if let Some((input, kind)) = text_control(section) {
            return self.text_field(section, input, kind);
        }

        if let Some(attachment) = self.attachment(section) {
            return SectionClass::Informational(attachment);
        }

        SectionClass::Unknown(UnknownReason::NoControl)
    }

    fn dropdown(&self, section: &DomNode, select: &DomNode) -> SectionClass {
        let Some(label) = self.question_label(section, select.id()) else {
            return SectionClass::Unknown(UnknownReason::MissingLabel);
        };

        let placeholder = self.profile.dropdown_placeholder.as_str();
        let options: Vec<&DomNode> = select
            .find_all(|node| node.is("option"))
            .into_iter()
            .filter(|option| {
                let text = option.text_content();
                !text.is_empty() && text != placeholder
            })
            .collect();

        let current = options
            .iter()
            .find(|option| option.selected)
            .map(|option| AnswerValue::Text(option.text_content()));

        let question = Question::new(
            label.text,
            options.iter().map(|option| option.text_content()).collect(),
        );

        SectionClass::Field(FieldDescriptor {
            question,
            kind: FieldKind::SingleSelect(SelectStyle::Dropdown),
            current,
            required: label.required || control_required(select),
        })
    }

    fn choice_group(
        &self,
        section: &DomNode,
        choices: &[ChoiceOption],
        kind: FieldKind,
    ) -> SectionClass {
        // Choice inputs carry their own `label[for]`, so the question lives on the group.
        let Some(label) = self.question_label(section, None) else {
            return SectionClass::Unknown(UnknownReason::MissingLabel);
        };

        let checked: Vec<String> = choices
            .iter()
            .filter(|choice| choice.checked)
            .map(|choice| choice.label.clone())
            .collect();

        let current = match kind {
            FieldKind::MultiSelect => Some(AnswerValue::Many(checked)),
            _ => checked.into_iter().next().map(AnswerValue::Text),
        };

        let required = label.required
            || section
                .find_all(|node| node.is("input"))
                .into_iter()
                .any(control_required)
            || section
                .find_tag("fieldset")
                .is_some_and(control_required);

        SectionClass::Field(FieldDescriptor {
            question: Question::new(
                label.text,
                choices.iter().map(|choice| choice.label.clone()).collect(),
            ),
            kind,
            current,
            required,
        })
    }

    fn text_field(&self, section: &DomNode, input: &DomNode, kind: FieldKind) -> SectionClass {
        let Some(label) = self.question_label(section, input.id()) else {
            return SectionClass::Unknown(UnknownReason::MissingLabel);
        };

        let current = input.value.clone().unwrap_or_default();

        SectionClass::Field(FieldDescriptor {
            question: Question::free_text(label.text),
            kind,
            current: Some(AnswerValue::Text(current)),
            required: label.required || control_required(input),
        })
    }

    fn attachment(&self, section: &DomNode) -> Option<Attachment> {
        let card = section
            .find_class(&self.profile.attachment_container_class)
            .or_else(|| section.find_class(&self.profile.attachment_file_name_class))?;

        let file_name = if card.has_class(&self.profile.attachment_file_name_class) {
            card.text_content()
        } else {
            card.find_class(&self.profile.attachment_file_name_class)?
                .text_content()
        };
        if file_name.is_empty() {
            return None;
        }

        let uploaded = card
            .find_class(&self.profile.attachment_meta_class)
            .map(DomNode::text_content)
            .filter(|text| !text.is_empty());

        let label = self.question_label(section, None).map(|label| label.text);

        Some(Attachment {
            label,
            file_name,
            uploaded,
        })
    }

    /// Locates the question label: `label[for=id]`, then `legend`, then the label class.
    fn question_label(&self, section: &DomNode, control_id: Option<&str>) -> Option<LabelInfo> {
        let by_for = control_id.and_then(|id| {
            section.find(|node| node.is("label") && node.get_attr("for") == Some(id))
        });

        let node = by_for
            .or_else(|| section.find_tag("legend"))
            .or_else(|| section.find_class(&self.profile.label_class))?;

        let raw = node
            .find(|child| child.is("span") && child.attr_is("aria-hidden", "true"))
            .map(DomNode::text_lines)
            .filter(|lines| !lines.is_empty())
            .unwrap_or_else(|| node.text_lines());

        let last_line = raw.last()?.trim();
        let starred = last_line.ends_with('*');
        let text = last_line.trim_end_matches('*').trim();
        if text.is_empty() {
            return None;
        }

        let required_class = &self.profile.required_label_class;
        let required = starred
            || node.has_class(required_class)
            || node.find_class(required_class).is_some()
            || section.find_class(required_class).is_some();

        Some(LabelInfo {
            text: text.to_string(),
            required,
        })
    }
}

struct LabelInfo {
    text: String,
    required: bool,
}

/// Choice inputs of the given `type` with their display values, in document order.
pub fn choice_inputs(section: &DomNode, input_type: &str) -> Vec<ChoiceOption> {
    section
        .find_all(|node| node.is("input") && node.attr_is("type", input_type))
        .into_iter()
        .filter_map(|input| {
            let value = input
                .get_attr("value")
                .map(str::to_string)
                .or_else(|| input.value.clone())
                .filter(|value| !value.trim().is_empty());
            let label = input
                .id()
                .and_then(|id| {
                    section.find(|node| node.is("label") && node.get_attr("for") == Some(id))
                })
                .map(DomNode::text_content)
                .filter(|text| !text.is_empty())
                .or_else(|| value.clone().map(|value| value.trim().to_string()))?;

            Some(ChoiceOption {
                label,
                input_id: input.id().map(str::to_string),
                value,
                checked: input.checked,
            })
        })
        .collect()
}

fn text_control(section: &DomNode) -> Option<(&DomNode, FieldKind)> {
    section.descendants().find_map(|node| {
        if node.is("textarea") {
            return Some((node, FieldKind::FreeText(TextInput::TextArea)));
        }
        if !node.is("input") {
            return None;
        }

        let type_attr = node.get_attr("type");
        if type_attr.is_some_and(|value| value.trim().eq_ignore_ascii_case("date")) {
            return Some((node, FieldKind::Date(DateFormat::Iso)));
        }

        let input = TextInput::from_type_attr(type_attr)?;
        let date = node
            .get_attr("placeholder")
            .and_then(DateFormat::from_placeholder);
        let kind = match date {
            Some(format) => FieldKind::Date(format),
            None => FieldKind::FreeText(input),
        };
        Some((node, kind))
    })
}

fn control_required(node: &DomNode) -> bool {
    node.has_attr("required") || node.attr_is("aria-required", "true")
}
