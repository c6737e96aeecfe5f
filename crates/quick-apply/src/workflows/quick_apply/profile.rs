use serde::{Deserialize, Serialize};

/// Markup vocabulary of the supported quick-apply form.
///
/// Selectors are CSS selectors consumed by drivers; class names and phrases are consumed by
/// the classifier and the state machine when they inspect serialized sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub job_header_selector: String,
    pub apply_button_container_selector: String,
    pub apply_button_selector: String,
    pub form_container_selector: String,
    pub section_selector: String,
    pub footer_button_selector: String,
    pub follow_company_checkbox_id: String,
    pub confirmation_selectors: Vec<String>,

    pub form_element_attr: String,
    pub label_class: String,
    pub required_label_class: String,
    pub choice_option_class: String,
    pub attachment_container_class: String,
    pub attachment_file_name_class: String,
    pub attachment_meta_class: String,
    pub dropdown_placeholder: String,

    pub submit_labels: Vec<String>,
    pub advance_labels: Vec<String>,
    pub review_labels: Vec<String>,
    pub already_applied_markers: Vec<String>,
    pub closed_markers: Vec<String>,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            job_header_selector:
                ".job-details-jobs-unified-top-card__container--two-pane, .jobs-unified-top-card"
                    .to_string(),
            apply_button_container_selector: ".jobs-apply-button--top-card".to_string(),
            apply_button_selector: ".jobs-apply-button".to_string(),
            form_container_selector: ".jobs-easy-apply-modal".to_string(),
            section_selector: ".jobs-easy-apply-form-section__grouping".to_string(),
            footer_button_selector: "footer button".to_string(),
            follow_company_checkbox_id: "follow-company-checkbox".to_string(),
            confirmation_selectors: vec![
                "#post-apply-modal".to_string(),
                ".artdeco-inline-feedback--success".to_string(),
                ".jpac-modal-header".to_string(),
            ],

            form_element_attr: "data-test-form-element".to_string(),
            label_class: "fb-dash-form-element__label".to_string(),
            required_label_class: "fb-dash-form-element__label-title--is-required".to_string(),
            choice_option_class: "fb-text-selectable__option".to_string(),
            attachment_container_class: "jobs-document-upload-redesign-card__container"
                .to_string(),
            attachment_file_name_class: "jobs-document-upload-redesign-card__file-name"
                .to_string(),
            attachment_meta_class: "t-black--light".to_string(),
            dropdown_placeholder: "Select an option".to_string(),

            submit_labels: vec!["Submit application".to_string()],
            advance_labels: vec!["Continue to next step".to_string(), "Next".to_string()],
            review_labels: vec!["Review your application".to_string(), "Review".to_string()],
            already_applied_markers: vec![
                "Application submitted".to_string(),
                "See application".to_string(),
                "Applied on".to_string(),
            ],
            closed_markers: vec!["No longer accepting applications".to_string()],
        }
    }
}

impl SiteProfile {
    /// Case-insensitive phrase match against the collapsed text of a node.
    pub(crate) fn mentions_any(text: &str, phrases: &[String]) -> bool {
        let haystack = text.to_lowercase();
        phrases
            .iter()
            .any(|phrase| haystack.contains(&phrase.to_lowercase()))
    }
}
