//! [`FormDriver`] over the W3C WebDriver HTTP protocol.
//!
//! Attaches to an already running WebDriver endpoint (optionally to a browser reached through
//! its debugger address). Reads and mutations run as in-page scripts so each section comes back
//! as a [`DomNode`] carrying live `value`/`checked`/`selected` state.

use std::time::{Duration, Instant};

use reqwest::Method;
use serde_json::{json, Value};
use tokio::runtime::Runtime;
use tracing::debug;

use super::dom::DomNode;
use super::driver::{ActionControl, DriverError, FieldAction, FormDriver, FormSection, FormSnapshot};
use super::profile::SiteProfile;
use crate::config::{BrowserConfig, EngineConfig};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

const SERIALIZE_FN: &str = r#"
const serialize = (el) => {
  const tag = el.tagName.toLowerCase();
  const attrs = {};
  for (const attr of el.attributes) { attrs[attr.name] = attr.value; }
  let text = '';
  for (const node of el.childNodes) {
    if (node.nodeType === Node.TEXT_NODE) { text += node.textContent; }
  }
  const live = tag === 'input' || tag === 'select' || tag === 'textarea' || tag === 'option';
  return {
    tag,
    attrs,
    text,
    value: live ? String(el.value == null ? '' : el.value) : null,
    checked: !!el.checked,
    selected: !!el.selected,
    children: Array.from(el.children).map(serialize),
  };
};
const collapse = (text) => (text || '').replace(/\s+/g, ' ').trim();
const sectionsOf = (containerSel, sectionSel) => {
  const container = document.querySelector(containerSel);
  return container ? Array.from(container.querySelectorAll(sectionSel)) : null;
};
"#;

const QUERY_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
return el ? serialize(el) : null;
"#;

const SNAPSHOT_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
return el ? JSON.stringify(serialize(el)) : null;
"#;

const SECTIONS_SCRIPT: &str = r#"
const sections = sectionsOf(arguments[0], arguments[1]);
return sections ? sections.map(serialize) : [];
"#;

const CLICK_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
if (!el) { return false; }
el.click();
return true;
"#;

const APPLY_SCRIPT: &str = r#"
const sections = sectionsOf(arguments[0], arguments[1]) || [];
const section = sections[arguments[2]];
const action = arguments[3];
if (!section) { return 'stale'; }
const fire = (el) => {
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
};
const labelFor = (input) => {
  if (input.id) {
    const label = section.querySelector(`label[for="${CSS.escape(input.id)}"]`);
    if (label && collapse(label.textContent)) { return label; }
  }
  return null;
};
if (action.action === 'select_option') {
  const select = section.querySelector('select');
  if (!select) { return 'missing_control'; }
  const option = Array.from(select.options).find((opt) => collapse(opt.textContent) === action.option);
  if (!option) { return 'missing_option'; }
  select.value = option.value;
  fire(select);
  return 'ok';
}
if (action.action === 'set_choice') {
  const inputs = Array.from(section.querySelectorAll('input[type=radio], input[type=checkbox]'));
  const input = inputs.find((candidate) => {
    const label = labelFor(candidate);
    const display = label ? collapse(label.textContent) : collapse(candidate.value);
    return display === action.option;
  });
  if (!input) { return 'missing_option'; }
  if (input.checked !== action.checked) {
    const label = labelFor(input);
    (label || input).click();
  }
  return 'ok';
}
if (action.action === 'replace_text') {
  const input = section.querySelector('textarea, input:not([type=radio]):not([type=checkbox]):not([type=hidden]):not([type=file])');
  if (!input) { return 'missing_control'; }
  const proto = input.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
  const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
  input.focus();
  setter.call(input, action.text);
  fire(input);
  input.blur();
  return 'ok';
}
return 'unsupported';
"#;

const CONTROLS_SCRIPT: &str = r#"
const container = document.querySelector(arguments[0]);
if (!container) { return []; }
return Array.from(container.querySelectorAll(arguments[1])).map((button, index) => ({
  index,
  label: collapse(button.getAttribute('aria-label')) || collapse(button.innerText),
}));
"#;

const INVOKE_SCRIPT: &str = r#"
const container = document.querySelector(arguments[0]);
const buttons = container ? Array.from(container.querySelectorAll(arguments[1])) : [];
const button = buttons[arguments[2]];
if (!button) { return false; }
button.click();
return true;
"#;

const FOLLOW_STATE_SCRIPT: &str = r#"
const box = document.getElementById(arguments[0]);
return box ? !!box.checked : null;
"#;

const FOLLOW_TOGGLE_SCRIPT: &str = r#"
const box = document.getElementById(arguments[0]);
if (!box) { return false; }
if (box.checked !== arguments[1]) {
  const label = document.querySelector(`label[for="${CSS.escape(arguments[0])}"]`);
  (label || box).click();
}
return true;
"#;

const CONFIRMATION_SCRIPT: &str = r#"
return arguments[0].some((selector) => document.querySelector(selector) !== null);
"#;

/// Blocking WebDriver client; each call runs on a private tokio runtime.
pub struct WebDriverSession {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
    runtime: Runtime,
    profile: SiteProfile,
    settle_delay: Duration,
}

impl std::fmt::Debug for WebDriverSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDriverSession")
            .field("base_url", &self.base_url)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl WebDriverSession {
    /// Opens a new WebDriver session against `browser.webdriver_url`.
    pub fn connect(
        browser: &BrowserConfig,
        engine: &EngineConfig,
        profile: SiteProfile,
    ) -> Result<Self, DriverError> {
        let runtime = Runtime::new().map_err(|err| DriverError::Transport(err.to_string()))?;
        let client = reqwest::Client::new();
        let base_url = browser.webdriver_url.trim_end_matches('/').to_string();

        let mut always_match = json!({ "browserName": "chrome" });
        if let Some(address) = &browser.debugger_address {
            always_match["goog:chromeOptions"] = json!({ "debuggerAddress": address });
        }
        let body = json!({ "capabilities": { "alwaysMatch": always_match } });

        let value = runtime.block_on(send(
            &client,
            Method::POST,
            format!("{base_url}/session"),
            Some(body),
        ))?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                DriverError::Protocol("new session response lacks sessionId".to_string())
            })?
            .to_string();
        debug!(session_id = %session_id, "webdriver session opened");

        Ok(Self {
            client,
            base_url,
            session_id,
            runtime,
            profile,
            settle_delay: engine.settle_delay,
        })
    }

    /// Ends the WebDriver session. An attached browser keeps running.
    pub fn close(self) -> Result<(), DriverError> {
        self.command(Method::DELETE, "", None).map(|_| ())
    }

    fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, DriverError> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        self.runtime.block_on(send(&self.client, method, url, body))
    }

    fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, DriverError> {
        let body = json!({ "script": format!("{SERIALIZE_FN}\n{script}"), "args": args });
        self.command(Method::POST, "/execute/sync", Some(body))
    }

    /// Re-runs `probe` until it yields a value or `timeout` elapses.
    fn poll<T>(
        &self,
        timeout: Duration,
        mut probe: impl FnMut(&Self) -> Result<Option<T>, DriverError>,
    ) -> Result<Option<T>, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = probe(self)? {
                return Ok(Some(found));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            self.pause(POLL_INTERVAL);
        }
    }

    fn pause(&self, duration: Duration) {
        self.runtime.block_on(tokio::time::sleep(duration));
    }

    fn query(&self, selector: &str) -> Result<Option<DomNode>, DriverError> {
        let value = self.execute(QUERY_SCRIPT, vec![json!(selector)])?;
        decode(value)
    }
}

impl FormDriver for WebDriverSession {
    fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))?;
        self.pause(self.settle_delay);
        Ok(())
    }

    fn job_header(&mut self, timeout: Duration) -> Result<Option<DomNode>, DriverError> {
        let selector = self.profile.job_header_selector.clone();
        self.poll(timeout, |session| session.query(&selector))
    }

    fn start_apply(&mut self, timeout: Duration) -> Result<bool, DriverError> {
        let scoped = format!(
            "{} {}",
            self.profile.apply_button_container_selector, self.profile.apply_button_selector
        );
        let fallback = self.profile.apply_button_selector.clone();

        let clicked = self.poll(timeout, |session| {
            for selector in [&scoped, &fallback] {
                let value = session.execute(CLICK_SCRIPT, vec![json!(selector)])?;
                if value.as_bool() == Some(true) {
                    return Ok(Some(()));
                }
            }
            Ok(None)
        })?;

        if clicked.is_some() {
            self.pause(self.settle_delay);
        }
        Ok(clicked.is_some())
    }

    fn snapshot(&mut self, timeout: Duration) -> Result<Option<FormSnapshot>, DriverError> {
        let selector = self.profile.form_container_selector.clone();
        self.poll(timeout, |session| {
            let value = session.execute(SNAPSHOT_SCRIPT, vec![json!(selector)])?;
            Ok(value.as_str().map(|raw| FormSnapshot(raw.to_string())))
        })
    }

    fn sections(&mut self) -> Result<Vec<FormSection>, DriverError> {
        let value = self.execute(
            SECTIONS_SCRIPT,
            vec![
                json!(self.profile.form_container_selector),
                json!(self.profile.section_selector),
            ],
        )?;
        let nodes: Vec<DomNode> = serde_json::from_value(value)
            .map_err(|err| DriverError::Protocol(format!("section payload: {err}")))?;

        Ok(nodes
            .into_iter()
            .enumerate()
            .map(|(index, node)| FormSection { index, node })
            .collect())
    }

    fn apply(&mut self, section: usize, action: &FieldAction) -> Result<(), DriverError> {
        let payload =
            serde_json::to_value(action).map_err(|err| DriverError::Protocol(err.to_string()))?;
        let value = self.execute(
            APPLY_SCRIPT,
            vec![
                json!(self.profile.form_container_selector),
                json!(self.profile.section_selector),
                json!(section),
                payload,
            ],
        )?;

        match value.as_str() {
            Some("ok") => Ok(()),
            Some("stale") => Err(DriverError::StaleSection(section)),
            Some("missing_option") => Err(DriverError::MissingOption(match action {
                FieldAction::SelectOption { option } | FieldAction::SetChoice { option, .. } => {
                    option.clone()
                }
                FieldAction::ReplaceText { text } => text.clone(),
            })),
            Some(other) => Err(DriverError::NotFound(format!(
                "section {section}: {other}"
            ))),
            None => Err(DriverError::Protocol(format!("unexpected apply result {value}"))),
        }
    }

    fn action_controls(&mut self) -> Result<Vec<ActionControl>, DriverError> {
        let value = self.execute(
            CONTROLS_SCRIPT,
            vec![
                json!(self.profile.form_container_selector),
                json!(self.profile.footer_button_selector),
            ],
        )?;
        let controls: Vec<ControlPayload> = serde_json::from_value(value)
            .map_err(|err| DriverError::Protocol(format!("control payload: {err}")))?;

        Ok(controls
            .into_iter()
            .map(|control| ActionControl {
                index: control.index,
                label: control.label,
            })
            .collect())
    }

    fn invoke(&mut self, control: &ActionControl) -> Result<(), DriverError> {
        let value = self.execute(
            INVOKE_SCRIPT,
            vec![
                json!(self.profile.form_container_selector),
                json!(self.profile.footer_button_selector),
                json!(control.index),
            ],
        )?;
        if value.as_bool() != Some(true) {
            return Err(DriverError::NotFound(format!("control '{}'", control.label)));
        }
        self.pause(self.settle_delay);
        Ok(())
    }

    fn follow_company(&mut self) -> Result<Option<bool>, DriverError> {
        let value = self.execute(
            FOLLOW_STATE_SCRIPT,
            vec![json!(self.profile.follow_company_checkbox_id)],
        )?;
        Ok(value.as_bool())
    }

    fn set_follow_company(&mut self, follow: bool) -> Result<(), DriverError> {
        let value = self.execute(
            FOLLOW_TOGGLE_SCRIPT,
            vec![json!(self.profile.follow_company_checkbox_id), json!(follow)],
        )?;
        if value.as_bool() != Some(true) {
            return Err(DriverError::NotFound("follow company checkbox".to_string()));
        }
        Ok(())
    }

    fn await_confirmation(&mut self, timeout: Duration) -> Result<bool, DriverError> {
        let selectors = json!(self.profile.confirmation_selectors);
        let found = self.poll(timeout, |session| {
            let value = session.execute(CONFIRMATION_SCRIPT, vec![selectors.clone()])?;
            Ok((value.as_bool() == Some(true)).then_some(()))
        })?;
        Ok(found.is_some())
    }
}

#[derive(serde::Deserialize)]
struct ControlPayload {
    index: usize,
    label: String,
}

fn decode(value: Value) -> Result<Option<DomNode>, DriverError> {
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|err| DriverError::Protocol(format!("node payload: {err}")))
}

/// Sends one WebDriver command and unwraps the `value` envelope.
async fn send(
    client: &reqwest::Client,
    method: Method,
    url: String,
    body: Option<Value>,
) -> Result<Value, DriverError> {
    let request = client.request(method, &url);
    let request = match body {
        Some(body) => request.json(&body),
        None => request,
    };

    let response = request
        .send()
        .await
        .map_err(|err| DriverError::Transport(err.to_string()))?;
    let status = response.status();
    let mut payload: Value = response
        .json()
        .await
        .map_err(|err| DriverError::Transport(err.to_string()))?;
    let value = payload
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = value.get("message").and_then(Value::as_str).unwrap_or("");
    Err(DriverError::Protocol(format!("{error}: {message}")))
}
