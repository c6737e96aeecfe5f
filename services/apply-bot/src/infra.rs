use metrics_exporter_prometheus::PrometheusHandle;
use quick_apply::config::AppConfig;
use quick_apply::workflows::quick_apply::{
    AnswerReview, AnswerValue, JsonAnswerStore, JsonJobLedger,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn answer_review(config: &AppConfig) -> AnswerReview<JsonAnswerStore> {
    let store = JsonAnswerStore::new(&config.storage.answers_path);
    AnswerReview::new(Arc::new(store))
}

pub(crate) fn job_ledger(config: &AppConfig) -> Arc<JsonJobLedger> {
    Arc::new(JsonJobLedger::new(&config.storage.ledger_path))
}

/// CLI values to an answer: none is empty, one is a scalar, several form a list.
pub(crate) fn answer_from_values(mut values: Vec<String>) -> Option<AnswerValue> {
    match values.len() {
        0 => None,
        1 => values.pop().map(AnswerValue::Text),
        _ => Some(AnswerValue::Many(values)),
    }
}
