use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::quick_apply::{
    AnswerStoreError, DriverError, LedgerError, QuickApplyServiceError, ReviewError,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Answers(AnswerStoreError),
    Ledger(LedgerError),
    Driver(DriverError),
    Review(ReviewError),
    Run(QuickApplyServiceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Answers(err) => write!(f, "answer store error: {}", err),
            AppError::Ledger(err) => write!(f, "job ledger error: {}", err),
            AppError::Driver(err) => write!(f, "browser error: {}", err),
            AppError::Review(err) => write!(f, "review error: {}", err),
            AppError::Run(err) => write!(f, "apply run error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Answers(err) => Some(err),
            AppError::Ledger(err) => Some(err),
            AppError::Driver(err) => Some(err),
            AppError::Review(err) => Some(err),
            AppError::Run(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Review(ReviewError::UnknownQuestion(_)) => StatusCode::NOT_FOUND,
            AppError::Review(ReviewError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Review(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Ledger(LedgerError::UnknownJob(_)) => StatusCode::NOT_FOUND,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Answers(_)
            | AppError::Ledger(_)
            | AppError::Driver(_)
            | AppError::Run(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<AnswerStoreError> for AppError {
    fn from(value: AnswerStoreError) -> Self {
        Self::Answers(value)
    }
}

impl From<LedgerError> for AppError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

impl From<DriverError> for AppError {
    fn from(value: DriverError) -> Self {
        Self::Driver(value)
    }
}

impl From<ReviewError> for AppError {
    fn from(value: ReviewError) -> Self {
        Self::Review(value)
    }
}

impl From<QuickApplyServiceError> for AppError {
    fn from(value: QuickApplyServiceError) -> Self {
        Self::Run(value)
    }
}
