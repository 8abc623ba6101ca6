use std::{
    env::VarError,
    io::Error as IO_ERROR,
    num::{ParseFloatError, ParseIntError},
    str::ParseBoolError as PARSE_BOOL_ERROR,
};

use anyhow::Error as ANYHOW_ERROR;
use reqwest::Error as REQWEST_ERROR;
use serde_json::Error as JSON_ERROR;
use sqlx::error::Error as SQL_ERROR;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::subscriber::SetGlobalDefaultError as TRACING_GLOBAL_DEFAULT_ERROR;
use url::ParseError as URL_ERROR;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] IO_ERROR),

    #[error("{0}")]
    URL(#[from] URL_ERROR),

    #[error("{0}")]
    INT(#[from] ParseIntError),

    #[error("{0}")]
    FLOAT(#[from] ParseFloatError),

    #[error("{0}")]
    SQL(#[from] SQL_ERROR),

    #[error("{0}")]
    VAR(#[from] VarError),

    #[error("{0}")]
    TokioJoinError(#[from] JoinError),

    #[error("{0}")]
    JsonError(#[from] JSON_ERROR),

    #[error("{0}")]
    ParseBoolError(#[from] PARSE_BOOL_ERROR),

    #[error("{0}")]
    ReqwestError(#[from] REQWEST_ERROR),

    #[error("Tracing error: {0}")]
    SetGlobalDefaultError(#[from] TRACING_GLOBAL_DEFAULT_ERROR),

    #[error("{0}")]
    AnyHowError(#[from] ANYHOW_ERROR),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Provider unavailable ({}): {message}", status_label(.status))]
    ProviderUnavailable {
        status: Option<u16>,
        message: String,
    },

    #[error("Data not available: {0}")]
    ProviderDataUnavailable(String),

    #[error("Invalid provider payload: {0}")]
    ProviderPayload(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Render error: {0}")]
    RenderError(String),
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => String::from("no status"),
    }
}

impl Error {
    /// Failures caused by the analytics provider. These are absorbed into
    /// `last_error` when a stored baseline exists.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable { .. }
                | Error::ProviderDataUnavailable(_)
                | Error::ProviderPayload(_)
                | Error::ReqwestError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_failures_are_classified() {
        assert!(Error::ProviderUnavailable {
            status: Some(502),
            message: String::from("bad gateway"),
        }
        .is_provider_failure());
        assert!(Error::ProviderDataUnavailable(String::from("x"))
            .is_provider_failure());
        assert!(Error::ProviderPayload(String::from("x")).is_provider_failure());

        assert!(!Error::ValidationError(String::from("x")).is_provider_failure());
        assert!(!Error::NotFound(String::from("x")).is_provider_failure());
        assert!(!Error::RenderError(String::from("x")).is_provider_failure());
    }

    #[test]
    fn provider_unavailable_message_includes_status() {
        let err = Error::ProviderUnavailable {
            status: Some(503),
            message: String::from("maintenance"),
        };
        assert_eq!(err.to_string(), "Provider unavailable (503): maintenance");

        let err = Error::ProviderUnavailable {
            status: None,
            message: String::from("connection reset"),
        };
        assert_eq!(
            err.to_string(),
            "Provider unavailable (no status): connection reset"
        );
    }
}
