use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Returned to callers when nothing more specific can be said.
pub const FALLBACK_MESSAGE: &str = "Failed to process meal";

/// Every way a meal request can fail.
///
/// Only `Unauthenticated` and `InvalidInput` are actionable by the caller;
/// everything else collapses to a 500 whose body never carries upstream or
/// storage detail.
#[derive(Debug, Error)]
pub enum MealError {
    #[error("Unauthorized")]
    Unauthenticated,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Missing estimator API key")]
    MissingCredential,

    /// Detail is for logs only.
    #[error("Failed to parse meal with AI.")]
    UpstreamUnavailable(String),

    #[error("AI returned an unreadable estimate")]
    MalformedEstimate(String),

    #[error("Failed to save meal")]
    Persistence(#[source] sqlx::Error),

    #[error("Failed to process meal")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl MealError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::MissingCredential
            | Self::UpstreamUnavailable(_)
            | Self::MalformedEstimate(_)
            | Self::Persistence(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether another attempt at the estimation call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_))
    }
}

impl From<sqlx::Error> for MealError {
    fn from(e: sqlx::Error) -> Self {
        Self::Persistence(e)
    }
}

impl IntoResponse for MealError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::UpstreamUnavailable(detail) | Self::MalformedEstimate(detail) => {
                error!(error = %self, detail = %detail, "meal request failed");
            }
            Self::Persistence(e) => error!(error = %e, "meal persistence failed"),
            Self::Internal(e) => error!(error = ?e, "meal request failed"),
            Self::MissingCredential => error!("estimator credential missing"),
            Self::Unauthenticated | Self::InvalidInput(_) => {}
        }

        let mut message = self.to_string();
        if message.trim().is_empty() {
            message = FALLBACK_MESSAGE.to_string();
        }
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
