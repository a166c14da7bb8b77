/**
 * Routes Module
 * API route handlers and the state they share
 */
pub mod auth;
pub mod case_studies;
pub mod health;
pub mod sections;

use axum::{http::StatusCode, Json};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::sections::{SectionStore, SessionRegistry};

/// Shared handler state. `sections` is `None` when no store is configured.
#[derive(Clone)]
pub struct AppState {
    pub sections: Option<Arc<dyn SectionStore>>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(sections: Option<Arc<dyn SectionStore>>) -> Self {
        Self::with_sessions(sections, SessionRegistry::new())
    }

    pub fn with_sessions(
        sections: Option<Arc<dyn SectionStore>>,
        sessions: SessionRegistry,
    ) -> Self {
        Self {
            sections,
            sessions: Arc::new(sessions),
        }
    }

    /// The section store, or a 503 reply.
    pub fn section_store(
        &self,
    ) -> Result<Arc<dyn SectionStore>, (StatusCode, Json<ErrorResponse>)> {
        self.sections.clone().ok_or_else(|| {
            ErrorResponse::reply(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
        })
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn reply(status: StatusCode, error: &str) -> (StatusCode, Json<ErrorResponse>) {
        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                message: None,
            }),
        )
    }

    pub fn reply_with(
        status: StatusCode,
        error: &str,
        message: &str,
    ) -> (StatusCode, Json<ErrorResponse>) {
        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                message: Some(message.to_string()),
            }),
        )
    }
}

// ============================================================================
// Validation
// ============================================================================

lazy_static::lazy_static! {
    /// Lowercase letters, numbers and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

pub fn invalid_slug() -> (StatusCode, Json<ErrorResponse>) {
    ErrorResponse::reply_with(
        StatusCode::BAD_REQUEST,
        "Invalid slug",
        "Slug must contain only lowercase letters, numbers, and hyphens",
    )
}

/// Strip unsafe markup from editor-supplied rich text.
pub fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}
