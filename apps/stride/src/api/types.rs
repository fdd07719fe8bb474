//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use stride_core::{
    CommandReport, PresentationFlags, Profile, ProfileId, ProgressionView, StrideError, XpGrant,
};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// PROFILE REQUEST
// =============================================================================

/// Onboarding profile payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRequest {
    pub name: String,
    pub grade: u8,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default)]
    pub goals: BTreeSet<String>,
}

impl ProfileRequest {
    /// Maximum length of the name and of each tag.
    pub const MAX_FIELD_LENGTH: usize = 256;
    /// Maximum number of interest or goal tags.
    pub const MAX_TAGS: usize = 64;

    /// Convert to a `Profile`, validating field sizes.
    pub fn to_profile(&self) -> Result<Profile, ApiError> {
        if self.name.trim().is_empty() || self.name.len() > Self::MAX_FIELD_LENGTH {
            return Err(ApiError::BadRequest(format!(
                "name must be 1-{} bytes",
                Self::MAX_FIELD_LENGTH
            )));
        }
        for tags in [&self.interests, &self.goals] {
            if tags.len() > Self::MAX_TAGS {
                return Err(ApiError::BadRequest(format!(
                    "at most {} tags allowed",
                    Self::MAX_TAGS
                )));
            }
            if tags.iter().any(|t| t.len() > Self::MAX_FIELD_LENGTH) {
                return Err(ApiError::BadRequest("tag too long".to_string()));
            }
        }
        Ok(Profile {
            name: self.name.clone(),
            grade: self.grade,
            interests: self.interests.clone(),
            goals: self.goals.clone(),
        })
    }
}

// =============================================================================
// XP REQUEST/RESPONSE
// =============================================================================

/// Manual XP grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpRequest {
    pub amount: u64,
}

/// Result of a manual XP grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpResponse {
    pub grant: XpGrant,
    pub state: ProgressionView,
}

// =============================================================================
// COMMAND RESPONSE
// =============================================================================

/// Result of any state-changing command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub report: CommandReport,
    pub state: ProgressionView,
}

/// Result of an acknowledge command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    /// Whether the flag was raised before the call.
    pub acknowledged: bool,
    pub flags: PresentationFlags,
}

// =============================================================================
// SNAPSHOT / SESSION
// =============================================================================

/// Binary snapshot export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub profile_id: ProfileId,
    pub format: String,
    pub version: u8,
    pub size_bytes: usize,
    /// Base64 of header + postcard payload.
    pub data: String,
}

/// Session teardown result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClosedResponse {
    pub profile_id: ProfileId,
    /// Deferred unlocks cancelled by the teardown.
    pub cancelled: usize,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error, mapped to a status code and an [`ErrorResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<StrideError> for ApiError {
    fn from(e: StrideError) -> Self {
        match &e {
            StrideError::InvalidOpportunityId(_) | StrideError::InvalidProfileId(_) => {
                ApiError::BadRequest(e.to_string())
            }
            StrideError::Serialization(_)
            | StrideError::Deserialization(_)
            | StrideError::Io(_)
            | StrideError::Config(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => {
                tracing::error!("Request failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

// =============================================================================
// TESTS
// =============================================================================
