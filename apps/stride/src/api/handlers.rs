//! # API Endpoint Handlers
//!
//! Every profile handler validates the path id, takes the profile's session
//! lock, runs one service command and answers with the resulting state.

use super::{
    AppState,
    types::{
        AckResponse, ApiError, CommandResponse, HealthResponse, ProfileRequest,
        SessionClosedResponse, SnapshotResponse, XpRequest, XpResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use base64::Engine;
use stride_core::{BadgeId, ProfileId, primitives, snapshot_to_bytes};

type ApiResult<T> = Result<Json<T>, ApiError>;

fn profile_id(id: String) -> Result<ProfileId, ApiError> {
    ProfileId::new(id).map_err(ApiError::from)
}

// =============================================================================
// HEALTH / CATALOG
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// The badge catalog in display order.
pub async fn catalog_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.catalog().clone())
}

// =============================================================================
// VIEWS
// =============================================================================

/// Full progression state.
pub async fn view_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<stride_core::ProgressionView> {
    let service = state.registry.session(&profile_id(id)?).await;
    Ok(Json(service.view()))
}

/// Progress overview.
pub async fn summary_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<stride_core::ProgressionSummary> {
    let service = state.registry.session(&profile_id(id)?).await;
    Ok(Json(service.summary()))
}

/// Progress towards every locked badge, closest first.
pub async fn badge_progress_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<stride_core::BadgeProgress>> {
    let service = state.registry.session(&profile_id(id)?).await;
    Ok(Json(service.badge_progress()))
}

// =============================================================================
// PROFILE / ONBOARDING
// =============================================================================

/// Set the onboarding profile. A second profile is ignored.
pub async fn set_profile_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ProfileRequest>,
) -> ApiResult<CommandResponse> {
    let profile = request.to_profile()?;
    let mut service = state.registry.session(&profile_id(id)?).await;
    let report = service.set_profile(profile);
    Ok(Json(CommandResponse {
        report,
        state: service.view(),
    }))
}

/// Complete onboarding.
pub async fn onboarding_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<CommandResponse> {
    let mut service = state.registry.session(&profile_id(id)?).await;
    let report = service.complete_onboarding();
    Ok(Json(CommandResponse {
        report,
        state: service.view(),
    }))
}

// =============================================================================
// XP / CHECK-IN / BADGES
// =============================================================================

/// Grant XP from an external source.
pub async fn add_xp_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<XpRequest>,
) -> ApiResult<XpResponse> {
    let mut service = state.registry.session(&profile_id(id)?).await;
    let grant = service.add_xp(request.amount);
    Ok(Json(XpResponse {
        grant,
        state: service.view(),
    }))
}

/// Daily check-in at the server's current time.
pub async fn check_in_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<CommandResponse> {
    let mut service = state.registry.session(&profile_id(id)?).await;
    let now = service.now();
    let report = service.check_in(now);
    Ok(Json(CommandResponse {
        report,
        state: service.view(),
    }))
}

/// Unlock a badge directly. Unknown or owned badges are a no-op.
pub async fn unlock_badge_handler(
    State(state): State<AppState>,
    Path((id, badge)): Path<(String, String)>,
) -> ApiResult<CommandResponse> {
    let mut service = state.registry.session(&profile_id(id)?).await;
    let report = service.unlock_badge(&BadgeId::new(badge));
    Ok(Json(CommandResponse {
        report,
        state: service.view(),
    }))
}

// =============================================================================
// INTERACTION SETS
// =============================================================================

/// Which interaction a path targets.
#[derive(Debug, Clone, Copy)]
enum Interaction {
    Save,
    Unsave,
    Apply,
    Complete,
}

async fn interaction(
    state: AppState,
    id: String,
    opportunity: String,
    kind: Interaction,
) -> ApiResult<CommandResponse> {
    let mut service = state.registry.session(&profile_id(id)?).await;
    let report = match kind {
        Interaction::Save => service.save(&opportunity),
        Interaction::Unsave => service.unsave(&opportunity),
        Interaction::Apply => service.apply(&opportunity),
        Interaction::Complete => service.complete(&opportunity),
    }?;
    Ok(Json(CommandResponse {
        report,
        state: service.view(),
    }))
}

/// Save an opportunity.
pub async fn save_handler(
    State(state): State<AppState>,
    Path((id, opportunity)): Path<(String, String)>,
) -> ApiResult<CommandResponse> {
    interaction(state, id, opportunity, Interaction::Save).await
}

/// Remove a saved opportunity.
pub async fn unsave_handler(
    State(state): State<AppState>,
    Path((id, opportunity)): Path<(String, String)>,
) -> ApiResult<CommandResponse> {
    interaction(state, id, opportunity, Interaction::Unsave).await
}

/// Record an application.
pub async fn apply_handler(
    State(state): State<AppState>,
    Path((id, opportunity)): Path<(String, String)>,
) -> ApiResult<CommandResponse> {
    interaction(state, id, opportunity, Interaction::Apply).await
}

/// Record a completion.
pub async fn complete_handler(
    State(state): State<AppState>,
    Path((id, opportunity)): Path<(String, String)>,
) -> ApiResult<CommandResponse> {
    interaction(state, id, opportunity, Interaction::Complete).await
}

// =============================================================================
// ACKNOWLEDGEMENTS
// =============================================================================

/// Clear one presentation flag: `level-up`, `achievement` or `confetti`.
pub async fn acknowledge_handler(
    State(state): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
) -> ApiResult<AckResponse> {
    let profile = profile_id(id)?;
    if !matches!(kind.as_str(), "level-up" | "achievement" | "confetti") {
        return Err(ApiError::BadRequest(format!(
            "Unknown acknowledgement '{}' (expected level-up, achievement or confetti)",
            kind
        )));
    }

    let mut service = state.registry.session(&profile).await;
    let acknowledged = match kind.as_str() {
        "level-up" => service.acknowledge_level_up(),
        "achievement" => service.acknowledge_achievement_toast(),
        _ => service.acknowledge_confetti(),
    };
    Ok(Json(AckResponse {
        acknowledged,
        flags: service.state().flags().clone(),
    }))
}

// =============================================================================
// SNAPSHOT / SESSION
// =============================================================================

/// Binary snapshot of the persisted state, base64-encoded.
pub async fn snapshot_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SnapshotResponse> {
    let profile = profile_id(id)?;
    let snapshot = state.registry.session(&profile).await.snapshot();

    let bytes = snapshot_to_bytes(&snapshot)?;
    Ok(Json(SnapshotResponse {
        profile_id: profile,
        format: String::from_utf8_lossy(primitives::MAGIC_BYTES).into_owned(),
        version: primitives::FORMAT_VERSION,
        size_bytes: bytes.len(),
        data: base64::engine::general_purpose::STANDARD.encode(&bytes),
    }))
}

/// Tear down an open session, cancelling its deferred unlocks.
pub async fn close_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionClosedResponse> {
    let profile = profile_id(id)?;
    match state.registry.close(&profile).await {
        Some(cancelled) => {
            tracing::info!(%profile, cancelled, "session closed");
            Ok(Json(SessionClosedResponse {
                profile_id: profile,
                cancelled,
            }))
        }
        None => Err(ApiError::NotFound(format!(
            "No open session for profile '{}'",
            profile
        ))),
    }
}
