//! # Stride HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /badges` - Badge catalog
//! - `GET /profiles/{id}` - Full progression state
//! - `GET /profiles/{id}/summary` - Progress overview
//! - `GET /profiles/{id}/badges/progress` - Progress towards locked badges
//! - `PUT /profiles/{id}/profile` - Set the onboarding profile
//! - `POST /profiles/{id}/onboarding` - Complete onboarding
//! - `POST /profiles/{id}/xp` - Grant XP
//! - `POST /profiles/{id}/check-in` - Daily check-in
//! - `POST /profiles/{id}/badges/{badge}` - Unlock a badge directly
//! - `POST|DELETE /profiles/{id}/saved/{opportunity}` - Save / unsave
//! - `POST /profiles/{id}/applied/{opportunity}` - Record an application
//! - `POST /profiles/{id}/completed/{opportunity}` - Record a completion
//! - `POST /profiles/{id}/acknowledge/{kind}` - Clear a presentation flag
//! - `GET /profiles/{id}/snapshot` - Binary snapshot (base64)
//! - `DELETE /profiles/{id}/session` - Tear down a session
//!
//! ## Concurrency
//!
//! Each profile's service sits behind its own async mutex in the
//! [`ProfileRegistry`]. A command holds that lock from read to commit, and
//! timer tasks take the same lock before firing.

mod handlers;
mod middleware;
mod types;

pub use middleware::{ProfileRateLimiter, create_rate_limiter};
pub use types::{
    AckResponse, ApiError, CommandResponse, ErrorResponse, HealthResponse, ProfileRequest,
    SessionClosedResponse, SnapshotResponse, XpRequest, XpResponse,
};

use crate::config::AppConfig;
use crate::timer::{SharedService, open_shared};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use std::collections::BTreeMap;
use std::sync::Arc;
use stride_core::{
    BadgeCatalog, ProfileId, ProgressionService, ServiceOptions, SnapshotStore, StrideError,
};
use tokio::sync::{OwnedMutexGuard, RwLock};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size.
const MAX_BODY_SIZE: usize = 64 * 1024;

// =============================================================================
// PROFILE REGISTRY
// =============================================================================

/// Open progression sessions, one per profile.
#[derive(Debug)]
pub struct ProfileRegistry {
    sessions: RwLock<BTreeMap<ProfileId, SharedService>>,
    store: Arc<dyn SnapshotStore>,
    catalog: Arc<BadgeCatalog>,
    options: ServiceOptions,
}

impl ProfileRegistry {
    /// Registry over `store` using the standard catalog.
    #[must_use]
    pub fn new(store: Arc<dyn SnapshotStore>, options: ServiceOptions) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            store,
            catalog: Arc::new(BadgeCatalog::standard()),
            options,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &BadgeCatalog {
        &self.catalog
    }

    /// The open session for `profile`, hydrating it from the store if needed.
    pub async fn get_or_open(&self, profile: &ProfileId) -> SharedService {
        if let Some(service) = self.sessions.read().await.get(profile) {
            return service.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(profile.clone())
            .or_insert_with(|| {
                tracing::debug!(%profile, "opening session");
                open_shared(
                    profile.clone(),
                    self.store.clone(),
                    self.catalog.clone(),
                    self.options,
                )
            })
            .clone()
    }

    /// Lock the live session for `profile`.
    ///
    /// A session closed while this call waited for its lock is skipped and
    /// its successor, hydrated from the store, is locked instead.
    pub async fn session(&self, profile: &ProfileId) -> OwnedMutexGuard<ProgressionService> {
        loop {
            let guard = self.get_or_open(profile).await.lock_owned().await;
            if !guard.is_shut_down() {
                return guard;
            }
            tracing::debug!(%profile, "session closed while waiting, reopening");
        }
    }

    /// Tear down the session for `profile`.
    ///
    /// The map stays locked until the session has been shut down, so no
    /// successor is hydrated while a command on the old session is still
    /// running. Returns the number of cancelled deferred unlocks, or `None`
    /// if no session was open.
    pub async fn close(&self, profile: &ProfileId) -> Option<usize> {
        let mut sessions = self.sessions.write().await;
        let service = sessions.get(profile)?.clone();
        let cancelled = service.lock().await.shutdown();
        sessions.remove(profile);
        Some(cancelled)
    }

    /// Tear down every session. Returns the total of cancelled unlocks.
    pub async fn shutdown_all(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut cancelled = 0;
        for service in sessions.values() {
            cancelled += service.lock().await.shutdown();
        }
        sessions.clear();
        cancelled
    }

    /// Number of open sessions.
    pub async fn open_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<ProfileRegistry>,
}

impl AppState {
    #[must_use]
    pub fn new(registry: ProfileRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

/// Router settings taken from the application config.
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    pub cors_origins: Option<String>,
    /// Requests per second per profile. 0 disables limiting.
    pub rate_limit_per_profile: u32,
}

impl From<&AppConfig> for RouterOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            cors_origins: config.server.cors_origins.clone(),
            rate_limit_per_profile: config.limits.rate_limit_per_profile,
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer.
///
/// - `*`: allows all origins
/// - unset: localhost only
/// - otherwise: the comma-separated list of origins
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                with_allowed_methods(CorsLayer::new().allow_origin(allowed_origins))
            }
        }
        None => build_localhost_cors(),
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    with_allowed_methods(CorsLayer::new().allow_origin(origins))
}

fn with_allowed_methods(layer: CorsLayer) -> CorsLayer {
    layer
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate limiting - per profile (if enabled)
pub fn create_router(state: AppState, options: &RouterOptions) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/badges", get(handlers::catalog_handler))
        .route("/profiles/{id}", get(handlers::view_handler))
        .route("/profiles/{id}/summary", get(handlers::summary_handler))
        .route(
            "/profiles/{id}/badges/progress",
            get(handlers::badge_progress_handler),
        )
        .route("/profiles/{id}/profile", put(handlers::set_profile_handler))
        .route("/profiles/{id}/onboarding", post(handlers::onboarding_handler))
        .route("/profiles/{id}/xp", post(handlers::add_xp_handler))
        .route("/profiles/{id}/check-in", post(handlers::check_in_handler))
        .route(
            "/profiles/{id}/badges/{badge}",
            post(handlers::unlock_badge_handler),
        )
        .route(
            "/profiles/{id}/saved/{opportunity}",
            post(handlers::save_handler).delete(handlers::unsave_handler),
        )
        .route(
            "/profiles/{id}/applied/{opportunity}",
            post(handlers::apply_handler),
        )
        .route(
            "/profiles/{id}/completed/{opportunity}",
            post(handlers::complete_handler),
        )
        .route(
            "/profiles/{id}/acknowledge/{kind}",
            post(handlers::acknowledge_handler),
        )
        .route("/profiles/{id}/snapshot", get(handlers::snapshot_handler))
        .route(
            "/profiles/{id}/session",
            axum::routing::delete(handlers::close_session_handler),
        );

    match create_rate_limiter(options.rate_limit_per_profile) {
        Some(limiter) => {
            tracing::info!(
                "Rate limiting enabled: {} requests/second per profile",
                options.rate_limit_per_profile
            );
            router = router.layer(axum_middleware::from_fn_with_state(
                limiter,
                middleware::rate_limit_middleware,
            ));
        }
        None => tracing::info!("Rate limiting disabled"),
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(options.cors_origins.as_deref()))
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_SIZE)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and run until Ctrl+C.
///
/// On shutdown every open session is torn down, cancelling pending
/// deferred unlocks.
pub async fn run_server(config: &AppConfig) -> Result<(), StrideError> {
    let store = config.open_store()?;
    let state = AppState::new(ProfileRegistry::new(store, config.progression));
    let router = create_router(state.clone(), &RouterOptions::from(config));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| StrideError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Stride HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StrideError::Io(format!("Server error: {}", e)))?;

    let cancelled = state.registry.shutdown_all().await;
    tracing::info!(cancelled, "Stride HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stride_core::MemoryStore;

    fn registry() -> ProfileRegistry {
        ProfileRegistry::new(Arc::new(MemoryStore::new()), ServiceOptions::default())
    }

    #[tokio::test]
    async fn registry_reuses_open_sessions() {
        let registry = registry();
        let ada = ProfileId::new("ada").expect("id");

        let first = registry.get_or_open(&ada).await;
        first.lock().await.add_xp(40);
        let second = registry.get_or_open(&ada).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().await.state().xp(), 40);
        assert_eq!(registry.open_sessions().await, 1);
    }

    #[tokio::test]
    async fn closed_session_rehydrates_from_store() {
        let registry = registry();
        let ada = ProfileId::new("ada").expect("id");

        registry.get_or_open(&ada).await.lock().await.save("camp").expect("save");
        assert_eq!(registry.close(&ada).await, Some(0));
        assert_eq!(registry.close(&ada).await, None);

        let reopened = registry.get_or_open(&ada).await;
        assert_eq!(reopened.lock().await.state().saved().len(), 1);
    }

    #[tokio::test]
    async fn close_waits_for_running_command() {
        let registry = Arc::new(registry());
        let ada = ProfileId::new("ada").expect("id");

        let mut running = registry.session(&ada).await;
        let closer = tokio::spawn({
            let registry = registry.clone();
            let ada = ada.clone();
            async move { registry.close(&ada).await }
        });
        tokio::task::yield_now().await;

        running.save("camp").expect("save");
        drop(running);
        assert_eq!(closer.await.expect("join"), Some(0));

        let successor = registry.session(&ada).await;
        assert!(!successor.is_shut_down());
        assert_eq!(successor.state().saved().len(), 1);
    }

    #[tokio::test]
    async fn stale_session_handle_is_not_reused() {
        let registry = registry();
        let ada = ProfileId::new("ada").expect("id");

        let stale = registry.get_or_open(&ada).await;
        registry.close(&ada).await;

        let live = registry.session(&ada).await;
        assert!(!live.is_shut_down());
        assert!(live.is_persisting());
        assert!(stale.lock().await.is_shut_down());
        assert!(!stale.lock().await.is_persisting());
    }

    #[tokio::test]
    async fn shutdown_all_cancels_pending() {
        let registry = registry();
        for id in ["ada", "grace"] {
            let profile = ProfileId::new(id).expect("id");
            registry.get_or_open(&profile).await.lock().await.add_xp(812);
        }

        assert_eq!(registry.shutdown_all().await, 2);
        assert_eq!(registry.open_sessions().await, 0);
    }

    #[test]
    fn router_options_from_config() {
        let mut config = AppConfig::default();
        config.limits.rate_limit_per_profile = 5;
        config.server.cors_origins = Some("*".to_string());

        let options = RouterOptions::from(&config);
        assert_eq!(options.rate_limit_per_profile, 5);
        assert_eq!(options.cors_origins.as_deref(), Some("*"));
    }
}
