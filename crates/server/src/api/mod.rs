//! API module providing the HTTP endpoints.
//!
//! This module is organized into submodules:
//! - `session` - Google sign-in and logout (/api/v1/auth/*)
//! - `users` - Account endpoints for signed-in users (/api/v1/users*)
//! - `admin` - Approval workflow (/api/v1/admin/*)
//! - `auth` - Request and role gates
//! - `health` - Health check endpoint (/health)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod admin;
pub mod auth;
pub mod health;
pub mod openapi;
pub mod session;
pub mod users;

pub use admin::ADMIN_TAG;
pub use health::MISC_TAG;
pub use session::AUTH_TAG;
pub use users::USERS_TAG;

use crate::AppState;
use axum::{
    Router,
    http::{Method, header},
    middleware,
};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Routes under `/api/v1`, each group behind its gate.
fn v1_router(state: &AppState) -> OpenApiRouter<AppState> {
    let users = users::router().layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_session,
    ));
    // The layer added last runs first: session, then role.
    let admin = admin::router()
        .layer(middleware::from_fn(auth::require_admin))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    OpenApiRouter::new()
        .merge(session::router())
        .merge(users)
        .merge(admin)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);
    match state.config.frontend_origin() {
        Ok(Some(origin)) => layer.allow_origin(origin),
        // Credentials cannot be combined with a wildcard origin; mirror the caller instead.
        Ok(None) => layer.allow_origin(tower_http::cors::AllowOrigin::mirror_request()),
        Err(e) => {
            tracing::error!(error = %e, "refusing all cross-origin requests");
            layer.allow_origin(tower_http::cors::AllowOrigin::list([]))
        }
    }
}

/// Build the application router, including the Redoc UI at `/api-docs`.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state);
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/api/v1", v1_router(&state))
        .routes(routes!(health::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server and serves until `shutdown` is cancelled.
#[tracing::instrument(skip(state, shutdown))]
pub async fn start_webserver(
    state: AppState,
    shutdown: CancellationToken,
) -> color_eyre::Result<()> {
    let addr = state.config.listen_addr.clone();
    let router = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}

/// Cancel `shutdown` once `signal` fires.
///
/// A signal handler that cannot be installed leaves the server running; it can
/// still be stopped by other means.
pub async fn cancel_on_signal<F>(signal: F, shutdown: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            tracing::info!("shutdown requested");
            shutdown.cancel();
        }
        Err(e) => tracing::error!(error = %e, "failed to install shutdown signal handler"),
    }
}
