//! Tinta form-builder backend.
//!
//! The binary in `main.rs` only reads configuration and serves
//! [`build_router`]; everything else lives here so integration tests can drive
//! the same router in-process.

pub mod auth;
pub mod config;
pub mod error;
pub mod export;
pub mod mail;
pub mod routes;
pub mod services;
pub mod storage;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use config::AppConfig;
use export::PdfRenderer;
use mail::Mailer;
use storage::Db;

/// Largest request body accepted; per-file ceilings are enforced by the
/// upload policy.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
    pub mailer: Arc<dyn Mailer>,
    /// `None` when `PDF_RENDER_URL` is unset.
    pub pdf: Option<PdfRenderer>,
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn Mailer> {
    fn from_ref(state: &AppState) -> Self {
        state.mailer.clone()
    }
}

impl FromRef<AppState> for Option<PdfRenderer> {
    fn from_ref(state: &AppState) -> Self {
        state.pdf.clone()
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Auth
        .route("/auth/otp/request", post(routes::auth::request_otp))
        .route("/auth/otp/verify", post(routes::auth::verify_otp))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        // Profile
        .route("/users/me", put(routes::users::update_profile))
        .route("/users/me/onboarding", post(routes::users::complete_onboarding))
        .route("/users/me/avatar", post(routes::users::upload_avatar))
        // Workspaces
        .route(
            "/workspaces",
            get(routes::workspaces::list_workspaces).post(routes::workspaces::create_workspace),
        )
        .route(
            "/workspaces/slug-available",
            get(routes::workspaces::slug_available),
        )
        .route(
            "/workspaces/by-slug/{slug}",
            get(routes::workspaces::get_workspace_by_slug),
        )
        .route(
            "/workspaces/{id}",
            get(routes::workspaces::get_workspace)
                .put(routes::workspaces::update_workspace)
                .delete(routes::workspaces::delete_workspace),
        )
        .route(
            "/workspaces/{id}/image",
            post(routes::workspaces::upload_image),
        )
        // Members
        .route("/workspaces/{id}/members", get(routes::members::list_members))
        .route(
            "/workspaces/{id}/members/{user_id}",
            put(routes::members::update_member_role).delete(routes::members::remove_member),
        )
        // Invitations (workspace admins)
        .route(
            "/workspaces/{id}/invitations",
            get(routes::invitations::list_workspace_invitations)
                .post(routes::invitations::create_invitation),
        )
        .route(
            "/workspaces/{id}/invitations/{invitation_id}",
            axum::routing::delete(routes::invitations::cancel_invitation),
        )
        .route(
            "/workspaces/{id}/invitations/{invitation_id}/resend",
            post(routes::invitations::resend_invitation),
        )
        // Invitations (invitee)
        .route("/invitations", get(routes::invitations::list_my_invitations))
        .route("/invitations/{token}", get(routes::invitations::lookup_invitation))
        .route(
            "/invitations/{token}/accept",
            post(routes::invitations::accept_invitation),
        )
        // Templates
        .route(
            "/templates",
            get(routes::templates::list_templates).post(routes::templates::create_template),
        )
        .route(
            "/templates/{id}",
            get(routes::templates::get_template)
                .put(routes::templates::update_template)
                .delete(routes::templates::delete_template),
        )
        .route(
            "/templates/{id}/fields/order",
            put(routes::templates::reorder_fields),
        )
        // Forms
        .route(
            "/workspaces/{id}/forms",
            get(routes::forms::list_forms).post(routes::forms::create_form),
        )
        .route(
            "/forms/{id}",
            get(routes::forms::get_form)
                .put(routes::forms::update_form)
                .delete(routes::forms::delete_form),
        )
        .route("/forms/{id}/fields/order", put(routes::forms::reorder_fields))
        .route("/forms/{id}/fields/move", post(routes::forms::move_field))
        .route(
            "/forms/{id}/share-token",
            post(routes::forms::regenerate_share_token),
        )
        // Public form
        .route("/public/forms/{token}", get(routes::public::get_public_form))
        .route(
            "/public/forms/{token}/responses",
            post(routes::public::submit_response),
        )
        // Responses
        .route("/forms/{id}/responses", get(routes::responses::list_responses))
        .route(
            "/responses/{id}",
            get(routes::responses::get_response).delete(routes::responses::delete_response),
        )
        .route(
            "/responses/{id}/status",
            put(routes::responses::update_status),
        )
        .route(
            "/responses/{id}/files/{file_id}",
            get(routes::responses::download_file),
        )
        .route(
            "/responses/{id}/export.html",
            get(routes::responses::export_html),
        )
        .route(
            "/responses/{id}/export.pdf",
            get(routes::responses::export_pdf),
        )
        // Blobs
        .route("/blobs/{*key}", get(routes::blobs::get_blob));

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
