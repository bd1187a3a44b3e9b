use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

mod dto;
pub mod error;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod oauth;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod service;
pub mod tokens;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/google", get(handlers::google_login))
        .route("/auth/google/callback", get(handlers::google_callback))
        .route(
            "/auth/verify-email",
            get(handlers::verify_email).post(handlers::verify_email),
        )
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .route(
            "/auth/reset-password",
            get(handlers::check_reset_token).post(handlers::reset_password),
        )
        .route("/auth/refresh-token", post(handlers::refresh_token))
        .route("/auth/verify-token", post(handlers::verify_token))
        .route("/auth/me", get(handlers::me))
        .route("/auth/logout", post(handlers::logout))
}
