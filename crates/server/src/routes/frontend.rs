use axum::{extract::State, response::Redirect};

use crate::AppConfig;

/// GET /login: front-end route, handled by the SPA at `/`.
pub async fn login() -> Redirect {
    Redirect::to("/")
}

/// Anything unmatched belongs to the front end.
pub async fn fallback(State(config): State<AppConfig>) -> Redirect {
    Redirect::to(&config.frontend_url)
}
