mod config;
mod error;
mod mailbox;
mod routes;

use anyhow::Context;
use axum::{
    Router,
    extract::FromRef,
    http::{Method, header},
    routing::get,
};
use tokio::signal;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use wxlogin_provider_client::{UrlProber, WechatClient};

pub use config::AppConfig;
use mailbox::{Mailbox, StateStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub mailbox: Mailbox,
    pub states: StateStore,
    /// `None` until both app id and secret are configured.
    pub provider: Option<WechatClient>,
    /// Present when `WECHAT_PROBE_AUTHORIZE_URL` is on.
    pub prober: Option<UrlProber>,
}

impl AppState {
    pub fn new(config: AppConfig, provider: Option<WechatClient>) -> Self {
        Self {
            mailbox: Mailbox::new(config.mailbox_ttl),
            states: StateStore::new(config.state_ttl),
            prober: build_prober(&config),
            provider,
            config,
        }
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Mailbox {
    fn from_ref(state: &AppState) -> Self {
        state.mailbox.clone()
    }
}

fn build_provider(config: &AppConfig) -> Option<WechatClient> {
    let Some(credentials) = config.credentials() else {
        tracing::warn!("WECHAT_APP_ID/WECHAT_APP_SECRET not set; /callback will answer 500");
        return None;
    };
    match WechatClient::new(credentials, config.http_timeout) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::error!("WeChat client unavailable: {e}");
            None
        }
    }
}

fn build_prober(config: &AppConfig) -> Option<UrlProber> {
    if !config.probe_authorize_url {
        return None;
    }
    match UrlProber::new(config.http_timeout) {
        Ok(prober) => Some(prober),
        Err(e) => {
            tracing::error!("authorize URL probe unavailable: {e}");
            None
        }
    }
}

/// WeChat login routes, served at the root and under `/api/wechat`.
fn wechat_routes() -> Router<AppState> {
    Router::new()
        .route("/wxcheck", get(routes::wechat::wxcheck))
        .route("/qrcode", get(routes::wechat::qrcode))
        .route("/callback", get(routes::wechat::callback))
        .route("/check-status", get(routes::wechat::check_status))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    Router::new()
        .nest(
            "/api/wechat",
            wechat_routes().route("/test", get(routes::health::wechat)),
        )
        .merge(wechat_routes())
        .route("/test", get(routes::health::backend))
        .route("/login", get(routes::frontend::login))
        .fallback(routes::frontend::fallback)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wxlogin_server=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env();
    config.log_summary();

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let provider = build_provider(&config);
    let state = AppState::new(config, provider);
    let _sweeper = mailbox::spawn_sweeper(state.mailbox.clone(), state.states.clone());
    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("cannot listen on {addr}: {e}");
            if e.kind() == std::io::ErrorKind::AddrInUse {
                tracing::error!("make sure no other service is using this port");
            }
            return Err(e).with_context(|| format!("binding {addr}"));
        }
    };

    tracing::info!("starting server at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
