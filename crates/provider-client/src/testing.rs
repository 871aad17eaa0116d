//! In-process fake of the WeChat OAuth API for tests.
//!
//! Serves `/sns/oauth2/access_token` and `/sns/userinfo` on an ephemeral
//! localhost port. The openid is derived from the code (`openid-<code>`), so
//! tests can tell logins apart.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;

/// How the fake answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehavior {
    Ok,
    /// Token endpoint answers 200 with an `errcode` envelope.
    TokenErrcode,
    /// Token endpoint answers with this HTTP status.
    TokenStatus(u16),
    /// Userinfo endpoint answers with this HTTP status.
    UserInfoStatus(u16),
    /// First token request stalls for the given time, later ones succeed.
    SlowFirstToken(Duration),
    /// Token endpoint never answers in a useful time.
    Hang,
}

#[derive(Clone)]
struct FakeState {
    behavior: FakeBehavior,
    token_hits: Arc<AtomicUsize>,
    userinfo_hits: Arc<AtomicUsize>,
}

/// Handle to a running fake provider.
pub struct FakeWechat {
    base_url: String,
    token_hits: Arc<AtomicUsize>,
    userinfo_hits: Arc<AtomicUsize>,
}

impl FakeWechat {
    /// Bind on `127.0.0.1:0` and serve in a background task.
    pub async fn spawn(behavior: FakeBehavior) -> Self {
        Self::spawn_at(SocketAddr::from(([127, 0, 0, 1], 0)), behavior).await
    }

    /// Bind on a specific address, e.g. one a client already failed to reach.
    pub async fn spawn_at(addr: SocketAddr, behavior: FakeBehavior) -> Self {
        let state = FakeState {
            behavior,
            token_hits: Arc::new(AtomicUsize::new(0)),
            userinfo_hits: Arc::new(AtomicUsize::new(0)),
        };
        let token_hits = state.token_hits.clone();
        let userinfo_hits = state.userinfo_hits.clone();

        let app = Router::new()
            .route("/sns/oauth2/access_token", get(access_token))
            .route("/sns/userinfo", get(userinfo))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("bind fake provider");
        let addr = listener.local_addr().expect("fake provider addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            token_hits,
            userinfo_hits,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_hits(&self) -> usize {
        self.token_hits.load(Ordering::SeqCst)
    }

    pub fn userinfo_hits(&self) -> usize {
        self.userinfo_hits.load(Ordering::SeqCst)
    }
}

fn status_response(code: u16) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, "fake provider failure").into_response()
}

async fn access_token(
    State(state): State<FakeState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let hit = state.token_hits.fetch_add(1, Ordering::SeqCst);

    match state.behavior {
        FakeBehavior::TokenErrcode => {
            return Json(json!({ "errcode": 40029, "errmsg": "invalid code" })).into_response();
        }
        FakeBehavior::TokenStatus(code) => return status_response(code),
        FakeBehavior::SlowFirstToken(delay) if hit == 0 => tokio::time::sleep(delay).await,
        FakeBehavior::Hang => tokio::time::sleep(Duration::from_secs(300)).await,
        _ => {}
    }

    let code = params.get("code").cloned().unwrap_or_default();
    Json(json!({
        "access_token": format!("token-{code}"),
        "expires_in": 7200,
        "refresh_token": "refresh",
        "openid": format!("openid-{code}"),
        "scope": "snsapi_userinfo",
    }))
    .into_response()
}

async fn userinfo(
    State(state): State<FakeState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.userinfo_hits.fetch_add(1, Ordering::SeqCst);

    if let FakeBehavior::UserInfoStatus(code) = state.behavior {
        return status_response(code);
    }

    let openid = params.get("openid").cloned().unwrap_or_default();
    Json(json!({
        "openid": openid,
        "nickname": "fake-user",
        "sex": 0,
        "headimgurl": "https://thirdwx.qlogo.cn/fake/0",
        "privilege": [],
    }))
    .into_response()
}
