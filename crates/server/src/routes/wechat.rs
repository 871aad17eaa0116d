use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use wxlogin_api::{
    CheckStatusResponse, QrcodeResponse, ServiceError, crypto, oauth,
    signature::{self, HandshakeRequest},
};
use wxlogin_provider_client::UrlProber;

use crate::error::ApiErr;
use crate::mailbox::Mailbox;
use crate::{AppConfig, AppState};

const CALLBACK_PAGE: &str = r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>WeChat login</title>
</head>
<body style="font-family: sans-serif; text-align: center; padding-top: 3em;">
  <h2>登录成功 / Login successful</h2>
  <p>You can close this window and return to the original page.</p>
  <script>
    if (window.opener) { window.opener.postMessage("wechat-login-complete", "*"); }
    setTimeout(function () { window.close(); }, 1500);
  </script>
</body>
</html>
"#;

// ---------------------------------------------------------------------------
// GET /wxcheck: WeChat server-configuration handshake
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct HandshakeQuery {
    signature: Option<String>,
    timestamp: Option<String>,
    nonce: Option<String>,
    echostr: Option<String>,
}

/// GET /wxcheck: echo `echostr` when the handshake signature matches.
///
/// Answers in plain text, as WeChat expects: 200 on match, 403 on mismatch,
/// 400 when a parameter is missing.
pub async fn wxcheck(State(config): State<AppConfig>, Query(q): Query<HandshakeQuery>) -> Response {
    let req = match HandshakeRequest::from_parts(q.signature, q.timestamp, q.nonce, q.echostr) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!("wxcheck rejected: {e}");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    if signature::verify(&config.webhook_token, &req).is_match() {
        tracing::info!("wxcheck: WeChat server handshake verified");
        req.echostr.into_response()
    } else {
        tracing::warn!(
            "wxcheck: signature mismatch (timestamp={}, nonce={})",
            req.timestamp,
            req.nonce
        );
        (StatusCode::FORBIDDEN, "signature verification failed").into_response()
    }
}

// ---------------------------------------------------------------------------
// GET /qrcode: build the login URL
// ---------------------------------------------------------------------------

/// GET /qrcode: issue a `state` and return the WeChat authorize URL.
pub async fn qrcode(State(state): State<AppState>) -> Result<Json<QrcodeResponse>, ApiErr> {
    let dev = state.config.is_development();
    let fail = move |e: ServiceError| ApiErr::from_service(e, "failed to build WeChat login URL", dev);

    let params = state.config.authorize_params().map_err(fail)?;
    let token = crypto::generate_state().map_err(fail)?;
    state.states.issue(token.clone());

    let url = oauth::build_authorize_url(&params, &token);
    tracing::info!(
        "issued WeChat login URL (app {}, scope {}, {} state(s) pending)",
        params.app_id(),
        params.scope(),
        state.states.len()
    );

    if let Some(prober) = state.prober.clone() {
        spawn_probe(prober, url.clone());
    }

    Ok(Json(QrcodeResponse { qrcode_url: url }))
}

/// Check the authorize URL in the background. The outcome is only logged.
fn spawn_probe(prober: UrlProber, url: String) {
    tokio::spawn(async move {
        match prober.probe(&url).await {
            Ok(status) => tracing::info!("authorize URL reachable, HTTP {status}"),
            Err(e) => tracing::warn!("authorize URL may be unreachable: {e}"),
        }
    });
}

// ---------------------------------------------------------------------------
// GET /callback: provider redirect target
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

/// GET /callback: exchange the code for a profile and park it in the mailbox.
pub async fn callback(
    State(state): State<AppState>,
    Query(q): Query<CallbackQuery>,
) -> Result<Html<&'static str>, ApiErr> {
    let dev = state.config.is_development();
    let fail = move |e: ServiceError| ApiErr::from_service(e, "failed to process WeChat callback", dev);

    let code = q
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiErr::bad_request("missing code parameter"))?;

    if state.config.verify_state {
        let issued = q.state.as_deref().is_some_and(|s| state.states.consume(s));
        if !issued {
            tracing::warn!("callback rejected: unknown or expired OAuth state");
            return Err(ApiErr::bad_request("invalid or expired OAuth state"));
        }
    }

    let provider = state.provider.as_ref().ok_or_else(|| {
        fail(ServiceError::MissingConfig(
            "WECHAT_APP_ID and WECHAT_APP_SECRET must be set".into(),
        ))
    })?;

    let login = provider.login(&code).await.map_err(|e| fail(e.into()))?;

    // Nothing is written unless both provider calls succeeded.
    state.mailbox.deposit(login.user_key, login.profile);
    tracing::info!(
        "WeChat login completed, {} profile(s) awaiting pickup",
        state.mailbox.len()
    );

    Ok(Html(CALLBACK_PAGE))
}

// ---------------------------------------------------------------------------
// GET /check-status: front-end polling
// ---------------------------------------------------------------------------

/// GET /check-status: hand over the pending profile, if any, exactly once.
pub async fn check_status(State(mailbox): State<Mailbox>) -> Json<CheckStatusResponse> {
    let user_info = mailbox.poll_and_clear();
    if user_info.is_some() {
        tracing::info!("login profile handed to front end");
    }
    Json(CheckStatusResponse { user_info })
}
