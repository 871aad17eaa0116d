//! WeChat OAuth2 web login support.
//!
//! This module contains only types, URL builders, and JSON parsing.
//! No HTTP calls here. Those live in `wxlogin-provider-client`.

use serde::{Deserialize, Serialize};

use crate::{LoginProfile, ServiceError};

/// Browser-facing authorize endpoint.
pub const AUTHORIZE_URL: &str = "https://open.weixin.qq.com/connect/oauth2/authorize";

/// Server-facing API host for token exchange and userinfo.
pub const API_BASE_URL: &str = "https://api.weixin.qq.com";

const TOKEN_PATH: &str = "/sns/oauth2/access_token";
const USERINFO_PATH: &str = "/sns/userinfo";

// ── Scope ───────────────────────────────────────────────────────────────────

/// Requested OAuth scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Silent authorization, openid only.
    SnsapiBase,
    /// Official-account login with profile access.
    #[default]
    SnsapiUserinfo,
    /// Website QR-code login (open platform).
    SnsapiLogin,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SnsapiBase => "snsapi_base",
            Self::SnsapiUserinfo => "snsapi_userinfo",
            Self::SnsapiLogin => "snsapi_login",
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "snsapi_base" => Ok(Self::SnsapiBase),
            "snsapi_userinfo" => Ok(Self::SnsapiUserinfo),
            "snsapi_login" => Ok(Self::SnsapiLogin),
            other => Err(ServiceError::MissingConfig(format!(
                "unsupported WeChat OAuth scope '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── URL Builders (pure functions, no HTTP) ──────────────────────────────────

/// Validated inputs for [`build_authorize_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeParams {
    app_id: String,
    redirect_uri: String,
    scope: Scope,
}

impl AuthorizeParams {
    /// Fails with `MissingConfig` when the app id or redirect URI is absent or blank.
    pub fn new(
        app_id: Option<&str>,
        redirect_uri: Option<&str>,
        scope: Scope,
    ) -> Result<Self, ServiceError> {
        let app_id = non_blank(app_id)
            .ok_or_else(|| ServiceError::MissingConfig("WECHAT_APP_ID is not configured".into()))?;
        let redirect_uri = non_blank(redirect_uri).ok_or_else(|| {
            ServiceError::MissingConfig("WECHAT_REDIRECT_URI is not configured".into())
        })?;
        Ok(Self {
            app_id: app_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scope,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

/// Build the authorize URL that the user's browser (or QR code) should open.
pub fn build_authorize_url(params: &AuthorizeParams, state: &str) -> String {
    format!(
        "{AUTHORIZE_URL}?appid={}&redirect_uri={}&response_type=code&scope={}&state={}#wechat_redirect",
        urlencoding::encode(&params.app_id),
        urlencoding::encode(&params.redirect_uri),
        params.scope,
        urlencoding::encode(state),
    )
}

/// Build the code → access_token exchange URL.
pub fn build_token_url(api_base: &str, app_id: &str, app_secret: &str, code: &str) -> String {
    format!(
        "{}{TOKEN_PATH}?appid={}&secret={}&code={}&grant_type=authorization_code",
        api_base.trim_end_matches('/'),
        urlencoding::encode(app_id),
        urlencoding::encode(app_secret),
        urlencoding::encode(code),
    )
}

/// Build the userinfo URL for a granted access token.
pub fn build_userinfo_url(api_base: &str, grant: &AccessGrant) -> String {
    format!(
        "{}{USERINFO_PATH}?access_token={}&openid={}&lang=zh_CN",
        api_base.trim_end_matches('/'),
        urlencoding::encode(&grant.access_token),
        urlencoding::encode(&grant.openid),
    )
}

// ── Response Parsing ────────────────────────────────────────────────────────

/// Result of a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessGrant {
    pub access_token: String,
    /// Provider-assigned user identifier, used as the mailbox key.
    pub openid: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub unionid: Option<String>,
}

/// WeChat reports failures as `{"errcode": N, "errmsg": "..."}`, often with HTTP 200.
fn provider_error(json: &serde_json::Value) -> Option<String> {
    let code = json.get("errcode")?.as_i64()?;
    if code == 0 {
        return None;
    }
    let msg = json.get("errmsg").and_then(|v| v.as_str()).unwrap_or("unknown error");
    Some(format!("errcode {code}: {msg}"))
}

/// Parse the token endpoint body into an [`AccessGrant`].
pub fn parse_token_response(raw: &str) -> Result<AccessGrant, ServiceError> {
    let json: serde_json::Value = serde_json::from_str(raw.trim()).map_err(|e| {
        ServiceError::ProviderExchangeFailed(format!("token response is not JSON: {e}"))
    })?;

    if let Some(detail) = provider_error(&json) {
        return Err(ServiceError::ProviderExchangeFailed(format!(
            "token exchange rejected: {detail}"
        )));
    }

    let grant: AccessGrant = serde_json::from_value(json).map_err(|e| {
        ServiceError::ProviderExchangeFailed(format!("token response malformed: {e}"))
    })?;

    if grant.access_token.trim().is_empty() || grant.openid.trim().is_empty() {
        return Err(ServiceError::ProviderExchangeFailed(
            "token response has empty access_token or openid".into(),
        ));
    }
    Ok(grant)
}

/// Parse the userinfo endpoint body. The profile stays an opaque object.
pub fn parse_userinfo_response(raw: &str) -> Result<LoginProfile, ServiceError> {
    let json: serde_json::Value = serde_json::from_str(raw.trim()).map_err(|e| {
        ServiceError::ProviderExchangeFailed(format!("userinfo response is not JSON: {e}"))
    })?;

    if let Some(detail) = provider_error(&json) {
        return Err(ServiceError::ProviderExchangeFailed(format!(
            "userinfo rejected: {detail}"
        )));
    }

    match json {
        serde_json::Value::Object(map) if !map.is_empty() => Ok(map),
        _ => Err(ServiceError::ProviderExchangeFailed(
            "userinfo response is not a non-empty object".into(),
        )),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AuthorizeParams {
        AuthorizeParams::new(Some("wx123"), Some("https://x.test/cb"), Scope::SnsapiUserinfo)
            .expect("valid params")
    }

    #[test]
    fn authorize_url_contains_app_id_and_encoded_redirect() {
        let url = build_authorize_url(&params(), "abc");
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("appid=wx123"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fx.test%2Fcb"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=snsapi_userinfo"));
        assert!(url.contains("state=abc"));
        assert!(url.ends_with("#wechat_redirect"));
    }

    #[test]
    fn empty_app_id_is_missing_config() {
        let err = AuthorizeParams::new(Some(""), Some("https://x.test/cb"), Scope::default())
            .expect_err("must fail");
        assert!(matches!(err, ServiceError::MissingConfig(_)));

        let err = AuthorizeParams::new(Some("wx123"), None, Scope::default())
            .expect_err("must fail");
        assert!(err.message().contains("WECHAT_REDIRECT_URI"));

        let err = AuthorizeParams::new(None, Some("   "), Scope::default()).expect_err("must fail");
        assert!(err.message().contains("WECHAT_APP_ID"));
    }

    #[test]
    fn scope_parses_known_values() {
        assert_eq!("snsapi_login".parse::<Scope>().unwrap(), Scope::SnsapiLogin);
        assert_eq!(" snsapi_base ".parse::<Scope>().unwrap(), Scope::SnsapiBase);
        assert!("email".parse::<Scope>().is_err());
    }

    #[test]
    fn token_url_encodes_code_and_trims_base() {
        let url = build_token_url("http://127.0.0.1:9/", "wx123", "s3cret", "a b&c");
        assert_eq!(
            url,
            "http://127.0.0.1:9/sns/oauth2/access_token?appid=wx123&secret=s3cret&code=a%20b%26c&grant_type=authorization_code"
        );
    }

    #[test]
    fn parse_token_ok() {
        let raw = r#"{"access_token":"AT","expires_in":7200,"refresh_token":"RT","openid":"OID","scope":"snsapi_userinfo"}"#;
        let grant = parse_token_response(raw).expect("token parse");
        assert_eq!(grant.access_token, "AT");
        assert_eq!(grant.openid, "OID");
        assert_eq!(grant.expires_in, Some(7200));
        assert_eq!(grant.unionid, None);
    }

    #[test]
    fn parse_token_errcode_has_reason() {
        let raw = r#"{"errcode":40029,"errmsg":"invalid code"}"#;
        let err = parse_token_response(raw).expect_err("must fail");
        assert!(matches!(err, ServiceError::ProviderExchangeFailed(_)));
        assert!(err.message().contains("40029"));
    }

    #[test]
    fn parse_token_missing_openid_fails() {
        let err = parse_token_response(r#"{"access_token":"AT"}"#).expect_err("must fail");
        assert!(err.message().contains("malformed"));
        assert!(parse_token_response("<html>").is_err());
    }

    #[test]
    fn parse_userinfo_keeps_profile_opaque() {
        let raw = r#"{"openid":"OID","nickname":"Alice","headimgurl":"https://img","privilege":[]}"#;
        let profile = parse_userinfo_response(raw).expect("userinfo parse");
        assert_eq!(profile["nickname"], "Alice");
        assert_eq!(profile.len(), 4);
    }

    #[test]
    fn parse_userinfo_rejects_error_envelope_and_non_objects() {
        assert!(parse_userinfo_response(r#"{"errcode":40003,"errmsg":"invalid openid"}"#).is_err());
        assert!(parse_userinfo_response("[]").is_err());
        assert!(parse_userinfo_response("{}").is_err());
        // errcode 0 is success
        assert!(parse_userinfo_response(r#"{"errcode":0,"openid":"OID"}"#).is_ok());
    }
}
