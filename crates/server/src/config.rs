use std::time::Duration;

use wxlogin_api::ServiceError;
use wxlogin_api::oauth::{AuthorizeParams, Scope};
use wxlogin_provider_client::WechatCredentials;

/// Handshake token used when `WECHAT_TOKEN` is unset.
pub const DEFAULT_WEBHOOK_TOKEN: &str = "mma_test_token";

/// Server configuration loaded from environment variables.
///
/// Missing WeChat settings are not fatal: the affected routes answer 500
/// with an explanatory message instead.
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub redirect_uri: Option<String>,
    /// `None` when `WECHAT_SCOPE` holds an unsupported value.
    pub scope: Option<Scope>,
    pub webhook_token: String,
    pub verify_state: bool,
    pub probe_authorize_url: bool,
    pub http_timeout: Duration,
    pub mailbox_ttl: Duration,
    pub state_ttl: Duration,
    pub frontend_url: String,
    pub environment: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let scope = match var("WECHAT_SCOPE") {
            None => Some(Scope::default()),
            Some(raw) => match raw.parse::<Scope>() {
                Ok(scope) => Some(scope),
                Err(e) => {
                    tracing::warn!("{e}");
                    None
                }
            },
        };

        Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".into()),
            port: parse_or("PORT", var("PORT"), 3000),
            app_id: var("WECHAT_APP_ID"),
            app_secret: var("WECHAT_APP_SECRET"),
            redirect_uri: var("WECHAT_REDIRECT_URI"),
            scope,
            webhook_token: var("WECHAT_TOKEN").unwrap_or_else(|| DEFAULT_WEBHOOK_TOKEN.into()),
            verify_state: parse_bool("WECHAT_VERIFY_STATE", var("WECHAT_VERIFY_STATE"), true),
            probe_authorize_url: parse_bool(
                "WECHAT_PROBE_AUTHORIZE_URL",
                var("WECHAT_PROBE_AUTHORIZE_URL"),
                false,
            ),
            http_timeout: parse_secs("WECHAT_HTTP_TIMEOUT_SECS", var("WECHAT_HTTP_TIMEOUT_SECS"), 10),
            mailbox_ttl: parse_secs("MAILBOX_TTL_SECS", var("MAILBOX_TTL_SECS"), 300),
            state_ttl: Duration::from_secs(600),
            frontend_url: var("FRONTEND_URL").unwrap_or_else(|| "http://localhost:8080".into()),
            environment: var("NODE_ENV"),
        }
    }

    /// Whether 5xx bodies may carry internal error detail.
    pub fn is_development(&self) -> bool {
        self.environment.as_deref() == Some("development")
    }

    pub fn authorize_params(&self) -> Result<AuthorizeParams, ServiceError> {
        let scope = self.scope.ok_or_else(|| {
            ServiceError::MissingConfig("WECHAT_SCOPE holds an unsupported value".into())
        })?;
        AuthorizeParams::new(self.app_id.as_deref(), self.redirect_uri.as_deref(), scope)
    }

    pub fn credentials(&self) -> Option<WechatCredentials> {
        Some(WechatCredentials {
            app_id: self.app_id.clone()?,
            app_secret: self.app_secret.clone()?,
        })
    }

    /// Log which settings are present. Secret values are never printed.
    pub fn log_summary(&self) {
        let presence = |v: &Option<String>| if v.is_some() { "set" } else { "MISSING" };
        tracing::info!("environment: {}", self.environment.as_deref().unwrap_or("unset"));
        tracing::info!("WECHAT_APP_ID: {}", presence(&self.app_id));
        tracing::info!("WECHAT_APP_SECRET: {}", presence(&self.app_secret));
        tracing::info!("WECHAT_REDIRECT_URI: {}", presence(&self.redirect_uri));
        if self.app_id.is_none() || self.redirect_uri.is_none() {
            tracing::warn!("WeChat login URL generation is disabled until WECHAT_APP_ID and WECHAT_REDIRECT_URI are set");
        }
        if !self.verify_state {
            tracing::warn!("OAuth state validation is disabled (WECHAT_VERIFY_STATE=false)");
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("port", &self.port)
            .field("app_id", &self.app_id)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "<redacted>"))
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("verify_state", &self.verify_state)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("{key}={raw} is not valid, using default");
            default
        }),
    }
}

/// A whole number of seconds. Zero would expire every login (or time out
/// every provider call) on the spot, so it falls back to the default.
fn parse_secs(key: &str, raw: Option<String>, default: u64) -> Duration {
    let secs = parse_or(key, raw, default);
    if secs == 0 {
        tracing::warn!("{key}=0 is not allowed, using default of {default}s");
        return Duration::from_secs(default);
    }
    Duration::from_secs(secs)
}

fn parse_bool(key: &str, raw: Option<String>, default: bool) -> bool {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => default,
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        Some(other) => {
            tracing::warn!("{key}={other} is not a boolean, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.webhook_token, DEFAULT_WEBHOOK_TOKEN);
        assert_eq!(config.scope, Some(Scope::SnsapiUserinfo));
        assert!(config.verify_state);
        assert!(!config.probe_authorize_url);
        assert!(!config.is_development());
        assert!(config.credentials().is_none());
    }

    #[test]
    fn missing_app_id_is_missing_config() {
        let config = config_from(&[("WECHAT_REDIRECT_URI", "https://x.test/cb")]);
        let err = config.authorize_params().expect_err("must fail");
        assert!(matches!(err, ServiceError::MissingConfig(_)));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[("WECHAT_APP_ID", "  "), ("PORT", "not-a-port")]);
        assert!(config.app_id.is_none());
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn parses_overrides() {
        let config = config_from(&[
            ("PORT", "8081"),
            ("WECHAT_APP_ID", "wx123"),
            ("WECHAT_APP_SECRET", "s3cret"),
            ("WECHAT_REDIRECT_URI", "https://x.test/cb"),
            ("WECHAT_SCOPE", "snsapi_login"),
            ("WECHAT_VERIFY_STATE", "false"),
            ("MAILBOX_TTL_SECS", "30"),
            ("NODE_ENV", "development"),
        ]);
        assert_eq!(config.port, 8081);
        assert_eq!(config.scope, Some(Scope::SnsapiLogin));
        assert!(!config.verify_state);
        assert_eq!(config.mailbox_ttl, Duration::from_secs(30));
        assert!(config.is_development());
        assert_eq!(config.credentials().map(|c| c.app_id), Some("wx123".into()));
        assert!(config.authorize_params().is_ok());
    }

    #[test]
    fn zero_durations_fall_back_to_defaults() {
        let config = config_from(&[("MAILBOX_TTL_SECS", "0"), ("WECHAT_HTTP_TIMEOUT_SECS", "0")]);
        assert_eq!(config.mailbox_ttl, Duration::from_secs(300));
        assert_eq!(config.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn unsupported_scope_disables_authorize_params() {
        let config = config_from(&[
            ("WECHAT_APP_ID", "wx123"),
            ("WECHAT_REDIRECT_URI", "https://x.test/cb"),
            ("WECHAT_SCOPE", "email"),
        ]);
        assert_eq!(config.scope, None);
        assert!(config.authorize_params().is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let config = config_from(&[("WECHAT_APP_SECRET", "s3cret")]);
        assert!(!format!("{config:?}").contains("s3cret"));
    }
}
