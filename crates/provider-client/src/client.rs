use std::time::Duration;

use tracing::{debug, error};

use wxlogin_api::oauth::{self, AccessGrant};
use wxlogin_api::{LoginProfile, ServiceError};

use crate::retry::{retry_get, RetryConfig};

/// Which leg of the login failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    TokenExchange,
    UserInfo,
    Probe,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenExchange => "token exchange",
            Self::UserInfo => "userinfo fetch",
            Self::Probe => "authorize probe",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from talking to the WeChat API.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("{step} request failed: {source}")]
    Transport {
        step: Step,
        #[source]
        source: reqwest::Error,
    },

    #[error("{step} returned HTTP {status}")]
    Status { step: Step, status: u16 },

    #[error("{step}: {message}")]
    Rejected { step: Step, message: String },
}

impl ProviderError {
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Build(_) => None,
            Self::Transport { step, .. } | Self::Status { step, .. } | Self::Rejected { step, .. } => {
                Some(*step)
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_timeout())
    }
}

impl From<ProviderError> for ServiceError {
    fn from(e: ProviderError) -> Self {
        ServiceError::ProviderExchangeFailed(e.to_string())
    }
}

/// App credentials issued by the WeChat open platform.
#[derive(Clone)]
pub struct WechatCredentials {
    pub app_id: String,
    pub app_secret: String,
}

impl std::fmt::Debug for WechatCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WechatCredentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

/// A completed code exchange: the mailbox key plus the opaque profile.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedLogin {
    pub user_key: String,
    pub profile: LoginProfile,
}

/// Typed HTTP client for the WeChat OAuth API.
///
/// Every request carries the configured timeout. Transport failures get one
/// bounded retry (see [`RetryConfig`]); HTTP errors are never retried.
#[derive(Clone)]
pub struct WechatClient {
    client: reqwest::Client,
    api_base: String,
    credentials: WechatCredentials,
    retry: RetryConfig,
}

impl WechatClient {
    /// Create a new client against the public WeChat API with the given timeout.
    pub fn new(credentials: WechatCredentials, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProviderError::Build)?;
        Ok(Self::with_client(client, credentials))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, credentials: WechatCredentials) -> Self {
        Self {
            client,
            api_base: oauth::API_BASE_URL.to_string(),
            credentials,
            retry: RetryConfig::default(),
        }
    }

    /// Point the client at a different API host (a fake provider in tests).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn app_id(&self) -> &str {
        &self.credentials.app_id
    }

    // ── OAuth ─────────────────────────────────────────────────────────────

    /// Exchange an authorization code for an access token and openid.
    pub async fn exchange_code(&self, code: &str) -> Result<AccessGrant, ProviderError> {
        let url = oauth::build_token_url(
            &self.api_base,
            &self.credentials.app_id,
            &self.credentials.app_secret,
            code,
        );
        let body = self.get_text(&url, Step::TokenExchange).await?;
        oauth::parse_token_response(&body).map_err(|e| rejected(Step::TokenExchange, e))
    }

    /// Fetch the user's profile with a granted access token.
    pub async fn fetch_profile(&self, grant: &AccessGrant) -> Result<LoginProfile, ProviderError> {
        let url = oauth::build_userinfo_url(&self.api_base, grant);
        let body = self.get_text(&url, Step::UserInfo).await?;
        oauth::parse_userinfo_response(&body).map_err(|e| rejected(Step::UserInfo, e))
    }

    /// Run the full exchange: code → token, then token → profile.
    pub async fn login(&self, code: &str) -> Result<CompletedLogin, ProviderError> {
        let grant = self.exchange_code(code).await?;
        debug!("code exchanged for openid {}", grant.openid);
        let profile = self.fetch_profile(&grant).await?;
        Ok(CompletedLogin {
            user_key: grant.openid,
            profile,
        })
    }

    // ── Internal ──────────────────────────────────────────────────────────

    async fn get_text(&self, url: &str, step: Step) -> Result<String, ProviderError> {
        let resp = retry_get(&self.client, url, step.as_str(), &self.retry)
            .await
            .map_err(|source| {
                error!("{step} transport error: {source}");
                ProviderError::Transport { step, source }
            })?;

        let status = resp.status();
        if !status.is_success() {
            error!("{step} returned HTTP {status}");
            return Err(ProviderError::Status {
                step,
                status: status.as_u16(),
            });
        }

        resp.text()
            .await
            .map_err(|e| ProviderError::Transport {
                step,
                source: e.without_url(),
            })
    }
}

/// Reachability check for the authorize URL.
///
/// Needs no credentials: the authorize URL only carries the public app id.
#[derive(Clone)]
pub struct UrlProber {
    client: reqwest::Client,
}

impl UrlProber {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProviderError::Build)?;
        Ok(Self { client })
    }

    /// HEAD the URL and report its status. Advisory only; not retried.
    pub async fn probe(&self, url: &str) -> Result<u16, ProviderError> {
        let resp = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                step: Step::Probe,
                source: e.without_url(),
            })?;
        Ok(resp.status().as_u16())
    }
}

fn rejected(step: Step, e: ServiceError) -> ProviderError {
    error!("{step} rejected: {e}");
    ProviderError::Rejected {
        step,
        message: e.message().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{FakeBehavior, FakeWechat};

    fn credentials() -> WechatCredentials {
        WechatCredentials {
            app_id: "wx123".into(),
            app_secret: "s3cret".into(),
        }
    }

    fn client_for(fake: &FakeWechat, timeout: Duration) -> WechatClient {
        WechatClient::new(credentials(), timeout)
            .expect("client builds")
            .with_api_base(fake.base_url())
            .with_retry(RetryConfig {
                max_retries: 1,
                delay: Duration::from_millis(10),
            })
    }

    #[tokio::test]
    async fn login_runs_token_then_userinfo() {
        let fake = FakeWechat::spawn(FakeBehavior::Ok).await;
        let client = client_for(&fake, Duration::from_secs(5));

        let login = client.login("good-code").await.expect("login succeeds");
        assert_eq!(login.user_key, "openid-good-code");
        assert_eq!(login.profile["nickname"], "fake-user");
        assert_eq!(fake.token_hits(), 1);
        assert_eq!(fake.userinfo_hits(), 1);
    }

    #[tokio::test]
    async fn errcode_envelope_is_rejected_without_userinfo_call() {
        let fake = FakeWechat::spawn(FakeBehavior::TokenErrcode).await;
        let client = client_for(&fake, Duration::from_secs(5));

        let err = client.login("code").await.expect_err("must fail");
        assert!(matches!(
            err,
            ProviderError::Rejected {
                step: Step::TokenExchange,
                ..
            }
        ));
        assert_eq!(fake.userinfo_hits(), 0);
    }

    #[tokio::test]
    async fn http_error_is_not_retried() {
        let fake = FakeWechat::spawn(FakeBehavior::TokenStatus(503)).await;
        let client = client_for(&fake, Duration::from_secs(5));

        let err = client.exchange_code("code").await.expect_err("must fail");
        assert!(matches!(err, ProviderError::Status { status: 503, .. }));
        assert_eq!(fake.token_hits(), 1);
    }

    #[tokio::test]
    async fn userinfo_failure_reports_userinfo_step() {
        let fake = FakeWechat::spawn(FakeBehavior::UserInfoStatus(500)).await;
        let client = client_for(&fake, Duration::from_secs(5));

        let err = client.login("code").await.expect_err("must fail");
        assert_eq!(err.step(), Some(Step::UserInfo));
        let service: ServiceError = err.into();
        assert_eq!(service.status_code(), 500);
    }

    #[tokio::test]
    async fn timeout_is_retried_once() {
        let fake = FakeWechat::spawn(FakeBehavior::SlowFirstToken(Duration::from_millis(800))).await;
        let client = client_for(&fake, Duration::from_millis(200));

        let login = client.login("code").await.expect("second attempt succeeds");
        assert_eq!(login.user_key, "openid-code");
        assert_eq!(fake.token_hits(), 2);
    }

    #[tokio::test]
    async fn persistent_timeout_gives_up_after_one_retry() {
        let fake = FakeWechat::spawn(FakeBehavior::Hang).await;
        let client = client_for(&fake, Duration::from_millis(100));

        let err = client.exchange_code("code").await.expect_err("must time out");
        assert!(err.is_timeout());
        assert_eq!(fake.token_hits(), 2);
    }

    #[tokio::test]
    async fn connection_refused_surfaces_as_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = WechatClient::new(credentials(), Duration::from_secs(1))
            .unwrap()
            .with_api_base(&format!("http://{addr}"))
            .with_retry(RetryConfig::none());

        let err = client.exchange_code("code").await.expect_err("must fail");
        assert!(matches!(err, ProviderError::Transport { .. }));
        assert!(!err.to_string().contains("s3cret"));
    }

    #[tokio::test]
    async fn connection_refused_is_retried_once() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let delay = Duration::from_millis(400);
        let client = WechatClient::new(credentials(), Duration::from_secs(5))
            .unwrap()
            .with_api_base(&format!("http://{addr}"))
            .with_retry(RetryConfig {
                max_retries: 1,
                delay,
            });

        // Nothing listens for the first attempt; the provider comes up during the back-off.
        let provider = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            FakeWechat::spawn_at(addr, FakeBehavior::Ok).await
        });

        let started = std::time::Instant::now();
        let login = client.login("code").await.expect("retry reaches the provider");
        assert!(started.elapsed() >= delay);
        assert_eq!(login.user_key, "openid-code");

        let fake = provider.await.unwrap();
        assert_eq!(fake.token_hits(), 1);
        assert_eq!(fake.userinfo_hits(), 1);
    }

    #[tokio::test]
    async fn prober_reports_status_without_credentials() {
        let fake = FakeWechat::spawn(FakeBehavior::Ok).await;
        let prober = UrlProber::new(Duration::from_secs(5)).unwrap();

        let ok = prober.probe(&format!("{}/sns/userinfo", fake.base_url())).await.unwrap();
        assert_eq!(ok, 200);
        let missing = prober.probe(&format!("{}/nowhere", fake.base_url())).await.unwrap();
        assert_eq!(missing, 404);
    }

    #[tokio::test]
    async fn prober_unreachable_host_is_probe_step_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = UrlProber::new(Duration::from_secs(1)).unwrap();
        let err = prober.probe(&format!("http://{addr}/")).await.expect_err("must fail");
        assert_eq!(err.step(), Some(Step::Probe));
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let dbg = format!("{:?}", credentials());
        assert!(dbg.contains("wx123"));
        assert!(!dbg.contains("s3cret"));
    }
}
