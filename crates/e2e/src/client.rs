use anyhow::Result;
use uuid::Uuid;

/// Holds connection info for a test run.
pub struct TestContext {
    pub client: reqwest::Client,
    base_url: String,
    webhook_token: String,
}

impl TestContext {
    pub fn new(base_url: String, webhook_token: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            webhook_token,
        }
    }

    /// Build a WeChat route URL from a path like `/qrcode`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/wechat{}", self.base_url, path)
    }

    /// Build a URL outside the `/api/wechat` prefix.
    pub fn root_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn webhook_token(&self) -> &str {
        &self.webhook_token
    }

    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        Ok(self.client.get(url).send().await?)
    }

    /// A fresh `(timestamp, nonce)` pair for handshake requests.
    pub fn handshake_inputs(&self) -> (String, String) {
        let id = Uuid::new_v4().simple().to_string();
        (id[..10].to_string(), id[10..20].to_string())
    }
}
