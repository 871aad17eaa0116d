use std::time::Duration;

use tracing::warn;

/// Configuration for retrying provider GET requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_millis(250),
        }
    }
}

impl RetryConfig {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }
}

/// Connection failures and timeouts are worth another attempt; anything the
/// provider actually answered is not.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Send a GET, retrying transient transport errors up to `config.max_retries` times.
///
/// Any response, whatever its status, is returned immediately. Errors come
/// back with the URL stripped because provider URLs carry the app secret.
pub async fn retry_get(
    client: &reqwest::Client,
    url: &str,
    step: &str,
    config: &RetryConfig,
) -> Result<reqwest::Response, reqwest::Error> {
    let max_attempts = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match client.get(url).send().await {
            Ok(resp) => return Ok(resp),
            Err(e) if attempt < max_attempts && is_transient(&e) => {
                let e = e.without_url();
                warn!(
                    "{step} attempt {attempt}/{max_attempts} failed ({e}), retrying in {}ms",
                    config.delay.as_millis(),
                );
                tokio::time::sleep(config.delay).await;
            }
            Err(e) => return Err(e.without_url()),
        }
    }
}
