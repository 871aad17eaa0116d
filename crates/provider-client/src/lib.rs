pub mod client;
pub mod retry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{CompletedLogin, ProviderError, Step, UrlProber, WechatClient, WechatCredentials};
pub use retry::RetryConfig;
pub use wxlogin_api;
