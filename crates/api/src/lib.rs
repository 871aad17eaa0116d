//! Shared API types, webhook signatures, and OAuth URL builders for wxlogin.
//!
//! This crate is the **single source of truth** for the JSON shapes the
//! front end polls. TypeScript types are generated via `ts-rs` when the `ts`
//! feature is on.
//!
//! To regenerate TypeScript types:
//!   cargo test -p wxlogin-api --features ts -- export_typescript --nocapture
//!
//! Nothing in here performs I/O. HTTP calls live in `wxlogin-provider-client`
//! and request handling lives in the server crate.

use serde::{Deserialize, Serialize};

pub mod crypto;
pub mod oauth;
pub mod signature;

/// Profile returned by the WeChat userinfo endpoint.
///
/// Kept as an opaque JSON object (nickname, headimgurl, openid, unionid...).
pub type LoginProfile = serde_json::Map<String, serde_json::Value>;

// ─── Responses ──────────────────────────────────────────────────────────────

/// GET /qrcode response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct QrcodeResponse {
    pub qrcode_url: String,
}

/// GET /check-status response. `userInfo` is `null` while no login is pending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct CheckStatusResponse {
    #[cfg_attr(feature = "ts", ts(type = "Record<string, unknown> | null"))]
    pub user_info: Option<LoginProfile>,
}

/// JSON error body returned by every failing JSON route.
///
/// `error` carries internal detail and is only populated in development.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ─── Service Error ──────────────────────────────────────────────────────────

/// Framework-agnostic error taxonomy.
///
/// The server maps each variant onto an HTTP status via [`status_code`](Self::status_code).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Missing or malformed client input.
    #[error("{0}")]
    InvalidRequest(String),
    /// Webhook signature did not match.
    #[error("{0}")]
    VerificationFailed(String),
    /// Server misconfiguration. The message never contains secret values.
    #[error("{0}")]
    MissingConfig(String),
    /// Any failure talking to the identity provider.
    #[error("{0}")]
    ProviderExchangeFailed(String),
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP status code as a `u16`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::VerificationFailed(_) => 403,
            Self::MissingConfig(_) | Self::ProviderExchangeFailed(_) | Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::VerificationFailed(_) => "verification_failed",
            Self::MissingConfig(_) => "missing_config",
            Self::ProviderExchangeFailed(_) => "provider_exchange_failed",
            Self::Internal(_) => "internal",
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidRequest(m)
            | Self::VerificationFailed(m)
            | Self::MissingConfig(m)
            | Self::ProviderExchangeFailed(m)
            | Self::Internal(m) => m,
        }
    }
}

// ─── TypeScript generation ───────────────────────────────────────────────────

#[cfg(all(test, feature = "ts"))]
mod ts_export {
    use super::*;
    use std::path::PathBuf;
    use ts_rs::TS;

    /// Run with: cargo test -p wxlogin-api --features ts -- export_typescript --nocapture
    #[test]
    fn export_typescript() {
        let out_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../frontend/src/api-types.generated.ts");

        let cfg = ts_rs::Config::new();
        let mut parts: Vec<String> = vec![
            "// AUTO-GENERATED by wxlogin-api. DO NOT EDIT".to_string(),
            "// Regenerate with: cargo test -p wxlogin-api --features ts -- export_typescript"
                .to_string(),
            String::new(),
        ];
        for decl in [
            QrcodeResponse::decl(&cfg),
            CheckStatusResponse::decl(&cfg),
            ErrorBody::decl(&cfg),
        ] {
            parts.push(decl.replacen("type ", "export type ", 1));
            parts.push(String::new());
        }

        if let Some(parent) = out_dir.parent() {
            std::fs::create_dir_all(parent).expect("create frontend/src");
        }
        std::fs::write(&out_dir, parts.join("\n")).expect("write generated types");
        println!("wrote {}", out_dir.display());
    }
}
