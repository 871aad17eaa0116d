//! WeChat server-configuration handshake verification.
//!
//! When a webhook URL is registered, WeChat calls it with
//! `signature`, `timestamp`, `nonce` and `echostr`. The signature is the
//! SHA-1 of `token`, `timestamp` and `nonce` sorted lexicographically and
//! concatenated, rendered as lowercase hex. On a match the endpoint must echo
//! `echostr` back verbatim.

use sha1::{Digest, Sha1};

use crate::ServiceError;

/// Parsed handshake query. All four fields are required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub signature: String,
    pub timestamp: String,
    pub nonce: String,
    pub echostr: String,
}

impl HandshakeRequest {
    /// Build from optional query values. Any missing or empty field is
    /// `InvalidRequest`, regardless of the others.
    pub fn from_parts(
        signature: Option<String>,
        timestamp: Option<String>,
        nonce: Option<String>,
        echostr: Option<String>,
    ) -> Result<Self, ServiceError> {
        let mut missing = Vec::new();
        let mut take = |name: &'static str, value: Option<String>| match value {
            Some(v) if !v.is_empty() => v,
            _ => {
                missing.push(name);
                String::new()
            }
        };

        let req = Self {
            signature: take("signature", signature),
            timestamp: take("timestamp", timestamp),
            nonce: take("nonce", nonce),
            echostr: take("echostr", echostr),
        };

        if !missing.is_empty() {
            return Err(ServiceError::InvalidRequest(format!(
                "missing required parameters: {}",
                missing.join(", ")
            )));
        }
        Ok(req)
    }
}

/// Outcome of a handshake check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Match,
    Mismatch,
}

impl Verification {
    pub fn is_match(self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Compute the expected handshake signature.
pub fn compute_signature(token: &str, timestamp: &str, nonce: &str) -> String {
    let mut parts = [token, timestamp, nonce];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Check a handshake against the pre-shared token.
///
/// The comparison is case-sensitive: an uppercase hex signature does not match.
pub fn verify(token: &str, req: &HandshakeRequest) -> Verification {
    if compute_signature(token, &req.timestamp, &req.nonce) == req.signature {
        Verification::Match
    } else {
        Verification::Mismatch
    }
}
