use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use wxlogin_api::{ErrorBody, ServiceError};

/// Unified API error type.
///
/// Produces `{"message": "...", "error": "..."}` JSON responses. `error` is
/// only filled in when the detail is safe to show (config problems) or the
/// server runs in development.
#[derive(Debug)]
pub struct ApiErr {
    status: StatusCode,
    message: String,
    detail: Option<String>,
}

impl ApiErr {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Map a service error onto a response, logging the server-side ones.
    ///
    /// `public_message` is what the end user sees for provider and internal
    /// failures. `dev` exposes the underlying message as `error`.
    pub fn from_service(e: ServiceError, public_message: &str, dev: bool) -> Self {
        let code = e.code();
        match e {
            ServiceError::InvalidRequest(m) => Self::bad_request(m),
            ServiceError::VerificationFailed(m) => Self::forbidden(m),
            ServiceError::MissingConfig(m) => {
                tracing::error!("{code}: {m}");
                Self::internal(public_message).with_detail(m)
            }
            ServiceError::ProviderExchangeFailed(m) | ServiceError::Internal(m) => {
                tracing::error!("{code}: {m}");
                let err = Self::internal(public_message);
                if dev { err.with_detail(m) } else { err }
            }
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                message: self.message,
                error: self.detail,
            }),
        )
            .into_response()
    }
}
