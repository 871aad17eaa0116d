/// GET /test: server liveness check.
pub async fn backend() -> &'static str {
    "Backend is running!"
}

/// GET /api/wechat/test: liveness check for the WeChat routes.
pub async fn wechat() -> &'static str {
    "Wechat route is working"
}
