//! Black-box specs for a running wxlogin server.
//!
//! Point `BASE_URL` at the server (default `http://localhost:3000`) and set
//! `WECHAT_TOKEN` if the server uses a non-default handshake token, then run
//! `cargo test -p wxlogin-e2e`.

pub mod client;
pub mod specs;

/// Invoke `$mac!(module::name)` for every E2E spec.
///
/// This is the **single source of truth** for the spec list. Adding a new spec
/// here automatically registers it as a test in `tests/server.rs`.
#[macro_export]
macro_rules! for_each_spec {
    ($mac:ident) => {
        // liveness (2)
        $mac!(health::backend_alive);
        $mac!(health::wechat_routes_alive);

        // webhook handshake (3)
        $mac!(wxcheck::valid_signature_echoes);
        $mac!(wxcheck::wrong_signature_forbidden);
        $mac!(wxcheck::missing_param_bad_request);

        // login flow (3)
        $mac!(login::qrcode_shape);
        $mac!(login::callback_requires_code);
        $mac!(login::check_status_shape);
    };
}
