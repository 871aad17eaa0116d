use anyhow::{Result, bail, ensure};

use wxlogin_api::{CheckStatusResponse, ErrorBody, QrcodeResponse};

use crate::client::TestContext;

/// Either a usable login URL, or an explained configuration failure.
pub async fn qrcode_shape(ctx: &TestContext) -> Result<()> {
    let resp = ctx.get(&ctx.url("/qrcode")).await?;
    match resp.status().as_u16() {
        200 => {
            let body: QrcodeResponse = resp.json().await?;
            ensure!(
                body.qrcode_url.starts_with("https://open.weixin.qq.com/"),
                "unexpected authorize host: {}",
                body.qrcode_url
            );
            ensure!(body.qrcode_url.contains("state="), "state missing");
            ensure!(body.qrcode_url.ends_with("#wechat_redirect"), "fragment missing");
        }
        500 => {
            let body: ErrorBody = resp.json().await?;
            ensure!(!body.message.is_empty(), "error message must be present");
            ensure!(body.error.is_some(), "config failures must explain themselves");
        }
        other => bail!("unexpected status {other}"),
    }
    Ok(())
}

pub async fn callback_requires_code(ctx: &TestContext) -> Result<()> {
    let resp = ctx.get(&ctx.url("/callback?state=e2e")).await?;
    ensure!(resp.status() == 400, "expected 400, got {}", resp.status());
    Ok(())
}

pub async fn check_status_shape(ctx: &TestContext) -> Result<()> {
    let resp = ctx.get(&ctx.url("/check-status")).await?;
    ensure!(resp.status() == 200, "expected 200, got {}", resp.status());
    let raw: serde_json::Value = resp.json().await?;
    ensure!(raw.get("userInfo").is_some(), "userInfo key must always be present");
    let _: CheckStatusResponse = serde_json::from_value(raw)?;

    // A second poll right after must find the mailbox drained.
    let again: CheckStatusResponse = ctx.get(&ctx.url("/check-status")).await?.json().await?;
    ensure!(again.user_info.is_none(), "mailbox must be drained by the first poll");
    Ok(())
}
