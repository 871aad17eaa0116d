use anyhow::{Result, ensure};

use wxlogin_api::signature::compute_signature;

use crate::client::TestContext;

pub async fn valid_signature_echoes(ctx: &TestContext) -> Result<()> {
    let (timestamp, nonce) = ctx.handshake_inputs();
    let signature = compute_signature(ctx.webhook_token(), &timestamp, &nonce);
    let url = ctx.url(&format!(
        "/wxcheck?signature={signature}&timestamp={timestamp}&nonce={nonce}&echostr=e2e-echo"
    ));

    let resp = ctx.get(&url).await?;
    ensure!(resp.status() == 200, "expected 200, got {}", resp.status());
    ensure!(resp.text().await? == "e2e-echo", "echostr must be echoed verbatim");
    Ok(())
}

pub async fn wrong_signature_forbidden(ctx: &TestContext) -> Result<()> {
    let (timestamp, nonce) = ctx.handshake_inputs();
    let url = ctx.url(&format!(
        "/wxcheck?signature=wrong&timestamp={timestamp}&nonce={nonce}&echostr=e2e-echo"
    ));

    let resp = ctx.get(&url).await?;
    ensure!(resp.status() == 403, "expected 403, got {}", resp.status());
    Ok(())
}

pub async fn missing_param_bad_request(ctx: &TestContext) -> Result<()> {
    let (timestamp, nonce) = ctx.handshake_inputs();
    let signature = compute_signature(ctx.webhook_token(), &timestamp, &nonce);
    let url = ctx.url(&format!(
        "/wxcheck?signature={signature}&timestamp={timestamp}&nonce={nonce}"
    ));

    let resp = ctx.get(&url).await?;
    ensure!(resp.status() == 400, "expected 400, got {}", resp.status());
    Ok(())
}
