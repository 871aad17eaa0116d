use anyhow::{Result, ensure};

use crate::client::TestContext;

pub async fn backend_alive(ctx: &TestContext) -> Result<()> {
    let resp = ctx.get(&ctx.root_url("/test")).await?;
    ensure!(resp.status() == 200, "expected 200, got {}", resp.status());
    ensure!(resp.text().await? == "Backend is running!", "unexpected liveness body");
    Ok(())
}

pub async fn wechat_routes_alive(ctx: &TestContext) -> Result<()> {
    let resp = ctx.get(&ctx.url("/test")).await?;
    ensure!(resp.status() == 200, "expected 200, got {}", resp.status());
    Ok(())
}
