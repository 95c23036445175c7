use std::sync::Arc;

use privbot_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), privbot_core::Error> {
    privbot_core::logging::init("privbot")?;

    let cfg = Arc::new(Config::load()?);

    privbot_discord::router::run_gateway(cfg)
        .await
        .map_err(|e| privbot_core::Error::External(format!("discord bot failed: {e}")))?;

    Ok(())
}
