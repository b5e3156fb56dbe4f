use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use pinrelay_core::config::Config;

mod keepalive;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pinrelay_core::logging::init("pinrelay")?;

    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("{e}");
            return Err(e).context("invalid configuration");
        }
    };

    let shutdown = CancellationToken::new();
    let keepalive = cfg.keepalive_enabled.then(|| {
        let port = cfg.keepalive_port;
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = keepalive::serve(port, token).await {
                warn!("{e:#}");
            }
        })
    });

    let result = pinrelay_telegram::router::run_polling(cfg)
        .await
        .context("telegram bot failed");

    shutdown.cancel();
    if let Some(handle) = keepalive {
        let _ = handle.await;
    }
    result
}
