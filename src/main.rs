use std::sync::Arc;

use junction::config::Config;
use junction::proxy::{Forwarder, RouteTable};
use junction::server::listener::Listener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let table = Arc::new(RouteTable::from_config(&cfg)?);
    let forwarder = Forwarder::new(cfg.connect_timeout(), cfg.read_timeout());

    let listener = Listener::bind(&cfg.listen_addr, table, forwarder).await?;

    tokio::select! {
        res = listener.serve() => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
