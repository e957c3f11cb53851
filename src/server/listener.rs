use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use crate::http::connection::Connection;
use crate::proxy::{Forwarder, RouteTable};

/// The listening socket plus everything a connection task needs.
///
/// Binding is separate from serving so that a bind failure is fatal before
/// any traffic is accepted, and so callers can read the bound address when
/// listening on an ephemeral port.
pub struct Listener {
    inner: TcpListener,
    table: Arc<RouteTable>,
    forwarder: Forwarder,
}

impl Listener {
    pub async fn bind(
        addr: &str,
        table: Arc<RouteTable>,
        forwarder: Forwarder,
    ) -> anyhow::Result<Self> {
        let inner = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        Ok(Self {
            inner,
            table,
            forwarder,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Accepts connections forever, one task per connection.
    pub async fn serve(self) -> anyhow::Result<()> {
        info!("Listening on {}", self.inner.local_addr()?);

        loop {
            let (socket, peer) = self.inner.accept().await?;

            let table = self.table.clone();
            let forwarder = self.forwarder;
            tokio::spawn(async move {
                let mut conn = Connection::new(socket, peer, table, forwarder);
                if let Err(e) = conn.run().await {
                    tracing::warn!("Connection error from {}: {:#}", peer, e);
                }
            });
        }
    }
}
