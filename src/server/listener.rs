use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::server::connection::Connection;

/// Accept loop for the demo container. Bound separately from serving so
/// callers can learn the local address first.
pub struct Listener {
    listener: TcpListener,
    config: Config,
}

impl Listener {
    pub async fn bind(config: &Config) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
        info!("Listening on {}", config.listen_addr);

        Ok(Self {
            listener,
            config: config.clone(),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr().context("No local address")
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        loop {
            let (socket, peer) = self.listener.accept().await?;
            info!("Accepted connection from {}", peer);

            let cycle_config = self.config.cycle;
            tokio::spawn(async move {
                let mut conn = Connection::new(socket, cycle_config);
                if let Err(e) = conn.run().await {
                    tracing::error!("Connection error from {}: {}", peer, e);
                }
            });
        }
    }
}
