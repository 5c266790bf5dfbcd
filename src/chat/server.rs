/// Listener/acceptor — binds, accepts, and spawns one session task per
/// connection.
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use super::broadcast::Broadcaster;
use super::config::ServerConfig;
use super::registry::Registry;
use super::session::run_session;

/// A bound chat server, ready to accept connections.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    registry: Arc<Registry>,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Bind the listening socket. A bind failure is fatal at startup;
    /// there is nothing to recover.
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "charla listening");
        Ok(Self {
            listener,
            registry: Arc::new(Registry::new()),
            config: Arc::new(config),
        })
    }

    /// The actual bound address (useful when binding port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle to the session registry.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Accept loop. Each connection gets its own task; the loop never
    /// waits on a spawned handler. Accept errors are logged and the
    /// loop continues; only the shutdown signal ends it.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> io::Result<()> {
        let broadcaster = Broadcaster::new(Arc::clone(&self.registry));

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, addr)) => {
                        info!(%addr, "new connection");
                        let registry = Arc::clone(&self.registry);
                        let broadcaster = broadcaster.clone();
                        let config = Arc::clone(&self.config);
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                run_session(socket, addr, registry, broadcaster, config, shutdown)
                                    .await
                            {
                                warn!(%addr, "session error: {e}");
                            }
                            info!(%addr, "disconnected");
                        });
                    }
                    Err(e) => warn!("accept error: {e}"),
                },

                _ = shutdown.changed() => {
                    info!("shutdown signal received, closing listener");
                    break;
                }
            }
        }

        // Dropping the listener here closes the socket; session tasks
        // observe the same shutdown signal and close their transports.
        Ok(())
    }
}

/// Bind and run with ctrl-c wired up as the shutdown signal.
pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = Server::bind(config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    server.run(shutdown_rx).await?;
    Ok(())
}
