//! # Broker
//!
//! Owns the listening socket, bounds concurrent connections, and wires each
//! accepted socket to a [`ConnectionHandler`] sharing one credential store
//! and one session registry.
//!
//! Concurrency is bounded by a semaphore sized to `max_connections`: when no
//! permit is available the new socket is dropped on the spot rather than
//! queued, so a connection flood cannot build unbounded state. Shutdown is
//! graceful: the accept loop stops, in-flight handlers drain to completion,
//! and a hard deadline forces exit if they do not.

use crate::auth::CredentialStore;
use crate::config::BrokerConfig;
use crate::error::Result;
use crate::session::SessionRegistry;
use crate::storage::Storage;
use crate::transport::connection::ConnectionHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

/// The broker service. Cheap to share; all state lives behind `Arc`s.
pub struct Broker {
    config: BrokerConfig,
    credentials: Arc<CredentialStore>,
    sessions: Arc<SessionRegistry>,
}

impl Broker {
    /// Validate configuration, reload persisted state, and wire the shared
    /// stores.
    pub async fn open(config: BrokerConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        config.validate_strict()?;

        let credentials =
            Arc::new(CredentialStore::open(&config.auth, Arc::clone(&storage)).await?);
        let sessions = Arc::new(SessionRegistry::open(&config.session, storage).await?);

        info!(address = %config.server.address, "Broker initialized");

        Ok(Self {
            config,
            credentials,
            sessions,
        })
    }

    /// Shared credential store (user provisioning happens through this).
    pub fn credentials(&self) -> Arc<CredentialStore> {
        Arc::clone(&self.credentials)
    }

    /// Shared session registry.
    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.sessions)
    }

    /// Bind the configured address and serve until CTRL+C.
    pub async fn run(&self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });

        let listener = TcpListener::bind(&self.config.server.address).await?;
        info!(address = %self.config.server.address, "Listening");

        self.serve(listener, shutdown_rx).await
    }

    /// Serve an already-bound listener until the shutdown channel fires.
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        let max_connections = self.config.server.max_connections;
        let limiter = Arc::new(Semaphore::new(max_connections));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down broker. Waiting for connections to close...");
                    self.drain(&limiter, max_connections).await;
                    return Ok(());
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            let Ok(permit) = Arc::clone(&limiter).try_acquire_owned() else {
                                warn!(peer = %peer, "Connection refused: concurrency ceiling reached");
                                drop(stream);
                                continue;
                            };

                            let handler = ConnectionHandler::new(
                                stream,
                                peer,
                                self.credentials(),
                                self.sessions(),
                                &self.config,
                            );

                            tokio::spawn(async move {
                                handler.run().await;
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                        }
                    }
                }
            }
        }
    }

    /// Wait for in-flight handlers to finish, up to the shutdown timeout.
    async fn drain(&self, limiter: &Semaphore, max_connections: usize) {
        let deadline = tokio::time::sleep(self.config.server.shutdown_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    warn!("Shutdown timeout reached, forcing exit");
                    return;
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    let active = max_connections - limiter.available_permits();
                    if active == 0 {
                        info!("All connections closed, shutting down");
                        return;
                    }
                    debug!(connections = active, "Waiting for connections to close");
                }
            }
        }
    }
}
