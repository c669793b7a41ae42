//! ChatServer: accepts WebSocket connections and runs one lifecycle task per
//! connection until shutdown.

use chatterbox_core::{ChatError, ChatResult};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthVerifier, JwtVerifier, RateLimiter};
use crate::config::ServerConfig;
use crate::connection;
use crate::groups::{GroupDirectory, GroupResolver};
use crate::relay::Relay;
use crate::transport::websocket;

/// How long connection tasks get to close cleanly after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Interval between rate limiter sweeps.
const LIMITER_GC_INTERVAL: Duration = Duration::from_secs(60);

/// State shared by every connection task.
pub struct ServerState {
    pub relay: Relay,
    pub verifier: Arc<dyn AuthVerifier>,
    pub groups: Arc<dyn GroupResolver>,
    pub limiter: Mutex<RateLimiter>,
    pub outbound_buffer: usize,
    pub require_group_membership: bool,
}

/// Triggers a graceful shutdown of a running server.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        // No receivers just means nothing is running yet.
        let _ = self.tx.send(());
    }
}

/// The relay server.
pub struct ChatServer {
    config: ServerConfig,
    state: Arc<ServerState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ChatServer {
    /// Build a server with the JWT verifier and the configured group table.
    pub fn new(config: ServerConfig) -> Self {
        let verifier = Arc::new(JwtVerifier::new(config.secret.clone(), config.leeway_secs));
        let groups = Arc::new(GroupDirectory::from_map(&config.groups));
        Self::with_collaborators(config, verifier, groups)
    }

    /// Build a server with caller-supplied credential and group collaborators.
    pub fn with_collaborators(
        config: ServerConfig,
        verifier: Arc<dyn AuthVerifier>,
        groups: Arc<dyn GroupResolver>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let state = Arc::new(ServerState {
            relay: Relay::new(),
            verifier,
            groups,
            limiter: Mutex::new(RateLimiter::new(config.max_attempts, config.window_secs)),
            outbound_buffer: config.outbound_buffer.max(1),
            require_group_membership: config.require_group_membership,
        });
        Self {
            config,
            state,
            shutdown_tx,
        }
    }

    pub fn relay(&self) -> &Relay {
        &self.state.relay
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> ChatResult<()> {
        let bind_addr = self.config.bind_addr();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| ChatError::Transport(format!("bind {bind_addr} failed: {e}")))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> ChatResult<()> {
        let local_addr: SocketAddr = listener.local_addr()?;
        info!(
            addr = %local_addr,
            outbound_buffer = self.state.outbound_buffer,
            require_group_membership = self.state.require_group_membership,
            "chatterbox relay listening"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let (mut conn_rx, accept_task) = websocket::start_listener(listener);
        let mut connections = JoinSet::new();
        let mut limiter_gc = tokio::time::interval(LIMITER_GC_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("shutdown requested");
                    break;
                }

                conn = conn_rx.recv() => {
                    let Some(conn) = conn else {
                        warn!("listener stopped");
                        break;
                    };
                    let state = self.state.clone();
                    let conn_shutdown = self.shutdown_tx.subscribe();
                    connections.spawn(connection::handle_connection(state, conn, conn_shutdown));
                }

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!(error = %e, "connection task panicked");
                        }
                    }
                }

                _ = limiter_gc.tick() => {
                    let tracked = {
                        let mut limiter = self.state.limiter.lock();
                        limiter.gc();
                        limiter.tracked()
                    };
                    debug!(tracked, "rate limiter swept");
                }
            }
        }

        accept_task.abort();
        drop(conn_rx);

        let open = connections.len();
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(remaining = connections.len(), "aborting connections after grace period");
            connections.shutdown().await;
        }

        info!(connections = open, "chatterbox relay stopped");
        Ok(())
    }
}
