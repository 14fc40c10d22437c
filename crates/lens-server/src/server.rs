//! WebSocket server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::service::LogService;
use crate::session::run_session;

/// Decrements the live connection count when a connection task ends.
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Log service server accepting one RPC call per WebSocket connection.
#[derive(Debug)]
pub struct LogServer {
    config: Arc<ServerConfig>,
    service: Arc<LogService>,
    active: Arc<AtomicUsize>,
}

impl LogServer {
    /// Create a server over a fresh in-memory store.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let service = LogService::from_config(&config);
        Self::with_service(config, service)
    }

    /// Create a server around an existing service.
    #[must_use]
    pub fn with_service(config: ServerConfig, service: LogService) -> Self {
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the service handling calls.
    #[must_use]
    pub fn service(&self) -> &Arc<LogService> {
        &self.service
    }

    /// Number of connections currently being served.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Bind the configured address and serve until the process ends.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails.
    pub async fn serve(&self) -> ServerResult<()> {
        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(addr, e))?;
        self.serve_listener(listener, std::future::pending()).await
    }

    /// Serve connections from a bound listener until `shutdown` resolves.
    ///
    /// Connections already being served keep running after shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener's local address cannot be read.
    pub async fn serve_listener<F>(&self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Log server listening");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => self.handle_connection(stream, peer_addr),
                        Err(e) => warn!(error = %e, "Failed to accept connection"),
                    }
                }
                () = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!("Log server shutting down");
        Ok(())
    }

    /// Handle a new TCP connection.
    fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) {
        let current = self.active.fetch_add(1, Ordering::AcqRel);
        let guard = ConnectionGuard(self.active.clone());

        if current >= self.config.max_connections {
            warn!(
                peer = %peer_addr,
                current,
                max = self.config.max_connections,
                "Connection rejected: max connections reached"
            );
            return;
        }

        debug!(peer = %peer_addr, "New connection");
        let service = self.service.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!(peer = %peer_addr, error = %e, "WebSocket handshake failed");
                    return;
                }
            };

            match run_session(ws_stream, service, config).await {
                Ok(()) => debug!(peer = %peer_addr, "Connection closed normally"),
                Err(e) => debug!(peer = %peer_addr, error = %e, "Connection ended with error"),
            }
        });
    }
}
