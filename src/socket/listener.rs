//! Unix socket listener.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::UnixListener;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, warn};

use crate::audit::AuditLogger;
use crate::auth::RequestAuthenticator;
use crate::config::Settings;
use crate::error::{DaemonError, ProtocolErrorKind};
use crate::routes::Router;

use super::handle_connection;

/// Connection counters.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    pub connections_total: AtomicU64,
    pub connections_failed: AtomicU64,
    pub active_connections: AtomicUsize,
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    fn closed(&self, success: bool) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.connections_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.connections_total.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.connections_failed.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }
}

/// Unix socket server in front of the router.
pub struct SocketListener {
    listener: UnixListener,
    settings: Arc<Settings>,
    router: Arc<Router>,
    audit_logger: Option<Arc<AuditLogger>>,
    metrics: Arc<ConnectionMetrics>,
    connection_semaphore: Arc<Semaphore>,
}

impl SocketListener {
    /// Bind the socket described by `settings` and prepare request routing.
    pub async fn bind(
        settings: Arc<Settings>,
        authenticator: Arc<RequestAuthenticator>,
    ) -> Result<Self, DaemonError> {
        let socket_path = &settings.socket.path;

        // symlink_metadata so a planted symlink is never followed and removed.
        if let Ok(metadata) = std::fs::symlink_metadata(socket_path) {
            if metadata.file_type().is_symlink() {
                return Err(DaemonError::Socket {
                    message: format!(
                        "Socket path {} is a symlink, refusing to remove it",
                        socket_path.display()
                    ),
                });
            }

            std::fs::remove_file(socket_path).map_err(|e| DaemonError::Socket {
                message: format!(
                    "Failed to remove stale socket {}: {}",
                    socket_path.display(),
                    e
                ),
            })?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DaemonError::Socket {
                message: format!(
                    "Failed to create socket directory {}: {}",
                    parent.display(),
                    e
                ),
            })?;
        }

        let listener = UnixListener::bind(socket_path).map_err(|e| DaemonError::Socket {
            message: format!("Failed to bind to socket {}: {}", socket_path.display(), e),
        })?;

        Self::set_socket_permissions(socket_path, &settings.socket.permissions)?;

        let connection_semaphore = Arc::new(Semaphore::new(settings.limits.max_concurrent_requests));
        info!(
            max_connections = settings.limits.max_concurrent_requests,
            "Connection limiting enabled"
        );

        let router = Arc::new(Router::new(authenticator));
        let audit_logger = Self::open_audit_log(&settings);

        info!(path = %socket_path.display(), "Socket listener bound");

        Ok(Self {
            listener,
            settings,
            router,
            audit_logger,
            metrics: Arc::new(ConnectionMetrics::new()),
            connection_semaphore,
        })
    }

    fn open_audit_log(settings: &Settings) -> Option<Arc<AuditLogger>> {
        if !settings.audit.enabled {
            info!("Audit logging disabled");
            return None;
        }

        match AuditLogger::new(&settings.audit.log_path) {
            Ok(logger) => {
                info!(path = %settings.audit.log_path.display(), "Audit logging enabled");
                Some(Arc::new(logger))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    path = %settings.audit.log_path.display(),
                    "Failed to open audit log, audit logging disabled"
                );
                None
            }
        }
    }

    pub fn metrics(&self) -> Arc<ConnectionMetrics> {
        Arc::clone(&self.metrics)
    }

    fn set_socket_permissions(path: &Path, permissions_str: &str) -> Result<(), DaemonError> {
        let mode = u32::from_str_radix(permissions_str, 8).map_err(|e| DaemonError::Socket {
            message: format!("Invalid socket permissions '{}': {}", permissions_str, e),
        })?;

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
            DaemonError::Socket {
                message: format!(
                    "Failed to set socket permissions on {}: {}",
                    path.display(),
                    e
                ),
            }
        })
    }

    /// Accept connections until `shutdown` is notified.
    ///
    /// Connections already being served keep running; see [`wait_for_drain`].
    ///
    /// [`wait_for_drain`]: Self::wait_for_drain
    pub async fn run(&self, shutdown: Arc<Notify>) -> Result<(), DaemonError> {
        info!("Socket listener running, waiting for connections...");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let stream = match result {
                        Ok((stream, _addr)) => stream,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    let permit = match Arc::clone(&self.connection_semaphore).try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            warn!(
                                max = self.settings.limits.max_concurrent_requests,
                                "Connection limit reached, rejecting connection"
                            );
                            continue;
                        }
                    };

                    let settings = Arc::clone(&self.settings);
                    let router = Arc::clone(&self.router);
                    let audit_logger = self.audit_logger.clone();
                    let metrics = Arc::clone(&self.metrics);

                    metrics.opened();
                    debug!(active = metrics.active(), "New connection accepted");

                    tokio::spawn(async move {
                        let _permit = permit;
                        let success = match handle_connection(stream, settings, router, audit_logger).await {
                            Ok(()) => true,
                            Err(DaemonError::Protocol { kind: ProtocolErrorKind::ConnectionClosed }) => true,
                            Err(e) => {
                                error!(error = %e, "Connection handler error");
                                false
                            }
                        };

                        metrics.closed(success);
                        debug!(active = metrics.active(), success, "Connection closed");
                    });
                }
                _ = shutdown.notified() => {
                    info!("Shutdown signal received, stopping listener");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Wait until no connection is being served.
    pub async fn wait_for_drain(&self) {
        let poll_interval = std::time::Duration::from_millis(100);

        while self.metrics.active() > 0 {
            debug!(active = self.metrics.active(), "Waiting for connections to drain");
            tokio::time::sleep(poll_interval).await;
        }

        info!("All connections drained");
    }
}
