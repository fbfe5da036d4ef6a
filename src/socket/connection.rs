//! Per-connection handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditLogger};
use crate::config::Settings;
use crate::error::{DaemonError, ProtocolErrorKind};
use crate::protocol::{Framing, Request, Response};
use crate::routes::Router;

/// Serve requests on one client connection until it closes.
pub async fn handle_connection(
    stream: UnixStream,
    settings: Arc<Settings>,
    router: Arc<Router>,
    audit_logger: Option<Arc<AuditLogger>>,
) -> Result<(), DaemonError> {
    let framing = Framing::new(
        settings.limits.max_message_size,
        Duration::from_secs(settings.limits.socket_timeout_seconds),
    );
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let result = process_request(
            &mut reader,
            &mut writer,
            &framing,
            &router,
            audit_logger.as_ref(),
        )
        .await;

        match result {
            Ok(()) => continue,
            Err(DaemonError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            }) => {
                debug!("Client disconnected");
                return Ok(());
            }
            Err(DaemonError::Protocol {
                kind: ProtocolErrorKind::ConnectionTimeout,
            }) => {
                warn!("Connection timed out");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

/// Read, route and answer a single request.
async fn process_request<R, W>(
    reader: &mut R,
    writer: &mut W,
    framing: &Framing,
    router: &Arc<Router>,
    audit_logger: Option<&Arc<AuditLogger>>,
) -> Result<(), DaemonError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let msg = match framing.read(reader).await {
        Ok(msg) => msg,
        Err(
            e @ DaemonError::Protocol {
                kind: ProtocolErrorKind::MessageTooLarge { .. },
            },
        ) => {
            // The payload was never consumed, so the stream cannot be resynced.
            warn!(error = %e, "Rejecting oversized request");
            let response = Response::from_error(Uuid::new_v4(), &e);
            framing.write(writer, &serde_json::to_vec(&response)?).await?;
            return Err(DaemonError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            });
        }
        Err(e) => return Err(e),
    };

    let request_id = Uuid::new_v4();
    let start_time = Instant::now();

    let request: Request = match serde_json::from_slice(&msg) {
        Ok(request) => request,
        Err(e) => {
            let err = DaemonError::Protocol {
                kind: ProtocolErrorKind::InvalidMessageFormat {
                    message: format!("Invalid JSON: {}", e),
                },
            };
            warn!(request_id = %request_id, error = %err, "Malformed request");
            let response = Response::from_error(request_id, &err);
            return framing.write(writer, &serde_json::to_vec(&response)?).await;
        }
    };

    info!(
        request_id = %request_id,
        method = %request.method,
        path = %request.path,
        "Received request"
    );

    // Secret resolution may hit the filesystem.
    let dispatch_router = Arc::clone(router);
    let dispatch_request = request.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        dispatch_router.dispatch(request_id, &dispatch_request)
    })
    .await;

    let duration_ms = start_time.elapsed().as_millis() as u64;

    let (response, entry) = match outcome {
        Ok(Ok(data)) => {
            info!(
                request_id = %request_id,
                path = %request.path,
                duration_ms,
                "Request served"
            );
            (
                Response::success_with_id(request_id, data),
                AuditEntry::accepted(request_id, &request.method, &request.path, duration_ms),
            )
        }
        Ok(Err(e)) => {
            log_rejection(request_id, &request, &e);
            (
                Response::from_error(request_id, &e),
                AuditEntry::rejected(
                    request_id,
                    &request.method,
                    &request.path,
                    e.code(),
                    e.to_string(),
                    duration_ms,
                ),
            )
        }
        Err(join_err) => {
            error!(
                request_id = %request_id,
                path = %request.path,
                error = %join_err,
                "Request handler panicked"
            );
            let e = DaemonError::Socket {
                message: "Request handler failed".to_string(),
            };
            (
                Response::from_error(request_id, &e),
                AuditEntry::rejected(
                    request_id,
                    &request.method,
                    &request.path,
                    e.code(),
                    e.to_string(),
                    duration_ms,
                ),
            )
        }
    };

    if let Some(logger) = audit_logger {
        if let Err(e) = logger.log(&entry) {
            error!(error = %e, "Failed to write audit log entry");
        }
    }

    framing.write(writer, &serde_json::to_vec(&response)?).await
}

fn log_rejection(request_id: Uuid, request: &Request, err: &DaemonError) {
    match err {
        DaemonError::Auth { .. } if err.is_caller_recoverable() => warn!(
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
            code = err.code(),
            "Request authentication failed"
        ),
        _ if err.is_caller_recoverable() => debug!(
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
            code = err.code(),
            "Request rejected"
        ),
        _ => error!(
            request_id = %request_id,
            path = %request.path,
            error = %err,
            "Request failed"
        ),
    }
}
