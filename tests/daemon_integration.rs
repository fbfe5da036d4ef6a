//! Integration tests for the auditor gate.
//!
//! These tests bind a real listener on a temporary Unix socket and talk to it
//! the way a client would: handshake, sign, send.

use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ring::hmac;
use serde_json::{json, Value};
use tempfile::TempDir;

use auditor_gate::auth::{InMemoryNonceStore, RequestAuthenticator};
use auditor_gate::config::{
    AuditConfig, LimitsConfig, LoggingConfig, SecurityConfig, Settings, SocketConfig,
};
use auditor_gate::socket::SocketListener;

const SECRET_HEX: &str = "6f1c8a3e9b2d4f70a5c6e8d1b3f5a7c9e0d2b4f6a8c1e3d5f7b9a0c2e4d6f8a1";

/// Gate instance bound to a temporary socket.
struct TestGate {
    socket_path: PathBuf,
    audit_path: PathBuf,
    _temp_dir: TempDir,
    shutdown: Arc<tokio::sync::Notify>,
}

impl TestGate {
    /// Start a gate whose secret lives in a 0600 file.
    async fn start() -> Self {
        Self::start_with(true).await
    }

    /// Start a gate with no signing secret configured.
    async fn start_without_secret() -> Self {
        Self::start_with(false).await
    }

    async fn start_with(with_secret: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let socket_path = temp_dir.path().join("gate.sock");
        let audit_path = temp_dir.path().join("audit.log");

        let security = if with_secret {
            let secret_path = temp_dir.path().join("hmac.key");
            std::fs::write(&secret_path, format!("{}\n", SECRET_HEX))
                .expect("Failed to write HMAC secret");
            std::fs::set_permissions(&secret_path, std::fs::Permissions::from_mode(0o600))
                .expect("Failed to set HMAC secret permissions");
            SecurityConfig {
                hmac_secret_path: Some(secret_path),
                nonce_ttl_seconds: 300,
                ..SecurityConfig::default()
            }
        } else {
            SecurityConfig {
                hmac_secret_env_var: "AUDITOR_GATE_INTEGRATION_UNSET_SECRET".to_string(),
                hmac_secret_path: None,
                nonce_ttl_seconds: 300,
            }
        };

        let settings = Settings {
            socket: SocketConfig {
                path: socket_path.clone(),
                permissions: "0600".to_string(),
            },
            security,
            logging: LoggingConfig::default(),
            limits: LimitsConfig {
                max_message_size: 64 * 1024,
                max_concurrent_requests: 16,
                socket_timeout_seconds: 10,
            },
            audit: AuditConfig {
                enabled: true,
                log_path: audit_path.clone(),
            },
        };

        let authenticator = Arc::new(RequestAuthenticator::new(
            settings.security.secret_provider(),
            Arc::new(InMemoryNonceStore::new()),
            settings.security.nonce_ttl_seconds,
        ));

        let listener = SocketListener::bind(Arc::new(settings), authenticator)
            .await
            .expect("Failed to bind socket");

        let shutdown = Arc::new(tokio::sync::Notify::new());
        let shutdown_for_run = Arc::clone(&shutdown);

        tokio::spawn(async move {
            if let Err(e) = listener.run(shutdown_for_run).await {
                eprintln!("Listener error: {}", e);
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            socket_path,
            audit_path,
            _temp_dir: temp_dir,
            shutdown,
        }
    }

    /// Send one framed request on a fresh connection.
    fn send(&self, request: &Value) -> Value {
        let mut stream = UnixStream::connect(&self.socket_path).expect("Failed to connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .expect("Failed to set read timeout");

        let bytes = serde_json::to_vec(request).expect("Failed to serialize");
        stream
            .write_all(&(bytes.len() as u32).to_be_bytes())
            .expect("Failed to write length");
        stream.write_all(&bytes).expect("Failed to write request");
        stream.flush().expect("Failed to flush");

        let mut length_bytes = [0u8; 4];
        stream
            .read_exact(&mut length_bytes)
            .expect("Failed to read response length");
        let mut response = vec![0u8; u32::from_be_bytes(length_bytes) as usize];
        stream.read_exact(&mut response).expect("Failed to read response");

        serde_json::from_slice(&response).expect("Failed to parse response")
    }

    fn handshake(&self) -> Value {
        self.send(&json!({"method": "POST", "path": "/auth/handshake"}))
    }

    fn fresh_nonce(&self) -> String {
        let response = self.handshake();
        assert_eq!(response["success"], true, "handshake failed: {}", response);
        response["data"]["nonce"].as_str().unwrap().to_string()
    }

    fn signed(&self, method: &str, path: &str, body: &str, nonce: &str, signature: &str) -> Value {
        self.send(&json!({
            "method": method,
            "path": path,
            "headers": {"X-Nonce": nonce, "X-Signature": signature},
            "body": body,
        }))
    }

    fn audit_lines(&self) -> Vec<Value> {
        std::fs::read_to_string(&self.audit_path)
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    async fn stop(self) {
        self.shutdown.notify_waiters();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn sign(nonce: &str, path: &str, body: &str) -> String {
    let secret = hex::decode(SECRET_HEX).unwrap();
    let key = hmac::Key::new(hmac::HMAC_SHA256, &secret);
    let message = format!("{}{}{}", nonce, path, body);
    hex::encode(hmac::sign(&key, message.as_bytes()).as_ref())
}

fn error_code(response: &Value) -> &str {
    response["error"]["code"].as_str().unwrap_or_default()
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_socket_created_with_permissions() {
    let gate = TestGate::start().await;
    let mode = std::fs::metadata(&gate.socket_path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    gate.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handshake_issues_nonce() {
    let gate = TestGate::start().await;

    let response = gate.handshake();
    assert_eq!(response["success"], true);
    assert_eq!(response["status"], 200);

    let data = &response["data"];
    let nonce = data["nonce"].as_str().unwrap();
    assert_eq!(nonce.len(), 64);
    assert!(nonce.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(data["nonce_ttl_seconds"], 300);
    assert!(data["key_id"].as_str().unwrap().ends_with("hmac.key"));

    gate.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handshake_without_secret_issues_nothing() {
    let gate = TestGate::start_without_secret().await;

    let response = gate.handshake();
    assert_eq!(response["success"], false);
    assert_eq!(response["status"], 500);
    assert_eq!(error_code(&response), "CONFIGURATION_ERROR");
    assert!(response.get("data").is_none());

    gate.stop().await;
}

// ============================================================================
// Signed requests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_signed_health_request() {
    let gate = TestGate::start().await;

    let nonce = gate.fresh_nonce();
    let response = gate.signed("GET", "/health", "", &nonce, &sign(&nonce, "/health", ""));
    assert_eq!(response["success"], true, "unexpected: {}", response);
    assert_eq!(response["data"]["status"], "ok");
    assert_eq!(response["data"]["nonce_cache_entries"], 1);

    gate.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_replayed_request_rejected() {
    let gate = TestGate::start().await;

    let nonce = gate.fresh_nonce();
    let signature = sign(&nonce, "/health", "");

    let first = gate.signed("GET", "/health", "", &nonce, &signature);
    assert_eq!(first["success"], true);

    let replay = gate.signed("GET", "/health", "", &nonce, &signature);
    assert_eq!(replay["status"], 409);
    assert_eq!(error_code(&replay), "REPLAYED_NONCE");
    assert_eq!(
        replay["error"]["message"],
        "Nonce already used. Reauthenticate to obtain a new session nonce."
    );

    gate.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tampered_request_does_not_burn_nonce() {
    let gate = TestGate::start().await;

    let nonce = gate.fresh_nonce();
    let signature = sign(&nonce, "/health", "");

    let forged = gate.signed("GET", "/health", "{\"x\":1}", &nonce, &signature);
    assert_eq!(forged["status"], 401);
    assert_eq!(error_code(&forged), "INVALID_SIGNATURE");

    let genuine = gate.signed("GET", "/health", "", &nonce, &signature);
    assert_eq!(genuine["success"], true);

    gate.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_credentials() {
    let gate = TestGate::start().await;

    let no_nonce = gate.send(&json!({"method": "GET", "path": "/health"}));
    assert_eq!(no_nonce["status"], 400);
    assert_eq!(error_code(&no_nonce), "MISSING_NONCE");

    let nonce = gate.fresh_nonce();
    let no_signature = gate.send(&json!({
        "method": "GET",
        "path": "/health",
        "headers": {"x-nonce": nonce},
    }));
    assert_eq!(no_signature["status"], 400);
    assert_eq!(error_code(&no_signature), "MISSING_SIGNATURE");

    gate.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_signature_bound_to_path() {
    let gate = TestGate::start().await;

    let nonce = gate.fresh_nonce();
    // Signed for another path, so it must not verify for /health.
    let response = gate.signed("GET", "/health", "", &nonce, &sign(&nonce, "/healthz", ""));
    assert_eq!(error_code(&response), "INVALID_SIGNATURE");

    gate.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_conflicting_nonce_spellings_rejected() {
    let gate = TestGate::start().await;

    let nonce = gate.fresh_nonce();
    let signature = sign(&nonce, "/health", "");
    let request = json!({
        "method": "GET",
        "path": "/health",
        "headers": {"X-Nonce": nonce, "x-nonce": "decoy", "X-Signature": signature},
    });

    for _ in 0..8 {
        let response = gate.send(&request);
        assert_eq!(response["status"], 400);
        assert_eq!(error_code(&response), "INVALID_REQUEST");
    }

    // The nonce was never consumed.
    let genuine = gate.signed("GET", "/health", "", &nonce, &signature);
    assert_eq!(genuine["success"], true);

    gate.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_uppercase_signature_rejected() {
    let gate = TestGate::start().await;

    let nonce = gate.fresh_nonce();
    let signature = sign(&nonce, "/health", "").to_uppercase();
    let response = gate.signed("GET", "/health", "", &nonce, &signature);
    assert_eq!(error_code(&response), "INVALID_SIGNATURE");

    gate.stop().await;
}

// ============================================================================
// Routing and framing
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_route_and_wrong_method() {
    let gate = TestGate::start().await;

    let missing = gate.send(&json!({"method": "GET", "path": "/nope"}));
    assert_eq!(missing["status"], 404);
    assert_eq!(error_code(&missing), "NOT_FOUND");

    let wrong_method = gate.send(&json!({"method": "GET", "path": "/auth/handshake"}));
    assert_eq!(wrong_method["status"], 405);
    assert_eq!(error_code(&wrong_method), "METHOD_NOT_ALLOWED");

    gate.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_request() {
    let gate = TestGate::start().await;

    let response = gate.send(&json!({"path": "/health"}));
    assert_eq!(response["status"], 400);
    assert_eq!(error_code(&response), "INVALID_REQUEST");

    gate.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_multiple_requests_on_one_connection() {
    let gate = TestGate::start().await;

    let mut stream = UnixStream::connect(&gate.socket_path).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();

    for _ in 0..3 {
        let bytes = serde_json::to_vec(&json!({"method": "POST", "path": "/auth/handshake"})).unwrap();
        stream.write_all(&(bytes.len() as u32).to_be_bytes()).unwrap();
        stream.write_all(&bytes).unwrap();

        let mut length_bytes = [0u8; 4];
        stream.read_exact(&mut length_bytes).unwrap();
        let mut response = vec![0u8; u32::from_be_bytes(length_bytes) as usize];
        stream.read_exact(&mut response).unwrap();

        let response: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(response["success"], true);
    }

    gate.stop().await;
}

// ============================================================================
// Audit trail
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_audit_log_records_outcomes() {
    let gate = TestGate::start().await;

    let nonce = gate.fresh_nonce();
    let signature = sign(&nonce, "/health", "");
    gate.signed("GET", "/health", "", &nonce, &signature);
    gate.signed("GET", "/health", "", &nonce, &signature);

    let lines = gate.audit_lines();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["path"], "/auth/handshake");
    assert_eq!(lines[0]["result"]["status"], "accepted");
    assert_eq!(lines[1]["result"]["status"], "accepted");
    assert_eq!(lines[2]["result"]["status"], "rejected");
    assert_eq!(lines[2]["result"]["error_code"], "REPLAYED_NONCE");

    // Credentials never reach the audit trail.
    let raw = std::fs::read_to_string(&gate.audit_path).unwrap();
    assert!(!raw.contains(&nonce));
    assert!(!raw.contains(&signature));

    gate.stop().await;
}
