//! Process-level smoke test for the `streamspaced` binary. The HTTP API
//! has no endpoint that seeds organizations, users, templates, or agents
//! (those only ever arrive via `Register` or out-of-band provisioning), so
//! this only exercises what's reachable with no state at all: the process
//! starts, binds, and answers `GET /healthz`. Deeper scenarios live in
//! `crates/control-plane/tests/`, against the Lifecycle Manager directly.

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("OS should hand out an ephemeral port")
        .local_addr()
        .expect("bound listener has a local address")
        .port()
}

/// `streamspaced` lives in a different workspace member than this test, so
/// `CARGO_BIN_EXE_streamspaced` (only set for bins of the *current*
/// package) isn't available here. Every workspace binary lands in the same
/// `target/<profile>/` directory as this test binary's own `deps/` parent,
/// so resolve it relative to `current_exe` instead.
fn streamspaced_path() -> PathBuf {
    let mut path = std::env::current_exe().expect("test binary has a path");
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push(if cfg!(windows) { "streamspaced.exe" } else { "streamspaced" });
    path
}

#[tokio::test]
async fn healthz_responds_ok_once_the_process_is_up() {
    let port = free_port();
    let bind_addr = format!("127.0.0.1:{port}");

    let mut child = Command::new(streamspaced_path())
        .env("JWT_SECRET", "test-jwt-secret-at-least-32-bytes-long")
        .env("AGENT_SHARED_SECRET", "test-agent-shared-secret")
        .env("BIND_ADDR", &bind_addr)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn streamspaced — build the workspace before running this test");

    let url = format!("http://{bind_addr}/healthz");
    let mut last_err = None;
    let mut body = None;
    for _ in 0..50 {
        match reqwest::get(&url).await {
            Ok(response) if response.status().is_success() => {
                body = Some(response.json::<serde_json::Value>().await.expect("json body"));
                break;
            }
            Ok(response) => last_err = Some(format!("unexpected status {}", response.status())),
            Err(err) => last_err = Some(err.to_string()),
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let _ = child.kill();
    let _ = child.wait();

    let body = body.unwrap_or_else(|| panic!("server never became healthy: {last_err:?}"));
    similar_asserts::assert_eq!(body, serde_json::json!({"status": "ok"}));
}
