//! Integration tests against a real git binary.
//!
//! Each test skips gracefully when `git` is not installed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gitgate_bridge::{BridgeError, ExitOutcome, ProcessBridge, SpawnMode};
use gitgate_git::TransportService;
use tokio::io::AsyncReadExt;

fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .is_ok_and(|ok| ok)
}

fn init_bare_repo(root: &Path) -> PathBuf {
    let dir = root.join("alice").join("demo.git");
    std::fs::create_dir_all(&dir).unwrap();
    let status = std::process::Command::new("git")
        .arg("init")
        .arg("--bare")
        .arg(&dir)
        .status()
        .unwrap();
    assert!(status.success());
    dir
}

#[tokio::test]
async fn advertise_only_streams_refs_and_exits() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }

    let tmp = tempfile::tempdir().unwrap();
    let repo = init_bare_repo(tmp.path());

    let bridge = ProcessBridge::new();
    let mut handle = bridge
        .spawn(TransportService::UploadPack, &repo, SpawnMode::AdvertiseOnly)
        .unwrap();

    // Advertise-refs needs no stdin feed.
    drop(handle.take_stdin());

    let mut stdout = handle.take_stdout().unwrap();
    let mut out = Vec::new();
    stdout.read_to_end(&mut out).await.unwrap();

    let outcome = handle.wait().await.unwrap();
    assert!(outcome.success(), "unexpected outcome: {outcome:?}");
    // Even an empty repo advertises capabilities in pkt-line framing.
    assert!(!out.is_empty());
    assert!(out.ends_with(b"0000"));
}

#[tokio::test]
async fn advertisement_is_idempotent() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }

    let tmp = tempfile::tempdir().unwrap();
    let repo = init_bare_repo(tmp.path());
    let bridge = ProcessBridge::new();

    let mut bodies = Vec::new();
    for _ in 0..2 {
        let mut handle = bridge
            .spawn(TransportService::UploadPack, &repo, SpawnMode::AdvertiseOnly)
            .unwrap();
        drop(handle.take_stdin());
        let mut stdout = handle.take_stdout().unwrap();
        let mut out = Vec::new();
        stdout.read_to_end(&mut out).await.unwrap();
        handle.wait().await.unwrap();
        bodies.push(out);
    }
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn terminate_kills_a_blocked_transport() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }

    let tmp = tempfile::tempdir().unwrap();
    let repo = init_bare_repo(tmp.path());

    let bridge = ProcessBridge::new();
    // Stateless-RPC upload-pack blocks reading stdin until it gets input.
    let mut handle = bridge
        .spawn(TransportService::UploadPack, &repo, SpawnMode::StatelessRpc)
        .unwrap();
    let _stdin = handle.take_stdin().unwrap();

    handle.terminate();
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("terminated transport must be reaped promptly")
        .unwrap();
    assert_eq!(outcome, ExitOutcome::Killed);
}

#[tokio::test]
async fn spawn_failure_reports_binary_error() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("alice").join("demo.git");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("HEAD"), "ref: refs/heads/main\n").unwrap();

    let bridge = ProcessBridge::with_binary("/nonexistent/git-binary");
    let err = bridge
        .spawn(TransportService::ReceivePack, &dir, SpawnMode::StatelessRpc)
        .unwrap_err();
    assert!(matches!(err, BridgeError::SpawnFailed(_)));
}

#[tokio::test]
async fn list_refs_returns_plain_text() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }

    let tmp = tempfile::tempdir().unwrap();
    let repo = init_bare_repo(tmp.path());
    let bridge = ProcessBridge::new();

    let listing = bridge.list_refs(&repo).await.unwrap();
    // Fresh bare repo has no refs; the command still succeeds.
    assert!(listing.is_empty() || listing.contains('\t'));
}
