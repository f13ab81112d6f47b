//! Router and smart HTTP request handlers.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures::StreamExt;
use gitgate_bridge::{ProcessBridge, SpawnMode};
use gitgate_git::{service_prelude, TransportService};
use gitgate_repo::{RepoLocator, RouteContext};
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::ChildStderr;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;

use crate::HttpError;

/// Application state shared across handlers.
///
/// Locator and bridge are constructed once at startup and injected here;
/// handlers hold no other state and mutate nothing shared.
#[derive(Clone)]
pub struct AppState {
    /// Repository resolution.
    pub locator: Arc<RepoLocator>,
    /// Transport subprocess factory.
    pub bridge: Arc<ProcessBridge>,
}

/// Query parameters for `info/refs`.
#[derive(Debug, Deserialize)]
struct InfoRefsQuery {
    service: Option<String>,
}

/// Creates the gateway router.
///
/// Both historical URL shapes are routed simultaneously: the two-segment
/// `/owner/repo` form and the `/api/repo` form whose owner comes from the
/// bearer credential.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Git smart HTTP protocol, owner-qualified shape
        .route("/{owner}/{repo}/info/refs", get(info_refs))
        .route("/{owner}/{repo}/git-upload-pack", post(upload_pack))
        .route("/{owner}/{repo}/git-receive-pack", post(receive_pack))
        // API-prefixed shape without an owner segment
        .route("/api/{repo}/info/refs", get(api_info_refs))
        .route("/api/{repo}/git-upload-pack", post(api_upload_pack))
        .route("/api/{repo}/git-receive-pack", post(api_receive_pack))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// `GET /{owner}/{repo}/info/refs?service=...`
async fn info_refs(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<InfoRefsQuery>,
) -> Result<Response, HttpError> {
    let ctx = RouteContext {
        owner: Some(&owner),
        repo: Some(&repo),
        ..Default::default()
    };
    handle_info_refs(&state, &ctx, query.service.as_deref()).await
}

/// `GET /api/{repo}/info/refs?service=...` — owner derived from the bearer
/// token.
async fn api_info_refs(
    State(state): State<AppState>,
    Path(repo): Path<String>,
    Query(query): Query<InfoRefsQuery>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, HttpError> {
    let ctx = RouteContext {
        repo: Some(&repo),
        bearer: bearer_token(&headers),
        path: Some(uri.path()),
        ..Default::default()
    };
    handle_info_refs(&state, &ctx, query.service.as_deref()).await
}

/// `POST /{owner}/{repo}/git-upload-pack`
async fn upload_pack(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    body: Body,
) -> Result<Response, HttpError> {
    let ctx = RouteContext {
        owner: Some(&owner),
        repo: Some(&repo),
        ..Default::default()
    };
    handle_service_rpc(&state, &ctx, TransportService::UploadPack, body).await
}

/// `POST /{owner}/{repo}/git-receive-pack`
async fn receive_pack(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    body: Body,
) -> Result<Response, HttpError> {
    let ctx = RouteContext {
        owner: Some(&owner),
        repo: Some(&repo),
        ..Default::default()
    };
    handle_service_rpc(&state, &ctx, TransportService::ReceivePack, body).await
}

/// `POST /api/{repo}/git-upload-pack`
async fn api_upload_pack(
    State(state): State<AppState>,
    Path(repo): Path<String>,
    headers: HeaderMap,
    uri: Uri,
    body: Body,
) -> Result<Response, HttpError> {
    let ctx = RouteContext {
        repo: Some(&repo),
        bearer: bearer_token(&headers),
        path: Some(uri.path()),
        ..Default::default()
    };
    handle_service_rpc(&state, &ctx, TransportService::UploadPack, body).await
}

/// `POST /api/{repo}/git-receive-pack`
async fn api_receive_pack(
    State(state): State<AppState>,
    Path(repo): Path<String>,
    headers: HeaderMap,
    uri: Uri,
    body: Body,
) -> Result<Response, HttpError> {
    let ctx = RouteContext {
        repo: Some(&repo),
        bearer: bearer_token(&headers),
        path: Some(uri.path()),
        ..Default::default()
    };
    handle_service_rpc(&state, &ctx, TransportService::ReceivePack, body).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Ref advertisement, or a plain ref listing when no smart service was
/// requested.
async fn handle_info_refs(
    state: &AppState,
    ctx: &RouteContext<'_>,
    service_param: Option<&str>,
) -> Result<Response, HttpError> {
    let repo_ref = state.locator.resolve(ctx)?;
    let repo_path = state.locator.locate_existing(&repo_ref)?;

    let service = service_param.and_then(TransportService::from_service_param);
    let Some(service) = service else {
        // Dumb fallback: a direct ref listing, not the advertise-refs path.
        let listing = state.bridge.list_refs(&repo_path).await?;
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from(listing))
            .unwrap());
    };

    let mut handle = state
        .bridge
        .spawn(service, &repo_path, SpawnMode::AdvertiseOnly)?;

    // No stdin feed in advertise mode; close the pipe immediately.
    drop(handle.take_stdin());
    let stdout = handle
        .take_stdout()
        .ok_or_else(|| HttpError::Internal("transport stdout unavailable".into()))?;
    if let Some(stderr) = handle.take_stderr() {
        drain_stderr(stderr, service);
    }

    tokio::spawn(async move {
        match handle.wait().await {
            Ok(outcome) if !outcome.success() => {
                tracing::warn!(service = %service, outcome = ?outcome, "advertise-refs transport failed");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to reap advertise-refs transport"),
        }
    });

    // The pkt-line service prelude goes out before the subprocess's own
    // advertisement, then stdout is streamed verbatim.
    let prelude = service_prelude(service);
    let body_stream = futures::stream::once(async move {
        Ok::<_, std::io::Error>(Bytes::from(prelude))
    })
    .chain(ReaderStream::new(stdout));

    tracing::debug!(repo = %repo_ref, service = %service, "streaming ref advertisement");

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, service.advertisement_content_type())
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body_stream))
        .unwrap())
}

/// Stateless-RPC bridge: request body → child stdin, child stdout → response
/// body, both streamed incrementally.
async fn handle_service_rpc(
    state: &AppState,
    ctx: &RouteContext<'_>,
    service: TransportService,
    body: Body,
) -> Result<Response, HttpError> {
    let repo_ref = state.locator.resolve(ctx)?;
    let repo_path = state.locator.locate_existing(&repo_ref)?;

    let mut handle = state
        .bridge
        .spawn(service, &repo_path, SpawnMode::StatelessRpc)?;

    let mut stdin = handle
        .take_stdin()
        .ok_or_else(|| HttpError::Internal("transport stdin unavailable".into()))?;
    let stdout = handle
        .take_stdout()
        .ok_or_else(|| HttpError::Internal("transport stdout unavailable".into()))?;
    if let Some(stderr) = handle.take_stderr() {
        drain_stderr(stderr, service);
    }

    let (kill_tx, mut kill_rx) = tokio::sync::oneshot::channel::<()>();

    // Reaper: waits for the child, or kills it the moment the client
    // connection is reported gone. A transport blocked on stdin would
    // otherwise hang forever.
    tokio::spawn(async move {
        tokio::select! {
            Ok(()) = &mut kill_rx => {
                handle.terminate();
                let _ = handle.wait().await;
                tracing::warn!(service = %service, "git transport killed after client disconnect");
            }
            res = handle.wait() => match res {
                Ok(outcome) if !outcome.success() => {
                    // Bytes already streamed to the client stay authoritative.
                    tracing::warn!(service = %service, outcome = ?outcome, "git transport finished with error");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "failed to reap git transport"),
            },
        }
    });

    // Stdin pump: client send order is preserved by writing chunks as they
    // arrive. A body error means the client disconnected mid-stream.
    let mut req_stream = body.into_data_stream();
    tokio::spawn(async move {
        let mut kill_tx = Some(kill_tx);
        while let Some(chunk) = req_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    if stdin.write_all(&bytes).await.is_err() {
                        // Child closed its end; it decides how to finish.
                        return;
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "request body interrupted");
                    if let Some(tx) = kill_tx.take() {
                        let _ = tx.send(());
                    }
                    return;
                }
            }
        }
        // Dropping stdin signals EOF to the child.
    });

    tracing::debug!(repo = %repo_ref, service = %service, "bridging stateless-rpc request");

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, service.result_content_type())
        .header(header::CACHE_CONTROL, "no-cache")
        // The payload is an opaque binary protocol stream; downstream
        // compression or transforms would corrupt it.
        .header(header::CONTENT_ENCODING, "identity")
        .body(Body::from_stream(ReaderStream::new(stdout)))
        .unwrap())
}

/// Logs transport stderr; it is never forwarded to HTTP clients.
fn drain_stderr(stderr: ChildStderr, service: TransportService) {
    tokio::spawn(async move {
        let mut stderr = stderr;
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf).await;
        if !buf.is_empty() {
            tracing::warn!(
                service = %service,
                stderr = %String::from_utf8_lossy(&buf).trim(),
                "git transport stderr"
            );
        }
    });
}
