//! Activation HTTP server
//!
//! Minimal endpoint exposing spreading activation to the browser
//! visualization. Startup order matters: listen, learn the assigned
//! address, render the page (it embeds its API base URL), then serve.
//! Shutdown is cooperative with a bounded grace period for in-flight
//! requests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use floop_core::{spread, ActivationConfig, ActivationSeed, GraphStore};

/// How long in-flight requests get to finish after cancellation fires.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Shared application state
///
/// The page and address are fixed at startup; the store is the only
/// mutable collaborator and handles its own locking.
#[derive(Clone)]
pub struct AppState {
    store: Arc<GraphStore>,
    page: Arc<String>,
    cancel: CancellationToken,
}

/// Handle to a running activation server
pub struct ServerHandle {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The OS-assigned bind address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the serve task to finish (after cancellation fires).
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

/// Build the axum router with the activation routes
pub fn build_router(state: AppState, addr: SocketAddr) -> Router {
    let origin = format!("http://{}", addr)
        .parse::<axum::http::HeaderValue>()
        .expect("valid origin");
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([axum::http::Method::GET]);

    Router::new()
        .route("/", get(serve_page))
        .route("/api/activate", get(activate))
        .route("/api/health", get(health))
        .layer(ServiceBuilder::new().concurrency_limit(32).layer(cors))
        .with_state(state)
}

/// Bind `127.0.0.1:<port>` (0 for OS-assigned), render the page against
/// the learned address, and serve until the token cancels.
pub async fn start(
    store: Arc<GraphStore>,
    port: u16,
    cancel: CancellationToken,
) -> std::io::Result<ServerHandle> {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?;
    let addr = listener.local_addr()?;

    let page = Arc::new(crate::page::render(&format!("http://{}", addr)));
    let state = AppState {
        store,
        page,
        cancel: cancel.clone(),
    };
    let app = build_router(state, addr);

    info!("Activation server listening on http://{}", addr);

    let task = tokio::spawn(async move {
        let shutdown = cancel.clone();
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await });
        let grace = async {
            cancel.cancelled().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        };
        tokio::select! {
            result = serve => {
                if let Err(e) = result {
                    error!("Activation server failed: {}", e);
                }
            }
            _ = grace => {
                warn!("Shutdown grace period expired; dropping in-flight requests");
            }
        }
        info!("Activation server stopped");
    });

    Ok(ServerHandle { addr, task })
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /: the cached visualization page
async fn serve_page(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        Html(state.page.as_str().to_owned()),
    )
        .into_response()
}

/// GET /api/activate?seed=<id>: run spreading activation from a seed
/// and return the step snapshots.
async fn activate(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(seed_id) = params.get("seed").filter(|s| !s.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing 'seed' query parameter").into_response();
    };

    match state.store.get_node(seed_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                format!("no behavior with id '{}'", seed_id),
            )
                .into_response();
        }
        Err(e) => {
            error!("Store error looking up seed '{}': {}", seed_id, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let seeds = [ActivationSeed {
        behavior_id: seed_id.clone(),
        activation: 1.0,
        source: "api".to_string(),
    }];
    let request_token = state.cancel.child_token();
    match spread(
        state.store.as_ref(),
        &seeds,
        &ActivationConfig::default(),
        &request_token,
    ) {
        Ok(steps) => Json(steps).into_response(),
        Err(e) => {
            error!("Activation from '{}' failed: {}", seed_id, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /api/health: store counts for liveness checks
async fn health(State(state): State<AppState>) -> Response {
    match state.store.stats() {
        Ok(stats) => Json(serde_json::json!({
            "status": "ok",
            "totalNodes": stats.total_nodes,
            "totalEdges": stats.total_edges,
            "version": env!("CARGO_PKG_VERSION"),
        }))
        .into_response(),
        Err(e) => {
            error!("Store error in health check: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use floop_core::{EdgeKind, NewEdge, NewNode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn seeded_state() -> (AppState, SocketAddr, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = GraphStore::open(Some(dir.path().join("graph.db"))).unwrap();
        for id in ["b1", "b2"] {
            store.add_node(NewNode::behavior(id)).unwrap();
        }
        store
            .add_edge(NewEdge::new("b1", "b2", EdgeKind::Requires, 0.9))
            .unwrap();

        let addr: SocketAddr = "127.0.0.1:3999".parse().unwrap();
        let state = AppState {
            store: Arc::new(store),
            page: Arc::new(crate::page::render(&format!("http://{}", addr))),
            cancel: CancellationToken::new(),
        };
        (state, addr, dir)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_activate_returns_snapshots() {
        let (state, addr, _dir) = seeded_state();
        let app = build_router(state, addr);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/activate?seed=b1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let steps: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        let steps = steps.as_array().unwrap();
        assert!(steps[0]["activation"]["b1"].as_f64().unwrap() > 0.0);
        assert_eq!(steps.last().unwrap()["final"], true);
    }

    #[tokio::test]
    async fn test_activate_missing_seed_param_is_400() {
        let (state, addr, _dir) = seeded_state();
        let app = build_router(state, addr);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/activate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_activate_unknown_seed_is_404() {
        let (state, addr, _dir) = seeded_state();
        let app = build_router(state, addr);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/activate?seed=missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_activate_non_get_is_405() {
        let (state, addr, _dir) = seeded_state();
        let app = build_router(state, addr);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/activate?seed=b1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_page_served_with_html_content_type() {
        let (state, addr, _dir) = seeded_state();
        let app = build_router(state, addr);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/html"));
        assert!(body_string(response).await.contains("http://127.0.0.1:3999"));
    }

    #[tokio::test]
    async fn test_health_reports_counts() {
        let (state, addr, _dir) = seeded_state();
        let app = build_router(state, addr);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["totalNodes"], 2);
        assert_eq!(body["totalEdges"], 1);
    }

    #[tokio::test]
    async fn test_start_binds_ephemeral_port_and_shuts_down() {
        let dir = TempDir::new().unwrap();
        let store = GraphStore::open(Some(dir.path().join("graph.db"))).unwrap();
        store.add_node(NewNode::behavior("b1")).unwrap();

        let cancel = CancellationToken::new();
        let handle = start(Arc::new(store), 0, cancel.clone()).await.unwrap();
        let addr = handle.addr();
        assert_ne!(addr.port(), 0);

        // Raw HTTP round-trip against the live listener
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                format!(
                    "GET /api/activate?seed=b1 HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
                    addr
                )
                .as_bytes(),
            )
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"final\":true"));

        cancel.cancel();
        handle.wait().await;
    }
}
