//! PaperVault API Gateway
//!
//! The HTTP entry point for the archive.
//! Handles:
//! - Admin login and bearer-token authentication
//! - PDF uploads through the ingestion pipeline
//! - Catalog search and stored file delivery
//! - Observability (logging, metrics, health)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use middleware::rate_limit::{create_rate_limiter, rate_limit_middleware, LoginLimiter};
use papervault_common::{
    auth::{generate_secret, JwtManager},
    config::{AppConfig, ObservabilityConfig},
    db::DbPool,
    metrics::{self, LATENCY_BUCKETS, METRICS_PREFIX, UPLOAD_SIZE_BUCKETS},
    retrieval::{DownloadLocator, RetrievalService},
    storage::{FileStore, FilesystemStore},
    IngestionCoordinator, Repository,
};
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub repo: Repository,
    pub ingest: Arc<IngestionCoordinator>,
    pub retrieval: Arc<RetrievalService>,
    pub files: Arc<FilesystemStore>,
    pub jwt: Arc<JwtManager>,
    pub login_limiter: LoginLimiter,
    pub metrics: Option<PrometheusHandle>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config.observability);
    info!(
        service = %config.observability.service_name,
        "Starting PaperVault API Gateway v{}",
        papervault_common::VERSION
    );

    let config = Arc::new(config);

    // Initialize metrics
    let prometheus = if config.observability.metrics_enabled {
        let handle = install_metrics_recorder()?;
        metrics::register_metrics();
        Some(handle)
    } else {
        None
    };

    let state = build_state(config.clone(), prometheus).await?;

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn install_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("_seconds".to_string()), LATENCY_BUCKETS)?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_upload_bytes", METRICS_PREFIX)),
            UPLOAD_SIZE_BUCKETS,
        )?
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    Ok(handle)
}

/// Connect the stores and wire up the services
async fn build_state(
    config: Arc<AppConfig>,
    prometheus: Option<PrometheusHandle>,
) -> anyhow::Result<AppState> {
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    db.ensure_schema().await?;

    let files = Arc::new(FilesystemStore::open(&config.storage.upload_dir).await?);
    info!(upload_dir = %files.root().display(), "File store ready");

    let repo = Repository::new(db.clone());
    let catalog = Arc::new(repo.clone());
    let file_store: Arc<dyn FileStore> = files.clone();

    let ingest = Arc::new(IngestionCoordinator::new(catalog.clone(), file_store));
    let retrieval = Arc::new(RetrievalService::new(
        catalog,
        DownloadLocator::new(&config.storage.public_path),
    ));

    let secret = match config.auth.jwt_secret {
        Some(ref secret) if !secret.is_empty() => secret.clone(),
        _ => {
            warn!("auth.jwt_secret is not set; using a random secret, tokens will not survive a restart");
            generate_secret()
        }
    };
    let jwt = Arc::new(JwtManager::new(&secret, config.auth.jwt_expiration_secs));

    let login_limiter = create_rate_limiter(
        config.rate_limit.requests_per_second,
        config.rate_limit.burst,
    );

    Ok(AppState {
        config,
        db,
        repo,
        ingest,
        retrieval,
        files,
        jwt,
        login_limiter,
        metrics: prometheus,
    })
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut login = post(handlers::auth::login);
    if state.config.rate_limit.enabled {
        login = login.layer(from_fn_with_state(
            state.login_limiter.clone(),
            rate_limit_middleware,
        ));
    }

    let upload = post(handlers::papers::upload)
        .layer(DefaultBodyLimit::max(state.config.storage.max_upload_bytes));

    let files_route = format!(
        "{}/{{filename}}",
        state.config.storage.public_path.trim_end_matches('/')
    );

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        // Admin endpoints
        .route("/login", login)
        .route("/upload", upload)
        // Public endpoints
        .route("/api/papers", get(handlers::papers::list))
        .route(&files_route, get(handlers::files::download))
        .layer(
            ServiceBuilder::new()
                .layer(request_id)
                .layer(propagate_id)
                .layer(cors)
                .map_response(axum::response::IntoResponse::into_response)
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(state.config.request_timeout())),
        )
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use papervault_common::{auth::hash_password, MetadataStore};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "papervault-test-boundary";

    struct TestApp {
        router: Router,
        state: AppState,
        _dir: tempfile::TempDir,
    }

    impl TestApp {
        async fn new() -> Self {
            Self::with_config(|_| {}).await
        }

        async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = AppConfig::default();
            config.database.url =
                format!("sqlite://{}?mode=rwc", dir.path().join("papers.db").display());
            config.database.max_connections = 2;
            config.storage.upload_dir = dir.path().join("uploads");
            config.auth.jwt_secret = Some("test-secret".to_string());
            tweak(&mut config);

            let state = build_state(Arc::new(config), None).await.unwrap();
            state
                .repo
                .create_user("admin", hash_password("hunter2").unwrap())
                .await
                .unwrap();

            Self {
                router: create_router(state.clone()),
                state,
                _dir: dir,
            }
        }

        async fn send(&self, request: Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.unwrap()
        }

        async fn login(&self, username: &str, password: &str) -> Response {
            self.send(
                Request::post("/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "username": username, "password": password }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
        }

        async fn token(&self) -> String {
            let body = json_body(self.login("admin", "hunter2").await).await;
            body["token"].as_str().unwrap().to_string()
        }

        async fn upload(&self, token: Option<&str>, filename: &str, fields: &[(&str, &str)]) -> Response {
            let mut request = Request::post("/upload").header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
            if let Some(token) = token {
                request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let body = multipart_body(fields, Some((filename, b"%PDF-1.4 test body")));
            self.send(request.body(Body::from(body)).unwrap()).await
        }
    }

    const PAPER_FIELDS: &[(&str, &str)] = &[
        ("class", "B.Sc"),
        ("subject", "Physics"),
        ("semester", "Semester III"),
        ("exam_year", "2023"),
        ("exam_type", "Final"),
        ("medium", "English"),
        ("university", "Delhi University"),
    ];

    fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let app = TestApp::new().await;

        let response = app.send(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");

        let response = app.send(Request::get("/ready").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["checks"]["database"]["status"], "up");
        assert_eq!(body["checks"]["storage"]["status"], "up");
    }

    #[tokio::test]
    async fn test_metrics_disabled_is_not_found() {
        let app = TestApp::new().await;
        let response = app.send(Request::get("/metrics").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_login() {
        let app = TestApp::new().await;

        let response = app.login("admin", "hunter2").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["expires_in"], 3600);

        let response = app.login("admin", "wrong").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["code"], "INVALID_CREDENTIALS");

        let response = app.login("nobody", "hunter2").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.login("", "hunter2").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_is_rate_limited() {
        let app = TestApp::with_config(|config| {
            config.rate_limit.requests_per_second = 1;
            config.rate_limit.burst = 2;
        })
        .await;

        assert_eq!(app.login("nobody", "x").await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.login("nobody", "x").await.status(), StatusCode::UNAUTHORIZED);
        let response = app.login("admin", "hunter2").await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json_body(response).await["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn test_upload_requires_token() {
        let app = TestApp::new().await;

        let response = app.upload(None, "exam.pdf", PAPER_FIELDS).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.upload(Some("not-a-jwt"), "exam.pdf", PAPER_FIELDS).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        assert!(app.state.repo.list_papers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_search_download() {
        let app = TestApp::new().await;
        let token = app.token().await;

        let response = app.upload(Some(&token), "Physics 2023.pdf", PAPER_FIELDS).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let receipt = json_body(response).await;
        let filename = receipt["filename"].as_str().unwrap().to_string();
        assert!(filename.ends_with("_Physics_2023.pdf"));

        let response = app
            .send(Request::get("/api/papers?q=phy%202023").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let hits = json_body(response).await;
        let hits = hits.as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["original_name"], "Physics Final 2023");
        // No uploader given, so the logged-in admin is recorded
        assert_eq!(hits[0]["uploader_name"], "admin");
        assert_eq!(hits[0]["paper_code"], "N/A");

        let url = hits[0]["url"].as_str().unwrap();
        assert_eq!(url, format!("/uploads/{}", filename));
        let response = app.send(Request::get(url).body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.4 test body");

        let response = app
            .send(Request::get("/api/papers?q=history").body(Body::empty()).unwrap())
            .await;
        assert!(json_body(response).await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_streams_large_file_before_fields() {
        let app = TestApp::new().await;
        let token = app.token().await;

        let pdf: Vec<u8> = b"%PDF-1.7\n"
            .iter()
            .copied()
            .chain((0..512 * 1024).map(|i| (i % 251) as u8))
            .collect();
        let file_part = multipart_body(&[], Some(("big.pdf", pdf.as_slice())));
        let fields_part = multipart_body(PAPER_FIELDS, None);
        // File part first, then the metadata parts
        let mut body = file_part[..file_part.len() - format!("--{BOUNDARY}--\r\n").len()].to_vec();
        body.extend_from_slice(&fields_part);

        let response = app
            .send(
                Request::post("/upload")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={}", BOUNDARY),
                    )
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let filename = json_body(response).await["filename"].as_str().unwrap().to_string();
        let stored = std::fs::read(app.state.files.root().join(&filename)).unwrap();
        assert_eq!(stored, pdf);
    }

    #[tokio::test]
    async fn test_upload_legacy_admin_name() {
        let app = TestApp::new().await;
        let token = app.token().await;

        let mut fields = PAPER_FIELDS.to_vec();
        fields.push(("admin_name", "Exam Cell"));
        let response = app.upload(Some(&token), "a.pdf", &fields).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let rows = app.state.repo.list_papers().await.unwrap();
        assert_eq!(rows[0].uploader_name, "Exam Cell");
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let app = TestApp::new().await;
        let token = app.token().await;

        let response = app.upload(Some(&token), "notes.docx", PAPER_FIELDS).await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let response = app.upload(Some(&token), "exam.pdf", &PAPER_FIELDS[1..]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["field"], "class");

        assert!(app.state.repo.list_papers().await.unwrap().is_empty());
        assert_eq!(std::fs::read_dir(app.state.files.root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_upload_body_limit() {
        let app = TestApp::with_config(|config| config.storage.max_upload_bytes = 64).await;
        let token = app.token().await;

        let response = app.upload(Some(&token), "exam.pdf", PAPER_FIELDS).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(app.state.repo.list_papers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_missing_and_traversal() {
        let app = TestApp::new().await;

        let response = app
            .send(Request::get("/uploads/missing.pdf").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .send(Request::get("/uploads/..%2Fpapers.db").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
