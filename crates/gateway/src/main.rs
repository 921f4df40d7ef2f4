//! PaperMind API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Project and document management
//! - Chat, analysis and deep research queries
//! - Rate limiting of query routes
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;
mod state;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use papermind_common::{
    config::{AppConfig, ObservabilityConfig},
    metrics::{self, EMBEDDING_BUCKETS, QUERY_BUCKETS},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use middleware::rate_limit::{rate_limit, QueryLimiter};
use state::{AppState, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting PaperMind API Gateway v{}",
        papermind_common::VERSION
    );

    // Initialize metrics
    metrics::register_metrics();
    init_metrics_exporter(&config.observability)?;

    let config = Arc::new(config);
    let services = Arc::new(Services::init(&config).await?);

    let state = AppState {
        config: config.clone(),
        services: services.clone(),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if tokio::time::timeout(config.shutdown_timeout(), services.close())
        .await
        .is_err()
    {
        warn!("Timed out releasing connections");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let json = config.json_logging.then(|| fmt::layer().with_target(true).json());
    let plain = (!config.json_logging).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .init();
}

/// Serve Prometheus metrics on their own port; 0 disables the exporter
fn init_metrics_exporter(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], config.metrics_port)))
        .set_buckets_for_metric(
            Matcher::Suffix("query_duration_seconds".to_string()),
            QUERY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("embedding_duration_seconds".to_string()),
            EMBEDDING_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(port = config.metrics_port, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Query routes call the reasoning backends and are rate limited
    let mut query_routes = Router::new()
        .route("/projects/{project_id}/query/chat", post(handlers::query::chat))
        .route("/projects/{project_id}/query/analyze", post(handlers::query::analyze))
        .route("/projects/{project_id}/query/research", post(handlers::query::research));

    if config.rate_limit.enabled {
        let limiter = QueryLimiter::new(&config.rate_limit);
        query_routes = query_routes
            .route_layer(axum::middleware::from_fn_with_state(limiter, rate_limit));
    }

    let api_routes = Router::new()
        // Projects
        .route(
            "/projects",
            post(handlers::projects::create_project).get(handlers::projects::list_projects),
        )
        .route("/projects/{project_id}", get(handlers::projects::get_project))

        // Documents
        .route(
            "/projects/{project_id}/documents",
            post(handlers::documents::upload_documents)
                .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
                .get(handlers::documents::list_documents),
        )
        .route(
            "/projects/{project_id}/documents/{document_id}",
            delete(handlers::documents::delete_document),
        )

        // History
        .route("/projects/{project_id}/history", get(handlers::history::get_history))
        .route("/projects/{project_id}/analysis", get(handlers::history::get_analysis))

        .merge(query_routes);

    // Compose the app
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use papermind_common::{
        db::MemoryStore,
        embeddings::HashEmbedder,
        llm::{Backends, ScriptedBackend},
        vector::{InMemoryVectorIndex, VectorIndex},
    };
    use papermind_ingestion::fixtures::pdf_with_pages;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "papermind-test-boundary";

    const ANALYSIS_JSON: &str = r#"{
        "common_approaches": ["attention"],
        "missing_evaluations": ["latency"],
        "unexplored_scenarios": ["edge devices"],
        "research_gaps": ["robustness"],
        "methodology_suggestions": [{"action": "ablate", "reasoning": "isolate", "citations": []}]
    }"#;

    struct TestApp {
        router: Router,
        chat: Arc<ScriptedBackend>,
        research: Arc<ScriptedBackend>,
    }

    async fn test_app(config: AppConfig) -> TestApp {
        let chat = Arc::new(ScriptedBackend::new("fallback chat reply"));
        let research = Arc::new(ScriptedBackend::new("fallback research reply"));

        let index = Arc::new(InMemoryVectorIndex::new());
        index.init().await.unwrap();

        let services = Services::assemble(
            &config,
            Arc::new(MemoryStore::new()),
            index,
            Arc::new(HashEmbedder::new(config.embedding.dimension)),
            Backends {
                chat: chat.clone(),
                research: research.clone(),
            },
        );

        let state = AppState {
            config: Arc::new(config),
            services: Arc::new(services),
        };

        TestApp {
            router: create_router(state),
            chat,
            research,
        }
    }

    async fn send(app: &TestApp, request: Request<Body>) -> Response {
        app.router.clone().oneshot(request).await.unwrap()
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn upload(project_id: i64, files: &[(&str, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (filename, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri(format!("/v1/projects/{project_id}/documents"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_project(app: &TestApp, title: &str) -> i64 {
        let response = send(
            app,
            json_request(Method::POST, "/v1/projects", json!({ "title": title })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["id"].as_i64().unwrap()
    }

    fn paper() -> Vec<u8> {
        pdf_with_pages(&[
            &["Transformers rely on self attention."],
            &["Evaluation uses the GLUE benchmark."],
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_services_init_in_memory() {
        let services = tokio_test::assert_ok!(Services::init(&AppConfig::in_memory()).await);
        tokio_test::assert_ok!(services.store.ping().await);
        services.close().await;
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let app = test_app(AppConfig::in_memory()).await;

        let response = send(&app, get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_json(response).await["status"], "healthy");

        let response = send(&app, get("/ready")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["checks"]["store"]["status"], "up");
    }

    #[tokio::test]
    async fn test_project_lifecycle() {
        let app = test_app(AppConfig::in_memory()).await;
        let project_id = create_project(&app, "Robust Vision").await;

        let response = send(&app, get(&format!("/v1/projects/{project_id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["title"], "Robust Vision");

        let response = send(&app, get("/v1/projects/9999")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"]["code"], "PROJECT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_projects_pages_and_clamps_limit() {
        let app = test_app(AppConfig::in_memory()).await;
        for title in ["first", "second", "third"] {
            create_project(&app, title).await;
        }

        let body = body_json(send(&app, get("/v1/projects")).await).await;
        assert_eq!(body["skip"], 0);
        assert_eq!(body["limit"], 50);
        assert_eq!(body["projects"].as_array().unwrap().len(), 3);

        let response = send(&app, get("/v1/projects?skip=1&limit=1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let titles: Vec<&str> = body["projects"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["second"]);

        let body = body_json(send(&app, get("/v1/projects?limit=0")).await).await;
        assert_eq!(body["limit"], 1);
        assert_eq!(body["projects"][0]["title"], "first");

        let body = body_json(send(&app, get("/v1/projects?limit=100000")).await).await;
        assert_eq!(body["limit"], 500);

        let body = body_json(send(&app, get("/v1/projects?skip=10")).await).await;
        assert!(body["projects"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_title_rejected() {
        let app = test_app(AppConfig::in_memory()).await;

        for title in ["", "   "] {
            let response = send(
                &app,
                json_request(Method::POST, "/v1/projects", json!({ "title": title })),
            )
            .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_upload_reports_each_file() {
        let app = test_app(AppConfig::in_memory()).await;
        let project_id = create_project(&app, "p").await;

        let pdf = paper();
        let response = send(
            &app,
            upload(
                project_id,
                &[
                    ("paper.pdf", pdf.as_slice()),
                    ("notes.txt", b"plain text".as_slice()),
                    ("broken.pdf", b"%PDF-1.4 truncated".as_slice()),
                ],
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["indexed"], 1);
        let statuses: Vec<&str> = body["documents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["status"].as_str().unwrap())
            .collect();
        assert_eq!(statuses, vec!["indexed", "skipped", "rejected"]);

        let response = send(&app, get(&format!("/v1/projects/{project_id}/documents"))).await;
        let body = body_json(response).await;
        let documents = body["documents"].as_array().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0]["filename"], "paper.pdf");
        assert_eq!(documents[0]["is_indexed"], true);
    }

    #[tokio::test]
    async fn test_upload_to_unknown_project() {
        let app = test_app(AppConfig::in_memory()).await;
        let pdf = paper();

        let response = send(&app, upload(42, &[("paper.pdf", pdf.as_slice())])).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_over_limit() {
        let mut config = AppConfig::in_memory();
        config.server.max_upload_bytes = 256;
        let app = test_app(config).await;
        let project_id = create_project(&app, "p").await;

        let big = vec![b'x'; 4096];
        let response = send(&app, upload(project_id, &[("big.pdf", big.as_slice())])).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["error"]["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_chat_cites_sources_and_records_history() {
        let app = test_app(AppConfig::in_memory()).await;
        let project_id = create_project(&app, "p").await;
        let pdf = paper();
        send(&app, upload(project_id, &[("paper.pdf", pdf.as_slice())])).await;

        app.chat
            .push_text("It uses self attention [Source: paper.pdf, Page: 1] [Source: ghost.pdf].");

        let response = send(
            &app,
            json_request(
                Method::POST,
                &format!("/v1/projects/{project_id}/query/chat"),
                json!({ "query": "What do transformers rely on?" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["sources"], json!(["paper.pdf"]));
        assert!(app.chat.last_prompt().unwrap().contains("[Document: paper.pdf | Page: 1]"));

        let response = send(&app, get(&format!("/v1/projects/{project_id}/history?channel=chat"))).await;
        let body = body_json(response).await;
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");

        let response = send(&app, get(&format!("/v1/projects/{project_id}/history?channel=research"))).await;
        assert!(body_json(response).await["messages"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_validation() {
        let app = test_app(AppConfig::in_memory()).await;
        let project_id = create_project(&app, "p").await;

        let response = send(
            &app,
            json_request(
                Method::POST,
                &format!("/v1/projects/{project_id}/query/chat"),
                json!({ "query": "" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(app.chat.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_analysis_flow() {
        let app = test_app(AppConfig::in_memory()).await;
        let project_id = create_project(&app, "p").await;
        let analyze = format!("/v1/projects/{project_id}/query/analyze");
        let stored = format!("/v1/projects/{project_id}/analysis");

        let response = send(&app, json_request(Method::POST, &analyze, json!({}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "INSUFFICIENT_CONTEXT");

        let response = send(&app, get(&stored)).await;
        assert_eq!(body_json(response).await, Value::Null);

        let pdf = paper();
        send(&app, upload(project_id, &[("paper.pdf", pdf.as_slice())])).await;
        app.research.push_text(ANALYSIS_JSON);

        let response = send(&app, json_request(Method::POST, &analyze, json!({}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["research_gaps"], json!(["robustness"]));

        let response = send(&app, get(&stored)).await;
        assert_eq!(body_json(response).await["project_id"], project_id);
    }

    #[tokio::test]
    async fn test_research_without_documents() {
        let app = test_app(AppConfig::in_memory()).await;
        let project_id = create_project(&app, "Robust Vision").await;
        app.research.push_text("# Report");

        let response = send(
            &app,
            json_request(
                Method::POST,
                &format!("/v1/projects/{project_id}/query/research"),
                json!({ "query": "Which evaluation protocols are missing from robustness work?" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["report"], "# Report");

        let prompt = app.research.last_prompt().unwrap();
        assert!(prompt.contains("No specific documents found in the database."));
        assert!(prompt.contains("Robust Vision"));
    }

    #[tokio::test]
    async fn test_delete_document() {
        let app = test_app(AppConfig::in_memory()).await;
        let project_id = create_project(&app, "p").await;
        let pdf = paper();
        let response = send(&app, upload(project_id, &[("paper.pdf", pdf.as_slice())])).await;
        let document_id = body_json(response).await["documents"][0]["document"]["id"]
            .as_i64()
            .unwrap();

        let uri = format!("/v1/projects/{project_id}/documents/{document_id}");
        let delete_request = || {
            Request::builder()
                .method(Method::DELETE)
                .uri(&uri)
                .body(Body::empty())
                .unwrap()
        };

        let response = send(&app, delete_request()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, delete_request()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"]["code"], "DOCUMENT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_query_routes_rate_limited() {
        let mut config = AppConfig::in_memory();
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        let app = test_app(config).await;
        let project_id = create_project(&app, "p").await;
        let uri = format!("/v1/projects/{project_id}/query/research");

        let first = send(&app, json_request(Method::POST, &uri, json!({ "query": "hi" }))).await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = send(&app, json_request(Method::POST, &uri, json!({ "query": "hi" }))).await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_json(second).await["error"]["code"], "RATE_LIMITED");

        // other routes are not limited
        let response = send(&app, get(&format!("/v1/projects/{project_id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
