//! Axum router configuration with middleware.
//!
//! Routes live under `/api/`, plus `/health`. Middleware: body limit, CORS,
//! request tracing.
//!
//! When `server.web_dir` exists it is served as a static fallback so the web
//! client and the API share one origin. API routes take priority.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_body_bytes = state.config.server.max_body_bytes;
    let web_dir = state.config.server.web_dir.clone();

    let api_routes = Router::new()
        .route("/build", post(handlers::build::submit_build))
        .route("/status/{token}", get(handlers::status::get_status))
        .route("/callback", post(handlers::callback::receive_callback));

    let mut router = Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health::health_check))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if !web_dir.is_empty() && std::path::Path::new(&web_dir).is_dir() {
        let index_path = format!("{web_dir}/index.html");
        let serve_dir = ServeDir::new(&web_dir).fallback(ServeFile::new(index_path));
        router = router.fallback_service(serve_dir);
        tracing::info!(path = %web_dir, "static web client enabled");
    }

    router
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use buildrelay_core::ci::box_ci::{BoxCiQuery, BoxCiTrigger};
    use buildrelay_core::fakes::{FakeAssetStore, FakeCi, run_at};
    use buildrelay_core::registry::box_store::BoxRegistryStore;
    use buildrelay_core::registry::memory::MemoryRegistryStore;
    use buildrelay_core::relay::service::BuildRelay;
    use buildrelay_core::storage::box_store::BoxAssetStore;
    use buildrelay_types::config::RelayConfig;
    use buildrelay_types::error::CiError;
    use buildrelay_types::run::{ReleaseAsset, RunConclusion, RunStatus};

    struct TestApp {
        router: Router,
        ci: FakeCi,
        store: FakeAssetStore,
    }

    fn test_config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.ci.owner = "acme".to_string();
        config.ci.repo = "apk-builder".to_string();
        config.ci.max_retries = 0;
        config.storage.upload_url = "https://bucket.test".to_string();
        config.storage.max_retries = 0;
        config.storage.max_icon_bytes = 64;
        config.server.web_dir = String::new();
        config
    }

    fn test_app_with(config: RelayConfig) -> TestApp {
        let ci = FakeCi::new();
        let store = FakeAssetStore::new("https://bucket.test");
        let relay = BuildRelay::from_config(
            &config,
            BoxAssetStore::new(store.clone()),
            BoxCiTrigger::new(ci.clone()),
            BoxCiQuery::new(ci.clone()),
            BoxRegistryStore::new(MemoryRegistryStore::new()),
        );
        TestApp {
            router: build_router(AppState::new(relay, config)),
            ci,
            store,
        }
    }

    fn test_app() -> TestApp {
        test_app_with(test_config())
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn demo_submission() -> Value {
        json!({
            "name": "Demo",
            "package_id": "com.demo.app",
            "source_url": "https://demo.test",
            // 10 bytes of image data.
            "icon": "data:image/png;base64,iVBORw0KGgoAAA==",
            "features": {"camera": true},
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body) = send(&app.router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_submit_then_poll_to_completion() {
        let app = test_app();

        let (status, body) = send(&app.router, post_json("/api/build", demo_submission())).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "queued");
        let token = body["token"].as_str().unwrap().to_string();
        assert!(!token.is_empty());
        assert_eq!(app.store.uploads().len(), 1);
        assert_eq!(app.ci.dispatched().len(), 1);

        let (status, body) = send(&app.router, get(&format!("/api/status/{token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "queued");
        assert!(body["download_url"].is_null());

        let mut run = run_at(77, 5);
        run.payload = Some(json!({"correlation_id": token}));
        run.status = RunStatus::Completed;
        run.conclusion = Some(RunConclusion::Success);
        app.ci.push_run(run);
        app.ci.set_assets(
            "build-77",
            vec![ReleaseAsset {
                name: "app-release.apk".to_string(),
                download_url: "https://dl.test/77/app-release.apk".to_string(),
            }],
        );

        let (status, body) = send(&app.router, get(&format!("/api/status/{token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token"], token.as_str());
        assert_eq!(body["status"], "completed");
        assert_eq!(body["conclusion"], "success");
        assert_eq!(body["download_url"], "https://dl.test/77/app-release.apk");
        assert_eq!(body["run_id"], 77);
    }

    #[tokio::test]
    async fn test_legacy_client_keys_are_accepted() {
        let app = test_app();
        let body = json!({
            "appName": "Demo",
            "packageName": "com.demo.app",
            "appUrl": "https://demo.test",
            "iconBase64": "iVBORw0KGgoAAA==",
            "permissions": {"mic": true},
        });

        let (status, _) = send(&app.router, post_json("/api/build", body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(app.ci.dispatched()[0].client_payload["use_mic"], true);
    }

    #[tokio::test]
    async fn test_missing_package_is_400_naming_field() {
        let app = test_app();
        let mut body = demo_submission();
        body.as_object_mut().unwrap().remove("package_id");

        let (status, body) = send(&app.router, post_json("/api/build", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["field"], "package_id");
        assert!(app.ci.dispatched().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/build")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_oversize_icon_is_413() {
        let app = test_app();
        let mut body = demo_submission();
        body["icon"] = json!("A".repeat(128));

        let (status, body) = send(&app.router, post_json("/api/build", body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_body_over_limit_is_413() {
        let mut config = test_config();
        config.server.max_body_bytes = 32;
        let app = test_app_with(config);

        let (status, _) = send(&app.router, post_json("/api/build", demo_submission())).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(app.ci.dispatched().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_500_with_reason() {
        let app = test_app();
        app.ci.fail_dispatch(CiError::Rejected {
            status: 422,
            message: "Unexpected event type".to_string(),
        });

        let (status, body) = send(&app.router, post_json("/api/build", demo_submission())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "DEPENDENCY_ERROR");
        assert!(body["error"].as_str().unwrap().contains("Unexpected event type"));
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_an_http_error() {
        let app = test_app();
        let (status, body) = send(&app.router, get("/api/status/legacy-token-123")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "not_found");
    }

    #[tokio::test]
    async fn test_ci_outage_reports_in_progress() {
        let app = test_app();
        let (_, body) = send(&app.router, post_json("/api/build", demo_submission())).await;
        let token = body["token"].as_str().unwrap().to_string();
        app.ci.fail_queries(CiError::Timeout);

        let (status, body) = send(&app.router, get(&format!("/api/status/{token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "in_progress");
    }

    #[tokio::test]
    async fn test_callback_updates_status_and_terminal_wins() {
        let app = test_app();
        let (_, body) = send(&app.router, post_json("/api/build", demo_submission())).await;
        let token = body["token"].as_str().unwrap().to_string();

        let done = json!({
            "token": token,
            "status": "completed",
            "download_url": "https://dl.test/pushed.apk",
            "run_id": 9,
        });
        let (status, body) = send(&app.router, post_json("/api/callback", done)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applied"], true);
        assert_eq!(body["status"], "completed");

        let late = json!({"token": token, "status": "in_progress"});
        let (_, body) = send(&app.router, post_json("/api/callback", late)).await;
        assert_eq!(body["applied"], false);
        assert_eq!(body["status"], "completed");

        let (_, body) = send(&app.router, get(&format!("/api/status/{token}"))).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["download_url"], "https://dl.test/pushed.apk");
    }

    #[tokio::test]
    async fn test_callback_with_blank_token_is_400() {
        let app = test_app();
        let (status, body) = send(&app.router, post_json("/api/callback", json!({"token": " ", "status": "failed"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "token");
    }

    #[tokio::test]
    async fn test_callback_accepts_provider_spelling_and_rejects_queued() {
        let app = test_app();
        let (_, body) = send(&app.router, post_json("/api/build", demo_submission())).await;
        let token = body["token"].as_str().unwrap().to_string();

        let queued = json!({"token": token, "status": "queued"});
        let (status, body) = send(&app.router, post_json("/api/callback", queued)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "status");

        let done = json!({"token": token, "status": "success", "run_id": 3});
        let (status, body) = send(&app.router, post_json("/api/callback", done)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
    }

    #[tokio::test]
    async fn test_web_dir_fallback_serves_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>relay</h1>").unwrap();
        let mut config = test_config();
        config.server.web_dir = dir.path().display().to_string();
        let app = test_app_with(config);

        let response = app.router.clone().oneshot(get("/some/page")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>relay</h1>");

        let (status, body) = send(&app.router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
