// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::HeaderValue,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ErrorBody,
    models::{FileListResponse, MessageResponse, UploadForm, UploadResponse},
    state::AppState,
};

pub mod files;
pub mod health;

/// Room for multipart boundaries and part headers on top of the file
/// itself. The exact file size is enforced by the store.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_upload_size
        .saturating_add(MULTIPART_OVERHEAD);
    let cors = cors_layer(&state.config.cors_origins);

    let routes = Router::new()
        .route("/", get(files::list_files))
        .route(
            "/upload",
            get(files::upload_redirect).post(files::upload_file),
        )
        .route("/download/{filename}", get(files::download_file))
        .route(
            "/delete/{filename}",
            get(files::delete_file).post(files::delete_file),
        )
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    let app = Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    match cors {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

/// CORS restricted to the configured origins, or `None` when no origin is
/// trusted (cross-origin requests are then left to the browser's default).
pub fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

#[derive(OpenApi)]
#[openapi(
    paths(
        files::list_files,
        files::upload_file,
        files::download_file,
        files::delete_file,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            FileListResponse,
            UploadResponse,
            MessageResponse,
            UploadForm,
            ErrorBody,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Files", description = "List, upload, download and delete stored files"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, storage::FileStore};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state_with(config: Config, dir: &TempDir) -> AppState {
        let store = FileStore::open(dir.path()).unwrap();
        AppState::new(store, config)
    }

    #[tokio::test]
    async fn every_route_is_wired_to_its_handler() {
        let dir = TempDir::new().unwrap();
        let app = router(state_with(Config::default(), &dir));

        let cases = [
            (Method::GET, "/", StatusCode::OK),
            (Method::GET, "/upload", StatusCode::SEE_OTHER),
            (Method::GET, "/download/missing.txt", StatusCode::NOT_FOUND),
            (Method::GET, "/delete/missing.txt", StatusCode::NOT_FOUND),
            (Method::POST, "/delete/missing.txt", StatusCode::NOT_FOUND),
            (Method::GET, "/health", StatusCode::OK),
            (Method::GET, "/health/live", StatusCode::OK),
            (Method::GET, "/health/ready", StatusCode::OK),
            (Method::GET, "/api-doc/openapi.json", StatusCode::OK),
        ];
        for (method, uri, expected) in cases {
            let request = Request::builder()
                .method(method.clone())
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), expected, "{method} {uri}");

            // A 404 must come from the store, not from an unmatched route.
            if expected == StatusCode::NOT_FOUND {
                let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
                let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
                assert_eq!(body["error"], "File not found", "{method} {uri}");
            }
        }

        let unknown = Request::builder()
            .uri("/nope")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(unknown).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let dir = TempDir::new().unwrap();
        let app = router(state_with(Config::default(), &dir));

        let response = app
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn trusted_origin_gets_cors_headers() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            cors_origins: vec!["https://app.example".to_string()],
            ..Config::default()
        };
        let app = router(state_with(config, &dir));

        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri("/")
            .header(header::ORIGIN, "https://app.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(preflight).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example"
        );

        let untrusted = Request::builder()
            .uri("/")
            .header(header::ORIGIN, "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(untrusted).await.unwrap();
        assert!(!response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[test]
    fn cors_disabled_without_valid_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_none());
        assert!(cors_layer(&["https://ok.example".to_string()]).is_some());
    }

    #[test]
    fn openapi_documents_file_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/", "/upload", "/download/{filename}", "/delete/{filename}"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
