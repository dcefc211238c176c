pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::{
    analysis::AnalysisPipeline, models::ModelManager, utils::error::ClassifierError, Config, Result,
};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub manager: Arc<ModelManager>,
    pub pipeline: AnalysisPipeline,
}

impl AppState {
    pub fn new(config: Config, manager: Arc<ModelManager>) -> Self {
        let pipeline = AnalysisPipeline::new(manager.classifier());
        Self {
            config,
            manager,
            pipeline,
        }
    }
}

pub async fn serve(config: Config) -> Result<()> {
    // load the model once; a failed load is retried on the first request
    ModelManager::init(config.clone())?;

    let state = AppState::new(config.clone(), ModelManager::instance()?);
    let app = create_app(state);

    // parse bind address
    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        ClassifierError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /classify        - JSON base64 upload");
    tracing::info!("  POST /classify/upload - Multipart file upload");
    tracing::info!("  GET  /health          - Health check");
    tracing::info!("  GET  /api/info        - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        ClassifierError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| ClassifierError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let server_config = state.config.server_config.clone();

    Router::new()
        // classification
        .route("/classify", post(handlers::classify_json_handler))
        .route("/classify/upload", post(handlers::classify_upload_handler))
        // system
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        // axum's 2 MB extractor cap is replaced by the configured limit
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server_config.max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(server_config.request_timeout)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check; reloads the model if it is missing
async fn health_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let manager = Arc::clone(&state.manager);
    // waits on the model lock and may load the model
    tokio::task::spawn_blocking(move || manager.health_check())
        .await
        .map_err(|e| ClassifierError::Internal(format!("Health check task failed: {}", e)))??;

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// Service information and model statistics
async fn info_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let manager = Arc::clone(&state.manager);
    let stats = tokio::task::spawn_blocking(move || manager.get_stats())
        .await
        .map_err(|e| ClassifierError::Internal(format!("Info task failed: {}", e)))?;

    Ok(Json(json!({
        "service": "Asclepius image classifier",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "dev_mode": state.config.dev_mode,
        "models": stats,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::image::TensorImage;
    use crate::models::{ClassifierHelper, ImageClassifier, InferenceBackend, Labels};
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode};
    use base64::Engine;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use tower::ServiceExt;

    const BOUNDARY: &str = "asclepius-test-boundary";

    struct Fixed(Vec<f32>);

    impl InferenceBackend for Fixed {
        fn run(&mut self, _input: &TensorImage) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn app_with(helper: ClassifierHelper, config: Config) -> Router {
        let manager = Arc::new(ModelManager::with_helper(helper, config.clone()));
        create_app(AppState::new(config, manager))
    }

    fn broken_app() -> Router {
        let helper = ClassifierHelper::with_setup(0.3, || {
            Err(ClassifierError::ModelSetup("no model in tests".to_string()))
        });
        app_with(helper, Config::default())
    }

    fn working_helper() -> ClassifierHelper {
        ClassifierHelper::with_setup(0.3, || {
            Ok(ImageClassifier::with_backend(
                Box::new(Fixed(vec![0.92, 0.08])),
                Labels::from_lines("benign\nmalignant"),
                &ClassifierConfig::default(),
            ))
        })
    }

    fn working_app() -> Router {
        app_with(working_helper(), Config::default())
    }

    fn png(image: RgbImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    /// Noise does not compress, so the PNG stays close to 3 bytes per pixel
    fn noisy_png(width: u32, height: u32) -> Vec<u8> {
        let mut state: u32 = 0x9E37_79B9;
        png(RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [r, g, b, _] = state.to_le_bytes();
            Rgb([r, g, b])
        }))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/classify")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// (field name, content type of a file field, payload)
    fn post_multipart(fields: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, content_type, payload) in fields {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match content_type {
                Some(content_type) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"upload\"\r\nContent-Type: {}\r\n\r\n",
                        name, content_type
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(payload);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/classify/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn empty_image_is_rejected_before_inference() {
        let response = broken_app()
            .oneshot(post_json(r#"{"image": ""}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let response = broken_app().oneshot(post_json("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn model_setup_failure_is_service_unavailable() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png(RgbImage::new(8, 8)));

        let body = format!(r#"{{"image": "{}"}}"#, encoded);
        let response = broken_app().oneshot(post_json(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn json_classify_returns_prediction() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png(RgbImage::new(8, 8)));

        let body = format!(r#"{{"image": "{}"}}"#, encoded);
        let response = working_app().oneshot(post_json(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["prediction"], "benign 92%");
    }

    #[tokio::test]
    async fn json_image_larger_than_two_megabytes_is_accepted() {
        let image = noisy_png(1024, 1024);
        assert!(image.len() > 3 * 1024 * 1024 - 100_000);
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);

        let body = format!(r#"{{"image": "{}"}}"#, encoded);
        let response = working_app().oneshot(post_json(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upload_larger_than_two_megabytes_is_accepted() {
        let image = noisy_png(1024, 1024);
        let response = working_app()
            .oneshot(post_multipart(&[("file", Some("image/png"), &image)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn body_over_configured_limit_is_payload_too_large() {
        let mut config = Config::default();
        config.server_config.max_request_size = 1024;
        let app = app_with(working_helper(), config);

        let body = format!(r#"{{"image": "{}"}}"#, "A".repeat(4096));
        let response = app.oneshot(post_json(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn upload_returns_prediction() {
        let image = png(RgbImage::new(16, 16));
        let response = working_app()
            .oneshot(post_multipart(&[
                ("file", Some("image/png"), &image),
                ("threshold", None, b"0.5"),
                ("max_results", None, b"1"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["data"]["prediction"], "benign 92%");
        assert_eq!(json["data"]["classifications"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upload_rejects_non_image_content_type() {
        let response = working_app()
            .oneshot(post_multipart(&[("file", Some("text/plain"), b"hello")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn upload_rejects_empty_file() {
        let response = working_app()
            .oneshot(post_multipart(&[("file", Some("image/png"), b"")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_rejects_out_of_range_threshold() {
        let image = png(RgbImage::new(16, 16));
        let response = working_app()
            .oneshot(post_multipart(&[
                ("file", Some("image/png"), &image),
                ("threshold", None, b"1.5"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_rejects_malformed_max_results() {
        let image = png(RgbImage::new(16, 16));
        for value in [&b"many"[..], b"0"] {
            let response = working_app()
                .oneshot(post_multipart(&[
                    ("file", Some("image/png"), &image),
                    ("max_results", None, value),
                ]))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn upload_without_file_is_bad_request() {
        let response = working_app()
            .oneshot(post_multipart(&[("threshold", None, b"0.5")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = json_body(response).await;
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("No image file provided"));
    }

    #[tokio::test]
    async fn health_reflects_model_state() {
        let response = working_app().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");

        let response = broken_app().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn info_reports_model_stats() {
        let response = broken_app().oneshot(get_request("/api/info")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["models"]["model_loaded"], false);
        assert_eq!(json["models"]["setup_error"], "no model in tests");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = broken_app().oneshot(get_request("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
