//! # Routes
//!
//! The bundle is loaded once and shared behind a lock that is held only
//! long enough to clone it; the forward pass runs on the blocking pool.

use crate::error::ApiError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Json, Router};
use burn::prelude::Backend;
use haneul::bundle::ModelBundle;
use haneul::predict::{PredictionReport, Predictor};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Default upload limit, 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

/// Shared request state.
#[derive(Debug)]
pub struct AppState<B: Backend> {
    bundle: Mutex<ModelBundle<B>>,
    predictor: Predictor,
}

impl<B: Backend> AppState<B> {
    /// Wrap a loaded bundle.
    pub fn new(
        bundle: ModelBundle<B>,
        predictor: Predictor,
    ) -> Self {
        Self {
            bundle: Mutex::new(bundle),
            predictor,
        }
    }

    /// A handle to the bundle, detached from the lock.
    pub fn bundle(&self) -> Result<ModelBundle<B>, ApiError> {
        self.bundle
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| ApiError::Internal("model lock poisoned".to_string()))
    }

    /// The prediction settings.
    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }
}

/// Router layering options.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Allowed CORS origins; any origin when empty.
    pub cors_origins: Vec<String>,

    /// Request body limit in bytes.
    pub max_upload_bytes: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl RouterOptions {
    /// The CORS layer for [`Self::cors_origins`].
    pub fn cors_layer(&self) -> anyhow::Result<CorsLayer> {
        if self.cors_origins.is_empty() {
            return Ok(CorsLayer::permissive());
        }
        let origins = self
            .cors_origins
            .iter()
            .map(|origin| HeaderValue::from_str(origin))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any))
    }
}

/// Build the application router.
///
/// # Errors
///
/// When a configured CORS origin is not a valid header value.
pub fn build_router<B: Backend>(
    state: Arc<AppState<B>>,
    options: &RouterOptions,
) -> anyhow::Result<Router> {
    Ok(Router::new()
        .route("/", get(root))
        .route("/health", get(health::<B>))
        .route("/predict", post(predict::<B>))
        .layer(DefaultBodyLimit::max(options.max_upload_bytes))
        .layer(options.cors_layer()?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// ``GET /`` body.
#[derive(Debug, Serialize)]
pub struct RootResponse {
    /// Liveness message.
    pub message: &'static str,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Haneul cloud classifier is running",
    })
}

/// ``GET /health`` body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always ``ok``.
    pub status: &'static str,
    /// Compute device.
    pub device: String,
    /// Architecture tag.
    pub architecture: String,
    /// Training run label, if recorded.
    pub run_name: Option<String>,
    /// Input height and width.
    pub image_size: usize,
    /// Resolved checkpoint path.
    pub checkpoint: Option<String>,
    /// Output width.
    pub num_classes: usize,
    /// Class codes in output order.
    pub classes: Vec<String>,
}

impl HealthResponse {
    /// Facts about a loaded bundle.
    pub fn describe<B: Backend>(bundle: &ModelBundle<B>) -> Self {
        Self {
            status: "ok",
            device: bundle.device_name(),
            architecture: bundle.architecture().to_string(),
            run_name: bundle.run_name().map(str::to_string),
            image_size: bundle.image_size(),
            checkpoint: bundle
                .checkpoint_path()
                .map(|path| path.display().to_string()),
            num_classes: bundle.num_classes(),
            classes: bundle.class_names().to_vec(),
        }
    }
}

async fn health<B: Backend>(
    State(state): State<Arc<AppState<B>>>
) -> Result<Json<HealthResponse>, ApiError> {
    let bundle = state.bundle()?;
    Ok(Json(HealthResponse::describe(&bundle)))
}

/// ``POST /predict`` success body.
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    /// Always true.
    pub success: bool,

    /// The classification report.
    pub result: PredictionReport,
}

async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            return Ok(field.bytes().await?.to_vec());
        }
    }
    Err(ApiError::MissingFile)
}

async fn predict<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    let start = Instant::now();
    let image_bytes = read_upload(&mut multipart).await?;

    let bundle = state.bundle()?;
    let predictor = state.predictor().clone();
    let report = tokio::task::spawn_blocking(move || bundle.report(&image_bytes, &predictor))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;

    tracing::debug!(
        top = report
            .predictions
            .first()
            .map(|entry| entry.code.as_str())
            .unwrap_or("-"),
        level = %report.confidence_level,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "prediction served"
    );
    Ok(Json(PredictResponse {
        success: true,
        result: report,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use burn::backend::NdArray;
    use haneul::models::CloudClassifier;
    use haneul::models::resnet::ResNetConfig;
    use haneul::predict::PredictorConfig;
    use http_body_util::BodyExt;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use serde_json::Value;
    use std::io::Cursor;
    use tower::ServiceExt;

    type B = NdArray<f32>;

    const BOUNDARY: &str = "haneul-test-boundary";

    fn test_router() -> Router {
        let device = Default::default();
        let network = CloudClassifier::ResNet(
            ResNetConfig::new([1, 1, 1, 1], 3)
                .with_stem_width(4)
                .init::<B>(&device),
        );
        let classes = vec!["Cu".to_string(), "Cb".to_string(), "Sc".to_string()];
        let bundle = ModelBundle::from_parts(network, classes, 32, &device)
            .unwrap()
            .with_run_name(Some("unit".to_string()));
        let state = Arc::new(AppState::new(bundle, PredictorConfig::new().init()));
        build_router(state, &RouterOptions::default()).unwrap()
    }

    fn sky_png() -> Vec<u8> {
        let image = RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 5) as u8, (y * 7) as u8, 200]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn multipart_request(
        field: &str,
        content: &[u8],
    ) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"sky.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root() {
        let response = test_router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["message"].as_str().unwrap().contains("running"));
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["architecture"], "resnet18");
        assert_eq!(body["image_size"], 32);
        assert_eq!(body["num_classes"], 3);
        assert_eq!(body["run_name"], "unit");
        assert_eq!(body["classes"][1], "Cb");
        assert!(body["checkpoint"].is_null());
    }

    #[tokio::test]
    async fn test_predict() {
        let response = test_router()
            .oneshot(multipart_request(FILE_FIELD, &sky_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        let result = &body["result"];
        assert_eq!(result["predictions"].as_array().unwrap().len(), 3);
        assert_eq!(result["meta"]["image_size"], 32);
        assert_eq!(result["meta"]["architecture"], "resnet18");
        let level = result["confidence_level"].as_str().unwrap();
        assert!(["high", "medium", "low"].contains(&level));
    }

    #[tokio::test]
    async fn test_predict_rejects_non_images() {
        let response = test_router()
            .oneshot(multipart_request(FILE_FIELD, b"plain text, not pixels"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("decode"));
    }

    #[tokio::test]
    async fn test_predict_rejects_extreme_aspect_ratio() {
        let sliver = RgbImage::from_pixel(1, 100_000, Rgb([180, 190, 250]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(sliver)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let response = test_router()
            .oneshot(multipart_request(FILE_FIELD, &bytes))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("aspect ratio"));
    }

    #[tokio::test]
    async fn test_predict_requires_file_field() {
        let response = test_router()
            .oneshot(multipart_request("photo", &sky_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[test]
    fn test_cors_origins() {
        let options = RouterOptions {
            cors_origins: vec!["https://example.org".to_string()],
            ..Default::default()
        };
        assert!(options.cors_layer().is_ok());

        let options = RouterOptions {
            cors_origins: vec!["bad\norigin".to_string()],
            ..Default::default()
        };
        assert!(options.cors_layer().is_err());
    }
}
