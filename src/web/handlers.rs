use crate::{
    analysis::{ClassifyOptions, ClassifyResponse},
    utils::error::ClassifierError,
    web::{extractors::{RequestId, ValidatedJson}, AppState},
    Result,
};
use axum::{
    extract::{multipart::Field, Multipart, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// JSON request body (base64 mode)
#[derive(Debug, Deserialize)]
pub struct ClassifyJsonRequest {
    /// Base64 image, optionally as a data URL
    pub image: String,

    #[serde(default)]
    pub threshold: Option<f32>,

    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: String,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

pub async fn classify_json_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<ClassifyJsonRequest>,
) -> Result<Json<ApiResponse<ClassifyResponse>>> {
    let start_time = Instant::now();

    tracing::info!(
        "Processing JSON classify request: request_id={}, threshold={:?}",
        request_id,
        request.threshold
    );

    let options = ClassifyOptions {
        threshold: request.threshold,
        max_results: request.max_results,
    };

    let result = state.pipeline.process_base64(&request.image, options).await?;

    tracing::info!(
        "JSON classify completed: request_id={}, prediction='{}', time={:.3}s",
        request_id,
        result.prediction,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::success(result, request_id)))
}

pub async fn classify_upload_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ClassifyResponse>>> {
    let start_time = Instant::now();

    tracing::info!("Processing multipart classify request: request_id={}", request_id);

    let mut image_data: Option<axum::body::Bytes> = None;
    let mut options = ClassifyOptions::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ClassifierError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                if let Some(content_type) = field.content_type() {
                    if !content_type.starts_with("image/") {
                        return Err(ClassifierError::UnsupportedFormat(content_type.to_string()));
                    }
                }

                let data = field.bytes().await.map_err(|e| {
                    ClassifierError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                if data.is_empty() {
                    return Err(ClassifierError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file: {} bytes", data.len());
                image_data = Some(data);
            }
            "threshold" => {
                let value = field_text(field).await?;
                let threshold = value.trim().parse::<f32>().map_err(|_| {
                    ClassifierError::InvalidInput(format!("Invalid threshold: {}", value))
                })?;
                crate::config::validate_threshold(threshold)
                    .map_err(|e| ClassifierError::InvalidInput(e.to_string()))?;
                options.threshold = Some(threshold);
            }
            "max_results" => {
                let value = field_text(field).await?;
                let max_results = value
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        ClassifierError::InvalidInput(format!(
                            "max_results must be a positive integer, got {}",
                            value
                        ))
                    })?;
                options.max_results = Some(max_results);
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let image_data = image_data
        .ok_or_else(|| ClassifierError::InvalidInput("No image file provided".to_string()))?;

    let result = state.pipeline.process_bytes(&image_data, options).await?;

    tracing::info!(
        "Upload classify completed: request_id={}, prediction='{}', time={:.3}s",
        request_id,
        result.prediction,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::success(result, request_id)))
}

async fn field_text(field: Field<'_>) -> Result<String> {
    let name = field.name().unwrap_or("unknown").to_string();
    field.text().await.map_err(|e| {
        ClassifierError::InvalidInput(format!("Failed to read field {}: {}", name, e))
    })
}
