use serde::{Deserialize, Serialize};

/// Per-request overrides
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifyOptions {
    /// Minimum score, replaces the configured threshold for this request
    #[serde(default)]
    pub threshold: Option<f32>,

    /// Cap on returned categories
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyResponse {
    /// Formatted top label, e.g. `"benign 92%"`
    pub prediction: String,
    pub top: Category,
    /// Every category above the threshold, best first
    pub classifications: Vec<Category>,
    pub threshold: f32,
    /// Model call only, milliseconds
    pub inference_time_ms: f64,
    /// Decode + preprocess + inference, seconds
    pub processing_time: f32,
}

pub use crate::image::postprocessing::{Category, Classifications};
