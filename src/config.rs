use crate::image::ResizeMethod;
use crate::models::TensorLayout;
use crate::utils::error::ClassifierError;
use crate::Result;
use std::path::PathBuf;

/// Default score threshold below which labels are dropped.
pub const DEFAULT_THRESHOLD: f32 = 0.3;

/// Default model file name inside the models directory.
pub const DEFAULT_MODEL_FILE: &str = "cancer_classification.onnx";

/// Default labels file name inside the models directory.
pub const DEFAULT_LABELS_FILE: &str = "labels.txt";

#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,

    /// Directory holding the model and labels files
    pub models_dir: PathBuf,

    /// Model file name, relative to `models_dir` unless absolute
    pub model_file: PathBuf,

    /// Labels file name, relative to `models_dir` unless absolute
    pub labels_file: PathBuf,

    /// Worker threads for the async runtime
    pub workers: usize,

    /// Development mode
    pub dev_mode: bool,

    /// ONNX Runtime settings
    pub onnx_config: OnnxConfig,

    /// Preprocessing and scoring settings
    pub classifier_config: ClassifierConfig,

    /// HTTP server settings
    pub server_config: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU threads used by a single inference call
    pub intra_threads: usize,

    /// Graph optimization level (0-3)
    pub optimization_level: i32,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Minimum score for a label to be returned
    pub threshold: f32,

    /// Cap on returned labels, `None` keeps all of them
    pub max_results: Option<usize>,

    /// Model input width in pixels
    pub input_width: u32,

    /// Model input height in pixels
    pub input_height: u32,

    pub resize_method: ResizeMethod,

    /// Tensor layout the model expects
    pub layout: TensorLayout,

    /// Scale `f32` inputs to [0, 1] instead of [0, 255]
    pub normalize: bool,

    /// Apply softmax to raw model outputs
    pub apply_softmax: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Request timeout in seconds
    pub request_timeout: u64,

    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_results: None,
            input_width: 224,
            input_height: 224,
            resize_method: ResizeMethod::NearestNeighbor,
            layout: TensorLayout::Nhwc,
            normalize: false,
            apply_softmax: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::build("0.0.0.0:5005".to_string(), "models".to_string(), None, false)
    }
}

impl Config {
    pub fn new(
        bind_addr: String,
        models_dir: String,
        workers: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        if models_dir.trim().is_empty() {
            return Err(ClassifierError::Config(
                "Models directory must not be empty".to_string(),
            ));
        }
        Ok(Self::build(bind_addr, models_dir, workers, dev_mode))
    }

    fn build(bind_addr: String, models_dir: String, workers: Option<usize>, dev_mode: bool) -> Self {
        let cpu_cores = num_cpus::get();

        // at most 4 inference threads
        let onnx_config = OnnxConfig {
            intra_threads: cpu_cores.min(4).max(1),
            optimization_level: 3,
        };

        // dev mode allows slow requests
        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 },
            max_request_size: 50 * 1024 * 1024, // 50MB
        };

        Self {
            bind_addr,
            models_dir: PathBuf::from(models_dir),
            model_file: PathBuf::from(DEFAULT_MODEL_FILE),
            labels_file: PathBuf::from(DEFAULT_LABELS_FILE),
            workers: workers.unwrap_or(cpu_cores),
            dev_mode,
            onnx_config,
            classifier_config: ClassifierConfig::default(),
            server_config,
        }
    }

    pub fn with_model_file(mut self, model_file: impl Into<PathBuf>) -> Self {
        self.model_file = model_file.into();
        self
    }

    pub fn with_labels_file(mut self, labels_file: impl Into<PathBuf>) -> Self {
        self.labels_file = labels_file.into();
        self
    }

    /// Fails if `threshold` is outside [0, 1]
    pub fn with_threshold(mut self, threshold: f32) -> Result<Self> {
        validate_threshold(threshold)?;
        self.classifier_config.threshold = threshold;
        Ok(self)
    }

    /// `Some(0)` means no cap
    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.classifier_config.max_results = max_results.filter(|n| *n > 0);
        self
    }

    pub fn with_intra_threads(mut self, threads: Option<usize>) -> Self {
        if let Some(threads) = threads {
            self.onnx_config.intra_threads = threads.max(1);
        }
        self
    }

    pub fn with_layout(mut self, layout: TensorLayout) -> Self {
        self.classifier_config.layout = layout;
        self
    }

    pub fn with_softmax(mut self, apply_softmax: bool) -> Self {
        self.classifier_config.apply_softmax = apply_softmax;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.classifier_config.normalize = normalize;
        self
    }

    /// Model file path
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(&self.model_file)
    }

    /// Labels file path
    pub fn labels_path(&self) -> PathBuf {
        self.models_dir.join(&self.labels_file)
    }
}

/// Score thresholds are probabilities; NaN is rejected too
pub fn validate_threshold(threshold: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ClassifierError::Config(format!(
            "Threshold must be between 0.0 and 1.0, got {}",
            threshold
        )));
    }
    Ok(())
}
