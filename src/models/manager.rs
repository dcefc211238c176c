use crate::models::ClassifierHelper;
use crate::utils::error::ClassifierError;
use crate::{Config, Result};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::Arc;

/// Process-wide owner of the shared classifier
pub struct ModelManager {
    classifier: Arc<Mutex<ClassifierHelper>>,
    config: Config,
}

static MODEL_MANAGER: OnceCell<Arc<ModelManager>> = OnceCell::new();

impl ModelManager {
    pub fn new(config: Config) -> Self {
        let helper = ClassifierHelper::new(&config);
        Self::with_helper(helper, config)
    }

    pub fn with_helper(helper: ClassifierHelper, config: Config) -> Self {
        if let Some(err) = helper.setup_error() {
            tracing::warn!("Model manager started without a loaded model: {}", err);
        }
        Self {
            classifier: Arc::new(Mutex::new(helper)),
            config,
        }
    }

    /// Initialize the global model manager
    pub fn init(config: Config) -> Result<()> {
        tracing::info!("Initializing model manager...");

        let manager = Self::new(config);

        MODEL_MANAGER
            .set(Arc::new(manager))
            .map_err(|_| ClassifierError::Internal("Model manager already initialized".to_string()))?;

        tracing::info!("Model manager initialized");
        Ok(())
    }

    pub fn instance() -> Result<Arc<ModelManager>> {
        MODEL_MANAGER
            .get()
            .cloned()
            .ok_or_else(|| ClassifierError::Internal("Model manager not initialized".to_string()))
    }

    pub fn classifier(&self) -> Arc<Mutex<ClassifierHelper>> {
        Arc::clone(&self.classifier)
    }

    /// Fails when the model is not loaded and a reload attempt also fails
    pub fn health_check(&self) -> Result<()> {
        tracing::debug!("Performing model health check...");
        let mut helper = self.classifier.lock();
        helper.ensure_ready()?;
        tracing::debug!("Model health check passed");
        Ok(())
    }

    pub fn get_stats(&self) -> ModelStats {
        let helper = self.classifier.lock();
        ModelStats {
            model_path: self.config.model_path().display().to_string(),
            model_loaded: helper.is_ready(),
            setup_error: helper.setup_error().map(str::to_string),
            threshold: helper.threshold(),
            max_results: self.config.classifier_config.max_results,
            input_size: (
                self.config.classifier_config.input_width,
                self.config.classifier_config.input_height,
            ),
            intra_threads: self.config.onnx_config.intra_threads,
            optimization_level: self.config.onnx_config.optimization_level,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelStats {
    pub model_path: String,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_error: Option<String>,
    pub threshold: f32,
    pub max_results: Option<usize>,
    pub input_size: (u32, u32),
    pub intra_threads: usize,
    pub optimization_level: i32,
}

pub fn get_classifier() -> Result<Arc<Mutex<ClassifierHelper>>> {
    Ok(ModelManager::instance()?.classifier())
}

pub fn health_check() -> Result<()> {
    ModelManager::instance()?.health_check()
}

pub fn get_model_stats() -> Result<ModelStats> {
    Ok(ModelManager::instance()?.get_stats())
}
