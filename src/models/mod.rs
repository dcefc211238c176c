pub mod classifier;
pub mod helper;
pub mod labels;
pub mod manager;

pub use classifier::{ImageClassifier, InferenceBackend, OnnxBackend, TensorLayout};
pub use helper::{ClassificationOutput, ClassifierHelper};
pub use labels::Labels;
pub use manager::{ModelManager, ModelStats};

pub use manager::{get_classifier, get_model_stats, health_check};
