pub mod analysis;
pub mod config;
pub mod image;
pub mod models;
pub mod utils;
pub mod web;

pub use analysis::{AnalysisController, ResultMessage, ResultView};
pub use config::Config;
pub use models::{ClassifierHelper, ImageClassifier};
pub use utils::error::ClassifierError;

pub type Result<T> = std::result::Result<T, ClassifierError>;
