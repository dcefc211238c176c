pub mod controller;
pub mod pipeline;
pub mod result_view;
pub mod types;

pub use controller::AnalysisController;
pub use pipeline::AnalysisPipeline;
pub use result_view::{ResultMessage, ResultView};
pub use types::{ClassifyOptions, ClassifyResponse};
