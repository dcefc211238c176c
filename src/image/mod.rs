pub mod loader;
pub mod postprocessing;
pub mod preprocessing;
pub mod transforms;

pub use loader::ImageLoader;
pub use postprocessing::{Category, Classifications, ResultFormatter};
pub use preprocessing::{ImageOp, ImageProcessor, PixelType, TensorImage};
pub use transforms::{ImageTransforms, ResizeMethod};
