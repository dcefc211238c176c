use crate::config::ClassifierConfig;
use crate::image::{ImageLoader, ImageTransforms, ResizeMethod};
use crate::utils::error::ClassifierError;
use crate::Result;
use image::DynamicImage;
use ndarray::Array3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    Uint8,
    Float32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageOp {
    Resize {
        width: usize,
        height: usize,
        method: ResizeMethod,
    },
    Cast(PixelType),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Uint8(Array3<u8>),
    Float32(Array3<f32>),
}

/// Preprocessed image in HWC layout
#[derive(Debug, Clone, PartialEq)]
pub struct TensorImage {
    data: TensorData,
}

impl TensorImage {
    pub fn from_image(image: &DynamicImage) -> Result<Self> {
        Ok(Self {
            data: TensorData::Uint8(ImageLoader::to_array3(image)?),
        })
    }

    pub fn from_array(array: Array3<u8>) -> Self {
        Self {
            data: TensorData::Uint8(array),
        }
    }

    pub fn pixel_type(&self) -> PixelType {
        match self.data {
            TensorData::Uint8(_) => PixelType::Uint8,
            TensorData::Float32(_) => PixelType::Float32,
        }
    }

    /// (height, width, channels)
    pub fn dim(&self) -> (usize, usize, usize) {
        match &self.data {
            TensorData::Uint8(a) => a.dim(),
            TensorData::Float32(a) => a.dim(),
        }
    }

    pub fn to_u8(&self) -> Array3<u8> {
        match &self.data {
            TensorData::Uint8(a) => a.clone(),
            TensorData::Float32(a) => a.mapv(|v| v.round().clamp(0.0, 255.0) as u8),
        }
    }

    /// Values in [0, 255], or [0, 1] when `normalize` is set
    pub fn to_f32(&self, normalize: bool) -> Array3<f32> {
        let scale = if normalize { 1.0 / 255.0 } else { 1.0 };
        match &self.data {
            TensorData::Uint8(a) => a.mapv(|v| v as f32 * scale),
            TensorData::Float32(a) => a.mapv(|v| v * scale),
        }
    }
}

/// Ordered chain of preprocessing ops applied before inference
#[derive(Debug, Clone, Default)]
pub struct ImageProcessor {
    ops: Vec<ImageOp>,
}

impl ImageProcessor {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn add(mut self, op: ImageOp) -> Self {
        self.ops.push(op);
        self
    }

    /// Resize to the model input size and cast to 8-bit channels
    pub fn for_config(config: &ClassifierConfig) -> Self {
        Self::builder()
            .add(ImageOp::Resize {
                width: config.input_width as usize,
                height: config.input_height as usize,
                method: config.resize_method,
            })
            .add(ImageOp::Cast(PixelType::Uint8))
    }

    pub fn process(&self, image: &DynamicImage) -> Result<TensorImage> {
        let mut tensor = TensorImage::from_image(image)?;
        for op in &self.ops {
            tensor = Self::apply(tensor, op)?;
        }
        Ok(tensor)
    }

    fn apply(tensor: TensorImage, op: &ImageOp) -> Result<TensorImage> {
        let data = match (*op, tensor.data) {
            (ImageOp::Resize { width, height, method }, TensorData::Uint8(array)) => {
                TensorData::Uint8(ImageTransforms::resize(&array, width, height, method)?)
            }
            (ImageOp::Resize { .. }, TensorData::Float32(_)) => {
                return Err(ClassifierError::ImageProcessing(
                    "Resize must run before casting to float".to_string(),
                ))
            }
            (ImageOp::Cast(PixelType::Uint8), TensorData::Float32(array)) => {
                TensorData::Uint8(array.mapv(|v| v.round().clamp(0.0, 255.0) as u8))
            }
            (ImageOp::Cast(PixelType::Float32), TensorData::Uint8(array)) => {
                TensorData::Float32(array.mapv(|v| v as f32))
            }
            (ImageOp::Cast(_), data) => data,
        };
        Ok(TensorImage { data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    #[test]
    fn default_pipeline_yields_224_square_u8() {
        let processor = ImageProcessor::for_config(&ClassifierConfig::default());
        for (w, h) in [(1, 1), (640, 480), (100, 900), (224, 224)] {
            let tensor = processor.process(&solid(w, h, [1, 2, 3])).unwrap();
            assert_eq!(tensor.dim(), (224, 224, 3));
            assert_eq!(tensor.pixel_type(), PixelType::Uint8);
        }
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let processor = ImageProcessor::for_config(&ClassifierConfig::default());
        let tensor = processor.process(&solid(31, 17, [200, 100, 50])).unwrap();
        let array = tensor.to_u8();
        assert!(array.outer_iter().all(|row| row
            .outer_iter()
            .all(|px| px.to_vec() == vec![200, 100, 50])));
    }

    #[test]
    fn grayscale_input_is_expanded_to_rgb() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(10, 10, image::Luma([9])));
        let tensor = ImageProcessor::for_config(&ClassifierConfig::default())
            .process(&gray)
            .unwrap();
        assert_eq!(tensor.dim().2, 3);
    }

    #[test]
    fn float_cast_then_normalize() {
        let processor = ImageProcessor::builder().add(ImageOp::Cast(PixelType::Float32));
        let tensor = processor.process(&solid(2, 2, [255, 0, 51])).unwrap();
        assert_eq!(tensor.pixel_type(), PixelType::Float32);
        let normalized = tensor.to_f32(true);
        assert!((normalized[[0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((normalized[[0, 0, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn resize_after_float_cast_is_an_error() {
        let processor = ImageProcessor::builder()
            .add(ImageOp::Cast(PixelType::Float32))
            .add(ImageOp::Resize {
                width: 4,
                height: 4,
                method: ResizeMethod::Bilinear,
            });
        assert!(processor.process(&solid(2, 2, [0, 0, 0])).is_err());
    }
}
