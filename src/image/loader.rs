use crate::utils::error::ClassifierError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageFormat};
use ndarray::Array3;
use std::path::Path;

/// Upper bound on encoded image size.
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

pub struct ImageLoader;

impl ImageLoader {
    /// Load an image from a base64 string, with or without a `data:` URL prefix
    pub fn from_base64(base64_data: &str) -> Result<DynamicImage> {
        let base64_clean = match base64_data.strip_prefix("data:") {
            Some(rest) => rest
                .split_once(',')
                .map(|(_, payload)| payload)
                .ok_or_else(|| ClassifierError::InvalidInput("Malformed data URL".to_string()))?,
            None => base64_data,
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?;

        Self::from_bytes(&image_bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ClassifierError::FileTooLarge(bytes.len(), MAX_IMAGE_BYTES));
        }

        if let Some(format) = Self::detect_format(bytes) {
            if !Self::is_supported_format(format) {
                return Err(ClassifierError::UnsupportedFormat(format!("{:?}", format)));
            }
        }

        let image = image::load_from_memory(bytes)?;
        Self::validate_dimensions(&image)?;

        Ok(image)
    }

    /// Load an image referenced by a filesystem path or a `file://` URI
    pub fn from_reference(reference: &str) -> Result<DynamicImage> {
        let path = reference.strip_prefix("file://").unwrap_or(reference);
        Self::from_path(Path::new(path))
    }

    pub fn from_path(path: &Path) -> Result<DynamicImage> {
        let bytes = std::fs::read(path)?;
        tracing::debug!("Read {} bytes from {}", bytes.len(), path.display());
        Self::from_bytes(&bytes)
    }

    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Bmp
                | ImageFormat::Gif
                | ImageFormat::Tiff
                | ImageFormat::WebP
        )
    }

    /// Convert to an RGB `u8` array in HWC layout
    pub fn to_array3(image: &DynamicImage) -> Result<Array3<u8>> {
        let rgb_image = image.to_rgb8();
        let (width, height) = rgb_image.dimensions();

        Array3::from_shape_vec((height as usize, width as usize, 3), rgb_image.into_raw())
            .map_err(|e| ClassifierError::ImageProcessing(format!("Invalid pixel buffer: {}", e)))
    }

    /// Any non-empty image is accepted; the preprocessing pipeline resizes it.
    pub fn validate_dimensions(image: &DynamicImage) -> Result<()> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ClassifierError::InvalidInput(format!(
                "Image has no pixels: {}x{}",
                width, height
            )));
        }
        Ok(())
    }
}
