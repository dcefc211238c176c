use crate::utils::error::ClassifierError;
use crate::Result;
use ndarray::Array3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMethod {
    NearestNeighbor,
    Bilinear,
}

/// Pixel-grid transforms over HWC `u8` arrays
pub struct ImageTransforms;

impl ImageTransforms {
    /// Resize to exactly `target_width` x `target_height`, ignoring aspect ratio
    pub fn resize(
        image: &Array3<u8>,
        target_width: usize,
        target_height: usize,
        method: ResizeMethod,
    ) -> Result<Array3<u8>> {
        let (orig_h, orig_w, _) = image.dim();
        if orig_h == 0 || orig_w == 0 {
            return Err(ClassifierError::ImageProcessing(
                "Cannot resize an empty image".to_string(),
            ));
        }
        if target_width == 0 || target_height == 0 {
            return Err(ClassifierError::ImageProcessing(format!(
                "Invalid target size {}x{}",
                target_width, target_height
            )));
        }
        if orig_w == target_width && orig_h == target_height {
            return Ok(image.clone());
        }

        Ok(match method {
            ResizeMethod::NearestNeighbor => Self::resize_nearest(image, target_width, target_height),
            ResizeMethod::Bilinear => Self::resize_bilinear(image, target_width, target_height),
        })
    }

    fn resize_nearest(image: &Array3<u8>, target_width: usize, target_height: usize) -> Array3<u8> {
        let (orig_h, orig_w, channels) = image.dim();

        Array3::from_shape_fn((target_height, target_width, channels), |(h, w, c)| {
            let src_h = (h * orig_h / target_height).min(orig_h - 1);
            let src_w = (w * orig_w / target_width).min(orig_w - 1);
            image[[src_h, src_w, c]]
        })
    }

    fn resize_bilinear(image: &Array3<u8>, target_width: usize, target_height: usize) -> Array3<u8> {
        let (orig_h, orig_w, channels) = image.dim();
        let scale_h = orig_h as f32 / target_height as f32;
        let scale_w = orig_w as f32 / target_width as f32;

        let mut resized = Array3::<u8>::zeros((target_height, target_width, channels));

        for h in 0..target_height {
            // half-pixel centers
            let src_h = ((h as f32 + 0.5) * scale_h - 0.5).max(0.0);
            let h1 = (src_h.floor() as usize).min(orig_h - 1);
            let h2 = (h1 + 1).min(orig_h - 1);
            let dh = src_h - h1 as f32;

            for w in 0..target_width {
                let src_w = ((w as f32 + 0.5) * scale_w - 0.5).max(0.0);
                let w1 = (src_w.floor() as usize).min(orig_w - 1);
                let w2 = (w1 + 1).min(orig_w - 1);
                let dw = src_w - w1 as f32;

                for c in 0..channels {
                    let v11 = image[[h1, w1, c]] as f32;
                    let v12 = image[[h1, w2, c]] as f32;
                    let v21 = image[[h2, w1, c]] as f32;
                    let v22 = image[[h2, w2, c]] as f32;

                    let interpolated = v11 * (1.0 - dh) * (1.0 - dw)
                        + v12 * (1.0 - dh) * dw
                        + v21 * dh * (1.0 - dw)
                        + v22 * dh * dw;

                    resized[[h, w, c]] = interpolated.round().clamp(0.0, 255.0) as u8;
                }
            }
        }

        resized
    }
}
