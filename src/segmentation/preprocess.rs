use super::types::AlphaChannel;
use anyhow::Result;
use image::{imageops, GrayImage, RgbImage};
use ndarray::Array4;

/// ImageNet channel statistics the U2-Net family was trained with
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Preprocessor for converting RGB images to model input tensors
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Preprocess an RGB image into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions
    /// 2. Scale by the brightest channel value in the image
    /// 3. Subtract the ImageNet mean and divide by its deviation
    /// 4. Transpose from HWC to NCHW format
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        // Resize if needed
        let resized = if image.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Lanczos3,
            )
        } else {
            image.clone()
        };

        let max = resized.as_raw().iter().copied().max().unwrap_or(0);
        let scale = (max as f32).max(1e-6);

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                let value = pixel[c] as f32 / scale;
                tensor[[0, c, y as usize, x as usize]] = (value - MEAN[c]) / STD[c];
            }
        }

        Ok(tensor)
    }

    /// Postprocess a raw prediction map back to an alpha channel at frame size
    ///
    /// The prediction is min-max normalized to [0, 255] before resizing.
    ///
    /// # Arguments
    /// * `prediction` - Flattened prediction at model resolution
    /// * `pred_width` - Width of the prediction
    /// * `pred_height` - Height of the prediction
    /// * `target_width` - Desired output width
    /// * `target_height` - Desired output height
    pub fn postprocess_prediction(
        prediction: &[f32],
        pred_width: u32,
        pred_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> AlphaChannel {
        let _span = tracing::debug_span!("postprocess").entered();

        let (min, max) = prediction
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = max - min;

        let gray = GrayImage::from_fn(pred_width, pred_height, |x, y| {
            let idx = (y * pred_width + x) as usize;
            let normalized = if range > f32::EPSILON {
                (prediction[idx] - min) / range
            } else {
                0.0
            };
            image::Luma([(normalized * 255.0).clamp(0.0, 255.0) as u8])
        });

        // If dimensions match, no resize needed
        if (pred_width, pred_height) == (target_width, target_height) {
            return gray;
        }

        imageops::resize(
            &gray,
            target_width,
            target_height,
            imageops::FilterType::Lanczos3,
        )
    }
}
