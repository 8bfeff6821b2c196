use super::preprocess::Preprocessor;
use super::types::{cutout, PersonSegmenter};
use crate::error::RevealError;
use anyhow::{Context, Result};
use image::{RgbImage, RgbaImage};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// U2-Net human segmentation model
///
/// Stateless: every frame is segmented independently. The first output
/// (`d0`) is the fused saliency map used as the person alpha.
pub struct U2NetSegmenter {
    session: Session,
    preprocessor: Preprocessor,
    width: u32,
    height: u32,
}

impl U2NetSegmenter {
    /// Create a new U2-Net model from an ONNX file
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file (e.g. `u2net_human_seg.onnx`)
    ///
    /// # Default Configuration
    /// - Input size: 320x320, the resolution the model was trained at
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(RevealError::InputNotFound(path.to_path_buf()))
                .context("Segmentation model is missing");
        }

        tracing::info!("Loading U2-Net model from {}", path.display());

        let builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;
        let builder = with_accelerators(builder);
        let session = builder
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!("U2-Net model loaded successfully");

        let width = 320;
        let height = 320;

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(width, height),
            width,
            height,
        })
    }
}

#[cfg(any(feature = "cuda", feature = "tensorrt"))]
fn with_accelerators(builder: ort::session::builder::SessionBuilder) -> ort::session::builder::SessionBuilder {
    use ort::execution_providers::ExecutionProviderDispatch;

    let mut providers: Vec<ExecutionProviderDispatch> = Vec::new();
    #[cfg(feature = "tensorrt")]
    providers.push(ort::execution_providers::TensorRTExecutionProvider::default().build());
    #[cfg(feature = "cuda")]
    providers.push(ort::execution_providers::CUDAExecutionProvider::default().build());

    match builder.clone().with_execution_providers(providers) {
        Ok(accelerated) => accelerated,
        Err(e) => {
            tracing::warn!("GPU execution providers unavailable, using CPU: {}", e);
            builder
        }
    }
}

#[cfg(not(any(feature = "cuda", feature = "tensorrt")))]
fn with_accelerators(builder: ort::session::builder::SessionBuilder) -> ort::session::builder::SessionBuilder {
    builder
}

impl PersonSegmenter for U2NetSegmenter {
    fn segment(&mut self, frame: &RgbImage) -> Result<RgbaImage> {
        let _span = tracing::debug_span!("u2net_segment").entered();

        let input = self.preprocessor.preprocess(frame)?;
        let shape = input.shape().to_vec();
        let (data, _) = input.into_raw_vec_and_offset();
        let tensor = Tensor::from_array((shape, data.into_boxed_slice()))
            .context("Failed to build input tensor")?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("Failed to run inference")?;
        drop(_infer_span);

        // Fused prediction d0, shape [1, 1, H, W]
        let (_, prediction) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract prediction")?;

        let expected = (self.width * self.height) as usize;
        if prediction.len() != expected {
            return Err(RevealError::SegmentationOutput(format!(
                "expected {} values, got {}",
                expected,
                prediction.len()
            ))
            .into());
        }

        let (frame_width, frame_height) = frame.dimensions();
        let alpha = Preprocessor::postprocess_prediction(
            prediction,
            self.width,
            self.height,
            frame_width,
            frame_height,
        );

        Ok(cutout(frame, &alpha))
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
