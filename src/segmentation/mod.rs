mod preprocess;
pub mod types;
mod u2net;

pub use types::{alpha_channel, AlphaChannel, PersonSegmenter};
pub use u2net::U2NetSegmenter;

use anyhow::Result;

/// Create the default person segmentation model (U2-Net human)
pub fn create_default_model(model_path: &str) -> Result<Box<dyn PersonSegmenter>> {
    let model = U2NetSegmenter::new(model_path)?;
    Ok(Box::new(model))
}
