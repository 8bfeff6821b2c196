use anyhow::Result;
use image::{GrayImage, Luma, RgbImage, RgbaImage};

/// Alpha channel: per-pixel person confidence, 0 = background, 255 = person
/// Dimensions match the input frame dimensions
pub type AlphaChannel = GrayImage;

/// Trait for person segmentation backends
pub trait PersonSegmenter {
    /// Cut the person out of a frame
    ///
    /// # Returns
    /// * RGBA image the size of `frame`; the alpha channel carries the
    ///   per-pixel person confidence
    fn segment(&mut self, frame: &RgbImage) -> Result<RgbaImage>;

    /// Start a new render pass
    ///
    /// Called before the first frame of every level so that nothing a
    /// segmenter remembers about one video reaches the next pass. Per-frame
    /// models such as U2-Net keep nothing and use this empty default.
    fn reset_state(&mut self) {}

    /// Get the model's preferred input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);
}

/// Extract the fourth channel of a segmentation cutout
pub fn alpha_channel(cutout: &RgbaImage) -> AlphaChannel {
    let (width, height) = cutout.dimensions();
    GrayImage::from_fn(width, height, |x, y| Luma([cutout.get_pixel(x, y)[3]]))
}

/// Attach an alpha channel to a frame, producing a cutout
pub fn cutout(frame: &RgbImage, alpha: &AlphaChannel) -> RgbaImage {
    let (width, height) = frame.dimensions();
    RgbaImage::from_fn(width, height, |x, y| {
        let [r, g, b] = frame.get_pixel(x, y).0;
        image::Rgba([r, g, b, alpha.get_pixel(x, y)[0]])
    })
}
