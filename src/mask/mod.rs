mod morphology;

pub use morphology::close;

use crate::config::MaskConfig;
use crate::segmentation::AlphaChannel;

/// Binary person mask, row-major, same size as the frame it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl PersonMask {
    /// All-background mask
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                mask.put(x as usize, y as usize, f(x, y));
            }
        }
        mask
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.at(x as usize, y as usize)
    }

    pub(crate) fn at(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width as usize + x]
    }

    pub(crate) fn put(&mut self, x: usize, y: usize, value: bool) {
        let width = self.width as usize;
        self.data[y * width + x] = value;
    }

    /// Number of person pixels
    #[cfg(test)]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// True when no pixel belongs to the person
    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&v| v)
    }

    /// Inclusive extent of person pixels as `(x_min, y_min, x_max, y_max)`
    pub fn extent(&self) -> Option<(u32, u32, u32, u32)> {
        let width = self.width as usize;
        self.data
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v)
            .map(|(i, _)| ((i % width) as u32, (i / width) as u32))
            .fold(None, |acc, (x, y)| match acc {
                None => Some((x, y, x, y)),
                Some((x0, y0, x1, y1)) => Some((x0.min(x), y0.min(y), x1.max(x), y1.max(y))),
            })
    }
}

/// Turns segmentation alpha into a clean binary person mask
///
/// Holds the previous frame's mask for temporal smoothing. Each render pass
/// owns its own processor and calls [`MaskProcessor::reset`] before the
/// first frame, so smoothing never carries over between levels or videos.
pub struct MaskProcessor {
    config: MaskConfig,
    previous: Option<PersonMask>,
}

impl MaskProcessor {
    pub fn new(config: MaskConfig) -> Self {
        Self {
            config,
            previous: None,
        }
    }

    /// Forget the previous mask
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Threshold only: no closing and no temporal blending
    pub fn threshold(&self, alpha: &AlphaChannel) -> PersonMask {
        let threshold = self.config.alpha_threshold;
        let (width, height) = alpha.dimensions();
        PersonMask::from_fn(width, height, |x, y| alpha.get_pixel(x, y)[0] > threshold)
    }

    /// Threshold, close, then blend with the previous mask
    ///
    /// The result is retained as the previous mask for the next call.
    pub fn process(&mut self, alpha: &AlphaChannel) -> PersonMask {
        let _span = tracing::debug_span!("process_mask").entered();

        let mut mask = close(&self.threshold(alpha), self.config.closing_kernel);

        if let Some(previous) = self.previous.as_ref().filter(|p| p.dimensions() == mask.dimensions()) {
            mask = self.blend(&mask, previous);
        }

        self.previous = Some(mask.clone());
        mask
    }

    fn blend(&self, current: &PersonMask, previous: &PersonMask) -> PersonMask {
        let weight = self.config.current_weight;
        let cutoff = self.config.smoothing_threshold;
        let as_unit = |v: bool| if v { 1.0f32 } else { 0.0 };

        PersonMask {
            width: current.width,
            height: current.height,
            data: current
                .data
                .iter()
                .zip(&previous.data)
                .map(|(&c, &p)| weight * as_unit(c) + (1.0 - weight) * as_unit(p) > cutoff)
                .collect(),
        }
    }
}
