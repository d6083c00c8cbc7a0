// ============================================================
// Layer 4 — Image Loading and Resizing
// ============================================================
// Decodes raw image bytes into a normalised CHW f32 tensor
// whose pixel count matches a fixed budget.
//
// Target shape selection:
//   A FactorTable lists every (width, height) pair whose
//   product is exactly the pixel budget (e.g. 1280×720),
//   with both sides at least MIN_EDGE (or the preset's short
//   side, when that is smaller). For an input of
//   aspect ratio r = h / w the ideal width is
//
//     edge = floor(sqrt(budget / r))
//
//   and the table entry closest to `edge` is chosen.
//
// The table is an explicit value owned by ImageResizer and
// built once when the resizer is constructed.
//
// Pixel layout of the output:
//   channel order B, G, R; value = (pixel - mean) / std
//   on the 0..255 scale.

use std::collections::BTreeMap;
use image::{imageops::FilterType, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{GroundingError, Result};

/// Smallest side allowed in the factor table.
pub const MIN_EDGE: usize = 576;

// ─── ImageTensor ──────────────────────────────────────────────────────────────
/// A (C, H, W) f32 image, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTensor {
    channels: usize,
    height:   usize,
    width:    usize,
    data:     Vec<f32>,
}

impl ImageTensor {
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != channels * height * width {
            return Err(GroundingError::invariant(format!(
                "image of shape ({channels}, {height}, {width}) needs {} values, got {}",
                channels * height * width,
                data.len()
            )));
        }
        Ok(Self { channels, height, width, data })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// One row of one channel.
    pub fn row(&self, channel: usize, y: usize) -> &[f32] {
        let start = (channel * self.height + y) * self.width;
        &self.data[start..start + self.width]
    }
}

// ─── Resolution presets ───────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    P240,
    P480,
    P720,
    P1080,
    K2,
    K4,
}

impl Resolution {
    /// (width, height)
    pub fn dims(self) -> (usize, usize) {
        match self {
            Resolution::P240  => (320, 240),
            Resolution::P480  => (720, 480),
            Resolution::P720  => (1280, 720),
            Resolution::P1080 => (1920, 1080),
            Resolution::K2    => (2560, 1440),
            Resolution::K4    => (4096, 2160),
        }
    }

    pub fn total_pixels(self) -> usize {
        let (w, h) = self.dims();
        w * h
    }
}

// ─── FactorTable ──────────────────────────────────────────────────────────────
/// Side → other side, for every factor pair of the pixel budget.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorTable {
    total_pixels: usize,
    factors:      BTreeMap<usize, usize>,
}

impl FactorTable {
    pub fn new(total_pixels: usize, min_edge: usize) -> Self {
        let mut factors = BTreeMap::new();
        let mut i       = min_edge.max(1);
        while i * i <= total_pixels {
            if total_pixels % i == 0 {
                factors.insert(i, total_pixels / i);
                factors.insert(total_pixels / i, i);
            }
            i += 1;
        }
        Self { total_pixels, factors }
    }

    /// Small presets cannot reach MIN_EDGE on both sides, so the
    /// floor drops to the preset's own short side.
    pub fn for_resolution(resolution: Resolution) -> Self {
        let (w, h) = resolution.dims();
        Self::new(resolution.total_pixels(), MIN_EDGE.min(w.min(h)))
    }

    pub fn get(&self, side: usize) -> Option<usize> {
        self.factors.get(&side).copied()
    }

    /// (width, height) from the table closest to the input's aspect ratio.
    /// Ties go to the larger side. None only when the table is empty.
    pub fn fit(&self, width: usize, height: usize) -> Option<(usize, usize)> {
        let ratio = height.max(1) as f64 / width.max(1) as f64;
        let edge  = (self.total_pixels as f64 / ratio).sqrt() as usize;

        let above = self.factors.range(edge..).next();
        let below = self.factors.range(..edge).next_back();

        let chosen = match (below, above) {
            (Some((&lo, _)), Some((&hi, _))) => if edge - lo < hi - edge { lo } else { hi },
            (None, Some((&hi, _)))           => hi,
            (Some((&lo, _)), None)           => lo,
            (None, None)                     => return None,
        };
        self.get(chosen).map(|other| (chosen, other))
    }
}

// ─── ImageTransform ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageTransform {
    /// Per-channel mean in B, G, R order (0..255 scale)
    pub pixel_mean: [f32; 3],
    /// Per-channel std in B, G, R order
    pub pixel_std:  [f32; 3],
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self {
            pixel_mean: [102.9801, 115.9465, 122.7717],
            pixel_std:  [1.0, 1.0, 1.0],
        }
    }
}

impl ImageTransform {
    /// RGB pixels → BGR CHW normalised tensor.
    pub fn apply(&self, rgb: &RgbImage) -> Result<ImageTensor> {
        let (w, h) = (rgb.width() as usize, rgb.height() as usize);
        let mut data = vec![0.0f32; 3 * h * w];

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                // channel c of the output is BGR, pixel is RGB
                let value = f32::from(pixel[2 - c]);
                data[(c * h + y) * w + x] = (value - self.pixel_mean[c]) / self.pixel_std[c];
            }
        }
        ImageTensor::new(3, h, w, data)
    }
}

// ─── ImageResizer ─────────────────────────────────────────────────────────────
/// A decoded sample image: the model input and the size of the original.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub tensor:      ImageTensor,
    /// (height, width) before resizing
    pub origin_size: [usize; 2],
}

#[derive(Debug, Clone)]
pub struct ImageResizer {
    table:     FactorTable,
    transform: ImageTransform,
}

impl ImageResizer {
    pub fn new(table: FactorTable, transform: ImageTransform) -> Self {
        Self { table, transform }
    }

    pub fn for_resolution(resolution: Resolution) -> Self {
        Self::new(FactorTable::for_resolution(resolution), ImageTransform::default())
    }

    /// Decode, resize to the table shape and normalise.
    pub fn load(&self, bytes: &[u8]) -> Result<LoadedImage> {
        let rgb = image::load_from_memory(bytes)
            .map_err(|e| GroundingError::image(format!("cannot decode image: {e}")))?
            .to_rgb8();
        self.prepare(&rgb)
    }

    pub fn prepare(&self, rgb: &RgbImage) -> Result<LoadedImage> {
        let origin_size = [rgb.height() as usize, rgb.width() as usize];
        let (w, h) = self
            .table
            .fit(rgb.width() as usize, rgb.height() as usize)
            .ok_or_else(|| GroundingError::image("factor table is empty"))?;

        tracing::trace!("resizing {}x{} → {}x{}", rgb.width(), rgb.height(), w, h);
        let resized = image::imageops::resize(rgb, w as u32, h as u32, FilterType::Triangle);

        Ok(LoadedImage { tensor: self.transform.apply(&resized)?, origin_size })
    }
}
