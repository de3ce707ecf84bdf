//! Image bytes to model input tensor.
//!
//! The recognition model takes a single RGB face crop of 112x112 pixels laid
//! out height-width-channel, shape `[1, 112, 112, 3]`. Enrollment and
//! verification must use the same [`PixelScale`], otherwise similarities drift
//! without any error being raised.

use image::imageops::FilterType;
use log::debug;
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::error::{PreprocessError, Result};

pub const INPUT_WIDTH: u32 = 112;
pub const INPUT_HEIGHT: u32 = 112;
pub const INPUT_CHANNELS: usize = 3;

/// Numeric range pixel values are mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelScale {
    /// `[0, 1]`
    Unit,
    /// `[-1, 1]`, what the ArcFace export was trained on.
    #[default]
    Symmetric,
}

impl PixelScale {
    #[inline]
    pub fn apply(self, value: u8) -> f32 {
        let unit = value as f32 / 255.0;
        match self {
            PixelScale::Unit => unit,
            PixelScale::Symmetric => (unit - 0.5) / 0.5,
        }
    }

    pub fn range(self) -> (f32, f32) {
        match self {
            PixelScale::Unit => (0.0, 1.0),
            PixelScale::Symmetric => (-1.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Height, width, channel.
    Hwc,
}

/// Model input, always `[1, H, W, 3]` in HWC order.
#[derive(Debug, Clone)]
pub struct Tensor {
    pub data: Array4<f32>,
    pub layout: Layout,
    pub scale: PixelScale,
}

impl Tensor {
    pub fn shape(&self) -> [usize; 4] {
        let s = self.data.shape();
        [s[0], s[1], s[2], s[3]]
    }
}

/// Decode `bytes`, cover-crop to the model input size and scale the pixels.
pub fn preprocess(bytes: &[u8], scale: PixelScale) -> Result<Tensor> {
    Ok(preprocess_inner(bytes, scale)?)
}

fn preprocess_inner(bytes: &[u8], scale: PixelScale) -> Result<Tensor, PreprocessError> {
    let img = image::load_from_memory(bytes)?;
    debug!(
        "decoded image {}x{} ({:?})",
        img.width(),
        img.height(),
        img.color()
    );

    // Cover fit: scale the short side to the target and crop the long side
    // around the center.
    let resized = img.resize_to_fill(INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let (width, height) = rgb.dimensions();
    let pixels = rgb.into_raw();
    let channels = if width == 0 || height == 0 {
        0
    } else {
        pixels.len() / (width as usize * height as usize)
    };
    if width != INPUT_WIDTH || height != INPUT_HEIGHT || channels != INPUT_CHANNELS {
        return Err(PreprocessError::Dimensions {
            width,
            height,
            channels,
            expected_width: INPUT_WIDTH,
            expected_height: INPUT_HEIGHT,
        });
    }

    // The raster is already row-major RGB, which is HWC.
    let data: Vec<f32> = pixels.into_iter().map(|p| scale.apply(p)).collect();
    let data = Array4::from_shape_vec(
        (1, INPUT_HEIGHT as usize, INPUT_WIDTH as usize, INPUT_CHANNELS),
        data,
    )?;

    Ok(Tensor {
        data,
        layout: Layout::Hwc,
        scale,
    })
}
