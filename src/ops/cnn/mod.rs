//! 2D convolution and pooling.

mod conv;
mod padding;
mod pool;

pub use conv::{Conv2d, Conv2dOptions, ConvTranspose2d, ConvTranspose2dOptions};
pub use padding::{same_padding, ComputedPadding};
pub use pool::{Pool2d, Pool2dKind, Pool2dOptions};

/// Implicit padding policy for convolutions and pooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoPad {
    /// Use the caller-supplied `[top, bottom, left, right]` padding.
    #[default]
    Explicit,
    /// Pad so output size matches `ceil(input / stride)`, extra unit on the
    /// trailing side.
    SameUpper,
    /// Same, extra unit on the leading side.
    SameLower,
}

/// Memory layout of 4D image tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputLayout {
    #[default]
    Nchw,
    Nhwc,
}

impl InputLayout {
    /// Dissects a 4D shape into (batch, channels, height, width).
    pub fn dissect(&self, shape: &[i32]) -> (i32, i32, i32, i32) {
        match self {
            InputLayout::Nchw => (shape[0], shape[1], shape[2], shape[3]),
            InputLayout::Nhwc => (shape[0], shape[3], shape[1], shape[2]),
        }
    }

    /// Rebuilds a 4D shape from (batch, channels, height, width).
    pub fn assemble(&self, n: i32, c: i32, h: i32, w: i32) -> [i32; 4] {
        match self {
            InputLayout::Nchw => [n, c, h, w],
            InputLayout::Nhwc => [n, h, w, c],
        }
    }
}

/// Filter layout for direct convolution: where the output channel, input
/// depth and spatial axes sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conv2dFilterLayout {
    #[default]
    Oihw,
    Hwio,
    Ohwi,
    Ihwo,
}

/// Filter layout for transposed convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvTranspose2dFilterLayout {
    #[default]
    Iohw,
    Hwoi,
    Ohwi,
}

/// Output size rounding for pooling windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingType {
    #[default]
    Floor,
    Ceil,
}
