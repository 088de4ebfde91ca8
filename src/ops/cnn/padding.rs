//! Implicit padding arithmetic shared by convolution and pooling.

use derive_new::new;

/// Padding computed for one spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct ComputedPadding {
    pub begin: i32,
    pub end: i32,
}

/// Total padding needed so the output covers `ceil(input / stride)`
/// windows, split between both sides. `upper` sends the odd unit to the
/// trailing side, otherwise it goes to the leading side.
pub fn same_padding(input: i32, window: i32, stride: i32, dilation: i32, upper: bool) -> ComputedPadding {
    let out = (input + stride - 1) / stride;
    let dilated = (window - 1) * dilation + 1;
    let needed = (out - 1) * stride + dilated;
    let total = (needed - input).max(0);
    if upper {
        ComputedPadding::new(total / 2, total - total / 2)
    } else {
        ComputedPadding::new(total - total / 2, total / 2)
    }
}

/// Transposed-convolution counterpart: pads so the output size lands on
/// `input * stride` exactly.
pub fn same_padding_deconv(
    input: i32,
    window: i32,
    stride: i32,
    dilation: i32,
    output_padding: i32,
    upper: bool,
) -> ComputedPadding {
    let out = input * stride;
    let dilated = (window - 1) * dilation + 1;
    let total = stride * (input - 1) + output_padding + dilated - out;
    if upper {
        ComputedPadding::new(total / 2, total - total / 2)
    } else {
        ComputedPadding::new(total - total / 2, total / 2)
    }
}
