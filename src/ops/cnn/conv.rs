//! Direct and transposed 2D convolution.

use crate::backend::BackendGraph;
use crate::datum::DatumType;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::operand::Operand;
use crate::ops::activation::{check_fused_activation, Activation};
use crate::ops::cnn::padding::{same_padding, same_padding_deconv, ComputedPadding};
use crate::ops::cnn::{AutoPad, Conv2dFilterLayout, ConvTranspose2dFilterLayout, InputLayout};
use crate::ops::{all_positive, all_same_datum_type, check_rank, InputRef, Operator};
use crate::{ensure_valid, tvec, GraphError, TVec};

#[derive(Debug, Clone)]
pub struct Conv2dOptions {
    /// `[top, bottom, left, right]`, used when `auto_pad` is `Explicit`.
    pub padding: [i32; 4],
    pub strides: [i32; 2],
    pub dilations: [i32; 2],
    pub auto_pad: AutoPad,
    pub groups: i32,
    pub input_layout: InputLayout,
    pub filter_layout: Conv2dFilterLayout,
    pub bias: Option<Operand>,
    pub activation: Option<Activation>,
}

impl Default for Conv2dOptions {
    fn default() -> Conv2dOptions {
        Conv2dOptions {
            padding: [0; 4],
            strides: [1, 1],
            dilations: [1, 1],
            auto_pad: AutoPad::Explicit,
            groups: 1,
            input_layout: InputLayout::Nchw,
            filter_layout: Conv2dFilterLayout::Oihw,
            bias: None,
            activation: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConvTranspose2dOptions {
    pub padding: [i32; 4],
    pub strides: [i32; 2],
    pub dilations: [i32; 2],
    pub auto_pad: AutoPad,
    pub groups: i32,
    pub input_layout: InputLayout,
    pub filter_layout: ConvTranspose2dFilterLayout,
    /// Extra rows/columns appended to the output, per spatial axis.
    pub output_padding: [i32; 2],
    /// Explicit output spatial sizes, overriding the computed ones.
    pub output_sizes: Option<[i32; 2]>,
    pub bias: Option<Operand>,
    pub activation: Option<Activation>,
}

impl Default for ConvTranspose2dOptions {
    fn default() -> ConvTranspose2dOptions {
        ConvTranspose2dOptions {
            padding: [0; 4],
            strides: [1, 1],
            dilations: [1, 1],
            auto_pad: AutoPad::Explicit,
            groups: 1,
            input_layout: InputLayout::Nchw,
            filter_layout: ConvTranspose2dFilterLayout::Iohw,
            output_padding: [0, 0],
            output_sizes: None,
            bias: None,
            activation: None,
        }
    }
}

/// Geometry common to both convolution flavors, extracted from the input
/// and filter facts.
struct ConvGeometry {
    datum_type: DatumType,
    batch: i32,
    input_spatial: [i32; 2],
    filter_spatial: [i32; 2],
    output_channels: i32,
}

#[allow(clippy::too_many_arguments)]
fn conv_geometry(
    inputs: &[InputRef],
    has_bias: bool,
    strides: &[i32; 2],
    dilations: &[i32; 2],
    padding: &[i32; 4],
    groups: i32,
    input_layout: InputLayout,
    dissect_filter: impl Fn(&[i32]) -> (i32, i32, i32, i32),
    activation: Option<&Activation>,
) -> GraphResult<ConvGeometry> {
    let expected = 2 + has_bias as usize;
    if inputs.len() != expected {
        return Err(GraphError::Internal("convolution wired with wrong arity".to_string()));
    }
    let datum_type = all_same_datum_type(inputs)?;
    let (input, filter) = (inputs[0].fact, inputs[1].fact);
    check_rank("input", input, 4)?;
    check_rank("filter", filter, 4)?;
    if has_bias {
        check_rank("bias", inputs[2].fact, 1)?;
    }
    all_positive("strides", strides)?;
    all_positive("dilations", dilations)?;
    ensure_valid!(padding.iter().all(|&p| p >= 0), "padding must not be negative (got {:?})", padding);
    ensure_valid!(groups > 0, "groups must be positive (got {})", groups);
    if let Some(activation) = activation {
        check_fused_activation(activation)?;
    }

    let (batch, input_channels, in_h, in_w) = input_layout.dissect(&input.shape);
    let (filter_h, filter_w, output_channels, filter_depth_in) = dissect_filter(&filter.shape);
    ensure_valid!(
        filter_depth_in == input_channels / groups,
        "groups must evenly divide the input channels ({} filter depth vs {} channels / {} groups)",
        filter_depth_in,
        input_channels,
        groups
    );
    Ok(ConvGeometry {
        datum_type,
        batch,
        input_spatial: [in_h, in_w],
        filter_spatial: [filter_h, filter_w],
        output_channels,
    })
}

fn explicit_padding(padding: &[i32; 4], axis: usize) -> ComputedPadding {
    ComputedPadding::new(padding[axis * 2], padding[axis * 2 + 1])
}

/// 2D convolution with optional grouped channels, fused bias and fused
/// activation.
#[derive(Debug, Clone)]
pub struct Conv2d {
    pub padding: [i32; 4],
    pub strides: [i32; 2],
    pub dilations: [i32; 2],
    pub auto_pad: AutoPad,
    pub groups: i32,
    pub input_layout: InputLayout,
    pub filter_layout: Conv2dFilterLayout,
    pub has_bias: bool,
    pub activation: Option<Activation>,
}

impl Conv2d {
    pub fn from_options(options: &Conv2dOptions) -> Conv2d {
        Conv2d {
            padding: options.padding,
            strides: options.strides,
            dilations: options.dilations,
            auto_pad: options.auto_pad,
            groups: options.groups,
            input_layout: options.input_layout,
            filter_layout: options.filter_layout,
            has_bias: options.bias.is_some(),
            activation: options.activation,
        }
    }

    fn dissect_filter(layout: Conv2dFilterLayout, shape: &[i32]) -> (i32, i32, i32, i32) {
        // (height, width, output channels, input depth)
        match layout {
            Conv2dFilterLayout::Oihw => (shape[2], shape[3], shape[0], shape[1]),
            Conv2dFilterLayout::Hwio => (shape[0], shape[1], shape[3], shape[2]),
            Conv2dFilterLayout::Ohwi => (shape[1], shape[2], shape[0], shape[3]),
            Conv2dFilterLayout::Ihwo => (shape[1], shape[2], shape[3], shape[0]),
        }
    }
}

impl Operator for Conv2d {
    fn name(&self) -> &'static str {
        "Conv2d"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let geo = conv_geometry(
            inputs,
            self.has_bias,
            &self.strides,
            &self.dilations,
            &self.padding,
            self.groups,
            self.input_layout,
            |shape| Self::dissect_filter(self.filter_layout, shape),
            self.activation.as_ref(),
        )?;
        let mut spatial = [0i32; 2];
        for axis in 0..2 {
            let input = geo.input_spatial[axis];
            let window = geo.filter_spatial[axis];
            let dilated = (window - 1) * self.dilations[axis] + 1;
            let pad = match self.auto_pad {
                AutoPad::Explicit => explicit_padding(&self.padding, axis),
                AutoPad::SameUpper => {
                    same_padding(input, window, self.strides[axis], self.dilations[axis], true)
                }
                AutoPad::SameLower => {
                    same_padding(input, window, self.strides[axis], self.dilations[axis], false)
                }
            };
            let span = input - dilated + pad.begin + pad.end;
            ensure_valid!(
                span >= 0,
                "convolution window ({} dilated) does not fit the padded input ({})",
                dilated,
                input + pad.begin + pad.end
            );
            spatial[axis] = 1 + span / self.strides[axis];
        }
        let shape = self.input_layout.assemble(
            geo.batch,
            geo.output_channels,
            spatial[0],
            spatial[1],
        );
        Ok(tvec!(OperandFact::dt_shape(geo.datum_type, shape)))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_conv2d(node, self)
    }
}

/// Transposed 2D convolution.
#[derive(Debug, Clone)]
pub struct ConvTranspose2d {
    pub padding: [i32; 4],
    pub strides: [i32; 2],
    pub dilations: [i32; 2],
    pub auto_pad: AutoPad,
    pub groups: i32,
    pub input_layout: InputLayout,
    pub filter_layout: ConvTranspose2dFilterLayout,
    pub output_padding: [i32; 2],
    pub output_sizes: Option<[i32; 2]>,
    pub has_bias: bool,
    pub activation: Option<Activation>,
}

impl ConvTranspose2d {
    pub fn from_options(options: &ConvTranspose2dOptions) -> ConvTranspose2d {
        ConvTranspose2d {
            padding: options.padding,
            strides: options.strides,
            dilations: options.dilations,
            auto_pad: options.auto_pad,
            groups: options.groups,
            input_layout: options.input_layout,
            filter_layout: options.filter_layout,
            output_padding: options.output_padding,
            output_sizes: options.output_sizes,
            has_bias: options.bias.is_some(),
            activation: options.activation,
        }
    }

    fn dissect_filter(layout: ConvTranspose2dFilterLayout, shape: &[i32]) -> (i32, i32, i32, i32) {
        // (height, width, output channels, input depth)
        match layout {
            ConvTranspose2dFilterLayout::Iohw => (shape[2], shape[3], shape[1], shape[0]),
            ConvTranspose2dFilterLayout::Hwoi => (shape[0], shape[1], shape[2], shape[3]),
            ConvTranspose2dFilterLayout::Ohwi => (shape[1], shape[2], shape[0], shape[3]),
        }
    }
}

impl Operator for ConvTranspose2d {
    fn name(&self) -> &'static str {
        "ConvTranspose2d"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let geo = conv_geometry(
            inputs,
            self.has_bias,
            &self.strides,
            &self.dilations,
            &self.padding,
            self.groups,
            self.input_layout,
            |shape| Self::dissect_filter(self.filter_layout, shape),
            self.activation.as_ref(),
        )?;
        ensure_valid!(
            self.output_padding.iter().all(|&p| p >= 0),
            "output padding must not be negative (got {:?})",
            self.output_padding
        );
        let mut spatial = [0i32; 2];
        if let Some(sizes) = self.output_sizes {
            ensure_valid!(
                sizes.iter().all(|&s| s > 0),
                "output sizes must be positive (got {:?})",
                sizes
            );
            spatial = sizes;
        } else {
            for axis in 0..2 {
                let input = geo.input_spatial[axis];
                let window = geo.filter_spatial[axis];
                let dilated = (window - 1) * self.dilations[axis] + 1;
                let pad = match self.auto_pad {
                    AutoPad::Explicit => explicit_padding(&self.padding, axis),
                    AutoPad::SameUpper => same_padding_deconv(
                        input,
                        window,
                        self.strides[axis],
                        self.dilations[axis],
                        self.output_padding[axis],
                        true,
                    ),
                    AutoPad::SameLower => same_padding_deconv(
                        input,
                        window,
                        self.strides[axis],
                        self.dilations[axis],
                        self.output_padding[axis],
                        false,
                    ),
                };
                let out = self.strides[axis] * (input - 1) + self.output_padding[axis] + dilated
                    - pad.begin
                    - pad.end;
                ensure_valid!(out > 0, "computed output size is not positive ({})", out);
                spatial[axis] = out;
            }
        }
        let shape = self.input_layout.assemble(
            geo.batch,
            geo.output_channels,
            spatial[0],
            spatial[1],
        );
        Ok(tvec!(OperandFact::dt_shape(geo.datum_type, shape)))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_conv_transpose2d(node, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(op: &Conv2d, input: &[i32], filter: &[i32]) -> GraphResult<TVec<i32>> {
        let fi = OperandFact::dt_shape(DatumType::F32, input);
        let ff = OperandFact::dt_shape(DatumType::F32, filter);
        let inputs = [InputRef { fact: &fi, op }, InputRef { fact: &ff, op }];
        op.output_facts(&inputs).map(|f| f[0].shape.clone())
    }

    #[test]
    fn valid_convolution() {
        // 3x3 filter over 4x4 input, no padding: 2x2 output
        let op = Conv2d::from_options(&Conv2dOptions::default());
        assert_eq!(infer(&op, &[1, 3, 4, 4], &[2, 3, 3, 3]).unwrap(), tvec![1, 2, 2, 2]);
    }

    #[test]
    fn same_upper_preserves_spatial_size() {
        let op = Conv2d::from_options(&Conv2dOptions {
            auto_pad: AutoPad::SameUpper,
            ..Conv2dOptions::default()
        });
        assert_eq!(infer(&op, &[1, 3, 5, 5], &[2, 3, 3, 3]).unwrap(), tvec![1, 2, 5, 5]);
    }

    #[test]
    fn nhwc_layouts() {
        let op = Conv2d::from_options(&Conv2dOptions {
            input_layout: InputLayout::Nhwc,
            filter_layout: Conv2dFilterLayout::Hwio,
            ..Conv2dOptions::default()
        });
        assert_eq!(infer(&op, &[1, 4, 4, 3], &[3, 3, 3, 2]).unwrap(), tvec![1, 2, 2, 2]);
    }

    #[test]
    fn group_mismatch_is_rejected() {
        let op = Conv2d::from_options(&Conv2dOptions { groups: 2, ..Conv2dOptions::default() });
        assert!(infer(&op, &[1, 4, 4, 4], &[2, 3, 3, 3]).is_err());
        assert!(infer(&op, &[1, 4, 4, 4], &[2, 2, 3, 3]).is_ok());
    }

    #[test]
    fn oversized_window_is_rejected() {
        let op = Conv2d::from_options(&Conv2dOptions::default());
        assert!(infer(&op, &[1, 3, 2, 2], &[2, 3, 3, 3]).is_err());
    }

    #[test]
    fn transpose_upsamples() {
        // stride 2 over 3x3 input, 3x3 filter: 2*(3-1)+3 = 7
        let op = ConvTranspose2d::from_options(&ConvTranspose2dOptions {
            strides: [2, 2],
            ..ConvTranspose2dOptions::default()
        });
        let fi = OperandFact::dt_shape(DatumType::F32, [1, 3, 3, 3]);
        let ff = OperandFact::dt_shape(DatumType::F32, [3, 2, 3, 3]);
        let inputs = [InputRef { fact: &fi, op: &op }, InputRef { fact: &ff, op: &op }];
        let facts = op.output_facts(&inputs).unwrap();
        assert_eq!(facts[0].shape, tvec![1, 2, 7, 7]);
    }

    #[test]
    fn transpose_same_upper_doubles_with_stride_two() {
        let op = ConvTranspose2d::from_options(&ConvTranspose2dOptions {
            strides: [2, 2],
            auto_pad: AutoPad::SameUpper,
            ..ConvTranspose2dOptions::default()
        });
        let fi = OperandFact::dt_shape(DatumType::F32, [1, 3, 3, 3]);
        let ff = OperandFact::dt_shape(DatumType::F32, [3, 2, 3, 3]);
        let inputs = [InputRef { fact: &fi, op: &op }, InputRef { fact: &ff, op: &op }];
        let facts = op.output_facts(&inputs).unwrap();
        assert_eq!(facts[0].shape, tvec![1, 2, 6, 6]);
    }

    #[test]
    fn explicit_output_sizes_win() {
        let op = ConvTranspose2d::from_options(&ConvTranspose2dOptions {
            strides: [2, 2],
            output_sizes: Some([10, 8]),
            ..ConvTranspose2dOptions::default()
        });
        let fi = OperandFact::dt_shape(DatumType::F32, [1, 3, 3, 3]);
        let ff = OperandFact::dt_shape(DatumType::F32, [3, 2, 3, 3]);
        let inputs = [InputRef { fact: &fi, op: &op }, InputRef { fact: &ff, op: &op }];
        let facts = op.output_facts(&inputs).unwrap();
        assert_eq!(facts[0].shape, tvec![1, 2, 10, 8]);
    }
}
