//! 2D pooling (average, L2, max).

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::ops::cnn::padding::{same_padding, ComputedPadding};
use crate::ops::cnn::{AutoPad, InputLayout, RoundingType};
use crate::ops::{all_positive, check_rank, InputRef, Operator};
use crate::{ensure_valid, invalid, tvec, GraphError, TVec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pool2dKind {
    Average,
    L2,
    Max,
}

impl Pool2dKind {
    pub fn name(&self) -> &'static str {
        match self {
            Pool2dKind::Average => "AveragePool2d",
            Pool2dKind::L2 => "L2Pool2d",
            Pool2dKind::Max => "MaxPool2d",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pool2dOptions {
    /// Pooling window; `None` pools over the whole spatial extent.
    pub window_dimensions: Option<[i32; 2]>,
    pub padding: [i32; 4],
    pub strides: [i32; 2],
    pub dilations: [i32; 2],
    pub auto_pad: AutoPad,
    pub layout: InputLayout,
    pub rounding_type: RoundingType,
    /// Explicit output spatial sizes; the effective rounding type is then
    /// inferred by checking which rounding they match.
    pub output_sizes: Option<[i32; 2]>,
}

impl Default for Pool2dOptions {
    fn default() -> Pool2dOptions {
        Pool2dOptions {
            window_dimensions: None,
            padding: [0; 4],
            strides: [1, 1],
            dilations: [1, 1],
            auto_pad: AutoPad::Explicit,
            layout: InputLayout::Nchw,
            rounding_type: RoundingType::Floor,
            output_sizes: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pool2d {
    pub kind: Pool2dKind,
    pub options: Pool2dOptions,
}

impl Pool2d {
    pub fn new(kind: Pool2dKind, options: Pool2dOptions) -> Pool2d {
        Pool2d { kind, options }
    }

    fn padding_for_axis(&self, axis: usize, input: i32, window: i32) -> ComputedPadding {
        match self.options.auto_pad {
            AutoPad::Explicit => ComputedPadding::new(
                self.options.padding[axis * 2],
                self.options.padding[axis * 2 + 1],
            ),
            AutoPad::SameUpper => same_padding(
                input,
                window,
                self.options.strides[axis],
                self.options.dilations[axis],
                true,
            ),
            AutoPad::SameLower => same_padding(
                input,
                window,
                self.options.strides[axis],
                self.options.dilations[axis],
                false,
            ),
        }
    }

    /// Floor and ceil output size candidates for one spatial axis.
    fn output_candidates(&self, axis: usize, input: i32, window: i32) -> GraphResult<(i32, i32)> {
        let stride = self.options.strides[axis];
        let dilated = (window - 1) * self.options.dilations[axis] + 1;
        let pad = self.padding_for_axis(axis, input, window);
        let span = input + pad.begin + pad.end - dilated;
        ensure_valid!(
            span >= 0,
            "pooling window ({} dilated) does not fit the padded input ({})",
            dilated,
            input + pad.begin + pad.end
        );
        Ok((1 + span / stride, 1 + (span + stride - 1) / stride))
    }

    /// The rounding type actually in effect: the declared one, or the one
    /// inferred from explicit output sizes.
    pub fn resolved_rounding_type(&self, input_spatial: [i32; 2], window: [i32; 2]) -> GraphResult<RoundingType> {
        let Some(sizes) = self.options.output_sizes else {
            return Ok(self.options.rounding_type);
        };
        let (floor_h, ceil_h) = self.output_candidates(0, input_spatial[0], window[0])?;
        let (floor_w, ceil_w) = self.output_candidates(1, input_spatial[1], window[1])?;
        if sizes == [floor_h, floor_w] {
            Ok(RoundingType::Floor)
        } else if sizes == [ceil_h, ceil_w] {
            Ok(RoundingType::Ceil)
        } else {
            invalid!(
                "output sizes {:?} match neither floor {:?} nor ceil {:?} rounding",
                sizes,
                [floor_h, floor_w],
                [ceil_h, ceil_w]
            )
        }
    }

    fn window(&self, input_spatial: [i32; 2]) -> [i32; 2] {
        self.options.window_dimensions.unwrap_or(input_spatial)
    }
}

impl Operator for Pool2d {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let [input] = inputs else {
            return Err(GraphError::Internal("pooling wired with wrong arity".to_string()));
        };
        check_rank("input", input.fact, 4)?;
        all_positive("strides", &self.options.strides)?;
        all_positive("dilations", &self.options.dilations)?;
        ensure_valid!(
            self.options.padding.iter().all(|&p| p >= 0),
            "padding must not be negative (got {:?})",
            self.options.padding
        );
        if let Some(window) = self.options.window_dimensions {
            all_positive("window dimensions", &window)?;
        }

        let (batch, channels, in_h, in_w) = self.options.layout.dissect(&input.fact.shape);
        let window = self.window([in_h, in_w]);
        let rounding = self.resolved_rounding_type([in_h, in_w], window)?;
        let (floor_h, ceil_h) = self.output_candidates(0, in_h, window[0])?;
        let (floor_w, ceil_w) = self.output_candidates(1, in_w, window[1])?;
        let (out_h, out_w) = match rounding {
            RoundingType::Floor => (floor_h, floor_w),
            RoundingType::Ceil => (ceil_h, ceil_w),
        };
        let shape = self.options.layout.assemble(batch, channels, out_h, out_w);
        Ok(tvec!(OperandFact::dt_shape(input.fact.datum_type, shape)))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_pool2d(node, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::DatumType;

    fn infer(options: Pool2dOptions, input: &[i32]) -> GraphResult<TVec<i32>> {
        let fact = OperandFact::dt_shape(DatumType::F32, input);
        let op = Pool2d::new(Pool2dKind::Max, options);
        let inputs = [InputRef { fact: &fact, op: &op }];
        op.output_facts(&inputs).map(|f| f[0].shape.clone())
    }

    #[test]
    fn window_pooling() {
        let options =
            Pool2dOptions { window_dimensions: Some([2, 2]), strides: [2, 2], ..Pool2dOptions::default() };
        assert_eq!(infer(options, &[1, 3, 4, 4]).unwrap(), tvec![1, 3, 2, 2]);
    }

    #[test]
    fn default_window_pools_globally() {
        assert_eq!(infer(Pool2dOptions::default(), &[1, 3, 7, 5]).unwrap(), tvec![1, 3, 1, 1]);
    }

    #[test]
    fn ceil_rounding() {
        let floor = Pool2dOptions {
            window_dimensions: Some([2, 2]),
            strides: [2, 2],
            ..Pool2dOptions::default()
        };
        let ceil = Pool2dOptions { rounding_type: RoundingType::Ceil, ..floor.clone() };
        assert_eq!(infer(floor, &[1, 3, 5, 5]).unwrap(), tvec![1, 3, 2, 2]);
        assert_eq!(infer(ceil, &[1, 3, 5, 5]).unwrap(), tvec![1, 3, 3, 3]);
    }

    #[test]
    fn output_sizes_pick_the_matching_rounding() {
        let base = Pool2dOptions {
            window_dimensions: Some([2, 2]),
            strides: [2, 2],
            ..Pool2dOptions::default()
        };
        let floorish = Pool2dOptions { output_sizes: Some([2, 2]), ..base.clone() };
        assert_eq!(infer(floorish, &[1, 3, 5, 5]).unwrap(), tvec![1, 3, 2, 2]);
        let ceilish = Pool2dOptions { output_sizes: Some([3, 3]), ..base.clone() };
        assert_eq!(infer(ceilish, &[1, 3, 5, 5]).unwrap(), tvec![1, 3, 3, 3]);
        let neither = Pool2dOptions { output_sizes: Some([4, 4]), ..base };
        assert!(infer(neither, &[1, 3, 5, 5]).is_err());
    }

    #[test]
    fn same_upper_with_stride_one_preserves_size() {
        let options = Pool2dOptions {
            window_dimensions: Some([3, 3]),
            auto_pad: AutoPad::SameUpper,
            ..Pool2dOptions::default()
        };
        assert_eq!(infer(options, &[1, 3, 6, 6]).unwrap(), tvec![1, 3, 6, 6]);
    }

    #[test]
    fn nhwc_layout() {
        let options = Pool2dOptions {
            window_dimensions: Some([2, 2]),
            strides: [2, 2],
            layout: InputLayout::Nhwc,
            ..Pool2dOptions::default()
        };
        assert_eq!(infer(options, &[1, 4, 4, 3]).unwrap(), tvec![1, 2, 2, 3]);
    }
}
