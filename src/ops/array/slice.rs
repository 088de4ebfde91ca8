//! Window extraction along selected axes.

use derive_new::new;

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::ops::{resolve_axis, InputRef, Operator};
use crate::{ensure_valid, tvec, GraphError, TVec};

#[derive(Debug, Clone, Default)]
pub struct SliceOptions {
    /// Axes the starts/sizes apply to; defaults to the leading axes.
    pub axes: Option<Vec<i32>>,
}

#[derive(Debug, Clone, new)]
pub struct Slice {
    /// Start index per sliced axis; negative counts back from the end.
    pub starts: TVec<i32>,
    /// Length per sliced axis; −1 selects everything from the start on.
    pub sizes: TVec<i32>,
    pub axes: Option<Vec<i32>>,
}

impl Operator for Slice {
    fn name(&self) -> &'static str {
        "Slice"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let [input] = inputs else {
            return Err(GraphError::Internal("slice wired with wrong arity".to_string()));
        };
        let rank = input.fact.rank();
        ensure_valid!(
            self.starts.len() == self.sizes.len(),
            "starts and sizes must have the same length ({} vs {})",
            self.starts.len(),
            self.sizes.len()
        );
        let axes: Vec<usize> = match &self.axes {
            None => (0..self.sizes.len()).collect(),
            Some(axes) => {
                ensure_valid!(
                    axes.len() == self.sizes.len(),
                    "axes and sizes must have the same length ({} vs {})",
                    axes.len(),
                    self.sizes.len()
                );
                axes.iter().map(|&a| resolve_axis(a, rank)).collect::<GraphResult<_>>()?
            }
        };
        ensure_valid!(axes.len() <= rank, "cannot slice {} axes of a rank {} tensor", axes.len(), rank);

        let mut shape = input.fact.shape.clone();
        for (i, &axis) in axes.iter().enumerate() {
            let dim = input.fact.shape[axis];
            let (start, size) = (self.starts[i], self.sizes[i]);
            ensure_valid!(
                start >= -dim && start < dim,
                "start {} is out of range for axis {} of size {}",
                start,
                axis,
                dim
            );
            let remaining = if start < 0 { -start } else { dim - start };
            if size == -1 {
                shape[axis] = remaining;
            } else {
                ensure_valid!(size > 0, "slice sizes must be positive or -1 (got {})", size);
                ensure_valid!(
                    size <= remaining,
                    "slice of {} elements exceeds the {} remaining on axis {}",
                    size,
                    remaining,
                    axis
                );
                shape[axis] = size;
            }
        }
        Ok(tvec!(OperandFact { datum_type: input.fact.datum_type, shape }))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_slice(node, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::DatumType;

    fn infer(
        input: &[i32],
        starts: &[i32],
        sizes: &[i32],
        axes: Option<Vec<i32>>,
    ) -> GraphResult<TVec<i32>> {
        let fact = OperandFact::dt_shape(DatumType::F32, input);
        let op =
            Slice::new(starts.iter().copied().collect(), sizes.iter().copied().collect(), axes);
        let inputs = [InputRef { fact: &fact, op: &op }];
        op.output_facts(&inputs).map(|f| f[0].shape.clone())
    }

    #[test]
    fn leading_axes_by_default() {
        assert_eq!(infer(&[4, 4, 4], &[1, 0], &[2, 3], None).unwrap(), tvec![2, 3, 4]);
    }

    #[test]
    fn explicit_and_negative_axes() {
        assert_eq!(infer(&[4, 5], &[1], &[3], Some(vec![-1])).unwrap(), tvec![4, 3]);
    }

    #[test]
    fn negative_start_and_remainder_size() {
        // start -2 keeps the last two elements
        assert_eq!(infer(&[5], &[-2], &[-1], None).unwrap(), tvec![2]);
        assert_eq!(infer(&[5], &[1], &[-1], None).unwrap(), tvec![4]);
    }

    #[test]
    fn out_of_range_start_is_rejected() {
        assert!(infer(&[5], &[5], &[1], None).is_err());
        assert!(infer(&[5], &[-6], &[1], None).is_err());
    }

    #[test]
    fn oversized_slice_is_rejected() {
        assert!(infer(&[5], &[3], &[3], None).is_err());
    }
}
