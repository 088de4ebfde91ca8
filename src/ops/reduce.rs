//! Axis reductions.

use derive_new::new;
use itertools::Itertools;

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::ops::{InputRef, Operator};
use crate::{ensure_valid, tvec, GraphError, TVec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceKind {
    L1,
    L2,
    Max,
    Mean,
    Min,
    Product,
    Sum,
}

impl ReduceKind {
    pub fn name(&self) -> &'static str {
        match self {
            ReduceKind::L1 => "ReduceL1",
            ReduceKind::L2 => "ReduceL2",
            ReduceKind::Max => "ReduceMax",
            ReduceKind::Mean => "ReduceMean",
            ReduceKind::Min => "ReduceMin",
            ReduceKind::Product => "ReduceProduct",
            ReduceKind::Sum => "ReduceSum",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReduceOptions {
    /// Axes to reduce; `-1` means the last axis; `None` reduces them all.
    pub axes: Option<Vec<i32>>,
    pub keep_dimensions: bool,
}

#[derive(Debug, Clone, new)]
pub struct Reduce {
    pub kind: ReduceKind,
    /// Resolved axes (the builder fills in the full range by default).
    pub axes: TVec<i32>,
    pub keep_dimensions: bool,
}

impl Operator for Reduce {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let [input] = inputs else {
            return Err(GraphError::Internal("reduce wired with wrong arity".to_string()));
        };
        let shape = input.fact.broadcast_shape();
        let rank = shape.len();
        ensure_valid!(
            self.axes.len() <= rank,
            "cannot reduce {} axes of a rank {} tensor",
            self.axes.len(),
            rank
        );
        ensure_valid!(
            self.axes.iter().all_unique(),
            "reduction axes must be unique (got {:?})",
            &*self.axes
        );
        let mut reduced = vec![false; rank];
        for &axis in &self.axes {
            ensure_valid!(
                axis >= -1 && axis < rank as i32,
                "reduction axis {} is out of range for rank {}",
                axis,
                rank
            );
            let axis = if axis == -1 { rank - 1 } else { axis as usize };
            reduced[axis] = true;
        }
        let out: TVec<i32> = if self.keep_dimensions {
            shape.iter().enumerate().map(|(d, &s)| if reduced[d] { 1 } else { s }).collect()
        } else {
            shape
                .iter()
                .enumerate()
                .filter(|(d, &s)| !(reduced[*d] && s != 1))
                .map(|(_, &s)| s)
                .collect()
        };
        let out = if out.is_empty() { tvec![1] } else { out };
        Ok(tvec!(OperandFact { datum_type: input.fact.datum_type, shape: out }))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_reduce(node, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::DatumType;

    fn infer(input: &[i32], axes: &[i32], keep: bool) -> GraphResult<TVec<i32>> {
        let fact = OperandFact::dt_shape(DatumType::F32, input);
        let op = Reduce::new(ReduceKind::Sum, axes.iter().copied().collect(), keep);
        let inputs = [InputRef { fact: &fact, op: &op }];
        op.output_facts(&inputs).map(|f| f[0].shape.clone())
    }

    #[test]
    fn drops_reduced_axes() {
        assert_eq!(infer(&[2, 3, 4], &[1], false).unwrap(), tvec![2, 4]);
        assert_eq!(infer(&[2, 3, 4], &[-1], false).unwrap(), tvec![2, 3]);
    }

    #[test]
    fn keeps_unit_dimensions_on_request() {
        assert_eq!(infer(&[2, 3, 4], &[1], true).unwrap(), tvec![2, 1, 4]);
    }

    #[test]
    fn full_reduction_collapses_to_a_scalar_like_shape() {
        assert_eq!(infer(&[2, 3], &[0, 1], false).unwrap(), tvec![1]);
    }

    #[test]
    fn axes_are_checked() {
        assert!(infer(&[2, 3], &[2], false).is_err());
        assert!(infer(&[2, 3], &[-2], false).is_err());
        assert!(infer(&[2, 3], &[0, 0], false).is_err());
    }
}
