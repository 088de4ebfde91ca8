//! Partitioning along one axis.

use derive_new::new;

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::ops::{resolve_axis, InputRef, Operator};
use crate::{ensure_valid, tvec, GraphError, TVec};

#[derive(Debug, Clone, Copy, Default)]
pub struct SplitOptions {
    pub axis: i32,
}

/// Splits the input along `axis`: a single entry in `splits` is a count of
/// equal parts, several entries are explicit sizes.
#[derive(Debug, Clone, new)]
pub struct Split {
    pub splits: TVec<u32>,
    pub axis: i32,
}

impl Split {
    /// Number of produced operands.
    pub fn output_arity(&self) -> usize {
        if self.splits.len() == 1 {
            (self.splits[0] as usize).max(1)
        } else {
            self.splits.len().max(1)
        }
    }
}

impl Operator for Split {
    fn name(&self) -> &'static str {
        "Split"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let [input] = inputs else {
            return Err(GraphError::Internal("split wired with wrong arity".to_string()));
        };
        ensure_valid!(!self.splits.is_empty(), "splits must not be empty");
        let axis = resolve_axis(self.axis, input.fact.rank())?;
        let dim = input.fact.shape[axis];

        let sizes: TVec<i32> = if self.splits.len() == 1 {
            let count = self.splits[0] as i32;
            ensure_valid!(count > 0, "the number of splits must be positive");
            tvec![dim / count; count as usize]
        } else {
            self.splits.iter().map(|&s| s as i32).collect()
        };
        let sum: i32 = sizes.iter().sum();
        ensure_valid!(
            sum == dim,
            "the split sizes must sum to the dimension of the input along the axis \
             ({} vs {} on axis {})",
            sum,
            dim,
            axis
        );
        Ok(sizes
            .iter()
            .map(|&s| {
                let mut shape = input.fact.shape.clone();
                shape[axis] = s;
                OperandFact { datum_type: input.fact.datum_type, shape }
            })
            .collect())
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_split(node, self)
    }
}
