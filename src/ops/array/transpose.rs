//! Axis permutation.

use derive_new::new;
use itertools::Itertools;

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::ops::{InputRef, Operator};
use crate::{ensure_valid, tvec, GraphError, TVec};

#[derive(Debug, Clone, Default)]
pub struct TransposeOptions {
    /// Permutation of `[0, rank)`; defaults to reversing the axes.
    pub permutation: Option<Vec<i32>>,
}

#[derive(Debug, Clone, new)]
pub struct Transpose {
    /// Resolved permutation (the builder reverses the axes when the caller
    /// does not supply one).
    pub permutation: TVec<i32>,
}

impl Operator for Transpose {
    fn name(&self) -> &'static str {
        "Transpose"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let [input] = inputs else {
            return Err(GraphError::Internal("transpose wired with wrong arity".to_string()));
        };
        let rank = input.fact.rank();
        ensure_valid!(
            self.permutation.len() == rank,
            "permutation {:?} does not cover a rank {} tensor",
            &*self.permutation,
            rank
        );
        // a permutation sorts to exactly 0..rank
        ensure_valid!(
            self.permutation.iter().copied().sorted().eq(0..rank as i32),
            "{:?} is not a permutation of [0, {})",
            &*self.permutation,
            rank
        );
        let shape: TVec<i32> =
            self.permutation.iter().map(|&axis| input.fact.shape[axis as usize]).collect();
        Ok(tvec!(OperandFact { datum_type: input.fact.datum_type, shape }))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_transpose(node, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::DatumType;

    fn infer(input: &[i32], permutation: &[i32]) -> GraphResult<TVec<i32>> {
        let fact = OperandFact::dt_shape(DatumType::F32, input);
        let op = Transpose::new(permutation.iter().copied().collect());
        let inputs = [InputRef { fact: &fact, op: &op }];
        op.output_facts(&inputs).map(|f| f[0].shape.clone())
    }

    #[test]
    fn reorders_the_shape() {
        assert_eq!(infer(&[2, 3, 4], &[2, 0, 1]).unwrap(), tvec![4, 2, 3]);
    }

    #[test]
    fn rejects_non_permutations() {
        assert!(infer(&[2, 3, 4], &[0, 1]).is_err());
        assert!(infer(&[2, 3, 4], &[0, 1, 1]).is_err());
        assert!(infer(&[2, 3, 4], &[0, 1, 3]).is_err());
    }
}
