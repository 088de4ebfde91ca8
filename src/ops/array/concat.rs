//! Concatenation along one axis.

use derive_new::new;

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::ops::{all_same_datum_type, InputRef, Operator};
use crate::{ensure_valid, tvec, GraphError, TVec};

#[derive(Debug, Clone, new)]
pub struct Concat {
    pub axis: i32,
}

impl Operator for Concat {
    fn name(&self) -> &'static str {
        "Concat"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        if inputs.is_empty() {
            return Err(GraphError::Internal("concat wired without inputs".to_string()));
        }
        let datum_type = all_same_datum_type(inputs)?;
        let first = inputs[0].fact;
        let rank = first.rank();
        ensure_valid!(
            self.axis >= 0 && (self.axis as usize) < rank,
            "concat axis {} is out of rank range {}",
            self.axis,
            rank
        );
        let axis = self.axis as usize;
        let mut shape = first.shape.clone();
        for input in &inputs[1..] {
            ensure_valid!(
                input.fact.rank() == rank,
                "concat inputs must share a rank ({} vs {})",
                input.fact.rank(),
                rank
            );
            for (d, (&a, &b)) in first.shape.iter().zip(input.fact.shape.iter()).enumerate() {
                ensure_valid!(
                    d == axis || a == b,
                    "concat inputs must agree outside the concatenation axis \
                     (dim {} is {} vs {})",
                    d,
                    a,
                    b
                );
            }
            shape[axis] += input.fact.shape[axis];
        }
        Ok(tvec!(OperandFact { datum_type, shape }))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_concat(node, self)
    }
}
