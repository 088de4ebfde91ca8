//! Shape-preserving elementwise operators.

use derive_new::new;

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::ops::{check_rank, InputRef, Operator};
use crate::{tvec, GraphError, TVec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryKind {
    Abs,
    Ceil,
    Cos,
    Exp,
    Floor,
    Log,
    Neg,
    Sin,
    Tan,
    Relu,
    Sigmoid,
    Tanh,
    HardSwish,
    Softmax,
}

impl UnaryKind {
    pub fn name(&self) -> &'static str {
        match self {
            UnaryKind::Abs => "Abs",
            UnaryKind::Ceil => "Ceil",
            UnaryKind::Cos => "Cos",
            UnaryKind::Exp => "Exp",
            UnaryKind::Floor => "Floor",
            UnaryKind::Log => "Log",
            UnaryKind::Neg => "Neg",
            UnaryKind::Sin => "Sin",
            UnaryKind::Tan => "Tan",
            UnaryKind::Relu => "Relu",
            UnaryKind::Sigmoid => "Sigmoid",
            UnaryKind::Tanh => "Tanh",
            UnaryKind::HardSwish => "HardSwish",
            UnaryKind::Softmax => "Softmax",
        }
    }
}

#[derive(Debug, Clone, new)]
pub struct Unary {
    pub kind: UnaryKind,
}

impl Operator for Unary {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let [input] = inputs else {
            return Err(GraphError::Internal("unary operator wired with wrong arity".to_string()));
        };
        if self.kind == UnaryKind::Softmax {
            check_rank("input", input.fact, 2)?;
        }
        Ok(tvec!(input.fact.clone()))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_unary(node, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::DatumType;

    #[test]
    fn shape_is_preserved() {
        let fact = OperandFact::dt_shape(DatumType::F32, [2, 3, 4]);
        let op = Unary::new(UnaryKind::Relu);
        let facts = op.output_facts(&[InputRef { fact: &fact, op: &op }]).unwrap();
        assert_eq!(facts[0], fact);
    }

    #[test]
    fn softmax_wants_a_matrix() {
        let matrix = OperandFact::dt_shape(DatumType::F32, [2, 3]);
        let cube = OperandFact::dt_shape(DatumType::F32, [2, 3, 4]);
        let op = Unary::new(UnaryKind::Softmax);
        assert!(op.output_facts(&[InputRef { fact: &matrix, op: &op }]).is_ok());
        assert!(op.output_facts(&[InputRef { fact: &cube, op: &op }]).is_err());
    }
}
