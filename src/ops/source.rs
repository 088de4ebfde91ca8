//! Graph entry points fed at compute time.

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::operand::OperandDescriptor;
use crate::ops::{InputRef, Operator};
use crate::{ensure_valid, tvec, TVec};

/// A named external input with a declared type and shape.
#[derive(Debug, Clone)]
pub struct Input {
    name: String,
    descriptor: OperandDescriptor,
}

impl Input {
    pub fn new(name: impl Into<String>, descriptor: OperandDescriptor) -> Input {
        Input { name: name.into(), descriptor }
    }

    pub fn input_name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &OperandDescriptor {
        &self.descriptor
    }
}

impl Operator for Input {
    fn name(&self) -> &'static str {
        "Input"
    }

    fn output_facts(&self, _inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        ensure_valid!(!self.name.is_empty(), "input name is empty");
        ensure_valid!(
            self.descriptor.dimensions.iter().all(|&d| d > 0),
            "input \"{}\" has non-positive dimensions {:?}",
            self.name,
            &*self.descriptor.dimensions
        );
        Ok(tvec!(OperandFact::dt_shape(self.descriptor.datum_type, &*self.descriptor.dimensions)))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_input(node, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::DatumType;

    #[test]
    fn declared_fact_is_passed_through() {
        let input = Input::new("x", OperandDescriptor::new(DatumType::F32, [1, 3, 4, 4]));
        let facts = input.output_facts(&[]).unwrap();
        assert_eq!(facts[0], OperandFact::dt_shape(DatumType::F32, [1, 3, 4, 4]));
    }

    #[test]
    fn non_positive_dimension_is_rejected() {
        let input = Input::new("x", OperandDescriptor::new(DatumType::F32, [1, -1]));
        assert!(input.output_facts(&[]).is_err());
    }
}
