//! Clamp, LeakyRelu, and the fused-activation descriptor other operators
//! can carry instead of materializing an extra node.

use derive_new::new;

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::ops::{InputRef, Operator};
use crate::{ensure_valid, tvec, GraphError, TVec};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClampOptions {
    pub min_value: Option<f32>,
    pub max_value: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeakyReluOptions {
    pub alpha: f32,
}

impl Default for LeakyReluOptions {
    fn default() -> LeakyReluOptions {
        LeakyReluOptions { alpha: 0.01 }
    }
}

/// An activation fusable into conv/batch-norm, or the default pair driving
/// a GRU cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
    HardSwish,
    Clamp(ClampOptions),
    LeakyRelu(LeakyReluOptions),
}

fn check_clamp_bounds(options: &ClampOptions) -> GraphResult<()> {
    if let (Some(min), Some(max)) = (options.min_value, options.max_value) {
        ensure_valid!(min <= max, "clamp bounds are inverted ({} > {})", min, max);
    }
    Ok(())
}

/// Validates an activation attached to another operator's options.
pub(crate) fn check_fused_activation(activation: &Activation) -> GraphResult<()> {
    match activation {
        Activation::Clamp(options) => check_clamp_bounds(options),
        _ => Ok(()),
    }
}

/// Restricts values to `[min_value, max_value]`, either bound optional.
#[derive(Debug, Clone, new)]
pub struct Clamp {
    pub options: ClampOptions,
}

impl Operator for Clamp {
    fn name(&self) -> &'static str {
        "Clamp"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let [input] = inputs else {
            return Err(GraphError::Internal("clamp wired with wrong arity".to_string()));
        };
        check_clamp_bounds(&self.options)?;
        Ok(tvec!(input.fact.clone()))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_clamp(node, self)
    }
}

#[derive(Debug, Clone, new)]
pub struct LeakyRelu {
    pub options: LeakyReluOptions,
}

impl Operator for LeakyRelu {
    fn name(&self) -> &'static str {
        "LeakyRelu"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let [input] = inputs else {
            return Err(GraphError::Internal("leaky relu wired with wrong arity".to_string()));
        };
        Ok(tvec!(input.fact.clone()))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_leaky_relu(node, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::DatumType;

    #[test]
    fn inverted_bounds_are_rejected() {
        let fact = OperandFact::dt_shape(DatumType::F32, [4]);
        let op = Clamp::new(ClampOptions { min_value: Some(2.0), max_value: Some(-1.0) });
        assert!(op.output_facts(&[InputRef { fact: &fact, op: &op }]).is_err());
        let op = Clamp::new(ClampOptions { min_value: Some(-1.0), max_value: Some(2.0) });
        assert!(op.output_facts(&[InputRef { fact: &fact, op: &op }]).is_ok());
    }

    #[test]
    fn single_bound_is_fine() {
        let fact = OperandFact::dt_shape(DatumType::F32, [4]);
        let op = Clamp::new(ClampOptions { min_value: Some(0.0), max_value: None });
        assert!(op.output_facts(&[InputRef { fact: &fact, op: &op }]).is_ok());
    }
}
