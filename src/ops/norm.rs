//! Batch and instance normalization.

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::operand::Operand;
use crate::ops::activation::{check_fused_activation, Activation};
use crate::ops::cnn::InputLayout;
use crate::ops::{check_rank, InputRef, Operator};
use crate::{ensure_valid, tvec, GraphError, TVec};

#[derive(Debug, Clone)]
pub struct BatchNormOptions {
    pub scale: Option<Operand>,
    pub bias: Option<Operand>,
    /// Feature axis: 1 for nchw inputs, 3 for nhwc.
    pub axis: i32,
    pub epsilon: f32,
    pub activation: Option<Activation>,
}

impl Default for BatchNormOptions {
    fn default() -> BatchNormOptions {
        BatchNormOptions { scale: None, bias: None, axis: 1, epsilon: 1e-5, activation: None }
    }
}

#[derive(Debug, Clone)]
pub struct BatchNorm {
    pub axis: i32,
    pub epsilon: f32,
    pub has_scale: bool,
    pub has_bias: bool,
    pub activation: Option<Activation>,
}

impl BatchNorm {
    pub fn from_options(options: &BatchNormOptions) -> BatchNorm {
        BatchNorm {
            axis: options.axis,
            epsilon: options.epsilon,
            has_scale: options.scale.is_some(),
            has_bias: options.bias.is_some(),
            activation: options.activation,
        }
    }
}

impl Operator for BatchNorm {
    fn name(&self) -> &'static str {
        "BatchNorm"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let expected = 3 + self.has_scale as usize + self.has_bias as usize;
        if inputs.len() != expected {
            return Err(GraphError::Internal("batch norm wired with wrong arity".to_string()));
        }
        let input = inputs[0].fact;
        check_rank("input", input, 4)?;
        check_rank("mean", inputs[1].fact, 1)?;
        check_rank("variance", inputs[2].fact, 1)?;
        let mut next = 3;
        if self.has_scale {
            check_rank("scale", inputs[next].fact, 1)?;
            next += 1;
        }
        if self.has_bias {
            check_rank("bias", inputs[next].fact, 1)?;
        }
        ensure_valid!(
            self.axis == 1 || self.axis == 3,
            "the feature axis must be 1 (nchw) or 3 (nhwc), got {}",
            self.axis
        );
        if let Some(activation) = &self.activation {
            check_fused_activation(activation)?;
        }
        Ok(tvec!(input.clone()))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_batch_norm(node, self)
    }
}

#[derive(Debug, Clone)]
pub struct InstanceNormOptions {
    pub scale: Option<Operand>,
    pub bias: Option<Operand>,
    pub epsilon: f32,
    pub layout: InputLayout,
}

impl Default for InstanceNormOptions {
    fn default() -> InstanceNormOptions {
        InstanceNormOptions { scale: None, bias: None, epsilon: 1e-5, layout: InputLayout::Nchw }
    }
}

#[derive(Debug, Clone)]
pub struct InstanceNorm {
    pub epsilon: f32,
    pub layout: InputLayout,
    pub has_scale: bool,
    pub has_bias: bool,
}

impl InstanceNorm {
    pub fn from_options(options: &InstanceNormOptions) -> InstanceNorm {
        InstanceNorm {
            epsilon: options.epsilon,
            layout: options.layout,
            has_scale: options.scale.is_some(),
            has_bias: options.bias.is_some(),
        }
    }
}

impl Operator for InstanceNorm {
    fn name(&self) -> &'static str {
        "InstanceNorm"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let expected = 1 + self.has_scale as usize + self.has_bias as usize;
        if inputs.len() != expected {
            return Err(GraphError::Internal("instance norm wired with wrong arity".to_string()));
        }
        let input = inputs[0].fact;
        check_rank("input", input, 4)?;
        let mut next = 1;
        if self.has_scale {
            check_rank("scale", inputs[next].fact, 1)?;
            next += 1;
        }
        if self.has_bias {
            check_rank("bias", inputs[next].fact, 1)?;
        }
        Ok(tvec!(input.clone()))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_instance_norm(node, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::DatumType;

    #[test]
    fn batch_norm_preserves_the_input_fact() {
        let input = OperandFact::dt_shape(DatumType::F32, [1, 3, 4, 4]);
        let stat = OperandFact::dt_shape(DatumType::F32, [3]);
        let op = BatchNorm::from_options(&BatchNormOptions::default());
        let inputs = [
            InputRef { fact: &input, op: &op },
            InputRef { fact: &stat, op: &op },
            InputRef { fact: &stat, op: &op },
        ];
        assert_eq!(op.output_facts(&inputs).unwrap()[0], input);
    }

    #[test]
    fn batch_norm_axis_is_restricted() {
        let input = OperandFact::dt_shape(DatumType::F32, [1, 3, 4, 4]);
        let stat = OperandFact::dt_shape(DatumType::F32, [3]);
        let op = BatchNorm::from_options(&BatchNormOptions { axis: 2, ..Default::default() });
        let inputs = [
            InputRef { fact: &input, op: &op },
            InputRef { fact: &stat, op: &op },
            InputRef { fact: &stat, op: &op },
        ];
        assert!(op.output_facts(&inputs).is_err());
    }

    #[test]
    fn mean_must_be_a_vector() {
        let input = OperandFact::dt_shape(DatumType::F32, [1, 3, 4, 4]);
        let bad = OperandFact::dt_shape(DatumType::F32, [3, 1]);
        let stat = OperandFact::dt_shape(DatumType::F32, [3]);
        let op = BatchNorm::from_options(&BatchNormOptions::default());
        let inputs = [
            InputRef { fact: &input, op: &op },
            InputRef { fact: &bad, op: &op },
            InputRef { fact: &stat, op: &op },
        ];
        assert!(op.output_facts(&inputs).is_err());
    }
}
