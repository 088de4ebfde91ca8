//! Gated recurrent units.

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::operand::Operand;
use crate::ops::activation::{check_fused_activation, Activation};
use crate::ops::{all_same_datum_type, check_rank, InputRef, Operator};
use crate::{ensure_valid, tvec, GraphError, TVec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecurrentDirection {
    #[default]
    Forward,
    Backward,
    Both,
}

impl RecurrentDirection {
    pub fn count(&self) -> i32 {
        if *self == RecurrentDirection::Both {
            2
        } else {
            1
        }
    }
}

/// Ordering of the update/reset/new gates in weight tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecurrentWeightLayout {
    #[default]
    Zrn,
    Rzn,
}

#[derive(Debug, Clone)]
pub struct GruOptions {
    pub bias: Option<Operand>,
    pub recurrent_bias: Option<Operand>,
    pub initial_hidden_state: Option<Operand>,
    pub reset_after: bool,
    /// When set, a second output collects the hidden state of every step.
    pub return_sequence: bool,
    pub direction: RecurrentDirection,
    pub layout: RecurrentWeightLayout,
    /// Update and new gate activations; defaults to sigmoid and tanh.
    pub activations: Option<Vec<Activation>>,
}

impl Default for GruOptions {
    fn default() -> GruOptions {
        GruOptions {
            bias: None,
            recurrent_bias: None,
            initial_hidden_state: None,
            reset_after: true,
            return_sequence: false,
            direction: RecurrentDirection::Forward,
            layout: RecurrentWeightLayout::Zrn,
            activations: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Gru {
    pub steps: i32,
    pub hidden_size: i32,
    pub reset_after: bool,
    pub return_sequence: bool,
    pub direction: RecurrentDirection,
    pub layout: RecurrentWeightLayout,
    pub activations: Vec<Activation>,
    pub has_bias: bool,
    pub has_recurrent_bias: bool,
    pub has_initial_hidden_state: bool,
}

impl Gru {
    pub fn from_options(steps: i32, hidden_size: i32, options: &GruOptions) -> Gru {
        Gru {
            steps,
            hidden_size,
            reset_after: options.reset_after,
            return_sequence: options.return_sequence,
            direction: options.direction,
            layout: options.layout,
            activations: options
                .activations
                .clone()
                .unwrap_or_else(|| vec![Activation::Sigmoid, Activation::Tanh]),
            has_bias: options.bias.is_some(),
            has_recurrent_bias: options.recurrent_bias.is_some(),
            has_initial_hidden_state: options.initial_hidden_state.is_some(),
        }
    }

    pub fn output_arity(&self) -> usize {
        1 + self.return_sequence as usize
    }
}

impl Operator for Gru {
    fn name(&self) -> &'static str {
        "Gru"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let expected = 3
            + self.has_bias as usize
            + self.has_recurrent_bias as usize
            + self.has_initial_hidden_state as usize;
        if inputs.len() != expected {
            return Err(GraphError::Internal("gru wired with wrong arity".to_string()));
        }
        let datum_type = all_same_datum_type(inputs)?;
        check_rank("input", inputs[0].fact, 3)?;
        check_rank("weight", inputs[1].fact, 3)?;
        check_rank("recurrentWeight", inputs[2].fact, 3)?;
        ensure_valid!(self.steps > 0, "steps must be positive (got {})", self.steps);
        ensure_valid!(
            self.hidden_size > 0,
            "hiddenSize must be positive (got {})",
            self.hidden_size
        );
        let mut next = 3;
        if self.has_bias {
            check_rank("bias", inputs[next].fact, 2)?;
            next += 1;
        }
        if self.has_recurrent_bias {
            check_rank("recurrentBias", inputs[next].fact, 2)?;
            next += 1;
        }
        if self.has_initial_hidden_state {
            check_rank("initialHiddenState", inputs[next].fact, 3)?;
        }
        ensure_valid!(
            self.activations.len() == 2,
            "activations must be a sequence of length 2 (got {})",
            self.activations.len()
        );
        for activation in &self.activations {
            check_fused_activation(activation)?;
        }

        let batch = inputs[0].fact.shape[1];
        let dirs = self.direction.count();
        let mut facts = tvec!(OperandFact::dt_shape(datum_type, [dirs, batch, self.hidden_size]));
        if self.return_sequence {
            facts.push(OperandFact::dt_shape(
                datum_type,
                [self.steps, dirs, batch, self.hidden_size],
            ));
        }
        Ok(facts)
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_gru(node, self)
    }
}
