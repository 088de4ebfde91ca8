//! Padding driven by a constant `[rank, 2]` table.

use derive_new::new;

use crate::backend::BackendGraph;
use crate::datum::DatumType;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::ops::konst::Constant;
use crate::ops::{InputRef, Operator};
use crate::{ensure_valid, invalid, tvec, GraphError, TVec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaddingMode {
    #[default]
    Constant,
    Edge,
    Reflection,
    Symmetric,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PadOptions {
    pub mode: PaddingMode,
    /// Fill value for `PaddingMode::Constant`.
    pub value: f32,
}

#[derive(Debug, Clone, new)]
pub struct Pad {
    pub options: PadOptions,
}

impl Operator for Pad {
    fn name(&self) -> &'static str {
        "Pad"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let [input, padding] = inputs else {
            return Err(GraphError::Internal("pad wired with wrong arity".to_string()));
        };
        let rank = input.fact.rank();
        ensure_valid!(
            padding.fact.rank() == 2
                && padding.fact.shape[0] == rank as i32
                && padding.fact.shape[1] == 2,
            "the padding tensor must have shape [{}, 2] to pad a rank {} input (got {:?})",
            rank,
            rank,
            &*padding.fact.shape
        );
        ensure_valid!(
            matches!(padding.fact.datum_type, DatumType::I32 | DatumType::U32),
            "the padding tensor must hold 32-bit integers (got {})",
            padding.fact.datum_type
        );
        let Some(table) = padding.op.downcast_ref::<Constant>() else {
            invalid!("the padding tensor must be a constant");
        };
        let values = table.as_i32s()?;
        ensure_valid!(
            values.len() == 2 * rank,
            "the padding table holds {} entries, expected {}",
            values.len(),
            2 * rank
        );
        ensure_valid!(
            values.iter().all(|&v| v >= 0),
            "padding amounts must not be negative (got {:?})",
            values
        );
        let mut shape = input.fact.shape.clone();
        for (d, dim) in shape.iter_mut().enumerate() {
            *dim += values[2 * d] + values[2 * d + 1];
        }
        Ok(tvec!(OperandFact { datum_type: input.fact.datum_type, shape }))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_pad(node, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::OperandDescriptor;

    fn padding_table(rank: i32, values: &[i32]) -> Constant {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Constant::new(OperandDescriptor::new(DatumType::I32, [rank, 2]), bytes)
    }

    #[test]
    fn grows_each_dimension() {
        let input = OperandFact::dt_shape(DatumType::F32, [2, 3]);
        let table = padding_table(2, &[1, 1, 0, 2]);
        let table_fact = table.output_facts(&[]).unwrap().remove(0);
        let op = Pad::new(PadOptions::default());
        let inputs =
            [InputRef { fact: &input, op: &op }, InputRef { fact: &table_fact, op: &table }];
        let facts = op.output_facts(&inputs).unwrap();
        assert_eq!(facts[0].shape, tvec![4, 5]);
    }

    #[test]
    fn padding_must_be_constant() {
        let input = OperandFact::dt_shape(DatumType::F32, [2, 3]);
        let table_fact = OperandFact::dt_shape(DatumType::I32, [2, 2]);
        let op = Pad::new(PadOptions::default());
        // producer is not a Constant
        let inputs = [InputRef { fact: &input, op: &op }, InputRef { fact: &table_fact, op: &op }];
        assert!(op.output_facts(&inputs).is_err());
    }

    #[test]
    fn table_shape_is_checked() {
        let input = OperandFact::dt_shape(DatumType::F32, [2, 3]);
        let table = padding_table(3, &[0, 0, 0, 0, 0, 0]);
        let table_fact = table.output_facts(&[]).unwrap().remove(0);
        let op = Pad::new(PadOptions::default());
        let inputs =
            [InputRef { fact: &input, op: &op }, InputRef { fact: &table_fact, op: &table }];
        assert!(op.output_facts(&inputs).is_err());
    }
}
