//! Removal of unit dimensions.

use derive_new::new;

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::ops::{resolve_axis, InputRef, Operator};
use crate::{ensure_valid, tvec, GraphError, TVec};

#[derive(Debug, Clone, Default)]
pub struct SqueezeOptions {
    /// Axes to remove; `None` removes every unit dimension.
    pub axes: Option<Vec<i32>>,
}

#[derive(Debug, Clone, new)]
pub struct Squeeze {
    pub axes: Option<Vec<i32>>,
}

impl Operator for Squeeze {
    fn name(&self) -> &'static str {
        "Squeeze"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let [input] = inputs else {
            return Err(GraphError::Internal("squeeze wired with wrong arity".to_string()));
        };
        let rank = input.fact.rank();
        let shape: TVec<i32> = match &self.axes {
            None => input.fact.shape.iter().copied().filter(|&d| d != 1).collect(),
            Some(axes) => {
                let mut drop = vec![false; rank];
                for &axis in axes {
                    let axis = resolve_axis(axis, rank)?;
                    ensure_valid!(
                        input.fact.shape[axis] == 1,
                        "cannot squeeze axis {} of size {}",
                        axis,
                        input.fact.shape[axis]
                    );
                    drop[axis] = true;
                }
                input
                    .fact
                    .shape
                    .iter()
                    .enumerate()
                    .filter(|(d, _)| !drop[*d])
                    .map(|(_, &s)| s)
                    .collect()
            }
        };
        let shape = if shape.is_empty() { tvec![1] } else { shape };
        Ok(tvec!(OperandFact { datum_type: input.fact.datum_type, shape }))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_squeeze(node, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::DatumType;

    fn infer(input: &[i32], axes: Option<Vec<i32>>) -> GraphResult<TVec<i32>> {
        let fact = OperandFact::dt_shape(DatumType::F32, input);
        let op = Squeeze::new(axes);
        let inputs = [InputRef { fact: &fact, op: &op }];
        op.output_facts(&inputs).map(|f| f[0].shape.clone())
    }

    #[test]
    fn drops_every_unit_dimension_by_default() {
        assert_eq!(infer(&[1, 3, 1, 4], None).unwrap(), tvec![3, 4]);
    }

    #[test]
    fn explicit_axes_must_be_unit() {
        assert_eq!(infer(&[1, 3, 1, 4], Some(vec![0])).unwrap(), tvec![3, 1, 4]);
        assert_eq!(infer(&[1, 3, 1, 4], Some(vec![0, -2])).unwrap(), tvec![3, 4]);
        assert!(infer(&[1, 3, 1, 4], Some(vec![1])).is_err());
    }

    #[test]
    fn squeezing_everything_leaves_a_unit_shape() {
        assert_eq!(infer(&[1, 1], None).unwrap(), tvec![1]);
    }
}
