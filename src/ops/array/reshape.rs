//! Reshape with a single inferred dimension.

use derive_new::new;

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::ops::{InputRef, Operator};
use crate::{ensure_valid, invalid, tvec, GraphError, TVec};

#[derive(Debug, Clone, new)]
pub struct Reshape {
    /// Requested shape; at most one entry may be −1 and is then inferred
    /// from the element count.
    pub new_shape: TVec<i32>,
}

impl Operator for Reshape {
    fn name(&self) -> &'static str {
        "Reshape"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let [input] = inputs else {
            return Err(GraphError::Internal("reshape wired with wrong arity".to_string()));
        };
        let volume = input.fact.volume();
        let mut inferred_at: Option<usize> = None;
        let mut known: usize = 1;
        let mut shape = self.new_shape.clone();
        for (ix, &dim) in self.new_shape.iter().enumerate() {
            if dim == -1 {
                ensure_valid!(
                    inferred_at.is_none(),
                    "only one dimension of the requested shape may be -1 (got {:?})",
                    &*self.new_shape
                );
                inferred_at = Some(ix);
            } else {
                ensure_valid!(
                    dim > 0,
                    "requested shape dimensions must be positive or -1 (got {:?})",
                    &*self.new_shape
                );
                known *= dim as usize;
            }
        }
        match inferred_at {
            Some(ix) => {
                ensure_valid!(
                    known != 0 && volume % known == 0,
                    "cannot infer a dimension: {} elements do not divide into {:?}",
                    volume,
                    &*self.new_shape
                );
                shape[ix] = (volume / known) as i32;
            }
            None => {
                if known != volume {
                    invalid!(
                        "requested shape {:?} holds {} elements, input has {}",
                        &*self.new_shape,
                        known,
                        volume
                    );
                }
            }
        }
        Ok(tvec!(OperandFact { datum_type: input.fact.datum_type, shape }))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_reshape(node, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::DatumType;
    use proptest::prelude::*;

    fn infer(input: &[i32], new_shape: &[i32]) -> GraphResult<TVec<i32>> {
        let fact = OperandFact::dt_shape(DatumType::F32, input);
        let op = Reshape::new(new_shape.iter().copied().collect());
        let inputs = [InputRef { fact: &fact, op: &op }];
        op.output_facts(&inputs).map(|f| f[0].shape.clone())
    }

    #[test]
    fn infers_the_wildcard_dimension() {
        assert_eq!(infer(&[2, 6], &[-1, 3]).unwrap(), tvec![4, 3]);
        assert_eq!(infer(&[2, 6], &[3, -1]).unwrap(), tvec![3, 4]);
    }

    #[test]
    fn explicit_shape_must_conserve_elements() {
        assert_eq!(infer(&[2, 6], &[3, 4]).unwrap(), tvec![3, 4]);
        assert!(infer(&[2, 6], &[3, 5]).is_err());
    }

    #[test]
    fn at_most_one_wildcard() {
        assert!(infer(&[2, 6], &[-1, -1]).is_err());
    }

    #[test]
    fn zero_or_negative_dimensions_are_rejected() {
        assert!(infer(&[2, 6], &[0, 12]).is_err());
        assert!(infer(&[2, 6], &[-2, 6]).is_err());
    }

    #[test]
    fn non_divisible_wildcard_is_rejected() {
        assert!(infer(&[2, 6], &[-1, 5]).is_err());
    }

    proptest! {
        // Reshaping back to the original shape restores it.
        #[test]
        fn round_trip(shape in proptest::collection::vec(1i32..5, 1..4), split in 1i32..4) {
            let volume: i32 = shape.iter().product();
            prop_assume!(volume % split == 0);
            let through = infer(&shape, &[split, -1]).unwrap();
            let back = infer(&through, &shape).unwrap();
            prop_assert_eq!(&*back, &*shape);
        }
    }
}
