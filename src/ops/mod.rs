//! Operator definitions: validation, shape inference and lowering.

pub mod activation;
pub mod array;
pub mod binary;
pub mod cnn;
pub mod gemm;
pub mod konst;
pub mod norm;
pub mod reduce;
pub mod resample;
pub mod rnn;
pub mod source;
pub mod unary;

use std::fmt;

use downcast_rs::{impl_downcast, Downcast};

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::{ensure_valid, TVec};

/// Resolved view of one operator input during validation: the fact of the
/// consumed outlet plus its producing operator (needed by operators that
/// inspect constants, like Pad).
#[derive(Clone, Copy)]
pub struct InputRef<'g> {
    pub fact: &'g OperandFact,
    pub op: &'g dyn Operator,
}

/// A computation node.
///
/// `output_facts` performs the whole validate-and-infer step for the
/// operator: structural checks, type consistency between inputs, and the
/// geometric output computation. It runs once, synchronously, at factory
/// time; on success the returned facts are final. `lower` replays the
/// operator against a backend during build, dispatching to the `add_*`
/// method for its kind.
pub trait Operator: fmt::Debug + Downcast {
    fn name(&self) -> &'static str;

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>>;

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()>;
}

impl_downcast!(Operator);

/// Checks that every input shares one datum type, and returns it.
pub(crate) fn all_same_datum_type(
    inputs: &[InputRef],
) -> GraphResult<crate::datum::DatumType> {
    let Some(first) = inputs.first() else {
        return Err(crate::GraphError::Internal("operator wired without inputs".to_string()));
    };
    let first = first.fact.datum_type;
    ensure_valid!(
        inputs.iter().all(|i| i.fact.datum_type == first),
        "argument types are inconsistent"
    );
    Ok(first)
}

/// Checks that a tensor argument has the expected rank.
pub(crate) fn check_rank(what: &str, fact: &OperandFact, rank: usize) -> GraphResult<()> {
    ensure_valid!(
        fact.rank() == rank,
        "argument {} is not a {}D tensor (got shape {:?})",
        what,
        rank,
        &*fact.shape
    );
    Ok(())
}

/// Normalizes a possibly negative axis against a rank.
pub(crate) fn resolve_axis(axis: i32, rank: usize) -> GraphResult<usize> {
    let rank = rank as i32;
    ensure_valid!(axis >= -rank && axis < rank, "axis {} is out of range for rank {}", axis, rank);
    Ok(if axis < 0 { (axis + rank) as usize } else { axis as usize })
}

/// Checks that every entry of an option array is strictly positive.
pub(crate) fn all_positive(what: &str, values: &[i32]) -> GraphResult<()> {
    ensure_valid!(values.iter().all(|&v| v > 0), "{} must be positive (got {:?})", what, values);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_resolution() {
        assert_eq!(resolve_axis(0, 3).unwrap(), 0);
        assert_eq!(resolve_axis(-1, 3).unwrap(), 2);
        assert_eq!(resolve_axis(-3, 3).unwrap(), 0);
        assert!(resolve_axis(3, 3).is_err());
        assert!(resolve_axis(-4, 3).is_err());
    }
}
