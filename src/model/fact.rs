//! Type and shape information attached to operator outputs.

use std::fmt;

use crate::datum::DatumType;
use crate::TVec;

/// The fully determined type and shape of one operand.
///
/// Written exactly once, when the producing operator validates; immutable
/// afterwards. A finalized shape never contains a non-positive dimension;
/// an empty shape denotes a scalar and broadcasts as `[1]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperandFact {
    pub datum_type: DatumType,
    pub shape: TVec<i32>,
}

impl OperandFact {
    pub fn dt_shape(datum_type: DatumType, shape: impl AsRef<[i32]>) -> OperandFact {
        OperandFact { datum_type, shape: shape.as_ref().iter().copied().collect() }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements. A scalar (empty shape) holds one element.
    pub fn volume(&self) -> usize {
        self.shape.iter().map(|&d| d as usize).product()
    }

    /// The shape as seen by broadcasting rules: scalars act as `[1]`.
    pub fn broadcast_shape(&self) -> TVec<i32> {
        if self.shape.is_empty() {
            crate::tvec![1]
        } else {
            self.shape.clone()
        }
    }
}

impl fmt::Display for OperandFact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for d in &self.shape {
            write!(f, "{},", d)?;
        }
        write!(f, "{}", self.datum_type)
    }
}
