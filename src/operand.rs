//! Caller-facing operand handles.

use std::sync::Arc;

use crate::datum::DatumType;
use crate::errors::GraphError;
use crate::model::{OperandFact, OutletId};
use crate::TVec;

/// Requested type and dimensions for an input or constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperandDescriptor {
    pub datum_type: DatumType,
    pub dimensions: TVec<i32>,
}

impl OperandDescriptor {
    pub fn new(datum_type: DatumType, dimensions: impl AsRef<[i32]>) -> OperandDescriptor {
        OperandDescriptor { datum_type, dimensions: dimensions.as_ref().iter().copied().collect() }
    }
}

/// Handle to a tensor value produced by a graph operator.
///
/// Factory methods never fail out of band: a validation failure yields an
/// `Invalid` handle carrying the error, which poisons everything built on
/// top of it until `build` surfaces it. Pattern-match to tell the two
/// apart; valid handles answer shape and type queries directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Valid { outlet: OutletId, fact: OperandFact },
    Invalid(Arc<GraphError>),
}

impl Operand {
    pub fn is_valid(&self) -> bool {
        matches!(self, Operand::Valid { .. })
    }

    pub fn fact(&self) -> Option<&OperandFact> {
        match self {
            Operand::Valid { fact, .. } => Some(fact),
            Operand::Invalid(_) => None,
        }
    }

    pub fn shape(&self) -> Option<&[i32]> {
        self.fact().map(|f| &*f.shape)
    }

    pub fn datum_type(&self) -> Option<DatumType> {
        self.fact().map(|f| f.datum_type)
    }

    pub fn rank(&self) -> Option<usize> {
        self.fact().map(|f| f.rank())
    }

    /// The failure that poisoned this handle, if any.
    pub fn error(&self) -> Option<&GraphError> {
        match self {
            Operand::Valid { .. } => None,
            Operand::Invalid(e) => Some(e),
        }
    }

    pub(crate) fn outlet(&self) -> Option<OutletId> {
        match self {
            Operand::Valid { outlet, .. } => Some(*outlet),
            Operand::Invalid(_) => None,
        }
    }
}
