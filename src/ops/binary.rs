//! Elementwise binary operators and the matrix product.

use derive_new::new;

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::ops::{all_same_datum_type, InputRef, Operator};
use crate::{ensure_valid, invalid, tvec, GraphError, TVec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryKind {
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
    Pow,
    MatMul,
}

impl BinaryKind {
    pub fn name(&self) -> &'static str {
        match self {
            BinaryKind::Add => "Add",
            BinaryKind::Sub => "Sub",
            BinaryKind::Mul => "Mul",
            BinaryKind::Div => "Div",
            BinaryKind::Max => "Max",
            BinaryKind::Min => "Min",
            BinaryKind::Pow => "Pow",
            BinaryKind::MatMul => "MatMul",
        }
    }
}

#[derive(Debug, Clone, new)]
pub struct Binary {
    pub kind: BinaryKind,
}

/// NumPy-style broadcast of two shapes: walk trailing axes inwards, sizes
/// must agree or one of them must be 1, missing leading axes count as 1.
pub fn multi_broadcast(a: &[i32], b: &[i32]) -> GraphResult<TVec<i32>> {
    let len = a.len().max(b.len());
    let mut shape: TVec<i32> = tvec!();
    for i in 0..len {
        let da = if i < a.len() { a[a.len() - 1 - i] } else { 1 };
        let db = if i < b.len() { b[b.len() - 1 - i] } else { 1 };
        if da != db && da != 1 && db != 1 {
            invalid!("shapes {:?} and {:?} cannot be broadcast together", a, b);
        }
        shape.push(da.max(db));
    }
    shape.reverse();
    Ok(shape)
}

fn matmul_shape(a: &[i32], b: &[i32]) -> GraphResult<TVec<i32>> {
    let (la, lb) = (a.len(), b.len());
    match (la, lb) {
        (1, 1) => {
            ensure_valid!(a[0] == b[0], "1D matmul inputs must have the same shape");
            Ok(tvec!(1))
        }
        (2, 1) => {
            ensure_valid!(a[1] == b[0], "matmul shapes {:?} and {:?} are incompatible", a, b);
            Ok(tvec!(a[0], 1))
        }
        (1, 2) => {
            ensure_valid!(a[0] == b[0], "matmul shapes {:?} and {:?} are incompatible", a, b);
            Ok(tvec!(1, b[1]))
        }
        _ if la >= 2 && lb >= 2 => {
            ensure_valid!(
                a[la - 1] == b[lb - 2],
                "matmul shapes {:?} and {:?} are incompatible",
                a,
                b
            );
            let mut shape = multi_broadcast(&a[..la - 2], &b[..lb - 2])?;
            shape.push(a[la - 2]);
            shape.push(b[lb - 1]);
            Ok(shape)
        }
        _ => invalid!("matmul of ranks {} and {} is not supported", la, lb),
    }
}

impl Operator for Binary {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let [a, b] = inputs else {
            return Err(GraphError::Internal("binary operator wired with wrong arity".to_string()));
        };
        let dt = all_same_datum_type(inputs)?;
        let sa = a.fact.broadcast_shape();
        let sb = b.fact.broadcast_shape();
        let shape = match self.kind {
            BinaryKind::MatMul => matmul_shape(&sa, &sb)?,
            _ => multi_broadcast(&sa, &sb)?,
        };
        Ok(tvec!(OperandFact { datum_type: dt, shape }))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_binary(node, self)
    }
}
