//! General matrix multiplication `alpha * A * B + beta * C`.

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::operand::Operand;
use crate::ops::{all_same_datum_type, check_rank, InputRef, Operator};
use crate::{ensure_valid, tvec, GraphError, TVec};

#[derive(Debug, Clone)]
pub struct GemmOptions {
    pub alpha: f32,
    pub beta: f32,
    pub a_transpose: bool,
    pub b_transpose: bool,
    /// Optional addend, unidirectionally broadcastable to `[M, N]`.
    pub c: Option<Operand>,
}

impl Default for GemmOptions {
    fn default() -> GemmOptions {
        GemmOptions { alpha: 1.0, beta: 1.0, a_transpose: false, b_transpose: false, c: None }
    }
}

#[derive(Debug, Clone)]
pub struct Gemm {
    pub alpha: f32,
    pub beta: f32,
    pub a_transpose: bool,
    pub b_transpose: bool,
    pub has_c: bool,
}

impl Gemm {
    pub fn from_options(options: &GemmOptions) -> Gemm {
        Gemm {
            alpha: options.alpha,
            beta: options.beta,
            a_transpose: options.a_transpose,
            b_transpose: options.b_transpose,
            has_c: options.c.is_some(),
        }
    }
}

impl Operator for Gemm {
    fn name(&self) -> &'static str {
        "Gemm"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let expected = 2 + self.has_c as usize;
        if inputs.len() != expected {
            return Err(GraphError::Internal("gemm wired with wrong arity".to_string()));
        }
        let datum_type = all_same_datum_type(inputs)?;
        let (a, b) = (inputs[0].fact, inputs[1].fact);
        check_rank("a", a, 2)?;
        check_rank("b", b, 2)?;
        let (m, ka) = if self.a_transpose { (a.shape[1], a.shape[0]) } else { (a.shape[0], a.shape[1]) };
        let (kb, n) = if self.b_transpose { (b.shape[1], b.shape[0]) } else { (b.shape[0], b.shape[1]) };
        ensure_valid!(
            ka == kb,
            "gemm inner dimensions do not agree ({} vs {})",
            ka,
            kb
        );
        if self.has_c {
            let c = inputs[2].fact;
            ensure_valid!(
                c.rank() <= 2,
                "argument c must be a scalar or a tensor of rank at most 2 (got {:?})",
                &*c.shape
            );
            // unidirectional broadcast towards [m, n]
            let target = [m, n];
            let shape = c.broadcast_shape();
            for (i, &dim) in shape.iter().rev().enumerate() {
                let t = target[1 - i];
                ensure_valid!(
                    dim == 1 || dim == t,
                    "argument c of shape {:?} does not broadcast to [{}, {}]",
                    &*c.shape,
                    m,
                    n
                );
            }
        }
        Ok(tvec!(OperandFact::dt_shape(datum_type, [m, n])))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_gemm(node, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::DatumType;

    fn infer(options: GemmOptions, shapes: &[&[i32]]) -> GraphResult<TVec<i32>> {
        let mut op = Gemm::from_options(&options);
        op.has_c = shapes.len() == 3;
        let facts: Vec<OperandFact> =
            shapes.iter().map(|s| OperandFact::dt_shape(DatumType::F32, s)).collect();
        let inputs: Vec<InputRef> = facts.iter().map(|fact| InputRef { fact, op: &op }).collect();
        op.output_facts(&inputs).map(|f| f[0].shape.clone())
    }

    #[test]
    fn plain_product() {
        assert_eq!(infer(GemmOptions::default(), &[&[2, 3], &[3, 4]]).unwrap(), tvec![2, 4]);
        assert!(infer(GemmOptions::default(), &[&[2, 3], &[4, 4]]).is_err());
    }

    #[test]
    fn transposed_operands() {
        let options = GemmOptions { a_transpose: true, ..GemmOptions::default() };
        assert_eq!(infer(options, &[&[3, 2], &[3, 4]]).unwrap(), tvec![2, 4]);
        let options = GemmOptions { b_transpose: true, ..GemmOptions::default() };
        assert_eq!(infer(options, &[&[2, 3], &[4, 3]]).unwrap(), tvec![2, 4]);
    }

    #[test]
    fn addend_must_broadcast() {
        assert_eq!(
            infer(GemmOptions::default(), &[&[2, 3], &[3, 4], &[4]]).unwrap(),
            tvec![2, 4]
        );
        assert_eq!(
            infer(GemmOptions::default(), &[&[2, 3], &[3, 4], &[2, 1]]).unwrap(),
            tvec![2, 4]
        );
        assert!(infer(GemmOptions::default(), &[&[2, 3], &[3, 4], &[3]]).is_err());
        assert!(infer(GemmOptions::default(), &[&[2, 3], &[3, 4], &[1, 2, 4]]).is_err());
    }
}
