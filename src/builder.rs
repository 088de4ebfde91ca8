//! The graph construction façade.
//!
//! One factory method per operator kind. Every factory validates and
//! shape-infers synchronously and returns operand handles; a validation
//! failure poisons the returned handles instead of failing out of band,
//! so callers can chain freely and inspect errors at `build` time.

use std::sync::Arc;

use log::{debug, warn};

use crate::backend::{Backend, CompiledGraph};
use crate::datum::DatumType;
use crate::errors::{GraphError, GraphResult};
use crate::model::{eval_order_for_nodes, Node, Outlet, OutletId};
use crate::names::NamedOperands;
use crate::operand::{Operand, OperandDescriptor};
use crate::ops::activation::{Clamp, ClampOptions, LeakyRelu, LeakyReluOptions};
use crate::ops::array::{
    Concat, Pad, PadOptions, Reshape, Slice, SliceOptions, Split, SplitOptions, Squeeze,
    SqueezeOptions, Transpose, TransposeOptions,
};
use crate::ops::binary::{Binary, BinaryKind};
use crate::ops::cnn::{
    Conv2d, Conv2dOptions, ConvTranspose2d, ConvTranspose2dOptions, Pool2d, Pool2dKind,
    Pool2dOptions,
};
use crate::ops::gemm::{Gemm, GemmOptions};
use crate::ops::konst::Constant;
use crate::ops::norm::{
    BatchNorm, BatchNormOptions, InstanceNorm, InstanceNormOptions,
};
use crate::ops::reduce::{Reduce, ReduceKind, ReduceOptions};
use crate::ops::resample::{Resample2d, Resample2dOptions};
use crate::ops::rnn::{Gru, GruOptions};
use crate::ops::source::Input;
use crate::ops::unary::{Unary, UnaryKind};
use crate::ops::{InputRef, Operator};
use crate::{ensure_valid, tvec, TVec};

/// Builds an operator graph against an owned backend.
///
/// The builder retains every successfully validated operator; failed ones
/// are dropped on the spot. A builder is single-threaded: wrap it in
/// external synchronization before sharing.
pub struct GraphBuilder {
    backend: Box<dyn Backend>,
    nodes: Vec<Node>,
}

impl GraphBuilder {
    pub fn new(backend: Box<dyn Backend>) -> GraphBuilder {
        GraphBuilder { backend, nodes: vec![] }
    }

    /// The retained operators, in creation order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    /// The validate-retain-return step shared by every factory.
    ///
    /// Poisoned inputs short-circuit: the upstream error is propagated
    /// without revalidating anything. A failed validation is logged, the
    /// operator is not retained, and `arity` poisoned handles are
    /// returned so chained construction keeps going.
    fn wire(&mut self, op: Box<dyn Operator>, inputs: &[&Operand], arity: usize) -> TVec<Operand> {
        for input in inputs {
            if let Operand::Invalid(e) = input {
                warn!("{} fed with a poisoned operand: {}", op.name(), e);
                return tvec![Operand::Invalid(e.clone()); arity];
            }
        }
        let outlets: TVec<OutletId> = inputs.iter().filter_map(|i| i.outlet()).collect();
        let facts = {
            let refs: TVec<InputRef> = outlets
                .iter()
                .map(|o| InputRef {
                    fact: self.nodes[o.node].output_fact(o.slot),
                    op: self.nodes[o.node].op(),
                })
                .collect();
            op.output_facts(&refs)
        };
        match facts {
            Err(e) => {
                warn!("dropping {}: {}", op.name(), e);
                tvec![Operand::Invalid(Arc::new(e)); arity]
            }
            Ok(facts) => {
                let id = self.nodes.len();
                let name = format!("{}_{}", op.name().to_lowercase(), id);
                let operands: TVec<Operand> = facts
                    .iter()
                    .enumerate()
                    .map(|(slot, fact)| Operand::Valid {
                        outlet: OutletId::new(id, slot),
                        fact: fact.clone(),
                    })
                    .collect();
                let outputs: TVec<Outlet> = facts.into_iter().map(|fact| Outlet { fact }).collect();
                self.nodes.push(Node { id, name, op, inputs: outlets, outputs });
                operands
            }
        }
    }

    fn wire_one(&mut self, op: Box<dyn Operator>, inputs: &[&Operand]) -> Operand {
        match self.wire(op, inputs, 1).into_iter().next() {
            Some(operand) => operand,
            None => Operand::Invalid(Arc::new(GraphError::Internal(
                "operator produced no output".to_string(),
            ))),
        }
    }

    // ---------------- sources ----------------

    pub fn input(&mut self, name: &str, descriptor: &OperandDescriptor) -> Operand {
        self.wire_one(Box::new(Input::new(name, descriptor.clone())), &[])
    }

    pub fn constant(&mut self, descriptor: &OperandDescriptor, data: &[u8]) -> Operand {
        self.wire_one(Box::new(Constant::new(descriptor.clone(), data.to_vec())), &[])
    }

    /// Scalar constant: synthesizes a one-element buffer of the requested
    /// type.
    pub fn constant_scalar(&mut self, value: f32, datum_type: DatumType) -> Operand {
        self.wire_one(Box::new(Constant::scalar(value, datum_type)), &[])
    }

    // ---------------- elementwise ----------------

    pub fn binary(&mut self, kind: BinaryKind, a: &Operand, b: &Operand) -> Operand {
        self.wire_one(Box::new(Binary::new(kind)), &[a, b])
    }

    pub fn add(&mut self, a: &Operand, b: &Operand) -> Operand {
        self.binary(BinaryKind::Add, a, b)
    }

    pub fn sub(&mut self, a: &Operand, b: &Operand) -> Operand {
        self.binary(BinaryKind::Sub, a, b)
    }

    pub fn mul(&mut self, a: &Operand, b: &Operand) -> Operand {
        self.binary(BinaryKind::Mul, a, b)
    }

    pub fn div(&mut self, a: &Operand, b: &Operand) -> Operand {
        self.binary(BinaryKind::Div, a, b)
    }

    pub fn max(&mut self, a: &Operand, b: &Operand) -> Operand {
        self.binary(BinaryKind::Max, a, b)
    }

    pub fn min(&mut self, a: &Operand, b: &Operand) -> Operand {
        self.binary(BinaryKind::Min, a, b)
    }

    pub fn pow(&mut self, a: &Operand, b: &Operand) -> Operand {
        self.binary(BinaryKind::Pow, a, b)
    }

    pub fn matmul(&mut self, a: &Operand, b: &Operand) -> Operand {
        self.binary(BinaryKind::MatMul, a, b)
    }

    pub fn unary(&mut self, kind: UnaryKind, input: &Operand) -> Operand {
        self.wire_one(Box::new(Unary::new(kind)), &[input])
    }

    pub fn abs(&mut self, input: &Operand) -> Operand {
        self.unary(UnaryKind::Abs, input)
    }

    pub fn ceil(&mut self, input: &Operand) -> Operand {
        self.unary(UnaryKind::Ceil, input)
    }

    pub fn cos(&mut self, input: &Operand) -> Operand {
        self.unary(UnaryKind::Cos, input)
    }

    pub fn exp(&mut self, input: &Operand) -> Operand {
        self.unary(UnaryKind::Exp, input)
    }

    pub fn floor(&mut self, input: &Operand) -> Operand {
        self.unary(UnaryKind::Floor, input)
    }

    pub fn log(&mut self, input: &Operand) -> Operand {
        self.unary(UnaryKind::Log, input)
    }

    pub fn neg(&mut self, input: &Operand) -> Operand {
        self.unary(UnaryKind::Neg, input)
    }

    pub fn sin(&mut self, input: &Operand) -> Operand {
        self.unary(UnaryKind::Sin, input)
    }

    pub fn tan(&mut self, input: &Operand) -> Operand {
        self.unary(UnaryKind::Tan, input)
    }

    pub fn relu(&mut self, input: &Operand) -> Operand {
        self.unary(UnaryKind::Relu, input)
    }

    pub fn sigmoid(&mut self, input: &Operand) -> Operand {
        self.unary(UnaryKind::Sigmoid, input)
    }

    pub fn tanh(&mut self, input: &Operand) -> Operand {
        self.unary(UnaryKind::Tanh, input)
    }

    pub fn hard_swish(&mut self, input: &Operand) -> Operand {
        self.unary(UnaryKind::HardSwish, input)
    }

    pub fn softmax(&mut self, input: &Operand) -> Operand {
        self.unary(UnaryKind::Softmax, input)
    }

    pub fn clamp(&mut self, input: &Operand, options: &ClampOptions) -> Operand {
        self.wire_one(Box::new(Clamp::new(*options)), &[input])
    }

    pub fn leaky_relu(&mut self, input: &Operand, options: &LeakyReluOptions) -> Operand {
        self.wire_one(Box::new(LeakyRelu::new(*options)), &[input])
    }

    // ---------------- convolution and pooling ----------------

    pub fn conv2d(&mut self, input: &Operand, filter: &Operand, options: &Conv2dOptions) -> Operand {
        let mut inputs: TVec<&Operand> = tvec![input, filter];
        if let Some(bias) = &options.bias {
            inputs.push(bias);
        }
        self.wire_one(Box::new(Conv2d::from_options(options)), &inputs)
    }

    pub fn conv_transpose2d(
        &mut self,
        input: &Operand,
        filter: &Operand,
        options: &ConvTranspose2dOptions,
    ) -> Operand {
        let mut inputs: TVec<&Operand> = tvec![input, filter];
        if let Some(bias) = &options.bias {
            inputs.push(bias);
        }
        self.wire_one(Box::new(ConvTranspose2d::from_options(options)), &inputs)
    }

    pub fn pool2d(&mut self, kind: Pool2dKind, input: &Operand, options: &Pool2dOptions) -> Operand {
        self.wire_one(Box::new(Pool2d::new(kind, options.clone())), &[input])
    }

    pub fn average_pool2d(&mut self, input: &Operand, options: &Pool2dOptions) -> Operand {
        self.pool2d(Pool2dKind::Average, input, options)
    }

    pub fn l2_pool2d(&mut self, input: &Operand, options: &Pool2dOptions) -> Operand {
        self.pool2d(Pool2dKind::L2, input, options)
    }

    pub fn max_pool2d(&mut self, input: &Operand, options: &Pool2dOptions) -> Operand {
        self.pool2d(Pool2dKind::Max, input, options)
    }

    // ---------------- linear algebra and recurrence ----------------

    pub fn gemm(&mut self, a: &Operand, b: &Operand, options: &GemmOptions) -> Operand {
        let mut inputs: TVec<&Operand> = tvec![a, b];
        if let Some(c) = &options.c {
            inputs.push(c);
        }
        self.wire_one(Box::new(Gemm::from_options(options)), &inputs)
    }

    /// Returns the last hidden state, plus the full sequence when
    /// `return_sequence` is set.
    pub fn gru(
        &mut self,
        input: &Operand,
        weight: &Operand,
        recurrent_weight: &Operand,
        steps: i32,
        hidden_size: i32,
        options: &GruOptions,
    ) -> TVec<Operand> {
        let op = Gru::from_options(steps, hidden_size, options);
        let arity = op.output_arity();
        let mut inputs: TVec<&Operand> = tvec![input, weight, recurrent_weight];
        if let Some(bias) = &options.bias {
            inputs.push(bias);
        }
        if let Some(bias) = &options.recurrent_bias {
            inputs.push(bias);
        }
        if let Some(state) = &options.initial_hidden_state {
            inputs.push(state);
        }
        self.wire(Box::new(op), &inputs, arity)
    }

    // ---------------- normalization ----------------

    pub fn batch_norm(
        &mut self,
        input: &Operand,
        mean: &Operand,
        variance: &Operand,
        options: &BatchNormOptions,
    ) -> Operand {
        let mut inputs: TVec<&Operand> = tvec![input, mean, variance];
        if let Some(scale) = &options.scale {
            inputs.push(scale);
        }
        if let Some(bias) = &options.bias {
            inputs.push(bias);
        }
        self.wire_one(Box::new(BatchNorm::from_options(options)), &inputs)
    }

    pub fn instance_norm(&mut self, input: &Operand, options: &InstanceNormOptions) -> Operand {
        let mut inputs: TVec<&Operand> = tvec![input];
        if let Some(scale) = &options.scale {
            inputs.push(scale);
        }
        if let Some(bias) = &options.bias {
            inputs.push(bias);
        }
        self.wire_one(Box::new(InstanceNorm::from_options(options)), &inputs)
    }

    // ---------------- shape and layout ----------------

    pub fn concat(&mut self, inputs: &[&Operand], axis: i32) -> Operand {
        self.wire_one(Box::new(Concat::new(axis)), inputs)
    }

    pub fn pad(&mut self, input: &Operand, padding: &Operand, options: &PadOptions) -> Operand {
        self.wire_one(Box::new(Pad::new(*options)), &[input, padding])
    }

    pub fn reshape(&mut self, input: &Operand, new_shape: &[i32]) -> Operand {
        self.wire_one(Box::new(Reshape::new(new_shape.iter().copied().collect())), &[input])
    }

    pub fn slice(
        &mut self,
        input: &Operand,
        starts: &[i32],
        sizes: &[i32],
        options: &SliceOptions,
    ) -> Operand {
        let op = Slice::new(
            starts.iter().copied().collect(),
            sizes.iter().copied().collect(),
            options.axes.clone(),
        );
        self.wire_one(Box::new(op), &[input])
    }

    /// A single entry in `splits` is a count of equal parts; several
    /// entries are explicit sizes along the axis.
    pub fn split(&mut self, input: &Operand, splits: &[u32], options: &SplitOptions) -> TVec<Operand> {
        let op = Split::new(splits.iter().copied().collect(), options.axis);
        let arity = op.output_arity();
        self.wire(Box::new(op), &[input], arity)
    }

    pub fn squeeze(&mut self, input: &Operand, options: &SqueezeOptions) -> Operand {
        self.wire_one(Box::new(Squeeze::new(options.axes.clone())), &[input])
    }

    pub fn transpose(&mut self, input: &Operand, options: &TransposeOptions) -> Operand {
        let permutation: TVec<i32> = match &options.permutation {
            Some(p) => p.iter().copied().collect(),
            // default: reverse the axes (resolved here, where the input
            // rank is known; irrelevant when the input is poisoned)
            None => match input.rank() {
                Some(rank) => (0..rank as i32).rev().collect(),
                None => tvec!(),
            },
        };
        self.wire_one(Box::new(Transpose::new(permutation)), &[input])
    }

    pub fn reduce(&mut self, kind: ReduceKind, input: &Operand, options: &ReduceOptions) -> Operand {
        let axes: TVec<i32> = match &options.axes {
            Some(axes) => axes.iter().copied().collect(),
            // default: reduce every axis (scalars reduce as [1])
            None => match input.rank() {
                Some(rank) => (0..rank.max(1) as i32).collect(),
                None => tvec!(),
            },
        };
        self.wire_one(Box::new(Reduce::new(kind, axes, options.keep_dimensions)), &[input])
    }

    pub fn reduce_l1(&mut self, input: &Operand, options: &ReduceOptions) -> Operand {
        self.reduce(ReduceKind::L1, input, options)
    }

    pub fn reduce_l2(&mut self, input: &Operand, options: &ReduceOptions) -> Operand {
        self.reduce(ReduceKind::L2, input, options)
    }

    pub fn reduce_max(&mut self, input: &Operand, options: &ReduceOptions) -> Operand {
        self.reduce(ReduceKind::Max, input, options)
    }

    pub fn reduce_mean(&mut self, input: &Operand, options: &ReduceOptions) -> Operand {
        self.reduce(ReduceKind::Mean, input, options)
    }

    pub fn reduce_min(&mut self, input: &Operand, options: &ReduceOptions) -> Operand {
        self.reduce(ReduceKind::Min, input, options)
    }

    pub fn reduce_product(&mut self, input: &Operand, options: &ReduceOptions) -> Operand {
        self.reduce(ReduceKind::Product, input, options)
    }

    pub fn reduce_sum(&mut self, input: &Operand, options: &ReduceOptions) -> Operand {
        self.reduce(ReduceKind::Sum, input, options)
    }

    pub fn resample2d(&mut self, input: &Operand, options: &Resample2dOptions) -> Operand {
        self.wire_one(Box::new(Resample2d::new(options.clone())), &[input])
    }

    // ---------------- build ----------------

    /// Linearizes the graph feeding the named outputs and replays it
    /// against the backend: one `add_*` per operator in dependency order,
    /// then `add_output` for every name, `finish`, `compile`.
    ///
    /// The first failure aborts the whole build; no further backend calls
    /// are made and no partially built graph escapes.
    pub fn build(&self, outputs: &NamedOperands) -> GraphResult<Box<dyn CompiledGraph>> {
        ensure_valid!(!outputs.is_empty(), "the set of named outputs is empty");
        let mut roots: Vec<(&str, OutletId)> = Vec::with_capacity(outputs.len());
        for (name, operand) in outputs.records() {
            match operand {
                Operand::Invalid(e) => return Err((**e).clone()),
                Operand::Valid { outlet, .. } => roots.push((name, *outlet)),
            }
        }
        let targets: Vec<usize> = roots.iter().map(|(_, outlet)| outlet.node).collect();
        let order = eval_order_for_nodes(&self.nodes, &targets)?;
        debug!("build plan: {} operators for {} outputs", order.len(), roots.len());
        let mut graph = self.backend.create_graph()?;
        for &id in &order {
            let node = &self.nodes[id];
            node.op.lower(node, &mut *graph)?;
        }
        for (name, outlet) in roots {
            graph.add_output(name, outlet)?;
        }
        graph.finish()?;
        graph.compile()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::NullBackend;
    use crate::ops::binary::Binary;
    use crate::ops::source::Input as InputOp;

    fn builder() -> GraphBuilder {
        GraphBuilder::new(Box::new(NullBackend::new()))
    }

    fn f32_input(b: &mut GraphBuilder, name: &str, shape: &[i32]) -> Operand {
        b.input(name, &OperandDescriptor::new(DatumType::F32, shape))
    }

    #[test]
    fn factories_retain_validated_operators() {
        let mut b = builder();
        let x = f32_input(&mut b, "x", &[2, 3]);
        let y = b.relu(&x);
        assert!(y.is_valid());
        assert_eq!(b.nodes().len(), 2);
        assert!(b.node(0).op_is::<InputOp>());
        assert!(b.node(1).op().name() == "Relu");
    }

    #[test]
    fn failed_operators_are_not_retained() {
        let mut b = builder();
        let x = f32_input(&mut b, "x", &[2, 3]);
        let flat = b.reshape(&x, &[6]);
        let bad = b.softmax(&flat);
        assert!(!bad.is_valid());
        // input and reshape retained, softmax dropped
        assert_eq!(b.nodes().len(), 2);
    }

    #[test]
    fn poisoned_operands_propagate_without_revalidation() {
        let mut b = builder();
        let x = f32_input(&mut b, "x", &[2, 3]);
        let bad = b.reshape(&x, &[5]);
        assert!(!bad.is_valid());
        let chained = b.relu(&bad);
        let more = b.add(&chained, &x);
        assert_eq!(more.error(), bad.error());
        assert_eq!(b.nodes().len(), 1);
    }

    #[test]
    fn operand_handles_answer_shape_queries() {
        let mut b = builder();
        let x = f32_input(&mut b, "x", &[2, 3]);
        assert_eq!(x.shape().unwrap(), [2, 3]);
        assert_eq!(x.datum_type().unwrap(), DatumType::F32);
        let xt = b.reshape(&x, &[3, 2]);
        let y = b.matmul(&x, &xt);
        assert_eq!(y.shape().unwrap(), [2, 2]);
        assert!(b.node(y.outlet().unwrap().node).op_is::<Binary>());
    }

    #[test]
    fn build_rejects_an_empty_output_set() {
        let b = builder();
        let err = b.build(&NamedOperands::new()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn build_surfaces_the_poisoning_error() {
        let mut b = builder();
        let x = f32_input(&mut b, "x", &[2, 3]);
        let bad = b.reshape(&x, &[7]);
        let mut outputs = NamedOperands::new();
        outputs.set("y", bad.clone());
        let err = b.build(&outputs).unwrap_err();
        assert_eq!(&err, bad.error().unwrap());
    }

    #[test]
    fn node_names_are_unique_and_kind_based() {
        let mut b = builder();
        let x = f32_input(&mut b, "x", &[2, 3]);
        let y = b.relu(&x);
        let z = b.relu(&y);
        assert_eq!(b.node(z.outlet().unwrap().node).name, "relu_2");
        assert_eq!(b.node(1).name, "relu_1");
    }
}
