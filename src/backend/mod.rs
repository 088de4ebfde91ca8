//! The contract numeric backends implement to consume a linearized graph.
//!
//! `build` replays the sorted plan as one `add_*` call per operator, then
//! declares outputs, finishes and compiles. Backends keep their own state
//! keyed by [`OutletId`]: when an operator is added, all of its input
//! outlets have already been seen.

pub mod null;

use crate::errors::{GraphError, GraphResult};
use crate::model::{Node, OutletId};
use crate::names::{NamedInputs, NamedOutputs};
use crate::ops::activation::{Clamp, LeakyRelu};
use crate::ops::array::{Concat, Pad, Reshape, Slice, Split, Squeeze, Transpose};
use crate::ops::binary::Binary;
use crate::ops::cnn::{Conv2d, ConvTranspose2d, Pool2d};
use crate::ops::gemm::Gemm;
use crate::ops::konst::Constant;
use crate::ops::norm::{BatchNorm, InstanceNorm};
use crate::ops::reduce::Reduce;
use crate::ops::resample::Resample2d;
use crate::ops::rnn::Gru;
use crate::ops::source::Input;
use crate::ops::unary::Unary;

fn unsupported<T>(kind: &str) -> GraphResult<T> {
    Err(GraphError::Unimplemented(format!("this backend does not support {}", kind)))
}

/// A backend: hands out fresh graphs to build into.
pub trait Backend {
    fn create_graph(&self) -> GraphResult<Box<dyn BackendGraph>>;
}

/// A graph under construction inside a backend.
///
/// Every `add_*` defaults to an `Unimplemented` error so partial backends
/// reject cleanly instead of miscompiling.
#[allow(unused_variables)]
pub trait BackendGraph {
    fn add_input(&mut self, node: &Node, op: &Input) -> GraphResult<()> {
        unsupported("Input")
    }
    fn add_constant(&mut self, node: &Node, op: &Constant) -> GraphResult<()> {
        unsupported("Constant")
    }
    fn add_batch_norm(&mut self, node: &Node, op: &BatchNorm) -> GraphResult<()> {
        unsupported("BatchNorm")
    }
    fn add_binary(&mut self, node: &Node, op: &Binary) -> GraphResult<()> {
        unsupported("Binary")
    }
    fn add_clamp(&mut self, node: &Node, op: &Clamp) -> GraphResult<()> {
        unsupported("Clamp")
    }
    fn add_concat(&mut self, node: &Node, op: &Concat) -> GraphResult<()> {
        unsupported("Concat")
    }
    fn add_conv2d(&mut self, node: &Node, op: &Conv2d) -> GraphResult<()> {
        unsupported("Conv2d")
    }
    fn add_conv_transpose2d(&mut self, node: &Node, op: &ConvTranspose2d) -> GraphResult<()> {
        unsupported("ConvTranspose2d")
    }
    fn add_gemm(&mut self, node: &Node, op: &Gemm) -> GraphResult<()> {
        unsupported("Gemm")
    }
    fn add_gru(&mut self, node: &Node, op: &Gru) -> GraphResult<()> {
        unsupported("Gru")
    }
    fn add_instance_norm(&mut self, node: &Node, op: &InstanceNorm) -> GraphResult<()> {
        unsupported("InstanceNorm")
    }
    fn add_leaky_relu(&mut self, node: &Node, op: &LeakyRelu) -> GraphResult<()> {
        unsupported("LeakyRelu")
    }
    fn add_pad(&mut self, node: &Node, op: &Pad) -> GraphResult<()> {
        unsupported("Pad")
    }
    fn add_pool2d(&mut self, node: &Node, op: &Pool2d) -> GraphResult<()> {
        unsupported("Pool2d")
    }
    fn add_reduce(&mut self, node: &Node, op: &Reduce) -> GraphResult<()> {
        unsupported("Reduce")
    }
    fn add_resample2d(&mut self, node: &Node, op: &Resample2d) -> GraphResult<()> {
        unsupported("Resample2d")
    }
    fn add_reshape(&mut self, node: &Node, op: &Reshape) -> GraphResult<()> {
        unsupported("Reshape")
    }
    fn add_slice(&mut self, node: &Node, op: &Slice) -> GraphResult<()> {
        unsupported("Slice")
    }
    fn add_split(&mut self, node: &Node, op: &Split) -> GraphResult<()> {
        unsupported("Split")
    }
    fn add_squeeze(&mut self, node: &Node, op: &Squeeze) -> GraphResult<()> {
        unsupported("Squeeze")
    }
    fn add_transpose(&mut self, node: &Node, op: &Transpose) -> GraphResult<()> {
        unsupported("Transpose")
    }
    fn add_unary(&mut self, node: &Node, op: &Unary) -> GraphResult<()> {
        unsupported("Unary")
    }

    /// Declares a named graph output reading from `outlet`.
    fn add_output(&mut self, name: &str, outlet: OutletId) -> GraphResult<()>;

    /// Called once after all operators and outputs are in.
    fn finish(&mut self) -> GraphResult<()>;

    /// Consumes the built graph and produces an executable one.
    fn compile(self: Box<Self>) -> GraphResult<Box<dyn CompiledGraph>>;
}

/// An executable graph.
pub trait CompiledGraph: std::fmt::Debug {
    fn compute(&self, inputs: &NamedInputs, outputs: &mut NamedOutputs) -> GraphResult<()>;
}
