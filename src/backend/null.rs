//! A backend that accepts everything and computes nothing.
//!
//! Used to exercise the build pipeline without a numeric engine: it
//! records the sequence of contract calls, and its compiled graphs only
//! check that requested outputs were declared.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::backend::{Backend, BackendGraph, CompiledGraph};
use crate::errors::GraphResult;
use crate::invalid;
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

#[derive(Debug, Clone, Default)]
pub struct NullBackend {
    calls: Rc<RefCell<Vec<String>>>,
}

impl NullBackend {
    pub fn new() -> NullBackend {
        NullBackend::default()
    }

    /// Every contract call recorded so far, across all graphs of this
    /// backend.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Backend for NullBackend {
    fn create_graph(&self) -> GraphResult<Box<dyn BackendGraph>> {
        Ok(Box::new(NullGraph { calls: self.calls.clone(), outputs: BTreeSet::new() }))
    }
}

struct NullGraph {
    calls: Rc<RefCell<Vec<String>>>,
    outputs: BTreeSet<String>,
}

impl NullGraph {
    fn record(&mut self, node: &Node) -> GraphResult<()> {
        self.calls.borrow_mut().push(node.name.clone());
        Ok(())
    }
}

impl BackendGraph for NullGraph {
    fn add_input(&mut self, node: &Node, _op: &Input) -> GraphResult<()> {
        self.record(node)
    }
    fn add_constant(&mut self, node: &Node, _op: &Constant) -> GraphResult<()> {
        self.record(node)
    }
    fn add_batch_norm(&mut self, node: &Node, _op: &BatchNorm) -> GraphResult<()> {
        self.record(node)
    }
    fn add_binary(&mut self, node: &Node, _op: &Binary) -> GraphResult<()> {
        self.record(node)
    }
    fn add_clamp(&mut self, node: &Node, _op: &Clamp) -> GraphResult<()> {
        self.record(node)
    }
    fn add_concat(&mut self, node: &Node, _op: &Concat) -> GraphResult<()> {
        self.record(node)
    }
    fn add_conv2d(&mut self, node: &Node, _op: &Conv2d) -> GraphResult<()> {
        self.record(node)
    }
    fn add_conv_transpose2d(&mut self, node: &Node, _op: &ConvTranspose2d) -> GraphResult<()> {
        self.record(node)
    }
    fn add_gemm(&mut self, node: &Node, _op: &Gemm) -> GraphResult<()> {
        self.record(node)
    }
    fn add_gru(&mut self, node: &Node, _op: &Gru) -> GraphResult<()> {
        self.record(node)
    }
    fn add_instance_norm(&mut self, node: &Node, _op: &InstanceNorm) -> GraphResult<()> {
        self.record(node)
    }
    fn add_leaky_relu(&mut self, node: &Node, _op: &LeakyRelu) -> GraphResult<()> {
        self.record(node)
    }
    fn add_pad(&mut self, node: &Node, _op: &Pad) -> GraphResult<()> {
        self.record(node)
    }
    fn add_pool2d(&mut self, node: &Node, _op: &Pool2d) -> GraphResult<()> {
        self.record(node)
    }
    fn add_reduce(&mut self, node: &Node, _op: &Reduce) -> GraphResult<()> {
        self.record(node)
    }
    fn add_resample2d(&mut self, node: &Node, _op: &Resample2d) -> GraphResult<()> {
        self.record(node)
    }
    fn add_reshape(&mut self, node: &Node, _op: &Reshape) -> GraphResult<()> {
        self.record(node)
    }
    fn add_slice(&mut self, node: &Node, _op: &Slice) -> GraphResult<()> {
        self.record(node)
    }
    fn add_split(&mut self, node: &Node, _op: &Split) -> GraphResult<()> {
        self.record(node)
    }
    fn add_squeeze(&mut self, node: &Node, _op: &Squeeze) -> GraphResult<()> {
        self.record(node)
    }
    fn add_transpose(&mut self, node: &Node, _op: &Transpose) -> GraphResult<()> {
        self.record(node)
    }
    fn add_unary(&mut self, node: &Node, _op: &Unary) -> GraphResult<()> {
        self.record(node)
    }

    fn add_output(&mut self, name: &str, _outlet: OutletId) -> GraphResult<()> {
        self.calls.borrow_mut().push(format!("output:{}", name));
        self.outputs.insert(name.to_string());
        Ok(())
    }

    fn finish(&mut self) -> GraphResult<()> {
        self.calls.borrow_mut().push("finish".to_string());
        Ok(())
    }

    fn compile(self: Box<Self>) -> GraphResult<Box<dyn CompiledGraph>> {
        self.calls.borrow_mut().push("compile".to_string());
        Ok(Box::new(NullCompiledGraph { outputs: self.outputs }))
    }
}

#[derive(Debug)]
struct NullCompiledGraph {
    outputs: BTreeSet<String>,
}

impl CompiledGraph for NullCompiledGraph {
    fn compute(&self, _inputs: &NamedInputs, outputs: &mut NamedOutputs) -> GraphResult<()> {
        for name in outputs.names() {
            if !self.outputs.contains(name) {
                invalid!("\"{}\" is not an output of this graph", name);
            }
        }
        Ok(())
    }
}
