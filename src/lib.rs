//! Backend-agnostic neural-network graph IR.
//!
//! A [`builder::GraphBuilder`] turns chained factory calls into a DAG of
//! typed, shaped operators. Each factory validates its operator and infers
//! its output shapes on the spot; failures poison the returned handles
//! instead of unwinding, so a whole graph can be assembled before a single
//! error check. `build` then linearizes the DAG and replays it against a
//! pluggable [`backend::Backend`].
//!
//! ```
//! use nngraph::prelude::*;
//! use nngraph::backend::null::NullBackend;
//!
//! let mut builder = GraphBuilder::new(Box::new(NullBackend::new()));
//!
//! let x = builder.input("x", &OperandDescriptor::new(DatumType::F32, [1, 3, 4, 4]));
//! let filter = builder.constant(
//!     &OperandDescriptor::new(DatumType::F32, [2, 3, 3, 3]),
//!     &[0u8; 2 * 3 * 3 * 3 * 4],
//! );
//! let conv = builder.conv2d(&x, &filter, &Conv2dOptions::default());
//! let y = builder.relu(&conv);
//! assert_eq!(y.shape().unwrap(), [1, 2, 2, 2]);
//!
//! let mut outputs = NamedOperands::new();
//! outputs.set("y", y);
//! let graph = builder.build(&outputs).unwrap();
//! # let _ = graph;
//! ```

pub mod backend;
pub mod builder;
pub mod datum;
pub mod errors;
mod macros;
pub mod model;
pub mod names;
pub mod operand;
pub mod ops;

/// A small vector with 4 inline slots, used for node wiring and shapes.
pub type TVec<T> = smallvec::SmallVec<[T; 4]>;

/// Builds a [`TVec`] (a `SmallVec` with 4 inline slots). Mirrors the
/// `smallvec!`/`vec!` syntax but pins the result type to `TVec<T>` so the
/// element array capacity is never left for the compiler to infer.
#[macro_export]
macro_rules! tvec {
    () => { $crate::TVec::new() };
    ($elem:expr; $n:expr) => {{
        $crate::TVec::from_elem($elem, $n)
    }};
    ($($x:expr),+ $(,)?) => {{
        let mut v = $crate::TVec::new();
        $( v.push($x); )+
        v
    }};
}

pub use crate::errors::{GraphError, GraphResult};

pub mod prelude {
    pub use crate::backend::{Backend, BackendGraph, CompiledGraph};
    pub use crate::builder::GraphBuilder;
    pub use crate::datum::DatumType;
    pub use crate::errors::{GraphError, GraphResult};
    pub use crate::model::{Node, OperandFact, OutletId};
    pub use crate::names::{NamedInputs, NamedOperands, NamedOutputs};
    pub use crate::operand::{Operand, OperandDescriptor};
    pub use crate::ops::activation::{Activation, ClampOptions, LeakyReluOptions};
    pub use crate::ops::array::{
        PadOptions, PaddingMode, SliceOptions, SplitOptions, SqueezeOptions, TransposeOptions,
    };
    pub use crate::ops::binary::BinaryKind;
    pub use crate::ops::cnn::{
        AutoPad, Conv2dFilterLayout, Conv2dOptions, ConvTranspose2dFilterLayout,
        ConvTranspose2dOptions, InputLayout, Pool2dKind, Pool2dOptions, RoundingType,
    };
    pub use crate::ops::gemm::GemmOptions;
    pub use crate::ops::norm::{BatchNormOptions, InstanceNormOptions};
    pub use crate::ops::reduce::{ReduceKind, ReduceOptions};
    pub use crate::ops::resample::{InterpolationMode, Resample2dOptions};
    pub use crate::ops::rnn::{GruOptions, RecurrentDirection, RecurrentWeightLayout};
    pub use crate::ops::unary::UnaryKind;
    pub use crate::tvec;
    pub use crate::TVec;
}
