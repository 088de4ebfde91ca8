//! Spatial resampling of 4D tensors.

use derive_new::new;

use crate::backend::BackendGraph;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::ops::{check_rank, InputRef, Operator};
use crate::{ensure_valid, tvec, GraphError, TVec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationMode {
    #[default]
    NearestNeighbor,
    Linear,
}

#[derive(Debug, Clone, Default)]
pub struct Resample2dOptions {
    pub mode: InterpolationMode,
    /// Scaling factor per resampled axis; ignored when `sizes` is set.
    pub scales: Option<[f32; 2]>,
    /// Target sizes per resampled axis.
    pub sizes: Option<[i32; 2]>,
    /// The two consecutive axes to resample: [0,1], [1,2] or [2,3].
    pub axes: Option<[i32; 2]>,
}

#[derive(Debug, Clone, new)]
pub struct Resample2d {
    pub options: Resample2dOptions,
}

impl Resample2d {
    fn axes(&self) -> [i32; 2] {
        self.options.axes.unwrap_or([2, 3])
    }

    fn scales(&self) -> [f32; 2] {
        self.options.scales.unwrap_or([1.0, 1.0])
    }
}

impl Operator for Resample2d {
    fn name(&self) -> &'static str {
        "Resample2d"
    }

    fn output_facts(&self, inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        let [input] = inputs else {
            return Err(GraphError::Internal("resample wired with wrong arity".to_string()));
        };
        check_rank("input", input.fact, 4)?;
        let axes = self.axes();
        ensure_valid!(
            axes[0] >= 0 && axes[0] <= 2 && axes[1] == axes[0] + 1,
            "resampled axes must be two consecutive axes among [0,1], [1,2] or [2,3] (got {:?})",
            axes
        );
        if let Some(scales) = self.options.scales {
            ensure_valid!(
                scales.iter().all(|&s| s > 0.0),
                "scales must be positive (got {:?})",
                scales
            );
        }
        let mut shape = input.fact.shape.clone();
        for (i, &axis) in axes.iter().enumerate() {
            let axis = axis as usize;
            match self.options.sizes {
                Some(sizes) => {
                    ensure_valid!(sizes[i] > 0, "target sizes must be positive (got {:?})", sizes);
                    shape[axis] = sizes[i];
                }
                None => {
                    let scaled = (shape[axis] as f32 * self.scales()[i]) as i32;
                    ensure_valid!(
                        scaled > 0,
                        "scale {} collapses axis {} to nothing",
                        self.scales()[i],
                        axis
                    );
                    shape[axis] = scaled;
                }
            }
        }
        Ok(tvec!(OperandFact { datum_type: input.fact.datum_type, shape }))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_resample2d(node, self)
    }
}
