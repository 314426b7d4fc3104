pub mod axiswise_scale;
pub mod deconvolution2d;

use crate::codegen::Kernel;
use crate::error::Result;
use crate::ir::{Graph, MemoryLayout, Operator, OperatorKind};

/// Lowers one applied operator to its WebAssembly kernels.
pub fn dispatch(graph: &Graph, operator: &Operator, layout: &MemoryLayout) -> Result<Vec<Kernel>> {
    match &operator.kind {
        OperatorKind::AxiswiseScale(params) => {
            axiswise_scale::axiswise_scale(graph, operator, params, layout)
        }
        OperatorKind::Deconvolution2D(params) => {
            deconvolution2d::deconvolution2d(graph, operator, params, layout)
        }
    }
}
