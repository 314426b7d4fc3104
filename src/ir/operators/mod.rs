//! Operator catalog. Every kind implements [`crate::ir::OperatorRule`].

pub mod axiswise_scale;
pub mod deconvolution2d;

pub use axiswise_scale::AxiswiseScale;
pub use deconvolution2d::{Deconvolution2D, Spatial};
