//! WebAssembly backend: C-dialect kernels over a static and a dynamic buffer.

pub mod generator;
pub mod kernels;

pub use generator::{GeneratedProgram, generate};
