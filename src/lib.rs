//! # kernelforge
//!
//! Ahead-of-time lowering of neural-network graphs to kernel source.
//!
//! ## Pipeline
//!
//! ```text
//! ir::Graph (variables + operators, symbolic extents)
//!    │
//!    ▼  Graph::apply         shape inference, deferred obligations
//!    ▼  Graph::bind          placeholder binding, re-validation
//!    ▼  ir::build_schedule   topological order
//!    ▼  ir::allocate         MemoryLayout over static/dynamic buffers
//!    ▼  codegen              name + buffer injection into templates
//! wasm::GeneratedProgram (kernels + layout + manifest)
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use kernelforge::ir::{Axis, AxiswiseScale, CodegenConfig, Graph, Order};
//!
//! let mut graph = Graph::new();
//! let x = graph.add_input("x", vec![3usize.into(), 4usize.into()], Order::nc())?;
//! let s = graph.add_weight("s", vec![4usize.into()], Order::c())?;
//! let op = graph.add_operator(Some("scale"), AxiswiseScale::new(Axis::C));
//! let y = graph.apply(op, &[x, s])?[0];
//! graph.mark_output(y)?;
//!
//! let program = kernelforge::wasm::generate(&graph, &CodegenConfig::from_env())?;
//! println!("{}", program.render_module());
//! # Ok::<(), kernelforge::CompileError>(())
//! ```

#![allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::uninlined_format_args,
    clippy::too_many_lines,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_panics_doc,
    clippy::similar_names,
    clippy::doc_markdown,
    clippy::module_name_repetitions
)]

pub mod codegen;
pub mod error;
pub mod ir;
pub mod wasm;

pub use error::{CompileError, Result};
