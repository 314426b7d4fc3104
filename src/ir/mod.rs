pub mod allocation;
pub mod axis;
pub mod codegen_config;
pub mod graph;
pub mod interpreter;
pub mod memory_planner;
pub mod operator;
pub mod operators;
pub mod placeholder;
pub mod printer;
pub mod scheduler;
pub mod variable;
pub mod verifier;

pub use allocation::{
    Allocation, BufferSpace, F32_BYTES, MemoryLayout, allocate, verify_layout,
};
pub use axis::{Axis, Order};
pub use codegen_config::{CodegenConfig, DEFAULT_ALIGNMENT_BYTES};
pub use graph::Graph;
pub use interpreter::{ExecutionContext, ExecutionResult, execute};
pub use memory_planner::{
    LivenessPlan, VariableLiveness, plan_liveness, render_lifetime_heatmap,
};
pub use operator::{
    AttributeTag, Obligation, ObligationKind, Operator, OperatorId, OperatorKind, OperatorRule,
    OutputSpec, RuleContext, settle_obligations,
};
pub use operators::{AxiswiseScale, Deconvolution2D, Spatial};
pub use placeholder::{BinaryOp, Placeholder, PlaceholderTable, SymbolId};
pub use printer::print_graph;
pub use scheduler::{Schedule, build_schedule, schedule_hash, verify_schedule};
pub use variable::{Variable, VariableId, VariableRole, permute_shape};
pub use verifier::verify_graph;
