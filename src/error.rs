use thiserror::Error;

use crate::ir::{Axis, Order};

/// Every failure the lowering pipeline can report.
///
/// Compilation is fail-fast: the first error aborts the whole run, so each
/// variant carries enough context (operator, shapes, orders) to diagnose the
/// problem without re-running.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// Axis-set or extent mismatch between connected variables.
    #[error("shape mismatch in {context}: {detail}")]
    ShapeMismatch { context: String, detail: String },

    /// Parameters or orders that the lowering for this operator cannot handle.
    #[error("unsupported configuration in {context}: {detail}")]
    UnsupportedConfiguration { context: String, detail: String },

    #[error("axis {axis} not found in order {order}")]
    AxisNotFound { axis: Axis, order: Order },

    /// A placeholder was re-bound to a different value.
    #[error("placeholder '{label}' is already bound to {bound}, cannot rebind to {requested}")]
    PlaceholderConflict {
        label: String,
        bound: i64,
        requested: i64,
    },

    #[error("operator {operator} has already been applied")]
    OperatorReapplied { operator: String },

    #[error("variable {variable} is not registered in the memory layout")]
    VariableNotAllocated { variable: String },

    /// A template references a role the injector never registered.
    #[error("template references unregistered buffer role '{role}' (registered: [{registered}])")]
    UnknownBufferRole { role: String, registered: String },

    #[error("unknown variable handle v{0}")]
    UnknownVariable(usize),

    #[error("unknown operator handle op{0}")]
    UnknownOperator(usize),

    #[error("unknown placeholder handle ${0}")]
    UnknownPlaceholder(usize),

    /// Structural violations found by the verifier or the scheduler.
    #[error("invalid graph: {message}")]
    InvalidGraph { message: String },

    /// A deferred shape check was still unresolved when strict mode required it.
    #[error("unresolved shape obligation in {operator}: {check}")]
    UnresolvedObligation { operator: String, check: String },

    #[error("duplicate kernel entry name '{name}'")]
    DuplicateKernelName { name: String },

    #[error("failed to serialize kernel manifest: {message}")]
    Serialization { message: String },
}

impl CompileError {
    pub fn shape_mismatch(context: impl Into<String>, detail: impl Into<String>) -> Self {
        CompileError::ShapeMismatch {
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub fn unsupported(context: impl Into<String>, detail: impl Into<String>) -> Self {
        CompileError::UnsupportedConfiguration {
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub fn invalid_graph(message: impl Into<String>) -> Self {
        CompileError::InvalidGraph {
            message: message.into(),
        }
    }
}

/// Convenience Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, CompileError>;
