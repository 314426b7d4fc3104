use serde::Serialize;

use crate::codegen::{BufferBinding, BufferInjector, KernelNameInjector, Template, UnresolvedValue};
use crate::error::{CompileError, Result};

/// One emitted entry point. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Kernel {
    entry_name: String,
    source: String,
    buffers: Vec<BufferBinding>,
    unresolved_values: Vec<UnresolvedValue>,
}

impl Kernel {
    pub fn new(
        entry_name: impl Into<String>,
        source: impl Into<String>,
        buffers: Vec<BufferBinding>,
        unresolved_values: Vec<UnresolvedValue>,
    ) -> Self {
        Self {
            entry_name: entry_name.into(),
            source: source.into(),
            buffers,
            unresolved_values,
        }
    }

    /// Substitutes the function name, then buffers, and checks nothing is left.
    pub fn instantiate(
        template: &Template,
        names: &KernelNameInjector,
        mut buffers: BufferInjector<'_>,
    ) -> Result<Self> {
        let named = names.inject(template);
        let injected = buffers.inject(&named)?;
        if !injected.is_fully_resolved() {
            return Err(CompileError::unsupported(
                names.name(),
                "template still contains substitution tokens after injection",
            ));
        }
        let (bindings, unresolved) = buffers.into_parts();
        Ok(Self::new(names.name(), injected.render(), bindings, unresolved))
    }

    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn buffers(&self) -> &[BufferBinding] {
        &self.buffers
    }

    pub fn unresolved_values(&self) -> &[UnresolvedValue] {
        &self.unresolved_values
    }
}
