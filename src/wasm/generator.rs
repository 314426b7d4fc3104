use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codegen::Kernel;
use crate::error::{CompileError, Result};
use crate::ir::{
    BufferSpace, CodegenConfig, Graph, MemoryLayout, allocate, build_schedule, plan_liveness,
    verify_graph, verify_layout,
};
use crate::wasm::kernels;

const MODULE_PRELUDE: &str = "\
/* kernelforge webassembly module */
static unsigned char *static_buffer;
static unsigned char *dynamic_buffer;

void kernelforge_bind_buffers(unsigned char *static_ptr, unsigned char *dynamic_ptr)
{
    static_buffer = static_ptr;
    dynamic_buffer = dynamic_ptr;
}
";

/// Kernels in execution order plus the layout they were generated against.
#[derive(Debug, Clone)]
pub struct GeneratedProgram {
    pub kernels: Vec<Kernel>,
    pub layout: MemoryLayout,
    /// Shape checks that could not be decided at compile time.
    pub runtime_preconditions: Vec<String>,
    static_size: String,
    dynamic_size: String,
}

#[derive(Serialize)]
struct Manifest<'a> {
    kernels: &'a [Kernel],
    static_buffer_bytes: &'a str,
    dynamic_buffer_bytes: &'a str,
    runtime_preconditions: &'a [String],
}

impl GeneratedProgram {
    /// Prelude followed by every kernel source, in execution order.
    pub fn render_module(&self) -> String {
        let mut out = String::from(MODULE_PRELUDE);
        for kernel in &self.kernels {
            out.push_str(kernel.source());
        }
        out
    }

    /// Descriptor the driver uses to size buffers and fill metadata.
    pub fn manifest_json(&self) -> Result<String> {
        let manifest = Manifest {
            kernels: &self.kernels,
            static_buffer_bytes: &self.static_size,
            dynamic_buffer_bytes: &self.dynamic_size,
            runtime_preconditions: &self.runtime_preconditions,
        };
        serde_json::to_string_pretty(&manifest).map_err(|err| CompileError::Serialization {
            message: err.to_string(),
        })
    }
}

/// Lowers `graph` to WebAssembly kernel source.
pub fn generate(graph: &Graph, config: &CodegenConfig) -> Result<GeneratedProgram> {
    verify_graph(graph)?;
    let table = graph.placeholders();

    let mut runtime_preconditions = Vec::new();
    for (op, obligation) in graph.pending_obligations() {
        let operator = graph.operator(op)?;
        let label = operator.label();
        if obligation.check(&label, table)? {
            continue;
        }
        let check = obligation.render(table);
        if config.strict_obligations {
            return Err(CompileError::UnresolvedObligation {
                operator: label,
                check,
            });
        }
        warn!(operator = %label, %check, "shape check deferred to runtime");
        runtime_preconditions.push(format!("{label}: {check}"));
    }

    let schedule = build_schedule(graph)?;
    let liveness = plan_liveness(graph, &schedule)?;
    debug!(
        steps = schedule.len(),
        peak_live_variables = liveness.peak_live_variables,
        "liveness planned"
    );
    let layout = allocate(graph, &schedule, &liveness, config)?;
    if config.verify_layout {
        verify_layout(graph, &layout)?;
    }

    let mut kernels = Vec::new();
    let mut names = HashSet::new();
    for op in &schedule.ordered {
        let operator = graph.operator(*op)?;
        for kernel in kernels::dispatch(graph, operator, &layout)? {
            if !names.insert(kernel.entry_name().to_string()) {
                return Err(CompileError::DuplicateKernelName {
                    name: kernel.entry_name().to_string(),
                });
            }
            debug!(
                operator = %operator.label(),
                kernel = kernel.entry_name(),
                metadata_slots = kernel.unresolved_values().len(),
                "kernel emitted"
            );
            kernels.push(kernel);
        }
    }

    let static_size = table.render(layout.total_size(BufferSpace::Static));
    let dynamic_size = table.render(layout.total_size(BufferSpace::Dynamic));
    info!(
        kernels = kernels.len(),
        static_bytes = %static_size,
        dynamic_bytes = %dynamic_size,
        deferred_checks = runtime_preconditions.len(),
        "webassembly generation finished"
    );

    Ok(GeneratedProgram {
        kernels,
        layout,
        runtime_preconditions,
        static_size,
        dynamic_size,
    })
}
