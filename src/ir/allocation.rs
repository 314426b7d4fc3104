use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{CompileError, Result};
use crate::ir::{
    CodegenConfig, Graph, LivenessPlan, Placeholder, Schedule, VariableId, VariableLiveness,
    VariableRole, build_schedule, plan_liveness,
};

pub const F32_BYTES: i64 = std::mem::size_of::<f32>() as i64;

/// Backing buffer a variable lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum BufferSpace {
    /// Weights, loaded once when the model is instantiated.
    Static,
    /// Inputs, outputs and intermediates.
    Dynamic,
}

impl BufferSpace {
    /// Name of the byte pointer kernels index into.
    pub fn buffer_name(self) -> &'static str {
        match self {
            BufferSpace::Static => "static_buffer",
            BufferSpace::Dynamic => "dynamic_buffer",
        }
    }
}

/// Byte range of one variable. Offset and size may stay symbolic until the
/// placeholders they depend on are bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub variable: VariableId,
    pub name: String,
    pub space: BufferSpace,
    pub offset: Placeholder,
    pub size: Placeholder,
}

impl Allocation {
    pub fn is_resolved(&self) -> bool {
        self.offset.as_value().is_some() && self.size.as_value().is_some()
    }

    /// `[offset, offset + size)` when both ends are concrete.
    pub fn byte_range(&self) -> Option<(i64, i64)> {
        let offset = self.offset.as_value()?;
        let size = self.size.as_value()?;
        Some((offset, offset + size))
    }
}

/// Frozen variable-to-region map produced by [`allocate`].
#[derive(Debug, Clone, Serialize)]
pub struct MemoryLayout {
    allocations: BTreeMap<VariableId, Allocation>,
    static_size: Placeholder,
    dynamic_size: Placeholder,
    alignment_bytes: usize,
}

impl MemoryLayout {
    pub fn get(&self, variable: VariableId) -> Result<&Allocation> {
        self.allocations
            .get(&variable)
            .ok_or_else(|| CompileError::VariableNotAllocated {
                variable: format!("v{}", variable.0),
            })
    }

    pub fn allocations(&self) -> impl Iterator<Item = &Allocation> {
        self.allocations.values()
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    pub fn total_size(&self, space: BufferSpace) -> &Placeholder {
        match space {
            BufferSpace::Static => &self.static_size,
            BufferSpace::Dynamic => &self.dynamic_size,
        }
    }

    pub fn alignment_bytes(&self) -> usize {
        self.alignment_bytes
    }

    /// Allocations whose offset or size still depends on an unbound symbol.
    pub fn unresolved(&self) -> impl Iterator<Item = &Allocation> {
        self.allocations.values().filter(|alloc| !alloc.is_resolved())
    }
}

#[derive(Debug, Clone, Copy)]
struct Region {
    variable: VariableId,
    offset: i64,
    size: i64,
}

/// Assigns every variable of `graph` a region.
///
/// Weights go to the static buffer. In the dynamic buffer, inputs and
/// outputs get dedicated regions first, then resolved intermediates are packed
/// into a shared arena by liveness, and finally every variable with a symbolic
/// size is appended at a symbolic offset.
pub fn allocate(
    graph: &Graph,
    schedule: &Schedule,
    liveness: &LivenessPlan,
    config: &CodegenConfig,
) -> Result<MemoryLayout> {
    let alignment = config.alignment_bytes;
    if !alignment.is_power_of_two() {
        return Err(CompileError::unsupported(
            "memory layout",
            format!("alignment must be a power of two, got {alignment}"),
        ));
    }
    let align = alignment as i64;
    let table = graph.placeholders();

    let mut sizes = BTreeMap::new();
    for variable in graph.variables() {
        let elements = variable.size();
        if let Some(count) = table.evaluate(&elements)?
            && count < 0
        {
            return Err(CompileError::shape_mismatch(
                format!("variable '{}'", variable.name),
                format!(
                    "element count {} evaluates to {count}",
                    table.render(&elements)
                ),
            ));
        }
        let bytes = table.simplify(&(elements * F32_BYTES).align_up(align));
        // Surfaces overflow in a fully concrete size.
        table.evaluate(&bytes)?;
        sizes.insert(variable.id, bytes);
    }

    let mut allocations = BTreeMap::new();
    let mut place = |variable: VariableId,
                     space: BufferSpace,
                     offset: Placeholder,
                     size: Placeholder|
     -> Result<()> {
        let name = graph.variable(variable)?.name.clone();
        debug!(
            variable = %name,
            ?space,
            offset = %table.render(&offset),
            size = %table.render(&size),
            "allocated"
        );
        allocations.insert(
            variable,
            Allocation {
                variable,
                name,
                space,
                offset,
                size,
            },
        );
        Ok(())
    };

    let mut static_end = 0i64;
    for weight in graph.variables_with_role(VariableRole::Weight) {
        let Some(size) = sizes[&weight.id].as_value() else {
            return Err(CompileError::unsupported(
                format!("weight '{}'", weight.name),
                format!(
                    "static buffers need a resolved size, got {}",
                    table.render(&sizes[&weight.id])
                ),
            ));
        };
        place(weight.id, BufferSpace::Static, static_end.into(), size.into())?;
        static_end = add_bytes(static_end, size, BufferSpace::Static)?;
    }

    let mut dynamic_end = 0i64;
    let mut symbolic = Vec::new();
    for variable in graph
        .variables_with_role(VariableRole::Input)
        .chain(graph.variables_with_role(VariableRole::Output))
    {
        match sizes[&variable.id].as_value() {
            Some(size) => {
                place(variable.id, BufferSpace::Dynamic, dynamic_end.into(), size.into())?;
                dynamic_end = add_bytes(dynamic_end, size, BufferSpace::Dynamic)?;
            }
            None => symbolic.push(variable.id),
        }
    }

    let arena_base = dynamic_end;
    let mut arena = Vec::new();
    for variable in graph.variables_with_role(VariableRole::Intermediate) {
        match sizes[&variable.id].as_value() {
            Some(size) => arena.push(Region {
                variable: variable.id,
                offset: 0,
                size,
            }),
            None => symbolic.push(variable.id),
        }
    }
    let arena_size = pack_arena(&mut arena, liveness)?;
    for region in &arena {
        place(
            region.variable,
            BufferSpace::Dynamic,
            add_bytes(arena_base, region.offset, BufferSpace::Dynamic)?.into(),
            region.size.into(),
        )?;
    }
    dynamic_end = add_bytes(arena_base, arena_size, BufferSpace::Dynamic)?;

    let mut dynamic_size = Placeholder::from(dynamic_end);
    for variable in symbolic {
        let size = sizes[&variable].clone();
        place(variable, BufferSpace::Dynamic, dynamic_size.clone(), size.clone())?;
        dynamic_size = table.simplify(&(dynamic_size + size));
    }

    info!(
        variables = allocations.len(),
        steps = schedule.len(),
        static_bytes = static_end,
        arena_bytes = arena_size,
        dynamic_bytes = %table.render(&dynamic_size),
        "memory layout planned"
    );

    Ok(MemoryLayout {
        allocations,
        static_size: static_end.into(),
        dynamic_size,
        alignment_bytes: alignment,
    })
}

fn add_bytes(lhs: i64, rhs: i64, space: BufferSpace) -> Result<i64> {
    lhs.checked_add(rhs).ok_or_else(|| {
        CompileError::unsupported(
            "memory layout",
            format!("{space:?} buffer exceeds the addressable size: {lhs} + {rhs} bytes"),
        )
    })
}

/// Greedy first-fit over liveness: each region takes the lowest offset that
/// does not collide with an already placed region whose lifetime intersects.
fn pack_arena(regions: &mut [Region], liveness: &LivenessPlan) -> Result<i64> {
    let lifetime = |variable: VariableId| -> Result<VariableLiveness> {
        liveness.interval(variable).copied().ok_or_else(|| {
            CompileError::invalid_graph(format!("no liveness interval for v{}", variable.0))
        })
    };

    let mut keyed = regions
        .iter()
        .map(|region| lifetime(region.variable).map(|interval| (interval, *region)))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by_key(|(interval, region)| {
        (
            interval.start_step,
            std::cmp::Reverse(region.size),
            region.variable,
        )
    });

    let mut placed: Vec<(VariableLiveness, Region)> = Vec::with_capacity(keyed.len());
    let mut arena_size = 0i64;
    for (interval, mut region) in keyed {
        let mut busy = placed
            .iter()
            .filter(|(other, _)| other.overlaps(&interval))
            .map(|(_, other)| (other.offset, other.offset + other.size))
            .collect::<Vec<_>>();
        busy.sort_unstable();

        let mut candidate = 0i64;
        for (start, end) in busy {
            if add_bytes(candidate, region.size, BufferSpace::Dynamic)? <= start {
                break;
            }
            candidate = candidate.max(end);
        }
        region.offset = candidate;
        arena_size = arena_size.max(add_bytes(candidate, region.size, BufferSpace::Dynamic)?);
        placed.push((interval, region));
    }

    for region in regions.iter_mut() {
        if let Some((_, packed)) = placed
            .iter()
            .find(|(_, packed)| packed.variable == region.variable)
        {
            region.offset = packed.offset;
        }
    }
    Ok(arena_size)
}

/// Re-checks that no two resolved allocations in the same space share bytes
/// while both are live. Dedicated regions conflict with anything they touch.
pub fn verify_layout(graph: &Graph, layout: &MemoryLayout) -> Result<()> {
    let schedule = build_schedule(graph)?;
    let liveness = plan_liveness(graph, &schedule)?;

    let resolved = layout
        .allocations()
        .filter_map(|alloc| alloc.byte_range().map(|range| (alloc, range)))
        .collect::<Vec<_>>();

    for variable in graph.variables() {
        layout.get(variable.id)?;
    }

    for (i, (a, (start_a, end_a))) in resolved.iter().enumerate() {
        for (b, (start_b, end_b)) in &resolved[i + 1..] {
            if a.space != b.space || !(start_a < end_b && start_b < end_a) {
                continue;
            }
            let shared = match (liveness.interval(a.variable), liveness.interval(b.variable)) {
                (Some(la), Some(lb)) => {
                    la.role != VariableRole::Intermediate
                        || lb.role != VariableRole::Intermediate
                        || la.overlaps(lb)
                }
                _ => true,
            };
            if shared {
                return Err(CompileError::invalid_graph(format!(
                    "layout overlap in {:?} space: '{}' [{start_a}, {end_a}) and '{}' [{start_b}, {end_b})",
                    a.space, a.name, b.name
                )));
            }
        }
    }
    Ok(())
}
