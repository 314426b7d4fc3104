use serde::Serialize;

use crate::error::{CompileError, Result};
use crate::ir::{Axis, OperatorId, Order, Placeholder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VariableId(pub usize);

/// How the allocator treats a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VariableRole {
    Input,
    Weight,
    Output,
    Intermediate,
}

/// Tensor descriptor: per-axis extents laid out in `order`.
///
/// `shape[i]` is the extent along `order.axes()[i]`. Edges are non-owning
/// operator handles; the graph owns every variable for its whole lifetime.
#[derive(Debug, Clone)]
pub struct Variable {
    pub id: VariableId,
    pub name: String,
    pub role: VariableRole,
    shape: Vec<Placeholder>,
    order: Order,
    pub(crate) producer: Option<OperatorId>,
    pub(crate) consumers: Vec<OperatorId>,
}

impl Variable {
    pub(crate) fn new(
        id: VariableId,
        name: String,
        role: VariableRole,
        shape: Vec<Placeholder>,
        order: Order,
    ) -> Result<Self> {
        if shape.len() != order.rank() {
            return Err(CompileError::shape_mismatch(
                format!("variable '{name}'"),
                format!(
                    "shape has {} extents but order {order} has rank {}",
                    shape.len(),
                    order.rank()
                ),
            ));
        }
        Ok(Self {
            id,
            name,
            role,
            shape,
            order,
            producer: None,
            consumers: Vec::new(),
        })
    }

    pub fn shape(&self) -> &[Placeholder] {
        &self.shape
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn producer(&self) -> Option<OperatorId> {
        self.producer
    }

    pub fn consumers(&self) -> &[OperatorId] {
        &self.consumers
    }

    pub fn extent(&self, axis: Axis) -> Result<&Placeholder> {
        let index = self.order.axis_index(axis)?;
        Ok(&self.shape[index])
    }

    /// Total element count.
    pub fn size(&self) -> Placeholder {
        Placeholder::product(&self.shape)
    }

    /// Element stride of `axis` in the physical layout.
    pub fn stride(&self, axis: Axis) -> Result<Placeholder> {
        let index = self.order.axis_index(axis)?;
        Ok(Placeholder::product(&self.shape[index + 1..]))
    }

    /// Relabels the physical layout. The (axis, extent) pairs are preserved;
    /// no data moves.
    pub fn change_order(&mut self, order: Order) -> Result<()> {
        self.shape = permute_shape(&self.shape, &self.order, &order)
            .map_err(|err| with_context(err, &self.name))?;
        self.order = order;
        Ok(())
    }
}

/// Reorders `shape` from `from` to `to`. The two orders must hold the same axes.
pub fn permute_shape(shape: &[Placeholder], from: &Order, to: &Order) -> Result<Vec<Placeholder>> {
    if !from.check_same_axes(to) {
        return Err(CompileError::shape_mismatch(
            "change_order",
            format!("cannot relabel order {from} as {to}: axis sets differ"),
        ));
    }
    to.axes()
        .iter()
        .map(|axis| from.axis_index(*axis).map(|index| shape[index].clone()))
        .collect()
}

fn with_context(err: CompileError, name: &str) -> CompileError {
    match err {
        CompileError::ShapeMismatch { detail, .. } => {
            CompileError::shape_mismatch(format!("variable '{name}'"), detail)
        }
        other => other,
    }
}
