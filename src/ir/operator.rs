use serde::Serialize;

use crate::error::{CompileError, Result};
use crate::ir::operators::{AxiswiseScale, Deconvolution2D};
use crate::ir::{Axis, Order, Placeholder, PlaceholderTable, Variable, VariableId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OperatorId(pub usize);

/// Structural properties consumed by layout and optimizer passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeTag {
    /// Each output element depends only on the input element at the same index.
    Elementwise,
    /// Parameters are broadcast along the given axis.
    Axiswise(Axis),
    /// Slices along the given axis are computed independently.
    Tensorwise(Axis),
}

/// Relation an [`Obligation`] asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObligationKind {
    /// `lhs == rhs`
    Equal,
    /// `lhs > 0`; `rhs` is unused.
    Positive,
}

/// A shape relation that must hold. Checked as soon as its operands resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obligation {
    pub description: String,
    pub kind: ObligationKind,
    pub lhs: Placeholder,
    pub rhs: Placeholder,
}

impl Obligation {
    pub fn equal(description: impl Into<String>, lhs: Placeholder, rhs: Placeholder) -> Self {
        Self {
            description: description.into(),
            kind: ObligationKind::Equal,
            lhs,
            rhs,
        }
    }

    pub fn positive(description: impl Into<String>, extent: Placeholder) -> Self {
        Self {
            description: description.into(),
            kind: ObligationKind::Positive,
            lhs: extent,
            rhs: Placeholder::Value(0),
        }
    }

    /// `Ok(true)` if satisfied, `Ok(false)` if still deferred.
    pub fn check(&self, context: &str, table: &PlaceholderTable) -> Result<bool> {
        match self.kind {
            ObligationKind::Equal => {
                let (Some(lhs), Some(rhs)) =
                    (table.evaluate(&self.lhs)?, table.evaluate(&self.rhs)?)
                else {
                    return Ok(false);
                };
                if lhs != rhs {
                    return Err(CompileError::shape_mismatch(
                        context,
                        format!(
                            "{}: {} = {lhs} but {} = {rhs}",
                            self.description,
                            table.render(&self.lhs),
                            table.render(&self.rhs)
                        ),
                    ));
                }
            }
            ObligationKind::Positive => {
                let Some(value) = table.evaluate(&self.lhs)? else {
                    return Ok(false);
                };
                if value <= 0 {
                    return Err(CompileError::shape_mismatch(
                        context,
                        format!(
                            "{}: {} evaluates to {value}",
                            self.description,
                            table.render(&self.lhs)
                        ),
                    ));
                }
            }
        }
        Ok(true)
    }

    pub fn render(&self, table: &PlaceholderTable) -> String {
        match self.kind {
            ObligationKind::Equal => format!(
                "{}: {} == {}",
                self.description,
                table.render(&self.lhs),
                table.render(&self.rhs)
            ),
            ObligationKind::Positive => {
                format!("{}: {} > 0", self.description, table.render(&self.lhs))
            }
        }
    }
}

/// Runs every obligation and returns the ones that are still deferred.
pub fn settle_obligations(
    context: &str,
    obligations: &[Obligation],
    table: &PlaceholderTable,
) -> Result<Vec<Obligation>> {
    let mut pending = Vec::new();
    for obligation in obligations {
        if !obligation.check(context, table)? {
            pending.push(obligation.clone());
        }
    }
    Ok(pending)
}

/// Shape and order of one output slot, as computed by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub shape: Vec<Placeholder>,
    pub order: Order,
}

/// Read-only view of an operator's bound inputs during validation and inference.
pub struct RuleContext<'a> {
    pub operator: &'a str,
    pub table: &'a PlaceholderTable,
    slots: &'static [&'static str],
    inputs: Vec<&'a Variable>,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        operator: &'a str,
        table: &'a PlaceholderTable,
        slots: &'static [&'static str],
        inputs: Vec<&'a Variable>,
    ) -> Self {
        Self {
            operator,
            table,
            slots,
            inputs,
        }
    }

    pub fn input(&self, slot: &str) -> Result<&'a Variable> {
        self.slots
            .iter()
            .position(|candidate| *candidate == slot)
            .and_then(|index| self.inputs.get(index).copied())
            .ok_or_else(|| {
                CompileError::invalid_graph(format!(
                    "{} has no input bound to slot '{slot}'",
                    self.operator
                ))
            })
    }

    /// Fails with `ShapeMismatch` unless `variable` has exactly `required`'s axes.
    pub fn require_axes(&self, slot: &str, variable: &Variable, required: &Order) -> Result<()> {
        if variable.order().check_same_axes(required) {
            return Ok(());
        }
        Err(CompileError::shape_mismatch(
            self.operator,
            format!(
                "input '{slot}' must have exactly axes {{{}}}, got order {}",
                axis_list(required),
                variable.order()
            ),
        ))
    }
}

fn axis_list(order: &Order) -> String {
    order
        .axes()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Shape contract shared by every operator kind.
pub trait OperatorRule {
    fn kind_name(&self) -> &'static str;

    fn input_slots(&self) -> &'static [&'static str];

    fn output_slots(&self) -> &'static [&'static str];

    fn attributes(&self) -> Vec<AttributeTag>;

    /// Structural checks plus the extent equalities that must hold.
    fn validate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Obligation>>;

    /// Output shapes in `output_slots` order.
    fn infer(&self, ctx: &RuleContext<'_>) -> Result<Vec<OutputSpec>>;

    /// Parameter summary for diagnostics.
    fn describe(&self) -> String;
}

/// Closed set of operator kinds, each with its own typed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorKind {
    AxiswiseScale(AxiswiseScale),
    Deconvolution2D(Deconvolution2D),
}

impl OperatorKind {
    pub fn rule(&self) -> &dyn OperatorRule {
        match self {
            OperatorKind::AxiswiseScale(params) => params,
            OperatorKind::Deconvolution2D(params) => params,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        self.rule().kind_name()
    }
}

impl From<AxiswiseScale> for OperatorKind {
    fn from(params: AxiswiseScale) -> Self {
        OperatorKind::AxiswiseScale(params)
    }
}

impl From<Deconvolution2D> for OperatorKind {
    fn from(params: Deconvolution2D) -> Self {
        OperatorKind::Deconvolution2D(params)
    }
}

#[derive(Debug, Clone)]
pub struct Operator {
    pub id: OperatorId,
    pub name: String,
    pub kind: OperatorKind,
    attributes: Vec<AttributeTag>,
    pub(crate) inputs: Vec<(&'static str, VariableId)>,
    pub(crate) outputs: Vec<(&'static str, VariableId)>,
    pub(crate) pending: Vec<Obligation>,
    pub(crate) applied: bool,
}

impl Operator {
    pub(crate) fn new(id: OperatorId, name: String, kind: OperatorKind) -> Self {
        let attributes = kind.rule().attributes();
        Self {
            id,
            name,
            kind,
            attributes,
            inputs: Vec::new(),
            outputs: Vec::new(),
            pending: Vec::new(),
            applied: false,
        }
    }

    /// `Kind 'name'` label used in diagnostics.
    pub fn label(&self) -> String {
        format!("{} '{}'", self.kind.kind_name(), self.name)
    }

    pub fn attributes(&self) -> &[AttributeTag] {
        &self.attributes
    }

    pub fn has_attribute(&self, tag: AttributeTag) -> bool {
        self.attributes.contains(&tag)
    }

    pub fn inputs(&self) -> &[(&'static str, VariableId)] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[(&'static str, VariableId)] {
        &self.outputs
    }

    pub fn input(&self, slot: &str) -> Result<VariableId> {
        find_slot(&self.inputs, slot).ok_or_else(|| missing_slot(self, "input", slot))
    }

    pub fn output(&self, slot: &str) -> Result<VariableId> {
        find_slot(&self.outputs, slot).ok_or_else(|| missing_slot(self, "output", slot))
    }

    pub fn pending_obligations(&self) -> &[Obligation] {
        &self.pending
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }
}

fn find_slot(slots: &[(&'static str, VariableId)], slot: &str) -> Option<VariableId> {
    slots
        .iter()
        .find(|(name, _)| *name == slot)
        .map(|(_, id)| *id)
}

fn missing_slot(op: &Operator, direction: &str, slot: &str) -> CompileError {
    CompileError::invalid_graph(format!("{} has no {direction} slot '{slot}'", op.label()))
}
