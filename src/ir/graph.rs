use tracing::debug;

use crate::error::{CompileError, Result};
use crate::ir::{
    Obligation, Operator, OperatorId, OperatorKind, Order, Placeholder, PlaceholderTable,
    RuleContext, SymbolId, Variable, VariableId, VariableRole, settle_obligations,
};

/// Append-only arena of variables and operators.
///
/// Edges are `VariableId`/`OperatorId` pairs; nothing is removed until the
/// whole graph is dropped.
#[derive(Debug, Default, Clone)]
pub struct Graph {
    variables: Vec<Variable>,
    operators: Vec<Operator>,
    placeholders: PlaceholderTable,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unbound symbolic extent.
    pub fn symbol(&mut self, label: impl Into<String>) -> SymbolId {
        self.placeholders.create(label)
    }

    pub fn placeholders(&self) -> &PlaceholderTable {
        &self.placeholders
    }

    pub fn add_input(
        &mut self,
        name: impl Into<String>,
        shape: Vec<Placeholder>,
        order: Order,
    ) -> Result<VariableId> {
        self.push_variable(name.into(), VariableRole::Input, shape, order)
    }

    pub fn add_weight(
        &mut self,
        name: impl Into<String>,
        shape: Vec<Placeholder>,
        order: Order,
    ) -> Result<VariableId> {
        self.push_variable(name.into(), VariableRole::Weight, shape, order)
    }

    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        shape: Vec<Placeholder>,
        order: Order,
    ) -> Result<VariableId> {
        self.push_variable(name.into(), VariableRole::Intermediate, shape, order)
    }

    /// Marks a variable as a graph output; it gets a dedicated region.
    pub fn mark_output(&mut self, id: VariableId) -> Result<()> {
        let variable = self.variable_mut(id)?;
        if matches!(variable.role, VariableRole::Input | VariableRole::Weight) {
            return Err(CompileError::invalid_graph(format!(
                "variable '{}' is a {:?} and cannot also be an output",
                variable.name, variable.role
            )));
        }
        variable.role = VariableRole::Output;
        Ok(())
    }

    /// Re-labels a variable's physical order (see [`Variable::change_order`]).
    ///
    /// Only unconnected variables can be relabelled: operators fix their
    /// output orders from their inputs at apply time.
    pub fn change_order(&mut self, id: VariableId, order: Order) -> Result<()> {
        let variable = self.variable_mut(id)?;
        if variable.producer.is_some() || !variable.consumers.is_empty() {
            return Err(CompileError::unsupported(
                format!("variable '{}'", variable.name),
                format!(
                    "cannot relabel order {} to {order} once it is connected to an operator",
                    variable.order()
                ),
            ));
        }
        variable.change_order(order)
    }

    pub fn add_operator(&mut self, name: Option<&str>, kind: impl Into<OperatorKind>) -> OperatorId {
        let kind = kind.into();
        let id = OperatorId(self.operators.len());
        let name = match name {
            Some(name) => name.to_string(),
            None => format!("{}{}", kind.kind_name(), id.0),
        };
        self.operators.push(Operator::new(id, name, kind));
        id
    }

    /// Validates, infers and attaches outputs for `op`, exactly once.
    ///
    /// On failure nothing is attached and the operator stays unapplied.
    pub fn apply(&mut self, op: OperatorId, inputs: &[VariableId]) -> Result<Vec<VariableId>> {
        let operator = self.operator(op)?;
        let label = operator.label();
        if operator.applied {
            return Err(CompileError::OperatorReapplied { operator: label });
        }

        let rule = operator.kind.rule();
        let slots = rule.input_slots();
        if inputs.len() != slots.len() {
            return Err(CompileError::unsupported(
                label,
                format!(
                    "expects {} inputs ({}), got {}",
                    slots.len(),
                    slots.join(", "),
                    inputs.len()
                ),
            ));
        }

        let bound = inputs
            .iter()
            .map(|id| self.variable(*id))
            .collect::<Result<Vec<_>>>()?;
        let ctx = RuleContext::new(&label, &self.placeholders, slots, bound);
        let obligations = rule.validate(&ctx)?;
        let pending = settle_obligations(&label, &obligations, &self.placeholders)?;
        let specs = rule.infer(&ctx)?;

        let output_slots = rule.output_slots();
        if specs.len() != output_slots.len() {
            return Err(CompileError::invalid_graph(format!(
                "{label} inferred {} outputs for {} slots",
                specs.len(),
                output_slots.len()
            )));
        }

        let operator_name = self.operators[op.0].name.clone();
        let mut outputs = Vec::with_capacity(specs.len());
        for (slot, spec) in output_slots.iter().zip(specs) {
            let id = self.push_variable(
                format!("{operator_name}_{slot}"),
                VariableRole::Intermediate,
                spec.shape,
                spec.order,
            )?;
            self.variables[id.0].producer = Some(op);
            outputs.push((*slot, id));
        }

        for input in inputs {
            let consumers = &mut self.variables[input.0].consumers;
            if !consumers.contains(&op) {
                consumers.push(op);
            }
        }

        let operator = &mut self.operators[op.0];
        operator.inputs = slots.iter().copied().zip(inputs.iter().copied()).collect();
        operator.outputs = outputs.clone();
        operator.pending = pending;
        operator.applied = true;

        debug!(
            operator = %label,
            inputs = inputs.len(),
            deferred_checks = operator.pending.len(),
            "applied operator"
        );

        Ok(outputs.into_iter().map(|(_, id)| id).collect())
    }

    /// Binds a symbol and re-runs every deferred obligation it may settle.
    ///
    /// The binding is committed only if no obligation fails; on error the
    /// graph is left as it was.
    pub fn bind(&mut self, symbol: SymbolId, value: i64) -> Result<()> {
        let mut table = self.placeholders.clone();
        if !table.bind(symbol, value)? {
            return Ok(());
        }
        let settled = self.settle_pending(&table)?;
        debug!(
            symbol = table.label(symbol)?,
            value, "bound placeholder"
        );
        self.placeholders = table;
        self.commit_pending(settled);
        Ok(())
    }

    /// Re-evaluates pending obligations; satisfied ones are dropped.
    pub fn revalidate(&mut self) -> Result<()> {
        let settled = self.settle_pending(&self.placeholders)?;
        self.commit_pending(settled);
        Ok(())
    }

    fn settle_pending(&self, table: &PlaceholderTable) -> Result<Vec<Vec<Obligation>>> {
        self.operators
            .iter()
            .map(|operator| {
                if operator.pending.is_empty() {
                    return Ok(Vec::new());
                }
                settle_obligations(&operator.label(), &operator.pending, table)
            })
            .collect()
    }

    fn commit_pending(&mut self, settled: Vec<Vec<Obligation>>) {
        for (operator, pending) in self.operators.iter_mut().zip(settled) {
            operator.pending = pending;
        }
    }

    /// Obligations whose operands are still unresolved.
    pub fn pending_obligations(&self) -> Vec<(OperatorId, &Obligation)> {
        self.operators
            .iter()
            .flat_map(|op| op.pending.iter().map(move |obligation| (op.id, obligation)))
            .collect()
    }

    pub fn variable(&self, id: VariableId) -> Result<&Variable> {
        self.variables
            .get(id.0)
            .ok_or(CompileError::UnknownVariable(id.0))
    }

    pub fn operator(&self, id: OperatorId) -> Result<&Operator> {
        self.operators
            .get(id.0)
            .ok_or(CompileError::UnknownOperator(id.0))
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    pub fn producer(&self, id: VariableId) -> Result<Option<OperatorId>> {
        self.variable(id).map(Variable::producer)
    }

    pub fn consumers(&self, id: VariableId) -> Result<&[OperatorId]> {
        self.variable(id).map(Variable::consumers)
    }

    pub fn variables_with_role(&self, role: VariableRole) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(move |variable| variable.role == role)
    }

    fn variable_mut(&mut self, id: VariableId) -> Result<&mut Variable> {
        self.variables
            .get_mut(id.0)
            .ok_or(CompileError::UnknownVariable(id.0))
    }

    fn push_variable(
        &mut self,
        name: String,
        role: VariableRole,
        shape: Vec<Placeholder>,
        order: Order,
    ) -> Result<VariableId> {
        let id = VariableId(self.variables.len());
        let variable = Variable::new(id, name, role, shape, order)?;
        self.variables.push(variable);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Axis, AxiswiseScale};

    fn scale_graph() -> (Graph, VariableId, VariableId, OperatorId) {
        let mut graph = Graph::new();
        let x = graph
            .add_input("x", vec![2usize.into(), 4usize.into()], Order::nc())
            .expect("input");
        let s = graph
            .add_weight("s", vec![4usize.into()], Order::c())
            .expect("weight");
        let op = graph.add_operator(None, AxiswiseScale::new(Axis::C));
        (graph, x, s, op)
    }

    #[test]
    fn apply_links_producer_and_consumers() {
        let (mut graph, x, s, op) = scale_graph();
        let outputs = graph.apply(op, &[x, s]).expect("apply");

        assert_eq!(outputs.len(), 1);
        assert_eq!(graph.producer(outputs[0]).expect("exists"), Some(op));
        assert_eq!(graph.consumers(x).expect("exists"), &[op]);
        assert_eq!(graph.consumers(s).expect("exists"), &[op]);
        assert_eq!(graph.variable(outputs[0]).expect("exists").name, "AxiswiseScale0_y");
    }

    #[test]
    fn second_apply_is_rejected() {
        let (mut graph, x, s, op) = scale_graph();
        graph.apply(op, &[x, s]).expect("first apply");
        let err = graph.apply(op, &[x, s]).expect_err("second apply");
        assert!(matches!(err, CompileError::OperatorReapplied { .. }));
        assert_eq!(graph.variables().len(), 3);
    }

    #[test]
    fn wrong_arity_is_unsupported() {
        let (mut graph, x, _, op) = scale_graph();
        let err = graph.apply(op, &[x]).expect_err("missing scale");
        assert!(matches!(err, CompileError::UnsupportedConfiguration { .. }));
        assert!(!graph.operator(op).expect("exists").is_applied());
    }

    #[test]
    fn binding_settles_deferred_obligation() {
        let mut graph = Graph::new();
        let c = graph.symbol("C");
        let x = graph
            .add_input("x", vec![2usize.into(), Placeholder::symbol(c)], Order::nc())
            .expect("input");
        let s = graph
            .add_weight("s", vec![4usize.into()], Order::c())
            .expect("weight");
        let op = graph.add_operator(None, AxiswiseScale::new(Axis::C));
        graph.apply(op, &[x, s]).expect("apply defers the length check");
        assert_eq!(graph.pending_obligations().len(), 1);

        graph.bind(c, 4).expect("matching binding");
        assert!(graph.pending_obligations().is_empty());
    }

    #[test]
    fn binding_reports_violated_obligation() {
        let mut graph = Graph::new();
        let c = graph.symbol("C");
        let x = graph
            .add_input("x", vec![2usize.into(), Placeholder::symbol(c)], Order::nc())
            .expect("input");
        let s = graph
            .add_weight("s", vec![4usize.into()], Order::c())
            .expect("weight");
        let op = graph.add_operator(Some("scale"), AxiswiseScale::new(Axis::C));
        graph.apply(op, &[x, s]).expect("apply defers the length check");

        let err = graph.bind(c, 5).expect_err("violates scale length");
        assert!(matches!(err, CompileError::ShapeMismatch { .. }));
        assert!(err.to_string().contains("AxiswiseScale 'scale'"));
    }

    #[test]
    fn failed_binding_is_not_committed() {
        let mut graph = Graph::new();
        let c = graph.symbol("C");
        let x = graph
            .add_input("x", vec![2usize.into(), Placeholder::symbol(c)], Order::nc())
            .expect("input");
        let s = graph
            .add_weight("s", vec![4usize.into()], Order::c())
            .expect("weight");
        let op = graph.add_operator(None, AxiswiseScale::new(Axis::C));
        graph.apply(op, &[x, s]).expect("apply");

        graph.bind(c, 5).expect_err("violates scale length");
        assert_eq!(graph.placeholders().bound_value(c).expect("known"), None);
        assert_eq!(graph.pending_obligations().len(), 1);

        graph.bind(c, 4).expect("matching binding after a rejected one");
        assert!(graph.pending_obligations().is_empty());
    }

    #[test]
    fn connected_variables_keep_their_order() {
        let mut graph = Graph::new();
        let x = graph
            .add_input(
                "x",
                vec![1usize.into(), 2usize.into(), 2usize.into(), 4usize.into()],
                Order::nhwc(),
            )
            .expect("input");
        let s = graph
            .add_weight("s", vec![4usize.into()], Order::c())
            .expect("weight");
        let op = graph.add_operator(None, AxiswiseScale::new(Axis::C));
        let y = graph.apply(op, &[x, s]).expect("apply")[0];

        for id in [x, y] {
            let err = graph.change_order(id, Order::hwnc()).expect_err("connected");
            assert!(matches!(err, CompileError::UnsupportedConfiguration { .. }));
            assert_eq!(graph.variable(id).expect("exists").order(), &Order::nhwc());
        }
    }

    #[test]
    fn inputs_cannot_become_outputs() {
        let (mut graph, x, _, _) = scale_graph();
        assert!(graph.mark_output(x).is_err());
    }
}
