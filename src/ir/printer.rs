use crate::ir::{Graph, Operator, Variable};

/// One line per variable declaration, then one line per operator.
///
/// Extents print with symbol labels, e.g. `%0 x: f32[N, 3] NC (input)`.
pub fn print_graph(graph: &Graph) -> String {
    let mut lines = Vec::new();
    for variable in graph.variables() {
        lines.push(format_variable(graph, variable));
    }
    for operator in graph.operators() {
        lines.push(format_operator(operator));
    }
    lines.join("\n")
}

fn format_variable(graph: &Graph, variable: &Variable) -> String {
    let extents = variable
        .shape()
        .iter()
        .map(|extent| graph.placeholders().render(extent))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "%{} {}: f32[{extents}] {} ({})",
        variable.id.0,
        variable.name,
        variable.order(),
        format!("{:?}", variable.role).to_lowercase()
    )
}

fn format_operator(operator: &Operator) -> String {
    let outputs = operator
        .outputs()
        .iter()
        .map(|(_, id)| fmt_variable(id.0))
        .collect::<Vec<_>>()
        .join(", ");
    let inputs = operator
        .inputs()
        .iter()
        .map(|(slot, id)| format!("{slot}={}", fmt_variable(id.0)))
        .collect::<Vec<_>>()
        .join(" ");
    let params = operator.kind.rule().describe();
    if operator.is_applied() {
        format!("{outputs} = {} {inputs} [{params}]", operator.label())
    } else {
        format!("<unapplied> {} [{params}]", operator.label())
    }
}

fn fmt_variable(index: usize) -> String {
    format!("%{index}")
}
