use std::collections::HashSet;

use crate::error::{CompileError, Result};
use crate::ir::{Graph, VariableRole, build_schedule, verify_schedule};

/// Structural checks run before lowering.
///
/// Shapes are not re-inferred here; operator rules already did that at apply
/// time and pending obligations are handled by the generator.
pub fn verify_graph(graph: &Graph) -> Result<()> {
    for (index, variable) in graph.variables().iter().enumerate() {
        if variable.id.0 != index {
            return Err(err(format!(
                "variable id mismatch at index {index}: variable.id={}",
                variable.id.0
            )));
        }

        match (variable.role, variable.producer()) {
            (VariableRole::Input | VariableRole::Weight, Some(producer)) => {
                return Err(err(format!(
                    "{:?} variable '{}' must not have a producer (op{})",
                    variable.role, variable.name, producer.0
                )));
            }
            (VariableRole::Intermediate | VariableRole::Output, None) => {
                return Err(err(format!(
                    "variable '{}' has no producer; declare it as an input or a weight",
                    variable.name
                )));
            }
            (_, Some(producer)) => {
                let operator = graph.operator(producer)?;
                if !operator.outputs().iter().any(|(_, id)| *id == variable.id) {
                    return Err(err(format!(
                        "variable '{}' names {} as producer but is not among its outputs",
                        variable.name,
                        operator.label()
                    )));
                }
            }
            _ => {}
        }

        let mut seen = HashSet::new();
        for consumer in variable.consumers() {
            if !seen.insert(*consumer) {
                return Err(err(format!(
                    "variable '{}' lists op{} as consumer twice",
                    variable.name, consumer.0
                )));
            }
            let operator = graph.operator(*consumer)?;
            if !operator.inputs().iter().any(|(_, id)| *id == variable.id) {
                return Err(err(format!(
                    "variable '{}' names {} as consumer but is not among its inputs",
                    variable.name,
                    operator.label()
                )));
            }
        }
    }

    for operator in graph.operators() {
        if !operator.is_applied() {
            return Err(err(format!(
                "{} was added but never applied",
                operator.label()
            )));
        }
        for (slot, input) in operator.inputs() {
            if !graph.consumers(*input)?.contains(&operator.id) {
                return Err(err(format!(
                    "{} input '{slot}' is missing the consumer edge",
                    operator.label()
                )));
            }
        }
    }

    let schedule = build_schedule(graph)?;
    verify_schedule(graph, &schedule)
}

fn err(message: impl Into<String>) -> CompileError {
    CompileError::invalid_graph(message)
}
