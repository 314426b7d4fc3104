use std::collections::{BTreeSet, VecDeque};
use std::hash::{Hash, Hasher};

use crate::error::{CompileError, Result};
use crate::ir::{Graph, OperatorId};

/// Topological order over applied operators. Step `i` runs `ordered[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub ordered: Vec<OperatorId>,
}

impl Schedule {
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Step index of `op`, if scheduled.
    pub fn step_of(&self, op: OperatorId) -> Option<usize> {
        self.ordered.iter().position(|candidate| *candidate == op)
    }
}

#[must_use]
pub fn schedule_hash(schedule: &Schedule) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for op in &schedule.ordered {
        op.0.hash(&mut hasher);
    }
    hasher.finish()
}

/// Kahn's algorithm; ties resolve by operator id so the result is deterministic.
pub fn build_schedule(graph: &Graph) -> Result<Schedule> {
    let operators = graph.operators();
    let mut indegree = vec![0usize; operators.len()];
    let mut edges = vec![Vec::<usize>::new(); operators.len()];
    let mut active = BTreeSet::<usize>::new();

    for operator in operators.iter().filter(|op| op.is_applied()) {
        active.insert(operator.id.0);
        for (slot, input) in operator.inputs() {
            let Some(producer) = graph.producer(*input)? else {
                continue;
            };
            if !graph.operator(producer)?.is_applied() {
                return Err(CompileError::invalid_graph(format!(
                    "cannot schedule {}: input '{slot}' is produced by unapplied operator op{}",
                    operator.label(),
                    producer.0
                )));
            }
            edges[producer.0].push(operator.id.0);
            indegree[operator.id.0] += 1;
        }
    }

    let mut queue = active
        .iter()
        .copied()
        .filter(|index| indegree[*index] == 0)
        .collect::<VecDeque<_>>();

    let mut ordered = Vec::with_capacity(active.len());
    while let Some(index) = queue.pop_front() {
        ordered.push(OperatorId(index));
        for next in &edges[index] {
            indegree[*next] = indegree[*next].saturating_sub(1);
            if indegree[*next] == 0 {
                queue.push_back(*next);
            }
        }
    }

    if ordered.len() != active.len() {
        return Err(CompileError::invalid_graph(format!(
            "schedule covers {} of {} operators: graph contains a cycle",
            ordered.len(),
            active.len()
        )));
    }

    Ok(Schedule { ordered })
}

/// Checks that every input is produced at an earlier step.
pub fn verify_schedule(graph: &Graph, schedule: &Schedule) -> Result<()> {
    let mut scheduled = BTreeSet::<OperatorId>::new();
    for op in &schedule.ordered {
        let operator = graph.operator(*op)?;
        for (slot, input) in operator.inputs() {
            if let Some(producer) = graph.producer(*input)?
                && !scheduled.contains(&producer)
            {
                return Err(CompileError::invalid_graph(format!(
                    "schedule runs {} before op{} which produces its input '{slot}'",
                    operator.label(),
                    producer.0
                )));
            }
        }
        if !scheduled.insert(*op) {
            return Err(CompileError::invalid_graph(format!(
                "schedule contains {} twice",
                operator.label()
            )));
        }
    }

    let applied = graph.operators().iter().filter(|op| op.is_applied()).count();
    if scheduled.len() != applied {
        return Err(CompileError::invalid_graph(format!(
            "schedule is incomplete: covers {} applied operators out of {applied}",
            scheduled.len()
        )));
    }
    Ok(())
}
