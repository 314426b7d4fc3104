use crate::error::Result;
use crate::ir::{Graph, Schedule, VariableId, VariableRole};

/// Inclusive live range of one variable, in schedule steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableLiveness {
    pub variable: VariableId,
    pub role: VariableRole,
    pub start_step: usize,
    pub end_step: usize,
}

impl VariableLiveness {
    pub fn overlaps(&self, other: &VariableLiveness) -> bool {
        self.start_step <= other.end_step && other.start_step <= self.end_step
    }

    pub fn is_live_at(&self, step: usize) -> bool {
        self.start_step <= step && step <= self.end_step
    }
}

#[derive(Debug, Clone)]
pub struct LivenessPlan {
    pub intervals: Vec<VariableLiveness>,
    pub step_count: usize,
    pub peak_live_variables: usize,
}

impl LivenessPlan {
    pub fn interval(&self, variable: VariableId) -> Option<&VariableLiveness> {
        self.intervals
            .iter()
            .find(|interval| interval.variable == variable)
    }
}

pub fn render_lifetime_heatmap(plan: &LivenessPlan) -> String {
    let mut lines = Vec::new();
    for interval in &plan.intervals {
        let row = (0..plan.step_count)
            .map(|step| if interval.is_live_at(step) { '#' } else { '.' })
            .collect::<String>();
        lines.push(format!("v{} {}", interval.variable.0, row));
    }
    lines.join("\n")
}

/// Live ranges over `schedule`.
///
/// Inputs and weights are live from step 0. Every other variable starts at
/// its producer's step. A variable ends at its last consumer, and outputs stay
/// live until the final step.
pub fn plan_liveness(graph: &Graph, schedule: &Schedule) -> Result<LivenessPlan> {
    let step_count = schedule.len();
    let last_step = step_count.saturating_sub(1);

    let mut intervals = Vec::with_capacity(graph.variables().len());
    for variable in graph.variables() {
        let start_step = match variable.producer() {
            Some(producer) => schedule.step_of(producer).unwrap_or(0),
            None => 0,
        };
        let last_use = variable
            .consumers()
            .iter()
            .filter_map(|consumer| schedule.step_of(*consumer))
            .max()
            .unwrap_or(start_step);
        let end_step = match variable.role {
            VariableRole::Output => last_step.max(start_step),
            _ => last_use.max(start_step),
        };
        intervals.push(VariableLiveness {
            variable: variable.id,
            role: variable.role,
            start_step,
            end_step,
        });
    }

    let peak_live_variables = (0..step_count.max(1))
        .map(|step| {
            intervals
                .iter()
                .filter(|interval| interval.is_live_at(step))
                .count()
        })
        .max()
        .unwrap_or(0);

    Ok(LivenessPlan {
        intervals,
        step_count,
        peak_live_variables,
    })
}

#[cfg(test)]
mod tests {
    use crate::ir::{
        Axis, AxiswiseScale, Graph, Order, build_schedule, plan_liveness, render_lifetime_heatmap,
    };

    #[test]
    fn intermediates_end_at_last_consumer() {
        let mut graph = Graph::new();
        let x = graph
            .add_input("x", vec![2usize.into(), 3usize.into()], Order::nc())
            .expect("input");
        let s = graph
            .add_weight("s", vec![3usize.into()], Order::c())
            .expect("weight");
        let first = graph.add_operator(None, AxiswiseScale::new(Axis::C));
        let t = graph.apply(first, &[x, s]).expect("apply")[0];
        let second = graph.add_operator(None, AxiswiseScale::new(Axis::C));
        let u = graph.apply(second, &[t, s]).expect("apply")[0];
        let third = graph.add_operator(None, AxiswiseScale::new(Axis::C));
        let y = graph.apply(third, &[u, s]).expect("apply")[0];
        graph.mark_output(y).expect("output");

        let schedule = build_schedule(&graph).expect("schedule");
        let plan = plan_liveness(&graph, &schedule).expect("liveness");

        let t = plan.interval(t).expect("t planned");
        assert_eq!((t.start_step, t.end_step), (0, 1));
        let u = plan.interval(u).expect("u planned");
        assert_eq!((u.start_step, u.end_step), (1, 2));
        assert!(t.overlaps(u));
        let s = plan.interval(s).expect("s planned");
        assert_eq!((s.start_step, s.end_step), (0, 2));

        let heatmap = render_lifetime_heatmap(&plan);
        assert!(heatmap.contains("v2 ##."));
    }
}
