use std::collections::HashMap;

use tracing::debug;

use crate::error::{CompileError, Result};
use crate::ir::operators::{AxiswiseScale, Deconvolution2D};
use crate::ir::{
    Axis, Graph, Operator, OperatorKind, PlaceholderTable, Variable, VariableId, VariableRole,
    build_schedule,
};

/// Host-side data for graph inputs and weights, keyed by variable name.
///
/// Buffers are flat `f32` in the variable's own order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub inputs: HashMap<String, Vec<f32>>,
    pub weights: HashMap<String, Vec<f32>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, data: Vec<f32>) -> Self {
        self.inputs.insert(name.into(), data);
        self
    }

    #[must_use]
    pub fn with_weight(mut self, name: impl Into<String>, data: Vec<f32>) -> Self {
        self.weights.insert(name.into(), data);
        self
    }
}

/// Every variable's buffer after a reference run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    values: HashMap<VariableId, Vec<f32>>,
}

impl ExecutionResult {
    pub fn get(&self, variable: VariableId) -> Result<&[f32]> {
        self.values
            .get(&variable)
            .map(Vec::as_slice)
            .ok_or(CompileError::UnknownVariable(variable.0))
    }
}

/// Runs the graph on the host in schedule order.
///
/// All placeholders must be bound. This is the semantic reference the
/// generated kernels are checked against.
pub fn execute(graph: &Graph, context: &ExecutionContext) -> Result<ExecutionResult> {
    let table = graph.placeholders();
    let mut values = HashMap::new();

    for variable in graph.variables() {
        let source = match variable.role {
            VariableRole::Input => &context.inputs,
            VariableRole::Weight => &context.weights,
            _ => continue,
        };
        let data = source.get(&variable.name).ok_or_else(|| {
            CompileError::invalid_graph(format!(
                "no host data supplied for {:?} '{}'",
                variable.role, variable.name
            ))
        })?;
        let view = TensorView::of(variable, table)?;
        if data.len() != view.len() {
            return Err(CompileError::shape_mismatch(
                format!("variable '{}'", variable.name),
                format!(
                    "host buffer has {} elements, shape needs {}",
                    data.len(),
                    view.len()
                ),
            ));
        }
        values.insert(variable.id, data.clone());
    }

    let schedule = build_schedule(graph)?;
    for op in &schedule.ordered {
        let operator = graph.operator(*op)?;
        let output = match &operator.kind {
            OperatorKind::AxiswiseScale(params) => {
                run_axiswise_scale(graph, operator, params, &values)?
            }
            OperatorKind::Deconvolution2D(params) => {
                run_deconvolution2d(graph, operator, params, &values)?
            }
        };
        debug!(operator = %operator.label(), elements = output.len(), "interpreted");
        values.insert(operator.output("y")?, output);
    }

    Ok(ExecutionResult { values })
}

/// Resolved extents and strides of one variable.
#[derive(Debug, Clone)]
struct TensorView {
    axes: Vec<Axis>,
    extents: Vec<usize>,
    strides: Vec<usize>,
}

impl TensorView {
    fn of(variable: &Variable, table: &PlaceholderTable) -> Result<Self> {
        let extents = variable
            .shape()
            .iter()
            .map(|extent| match table.evaluate(extent)? {
                Some(value) => usize::try_from(value).map_err(|_| {
                    CompileError::shape_mismatch(
                        format!("variable '{}'", variable.name),
                        format!("negative extent {value}"),
                    )
                }),
                None => Err(CompileError::unsupported(
                    format!("variable '{}'", variable.name),
                    format!(
                        "extent {} is unresolved; bind every placeholder before interpreting",
                        table.render(extent)
                    ),
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut strides = vec![1usize; extents.len()];
        for index in (0..extents.len().saturating_sub(1)).rev() {
            strides[index] = strides[index + 1] * extents[index + 1];
        }

        Ok(Self {
            axes: variable.order().axes().to_vec(),
            extents,
            strides,
        })
    }

    fn len(&self) -> usize {
        self.extents.iter().product()
    }

    fn position(&self, axis: Axis) -> usize {
        self.axes
            .iter()
            .position(|candidate| *candidate == axis)
            .unwrap_or(usize::MAX)
    }

    fn extent(&self, axis: Axis) -> usize {
        self.extents.get(self.position(axis)).copied().unwrap_or(1)
    }

    fn stride(&self, axis: Axis) -> usize {
        self.strides.get(self.position(axis)).copied().unwrap_or(0)
    }

    /// Coordinate along `axis` of the element at flat index `flat`.
    fn coordinate(&self, flat: usize, axis: Axis) -> usize {
        let index = self.position(axis);
        match (self.strides.get(index), self.extents.get(index)) {
            (Some(stride), Some(extent)) => (flat / stride) % extent,
            _ => 0,
        }
    }
}

fn input_data<'a>(
    graph: &'a Graph,
    operator: &Operator,
    slot: &str,
    values: &'a HashMap<VariableId, Vec<f32>>,
) -> Result<(&'a Variable, &'a [f32])> {
    let id = operator.input(slot)?;
    let variable = graph.variable(id)?;
    let data = values.get(&id).ok_or_else(|| {
        CompileError::invalid_graph(format!(
            "{} reads '{}' before it is computed",
            operator.label(),
            variable.name
        ))
    })?;
    Ok((variable, data.as_slice()))
}

fn run_axiswise_scale(
    graph: &Graph,
    operator: &Operator,
    params: &AxiswiseScale,
    values: &HashMap<VariableId, Vec<f32>>,
) -> Result<Vec<f32>> {
    let table = graph.placeholders();
    let (x, x_data) = input_data(graph, operator, "x", values)?;
    let (_, s_data) = input_data(graph, operator, "s", values)?;
    let view = TensorView::of(x, table)?;

    Ok(x_data
        .iter()
        .enumerate()
        .map(|(flat, value)| value * s_data[view.coordinate(flat, params.axis())])
        .collect())
}

fn run_deconvolution2d(
    graph: &Graph,
    operator: &Operator,
    params: &Deconvolution2D,
    values: &HashMap<VariableId, Vec<f32>>,
) -> Result<Vec<f32>> {
    let table = graph.placeholders();
    let (x, x_data) = input_data(graph, operator, "x", values)?;
    let (w, w_data) = input_data(graph, operator, "w", values)?;
    let y = graph.variable(operator.output("y")?)?;

    let xv = TensorView::of(x, table)?;
    let wv = TensorView::of(w, table)?;
    let yv = TensorView::of(y, table)?;

    let (ksize, stride, padding) = (params.ksize(), params.stride(), params.padding());
    let in_channels = xv.extent(Axis::C);
    let (in_h, in_w) = (xv.extent(Axis::H) as i64, xv.extent(Axis::W) as i64);

    let mut output = vec![0.0f32; yv.len()];
    for (flat, slot) in output.iter_mut().enumerate() {
        let n = yv.coordinate(flat, Axis::N);
        let c2 = yv.coordinate(flat, Axis::C);
        let h2 = yv.coordinate(flat, Axis::H) as i64;
        let w2 = yv.coordinate(flat, Axis::W) as i64;

        let mut sum = 0.0f32;
        for kh in 0..ksize.h {
            let Some(h1) = source_index(h2, kh, stride.h, padding.h, in_h) else {
                continue;
            };
            for kw in 0..ksize.w {
                let Some(w1) = source_index(w2, kw, stride.w, padding.w, in_w) else {
                    continue;
                };
                for c1 in 0..in_channels {
                    let x_index = n * xv.stride(Axis::N)
                        + c1 * xv.stride(Axis::C)
                        + h1 * xv.stride(Axis::H)
                        + w1 * xv.stride(Axis::W);
                    let w_index = c2 * wv.stride(Axis::N)
                        + c1 * wv.stride(Axis::C)
                        + kh * wv.stride(Axis::H)
                        + kw * wv.stride(Axis::W);
                    sum += x_data[x_index] * w_data[w_index];
                }
            }
        }
        *slot = sum;
    }
    Ok(output)
}

/// Input position feeding output `out` through kernel tap `k`, if any.
fn source_index(out: i64, k: usize, stride: usize, padding: usize, extent: i64) -> Option<usize> {
    let stride = stride as i64;
    let shifted = out + padding as i64 - k as i64;
    if shifted < 0 || shifted % stride != 0 {
        return None;
    }
    let index = shifted / stride;
    (index < extent).then_some(index as usize)
}

#[cfg(test)]
mod tests {
    use crate::ir::{
        Axis, AxiswiseScale, Deconvolution2D, ExecutionContext, Graph, Order, Placeholder,
        execute,
    };

    #[test]
    fn scales_along_channel_in_nhwc() {
        let mut graph = Graph::new();
        let x = graph
            .add_input(
                "x",
                vec![1usize.into(), 1usize.into(), 2usize.into(), 3usize.into()],
                Order::nhwc(),
            )
            .expect("input");
        let s = graph
            .add_weight("s", vec![3usize.into()], Order::c())
            .expect("weight");
        let op = graph.add_operator(None, AxiswiseScale::new(Axis::C));
        let y = graph.apply(op, &[x, s]).expect("apply")[0];

        let context = ExecutionContext::new()
            .with_input("x", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .with_weight("s", vec![1.0, 10.0, 100.0]);
        let result = execute(&graph, &context).expect("execute");
        assert_eq!(
            result.get(y).expect("y"),
            &[1.0f32, 20.0, 300.0, 4.0, 50.0, 600.0]
        );
    }

    #[test]
    fn deconvolution_upsamples_with_stride() {
        let mut graph = Graph::new();
        let x = graph
            .add_input(
                "x",
                vec![1usize.into(), 1usize.into(), 2usize.into(), 2usize.into()],
                Order::nchw(),
            )
            .expect("input");
        let w = graph
            .add_weight(
                "w",
                vec![1usize.into(), 1usize.into(), 1usize.into(), 1usize.into()],
                Order::nchw(),
            )
            .expect("weight");
        let op = graph.add_operator(None, Deconvolution2D::new(1, 2, 0).expect("params"));
        let y = graph.apply(op, &[x, w]).expect("apply")[0];
        assert_eq!(
            graph.variable(y).expect("y").extent(Axis::H).expect("H"),
            &Placeholder::Value(3)
        );

        let context = ExecutionContext::new()
            .with_input("x", vec![1.0, 2.0, 3.0, 4.0])
            .with_weight("w", vec![2.0]);
        let result = execute(&graph, &context).expect("execute");
        assert_eq!(
            result.get(y).expect("y"),
            &[2.0f32, 0.0, 4.0, 0.0, 0.0, 0.0, 6.0, 0.0, 8.0]
        );
    }

    #[test]
    fn refuses_unbound_extents() {
        let mut graph = Graph::new();
        let n = graph.symbol("N");
        let x = graph
            .add_input("x", vec![Placeholder::symbol(n), 2usize.into()], Order::nc())
            .expect("input");
        let s = graph
            .add_weight("s", vec![2usize.into()], Order::c())
            .expect("weight");
        let op = graph.add_operator(None, AxiswiseScale::new(Axis::C));
        graph.apply(op, &[x, s]).expect("apply");

        let context = ExecutionContext::new()
            .with_input("x", vec![1.0, 2.0])
            .with_weight("s", vec![1.0, 1.0]);
        assert!(execute(&graph, &context).is_err());
    }
}
