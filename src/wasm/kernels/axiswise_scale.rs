use crate::codegen::{BufferInjector, Kernel, KernelNameInjector, Template};
use crate::error::{CompileError, Result};
use crate::ir::{Axis, AxiswiseScale, Graph, MemoryLayout, Operator, Order, Variable};

pub const TEMPLATE: &str = r"
void %%FUNC_NAME%%(const int * %%META_BUFFER%%)
{
    const float *X = %%LOAD_BUFFER(axiswise_scale_X)%%;
    float *Y = %%LOAD_BUFFER(axiswise_scale_Y)%%;
    const float *S = %%LOAD_BUFFER(axiswise_scale_S)%%;
    const int N = %%LOAD_BUFFER(axiswise_scale_N)%%;
    const int C = %%LOAD_BUFFER(axiswise_scale_C)%%;

    for (int gid = 0; gid < N; gid += 1) {
        int c = gid % C;
        float result = X[gid] * S[c];

        Y[gid] = result;
    }
}
";

/// Channel-last orders only: the flat index modulo C is the channel.
fn supported_order(order: &Order) -> bool {
    *order == Order::nc() || *order == Order::nhwc() || *order == Order::hwnc()
}

/// The kernel walks `x` and `y` with one flat index, so both must share a
/// channel-last order.
fn check_orders(operator: &Operator, x: &Variable, y: &Variable) -> Result<()> {
    for variable in [x, y] {
        if !supported_order(variable.order()) {
            return Err(CompileError::unsupported(
                operator.label(),
                format!(
                    "'{}' has order {}; expected NC, NHWC or HWNC",
                    variable.name,
                    variable.order()
                ),
            ));
        }
    }
    if x.order() != y.order() {
        return Err(CompileError::unsupported(
            operator.label(),
            format!(
                "'{}' is {} but '{}' is {}; input and output must share one order",
                x.name,
                x.order(),
                y.name,
                y.order()
            ),
        ));
    }
    Ok(())
}

pub fn axiswise_scale(
    graph: &Graph,
    operator: &Operator,
    params: &AxiswiseScale,
    layout: &MemoryLayout,
) -> Result<Vec<Kernel>> {
    let x = graph.variable(operator.input("x")?)?;
    let s = graph.variable(operator.input("s")?)?;
    let y = graph.variable(operator.output("y")?)?;

    if params.axis() != Axis::C {
        return Err(CompileError::unsupported(
            operator.label(),
            format!(
                "webassembly axiswise scale supports only axis C, got {}",
                params.axis()
            ),
        ));
    }
    check_orders(operator, x, y)?;

    let table = graph.placeholders();
    let mut buffers = BufferInjector::new(table);
    buffers
        .register("axiswise_scale_X", layout.get(x.id)?)
        .register("axiswise_scale_Y", layout.get(y.id)?)
        .register("axiswise_scale_S", layout.get(s.id)?)
        .register("axiswise_scale_N", table.simplify(&y.size()))
        .register("axiswise_scale_C", table.simplify(y.extent(Axis::C)?));

    let names = KernelNameInjector::new(operator);
    let kernel = Kernel::instantiate(&Template::parse(TEMPLATE), &names, buffers)?;
    Ok(vec![kernel])
}
