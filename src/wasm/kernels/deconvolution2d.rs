use crate::codegen::{BufferInjector, Kernel, KernelNameInjector, Template};
use crate::error::Result;
use crate::ir::{Axis, Deconvolution2D, Graph, MemoryLayout, Operator, Variable};

pub const TEMPLATE: &str = r"
void %%FUNC_NAME%%(const int * %%META_BUFFER%%)
{
    const float *X = %%LOAD_BUFFER(deconvolution2d_X)%%;
    const float *W = %%LOAD_BUFFER(deconvolution2d_W)%%;
    float *Y = %%LOAD_BUFFER(deconvolution2d_Y)%%;
    const int N = %%LOAD_BUFFER(deconvolution2d_N)%%;
    const int C1 = %%LOAD_BUFFER(deconvolution2d_C1)%%;
    const int H1 = %%LOAD_BUFFER(deconvolution2d_H1)%%;
    const int W1 = %%LOAD_BUFFER(deconvolution2d_W1)%%;
    const int C2 = %%LOAD_BUFFER(deconvolution2d_C2)%%;
    const int H2 = %%LOAD_BUFFER(deconvolution2d_H2)%%;
    const int W2 = %%LOAD_BUFFER(deconvolution2d_W2)%%;
    const int KH = %%LOAD_BUFFER(deconvolution2d_KH)%%;
    const int KW = %%LOAD_BUFFER(deconvolution2d_KW)%%;
    const int SH = %%LOAD_BUFFER(deconvolution2d_SH)%%;
    const int SW = %%LOAD_BUFFER(deconvolution2d_SW)%%;
    const int PH = %%LOAD_BUFFER(deconvolution2d_PH)%%;
    const int PW = %%LOAD_BUFFER(deconvolution2d_PW)%%;
    const int XSN = %%LOAD_BUFFER(deconvolution2d_XSN)%%;
    const int XSC = %%LOAD_BUFFER(deconvolution2d_XSC)%%;
    const int XSH = %%LOAD_BUFFER(deconvolution2d_XSH)%%;
    const int XSW = %%LOAD_BUFFER(deconvolution2d_XSW)%%;
    const int WSN = %%LOAD_BUFFER(deconvolution2d_WSN)%%;
    const int WSC = %%LOAD_BUFFER(deconvolution2d_WSC)%%;
    const int WSH = %%LOAD_BUFFER(deconvolution2d_WSH)%%;
    const int WSW = %%LOAD_BUFFER(deconvolution2d_WSW)%%;
    const int YSN = %%LOAD_BUFFER(deconvolution2d_YSN)%%;
    const int YSC = %%LOAD_BUFFER(deconvolution2d_YSC)%%;
    const int YSH = %%LOAD_BUFFER(deconvolution2d_YSH)%%;
    const int YSW = %%LOAD_BUFFER(deconvolution2d_YSW)%%;

    for (int n = 0; n < N; n++) {
        for (int h2 = 0; h2 < H2; h2++) {
            for (int w2 = 0; w2 < W2; w2++) {
                for (int c2 = 0; c2 < C2; c2++) {
                    float sum = 0.0f;

                    for (int kh = 0; kh < KH; kh++) {
                        const int th = h2 + PH - kh;
                        if (th < 0 || th % SH != 0) continue;
                        const int h1 = th / SH;
                        if (h1 >= H1) continue;

                        for (int kw = 0; kw < KW; kw++) {
                            const int tw = w2 + PW - kw;
                            if (tw < 0 || tw % SW != 0) continue;
                            const int w1 = tw / SW;
                            if (w1 >= W1) continue;

                            for (int c1 = 0; c1 < C1; c1++) {
                                sum += X[n * XSN + c1 * XSC + h1 * XSH + w1 * XSW]
                                     * W[c2 * WSN + c1 * WSC + kh * WSH + kw * WSW];
                            }
                        }
                    }

                    Y[n * YSN + c2 * YSC + h2 * YSH + w2 * YSW] = sum;
                }
            }
        }
    }
}
";

fn register_strides(
    buffers: &mut BufferInjector<'_>,
    graph: &Graph,
    prefix: &str,
    variable: &Variable,
) -> Result<()> {
    for axis in [Axis::N, Axis::C, Axis::H, Axis::W] {
        let stride = graph.placeholders().simplify(&variable.stride(axis)?);
        buffers.register(format!("deconvolution2d_{prefix}S{axis}"), stride);
    }
    Ok(())
}

/// Direct gather: every output element sums the input taps that land on it.
/// Strides come in as metadata, so any NCHW permutation works.
pub fn deconvolution2d(
    graph: &Graph,
    operator: &Operator,
    params: &Deconvolution2D,
    layout: &MemoryLayout,
) -> Result<Vec<Kernel>> {
    let x = graph.variable(operator.input("x")?)?;
    let w = graph.variable(operator.input("w")?)?;
    let y = graph.variable(operator.output("y")?)?;
    let table = graph.placeholders();
    let extent = |variable: &Variable, axis| variable.extent(axis).map(|e| table.simplify(e));

    let (ksize, stride, padding) = (params.ksize(), params.stride(), params.padding());
    let mut buffers = BufferInjector::new(table);
    buffers
        .register("deconvolution2d_X", layout.get(x.id)?)
        .register("deconvolution2d_W", layout.get(w.id)?)
        .register("deconvolution2d_Y", layout.get(y.id)?)
        .register("deconvolution2d_N", extent(x, Axis::N)?)
        .register("deconvolution2d_C1", extent(x, Axis::C)?)
        .register("deconvolution2d_H1", extent(x, Axis::H)?)
        .register("deconvolution2d_W1", extent(x, Axis::W)?)
        .register("deconvolution2d_C2", extent(y, Axis::C)?)
        .register("deconvolution2d_H2", extent(y, Axis::H)?)
        .register("deconvolution2d_W2", extent(y, Axis::W)?)
        .register("deconvolution2d_KH", ksize.h)
        .register("deconvolution2d_KW", ksize.w)
        .register("deconvolution2d_SH", stride.h)
        .register("deconvolution2d_SW", stride.w)
        .register("deconvolution2d_PH", padding.h)
        .register("deconvolution2d_PW", padding.w);
    register_strides(&mut buffers, graph, "X", x)?;
    register_strides(&mut buffers, graph, "W", w)?;
    register_strides(&mut buffers, graph, "Y", y)?;

    let names = KernelNameInjector::new(operator);
    let kernel = Kernel::instantiate(&Template::parse(TEMPLATE), &names, buffers)?;
    Ok(vec![kernel])
}
