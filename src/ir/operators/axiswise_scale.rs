use crate::error::{CompileError, Result};
use crate::ir::{AttributeTag, Axis, Obligation, OperatorRule, OutputSpec, RuleContext};

/// Multiplies `x` by a rank-1 scale vector broadcast along `axis`.
///
/// Signature: `y = op(x, s)`. `y` has `x`'s shape and order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxiswiseScale {
    axis: Axis,
}

impl AxiswiseScale {
    pub fn new(axis: Axis) -> Self {
        Self { axis }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }
}

impl OperatorRule for AxiswiseScale {
    fn kind_name(&self) -> &'static str {
        "AxiswiseScale"
    }

    fn input_slots(&self) -> &'static [&'static str] {
        &["x", "s"]
    }

    fn output_slots(&self) -> &'static [&'static str] {
        &["y"]
    }

    fn attributes(&self) -> Vec<AttributeTag> {
        vec![AttributeTag::Elementwise, AttributeTag::Axiswise(self.axis)]
    }

    fn validate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Obligation>> {
        let x = ctx.input("x")?;
        let s = ctx.input("s")?;

        if !x.order().contains(self.axis) {
            return Err(CompileError::shape_mismatch(
                ctx.operator,
                format!(
                    "input 'x' must contain axis {}, got order {}",
                    self.axis,
                    x.order()
                ),
            ));
        }
        if s.order().rank() != 1 || !s.order().contains(self.axis) {
            return Err(CompileError::shape_mismatch(
                ctx.operator,
                format!(
                    "scale 's' must be a rank-1 vector along {}, got order {}",
                    self.axis,
                    s.order()
                ),
            ));
        }

        Ok(vec![Obligation::equal(
            format!("scale length must equal input extent along {}", self.axis),
            s.extent(self.axis)?.clone(),
            x.extent(self.axis)?.clone(),
        )])
    }

    fn infer(&self, ctx: &RuleContext<'_>) -> Result<Vec<OutputSpec>> {
        let x = ctx.input("x")?;
        Ok(vec![OutputSpec {
            shape: x.shape().to_vec(),
            order: x.order().clone(),
        }])
    }

    fn describe(&self) -> String {
        format!("axis={}", self.axis)
    }
}

#[cfg(test)]
mod tests {
    use super::AxiswiseScale;
    use crate::error::CompileError;
    use crate::ir::{AttributeTag, Axis, Graph, Order};

    #[test]
    fn output_mirrors_input() {
        let mut graph = Graph::new();
        let x = graph
            .add_input("x", vec![3usize.into(), 4usize.into()], Order::nc())
            .expect("input");
        let s = graph
            .add_weight("s", vec![4usize.into()], Order::c())
            .expect("weight");
        let op = graph.add_operator(Some("scale"), AxiswiseScale::new(Axis::C));
        let outputs = graph.apply(op, &[x, s]).expect("apply");

        let y = graph.variable(outputs[0]).expect("output");
        let x = graph.variable(x).expect("input");
        assert_eq!(y.shape(), x.shape());
        assert_eq!(y.order(), x.order());

        let op = graph.operator(op).expect("operator");
        assert!(op.has_attribute(AttributeTag::Axiswise(Axis::C)));
        assert!(op.pending_obligations().is_empty());
    }

    #[test]
    fn rejects_scale_length_mismatch() {
        let mut graph = Graph::new();
        let x = graph
            .add_input("x", vec![3usize.into(), 4usize.into()], Order::nc())
            .expect("input");
        let s = graph
            .add_weight("s", vec![5usize.into()], Order::c())
            .expect("weight");
        let op = graph.add_operator(None, AxiswiseScale::new(Axis::C));
        let err = graph.apply(op, &[x, s]).expect_err("lengths differ");
        assert!(matches!(err, CompileError::ShapeMismatch { .. }));
        assert!(err.to_string().contains("scale length"));
    }
}
