use crate::error::{CompileError, Result};
use crate::ir::{
    AttributeTag, Axis, Obligation, OperatorRule, Order, OutputSpec, Placeholder, RuleContext,
    Variable, permute_shape,
};

/// A `(height, width)` parameter. A single integer applies to both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Spatial {
    pub h: usize,
    pub w: usize,
}

impl From<usize> for Spatial {
    fn from(value: usize) -> Self {
        Self { h: value, w: value }
    }
}

impl From<(usize, usize)> for Spatial {
    fn from((h, w): (usize, usize)) -> Self {
        Self { h, w }
    }
}

/// Spatial deconvolution (transposed convolution).
///
/// Signature: `y = op(x, w)`. `x` and `w` must carry exactly the axes
/// N, C, H and W. The kernel's N extent is the output channel count and its
/// C extent must equal the input channel count. `y` takes `x`'s order.
///
/// Output spatial extent: `O = (I - 1) * S - 2P + K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deconvolution2D {
    ksize: Spatial,
    stride: Spatial,
    padding: Spatial,
}

impl Deconvolution2D {
    pub fn new(
        ksize: impl Into<Spatial>,
        stride: impl Into<Spatial>,
        padding: impl Into<Spatial>,
    ) -> Result<Self> {
        let ksize = ksize.into();
        let stride = stride.into();
        let padding = padding.into();
        if ksize.h == 0 || ksize.w == 0 || stride.h == 0 || stride.w == 0 {
            return Err(CompileError::unsupported(
                "Deconvolution2D",
                format!(
                    "ksize and stride must be positive, got ksize=({}, {}) stride=({}, {})",
                    ksize.h, ksize.w, stride.h, stride.w
                ),
            ));
        }
        Ok(Self {
            ksize,
            stride,
            padding,
        })
    }

    pub fn ksize(&self) -> Spatial {
        self.ksize
    }

    pub fn stride(&self) -> Spatial {
        self.stride
    }

    pub fn padding(&self) -> Spatial {
        self.padding
    }

    /// `(input - 1) * stride - 2 * padding + ksize`
    pub fn output_extent(
        input: Placeholder,
        ksize: usize,
        stride: usize,
        padding: usize,
    ) -> Placeholder {
        (input - 1i64) * stride - Placeholder::from(padding) * 2i64 + ksize
    }

    fn spatial_output(&self, x: &Variable) -> Result<(Placeholder, Placeholder)> {
        let h2 = Self::output_extent(
            x.extent(Axis::H)?.clone(),
            self.ksize.h,
            self.stride.h,
            self.padding.h,
        );
        let w2 = Self::output_extent(
            x.extent(Axis::W)?.clone(),
            self.ksize.w,
            self.stride.w,
            self.padding.w,
        );
        Ok((h2, w2))
    }
}

impl OperatorRule for Deconvolution2D {
    fn kind_name(&self) -> &'static str {
        "Deconvolution2D"
    }

    fn input_slots(&self) -> &'static [&'static str] {
        &["x", "w"]
    }

    fn output_slots(&self) -> &'static [&'static str] {
        &["y"]
    }

    fn attributes(&self) -> Vec<AttributeTag> {
        vec![AttributeTag::Tensorwise(Axis::N)]
    }

    fn validate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Obligation>> {
        let x = ctx.input("x")?;
        let w = ctx.input("w")?;
        ctx.require_axes("x", x, &Order::nchw())?;
        ctx.require_axes("w", w, &Order::nchw())?;
        let (h2, w2) = self.spatial_output(x)?;

        Ok(vec![
            Obligation::equal(
                "kernel height must equal ksize",
                w.extent(Axis::H)?.clone(),
                self.ksize.h.into(),
            ),
            Obligation::equal(
                "kernel width must equal ksize",
                w.extent(Axis::W)?.clone(),
                self.ksize.w.into(),
            ),
            Obligation::equal(
                "kernel channel must equal input channel",
                w.extent(Axis::C)?.clone(),
                x.extent(Axis::C)?.clone(),
            ),
            Obligation::positive("output height must be positive", h2),
            Obligation::positive("output width must be positive", w2),
        ])
    }

    fn infer(&self, ctx: &RuleContext<'_>) -> Result<Vec<OutputSpec>> {
        let x = ctx.input("x")?;
        let w = ctx.input("w")?;

        let n = x.extent(Axis::N)?.clone();
        let (h2, w2) = self.spatial_output(x)?;
        let c2 = w.extent(Axis::N)?.clone();

        let nhwc = [n, h2, w2, c2]
            .iter()
            .map(|extent| ctx.table.simplify(extent))
            .collect::<Vec<_>>();
        let shape = permute_shape(&nhwc, &Order::nhwc(), x.order())?;

        Ok(vec![OutputSpec {
            shape,
            order: x.order().clone(),
        }])
    }

    fn describe(&self) -> String {
        format!(
            "ksize=({}, {}) stride=({}, {}) padding=({}, {})",
            self.ksize.h, self.ksize.w, self.stride.h, self.stride.w, self.padding.h, self.padding.w
        )
    }
}
