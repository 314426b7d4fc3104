use std::fmt;

use serde::Serialize;

use crate::error::{CompileError, Result};

/// Symbolic identity of one tensor dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Axis {
    /// Batch.
    N,
    /// Channel.
    C,
    /// Height.
    H,
    /// Width.
    W,
    /// Sequence / time step.
    T,
}

impl Axis {
    pub const ALL: [Axis; 5] = [Axis::N, Axis::C, Axis::H, Axis::W, Axis::T];

    pub fn letter(self) -> char {
        match self {
            Axis::N => 'N',
            Axis::C => 'C',
            Axis::H => 'H',
            Axis::W => 'W',
            Axis::T => 'T',
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Physical dimension layout of a tensor: a sequence of distinct axes.
///
/// Equality is sequence equality. Use [`Order::check_same_axes`] when only
/// the set of dimensions matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Order {
    axes: Vec<Axis>,
}

impl Order {
    pub fn new(axes: Vec<Axis>) -> Result<Self> {
        for (index, axis) in axes.iter().enumerate() {
            if axes[..index].contains(axis) {
                let rendered = axes.iter().map(|a| a.letter()).collect::<String>();
                return Err(CompileError::shape_mismatch(
                    "Order::new",
                    format!("axis {axis} appears more than once in {rendered}"),
                ));
            }
        }
        Ok(Self { axes })
    }

    fn from_distinct(axes: &[Axis]) -> Self {
        Self {
            axes: axes.to_vec(),
        }
    }

    pub fn c() -> Self {
        Self::from_distinct(&[Axis::C])
    }

    pub fn nc() -> Self {
        Self::from_distinct(&[Axis::N, Axis::C])
    }

    pub fn cn() -> Self {
        Self::from_distinct(&[Axis::C, Axis::N])
    }

    pub fn nhwc() -> Self {
        Self::from_distinct(&[Axis::N, Axis::H, Axis::W, Axis::C])
    }

    pub fn nchw() -> Self {
        Self::from_distinct(&[Axis::N, Axis::C, Axis::H, Axis::W])
    }

    pub fn hwnc() -> Self {
        Self::from_distinct(&[Axis::H, Axis::W, Axis::N, Axis::C])
    }

    pub fn cnhw() -> Self {
        Self::from_distinct(&[Axis::C, Axis::N, Axis::H, Axis::W])
    }

    pub fn chwn() -> Self {
        Self::from_distinct(&[Axis::C, Axis::H, Axis::W, Axis::N])
    }

    pub fn ntc() -> Self {
        Self::from_distinct(&[Axis::N, Axis::T, Axis::C])
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn rank(&self) -> usize {
        self.axes.len()
    }

    pub fn contains(&self, axis: Axis) -> bool {
        self.axes.contains(&axis)
    }

    /// True iff both orders hold the same axis set, regardless of sequence.
    pub fn check_same_axes(&self, other: &Order) -> bool {
        self.axes.len() == other.axes.len() && self.axes.iter().all(|axis| other.contains(*axis))
    }

    pub fn axis_index(&self, axis: Axis) -> Result<usize> {
        self.axes
            .iter()
            .position(|candidate| *candidate == axis)
            .ok_or_else(|| CompileError::AxisNotFound {
                axis,
                order: self.clone(),
            })
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for axis in &self.axes {
            write!(f, "{}", axis.letter())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Axis, Order};
    use crate::error::CompileError;

    #[test]
    fn permutations_share_axes_but_are_not_equal() {
        let nhwc = Order::nhwc();
        let nchw = Order::nchw();
        assert!(nhwc.check_same_axes(&nchw));
        assert_ne!(nhwc, nchw);
        assert!(!nhwc.check_same_axes(&Order::nc()));
    }

    #[test]
    fn axis_index_reports_missing_axis() {
        let order = Order::nc();
        assert_eq!(order.axis_index(Axis::C).expect("C is present"), 1);
        let err = order.axis_index(Axis::H).expect_err("H is absent");
        assert!(matches!(err, CompileError::AxisNotFound { axis: Axis::H, .. }));
    }

    #[test]
    fn rejects_duplicate_axes() {
        let err = Order::new(vec![Axis::N, Axis::C, Axis::N]).expect_err("duplicate axis");
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn displays_as_axis_letters() {
        assert_eq!(Order::hwnc().to_string(), "HWNC");
    }
}
