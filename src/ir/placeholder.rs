use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::Serialize;

use crate::error::{CompileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::FloorDiv => "//",
        }
    }

    fn eval(self, lhs: i64, rhs: i64) -> Option<i64> {
        match self {
            BinaryOp::Add => lhs.checked_add(rhs),
            BinaryOp::Sub => lhs.checked_sub(rhs),
            BinaryOp::Mul => lhs.checked_mul(rhs),
            BinaryOp::FloorDiv => floor_div(lhs, rhs),
        }
    }
}

fn floor_div(lhs: i64, rhs: i64) -> Option<i64> {
    let quotient = lhs.checked_div(rhs)?;
    if lhs % rhs != 0 && ((lhs < 0) != (rhs < 0)) {
        quotient.checked_sub(1)
    } else {
        Some(quotient)
    }
}

/// A shape extent: either a concrete integer or a deferred expression over
/// symbols bound later in a [`PlaceholderTable`].
///
/// Arithmetic folds immediately when both operands are concrete and builds a
/// new expression node otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Placeholder {
    Value(i64),
    Symbol(SymbolId),
    Binary {
        op: BinaryOp,
        lhs: Box<Placeholder>,
        rhs: Box<Placeholder>,
    },
}

impl Placeholder {
    pub fn value(value: i64) -> Self {
        Placeholder::Value(value)
    }

    pub fn symbol(id: SymbolId) -> Self {
        Placeholder::Symbol(id)
    }

    /// The concrete value, if this node is a literal.
    pub fn as_value(&self) -> Option<i64> {
        match self {
            Placeholder::Value(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<SymbolId> {
        match self {
            Placeholder::Symbol(id) => Some(*id),
            _ => None,
        }
    }

    pub fn floor_div(self, rhs: impl Into<Placeholder>) -> Placeholder {
        Placeholder::combine(BinaryOp::FloorDiv, self, rhs.into())
    }

    /// Product of all extents; the element count of a shape.
    pub fn product<'a>(extents: impl IntoIterator<Item = &'a Placeholder>) -> Placeholder {
        extents
            .into_iter()
            .fold(Placeholder::Value(1), |acc, extent| acc * extent.clone())
    }

    /// Rounds up to the next multiple of `alignment`.
    pub fn align_up(self, alignment: i64) -> Placeholder {
        if alignment <= 1 {
            return self;
        }
        (self + (alignment - 1)).floor_div(alignment) * alignment
    }

    /// Symbols reachable from this expression, in first-occurrence order.
    pub fn symbols(&self) -> Vec<SymbolId> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut Vec<SymbolId>) {
        match self {
            Placeholder::Value(_) => {}
            Placeholder::Symbol(id) => {
                if !out.contains(id) {
                    out.push(*id);
                }
            }
            Placeholder::Binary { lhs, rhs, .. } => {
                lhs.collect_symbols(out);
                rhs.collect_symbols(out);
            }
        }
    }

    fn combine(op: BinaryOp, lhs: Placeholder, rhs: Placeholder) -> Placeholder {
        if let (Some(a), Some(b)) = (lhs.as_value(), rhs.as_value())
            && let Some(folded) = op.eval(a, b)
        {
            return Placeholder::Value(folded);
        }

        match (op, lhs.as_value(), rhs.as_value()) {
            (BinaryOp::Add, Some(0), _) => return rhs,
            (BinaryOp::Add | BinaryOp::Sub, _, Some(0)) => return lhs,
            (BinaryOp::Mul, Some(1), _) => return rhs,
            (BinaryOp::Mul | BinaryOp::FloorDiv, _, Some(1)) => return lhs,
            (BinaryOp::Mul, Some(0), _) | (BinaryOp::Mul, _, Some(0)) => {
                return Placeholder::Value(0);
            }
            _ => {}
        }

        Placeholder::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Placeholder::Binary {
                op: BinaryOp::Add | BinaryOp::Sub,
                ..
            } => 1,
            Placeholder::Binary { .. } => 2,
            _ => 3,
        }
    }
}

impl From<i64> for Placeholder {
    fn from(value: i64) -> Self {
        Placeholder::Value(value)
    }
}

impl From<usize> for Placeholder {
    fn from(value: usize) -> Self {
        Placeholder::Value(value as i64)
    }
}

impl From<SymbolId> for Placeholder {
    fn from(id: SymbolId) -> Self {
        Placeholder::Symbol(id)
    }
}

impl<T: Into<Placeholder>> Add<T> for Placeholder {
    type Output = Placeholder;

    fn add(self, rhs: T) -> Placeholder {
        Placeholder::combine(BinaryOp::Add, self, rhs.into())
    }
}

impl<T: Into<Placeholder>> Sub<T> for Placeholder {
    type Output = Placeholder;

    fn sub(self, rhs: T) -> Placeholder {
        Placeholder::combine(BinaryOp::Sub, self, rhs.into())
    }
}

impl<T: Into<Placeholder>> Mul<T> for Placeholder {
    type Output = Placeholder;

    fn mul(self, rhs: T) -> Placeholder {
        Placeholder::combine(BinaryOp::Mul, self, rhs.into())
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", render_with(self, &|id| format!("${}", id.0)))
    }
}

fn render_with(expr: &Placeholder, label: &dyn Fn(SymbolId) -> String) -> String {
    match expr {
        Placeholder::Value(value) => value.to_string(),
        Placeholder::Symbol(id) => label(*id),
        Placeholder::Binary { op, lhs, rhs } => {
            let own = expr.precedence();
            let left = render_with(lhs, label);
            let right = render_with(rhs, label);
            let left = if lhs.precedence() < own {
                format!("({left})")
            } else {
                left
            };
            let right = if rhs.precedence() <= own && matches!(**rhs, Placeholder::Binary { .. }) {
                format!("({right})")
            } else {
                right
            };
            format!("{left} {} {right}", op.symbol())
        }
    }
}

#[derive(Debug, Clone)]
struct SymbolEntry {
    label: String,
    value: Option<i64>,
}

/// Single-assignment bindings for every symbol created in one graph.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderTable {
    symbols: Vec<SymbolEntry>,
}

impl PlaceholderTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, label: impl Into<String>) -> SymbolId {
        let id = SymbolId(self.symbols.len());
        self.symbols.push(SymbolEntry {
            label: label.into(),
            value: None,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn label(&self, id: SymbolId) -> Result<&str> {
        self.entry(id).map(|entry| entry.label.as_str())
    }

    pub fn bound_value(&self, id: SymbolId) -> Result<Option<i64>> {
        self.entry(id).map(|entry| entry.value)
    }

    /// Binds a symbol. Re-binding to the same value is a no-op; returns
    /// whether the binding is new.
    pub fn bind(&mut self, id: SymbolId, value: i64) -> Result<bool> {
        let entry = self
            .symbols
            .get_mut(id.0)
            .ok_or(CompileError::UnknownPlaceholder(id.0))?;
        if value < 0 {
            return Err(CompileError::unsupported(
                format!("placeholder '{}'", entry.label),
                format!("extents must be non-negative, got {value}"),
            ));
        }
        match entry.value {
            Some(bound) if bound == value => Ok(false),
            Some(bound) => Err(CompileError::PlaceholderConflict {
                label: entry.label.clone(),
                bound,
                requested: value,
            }),
            None => {
                entry.value = Some(value);
                Ok(true)
            }
        }
    }

    /// Pure predicate: every symbol reachable from `expr` is bound.
    pub fn check_resolved(&self, expr: &Placeholder) -> bool {
        match expr {
            Placeholder::Value(_) => true,
            Placeholder::Symbol(id) => self
                .symbols
                .get(id.0)
                .is_some_and(|entry| entry.value.is_some()),
            Placeholder::Binary { lhs, rhs, .. } => {
                self.check_resolved(lhs) && self.check_resolved(rhs)
            }
        }
    }

    /// Concrete value of `expr`, or `None` while any symbol is unbound.
    pub fn evaluate(&self, expr: &Placeholder) -> Result<Option<i64>> {
        match expr {
            Placeholder::Value(value) => Ok(Some(*value)),
            Placeholder::Symbol(id) => self.bound_value(*id),
            Placeholder::Binary { op, lhs, rhs } => {
                let (Some(a), Some(b)) = (self.evaluate(lhs)?, self.evaluate(rhs)?) else {
                    return Ok(None);
                };
                op.eval(a, b).map(Some).ok_or_else(|| {
                    CompileError::unsupported(
                        format!("placeholder expression {}", self.render(expr)),
                        format!("cannot evaluate {a} {} {b}", op.symbol()),
                    )
                })
            }
        }
    }

    /// Rewrites `expr` with every bound symbol replaced by its value.
    pub fn simplify(&self, expr: &Placeholder) -> Placeholder {
        match expr {
            Placeholder::Value(_) => expr.clone(),
            Placeholder::Symbol(id) => match self.symbols.get(id.0).and_then(|entry| entry.value) {
                Some(value) => Placeholder::Value(value),
                None => expr.clone(),
            },
            Placeholder::Binary { op, lhs, rhs } => {
                Placeholder::combine(*op, self.simplify(lhs), self.simplify(rhs))
            }
        }
    }

    /// Human-readable expression using symbol labels.
    pub fn render(&self, expr: &Placeholder) -> String {
        render_with(expr, &|id| {
            self.symbols
                .get(id.0)
                .map_or_else(|| format!("${}", id.0), |entry| entry.label.clone())
        })
    }

    fn entry(&self, id: SymbolId) -> Result<&SymbolEntry> {
        self.symbols
            .get(id.0)
            .ok_or(CompileError::UnknownPlaceholder(id.0))
    }
}
