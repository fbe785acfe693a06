//! Scope-keyed bounds analysis.
//!
//! Computes a conservative interval for an expression given intervals for
//! variables in scope. Either endpoint may be undefined; a defined endpoint
//! is an expression (usually, but not necessarily, a literal) that bounds
//! the analyzed expression pointwise.

use raster_ir::arith::div_imp;
use raster_ir::{Expr, ExprKind, Scope};

/// An inclusive interval with optionally-undefined endpoints.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Interval {
    pub min: Option<Expr>,
    pub max: Option<Expr>,
}

impl Interval {
    pub fn new(min: Option<Expr>, max: Option<Expr>) -> Self {
        Self { min, max }
    }

    /// The interval with no information: both endpoints undefined.
    pub fn everything() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    /// The degenerate interval holding exactly `e`.
    pub fn single(e: Expr) -> Self {
        Self {
            min: Some(e.clone()),
            max: Some(e),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }
}

/// Computes bounds of `e` given bounds for variables in scope.
pub fn bounds_of_expr_in_scope(e: &Expr, scope: &Scope<Interval>) -> Interval {
    let mut analyzer = Analyzer {
        scope,
        locals: Scope::new(),
    };
    analyzer.analyze(e)
}

fn add_expr(a: &Expr, b: &Expr) -> Expr {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => Expr::int(x + y),
        _ => a.clone() + b.clone(),
    }
}

fn sub_expr(a: &Expr, b: &Expr) -> Expr {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => Expr::int(x - y),
        _ => a.clone() - b.clone(),
    }
}

fn mul_const(a: &Expr, c: i64) -> Expr {
    match a.as_int() {
        Some(x) => Expr::int(x * c),
        None => a.clone() * c,
    }
}

fn div_const(a: &Expr, c: i64) -> Expr {
    match a.as_int() {
        Some(x) => Expr::int(div_imp(x, c)),
        None => a.clone() / c,
    }
}

fn min_expr(a: &Expr, b: &Expr) -> Expr {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => Expr::int(x.min(y)),
        _ => raster_ir::min(a.clone(), b.clone()),
    }
}

fn max_expr(a: &Expr, b: &Expr) -> Expr {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => Expr::int(x.max(y)),
        _ => raster_ir::max(a.clone(), b.clone()),
    }
}

fn both(
    a: &Option<Expr>,
    b: &Option<Expr>,
    combine: impl Fn(&Expr, &Expr) -> Expr,
) -> Option<Expr> {
    match (a, b) {
        (Some(a), Some(b)) => Some(combine(a, b)),
        _ => None,
    }
}

struct Analyzer<'a> {
    scope: &'a Scope<Interval>,
    locals: Scope<Interval>,
}

impl Analyzer<'_> {
    fn lookup(&self, name: &str) -> Interval {
        self.locals
            .get(name)
            .or_else(|| self.scope.get(name))
            .cloned()
            .unwrap_or_else(Interval::everything)
    }

    fn analyze(&mut self, e: &Expr) -> Interval {
        match e.kind() {
            ExprKind::IntImm(_) | ExprKind::FloatImm(_) => Interval::single(e.clone()),
            ExprKind::Variable(name) => self.lookup(name),
            ExprKind::Add(a, b) => {
                let ia = self.analyze(a);
                let ib = self.analyze(b);
                Interval::new(
                    both(&ia.min, &ib.min, add_expr),
                    both(&ia.max, &ib.max, add_expr),
                )
            }
            ExprKind::Sub(a, b) => {
                let ia = self.analyze(a);
                let ib = self.analyze(b);
                Interval::new(
                    both(&ia.min, &ib.max, sub_expr),
                    both(&ia.max, &ib.min, sub_expr),
                )
            }
            ExprKind::Mul(a, b) => {
                if let Some(c) = b.as_int() {
                    self.scaled(a, c, mul_const)
                } else if let Some(c) = a.as_int() {
                    self.scaled(b, c, mul_const)
                } else {
                    Interval::everything()
                }
            }
            ExprKind::Div(a, b) => match b.as_int() {
                Some(c) if c != 0 => self.scaled(a, c, div_const),
                _ => Interval::everything(),
            },
            ExprKind::Mod(_, b) => {
                // Euclidean residue: in [0, c) for a positive constant rhs.
                match b.as_int() {
                    Some(c) if c > 0 => {
                        Interval::new(Some(Expr::int(0)), Some(Expr::int(c - 1)))
                    }
                    _ => Interval::everything(),
                }
            }
            ExprKind::Min(a, b) => {
                let ia = self.analyze(a);
                let ib = self.analyze(b);
                let max = match (&ia.max, &ib.max) {
                    (Some(x), Some(y)) => Some(min_expr(x, y)),
                    (Some(x), None) => Some(x.clone()),
                    (None, Some(y)) => Some(y.clone()),
                    (None, None) => None,
                };
                Interval::new(both(&ia.min, &ib.min, min_expr), max)
            }
            ExprKind::Max(a, b) => {
                let ia = self.analyze(a);
                let ib = self.analyze(b);
                let min = match (&ia.min, &ib.min) {
                    (Some(x), Some(y)) => Some(max_expr(x, y)),
                    (Some(x), None) => Some(x.clone()),
                    (None, Some(y)) => Some(y.clone()),
                    (None, None) => None,
                };
                Interval::new(min, both(&ia.max, &ib.max, max_expr))
            }
            ExprKind::Select {
                true_value,
                false_value,
                ..
            } => {
                let it = self.analyze(true_value);
                let if_ = self.analyze(false_value);
                Interval::new(
                    both(&it.min, &if_.min, min_expr),
                    both(&it.max, &if_.max, max_expr),
                )
            }
            ExprKind::Broadcast { value, .. } => self.analyze(value),
            ExprKind::Ramp { base, stride, lanes } => {
                let ib = self.analyze(base);
                match stride.as_int() {
                    Some(s) if s >= 0 => {
                        let reach = s * i64::from(*lanes - 1);
                        Interval::new(
                            ib.min.clone(),
                            ib.max.as_ref().map(|m| add_expr(m, &Expr::int(reach))),
                        )
                    }
                    Some(s) => {
                        let reach = s * i64::from(*lanes - 1);
                        Interval::new(
                            ib.min.as_ref().map(|m| add_expr(m, &Expr::int(reach))),
                            ib.max.clone(),
                        )
                    }
                    None => Interval::everything(),
                }
            }
            ExprKind::Let { name, value, body } => {
                let iv = self.analyze(value);
                self.locals.push(name, iv);
                let result = self.analyze(body);
                self.locals.pop(name);
                result
            }
            _ => Interval::everything(),
        }
    }

    /// Bounds of `a` scaled by the constant `c` through `apply`.
    fn scaled(&mut self, a: &Expr, c: i64, apply: fn(&Expr, i64) -> Expr) -> Interval {
        let ia = self.analyze(a);
        if c >= 0 {
            Interval::new(
                ia.min.as_ref().map(|m| apply(m, c)),
                ia.max.as_ref().map(|m| apply(m, c)),
            )
        } else {
            Interval::new(
                ia.max.as_ref().map(|m| apply(m, c)),
                ia.min.as_ref().map(|m| apply(m, c)),
            )
        }
    }
}
