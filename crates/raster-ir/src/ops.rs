//! Expression construction helpers and constant predicates.
//!
//! Binary helpers promote bare integer and float immediates into the other
//! operand's type (broadcasting across lanes where needed) so that rewrite
//! rules and tests can mix `Expr`s with plain literals.

use std::ops;

use crate::arith::int_cast_constant;
use crate::expr::{Expr, ExprKind};
use crate::types::Type;

/// A constant of integer value `v` in type `t`, canonicalized into `t`'s
/// range. Vector types broadcast the scalar constant.
pub fn make_const(t: Type, v: i64) -> Expr {
    if t.is_vector() {
        return Expr::broadcast(make_const(t.element_of(), v), t.lanes);
    }
    if t == Type::I32 {
        return Expr::int(int_cast_constant(t, v));
    }
    if t.is_float() {
        if t == Type::F32 {
            return Expr::float(v as f64);
        }
        return Expr::cast(t, Expr::float(v as f64));
    }
    if t.is_int() || t.is_uint() {
        return Expr::cast(t, Expr::int(int_cast_constant(t, v)));
    }
    panic!("make_const of unsupported type {t}")
}

/// A constant of float value `v` in float type `t`.
pub fn make_const_float(t: Type, v: f64) -> Expr {
    if t.is_vector() {
        return Expr::broadcast(make_const_float(t.element_of(), v), t.lanes);
    }
    if t == Type::F32 {
        Expr::float(v)
    } else {
        Expr::cast(t, Expr::float(v))
    }
}

pub fn make_zero(t: Type) -> Expr {
    make_const(t, 0)
}

pub fn make_one(t: Type) -> Expr {
    make_const(t, 1)
}

/// A boolean constant with the given lane count.
pub fn make_bool(v: bool, lanes: u16) -> Expr {
    make_const(Type::BOOL.with_lanes(lanes), i64::from(v))
}

pub fn const_true(lanes: u16) -> Expr {
    make_bool(true, lanes)
}

pub fn const_false(lanes: u16) -> Expr {
    make_bool(false, lanes)
}

/// An immediate, or a cast or broadcast chain ending in one.
pub fn is_const(e: &Expr) -> bool {
    match e.kind() {
        ExprKind::IntImm(_) | ExprKind::FloatImm(_) => true,
        ExprKind::Cast(value) => is_const(value),
        ExprKind::Broadcast { value, .. } => is_const(value),
        _ => false,
    }
}

/// True when `e` is a constant whose underlying integer immediate is `v`.
pub fn is_const_value(e: &Expr, v: i64) -> bool {
    match e.kind() {
        ExprKind::IntImm(x) => *x == v,
        ExprKind::Cast(value) => is_const_value(value, v),
        ExprKind::Broadcast { value, .. } => is_const_value(value, v),
        _ => false,
    }
}

pub fn is_zero(e: &Expr) -> bool {
    match e.kind() {
        ExprKind::IntImm(x) => *x == 0,
        ExprKind::FloatImm(f) => *f == 0.0,
        ExprKind::Cast(value) => is_zero(value),
        ExprKind::Broadcast { value, .. } => is_zero(value),
        _ => false,
    }
}

pub fn is_one(e: &Expr) -> bool {
    match e.kind() {
        ExprKind::IntImm(x) => *x == 1,
        ExprKind::FloatImm(f) => *f == 1.0,
        ExprKind::Cast(value) => is_one(value),
        ExprKind::Broadcast { value, .. } => is_one(value),
        _ => false,
    }
}

pub fn is_positive_const(e: &Expr) -> bool {
    match e.kind() {
        ExprKind::IntImm(x) => *x > 0,
        ExprKind::FloatImm(f) => *f > 0.0,
        ExprKind::Broadcast { value, .. } => is_positive_const(value),
        _ => false,
    }
}

pub fn is_negative_const(e: &Expr) -> bool {
    match e.kind() {
        ExprKind::IntImm(x) => *x < 0,
        ExprKind::FloatImm(f) => *f < 0.0,
        ExprKind::Broadcast { value, .. } => is_negative_const(value),
        _ => false,
    }
}

/// An immediate or a broadcast of one, but not a cast of one.
pub fn is_simple_const(e: &Expr) -> bool {
    match e.kind() {
        ExprKind::IntImm(_) | ExprKind::FloatImm(_) => true,
        ExprKind::Broadcast { value, .. } => matches!(
            value.kind(),
            ExprKind::IntImm(_) | ExprKind::FloatImm(_)
        ),
        _ => false,
    }
}

/// The value of a bare integer immediate.
pub fn const_int(e: &Expr) -> Option<i64> {
    e.as_int()
}

/// The value of a bare float immediate.
pub fn const_float(e: &Expr) -> Option<f64> {
    e.as_float()
}

/// The canonical value of an integer immediate, bare or wrapped in a cast to
/// an integer type of at most 32 bits.
pub fn const_castint(e: &Expr) -> Option<i64> {
    if let Some(v) = e.as_int() {
        return Some(v);
    }
    let t = e.ty();
    if (t.is_int() || t.is_uint()) && t.bits <= 32 {
        if let Some(inner) = e.as_cast() {
            if let Some(v) = inner.as_int() {
                return Some(int_cast_constant(t, v));
            }
        }
    }
    None
}

/// Promotes a bare immediate to type `t`, or fails.
fn promote(e: &Expr, t: Type) -> Option<Expr> {
    match e.kind() {
        ExprKind::IntImm(v) if !t.is_handle() => Some(make_const(t, *v)),
        ExprKind::FloatImm(v) if t.is_float() => Some(make_const_float(t, *v)),
        _ => None,
    }
}

/// Reconciles operand types by promoting whichever side is an immediate.
fn match_types(a: Expr, b: Expr) -> (Expr, Expr) {
    if a.ty() == b.ty() {
        return (a, b);
    }
    if let Some(a2) = promote(&a, b.ty()) {
        return (a2, b);
    }
    if let Some(b2) = promote(&b, a.ty()) {
        return (a, b2);
    }
    panic!(
        "invalid IR: operand type mismatch: {} vs {}",
        a.ty(),
        b.ty()
    )
}

pub fn min(a: Expr, b: Expr) -> Expr {
    let (a, b) = match_types(a, b);
    Expr::min(a, b)
}

pub fn max(a: Expr, b: Expr) -> Expr {
    let (a, b) = match_types(a, b);
    Expr::max(a, b)
}

pub fn eq(a: Expr, b: Expr) -> Expr {
    let (a, b) = match_types(a, b);
    Expr::eq(a, b)
}

pub fn ne(a: Expr, b: Expr) -> Expr {
    let (a, b) = match_types(a, b);
    Expr::ne(a, b)
}

pub fn lt(a: Expr, b: Expr) -> Expr {
    let (a, b) = match_types(a, b);
    Expr::lt(a, b)
}

pub fn le(a: Expr, b: Expr) -> Expr {
    let (a, b) = match_types(a, b);
    Expr::le(a, b)
}

pub fn gt(a: Expr, b: Expr) -> Expr {
    let (a, b) = match_types(a, b);
    Expr::gt(a, b)
}

pub fn ge(a: Expr, b: Expr) -> Expr {
    let (a, b) = match_types(a, b);
    Expr::ge(a, b)
}

pub fn not(a: Expr) -> Expr {
    Expr::not(a)
}

pub fn and(a: Expr, b: Expr) -> Expr {
    Expr::and(a, b)
}

pub fn or(a: Expr, b: Expr) -> Expr {
    Expr::or(a, b)
}

pub fn select(condition: Expr, true_value: Expr, false_value: Expr) -> Expr {
    let (t, f) = match_types(true_value, false_value);
    Expr::select(condition, t, f)
}

/// `a` clamped to `[lo, hi]`, built as `max(min(a, hi), lo)`.
pub fn clamp(a: Expr, lo: Expr, hi: Expr) -> Expr {
    max(min(a, hi), lo)
}

/// A cast to `t`, elided when `e` already has that type.
pub fn cast(t: Type, e: Expr) -> Expr {
    if e.ty() == t {
        e
    } else {
        Expr::cast(t, e)
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Expr {
        Expr::int(v)
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Expr {
        Expr::float(v)
    }
}

macro_rules! binary_op {
    ($trait:ident, $method:ident, $make:path) => {
        impl ops::$trait for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                let (a, b) = match_types(self, rhs);
                $make(a, b)
            }
        }

        impl ops::$trait<i64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: i64) -> Expr {
                let c = make_const(self.ty(), rhs);
                $make(self, c)
            }
        }

        impl ops::$trait<Expr> for i64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                let c = make_const(rhs.ty(), self);
                $make(c, rhs)
            }
        }

        impl ops::$trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                let c = make_const_float(self.ty(), rhs);
                $make(self, c)
            }
        }

        impl ops::$trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                let c = make_const_float(rhs.ty(), self);
                $make(c, rhs)
            }
        }
    };
}

binary_op!(Add, add, Expr::add);
binary_op!(Sub, sub, Expr::sub);
binary_op!(Mul, mul, Expr::mul);
binary_op!(Div, div, Expr::div);
binary_op!(Rem, rem, Expr::modulo);

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        make_zero(self.ty()) - self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::var(Type::I32, "x")
    }

    #[test]
    fn immediates_promote_to_operand_type() {
        let v = Expr::var(Type::I16, "v");
        let sum = v + 3;
        let (a, b) = sum.as_add().unwrap();
        assert_eq!(a.ty(), Type::I16);
        assert_eq!(b.ty(), Type::I16);
        assert!(is_const_value(b, 3));
    }

    #[test]
    fn vector_promotion_broadcasts() {
        let v = Expr::var(Type::I32.with_lanes(4), "v");
        let sum = v + 2;
        let (_, b) = sum.as_add().unwrap();
        assert!(b.as_broadcast().is_some());
        assert!(is_simple_const(b));
    }

    #[test]
    fn make_const_canonicalizes() {
        let c = make_const(Type::U8, 256);
        assert!(is_const_value(&c, 0));
        let c = make_const(Type::I8, 128);
        assert!(is_const_value(&c, -128));
        assert_eq!(make_const(Type::I32, 7), Expr::int(7));
    }

    #[test]
    fn bool_constants_fold_consistently() {
        assert!(is_one(&const_true(1)));
        assert!(is_zero(&const_false(1)));
        assert!(is_one(&const_true(4)));
        assert_eq!(const_true(1).ty(), Type::BOOL);
        assert_eq!(const_true(4).ty(), Type::BOOL.with_lanes(4));
    }

    #[test]
    fn simple_const_excludes_casts() {
        assert!(is_simple_const(&Expr::int(3)));
        assert!(is_simple_const(&Expr::broadcast(Expr::int(3), 4)));
        assert!(!is_simple_const(&make_const(Type::U16, 3)));
        assert!(is_const(&make_const(Type::U16, 3)));
    }

    #[test]
    fn castint_canonicalizes() {
        assert_eq!(const_castint(&Expr::int(5)), Some(5));
        assert_eq!(const_castint(&make_const(Type::U16, -1)), Some(65535));
        assert_eq!(const_castint(&make_const(Type::I8, 1232)), Some(-48));
        assert_eq!(const_castint(&x()), None);
    }

    #[test]
    fn negation_subtracts_from_zero() {
        let n = -x();
        let (a, b) = n.as_sub().unwrap();
        assert!(is_zero(a));
        assert_eq!(b, &x());
    }

    #[test]
    fn clamp_shape() {
        let c = clamp(x(), Expr::int(-10), Expr::int(14));
        let (inner, lo) = c.as_max().unwrap();
        assert!(is_const_value(lo, -10));
        let (_, hi) = inner.as_min().unwrap();
        assert!(is_const_value(hi, 14));
    }
}
