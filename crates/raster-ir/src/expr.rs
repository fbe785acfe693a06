//! Expressions: immutable, shared, typed value trees.

use std::sync::Arc;

use crate::error::IrError;
use crate::types::Type;

/// How a [`ExprKind::Call`] resolves.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum CallType {
    /// Reads an input image buffer.
    Image,
    /// Reads another pipeline stage's buffer.
    Halide,
    /// Calls an externally-defined function.
    Extern,
    /// A compiler intrinsic.
    Intrinsic,
}

/// The variant payload of an expression node.
#[derive(Debug, PartialEq)]
pub enum ExprKind {
    IntImm(i64),
    FloatImm(f64),
    /// Reinterpret `value` as the node's type.
    Cast(Expr),
    Variable(String),
    Add(Expr, Expr),
    Sub(Expr, Expr),
    Mul(Expr, Expr),
    Div(Expr, Expr),
    Mod(Expr, Expr),
    Min(Expr, Expr),
    Max(Expr, Expr),
    Eq(Expr, Expr),
    Ne(Expr, Expr),
    Lt(Expr, Expr),
    Le(Expr, Expr),
    Gt(Expr, Expr),
    Ge(Expr, Expr),
    And(Expr, Expr),
    Or(Expr, Expr),
    Not(Expr),
    Select {
        condition: Expr,
        true_value: Expr,
        false_value: Expr,
    },
    /// Read from a named buffer at a (possibly vectorized) integer index.
    Load {
        name: String,
        index: Expr,
        image: Option<String>,
        param: Option<String>,
    },
    /// The vector `[base, base+stride, ..., base+(lanes-1)*stride]`.
    Ramp {
        base: Expr,
        stride: Expr,
        lanes: u16,
    },
    /// The vector with every lane equal to `value`.
    Broadcast {
        value: Expr,
        lanes: u16,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        call_type: CallType,
    },
    /// Expression-level binding of `name` to `value` within `body`.
    Let {
        name: String,
        value: Expr,
        body: Expr,
    },
}

#[derive(Debug)]
struct ExprNode {
    ty: Type,
    kind: ExprKind,
}

/// A cheap-to-clone handle to an immutable expression node.
#[derive(Clone, Debug)]
pub struct Expr(Arc<ExprNode>);

/// Structural equality with a pointer-identity fast path.
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other) || (self.0.ty == other.0.ty && self.0.kind == other.0.kind)
    }
}

fn invalid(err: IrError) -> ! {
    panic!("invalid IR: {err}")
}

fn require_same_type(a: &Expr, b: &Expr) {
    if a.ty() != b.ty() {
        invalid(IrError::TypeMismatch {
            left: a.ty(),
            right: b.ty(),
        });
    }
}

fn require_scalar(e: &Expr) {
    if !e.ty().is_scalar() {
        invalid(IrError::ExpectedScalar { found: e.ty() });
    }
}

fn require_bool(e: &Expr) {
    if !e.ty().is_bool() {
        invalid(IrError::ExpectedBool { found: e.ty() });
    }
}

impl Expr {
    fn new(ty: Type, kind: ExprKind) -> Expr {
        Expr(Arc::new(ExprNode { ty, kind }))
    }

    pub fn ty(&self) -> Type {
        self.0.ty
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    /// Pointer identity: `true` iff both handles reference the same node.
    pub fn same_as(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// A 32-bit signed integer immediate.
    pub fn int(value: i64) -> Expr {
        Expr::new(Type::I32, ExprKind::IntImm(value))
    }

    /// A 32-bit float immediate.
    pub fn float(value: f64) -> Expr {
        Expr::new(Type::F32, ExprKind::FloatImm(value))
    }

    pub fn var(ty: Type, name: impl Into<String>) -> Expr {
        Expr::new(ty, ExprKind::Variable(name.into()))
    }

    pub fn cast(ty: Type, value: Expr) -> Expr {
        if ty.lanes != value.ty().lanes {
            invalid(IrError::LaneMismatch {
                left: ty.lanes,
                right: value.ty().lanes,
            });
        }
        Expr::new(ty, ExprKind::Cast(value))
    }

    fn binary(a: Expr, b: Expr, make: fn(Expr, Expr) -> ExprKind) -> Expr {
        require_same_type(&a, &b);
        let ty = a.ty();
        Expr::new(ty, make(a, b))
    }

    pub fn add(a: Expr, b: Expr) -> Expr {
        Expr::binary(a, b, ExprKind::Add)
    }

    pub fn sub(a: Expr, b: Expr) -> Expr {
        Expr::binary(a, b, ExprKind::Sub)
    }

    pub fn mul(a: Expr, b: Expr) -> Expr {
        Expr::binary(a, b, ExprKind::Mul)
    }

    pub fn div(a: Expr, b: Expr) -> Expr {
        Expr::binary(a, b, ExprKind::Div)
    }

    pub fn modulo(a: Expr, b: Expr) -> Expr {
        Expr::binary(a, b, ExprKind::Mod)
    }

    pub fn min(a: Expr, b: Expr) -> Expr {
        Expr::binary(a, b, ExprKind::Min)
    }

    pub fn max(a: Expr, b: Expr) -> Expr {
        Expr::binary(a, b, ExprKind::Max)
    }

    fn compare(a: Expr, b: Expr, make: fn(Expr, Expr) -> ExprKind) -> Expr {
        require_same_type(&a, &b);
        let ty = Type::BOOL.with_lanes(a.ty().lanes);
        Expr::new(ty, make(a, b))
    }

    pub fn eq(a: Expr, b: Expr) -> Expr {
        Expr::compare(a, b, ExprKind::Eq)
    }

    pub fn ne(a: Expr, b: Expr) -> Expr {
        Expr::compare(a, b, ExprKind::Ne)
    }

    pub fn lt(a: Expr, b: Expr) -> Expr {
        Expr::compare(a, b, ExprKind::Lt)
    }

    pub fn le(a: Expr, b: Expr) -> Expr {
        Expr::compare(a, b, ExprKind::Le)
    }

    pub fn gt(a: Expr, b: Expr) -> Expr {
        Expr::compare(a, b, ExprKind::Gt)
    }

    pub fn ge(a: Expr, b: Expr) -> Expr {
        Expr::compare(a, b, ExprKind::Ge)
    }

    pub fn and(a: Expr, b: Expr) -> Expr {
        require_bool(&a);
        Expr::binary(a, b, ExprKind::And)
    }

    pub fn or(a: Expr, b: Expr) -> Expr {
        require_bool(&a);
        Expr::binary(a, b, ExprKind::Or)
    }

    pub fn not(a: Expr) -> Expr {
        require_bool(&a);
        let ty = a.ty();
        Expr::new(ty, ExprKind::Not(a))
    }

    pub fn select(condition: Expr, true_value: Expr, false_value: Expr) -> Expr {
        require_bool(&condition);
        require_same_type(&true_value, &false_value);
        // A scalar condition may select between whole vectors.
        if !condition.ty().is_scalar() && condition.ty().lanes != true_value.ty().lanes {
            invalid(IrError::LaneMismatch {
                left: condition.ty().lanes,
                right: true_value.ty().lanes,
            });
        }
        let ty = true_value.ty();
        Expr::new(
            ty,
            ExprKind::Select {
                condition,
                true_value,
                false_value,
            },
        )
    }

    pub fn load(
        ty: Type,
        name: impl Into<String>,
        index: Expr,
        image: Option<String>,
        param: Option<String>,
    ) -> Expr {
        if !index.ty().is_int() && !index.ty().is_uint() {
            invalid(IrError::TypeMismatch {
                left: Type::I32.with_lanes(ty.lanes),
                right: index.ty(),
            });
        }
        if ty.lanes != index.ty().lanes {
            invalid(IrError::LaneMismatch {
                left: ty.lanes,
                right: index.ty().lanes,
            });
        }
        Expr::new(
            ty,
            ExprKind::Load {
                name: name.into(),
                index,
                image,
                param,
            },
        )
    }

    pub fn ramp(base: Expr, stride: Expr, lanes: u16) -> Expr {
        require_scalar(&base);
        require_scalar(&stride);
        require_same_type(&base, &stride);
        assert!(lanes > 1, "ramp of {lanes} lane(s)");
        let ty = base.ty().with_lanes(lanes);
        Expr::new(ty, ExprKind::Ramp { base, stride, lanes })
    }

    pub fn broadcast(value: Expr, lanes: u16) -> Expr {
        require_scalar(&value);
        assert!(lanes > 1, "broadcast of {lanes} lane(s)");
        let ty = value.ty().with_lanes(lanes);
        Expr::new(ty, ExprKind::Broadcast { value, lanes })
    }

    pub fn call(ty: Type, name: impl Into<String>, args: Vec<Expr>, call_type: CallType) -> Expr {
        Expr::new(
            ty,
            ExprKind::Call {
                name: name.into(),
                args,
                call_type,
            },
        )
    }

    pub fn let_in(name: impl Into<String>, value: Expr, body: Expr) -> Expr {
        let ty = body.ty();
        Expr::new(
            ty,
            ExprKind::Let {
                name: name.into(),
                value,
                body,
            },
        )
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.kind() {
            ExprKind::IntImm(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.kind() {
            ExprKind::FloatImm(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self.kind() {
            ExprKind::Variable(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_cast(&self) -> Option<&Expr> {
        match self.kind() {
            ExprKind::Cast(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_add(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::Add(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_sub(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::Sub(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_mul(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::Mul(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_div(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::Div(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_mod(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::Mod(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_min(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::Min(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_max(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::Max(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_eq(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::Eq(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_ne(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::Ne(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_lt(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::Lt(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_le(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::Le(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_gt(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::Gt(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_ge(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::Ge(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_and(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::And(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_or(&self) -> Option<(&Expr, &Expr)> {
        match self.kind() {
            ExprKind::Or(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_not(&self) -> Option<&Expr> {
        match self.kind() {
            ExprKind::Not(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_select(&self) -> Option<(&Expr, &Expr, &Expr)> {
        match self.kind() {
            ExprKind::Select {
                condition,
                true_value,
                false_value,
            } => Some((condition, true_value, false_value)),
            _ => None,
        }
    }

    pub fn as_ramp(&self) -> Option<(&Expr, &Expr, u16)> {
        match self.kind() {
            ExprKind::Ramp { base, stride, lanes } => Some((base, stride, *lanes)),
            _ => None,
        }
    }

    pub fn as_broadcast(&self) -> Option<(&Expr, u16)> {
        match self.kind() {
            ExprKind::Broadcast { value, lanes } => Some((value, *lanes)),
            _ => None,
        }
    }

    pub fn as_let(&self) -> Option<(&str, &Expr, &Expr)> {
        match self.kind() {
            ExprKind::Let { name, value, body } => Some((name, value, body)),
            _ => None,
        }
    }
}
