//! Bottom-up algebraic simplification of expressions and statements.
//!
//! The traversal simplifies children first, then tries a chain of rewrite
//! rules on the rebuilt node. When no rule fires and no child changed, the
//! original node is returned by identity so that downstream passes can
//! fast-path on `same_as`. Three scopes are threaded through the walk:
//! substitution info for bindings being peeled, alignment facts for integer
//! bindings, and bounds for loop variables.

use log::trace;

use raster_analysis::{bounds_of_expr_in_scope, modulus_remainder, Interval, ModulusRemainder};
use raster_ir::arith::{div_imp, do_indirect_int_cast, int_cast_constant, mod_imp, mod_imp_f64};
use raster_ir::ops::{const_castint, const_float, const_int};
use raster_ir::{
    and, ge, is_const, is_const_value, is_negative_const, is_one, is_positive_const,
    is_simple_const, is_zero, le, lt, make_bool, make_const, make_one, make_zero, max, min, not,
    substitute, substitute_in_stmt, Bound, CallType, Expr, ExprKind, Scope, Stmt, StmtKind, Type,
};

/// Simplifies an expression. With `remove_dead_lets` set, bindings whose
/// names are unused after simplification of the body are stripped.
pub fn simplify(e: &Expr, remove_dead_lets: bool) -> Expr {
    Simplify::new(remove_dead_lets).mutate(e)
}

/// Statement-level counterpart of [`simplify`].
pub fn simplify_stmt(s: &Stmt, remove_dead_lets: bool) -> Stmt {
    Simplify::new(remove_dead_lets).mutate_stmt(s)
}

/// Wraps a folded value into the 32-bit signed range of an `IntImm`.
fn fold_i32(v: i64) -> i64 {
    int_cast_constant(Type::I32, v)
}

/// Recognizes `((a + c - 1) / c) * c` and yields `(a, c)`.
fn is_round_up(e: &Expr) -> Option<(Expr, i64)> {
    let (mul_a, mul_b) = e.as_mul()?;
    let factor = const_int(mul_b)?;
    let (div_a, div_b) = mul_a.as_div()?;
    if !is_const_value(div_b, factor) {
        return None;
    }
    let (add_a, add_b) = div_a.as_add()?;
    if !is_const_value(add_b, factor - 1) {
        return None;
    }
    Some((add_a.clone(), factor))
}

#[derive(Debug)]
struct VarInfo {
    replacement: Option<Expr>,
    old_uses: u32,
    new_uses: u32,
}

struct PeeledLet {
    value: Expr,
    new_name: String,
    new_value: Option<Expr>,
    replacement: Option<Expr>,
}

enum Peel {
    Done,
    Consume,
    Step {
        subst: Expr,
        next: Expr,
        scalar_var: Option<Expr>,
    },
}

struct Simplify {
    remove_dead_lets: bool,
    var_info: Scope<VarInfo>,
    alignment_info: Scope<ModulusRemainder>,
    bounds_info: Scope<Interval>,
}

impl Simplify {
    fn new(remove_dead_lets: bool) -> Self {
        Self {
            remove_dead_lets,
            var_info: Scope::new(),
            alignment_info: Scope::new(),
            bounds_info: Scope::new(),
        }
    }

    fn mutate(&mut self, e: &Expr) -> Expr {
        match e.kind() {
            ExprKind::IntImm(_) | ExprKind::FloatImm(_) => e.clone(),
            ExprKind::Variable(_) => self.visit_variable(e),
            ExprKind::Cast(_) => self.visit_cast(e),
            ExprKind::Add(..) => self.visit_add(e),
            ExprKind::Sub(..) => self.visit_sub(e),
            ExprKind::Mul(..) => self.visit_mul(e),
            ExprKind::Div(..) => self.visit_div(e),
            ExprKind::Mod(..) => self.visit_mod(e),
            ExprKind::Min(..) => self.visit_min(e),
            ExprKind::Max(..) => self.visit_max(e),
            ExprKind::Eq(..) => self.visit_eq(e),
            ExprKind::Ne(..) => self.visit_ne(e),
            ExprKind::Lt(..) => self.visit_lt(e),
            ExprKind::Le(..) => self.visit_le(e),
            ExprKind::Gt(..) => self.visit_gt(e),
            ExprKind::Ge(..) => self.visit_ge(e),
            ExprKind::And(..) => self.visit_and(e),
            ExprKind::Or(..) => self.visit_or(e),
            ExprKind::Not(_) => self.visit_not(e),
            ExprKind::Select { .. } => self.visit_select(e),
            ExprKind::Load { .. } => self.visit_load(e),
            ExprKind::Ramp { .. } => self.visit_ramp(e),
            ExprKind::Broadcast { .. } => self.visit_broadcast(e),
            ExprKind::Call { .. } => self.visit_call(e),
            ExprKind::Let { .. } => self.visit_let(e),
        }
    }

    fn visit_variable(&mut self, op: &Expr) -> Expr {
        let name = op.as_variable().unwrap();
        if let Some(info) = self.var_info.get_mut(name) {
            if let Some(replacement) = info.replacement.clone() {
                assert_eq!(
                    replacement.ty(),
                    op.ty(),
                    "substitution for {name} changes type"
                );
                info.new_uses += 1;
                return replacement;
            }
            info.old_uses += 1;
            return op.clone();
        }
        // Never saw a binding for this name: a pipeline parameter.
        op.clone()
    }

    fn visit_cast(&mut self, op: &Expr) -> Expr {
        let inner = op.as_cast().unwrap();
        let t = op.ty();
        let value = self.mutate(inner);
        if value.ty() == t {
            return value;
        }
        if t == Type::I32 {
            if let Some(f) = const_float(&value) {
                return Expr::int(f as i32 as i64);
            }
        }
        if t == Type::F32 {
            if let Some(i) = const_int(&value) {
                return Expr::float(i as f64);
            }
        }
        if t == Type::I32 {
            // Cast to something then back to a 32-bit int.
            if let Some(nested) = value.as_cast() {
                if let Some(i) = const_int(nested) {
                    return Expr::int(do_indirect_int_cast(value.ty(), i));
                }
            }
        }
        if !t.is_float() && t.bits <= 32 {
            // Normalize out-of-range immediates under narrow casts so later
            // pattern-matching sees canonical values.
            if let Some(i) = const_int(&value) {
                let canonical = do_indirect_int_cast(t, i);
                if canonical != i {
                    return Expr::cast(t, Expr::int(canonical));
                }
            }
        }
        if value.same_as(inner) {
            op.clone()
        } else {
            Expr::cast(t, value)
        }
    }

    fn visit_add(&mut self, op: &Expr) -> Expr {
        let (oa, ob) = op.as_add().unwrap();
        let mut a = self.mutate(oa);
        let mut b = self.mutate(ob);

        // Canonical operand order: constants right, min/max left.
        if is_simple_const(&a) && !is_simple_const(&b) {
            std::mem::swap(&mut a, &mut b);
        }
        if matches!(b.kind(), ExprKind::Min(..) | ExprKind::Max(..)) {
            std::mem::swap(&mut a, &mut b);
        }

        if let (Some(ia), Some(ib)) = (const_int(&a), const_int(&b)) {
            return Expr::int(fold_i32(ia.wrapping_add(ib)));
        }
        if let (Some(fa), Some(fb)) = (const_float(&a), const_float(&b)) {
            return Expr::float(fa + fb);
        }
        if is_zero(&b) {
            return a;
        }
        if is_zero(&a) {
            return b;
        }
        if let (Some(ia), Some(ib)) = (const_castint(&a), const_castint(&b)) {
            return make_const(op.ty(), ia.wrapping_add(ib));
        }

        if let (Some((ba, sa, w)), Some((bb, sb, _))) = (a.as_ramp(), b.as_ramp()) {
            return self.mutate(&Expr::ramp(ba.clone() + bb.clone(), sa.clone() + sb.clone(), w));
        }
        if let (Some((ba, sa, w)), Some((vb, _))) = (a.as_ramp(), b.as_broadcast()) {
            return self.mutate(&Expr::ramp(ba.clone() + vb.clone(), sa.clone(), w));
        }
        if let (Some((va, _)), Some((bb, sb, w))) = (a.as_broadcast(), b.as_ramp()) {
            return self.mutate(&Expr::ramp(va.clone() + bb.clone(), sb.clone(), w));
        }
        if let (Some((va, w)), Some((vb, _))) = (a.as_broadcast(), b.as_broadcast()) {
            return Expr::broadcast(self.mutate(&(va.clone() + vb.clone())), w);
        }

        // In ternary expressions, pull constants outside.
        if let Some((aa, ab)) = a.as_add() {
            if is_simple_const(ab) {
                if is_simple_const(&b) {
                    return self.mutate(&(aa.clone() + (ab.clone() + b.clone())));
                }
                return self.mutate(&((aa.clone() + b.clone()) + ab.clone()));
            }
        }
        if let Some((ba, bb)) = b.as_add() {
            if is_simple_const(bb) {
                return self.mutate(&((a.clone() + ba.clone()) + bb.clone()));
            }
        }
        if let Some((sa, sb)) = a.as_sub() {
            if is_simple_const(sa) && is_simple_const(&b) {
                return self.mutate(&((sa.clone() + b.clone()) - sb.clone()));
            }
        }

        // Additions that cancel an inner term.
        if let Some((sa, sb)) = a.as_sub() {
            if *sb == b {
                // (a - b) + b
                return sa.clone();
            }
        }
        if let Some((ba, bb)) = b.as_sub() {
            if *bb == a {
                // a + (b - a)
                return ba.clone();
            }
        }

        if let Some((ma, mb)) = a.as_min() {
            if let Some((s1, s2)) = mb.as_sub() {
                if *s2 == b {
                    // min(a, b-c) + c -> min(a+c, b)
                    return self.mutate(&min(ma.clone() + b.clone(), s1.clone()));
                }
            }
            if let Some((s1, s2)) = ma.as_sub() {
                if *s2 == b {
                    // min(a-c, b) + c -> min(a, b+c)
                    return self.mutate(&min(s1.clone(), mb.clone() + b.clone()));
                }
            }
        }
        if let Some((ma, mb)) = a.as_max() {
            if let Some((s1, s2)) = mb.as_sub() {
                if *s2 == b {
                    // max(a, b-c) + c -> max(a+c, b)
                    return self.mutate(&max(ma.clone() + b.clone(), s1.clone()));
                }
            }
            if let Some((s1, s2)) = ma.as_sub() {
                if *s2 == b {
                    // max(a-c, b) + c -> max(a, b+c)
                    return self.mutate(&max(s1.clone(), mb.clone() + b.clone()));
                }
            }
        }

        if let Some((ma, mb)) = a.as_min() {
            if let Some((p, q)) = mb.as_add() {
                if let (Some(ia), Some(ib)) = (const_int(q), const_int(&b)) {
                    if ia + ib == 0 {
                        // min(a, b + (-c)) + c -> min(a + c, b)
                        return self.mutate(&min(ma.clone() + b.clone(), p.clone()));
                    }
                }
            }
            if let Some((p, q)) = ma.as_add() {
                if let (Some(ia), Some(ib)) = (const_int(q), const_int(&b)) {
                    if ia + ib == 0 {
                        // min(a + (-c), b) + c -> min(a, b + c)
                        return self.mutate(&min(p.clone(), mb.clone() + b.clone()));
                    }
                }
            }
        }
        if let Some((ma, mb)) = a.as_max() {
            if let Some((p, q)) = mb.as_add() {
                if let (Some(ia), Some(ib)) = (const_int(q), const_int(&b)) {
                    if ia + ib == 0 {
                        // max(a, b + (-c)) + c -> max(a + c, b)
                        return self.mutate(&max(ma.clone() + b.clone(), p.clone()));
                    }
                }
            }
            if let Some((p, q)) = ma.as_add() {
                if let (Some(ia), Some(ib)) = (const_int(q), const_int(&b)) {
                    if ia + ib == 0 {
                        // max(a + (-c), b) + c -> max(a, b + c)
                        return self.mutate(&max(p.clone(), mb.clone() + b.clone()));
                    }
                }
            }
        }

        if let Some((da, db)) = a.as_div() {
            if let Some((na, nb)) = da.as_add() {
                if let (Some(ia), Some(ib), Some(ic)) =
                    (const_int(nb), const_int(db), const_int(&b))
                {
                    // ((a + ia) / ib + ic) -> (a + (ia + ib*ic)) / ib
                    return self.mutate(&((na.clone() + Expr::int(ia + ib * ic)) / Expr::int(ib)));
                }
            }
        }

        // Pull out common factors: a*x + b*x.
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_mul(), b.as_mul()) {
            if *a1 == *b1 {
                return self.mutate(&(a1.clone() * (a2.clone() + b2.clone())));
            }
            if *a2 == *b1 {
                return self.mutate(&(a2.clone() * (a1.clone() + b2.clone())));
            }
            if *a2 == *b2 {
                return self.mutate(&(a2.clone() * (a1.clone() + b1.clone())));
            }
            if *a1 == *b2 {
                return self.mutate(&(a1.clone() * (a2.clone() + b1.clone())));
            }
        }

        if let (Some((_, m2)), Some((_, n2))) = (a.as_mod(), b.as_mul()) {
            if *m2 == *n2 {
                // (x%3) + y*3 -> y*3 + x%3
                return self.mutate(&(b.clone() + a.clone()));
            }
        }
        if let (Some((ma1, ma2)), Some((mb1, mb2))) = (a.as_mul(), b.as_mod()) {
            if let Some((da, db)) = ma1.as_div() {
                if *ma2 == *db && *ma2 == *mb2 && *da == *mb1 {
                    // (x/3)*3 + x%3 -> x
                    return da.clone();
                }
            }
        }
        if let Some((aa, ab)) = a.as_add() {
            if let (Some((_, m2)), Some((_, k2))) = (aa.as_mul(), b.as_mod()) {
                if *m2 == *k2 {
                    // ((x*3) + y) + z%3 -> (x*3 + z%3) + y
                    return self.mutate(&((aa.clone() + b.clone()) + ab.clone()));
                }
            }
            if let (Some((_, m2)), Some((_, k2))) = (aa.as_mod(), b.as_mul()) {
                if *m2 == *k2 {
                    // ((x%3) + y) + z*3 -> (z*3 + x%3) + y
                    return self.mutate(&((b.clone() + aa.clone()) + ab.clone()));
                }
            }
            if let (Some((_, m2)), Some((_, k2))) = (ab.as_mul(), b.as_mod()) {
                if *m2 == *k2 {
                    // (y + (x*3)) + z%3 -> y + (x*3 + z%3)
                    return self.mutate(&(aa.clone() + (ab.clone() + b.clone())));
                }
            }
            if let (Some((_, m2)), Some((_, k2))) = (ab.as_mod(), b.as_mul()) {
                if *m2 == *k2 {
                    // (y + (x%3)) + z*3 -> y + (z*3 + x%3)
                    return self.mutate(&(aa.clone() + (b.clone() + ab.clone())));
                }
            }
        }

        if a.same_as(oa) && b.same_as(ob) {
            op.clone()
        } else {
            Expr::add(a, b)
        }
    }

    fn visit_sub(&mut self, op: &Expr) -> Expr {
        let (oa, ob) = op.as_sub().unwrap();
        let a = self.mutate(oa);
        let b = self.mutate(ob);

        if is_zero(&b) {
            return a;
        }
        if a == b {
            return make_zero(op.ty());
        }
        if let (Some(ia), Some(ib)) = (const_int(&a), const_int(&b)) {
            return Expr::int(fold_i32(ia.wrapping_sub(ib)));
        }
        if let (Some(fa), Some(fb)) = (const_float(&a), const_float(&b)) {
            return Expr::float(fa - fb);
        }
        if let Some(ib) = const_int(&b) {
            return self.mutate(&(a + Expr::int(fold_i32(-ib))));
        }
        if let Some(fb) = const_float(&b) {
            return self.mutate(&(a + Expr::float(-fb)));
        }
        if let (Some(ia), Some(ib)) = (const_castint(&a), const_castint(&b)) {
            return make_const(op.ty(), ia.wrapping_sub(ib));
        }

        if let (Some((ba, sa, w)), Some((bb, sb, _))) = (a.as_ramp(), b.as_ramp()) {
            return self.mutate(&Expr::ramp(ba.clone() - bb.clone(), sa.clone() - sb.clone(), w));
        }
        if let (Some((ba, sa, w)), Some((vb, _))) = (a.as_ramp(), b.as_broadcast()) {
            return self.mutate(&Expr::ramp(ba.clone() - vb.clone(), sa.clone(), w));
        }
        if let (Some((va, _)), Some((bb, sb, w))) = (a.as_broadcast(), b.as_ramp()) {
            return self.mutate(&Expr::ramp(
                va.clone() - bb.clone(),
                make_zero(sb.ty()) - sb.clone(),
                w,
            ));
        }
        if let (Some((va, w)), Some((vb, _))) = (a.as_broadcast(), b.as_broadcast()) {
            return Expr::broadcast(self.mutate(&(va.clone() - vb.clone())), w);
        }

        // Ternary expressions where a term cancels.
        if let Some((aa, ab)) = a.as_add() {
            if *ab == b {
                return aa.clone();
            }
            if *aa == b {
                return ab.clone();
            }
        }
        if let Some((ba, bb)) = b.as_add() {
            if *bb == a {
                return self.mutate(&(make_zero(ba.ty()) - ba.clone()));
            }
            if *ba == a {
                return self.mutate(&(make_zero(ba.ty()) - bb.clone()));
            }
        }

        // In ternary expressions, pull constants outside.
        if let Some((aa, ab)) = a.as_add() {
            if is_simple_const(ab) {
                if is_simple_const(&b) {
                    return self.mutate(&(aa.clone() + (ab.clone() - b.clone())));
                }
                return self.mutate(&((aa.clone() - b.clone()) + ab.clone()));
            }
        }
        if let Some((ba, bb)) = b.as_add() {
            if is_simple_const(bb) {
                return self.mutate(&((a.clone() - ba.clone()) - bb.clone()));
            }
        }
        if let Some((sa, sb)) = a.as_sub() {
            if is_simple_const(sa) && is_simple_const(&b) {
                return self.mutate(&((sa.clone() - b.clone()) - sb.clone()));
            }
        }
        if let Some((ba, bb)) = b.as_sub() {
            if is_simple_const(bb) {
                // a - (b - c) -> (a - b) + c, preferring (a + c) - b when a
                // is itself a constant.
                if is_simple_const(&a) {
                    return self.mutate(&((a.clone() + bb.clone()) - ba.clone()));
                }
                return self.mutate(&((a.clone() - ba.clone()) + bb.clone()));
            }
        }

        // Pull out common factors: a*x - b*x.
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_mul(), b.as_mul()) {
            if *a1 == *b1 {
                return self.mutate(&(a1.clone() * (a2.clone() - b2.clone())));
            }
            if *a2 == *b1 {
                return self.mutate(&(a2.clone() * (a1.clone() - b2.clone())));
            }
            if *a2 == *b2 {
                return self.mutate(&(a2.clone() * (a1.clone() - b1.clone())));
            }
            if *a1 == *b2 {
                return self.mutate(&(a1.clone() * (a2.clone() - b1.clone())));
            }
        }

        // Quaternary expressions where a term cancels.
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_add(), b.as_add()) {
            if *a2 == *b2 {
                // (a + b) - (c + b) -> a - c
                return self.mutate(&(a1.clone() - b1.clone()));
            }
            if *a1 == *b1 {
                // (a + b) - (a + c) -> b - c
                return self.mutate(&(a2.clone() - b2.clone()));
            }
            if *a1 == *b2 {
                // (a + b) - (c + a) -> b - c
                return self.mutate(&(a2.clone() - b1.clone()));
            }
            if *a2 == *b1 {
                // (b + a) - (a + c) -> b - c
                return self.mutate(&(a1.clone() - b2.clone()));
            }
        }
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_sub(), b.as_sub()) {
            if *a2 == *b2 {
                // (a - b) - (c - b) -> a - c
                return self.mutate(&(a1.clone() - b1.clone()));
            }
            if *a1 == *b1 {
                // (b - a) - (b - c) -> c - a
                return self.mutate(&(b2.clone() - a2.clone()));
            }
        }

        // Quaternary expressions involving mins where a term cancels. These
        // matter for the expressions bounds inference produces.
        if let Some((m1, m2)) = b.as_min() {
            if let Some((p, q)) = m1.as_add() {
                if a == *p {
                    // a - min(a + b, c) -> max(-b, a - c)
                    return self.mutate(&max(
                        make_zero(q.ty()) - q.clone(),
                        a.clone() - m2.clone(),
                    ));
                }
                if a == *q {
                    // a - min(b + a, c) -> max(-b, a - c)
                    return self.mutate(&max(
                        make_zero(p.ty()) - p.clone(),
                        a.clone() - m2.clone(),
                    ));
                }
            }
            if let Some((p, q)) = m2.as_add() {
                if a == *p {
                    // a - min(c, a + b) -> max(-b, a - c)
                    return self.mutate(&max(
                        make_zero(q.ty()) - q.clone(),
                        a.clone() - m1.clone(),
                    ));
                }
                if a == *q {
                    // a - min(c, b + a) -> max(-b, a - c)
                    return self.mutate(&max(
                        make_zero(p.ty()) - p.clone(),
                        a.clone() - m1.clone(),
                    ));
                }
            }
        }
        if let Some((m1, m2)) = a.as_min() {
            if let Some((p, q)) = m1.as_add() {
                if b == *p {
                    // min(a + b, c) - a -> min(b, c - a)
                    return self.mutate(&min(q.clone(), m2.clone() - b.clone()));
                }
                if b == *q {
                    // min(b + a, c) - a -> min(b, c - a)
                    return self.mutate(&min(p.clone(), m2.clone() - b.clone()));
                }
            }
            if let Some((p, q)) = m2.as_add() {
                if b == *p {
                    // min(c, a + b) - a -> min(b, c - a)
                    return self.mutate(&min(q.clone(), m1.clone() - b.clone()));
                }
                if b == *q {
                    // min(c, b + a) - a -> min(b, c - a)
                    return self.mutate(&min(p.clone(), m1.clone() - b.clone()));
                }
            }
        }

        if a.same_as(oa) && b.same_as(ob) {
            op.clone()
        } else {
            Expr::sub(a, b)
        }
    }

    fn visit_mul(&mut self, op: &Expr) -> Expr {
        let (oa, ob) = op.as_mul().unwrap();
        let mut a = self.mutate(oa);
        let mut b = self.mutate(ob);

        if is_simple_const(&a) {
            std::mem::swap(&mut a, &mut b);
        }

        if is_zero(&b) {
            return b;
        }
        if is_one(&b) {
            return a;
        }
        if let (Some(ia), Some(ib)) = (const_int(&a), const_int(&b)) {
            return Expr::int(fold_i32(ia.wrapping_mul(ib)));
        }
        if let (Some(fa), Some(fb)) = (const_float(&a), const_float(&b)) {
            return Expr::float(fa * fb);
        }
        if let (Some(ia), Some(ib)) = (const_castint(&a), const_castint(&b)) {
            return make_const(op.ty(), ia.wrapping_mul(ib));
        }
        if let (Some((va, w)), Some((vb, _))) = (a.as_broadcast(), b.as_broadcast()) {
            return Expr::broadcast(self.mutate(&(va.clone() * vb.clone())), w);
        }
        if let (Some((ba, sa, w)), Some((vb, _))) = (a.as_ramp(), b.as_broadcast()) {
            let m = vb.clone();
            return self.mutate(&Expr::ramp(ba.clone() * m.clone(), sa.clone() * m, w));
        }
        if let (Some((va, _)), Some((bb, sb, w))) = (a.as_broadcast(), b.as_ramp()) {
            let m = va.clone();
            return self.mutate(&Expr::ramp(m.clone() * bb.clone(), m * sb.clone(), w));
        }
        if let Some((aa, ab)) = a.as_add() {
            if is_simple_const(ab) && is_simple_const(&b) {
                return self.mutate(&(aa.clone() * b.clone() + ab.clone() * b.clone()));
            }
        }
        if let Some((ma, mb)) = a.as_mul() {
            if is_simple_const(mb) && is_simple_const(&b) {
                return self.mutate(&(ma.clone() * (mb.clone() * b.clone())));
            }
        }

        if a.same_as(oa) && b.same_as(ob) {
            op.clone()
        } else {
            Expr::mul(a, b)
        }
    }

    fn visit_div(&mut self, op: &Expr) -> Expr {
        let (oa, ob) = op.as_div().unwrap();
        let a = self.mutate(oa);
        let b = self.mutate(ob);

        // Bounded numerators divided by constant denominators collapse when
        // the whole range shares one quotient.
        if op.ty() == Type::I32 && !is_const(&a) {
            if let Some(ib) = const_int(&b) {
                if ib != 0 {
                    let bounds = bounds_of_expr_in_scope(&a, &self.bounds_info);
                    if let (Some(bmin), Some(bmax)) = (bounds.min, bounds.max) {
                        let bmin = self.mutate(&bmin);
                        let bmax = self.mutate(&bmax);
                        if let (Some(nmin), Some(nmax)) = (const_int(&bmin), const_int(&bmax)) {
                            if div_imp(nmax, ib) == div_imp(nmin, ib) {
                                return Expr::int(div_imp(nmax, ib));
                            }
                        }
                    }
                }
            }
        }

        if is_zero(&a) {
            return a;
        }
        if is_one(&b) {
            return a;
        }
        if a == b {
            return make_one(a.ty());
        }
        if let (Some(ia), Some(ib)) = (const_int(&a), const_int(&b)) {
            if ib != 0 {
                return Expr::int(div_imp(ia, ib));
            }
        }
        if let (Some(fa), Some(fb)) = (const_float(&a), const_float(&b)) {
            return Expr::float(fa / fb);
        }
        if let (Some(ia), Some(ib)) = (const_castint(&a), const_castint(&b)) {
            if ib != 0 {
                // Canonical unsigned values are non-negative, so plain
                // division is the unsigned quotient.
                let q = if op.ty().is_uint() { ia / ib } else { div_imp(ia, ib) };
                return make_const(op.ty(), q);
            }
        }
        if let (Some((va, w)), Some((vb, _))) = (a.as_broadcast(), b.as_broadcast()) {
            return self.mutate(&Expr::broadcast(va.clone() / vb.clone(), w));
        }
        if let (Some((base, stride, w)), Some((vb, _))) = (a.as_ramp(), b.as_broadcast()) {
            if let (Some(ib), Some(ia)) = (const_int(vb), const_int(stride)) {
                if ib != 0 && ia % ib == 0 {
                    // ramp(x, s, w) / broadcast(d, w) -> ramp(x/d, s/d, w)
                    return self.mutate(&Expr::ramp(
                        base.clone() / Expr::int(ib),
                        Expr::int(ia / ib),
                        w,
                    ));
                }
            }
            if let Some((m1, m2)) = base.as_mul() {
                if let (Some(ia), Some(ib), Some(ic)) =
                    (const_int(m2), const_int(vb), const_int(stride))
                {
                    if ia == ib && ic * i64::from(w - 1) < ia {
                        // ramp(x*a, s, w) / broadcast(a, w) -> broadcast(x, w)
                        return self.mutate(&Expr::broadcast(m1.clone(), w));
                    }
                    if ia != 0 && ib % ia == 0 && ic * i64::from(w - 1) < ia {
                        // ramp(x*a, s, w) / broadcast(d, w) -> broadcast(x/(d/a), w)
                        return self
                            .mutate(&Expr::broadcast(m1.clone() / Expr::int(ib / ia), w));
                    }
                }
            }
        }
        if let Some((da, db)) = a.as_div() {
            if let (Some(ia), Some(ib)) = (const_int(db), const_int(&b)) {
                // (x / c1) / c2 -> x / (c1*c2)
                return self.mutate(&(da.clone() / Expr::int(ia * ib)));
            }
        }
        if let Some((aa, ab)) = a.as_add() {
            if let Some((da, db)) = aa.as_div() {
                if let (Some(ia), Some(ib), Some(ic)) =
                    (const_int(db), const_int(ab), const_int(&b))
                {
                    // (x / c1 + c2) / c3 -> (x + c1*c2) / (c1*c3)
                    return self.mutate(&((da.clone() + Expr::int(ia * ib)) / Expr::int(ia * ic)));
                }
            }
        }
        if let Some((ma, mb)) = a.as_mul() {
            if let (Some(ia), Some(ib)) = (const_int(mb), const_int(&b)) {
                if ia != 0 && ib != 0 && (ia % ib == 0 || ib % ia == 0) {
                    if ia % ib == 0 {
                        // (x * 4) / 2 -> x * 2
                        return self.mutate(&(ma.clone() * Expr::int(ia / ib)));
                    }
                    // (x * 2) / 4 -> x / 2
                    return self.mutate(&(ma.clone() / Expr::int(ib / ia)));
                }
            }
        }
        if let Some((aa, ab)) = a.as_add() {
            if let Some((m1, m2)) = aa.as_mul() {
                if let (Some(ia), Some(ib)) = (const_int(m2), const_int(&b)) {
                    if ib != 0 && ia % ib == 0 {
                        // (x*4 + y) / 2 -> x*2 + y/2
                        return self
                            .mutate(&(m1.clone() * Expr::int(ia / ib) + ab.clone() / b.clone()));
                    }
                }
            }
            if let Some((m1, m2)) = ab.as_mul() {
                if let (Some(ia), Some(ib)) = (const_int(m2), const_int(&b)) {
                    if ib != 0 && ia % ib == 0 {
                        // (y + x*4) / 2 -> y/2 + x*2
                        return self
                            .mutate(&(aa.clone() / b.clone() + m1.clone() * Expr::int(ia / ib)));
                    }
                }
            }
        }
        if let Some((sa, sb)) = a.as_sub() {
            if let Some((m1, m2)) = sa.as_mul() {
                if let (Some(ia), Some(ib)) = (const_int(m2), const_int(&b)) {
                    if ib != 0 && ia % ib == 0 {
                        // (x*4 - y) / 2 -> x*2 - y/2
                        return self
                            .mutate(&(m1.clone() * Expr::int(ia / ib) - sb.clone() / b.clone()));
                    }
                }
            }
            if let Some((m1, m2)) = sb.as_mul() {
                if let (Some(ia), Some(ib)) = (const_int(m2), const_int(&b)) {
                    if ib != 0 && ia % ib == 0 {
                        // (y - x*4) / 2 -> y/2 - x*2
                        return self
                            .mutate(&(sa.clone() / b.clone() - m1.clone() * Expr::int(ia / ib)));
                    }
                }
            }
        }
        if b.ty().is_float() && is_simple_const(&b) {
            // x / 2.0 -> x * 0.5
            return self.mutate(&(a * (make_one(b.ty()) / b)));
        }

        if a.same_as(oa) && b.same_as(ob) {
            op.clone()
        } else {
            Expr::div(a, b)
        }
    }

    fn visit_mod(&mut self, op: &Expr) -> Expr {
        let (oa, ob) = op.as_mod().unwrap();
        let a = self.mutate(oa);
        let b = self.mutate(ob);

        // With a constant rhs, consult the bounds and alignment oracles.
        let mut mod_rem = ModulusRemainder::unknown();
        if a.ty() == Type::I32 {
            if let Some(ib) = const_int(&b) {
                if ib != 0 {
                    let bounds = bounds_of_expr_in_scope(&a, &self.bounds_info);
                    if let (Some(bmin), Some(bmax)) = (&bounds.min, &bounds.max) {
                        let in_range = and(
                            lt(bmax.clone(), b.clone()),
                            ge(bmin.clone(), Expr::int(0)),
                        );
                        if is_one(&self.mutate(&in_range)) {
                            return a;
                        }
                    }
                    mod_rem = modulus_remainder(&a, &self.alignment_info);
                }
            }
        }

        if let (Some(ia), Some(ib)) = (const_int(&a), const_int(&b)) {
            if ib != 0 {
                return Expr::int(mod_imp(ia, ib));
            }
        }
        if let (Some(fa), Some(fb)) = (const_float(&a), const_float(&b)) {
            return Expr::float(mod_imp_f64(fa, fb));
        }
        if let (Some(ia), Some(ib)) = (const_castint(&a), const_castint(&b)) {
            if ib != 0 {
                let r = if op.ty().is_uint() { ia % ib } else { mod_imp(ia, ib) };
                return make_const(op.ty(), r);
            }
        }
        if let (Some((va, w)), Some((vb, _))) = (a.as_broadcast(), b.as_broadcast()) {
            return self.mutate(&Expr::broadcast(va.clone() % vb.clone(), w));
        }
        if let Some((_, m2)) = a.as_mul() {
            if let (Some(ib), Some(ia)) = (const_int(&b), const_int(m2)) {
                if ib != 0 && ia % ib == 0 {
                    // (x * (b*k)) % b -> 0
                    return make_zero(a.ty());
                }
            }
        }
        if let Some((aa, ab)) = a.as_add() {
            if let Some((_, m2)) = aa.as_mul() {
                if let (Some(ia), Some(ib)) = (const_int(m2), const_int(&b)) {
                    if ib != 0 && ia % ib == 0 {
                        // (x * (b*k) + y) % b -> y % b
                        return self.mutate(&(ab.clone() % Expr::int(ib)));
                    }
                }
            }
            if let Some((_, m2)) = ab.as_mul() {
                if let (Some(ia), Some(ib)) = (const_int(m2), const_int(&b)) {
                    if ib != 0 && ia % ib == 0 {
                        // (y + x * (b*k)) % b -> y % b
                        return self.mutate(&(aa.clone() % Expr::int(ib)));
                    }
                }
            }
        }
        if let Some(ib) = const_int(&b) {
            if a.ty() == Type::I32 && ib != 0 && mod_rem.modulus % ib == 0 {
                // The alignment oracle pins the residue.
                return Expr::int(mod_imp(mod_rem.remainder, ib));
            }
        }
        if let (Some((base, stride, w)), Some((vb, _))) = (a.as_ramp(), b.as_broadcast()) {
            if let (Some(ia), Some(ib)) = (const_int(stride), const_int(vb)) {
                if ib != 0 && ia % ib == 0 {
                    // ramp(x, s*b, w) % broadcast(b, w) -> broadcast(x%b, w)
                    return self.mutate(&Expr::broadcast(base.clone() % Expr::int(ib), w));
                }
            }
        }

        if a.same_as(oa) && b.same_as(ob) {
            op.clone()
        } else {
            Expr::modulo(a, b)
        }
    }

    fn visit_min(&mut self, op: &Expr) -> Expr {
        let (oa, ob) = op.as_min().unwrap();
        let mut a = self.mutate(oa);
        let mut b = self.mutate(ob);

        if is_simple_const(&a) && !is_simple_const(&b) {
            std::mem::swap(&mut a, &mut b);
        }

        if a == b {
            return a;
        }
        if let (Some(ia), Some(ib)) = (const_int(&a), const_int(&b)) {
            return Expr::int(ia.min(ib));
        }
        if let (Some(fa), Some(fb)) = (const_float(&a), const_float(&b)) {
            return Expr::float(fa.min(fb));
        }
        if let (Some(ia), Some(ib)) = (const_castint(&a), const_castint(&b)) {
            return make_const(op.ty(), ia.min(ib));
        }
        if let Some(ib) = const_castint(&b) {
            if ib == b.ty().imax() {
                // min of anything and the type's maximum.
                return a;
            }
            if ib == b.ty().imin() {
                return b;
            }
        }
        if let (Some((va, w)), Some((vb, _))) = (a.as_broadcast(), b.as_broadcast()) {
            return self.mutate(&Expr::broadcast(min(va.clone(), vb.clone()), w));
        }
        if op.ty() == Type::I32 && is_simple_const(&b) {
            // Remove pointless mins that splitting introduces.
            let bounds = bounds_of_expr_in_scope(&a, &self.bounds_info);
            if let Some(bmax) = &bounds.max {
                if is_one(&self.mutate(&le(bmax.clone(), b.clone()))) {
                    return a;
                }
            }
            if let Some(bmin) = &bounds.min {
                if is_one(&self.mutate(&ge(bmin.clone(), b.clone()))) {
                    return b;
                }
            }
        }

        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_add(), b.as_add()) {
            if let (Some(ia), Some(ib)) = (const_int(a2), const_int(b2)) {
                if *a1 == *b1 {
                    // min(x + 3, x - 2) -> x - 2
                    return if ia > ib { b.clone() } else { a.clone() };
                }
            }
        }
        if let Some((a1, a2)) = a.as_add() {
            if let Some(ia) = const_int(a2) {
                if *a1 == b {
                    // min(x + 5, x) -> x
                    return if ia > 0 { b.clone() } else { a.clone() };
                }
            }
        }
        if let Some((b1, b2)) = b.as_add() {
            if let Some(ib) = const_int(b2) {
                if *b1 == a {
                    // min(x, x + 5) -> x
                    return if ib > 0 { a.clone() } else { b.clone() };
                }
            }
        }
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_sub(), b.as_sub()) {
            if *a2 == *b2 {
                if let (Some(ia), Some(ib)) = (const_int(a1), const_int(b1)) {
                    // min(100 - x, 101 - x) -> 100 - x
                    return if ia < ib { a.clone() } else { b.clone() };
                }
            }
        }

        let a_round_up = is_round_up(&a);
        let b_round_up = is_round_up(&b);
        if let Some((e, factor)) = &a_round_up {
            if *e == b {
                // min(((a + 3)/4)*4, a) -> a
                return b;
            }
            if let Some((m1, m2)) = b.as_max() {
                if *e == *m1 && m2.as_int() == Some(*factor) {
                    // min(((a + 3)/4)*4, max(a, 4)) -> max(a, 4)
                    return b;
                }
            }
        }
        if let Some((e, factor)) = &b_round_up {
            if *e == a {
                // min(a, ((a + 3)/4)*4) -> a
                return a;
            }
            if let Some((m1, m2)) = a.as_max() {
                if *e == *m1 && m2.as_int() == Some(*factor) {
                    // min(max(a, 4), ((a + 3)/4)*4) -> max(a, 4)
                    return a;
                }
            }
        }

        if let Some((m1, m2)) = a.as_max() {
            if *m2 == b || *m1 == b {
                // min(max(x, y), y) -> y
                return b;
            }
        }
        if let Some((m1, m2)) = b.as_max() {
            if *m1 == a || *m2 == a {
                // min(x, max(x, y)) -> x
                return a;
            }
        }
        if let Some((m1, m2)) = a.as_min() {
            if is_simple_const(m2) && is_simple_const(&b) {
                // min(min(x, 4), 5) -> min(x, 4)
                let folded = self.mutate(&min(m2.clone(), b.clone()));
                return Expr::min(m1.clone(), folded);
            }
            if *m2 == b || *m1 == b {
                // min(min(x, y), y) -> min(x, y)
                return a.clone();
            }
        }
        if let Some((m1, m2)) = b.as_min() {
            if *m2 == a || *m1 == a {
                // min(y, min(x, y)) -> min(x, y)
                return b.clone();
            }
        }
        // Deeper idempotent nestings.
        if let Some((m1, _)) = a.as_min() {
            if let Some((_, n2)) = m1.as_min() {
                if *n2 == b {
                    // min(min(min(x, y), z), y) -> min(min(x, y), z)
                    return a.clone();
                }
            }
        }
        if let Some((m1, _)) = a.as_min() {
            if let Some((n1, _)) = m1.as_min() {
                if let Some((_, p2)) = n1.as_min() {
                    if *p2 == b {
                        return a.clone();
                    }
                }
            }
        }
        if let Some((m1, _)) = a.as_min() {
            if let Some((n1, _)) = m1.as_min() {
                if let Some((p1, _)) = n1.as_min() {
                    if let Some((_, q2)) = p1.as_min() {
                        if *q2 == b {
                            return a.clone();
                        }
                    }
                }
            }
        }

        // Distributive law for min/max.
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_max(), b.as_max()) {
            if *a1 == *b1 {
                // min(max(x, y), max(x, z)) -> max(min(y, z), x)
                return self.mutate(&max(min(a2.clone(), b2.clone()), a1.clone()));
            }
            if *a1 == *b2 {
                return self.mutate(&max(min(a2.clone(), b1.clone()), a1.clone()));
            }
            if *a2 == *b1 {
                return self.mutate(&max(min(a1.clone(), b2.clone()), a2.clone()));
            }
            if *a2 == *b2 {
                return self.mutate(&max(min(a1.clone(), b1.clone()), a2.clone()));
            }
        }
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_min(), b.as_min()) {
            if *a1 == *b1 {
                // min(min(x, y), min(x, z)) -> min(min(y, z), x)
                return self.mutate(&min(min(a2.clone(), b2.clone()), a1.clone()));
            }
            if *a1 == *b2 {
                return self.mutate(&min(min(a2.clone(), b1.clone()), a1.clone()));
            }
            if *a2 == *b1 {
                return self.mutate(&min(min(a1.clone(), b2.clone()), a2.clone()));
            }
            if *a2 == *b2 {
                return self.mutate(&min(min(a1.clone(), b1.clone()), a2.clone()));
            }
        }

        // Min of two clamps of the same thing.
        if let (Some((ma, mb)), Some((na, nb))) = (a.as_max(), b.as_max()) {
            if let (Some((x1, z)), Some((x2, w))) = (ma.as_min(), na.as_min()) {
                if *x1 == *x2 {
                    // min(max(min(x, z), y), max(min(x, w), v))
                    //   -> max(min(x, min(z, w)), min(y, v))
                    return self.mutate(&max(
                        min(x1.clone(), min(z.clone(), w.clone())),
                        min(mb.clone(), nb.clone()),
                    ));
                }
            }
        }

        // Distributive law for addition.
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_add(), b.as_add()) {
            if *a2 == *b2 {
                // min(a + b, c + b) -> min(a, c) + b
                return self.mutate(&min(a1.clone(), b1.clone())) + a2.clone();
            }
            if *a1 == *b1 {
                return self.mutate(&min(a2.clone(), b2.clone())) + a1.clone();
            }
            if *a1 == *b2 {
                return self.mutate(&min(a2.clone(), b1.clone())) + a1.clone();
            }
            if *a2 == *b1 {
                return self.mutate(&min(a1.clone(), b2.clone())) + a2.clone();
            }
        }

        // Distributive law over division by a matching constant.
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_div(), b.as_div()) {
            if let (Some(ia), Some(ib)) = (const_int(a2), const_int(b2)) {
                if ia == ib {
                    if ia > 0 {
                        // min(a / 4, b / 4) -> min(a, b) / 4
                        return self.mutate(&(min(a1.clone(), b1.clone()) / Expr::int(ia)));
                    }
                    return self.mutate(&(max(a1.clone(), b1.clone()) / Expr::int(ia)));
                }
            }
        }

        if a.same_as(oa) && b.same_as(ob) {
            op.clone()
        } else {
            Expr::min(a, b)
        }
    }

    fn visit_max(&mut self, op: &Expr) -> Expr {
        let (oa, ob) = op.as_max().unwrap();
        let mut a = self.mutate(oa);
        let mut b = self.mutate(ob);

        if is_simple_const(&a) && !is_simple_const(&b) {
            std::mem::swap(&mut a, &mut b);
        }

        if a == b {
            return a;
        }
        if let (Some(ia), Some(ib)) = (const_int(&a), const_int(&b)) {
            return Expr::int(ia.max(ib));
        }
        if let (Some(fa), Some(fb)) = (const_float(&a), const_float(&b)) {
            return Expr::float(fa.max(fb));
        }
        if let (Some(ia), Some(ib)) = (const_castint(&a), const_castint(&b)) {
            return make_const(op.ty(), ia.max(ib));
        }
        if let Some(ib) = const_castint(&b) {
            if ib == b.ty().imin() {
                // max of anything and the type's minimum.
                return a;
            }
            if ib == b.ty().imax() {
                return b;
            }
        }
        if let (Some((va, w)), Some((vb, _))) = (a.as_broadcast(), b.as_broadcast()) {
            return self.mutate(&Expr::broadcast(max(va.clone(), vb.clone()), w));
        }
        if op.ty() == Type::I32 && is_simple_const(&b) {
            let bounds = bounds_of_expr_in_scope(&a, &self.bounds_info);
            if let Some(bmin) = &bounds.min {
                if is_one(&self.mutate(&ge(bmin.clone(), b.clone()))) {
                    return a;
                }
            }
            if let Some(bmax) = &bounds.max {
                if is_one(&self.mutate(&le(bmax.clone(), b.clone()))) {
                    return b;
                }
            }
        }

        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_add(), b.as_add()) {
            if let (Some(ia), Some(ib)) = (const_int(a2), const_int(b2)) {
                if *a1 == *b1 {
                    // max(x + 3, x - 2) -> x + 3
                    return if ia > ib { a.clone() } else { b.clone() };
                }
            }
        }
        if let Some((a1, a2)) = a.as_add() {
            if let Some(ia) = const_int(a2) {
                if *a1 == b {
                    // max(x + 5, x) -> x + 5
                    return if ia > 0 { a.clone() } else { b.clone() };
                }
            }
        }
        if let Some((b1, b2)) = b.as_add() {
            if let Some(ib) = const_int(b2) {
                if *b1 == a {
                    // max(x, x + 5) -> x + 5
                    return if ib > 0 { b.clone() } else { a.clone() };
                }
            }
        }
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_sub(), b.as_sub()) {
            if *a2 == *b2 {
                if let (Some(ia), Some(ib)) = (const_int(a1), const_int(b1)) {
                    // max(100 - x, 101 - x) -> 101 - x
                    return if ia > ib { a.clone() } else { b.clone() };
                }
            }
        }

        if let Some((m1, m2)) = a.as_min() {
            if *m2 == b || *m1 == b {
                // max(min(x, y), y) -> y
                return b;
            }
        }
        if let Some((m1, m2)) = b.as_min() {
            if *m1 == a || *m2 == a {
                // max(x, min(x, y)) -> x
                return a;
            }
        }
        if let Some((m1, m2)) = a.as_max() {
            if is_simple_const(m2) && is_simple_const(&b) {
                // max(max(x, 4), 5) -> max(x, 5)
                let folded = self.mutate(&max(m2.clone(), b.clone()));
                return Expr::max(m1.clone(), folded);
            }
            if *m2 == b || *m1 == b {
                // max(max(x, y), y) -> max(x, y)
                return a.clone();
            }
        }
        if let Some((m1, m2)) = b.as_max() {
            if *m2 == a || *m1 == a {
                // max(y, max(x, y)) -> max(x, y)
                return b.clone();
            }
        }
        if let Some((m1, _)) = a.as_max() {
            if let Some((_, n2)) = m1.as_max() {
                if *n2 == b {
                    // max(max(max(x, y), z), y) -> max(max(x, y), z)
                    return a.clone();
                }
            }
        }
        if let Some((m1, _)) = a.as_max() {
            if let Some((n1, _)) = m1.as_max() {
                if let Some((_, p2)) = n1.as_max() {
                    if *p2 == b {
                        return a.clone();
                    }
                }
            }
        }
        if let Some((m1, _)) = a.as_max() {
            if let Some((n1, _)) = m1.as_max() {
                if let Some((p1, _)) = n1.as_max() {
                    if let Some((_, q2)) = p1.as_max() {
                        if *q2 == b {
                            return a.clone();
                        }
                    }
                }
            }
        }

        // Distributive law for min/max.
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_max(), b.as_max()) {
            if *a1 == *b1 {
                // max(max(x, y), max(x, z)) -> max(max(y, z), x)
                return self.mutate(&max(max(a2.clone(), b2.clone()), a1.clone()));
            }
            if *a1 == *b2 {
                return self.mutate(&max(max(a2.clone(), b1.clone()), a1.clone()));
            }
            if *a2 == *b1 {
                return self.mutate(&max(max(a1.clone(), b2.clone()), a2.clone()));
            }
            if *a2 == *b2 {
                return self.mutate(&max(max(a1.clone(), b1.clone()), a2.clone()));
            }
        }
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_min(), b.as_min()) {
            if *a1 == *b1 {
                // max(min(x, y), min(x, z)) -> min(max(y, z), x)
                return self.mutate(&min(max(a2.clone(), b2.clone()), a1.clone()));
            }
            if *a1 == *b2 {
                return self.mutate(&min(max(a2.clone(), b1.clone()), a1.clone()));
            }
            if *a2 == *b1 {
                return self.mutate(&min(max(a1.clone(), b2.clone()), a2.clone()));
            }
            if *a2 == *b2 {
                return self.mutate(&min(max(a1.clone(), b1.clone()), a2.clone()));
            }
        }

        // Max of two clamps of the same thing.
        if let (Some((ma, mb)), Some((na, nb))) = (a.as_max(), b.as_max()) {
            if let (Some((x1, z)), Some((x2, w))) = (ma.as_min(), na.as_min()) {
                if *x1 == *x2 {
                    // max(max(min(x, z), y), max(min(x, w), v))
                    //   -> max(min(x, max(z, w)), max(y, v))
                    return self.mutate(&max(
                        min(x1.clone(), max(z.clone(), w.clone())),
                        max(mb.clone(), nb.clone()),
                    ));
                }
            }
        }

        // Distributive law for addition.
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_add(), b.as_add()) {
            if *a2 == *b2 {
                // max(a + b, c + b) -> max(a, c) + b
                return self.mutate(&max(a1.clone(), b1.clone())) + a2.clone();
            }
            if *a1 == *b1 {
                return self.mutate(&max(a2.clone(), b2.clone())) + a1.clone();
            }
            if *a1 == *b2 {
                return self.mutate(&max(a2.clone(), b1.clone())) + a1.clone();
            }
            if *a2 == *b1 {
                return self.mutate(&max(a1.clone(), b2.clone())) + a2.clone();
            }
        }

        // Distributive law over division by a matching constant.
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_div(), b.as_div()) {
            if let (Some(ia), Some(ib)) = (const_int(a2), const_int(b2)) {
                if ia == ib {
                    if ia > 0 {
                        // max(a / 4, b / 4) -> max(a, b) / 4
                        return self.mutate(&(max(a1.clone(), b1.clone()) / Expr::int(ia)));
                    }
                    return self.mutate(&(min(a1.clone(), b1.clone()) / Expr::int(ia)));
                }
            }
        }

        if a.same_as(oa) && b.same_as(ob) {
            op.clone()
        } else {
            Expr::max(a, b)
        }
    }

    fn visit_eq(&mut self, op: &Expr) -> Expr {
        let (oa, ob) = op.as_eq().unwrap();
        let a = self.mutate(oa);
        let b = self.mutate(ob);
        let delta = self.mutate(&(a.clone() - b.clone()));
        let lanes = op.ty().lanes;

        if let (Some(ia), Some(ib)) = (const_castint(&a), const_castint(&b)) {
            return make_bool(ia == ib, lanes);
        }
        if is_zero(&delta) {
            return make_bool(true, lanes);
        }
        let ramp_a = a.as_ramp().is_some();
        let ramp_b = b.as_ramp().is_some();
        if is_simple_const(&delta) && (ramp_a == ramp_b) {
            return make_bool(false, lanes);
        }
        if is_simple_const(&a) && !is_simple_const(&b) {
            // Constants on the right.
            return self.mutate(&Expr::eq(b, a));
        }
        if let (Some((va, w)), Some((vb, _))) = (a.as_broadcast(), b.as_broadcast()) {
            // Push broadcasts outwards.
            return self.mutate(&Expr::broadcast(Expr::eq(va.clone(), vb.clone()), w));
        }
        if let (Some((ba, sa, w)), Some((bb, sb, _))) = (a.as_ramp(), b.as_ramp()) {
            if *sa == *sb {
                // Ramps with matching stride compare base-wise.
                return self.mutate(&Expr::broadcast(Expr::eq(ba.clone(), bb.clone()), w));
            }
        }
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_add(), b.as_add()) {
            // Subtract a shared term from both sides.
            if *a1 == *b1 {
                return self.mutate(&Expr::eq(a2.clone(), b2.clone()));
            }
            if *a1 == *b2 {
                return self.mutate(&Expr::eq(a2.clone(), b1.clone()));
            }
            if *a2 == *b1 {
                return self.mutate(&Expr::eq(a1.clone(), b2.clone()));
            }
            if *a2 == *b2 {
                return self.mutate(&Expr::eq(a1.clone(), b1.clone()));
            }
        }
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_sub(), b.as_sub()) {
            if *a1 == *b1 {
                return self.mutate(&Expr::eq(a2.clone(), b2.clone()));
            }
            if *a2 == *b2 {
                return self.mutate(&Expr::eq(a1.clone(), b1.clone()));
            }
        }
        if let Some((a1, a2)) = a.as_add() {
            // Move additions to the rhs.
            return self.mutate(&Expr::eq(a1.clone(), b.clone() - a2.clone()));
        }
        if let Some((a1, a2)) = a.as_sub() {
            return self.mutate(&Expr::eq(a1.clone(), b.clone() + a2.clone()));
        }
        if let Some((b1, b2)) = b.as_add() {
            if *b1 == a {
                return self.mutate(&Expr::eq(make_zero(b2.ty()), b2.clone()));
            }
            if *b2 == a {
                return self.mutate(&Expr::eq(make_zero(b1.ty()), b1.clone()));
            }
        }
        if let Some((b1, b2)) = b.as_sub() {
            if *b1 == a {
                return self.mutate(&Expr::eq(make_zero(b2.ty()), b2.clone()));
            }
        }
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_mul(), b.as_mul()) {
            if is_simple_const(a2) && is_simple_const(b2) && *a2 == *b2 && !is_zero(a2) {
                // Divide both sides by a non-zero constant.
                return self.mutate(&Expr::eq(a1.clone(), b1.clone()));
            }
        }

        if a.same_as(oa) && b.same_as(ob) {
            op.clone()
        } else {
            Expr::eq(a, b)
        }
    }

    fn visit_ne(&mut self, op: &Expr) -> Expr {
        let (a, b) = op.as_ne().unwrap();
        self.mutate(&not(Expr::eq(a.clone(), b.clone())))
    }

    fn visit_lt(&mut self, op: &Expr) -> Expr {
        let (oa, ob) = op.as_lt().unwrap();
        let a = self.mutate(oa);
        let b = self.mutate(ob);
        let delta = self.mutate(&(a.clone() - b.clone()));
        let lanes = op.ty().lanes;

        if let (Some(ia), Some(ib)) = (const_castint(&a), const_castint(&b)) {
            // Canonical values make this the right comparison for both
            // signed and unsigned operands.
            return make_bool(ia < ib, lanes);
        }
        if let Some(ia) = const_castint(&a) {
            if ia == a.ty().imax() {
                // The type's maximum is never less than anything.
                return make_bool(false, lanes);
            }
        }
        if let Some(ib) = const_castint(&b) {
            if ib == b.ty().imin() {
                // Nothing is ever less than the type's minimum.
                return make_bool(false, lanes);
            }
        }
        if is_zero(&delta) || is_positive_const(&delta) {
            return make_bool(false, lanes);
        }
        if is_negative_const(&delta) {
            return make_bool(true, lanes);
        }
        if let (Some((va, w)), Some((vb, _))) = (a.as_broadcast(), b.as_broadcast()) {
            return self.mutate(&Expr::broadcast(Expr::lt(va.clone(), vb.clone()), w));
        }
        if let (Some((ba, sa, w)), Some((bb, sb, _))) = (a.as_ramp(), b.as_ramp()) {
            if *sa == *sb {
                return self.mutate(&Expr::broadcast(Expr::lt(ba.clone(), bb.clone()), w));
            }
        }
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_add(), b.as_add()) {
            if *a1 == *b1 {
                return self.mutate(&Expr::lt(a2.clone(), b2.clone()));
            }
            if *a1 == *b2 {
                return self.mutate(&Expr::lt(a2.clone(), b1.clone()));
            }
            if *a2 == *b1 {
                return self.mutate(&Expr::lt(a1.clone(), b2.clone()));
            }
            if *a2 == *b2 {
                return self.mutate(&Expr::lt(a1.clone(), b1.clone()));
            }
        }
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_sub(), b.as_sub()) {
            if *a1 == *b1 {
                return self.mutate(&Expr::lt(b2.clone(), a2.clone()));
            }
            if *a2 == *b2 {
                return self.mutate(&Expr::lt(a1.clone(), b1.clone()));
            }
        }
        if let Some((a1, a2)) = a.as_add() {
            // Move additions to the rhs.
            return self.mutate(&Expr::lt(a1.clone(), b.clone() - a2.clone()));
        }
        if let Some((a1, a2)) = a.as_sub() {
            return self.mutate(&Expr::lt(a1.clone(), b.clone() + a2.clone()));
        }
        if let Some((b1, b2)) = b.as_add() {
            if *b1 == a {
                return self.mutate(&Expr::lt(make_zero(b2.ty()), b2.clone()));
            }
            if *b2 == a {
                return self.mutate(&Expr::lt(make_zero(b1.ty()), b1.clone()));
            }
            if let (Some(ia), Some(ib)) = (const_int(&a), const_int(b2)) {
                // c1 < x + c2 -> c1 - c2 < x
                return self.mutate(&Expr::lt(Expr::int(ia - ib), b1.clone()));
            }
        }
        if let Some((b1, b2)) = b.as_sub() {
            if *b1 == a {
                return self.mutate(&Expr::lt(b2.clone(), make_zero(b2.ty())));
            }
        }
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_mul(), b.as_mul()) {
            if is_positive_const(a2) && is_positive_const(b2) && *a2 == *b2 {
                // Divide both sides by a positive constant.
                return self.mutate(&Expr::lt(a1.clone(), b1.clone()));
            }
        }

        if a.same_as(oa) && b.same_as(ob) {
            op.clone()
        } else {
            Expr::lt(a, b)
        }
    }

    fn visit_le(&mut self, op: &Expr) -> Expr {
        let (a, b) = op.as_le().unwrap();
        self.mutate(&not(Expr::lt(b.clone(), a.clone())))
    }

    fn visit_gt(&mut self, op: &Expr) -> Expr {
        let (a, b) = op.as_gt().unwrap();
        self.mutate(&Expr::lt(b.clone(), a.clone()))
    }

    fn visit_ge(&mut self, op: &Expr) -> Expr {
        let (a, b) = op.as_ge().unwrap();
        self.mutate(&not(Expr::lt(a.clone(), b.clone())))
    }

    fn visit_and(&mut self, op: &Expr) -> Expr {
        let (oa, ob) = op.as_and().unwrap();
        let a = self.mutate(oa);
        let b = self.mutate(ob);

        if is_one(&a) {
            return b;
        }
        if is_one(&b) {
            return a;
        }
        if is_zero(&a) {
            return a;
        }
        if is_zero(&b) {
            return b;
        }
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_le(), b.as_le()) {
            if *a1 == *b1 {
                // (x <= a && x <= b) -> x <= min(a, b)
                return self.mutate(&le(a1.clone(), min(a2.clone(), b2.clone())));
            }
            if *a2 == *b2 {
                // (a <= x && b <= x) -> max(a, b) <= x
                return self.mutate(&le(max(a1.clone(), b1.clone()), a2.clone()));
            }
        }
        if let (Some((a1, a2)), Some((b1, b2))) = (a.as_lt(), b.as_lt()) {
            if *a1 == *b1 {
                // (x < a && x < b) -> x < min(a, b)
                return self.mutate(&lt(a1.clone(), min(a2.clone(), b2.clone())));
            }
            if *a2 == *b2 {
                // (a < x && b < x) -> max(a, b) < x
                return self.mutate(&lt(max(a1.clone(), b1.clone()), a2.clone()));
            }
        }
        if a == b {
            return a;
        }

        if a.same_as(oa) && b.same_as(ob) {
            op.clone()
        } else {
            Expr::and(a, b)
        }
    }

    fn visit_or(&mut self, op: &Expr) -> Expr {
        let (oa, ob) = op.as_or().unwrap();
        let a = self.mutate(oa);
        let b = self.mutate(ob);

        if is_one(&a) {
            return a;
        }
        if is_one(&b) {
            return b;
        }
        if is_zero(&a) {
            return b;
        }
        if is_zero(&b) {
            return a;
        }
        if a == b {
            return a;
        }

        if a.same_as(oa) && b.same_as(ob) {
            op.clone()
        } else {
            Expr::or(a, b)
        }
    }

    fn visit_not(&mut self, op: &Expr) -> Expr {
        let oa = op.as_not().unwrap();
        let a = self.mutate(oa);

        if is_one(&a) {
            return make_zero(a.ty());
        }
        if is_zero(&a) {
            return make_one(a.ty());
        }
        if let Some(inner) = a.as_not() {
            // Double negatives cancel.
            return inner.clone();
        }
        if let Some((x, y)) = a.as_le() {
            return Expr::lt(y.clone(), x.clone());
        }
        if let Some((x, y)) = a.as_ge() {
            return Expr::lt(x.clone(), y.clone());
        }
        if let Some((x, y)) = a.as_lt() {
            return Expr::le(y.clone(), x.clone());
        }
        if let Some((x, y)) = a.as_gt() {
            return Expr::le(x.clone(), y.clone());
        }
        if let Some((x, y)) = a.as_ne() {
            return Expr::eq(x.clone(), y.clone());
        }
        if let Some((x, y)) = a.as_eq() {
            return Expr::ne(x.clone(), y.clone());
        }
        if let Some((v, w)) = a.as_broadcast() {
            return self.mutate(&Expr::broadcast(not(v.clone()), w));
        }

        if a.same_as(oa) {
            op.clone()
        } else {
            Expr::not(a)
        }
    }

    fn visit_select(&mut self, op: &Expr) -> Expr {
        let (oc, ot, of) = op.as_select().unwrap();
        let condition = self.mutate(oc);
        let true_value = self.mutate(ot);
        let false_value = self.mutate(of);

        if is_one(&condition) {
            return true_value;
        }
        if is_zero(&condition) {
            return false_value;
        }
        if true_value == false_value {
            return true_value;
        }
        if let Some((v, _)) = condition.as_broadcast() {
            // A uniform vector condition is a scalar choice.
            return self.mutate(&Expr::select(v.clone(), true_value, false_value));
        }
        if let Some((x, y)) = condition.as_ne() {
            // select(a != b, c, d) -> select(a == b, d, c)
            return self.mutate(&Expr::select(
                Expr::eq(x.clone(), y.clone()),
                false_value,
                true_value,
            ));
        }
        if let Some((x, y)) = condition.as_le() {
            // select(a <= b, c, d) -> select(b < a, d, c)
            return self.mutate(&Expr::select(
                Expr::lt(y.clone(), x.clone()),
                false_value,
                true_value,
            ));
        }

        if condition.same_as(oc) && true_value.same_as(ot) && false_value.same_as(of) {
            op.clone()
        } else {
            Expr::select(condition, true_value, false_value)
        }
    }

    fn visit_load(&mut self, op: &Expr) -> Expr {
        let ExprKind::Load {
            name,
            index,
            image,
            param,
        } = op.kind()
        else {
            unreachable!()
        };
        // A load at a uniform index is a broadcast of a scalar load.
        let new_index = self.mutate(index);
        if let Some((v, w)) = new_index.as_broadcast() {
            let scalar = Expr::load(
                op.ty().element_of(),
                name.clone(),
                v.clone(),
                image.clone(),
                param.clone(),
            );
            return Expr::broadcast(scalar, w);
        }
        if new_index.same_as(index) {
            op.clone()
        } else {
            Expr::load(op.ty(), name.clone(), new_index, image.clone(), param.clone())
        }
    }

    fn visit_ramp(&mut self, op: &Expr) -> Expr {
        let (base, stride, lanes) = op.as_ramp().unwrap();
        let new_base = self.mutate(base);
        let new_stride = self.mutate(stride);
        if new_base.same_as(base) && new_stride.same_as(stride) {
            op.clone()
        } else {
            Expr::ramp(new_base, new_stride, lanes)
        }
    }

    fn visit_broadcast(&mut self, op: &Expr) -> Expr {
        let (value, lanes) = op.as_broadcast().unwrap();
        let new_value = self.mutate(value);
        if new_value.same_as(value) {
            op.clone()
        } else {
            Expr::broadcast(new_value, lanes)
        }
    }

    fn visit_call(&mut self, op: &Expr) -> Expr {
        let ExprKind::Call {
            name,
            args,
            call_type,
        } = op.kind()
        else {
            unreachable!()
        };
        // Buffer-reading calls implicitly depend on the mins and strides of
        // the buffer they index.
        if matches!(call_type, CallType::Image | CallType::Halide) {
            for i in 0..args.len() {
                self.record_buffer_use(&format!("{name}.stride.{i}"));
                self.record_buffer_use(&format!("{name}.min.{i}"));
            }
        }
        let new_args: Vec<Expr> = args.iter().map(|arg| self.mutate(arg)).collect();
        if new_args.iter().zip(args).all(|(n, o)| n.same_as(o)) {
            op.clone()
        } else {
            Expr::call(op.ty(), name.clone(), new_args, *call_type)
        }
    }

    fn record_buffer_use(&mut self, name: &str) {
        if let Some(info) = self.var_info.get_mut(name) {
            info.old_uses += 1;
        }
    }

    /// Simplifies a binding's value and iteratively peels its outer
    /// structure, accumulating the replacement to substitute for the name.
    fn peel_let(&mut self, name: &str, value0: &Expr) -> PeeledLet {
        assert!(
            !self.var_info.contains(name),
            "simplification requires unique binder names, found a nested {name:?}"
        );

        let value = self.mutate(value0);
        let new_name = format!("{name}.s");
        let mut new_var = Expr::var(value.ty(), &new_name);
        let mut replacement = new_var.clone();
        let mut new_value = value.clone();
        let mut consumed = false;

        trace!("simplify let {name} = {value}");

        loop {
            let action = match new_value.kind() {
                _ if is_const(&new_value) => Peel::Consume,
                ExprKind::Variable(_) => Peel::Consume,
                ExprKind::Add(a, b) if is_const(b) || b.as_variable().is_some() => Peel::Step {
                    subst: Expr::add(new_var.clone(), b.clone()),
                    next: a.clone(),
                    scalar_var: None,
                },
                ExprKind::Mul(a, b) if is_const(b) || b.as_variable().is_some() => Peel::Step {
                    subst: Expr::mul(new_var.clone(), b.clone()),
                    next: a.clone(),
                    scalar_var: None,
                },
                ExprKind::Div(a, b) if is_const(b) => Peel::Step {
                    subst: Expr::div(new_var.clone(), b.clone()),
                    next: a.clone(),
                    scalar_var: None,
                },
                ExprKind::Sub(a, b) if is_const(b) || b.as_variable().is_some() => Peel::Step {
                    subst: Expr::sub(new_var.clone(), b.clone()),
                    next: a.clone(),
                    scalar_var: None,
                },
                ExprKind::Mod(a, b) if is_const(b) => Peel::Step {
                    subst: Expr::modulo(new_var.clone(), b.clone()),
                    next: a.clone(),
                    scalar_var: None,
                },
                ExprKind::Ramp { base, stride, lanes } if is_const(stride) => {
                    let scalar = Expr::var(new_value.ty().element_of(), &new_name);
                    Peel::Step {
                        subst: Expr::ramp(scalar.clone(), stride.clone(), *lanes),
                        next: base.clone(),
                        scalar_var: Some(scalar),
                    }
                }
                ExprKind::Broadcast { value: v, lanes } => {
                    let scalar = Expr::var(new_value.ty().element_of(), &new_name);
                    Peel::Step {
                        subst: Expr::broadcast(scalar.clone(), *lanes),
                        next: v.clone(),
                        scalar_var: Some(scalar),
                    }
                }
                _ => Peel::Done,
            };
            match action {
                Peel::Consume => {
                    replacement = substitute(&new_name, &new_value, &replacement);
                    consumed = true;
                    break;
                }
                Peel::Step {
                    subst,
                    next,
                    scalar_var,
                } => {
                    if let Some(scalar) = scalar_var {
                        new_var = scalar;
                    }
                    replacement = substitute(&new_name, &subst, &replacement);
                    new_value = next;
                }
                Peel::Done => break,
            }
        }

        let (new_value, replacement) = if consumed {
            (None, Some(replacement))
        } else if new_value.same_as(&value) {
            // Nothing peeled off; keep the binding opaque.
            (None, None)
        } else {
            trace!("new let {new_name} = {new_value} with replacement {replacement}");
            (Some(new_value), Some(replacement))
        };

        PeeledLet {
            value,
            new_name,
            new_value,
            replacement,
        }
    }

    fn visit_let(&mut self, op: &Expr) -> Expr {
        let (name, value0, body0) = op.as_let().unwrap();
        let PeeledLet {
            value,
            new_name,
            new_value,
            replacement,
        } = self.peel_let(name, value0);

        self.var_info.push(
            name,
            VarInfo {
                replacement,
                old_uses: 0,
                new_uses: 0,
            },
        );

        let mut new_value_tracked = false;
        if let Some(nv) = &new_value {
            if nv.ty() == Type::I32 {
                let mr = modulus_remainder(nv, &self.alignment_info);
                self.alignment_info.push(&new_name, mr);
                new_value_tracked = true;
            }
        }
        let mut value_tracked = false;
        if value.ty() == Type::I32 {
            let mr = modulus_remainder(&value, &self.alignment_info);
            self.alignment_info.push(name, mr);
            value_tracked = true;
        }

        let body = self.mutate(body0);

        if value_tracked {
            self.alignment_info.pop(name);
        }
        if new_value_tracked {
            self.alignment_info.pop(&new_name);
        }
        let info = self.var_info.pop(name);

        let mut result = body;
        if let Some(nv) = new_value {
            if info.new_uses > 0 {
                result = Expr::let_in(&new_name, nv, result);
            }
        }
        if info.old_uses > 0 || !self.remove_dead_lets {
            result = Expr::let_in(name, value, result);
        }

        if let Some((rname, rvalue, rbody)) = result.as_let() {
            if rname == name && rvalue.same_as(value0) && rbody.same_as(body0) {
                return op.clone();
            }
        }
        result
    }

    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        match s.kind() {
            StmtKind::LetStmt { .. } => self.visit_let_stmt(s),
            StmtKind::AssertStmt { .. } => self.visit_assert(s),
            StmtKind::Pipeline { .. } => self.visit_pipeline(s),
            StmtKind::For { .. } => self.visit_for(s),
            StmtKind::Store { .. } => self.visit_store(s),
            StmtKind::Provide { .. } => self.visit_provide(s),
            StmtKind::Allocate { .. } => self.visit_allocate(s),
            StmtKind::Realize { .. } => self.visit_realize(s),
            StmtKind::Block { .. } => self.visit_block(s),
        }
    }

    fn visit_let_stmt(&mut self, op: &Stmt) -> Stmt {
        let StmtKind::LetStmt {
            name,
            value: value0,
            body: body0,
        } = op.kind()
        else {
            unreachable!()
        };
        let PeeledLet {
            value,
            new_name,
            new_value,
            replacement,
        } = self.peel_let(name, value0);

        self.var_info.push(
            name,
            VarInfo {
                replacement,
                old_uses: 0,
                new_uses: 0,
            },
        );

        let mut new_value_tracked = false;
        if let Some(nv) = &new_value {
            if nv.ty() == Type::I32 {
                let mr = modulus_remainder(nv, &self.alignment_info);
                self.alignment_info.push(&new_name, mr);
                new_value_tracked = true;
            }
        }
        let mut value_tracked = false;
        if value.ty() == Type::I32 {
            let mr = modulus_remainder(&value, &self.alignment_info);
            self.alignment_info.push(name, mr);
            value_tracked = true;
        }

        let body = self.mutate_stmt(body0);

        if value_tracked {
            self.alignment_info.pop(name);
        }
        if new_value_tracked {
            self.alignment_info.pop(&new_name);
        }
        let info = self.var_info.pop(name);

        let mut result = body;
        if let Some(nv) = new_value {
            if info.new_uses > 0 {
                result = Stmt::let_stmt(&new_name, nv, result);
            }
        }
        if info.old_uses > 0 || !self.remove_dead_lets {
            result = Stmt::let_stmt(name, value, result);
        }

        if let StmtKind::LetStmt {
            name: rname,
            value: rvalue,
            body: rbody,
        } = result.kind()
        {
            if rname == name && rvalue.same_as(value0) && rbody.same_as(body0) {
                return op.clone();
            }
        }
        result
    }

    fn visit_assert(&mut self, op: &Stmt) -> Stmt {
        let StmtKind::AssertStmt { condition, message } = op.kind() else {
            unreachable!()
        };
        let new_condition = self.mutate(condition);
        if is_const_value(&new_condition, 0) {
            log::error!("this pipeline is guaranteed to fail an assertion at runtime:\n{op}");
            panic!("assertion {message:?} is provably false");
        }
        if new_condition.same_as(condition) {
            op.clone()
        } else {
            Stmt::assert_stmt(new_condition, message.clone())
        }
    }

    fn visit_pipeline(&mut self, op: &Stmt) -> Stmt {
        let StmtKind::Pipeline {
            name,
            produce,
            update,
            consume,
        } = op.kind()
        else {
            unreachable!()
        };
        let new_produce = self.mutate_stmt(produce);
        let new_update = update.as_ref().map(|u| self.mutate_stmt(u));
        let new_consume = self.mutate_stmt(consume);
        let unchanged = new_produce.same_as(produce)
            && new_consume.same_as(consume)
            && match (&new_update, update) {
                (Some(n), Some(o)) => n.same_as(o),
                (None, None) => true,
                _ => false,
            };
        if unchanged {
            op.clone()
        } else {
            Stmt::pipeline(name.clone(), new_produce, new_update, new_consume)
        }
    }

    fn visit_for(&mut self, op: &Stmt) -> Stmt {
        let StmtKind::For {
            name,
            min: min0,
            extent: extent0,
            kind,
            body: body0,
        } = op.kind()
        else {
            unreachable!()
        };
        let new_min = self.mutate(min0);
        let new_extent = self.mutate(extent0);

        // Literal loop bounds become facts about the loop variable.
        let bounds_tracked =
            if let (Some(mn), Some(ex)) = (new_min.as_int(), new_extent.as_int()) {
                let interval =
                    Interval::new(Some(new_min.clone()), Some(Expr::int(mn + ex - 1)));
                self.bounds_info.push(name, interval);
                true
            } else {
                false
            };

        let new_body = self.mutate_stmt(body0);

        if bounds_tracked {
            self.bounds_info.pop(name);
        }

        if new_min.same_as(min0) && new_extent.same_as(extent0) && new_body.same_as(body0) {
            op.clone()
        } else {
            Stmt::for_loop(name.clone(), new_min, new_extent, *kind, new_body)
        }
    }

    fn visit_store(&mut self, op: &Stmt) -> Stmt {
        let StmtKind::Store { name, value, index } = op.kind() else {
            unreachable!()
        };
        let new_value = self.mutate(value);
        let new_index = self.mutate(index);
        if new_value.same_as(value) && new_index.same_as(index) {
            op.clone()
        } else {
            Stmt::store(name.clone(), new_value, new_index)
        }
    }

    fn visit_provide(&mut self, op: &Stmt) -> Stmt {
        let StmtKind::Provide { name, values, args } = op.kind() else {
            unreachable!()
        };
        // Provides implicitly depend on the buffer's mins and strides.
        for i in 0..args.len() {
            self.record_buffer_use(&format!("{name}.stride.{i}"));
            self.record_buffer_use(&format!("{name}.min.{i}"));
        }
        let new_values: Vec<Expr> = values.iter().map(|v| self.mutate(v)).collect();
        let new_args: Vec<Expr> = args.iter().map(|a| self.mutate(a)).collect();
        let unchanged = new_values.iter().zip(values).all(|(n, o)| n.same_as(o))
            && new_args.iter().zip(args).all(|(n, o)| n.same_as(o));
        if unchanged {
            op.clone()
        } else {
            Stmt::provide(name.clone(), new_values, new_args)
        }
    }

    fn visit_allocate(&mut self, op: &Stmt) -> Stmt {
        let StmtKind::Allocate {
            name,
            ty,
            size,
            body,
        } = op.kind()
        else {
            unreachable!()
        };
        let new_size = self.mutate(size);
        let new_body = self.mutate_stmt(body);
        if new_size.same_as(size) && new_body.same_as(body) {
            op.clone()
        } else {
            Stmt::allocate(name.clone(), *ty, new_size, new_body)
        }
    }

    fn visit_realize(&mut self, op: &Stmt) -> Stmt {
        let StmtKind::Realize {
            name,
            types,
            bounds,
            body,
        } = op.kind()
        else {
            unreachable!()
        };
        let new_bounds: Vec<Bound> = bounds
            .iter()
            .map(|r| Bound {
                min: self.mutate(&r.min),
                extent: self.mutate(&r.extent),
            })
            .collect();
        let new_body = self.mutate_stmt(body);
        let unchanged = new_body.same_as(body)
            && new_bounds
                .iter()
                .zip(bounds)
                .all(|(n, o)| n.min.same_as(&o.min) && n.extent.same_as(&o.extent));
        if unchanged {
            op.clone()
        } else {
            Stmt::realize(name.clone(), types.clone(), new_bounds, new_body)
        }
    }

    fn visit_block(&mut self, op: &Stmt) -> Stmt {
        let StmtKind::Block {
            first: first0,
            rest: rest0,
        } = op.kind()
        else {
            unreachable!()
        };
        let first = self.mutate_stmt(first0);
        let Some(rest0) = rest0 else {
            return first;
        };
        let rest = self.mutate_stmt(rest0);

        // A passing assert is a no-op.
        if let StmtKind::AssertStmt { condition, .. } = first.kind() {
            if is_const_value(condition, 1) {
                return rest;
            }
        }

        // Unrolling leaves adjacent bindings of the same value; merge them.
        if let (
            StmtKind::LetStmt {
                name: n1,
                value: v1,
                body: b1,
            },
            StmtKind::LetStmt {
                name: n2,
                value: v2,
                body: b2,
            },
        ) = (first.kind(), rest.kind())
        {
            if v1 == v2 {
                let mut merged =
                    self.mutate_stmt(&Stmt::block(b1.clone(), Some(b2.clone())));
                if n2 != n1 {
                    merged = substitute_in_stmt(n2, &Expr::var(v1.ty(), n1.clone()), &merged);
                }
                return Stmt::let_stmt(n1.clone(), v1.clone(), merged);
            }
        }

        if first.same_as(first0) && rest.same_as(rest0) {
            op.clone()
        } else {
            Stmt::block(first, Some(rest))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::var(Type::I32, "x")
    }

    fn y() -> Expr {
        Expr::var(Type::I32, "y")
    }

    #[test]
    fn constants_move_right() {
        assert_eq!(simplify(&(Expr::int(3) + x()), true), x() + 3);
    }

    #[test]
    fn fixed_points_keep_identity() {
        let e = x() + y();
        let out = simplify(&e, true);
        assert!(out.same_as(&e));
        let s = Stmt::store("buf", x(), y());
        let out = simplify_stmt(&s, true);
        assert!(out.same_as(&s));
    }

    #[test]
    fn round_up_recognition() {
        let e = ((x() + 7) / 8) * 8;
        let (base, factor) = is_round_up(&simplify(&e, true)).expect("round up");
        assert_eq!(base, x());
        assert_eq!(factor, 8);
    }

    #[test]
    fn dead_lets_are_kept_without_flag() {
        let e = Expr::let_in("t", x() + 1, Expr::int(4));
        assert_eq!(simplify(&e, true), Expr::int(4));
        let kept = simplify(&e, false);
        assert!(kept.as_let().is_some());
    }

    #[test]
    #[should_panic(expected = "provably false")]
    fn false_assert_aborts() {
        let s = Stmt::assert_stmt(raster_ir::const_false(1), "unreachable width");
        let _ = simplify_stmt(&s, true);
    }

    #[test]
    fn block_drops_passing_assert() {
        let store = Stmt::store("buf", x(), Expr::int(0));
        let s = Stmt::block(
            Stmt::assert_stmt(raster_ir::const_true(1), "ok"),
            Some(store.clone()),
        );
        assert!(simplify_stmt(&s, true).same_as(&store));
    }

    #[test]
    fn for_loop_bounds_feed_division() {
        // i in [0, 10): i / 16 is always 0.
        let body = Stmt::store(
            "buf",
            Expr::var(Type::I32, "i") / 16,
            Expr::int(0),
        );
        let s = Stmt::for_loop("i", Expr::int(0), Expr::int(10), raster_ir::ForKind::Serial, body);
        let out = simplify_stmt(&s, true);
        let StmtKind::For { body, .. } = out.kind() else {
            panic!("expected For, got {out}");
        };
        let StmtKind::Store { value, .. } = body.kind() else {
            panic!("expected Store, got {body}");
        };
        assert_eq!(value.as_int(), Some(0));
    }
}
