//! Variable substitution over expressions and statements.

use crate::expr::{Expr, ExprKind};
use crate::stmt::{Bound, Stmt, StmtKind};

/// Replaces free occurrences of the variable `name` in `e` with
/// `replacement`. Occurrences under a binder of the same name are left
/// alone. Returns the original handle when nothing was replaced.
pub fn substitute(name: &str, replacement: &Expr, e: &Expr) -> Expr {
    match e.kind() {
        ExprKind::IntImm(_) | ExprKind::FloatImm(_) => e.clone(),
        ExprKind::Variable(var) => {
            if var == name {
                replacement.clone()
            } else {
                e.clone()
            }
        }
        ExprKind::Cast(value) => {
            let v = substitute(name, replacement, value);
            if v.same_as(value) {
                e.clone()
            } else {
                Expr::cast(e.ty(), v)
            }
        }
        ExprKind::Add(a, b) => subst_binary(name, replacement, e, a, b, Expr::add),
        ExprKind::Sub(a, b) => subst_binary(name, replacement, e, a, b, Expr::sub),
        ExprKind::Mul(a, b) => subst_binary(name, replacement, e, a, b, Expr::mul),
        ExprKind::Div(a, b) => subst_binary(name, replacement, e, a, b, Expr::div),
        ExprKind::Mod(a, b) => subst_binary(name, replacement, e, a, b, Expr::modulo),
        ExprKind::Min(a, b) => subst_binary(name, replacement, e, a, b, Expr::min),
        ExprKind::Max(a, b) => subst_binary(name, replacement, e, a, b, Expr::max),
        ExprKind::Eq(a, b) => subst_binary(name, replacement, e, a, b, Expr::eq),
        ExprKind::Ne(a, b) => subst_binary(name, replacement, e, a, b, Expr::ne),
        ExprKind::Lt(a, b) => subst_binary(name, replacement, e, a, b, Expr::lt),
        ExprKind::Le(a, b) => subst_binary(name, replacement, e, a, b, Expr::le),
        ExprKind::Gt(a, b) => subst_binary(name, replacement, e, a, b, Expr::gt),
        ExprKind::Ge(a, b) => subst_binary(name, replacement, e, a, b, Expr::ge),
        ExprKind::And(a, b) => subst_binary(name, replacement, e, a, b, Expr::and),
        ExprKind::Or(a, b) => subst_binary(name, replacement, e, a, b, Expr::or),
        ExprKind::Not(a) => {
            let v = substitute(name, replacement, a);
            if v.same_as(a) {
                e.clone()
            } else {
                Expr::not(v)
            }
        }
        ExprKind::Select {
            condition,
            true_value,
            false_value,
        } => {
            let c = substitute(name, replacement, condition);
            let t = substitute(name, replacement, true_value);
            let f = substitute(name, replacement, false_value);
            if c.same_as(condition) && t.same_as(true_value) && f.same_as(false_value) {
                e.clone()
            } else {
                Expr::select(c, t, f)
            }
        }
        ExprKind::Load {
            name: buf,
            index,
            image,
            param,
        } => {
            let i = substitute(name, replacement, index);
            if i.same_as(index) {
                e.clone()
            } else {
                Expr::load(e.ty(), buf.clone(), i, image.clone(), param.clone())
            }
        }
        ExprKind::Ramp { base, stride, lanes } => {
            let b = substitute(name, replacement, base);
            let s = substitute(name, replacement, stride);
            if b.same_as(base) && s.same_as(stride) {
                e.clone()
            } else {
                Expr::ramp(b, s, *lanes)
            }
        }
        ExprKind::Broadcast { value, lanes } => {
            let v = substitute(name, replacement, value);
            if v.same_as(value) {
                e.clone()
            } else {
                Expr::broadcast(v, *lanes)
            }
        }
        ExprKind::Call {
            name: fn_name,
            args,
            call_type,
        } => {
            let new_args: Vec<Expr> = args
                .iter()
                .map(|a| substitute(name, replacement, a))
                .collect();
            if new_args.iter().zip(args).all(|(n, o)| n.same_as(o)) {
                e.clone()
            } else {
                Expr::call(e.ty(), fn_name.clone(), new_args, *call_type)
            }
        }
        ExprKind::Let {
            name: bound,
            value,
            body,
        } => {
            let v = substitute(name, replacement, value);
            let b = if bound == name {
                body.clone()
            } else {
                substitute(name, replacement, body)
            };
            if v.same_as(value) && b.same_as(body) {
                e.clone()
            } else {
                Expr::let_in(bound.clone(), v, b)
            }
        }
    }
}

fn subst_binary(
    name: &str,
    replacement: &Expr,
    e: &Expr,
    a: &Expr,
    b: &Expr,
    make: fn(Expr, Expr) -> Expr,
) -> Expr {
    let na = substitute(name, replacement, a);
    let nb = substitute(name, replacement, b);
    if na.same_as(a) && nb.same_as(b) {
        e.clone()
    } else {
        make(na, nb)
    }
}

/// Statement-level counterpart of [`substitute`].
pub fn substitute_in_stmt(name: &str, replacement: &Expr, s: &Stmt) -> Stmt {
    let sub = |e: &Expr| substitute(name, replacement, e);
    match s.kind() {
        StmtKind::LetStmt {
            name: bound,
            value,
            body,
        } => {
            let v = sub(value);
            let b = if bound == name {
                body.clone()
            } else {
                substitute_in_stmt(name, replacement, body)
            };
            if v.same_as(value) && b.same_as(body) {
                s.clone()
            } else {
                Stmt::let_stmt(bound.clone(), v, b)
            }
        }
        StmtKind::AssertStmt { condition, message } => {
            let c = sub(condition);
            if c.same_as(condition) {
                s.clone()
            } else {
                Stmt::assert_stmt(c, message.clone())
            }
        }
        StmtKind::Pipeline {
            name: stage,
            produce,
            update,
            consume,
        } => {
            let p = substitute_in_stmt(name, replacement, produce);
            let u = update
                .as_ref()
                .map(|u| substitute_in_stmt(name, replacement, u));
            let c = substitute_in_stmt(name, replacement, consume);
            let unchanged = p.same_as(produce)
                && c.same_as(consume)
                && match (&u, update) {
                    (Some(nu), Some(ou)) => nu.same_as(ou),
                    (None, None) => true,
                    _ => false,
                };
            if unchanged {
                s.clone()
            } else {
                Stmt::pipeline(stage.clone(), p, u, c)
            }
        }
        StmtKind::For {
            name: var,
            min,
            extent,
            kind,
            body,
        } => {
            let m = sub(min);
            let e = sub(extent);
            let b = if var == name {
                body.clone()
            } else {
                substitute_in_stmt(name, replacement, body)
            };
            if m.same_as(min) && e.same_as(extent) && b.same_as(body) {
                s.clone()
            } else {
                Stmt::for_loop(var.clone(), m, e, *kind, b)
            }
        }
        StmtKind::Store {
            name: buf,
            value,
            index,
        } => {
            let v = sub(value);
            let i = sub(index);
            if v.same_as(value) && i.same_as(index) {
                s.clone()
            } else {
                Stmt::store(buf.clone(), v, i)
            }
        }
        StmtKind::Provide {
            name: buf,
            values,
            args,
        } => {
            let nv: Vec<Expr> = values.iter().map(sub).collect();
            let na: Vec<Expr> = args.iter().map(sub).collect();
            if nv.iter().zip(values).all(|(n, o)| n.same_as(o))
                && na.iter().zip(args).all(|(n, o)| n.same_as(o))
            {
                s.clone()
            } else {
                Stmt::provide(buf.clone(), nv, na)
            }
        }
        StmtKind::Allocate {
            name: buf,
            ty,
            size,
            body,
        } => {
            let sz = sub(size);
            let b = substitute_in_stmt(name, replacement, body);
            if sz.same_as(size) && b.same_as(body) {
                s.clone()
            } else {
                Stmt::allocate(buf.clone(), *ty, sz, b)
            }
        }
        StmtKind::Realize {
            name: buf,
            types,
            bounds,
            body,
        } => {
            let nb: Vec<Bound> = bounds
                .iter()
                .map(|r| Bound {
                    min: sub(&r.min),
                    extent: sub(&r.extent),
                })
                .collect();
            let b = substitute_in_stmt(name, replacement, body);
            let unchanged = b.same_as(body)
                && nb
                    .iter()
                    .zip(bounds)
                    .all(|(n, o)| n.min.same_as(&o.min) && n.extent.same_as(&o.extent));
            if unchanged {
                s.clone()
            } else {
                Stmt::realize(buf.clone(), types.clone(), nb, b)
            }
        }
        StmtKind::Block { first, rest } => {
            let f = substitute_in_stmt(name, replacement, first);
            let r = rest.as_ref().map(|r| substitute_in_stmt(name, replacement, r));
            let unchanged = f.same_as(first)
                && match (&r, rest) {
                    (Some(nr), Some(or)) => nr.same_as(or),
                    (None, None) => true,
                    _ => false,
                };
            if unchanged {
                s.clone()
            } else {
                Stmt::block(f, r)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn x() -> Expr {
        Expr::var(Type::I32, "x")
    }

    fn y() -> Expr {
        Expr::var(Type::I32, "y")
    }

    #[test]
    fn replaces_free_occurrences() {
        let e = x() + y();
        let out = substitute("x", &Expr::int(3), &e);
        assert_eq!(out, Expr::int(3) + y());
    }

    #[test]
    fn shadowed_occurrences_survive() {
        let e = Expr::let_in("x", y() + 1, x() + 2);
        let out = substitute("x", &Expr::int(3), &e);
        // The bound body occurrence refers to the inner let, not ours.
        assert!(out.same_as(&e));
    }

    #[test]
    fn untouched_tree_keeps_identity() {
        let e = y() * 2 + 1;
        let out = substitute("x", &Expr::int(3), &e);
        assert!(out.same_as(&e));
    }

    #[test]
    fn substitutes_into_let_value_but_not_shadowed_body() {
        let e = Expr::let_in("x", x() + 1, x() * 2);
        let out = substitute("x", &Expr::int(5), &e);
        let (_, value, body) = out.as_let().unwrap();
        assert_eq!(value, &(Expr::int(5) + 1));
        assert_eq!(body, &(x() * 2));
    }
}
