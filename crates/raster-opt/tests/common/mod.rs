//! Shared helpers for property tests: a deterministic generator and a
//! reference evaluator for scalar integer expressions.

use std::collections::HashMap;

use raster_ir::arith::{div_imp, do_indirect_int_cast, int_cast_constant, mod_imp};
use raster_ir::{Expr, ExprKind, Type};

/// A small multiplicative congruential generator; deterministic across runs.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(2862933555777941757).wrapping_add(3037000493))
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    /// A value in `[lo, hi)`.
    pub fn range(&mut self, lo: i64, hi: i64) -> i64 {
        lo + (self.next_u32() as i64) % (hi - lo)
    }
}

pub const VARS: [&str; 3] = ["x", "y", "z"];

fn var(name: &str) -> Expr {
    Expr::var(Type::I32, name)
}

/// A random scalar i32 expression over the shared variables.
///
/// Sticks to the exactly-evaluable rule families: add, sub, mul, min, max,
/// and selects over comparisons. Constants are kept small so wrapping never
/// kicks in at the generated depths.
pub fn gen_expr(rng: &mut Lcg, depth: u32) -> Expr {
    if depth == 0 {
        return match rng.range(0, 2) {
            0 => Expr::int(rng.range(-20, 21)),
            _ => var(VARS[rng.range(0, VARS.len() as i64) as usize]),
        };
    }
    match rng.range(0, 7) {
        0 => gen_expr(rng, depth - 1) + gen_expr(rng, depth - 1),
        1 => gen_expr(rng, depth - 1) - gen_expr(rng, depth - 1),
        2 => gen_expr(rng, depth - 1) * Expr::int(rng.range(-4, 5)),
        3 => raster_ir::min(gen_expr(rng, depth - 1), gen_expr(rng, depth - 1)),
        4 => raster_ir::max(gen_expr(rng, depth - 1), gen_expr(rng, depth - 1)),
        5 => raster_ir::select(
            raster_ir::lt(gen_expr(rng, depth - 1), gen_expr(rng, depth - 1)),
            gen_expr(rng, depth - 1),
            gen_expr(rng, depth - 1),
        ),
        _ => gen_expr(rng, depth - 1),
    }
}

/// A random environment for the shared variables.
pub fn gen_env(rng: &mut Lcg) -> HashMap<String, i64> {
    VARS.iter()
        .map(|v| (v.to_string(), rng.range(-100, 101)))
        .collect()
}

/// Reference interpreter for scalar expressions. `None` means the expression
/// evaluates something outside the supported subset.
pub fn eval(e: &Expr, env: &HashMap<String, i64>) -> Option<i64> {
    let value = match e.kind() {
        ExprKind::IntImm(v) => *v,
        ExprKind::Variable(name) => *env.get(name)?,
        ExprKind::Cast(inner) => {
            let t = e.ty();
            let v = eval(inner, env)?;
            if t == Type::BOOL {
                do_indirect_int_cast(t, v)
            } else if t.is_int() || t.is_uint() {
                int_cast_constant(t, v)
            } else {
                return None;
            }
        }
        ExprKind::Add(a, b) => wrap32(eval(a, env)?.wrapping_add(eval(b, env)?)),
        ExprKind::Sub(a, b) => wrap32(eval(a, env)?.wrapping_sub(eval(b, env)?)),
        ExprKind::Mul(a, b) => wrap32(eval(a, env)?.wrapping_mul(eval(b, env)?)),
        ExprKind::Div(a, b) => {
            let d = eval(b, env)?;
            if d == 0 {
                return None;
            }
            wrap32(div_imp(eval(a, env)?, d))
        }
        ExprKind::Mod(a, b) => {
            let d = eval(b, env)?;
            if d == 0 {
                return None;
            }
            wrap32(mod_imp(eval(a, env)?, d))
        }
        ExprKind::Min(a, b) => eval(a, env)?.min(eval(b, env)?),
        ExprKind::Max(a, b) => eval(a, env)?.max(eval(b, env)?),
        ExprKind::Eq(a, b) => i64::from(eval(a, env)? == eval(b, env)?),
        ExprKind::Ne(a, b) => i64::from(eval(a, env)? != eval(b, env)?),
        ExprKind::Lt(a, b) => i64::from(eval(a, env)? < eval(b, env)?),
        ExprKind::Le(a, b) => i64::from(eval(a, env)? <= eval(b, env)?),
        ExprKind::Gt(a, b) => i64::from(eval(a, env)? > eval(b, env)?),
        ExprKind::Ge(a, b) => i64::from(eval(a, env)? >= eval(b, env)?),
        ExprKind::And(a, b) => i64::from(eval(a, env)? != 0 && eval(b, env)? != 0),
        ExprKind::Or(a, b) => i64::from(eval(a, env)? != 0 || eval(b, env)? != 0),
        ExprKind::Not(a) => i64::from(eval(a, env)? == 0),
        ExprKind::Select {
            condition,
            true_value,
            false_value,
        } => {
            if eval(condition, env)? != 0 {
                eval(true_value, env)?
            } else {
                eval(false_value, env)?
            }
        }
        ExprKind::Let { name, value, body } => {
            let v = eval(value, env)?;
            let mut inner = env.clone();
            inner.insert(name.clone(), v);
            return eval(body, &inner);
        }
        _ => return None,
    };
    Some(value)
}

fn wrap32(v: i64) -> i64 {
    int_cast_constant(Type::I32, v)
}
