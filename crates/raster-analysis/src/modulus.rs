//! Modulus/remainder (alignment) analysis.
//!
//! For an integer expression, derives a pair `(m, r)` with `m >= 1` and
//! `0 <= r < m` such that the expression is congruent to `r` modulo `m`.
//! `(1, 0)` means nothing is known. The result is always sound; it is not
//! required to be the tightest such pair.

use raster_ir::{Expr, ExprKind, Scope};

/// An alignment fact: the expression is `r` plus a multiple of `m`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ModulusRemainder {
    pub modulus: i64,
    pub remainder: i64,
}

impl ModulusRemainder {
    pub const fn new(modulus: i64, remainder: i64) -> Self {
        Self { modulus, remainder }
    }

    /// The fact that holds for every integer.
    pub const fn unknown() -> Self {
        Self {
            modulus: 1,
            remainder: 0,
        }
    }
}

/// Normalizes a candidate pair into the `m >= 1`, `0 <= r < m` form.
fn reduce(modulus: i64, remainder: i64) -> ModulusRemainder {
    if modulus <= 1 {
        ModulusRemainder::unknown()
    } else {
        ModulusRemainder::new(modulus, remainder.rem_euclid(modulus))
    }
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Computes the alignment of `e` given alignments for variables in scope.
pub fn modulus_remainder(e: &Expr, scope: &Scope<ModulusRemainder>) -> ModulusRemainder {
    let mut analyzer = Analyzer {
        scope,
        locals: Scope::new(),
    };
    analyzer.analyze(e)
}

struct Analyzer<'a> {
    scope: &'a Scope<ModulusRemainder>,
    locals: Scope<ModulusRemainder>,
}

impl Analyzer<'_> {
    fn lookup(&self, name: &str) -> ModulusRemainder {
        self.locals
            .get(name)
            .or_else(|| self.scope.get(name))
            .copied()
            .unwrap_or(ModulusRemainder::unknown())
    }

    fn analyze(&mut self, e: &Expr) -> ModulusRemainder {
        match e.kind() {
            // A bare constant is congruent to zero modulo itself. Exactness
            // is recovered where constants appear as operands below.
            ExprKind::IntImm(v) => {
                if *v == 0 {
                    ModulusRemainder::unknown()
                } else {
                    reduce(v.abs(), 0)
                }
            }
            ExprKind::Variable(name) => self.lookup(name),
            ExprKind::Add(a, b) => {
                if let Some(c) = b.as_int() {
                    let ma = self.analyze(a);
                    return reduce(ma.modulus, ma.remainder.wrapping_add(c));
                }
                if let Some(c) = a.as_int() {
                    let mb = self.analyze(b);
                    return reduce(mb.modulus, mb.remainder.wrapping_add(c));
                }
                let ma = self.analyze(a);
                let mb = self.analyze(b);
                reduce(gcd(ma.modulus, mb.modulus), ma.remainder + mb.remainder)
            }
            ExprKind::Sub(a, b) => {
                if let Some(c) = b.as_int() {
                    let ma = self.analyze(a);
                    return reduce(ma.modulus, ma.remainder.wrapping_sub(c));
                }
                let ma = self.analyze(a);
                let mb = self.analyze(b);
                reduce(gcd(ma.modulus, mb.modulus), ma.remainder - mb.remainder)
            }
            ExprKind::Mul(a, b) => {
                let scaled = |inner: ModulusRemainder, c: i64| -> ModulusRemainder {
                    if c == 0 {
                        return ModulusRemainder::unknown();
                    }
                    match (
                        inner.modulus.checked_mul(c.abs()),
                        inner.remainder.checked_mul(c),
                    ) {
                        (Some(m), Some(r)) => reduce(m, r),
                        _ => ModulusRemainder::unknown(),
                    }
                };
                if let Some(c) = b.as_int() {
                    let ma = self.analyze(a);
                    return scaled(ma, c);
                }
                if let Some(c) = a.as_int() {
                    let mb = self.analyze(b);
                    return scaled(mb, c);
                }
                let ma = self.analyze(a);
                let mb = self.analyze(b);
                let terms = (
                    ma.modulus.checked_mul(mb.modulus),
                    ma.modulus.checked_mul(mb.remainder),
                    mb.modulus.checked_mul(ma.remainder),
                    ma.remainder.checked_mul(mb.remainder),
                );
                match terms {
                    (Some(mm), Some(mr), Some(rm), Some(rr)) => {
                        reduce(gcd(mm, gcd(mr, rm)), rr)
                    }
                    _ => ModulusRemainder::unknown(),
                }
            }
            ExprKind::Div(a, b) => {
                // Exact only when the divisor divides both the modulus and
                // the remainder, so every representative divides evenly.
                if let Some(c) = b.as_int() {
                    if c > 0 {
                        let ma = self.analyze(a);
                        if ma.modulus % c == 0 && ma.remainder % c == 0 {
                            return reduce(ma.modulus / c, ma.remainder / c);
                        }
                    }
                }
                ModulusRemainder::unknown()
            }
            ExprKind::Mod(a, b) => {
                if let Some(c) = b.as_int() {
                    if c > 0 {
                        let ma = self.analyze(a);
                        if ma.modulus % c == 0 {
                            return reduce(c, ma.remainder);
                        }
                        return reduce(gcd(ma.modulus, c), ma.remainder);
                    }
                }
                ModulusRemainder::unknown()
            }
            ExprKind::Min(a, b) | ExprKind::Max(a, b) => {
                let ma = self.analyze(a);
                let mb = self.analyze(b);
                self.either(ma, mb)
            }
            ExprKind::Select {
                true_value,
                false_value,
                ..
            } => {
                let mt = self.analyze(true_value);
                let mf = self.analyze(false_value);
                self.either(mt, mf)
            }
            ExprKind::Let { name, value, body } => {
                let mv = self.analyze(value);
                self.locals.push(name, mv);
                let result = self.analyze(body);
                self.locals.pop(name);
                result
            }
            _ => ModulusRemainder::unknown(),
        }
    }

    /// The tightest fact implied by "the value is one of the two".
    fn either(&self, a: ModulusRemainder, b: ModulusRemainder) -> ModulusRemainder {
        let modulus = gcd(gcd(a.modulus, b.modulus), a.remainder - b.remainder);
        reduce(modulus, a.remainder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_ir::Type;

    fn x() -> Expr {
        Expr::var(Type::I32, "x")
    }

    fn y() -> Expr {
        Expr::var(Type::I32, "y")
    }

    fn analyze(e: &Expr) -> ModulusRemainder {
        modulus_remainder(e, &Scope::new())
    }

    #[test]
    fn unknown_for_free_variables() {
        assert_eq!(analyze(&x()), ModulusRemainder::unknown());
    }

    #[test]
    fn multiples_and_offsets() {
        assert_eq!(analyze(&(x() * 16)), ModulusRemainder::new(16, 0));
        assert_eq!(analyze(&(x() * 16 + 13)), ModulusRemainder::new(16, 13));
        assert_eq!(analyze(&(x() * 16 - 1)), ModulusRemainder::new(16, 15));
        assert_eq!(analyze(&(x() * 8 + y() * 4)), ModulusRemainder::new(4, 0));
    }

    #[test]
    fn scope_facts_feed_lookup() {
        let mut scope = Scope::new();
        scope.push("x", ModulusRemainder::new(8, 3));
        assert_eq!(
            modulus_remainder(&(x() + 1), &scope),
            ModulusRemainder::new(8, 4)
        );
        assert_eq!(
            modulus_remainder(&(x() * 2), &scope),
            ModulusRemainder::new(16, 6)
        );
    }

    #[test]
    fn division_needs_exactness() {
        assert_eq!(analyze(&(x() * 16 / 4)), ModulusRemainder::new(4, 0));
        assert_eq!(
            analyze(&((x() * 16 + 13) / 4)),
            ModulusRemainder::unknown()
        );
    }

    #[test]
    fn modulo_by_divisor_of_modulus() {
        assert_eq!(analyze(&((x() * 16 + 13) % 2)), ModulusRemainder::new(2, 1));
    }

    #[test]
    fn min_of_aligned_values() {
        let e = raster_ir::min(x() * 4, Expr::int(8));
        assert_eq!(analyze(&e), ModulusRemainder::new(4, 0));
    }

    #[test]
    fn let_bindings_are_tracked() {
        let e = Expr::let_in("t", x() * 4, Expr::var(Type::I32, "t") + 2);
        assert_eq!(analyze(&e), ModulusRemainder::new(4, 2));
    }

    #[test]
    fn soundness_on_samples() {
        // x congruent to 3 mod 8: check several concrete instantiations.
        let mut scope = Scope::new();
        scope.push("x", ModulusRemainder::new(8, 3));
        let e = x() * 2 + 5;
        let fact = modulus_remainder(&e, &scope);
        for k in -4..4 {
            let xv: i64 = 8 * k + 3;
            let value = xv * 2 + 5;
            assert_eq!(value.rem_euclid(fact.modulus), fact.remainder, "k={k}");
        }
    }
}
