//! Quantified properties of the simplifier over a generated corpus.

mod common;

use common::{eval, gen_env, gen_expr, Lcg};
use raster_ir::arith::{div_imp, mod_imp};
use raster_ir::{min, Expr, Type};
use raster_opt::simplify;

#[test]
fn semantic_preservation_on_random_expressions() {
    let mut rng = Lcg::new(7);
    for case in 0..300 {
        let e = gen_expr(&mut rng, 4);
        let simplified = simplify(&e, true);
        for trial in 0..5 {
            let env = gen_env(&mut rng);
            let before = eval(&e, &env).expect("generated expressions evaluate");
            let after = eval(&simplified, &env).expect("simplified expressions evaluate");
            assert_eq!(
                before, after,
                "case {case} trial {trial}:\n  input:      {e}\n  simplified: {simplified}\n  env: {env:?}"
            );
        }
    }
}

#[test]
fn idempotence_on_random_expressions() {
    let mut rng = Lcg::new(99);
    for case in 0..300 {
        let e = gen_expr(&mut rng, 4);
        let once = simplify(&e, true);
        let twice = simplify(&once, true);
        assert_eq!(
            once, twice,
            "case {case}:\n  input: {e}\n  once:  {once}\n  twice: {twice}"
        );
    }
}

#[test]
fn identity_on_fixed_points() {
    let x = Expr::var(Type::I32, "x");
    let y = Expr::var(Type::I32, "y");
    let fixed = [
        x.clone(),
        x.clone() + y.clone(),
        min(x.clone(), y.clone()),
        x.clone() * y.clone() + 3,
        Expr::load(Type::I32, "buf", x.clone(), None, None),
    ];
    for e in fixed {
        let out = simplify(&e, true);
        assert!(out.same_as(&e), "expected identity for {e}, got {out}");
    }
}

#[test]
fn termination_on_deep_expressions() {
    // Recursion depth tracks expression depth, so give the traversal a
    // worker thread with room to spare.
    let handle = std::thread::Builder::new()
        .stack_size(64 << 20)
        .spawn(|| {
            let x = Expr::var(Type::I32, "x");

            let mut chain = x.clone();
            for _ in 0..1000 {
                chain = chain + 1;
            }
            assert_eq!(simplify(&chain, true), x.clone() + 1000);

            let mut nest = min(x.clone(), Expr::var(Type::I32, "y"));
            for i in 0..1000 {
                nest = min(nest, Expr::var(Type::I32, format!("v{i}")));
            }
            let out = simplify(&nest, true);
            assert!(out.same_as(&nest));
        })
        .expect("spawn worker");
    handle.join().expect("deep simplification completes");
}

#[test]
fn euclidean_division_laws() {
    for a in -200..=200 {
        for b in [-13, -8, -3, -2, -1, 1, 2, 3, 5, 8, 13, 100] {
            let q = div_imp(a, b);
            let r = mod_imp(a, b);
            assert_eq!(q * b + r, a, "a={a} b={b}");
            assert!(r.abs() < b.abs(), "a={a} b={b} r={r}");
            if b > 0 {
                assert!(r >= 0, "a={a} b={b} r={r}");
            }
        }
    }
}
