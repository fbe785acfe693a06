//! Allocation-bounds inference scenarios with a stubbed region oracle.

use std::collections::HashMap;

use raster_analysis::{Interval, Region, RegionOracle};
use raster_ir::{Bound, Expr, ForKind, Stmt, StmtKind, Type};
use raster_opt::{allocation_bounds_inference, FuncEnv, FuncSignature};

/// Hands out a fixed region per buffer name.
struct TableOracle {
    regions: HashMap<String, Region>,
}

impl RegionOracle for TableOracle {
    fn box_touched(&self, _body: &Stmt, name: &str) -> Region {
        self.regions[name].clone()
    }
}

fn iv(min: Expr, max: Expr) -> Interval {
    Interval::new(Some(min), Some(max))
}

fn signature(args: &[&str]) -> FuncSignature {
    FuncSignature {
        args: args.iter().map(|a| a.to_string()).collect(),
        is_extern: false,
        extern_inputs: Vec::new(),
    }
}

fn collect_lets(mut s: &Stmt) -> (Vec<(String, Expr)>, Stmt) {
    let mut lets = Vec::new();
    while let StmtKind::LetStmt { name, value, body } = s.kind() {
        lets.push((name.clone(), value.clone()));
        s = body;
    }
    (lets, s.clone())
}

#[test]
fn realized_bounds_are_simplified() {
    let i = Expr::var(Type::I32, "i");
    let body = Stmt::for_loop(
        "i",
        Expr::int(0),
        Expr::int(8),
        ForKind::Serial,
        Stmt::provide("f", vec![i.clone()], vec![i.clone()]),
    );
    let realize = Stmt::realize(
        "f",
        vec![Type::I32],
        vec![Bound {
            min: Expr::int(0),
            extent: Expr::int(8),
        }],
        body,
    );

    let mut regions = HashMap::new();
    regions.insert(
        "f".to_string(),
        Region::new(vec![iv(Expr::int(0) + 3, (Expr::int(2) + 2) * 2)]),
    );
    let oracle = TableOracle { regions };
    let mut env = FuncEnv::new();
    env.insert("f".to_string(), signature(&["x"]));

    let out = allocation_bounds_inference(&realize, &env, &oracle);
    let (lets, inner) = collect_lets(&out);
    let names: Vec<&str> = lets.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        ["f.x.max_realized", "f.x.min_realized", "f.x.extent_realized"]
    );
    // The oracle's endpoint arithmetic folds on the way in.
    assert_eq!(lets[0].1.as_int(), Some(8));
    assert_eq!(lets[1].1.as_int(), Some(3));
    assert_eq!(lets[2].1.as_int(), Some(6));
    assert!(matches!(inner.kind(), StmtKind::Realize { .. }));
}

#[test]
fn extern_consumers_widen_the_region() {
    let body = Stmt::provide("in", vec![Expr::int(0)], vec![Expr::int(0)]);
    let realize = Stmt::realize(
        "in",
        vec![Type::I32],
        vec![Bound {
            min: Expr::int(0),
            extent: Expr::int(16),
        }],
        body,
    );

    let mut regions = HashMap::new();
    regions.insert(
        "in".to_string(),
        Region::new(vec![iv(Expr::int(4), Expr::int(11))]),
    );
    let oracle = TableOracle { regions };

    let mut env = FuncEnv::new();
    env.insert("in".to_string(), signature(&["x"]));
    env.insert(
        "blur".to_string(),
        FuncSignature {
            args: vec!["x".to_string()],
            is_extern: true,
            extern_inputs: vec!["in".to_string()],
        },
    );

    let out = allocation_bounds_inference(&realize, &env, &oracle);
    let (lets, _) = collect_lets(&out);

    // The touched region merges with the extern stage's required region;
    // the simplifier moves the constants to the right.
    let max = &lets[0].1;
    let min = &lets[1].1;
    assert_eq!(max.to_string(), "max(in.s0.x.max, 11)");
    assert_eq!(min.to_string(), "min(in.s0.x.min, 4)");
}

#[test]
fn nested_realizes_are_all_annotated() {
    let inner_realize = Stmt::realize(
        "g",
        vec![Type::I32],
        vec![Bound {
            min: Expr::int(0),
            extent: Expr::int(4),
        }],
        Stmt::provide("g", vec![Expr::int(1)], vec![Expr::int(0)]),
    );
    let outer = Stmt::realize(
        "f",
        vec![Type::I32],
        vec![Bound {
            min: Expr::int(0),
            extent: Expr::int(4),
        }],
        inner_realize,
    );

    let mut regions = HashMap::new();
    regions.insert("f".to_string(), Region::new(vec![iv(Expr::int(0), Expr::int(3))]));
    regions.insert("g".to_string(), Region::new(vec![iv(Expr::int(1), Expr::int(2))]));
    let oracle = TableOracle { regions };
    let mut env = FuncEnv::new();
    env.insert("f".to_string(), signature(&["x"]));
    env.insert("g".to_string(), signature(&["u"]));

    let out = allocation_bounds_inference(&outer, &env, &oracle);
    let (outer_lets, inner) = collect_lets(&out);
    assert_eq!(outer_lets.len(), 3);
    let StmtKind::Realize { body, .. } = inner.kind() else {
        panic!("expected realize, got {inner}");
    };
    let (inner_lets, innermost) = collect_lets(body);
    let names: Vec<&str> = inner_lets.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        ["g.u.max_realized", "g.u.min_realized", "g.u.extent_realized"]
    );
    assert!(matches!(innermost.kind(), StmtKind::Realize { .. }));
}
