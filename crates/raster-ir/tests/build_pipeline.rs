//! Builds a small lowered pipeline by hand and checks the IR plumbing:
//! construction, equality, substitution, and printing.

use raster_ir::{
    clamp, lt, select, substitute_in_stmt, Bound, CallType, Expr, ForKind, Stmt,
    StmtKind, Type,
};

fn blur_stage() -> Stmt {
    let x = Expr::var(Type::I32, "x");
    let input = |index: Expr| Expr::call(Type::U8, "input", vec![index], CallType::Image);
    let sum = Expr::cast(
        Type::U16,
        input(x.clone() + (-1)),
    ) + Expr::cast(Type::U16, input(x.clone()))
        + Expr::cast(Type::U16, input(x.clone() + 1));
    let value = Expr::cast(Type::U8, sum / raster_ir::make_const(Type::U16, 3));
    let store = Stmt::provide("blur", vec![value], vec![x.clone()]);
    Stmt::for_loop("x", Expr::int(0), Expr::int(128), ForKind::Serial, store)
}

#[test]
fn pipeline_construction_round_trip() {
    let produce = blur_stage();
    let consume = Stmt::store(
        "out",
        Expr::call(Type::U8, "blur", vec![Expr::var(Type::I32, "i")], CallType::Halide),
        Expr::var(Type::I32, "i"),
    );
    let pipeline = Stmt::pipeline("blur", produce, None, consume);
    let realize = Stmt::realize(
        "blur",
        vec![Type::U8],
        vec![Bound {
            min: Expr::int(0),
            extent: Expr::int(128),
        }],
        pipeline,
    );

    let text = realize.to_string();
    assert!(text.contains("realize blur([0, 128]) : u8 {"));
    assert!(text.contains("produce blur {"));
    assert!(text.contains("for (x, 0, 128) {"));

    // Structural equality sees through separate constructions.
    assert_eq!(realize, {
        let produce = blur_stage();
        let consume = Stmt::store(
            "out",
            Expr::call(Type::U8, "blur", vec![Expr::var(Type::I32, "i")], CallType::Halide),
            Expr::var(Type::I32, "i"),
        );
        Stmt::realize(
            "blur",
            vec![Type::U8],
            vec![Bound {
                min: Expr::int(0),
                extent: Expr::int(128),
            }],
            Stmt::pipeline("blur", produce, None, consume),
        )
    });
}

#[test]
fn substitution_rewrites_loop_bodies() {
    let s = blur_stage();
    let shifted = substitute_in_stmt("x", &(Expr::var(Type::I32, "x") + 4), &s);
    // The loop variable is bound by the for, so nothing changes.
    assert!(shifted.same_as(&s));

    let StmtKind::For { body, .. } = s.kind() else {
        panic!("expected for loop");
    };
    let shifted = substitute_in_stmt("x", &(Expr::var(Type::I32, "x") + 4), body);
    assert!(!shifted.same_as(body));
    assert!(shifted.to_string().contains("(x + 4)"));
}

#[test]
fn vector_expressions_print_readably() {
    let x = Expr::var(Type::I32, "x");
    let lanes = Expr::ramp(x.clone() * 4, Expr::int(1), 4);
    let gathered = Expr::load(Type::F32.with_lanes(4), "weights", lanes, None, None);
    let blended = select(
        lt(
            Expr::broadcast(x.clone(), 4),
            Expr::broadcast(Expr::int(16), 4),
        ),
        gathered.clone(),
        gathered * 0.5,
    );
    let text = blended.to_string();
    assert!(text.contains("weights[ramp((x * 4), 1, 4)]"));
    assert!(text.contains("x4(16)"));

    let clamped = clamp(x.clone(), Expr::int(0), Expr::int(255));
    assert_eq!(clamped.to_string(), "max(min(x, 255), 0)");
}
