//! Structural validation of statement trees.
//!
//! Checks cross-node invariants the factories cannot see and collects
//! warnings: duplicate binder names, realize dimensionality against the
//! function environment and against the coordinates that index it, and
//! vector-width agreement. This pass never modifies the tree.

use std::collections::{HashMap, HashSet};
use std::fmt;

use raster_ir::{CallType, Expr, ExprKind, Stmt, StmtKind};

use crate::{FuncEnv, Pass};

/// A validation warning describing a structural issue in the IR.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub message: String,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Validates IR invariants and logs warnings. Never rewrites.
#[derive(Debug)]
pub struct Validate;

impl Pass for Validate {
    fn name(&self) -> &str {
        "validate"
    }

    fn run(&self, stmt: &Stmt) -> Stmt {
        for w in collect_warnings(stmt) {
            log::warn!("{}", w.message);
        }
        stmt.clone()
    }
}

/// Collects all validation warnings for a statement without logging.
///
/// Usable in tests and debug builds without a logger configured.
pub fn collect_warnings(stmt: &Stmt) -> Vec<ValidationWarning> {
    collect_warnings_with_env(stmt, &FuncEnv::new())
}

/// Like [`collect_warnings`], but also checks each `Realize` against the
/// function environment that allocation-bounds inference will consult, so
/// dimensionality mismatches surface here as warnings rather than there as
/// panics.
pub fn collect_warnings_with_env(stmt: &Stmt, env: &FuncEnv) -> Vec<ValidationWarning> {
    let mut checker = Checker {
        warnings: Vec::new(),
        binders: HashSet::new(),
        realize_dims: HashMap::new(),
        env,
    };
    checker.check_stmt(stmt);
    checker.warnings
}

struct Checker<'a> {
    warnings: Vec<ValidationWarning>,
    binders: HashSet<String>,
    /// Dimensionality of each realization enclosing the current node.
    realize_dims: HashMap<String, usize>,
    env: &'a FuncEnv,
}

impl Checker<'_> {
    fn warn(&mut self, message: String) {
        self.warnings.push(ValidationWarning { message });
    }

    /// Simplification requires globally unique binder names.
    fn check_binder(&mut self, name: &str) {
        if !self.binders.insert(name.to_string()) {
            self.warn(format!(
                "binder name {name:?} is bound more than once; simplification requires unique names"
            ));
        }
    }

    /// Coordinates indexing a realized buffer must match its dimensionality.
    fn check_coordinates(&mut self, what: &str, name: &str, used: usize) {
        if let Some(&dims) = self.realize_dims.get(name) {
            if used != dims {
                self.warn(format!(
                    "{what} {name:?} uses {used} coordinate(s) but its realization has {dims} dimension(s)"
                ));
            }
        }
    }

    fn check_stmt(&mut self, s: &Stmt) {
        match s.kind() {
            StmtKind::LetStmt { name, value, body } => {
                self.check_binder(name);
                self.check_expr(value);
                self.check_stmt(body);
            }
            StmtKind::AssertStmt { condition, .. } => self.check_expr(condition),
            StmtKind::Pipeline {
                produce,
                update,
                consume,
                ..
            } => {
                self.check_stmt(produce);
                if let Some(update) = update {
                    self.check_stmt(update);
                }
                self.check_stmt(consume);
            }
            StmtKind::For {
                name,
                min,
                extent,
                body,
                ..
            } => {
                self.check_binder(name);
                self.check_expr(min);
                self.check_expr(extent);
                self.check_stmt(body);
            }
            StmtKind::Store { value, index, .. } => {
                self.check_expr(value);
                self.check_expr(index);
            }
            StmtKind::Provide { values, args, name } => {
                if values.is_empty() {
                    self.warn(format!("provide to {name:?} carries no values"));
                }
                self.check_coordinates("provide to", name, args.len());
                for e in values.iter().chain(args) {
                    self.check_expr(e);
                }
            }
            StmtKind::Allocate { size, body, .. } => {
                self.check_expr(size);
                self.check_stmt(body);
            }
            StmtKind::Realize {
                name,
                types,
                bounds,
                body,
            } => {
                if types.is_empty() {
                    self.warn(format!("realize of {name:?} has no types"));
                }
                if bounds.is_empty() {
                    self.warn(format!("realize of {name:?} has no bounds"));
                }
                // Allocation-bounds inference will index one signature
                // argument per bound.
                if let Some(f) = self.env.get(name) {
                    if f.args.len() != bounds.len() {
                        self.warn(format!(
                            "realize of {name:?} has {} bound(s) but its signature names {} dimension(s)",
                            bounds.len(),
                            f.args.len()
                        ));
                    }
                }
                for b in bounds {
                    if b.min.ty().is_vector() || b.extent.ty().is_vector() {
                        self.warn(format!("realize of {name:?} has a vector-valued bound"));
                    }
                    self.check_expr(&b.min);
                    self.check_expr(&b.extent);
                }
                let previous = self.realize_dims.insert(name.clone(), bounds.len());
                self.check_stmt(body);
                match previous {
                    Some(dims) => {
                        self.realize_dims.insert(name.clone(), dims);
                    }
                    None => {
                        self.realize_dims.remove(name);
                    }
                }
            }
            StmtKind::Block { first, rest } => {
                self.check_stmt(first);
                if let Some(rest) = rest {
                    self.check_stmt(rest);
                }
            }
        }
    }

    fn check_expr(&mut self, e: &Expr) {
        match e.kind() {
            ExprKind::Let { name, value, body } => {
                self.check_binder(name);
                self.check_expr(value);
                self.check_expr(body);
            }
            ExprKind::Cast(value) => {
                if value.ty() == e.ty() {
                    self.warn(format!("cast to its own type {} around {value}", e.ty()));
                }
                self.check_expr(value);
            }
            ExprKind::Add(a, b)
            | ExprKind::Sub(a, b)
            | ExprKind::Mul(a, b)
            | ExprKind::Div(a, b)
            | ExprKind::Mod(a, b)
            | ExprKind::Min(a, b)
            | ExprKind::Max(a, b)
            | ExprKind::Eq(a, b)
            | ExprKind::Ne(a, b)
            | ExprKind::Lt(a, b)
            | ExprKind::Le(a, b)
            | ExprKind::Gt(a, b)
            | ExprKind::Ge(a, b)
            | ExprKind::And(a, b)
            | ExprKind::Or(a, b) => {
                if a.ty().lanes != b.ty().lanes {
                    self.warn(format!(
                        "operands of {e} disagree on vector width: {} vs {}",
                        a.ty(),
                        b.ty()
                    ));
                }
                self.check_expr(a);
                self.check_expr(b);
            }
            ExprKind::Not(a) => self.check_expr(a),
            ExprKind::Select {
                condition,
                true_value,
                false_value,
            } => {
                if true_value.ty().lanes != false_value.ty().lanes {
                    self.warn(format!(
                        "select branches disagree on vector width: {} vs {}",
                        true_value.ty(),
                        false_value.ty()
                    ));
                }
                if !condition.ty().is_scalar()
                    && condition.ty().lanes != true_value.ty().lanes
                {
                    self.warn(format!(
                        "select condition width {} does not match value width {}",
                        condition.ty(),
                        true_value.ty()
                    ));
                }
                self.check_expr(condition);
                self.check_expr(true_value);
                self.check_expr(false_value);
            }
            ExprKind::Load { index, .. } => self.check_expr(index),
            ExprKind::Ramp { base, stride, .. } => {
                self.check_expr(base);
                self.check_expr(stride);
            }
            ExprKind::Broadcast { value, .. } => self.check_expr(value),
            ExprKind::Call {
                name,
                args,
                call_type,
            } => {
                if matches!(call_type, CallType::Halide) {
                    self.check_coordinates("call to", name, args.len());
                }
                for arg in args {
                    self.check_expr(arg);
                }
            }
            ExprKind::IntImm(_) | ExprKind::FloatImm(_) | ExprKind::Variable(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FuncSignature;
    use raster_ir::{Bound, ForKind, Type};

    #[test]
    fn clean_statement_has_no_warnings() {
        let x = Expr::var(Type::I32, "x");
        let body = Stmt::store("buf", x, Expr::int(0));
        let s = Stmt::for_loop("i", Expr::int(0), Expr::int(8), ForKind::Serial, body);
        assert!(collect_warnings(&s).is_empty());
    }

    #[test]
    fn duplicate_binders_warn() {
        let inner = Stmt::let_stmt(
            "t",
            Expr::int(1),
            Stmt::store("buf", Expr::var(Type::I32, "t"), Expr::int(0)),
        );
        let s = Stmt::let_stmt("t", Expr::int(2), inner);
        let warnings = collect_warnings(&s);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("bound more than once"));
    }

    #[test]
    fn self_cast_warns() {
        let x = Expr::var(Type::I32, "x");
        let s = Stmt::store("buf", Expr::cast(Type::I32, x), Expr::int(0));
        let warnings = collect_warnings(&s);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("cast to its own type"));
    }

    #[test]
    fn empty_realize_warns() {
        let s = Stmt::realize(
            "f",
            Vec::new(),
            Vec::new(),
            Stmt::store("f", Expr::int(0), Expr::int(0)),
        );
        let warnings = collect_warnings(&s);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn realize_arity_against_signature_warns() {
        let body = Stmt::store("f", Expr::int(0), Expr::int(0));
        let s = Stmt::realize(
            "f",
            vec![Type::I32],
            vec![Bound {
                min: Expr::int(0),
                extent: Expr::int(4),
            }],
            body,
        );
        let mut env = FuncEnv::new();
        env.insert(
            "f".to_string(),
            FuncSignature {
                args: vec!["x".to_string(), "y".to_string()],
                is_extern: false,
                extern_inputs: Vec::new(),
            },
        );
        let warnings = collect_warnings_with_env(&s, &env);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("1 bound(s)"));
        assert!(warnings[0].message.contains("2 dimension(s)"));
        // Without the environment there is nothing to compare against.
        assert!(collect_warnings(&s).is_empty());
    }

    #[test]
    fn provide_coordinate_arity_warns() {
        let provide = Stmt::provide(
            "f",
            vec![Expr::int(1)],
            vec![Expr::int(0), Expr::int(0)],
        );
        let s = Stmt::realize(
            "f",
            vec![Type::I32],
            vec![Bound {
                min: Expr::int(0),
                extent: Expr::int(4),
            }],
            provide,
        );
        let warnings = collect_warnings(&s);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("2 coordinate(s)"));
        assert!(warnings[0].message.contains("1 dimension(s)"));
    }

    #[test]
    fn halide_call_coordinate_arity_warns() {
        let call = Expr::call(
            Type::I32,
            "f",
            vec![Expr::int(0), Expr::int(1)],
            CallType::Halide,
        );
        let s = Stmt::realize(
            "f",
            vec![Type::I32],
            vec![Bound {
                min: Expr::int(0),
                extent: Expr::int(4),
            }],
            Stmt::store("out", call, Expr::int(0)),
        );
        let warnings = collect_warnings(&s);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("call to \"f\""));
    }

    #[test]
    fn vector_realize_bounds_warn() {
        let s = Stmt::realize(
            "f",
            vec![Type::I32],
            vec![Bound {
                min: Expr::broadcast(Expr::int(0), 4),
                extent: Expr::int(4),
            }],
            Stmt::store("f", Expr::int(0), Expr::int(0)),
        );
        let warnings = collect_warnings(&s);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("vector-valued bound"));
    }

    #[test]
    fn scalar_select_condition_over_vectors_is_fine() {
        let x = Expr::var(Type::I32, "x");
        let v = Expr::var(Type::I32.with_lanes(4), "v");
        let sel = Expr::select(
            raster_ir::lt(x, Expr::int(0)),
            v.clone(),
            Expr::broadcast(Expr::int(0), 4),
        );
        let s = Stmt::store("buf", sel, Expr::var(Type::I32.with_lanes(4), "idx"));
        assert!(collect_warnings(&s).is_empty());
    }
}
