//! Allocation-bounds inference.
//!
//! Walks the statement tree and, around every `Realize`, deposits bindings
//! for the region the body actually touches: per-dimension
//! `<name>.<arg>.{min,max,extent}_realized` values. The touched region comes
//! from a [`RegionOracle`]; buffers consumed or produced by extern stages are
//! widened to the region those stages require.

use std::collections::{HashMap, HashSet};

use raster_analysis::{Interval, Region, RegionOracle};
use raster_ir::{Bound, Expr, Stmt, StmtKind, Type};

use crate::simplify::simplify;

/// What the inference needs to know about a pipeline function.
#[derive(Clone, Debug, Default)]
pub struct FuncSignature {
    /// Dimension argument names, in storage order.
    pub args: Vec<String>,
    /// Whether the function is implemented by an extern stage.
    pub is_extern: bool,
    /// Names of pipeline functions consumed by the extern stage.
    pub extern_inputs: Vec<String>,
}

/// The environment of pipeline functions, keyed by name.
pub type FuncEnv = HashMap<String, FuncSignature>;

/// Wraps each `Realize` in `s` with `_realized` bindings describing the
/// region of the buffer the body touches.
pub fn allocation_bounds_inference(s: &Stmt, env: &FuncEnv, oracle: &dyn RegionOracle) -> Stmt {
    let mut touched_by_extern = HashSet::new();
    for (name, f) in env {
        if f.is_extern {
            touched_by_extern.insert(name.clone());
            for input in &f.extern_inputs {
                touched_by_extern.insert(input.clone());
            }
        }
    }
    let inference = AllocationInference {
        env,
        touched_by_extern,
        oracle,
    };
    inference.mutate(s)
}

struct AllocationInference<'a> {
    env: &'a FuncEnv,
    touched_by_extern: HashSet<String>,
    oracle: &'a dyn RegionOracle,
}

impl AllocationInference<'_> {
    fn mutate(&self, s: &Stmt) -> Stmt {
        match s.kind() {
            StmtKind::Realize {
                name,
                types,
                bounds,
                body,
            } => self.visit_realize(name, types, bounds, body),
            StmtKind::LetStmt { name, value, body } => {
                let new_body = self.mutate(body);
                if new_body.same_as(body) {
                    s.clone()
                } else {
                    Stmt::let_stmt(name.clone(), value.clone(), new_body)
                }
            }
            StmtKind::Pipeline {
                name,
                produce,
                update,
                consume,
            } => {
                let new_produce = self.mutate(produce);
                let new_update = update.as_ref().map(|u| self.mutate(u));
                let new_consume = self.mutate(consume);
                let unchanged = new_produce.same_as(produce)
                    && new_consume.same_as(consume)
                    && match (&new_update, update) {
                        (Some(n), Some(o)) => n.same_as(o),
                        (None, None) => true,
                        _ => false,
                    };
                if unchanged {
                    s.clone()
                } else {
                    Stmt::pipeline(name.clone(), new_produce, new_update, new_consume)
                }
            }
            StmtKind::For {
                name,
                min,
                extent,
                kind,
                body,
            } => {
                let new_body = self.mutate(body);
                if new_body.same_as(body) {
                    s.clone()
                } else {
                    Stmt::for_loop(name.clone(), min.clone(), extent.clone(), *kind, new_body)
                }
            }
            StmtKind::Allocate {
                name,
                ty,
                size,
                body,
            } => {
                let new_body = self.mutate(body);
                if new_body.same_as(body) {
                    s.clone()
                } else {
                    Stmt::allocate(name.clone(), *ty, size.clone(), new_body)
                }
            }
            StmtKind::Block { first, rest } => {
                let new_first = self.mutate(first);
                let new_rest = rest.as_ref().map(|r| self.mutate(r));
                let unchanged = new_first.same_as(first)
                    && match (&new_rest, rest) {
                        (Some(n), Some(o)) => n.same_as(o),
                        (None, None) => true,
                        _ => false,
                    };
                if unchanged {
                    s.clone()
                } else {
                    Stmt::block(new_first, new_rest)
                }
            }
            StmtKind::AssertStmt { .. } | StmtKind::Store { .. } | StmtKind::Provide { .. } => {
                s.clone()
            }
        }
    }

    fn visit_realize(
        &self,
        name: &str,
        types: &[Type],
        bounds: &[Bound],
        body: &Stmt,
    ) -> Stmt {
        let f = self
            .env
            .get(name)
            .unwrap_or_else(|| panic!("realize of unknown function {name:?}"));

        let mut touched = self.oracle.box_touched(body, name);

        if self.touched_by_extern.contains(name) {
            // The region touched is at least the region the first stage
            // requires at this loop level; extern stages read and write
            // whole required regions.
            let required: Region = (0..bounds.len())
                .map(|i| {
                    let prefix = format!("{name}.s0.{}", f.args[i]);
                    Interval::new(
                        Some(Expr::var(Type::I32, format!("{prefix}.min"))),
                        Some(Expr::var(Type::I32, format!("{prefix}.max"))),
                    )
                })
                .collect();
            touched.merge(&required);
        }

        let new_body = self.mutate(body);
        let mut stmt = Stmt::realize(name, types.to_vec(), bounds.to_vec(), new_body);

        assert_eq!(
            touched.len(),
            bounds.len(),
            "touched region of {name:?} has wrong dimensionality"
        );
        for i in 0..touched.len() {
            let prefix = format!("{}.{}", name, f.args[i]);
            let dim = &touched.dims[i];
            let min = dim
                .min
                .as_ref()
                .unwrap_or_else(|| panic!("allocation of {name:?} has no lower bound"));
            let max = dim
                .max
                .as_ref()
                .unwrap_or_else(|| panic!("allocation of {name:?} has no upper bound"));
            let min = simplify(min, true);
            let max = simplify(max, true);
            let extent = simplify(&(max.clone() - min.clone() + 1), true);
            stmt = Stmt::let_stmt(format!("{prefix}.extent_realized"), extent, stmt);
            stmt = Stmt::let_stmt(format!("{prefix}.min_realized"), min, stmt);
            stmt = Stmt::let_stmt(format!("{prefix}.max_realized"), max, stmt);
        }
        stmt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOracle(Region);

    impl RegionOracle for FixedOracle {
        fn box_touched(&self, _body: &Stmt, _name: &str) -> Region {
            self.0.clone()
        }
    }

    fn env_with(name: &str, args: &[&str]) -> FuncEnv {
        let mut env = FuncEnv::new();
        env.insert(
            name.to_string(),
            FuncSignature {
                args: args.iter().map(|a| a.to_string()).collect(),
                is_extern: false,
                extern_inputs: Vec::new(),
            },
        );
        env
    }

    #[test]
    fn realize_gets_wrapped_in_realized_lets() {
        let body = Stmt::store("f", Expr::int(0), Expr::int(0));
        let realize = Stmt::realize(
            "f",
            vec![Type::I32],
            vec![Bound {
                min: Expr::int(0),
                extent: Expr::int(10),
            }],
            body,
        );
        let oracle = FixedOracle(Region::new(vec![Interval::new(
            Some(Expr::int(2)),
            Some(Expr::int(2) + 5),
        )]));
        let out = allocation_bounds_inference(&realize, &env_with("f", &["x"]), &oracle);

        let StmtKind::LetStmt { name, value, body } = out.kind() else {
            panic!("expected outer let, got {out}");
        };
        assert_eq!(name, "f.x.max_realized");
        assert_eq!(value.as_int(), Some(7));
        let StmtKind::LetStmt { name, value, body } = body.kind() else {
            panic!("expected min let, got {body}");
        };
        assert_eq!(name, "f.x.min_realized");
        assert_eq!(value.as_int(), Some(2));
        let StmtKind::LetStmt { name, value, body } = body.kind() else {
            panic!("expected extent let, got {body}");
        };
        assert_eq!(name, "f.x.extent_realized");
        assert_eq!(value.as_int(), Some(6));
        assert!(matches!(body.kind(), StmtKind::Realize { .. }));
    }
}
