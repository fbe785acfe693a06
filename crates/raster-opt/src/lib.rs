//! Lowering passes for the raster compiler midend.
//!
//! Provides a [`Pass`] trait, a [`PassManager`] with fixed-point iteration,
//! the algebraic simplifier, allocation-bounds inference, and a structural
//! validation pass.

mod alloc_bounds;
mod simplify;
mod validate;

pub use alloc_bounds::{allocation_bounds_inference, FuncEnv, FuncSignature};
pub use simplify::{simplify, simplify_stmt};
pub use validate::{collect_warnings, collect_warnings_with_env, Validate, ValidationWarning};

use std::fmt::Debug;

use raster_ir::Stmt;

/// A lowering pass that transforms a statement tree.
///
/// Passes preserve pointer identity when they change nothing, which is how
/// the manager detects convergence.
pub trait Pass: Debug {
    /// Human-readable name of the pass.
    fn name(&self) -> &str;

    /// Runs the pass, returning the (possibly identical) statement.
    fn run(&self, stmt: &Stmt) -> Stmt;
}

/// The simplifier as a pipeline pass.
#[derive(Debug)]
pub struct SimplifyPass {
    pub remove_dead_lets: bool,
}

impl Pass for SimplifyPass {
    fn name(&self) -> &str {
        "simplify"
    }

    fn run(&self, stmt: &Stmt) -> Stmt {
        simplify_stmt(stmt, self.remove_dead_lets)
    }
}

/// Maximum number of fixed-point iterations before giving up.
const MAX_ITERATIONS: usize = 10;

/// Runs passes in sequence with fixed-point iteration.
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PassManager {
    /// Creates an empty pass manager with no passes.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// The standard between-lowering-stages pipeline: validate, simplify.
    pub fn standard() -> Self {
        let mut pm = Self::new();
        pm.add_pass(Box::new(Validate));
        pm.add_pass(Box::new(SimplifyPass {
            remove_dead_lets: true,
        }));
        pm
    }

    /// Adds a pass to the pipeline.
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Runs all passes until a fixed point is reached or the iteration limit.
    pub fn run(&self, stmt: &Stmt) -> Stmt {
        let mut current = stmt.clone();
        for _ in 0..MAX_ITERATIONS {
            let mut changed = false;
            for pass in &self.passes {
                let next = pass.run(&current);
                changed |= !next.same_as(&current);
                current = next;
            }
            if !changed {
                break;
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_ir::{Expr, Type};

    #[test]
    fn manager_reaches_fixed_point() {
        let x = Expr::var(Type::I32, "x");
        let s = Stmt::store("buf", (x.clone() + 3) + 4, Expr::int(0));
        let out = PassManager::standard().run(&s);
        let expected = Stmt::store("buf", x + 7, Expr::int(0));
        assert_eq!(out, expected);
    }

    #[test]
    fn manager_is_identity_on_fixed_points() {
        let x = Expr::var(Type::I32, "x");
        let s = Stmt::store("buf", x, Expr::int(0));
        let out = PassManager::standard().run(&s);
        assert!(out.same_as(&s));
    }

    #[test]
    fn empty_manager_is_identity() {
        let s = Stmt::store("buf", Expr::int(1), Expr::int(0));
        let out = PassManager::new().run(&s);
        assert!(out.same_as(&s));
    }
}
