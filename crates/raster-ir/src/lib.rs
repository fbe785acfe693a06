//! Raster intermediate representation.
//!
//! An immutable, shared expression/statement tree for the raster compiler
//! midend. Nodes are built once through validating factories and never
//! mutated; rewrite passes produce new trees and preserve pointer identity
//! (`same_as`) for unchanged subtrees.

pub mod arith;
mod display;
mod error;
mod expr;
pub mod ops;
mod scope;
mod stmt;
mod subst;
mod types;

pub use error::IrError;
pub use expr::{CallType, Expr, ExprKind};
pub use ops::{
    and, clamp, cast, const_false, const_true, eq, ge, gt, is_const, is_const_value,
    is_negative_const, is_one, is_positive_const, is_simple_const, is_zero, le, lt, make_bool,
    make_const, make_one, make_zero, max, min, ne, not, or, select,
};
pub use scope::Scope;
pub use stmt::{Bound, ForKind, Stmt, StmtKind};
pub use subst::{substitute, substitute_in_stmt};
pub use types::{ScalarKind, Type};
