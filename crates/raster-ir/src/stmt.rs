//! Statements: side-effecting and control-flow IR nodes.

use std::sync::Arc;

use crate::expr::Expr;
use crate::types::Type;

/// How a `For` loop is scheduled.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ForKind {
    Serial,
    Parallel,
    Vectorized,
    Unrolled,
}

/// One dimension of a `Realize` region: a starting point and an extent.
#[derive(Clone, Debug, PartialEq)]
pub struct Bound {
    pub min: Expr,
    pub extent: Expr,
}

/// The variant payload of a statement node.
#[derive(Debug, PartialEq)]
pub enum StmtKind {
    /// Statement-level binding of `name` to `value` within `body`.
    LetStmt {
        name: String,
        value: Expr,
        body: Stmt,
    },
    /// Aborts the pipeline at runtime when `condition` is false.
    AssertStmt { condition: Expr, message: String },
    /// Produce/update/consume grouping for one pipeline stage.
    Pipeline {
        name: String,
        produce: Stmt,
        update: Option<Stmt>,
        consume: Stmt,
    },
    For {
        name: String,
        min: Expr,
        extent: Expr,
        kind: ForKind,
        body: Stmt,
    },
    /// Write `value` to a named buffer at `index`.
    Store {
        name: String,
        value: Expr,
        index: Expr,
    },
    /// Multi-value write at a symbolic coordinate, pre-storage-flattening.
    Provide {
        name: String,
        values: Vec<Expr>,
        args: Vec<Expr>,
    },
    Allocate {
        name: String,
        ty: Type,
        size: Expr,
        body: Stmt,
    },
    /// Marks the region within which a function's buffer exists.
    Realize {
        name: String,
        types: Vec<Type>,
        bounds: Vec<Bound>,
        body: Stmt,
    },
    Block { first: Stmt, rest: Option<Stmt> },
}

/// A cheap-to-clone handle to an immutable statement node.
#[derive(Clone, Debug)]
pub struct Stmt(Arc<StmtKind>);

/// Structural equality with a pointer-identity fast path.
impl PartialEq for Stmt {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other) || *self.0 == *other.0
    }
}

impl Stmt {
    fn new(kind: StmtKind) -> Stmt {
        Stmt(Arc::new(kind))
    }

    pub fn kind(&self) -> &StmtKind {
        &self.0
    }

    /// Pointer identity: `true` iff both handles reference the same node.
    pub fn same_as(&self, other: &Stmt) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn let_stmt(name: impl Into<String>, value: Expr, body: Stmt) -> Stmt {
        Stmt::new(StmtKind::LetStmt {
            name: name.into(),
            value,
            body,
        })
    }

    pub fn assert_stmt(condition: Expr, message: impl Into<String>) -> Stmt {
        assert!(
            condition.ty().is_bool(),
            "assertion condition must be boolean, found {}",
            condition.ty()
        );
        Stmt::new(StmtKind::AssertStmt {
            condition,
            message: message.into(),
        })
    }

    pub fn pipeline(
        name: impl Into<String>,
        produce: Stmt,
        update: Option<Stmt>,
        consume: Stmt,
    ) -> Stmt {
        Stmt::new(StmtKind::Pipeline {
            name: name.into(),
            produce,
            update,
            consume,
        })
    }

    pub fn for_loop(
        name: impl Into<String>,
        min: Expr,
        extent: Expr,
        kind: ForKind,
        body: Stmt,
    ) -> Stmt {
        assert!(
            min.ty() == Type::I32 && extent.ty() == Type::I32,
            "loop bounds must be scalar i32, found {} and {}",
            min.ty(),
            extent.ty()
        );
        Stmt::new(StmtKind::For {
            name: name.into(),
            min,
            extent,
            kind,
            body,
        })
    }

    pub fn store(name: impl Into<String>, value: Expr, index: Expr) -> Stmt {
        assert!(
            index.ty().lanes == value.ty().lanes,
            "store index width {} does not match value width {}",
            index.ty().lanes,
            value.ty().lanes
        );
        Stmt::new(StmtKind::Store {
            name: name.into(),
            value,
            index,
        })
    }

    pub fn provide(name: impl Into<String>, values: Vec<Expr>, args: Vec<Expr>) -> Stmt {
        Stmt::new(StmtKind::Provide {
            name: name.into(),
            values,
            args,
        })
    }

    pub fn allocate(name: impl Into<String>, ty: Type, size: Expr, body: Stmt) -> Stmt {
        Stmt::new(StmtKind::Allocate {
            name: name.into(),
            ty,
            size,
            body,
        })
    }

    pub fn realize(
        name: impl Into<String>,
        types: Vec<Type>,
        bounds: Vec<Bound>,
        body: Stmt,
    ) -> Stmt {
        Stmt::new(StmtKind::Realize {
            name: name.into(),
            types,
            bounds,
            body,
        })
    }

    pub fn block(first: Stmt, rest: Option<Stmt>) -> Stmt {
        Stmt::new(StmtKind::Block { first, rest })
    }
}
