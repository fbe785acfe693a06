//! Display implementations for types, expressions, and statements.

use std::fmt;

use crate::expr::{CallType, Expr, ExprKind};
use crate::stmt::{ForKind, Stmt, StmtKind};
use crate::types::{ScalarKind, Type};

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScalarKind::Int => write!(f, "i{}", self.bits)?,
            ScalarKind::UInt => {
                if self.bits == 1 {
                    write!(f, "bool")?
                } else {
                    write!(f, "u{}", self.bits)?
                }
            }
            ScalarKind::Float => write!(f, "f{}", self.bits)?,
            ScalarKind::Handle => write!(f, "handle")?,
        }
        if self.lanes > 1 {
            write!(f, "x{}", self.lanes)?;
        }
        Ok(())
    }
}

impl fmt::Display for ForKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "for"),
            Self::Parallel => write!(f, "parallel"),
            Self::Vectorized => write!(f, "vectorized"),
            Self::Unrolled => write!(f, "unrolled"),
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Halide => write!(f, "halide"),
            Self::Extern => write!(f, "extern"),
            Self::Intrinsic => write!(f, "intrinsic"),
        }
    }
}

fn infix(f: &mut fmt::Formatter<'_>, a: &Expr, op: &str, b: &Expr) -> fmt::Result {
    write!(f, "({a} {op} {b})")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::IntImm(v) => write!(f, "{v}"),
            ExprKind::FloatImm(v) => write!(f, "{v:?}f"),
            ExprKind::Cast(value) => write!(f, "{}({value})", self.ty()),
            ExprKind::Variable(name) => write!(f, "{name}"),
            ExprKind::Add(a, b) => infix(f, a, "+", b),
            ExprKind::Sub(a, b) => infix(f, a, "-", b),
            ExprKind::Mul(a, b) => infix(f, a, "*", b),
            ExprKind::Div(a, b) => infix(f, a, "/", b),
            ExprKind::Mod(a, b) => infix(f, a, "%", b),
            ExprKind::Min(a, b) => write!(f, "min({a}, {b})"),
            ExprKind::Max(a, b) => write!(f, "max({a}, {b})"),
            ExprKind::Eq(a, b) => infix(f, a, "==", b),
            ExprKind::Ne(a, b) => infix(f, a, "!=", b),
            ExprKind::Lt(a, b) => infix(f, a, "<", b),
            ExprKind::Le(a, b) => infix(f, a, "<=", b),
            ExprKind::Gt(a, b) => infix(f, a, ">", b),
            ExprKind::Ge(a, b) => infix(f, a, ">=", b),
            ExprKind::And(a, b) => infix(f, a, "&&", b),
            ExprKind::Or(a, b) => infix(f, a, "||", b),
            ExprKind::Not(a) => write!(f, "!({a})"),
            ExprKind::Select {
                condition,
                true_value,
                false_value,
            } => write!(f, "select({condition}, {true_value}, {false_value})"),
            ExprKind::Load { name, index, .. } => write!(f, "{name}[{index}]"),
            ExprKind::Ramp { base, stride, lanes } => {
                write!(f, "ramp({base}, {stride}, {lanes})")
            }
            ExprKind::Broadcast { value, lanes } => write!(f, "x{lanes}({value})"),
            ExprKind::Call {
                name,
                args,
                call_type,
            } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ") [{call_type}]")
            }
            ExprKind::Let { name, value, body } => {
                write!(f, "(let {name} = {value} in {body})")
            }
        }
    }
}

fn fmt_stmt(s: &Stmt, indent: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let pad = "  ".repeat(indent);
    match s.kind() {
        StmtKind::LetStmt { name, value, body } => {
            writeln!(f, "{pad}let {name} = {value}")?;
            fmt_stmt(body, indent, f)
        }
        StmtKind::AssertStmt { condition, message } => {
            writeln!(f, "{pad}assert({condition}, {message:?})")
        }
        StmtKind::Pipeline {
            name,
            produce,
            update,
            consume,
        } => {
            writeln!(f, "{pad}produce {name} {{")?;
            fmt_stmt(produce, indent + 1, f)?;
            if let Some(update) = update {
                writeln!(f, "{pad}}} update {{")?;
                fmt_stmt(update, indent + 1, f)?;
            }
            writeln!(f, "{pad}}} consume {{")?;
            fmt_stmt(consume, indent + 1, f)?;
            writeln!(f, "{pad}}}")
        }
        StmtKind::For {
            name,
            min,
            extent,
            kind,
            body,
        } => {
            writeln!(f, "{pad}{kind} ({name}, {min}, {extent}) {{")?;
            fmt_stmt(body, indent + 1, f)?;
            writeln!(f, "{pad}}}")
        }
        StmtKind::Store { name, value, index } => {
            writeln!(f, "{pad}{name}[{index}] = {value}")
        }
        StmtKind::Provide { name, values, args } => {
            write!(f, "{pad}{name}(")?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ") = ")?;
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{value}")?;
            }
            writeln!(f)
        }
        StmtKind::Allocate {
            name,
            ty,
            size,
            body,
        } => {
            writeln!(f, "{pad}allocate {name}[{ty} * {size}]")?;
            fmt_stmt(body, indent, f)
        }
        StmtKind::Realize {
            name,
            types,
            bounds,
            body,
        } => {
            write!(f, "{pad}realize {name}(")?;
            for (i, b) in bounds.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "[{}, {}]", b.min, b.extent)?;
            }
            write!(f, ") : ")?;
            for (i, t) in types.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{t}")?;
            }
            writeln!(f, " {{")?;
            fmt_stmt(body, indent + 1, f)?;
            writeln!(f, "{pad}}}")
        }
        StmtKind::Block { first, rest } => {
            fmt_stmt(first, indent, f)?;
            if let Some(rest) = rest {
                fmt_stmt(rest, indent, f)?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_stmt(self, 0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::const_true;
    use crate::stmt::ForKind;

    #[test]
    fn type_formatting() {
        assert_eq!(Type::I32.to_string(), "i32");
        assert_eq!(Type::U8.with_lanes(4).to_string(), "u8x4");
        assert_eq!(Type::BOOL.to_string(), "bool");
        assert_eq!(Type::F32.to_string(), "f32");
    }

    #[test]
    fn expr_formatting() {
        let x = Expr::var(Type::I32, "x");
        let e = crate::ops::min(x.clone() + 3, Expr::int(7));
        assert_eq!(e.to_string(), "min((x + 3), 7)");
        let r = Expr::ramp(x.clone(), Expr::int(2), 4);
        assert_eq!(r.to_string(), "ramp(x, 2, 4)");
        let b = Expr::broadcast(Expr::float(1.5), 4);
        assert_eq!(b.to_string(), "x4(1.5f)");
    }

    #[test]
    fn stmt_formatting() {
        let x = Expr::var(Type::I32, "x");
        let body = Stmt::store("out", x.clone(), Expr::int(0));
        let s = Stmt::for_loop("i", Expr::int(0), Expr::int(8), ForKind::Serial, body);
        let text = s.to_string();
        assert!(text.contains("for (i, 0, 8) {"));
        assert!(text.contains("out[0] = x"));
        let a = Stmt::assert_stmt(const_true(1), "ok");
        assert!(a.to_string().contains("assert"));
    }
}
