//! Error types for the raster IR.

use crate::types::Type;

/// Structural invariant violations detected while constructing IR.
///
/// Factories treat these as bugs in the calling pass and abort with the
/// formatted message rather than returning them.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// Binary operands must share a type.
    #[error("operand type mismatch: {left} vs {right}")]
    TypeMismatch { left: Type, right: Type },

    /// Vector widths of related operands must agree.
    #[error("vector width mismatch: {left} vs {right} lanes")]
    LaneMismatch { left: u16, right: u16 },

    /// A scalar operand was required.
    #[error("expected a scalar operand, found {found}")]
    ExpectedScalar { found: Type },

    /// A boolean operand was required.
    #[error("expected a boolean operand, found {found}")]
    ExpectedBool { found: Type },
}
