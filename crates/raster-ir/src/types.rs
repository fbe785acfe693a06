//! Type system for the raster IR.

/// The kind of a scalar element.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ScalarKind {
    /// Signed integer.
    Int,
    /// Unsigned integer. `UInt(1)` doubles as the boolean type.
    UInt,
    /// Floating point.
    Float,
    /// An opaque pointer-sized handle.
    Handle,
}

/// A scalar or vector type: element kind, element bit width, and lane count.
///
/// Two types are equal iff all three fields match. A type is scalar iff it
/// has exactly one lane.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Type {
    pub kind: ScalarKind,
    pub bits: u8,
    pub lanes: u16,
}

impl Type {
    pub const I8: Type = Type::int(8);
    pub const I16: Type = Type::int(16);
    pub const I32: Type = Type::int(32);
    pub const U8: Type = Type::uint(8);
    pub const U16: Type = Type::uint(16);
    pub const U32: Type = Type::uint(32);
    pub const F32: Type = Type::float(32);
    pub const F64: Type = Type::float(64);
    pub const BOOL: Type = Type::uint(1);

    /// A scalar signed integer type.
    pub const fn int(bits: u8) -> Type {
        Type {
            kind: ScalarKind::Int,
            bits,
            lanes: 1,
        }
    }

    /// A scalar unsigned integer type.
    pub const fn uint(bits: u8) -> Type {
        Type {
            kind: ScalarKind::UInt,
            bits,
            lanes: 1,
        }
    }

    /// A scalar floating-point type.
    pub const fn float(bits: u8) -> Type {
        Type {
            kind: ScalarKind::Float,
            bits,
            lanes: 1,
        }
    }

    /// An opaque handle type.
    pub const fn handle() -> Type {
        Type {
            kind: ScalarKind::Handle,
            bits: 64,
            lanes: 1,
        }
    }

    /// The same element type with a different lane count.
    pub const fn with_lanes(self, lanes: u16) -> Type {
        Type { lanes, ..self }
    }

    /// The scalar element type of this type.
    pub const fn element_of(self) -> Type {
        self.with_lanes(1)
    }

    pub const fn is_scalar(self) -> bool {
        self.lanes == 1
    }

    pub const fn is_vector(self) -> bool {
        self.lanes > 1
    }

    pub const fn is_int(self) -> bool {
        matches!(self.kind, ScalarKind::Int)
    }

    pub const fn is_uint(self) -> bool {
        matches!(self.kind, ScalarKind::UInt)
    }

    pub const fn is_float(self) -> bool {
        matches!(self.kind, ScalarKind::Float)
    }

    pub const fn is_handle(self) -> bool {
        matches!(self.kind, ScalarKind::Handle)
    }

    /// True for `UInt(1)` of any lane count.
    pub const fn is_bool(self) -> bool {
        self.is_uint() && self.bits == 1
    }

    /// The smallest representable value of an integer type.
    ///
    /// Panics for float and handle kinds.
    pub fn imin(self) -> i64 {
        match self.kind {
            ScalarKind::Int => {
                if self.bits >= 64 {
                    i64::MIN
                } else {
                    -(1i64 << (self.bits - 1))
                }
            }
            ScalarKind::UInt => 0,
            _ => panic!("imin of non-integer type {self}"),
        }
    }

    /// The largest representable value of an integer type.
    ///
    /// Panics for float and handle kinds. Unsigned widths above 63 bits
    /// saturate to `i64::MAX`.
    pub fn imax(self) -> i64 {
        match self.kind {
            ScalarKind::Int => {
                if self.bits >= 64 {
                    i64::MAX
                } else {
                    (1i64 << (self.bits - 1)) - 1
                }
            }
            ScalarKind::UInt => {
                if self.bits >= 64 {
                    i64::MAX
                } else {
                    (1i64 << self.bits) - 1
                }
            }
            _ => panic!("imax of non-integer type {self}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_constants() {
        assert_eq!(Type::I32.kind, ScalarKind::Int);
        assert_eq!(Type::I32.bits, 32);
        assert_eq!(Type::I32.lanes, 1);
        assert_eq!(Type::U8.kind, ScalarKind::UInt);
        assert!(Type::BOOL.is_bool());
        assert!(!Type::U8.is_bool());
    }

    #[test]
    fn lane_manipulation() {
        let v = Type::F32.with_lanes(4);
        assert!(v.is_vector());
        assert_eq!(v.element_of(), Type::F32);
        assert!(Type::F32.is_scalar());
    }

    #[test]
    fn integer_extremes() {
        assert_eq!(Type::I8.imin(), -128);
        assert_eq!(Type::I8.imax(), 127);
        assert_eq!(Type::I32.imin(), -2147483648);
        assert_eq!(Type::I32.imax(), 2147483647);
        assert_eq!(Type::U16.imin(), 0);
        assert_eq!(Type::U16.imax(), 65535);
        assert_eq!(Type::U32.imax(), 4294967295);
    }

    #[test]
    fn type_equality_is_three_way() {
        assert_ne!(Type::I32, Type::U32);
        assert_ne!(Type::I32, Type::I16);
        assert_ne!(Type::I32, Type::I32.with_lanes(4));
        assert_eq!(Type::I32.with_lanes(4), Type::int(32).with_lanes(4));
    }
}
