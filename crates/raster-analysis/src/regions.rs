//! Multi-dimensional regions and the touched-region oracle.

use raster_ir::{max, min, Stmt};

use crate::bounds::Interval;

/// A region of a multi-dimensional buffer: one interval per dimension.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Region {
    pub dims: Vec<Interval>,
}

impl Region {
    pub fn new(dims: Vec<Interval>) -> Self {
        Self { dims }
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Grows this region to also cover `other`, dimension by dimension.
    ///
    /// An endpoint undefined on either side is undefined in the union.
    pub fn merge(&mut self, other: &Region) {
        assert_eq!(
            self.dims.len(),
            other.dims.len(),
            "merging regions of different dimensionality"
        );
        for (a, b) in self.dims.iter_mut().zip(&other.dims) {
            a.min = match (a.min.take(), &b.min) {
                (Some(x), Some(y)) => Some(min(x, y.clone())),
                _ => None,
            };
            a.max = match (a.max.take(), &b.max) {
                (Some(x), Some(y)) => Some(max(x, y.clone())),
                _ => None,
            };
        }
    }
}

impl FromIterator<Interval> for Region {
    fn from_iter<I: IntoIterator<Item = Interval>>(iter: I) -> Self {
        Region::new(iter.into_iter().collect())
    }
}

/// Supplies the region of a buffer touched by a statement.
///
/// The analysis behind this is owned by the bounds-inference machinery; the
/// allocation pass only depends on this contract. Implementations must be
/// conservative: the returned region covers every access `body` makes to
/// `name`.
pub trait RegionOracle {
    fn box_touched(&self, body: &Stmt, name: &str) -> Region;
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_ir::Expr;

    fn iv(lo: i64, hi: i64) -> Interval {
        Interval::new(Some(Expr::int(lo)), Some(Expr::int(hi)))
    }

    #[test]
    fn merge_takes_unions() {
        let mut a = Region::new(vec![iv(0, 10)]);
        let b = Region::new(vec![iv(-5, 3)]);
        a.merge(&b);
        let d = &a.dims[0];
        assert_eq!(d.min.as_ref().unwrap().to_string(), "min(0, -5)");
        assert_eq!(d.max.as_ref().unwrap().to_string(), "max(10, 3)");
    }

    #[test]
    fn merge_drops_unbounded_endpoints() {
        let mut a = Region::new(vec![iv(0, 10)]);
        let b = Region::new(vec![Interval::new(None, Some(Expr::int(3)))]);
        a.merge(&b);
        assert_eq!(a.dims[0].min, None);
        assert!(a.dims[0].max.is_some());
    }

    #[test]
    #[should_panic(expected = "different dimensionality")]
    fn dimension_mismatch_panics() {
        let mut a = Region::new(vec![iv(0, 1)]);
        a.merge(&Region::new(vec![iv(0, 1), iv(0, 1)]));
    }
}
