//! The interval abstract domain over `i64` with ±∞ bounds.

use kirin_interp::{AbstractValue, BranchCondition};
use kirin_ir::{HasBottom, HasTop, Lattice};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    NegInf,
    Finite(i64),
    PosInf,
}

impl Bound {
    pub fn min(self, other: Self) -> Self {
        match (self, other) {
            (Bound::NegInf, _) | (_, Bound::NegInf) => Bound::NegInf,
            (Bound::PosInf, b) | (b, Bound::PosInf) => b,
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a.min(b)),
        }
    }

    pub fn max(self, other: Self) -> Self {
        match (self, other) {
            (Bound::PosInf, _) | (_, Bound::PosInf) => Bound::PosInf,
            (Bound::NegInf, b) | (b, Bound::NegInf) => b,
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a.max(b)),
        }
    }

    pub fn less_than(self, other: Self) -> bool {
        match (self, other) {
            (Bound::NegInf, Bound::NegInf) => false,
            (Bound::NegInf, _) => true,
            (_, Bound::NegInf) => false,
            (Bound::PosInf, _) => false,
            (_, Bound::PosInf) => true,
            (Bound::Finite(a), Bound::Finite(b)) => a < b,
        }
    }

    pub fn less_eq(self, other: Self) -> bool {
        self == other || self.less_than(other)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        match (self, other) {
            (Bound::NegInf, _) | (_, Bound::NegInf) => Bound::NegInf,
            (Bound::PosInf, _) | (_, Bound::PosInf) => Bound::PosInf,
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a.saturating_add(b)),
        }
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        match (self, other) {
            (Bound::NegInf, _) | (_, Bound::PosInf) => Bound::NegInf,
            (Bound::PosInf, _) | (_, Bound::NegInf) => Bound::PosInf,
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a.saturating_sub(b)),
        }
    }

    pub fn saturating_mul(self, other: Self) -> Self {
        match (self, other) {
            (Bound::Finite(0), _) | (_, Bound::Finite(0)) => Bound::Finite(0),
            (Bound::NegInf, Bound::NegInf) | (Bound::PosInf, Bound::PosInf) => Bound::PosInf,
            (Bound::NegInf, Bound::PosInf) | (Bound::PosInf, Bound::NegInf) => Bound::NegInf,
            (Bound::NegInf, Bound::Finite(b)) | (Bound::Finite(b), Bound::NegInf) => {
                if b > 0 { Bound::NegInf } else { Bound::PosInf }
            }
            (Bound::PosInf, Bound::Finite(b)) | (Bound::Finite(b), Bound::PosInf) => {
                if b > 0 { Bound::PosInf } else { Bound::NegInf }
            }
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a.saturating_mul(b)),
        }
    }
}

/// An interval `[lo, hi]`; `lo > hi` represents the empty interval
/// (bottom).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interval {
    pub lo: Bound,
    pub hi: Bound,
}

impl Interval {
    pub fn new(lo: i64, hi: i64) -> Self {
        if lo > hi {
            Self::empty()
        } else {
            Interval {
                lo: Bound::Finite(lo),
                hi: Bound::Finite(hi),
            }
        }
    }

    pub fn constant(value: i64) -> Self {
        Interval::new(value, value)
    }

    pub fn empty() -> Self {
        Interval {
            lo: Bound::PosInf,
            hi: Bound::NegInf,
        }
    }

    pub fn at_most(hi: i64) -> Self {
        Interval {
            lo: Bound::NegInf,
            hi: Bound::Finite(hi),
        }
    }

    pub fn at_least(lo: i64) -> Self {
        Interval {
            lo: Bound::Finite(lo),
            hi: Bound::PosInf,
        }
    }

    pub fn is_empty(&self) -> bool {
        match (self.lo, self.hi) {
            (Bound::PosInf, _) | (_, Bound::NegInf) => true,
            (Bound::Finite(lo), Bound::Finite(hi)) => lo > hi,
            _ => false,
        }
    }
}

pub fn interval_add(a: &Interval, b: &Interval) -> Interval {
    if a.is_empty() || b.is_empty() {
        return Interval::empty();
    }
    Interval {
        lo: a.lo.saturating_add(b.lo),
        hi: a.hi.saturating_add(b.hi),
    }
}

pub fn interval_sub(a: &Interval, b: &Interval) -> Interval {
    if a.is_empty() || b.is_empty() {
        return Interval::empty();
    }
    Interval {
        lo: a.lo.saturating_sub(b.hi),
        hi: a.hi.saturating_sub(b.lo),
    }
}

pub fn interval_mul(a: &Interval, b: &Interval) -> Interval {
    if a.is_empty() || b.is_empty() {
        return Interval::empty();
    }
    let products = [
        a.lo.saturating_mul(b.lo),
        a.lo.saturating_mul(b.hi),
        a.hi.saturating_mul(b.lo),
        a.hi.saturating_mul(b.hi),
    ];
    Interval {
        lo: products.iter().copied().fold(Bound::PosInf, Bound::min),
        hi: products.iter().copied().fold(Bound::NegInf, Bound::max),
    }
}

impl Lattice for Interval {
    fn join(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        Interval {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Interval::empty();
        }
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        if lo.less_eq(hi) { Interval { lo, hi } } else { Interval::empty() }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        if self.is_empty() {
            return true;
        }
        if other.is_empty() {
            return false;
        }
        other.lo.less_eq(self.lo) && self.hi.less_eq(other.hi)
    }
}

impl HasBottom for Interval {
    fn bottom() -> Self {
        Interval::empty()
    }
}

impl HasTop for Interval {
    fn top() -> Self {
        Interval {
            lo: Bound::NegInf,
            hi: Bound::PosInf,
        }
    }
}

impl AbstractValue for Interval {
    /// Bounds that grew since the last iterate are pushed straight to
    /// infinity, so every ascending chain stabilizes after at most two
    /// widenings per side.
    fn widen(&self, next: &Self) -> Self {
        if self.is_empty() {
            return next.clone();
        }
        if next.is_empty() {
            return self.clone();
        }
        let lo = if next.lo.less_than(self.lo) { Bound::NegInf } else { self.lo };
        let hi = if self.hi.less_than(next.hi) { Bound::PosInf } else { self.hi };
        Interval { lo, hi }
    }

    /// Infinite bounds are refined back to the recomputed bound; finite
    /// bounds stay.
    fn narrow(&self, next: &Self) -> Self {
        if self.is_empty() || next.is_empty() {
            return self.clone();
        }
        let lo = match self.lo {
            Bound::NegInf => next.lo,
            other => other,
        };
        let hi = match self.hi {
            Bound::PosInf => next.hi,
            other => other,
        };
        Interval { lo, hi }
    }
}

impl BranchCondition for Interval {
    fn is_truthy(&self) -> Option<bool> {
        if self.is_empty() {
            return None;
        }
        let all_negative = match self.hi {
            Bound::NegInf => true,
            Bound::Finite(hi) => hi < 0,
            Bound::PosInf => false,
        };
        let all_positive = match self.lo {
            Bound::PosInf => true,
            Bound::Finite(lo) => lo > 0,
            Bound::NegInf => false,
        };
        if all_negative || all_positive {
            return Some(true);
        }
        if *self == Interval::constant(0) {
            return Some(false);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::{assert_finite_lattice_laws, assert_narrow_laws, assert_widen_laws};

    fn samples() -> Vec<Interval> {
        vec![
            Interval::empty(),
            Interval::top(),
            Interval::constant(0),
            Interval::constant(42),
            Interval::constant(-10),
            Interval::new(0, 100),
            Interval::new(-50, 50),
            Interval::at_least(0),
            Interval::at_most(100),
        ]
    }

    #[test]
    fn interval_lattice_laws() {
        assert_finite_lattice_laws(&samples());
    }

    #[test]
    fn interval_widen_narrow_laws() {
        assert_widen_laws(&samples());
        assert_narrow_laws(&samples());
    }

    #[test]
    fn widen_pushes_grown_bounds_to_infinity() {
        let w = Interval::new(0, 5).widen(&Interval::new(0, 10));
        assert_eq!(w, Interval::at_least(0));

        let w = Interval::new(0, 5).widen(&Interval::new(-3, 5));
        assert_eq!(w, Interval::at_most(5));
    }

    #[test]
    fn narrow_refines_infinite_bounds_only() {
        let n = Interval::at_least(0).narrow(&Interval::new(0, 100));
        assert_eq!(n, Interval::new(0, 100));

        let n = Interval::new(0, 7).narrow(&Interval::new(2, 5));
        assert_eq!(n, Interval::new(0, 7));
    }

    #[test]
    fn arithmetic_saturates_at_infinities() {
        let sum = interval_add(&Interval::at_least(0), &Interval::constant(1));
        assert_eq!(sum, Interval::at_least(1));

        let product = interval_mul(&Interval::new(-2, 3), &Interval::new(4, 5));
        assert_eq!(product, Interval::new(-10, 15));
    }

    mod random {
        use proptest::prelude::*;

        use super::super::*;
        use kirin_interp::AbstractValue;
        use kirin_ir::Lattice;

        fn interval() -> impl Strategy<Value = Interval> {
            prop_oneof![
                Just(Interval::empty()),
                Just(Interval::top()),
                any::<i32>().prop_map(|v| Interval::constant(v as i64)),
                (any::<i32>(), any::<i32>()).prop_map(|(a, b)| {
                    Interval::new((a as i64).min(b as i64), (a as i64).max(b as i64))
                }),
                any::<i32>().prop_map(|v| Interval::at_least(v as i64)),
                any::<i32>().prop_map(|v| Interval::at_most(v as i64)),
            ]
        }

        proptest! {
            #[test]
            fn join_is_an_upper_bound(a in interval(), b in interval()) {
                let j = a.join(&b);
                prop_assert!(a.is_subseteq(&j));
                prop_assert!(b.is_subseteq(&j));
            }

            #[test]
            fn widen_covers_both_operands(a in interval(), b in interval()) {
                let w = a.widen(&b);
                prop_assert!(a.is_subseteq(&w));
                prop_assert!(b.is_subseteq(&w));
            }

            #[test]
            fn narrow_stays_between_meet_and_left(a in interval(), b in interval()) {
                let n = a.narrow(&b);
                prop_assert!(a.meet(&b).is_subseteq(&n));
                prop_assert!(n.is_subseteq(&a));
            }
        }
    }
}
