//! Lattice algebra for type attributes and abstract values.

/// A lattice with join (least upper bound), meet (greatest lower bound),
/// and a subset ordering.
///
/// Implementations must satisfy the usual algebraic laws:
///
/// - `join` and `meet` are associative, commutative and idempotent;
/// - absorption: `a.join(&a.meet(&b)) == a` and `a.meet(&a.join(&b)) == a`;
/// - `a.is_subseteq(&b)` iff `a.join(&b) == b` iff `a.meet(&b) == a`.
///
/// Violating these laws is a programmer error; the assertion helpers in
/// `kirin-test-utils` check them over a sample of elements.
pub trait Lattice {
    fn join(&self, other: &Self) -> Self;
    fn meet(&self, other: &Self) -> Self;
    fn is_subseteq(&self, other: &Self) -> bool;
}

/// A lattice with a least element.
///
/// `bottom()` must be below every element, the identity for `join`, and
/// absorbing for `meet`.
pub trait HasBottom: Lattice {
    fn bottom() -> Self;
}

/// A lattice with a greatest element.
///
/// `top()` must be above every element, absorbing for `join`, and the
/// identity for `meet`.
pub trait HasTop: Lattice {
    fn top() -> Self;
}

/// A lattice bounded on both ends.
pub trait FiniteLattice: HasBottom + HasTop {}

impl<T: HasBottom + HasTop> FiniteLattice for T {}

/// Minimum interface for a dialect's type attribute: cheap to clone,
/// comparable, hashable, with a default placeholder for values whose type
/// is not yet known.
pub trait TypeAttribute: Clone + PartialEq + Eq + std::hash::Hash + std::fmt::Debug + Default {}

impl<T: Clone + PartialEq + Eq + std::hash::Hash + std::fmt::Debug + Default> TypeAttribute for T {}

/// Type attributes that additionally form a bounded lattice, enabling
/// subtype-based specialization dispatch
/// ([`LatticeSemantics`](crate::signature::LatticeSemantics)).
pub trait TypeLattice: FiniteLattice + TypeAttribute {}

impl<T: FiniteLattice + TypeAttribute> TypeLattice for T {}
