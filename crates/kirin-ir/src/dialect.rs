//! The dialect abstraction.
//!
//! A dialect is a value-typed sum whose variants are statement kinds. Each
//! statement value exposes ordered views of its operands, results,
//! successor blocks and owned regions, plus four boolean property
//! predicates. A *language* is a dialect composed by wrapping sub-dialects
//! into a parent enum; all views and predicates forward through the
//! wrapper (see [`forward_dialect!`]).

use crate::lattice::TypeAttribute;
use crate::node::{Block, Region, ResultValue, SSAValue, SpecializedFunction, Successor};

pub trait HasOperands<'a> {
    type Iter: Iterator<Item = &'a SSAValue>;
    fn operands(&'a self) -> Self::Iter;
}

pub trait HasOperandsMut<'a> {
    type IterMut: Iterator<Item = &'a mut SSAValue>;
    fn operands_mut(&'a mut self) -> Self::IterMut;
}

pub trait HasResults<'a> {
    type Iter: Iterator<Item = &'a ResultValue>;
    fn results(&'a self) -> Self::Iter;
}

pub trait HasResultsMut<'a> {
    type IterMut: Iterator<Item = &'a mut ResultValue>;
    fn results_mut(&'a mut self) -> Self::IterMut;
}

pub trait HasSuccessors<'a> {
    type Iter: Iterator<Item = &'a Successor>;
    fn successors(&'a self) -> Self::Iter;
}

pub trait HasSuccessorsMut<'a> {
    type IterMut: Iterator<Item = &'a mut Successor>;
    fn successors_mut(&'a mut self) -> Self::IterMut;
}

pub trait HasRegions<'a> {
    type Iter: Iterator<Item = &'a Region>;
    fn regions(&'a self) -> Self::Iter;
}

pub trait HasRegionsMut<'a> {
    type IterMut: Iterator<Item = &'a mut Region>;
    fn regions_mut(&'a mut self) -> Self::IterMut;
}

/// Must appear exactly once, as the last statement of its block.
pub trait IsTerminator {
    fn is_terminator(&self) -> bool;
}

/// Result determined by the definition payload alone.
pub trait IsConstant {
    fn is_constant(&self) -> bool;
}

/// No observable side effects; a dead pure statement may be erased.
pub trait IsPure {
    fn is_pure(&self) -> bool;
}

/// Safe to execute with an unused result (no trap). Implies pure;
/// `div`/`rem` are pure but not speculatable.
pub trait IsSpeculatable {
    fn is_speculatable(&self) -> bool;
}

/// Call-site capability.
///
/// Statements that call a specialization resolved *within the same stage*
/// report it here so that insertion and erasure can maintain the callee's
/// backedge set. Non-call statements keep the default.
pub trait HasCallTarget {
    fn call_target(&self) -> Option<SpecializedFunction> {
        None
    }
}

/// A dialect: the full capability set over one statement-kind sum.
pub trait Dialect:
    for<'a> HasOperands<'a>
    + for<'a> HasOperandsMut<'a>
    + for<'a> HasResults<'a>
    + for<'a> HasResultsMut<'a>
    + for<'a> HasSuccessors<'a>
    + for<'a> HasSuccessorsMut<'a>
    + for<'a> HasRegions<'a>
    + for<'a> HasRegionsMut<'a>
    + IsTerminator
    + IsConstant
    + IsPure
    + IsSpeculatable
    + HasCallTarget
    + Clone
    + PartialEq
    + std::fmt::Debug
{
    type Type: TypeAttribute;
}

/// Forward every structural view and predicate of a wrapping dialect enum
/// to its variants.
///
/// Derive machinery is out of scope for this crate, so composed languages
/// write their enum by hand and let this macro generate the mechanical
/// forwarding impls. Iterator forwarding is boxed; wrapper dispatch is one
/// match per call, which is not on any hot path (hot paths hold the inner
/// statement value already).
///
/// ```ignore
/// #[derive(Clone, Debug, PartialEq)]
/// enum Lang {
///     Arith(ArithStmt),
///     Cf(CfStmt),
/// }
/// forward_dialect!(Lang { Arith, Cf });
/// impl Dialect for Lang { type Type = SimpleType; }
/// ```
#[macro_export]
macro_rules! forward_dialect {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        impl<'a> $crate::HasOperands<'a> for $name {
            type Iter = Box<dyn Iterator<Item = &'a $crate::SSAValue> + 'a>;
            fn operands(&'a self) -> Self::Iter {
                match self {
                    $($name::$variant(inner) => Box::new($crate::HasOperands::operands(inner)),)+
                }
            }
        }

        impl<'a> $crate::HasOperandsMut<'a> for $name {
            type IterMut = Box<dyn Iterator<Item = &'a mut $crate::SSAValue> + 'a>;
            fn operands_mut(&'a mut self) -> Self::IterMut {
                match self {
                    $($name::$variant(inner) => Box::new($crate::HasOperandsMut::operands_mut(inner)),)+
                }
            }
        }

        impl<'a> $crate::HasResults<'a> for $name {
            type Iter = Box<dyn Iterator<Item = &'a $crate::ResultValue> + 'a>;
            fn results(&'a self) -> Self::Iter {
                match self {
                    $($name::$variant(inner) => Box::new($crate::HasResults::results(inner)),)+
                }
            }
        }

        impl<'a> $crate::HasResultsMut<'a> for $name {
            type IterMut = Box<dyn Iterator<Item = &'a mut $crate::ResultValue> + 'a>;
            fn results_mut(&'a mut self) -> Self::IterMut {
                match self {
                    $($name::$variant(inner) => Box::new($crate::HasResultsMut::results_mut(inner)),)+
                }
            }
        }

        impl<'a> $crate::HasSuccessors<'a> for $name {
            type Iter = Box<dyn Iterator<Item = &'a $crate::Successor> + 'a>;
            fn successors(&'a self) -> Self::Iter {
                match self {
                    $($name::$variant(inner) => Box::new($crate::HasSuccessors::successors(inner)),)+
                }
            }
        }

        impl<'a> $crate::HasSuccessorsMut<'a> for $name {
            type IterMut = Box<dyn Iterator<Item = &'a mut $crate::Successor> + 'a>;
            fn successors_mut(&'a mut self) -> Self::IterMut {
                match self {
                    $($name::$variant(inner) => Box::new($crate::HasSuccessorsMut::successors_mut(inner)),)+
                }
            }
        }

        impl<'a> $crate::HasRegions<'a> for $name {
            type Iter = Box<dyn Iterator<Item = &'a $crate::Region> + 'a>;
            fn regions(&'a self) -> Self::Iter {
                match self {
                    $($name::$variant(inner) => Box::new($crate::HasRegions::regions(inner)),)+
                }
            }
        }

        impl<'a> $crate::HasRegionsMut<'a> for $name {
            type IterMut = Box<dyn Iterator<Item = &'a mut $crate::Region> + 'a>;
            fn regions_mut(&'a mut self) -> Self::IterMut {
                match self {
                    $($name::$variant(inner) => Box::new($crate::HasRegionsMut::regions_mut(inner)),)+
                }
            }
        }

        impl $crate::IsTerminator for $name {
            fn is_terminator(&self) -> bool {
                match self {
                    $($name::$variant(inner) => $crate::IsTerminator::is_terminator(inner),)+
                }
            }
        }

        impl $crate::IsConstant for $name {
            fn is_constant(&self) -> bool {
                match self {
                    $($name::$variant(inner) => $crate::IsConstant::is_constant(inner),)+
                }
            }
        }

        impl $crate::IsPure for $name {
            fn is_pure(&self) -> bool {
                match self {
                    $($name::$variant(inner) => $crate::IsPure::is_pure(inner),)+
                }
            }
        }

        impl $crate::IsSpeculatable for $name {
            fn is_speculatable(&self) -> bool {
                match self {
                    $($name::$variant(inner) => $crate::IsSpeculatable::is_speculatable(inner),)+
                }
            }
        }

        impl $crate::HasCallTarget for $name {
            fn call_target(&self) -> Option<$crate::SpecializedFunction> {
                match self {
                    $($name::$variant(inner) => $crate::HasCallTarget::call_target(inner),)+
                }
            }
        }
    };
}

/// Implement the empty structural views for statement kinds that have none
/// of the given capability (no successors, no regions, ...).
///
/// Spelled per-capability so a statement with operands and results but no
/// successors can pick exactly the empties it needs.
#[macro_export]
macro_rules! empty_dialect_views {
    ($name:ty: operands) => {
        impl<'a> $crate::HasOperands<'a> for $name {
            type Iter = std::iter::Empty<&'a $crate::SSAValue>;
            fn operands(&'a self) -> Self::Iter {
                std::iter::empty()
            }
        }
        impl<'a> $crate::HasOperandsMut<'a> for $name {
            type IterMut = std::iter::Empty<&'a mut $crate::SSAValue>;
            fn operands_mut(&'a mut self) -> Self::IterMut {
                std::iter::empty()
            }
        }
    };
    ($name:ty: results) => {
        impl<'a> $crate::HasResults<'a> for $name {
            type Iter = std::iter::Empty<&'a $crate::ResultValue>;
            fn results(&'a self) -> Self::Iter {
                std::iter::empty()
            }
        }
        impl<'a> $crate::HasResultsMut<'a> for $name {
            type IterMut = std::iter::Empty<&'a mut $crate::ResultValue>;
            fn results_mut(&'a mut self) -> Self::IterMut {
                std::iter::empty()
            }
        }
    };
    ($name:ty: successors) => {
        impl<'a> $crate::HasSuccessors<'a> for $name {
            type Iter = std::iter::Empty<&'a $crate::Successor>;
            fn successors(&'a self) -> Self::Iter {
                std::iter::empty()
            }
        }
        impl<'a> $crate::HasSuccessorsMut<'a> for $name {
            type IterMut = std::iter::Empty<&'a mut $crate::Successor>;
            fn successors_mut(&'a mut self) -> Self::IterMut {
                std::iter::empty()
            }
        }
    };
    ($name:ty: regions) => {
        impl<'a> $crate::HasRegions<'a> for $name {
            type Iter = std::iter::Empty<&'a $crate::Region>;
            fn regions(&'a self) -> Self::Iter {
                std::iter::empty()
            }
        }
        impl<'a> $crate::HasRegionsMut<'a> for $name {
            type IterMut = std::iter::Empty<&'a mut $crate::Region>;
            fn regions_mut(&'a mut self) -> Self::IterMut {
                std::iter::empty()
            }
        }
    };
    ($name:ty: $($cap:ident),+) => {
        $($crate::empty_dialect_views!($name: $cap);)+
    };
}
