//! Abstract value domains and widening strategies.

use rustc_hash::FxHashSet;

use kirin_ir::{Block, HasBottom, Lattice};

/// A lattice extended with convergence acceleration.
///
/// `widen` is required and must satisfy `self ⊑ widen(self, next)` and
/// `next ⊑ widen(self, next)`, with every ascending chain
/// `x₀, widen(x₀, x₁), widen(·, x₂), …` stabilizing in finitely many
/// steps. `narrow` defaults to identity and must satisfy
/// `self ⊓ next ⊑ narrow(self, next) ⊑ self`, with descending chains
/// stabilizing. Violations make the fixpoint bail with
/// [`DidNotConverge`](crate::InterpreterError::DidNotConverge) instead of
/// looping.
pub trait AbstractValue: Lattice + HasBottom + Clone + std::fmt::Debug {
    fn widen(&self, next: &Self) -> Self;

    fn narrow(&self, next: &Self) -> Self {
        let _ = next;
        self.clone()
    }
}

/// Where the ascending phase applies `widen` instead of plain `join`.
#[derive(Debug, Clone, Default)]
pub enum WideningStrategy {
    /// Widen at every join. Eagerly terminating, least precise.
    #[default]
    AllJoins,
    /// Widen only at the given loop-header blocks. Header identification
    /// is an input: supplied by a structural pre-pass or by the caller,
    /// never computed here.
    LoopHeaders(FxHashSet<Block>),
    /// Widen only after this many ascending revisits of a given block.
    Delayed(usize),
}

impl WideningStrategy {
    /// Merge an edge's incoming state into a block's entry state.
    ///
    /// `revisits` counts prior ascending revisits of `target`.
    pub fn merge<V: AbstractValue>(&self, prior: &V, next: &V, target: Block, revisits: usize) -> V {
        let joined = prior.join(next);
        let widen = match self {
            WideningStrategy::AllJoins => true,
            WideningStrategy::LoopHeaders(headers) => headers.contains(&target),
            WideningStrategy::Delayed(k) => revisits >= *k,
        };
        if widen { prior.widen(&joined) } else { joined }
    }
}
