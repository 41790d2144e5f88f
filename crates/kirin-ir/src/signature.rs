//! Function signatures and specialization-dispatch policies.

use std::marker::PhantomData;

use crate::lattice::TypeLattice;

/// A function signature over type attribute `T` with optional constraint
/// context `C` (type-variable bindings, effect rows, ...). `C` defaults
/// to unit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature<T, C = ()> {
    pub params: Vec<T>,
    pub ret: T,
    pub constraints: C,
}

impl<T, C> Signature<T, C> {
    pub fn new(params: Vec<T>, ret: T, constraints: C) -> Self {
        Self {
            params,
            ret,
            constraints,
        }
    }
}

impl<T> Signature<T> {
    /// Signature with unit constraints.
    pub fn simple(params: Vec<T>, ret: T) -> Self {
        Self {
            params,
            ret,
            constraints: (),
        }
    }
}

impl<T: Default> Default for Signature<T> {
    fn default() -> Self {
        Signature {
            params: Vec::new(),
            ret: T::default(),
            constraints: (),
        }
    }
}

/// Relative specificity of two applicable candidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureCmp {
    /// Left is strictly more specific.
    More,
    /// Left is strictly less specific.
    Less,
    Equal,
    /// Neither dominates.
    Incomparable,
}

/// Policy deciding which specializations can serve a call and how
/// applicable candidates rank against each other.
///
/// Every stage of one pipeline should use the same semantics so that
/// signatures stay aligned across compilation stages.
pub trait SignatureSemantics<T, C = ()> {
    /// Bindings solved while matching (type variables, constraints).
    type Env;

    /// Can `cand` serve `call`? Returns the solved bindings if so.
    fn applicable(call: &Signature<T, C>, cand: &Signature<T, C>) -> Option<Self::Env>;

    /// Partial order on candidates, both already known applicable.
    fn cmp_candidate(
        a: &Signature<T, C>,
        a_env: &Self::Env,
        b: &Signature<T, C>,
        b_env: &Self::Env,
    ) -> SignatureCmp;
}

/// Applicable iff signatures are equal component-wise; distinct
/// signatures never dominate each other.
pub struct ExactSemantics;

impl<T: PartialEq, C: PartialEq> SignatureSemantics<T, C> for ExactSemantics {
    type Env = ();

    fn applicable(call: &Signature<T, C>, cand: &Signature<T, C>) -> Option<Self::Env> {
        (call.params.len() == cand.params.len()
            && call.params.iter().zip(&cand.params).all(|(a, b)| a == b)
            && call.ret == cand.ret
            && call.constraints == cand.constraints)
            .then_some(())
    }

    fn cmp_candidate(
        a: &Signature<T, C>,
        _a_env: &Self::Env,
        b: &Signature<T, C>,
        _b_env: &Self::Env,
    ) -> SignatureCmp {
        if a == b {
            SignatureCmp::Equal
        } else {
            SignatureCmp::Incomparable
        }
    }
}

/// Subtype-based dispatch over a [`TypeLattice`]: applicable iff every
/// call parameter and the call return are `is_subseteq` the candidate's;
/// candidates rank by pointwise `is_subseteq`, smaller-in-the-lattice
/// being more specific.
pub struct LatticeSemantics<T: TypeLattice>(PhantomData<T>);

impl<T: TypeLattice> SignatureSemantics<T> for LatticeSemantics<T> {
    type Env = ();

    fn applicable(call: &Signature<T>, cand: &Signature<T>) -> Option<Self::Env> {
        if call.params.len() != cand.params.len() {
            return None;
        }
        let params_accepted = call
            .params
            .iter()
            .zip(&cand.params)
            .all(|(call_param, cand_param)| call_param.is_subseteq(cand_param));
        (params_accepted && call.ret.is_subseteq(&cand.ret)).then_some(())
    }

    fn cmp_candidate(
        a: &Signature<T>,
        _a_env: &Self::Env,
        b: &Signature<T>,
        _b_env: &Self::Env,
    ) -> SignatureCmp {
        if a.params.len() != b.params.len() {
            return SignatureCmp::Incomparable;
        }
        let a_below_b = a.params.iter().zip(&b.params).all(|(ap, bp)| ap.is_subseteq(bp));
        let b_below_a = b.params.iter().zip(&a.params).all(|(bp, ap)| bp.is_subseteq(ap));
        match (a_below_b, b_below_a) {
            (true, true) => SignatureCmp::Equal,
            (true, false) => SignatureCmp::More,
            (false, true) => SignatureCmp::Less,
            (false, false) => SignatureCmp::Incomparable,
        }
    }
}
