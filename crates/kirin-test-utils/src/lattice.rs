//! Assertion helpers for lattice, widening and narrowing laws.
//!
//! Each helper checks its laws over a caller-supplied sample of elements
//! and collects every violation into one combined report, so a broken
//! implementation shows all failing laws at once.

use std::fmt::{Debug, Write};

use kirin_interp::AbstractValue;
use kirin_ir::{HasBottom, HasTop, Lattice};

/// How many widening (or narrowing) steps a chain may take before it is
/// considered non-stabilizing.
const CHAIN_BOUND: usize = 64;

fn report(violations: Vec<String>) {
    if violations.is_empty() {
        return;
    }
    let mut msg = format!("{} lattice law violation(s):\n", violations.len());
    for (i, v) in violations.iter().enumerate() {
        let _ = writeln!(msg, "  {}. {}", i + 1, v);
    }
    panic!("{msg}");
}

/// `join` is commutative, associative and idempotent over the sample.
pub fn assert_join_laws<L: Lattice + PartialEq + Debug>(elements: &[L]) {
    let mut violations = Vec::new();
    check_join_laws(elements, &mut violations);
    report(violations);
}

/// `meet` is commutative, associative and idempotent over the sample.
pub fn assert_meet_laws<L: Lattice + PartialEq + Debug>(elements: &[L]) {
    let mut violations = Vec::new();
    check_meet_laws(elements, &mut violations);
    report(violations);
}

/// `a.join(&a.meet(&b)) == a` and `a.meet(&a.join(&b)) == a`.
pub fn assert_absorption<L: Lattice + PartialEq + Debug>(elements: &[L]) {
    let mut violations = Vec::new();
    check_absorption(elements, &mut violations);
    report(violations);
}

/// `is_subseteq` agrees with both `join` and `meet`.
pub fn assert_ordering_consistent<L: Lattice + PartialEq + Debug>(elements: &[L]) {
    let mut violations = Vec::new();
    check_ordering_consistent(elements, &mut violations);
    report(violations);
}

/// All [`Lattice`] laws: join, meet, absorption, ordering consistency.
pub fn assert_lattice_laws<L: Lattice + PartialEq + Debug>(elements: &[L]) {
    let mut violations = Vec::new();
    check_join_laws(elements, &mut violations);
    check_meet_laws(elements, &mut violations);
    check_absorption(elements, &mut violations);
    check_ordering_consistent(elements, &mut violations);
    report(violations);
}

/// Lattice laws plus bottom and top element laws. The most thorough
/// check for bounded lattices; bottom and top are tested in addition to
/// the provided sample.
pub fn assert_finite_lattice_laws<L: HasBottom + HasTop + PartialEq + Debug>(elements: &[L]) {
    let mut violations = Vec::new();
    check_join_laws(elements, &mut violations);
    check_meet_laws(elements, &mut violations);
    check_absorption(elements, &mut violations);
    check_ordering_consistent(elements, &mut violations);
    check_bottom_laws(elements, &mut violations);
    check_top_laws(elements, &mut violations);
    report(violations);
}

/// Widening contract: `x ⊑ widen(x, y)`, `y ⊑ widen(x, y)`, and the
/// ascending chain `z₀ = x, zₙ₊₁ = widen(zₙ, zₙ.join(yₙ))` stabilizes
/// within a bounded number of steps for every pair drawn from the
/// sample.
pub fn assert_widen_laws<V: AbstractValue + PartialEq + Debug>(elements: &[V]) {
    let mut violations = Vec::new();
    for x in elements {
        for y in elements {
            let w = x.widen(y);
            if !x.is_subseteq(&w) {
                violations.push(format!("widen not increasing: {x:?} ⋢ widen({x:?}, {y:?})"));
            }
            if !y.is_subseteq(&w) {
                violations.push(format!("widen not covering: {y:?} ⋢ widen({x:?}, {y:?})"));
            }
        }
    }
    // Chain stabilization: repeatedly widen against every sample element.
    for x in elements {
        let mut z = x.clone();
        let mut steps = 0;
        loop {
            let mut next = z.clone();
            for y in elements {
                next = next.widen(&next.join(y));
            }
            if next.is_subseteq(&z) && z.is_subseteq(&next) {
                break;
            }
            z = next;
            steps += 1;
            if steps > CHAIN_BOUND {
                violations.push(format!(
                    "ascending chain from {x:?} did not stabilize within {CHAIN_BOUND} widenings"
                ));
                break;
            }
        }
    }
    report(violations);
}

/// Narrowing contract: `x ⊓ y ⊑ narrow(x, y) ⊑ x`, and the descending
/// chain `z₀ = x, zₙ₊₁ = narrow(zₙ, y)` stabilizes.
pub fn assert_narrow_laws<V: AbstractValue + PartialEq + Debug>(elements: &[V]) {
    let mut violations = Vec::new();
    for x in elements {
        for y in elements {
            let n = x.narrow(y);
            if !x.meet(y).is_subseteq(&n) {
                violations.push(format!(
                    "narrow below meet: {x:?} ⊓ {y:?} ⋢ narrow({x:?}, {y:?})"
                ));
            }
            if !n.is_subseteq(x) {
                violations.push(format!("narrow not decreasing: narrow({x:?}, {y:?}) ⋢ {x:?}"));
            }

            let mut z = x.clone();
            let mut steps = 0;
            loop {
                let next = z.narrow(y);
                if next.is_subseteq(&z) && z.is_subseteq(&next) {
                    break;
                }
                z = next;
                steps += 1;
                if steps > CHAIN_BOUND {
                    violations.push(format!(
                        "descending chain from {x:?} by {y:?} did not stabilize within \
                         {CHAIN_BOUND} narrowings"
                    ));
                    break;
                }
            }
        }
    }
    report(violations);
}

// ---- internal helpers that push violations instead of panicking ----

fn check_join_laws<L: Lattice + PartialEq + Debug>(elements: &[L], v: &mut Vec<String>) {
    for a in elements {
        if a.join(a) != *a {
            v.push(format!("join not idempotent: {a:?}.join({a:?}) != {a:?}"));
        }
        for b in elements {
            if a.join(b) != b.join(a) {
                v.push(format!(
                    "join not commutative: {a:?}.join({b:?}) != {b:?}.join({a:?})"
                ));
            }
            for c in elements {
                if a.join(b).join(c) != a.join(&b.join(c)) {
                    v.push(format!(
                        "join not associative over ({a:?}, {b:?}, {c:?})"
                    ));
                }
            }
        }
    }
}

fn check_meet_laws<L: Lattice + PartialEq + Debug>(elements: &[L], v: &mut Vec<String>) {
    for a in elements {
        if a.meet(a) != *a {
            v.push(format!("meet not idempotent: {a:?}.meet({a:?}) != {a:?}"));
        }
        for b in elements {
            if a.meet(b) != b.meet(a) {
                v.push(format!(
                    "meet not commutative: {a:?}.meet({b:?}) != {b:?}.meet({a:?})"
                ));
            }
            for c in elements {
                if a.meet(b).meet(c) != a.meet(&b.meet(c)) {
                    v.push(format!(
                        "meet not associative over ({a:?}, {b:?}, {c:?})"
                    ));
                }
            }
        }
    }
}

fn check_absorption<L: Lattice + PartialEq + Debug>(elements: &[L], v: &mut Vec<String>) {
    for a in elements {
        for b in elements {
            if a.join(&a.meet(b)) != *a {
                v.push(format!(
                    "absorption violated: {a:?}.join({a:?}.meet({b:?})) != {a:?}"
                ));
            }
            if a.meet(&a.join(b)) != *a {
                v.push(format!(
                    "absorption violated: {a:?}.meet({a:?}.join({b:?})) != {a:?}"
                ));
            }
        }
    }
}

fn check_ordering_consistent<L: Lattice + PartialEq + Debug>(elements: &[L], v: &mut Vec<String>) {
    for a in elements {
        for b in elements {
            let sub = a.is_subseteq(b);
            let join_agrees = a.join(b) == *b;
            let meet_agrees = a.meet(b) == *a;
            if sub != join_agrees {
                v.push(format!(
                    "ordering inconsistent with join: {a:?}.is_subseteq({b:?}) = {sub}, but \
                     {a:?}.join({b:?}) == {b:?} is {join_agrees}"
                ));
            }
            if sub != meet_agrees {
                v.push(format!(
                    "ordering inconsistent with meet: {a:?}.is_subseteq({b:?}) = {sub}, but \
                     {a:?}.meet({b:?}) == {a:?} is {meet_agrees}"
                ));
            }
        }
    }
}

fn check_bottom_laws<L: HasBottom + PartialEq + Debug>(elements: &[L], v: &mut Vec<String>) {
    let bot = L::bottom();
    for x in elements {
        if !bot.is_subseteq(x) {
            v.push(format!(
                "bottom not below element: bottom().is_subseteq({x:?}) = false"
            ));
        }
        if bot.join(x) != *x {
            v.push(format!("bottom identity violated: bottom().join({x:?}) != {x:?}"));
        }
        if bot.meet(x) != bot {
            v.push(format!(
                "bottom annihilation violated: bottom().meet({x:?}) != bottom()"
            ));
        }
    }
}

fn check_top_laws<L: HasTop + PartialEq + Debug>(elements: &[L], v: &mut Vec<String>) {
    let top = L::top();
    for x in elements {
        if !x.is_subseteq(&top) {
            v.push(format!("element not below top: {x:?}.is_subseteq(top()) = false"));
        }
        if top.join(x) != top {
            v.push(format!("top annihilation violated: top().join({x:?}) != top()"));
        }
        if top.meet(x) != *x {
            v.push(format!("top identity violated: top().meet({x:?}) != {x:?}"));
        }
    }
}
