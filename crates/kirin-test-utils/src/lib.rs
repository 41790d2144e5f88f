//! Shared test support for the kirin workspace.

pub mod interval;
pub mod lang;
pub mod lattice;

pub use interval::{Bound, Interval, interval_add, interval_mul, interval_sub};
pub use lang::{AuxLang, FromTestLang, NumberType, NumericValue, TestLang};
