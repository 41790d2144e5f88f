//! Interned name handles.

use crate::identifier;

identifier! {
    /// Stage-local interned name, used for SSA value names and block
    /// labels. Only meaningful relative to one stage's symbol table.
    pub struct Symbol, "s"
}

identifier! {
    /// Pipeline-wide interned name for cross-stage references
    /// (function names, stage names).
    pub struct GlobalSymbol, "g"
}
