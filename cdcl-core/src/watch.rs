//! Watch index mapping literals to the clauses they help propagate.
//!
//! Unlike the teacher crate, which keeps binary clauses in a separate `BinaryClauses` structure
//! and only watches long clauses, this merges both into one watch record per literal (`is_binary`
//! distinguishes them) so the propagator has a single hot-path loop instead of two. Each watch
//! carries a blocking literal so a satisfied clause can usually be skipped without touching clause
//! storage at all.

use cdcl_formula::Lit;

use crate::clause::ClauseRef;

/// An entry in a literal's watch list.
#[derive(Copy, Clone)]
pub struct Watch {
    /// A literal of the watched clause, different from the one being watched. When true, the
    /// clause is already satisfied and does not need to be inspected.
    pub blocking: Lit,
    /// Binary clauses need no replacement search: the blocking literal already names the other
    /// literal, so a conflict or propagation is decided without touching clause storage.
    pub is_binary: bool,
    pub clause: ClauseRef,
}

/// Append-only-per-propagation-step watch lists, indexed by `Lit::code()`.
#[derive(Default)]
pub struct Watchlists {
    watches: Vec<Vec<Watch>>,
}

impl Watchlists {
    /// Grows capacity (by doubling) to cover at least `count` variables.
    pub fn set_var_count(&mut self, count: usize) {
        if count * 2 <= self.watches.len() {
            return;
        }
        let new_len = (self.watches.len().max(1) * 2).max(count * 2);
        self.watches.resize_with(new_len, Vec::new);
    }

    /// Registers a watch for `clause` on `lit`, with `blocking` as its cached blocking literal.
    pub fn watch(&mut self, lit: Lit, blocking: Lit, is_binary: bool, clause: ClauseRef) {
        self.watches[lit.code()].push(Watch { blocking, is_binary, clause });
    }

    /// Removes the (first) watch for `clause` from `lit`'s list. Linear scan; used outside the hot
    /// propagation path (e.g. clause deletion), never during `propagate`.
    pub fn unwatch(&mut self, lit: Lit, clause: ClauseRef) {
        let list = &mut self.watches[lit.code()];
        if let Some(pos) = list.iter().position(|w| w.clause == clause) {
            list.swap_remove(pos);
        }
    }

    pub fn watches_of(&self, lit: Lit) -> &[Watch] {
        &self.watches[lit.code()]
    }

    /// Takes the watch list for `lit`, leaving an empty one in its place.
    ///
    /// Used by the propagator to scan and rebuild a watch list while still being able to push new
    /// watches onto *other* literals' lists without violating borrowing rules.
    pub fn take(&mut self, lit: Lit) -> Vec<Watch> {
        std::mem::take(&mut self.watches[lit.code()])
    }

    /// Restores a watch list previously obtained via `take`.
    pub fn restore(&mut self, lit: Lit, watches: Vec<Watch>) {
        self.watches[lit.code()] = watches;
    }

    pub fn push(&mut self, lit: Lit, watch: Watch) {
        self.watches[lit.code()].push(watch);
    }
}
