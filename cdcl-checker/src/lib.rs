//! Online proof checking for the core solver's DRUP/LRAT proof obligations.
//!
//! The solver's clause additions and deletions are mirrored here through the [`Observer`]
//! trait. Two concrete checkers implement it: [`drup::DrupChecker`] re-derives each added clause
//! by unit propagation on its negation, while [`lrat::LratChecker`] instead follows an explicit
//! chain of clause ids without propagating at all.

pub mod drup;
mod hash;
pub mod lrat;

mod error;

pub use error::CheckerError;

/// Unique, monotonically increasing clause identifier assigned by the solver.
pub type ClauseId = u64;

/// Capability set mirrored from the solver's clause additions and deletions.
///
/// A no-op implementation (for builds that don't check proofs at all) and the two real
/// checkers below are selected by the caller; the propagation hot path never calls through a
/// vtable for this, since observer calls only happen at clause boundaries (see the core crate's
/// tagged-union `ProofObserver`).
pub trait Observer {
    /// Registers an input clause. Input clauses are trusted and never checked.
    fn add_original_clause(&mut self, id: ClauseId, lits: &[cdcl_formula::Lit]) -> Result<(), CheckerError>;

    /// Registers a derived (learned) clause. Must be validated before being trusted.
    ///
    /// `chain` is `Some` only for the LRAT checker; the DRUP checker ignores it and re-derives
    /// the clause by propagation instead.
    fn add_derived_clause(
        &mut self,
        id: ClauseId,
        lits: &[cdcl_formula::Lit],
        chain: Option<&[ClauseId]>,
    ) -> Result<(), CheckerError>;

    /// Registers the deletion of a previously added clause.
    fn delete_clause(&mut self, id: ClauseId, lits: &[cdcl_formula::Lit]) -> Result<(), CheckerError>;
}

/// An observer that discards every observation without checking anything.
///
/// Used when the solver runs with proof checking disabled entirely.
#[derive(Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn add_original_clause(&mut self, _id: ClauseId, _lits: &[cdcl_formula::Lit]) -> Result<(), CheckerError> {
        Ok(())
    }

    fn add_derived_clause(
        &mut self,
        _id: ClauseId,
        _lits: &[cdcl_formula::Lit],
        _chain: Option<&[ClauseId]>,
    ) -> Result<(), CheckerError> {
        Ok(())
    }

    fn delete_clause(&mut self, _id: ClauseId, _lits: &[cdcl_formula::Lit]) -> Result<(), CheckerError> {
        Ok(())
    }
}

/// Sorts a clause by variable index (ties broken by polarity) and drops duplicate literals.
///
/// Returns `None` if the clause is tautological (`lit` and `-lit` both present), matching the
/// `lit_smaller`/`tautological` pass the checker runs before every check.
pub(crate) fn simplify_clause(lits: &[cdcl_formula::Lit]) -> Option<smallvec::SmallVec<[cdcl_formula::Lit; 6]>> {
    let mut sorted: smallvec::SmallVec<[cdcl_formula::Lit; 6]> = lits.iter().copied().collect();
    sorted.sort_unstable_by_key(|lit| (lit.var().index(), lit.is_negative()));

    let mut out: smallvec::SmallVec<[cdcl_formula::Lit; 6]> = smallvec::SmallVec::new();
    let mut prev: Option<cdcl_formula::Lit> = None;
    for &lit in sorted.iter() {
        if Some(lit) == prev {
            continue;
        }
        if let Some(p) = prev {
            if p == !lit {
                return None;
            }
        }
        out.push(lit);
        prev = Some(lit);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdcl_formula::lit;

    #[test]
    fn simplify_dedups_and_sorts() {
        let simplified = simplify_clause(&[lit![3], lit![1], lit![1], lit![-2]]).unwrap();
        assert_eq!(simplified.as_slice(), &[lit![1], lit![-2], lit![3]]);
    }

    #[test]
    fn simplify_detects_tautology() {
        assert!(simplify_clause(&[lit![1], lit![-1]]).is_none());
    }
}
