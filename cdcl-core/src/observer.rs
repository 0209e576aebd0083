//! Proof observer dispatch.
//!
//! A tagged union rather than a `dyn Observer`: observer calls only happen at clause addition and
//! deletion boundaries, never inside the propagation loop, so there is no hot path to protect, but
//! a closed set of three variants is simpler to exhaustively match on than a trait object here.

use cdcl_checker::{drup::DrupChecker, lrat::LratChecker, ClauseId, Observer};
use cdcl_formula::Lit;

pub use cdcl_checker::CheckerError;

/// Which proof discipline (if any) mirrors the solver's clause additions and deletions.
pub enum ProofObserver {
    None,
    Drup(DrupChecker),
    Lrat(LratChecker),
}

impl ProofObserver {
    pub fn none() -> Self {
        ProofObserver::None
    }

    pub fn drup(validate_lrat_chain: bool) -> Self {
        ProofObserver::Drup(DrupChecker::new().with_lrat_chain_validation(validate_lrat_chain))
    }

    pub fn lrat() -> Self {
        ProofObserver::Lrat(LratChecker::new())
    }

    pub fn add_original_clause(&mut self, id: ClauseId, lits: &[Lit]) -> Result<(), CheckerError> {
        match self {
            ProofObserver::None => Ok(()),
            ProofObserver::Drup(c) => c.add_original_clause(id, lits),
            ProofObserver::Lrat(c) => c.add_original_clause(id, lits),
        }
    }

    pub fn add_derived_clause(
        &mut self,
        id: ClauseId,
        lits: &[Lit],
        chain: Option<&[ClauseId]>,
    ) -> Result<(), CheckerError> {
        match self {
            ProofObserver::None => Ok(()),
            ProofObserver::Drup(c) => c.add_derived_clause(id, lits, chain),
            ProofObserver::Lrat(c) => c.add_derived_clause(id, lits, chain),
        }
    }

    pub fn delete_clause(&mut self, id: ClauseId, lits: &[Lit]) -> Result<(), CheckerError> {
        match self {
            ProofObserver::None => Ok(()),
            ProofObserver::Drup(c) => c.delete_clause(id, lits),
            ProofObserver::Lrat(c) => c.delete_clause(id, lits),
        }
    }
}

impl Default for ProofObserver {
    fn default() -> Self {
        ProofObserver::None
    }
}
