use thiserror::Error;

/// Errors that can occur while checking an online DRUP or LRAT proof.
///
/// These are the only two fallible boundaries the checker exposes: a clause fails its
/// implication check, or a deletion names a clause the checker never saw. Every other condition
/// the original checker treats as an assertion is instead a `debug_assert!` here.
#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("clause {id} does not follow from unit propagation on its negated literals: {lits:?}")]
    RupCheckFailed { id: u64, lits: Vec<isize> },

    #[error("lrat chain for clause {id} did not reach a falsified clause")]
    LratChainFailed { id: u64 },

    #[error("lrat chain for clause {id} references unknown clause id {missing}")]
    UnknownChainId { id: u64, missing: u64 },

    #[error("deleted clause {id} was not present in the checker")]
    DeleteMissing { id: u64 },
}
