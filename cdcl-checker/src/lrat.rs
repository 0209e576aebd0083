//! Chain-based LRAT checker.
//!
//! Unlike the DRUP checker this holds clauses by id only: no watches, no propagation. Checking
//! a derived clause just follows the hint chain of clause ids handed to it and asks at each step
//! whether the named clause has become unit or falsified under the literals derived so far.

use std::collections::HashSet;

use cdcl_formula::Lit;
use smallvec::SmallVec;

use crate::hash::{self, ClauseHash};
use crate::{CheckerError, ClauseId, Observer};

struct StoredClause {
    id: ClauseId,
    lits: SmallVec<[Lit; 6]>,
    hash: ClauseHash,
    next: Option<usize>,
    garbage: bool,
}

/// Checks that propagating a chain of clause ids under a clause's negated literals reaches a
/// falsified clause, without touching any mutable checker state.
///
/// Shared with the DRUP checker's optional `checkprooflrat` chain validation so both checkers
/// agree on what "a chain proves a clause" means.
pub(crate) fn verify_chain<'a>(
    lits: &[Lit],
    chain: &[ClauseId],
    mut lookup: impl FnMut(ClauseId) -> Option<&'a [Lit]>,
) -> bool {
    let mut true_lits: HashSet<Lit> = HashSet::new();

    for &lit in lits {
        if true_lits.contains(&lit) {
            // `lit` and `-lit` both occur in the candidate clause: tautological, trivially proved.
            return true;
        }
        true_lits.insert(!lit);
    }

    for &id in chain {
        let clause_lits = match lookup(id) {
            Some(lits) => lits,
            None => return false,
        };

        let mut unit = None;
        for &lit in clause_lits {
            if true_lits.contains(&!lit) {
                continue; // already falsified by a previous step
            }
            if unit.is_some() && unit != Some(lit) {
                return false; // more than one unfalsified literal: not unit
            }
            unit = Some(lit);
        }

        match unit {
            None => return true, // every literal falsified: conflict reached
            Some(lit) => {
                true_lits.insert(lit);
            }
        }
    }

    false
}

/// Holds the clauses named in a proof by id and checks derived clauses against explicit chains.
pub struct LratChecker {
    clauses: Vec<StoredClause>,
    buckets: Vec<Option<usize>>,
    nonces: Vec<u64>,
    num_stored: usize,
    num_garbage: usize,
}

impl Default for LratChecker {
    fn default() -> Self {
        LratChecker {
            clauses: Vec::new(),
            buckets: vec![None],
            nonces: hash::id_hash_nonces(),
            num_stored: 0,
            num_garbage: 0,
        }
    }
}

impl LratChecker {
    pub fn new() -> Self {
        Self::default()
    }

    fn hash_of(&self, id: ClauseId) -> ClauseHash {
        hash::id_hash(id, &self.nonces)
    }

    fn bucket_of(&self, h: ClauseHash) -> usize {
        hash::reduce_hash(h, self.buckets.len() as u64)
    }

    fn find(&self, id: ClauseId) -> Option<usize> {
        let h = self.hash_of(id);
        let mut cursor = self.buckets[self.bucket_of(h)];
        while let Some(idx) = cursor {
            let c = &self.clauses[idx];
            if c.hash == h && c.id == id {
                return Some(idx);
            }
            cursor = c.next;
        }
        None
    }

    fn enlarge_if_needed(&mut self) {
        if self.num_stored < self.buckets.len() {
            return;
        }
        let new_size = self.buckets.len() * 2;
        let mut new_buckets = vec![None; new_size];
        for (idx, c) in self.clauses.iter_mut().enumerate() {
            if c.garbage {
                continue;
            }
            let b = hash::reduce_hash(c.hash, new_size as u64);
            c.next = new_buckets[b];
            new_buckets[b] = Some(idx);
        }
        self.buckets = new_buckets;
    }

    fn insert(&mut self, id: ClauseId, lits: SmallVec<[Lit; 6]>) {
        self.enlarge_if_needed();
        let h = self.hash_of(id);
        let b = self.bucket_of(h);
        let idx = self.clauses.len();
        self.clauses.push(StoredClause {
            id,
            lits,
            hash: h,
            next: self.buckets[b],
            garbage: false,
        });
        self.buckets[b] = Some(idx);
        self.num_stored += 1;
        self.maybe_collect_garbage();
    }

    fn maybe_collect_garbage(&mut self) {
        let threshold = 0.5 * (self.buckets.len().max(self.clauses.len()).max(1) as f64);
        if (self.num_garbage as f64) <= threshold {
            return;
        }
        log::debug!(
            "lrat checker collecting {} garbage clauses out of {}",
            self.num_garbage,
            self.num_stored + self.num_garbage
        );
        for idx in 0..self.clauses.len() {
            if self.clauses[idx].garbage {
                self.clauses[idx].lits.clear();
            }
        }
        self.num_garbage = 0;
    }
}

impl Observer for LratChecker {
    fn add_original_clause(&mut self, id: ClauseId, lits: &[Lit]) -> Result<(), CheckerError> {
        log::trace!("lrat checker: add original clause {} {:?}", id, lits);
        self.insert(id, lits.iter().copied().collect());
        Ok(())
    }

    fn add_derived_clause(
        &mut self,
        id: ClauseId,
        lits: &[Lit],
        chain: Option<&[ClauseId]>,
    ) -> Result<(), CheckerError> {
        let chain = chain.unwrap_or(&[]);
        log::trace!("lrat checker: add derived clause {} {:?} chain {:?}", id, lits, chain);

        let ok = verify_chain(lits, chain, |cid| {
            self.find(cid).map(|idx| self.clauses[idx].lits.as_slice())
        });

        if !ok {
            // Distinguish "chain references a clause we never saw" from "chain exhausted
            // without reaching a falsified clause" to give a more useful error.
            if let Some(&missing) = chain.iter().find(|&&cid| self.find(cid).is_none()) {
                return Err(CheckerError::UnknownChainId { id, missing });
            }
            return Err(CheckerError::LratChainFailed { id });
        }

        self.insert(id, lits.iter().copied().collect());
        Ok(())
    }

    fn delete_clause(&mut self, id: ClauseId, lits: &[Lit]) -> Result<(), CheckerError> {
        log::trace!("lrat checker: delete clause {} {:?}", id, lits);
        let idx = self.find(id).ok_or(CheckerError::DeleteMissing { id })?;

        let wanted: HashSet<Lit> = lits.iter().copied().collect();
        let stored: HashSet<Lit> = self.clauses[idx].lits.iter().copied().collect();
        if wanted != stored {
            return Err(CheckerError::DeleteMissing { id });
        }

        // Unlink from its bucket chain.
        let h = self.clauses[idx].hash;
        let b = self.bucket_of(h);
        let mut cursor = &mut self.buckets[b];
        loop {
            match *cursor {
                Some(i) if i == idx => {
                    *cursor = self.clauses[i].next;
                    break;
                }
                Some(i) => cursor = &mut self.clauses[i].next,
                None => unreachable!("clause found by find() must be linked in its bucket"),
            }
        }
        self.clauses[idx].garbage = true;
        self.num_stored -= 1;
        self.num_garbage += 1;
        self.maybe_collect_garbage();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdcl_formula::lit;

    #[test]
    fn s6_lrat_chain_accepts() {
        // clauses C1={1,2}, C2={-1,3}, C3={-2,3}; derive {3} with chain [C1,C2,C3].
        let mut checker = LratChecker::new();
        checker.add_original_clause(1, &[lit![1], lit![2]]).unwrap();
        checker.add_original_clause(2, &[lit![-1], lit![3]]).unwrap();
        checker.add_original_clause(3, &[lit![-2], lit![3]]).unwrap();

        checker
            .add_derived_clause(4, &[lit![3]], Some(&[2, 3, 1]))
            .unwrap();
    }

    #[test]
    fn chain_that_does_not_falsify_fails() {
        let mut checker = LratChecker::new();
        checker.add_original_clause(1, &[lit![1], lit![2]]).unwrap();

        let err = checker.add_derived_clause(2, &[lit![3]], Some(&[1])).unwrap_err();
        assert!(matches!(err, CheckerError::LratChainFailed { id: 2 }));
    }

    #[test]
    fn chain_with_unknown_id_fails() {
        let mut checker = LratChecker::new();
        let err = checker.add_derived_clause(2, &[lit![3]], Some(&[99])).unwrap_err();
        assert!(matches!(err, CheckerError::UnknownChainId { id: 2, missing: 99 }));
    }

    #[test]
    fn delete_then_reference_fails() {
        let mut checker = LratChecker::new();
        checker.add_original_clause(1, &[lit![1], lit![2]]).unwrap();
        checker.delete_clause(1, &[lit![1], lit![2]]).unwrap();

        let err = checker.add_derived_clause(2, &[lit![1]], Some(&[1])).unwrap_err();
        assert!(matches!(err, CheckerError::UnknownChainId { id: 2, missing: 1 }));
    }
}
