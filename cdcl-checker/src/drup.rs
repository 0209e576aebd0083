//! Watch-based DRUP checker.
//!
//! Every derived clause is re-derived by assuming its negated literals and running unit
//! propagation to a conflict, exactly the way a solver's own propagator would, just restricted to
//! binary and long clauses registered through [`Observer`]. Clauses are kept in an open-chained
//! table keyed by the hash of their literal *content*, since DRUP steps only ever name a clause by
//! its literals, never by id.

use cdcl_formula::{Lit, Var};
use smallvec::SmallVec;

use crate::hash::{self, ClauseHash};
use crate::lrat::verify_chain;
use crate::{simplify_clause, CheckerError, ClauseId, Observer};

#[derive(Clone, Copy)]
struct Watch {
    blocking: Lit,
    clause: usize,
}

struct StoredClause {
    id: ClauseId,
    lits: SmallVec<[Lit; 6]>,
    hash: ClauseHash,
    next: Option<usize>,
    garbage: bool,
}

/// A single reason recorded while propagating a candidate clause's negation.
///
/// Kept only so `checkprooflrat` can reconstruct a hint chain after a conflict; dropped again on
/// the next `backtrack`.
#[derive(Clone, Copy)]
enum Reason {
    Assumed,
    Clause(usize),
    /// A root-level unit fact, identified directly by clause id rather than a stored clause:
    /// units derived while adding a clause are never entered into the clause table.
    Unit(ClauseId),
}

/// Re-derives every added clause from unit propagation on its negated literals.
pub struct DrupChecker {
    build_lrat: bool,

    values: Vec<Option<bool>>,
    reasons: Vec<Reason>,
    trail: Vec<Lit>,
    propagated: usize,

    /// Indexed by `Lit::code()`.
    watches: Vec<Vec<Watch>>,

    clauses: Vec<StoredClause>,
    buckets: Vec<Option<usize>>,
    num_stored: usize,
    num_garbage: usize,

    /// Set once an added clause is empty, falsified at the root, or propagates to a root
    /// conflict. Every further observation is a no-op once this is set.
    inconsistent: bool,
}

impl Default for DrupChecker {
    fn default() -> Self {
        DrupChecker {
            build_lrat: false,
            values: Vec::new(),
            reasons: Vec::new(),
            trail: Vec::new(),
            propagated: 0,
            watches: Vec::new(),
            clauses: Vec::new(),
            buckets: vec![None],
            num_stored: 0,
            num_garbage: 0,
            inconsistent: false,
        }
    }
}

impl DrupChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// When enabled, a failed-but-refutable check additionally reconstructs an LRAT chain from
    /// the propagation trace and validates it through the same logic the LRAT checker uses.
    pub fn with_lrat_chain_validation(mut self, enabled: bool) -> Self {
        self.build_lrat = enabled;
        self
    }

    fn ensure_var(&mut self, var: Var) {
        let idx = var.index();
        if idx >= self.values.len() {
            self.values.resize(idx + 1, None);
            self.reasons.resize(idx + 1, Reason::Assumed);
        }
        let watch_len = (idx + 1) * 2;
        if watch_len > self.watches.len() {
            self.watches.resize_with(watch_len, Vec::new);
        }
    }

    fn value(&self, lit: Lit) -> Option<bool> {
        self.values[lit.var().index()].map(|v| v ^ lit.is_negative())
    }

    fn assign(&mut self, lit: Lit, reason: Reason) {
        self.values[lit.var().index()] = Some(lit.is_positive());
        self.reasons[lit.var().index()] = reason;
        self.trail.push(lit);
    }

    fn assume(&mut self, lit: Lit) {
        if self.value(lit).is_none() {
            self.assign(lit, Reason::Assumed);
        }
    }

    fn backtrack(&mut self, mark: usize) {
        for &lit in self.trail[mark..].iter().rev() {
            self.values[lit.var().index()] = None;
        }
        self.trail.truncate(mark);
        self.propagated = self.propagated.min(mark);
    }

    fn hash_of(&self, lits: &[Lit]) -> ClauseHash {
        hash::clause_hash(lits)
    }

    fn bucket_of(&self, h: ClauseHash) -> usize {
        hash::reduce_hash(h, self.buckets.len() as u64)
    }

    fn find(&self, lits: &[Lit]) -> Option<usize> {
        let h = self.hash_of(lits);
        let wanted: SmallVec<[Lit; 6]> = {
            let mut v: SmallVec<[Lit; 6]> = lits.iter().copied().collect();
            v.sort_unstable();
            v
        };
        let mut cursor = self.buckets[self.bucket_of(h)];
        while let Some(idx) = cursor {
            let c = &self.clauses[idx];
            if c.hash == h {
                let mut stored = c.lits.clone();
                stored.sort_unstable();
                if stored == wanted {
                    return Some(idx);
                }
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

    /// Registers watches for a freshly stored clause, choosing the first two non-false literals.
    fn watch_clause(&mut self, idx: usize) {
        let lits = self.clauses[idx].lits.clone();
        if lits.len() < 2 {
            return;
        }
        self.watches[lits[0].code()].push(Watch { blocking: lits[1], clause: idx });
        self.watches[lits[1].code()].push(Watch { blocking: lits[0], clause: idx });
    }

    fn insert(&mut self, id: ClauseId, lits: SmallVec<[Lit; 6]>) -> usize {
        self.enlarge_if_needed();
        let h = self.hash_of(&lits);
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
        self.watch_clause(idx);
        self.maybe_collect_garbage();
        idx
    }

    /// Stores a freshly checked clause, or, if it is a root-level fact, assigns and propagates
    /// it directly instead: a clause with exactly one literal not already false under the
    /// current (root) trail is a unit, and is never entered into the clause table at all. A
    /// clause with no such literal (empty, or every literal already false) makes the checker
    /// permanently inconsistent.
    fn add_clause(&mut self, id: ClauseId, simplified: SmallVec<[Lit; 6]>) {
        let mut unit = None;
        let mut more_than_one = false;
        for &lit in &simplified {
            if self.value(lit) == Some(false) {
                continue;
            }
            if unit.is_some() {
                more_than_one = true;
                break;
            }
            unit = Some(lit);
        }

        match unit {
            None => self.inconsistent = true,
            Some(lit) if !more_than_one => {
                if self.value(lit).is_none() {
                    self.assign(lit, Reason::Unit(id));
                }
                if self.propagate().is_some() {
                    self.inconsistent = true;
                }
            }
            Some(_) => {
                self.insert(id, simplified);
            }
        }
    }

    fn maybe_collect_garbage(&mut self) {
        let threshold = 0.5 * (self.buckets.len().max(self.clauses.len()).max(1) as f64);
        if (self.num_garbage as f64) <= threshold {
            return;
        }
        log::debug!(
            "drup checker collecting {} garbage clauses out of {}",
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

    /// Runs the one-literal-at-a-time propagation step until fixpoint or conflict.
    ///
    /// No saved replacement cursor: each call to a long clause's watch rescans from position 2,
    /// since unlike a solver's own propagator this never runs hot enough to be worth the
    /// bookkeeping.
    fn propagate(&mut self) -> Option<usize> {
        while self.propagated < self.trail.len() {
            let lit = self.trail[self.propagated];
            self.propagated += 1;
            let neg = !lit;
            let code = neg.code();

            let mut ws = std::mem::take(&mut self.watches[code]);
            let mut conflict = None;
            let mut read = 0;
            let mut write = 0;

            while read < ws.len() {
                let w = ws[read];
                read += 1;

                if self.value(w.blocking) == Some(true) {
                    ws[write] = w;
                    write += 1;
                    continue;
                }

                if self.clauses[w.clause].garbage {
                    continue;
                }

                if self.clauses[w.clause].lits.len() == 2 {
                    match self.value(w.blocking) {
                        Some(false) => {
                            ws[write] = w;
                            write += 1;
                            conflict = Some(w.clause);
                            break;
                        }
                        _ => {
                            self.assign(w.blocking, Reason::Clause(w.clause));
                            ws[write] = w;
                            write += 1;
                        }
                    }
                    continue;
                }

                let other = {
                    let lits = &self.clauses[w.clause].lits;
                    if lits[0] == neg { lits[1] } else { lits[0] }
                };
                if self.value(other) == Some(true) {
                    ws[write] = Watch { blocking: other, clause: w.clause };
                    write += 1;
                    continue;
                }

                {
                    let lits = &mut self.clauses[w.clause].lits;
                    lits[0] = other;
                    lits[1] = neg;
                }

                let replacement = {
                    let lits = &self.clauses[w.clause].lits;
                    (2..lits.len()).find(|&k| self.value(lits[k]) != Some(false))
                };

                if let Some(k) = replacement {
                    let r = self.clauses[w.clause].lits[k];
                    self.clauses[w.clause].lits.swap(1, k);
                    self.watches[r.code()].push(Watch { blocking: other, clause: w.clause });
                    // Watch moved to `r`'s list: do not write it back to `neg`'s.
                } else if self.value(other).is_none() {
                    self.assign(other, Reason::Clause(w.clause));
                    ws[write] = Watch { blocking: other, clause: w.clause };
                    write += 1;
                } else {
                    ws[write] = Watch { blocking: other, clause: w.clause };
                    write += 1;
                    conflict = Some(w.clause);
                    break;
                }
            }

            while read < ws.len() {
                ws[write] = ws[read];
                write += 1;
                read += 1;
            }
            ws.truncate(write);
            self.watches[code] = ws;

            if conflict.is_some() {
                return conflict;
            }
        }
        None
    }

    /// Walks the reasons of the current trail backwards from `conflict`, collecting the ids of
    /// every clause used to derive the assignment, in an order that forms a valid LRAT chain.
    fn build_chain(&self, conflict: usize) -> Vec<ClauseId> {
        let mut chain = Vec::new();
        let mut needed = vec![false; self.values.len()];

        let mark_lits = |needed: &mut Vec<bool>, lits: &[Lit]| {
            for lit in lits {
                needed[lit.var().index()] = true;
            }
        };
        mark_lits(&mut needed, &self.clauses[conflict].lits);
        chain.push(self.clauses[conflict].id);

        for &lit in self.trail.iter().rev() {
            let idx = lit.var().index();
            if !needed[idx] {
                continue;
            }
            match self.reasons[idx] {
                Reason::Clause(c) => {
                    chain.push(self.clauses[c].id);
                    mark_lits(&mut needed, &self.clauses[c].lits);
                }
                Reason::Unit(id) => chain.push(id),
                Reason::Assumed => {}
            }
        }

        chain.reverse();
        chain
    }

    fn check_by_propagation(&mut self, id: ClauseId, simplified: &[Lit]) -> Result<(), CheckerError> {
        for &lit in simplified {
            self.ensure_var(lit.var());
        }
        let mark = self.trail.len();

        for &lit in simplified {
            if self.value(!lit) == Some(true) {
                self.backtrack(mark);
                return Ok(()); // already falsified by unit propagation of the others
            }
            self.assume(!lit);
        }

        let conflict = self.propagate();
        let result = match conflict {
            Some(c) => {
                if self.build_lrat {
                    let chain = self.build_chain(c);
                    let ok = verify_chain(simplified, &chain, |cid| {
                        self.find_by_id(cid).map(|idx| self.clauses[idx].lits.as_slice())
                    });
                    if !ok {
                        return Err(CheckerError::LratChainFailed { id });
                    }
                }
                Ok(())
            }
            None => Err(CheckerError::RupCheckFailed {
                id,
                lits: simplified.iter().map(|l| l.to_dimacs()).collect(),
            }),
        };

        self.backtrack(mark);
        result
    }

    fn find_by_id(&self, id: ClauseId) -> Option<usize> {
        self.clauses.iter().position(|c| !c.garbage && c.id == id)
    }
}

impl Observer for DrupChecker {
    fn add_original_clause(&mut self, id: ClauseId, lits: &[Lit]) -> Result<(), CheckerError> {
        if self.inconsistent {
            return Ok(());
        }
        log::trace!("drup checker: add original clause {} {:?}", id, lits);
        for &lit in lits {
            self.ensure_var(lit.var());
        }
        if let Some(simplified) = simplify_clause(lits) {
            self.add_clause(id, simplified);
        }
        Ok(())
    }

    fn add_derived_clause(
        &mut self,
        id: ClauseId,
        lits: &[Lit],
        _chain: Option<&[ClauseId]>,
    ) -> Result<(), CheckerError> {
        if self.inconsistent {
            return Ok(());
        }
        log::trace!("drup checker: add derived clause {} {:?}", id, lits);
        let simplified = match simplify_clause(lits) {
            Some(s) => s,
            None => return Ok(()), // tautological clauses are trivially implied
        };

        self.check_by_propagation(id, &simplified)?;
        self.add_clause(id, simplified);
        Ok(())
    }

    fn delete_clause(&mut self, id: ClauseId, lits: &[Lit]) -> Result<(), CheckerError> {
        if self.inconsistent {
            return Ok(());
        }
        log::trace!("drup checker: delete clause {} {:?}", id, lits);
        let simplified = simplify_clause(lits).unwrap_or_default();
        let idx = self.find(&simplified).ok_or(CheckerError::DeleteMissing { id })?;

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
    fn s5_rup_check_accepts_implied_clause() {
        // {1,2}, {-1,3}, {-2,3} imply {3} by RUP.
        let mut checker = DrupChecker::new();
        checker.add_original_clause(1, &[lit![1], lit![2]]).unwrap();
        checker.add_original_clause(2, &[lit![-1], lit![3]]).unwrap();
        checker.add_original_clause(3, &[lit![-2], lit![3]]).unwrap();

        checker.add_derived_clause(4, &[lit![3]], None).unwrap();
    }

    #[test]
    fn rejects_clause_that_does_not_follow() {
        let mut checker = DrupChecker::new();
        checker.add_original_clause(1, &[lit![1], lit![2]]).unwrap();

        let err = checker.add_derived_clause(2, &[lit![3]], None).unwrap_err();
        assert!(matches!(err, CheckerError::RupCheckFailed { id: 2, .. }));
    }

    #[test]
    fn tautological_clause_is_accepted_without_a_check() {
        let mut checker = DrupChecker::new();
        checker.add_derived_clause(1, &[lit![1], lit![-1]], None).unwrap();
    }

    #[test]
    fn deleted_clause_can_no_longer_justify_a_check() {
        let mut checker = DrupChecker::new();
        checker.add_original_clause(1, &[lit![1], lit![2]]).unwrap();
        checker.add_original_clause(2, &[lit![-1], lit![3]]).unwrap();
        checker.add_original_clause(3, &[lit![-2], lit![3]]).unwrap();
        checker.add_derived_clause(4, &[lit![3]], None).unwrap();

        checker.delete_clause(1, &[lit![1], lit![2]]).unwrap();
        let err = checker.add_derived_clause(5, &[lit![2], lit![3]], None).unwrap_err();
        assert!(matches!(err, CheckerError::RupCheckFailed { id: 5, .. }));
    }

    #[test]
    fn a_root_unit_persists_and_drives_later_rup_checks() {
        // {1} is a root unit; adding it must put 1 on the trail, not just store the clause, so
        // that {-1,2} immediately propagates 2. {-2,3,4} still has two genuinely unassigned
        // literals when added, so it is stored rather than collapsing into another unit; a later
        // derived clause can then RUP-check against it together with the persisted fact that 2
        // is true, instead of re-deriving everything from scratch.
        let mut checker = DrupChecker::new();
        checker.add_original_clause(1, &[lit![-1], lit![2]]).unwrap();
        checker.add_original_clause(2, &[lit![1]]).unwrap();
        assert_eq!(checker.value(lit![2]), Some(true));

        checker.add_original_clause(3, &[lit![-2], lit![3], lit![4]]).unwrap();
        checker.add_derived_clause(4, &[lit![3], lit![4]], None).unwrap();
    }

    #[test]
    fn a_falsified_root_unit_makes_the_checker_inconsistent() {
        let mut checker = DrupChecker::new();
        checker.add_original_clause(1, &[lit![1]]).unwrap();
        checker.add_original_clause(2, &[lit![-1]]).unwrap();
        assert!(checker.inconsistent);

        // Once inconsistent, every further observation is a no-op, even one that would
        // otherwise fail its own check.
        checker.add_derived_clause(3, &[lit![99]], None).unwrap();
    }

    #[test]
    fn chain_is_built_and_validated_when_requested() {
        let mut checker = DrupChecker::new().with_lrat_chain_validation(true);
        checker.add_original_clause(1, &[lit![1], lit![2]]).unwrap();
        checker.add_original_clause(2, &[lit![-1], lit![3]]).unwrap();
        checker.add_original_clause(3, &[lit![-2], lit![3]]).unwrap();

        checker.add_derived_clause(4, &[lit![3]], None).unwrap();
    }
}
