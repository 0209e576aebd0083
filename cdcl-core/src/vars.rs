//! Variable/value store.
//!
//! Folds what the teacher crate keeps as two separate parts (`Assignment` for the three-valued
//! map, `ImplGraph` for level/reason bookkeeping) into a single per-variable record, matching this
//! core's variable record directly: a value is never looked at without its level and reason being
//! needed a moment later, and splitting them bought the teacher crate partial-borrow flexibility
//! this smaller core doesn't need.

use cdcl_formula::{Lit, Var};

use crate::clause::ClauseRef;

/// What caused a literal to become assigned.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Reason {
    /// Opened a new decision level; has no antecedent literals.
    Decision,
    /// A root-level (level 0) unit with no antecedent clause.
    RootUnit,
    /// Implied by a binary clause; the field is the clause's other literal.
    Binary(Lit),
    /// Implied by a clause of three or more literals.
    Long(ClauseRef),
}

/// A falsified clause found during propagation.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Conflict {
    Binary([Lit; 2]),
    Long(ClauseRef),
}

/// Metadata for one assigned variable. Stale once the variable is unassigned.
#[derive(Copy, Clone)]
struct VarRecord {
    level: u32,
    trail_pos: u32,
    reason: Reason,
}

/// Packed three-valued assignment plus per-variable level/trail-position/reason metadata.
#[derive(Default)]
pub struct VarStore {
    values: Vec<Option<bool>>,
    records: Vec<VarRecord>,
    last_value: Vec<bool>,
}

impl VarStore {
    /// Grows capacity (by doubling) to cover at least `count` variables. Existing entries are
    /// preserved; new ones start unassigned.
    pub fn set_var_count(&mut self, count: usize) {
        if count <= self.values.len() {
            return;
        }
        let new_len = (self.values.len().max(1) * 2).max(count);
        self.values.resize(new_len, None);
        self.last_value.resize(new_len, false);
        self.records.resize(
            new_len,
            VarRecord { level: 0, trail_pos: 0, reason: Reason::Decision },
        );
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn value(&self, lit: Lit) -> Option<bool> {
        self.values[lit.index()].map(|v| v ^ lit.is_negative())
    }

    #[inline]
    pub fn is_true(&self, lit: Lit) -> bool {
        self.value(lit) == Some(true)
    }

    #[inline]
    pub fn is_false(&self, lit: Lit) -> bool {
        self.value(lit) == Some(false)
    }

    #[inline]
    pub fn is_unassigned(&self, lit: Lit) -> bool {
        self.values[lit.index()].is_none()
    }

    pub fn last_value(&self, var: Var) -> bool {
        self.last_value[var.index()]
    }

    pub fn level(&self, var: Var) -> usize {
        self.records[var.index()].level as usize
    }

    pub fn trail_pos(&self, var: Var) -> usize {
        self.records[var.index()].trail_pos as usize
    }

    pub fn reason(&self, var: Var) -> Reason {
        self.records[var.index()].reason
    }

    /// Assigns `lit` true, recording its level, trail position and reason.
    ///
    /// `lit` must be currently unassigned.
    pub fn assign(&mut self, lit: Lit, level: usize, trail_pos: usize, reason: Reason) {
        debug_assert!(self.is_unassigned(lit));
        self.values[lit.index()] = Some(lit.is_positive());
        self.records[lit.index()] = VarRecord {
            level: level as u32,
            trail_pos: trail_pos as u32,
            reason,
        };
    }

    /// Updates the level/trail-position/reason of an already-assigned variable without touching
    /// its value. Used by elevation (a lower-level reason for an already-true literal).
    pub fn relocate(&mut self, var: Var, level: usize, trail_pos: usize, reason: Reason) {
        let record = &mut self.records[var.index()];
        record.level = level as u32;
        record.trail_pos = trail_pos as u32;
        record.reason = reason;
    }

    pub fn unassign(&mut self, var: Var) {
        let was_true = self.values[var.index()];
        self.last_value[var.index()] = was_true == Some(true);
        self.values[var.index()] = None;
    }
}

impl Conflict {
    pub fn lits<'a>(&'a self, db: &'a crate::clause::ClauseDb) -> &'a [Lit] {
        match self {
            Conflict::Binary(lits) => lits,
            Conflict::Long(cref) => &db.clause(*cref).lits,
        }
    }
}

impl Reason {
    /// The antecedent literals that caused the propagation, i.e. every clause literal except the
    /// propagated one. Empty for `Decision` and `RootUnit`.
    pub fn lits<'a>(&'a self, propagated: Lit, db: &'a crate::clause::ClauseDb) -> Vec<Lit> {
        match self {
            Reason::Decision | Reason::RootUnit => Vec::new(),
            Reason::Binary(other) => vec![*other],
            Reason::Long(cref) => db
                .clause(*cref)
                .lits
                .iter()
                .copied()
                .filter(|&l| l != propagated)
                .collect(),
        }
    }
}
