//! Central solver data structure.
//!
//! The teacher crate's `Context` bundles sixteen `partial_ref` parts so any subset of them can be
//! borrowed independently across call sites that would otherwise fight the borrow checker. This
//! core only has five real components (variable store, trail, watches, clause db, observer) and a
//! handful of call sites, so plain disjoint field borrows (`let Context { a, b, .. } = self;`)
//! cover every case `partial_ref` would have been used for; the dependency added nothing this size
//! of context wouldn't get for free, so it was dropped (see DESIGN.md).

use cdcl_formula::{Lit, Var};

use crate::backtrack::{self, UnassignHook};
use crate::clause::{ClauseDb, ClauseId, ClauseRef};
use crate::config::SolverConfig;
use crate::observer::{CheckerError, ProofObserver};
use crate::propagate;
use crate::trail::Trail;
use crate::vars::{Conflict, Reason, VarStore};
use crate::watch::Watchlists;

/// Central solver data structure: variable store, trail, watch index, clause db, proof observer
/// and configuration.
#[derive(Default)]
pub struct Context {
    pub config: SolverConfig,
    pub vars: VarStore,
    pub trail: Trail,
    pub watches: Watchlists,
    pub clauses: ClauseDb,
    pub observer: ProofObserver,
}

impl Context {
    pub fn new(config: SolverConfig) -> Context {
        let trail = Trail::new(config.multitrail);
        Context { config, trail, ..Context::default() }
    }

    pub fn ensure_var_count(&mut self, count: usize) {
        self.vars.set_var_count(count);
        self.watches.set_var_count(count);
    }

    fn ensure_var(&mut self, var: Var) {
        if var.index() >= self.vars.capacity() {
            self.ensure_var_count(var.index() + 1);
        }
    }

    /// `assign_decision(lit)`: precondition `val(lit) = 0`; opens a new decision level.
    pub fn assign_decision(&mut self, lit: Lit) {
        self.ensure_var(lit.var());
        debug_assert!(self.vars.is_unassigned(lit));
        self.trail.new_decision_level(lit);
        let level = self.trail.current_level();
        let trail_pos = self.trail.size(level);
        self.vars.assign(lit, level, trail_pos, Reason::Decision);
        self.trail.push(lit, level);
    }

    /// `assign_unit(lit)`: precondition level 0 and `val(lit) = 0`.
    pub fn assign_unit(&mut self, lit: Lit) {
        self.ensure_var(lit.var());
        debug_assert!(self.vars.is_unassigned(lit));
        let trail_pos = self.trail.size(0);
        self.vars.assign(lit, 0, trail_pos, Reason::RootUnit);
        self.trail.push(lit, 0);
    }

    /// `assign_driving(lit, clause)`: used by conflict analysis to assert the learned clause's
    /// unique literal of the current level.
    pub fn assign_driving(&mut self, lit: Lit, clause: ClauseRef) {
        self.ensure_var(lit.var());
        debug_assert!(self.vars.is_unassigned(lit));
        let current_level = self.trail.current_level();
        let level = propagate::assignment_level(&self.config, &self.vars, &self.clauses, current_level, lit, clause);
        let trail_pos = self.trail.size(level);
        self.vars.assign(lit, level, trail_pos, Reason::Long(clause));
        self.trail.push(lit, level);
    }

    /// Adds a clause of two or more literals and watches its first two literals.
    pub fn add_clause(&mut self, lits: Vec<Lit>) -> ClauseRef {
        log::trace!("adding clause {:?}", lits);
        for &lit in &lits {
            self.ensure_var(lit.var());
        }
        let cref = self.clauses.add_clause(lits);
        let record = self.clauses.clause(cref);
        let is_binary = record.len() == 2;
        let lits2 = [record.lits[0], record.lits[1]];
        self.watches.watch(lits2[0], lits2[1], is_binary, cref);
        self.watches.watch(lits2[1], lits2[0], is_binary, cref);
        cref
    }

    /// Runs unit propagation to fixpoint or conflict, per the configured chrono/multitrail mode.
    pub fn propagate(&mut self) -> Result<(), Conflict> {
        let result = if self.config.multitrail {
            propagate::propagate_multitrail(self)
        } else {
            propagate::propagate_single(self)
        };
        if let Err(conflict) = &result {
            log::debug!("propagation conflict: {:?}", conflict);
        }
        result
    }

    /// `backtrack(level)`: `level` in `[0, current_level]`.
    pub fn backtrack(&mut self, level: usize) {
        self.backtrack_with_hook(level, &mut ())
    }

    pub fn backtrack_with_hook(&mut self, level: usize, hook: &mut impl UnassignHook) {
        log::trace!("backtracking from level {} to {}", self.trail.current_level(), level);
        if self.config.multitrail {
            backtrack::backtrack_multi(&mut self.trail, &mut self.vars, hook, level);
        } else {
            backtrack::backtrack_single(&mut self.trail, &mut self.vars, hook, level);
        }
    }

    pub fn observe_add_original(&mut self, id: ClauseId, lits: &[Lit]) -> Result<(), CheckerError> {
        let result = self.observer.add_original_clause(id, lits);
        if let Err(err) = &result {
            log::debug!("proof observer rejected original clause {}: {}", id, err);
        }
        result
    }

    pub fn observe_add_derived(
        &mut self,
        id: ClauseId,
        lits: &[Lit],
        chain: Option<&[ClauseId]>,
    ) -> Result<(), CheckerError> {
        let result = self.observer.add_derived_clause(id, lits, chain);
        if let Err(err) = &result {
            log::debug!("proof observer rejected derived clause {}: {}", id, err);
        }
        result
    }

    pub fn observe_delete(&mut self, id: ClauseId, lits: &[Lit]) -> Result<(), CheckerError> {
        self.observer.delete_clause(id, lits)
    }
}
