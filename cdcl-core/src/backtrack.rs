//! Backtracking.
//!
//! Undoes assignments down to a target decision level. Chronological backtracking (the default
//! here, since the non-chronological case is just the `target <= level` literals of the
//! chronological scan) keeps any out-of-order assignment whose actual level is already `<=
//! target`, instead of unassigning everything above the old trail position the level started at.

use cdcl_formula::{Lit, Var};

use crate::trail::Trail;
use crate::vars::VarStore;

/// Called for every variable that backtrack unassigns, so an external decision heuristic can
/// return it to its candidate pool. The core has no heuristic of its own (out of scope), so the
/// default does nothing.
pub trait UnassignHook {
    fn unassigned(&mut self, var: Var) {
        let _ = var;
    }
}

impl UnassignHook for () {}

/// Undoes assignments in decision levels deeper than `target`, in single-trail mode.
///
/// Literals whose assignment level is `<= target` are kept (compacted, in original relative
/// order); literals whose level is `> target` are unassigned. This is what makes the backtrack
/// chronological: a unit derived at level 5 that is assignable at level 1 survives a
/// `backtrack(1)` instead of being thrown away and re-derived later.
pub fn backtrack_single(
    trail: &mut Trail,
    vars: &mut VarStore,
    hook: &mut impl UnassignHook,
    target: usize,
) {
    if target >= trail.current_level() {
        return;
    }

    let scan_start = trail.scan_start(target);
    let scanned: Vec<Lit> = trail.scan_from_level(target).to_vec();
    let mut compacted = Vec::with_capacity(scanned.len());

    for lit in scanned {
        if vars.level(lit.var()) > target {
            vars.unassign(lit.var());
            hook.unassigned(lit.var());
        } else {
            compacted.push(lit);
        }
    }

    let _ = scan_start;
    trail.finish_single_backtrack(target, compacted);
}

/// Undoes assignments in decision levels deeper than `target`, in multi-trail mode.
///
/// Each level above `target` is scanned independently. A literal truly assigned at that level is
/// unassigned; a literal that was *elevated* to a different (lower) level by the propagator is
/// simply dropped from this level's list — it is still assigned, just tracked on its true level's
/// trail, which this call leaves untouched.
pub fn backtrack_multi(
    trail: &mut Trail,
    vars: &mut VarStore,
    hook: &mut impl UnassignHook,
    target: usize,
) {
    if target >= trail.current_level() {
        return;
    }

    for level in (target + 1..=trail.current_level()).rev() {
        let lits = std::mem::take(trail.level_trail_mut(level));
        for lit in lits {
            if vars.level(lit.var()) == level {
                vars.unassign(lit.var());
                hook.unassigned(lit.var());
            }
            // else: elevated away from this level, nothing to undo here.
        }
    }

    trail.drop_levels_above(target);
}
