//! Unit propagation.
//!
//! Implements the two-watched-literals scheme with blocking literals, Gent's (2013) two-cursor
//! replacement search for long clauses, and the level bookkeeping chronological and multi-trail
//! backtracking both depend on: an assignment's *level* is not always the current decision level,
//! it is the highest level among the antecedents that actually forced it.

use cdcl_formula::Lit;

use crate::clause::{ClauseDb, ClauseRef};
use crate::config::{Chrono, SolverConfig};
use crate::context::Context;
use crate::vars::{Conflict, Reason, VarStore};
use crate::watch::{Watch, Watchlists};

/// Computes the level a propagated literal should be recorded at, given the clause that forced
/// it (`propagated` is excluded from the antecedent scan).
///
/// With chrono off, callers always use `current_level` instead of calling this. With chrono on,
/// this is the maximum level among the clause's other (falsified) literals, which can be lower
/// than the current level: that is what lets the literal survive a backtrack past intervening
/// decision levels.
fn long_assignment_level(vars: &VarStore, clauses: &ClauseDb, propagated: Lit, clause: ClauseRef) -> usize {
    clauses
        .clause(clause)
        .lits
        .iter()
        .copied()
        .filter(|&l| l != propagated)
        .map(|l| vars.level(l.var()))
        .max()
        .unwrap_or(0)
}

/// Public entry point used by `Context::assign_driving`: the level a clause would force an
/// as-yet-unassigned literal to, honoring `chrono`.
pub fn assignment_level(
    config: &SolverConfig,
    vars: &VarStore,
    clauses: &ClauseDb,
    current_level: usize,
    propagated: Lit,
    clause: ClauseRef,
) -> usize {
    if config.chrono == Chrono::Off {
        current_level
    } else {
        long_assignment_level(vars, clauses, propagated, clause)
    }
}

/// A new assignment produced by a single propagation step, to be pushed onto the trail by the
/// caller (which owns the trail and therefore the trail-position bookkeeping).
struct NewAssignment {
    lit: Lit,
    level: usize,
}

/// An already-true literal whose antecedent level dropped below its currently recorded level, to
/// be relocated by the caller onto the lower level's trail.
struct Elevation {
    lit: Lit,
    level: usize,
    reason: Reason,
}

/// Whether an already-satisfied literal should be moved (`relocate`d) to a lower level, per
/// `multitrail_repair`: only ever lowers a level, and never touches a decision or root unit
/// (those have no antecedent to re-derive from, so there is nothing to elevate).
fn try_elevate(
    config: &SolverConfig,
    vars: &VarStore,
    lit: Lit,
    candidate_level: usize,
    candidate_reason: Reason,
) -> Option<Elevation> {
    if !config.multitrail || !config.multitrail_repair {
        return None;
    }
    let var = lit.var();
    if candidate_level >= vars.level(var) {
        return None;
    }
    match vars.reason(var) {
        Reason::Decision | Reason::RootUnit => None,
        _ => Some(Elevation { lit, level: candidate_level, reason: candidate_reason }),
    }
}

/// Propagates the single literal whose negation (`false_lit`) was just assigned, rewriting the
/// watch list of `false_lit` in place.
///
/// Returns the new assignments this step produced, or the first conflicting clause found. Any
/// assignments already applied before a conflict was hit remain in effect (matching the teacher's
/// behavior: propagation does not roll back partial work on conflict, the caller backtracks).
fn propagate_literal(
    config: &SolverConfig,
    current_level: usize,
    vars: &mut VarStore,
    watches: &mut Watchlists,
    clauses: &mut ClauseDb,
    false_lit: Lit,
) -> (Vec<NewAssignment>, Vec<Elevation>, Option<Conflict>) {
    let mut produced = Vec::new();
    let mut elevated = Vec::new();
    let mut conflict = None;

    let list = watches.take(false_lit);
    let mut kept = Vec::with_capacity(list.len());

    let mut iter = list.into_iter();
    while let Some(watch) = iter.next() {
        if conflict.is_some() {
            kept.push(watch);
            continue;
        }

        if watch.is_binary {
            let candidate_level = if config.chrono == Chrono::Off {
                current_level
            } else {
                vars.level(false_lit.var())
            };
            if vars.is_true(watch.blocking) {
                if let Some(e) = try_elevate(config, vars, watch.blocking, candidate_level, Reason::Binary(false_lit)) {
                    elevated.push(e);
                }
            } else if vars.is_false(watch.blocking) {
                conflict = Some(Conflict::Binary([false_lit, watch.blocking]));
            } else {
                vars.assign(watch.blocking, candidate_level, 0, Reason::Binary(false_lit));
                produced.push(NewAssignment { lit: watch.blocking, level: candidate_level });
            }
            kept.push(watch);
            continue;
        }

        if vars.is_true(watch.blocking) {
            kept.push(watch);
            continue;
        }

        let record = clauses.clause_mut(watch.clause);
        if record.lits[0] == false_lit {
            record.lits.swap(0, 1);
        }
        debug_assert_eq!(record.lits[1], false_lit);

        if vars.is_true(record.lits[0]) {
            let propagated = record.lits[0];
            let candidate_level = if config.chrono == Chrono::Off {
                current_level
            } else {
                record
                    .lits
                    .iter()
                    .copied()
                    .filter(|&l| l != propagated)
                    .map(|l| vars.level(l.var()))
                    .max()
                    .unwrap_or(0)
            };
            if let Some(e) = try_elevate(config, vars, propagated, candidate_level, Reason::Long(watch.clause)) {
                elevated.push(e);
            }

            // Under multitrail, a clause satisfied through `propagated` can still be watched on
            // a literal lower than the level a later backtrack would drop first; rehome the
            // second watch onto a higher-level literal when one is available, so the clause
            // stays watched by its two highest-level literals instead of just refreshing the
            // blocker. Leaves `propagated` itself (lits[0]) untouched.
            if config.multitrail {
                let false_level = vars.level(false_lit.var());
                let len = record.lits.len();
                let better = (2..len).find(|&k| vars.level(record.lits[k].var()) > false_level);
                if let Some(k) = better {
                    record.lits.swap(1, k);
                    let new_watch_lit = record.lits[1];
                    watches.push(new_watch_lit, Watch { blocking: propagated, is_binary: false, clause: watch.clause });
                    continue;
                }
            }

            kept.push(Watch { blocking: propagated, ..watch });
            continue;
        }

        let len = record.lits.len();
        let mut replacement = None;
        let mut scan = record.pos.clamp(2, len);
        for _ in 0..len.saturating_sub(2) {
            if scan >= len {
                scan = 2;
            }
            if !vars.is_false(record.lits[scan]) {
                replacement = Some(scan);
                break;
            }
            scan += 1;
        }

        if let Some(found) = replacement {
            record.lits.swap(1, found);
            record.pos = if found + 1 < len { found + 1 } else { 2 };
            let new_watch_lit = record.lits[1];
            let blocking = record.lits[0];
            watches.push(new_watch_lit, Watch { blocking, is_binary: false, clause: watch.clause });
            continue;
        }

        let unit_lit = record.lits[0];
        if vars.is_false(unit_lit) {
            conflict = Some(Conflict::Long(watch.clause));
            kept.push(watch);
        } else {
            let level = if config.chrono == Chrono::Off {
                current_level
            } else {
                long_assignment_level(vars, clauses, unit_lit, watch.clause)
            };
            vars.assign(unit_lit, level, 0, Reason::Long(watch.clause));
            produced.push(NewAssignment { lit: unit_lit, level });

            // chrono=2 additionally rewatches the unit to its true level: `level` is the max
            // level among *all* the clause's false literals, including false_lit itself, so it
            // can only ever be >= false_lit's own level. When some other false literal actually
            // has the higher level, false_lit is not the one the unit's derivation depends on;
            // backtracking to a level between the two would unassign that other literal (losing
            // the derivation's real justification) while leaving false_lit, and thus this watch,
            // untouched. Rehome the second watch onto a literal genuinely at `level` instead.
            let mut rehomed = false;
            if config.chrono == Chrono::Level2 && level > vars.level(false_lit.var()) {
                let record = clauses.clause_mut(watch.clause);
                let len = record.lits.len();
                if let Some(k) = (2..len).find(|&k| vars.level(record.lits[k].var()) == level) {
                    record.lits.swap(1, k);
                    let new_watch_lit = record.lits[1];
                    watches.push(new_watch_lit, Watch { blocking: unit_lit, is_binary: false, clause: watch.clause });
                    rehomed = true;
                }
            }
            if !rehomed {
                kept.push(watch);
            }
        }
    }

    kept.extend(iter);
    watches.restore(false_lit, kept);

    (produced, elevated, conflict)
}

fn apply_and_push(ctx: &mut Context, produced: Vec<NewAssignment>, elevated: Vec<Elevation>) {
    for new in produced {
        let level = new.level;
        let trail_pos = ctx.trail.size(level);
        // The value and reason were already recorded by `propagate_literal`; only the trail
        // position depends on the trail, which that function cannot borrow at the same time as
        // the watch list it is mutating. Patch it in now that both are available again.
        let reason = ctx.vars.reason(new.lit.var());
        ctx.vars.relocate(new.lit.var(), level, trail_pos, reason);
        ctx.trail.push(new.lit, level);
    }

    for elevation in elevated {
        let trail_pos = ctx.trail.size(elevation.level);
        ctx.vars.relocate(elevation.lit.var(), elevation.level, trail_pos, elevation.reason);
        ctx.trail.push(elevation.lit, elevation.level);
    }
}

/// Drains the single-trail propagation queue to fixpoint or conflict.
pub fn propagate_single(ctx: &mut Context) -> Result<(), Conflict> {
    loop {
        let level = ctx.trail.current_level();
        let pos = ctx.trail.propagated(0);
        let size = ctx.trail.size(0);
        if pos >= size {
            return Ok(());
        }
        let lit = ctx.trail.trail_of(0)[pos];
        ctx.trail.set_propagated(0, pos + 1);

        let Context { config, vars, watches, clauses, .. } = ctx;
        let (produced, elevated, conflict) = propagate_literal(config, level, vars, watches, clauses, !lit);
        apply_and_push(ctx, produced, elevated);
        if let Some(conflict) = conflict {
            return Err(conflict);
        }
    }
}

/// Drains every per-level queue in increasing level order, buffering conflicts instead of
/// stopping at the first one, then resolves buffered conflicts once no level has pending work.
pub fn propagate_multitrail(ctx: &mut Context) -> Result<(), Conflict> {
    loop {
        let mut last = -1isize;
        while let Some(level) = ctx.trail.next_level_to_propagate(last) {
            last = level as isize;
            let pos = ctx.trail.propagated(level);
            let size = ctx.trail.size(level);
            if pos >= size {
                continue;
            }
            let lit = ctx.trail.trail_of(level)[pos];
            ctx.trail.set_propagated(level, pos + 1);

            let Context { config, vars, watches, clauses, .. } = ctx;
            let (produced, elevated, conflict) = propagate_literal(config, level, vars, watches, clauses, !lit);
            apply_and_push(ctx, produced, elevated);
            if let Some(conflict) = conflict {
                ctx.trail.push_conflict(conflict);
            }
        }

        if ctx.trail.conflicts().is_empty() {
            return Ok(());
        }

        if let Some(conflict) = propagate_conflicts(ctx) {
            return Err(conflict);
        }
    }
}

/// Resolves the buffered conflict list down to the one with the lowest forcing level, which is
/// the one conflict analysis should actually handle; the rest are left for after backtracking
/// repairs them away (they typically do, since they depend on assignments above that level).
fn propagate_conflicts(ctx: &mut Context) -> Option<Conflict> {
    let conflicts = ctx.trail.take_conflicts();
    if conflicts.len() > 1 {
        log::trace!("multitrail: resolving {} buffered conflicts", conflicts.len());
    }
    let mut lowest: Option<(usize, Conflict)> = None;

    for conflict in conflicts {
        let level = conflict
            .lits(&ctx.clauses)
            .iter()
            .map(|l| ctx.vars.level(l.var()))
            .max()
            .unwrap_or(0);
        match &lowest {
            Some((best_level, _)) if *best_level <= level => {}
            _ => lowest = Some((level, conflict)),
        }
    }

    lowest.map(|(_, c)| c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverConfig;
    use crate::context::Context;
    use cdcl_formula::lit;

    #[test]
    fn s1_binary_clause_propagates_unit() {
        let mut ctx = Context::new(SolverConfig::default());
        ctx.ensure_var_count(4);
        ctx.add_clause(vec![lit![-1], lit![2]]);
        ctx.assign_unit(lit![1]);
        ctx.propagate().unwrap();
        assert!(ctx.vars.is_true(lit![2]));
    }

    #[test]
    fn long_clause_propagates_when_all_but_one_falsified() {
        let mut ctx = Context::new(SolverConfig::default());
        ctx.ensure_var_count(4);
        ctx.add_clause(vec![lit![1], lit![2], lit![3]]);
        ctx.assign_unit(lit![-1]);
        ctx.assign_unit(lit![-2]);
        ctx.propagate().unwrap();
        assert!(ctx.vars.is_true(lit![3]));
    }

    #[test]
    fn conflicting_unit_assignments_are_reported() {
        let mut ctx = Context::new(SolverConfig::default());
        ctx.ensure_var_count(4);
        ctx.add_clause(vec![lit![-1], lit![2]]);
        ctx.assign_unit(lit![1]);
        ctx.assign_unit(lit![-2]);
        assert!(ctx.propagate().is_err());
    }

    #[test]
    fn s4_gent_cursor_finds_replacement_without_rescanning_from_start() {
        let mut ctx = Context::new(SolverConfig::default());
        ctx.ensure_var_count(10);
        let cref = ctx.add_clause(vec![lit![1], lit![2], lit![3], lit![4], lit![5]]);

        // Falsify the watched literals one at a time; each step must find a replacement by
        // resuming the search at the saved cursor instead of rescanning from position 2, or the
        // cursor would keep landing on literals already known to be false.
        ctx.assign_unit(lit![-1]);
        ctx.propagate().unwrap();
        ctx.assign_unit(lit![-2]);
        ctx.propagate().unwrap();
        ctx.assign_unit(lit![-3]);
        ctx.propagate().unwrap();

        // Two literals remain unassigned, so the clause is not unit yet; the cursor has wrapped
        // back around to position 2 after walking off the end of the literal list.
        assert!(ctx.vars.is_unassigned(lit![4]));
        assert!(ctx.vars.is_unassigned(lit![5]));
        assert_eq!(ctx.clauses.clause(cref).pos, 2);
    }

    #[test]
    fn binary_clause_propagates_at_the_deciding_level_under_chrono_and_multitrail() {
        let mut config = SolverConfig::default();
        config.chrono = Chrono::Level1;
        config.multitrail = true;
        let mut ctx = Context::new(config);
        ctx.ensure_var_count(6);

        ctx.assign_decision(lit![1]);
        ctx.add_clause(vec![lit![-1], lit![2]]);
        ctx.propagate().unwrap();
        assert!(ctx.vars.is_true(lit![2]));
        assert_eq!(ctx.vars.level(lit![2].var()), 1);
    }

    #[test]
    fn s3_elevation_lowers_the_level_of_an_already_true_literal() {
        let mut config = SolverConfig::default();
        config.chrono = Chrono::Level1;
        config.multitrail = true;
        config.multitrail_repair = true;

        let mut vars = VarStore::default();
        vars.set_var_count(8);
        // `2` was first derived at level 2 from a binary antecedent.
        vars.assign(lit![2], 2, 0, Reason::Binary(lit![-3]));

        let elevation = try_elevate(&config, &vars, lit![2], 1, Reason::Binary(lit![-1]))
            .expect("a propagated literal with a higher recorded level should elevate");
        assert_eq!(elevation.level, 1);

        // A decision can never be elevated: it has no antecedent to justify a different level.
        vars.assign(lit![5], 2, 0, Reason::Decision);
        assert!(try_elevate(&config, &vars, lit![5], 1, Reason::Binary(lit![-1])).is_none());

        // A higher candidate level never displaces a lower recorded one.
        assert!(try_elevate(&config, &vars, lit![2], 3, Reason::Binary(lit![-1])).is_none());

        // multitrail_repair off: no elevation at all, even though it otherwise qualifies.
        let mut no_repair = config.clone();
        no_repair.multitrail_repair = false;
        assert!(try_elevate(&no_repair, &vars, lit![2], 1, Reason::Binary(lit![-1])).is_none());
    }

    #[test]
    fn chrono_level2_rewatches_a_unit_clause_to_its_true_level() {
        let mut config = SolverConfig::default();
        config.chrono = Chrono::Level2;

        let mut vars = VarStore::default();
        vars.set_var_count(8);
        // `4` (the literal about to be propagated on) sits at level 2, but `3` (another false
        // literal in the same clause) sits at level 3: the unit `1` really depends on `3`, not on
        // `4`, so the second watch should move there instead of staying on `4`.
        vars.assign(lit![-2], 1, 0, Reason::Decision);
        vars.assign(lit![-4], 2, 0, Reason::Decision);
        vars.assign(lit![-3], 3, 0, Reason::Decision);

        let mut clauses = ClauseDb::new();
        let cref = clauses.add_clause(vec![lit![1], lit![4], lit![2], lit![3]]);
        let mut watches = Watchlists::default();
        watches.set_var_count(8);
        watches.watch(lit![4], lit![1], false, cref);

        let (produced, _elevated, conflict) =
            propagate_literal(&config, 3, &mut vars, &mut watches, &mut clauses, lit![4]);
        assert!(conflict.is_none());
        assert_eq!(produced.len(), 1);
        assert_eq!(produced[0].lit, lit![1]);
        assert_eq!(produced[0].level, 3);

        assert_eq!(clauses.clause(cref).lits[1], lit![3]);
        assert!(watches.watches_of(lit![3]).iter().any(|w| w.clause == cref));
        assert!(watches.watches_of(lit![4]).is_empty());
    }

    #[test]
    fn chrono_level1_leaves_the_unit_clause_watched_on_the_triggering_literal() {
        // Same levels as above, but chrono=1: no rewatch, matching the documented difference
        // between `Level1` and `Level2`.
        let mut config = SolverConfig::default();
        config.chrono = Chrono::Level1;

        let mut vars = VarStore::default();
        vars.set_var_count(8);
        vars.assign(lit![-2], 1, 0, Reason::Decision);
        vars.assign(lit![-4], 2, 0, Reason::Decision);
        vars.assign(lit![-3], 3, 0, Reason::Decision);

        let mut clauses = ClauseDb::new();
        let cref = clauses.add_clause(vec![lit![1], lit![4], lit![2], lit![3]]);
        let mut watches = Watchlists::default();
        watches.set_var_count(8);
        watches.watch(lit![4], lit![1], false, cref);

        propagate_literal(&config, 3, &mut vars, &mut watches, &mut clauses, lit![4]);

        assert_eq!(clauses.clause(cref).lits[1], lit![4]);
        assert!(watches.watches_of(lit![4]).iter().any(|w| w.clause == cref));
    }

    #[test]
    fn multitrail_rebalances_an_already_true_long_clause_to_its_highest_level_literals() {
        let mut config = SolverConfig::default();
        config.chrono = Chrono::Level1;
        config.multitrail = true;

        let mut vars = VarStore::default();
        vars.set_var_count(8);
        vars.assign(lit![5], 4, 0, Reason::Decision);
        vars.assign(lit![-4], 2, 0, Reason::Decision);
        vars.assign(lit![-2], 1, 0, Reason::Decision);
        vars.assign(lit![-3], 3, 0, Reason::Decision);

        let mut clauses = ClauseDb::new();
        let cref = clauses.add_clause(vec![lit![5], lit![4], lit![2], lit![3]]);
        let mut watches = Watchlists::default();
        watches.set_var_count(8);
        watches.watch(lit![4], lit![5], false, cref);

        let (produced, _elevated, conflict) =
            propagate_literal(&config, 4, &mut vars, &mut watches, &mut clauses, lit![4]);
        assert!(conflict.is_none());
        assert!(produced.is_empty());

        assert_eq!(clauses.clause(cref).lits[1], lit![3]);
        assert!(watches.watches_of(lit![3]).iter().any(|w| w.clause == cref));
        assert!(watches.watches_of(lit![4]).is_empty());
    }
}
