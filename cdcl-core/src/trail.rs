//! The assignment trail.
//!
//! Supports both trail variants named in the data model: a flat single trail with a control stack
//! of decision frames, and a per-level multi-trail with its own propagation cursor and a buffer of
//! not-yet-repaired conflicts. The same `Trail` value switches between the two based on
//! `multitrail`; level 0 is always the shared root trail in either mode.

use cdcl_formula::Lit;

use crate::vars::Conflict;

/// A decision frame: which literal opened the level, and where its trail segment begins.
struct Control {
    decision_lit: Lit,
    start: usize,
}

/// Decision and propagation history.
#[derive(Default)]
pub struct Trail {
    multitrail: bool,

    /// Root trail. In single-trail mode this holds every assignment; in multi-trail mode, only
    /// level 0's.
    trail: Vec<Lit>,
    /// Propagation cursor into `trail`.
    queue_head: usize,

    control: Vec<Control>,

    /// `level_trails[i]` is level `i + 1`'s trail. Only used in multi-trail mode.
    level_trails: Vec<Vec<Lit>>,
    /// Parallel propagation cursors for `level_trails`.
    level_propagated: Vec<usize>,

    /// Conflicts discovered but not yet repaired, lowest level first is not guaranteed; callers
    /// pick the minimum level themselves (see `propagate::propagate_conflicts`).
    conflicts: Vec<Conflict>,
}

impl Trail {
    pub fn new(multitrail: bool) -> Trail {
        Trail {
            multitrail,
            ..Trail::default()
        }
    }

    pub fn multitrail(&self) -> bool {
        self.multitrail
    }

    pub fn current_level(&self) -> usize {
        self.control.len()
    }

    /// Starts a new decision level for `lit`, which is enqueued separately by the caller.
    pub fn new_decision_level(&mut self, lit: Lit) {
        self.control.push(Control { decision_lit: lit, start: self.trail.len() });
        if self.multitrail {
            self.level_trails.push(Vec::new());
            self.level_propagated.push(0);
        }
    }

    pub fn decision_lit(&self, level: usize) -> Lit {
        self.control[level - 1].decision_lit
    }

    /// Appends `lit` to the trail owning `level` (0 is always the shared root trail).
    pub fn push(&mut self, lit: Lit, level: usize) {
        if !self.multitrail || level == 0 {
            self.trail.push(lit);
        } else {
            self.level_trails[level - 1].push(lit);
        }
    }

    pub fn size(&self, level: usize) -> usize {
        if !self.multitrail || level == 0 {
            self.trail.len()
        } else {
            self.level_trails[level - 1].len()
        }
    }

    pub fn trail_of(&self, level: usize) -> &[Lit] {
        if !self.multitrail || level == 0 {
            &self.trail
        } else {
            &self.level_trails[level - 1]
        }
    }

    pub fn propagated(&self, level: usize) -> usize {
        if !self.multitrail || level == 0 {
            self.queue_head
        } else {
            self.level_propagated[level - 1]
        }
    }

    pub fn set_propagated(&mut self, level: usize, n: usize) {
        if !self.multitrail || level == 0 {
            self.queue_head = n;
        } else {
            self.level_propagated[level - 1] = n;
        }
    }

    /// Smallest level greater than `last` with work left to propagate, or `None` at fixpoint.
    ///
    /// In single-trail mode there is only ever level 0.
    pub fn next_level_to_propagate(&self, last: isize) -> Option<usize> {
        if !self.multitrail {
            return if last < 0 && self.propagated(0) < self.size(0) {
                Some(0)
            } else {
                None
            };
        }
        for level in (last.max(-1) + 1) as usize..=self.current_level() {
            if self.propagated(level) < self.size(level) {
                return Some(level);
            }
        }
        None
    }

    pub fn fully_propagated(&self) -> bool {
        self.next_level_to_propagate(-1).is_none() && self.conflicts.is_empty()
    }

    pub fn push_conflict(&mut self, conflict: Conflict) {
        self.conflicts.push(conflict);
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn take_conflicts(&mut self) -> Vec<Conflict> {
        std::mem::take(&mut self.conflicts)
    }

    /// Drops assignments above `target` from a flat single trail, in chronological-backtrack
    /// order: the caller supplies the level of each popped literal and decides whether it survives
    /// (level ≤ target) or is unassigned (level > target).
    ///
    /// Returns the (possibly shorter) trail contents from `scan_start` on, in original order, for
    /// the caller to partition. `scan_start` is the index the first surviving-or-discarded literal
    /// of level `target + 1` begins at.
    pub fn scan_from_level(&self, target: usize) -> &[Lit] {
        let scan_start = self.control[target].start;
        &self.trail[scan_start..]
    }

    pub fn scan_start(&self, target: usize) -> usize {
        self.control[target].start
    }

    /// Replaces the trail contents from `scan_start` on with `compacted`, and truncates the
    /// control stack and propagation cursor to `target`.
    pub fn finish_single_backtrack(&mut self, target: usize, compacted: Vec<Lit>) {
        let scan_start = self.control[target].start;
        self.trail.truncate(scan_start);
        self.trail.extend(compacted);
        self.control.truncate(target);
        self.queue_head = self.queue_head.min(self.trail.len());
        self.conflicts.clear();
    }

    /// Drops every per-level trail above `target` (multi-trail mode).
    pub fn drop_levels_above(&mut self, target: usize) {
        self.level_trails.truncate(target);
        self.level_propagated.truncate(target);
        self.control.truncate(target);
        self.conflicts.clear();
    }

    pub fn level_trail_mut(&mut self, level: usize) -> &mut Vec<Lit> {
        debug_assert!(level >= 1);
        &mut self.level_trails[level - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdcl_formula::lit;

    #[test]
    fn single_trail_levels_and_cursor() {
        let mut trail = Trail::new(false);
        trail.push(lit![1], 0);
        trail.new_decision_level(lit![2]);
        trail.push(lit![2], 1);
        trail.push(lit![3], 1);

        assert_eq!(trail.current_level(), 1);
        assert_eq!(trail.size(0), 3);
        assert_eq!(trail.next_level_to_propagate(-1), Some(0));
        trail.set_propagated(0, 3);
        assert_eq!(trail.next_level_to_propagate(-1), None);
    }

    #[test]
    fn multi_trail_levels_are_independent() {
        let mut trail = Trail::new(true);
        trail.push(lit![1], 0);
        trail.new_decision_level(lit![2]);
        trail.push(lit![2], 1);
        trail.new_decision_level(lit![3]);
        trail.push(lit![3], 2);

        assert_eq!(trail.size(1), 1);
        assert_eq!(trail.size(2), 1);
        assert_eq!(trail.next_level_to_propagate(-1), Some(0));
        trail.set_propagated(0, 1);
        assert_eq!(trail.next_level_to_propagate(-1), Some(1));
    }
}
