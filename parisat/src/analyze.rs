//! Learns a new clause by analyzing a conflict.
use std::mem::swap;

use partial_ref::{partial, PartialRef};

use parisat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::prop::{Conflict, Reason};

/// Temporaries and statistics for conflict analysis.
#[derive(Default)]
pub struct AnalyzeConflict {
    /// This is the learned clause after analysis finishes.
    clause: Vec<Lit>,
    /// Number of literals of the current level in the current clause.
    current_level_count: usize,
    /// Variables in the current clause.
    var_flags: Vec<bool>,
    /// Entries to clean in `var_flags`.
    to_clean: Vec<Var>,
    /// Glue of the learned clause.
    glue: u32,
    /// Literals in learned clauses before minimization, accumulated.
    pub lits_before_minimization: u64,
    /// Literals removed by direct self-subsumption, accumulated.
    pub lits_removed: u64,
    /// Literals removed by the recursive check on top of the direct one, accumulated.
    pub lits_removed_recursive: u64,
}

impl AnalyzeConflict {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_flags.resize(count, false);
    }

    /// The learned clause.
    pub fn clause(&self) -> &[Lit] {
        &self.clause
    }

    /// The number of distinct decision levels in the learned clause.
    pub fn glue(&self) -> u32 {
        self.glue
    }

    /// Reset the minimization statistics, returning their previous values.
    pub fn take_minimization_stats(&mut self) -> (u64, u64, u64) {
        let stats = (
            self.lits_before_minimization,
            self.lits_removed,
            self.lits_removed_recursive,
        );
        self.lits_before_minimization = 0;
        self.lits_removed = 0;
        self.lits_removed_recursive = 0;
        stats
    }
}

/// Learns a new clause by analyzing a conflict.
///
/// Returns the lowest decision level that makes the learned clause asserting.
pub fn analyze_conflict<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut VsidsP,
        ClauseAllocP,
        ConfigP,
        ImplGraphP,
        TrailP,
    ),
    conflict: Conflict,
) -> usize {
    {
        let analyze = ctx.part_mut(AnalyzeConflictP);
        analyze.clause.clear();
        analyze.current_level_count = 0;
        analyze.glue = 0;
    }

    if ctx.part(TrailP).current_level() == 0 {
        // Conflict with no decisions, generate the empty clause.
        return 0;
    }

    // We start with all the literals of the conflicting constraint.
    {
        let (alloc, mut ctx) = ctx.split_part(ClauseAllocP);
        for &lit in conflict.lits(alloc) {
            add_literal(ctx.borrow(), lit);
        }
    }

    // To get rid of all but one literal of the current level, we resolve the clause with the
    // reason for those literals. The correct order for this is reverse chronological.
    {
        let (alloc, mut ctx) = ctx.split_part(ClauseAllocP);
        let (trail, mut ctx) = ctx.split_part(TrailP);

        for &lit in trail.trail().iter().rev() {
            let lit_present = {
                let analyze = ctx.part_mut(AnalyzeConflictP);
                let present = &mut analyze.var_flags[lit.index()];
                let was_present = *present;
                if was_present {
                    *present = false;
                    analyze.current_level_count -= 1;
                }
                was_present
            };

            if !lit_present {
                continue;
            }

            ctx.part_mut(VsidsP).bump(lit.var());

            if ctx.part(AnalyzeConflictP).current_level_count == 0 {
                // lit is the last literal of the current level present in the current clause,
                // therefore the resulting clause will assert !lit so we put it in position 0.
                let analyze = ctx.part_mut(AnalyzeConflictP);
                analyze.clause.push(!lit);
                let end = analyze.clause.len() - 1;
                analyze.clause.swap(0, end);
                break;
            } else {
                // We removed the literal and now add its reason.
                let reason = *ctx.part(ImplGraphP).reason(lit.var());
                for &reason_lit in reason.lits(alloc) {
                    add_literal(ctx.borrow(), reason_lit);
                }
            }
        }
    }

    {
        let len = ctx.part(AnalyzeConflictP).clause.len() as u64;
        ctx.part_mut(AnalyzeConflictP).lits_before_minimization += len;
    }

    minimize(ctx.borrow());

    // Clean the variable flags of the remaining clause literals.
    {
        let analyze = ctx.part_mut(AnalyzeConflictP);
        for var in analyze.to_clean.drain(..) {
            analyze.var_flags[var.index()] = false;
        }
    }

    // We find the highest level literal besides the asserted literal and move it into position
    // 1. This is important to ensure the watchlist invariant holds on backtracking.
    let mut backtrack_to = 0;

    {
        let (analyze, ctx) = ctx.split_part_mut(AnalyzeConflictP);
        let impl_graph = ctx.part(ImplGraphP);

        if analyze.clause.len() > 1 {
            let (prefix, rest) = analyze.clause.split_at_mut(2);
            let lit_1 = &mut prefix[1];
            backtrack_to = impl_graph.level(lit_1.var());
            for lit in rest.iter_mut() {
                let lit_level = impl_graph.level(lit.var());
                if lit_level > backtrack_to {
                    backtrack_to = lit_level;
                    swap(lit_1, lit);
                }
            }
        }

        // Glue is the number of distinct decision levels in the learned clause.
        let mut levels: Vec<usize> = analyze
            .clause
            .iter()
            .map(|lit| impl_graph.level(lit.var()))
            .collect();
        levels.sort_unstable();
        levels.dedup();
        analyze.glue = levels.len() as u32;
    }

    backtrack_to
}

/// Add a literal to the current clause.
fn add_literal<'a>(
    mut ctx: partial!(Context<'a>, mut AnalyzeConflictP, mut VsidsP, ImplGraphP, TrailP),
    lit: Lit,
) {
    let lit_level = ctx.part(ImplGraphP).level(lit.var());
    let current_level = ctx.part(TrailP).current_level();
    let analyze = ctx.part_mut(AnalyzeConflictP);
    // No need to add literals that are set by unit clauses or already present.
    if lit_level > 0 && !analyze.var_flags[lit.index()] {
        analyze.var_flags[lit.index()] = true;
        if lit_level == current_level {
            analyze.current_level_count += 1;
        } else {
            analyze.clause.push(lit);
            analyze.to_clean.push(lit.var());
        }
    }
}

/// Self-subsumption minimization of the learned clause.
///
/// A literal is redundant when its reason literals are all in the clause, on level 0, or (with
/// the recursive check enabled) themselves redundant.
fn minimize<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        ClauseAllocP,
        ConfigP,
        ImplGraphP,
    ),
) {
    let recursive = ctx.part(ConfigP).recursive_minimization;

    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let (alloc, ctx) = ctx.split_part(ClauseAllocP);
    let impl_graph = ctx.part(ImplGraphP);

    if analyze.clause.len() <= 1 {
        return;
    }

    let mut keep = vec![true; analyze.clause.len()];
    let mut removed = 0u64;
    let mut removed_recursive = 0u64;

    for (index, &lit) in analyze.clause.iter().enumerate().skip(1) {
        // Direct check: every reason literal of lit is already in the clause or on level 0.
        let reason = *impl_graph.reason(lit.var());
        if reason.is_unit() {
            continue;
        }

        let direct = reason.lits(alloc).iter().all(|&reason_lit| {
            impl_graph.level(reason_lit.var()) == 0 || analyze.var_flags[reason_lit.index()]
        });

        if direct {
            keep[index] = false;
            removed += 1;
            continue;
        }

        if !recursive {
            continue;
        }

        // Recursive check with a bounded depth-first walk over the reason graph.
        let mut pending: Vec<Lit> = reason
            .lits(alloc)
            .iter()
            .cloned()
            .filter(|&reason_lit| {
                impl_graph.level(reason_lit.var()) != 0
                    && !analyze.var_flags[reason_lit.index()]
            })
            .collect();
        let mut visited: Vec<Lit> = vec![];
        let mut redundant = true;
        let mut budget = 256usize;

        while let Some(next) = pending.pop() {
            if budget == 0 {
                redundant = false;
                break;
            }
            budget -= 1;

            let next_reason = *impl_graph.reason(next.var());
            if next_reason.is_unit() {
                // A decision or assumption outside the clause blocks the resolution.
                redundant = false;
                break;
            }
            for &reason_lit in next_reason.lits(alloc) {
                if impl_graph.level(reason_lit.var()) == 0
                    || analyze.var_flags[reason_lit.index()]
                    || visited.contains(&reason_lit)
                {
                    continue;
                }
                visited.push(reason_lit);
                pending.push(reason_lit);
            }
        }

        if redundant {
            keep[index] = false;
            removed += 1;
            removed_recursive += 1;
        }
    }

    analyze.lits_removed += removed;
    analyze.lits_removed_recursive += removed_recursive;

    let mut index = 0;
    analyze.clause.retain(|_| {
        let retain = keep[index];
        index += 1;
        retain
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parisat_formula::lits;

    use crate::admit::{add_clause_int, ClauseSource};
    use crate::prop::{backtrack, enqueue_assignment, propagate};
    use crate::variables::ensure_outside_vars;

    #[test]
    fn learns_asserting_clause() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        ensure_outside_vars(ctx.borrow(), 5);

        add_clause_int(ctx.borrow(), &lits![-1, 2], false, ClauseSource::Derived);
        add_clause_int(ctx.borrow(), &lits![-1, -2, 3], false, ClauseSource::Derived);
        add_clause_int(ctx.borrow(), &lits![-3, 4], false, ClauseSource::Derived);
        add_clause_int(ctx.borrow(), &lits![-3, -4], false, ClauseSource::Derived);

        // Decide x1, which propagates into a conflict between x4 and ¬x4.
        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lits![1][0], Reason::Unit);

        let conflict = propagate(ctx.borrow()).unwrap_err();

        let backtrack_to = analyze_conflict(ctx.borrow(), conflict);
        assert_eq!(backtrack_to, 0);

        let clause = ctx.part(AnalyzeConflictP).clause().to_vec();
        assert!(!clause.is_empty());
        // The asserting literal must be falsified by the current assignment.
        assert!(ctx.part(AssignmentP).lit_is_false(clause[0]));

        backtrack(ctx.borrow(), 0);
        assert_eq!(ctx.part(TrailP).current_level(), 0);
    }
}
