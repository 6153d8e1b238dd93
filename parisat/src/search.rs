//! The CDCL searcher.
//!
//! Runs the conflict / learn / backtrack loop for a bounded number of conflicts. The searcher
//! never runs concurrently with inprocessing: the outer loop alternates between the two, and the
//! renumberer requires the searcher to be at decision level 0 with a fully propagated trail.
use partial_ref::{partial, PartialRef};

use parisat_formula::Var;

use crate::analyze::analyze_conflict;
use crate::clause::{activity, db, reduce, ClauseHeader, Tier};
use crate::context::{parts::*, Context};
use crate::decision::make_decision;
use crate::incremental::{enqueue_assumption, EnqueueAssumption};
use crate::proof;
use crate::prop::{backtrack, enqueue_assignment, propagate, restart, Conflict, Reason};
use crate::state::SatState;

mod luby;

use luby::LubySequence;

/// Search statistics, aggregated across restarts.
#[derive(Default)]
pub struct SearchStats {
    /// Conflicts over the solver's lifetime.
    pub sum_conflicts: u64,
    /// Decisions over the solver's lifetime.
    pub decisions: u64,
    /// Restarts over the solver's lifetime.
    pub restarts: u64,
    /// Learned clauses that went to the core tier during the current solve call.
    pub core_learned_this_solve: u64,
}

/// The CDCL searcher's own state.
#[derive(Default)]
pub struct Searcher {
    pub stats: SearchStats,
    luby: LubySequence,
    next_restart: u64,
    conflicts_this_call: u64,
    /// Conflict counts at which the next database reductions are due.
    pub next_reduce_locals: u64,
    pub next_reduce_mids: u64,
    /// Saved phase per inter variable.
    phases: Vec<bool>,
}

impl Searcher {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.phases.resize(count, false);
    }

    /// Record the polarity of a variable that is being unassigned.
    pub fn save_phase(&mut self, var: Var, value: bool) {
        self.phases[var.index()] = value;
    }

    /// The saved polarity of a variable.
    pub fn saved_phase(&self, var: Var) -> bool {
        self.phases[var.index()]
    }

    /// Permute the saved phases through an inter variable mapping.
    pub fn map_vars(&mut self, map: impl Fn(usize) -> usize) {
        let mut new_phases = self.phases.clone();
        for (index, &phase) in self.phases.iter().enumerate() {
            new_phases[map(index)] = phase;
        }
        self.phases = new_phases;
    }
}

/// Run the searcher for up to `budget` conflicts.
///
/// Returns `Some(true)` on sat, `Some(false)` on unsat (possibly under assumptions) and `None`
/// when the budget ran out or an interruption was requested. The caller owns backtracking to
/// level 0 afterwards; on sat the assignment is left in place for model extension.
pub fn search<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseActivityP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ProofP<'a>,
        mut SearcherP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        ConfigP,
    ),
    budget: u64,
) -> Option<bool> {
    {
        let searcher = ctx.part_mut(SearcherP);
        searcher.conflicts_this_call = 0;
        searcher.next_restart = 0;
        searcher.luby = LubySequence::default();
    }

    loop {
        if ctx.part(SolverStateP).must_interrupt() {
            return None;
        }

        match propagate(ctx.borrow()) {
            Err(conflict) => {
                if let Some(result) = handle_conflict(ctx.borrow(), conflict) {
                    return result;
                }
                if ctx.part(SearcherP).conflicts_this_call >= budget {
                    return None;
                }
            }
            Ok(()) => {
                maybe_restart(ctx.borrow());
                reduce::reduce_if_due(ctx.borrow());

                match enqueue_assumption(ctx.borrow()) {
                    EnqueueAssumption::Conflict => {
                        ctx.part_mut(SolverStateP).sat_state = SatState::UnsatUnderAssumptions;
                        return Some(false);
                    }
                    EnqueueAssumption::Enqueued => continue,
                    EnqueueAssumption::Done => {}
                }

                ctx.part_mut(SearcherP).stats.decisions += 1;
                if !make_decision(ctx.borrow()) {
                    ctx.part_mut(SolverStateP).sat_state = SatState::Sat;
                    return Some(true);
                }
            }
        }
    }
}

/// Analyze a conflict, learn the asserting clause and backtrack.
///
/// Returns `Some(result)` when the search is finished.
fn handle_conflict<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut ClauseActivityP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ProofP<'a>,
        mut SearcherP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        ConfigP,
    ),
    conflict: Conflict,
) -> Option<Option<bool>> {
    {
        let searcher = ctx.part_mut(SearcherP);
        searcher.conflicts_this_call += 1;
        searcher.stats.sum_conflicts += 1;
    }

    if ctx.part(TrailP).current_level() == 0 {
        // A conflict without decisions derives the empty clause.
        let id = proof::next_id(ctx.borrow());
        proof::emit_add(ctx.borrow(), id, &[]);
        let state = ctx.part_mut(SolverStateP);
        state.ok = false;
        state.sat_state = SatState::Unsat;
        if state.unsat_id.is_none() {
            state.unsat_id = Some(id);
        }
        return Some(Some(false));
    }

    let backtrack_to = analyze_conflict(ctx.borrow(), conflict);
    let glue = ctx.part(AnalyzeConflictP).glue();
    let clause = ctx.part(AnalyzeConflictP).clause().to_vec();

    backtrack(ctx.borrow(), backtrack_to);

    // Backjumping below the assumptions pops some of them; they are re-enqueued one level at a
    // time before the next decision.
    {
        let level = ctx.part(TrailP).current_level();
        let incremental = ctx.part_mut(IncrementalP);
        if incremental.assumption_levels() > level {
            incremental.set_assumption_levels(level);
        }
    }

    let reason = match clause.len() {
        0 => {
            let id = proof::next_id(ctx.borrow());
            proof::emit_add(ctx.borrow(), id, &[]);
            let state = ctx.part_mut(SolverStateP);
            state.ok = false;
            state.sat_state = SatState::Unsat;
            if state.unsat_id.is_none() {
                state.unsat_id = Some(id);
            }
            return Some(Some(false));
        }
        // The enqueue below records the unit clause in the proof.
        1 => Reason::Unit,
        2 => {
            let id = proof::next_id(ctx.borrow());
            proof::emit_add(ctx.borrow(), id, &clause);
            ctx.part_mut(WatchlistsP)
                .add_binary([clause[0], clause[1]], true, id);
            Reason::Binary([clause[1]])
        }
        _ => {
            let id = proof::next_id(ctx.borrow());
            proof::emit_add(ctx.borrow(), id, &clause);

            let config = ctx.part(ConfigP);
            let tier = if glue <= config.glue_core_cutoff {
                ctx.part_mut(SearcherP).stats.core_learned_this_solve += 1;
                Tier::Core
            } else if glue <= ctx.part(ConfigP).glue_mid_cutoff {
                Tier::Mid
            } else {
                Tier::Local
            };

            let mut header = ClauseHeader::new();
            header.set_tier(tier);
            header.set_id(id);
            header.set_glue(glue);
            header.set_last_touched(ctx.part(SearcherP).stats.sum_conflicts as u32);

            let cref = db::add_clause(ctx.borrow(), header, &clause);
            activity::bump_clause_activity(ctx.borrow(), cref);
            Reason::Long(cref)
        }
    };

    enqueue_assignment(ctx.borrow(), clause[0], reason);

    ctx.part_mut(VsidsP).decay();
    activity::decay_clause_activities(ctx.borrow());

    None
}

/// Restart when the luby schedule says so.
fn maybe_restart<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut SearcherP,
        mut TrailP,
        mut VsidsP,
        ConfigP,
        IncrementalP,
    ),
) {
    let due = {
        let searcher = ctx.part(SearcherP);
        searcher.conflicts_this_call >= searcher.next_restart
    };
    if !due {
        return;
    }

    let scale = ctx.part(ConfigP).luby_restart_interval_scale;
    {
        let searcher = ctx.part_mut(SearcherP);
        let interval = scale * searcher.luby.advance();
        searcher.next_restart = searcher.conflicts_this_call + interval;
    }

    if ctx.part(TrailP).current_level() > ctx.part(IncrementalP).assumption_levels() {
        ctx.part_mut(SearcherP).stats.restarts += 1;
        restart(ctx.borrow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use proptest::prelude::*;

    use parisat_formula::test::{sat_formula, sgen_unsat_formula};

    use crate::admit::add_clause_outside;

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..5usize)) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            for clause in formula.iter() {
                add_clause_outside(ctx.borrow(), clause, false).unwrap();
            }

            let mut result = None;
            while result.is_none() && ctx.part(SolverStateP).ok {
                result = search(ctx.borrow(), 100);
            }

            prop_assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            for clause in formula.iter() {
                add_clause_outside(ctx.borrow(), clause, false).unwrap();
            }

            let result = search(ctx.borrow(), u64::max_value());

            prop_assert_eq!(result, Some(true));

            for clause in formula.iter() {
                let clause_satisfied = clause.iter().any(|&lit| {
                    let variables = ctx.part(VariablesP);
                    let outer = match variables.outer_from_outside_lit(lit) {
                        Some(outer) => outer,
                        None => return false,
                    };
                    let inter = variables.inter_from_outer_lit(outer);
                    ctx.part(AssignmentP).lit_is_true(inter)
                });
                prop_assert!(clause_satisfied, "clause not satisfied by model");
            }
        }
    }
}
