//! The outer solve loop.
//!
//! Alternates between bounded search and inprocessing until a terminal status is reached: the
//! per-iteration conflict budget grows geometrically, clipped by the global conflict and wall
//! clock budgets, and every iteration starts by (re)initializing the Gaussian matrices.
use partial_ref::{partial, PartialRef};

use parisat_formula::Lit;

use crate::context::{parts::*, Context};
use crate::gauss;
use crate::model;
use crate::occ;
use crate::proof;
use crate::prop::full_restart;
use crate::search;
use crate::solver::SolverError;
use crate::state::SatState;
use crate::strategy;
use crate::variables;
use crate::verify;

/// Conflict budget of one search iteration.
fn calc_num_confl_this_iter<'a>(
    mut ctx: partial!(Context<'a>, ConfigP, SearcherP),
    iteration: u64,
) -> u64 {
    let config = ctx.part(ConfigP);

    let mult = config
        .search_conflicts_inc
        .powi(iteration.min(100) as i32)
        .min(config.search_conflicts_inc_max);
    let mut budget = (config.search_conflicts as f64 * mult) as u64;

    if config.never_stop_search {
        budget = 600_000_000;
    }

    let spent = ctx.part(SearcherP).stats.sum_conflicts;
    if config.max_conflicts >= spent {
        budget.min(config.max_conflicts - spent)
    } else {
        0
    }
}

/// The search ↔ simplify iteration.
fn iterate_until_solved<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseActivityP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut DatasyncP,
        mut GaussP,
        mut ImplGraphP,
        mut IncrementalP,
        mut OccP,
        mut ProofP<'a>,
        mut SearcherP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VarReplacerP,
        mut VsidsP,
        mut WatchlistsP,
        mut XorsP,
        mut ConfigP,
    ),
) -> Option<bool> {
    let mut status = None;
    let mut iteration = 0u64;

    while status.is_none() {
        if ctx.part(SolverStateP).must_interrupt() {
            break;
        }
        {
            let state = ctx.part(SolverStateP);
            let config = ctx.part(ConfigP);
            if state.solve_started.elapsed().as_secs_f64() > config.max_time {
                break;
            }
            if ctx.part(SearcherP).stats.sum_conflicts >= config.max_conflicts {
                break;
            }
        }

        iteration += 1;

        let budget = calc_num_confl_this_iter(ctx.borrow(), iteration);
        if budget == 0 {
            break;
        }

        if !gauss::find_and_init_all_matrices(ctx.borrow()) {
            status = Some(false);
            break;
        }

        status = search::search(ctx.borrow(), budget);

        check_minimization_effectiveness(ctx.borrow());
        check_too_many_in_tier0(ctx.borrow());

        if status.is_some() {
            break;
        }

        if ctx.part(SolverStateP).must_interrupt() {
            break;
        }

        if ctx.part(ConfigP).do_simplify && ctx.part(SolverStateP).ok {
            full_restart(ctx.borrow());
            let nonstartup = ctx.part(ConfigP).schedule_nonstartup.clone();
            if let Some(result) = strategy::simplify_problem(ctx.borrow(), false, &nonstartup) {
                status = Some(result);
            }
        }
    }

    status
}

/// Disable recursive minimization when it stopped paying for itself.
fn check_minimization_effectiveness<'a>(
    mut ctx: partial!(Context<'a>, mut AnalyzeConflictP, mut ConfigP),
) {
    let (before, _removed, removed_recursive) =
        ctx.part_mut(AnalyzeConflictP).take_minimization_stats();

    if before < 100_000 {
        return;
    }

    let config = ctx.part_mut(ConfigP);
    if config.recursive_minimization {
        let gain = removed_recursive as f64 / before as f64;
        if gain < config.recursive_minimization_min_gain {
            config.recursive_minimization = false;
            log::info!(
                "recursive minimization disabled, gain was {:.1}%",
                gain * 100.0
            );
        }
    }
}

/// Lower the core tier glue cutoff when too many learned clauses reach it.
fn check_too_many_in_tier0<'a>(
    mut ctx: partial!(Context<'a>, mut ConfigP, mut SolverStateP, SearcherP),
) {
    let stats = &ctx.part(SearcherP).stats;
    let conflicts = stats.sum_conflicts;
    let core_learned = stats.core_learned_this_solve;

    {
        let state = ctx.part(SolverStateP);
        let config = ctx.part(ConfigP);
        if config.glue_core_cutoff <= 2
            || conflicts < config.adjust_glue_cutoff_min_conflicts
            || state.adjusted_glue_cutoff
        {
            return;
        }
    }

    let fraction = core_learned as f64 / conflicts.max(1) as f64;
    if fraction > ctx.part(ConfigP).adjust_glue_cutoff_above {
        ctx.part_mut(ConfigP).glue_core_cutoff -= 1;
        ctx.part_mut(SolverStateP).adjusted_glue_cutoff = true;
        log::info!(
            "glue cutoff lowered to {} because {:.0}% of conflicts reached the core tier",
            ctx.part(ConfigP).glue_core_cutoff,
            fraction * 100.0
        );
    }
}

/// Install the assumption set for the coming solve call.
fn set_assumptions<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut OccP,
        mut ProofP<'a>,
        mut SearcherP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VarReplacerP,
        mut VsidsP,
        mut WatchlistsP,
        ConfigP,
    ),
    outside_assumptions: &[Lit],
) -> Result<(), SolverError> {
    // Clear the marks of the previous assumption set.
    {
        let variables = ctx.part_mut(VariablesP);
        for index in 0..variables.count() {
            variables
                .var_data_mut(parisat_formula::Var::from_index(index))
                .assumed = None;
        }
    }

    if let Some(max_index) = outside_assumptions.iter().map(|lit| lit.index()).max() {
        variables::ensure_outside_vars(ctx.borrow(), max_index + 1);
    }

    let mut inter_assumptions = Vec::with_capacity(outside_assumptions.len());
    let mut outer_assumptions = Vec::with_capacity(outside_assumptions.len());

    for &outside in outside_assumptions.iter() {
        let outer = {
            let variables = ctx.part(VariablesP);
            let outer = variables
                .outer_from_outside_lit(outside)
                .expect("assumption variable was just created");
            ctx.part(VarReplacerP).replaced_with(outer)
        };

        // Assumption variables must be visible to the searcher.
        if ctx.part(VariablesP).var_data(outer.var()).removed
            == crate::variables::data::Removed::Eliminated
        {
            if !occ::uneliminate(ctx.borrow(), outer.var()) {
                break;
            }
        }

        ctx.part_mut(VariablesP).var_data_mut(outer.var()).assumed =
            Some(outer.is_positive());

        outer_assumptions.push(outer);
        let inter = ctx.part(VariablesP).inter_from_outer_lit(outer);
        inter_assumptions.push(inter);
    }

    ctx.part_mut(IncrementalP)
        .set_assumptions(inter_assumptions, outer_assumptions);

    Ok(())
}

/// Entry point: check satisfiability under an optional assumption set.
///
/// Returns `Some(true)` on sat, `Some(false)` on unsat and `None` when a budget ran out or an
/// interruption was requested.
pub fn solve_with_assumptions<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseActivityP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut DatasyncP,
        mut GaussP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ModelP,
        mut OccP,
        mut ProofP<'a>,
        mut SearcherP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VarReplacerP,
        mut VsidsP,
        mut WatchlistsP,
        mut XorsP,
        mut ConfigP,
    ),
    assumptions: &[Lit],
    only_sampling_solution: bool,
) -> Result<Option<bool>, SolverError> {
    reset_for_solving(ctx.borrow());

    full_restart(ctx.borrow());
    set_assumptions(ctx.borrow(), assumptions)?;

    let mut status = if !ctx.part(SolverStateP).ok {
        Some(false)
    } else {
        None
    };

    // Startup simplification, on the first call or on every call when configured.
    if status.is_none()
        && ctx.part(VariablesP).count() > 0
        && ctx.part(ConfigP).do_simplify
        && ctx.part(ConfigP).simplify_at_startup
        && (ctx.part(SolverStateP).solve_count == 0
            || ctx.part(ConfigP).simplify_at_every_startup)
    {
        let startup = ctx.part(ConfigP).schedule_startup.clone();
        status = strategy::simplify_problem(ctx.borrow(), true, &startup);
    }

    if status.is_none() {
        status = iterate_until_solved(ctx.borrow());
    }

    handle_found_solution(ctx.borrow(), status, only_sampling_solution);

    ctx.part_mut(SolverStateP).solve_count += 1;

    proof::write_final_trace(ctx.borrow());
    ctx.part_mut(ProofP).flush();

    // A pending interruption was honored by now; the next call starts fresh.
    ctx.part(SolverStateP).clear_interrupt();

    Ok(status)
}

/// Run one simplification pass on demand, outside any solve call.
pub fn simplify_outside<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseActivityP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut DatasyncP,
        mut GaussP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ModelP,
        mut OccP,
        mut ProofP<'a>,
        mut SearcherP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VarReplacerP,
        mut VsidsP,
        mut WatchlistsP,
        mut XorsP,
        mut ConfigP,
    ),
    strategy_override: Option<&str>,
) -> Result<Option<bool>, SolverError> {
    reset_for_solving(ctx.borrow());
    full_restart(ctx.borrow());
    set_assumptions(ctx.borrow(), &[])?;

    if !ctx.part(SolverStateP).ok {
        return Ok(Some(false));
    }

    if ctx.part(VariablesP).count() == 0 {
        return Ok(None);
    }

    let strategy_string = match strategy_override {
        Some(strategy) => strategy.to_string(),
        None => ctx.part(ConfigP).schedule_nonstartup.clone(),
    };

    let status = strategy::simplify_problem(ctx.borrow(), false, &strategy_string);

    ctx.part(SolverStateP).clear_interrupt();

    Ok(status)
}

/// Reset the per-solve counters and parameter multipliers.
fn reset_for_solving<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut IncrementalP,
        mut SearcherP,
        mut SolverStateP,
    ),
) {
    {
        let state = ctx.part_mut(SolverStateP);
        state.solve_started = std::time::Instant::now();
        state.simplify_count_this_solve = 0;
        state.sat_state = match state.sat_state {
            SatState::Unsat => SatState::Unsat,
            _ => SatState::Unknown,
        };
    }

    ctx.part_mut(SearcherP).stats.core_learned_this_solve = 0;
    ctx.part_mut(IncrementalP).full_restart();
}

/// Extend the model after sat, or translate the conflict after unsat under assumptions.
fn handle_found_solution<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut IncrementalP,
        mut ModelP,
        mut SearcherP,
        mut TrailP,
        mut VsidsP,
        AnalyzeConflictP,
        ClauseAllocP,
        ClauseDbP,
        OccP,
        SolverStateP,
        VariablesP,
        VarReplacerP,
        WatchlistsP,
        XorsP,
        BnnsP,
    ),
    status: Option<bool>,
    only_sampling_solution: bool,
) {
    match status {
        Some(true) => {
            model::reconstruct(ctx.borrow(), only_sampling_solution);
            if cfg!(debug_assertions) && !only_sampling_solution {
                verify::check_model(ctx.borrow());
            }
            full_restart(ctx.borrow());
        }
        Some(false) | None => {
            full_restart(ctx.borrow());
        }
    }
}
