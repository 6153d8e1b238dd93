//! The inprocessing strategy interpreter.
//!
//! A strategy is a comma separated token string. Tokens map to simplification passes; the
//! interpreter checks budgets, the interruption flag and the solver state between tokens.
//! Consecutive occ-* tokens are buffered and flushed to the occurrence simplifier as a single
//! batch, because occurrence lists are built once per batch.
//!
//! An unknown token is a configuration error and aborts with a diagnostic, as it indicates a
//! caller bug rather than a solver failure.
use partial_ref::{partial, PartialRef};

use crate::clause::consolidate;
use crate::context::{parts::*, Context};
use crate::datasync;
use crate::distill;
use crate::occ;
use crate::probe;
use crate::renumber;
use crate::scc;
use crate::simplify;
use crate::verify;

/// Execute one inprocessing schedule.
///
/// Returns `Some(false)` when the problem became unsatisfiable and `None` otherwise.
pub fn execute_strategy<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut DatasyncP,
        mut GaussP,
        mut ImplGraphP,
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
        mut IncrementalP,
        ConfigP,
    ),
    startup: bool,
    strategy: &str,
) -> Option<bool> {
    let mut occ_batch = String::new();

    // The trailing empty token makes sure a final occ batch is flushed.
    for token in strategy.split(',').chain(Some("")) {
        if out_of_budget(ctx.borrow()) || !ctx.part(SolverStateP).ok {
            break;
        }
        if ctx.part(VariablesP).count() == 0 {
            break;
        }

        debug_assert!(ctx.part(TrailP).fully_propagated());
        debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
        if cfg!(debug_assertions) {
            verify::check_invariants(ctx.borrow());
        }

        let token = token.trim().to_ascii_lowercase();

        // Flush a pending occ batch before any non-occ token.
        if !occ_batch.is_empty() && !token.starts_with("occ") {
            if ctx.part(ConfigP).do_occ_simp && ctx.part(BnnsP).is_empty() {
                log::info!("executing occ strategy token(s): {:?}", occ_batch);
                occ::simplify(ctx.borrow(), startup, &occ_batch);
            }
            occ_batch.clear();

            if out_of_budget(ctx.borrow()) || !ctx.part(SolverStateP).ok {
                break;
            }
        }

        if !token.is_empty() && !token.starts_with("occ") {
            log::info!("executing strategy token: {}", token);
        }

        match token.as_str() {
            "" => {}
            "scc-vrepl" => {
                if ctx.part(ConfigP).do_equiv_replace {
                    let threshold = ctx.part(VariablesP).count() / 1000;
                    scc::find_equivs_and_replace(ctx.borrow(), threshold);
                }
            }
            "must-scc-vrepl" => {
                if ctx.part(ConfigP).do_equiv_replace {
                    scc::find_equivs_and_replace(ctx.borrow(), 0);
                }
            }
            "full-probe" => {
                if ctx.part(ConfigP).do_full_probe {
                    probe::full_probe(ctx.borrow());
                }
            }
            "intree-probe" => {
                // Tree based probing assumes the binary implication graph covers all forcing,
                // which threshold constraints break.
                if ctx.part(ConfigP).do_intree_probe && ctx.part(BnnsP).is_empty() {
                    probe::intree_probe(ctx.borrow());
                }
            }
            "backbone" => {
                probe::backbone_simpl(ctx.borrow());
            }
            "distill-cls" => {
                if ctx.part(ConfigP).do_distill {
                    distill::distill_long_clauses(ctx.borrow(), false);
                }
            }
            "distill-cls-onlyrem" => {
                if ctx.part(ConfigP).do_distill {
                    distill::distill_long_clauses(ctx.borrow(), true);
                }
            }
            "must-distill-cls" => {
                if ctx.part(ConfigP).do_distill {
                    distill::reset_distill_flags(ctx.borrow(), false);
                    distill::distill_long_clauses(ctx.borrow(), false);
                }
            }
            "must-distill-cls-onlyrem" => {
                if ctx.part(ConfigP).do_distill {
                    distill::reset_distill_flags(ctx.borrow(), true);
                    distill::distill_long_clauses(ctx.borrow(), true);
                }
            }
            "distill-bins" => {
                if ctx.part(ConfigP).do_distill_bins {
                    distill::distill_binaries(ctx.borrow());
                }
            }
            "sub-impl" => {
                if ctx.part(ConfigP).do_str_sub_implicit {
                    distill::subsume_implicit(ctx.borrow());
                }
            }
            "str-impl" => {
                if ctx.part(ConfigP).do_str_sub_implicit {
                    distill::str_impl_with_impl(ctx.borrow());
                }
            }
            "sub-cls-with-bin" => {
                if ctx.part(ConfigP).do_distill {
                    distill::sub_str_with_bin(ctx.borrow(), false);
                }
            }
            "sub-str-cls-with-bin" => {
                if ctx.part(ConfigP).do_distill {
                    distill::sub_str_with_bin(ctx.borrow(), true);
                }
            }
            "clean-cls" => {
                simplify::clean_all(ctx.borrow());
            }
            "renumber" | "must-renumber" => {
                if ctx.part(ConfigP).do_renumber {
                    let must = token == "must-renumber" || ctx.part(ConfigP).must_renumber;
                    renumber::renumber_variables(ctx.borrow(), must);
                }
            }
            "cl-consolidate" => {
                consolidate::consolidate(ctx.borrow());
            }
            "oracle-vivif" | "oracle-sparsify" | "oracle-vivif-sparsify" => {
                // External-oracle driven simplification; without a connected oracle this is a
                // recognized no-op.
                log::info!("no oracle connected, skipping {}", token);
            }
            "breakid" => {
                if ctx.part(ConfigP).do_breakid {
                    log::info!("breakid requested but not compiled in, skipping");
                }
            }
            "bosphorus" => {
                if ctx.part(ConfigP).do_bosphorus {
                    log::info!("bosphorus requested but not compiled in, skipping");
                }
            }
            "card-find" => {
                if ctx.part(ConfigP).do_card_find {
                    panic!("cardinality recovery is not supported");
                }
            }
            "sls" => panic!("strategy 'sls' is not supported"),
            "lucky" => panic!("strategy 'lucky' is not supported"),
            _ if token.starts_with("occ") => {
                occ_batch.push_str(&token);
                occ_batch.push(',');
            }
            _ => panic!("strategy '{}' not recognised", token),
        }

        if !ctx.part(SolverStateP).ok {
            return Some(false);
        }

        // Exchange derived units with other instances between tokens.
        if ctx.part(DatasyncP).is_connected() && !datasync::sync(ctx.borrow()) {
            return Some(false);
        }
    }

    if !ctx.part(SolverStateP).ok {
        return Some(false);
    }

    None
}

/// Run one full simplification pass.
///
/// Returns `Some(false)` when the problem became unsatisfiable and `None` otherwise.
pub fn simplify_problem<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut DatasyncP,
        mut GaussP,
        mut ImplGraphP,
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
        mut IncrementalP,
        ConfigP,
    ),
    startup: bool,
    strategy: &str,
) -> Option<bool> {
    debug_assert!(ctx.part(SolverStateP).ok);

    if ctx.part(SolverStateP).simplify_count_this_solve
        >= ctx.part(ConfigP).max_simplify_per_solve
    {
        return None;
    }

    // Matrices hold indices into the XOR store and would go stale during inprocessing.
    ctx.part_mut(GaussP).clear();
    ctx.part_mut(XorsP).updated = true;

    let result = execute_strategy(ctx.borrow(), startup, strategy);

    {
        let state = ctx.part_mut(SolverStateP);
        state.simplify_count += 1;
        state.simplify_count_this_solve += 1;
    }

    if result.is_some() {
        return result;
    }

    // The decision heap may have lost variables to inprocessing, rebuild it before the searcher
    // runs again.
    crate::decision::rebuild_heap(ctx.borrow());

    if cfg!(debug_assertions) {
        verify::check_invariants(ctx.borrow());
    }

    None
}

/// Whether the global conflict or wall clock budget is exhausted or an interrupt is pending.
fn out_of_budget<'a>(
    mut ctx: partial!(Context<'a>, ConfigP, SearcherP, SolverStateP),
) -> bool {
    let state = ctx.part(SolverStateP);
    if state.must_interrupt() {
        return true;
    }

    let config = ctx.part(ConfigP);
    if ctx.part(SearcherP).stats.sum_conflicts >= config.max_conflicts {
        return true;
    }

    state.solve_started.elapsed().as_secs_f64() > config.max_time
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parisat_formula::lits;

    use crate::admit::add_clause_outside;

    #[test]
    #[should_panic(expected = "not recognised")]
    fn unknown_token_aborts() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        add_clause_outside(ctx.borrow(), &lits![1, 2], false).unwrap();

        execute_strategy(ctx.borrow(), false, "scc-vrepl, no-such-pass");
    }

    #[test]
    fn default_schedules_run_through() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        add_clause_outside(ctx.borrow(), &lits![1, 2, 3], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-1, 2], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-2, 3, 4], false).unwrap();

        let startup = ctx.part(ConfigP).schedule_startup.clone();
        let nonstartup = ctx.part(ConfigP).schedule_nonstartup.clone();

        assert_eq!(execute_strategy(ctx.borrow(), true, &startup), None);
        assert_eq!(execute_strategy(ctx.borrow(), false, &nonstartup), None);
    }
}
