//! Failed literal probing.
//!
//! Probing enqueues a single literal at a fresh decision level and propagates. A conflict makes
//! the negated literal a unit; literals implied by both polarities of a variable are units as
//! well.
use partial_ref::{partial, PartialRef};

use parisat_formula::{Lit, Var};

use crate::admit;
use crate::context::{parts::*, Context};
use crate::prop::{backtrack, enqueue_assignment, propagate, Reason};
use crate::variables::data::Removed;
use crate::watch::Watcher;

/// Probe both polarities of every active variable.
///
/// Returns the solver's `ok` flag.
pub fn full_probe<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
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
) -> bool {
    let candidates: Vec<Var> = {
        let variables = ctx.part(VariablesP);
        let assignment = ctx.part(AssignmentP);
        (0..variables.count())
            .map(Var::from_index)
            .filter(|&inter| {
                let outer = variables.outer_from_inter(inter);
                variables.var_data(outer).removed == Removed::None
                    && assignment.var_value(inter).is_none()
            })
            .collect()
    };

    probe_vars(ctx.borrow(), &candidates)
}

/// Probe only the roots of the binary implication graph.
///
/// A literal is a root when no binary clause implies it. Probing a root covers the whole
/// implication subtree below it, which makes this a cheaper variant of [`full_probe`].
pub fn intree_probe<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
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
) -> bool {
    let candidates: Vec<Var> = {
        let variables = ctx.part(VariablesP);
        let assignment = ctx.part(AssignmentP);
        let watchlists = ctx.part(WatchlistsP);

        let mut has_incoming = vec![false; watchlists.len()];
        for code in 0..watchlists.len() {
            for watch in watchlists.watched_by(Lit::from_code(code)).iter() {
                if let Watcher::Binary { implied, .. } = watch {
                    has_incoming[implied.code()] = true;
                }
            }
        }

        (0..variables.count())
            .map(Var::from_index)
            .filter(|&inter| {
                let outer = variables.outer_from_inter(inter);
                variables.var_data(outer).removed == Removed::None
                    && assignment.var_value(inter).is_none()
                    && (!has_incoming[inter.positive().code()]
                        || !has_incoming[inter.negative().code()])
            })
            .collect()
    };

    probe_vars(ctx.borrow(), &candidates)
}

/// Derive backbone units by probing the saved phase of every active variable.
///
/// A variable whose preferred polarity fails immediately is part of the backbone with the
/// opposite polarity.
pub fn backbone_simpl<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
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
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let candidates: Vec<Lit> = {
        let variables = ctx.part(VariablesP);
        let assignment = ctx.part(AssignmentP);
        let searcher = ctx.part(SearcherP);
        (0..variables.count())
            .map(Var::from_index)
            .filter(|&inter| {
                let outer = variables.outer_from_inter(inter);
                variables.var_data(outer).removed == Removed::None
                    && assignment.var_value(inter).is_none()
            })
            .map(|inter| inter.lit(!searcher.saved_phase(inter)))
            .collect()
    };

    let mut budget = ctx.part(ConfigP).probe_propagation_budget;

    for lit in candidates {
        if !ctx.part(SolverStateP).ok || ctx.part(SolverStateP).must_interrupt() {
            break;
        }
        if budget == 0 {
            break;
        }
        if ctx.part(AssignmentP).lit_value(lit).is_some() {
            continue;
        }

        match probe_lit(ctx.borrow(), lit, &mut budget) {
            ProbeOutcome::Failed => {
                if !enqueue_probe_unit(ctx.borrow(), !lit) {
                    return false;
                }
            }
            ProbeOutcome::Fine(_) => {}
        }
    }

    ctx.part(SolverStateP).ok
}

enum ProbeOutcome {
    /// Propagation of the literal ran into a conflict.
    Failed,
    /// Propagation succeeded, the payload holds the implied trail suffix.
    Fine(Vec<Lit>),
}

fn probe_lit<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut SearcherP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    lit: Lit,
    budget: &mut u64,
) -> ProbeOutcome {
    debug_assert!(ctx.part(AssignmentP).lit_value(lit).is_none());

    ctx.part_mut(TrailP).new_decision_level();
    let trail_start = ctx.part(TrailP).trail().len();
    enqueue_assignment(ctx.borrow(), lit, Reason::Unit);

    let result = propagate(ctx.borrow());

    let implied: Vec<Lit> = ctx.part(TrailP).trail()[trail_start..].to_vec();
    *budget = budget.saturating_sub(implied.len() as u64 + 1);

    backtrack(ctx.borrow(), 0);

    match result {
        Err(_) => ProbeOutcome::Failed,
        Ok(()) => ProbeOutcome::Fine(implied),
    }
}

/// Enqueue a probe-derived unit and propagate it.
fn enqueue_probe_unit<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut WatchlistsP,
    ),
    unit: Lit,
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    if ctx.part(AssignmentP).lit_is_false(unit) {
        admit::add_clause_int(ctx.borrow(), &[], false, admit::ClauseSource::Derived);
        return false;
    }
    if ctx.part(AssignmentP).lit_is_unk(unit) {
        enqueue_assignment(ctx.borrow(), unit, Reason::Unit);
    }
    admit::propagate_at_admission(ctx.borrow());
    ctx.part(SolverStateP).ok
}

fn probe_vars<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
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
    candidates: &[Var],
) -> bool {
    let mut budget = ctx.part(ConfigP).probe_propagation_budget;
    let mut units = 0usize;

    for &inter in candidates {
        if !ctx.part(SolverStateP).ok || ctx.part(SolverStateP).must_interrupt() {
            break;
        }
        if budget == 0 {
            log::debug!("probe: propagation budget exhausted");
            break;
        }
        if ctx.part(AssignmentP).var_value(inter).is_some() {
            continue;
        }

        let positive = match probe_lit(ctx.borrow(), inter.positive(), &mut budget) {
            ProbeOutcome::Failed => {
                units += 1;
                if !enqueue_probe_unit(ctx.borrow(), inter.negative()) {
                    return false;
                }
                continue;
            }
            ProbeOutcome::Fine(implied) => implied,
        };

        if ctx.part(AssignmentP).var_value(inter).is_some() {
            continue;
        }

        let negative = match probe_lit(ctx.borrow(), inter.negative(), &mut budget) {
            ProbeOutcome::Failed => {
                units += 1;
                if !enqueue_probe_unit(ctx.borrow(), inter.positive()) {
                    return false;
                }
                continue;
            }
            ProbeOutcome::Fine(implied) => implied,
        };

        // Literals implied by both polarities hold unconditionally.
        for &lit in positive.iter() {
            if lit.var() == inter {
                continue;
            }
            if negative.contains(&lit) && ctx.part(AssignmentP).lit_is_unk(lit) {
                units += 1;
                if !enqueue_probe_unit(ctx.borrow(), lit) {
                    return false;
                }
            }
        }
    }

    if units > 0 {
        log::info!("probe: {} units derived", units);
    }

    ctx.part(SolverStateP).ok
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parisat_formula::{lits, vars};

    use crate::admit::add_clause_outside;

    #[test]
    fn failed_literal_becomes_unit() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        // x1 implies both x2 and ¬x2, so ¬x1 is a backbone unit.
        add_clause_outside(ctx.borrow(), &lits![-1, 2], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-1, -2], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![3, 4, 5], false).unwrap();

        let ok = full_probe(ctx.borrow());
        assert!(ok);

        let variables = ctx.part(VariablesP);
        let outer = variables.outer_from_outside(vars![1][0]).unwrap();
        let inter = variables.inter_from_outer(outer);
        assert_eq!(ctx.part(AssignmentP).var_value(inter), Some(false));
    }

    #[test]
    fn shared_implications_become_units() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        // Both x1 and ¬x1 imply x2.
        add_clause_outside(ctx.borrow(), &lits![-1, 2], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![1, 2], false).unwrap();

        let ok = full_probe(ctx.borrow());
        assert!(ok);

        let variables = ctx.part(VariablesP);
        let outer = variables.outer_from_outside(vars![2][0]).unwrap();
        let inter = variables.inter_from_outer(outer);
        assert_eq!(ctx.part(AssignmentP).var_value(inter), Some(true));
    }
}
