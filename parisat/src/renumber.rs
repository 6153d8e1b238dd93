//! Variable renumbering.
//!
//! Renumbering rewrites the outer↔inter permutation so that the active variables (unassigned and
//! not removed) occupy a dense prefix of the inter namespace. Every structure indexed by inter
//! variables or literals is rewritten through the same map in one atomic pass. This never runs
//! while the searcher holds state: the trail must be at level 0 and fully propagated.
use partial_ref::{partial, PartialRef};

use parisat_formula::lit::LitIdx;
use parisat_formula::{Lit, Var};

use crate::clause::db;
use crate::context::{parts::*, Context};
use crate::decision;
use crate::gauss;
use crate::simplify;
use crate::variables::data::Removed;
use crate::verify;

/// Fraction of dead variables in the inter prefix an automatic renumbering requires.
const RENUMBER_SAVING_THRESHOLD: f64 = 0.2;

/// Fraction of inter variables that are dead (assigned or removed).
pub fn calc_renumber_saving<'a>(
    mut ctx: partial!(Context<'a>, AssignmentP, VariablesP),
) -> f64 {
    let variables = ctx.part(VariablesP);
    let assignment = ctx.part(AssignmentP);

    if variables.count() == 0 {
        return 0.0;
    }

    let mut active = 0usize;
    for index in 0..variables.count() {
        let inter = Var::from_index(index);
        let outer = variables.outer_from_inter(inter);
        if assignment.var_value(inter).is_none()
            && variables.var_data(outer).removed == Removed::None
        {
            active += 1;
        }
    }

    1.0 - active as f64 / variables.count() as f64
}

/// Compact the inter namespace when enough variables are dead.
///
/// With `must_renumber` the savings estimate is ignored. Returns the solver's `ok` flag.
pub fn renumber_variables<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut GaussP,
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
        mut XorsP,
        ConfigP,
    ),
    must_renumber: bool,
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
    debug_assert!(ctx.part(TrailP).fully_propagated());

    if ctx.part(VariablesP).count() == 0 {
        return ctx.part(SolverStateP).ok;
    }

    if !must_renumber && calc_renumber_saving(ctx.borrow()) < RENUMBER_SAVING_THRESHOLD {
        return ctx.part(SolverStateP).ok;
    }

    // The matrices hold inter variables; rebuild them from the store afterwards.
    ctx.part_mut(GaussP).clear();
    ctx.part_mut(XorsP).updated = true;

    simplify::clean_all(ctx.borrow());
    if !ctx.part(SolverStateP).ok {
        return false;
    }

    // Dense positions for active variables first, dead variables keep their relative order
    // behind them.
    let count = ctx.part(VariablesP).count();
    let mut old_to_new: Vec<LitIdx> = vec![0; count];
    {
        let variables = ctx.part(VariablesP);
        let assignment = ctx.part(AssignmentP);

        let mut position = 0;
        for index in 0..count {
            let inter = Var::from_index(index);
            let outer = variables.outer_from_inter(inter);
            if assignment.var_value(inter).is_none()
                && variables.var_data(outer).removed == Removed::None
            {
                old_to_new[index] = position;
                position += 1;
            }
        }
        for index in 0..count {
            let inter = Var::from_index(index);
            let outer = variables.outer_from_inter(inter);
            if !(assignment.var_value(inter).is_none()
                && variables.var_data(outer).removed == Removed::None)
            {
                old_to_new[index] = position;
                position += 1;
            }
        }
        debug_assert_eq!(position as usize, count);
    }

    let map_var = |var: Var| Var::from_index(old_to_new[var.index()] as usize);
    let map_lit = |lit: Lit| lit.map_var(map_var);
    let map_index = |index: usize| old_to_new[index] as usize;

    // Long clauses. Their cached abstractions are invalid now.
    {
        let crefs = db::collect_clauses(ctx.borrow());
        for cref in crefs {
            let clause = ctx.part_mut(ClauseAllocP).clause_mut(cref);
            for lit in clause.lits_mut().iter_mut() {
                *lit = map_lit(*lit);
            }
            clause.header_mut().set_strengthened(true);
        }
    }

    // Parity and threshold constraints.
    ctx.part_mut(XorsP).map_vars(&map_var);
    ctx.part_mut(BnnsP).map_lits(&map_lit);

    // The watch index, the assignment, the trail and the implication graph.
    ctx.part_mut(WatchlistsP).map_lits(&map_lit);
    ctx.part_mut(AssignmentP).map_vars(&map_index);
    ctx.part_mut(TrailP).map_lits(&map_lit);
    {
        let impl_graph = ctx.part_mut(ImplGraphP);
        impl_graph.map_vars(&map_index);
        // Level 0 assignments never need their antecedents again.
        for node in impl_graph.nodes.iter_mut() {
            node.reason = crate::prop::Reason::Unit;
        }
    }

    // Per-variable search state and the pending assumptions.
    ctx.part_mut(SearcherP).map_vars(&map_index);
    ctx.part_mut(VsidsP).map_vars(&map_index);
    ctx.part_mut(IncrementalP).map_inter_lits(&map_lit);

    // Finally the identity map itself.
    ctx.part_mut(VariablesP).perm_mut().compose(&old_to_new);

    // The decision heap was invalidated, rebuild it from the surviving activities.
    decision::rebuild_heap(ctx.borrow());

    debug_assert!(verify::check_active_prefix(ctx.borrow()));

    // Matrices are rebuilt lazily from the updated store.
    let ok = gauss::find_and_init_all_matrices(ctx.borrow());

    log::info!(
        "renumber: {} variables, {:.0}% were dead",
        count,
        calc_renumber_saving(ctx.borrow()) * 100.0
    );

    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parisat_formula::lits;

    use crate::admit::add_clause_outside;

    #[test]
    fn active_variables_form_a_prefix() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        add_clause_outside(ctx.borrow(), &lits![1], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![2, 3, 4], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![3], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-5, 6, 7], false).unwrap();

        let ok = renumber_variables(ctx.borrow(), true);
        assert!(ok);

        assert!(verify::check_active_prefix(ctx.borrow()));

        // Outer to inter stays a bijection.
        let variables = ctx.part(VariablesP);
        for index in 0..variables.count() {
            let outer = Var::from_index(index);
            assert_eq!(
                variables.outer_from_inter(variables.inter_from_outer(outer)),
                outer
            );
        }
    }

    #[test]
    fn clauses_survive_renumbering() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        add_clause_outside(ctx.borrow(), &lits![1], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-1, 2, 3, 4], false).unwrap();

        // The long clause lost its false literal during cleanup; renumber and check that the
        // clause still talks about the same outer variables.
        let ok = renumber_variables(ctx.borrow(), true);
        assert!(ok);

        let crefs = db::collect_clauses(ctx.borrow());
        assert_eq!(crefs.len(), 1);

        let outer_lits: Vec<Lit> = {
            let variables = ctx.part(VariablesP);
            ctx.part(ClauseAllocP)
                .clause(crefs[0])
                .lits()
                .iter()
                .map(|&lit| variables.outer_from_inter_lit(lit))
                .collect()
        };

        let mut expected = lits![2, 3, 4].to_vec();
        let mut actual = outer_lits;
        expected.sort_unstable();
        actual.sort_unstable();
        assert_eq!(actual, expected);
    }
}
