//! Unit propagation.
use std::mem::replace;

use partial_ref::{partial, PartialRef};

use vec_mut_scan::VecMutScan;

use parisat_formula::Lit;

use crate::bnn;
use crate::context::{parts::*, Context};
use crate::watch::Watcher;

pub mod assignment;
pub mod graph;

pub use assignment::{backtrack, enqueue_assignment, full_restart, restart, Assignment, Trail};
pub use graph::{Conflict, ImplGraph, ImplNode, Reason};

/// Propagate enqueued assignments.
///
/// Returns when all enqueued assignments are propagated, including newly propagated assignments,
/// or if there is a conflict.
///
/// On conflict the constraint that would assign the opposite value to an already assigned
/// literal is returned.
pub fn propagate<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut TrailP,
        mut WatchlistsP,
        VariablesP,
    ),
) -> Result<(), Conflict> {
    while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
        propagate_lit(ctx.borrow(), lit)?;
    }
    Ok(())
}

/// Process all watch entries of a newly assigned literal.
///
/// `lit` is the literal that became true.
#[inline(never)]
fn propagate_lit<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut TrailP,
        mut WatchlistsP,
        VariablesP,
    ),
    lit: Lit,
) -> Result<(), Conflict> {
    // Temporarily move the entries out of the watch index, so we are free to add watches to
    // other lists during propagation.
    let mut watches = replace(ctx.part_mut(WatchlistsP).watched_by_mut(lit), vec![]);

    let mut scan = VecMutScan::new(&mut watches);

    let mut result = Ok(());

    'watchers: while let Some(watch) = scan.next() {
        match *watch {
            Watcher::Binary { implied, .. } => {
                let assignment = ctx.part(AssignmentP);
                if assignment.lit_is_false(implied) {
                    result = Err(Conflict::Binary([implied, !lit]));
                    break;
                } else if !assignment.lit_is_true(implied) {
                    enqueue_assignment(ctx.borrow(), implied, Reason::Binary([!lit]));
                }
            }
            Watcher::Long { cref, blocking } => {
                // If the blocking literal (which is part of the watched clause) is already true,
                // the watched clause is satisfied and we don't even have to look at it.
                if ctx.part(AssignmentP).lit_is_true(blocking) {
                    continue;
                }

                let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
                let clause = alloc.clause_mut(cref);
                let lits = clause.lits_mut();

                // First we ensure that the literal we're currently propagating is at index 1.
                // This prepares the literal order for further propagations, as the propagating
                // literal has to be at index 0. Doing this here also avoids a similar check later
                // should the clause be satisfied by a non-watched literal, as we can just move it
                // to index 1.
                let mut first = lits[0];
                if first == !lit {
                    lits.swap(0, 1);
                    first = lits[0];
                }

                // We create a new watch with the other watched literal as blocking literal. This
                // will either replace the currently processed watch or be added to another
                // literal's watch list.
                let new_watch = Watcher::Long {
                    cref,
                    blocking: first,
                };

                // If the other watched literal (now the first) isn't the blocking literal, check
                // whether that one is true. If so nothing else needs to be done.
                if first != blocking && ctx.part(AssignmentP).lit_is_true(first) {
                    watch.replace(new_watch);
                    continue;
                }

                // At this point we try to find a non-false unwatched literal to replace our
                // current literal as the watched literal.
                let (initial, rest) = lits.split_at_mut(2);

                for rest_lit_ref in rest.iter_mut() {
                    let rest_lit = *rest_lit_ref;
                    if !ctx.part(AssignmentP).lit_is_false(rest_lit) {
                        // We found a non-false literal and make it a watched literal by
                        // reordering the literals and adding the watch to the corresponding
                        // watchlist.
                        initial[1] = rest_lit;
                        *rest_lit_ref = !lit;
                        ctx.part_mut(WatchlistsP).add_watch(!rest_lit, new_watch);
                        watch.remove();
                        continue 'watchers;
                    }
                }

                // We didn't find a non-false unwatched literal, so either we're propagating or we
                // have a conflict.
                watch.replace(new_watch);

                // The clause took part in propagation, protect it from the next reduction.
                alloc.header_mut(cref).set_active(true);

                // If the other watched literal is false we have a conflict.
                if ctx.part(AssignmentP).lit_is_false(first) {
                    result = Err(Conflict::Long(cref));
                    break;
                }

                // Otherwise we enqueue a new propagation.
                enqueue_assignment(ctx.borrow(), first, Reason::Long(cref));
            }
            Watcher::Bnn { idx } => {
                if let Err(conflict) = bnn::propagate_bnn(ctx.borrow(), idx) {
                    result = Err(conflict);
                    break;
                }
            }
            // XOR entries are inert during search, they only mark constraints for the matrix
            // initialization (see crate::gauss).
            Watcher::Xor { .. } => {}
        }
    }

    // This keeps all unprocessed entries in the current list. Entries that were added to this
    // list while it was moved out (reason clauses created by BNN propagation) are kept as well.
    drop(scan);

    let added = replace(ctx.part_mut(WatchlistsP).watched_by_mut(lit), watches);
    ctx.part_mut(WatchlistsP).watched_by_mut(lit).extend(added);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::{prelude::*, *};

    use rand::distributions::Bernoulli;
    use rand::seq::SliceRandom;

    use partial_ref::IntoPartialRefMut;

    use parisat_formula::{cnf::strategy::*, CnfFormula};

    use crate::admit::{add_clause_int, ClauseSource};
    use crate::state::SatState;
    use crate::variables::ensure_outside_vars;

    /// Generate a random formula and a list of implied literals.
    pub fn prop_formula(
        vars: impl Strategy<Value = usize>,
        extra_vars: impl Strategy<Value = usize>,
        extra_clauses: impl Strategy<Value = usize>,
        density: impl Strategy<Value = f64>,
    ) -> impl Strategy<Value = (Vec<Lit>, CnfFormula)> {
        (vars, extra_vars, extra_clauses, density).prop_flat_map(
            |(vars, extra_vars, extra_clauses, density)| {
                let negate = collection::vec(bool::ANY, vars + extra_vars);

                let dist = Bernoulli::new(density);

                let lits = negate
                    .prop_map(|negate| {
                        negate
                            .into_iter()
                            .enumerate()
                            .map(|(index, negate)| Lit::from_index(index, negate))
                            .collect::<Vec<_>>()
                    })
                    .prop_shuffle();

                lits.prop_perturb(move |mut lits, mut rng| {
                    let assigned_lits = &lits[..vars];

                    let mut clauses: Vec<Vec<Lit>> = vec![];
                    for (i, &lit) in assigned_lits.iter().enumerate() {
                        // Build a clause that implies lit
                        let mut clause = vec![lit];
                        for &reason_lit in assigned_lits[..i].iter() {
                            if rng.sample(dist) {
                                clause.push(!reason_lit);
                            }
                        }
                        clause.shuffle(&mut rng);
                        clauses.push(clause);
                    }

                    for _ in 0..extra_clauses {
                        // Build a clause that is satisfied
                        let &true_lit = assigned_lits.choose(&mut rng).unwrap();
                        let mut clause = vec![true_lit];
                        for &other_lit in lits.iter() {
                            if other_lit != true_lit && rng.sample(dist) {
                                clause.push(other_lit ^ rng.gen::<bool>());
                            }
                        }
                        clause.shuffle(&mut rng);
                        clauses.push(clause);
                    }

                    clauses.shuffle(&mut rng);

                    // Only return implied lits
                    lits.drain(vars..);

                    (lits, CnfFormula::from(clauses))
                })
            },
        )
    }

    proptest! {
        #[test]
        fn propagation_finds_all_implied(
            (mut lits, formula) in prop_formula(
                2..30usize,
                0..10usize,
                0..20usize,
                0.1..0.9
            ),
        ) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            ensure_outside_vars(ctx.borrow(), formula.var_count());

            for clause in formula.iter() {
                add_clause_int(ctx.borrow(), clause, false, ClauseSource::Derived);
            }

            prop_assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);

            let prop_result = propagate(ctx.borrow());

            prop_assert_eq!(prop_result, Ok(()));

            lits.sort();

            let mut prop_lits = ctx.part(TrailP).trail().to_owned();

            prop_lits.sort();

            prop_assert_eq!(prop_lits, lits);
        }

        #[test]
        fn propagation_finds_conflict(
            (lits, formula) in prop_formula(
                2..30usize,
                0..10usize,
                0..20usize,
                0.1..0.9
            ),
            conflict_size in any::<sample::Index>(),
        ) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            ensure_outside_vars(ctx.borrow(), formula.var_count());

            // We add the conflict clause first to make sure that it isn't simplified during
            // admission

            let conflict_size = conflict_size.index(lits.len() - 1) + 2;

            let conflict_clause: Vec<_> = lits[..conflict_size].iter().map(|&lit| !lit).collect();

            add_clause_int(ctx.borrow(), &conflict_clause, false, ClauseSource::Derived);

            for clause in formula.iter() {
                add_clause_int(ctx.borrow(), clause, false, ClauseSource::Derived);
            }

            prop_assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);

            let prop_result = propagate(ctx.borrow());

            prop_assert!(prop_result.is_err());

            let conflict = prop_result.unwrap_err();

            let conflict_lits = conflict.lits(ctx.part(ClauseAllocP)).to_owned();

            for &lit in conflict_lits.iter() {
                prop_assert!(ctx.part(AssignmentP).lit_is_false(lit));
            }
        }
    }
}
