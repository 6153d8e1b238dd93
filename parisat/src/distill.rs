//! Clause distillation and implicit clause strengthening.
//!
//! Distillation enqueues the negated literals of a clause one by one and propagates. A conflict
//! or an implied literal along the way proves that the clause can be shortened or removed. The
//! clause under distillation is detached first so propagation cannot use it to justify itself.
use partial_ref::{partial, PartialRef};

use hashbrown::HashSet;

use parisat_formula::Lit;

use crate::admit::{self, ClauseSource};
use crate::clause::{db, ClauseRef};
use crate::context::{parts::*, Context};
use crate::proof;
use crate::prop::{backtrack, enqueue_assignment, propagate, Reason};
use crate::watch::Watcher;

/// Try to shorten or remove long irredundant clauses.
///
/// With `only_remove` set, clauses are only tested for removal, never shortened. Clauses already
/// distilled are skipped unless their flag was reset (the `must-*` strategy tokens do that).
pub fn distill_long_clauses<'a>(
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
    only_remove: bool,
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
    debug_assert!(ctx.part(TrailP).fully_propagated());

    let crefs: Vec<ClauseRef> = {
        let alloc = ctx.part(ClauseAllocP);
        let clause_db = ctx.part(ClauseDbP);
        db::clauses_iter(clause_db, alloc)
            .filter(|&cref| {
                let header = alloc.header(cref);
                if header.redundant() {
                    return false;
                }
                if only_remove {
                    !header.tried_to_remove()
                } else {
                    !header.distilled()
                }
            })
            .collect()
    };

    let mut shortened = 0usize;
    let mut removed = 0usize;

    for cref in crefs {
        if !ctx.part(SolverStateP).ok {
            return;
        }
        if ctx.part(SolverStateP).must_interrupt() {
            return;
        }
        if ctx.part(ClauseAllocP).header(cref).deleted() {
            continue;
        }

        {
            let header = ctx.part_mut(ClauseAllocP).header_mut(cref);
            header.set_distilled(true);
            header.set_tried_to_remove(true);
        }

        let old_lits: Vec<Lit> = ctx.part(ClauseAllocP).clause(cref).lits().to_vec();
        let old_id = ctx.part(ClauseAllocP).header(cref).id();

        // Detach so propagation cannot use the clause against itself.
        db::delete_clause(ctx.borrow(), cref);

        ctx.part_mut(TrailP).new_decision_level();

        let mut kept: Vec<Lit> = vec![];
        let mut proved = false;

        for &lit in old_lits.iter() {
            match ctx.part(AssignmentP).lit_value(lit) {
                Some(true) => {
                    // The kept prefix already implies the clause.
                    kept.push(lit);
                    proved = true;
                    break;
                }
                Some(false) => {
                    // A false literal is redundant in the clause.
                    continue;
                }
                None => {
                    kept.push(lit);
                    enqueue_assignment(ctx.borrow(), !lit, Reason::Unit);
                    if propagate(ctx.borrow()).is_err() {
                        // The negated prefix is contradictory: the prefix is an implied clause.
                        proved = true;
                        break;
                    }
                }
            }
        }

        backtrack(ctx.borrow(), 0);

        if only_remove {
            if proved {
                // A prefix of the clause is implied by the rest of the formula, so the clause
                // itself is redundant.
                proof::emit_del(ctx.borrow(), old_id, &old_lits);
                removed += 1;
                continue;
            }
            // Reattach unchanged.
            readd_unchanged(ctx.borrow(), old_id, &old_lits);
            continue;
        }

        if (proved || kept.len() < old_lits.len()) && kept.len() < old_lits.len() {
            shortened += 1;
            admit::add_clause_int(
                ctx.borrow(),
                &kept,
                false,
                ClauseSource::Rewrite {
                    old_id,
                    old_lits: &old_lits,
                },
            );
            admit::propagate_at_admission(ctx.borrow());
        } else {
            readd_unchanged(ctx.borrow(), old_id, &old_lits);
        }
    }

    log::debug!(
        "distill-cls: {} shortened, {} removed",
        shortened,
        removed
    );
}

/// Reattach a clause that distillation detached but did not change.
fn readd_unchanged<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
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
    old_id: parisat_internal_proof::ClauseId,
    old_lits: &[Lit],
) {
    let cref = admit::add_clause_int(
        ctx.borrow(),
        old_lits,
        false,
        ClauseSource::Rewrite {
            old_id,
            old_lits,
        },
    );
    if let Some(cref) = cref {
        let header = ctx.part_mut(ClauseAllocP).header_mut(cref);
        header.set_distilled(true);
        header.set_tried_to_remove(true);
    }
}

/// Reset the distillation flags, forcing the next pass to look at every clause again.
pub fn reset_distill_flags<'a>(
    mut ctx: partial!(Context<'a>, mut ClauseAllocP, ClauseDbP),
    only_remove: bool,
) {
    let (alloc, ctx) = ctx.split_part_mut(ClauseAllocP);
    let clause_db = ctx.part(ClauseDbP);
    for cref in clause_db.clauses.iter().cloned() {
        let header = alloc.header_mut(cref);
        if header.deleted() {
            continue;
        }
        header.set_tried_to_remove(false);
        if !only_remove {
            header.set_distilled(false);
        }
    }
}

/// Remove redundant binary clauses implied by the rest of the formula.
pub fn distill_binaries<'a>(
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
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let binaries = ctx.part(WatchlistsP).collect_binaries();

    let mut removed = 0usize;

    for (lits, red, id) in binaries {
        if !red {
            continue;
        }
        if !ctx.part(SolverStateP).ok || ctx.part(SolverStateP).must_interrupt() {
            return;
        }
        if ctx.part(AssignmentP).lit_value(lits[0]).is_some()
            || ctx.part(AssignmentP).lit_value(lits[1]).is_some()
        {
            continue;
        }

        // Remove the clause, then check whether it is still implied.
        if !ctx.part_mut(WatchlistsP).remove_binary(lits, id) {
            continue;
        }

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), !lits[0], Reason::Unit);
        let implied = match propagate(ctx.borrow()) {
            Err(_) => true,
            Ok(()) => ctx.part(AssignmentP).lit_is_true(lits[1]),
        };
        backtrack(ctx.borrow(), 0);

        if implied {
            proof::emit_del(ctx.borrow(), id, &lits);
            removed += 1;
        } else {
            ctx.part_mut(WatchlistsP).add_binary(lits, red, id);
        }
    }

    log::debug!("distill-bins: {} removed", removed);
}

/// Subsume and optionally strengthen long clauses with binary clauses.
///
/// A binary `(x ∨ y)` subsumes any long clause containing both literals, and resolves away `¬y`
/// from any long clause containing `x` and `¬y`.
pub fn sub_str_with_bin<'a>(
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
    also_strengthen: bool,
) {
    let crefs = db::collect_clauses(ctx.borrow());

    let mut subsumed = 0usize;
    let mut strengthened = 0usize;

    for cref in crefs {
        if !ctx.part(SolverStateP).ok {
            return;
        }
        if ctx.part(ClauseAllocP).header(cref).deleted() {
            continue;
        }

        let old_lits: Vec<Lit> = ctx.part(ClauseAllocP).clause(cref).lits().to_vec();
        let old_id = ctx.part(ClauseAllocP).header(cref).id();
        let red = ctx.part(ClauseAllocP).header(cref).redundant();

        let mut drop_lits: Vec<Lit> = vec![];
        let mut is_subsumed = false;

        {
            let watchlists = ctx.part(WatchlistsP);
            let in_clause: HashSet<Lit> = old_lits.iter().cloned().collect();

            'outer: for &lit in old_lits.iter() {
                // Binaries (lit ∨ other) have their entry on the watchlist of ¬lit.
                for watch in watchlists.watched_by(!lit).iter() {
                    if let Watcher::Binary { implied, red: bin_red, .. } = watch {
                        if *bin_red {
                            continue;
                        }
                        if in_clause.contains(implied) {
                            is_subsumed = true;
                            break 'outer;
                        }
                        if also_strengthen
                            && in_clause.contains(&!*implied)
                            && !drop_lits.contains(&!*implied)
                        {
                            drop_lits.push(!*implied);
                        }
                    }
                }
            }
        }

        if is_subsumed {
            proof::emit_del(ctx.borrow(), old_id, &old_lits);
            db::delete_clause(ctx.borrow(), cref);
            subsumed += 1;
            continue;
        }

        if !drop_lits.is_empty() {
            let new_lits: Vec<Lit> = old_lits
                .iter()
                .cloned()
                .filter(|lit| !drop_lits.contains(lit))
                .collect();
            strengthened += 1;
            db::delete_clause(ctx.borrow(), cref);
            admit::add_clause_int(
                ctx.borrow(),
                &new_lits,
                red,
                ClauseSource::Rewrite {
                    old_id,
                    old_lits: &old_lits,
                },
            );
        }
    }

    admit::propagate_at_admission(ctx.borrow());

    log::debug!(
        "sub-cls-with-bin: {} subsumed, {} strengthened",
        subsumed,
        strengthened
    );
}

/// Subsume binary clauses with other binary clauses.
///
/// Duplicate binaries keep a single copy; when both an irredundant and a redundant copy exist,
/// the irredundant one survives.
pub fn subsume_implicit<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ProofP<'a>,
        mut WatchlistsP,
        VariablesP,
    ),
) {
    let binaries = ctx.part(WatchlistsP).collect_binaries();

    let mut seen: hashbrown::HashMap<[Lit; 2], (bool, parisat_internal_proof::ClauseId)> =
        hashbrown::HashMap::new();
    let mut removed = 0usize;

    for (mut lits, red, id) in binaries {
        lits.sort_unstable();

        match seen.get(&lits).cloned() {
            None => {
                seen.insert(lits, (red, id));
            }
            Some((kept_red, kept_id)) => {
                // Keep the irredundant copy; when both have the same redundancy keep the first.
                if kept_red && !red {
                    proof::emit_del(ctx.borrow(), kept_id, &lits);
                    ctx.part_mut(WatchlistsP).remove_binary(lits, kept_id);
                    seen.insert(lits, (red, id));
                } else {
                    proof::emit_del(ctx.borrow(), id, &lits);
                    ctx.part_mut(WatchlistsP).remove_binary(lits, id);
                }
                removed += 1;
            }
        }
    }

    log::debug!("sub-impl: {} duplicate binaries removed", removed);
}

/// Strengthen the implicit binary clauses using transitive implications.
///
/// A redundant binary `(a ∨ b)` is removed when some binary `(a ∨ c)` and `(¬c ∨ b)` already
/// imply it.
pub fn str_impl_with_impl<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ProofP<'a>,
        mut WatchlistsP,
        VariablesP,
    ),
) {
    let binaries = ctx.part(WatchlistsP).collect_binaries();

    let mut removed = 0usize;

    for (lits, red, id) in binaries {
        if !red {
            continue;
        }

        // (a ∨ b) is implied when ¬a reaches b through another implication chain of length two.
        let implied = {
            let watchlists = ctx.part(WatchlistsP);
            let start = !lits[0];
            watchlists.watched_by(start).iter().any(|watch| {
                let step = match watch {
                    Watcher::Binary { implied, id: other, .. } if *other != id => *implied,
                    _ => return false,
                };
                if step == lits[1] {
                    return false;
                }
                watchlists.watched_by(step).iter().any(|next| match next {
                    Watcher::Binary { implied, id: other, .. } => {
                        *other != id && *implied == lits[1]
                    }
                    _ => false,
                })
            })
        };

        if implied {
            proof::emit_del(ctx.borrow(), id, &lits);
            ctx.part_mut(WatchlistsP).remove_binary(lits, id);
            removed += 1;
        }
    }

    log::debug!("str-impl: {} transitive binaries removed", removed);
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parisat_formula::lits;

    use crate::admit::add_clause_outside;
    use crate::clause::Tier;

    #[test]
    fn distillation_shortens_clause() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        // ¬x1 implies x2 via the binary, so enqueueing the negated prefix of (1 2 4) already
        // satisfies x2 and the clause shortens to (1 2).
        add_clause_outside(ctx.borrow(), &lits![1, 2], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![1, 2, 4], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![3, 5, 6], false).unwrap();

        distill_long_clauses(ctx.borrow(), false);

        // (1 2 4) became the binary (1 2); only (3 5 6) stays long.
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 1);
    }

    #[test]
    fn binary_subsumes_long_clause() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        add_clause_outside(ctx.borrow(), &lits![1, 2], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![1, 2, 3], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![1, -2, 4], false).unwrap();

        sub_str_with_bin(ctx.borrow(), true);

        // (1 2 3) is subsumed; (1 -2 4) strengthened to (1 4).
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 0);
        assert_eq!(ctx.part(WatchlistsP).binary_count(), 2);
    }
}
