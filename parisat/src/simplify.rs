//! Level 0 cleanup of satisfied clauses and false literals.
use partial_ref::{partial, PartialRef};

use parisat_formula::Lit;

use crate::admit::{self, ClauseSource};
use crate::clause::db;
use crate::context::{parts::*, Context};
use crate::proof;
use crate::watch::Watcher;

/// Remove satisfied clauses and false literals from the entire clause database.
///
/// Requires decision level 0 with a fully propagated trail.
pub fn clean_all<'a>(
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
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
    debug_assert!(ctx.part(TrailP).fully_propagated());

    simplify_binaries(ctx.borrow());
    clean_long_clauses(ctx.borrow());
}

/// Remove binary clauses that have an assigned literal.
///
/// At level 0 with a propagated trail any such clause is satisfied: a falsified side would have
/// propagated the other literal to true.
pub fn simplify_binaries<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ProofP<'a>,
        mut WatchlistsP,
        AssignmentP,
        VariablesP,
    ),
) {
    let mut deletions: Vec<([Lit; 2], parisat_internal_proof::ClauseId)> = vec![];

    {
        let watchlists = ctx.part(WatchlistsP);
        let assignment = ctx.part(AssignmentP);

        for code in 0..watchlists.len() {
            let key = Lit::from_code(code);
            for watch in watchlists.watched_by(key).iter() {
                if let Watcher::Binary { implied, id, .. } = watch {
                    let lits = [!key, *implied];
                    let assigned = !assignment.lit_is_unk(lits[0]) || !assignment.lit_is_unk(lits[1]);
                    // Each binary clause has two watch entries, visit it once.
                    if assigned && lits[0] < lits[1] {
                        deletions.push((lits, *id));
                    }
                }
            }
        }
    }

    for (lits, id) in deletions {
        proof::emit_del(ctx.borrow(), id, &lits);
        ctx.part_mut(WatchlistsP).remove_binary(lits, id);
    }
}

/// Remove satisfied long clauses and drop false literals from the others.
pub fn clean_long_clauses<'a>(
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
) {
    let crefs = db::collect_clauses(ctx.borrow());

    for cref in crefs {
        enum Action {
            Keep,
            Delete,
            Shrink(Vec<Lit>),
        }

        let (action, red, old_id, old_lits) = {
            let assignment = ctx.part(AssignmentP);
            let clause = ctx.part(ClauseAllocP).clause(cref);
            let old_lits: Vec<Lit> = clause.lits().to_vec();

            let mut action = Action::Keep;
            if old_lits.iter().any(|&lit| assignment.lit_is_true(lit)) {
                action = Action::Delete;
            } else if old_lits.iter().any(|&lit| assignment.lit_is_false(lit)) {
                let new_lits: Vec<Lit> = old_lits
                    .iter()
                    .cloned()
                    .filter(|&lit| assignment.lit_is_unk(lit))
                    .collect();
                action = Action::Shrink(new_lits);
            }

            (
                action,
                clause.header().redundant(),
                clause.header().id(),
                old_lits,
            )
        };

        match action {
            Action::Keep => {}
            Action::Delete => {
                proof::emit_del(ctx.borrow(), old_id, &old_lits);
                db::delete_clause(ctx.borrow(), cref);
            }
            Action::Shrink(new_lits) => {
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
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parisat_formula::lits;

    use crate::admit::add_clause_outside;
    use crate::clause::Tier;

    #[test]
    fn satisfied_and_shortened_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        add_clause_outside(ctx.borrow(), &lits![1, 2, 3], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-1, 4, 5, 6], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![2, 5], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![1], false).unwrap();

        clean_all(ctx.borrow());

        // (1 2 3) is satisfied and gone; (-1 4 5 6) lost its false literal.
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 1);
        let crefs = db::collect_clauses(ctx.borrow());
        assert_eq!(crefs.len(), 1);
        let lits = ctx.part(ClauseAllocP).clause(crefs[0]).lits().to_vec();
        assert_eq!(lits.len(), 3);

        // The untouched binary is still there.
        assert_eq!(ctx.part(WatchlistsP).binary_count(), 1);
    }
}
