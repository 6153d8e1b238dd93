//! Arena consolidation.
//!
//! The clause arena cannot reclaim space from deleted clauses in place. Consolidation copies the
//! live clauses into a fresh arena and rewrites every handle that points into the old one: the
//! clause database lists, the watch index and the implication graph reasons.
use hashbrown::HashMap;

use partial_ref::{partial, PartialRef};

use parisat_formula::Lit;

use crate::context::{parts::*, Context};
use crate::prop::Reason;
use crate::watch::Watcher;

use super::db::Tier;
use super::{ClauseAlloc, ClauseRef};

/// Consolidate the arena when enough garbage accumulated.
pub fn collect_garbage<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut WatchlistsP,
        TrailP,
    ),
) {
    let alloc = ctx.part(ClauseAllocP);
    let db = ctx.part(ClauseDbP);

    // Collecting when a fixed fraction of the allocation is garbage amortizes collection costs.
    if db.garbage_size * 2 > alloc.buffer_size() {
        consolidate(ctx.borrow());
    }
}

/// Unconditionally copy all live clauses into a fresh arena.
pub fn consolidate<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut WatchlistsP,
        TrailP,
    ),
) {
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);

    assert!(
        db.garbage_size <= ctx.part(ClauseAllocP).buffer_size(),
        "inconsistent garbage tracking in ClauseDb"
    );

    let current_size = ctx.part(ClauseAllocP).buffer_size() - db.garbage_size;

    // Allocating just the current size would lead to an immediate growing when new clauses are
    // learned, overallocating here avoids that.
    let mut new_alloc = ClauseAlloc::with_capacity(current_size * 2);
    let mut forward: HashMap<ClauseRef, ClauseRef> = HashMap::new();

    let mut new_clauses = vec![];
    let mut new_by_tier: [Vec<ClauseRef>; Tier::count()] = Default::default();

    {
        let alloc = ctx.part(ClauseAllocP);
        for &cref in db.clauses.iter() {
            let clause = alloc.clause(cref);
            let header = *clause.header();
            if header.deleted() {
                continue;
            }
            let new_cref = new_alloc.add_clause(header, clause.lits());
            forward.insert(cref, new_cref);
            new_clauses.push(new_cref);
            new_by_tier[header.tier() as usize].push(new_cref);
        }
    }

    *ctx.part_mut(ClauseAllocP) = new_alloc;
    db.clauses = new_clauses;
    db.by_tier = new_by_tier;
    db.garbage_size = 0;

    // Rewrite the watch index handles.
    {
        let watchlists = ctx.part_mut(WatchlistsP);
        for code in 0..watchlists.len() {
            let list = watchlists.watched_by_mut(Lit::from_code(code));
            for watch in list.iter_mut() {
                if let Watcher::Long { cref, .. } = watch {
                    *cref = forward[cref];
                }
            }
        }
    }

    // Rewrite the propagation reasons.
    {
        let (impl_graph, ctx) = ctx.split_part_mut(ImplGraphP);
        for &lit in ctx.part(TrailP).trail().iter() {
            if let &Reason::Long(cref) = impl_graph.reason(lit.var()) {
                impl_graph.update_reason(lit.var(), Reason::Long(forward[&cref]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use proptest::prelude::*;

    use parisat_formula::cnf::strategy::cnf_formula;
    use parisat_formula::Lit;

    use crate::clause::{db, ClauseHeader};
    use crate::prop::enqueue_assignment;
    use crate::variables::ensure_outside_vars;

    proptest! {
        #[test]
        fn consolidation_preserves_live_clauses(
            input_a in cnf_formula(2..100usize, 200..400, 3..30),
            input_b in cnf_formula(2..100usize, 10..100, 4..20),
        ) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            ensure_outside_vars(
                ctx.borrow(),
                input_a.var_count().max(input_b.var_count()),
            );

            let mut crefs_a = vec![];
            let mut crefs_b = vec![];

            for lits in input_a.iter() {
                let mut header = ClauseHeader::new();
                header.set_tier(Tier::Irred);
                crefs_a.push(db::add_clause(ctx.borrow(), header, lits));
            }

            for lits in input_b.iter() {
                let mut header = ClauseHeader::new();
                header.set_tier(Tier::Irred);
                let cref = db::add_clause(ctx.borrow(), header, lits);
                crefs_b.push(cref);

                if ctx.part(AssignmentP).lit_value(lits[0]) == None {
                    // This isn't consistent, as the clause isn't actually propagating, but that
                    // isn't checked during consolidation
                    enqueue_assignment(ctx.borrow(), lits[0], Reason::Long(cref));
                }
            }

            for cref in crefs_a {
                db::delete_clause(ctx.borrow(), cref);
                prop_assert!(ctx.part(ClauseDbP).garbage_size > 0);
            }

            let old_buffer_size = ctx.part(ClauseAllocP).buffer_size();

            collect_garbage(ctx.borrow());

            prop_assert!(
                ctx.part(ClauseDbP).garbage_size * 2 < ctx.part(ClauseAllocP).buffer_size()
            );

            prop_assert!(old_buffer_size > ctx.part(ClauseAllocP).buffer_size());

            let mut output_clauses: Vec<Vec<Lit>> = vec![];

            for &cref in ctx.part(ClauseDbP).clauses.iter() {
                let clause = ctx.part(ClauseAllocP).clause(cref);
                if clause.header().deleted() {
                    continue;
                }
                output_clauses.push(clause.lits().to_vec());
            }

            let mut input_clauses: Vec<Vec<Lit>> =
                input_b.iter().map(|c| c.to_vec()).collect();

            output_clauses.sort();
            input_clauses.sort();

            prop_assert_eq!(input_clauses, output_clauses);

            for &lit in ctx.part(TrailP).trail() {
                if let &Reason::Long(cref) = ctx.part(ImplGraphP).reason(lit.var()) {
                    prop_assert_eq!(ctx.part(ClauseAllocP).clause(cref).lits()[0], lit)
                }
            }
        }
    }
}
