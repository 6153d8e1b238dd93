//! Clause database reduction.
use std::mem::replace;

use partial_ref::{partial, PartialRef};

use crate::context::{parts::*, Context};
use crate::proof;
use crate::prop::Reason;

use super::db::{set_clause_tier, Tier};

/// Run the periodic reductions when their conflict intervals elapsed.
pub fn reduce_if_due<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ProofP<'a>,
        mut SearcherP,
        mut WatchlistsP,
        ConfigP,
        ImplGraphP,
        TrailP,
        VariablesP,
    ),
) {
    let conflicts = ctx.part(SearcherP).stats.sum_conflicts;

    let locals_due = {
        let interval = ctx.part(ConfigP).reduce_locals_interval;
        let searcher = ctx.part_mut(SearcherP);
        if conflicts >= searcher.next_reduce_locals {
            searcher.next_reduce_locals = conflicts + interval;
            conflicts > 0
        } else {
            false
        }
    };
    if locals_due {
        reduce_locals(ctx.borrow());
    }

    let mids_due = {
        let interval = ctx.part(ConfigP).reduce_mids_interval;
        let searcher = ctx.part_mut(SearcherP);
        if conflicts >= searcher.next_reduce_mids {
            searcher.next_reduce_mids = conflicts + interval;
            conflicts > 0
        } else {
            false
        }
    };
    if mids_due {
        reduce_mids(ctx.borrow());
    }
}

/// Remove deleted and duplicate entries from a by_tier clause list.
///
/// This has the side effect of setting the mark bit on all clauses of the tier.
fn dedup_and_mark_by_tier<'a>(
    mut ctx: partial!(Context<'a>, mut ClauseAllocP, mut ClauseDbP),
    tier: Tier,
) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let by_tier = &mut ctx.part_mut(ClauseDbP).by_tier[tier as usize];

    by_tier.retain(|&cref| {
        let header = alloc.header_mut(cref);
        let retain = !header.deleted() && !header.mark() && header.tier() == tier;
        if retain {
            header.set_mark(true);
        }
        retain
    })
}

/// Mark clauses that are currently a propagation reason.
///
/// Such clauses must not be deleted. Uses the `active` bit as a protection mark.
fn protect_asserting_clauses<'a>(
    mut ctx: partial!(Context<'a>, mut ClauseAllocP, ImplGraphP, TrailP),
) -> Vec<super::ClauseRef> {
    let (alloc, ctx) = ctx.split_part_mut(ClauseAllocP);
    let impl_graph = ctx.part(ImplGraphP);

    let mut protected = vec![];
    for &lit in ctx.part(TrailP).trail().iter() {
        if let &Reason::Long(cref) = impl_graph.reason(lit.var()) {
            alloc.header_mut(cref).set_active(true);
            protected.push(cref);
        }
    }
    protected
}

/// Reduce the number of local tier clauses by deleting half of them.
///
/// The clauses with the lowest activity go first; propagation reasons are kept.
pub fn reduce_locals<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ProofP<'a>,
        mut WatchlistsP,
        ImplGraphP,
        TrailP,
        VariablesP,
    ),
) {
    dedup_and_mark_by_tier(ctx.borrow(), Tier::Local);

    let protected = protect_asserting_clauses(ctx.borrow());

    let mut locals = replace(
        &mut ctx.part_mut(ClauseDbP).by_tier[Tier::Local as usize],
        vec![],
    );

    locals.sort_unstable_by(|&a, &b| {
        let alloc = &*ctx.part(ClauseAllocP);
        alloc
            .header(a)
            .activity()
            .partial_cmp(&alloc.header(b).activity())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut to_delete = locals.len() / 2;
    let mut kept = vec![];

    for &cref in locals.iter() {
        ctx.part_mut(ClauseAllocP).header_mut(cref).set_mark(false);

        let is_reason = ctx.part(ClauseAllocP).header(cref).active();

        if to_delete > 0 && !is_reason {
            super::db::delete_clause_with_proof(ctx.borrow(), cref);
            to_delete -= 1;
        } else {
            kept.push(cref);
        }
    }

    for cref in protected {
        ctx.part_mut(ClauseAllocP).header_mut(cref).set_active(false);
    }

    ctx.part_mut(ClauseDbP).count_by_tier[Tier::Local as usize] = kept.len();
    ctx.part_mut(ClauseDbP).by_tier[Tier::Local as usize] = kept;
}

/// Reduce the number of mid tier clauses by moving inactive ones to the local tier.
pub fn reduce_mids<'a>(mut ctx: partial!(Context<'a>, mut ClauseAllocP, mut ClauseDbP)) {
    dedup_and_mark_by_tier(ctx.borrow(), Tier::Mid);

    let mut mids = replace(
        &mut ctx.part_mut(ClauseDbP).by_tier[Tier::Mid as usize],
        vec![],
    );

    mids.retain(|&cref| {
        let header = ctx.part_mut(ClauseAllocP).header_mut(cref);
        header.set_mark(false);

        if header.active() {
            header.set_active(false);
            true
        } else {
            set_clause_tier(ctx.borrow(), cref, Tier::Local);
            false
        }
    });

    ctx.part_mut(ClauseDbP).count_by_tier[Tier::Mid as usize] = mids.len();
    ctx.part_mut(ClauseDbP).by_tier[Tier::Mid as usize] = mids;
}
