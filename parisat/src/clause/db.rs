//! Database for long clauses.
use std::mem::transmute;

use partial_ref::{partial, PartialRef};

use parisat_formula::Lit;

use crate::context::{parts::*, Context};
use crate::proof;

use super::{header::HEADER_LEN, ClauseAlloc, ClauseHeader, ClauseRef};

/// Partitions of the clause database.
///
/// Irredundant clauses form their own partition. The redundant (learned) clauses are kept in
/// three tiers by expected long-term value, following the approach described by Chanseok Oh in
/// ["Between SAT and UNSAT: The Fundamental Difference in CDCL
/// SAT"](https://doi.org/10.1007/978-3-319-24318-4_23), section 4.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Tier {
    Irred = 0,
    Core = 1,
    Mid = 2,
    Local = 3,
}

impl Tier {
    /// Total number of tiers.
    pub const fn count() -> usize {
        4
    }

    /// Cast an index into the corresponding tier.
    pub unsafe fn from_index(index: usize) -> Tier {
        debug_assert!(index < Tier::count());
        transmute(index as u8)
    }
}

/// Database for long clauses.
///
/// Removal of clauses from the `clauses` and the `by_tier` fields can be delayed. The clause
/// header's deleted and tier fields need to be checked when iterating over these. `by_tier` may
/// also contain duplicate entries.
#[derive(Default)]
pub struct ClauseDb {
    /// May contain deleted clauses, see above.
    pub(crate) clauses: Vec<ClauseRef>,
    /// May contain deleted and moved clauses, see above.
    pub(crate) by_tier: [Vec<ClauseRef>; Tier::count()],
    /// These counts should always be up to date.
    pub(crate) count_by_tier: [usize; Tier::count()],
    /// Size of deleted but not collected clauses.
    pub(crate) garbage_size: usize,
}

impl ClauseDb {
    /// The number of long clauses of a given tier.
    pub fn count_by_tier(&self, tier: Tier) -> usize {
        self.count_by_tier[tier as usize]
    }

    /// The total number of long clauses.
    pub fn count(&self) -> usize {
        self.count_by_tier.iter().sum()
    }
}

/// Iterator over all live long clauses.
pub fn clauses_iter<'c>(
    db: &'c ClauseDb,
    alloc: &'c ClauseAlloc,
) -> impl Iterator<Item = ClauseRef> + 'c {
    db.clauses
        .iter()
        .cloned()
        .filter(move |&cref| !alloc.header(cref).deleted())
}

/// Collect all live long clauses into a vector.
pub fn collect_clauses<'a>(
    mut ctx: partial!(Context<'a>, ClauseAllocP, ClauseDbP),
) -> Vec<ClauseRef> {
    let alloc = ctx.part(ClauseAllocP);
    let db = ctx.part(ClauseDbP);
    clauses_iter(db, alloc).collect()
}

/// Add a long clause to the database and attach it to its first two literals.
pub fn add_clause<'a>(
    mut ctx: partial!(Context<'a>, mut ClauseAllocP, mut ClauseDbP, mut WatchlistsP),
    header: ClauseHeader,
    lits: &[Lit],
) -> ClauseRef {
    let tier = header.tier();

    let cref = ctx.part_mut(ClauseAllocP).add_clause(header, lits);

    ctx.part_mut(WatchlistsP)
        .watch_clause(cref, [lits[0], lits[1]]);

    let db = ctx.part_mut(ClauseDbP);

    db.clauses.push(cref);
    db.by_tier[tier as usize].push(cref);
    db.count_by_tier[tier as usize] += 1;

    cref
}

/// Change the tier of a long clause.
///
/// This is a noop for a clause already of the specified tier.
pub fn set_clause_tier<'a>(
    mut ctx: partial!(Context<'a>, mut ClauseAllocP, mut ClauseDbP),
    cref: ClauseRef,
    tier: Tier,
) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let db = ctx.part_mut(ClauseDbP);

    let old_tier = alloc.header(cref).tier();
    if old_tier != tier {
        db.count_by_tier[old_tier as usize] -= 1;
        db.count_by_tier[tier as usize] += 1;

        alloc.header_mut(cref).set_tier(tier);
        db.by_tier[tier as usize].push(cref);
    }
}

/// Delete a long clause, detaching its watches.
///
/// The clause's bytes are reclaimed by the next consolidation. This does not emit a proof event,
/// see [`delete_clause_with_proof`].
pub fn delete_clause<'a>(
    mut ctx: partial!(Context<'a>, mut ClauseAllocP, mut ClauseDbP, mut WatchlistsP),
    cref: ClauseRef,
) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);

    let (lit_0, lit_1) = {
        let lits = alloc.clause(cref).lits();
        (lits[0], lits[1])
    };

    let watchlists = ctx.part_mut(WatchlistsP);
    watchlists.unwatch_clause(cref, [lit_0, lit_1]);

    let db = ctx.part_mut(ClauseDbP);
    let header = alloc.header_mut(cref);

    debug_assert!(!header.deleted(), "delete_clause for already deleted clause");

    header.set_deleted(true);

    db.count_by_tier[header.tier() as usize] -= 1;
    db.garbage_size += header.len() + HEADER_LEN;
}

/// Delete a long clause and emit the matching proof deletion.
pub fn delete_clause_with_proof<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ProofP<'a>,
        mut WatchlistsP,
        VariablesP,
    ),
    cref: ClauseRef,
) {
    let (id, lits) = {
        let alloc = ctx.part(ClauseAllocP);
        let clause = alloc.clause(cref);
        (clause.header().id(), clause.lits().to_vec())
    };
    proof::emit_del(ctx.borrow(), id, &lits);
    delete_clause(ctx.borrow(), cref);
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::variables::ensure_outside_vars;

    #[test]
    fn tiers_and_deletes_are_tracked() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let clauses = parisat_formula::cnf_formula![
            1, 2, 3;
            4, -5, 6;
            -2, 3, -4;
            -3, 5, 2, 7, 5;
        ];

        ensure_outside_vars(ctx.borrow(), clauses.var_count());

        let tiers = vec![Tier::Irred, Tier::Core, Tier::Mid, Tier::Local];
        let new_tiers = vec![Tier::Irred, Tier::Local, Tier::Local, Tier::Core];

        let mut crefs = vec![];

        for (clause, &tier) in clauses.iter().zip(tiers.iter()) {
            let mut header = ClauseHeader::new();
            header.set_tier(tier);
            let cref = add_clause(ctx.borrow(), header, clause);
            crefs.push(cref);
        }

        for (&cref, &tier) in crefs.iter().rev().zip(new_tiers.iter().rev()) {
            set_clause_tier(ctx.borrow(), cref, tier);
        }

        // We only check presence, as deletion from these lists is delayed
        assert!(ctx.part(ClauseDbP).by_tier[Tier::Irred as usize].contains(&crefs[0]));
        assert!(ctx.part(ClauseDbP).by_tier[Tier::Core as usize].contains(&crefs[3]));
        assert!(ctx.part(ClauseDbP).by_tier[Tier::Local as usize].contains(&crefs[1]));
        assert!(ctx.part(ClauseDbP).by_tier[Tier::Local as usize].contains(&crefs[2]));

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Core), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Mid), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Local), 2);

        delete_clause(ctx.borrow(), crefs[0]);
        delete_clause(ctx.borrow(), crefs[2]);

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Core), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Mid), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Local), 1);
        assert!(ctx.part(ClauseDbP).garbage_size > 0);
    }
}
