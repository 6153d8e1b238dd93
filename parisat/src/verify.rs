//! Consistency checks run between phases.
use partial_ref::{partial, PartialRef};

use parisat_formula::{Lit, Var};

use crate::clause::db;
use crate::context::{parts::*, Context};
use crate::variables::data::Removed;
use crate::watch::Watcher;

/// Run all structural invariants and panic on the first violation.
///
/// Called between strategy tokens in debug builds, and available on demand otherwise.
pub fn check_invariants<'a>(
    mut ctx: partial!(
        Context<'a>,
        AssignmentP,
        ClauseAllocP,
        ClauseDbP,
        BnnsP,
        TrailP,
        VariablesP,
        WatchlistsP,
        XorsP,
    ),
) {
    check_binary_symmetry(ctx.borrow());
    check_binary_counts(ctx.borrow());
    check_attached_clauses(ctx.borrow());
    check_no_removed_vars_attached(ctx.borrow());
}

/// Binary attachment symmetry: both sides of a binary clause carry the other endpoint exactly
/// once, with identical redundancy flag and ID.
pub fn check_binary_symmetry<'a>(
    mut ctx: partial!(Context<'a>, WatchlistsP),
) {
    let watchlists = ctx.part(WatchlistsP);

    for code in 0..watchlists.len() {
        let key = Lit::from_code(code);
        for watch in watchlists.watched_by(key).iter() {
            if let Watcher::Binary { implied, red, id } = watch {
                // The clause is (¬key ∨ implied); its mirror entry sits on the watchlist of
                // ¬implied and implies ¬key.
                let mirror_count = watchlists
                    .watched_by(!*implied)
                    .iter()
                    .filter(|mirror| match mirror {
                        Watcher::Binary {
                            implied: mirror_implied,
                            red: mirror_red,
                            id: mirror_id,
                        } => {
                            *mirror_implied == !key && mirror_red == red && mirror_id == id
                        }
                        _ => false,
                    })
                    .count();
                assert_eq!(
                    mirror_count, 1,
                    "binary clause ({:?} {:?}) has {} mirror entries",
                    !key, implied, mirror_count
                );
            }
        }
    }
}

/// The binary counters match the watchlist contents.
pub fn check_binary_counts<'a>(mut ctx: partial!(Context<'a>, WatchlistsP)) {
    let watchlists = ctx.part(WatchlistsP);

    let mut red_entries = 0usize;
    let mut irred_entries = 0usize;

    for code in 0..watchlists.len() {
        for watch in watchlists.watched_by(Lit::from_code(code)).iter() {
            if let Watcher::Binary { red, .. } = watch {
                if *red {
                    red_entries += 1;
                } else {
                    irred_entries += 1;
                }
            }
        }
    }

    assert_eq!(red_entries, watchlists.red_binary_count() * 2);
    assert_eq!(irred_entries, watchlists.irred_binary_count() * 2);
}

/// Every attached long clause is watched on its first two literals, and at level 0 it is
/// satisfied or has at least two unassigned literals.
pub fn check_attached_clauses<'a>(
    mut ctx: partial!(
        Context<'a>,
        AssignmentP,
        ClauseAllocP,
        ClauseDbP,
        TrailP,
        WatchlistsP,
    ),
) {
    let alloc = ctx.part(ClauseAllocP);
    let clause_db = ctx.part(ClauseDbP);
    let watchlists = ctx.part(WatchlistsP);
    let assignment = ctx.part(AssignmentP);
    let trail = ctx.part(TrailP);

    let check_level_0 = trail.current_level() == 0 && trail.fully_propagated();

    for cref in db::clauses_iter(clause_db, alloc) {
        let lits = alloc.clause(cref).lits();

        for &watched in lits[..2].iter() {
            let found = watchlists
                .watched_by(!watched)
                .iter()
                .any(|watch| match watch {
                    Watcher::Long { cref: other, .. } => *other == cref,
                    _ => false,
                });
            assert!(
                found,
                "clause {:?} is not watched on {:?}",
                lits, watched
            );
        }

        if check_level_0 {
            let satisfied = lits.iter().any(|&lit| assignment.lit_is_true(lit));
            let unassigned = lits.iter().filter(|&&lit| assignment.lit_is_unk(lit)).count();
            assert!(
                satisfied || unassigned >= 2,
                "clause {:?} is neither satisfied nor open at level 0",
                lits
            );
        }
    }
}

/// No attached constraint references a removed variable.
pub fn check_no_removed_vars_attached<'a>(
    mut ctx: partial!(
        Context<'a>,
        BnnsP,
        ClauseAllocP,
        ClauseDbP,
        VariablesP,
        WatchlistsP,
        XorsP,
    ),
) {
    let variables = ctx.part(VariablesP);

    let check_lit = |lit: Lit, what: &str| {
        let outer = variables.outer_from_inter_lit(lit);
        assert_eq!(
            variables.var_data(outer.var()).removed,
            Removed::None,
            "{} references removed variable {:?}",
            what,
            outer.var()
        );
    };

    {
        let alloc = ctx.part(ClauseAllocP);
        let clause_db = ctx.part(ClauseDbP);
        for cref in db::clauses_iter(clause_db, alloc) {
            for &lit in alloc.clause(cref).lits() {
                check_lit(lit, "long clause");
            }
        }
    }

    {
        let watchlists = ctx.part(WatchlistsP);
        for code in 0..watchlists.len() {
            let key = Lit::from_code(code);
            for watch in watchlists.watched_by(key).iter() {
                if let Watcher::Binary { implied, .. } = watch {
                    check_lit(!key, "binary clause");
                    check_lit(*implied, "binary clause");
                }
            }
        }
    }

    for xor in ctx.part(XorsP).xors().iter() {
        for &var in xor.vars.iter() {
            check_lit(var.positive(), "xor constraint");
        }
    }

    for bnn in ctx.part(BnnsP).bnns().iter() {
        if bnn.removed {
            continue;
        }
        for &lit in bnn.lits.iter() {
            check_lit(lit, "bnn constraint");
        }
        if let Some(out) = bnn.out {
            check_lit(out, "bnn output");
        }
    }
}

/// After renumbering the active variables precede all inactive ones in the inter namespace.
pub fn check_active_prefix<'a>(
    mut ctx: partial!(Context<'a>, AssignmentP, VariablesP),
) -> bool {
    let variables = ctx.part(VariablesP);
    let assignment = ctx.part(AssignmentP);

    let mut seen_inactive = false;
    for index in 0..variables.count() {
        let inter = Var::from_index(index);
        let outer = variables.outer_from_inter(inter);
        let active = assignment.var_value(inter).is_none()
            && variables.var_data(outer).removed == Removed::None;
        if active && seen_inactive {
            return false;
        }
        if !active {
            seen_inactive = true;
        }
    }
    true
}

/// After sat: every constraint is satisfied by the extended model and every assumption holds.
pub fn check_model<'a>(
    mut ctx: partial!(
        Context<'a>,
        AssignmentP,
        BnnsP,
        ClauseAllocP,
        ClauseDbP,
        IncrementalP,
        ModelP,
        OccP,
        VariablesP,
        WatchlistsP,
        XorsP,
    ),
) {
    let model = ctx.part(ModelP);
    let variables = ctx.part(VariablesP);

    let lit_true = |inter: Lit| -> bool {
        let outer = variables.outer_from_inter_lit(inter);
        model.lit_is_true(outer)
    };

    {
        let alloc = ctx.part(ClauseAllocP);
        let clause_db = ctx.part(ClauseDbP);
        for cref in db::clauses_iter(clause_db, alloc) {
            if alloc.header(cref).redundant() {
                continue;
            }
            let lits = alloc.clause(cref).lits();
            assert!(
                lits.iter().any(|&lit| lit_true(lit)),
                "model leaves clause {:?} unsatisfied",
                lits
            );
        }
    }

    {
        let watchlists = ctx.part(WatchlistsP);
        for (lits, red, _) in watchlists.collect_binaries() {
            if red {
                continue;
            }
            assert!(
                lits.iter().any(|&lit| lit_true(lit)),
                "model leaves binary {:?} unsatisfied",
                lits
            );
        }
    }

    for xor in ctx.part(XorsP).xors().iter() {
        let parity = xor
            .vars
            .iter()
            .fold(false, |acc, &var| acc ^ lit_true(var.positive()));
        assert_eq!(parity, xor.rhs, "model violates xor over {:?}", xor.vars);
    }

    for bnn in ctx.part(BnnsP).bnns().iter() {
        if bnn.removed {
            continue;
        }
        let sum = bnn.lits.iter().filter(|&&lit| lit_true(lit)).count() as i64;
        match bnn.out {
            None => assert!(sum >= bnn.cutoff, "model violates threshold constraint"),
            Some(out) => assert_eq!(
                lit_true(out),
                sum >= bnn.cutoff,
                "model violates reified threshold constraint"
            ),
        }
    }

    // Clauses stored with eliminated variables are satisfied as well.
    for entry in ctx.part(OccP).elim_stack().iter() {
        for clause in entry.clauses.iter() {
            assert!(
                clause.iter().any(|&outer_lit| model.lit_is_true(outer_lit)),
                "model leaves eliminated clause {:?} unsatisfied",
                clause
            );
        }
    }

    for &assumption in ctx.part(IncrementalP).outer_assumptions().iter() {
        assert!(
            model.lit_is_true(assumption),
            "model violates assumption {:?}",
            assumption
        );
    }
}
