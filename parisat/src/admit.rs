//! Clause admission.
//!
//! Outside clauses are reconciled with the current solver state before they reach the clause
//! database: replacements are followed in the outer namespace, unknown variables are created,
//! literals are renumbered into the inter namespace, eliminated variables are restored and the
//! literal set is normalized. The surviving literals are dispatched by size to the trail, the
//! watch index or the clause arena.
//!
//! Every stage is idempotent given its input, and every normalization that changes the literal
//! set leaves a paired add/delete in the proof trace.
use partial_ref::{partial, PartialRef};

use parisat_formula::{Lit, Var};
use parisat_internal_proof::ClauseId;

use crate::bnn::{self, Bnn};
use crate::clause::{db, ClauseHeader, ClauseRef, Tier};
use crate::context::{parts::*, Context};
use crate::occ;
use crate::proof;
use crate::prop::{enqueue_assignment, propagate, Reason};
use crate::solver::SolverError;
use crate::state::SatState;
use crate::variables;
use crate::xor;

/// Hard limit on the number of literals in a single constraint.
pub const MAX_CONSTRAINT_LEN: usize = 1 << 28;

/// Where a clause handed to [`add_clause_int`] comes from.
#[derive(Copy, Clone)]
pub enum ClauseSource<'l> {
    /// Admitted from outside; provenance was already recorded under this ID.
    Outside { orig_id: ClauseId },
    /// Derived internally; gets a fresh ID with an `add` record.
    Derived,
    /// Replaces an existing clause; a proof pair is emitted when the literal set changed.
    Rewrite {
        old_id: ClauseId,
        old_lits: &'l [Lit],
    },
}

/// Add a clause over outside literals.
///
/// Returns the solver's `ok` flag: `false` once a contradiction was derived.
pub fn add_clause_outside<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
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
        ConfigP,
    ),
    outside_lits: &[Lit],
    red: bool,
) -> Result<bool, SolverError> {
    if !ctx.part(SolverStateP).ok {
        return Ok(false);
    }

    let mut lits = outside_lits.to_vec();
    if !add_clause_helper(ctx.borrow(), &mut lits)? {
        return Ok(false);
    }

    let orig_id = proof::next_id(ctx.borrow());
    proof::emit_orig(ctx.borrow(), orig_id, &lits);

    add_clause_int(ctx.borrow(), &lits, red, ClauseSource::Outside { orig_id });

    propagate_at_admission(ctx.borrow());

    Ok(ctx.part(SolverStateP).ok)
}

/// Translate outside literals into normalized inter literals.
///
/// Follows replacements, creates unknown variables and restores eliminated variables. Returns
/// `false` when restoring an eliminated variable derived a contradiction.
pub fn add_clause_helper<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
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
        ConfigP,
    ),
    lits: &mut Vec<Lit>,
) -> Result<bool, SolverError> {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    if ctx.part(SolverStateP).clauses_blocked {
        panic!("cannot add clauses once blocked clause elimination removed clauses");
    }

    if lits.len() >= MAX_CONSTRAINT_LEN {
        return Err(SolverError::TooLongClause {
            len: lits.len(),
        });
    }

    if let Some(max_index) = lits.iter().map(|lit| lit.index()).max() {
        variables::ensure_outside_vars(ctx.borrow(), max_index + 1);
    }

    for lit in lits.iter_mut() {
        let outer = {
            let variables = ctx.part(VariablesP);
            let outer = variables
                .outer_from_outside_lit(*lit)
                .expect("outside variable was just created");
            ctx.part(VarReplacerP).replaced_with(outer)
        };
        *lit = ctx.part(VariablesP).inter_from_outer_lit(outer);
    }

    // Restore eliminated variables so their clauses become visible again.
    loop {
        let elimed = {
            let variables = ctx.part(VariablesP);
            lits.iter().cloned().find(|lit| {
                let outer = variables.outer_from_inter_lit(*lit);
                variables.var_data(outer.var()).removed
                    == crate::variables::data::Removed::Eliminated
            })
        };
        match elimed {
            None => break,
            Some(lit) => {
                let outer = ctx.part(VariablesP).outer_from_inter_lit(lit);
                if !occ::uneliminate(ctx.borrow(), outer.var()) {
                    return Ok(false);
                }
            }
        }
    }

    if cfg!(debug_assertions) {
        let variables = ctx.part(VariablesP);
        for &lit in lits.iter() {
            let outer = variables.outer_from_inter_lit(lit);
            debug_assert_eq!(
                variables.var_data(outer.var()).removed,
                crate::variables::data::Removed::None
            );
        }
    }

    Ok(true)
}

/// Sort the literal set and remove false and duplicate literals.
///
/// Returns `false` when the clause is satisfied at level 0 or a tautology and has to be
/// discarded. Tautologies of irredundant clauses flag their variable for forced assignment
/// during model extension.
fn sort_and_clean_clause<'a>(
    mut ctx: partial!(Context<'a>, mut VariablesP, AssignmentP),
    lits: &mut Vec<Lit>,
    red: bool,
) -> bool {
    lits.sort_unstable();

    let mut last = None;
    let mut write = 0;

    for read in 0..lits.len() {
        let lit = lits[read];

        if last == Some(!lit) {
            if !red {
                let outer = ctx.part(VariablesP).outer_from_inter_lit(lit);
                ctx.part_mut(VariablesP).mark_must_set(outer.var());
            }
            return false;
        }

        match ctx.part(AssignmentP).lit_value(lit) {
            Some(true) => return false,
            Some(false) => continue,
            None => {
                if last == Some(lit) {
                    continue;
                }
                let removed = {
                    let variables = ctx.part(VariablesP);
                    let outer = variables.outer_from_inter_lit(lit);
                    variables.var_data(outer.var()).removed
                };
                assert_eq!(
                    removed,
                    crate::variables::data::Removed::None,
                    "clause contains a literal whose variable has been removed"
                );
                lits[write] = lit;
                write += 1;
                last = Some(lit);
            }
        }
    }

    lits.truncate(write);
    true
}

/// Add a clause over inter literals.
///
/// This must not be called with literals of replaced or eliminated variables, or when the solver
/// is already in an unsat state. Use it carefully, and only internally.
///
/// Removes duplicate and false literals, discards satisfied clauses and tautologies, and
/// dispatches among the empty, unit, binary and long clause representations. Enqueued units are
/// not propagated; callers decide when to propagate.
pub fn add_clause_int<'a>(
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
    lits: &[Lit],
    red: bool,
    source: ClauseSource,
) -> Option<ClauseRef> {
    debug_assert!(ctx.part(SolverStateP).ok);
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let mut ps = lits.to_vec();

    if !sort_and_clean_clause(ctx.borrow(), &mut ps, red) {
        match source {
            ClauseSource::Outside { orig_id } => proof::emit_del(ctx.borrow(), orig_id, lits),
            ClauseSource::Rewrite { old_id, old_lits } => {
                proof::emit_del(ctx.borrow(), old_id, old_lits)
            }
            ClauseSource::Derived => {}
        }
        return None;
    }

    let id = match source {
        ClauseSource::Outside { orig_id } => {
            if ps[..] != *lits {
                let id = proof::next_id(ctx.borrow());
                proof::emit_add(ctx.borrow(), id, &ps);
                proof::emit_del(ctx.borrow(), orig_id, lits);
                id
            } else {
                orig_id
            }
        }
        ClauseSource::Derived => {
            let id = proof::next_id(ctx.borrow());
            proof::emit_add(ctx.borrow(), id, &ps);
            id
        }
        ClauseSource::Rewrite { old_id, old_lits } => {
            if ps[..] != *old_lits {
                let id = proof::next_id(ctx.borrow());
                proof::emit_add(ctx.borrow(), id, &ps);
                proof::emit_del(ctx.borrow(), old_id, old_lits);
                id
            } else {
                old_id
            }
        }
    };

    match ps.len() {
        0 => {
            let state = ctx.part_mut(SolverStateP);
            state.ok = false;
            state.sat_state = SatState::Unsat;
            if state.unsat_id.is_none() {
                state.unsat_id = Some(id);
            }
            None
        }
        1 => {
            enqueue_assignment(ctx.borrow(), ps[0], Reason::Unit);
            // The enqueue recorded its own unit clause, drop ours to keep the trace paired.
            proof::emit_del(ctx.borrow(), id, &ps);
            None
        }
        2 => {
            ctx.part_mut(WatchlistsP).add_binary([ps[0], ps[1]], red, id);
            None
        }
        _ => {
            let mut header = ClauseHeader::new();
            header.set_tier(if red { Tier::Local } else { Tier::Irred });
            header.set_id(id);
            header.set_glue(ps.len() as u32);
            Some(db::add_clause(ctx.borrow(), header, &ps))
        }
    }
}

/// Propagate after an admission step, deriving unsat when a conflict surfaces.
pub fn propagate_at_admission<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut TrailP,
        mut VariablesP,
        mut WatchlistsP,
    ),
) {
    if !ctx.part(SolverStateP).ok {
        return;
    }

    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    if propagate(ctx.borrow()).is_err() {
        let id = proof::next_id(ctx.borrow());
        proof::emit_add(ctx.borrow(), id, &[]);
        let state = ctx.part_mut(SolverStateP);
        state.ok = false;
        state.sat_state = SatState::Unsat;
        if state.unsat_id.is_none() {
            state.unsat_id = Some(id);
        }
    }
}

/// Admit a parity constraint over outside variables.
pub fn add_xor_clause_outside<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
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
        ConfigP,
    ),
    vars: &[Var],
    rhs: bool,
) -> Result<bool, SolverError> {
    if !ctx.part(SolverStateP).ok {
        return Ok(false);
    }

    let mut lits: Vec<Lit> = vars.iter().map(|&var| var.positive()).collect();
    if !add_clause_helper(ctx.borrow(), &mut lits)? {
        return Ok(false);
    }

    // Fold signs introduced by replacement into the right hand side.
    let mut rhs = rhs;
    let mut xor_vars: Vec<Var> = Vec::with_capacity(lits.len());
    for lit in lits {
        rhs ^= lit.is_negative();
        xor_vars.push(lit.var());
    }

    xor::normalize_vars(&mut xor_vars, &mut rhs);
    xor::drop_assigned(ctx.borrow(), &mut xor_vars, &mut rhs);

    match xor_vars.len() {
        0 => {
            if rhs {
                let id = proof::next_id(ctx.borrow());
                proof::emit_add(ctx.borrow(), id, &[]);
                let state = ctx.part_mut(SolverStateP);
                state.ok = false;
                state.sat_state = SatState::Unsat;
                if state.unsat_id.is_none() {
                    state.unsat_id = Some(id);
                }
            }
        }
        1 => {
            let unit = xor_vars[0].lit(rhs);
            add_clause_int(ctx.borrow(), &[unit], false, ClauseSource::Derived);
        }
        2 => {
            let (a, b) = (xor_vars[0], xor_vars[1]);
            add_clause_int(
                ctx.borrow(),
                &[a.lit(true) ^ !rhs, b.lit(true)],
                false,
                ClauseSource::Derived,
            );
            add_clause_int(
                ctx.borrow(),
                &[a.lit(false) ^ !rhs, b.lit(false)],
                false,
                ClauseSource::Derived,
            );
        }
        _ => {
            xor::store_and_encode(ctx.borrow(), xor_vars, rhs);
        }
    }

    propagate_at_admission(ctx.borrow());

    Ok(ctx.part(SolverStateP).ok)
}

/// Sort a threshold constraint and fold assigned and complementary literals into the cutoff.
fn sort_and_clean_bnn<'a>(
    mut ctx: partial!(Context<'a>, AssignmentP),
    lits: &mut Vec<Lit>,
    cutoff: &mut i64,
) {
    lits.sort_unstable();

    let mut cleaned = Vec::with_capacity(lits.len());
    let mut read = 0;

    while read < lits.len() {
        let lit = lits[read];
        // A complementary pair contributes exactly one to the sum.
        if read + 1 < lits.len() && lits[read + 1] == !lit {
            *cutoff -= 1;
            read += 2;
            continue;
        }
        match ctx.part(AssignmentP).lit_value(lit) {
            Some(true) => *cutoff -= 1,
            Some(false) => {}
            None => cleaned.push(lit),
        }
        read += 1;
    }

    *lits = cleaned;
}

/// Admit a threshold constraint over outside literals.
///
/// `out` is the output literal; `None` asserts the constraint.
pub fn add_bnn_clause_outside<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
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
        ConfigP,
    ),
    outside_lits: &[Lit],
    cutoff: u64,
    out: Option<Lit>,
) -> Result<bool, SolverError> {
    if !ctx.part(SolverStateP).ok {
        return Ok(false);
    }

    let mut lits = outside_lits.to_vec();
    if !add_clause_helper(ctx.borrow(), &mut lits)? {
        return Ok(false);
    }

    let out = match out {
        None => None,
        Some(out_lit) => {
            let mut out_lits = vec![out_lit];
            if !add_clause_helper(ctx.borrow(), &mut out_lits)? {
                return Ok(false);
            }
            Some(out_lits[0])
        }
    };

    let mut cutoff = cutoff as i64;
    sort_and_clean_bnn(ctx.borrow(), &mut lits, &mut cutoff);

    // Resolve an already assigned output into the asserted form.
    let out = match out {
        Some(out_lit) => match ctx.part(AssignmentP).lit_value(out_lit) {
            Some(true) => None,
            Some(false) => {
                // `¬(Σ ≥ k)` is `Σ over negated literals ≥ size + 1 - k`.
                for lit in lits.iter_mut() {
                    *lit = !*lit;
                }
                cutoff = lits.len() as i64 + 1 - cutoff;
                None
            }
            None => Some(out_lit),
        },
        None => None,
    };

    let bnn = Bnn {
        lits,
        cutoff,
        out,
        removed: false,
    };

    match bnn::bnn_eval(ctx.borrow(), &bnn) {
        Some(false) => {
            let id = proof::next_id(ctx.borrow());
            proof::emit_add(ctx.borrow(), id, &[]);
            let state = ctx.part_mut(SolverStateP);
            state.ok = false;
            state.sat_state = SatState::Unsat;
            if state.unsat_id.is_none() {
                state.unsat_id = Some(id);
            }
        }
        Some(true) => {}
        None => {
            if bnn_convertible(&bnn) {
                bnn_to_cnf(ctx.borrow(), &bnn);
            } else {
                let lits = bnn.lits.clone();
                let out = bnn.out;
                let idx = ctx.part_mut(BnnsP).push(bnn);
                let watchlists = ctx.part_mut(WatchlistsP);
                for &lit in lits.iter() {
                    watchlists.add_bnn_watch(lit, idx);
                }
                if let Some(out_lit) = out {
                    watchlists.add_bnn_watch(out_lit, idx);
                }
            }
        }
    }

    propagate_at_admission(ctx.borrow());

    Ok(ctx.part(SolverStateP).ok)
}

/// Whether a threshold constraint has a compact clausal encoding.
fn bnn_convertible(bnn: &Bnn) -> bool {
    let size = bnn.lits.len() as i64;
    bnn.cutoff == 1 || bnn.cutoff == size || (bnn.cutoff == 2 && size == 3)
}

/// Replace a convertible threshold constraint by its clausal encoding.
fn bnn_to_cnf<'a>(
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
    bnn: &Bnn,
) {
    let size = bnn.lits.len() as i64;
    let mut clause = vec![];

    if bnn.cutoff == 1 {
        // At least one: a single clause, plus implications from the output.
        clause.clear();
        clause.extend(bnn.out.map(|out| !out));
        clause.extend_from_slice(&bnn.lits);
        add_clause_int(ctx.borrow(), &clause, false, ClauseSource::Derived);

        if let Some(out) = bnn.out {
            for &lit in bnn.lits.iter() {
                add_clause_int(ctx.borrow(), &[!lit, out], false, ClauseSource::Derived);
            }
        }
        return;
    }

    if bnn.cutoff == size {
        // All of them: the conjunction of the literals.
        for &lit in bnn.lits.iter() {
            clause.clear();
            clause.extend(bnn.out.map(|out| !out));
            clause.push(lit);
            add_clause_int(ctx.borrow(), &clause, false, ClauseSource::Derived);
        }

        if let Some(out) = bnn.out {
            clause.clear();
            clause.push(out);
            clause.extend(bnn.lits.iter().map(|&lit| !lit));
            add_clause_int(ctx.borrow(), &clause, false, ClauseSource::Derived);
        }
        return;
    }

    debug_assert!(bnn.cutoff == 2 && size == 3);

    // Two out of three: every pair contains a true literal.
    for a in 0..3 {
        for b in 0..a {
            clause.clear();
            clause.extend(bnn.out.map(|out| !out));
            clause.push(bnn.lits[a]);
            clause.push(bnn.lits[b]);
            add_clause_int(ctx.borrow(), &clause, false, ClauseSource::Derived);
        }
    }

    if let Some(out) = bnn.out {
        // Two true literals force the output high.
        for a in 0..3 {
            for b in 0..a {
                add_clause_int(
                    ctx.borrow(),
                    &[out, !bnn.lits[a], !bnn.lits[b]],
                    false,
                    ClauseSource::Derived,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parisat_formula::{lits, vars};

    use crate::state::SatState;

    #[test]
    fn unsat_on_empty_clause() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let ok = add_clause_outside(ctx.borrow(), &[], false).unwrap();

        assert!(!ok);
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
        assert!(ctx.part(SolverStateP).unsat_id.is_some());
    }

    #[test]
    fn unit_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        add_clause_outside(ctx.borrow(), &lits![1], false).unwrap();
        assert_eq!(ctx.part(TrailP).trail().len(), 1);

        add_clause_outside(ctx.borrow(), &lits![3, -3], false).unwrap();
        assert_eq!(ctx.part(TrailP).trail().len(), 1);

        add_clause_outside(ctx.borrow(), &lits![-2], false).unwrap();
        assert_eq!(ctx.part(TrailP).trail().len(), 2);

        add_clause_outside(ctx.borrow(), &lits![1, 1], false).unwrap();
        assert_eq!(ctx.part(TrailP).trail().len(), 2);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);

        let ok = add_clause_outside(ctx.borrow(), &lits![2], false).unwrap();
        assert!(!ok);
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }

    #[test]
    fn binary_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        add_clause_outside(ctx.borrow(), &lits![1, 2], false).unwrap();
        assert_eq!(ctx.part(WatchlistsP).binary_count(), 1);

        add_clause_outside(ctx.borrow(), &lits![-1, 3, 3], false).unwrap();
        assert_eq!(ctx.part(WatchlistsP).binary_count(), 2);

        add_clause_outside(ctx.borrow(), &lits![4, -4], false).unwrap();
        assert_eq!(ctx.part(WatchlistsP).binary_count(), 2);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
    }

    #[test]
    fn long_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        add_clause_outside(ctx.borrow(), &lits![1, 2, 3], false).unwrap();
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 1);

        add_clause_outside(ctx.borrow(), &lits![-2, 3, 3, 4], false).unwrap();
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 2);

        add_clause_outside(ctx.borrow(), &lits![4, -5, 5, 2], false).unwrap();
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 2);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
    }

    #[test]
    fn tautology_marks_must_set() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        add_clause_outside(ctx.borrow(), &lits![1, -1, 2], false).unwrap();

        let variables = ctx.part(VariablesP);
        assert!(variables.is_must_set(vars![1][0]));
        assert!(!variables.is_must_set(vars![2][0]));
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
    }

    #[test]
    fn xor_admission_dispatches_by_size() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let v = vars![1, 2, 3];

        // Three variables: stored and encoded as four ternary clauses.
        let ok = add_xor_clause_outside(ctx.borrow(), &v, true).unwrap();
        assert!(ok);
        assert_eq!(ctx.part(XorsP).len(), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 4);

        // Two variables: a pair of binary clauses, no stored constraint.
        let ok = add_xor_clause_outside(ctx.borrow(), &v[0..2], false).unwrap();
        assert!(ok);
        assert_eq!(ctx.part(XorsP).len(), 1);
        assert_eq!(ctx.part(WatchlistsP).binary_count(), 2);

        // One variable: a unit.
        let ok = add_xor_clause_outside(ctx.borrow(), &v[2..3], true).unwrap();
        assert!(ok);
        let variables = ctx.part(VariablesP);
        let outer = variables.outer_from_outside(v[2]).unwrap();
        let inter = variables.inter_from_outer(outer);
        assert_eq!(ctx.part(AssignmentP).var_value(inter), Some(true));
    }

    #[test]
    fn convertible_bnn_becomes_cnf() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        // cutoff 2 of size 3 with an output literal.
        let ok =
            add_bnn_clause_outside(ctx.borrow(), &lits![1, 2, 3], 2, Some(lits![4][0])).unwrap();
        assert!(ok);
        assert_eq!(ctx.part(BnnsP).len(), 0);
        assert!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred) > 0);

        // Forcing two inputs true propagates the output once the clauses are in place.
        add_clause_outside(ctx.borrow(), &lits![1], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![2], false).unwrap();

        let variables = ctx.part(VariablesP);
        let outer = variables.outer_from_outside(vars![4][0]).unwrap();
        let inter = variables.inter_from_outer(outer);
        assert_eq!(ctx.part(AssignmentP).var_value(inter), Some(true));
    }

    #[test]
    fn wide_bnn_is_stored_and_watched() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let ok = add_bnn_clause_outside(ctx.borrow(), &lits![1, 2, 3, 4, 5], 2, None).unwrap();
        assert!(ok);
        assert_eq!(ctx.part(BnnsP).len(), 1);

        // Three false inputs leave only two candidates: both are forced.
        add_clause_outside(ctx.borrow(), &lits![-1], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-2], false).unwrap();
        let ok = add_clause_outside(ctx.borrow(), &lits![-3], false).unwrap();
        assert!(ok);

        let variables = ctx.part(VariablesP);
        for &outside in vars![4, 5].iter() {
            let outer = variables.outer_from_outside(outside).unwrap();
            let inter = variables.inter_from_outer(outer);
            assert_eq!(ctx.part(AssignmentP).var_value(inter), Some(true));
        }
    }
}
