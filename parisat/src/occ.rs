//! Occurrence based simplification.
//!
//! Builds full occurrence lists over the irredundant long clauses and runs backward subsumption,
//! self-subsuming strengthening and bounded variable elimination on them. Eliminated variables
//! keep their removed clauses on a LIFO stack that is consumed by model extension and by
//! `uneliminate` when an eliminated variable reappears in a freshly admitted clause.
//!
//! The occ-* strategy tokens are buffered by the strategy interpreter and flushed here as one
//! batch, because occurrence lists are built once per batch.
use hashbrown::{HashMap, HashSet};

use partial_ref::{partial, PartialRef};

use serde::{Deserialize, Serialize};

use parisat_formula::{Lit, Var};

use crate::admit::{self, ClauseSource};
use crate::clause::{db, ClauseRef};
use crate::context::{parts::*, Context};
use crate::proof;
use crate::variables::data::Removed;
use crate::watch::Watcher;

/// Clauses removed together with an eliminated variable.
///
/// Stored in outer literals so they survive renumbering.
#[derive(Clone, Serialize, Deserialize)]
pub struct ElimedClauses {
    pub var: Var,
    pub clauses: Vec<Vec<Lit>>,
}

/// The occurrence simplifier.
#[derive(Default)]
pub struct OccSimplifier {
    /// Eliminated variables with their clauses, in elimination order.
    elim_stack: Vec<ElimedClauses>,
    /// Number of currently eliminated variables.
    elimed_count: usize,
}

impl OccSimplifier {
    /// Number of currently eliminated variables.
    pub fn elimed_count(&self) -> usize {
        self.elimed_count
    }

    /// The elimination stack, oldest entry first.
    pub fn elim_stack(&self) -> &[ElimedClauses] {
        &self.elim_stack
    }

    /// Replace the elimination stack from a solution reconstruction snapshot.
    pub fn restore_elim_stack(&mut self, stack: Vec<ElimedClauses>) {
        self.elimed_count = stack.len();
        self.elim_stack = stack;
    }
}

/// An OR gate recovered from the clause database.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OrGate {
    /// `out ↔ ins[0] ∨ ins[1]`
    pub out: Lit,
    pub ins: [Lit; 2],
}

/// An if-then-else gate recovered from the clause database.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IteGate {
    /// `out ↔ cond ? then_lit : else_lit`
    pub out: Lit,
    pub cond: Lit,
    pub then_lit: Lit,
    pub else_lit: Lit,
}

/// Run a batch of occ-* strategy tokens.
///
/// Returns the solver's `ok` flag.
pub fn simplify<'a>(
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
    _startup: bool,
    tokens: &str,
) -> bool {
    for token in tokens.split(',') {
        if !ctx.part(SolverStateP).ok {
            return false;
        }

        let token = token.trim();
        log::debug!("occ token: {:?}", token);

        match token {
            "" => {}
            "occ-backw-sub-str" => backward_subsume(ctx.borrow(), true),
            "occ-backw-sub" => backward_subsume(ctx.borrow(), false),
            "occ-bve" => {
                if ctx.part(ConfigP).do_bve {
                    eliminate_vars(ctx.borrow());
                }
            }
            "occ-xor" => recover_xors(ctx.borrow()),
            "occ-clean-implicit" => crate::simplify::clean_all(ctx.borrow()),
            "occ-bva" => {
                if ctx.part(ConfigP).do_bva {
                    log::info!("occ-bva scheduled but bounded variable addition is disabled");
                }
            }
            _ => panic!("strategy '{}' not recognised", token),
        }

        admit::propagate_at_admission(ctx.borrow());
    }

    ctx.part(SolverStateP).ok
}

/// Sorted literal snapshot of the live irredundant long clauses.
fn snapshot_irred<'a>(
    mut ctx: partial!(Context<'a>, ClauseAllocP, ClauseDbP),
) -> Vec<(ClauseRef, Vec<Lit>)> {
    let alloc = ctx.part(ClauseAllocP);
    let clause_db = ctx.part(ClauseDbP);

    db::clauses_iter(clause_db, alloc)
        .filter(|&cref| !alloc.header(cref).redundant())
        .map(|cref| {
            let mut lits = alloc.clause(cref).lits().to_vec();
            lits.sort_unstable();
            (cref, lits)
        })
        .collect()
}

/// Whether `sub` is a subset of `sup`, both sorted.
fn is_subset(sub: &[Lit], sup: &[Lit]) -> bool {
    let mut sup_iter = sup.iter();
    'subs: for &lit in sub.iter() {
        for &sup_lit in sup_iter.by_ref() {
            if sup_lit == lit {
                continue 'subs;
            }
            if sup_lit > lit {
                return false;
            }
        }
        return false;
    }
    true
}

/// Backward subsumption and optional self-subsuming strengthening over the irredundant long
/// clauses.
pub fn backward_subsume<'a>(
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
    strengthen: bool,
) {
    let mut clauses = snapshot_irred(ctx.borrow());
    clauses.sort_unstable_by_key(|(_, lits)| lits.len());

    let mut occurs: HashMap<Lit, Vec<usize>> = HashMap::new();
    for (index, (_, lits)) in clauses.iter().enumerate() {
        for &lit in lits.iter() {
            occurs.entry(lit).or_default().push(index);
        }
    }

    let mut dead = vec![false; clauses.len()];
    let mut subsumed = 0usize;
    let mut strengthened = 0usize;

    for index in 0..clauses.len() {
        if dead[index] {
            continue;
        }

        let lits = clauses[index].1.clone();

        // Scan the occurrence list of the rarest literal.
        let best_lit = match lits
            .iter()
            .min_by_key(|&&lit| occurs.get(&lit).map_or(0, |list| list.len()))
        {
            Some(&lit) => lit,
            None => continue,
        };

        if let Some(candidates) = occurs.get(&best_lit) {
            for &other in candidates.iter() {
                if other == index || dead[other] {
                    continue;
                }
                if clauses[other].1.len() < lits.len() {
                    continue;
                }
                if is_subset(&lits, &clauses[other].1) {
                    dead[other] = true;
                    subsumed += 1;
                    db::delete_clause_with_proof(ctx.borrow(), clauses[other].0);
                }
            }
        }

        if !strengthen {
            continue;
        }

        // Self-subsuming resolution: when this clause with one literal negated is contained in
        // another clause, that other clause can drop the negated literal.
        for &lit in lits.iter() {
            let mut probe = lits.clone();
            let position = probe.iter().position(|&l| l == lit).unwrap();
            probe[position] = !lit;
            probe.sort_unstable();

            let candidates = match occurs.get(&!lit) {
                Some(candidates) => candidates.clone(),
                None => continue,
            };

            for other in candidates {
                if other == index || dead[other] {
                    continue;
                }
                if clauses[other].1.len() < probe.len() {
                    continue;
                }
                if !is_subset(&probe, &clauses[other].1) {
                    continue;
                }

                let (old_cref, old_lits) = {
                    let entry = &clauses[other];
                    (entry.0, entry.1.clone())
                };
                let new_lits: Vec<Lit> =
                    old_lits.iter().cloned().filter(|&l| l != !lit).collect();

                dead[other] = true;
                strengthened += 1;

                let old_id = ctx.part(ClauseAllocP).header(old_cref).id();
                db::delete_clause(ctx.borrow(), old_cref);
                admit::add_clause_int(
                    ctx.borrow(),
                    &new_lits,
                    false,
                    ClauseSource::Rewrite {
                        old_id,
                        old_lits: &old_lits,
                    },
                );
                if !ctx.part(SolverStateP).ok {
                    return;
                }
            }
        }
    }

    log::debug!(
        "occ-backw-sub: {} subsumed, {} strengthened",
        subsumed,
        strengthened
    );
}

/// Bounded variable elimination.
///
/// A variable is eliminated when its resolvents do not outnumber its original clauses. The
/// original clauses move to the elimination stack for model extension and uneliminate.
pub fn eliminate_vars<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut OccP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        ConfigP,
        XorsP,
    ),
) {
    let growth_limit = ctx.part(ConfigP).bve_growth_limit;
    let max_resolvent_len = ctx.part(ConfigP).bve_max_resolvent_len;

    let candidates: Vec<Var> = {
        let variables = ctx.part(VariablesP);
        let assignment = ctx.part(AssignmentP);
        let xors = ctx.part(XorsP);
        let bnns = ctx.part(BnnsP);
        (0..variables.count())
            .map(Var::from_index)
            .filter(|&inter| {
                let outer = variables.outer_from_inter(inter);
                let data = variables.var_data(outer);
                data.removed == Removed::None
                    && data.assumed.is_none()
                    && assignment.var_value(inter).is_none()
                    && !xors.mentions_var(inter)
                    && !bnns.mentions_var(inter)
            })
            .collect()
    };

    let mut eliminated = 0usize;

    for inter in candidates {
        if !ctx.part(SolverStateP).ok {
            return;
        }

        if try_eliminate(ctx.borrow(), inter, growth_limit, max_resolvent_len) {
            eliminated += 1;
        }
    }

    log::debug!("occ-bve: {} variables eliminated", eliminated);

    admit::propagate_at_admission(ctx.borrow());
}

fn try_eliminate<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut OccP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    inter: Var,
    growth_limit: usize,
    max_resolvent_len: usize,
) -> bool {
    const MAX_OCCURRENCES: usize = 10;

    // Gather all clauses containing the variable, in both polarities.
    let mut pos: Vec<(Option<ClauseRef>, Vec<Lit>)> = vec![];
    let mut neg: Vec<(Option<ClauseRef>, Vec<Lit>)> = vec![];

    {
        let alloc = ctx.part(ClauseAllocP);
        let clause_db = ctx.part(ClauseDbP);
        for cref in db::clauses_iter(clause_db, alloc) {
            let header = alloc.header(cref);
            if header.redundant() {
                continue;
            }
            let lits = alloc.clause(cref).lits();
            if lits.iter().any(|lit| lit.var() == inter) {
                let entry = (Some(cref), lits.to_vec());
                if lits.contains(&inter.positive()) {
                    pos.push(entry);
                } else {
                    neg.push(entry);
                }
            }
        }
    }

    {
        let watchlists = ctx.part(WatchlistsP);
        for &(lit, target) in [
            (inter.positive(), 0usize),
            (inter.negative(), 1usize),
        ]
        .iter()
        {
            for watch in watchlists.watched_by(!lit).iter() {
                if let Watcher::Binary { implied, red, .. } = watch {
                    if *red {
                        continue;
                    }
                    let entry = (None, vec![lit, *implied]);
                    if target == 0 {
                        pos.push(entry);
                    } else {
                        neg.push(entry);
                    }
                }
            }
        }
    }

    if pos.is_empty() && neg.is_empty() {
        return false;
    }
    if pos.len() > MAX_OCCURRENCES || neg.len() > MAX_OCCURRENCES {
        return false;
    }

    // Resolve every positive clause against every negative one.
    let mut resolvents: Vec<Vec<Lit>> = vec![];
    for (_, pos_lits) in pos.iter() {
        'pairs: for (_, neg_lits) in neg.iter() {
            let mut resolvent: Vec<Lit> = pos_lits
                .iter()
                .chain(neg_lits.iter())
                .cloned()
                .filter(|lit| lit.var() != inter)
                .collect();
            resolvent.sort_unstable();
            resolvent.dedup();

            if resolvent.len() > max_resolvent_len {
                return false;
            }
            for window in resolvent.windows(2) {
                if window[0] == !window[1] {
                    continue 'pairs;
                }
            }
            resolvents.push(resolvent);
        }
    }

    if resolvents.len() > pos.len() + neg.len() + growth_limit {
        return false;
    }

    // Commit: move the originals to the elimination stack and add the resolvents.
    let outer = ctx.part(VariablesP).outer_from_inter(inter);

    let mut stored = ElimedClauses {
        var: outer,
        clauses: vec![],
    };

    for (cref, lits) in pos.iter().chain(neg.iter()) {
        let outer_clause: Vec<Lit> = {
            let variables = ctx.part(VariablesP);
            lits.iter()
                .map(|&lit| variables.outer_from_inter_lit(lit))
                .collect()
        };
        stored.clauses.push(outer_clause);

        match cref {
            Some(cref) => {
                db::delete_clause_with_proof(ctx.borrow(), *cref);
            }
            None => {
                let id = {
                    let watchlists = ctx.part(WatchlistsP);
                    watchlists
                        .watched_by(!lits[0])
                        .iter()
                        .find_map(|watch| match watch {
                            Watcher::Binary { implied, id, .. } if *implied == lits[1] => {
                                Some(*id)
                            }
                            _ => None,
                        })
                };
                if let Some(id) = id {
                    proof::emit_del(ctx.borrow(), id, lits);
                    ctx.part_mut(WatchlistsP).remove_binary([lits[0], lits[1]], id);
                }
            }
        }
    }

    // Redundant clauses mentioning the variable are dropped outright.
    let red_crefs: Vec<ClauseRef> = {
        let alloc = ctx.part(ClauseAllocP);
        let clause_db = ctx.part(ClauseDbP);
        db::clauses_iter(clause_db, alloc)
            .filter(|&cref| {
                alloc.header(cref).redundant()
                    && alloc.clause(cref).lits().iter().any(|lit| lit.var() == inter)
            })
            .collect()
    };
    for cref in red_crefs {
        db::delete_clause_with_proof(ctx.borrow(), cref);
    }
    let red_binaries: Vec<([Lit; 2], parisat_internal_proof::ClauseId)> = {
        let watchlists = ctx.part(WatchlistsP);
        watchlists
            .collect_binaries()
            .into_iter()
            .filter(|(lits, red, _)| *red && lits.iter().any(|lit| lit.var() == inter))
            .map(|(lits, _, id)| (lits, id))
            .collect()
    };
    for (lits, id) in red_binaries {
        proof::emit_del(ctx.borrow(), id, &lits);
        ctx.part_mut(WatchlistsP).remove_binary(lits, id);
    }

    ctx.part_mut(OccP).elim_stack.push(stored);
    ctx.part_mut(OccP).elimed_count += 1;
    ctx.part_mut(VariablesP).var_data_mut(outer).removed = Removed::Eliminated;
    ctx.part_mut(VsidsP).remove_var(inter);

    for resolvent in resolvents {
        admit::add_clause_int(ctx.borrow(), &resolvent, false, ClauseSource::Derived);
        if !ctx.part(SolverStateP).ok {
            return true;
        }
    }

    true
}

/// Restore an eliminated variable and its clauses.
///
/// Returns the solver's `ok` flag.
pub fn uneliminate<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut OccP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        VarReplacerP,
    ),
    outer: Var,
) -> bool {
    // First restore every transitively required variable, then re-add all of their clauses.
    // This keeps the clause admission below from ever seeing an eliminated variable.
    let mut worklist = vec![outer];
    let mut restored_clauses: Vec<Vec<Lit>> = vec![];

    while let Some(var) = worklist.pop() {
        if ctx.part(VariablesP).var_data(var).removed != Removed::Eliminated {
            continue;
        }

        let entries: Vec<ElimedClauses> = {
            let occ = ctx.part_mut(OccP);
            let mut entries = vec![];
            let mut index = 0;
            while index < occ.elim_stack.len() {
                if occ.elim_stack[index].var == var {
                    entries.push(occ.elim_stack.remove(index));
                } else {
                    index += 1;
                }
            }
            occ.elimed_count -= entries.len();
            entries
        };

        ctx.part_mut(VariablesP).var_data_mut(var).removed = Removed::None;
        let inter = ctx.part(VariablesP).inter_from_outer(var);
        if ctx.part(AssignmentP).var_value(inter).is_none() {
            ctx.part_mut(VsidsP).make_available(inter);
        }

        for entry in entries {
            for outer_clause in entry.clauses {
                // Clauses on the stack may mention other eliminated or since-replaced
                // variables; queue the former for restoration as well.
                for &outer_lit in outer_clause.iter() {
                    let replaced = ctx.part(VarReplacerP).replaced_with(outer_lit);
                    if ctx.part(VariablesP).var_data(replaced.var()).removed
                        == Removed::Eliminated
                    {
                        worklist.push(replaced.var());
                    }
                }
                restored_clauses.push(outer_clause);
            }
        }
    }

    for outer_clause in restored_clauses {
        let inter_clause: Vec<Lit> = outer_clause
            .iter()
            .map(|&outer_lit| {
                let replaced = ctx.part(VarReplacerP).replaced_with(outer_lit);
                ctx.part(VariablesP).inter_from_outer_lit(replaced)
            })
            .collect();

        admit::add_clause_int(ctx.borrow(), &inter_clause, false, ClauseSource::Derived);
        if !ctx.part(SolverStateP).ok {
            return false;
        }
    }

    true
}

/// Recover parity constraints from their clausal encodings.
///
/// A full set of `2^(n-1)` same-parity clauses over one variable set is an XOR constraint. Found
/// constraints are added to the XOR store, leaving the clauses attached; matrix initialization
/// detaches the shadowed clauses (see [`crate::gauss`]).
pub fn recover_xors<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut XorsP,
        ClauseAllocP,
        ClauseDbP,
        ConfigP,
    ),
) {
    let max_len = ctx.part(ConfigP).xor_recover_max_len;

    let mut groups: HashMap<(Vec<Var>, bool), HashSet<Vec<Lit>>> = HashMap::new();

    {
        let alloc = ctx.part(ClauseAllocP);
        let clause_db = ctx.part(ClauseDbP);

        for cref in db::clauses_iter(clause_db, alloc) {
            let header = alloc.header(cref);
            if header.redundant() {
                continue;
            }
            let len = header.len();
            if len < 3 || len > max_len {
                continue;
            }

            let mut lits = alloc.clause(cref).lits().to_vec();
            lits.sort_unstable();

            let vars: Vec<Var> = lits.iter().map(|lit| lit.var()).collect();
            let mut distinct = vars.clone();
            distinct.dedup();
            if distinct.len() != vars.len() {
                continue;
            }

            let parity = lits.iter().filter(|lit| lit.is_negative()).count() % 2 == 1;
            groups.entry((distinct, parity)).or_default().insert(lits);
        }
    }

    let mut recovered = 0usize;

    for ((vars, parity), clauses) in groups {
        let needed = 1usize << (vars.len() - 1);
        if clauses.len() != needed {
            continue;
        }

        let rhs = !parity;
        let already_known = ctx
            .part(XorsP)
            .xors()
            .iter()
            .any(|xor| xor.vars == vars && xor.rhs == rhs);
        if already_known {
            continue;
        }

        ctx.part_mut(XorsP).push(crate::xor::Xor { vars, rhs });
        recovered += 1;
    }

    if recovered > 0 {
        log::info!("occ-xor recovered {} parity constraints", recovered);
    }
}

/// Recover `out ↔ a ∨ b` gates from the clause database.
pub fn find_or_gates<'a>(
    mut ctx: partial!(Context<'a>, ClauseAllocP, ClauseDbP, WatchlistsP),
) -> Vec<OrGate> {
    let alloc = ctx.part(ClauseAllocP);
    let clause_db = ctx.part(ClauseDbP);
    let watchlists = ctx.part(WatchlistsP);

    let has_binary = |a: Lit, b: Lit| -> bool {
        watchlists.watched_by(!a).iter().any(|watch| match watch {
            Watcher::Binary { implied, .. } => *implied == b,
            _ => false,
        })
    };

    let mut gates = vec![];

    for cref in db::clauses_iter(clause_db, alloc) {
        let header = alloc.header(cref);
        if header.redundant() || header.len() != 3 {
            continue;
        }
        let lits = alloc.clause(cref).lits();

        for out_position in 0..3 {
            let out = !lits[out_position];
            let in_a = lits[(out_position + 1) % 3];
            let in_b = lits[(out_position + 2) % 3];

            // (¬out ∨ a ∨ b) plus (out ∨ ¬a) and (out ∨ ¬b) encode out ↔ a ∨ b.
            if has_binary(out, !in_a) && has_binary(out, !in_b) {
                gates.push(OrGate {
                    out,
                    ins: [in_a, in_b],
                });
            }
        }
    }

    gates
}

/// Recover `out ↔ cond ? t : e` gates from the clause database.
pub fn find_ite_gates<'a>(
    mut ctx: partial!(Context<'a>, ClauseAllocP, ClauseDbP),
) -> Vec<IteGate> {
    let alloc = ctx.part(ClauseAllocP);
    let clause_db = ctx.part(ClauseDbP);

    let mut ternaries: HashSet<Vec<Lit>> = HashSet::new();
    let mut candidates: Vec<Vec<Lit>> = vec![];

    for cref in db::clauses_iter(clause_db, alloc) {
        let header = alloc.header(cref);
        if header.redundant() || header.len() != 3 {
            continue;
        }
        let mut lits = alloc.clause(cref).lits().to_vec();
        lits.sort_unstable();
        if ternaries.insert(lits.clone()) {
            candidates.push(lits);
        }
    }

    let sorted = |a: Lit, b: Lit, c: Lit| -> Vec<Lit> {
        let mut lits = vec![a, b, c];
        lits.sort_unstable();
        lits
    };

    let mut gates = vec![];

    for clause in candidates.iter() {
        // Try to read the clause as (¬out ∨ ¬cond ∨ t).
        for out_position in 0..3 {
            for cond_position in 0..3 {
                if cond_position == out_position {
                    continue;
                }
                let then_position = 3 - out_position - cond_position;

                let out = !clause[out_position];
                let cond = !clause[cond_position];
                let then_lit = clause[then_position];

                // The remaining three clauses determine the else branch; it is shared between
                // (¬out ∨ cond ∨ e) and (out ∨ cond ∨ ¬e), so scan for a matching pair.
                for other in candidates.iter() {
                    if !other.contains(&!out) || !other.contains(&cond) {
                        continue;
                    }
                    let else_lit = match other.iter().find(|&&l| l != !out && l != cond) {
                        Some(&l) => l,
                        None => continue,
                    };
                    if else_lit.var() == out.var() || else_lit.var() == cond.var() {
                        continue;
                    }

                    if ternaries.contains(&sorted(out, !cond, !then_lit))
                        && ternaries.contains(&sorted(out, cond, !else_lit))
                    {
                        gates.push(IteGate {
                            out,
                            cond,
                            then_lit,
                            else_lit,
                        });
                    }
                }
            }
        }
    }

    gates
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parisat_formula::{lits, vars};

    use crate::admit::add_clause_outside;
    use crate::clause::Tier;

    #[test]
    fn backward_subsumption_removes_supersets() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        add_clause_outside(ctx.borrow(), &lits![1, 2, 3], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![1, 2, 3, 4], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![1, 2, 5, 6], false).unwrap();

        backward_subsume(ctx.borrow(), false);

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 2);
    }

    #[test]
    fn strengthening_drops_negated_literal() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        add_clause_outside(ctx.borrow(), &lits![1, 2, 3], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![1, -2, 3, 4], false).unwrap();

        backward_subsume(ctx.borrow(), true);

        // (1 -2 3 4) strengthened to (1 3 4).
        let crefs = db::collect_clauses(ctx.borrow());
        let mut lens: Vec<usize> = crefs
            .iter()
            .map(|&cref| ctx.part(ClauseAllocP).clause(cref).lits().len())
            .collect();
        lens.sort_unstable();
        assert_eq!(lens, vec![3, 3]);
    }

    #[test]
    fn elimination_and_uneliminate_roundtrip() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        // x1 occurs once positively and once negatively; eliminating it resolves the two
        // clauses into (2 3).
        add_clause_outside(ctx.borrow(), &lits![1, 2], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-1, 3], false).unwrap();

        eliminate_vars(ctx.borrow());

        let outer = {
            let variables = ctx.part(VariablesP);
            variables.outer_from_outside(vars![1][0]).unwrap()
        };
        assert_eq!(
            ctx.part(VariablesP).var_data(outer).removed,
            Removed::Eliminated
        );
        assert!(ctx.part(OccP).elimed_count() >= 1);

        // A new clause mentioning x1 restores it together with its clauses.
        add_clause_outside(ctx.borrow(), &lits![1, 4], false).unwrap();

        assert_eq!(ctx.part(VariablesP).var_data(outer).removed, Removed::None);
        assert_eq!(ctx.part(OccP).elimed_count(), 0);
    }

    #[test]
    fn xor_recovery_finds_encoded_parity() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        // The four clauses of x1 ⊕ x2 ⊕ x3 = 1.
        add_clause_outside(ctx.borrow(), &lits![1, 2, 3], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![1, -2, -3], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-1, 2, -3], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-1, -2, 3], false).unwrap();

        recover_xors(ctx.borrow());

        let xors = ctx.part(XorsP);
        assert_eq!(xors.len(), 1);
        assert_eq!(xors.xors()[0].rhs, true);
        assert!(xors.updated);
    }

    #[test]
    fn or_gate_recovery() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        // x3 ↔ x1 ∨ x2
        add_clause_outside(ctx.borrow(), &lits![-3, 1, 2], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![3, -1], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![3, -2], false).unwrap();

        let gates = find_or_gates(ctx.borrow());
        assert!(gates.iter().any(|gate| gate.out == lits![3][0]));
    }
}
