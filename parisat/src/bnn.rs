//! Threshold (BNN) constraints.
//!
//! A BNN constraint demands that at least `cutoff` of its literals are true. It either carries an
//! output literal that is equivalent to the threshold being reached, or it is asserted outright
//! (`out` is `None`).
//!
//! BNN constraints keep watch entries on both polarities of every involved literal, so any
//! assignment touching the constraint re-evaluates it. When a constraint forces a literal or
//! becomes violated, the implication is materialized as a redundant clause. This gives conflict
//! analysis an ordinary antecedent and records the inference in the proof trace.
use partial_ref::{partial, PartialRef};

use parisat_formula::{Lit, Var};

use crate::clause::{db, ClauseHeader, Tier};
use crate::context::{parts::*, Context};
use crate::proof;
use crate::prop::{enqueue_assignment, Assignment, Conflict, Reason};

/// A single threshold constraint.
#[derive(Clone, Debug)]
pub struct Bnn {
    /// Literal multiset of the left hand side.
    pub lits: Vec<Lit>,
    /// Number of literals that have to be true.
    pub cutoff: i64,
    /// Output literal, `None` when the constraint is asserted.
    pub out: Option<Lit>,
    /// Whether the constraint was retired.
    pub removed: bool,
}

impl Bnn {
    /// Whether the constraint is asserted rather than reified.
    pub fn is_set(&self) -> bool {
        self.out.is_none()
    }
}

/// The threshold constraint store.
#[derive(Default)]
pub struct Bnns {
    bnns: Vec<Bnn>,
}

impl Bnns {
    pub fn is_empty(&self) -> bool {
        self.bnns.iter().all(|bnn| bnn.removed)
    }

    pub fn len(&self) -> usize {
        self.bnns.len()
    }

    pub fn bnns(&self) -> &[Bnn] {
        &self.bnns
    }

    pub fn get(&self, idx: u32) -> &Bnn {
        &self.bnns[idx as usize]
    }

    pub fn push(&mut self, bnn: Bnn) -> u32 {
        let idx = self.bnns.len() as u32;
        self.bnns.push(bnn);
        idx
    }

    /// Whether any constraint of the store mentions the given variable.
    pub fn mentions_var(&self, var: Var) -> bool {
        self.bnns.iter().any(|bnn| {
            !bnn.removed
                && (bnn.lits.iter().any(|lit| lit.var() == var)
                    || bnn.out.map_or(false, |out| out.var() == var))
        })
    }

    /// Remap all literals, used by the renumberer and the variable replacer.
    pub fn map_lits(&mut self, map: impl Fn(Lit) -> Lit) {
        for bnn in self.bnns.iter_mut() {
            if bnn.removed {
                continue;
            }
            for lit in bnn.lits.iter_mut() {
                *lit = map(*lit);
            }
            if let Some(out) = bnn.out {
                bnn.out = Some(map(out));
            }
        }
    }
}

/// What a re-evaluation of a constraint demands.
enum BnnAction {
    /// Enqueue `clause[0]`, justified by the (unit) clause.
    Force { clause: Vec<Lit> },
    /// The constraint is violated, the clause is falsified.
    Conflict { clause: Vec<Lit> },
}

/// Evaluate a constraint under the current assignment.
fn evaluate(bnn: &Bnn, assignment: &Assignment) -> Vec<BnnAction> {
    let mut true_count = 0i64;
    let mut undef_count = 0i64;

    for &lit in bnn.lits.iter() {
        match assignment.lit_value(lit) {
            Some(true) => true_count += 1,
            Some(false) => {}
            None => undef_count += 1,
        }
    }

    let false_lits = || -> Vec<Lit> {
        bnn.lits
            .iter()
            .cloned()
            .filter(|&lit| assignment.lit_is_false(lit))
            .collect()
    };
    let negated_true_lits = || -> Vec<Lit> {
        bnn.lits
            .iter()
            .cloned()
            .filter(|&lit| assignment.lit_is_true(lit))
            .map(|lit| !lit)
            .collect()
    };

    let out_value = bnn.out.map(|out| assignment.lit_value(out));

    match out_value {
        // Asserted constraint, or output known true: at least cutoff literals must be true.
        None | Some(Some(true)) => {
            let extra = match bnn.out {
                // The false output literal justifying the demand.
                Some(out) if out_value == Some(Some(true)) => Some(!out),
                _ => None,
            };

            if true_count >= bnn.cutoff {
                return vec![];
            }
            if true_count + undef_count < bnn.cutoff {
                let mut clause = false_lits();
                clause.extend(extra);
                return vec![BnnAction::Conflict { clause }];
            }
            if true_count + undef_count == bnn.cutoff {
                // Every undefined literal is needed.
                let mut actions = vec![];
                for &lit in bnn.lits.iter() {
                    if assignment.lit_is_unk(lit) {
                        let mut clause = vec![lit];
                        clause.extend(false_lits());
                        clause.extend(extra);
                        actions.push(BnnAction::Force { clause });
                    }
                }
                return actions;
            }
            vec![]
        }
        // Output known false: at most cutoff - 1 literals may be true.
        Some(Some(false)) => {
            let out = bnn.out.unwrap();
            if true_count >= bnn.cutoff {
                let mut clause = vec![out];
                clause.extend(negated_true_lits());
                return vec![BnnAction::Conflict { clause }];
            }
            if true_count == bnn.cutoff - 1 {
                // No further literal may become true.
                let mut actions = vec![];
                for &lit in bnn.lits.iter() {
                    if assignment.lit_is_unk(lit) {
                        let mut clause = vec![!lit, out];
                        clause.extend(negated_true_lits());
                        actions.push(BnnAction::Force { clause });
                    }
                }
                return actions;
            }
            vec![]
        }
        // Output still open: derive it when the threshold is decided.
        Some(None) => {
            let out = bnn.out.unwrap();
            if true_count >= bnn.cutoff {
                let mut clause = vec![out];
                clause.extend(negated_true_lits());
                return vec![BnnAction::Force { clause }];
            }
            if true_count + undef_count < bnn.cutoff {
                let mut clause = vec![!out];
                clause.extend(false_lits());
                return vec![BnnAction::Force { clause }];
            }
            vec![]
        }
    }
}

/// Re-evaluate a threshold constraint after an assignment touched it.
///
/// Forced literals are enqueued with a materialized reason clause. A violated constraint returns
/// the materialized conflict.
pub fn propagate_bnn<'a>(
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
    idx: u32,
) -> Result<(), Conflict> {
    let actions = {
        let (bnns, ctx) = ctx.split_part(BnnsP);
        let bnn = bnns.get(idx);
        if bnn.removed {
            return Ok(());
        }
        evaluate(bnn, ctx.part(AssignmentP))
    };

    for action in actions {
        match action {
            BnnAction::Force { clause } => {
                // The forced literal may have been assigned by an earlier action of the same
                // evaluation round.
                let forced = clause[0];
                match ctx.part(AssignmentP).lit_value(forced) {
                    Some(true) => continue,
                    Some(false) => {
                        let conflict = materialize_clause(ctx.borrow(), clause)?;
                        let _ = conflict;
                        unreachable!("materializing a falsified clause always yields a conflict");
                    }
                    None => {
                        let reason = match materialize_clause(ctx.borrow(), clause) {
                            Ok(reason) => reason,
                            Err(_) => unreachable!("clause is unit on the forced literal"),
                        };
                        enqueue_assignment(ctx.borrow(), forced, reason);
                    }
                }
            }
            BnnAction::Conflict { clause } => {
                let conflict = materialize_clause(ctx.borrow(), clause)?;
                let _ = conflict;
                unreachable!("materializing a falsified clause always yields a conflict");
            }
        }
    }

    Ok(())
}

/// Store a derived clause so it can serve as an antecedent.
///
/// The first literal must be the only possibly-true literal of the clause. Returns the reason
/// for enqueueing it, or the conflict when the clause is falsified.
fn materialize_clause<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut TrailP,
        mut WatchlistsP,
        VariablesP,
    ),
    mut clause: Vec<Lit>,
) -> Result<Reason, Conflict> {
    let falsified = ctx.part(AssignmentP).lit_is_false(clause[0]);

    if clause.len() == 1 {
        // A forced unit is recorded by the level 0 enqueue; a falsified unit surfaces through
        // the conflict it causes. Either way no clause is stored.
        return if falsified {
            Err(Conflict::Unit([clause[0]]))
        } else {
            Ok(Reason::Unit)
        };
    }

    let id = proof::next_id(ctx.borrow());
    proof::emit_add(ctx.borrow(), id, &clause);

    match clause.len() {
        2 => {
            ctx.part_mut(WatchlistsP)
                .add_binary([clause[0], clause[1]], true, id);
            if falsified {
                Err(Conflict::Binary([clause[0], clause[1]]))
            } else {
                Ok(Reason::Binary([clause[1]]))
            }
        }
        _ => {
            // Keep the watch invariant intact: position 1 gets the highest-level false literal.
            let impl_graph = ctx.part(ImplGraphP);
            let mut best = 1;
            for index in 2..clause.len() {
                if impl_graph.level(clause[index].var()) > impl_graph.level(clause[best].var()) {
                    best = index;
                }
            }
            clause.swap(1, best);

            if falsified {
                let impl_graph = ctx.part(ImplGraphP);
                let mut best = 0;
                for index in 1..clause.len() {
                    if impl_graph.level(clause[index].var())
                        > impl_graph.level(clause[best].var())
                    {
                        best = index;
                    }
                }
                clause.swap(0, best);
            }

            let mut header = ClauseHeader::new();
            header.set_tier(Tier::Mid);
            header.set_id(id);
            header.set_glue(clause.len() as u32);

            let cref = db::add_clause(ctx.borrow(), header, &clause);
            if falsified {
                Err(Conflict::Long(cref))
            } else {
                Ok(Reason::Long(cref))
            }
        }
    }
}

/// Evaluate a constraint at decision level 0 during admission.
///
/// Returns `Some(true)` when the constraint is resolved (possibly after enqueuing literals),
/// `Some(false)` when it is unsatisfiable and `None` when it stays alive.
pub fn bnn_eval<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut TrailP,
        VariablesP,
    ),
    bnn: &Bnn,
) -> Option<bool> {
    debug_assert!(ctx.part(TrailP).current_level() == 0);
    debug_assert!(bnn
        .lits
        .iter()
        .all(|&lit| ctx.part(AssignmentP).lit_is_unk(lit)));

    let size = bnn.lits.len() as i64;

    // The cutoff is met no matter what the undefined literals are.
    if bnn.cutoff <= 0 {
        match bnn.out {
            None => return Some(true),
            Some(out) => {
                if ctx.part(AssignmentP).lit_is_unk(out) {
                    enqueue_assignment(ctx.borrow(), out, Reason::Unit);
                }
                return Some(true);
            }
        }
    }

    // The cutoff cannot be met no matter what the undefined literals are.
    if size < bnn.cutoff {
        match bnn.out {
            None => return Some(false),
            Some(out) => {
                if ctx.part(AssignmentP).lit_is_unk(out) {
                    enqueue_assignment(ctx.borrow(), !out, Reason::Unit);
                }
                return Some(true);
            }
        }
    }

    // Asserted and only satisfiable by making every literal true.
    if bnn.is_set() && size == bnn.cutoff {
        for &lit in bnn.lits.iter() {
            if ctx.part(AssignmentP).lit_is_unk(lit) {
                enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
            }
        }
        return Some(true);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_asserted_threshold() {
        let mut assignment = Assignment::default();
        assignment.set_var_count(4);

        let lits: Vec<Lit> = (0..3).map(|i| Lit::from_index(i, false)).collect();
        let bnn = Bnn {
            lits: lits.clone(),
            cutoff: 2,
            out: None,
            removed: false,
        };

        // Nothing known, nothing forced.
        assert!(evaluate(&bnn, &assignment).is_empty());

        // One literal false: the two others are forced.
        assignment.assign_lit(!lits[0]);
        let actions = evaluate(&bnn, &assignment);
        assert_eq!(actions.len(), 2);
        for action in actions {
            match action {
                BnnAction::Force { clause } => {
                    assert!(clause.contains(&lits[0]));
                }
                BnnAction::Conflict { .. } => panic!("unexpected conflict"),
            }
        }

        // Two literals false: violated.
        assignment.assign_lit(!lits[1]);
        let actions = evaluate(&bnn, &assignment);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            BnnAction::Conflict { clause } => {
                assert!(clause.contains(&lits[0]) && clause.contains(&lits[1]));
            }
            BnnAction::Force { .. } => panic!("expected a conflict"),
        }
    }

    #[test]
    fn evaluate_reified_output() {
        let mut assignment = Assignment::default();
        assignment.set_var_count(4);

        let lits: Vec<Lit> = (0..3).map(|i| Lit::from_index(i, false)).collect();
        let out = Lit::from_index(3, false);
        let bnn = Bnn {
            lits: lits.clone(),
            cutoff: 2,
            out: Some(out),
            removed: false,
        };

        assignment.assign_lit(lits[0]);
        assignment.assign_lit(lits[1]);

        let actions = evaluate(&bnn, &assignment);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            BnnAction::Force { clause } => assert_eq!(clause[0], out),
            BnnAction::Conflict { .. } => panic!("unexpected conflict"),
        }
    }
}
