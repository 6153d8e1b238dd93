//! The variable replacer.
//!
//! Equivalent variables are collapsed onto a single representative. The replacement table is a
//! signed union-find over outer variables: every variable maps to a representative literal, and
//! signs compose by xor along the path. The table never contains a cycle other than the trivial
//! self loop.
//!
//! Performing a replacement rewrites every attached clause, XOR and BNN so that no constraint
//! mentions a replaced variable afterwards. The equivalence itself is recorded in the proof trace
//! as a pair of internal binary clauses which are retracted during finalization.
use partial_ref::{partial, PartialRef};

use parisat_formula::{Lit, Var};
use parisat_internal_proof::ClauseId;

use crate::admit::{self, ClauseSource};
use crate::clause::db;
use crate::context::{parts::*, Context};
use crate::proof;
use crate::prop::enqueue_assignment;
use crate::prop::Reason;
use crate::state::SatState;
use crate::variables::data::Removed;

/// The variable replacement table.
#[derive(Default)]
pub struct VarReplacer {
    /// Representative literal per outer variable. The identity for unreplaced variables.
    table: Vec<Lit>,
    /// Internal equivalence clauses recorded in the proof, in outer literals.
    frat_clauses: Vec<(ClauseId, [Lit; 2])>,
    /// Number of replaced variables over the solver's lifetime.
    replaced_count: usize,
}

impl VarReplacer {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        for index in self.table.len()..count {
            self.table.push(Var::from_index(index).positive());
        }
    }

    /// Follow the replacement chain of an outer literal.
    pub fn replaced_with(&self, lit: Lit) -> Lit {
        let mut current = lit;
        loop {
            let entry = self.table[current.index()];
            let next = entry ^ current.is_negative();
            if next == current {
                return current;
            }
            current = next;
        }
    }

    /// Whether a variable maps onto itself.
    pub fn is_identity(&self, var: Var) -> bool {
        self.table[var.index()] == var.positive()
    }

    /// Number of replaced variables.
    pub fn replaced_count(&self) -> usize {
        self.replaced_count
    }

    /// All recorded equivalences as `(variable, representative)` binary xors, in outer literals.
    pub fn binary_xors(&self) -> Vec<(Lit, Lit)> {
        self.table
            .iter()
            .enumerate()
            .filter(|&(index, &entry)| entry != Var::from_index(index).positive())
            .map(|(index, &entry)| (Var::from_index(index).positive(), entry))
            .collect()
    }

    /// Raw table access for solution reconstruction serialization.
    pub fn table(&self) -> &[Lit] {
        &self.table
    }

    /// Replace the table from a solution reconstruction snapshot.
    pub fn restore_table(&mut self, table: Vec<Lit>) {
        self.replaced_count = table
            .iter()
            .enumerate()
            .filter(|&(index, &entry)| entry != Var::from_index(index).positive())
            .count();
        self.table = table;
    }
}

/// Collapse the given equivalence classes onto their representatives.
///
/// `pairs` contains `(replaced outer variable, outer representative literal)` entries. Rewrites
/// all attached constraints and returns the solver's `ok` flag.
pub fn perform_replacements<'a>(
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
        mut VarReplacerP,
        mut VsidsP,
        mut WatchlistsP,
        mut XorsP,
    ),
    pairs: &[(Var, Lit)],
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    if pairs.is_empty() {
        return ctx.part(SolverStateP).ok;
    }

    for &(var, rep) in pairs.iter() {
        debug_assert!(var != rep.var());

        {
            let replacer = ctx.part_mut(VarReplacerP);
            debug_assert!(replacer.is_identity(var));
            replacer.table[var.index()] = rep;
            replacer.replaced_count += 1;
        }

        ctx.part_mut(VariablesP).var_data_mut(var).removed = Removed::Replaced;

        // Record the equivalence in the proof as two internal binary clauses.
        let fwd = [var.negative(), rep];
        let bwd = [var.positive(), !rep];
        for &clause in [fwd, bwd].iter() {
            let id = proof::next_id(ctx.borrow());
            if ctx.part(ProofP).is_active() {
                proof::emit_add_outer(ctx.borrow(), id, &clause);
            }
            ctx.part_mut(VarReplacerP).frat_clauses.push((id, clause));
        }

        // The replaced variable no longer takes part in decisions.
        let inter = ctx.part(VariablesP).inter_from_outer(var);
        ctx.part_mut(VsidsP).remove_var(inter);

        // Align the level 0 values of both sides.
        let var_lit = {
            let variables = ctx.part(VariablesP);
            variables.inter_from_outer(var).positive()
        };
        let rep_lit = {
            let variables = ctx.part(VariablesP);
            variables.inter_from_outer_lit(rep)
        };
        let var_value = ctx.part(AssignmentP).lit_value(var_lit);
        let rep_value = ctx.part(AssignmentP).lit_value(rep_lit);
        match (var_value, rep_value) {
            (Some(value), None) => {
                enqueue_assignment(ctx.borrow(), rep_lit ^ !value, Reason::Unit);
            }
            (None, Some(value)) => {
                enqueue_assignment(ctx.borrow(), var_lit ^ !value, Reason::Unit);
            }
            (Some(a), Some(b)) if a != b => {
                let id = proof::next_id(ctx.borrow());
                proof::emit_add(ctx.borrow(), id, &[]);
                let state = ctx.part_mut(SolverStateP);
                state.ok = false;
                state.sat_state = SatState::Unsat;
                if state.unsat_id.is_none() {
                    state.unsat_id = Some(id);
                }
                return false;
            }
            _ => {}
        }
    }

    rewrite_constraints(ctx.borrow());

    admit::propagate_at_admission(ctx.borrow());

    ctx.part(SolverStateP).ok
}

/// Rewrite every attached constraint through the replacement table.
fn rewrite_constraints<'a>(
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
        mut XorsP,
        VarReplacerP,
    ),
) {
    // Long clauses.
    let crefs = db::collect_clauses(ctx.borrow());
    for cref in crefs {
        let (old_id, old_lits, changed) = {
            let variables = ctx.part(VariablesP);
            let replacer = ctx.part(VarReplacerP);
            let clause = ctx.part(ClauseAllocP).clause(cref);
            let old_lits: Vec<Lit> = clause.lits().to_vec();
            let changed = old_lits.iter().any(|&lit| {
                let outer = variables.outer_from_inter_lit(lit);
                !replacer.is_identity(outer.var())
            });
            (clause.header().id(), old_lits, changed)
        };

        if !changed {
            continue;
        }

        let red = ctx.part(ClauseAllocP).header(cref).redundant();
        let new_lits: Vec<Lit> = old_lits
            .iter()
            .map(|&lit| {
                let variables = ctx.part(VariablesP);
                let outer = variables.outer_from_inter_lit(lit);
                let replaced = ctx.part(VarReplacerP).replaced_with(outer);
                variables.inter_from_outer_lit(replaced)
            })
            .collect();

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
        if !ctx.part(SolverStateP).ok {
            return;
        }
    }

    // Binary clauses.
    let binaries = ctx.part(WatchlistsP).collect_binaries();
    for (lits, red, id) in binaries {
        let changed = {
            let variables = ctx.part(VariablesP);
            let replacer = ctx.part(VarReplacerP);
            lits.iter().any(|&lit| {
                let outer = variables.outer_from_inter_lit(lit);
                !replacer.is_identity(outer.var())
            })
        };
        if !changed {
            continue;
        }

        let new_lits: Vec<Lit> = lits
            .iter()
            .map(|&lit| {
                let variables = ctx.part(VariablesP);
                let outer = variables.outer_from_inter_lit(lit);
                let replaced = ctx.part(VarReplacerP).replaced_with(outer);
                variables.inter_from_outer_lit(replaced)
            })
            .collect();

        ctx.part_mut(WatchlistsP).remove_binary(lits, id);
        admit::add_clause_int(
            ctx.borrow(),
            &new_lits,
            red,
            ClauseSource::Rewrite {
                old_id: id,
                old_lits: &lits,
            },
        );
        if !ctx.part(SolverStateP).ok {
            return;
        }
    }

    // Parity constraints: fold the representative's sign into the right hand side.
    let replaced_vars: Vec<(Var, Lit)> = {
        let variables = ctx.part(VariablesP);
        let replacer = ctx.part(VarReplacerP);
        (0..variables.count())
            .filter_map(|index| {
                let outer = Var::from_index(index);
                if replacer.is_identity(outer) {
                    return None;
                }
                let inter = variables.inter_from_outer(outer);
                let rep_outer = replacer.replaced_with(outer.positive());
                let rep_inter = variables.inter_from_outer_lit(rep_outer);
                Some((inter, rep_inter))
            })
            .collect()
    };
    for &(var, rep) in replaced_vars.iter() {
        ctx.part_mut(XorsP).replace_var(var, rep);
    }

    // Threshold constraints.
    {
        let (bnns, ctx) = ctx.split_part_mut(BnnsP);
        let variables = ctx.part(VariablesP);
        let replacer = ctx.part(VarReplacerP);
        bnns.map_lits(|lit| {
            let outer = variables.outer_from_inter_lit(lit);
            let replaced = replacer.replaced_with(outer);
            variables.inter_from_outer_lit(replaced)
        });
    }
}

/// Emit proof deletions for the internal equivalence clauses at finalization.
pub fn delete_frat_cls<'a>(
    mut ctx: partial!(Context<'a>, mut ProofP<'a>, mut VarReplacerP),
) {
    let clauses = std::mem::replace(&mut ctx.part_mut(VarReplacerP).frat_clauses, vec![]);
    for (id, lits) in clauses.iter() {
        proof::emit_del_outer(ctx.borrow(), *id, lits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parisat_formula::{lits, vars};

    use crate::admit::add_clause_outside;

    #[test]
    fn replacement_rewrites_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        add_clause_outside(ctx.borrow(), &lits![1, 2, 3], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-2, 4], false).unwrap();

        // Replace x2 by ¬x1.
        let pairs = vec![(vars![2][0], lits![-1][0])];
        let ok = perform_replacements(ctx.borrow(), &pairs);
        assert!(ok);

        // The long clause (x1 ∨ x2 ∨ x3) became (x1 ∨ ¬x1 ∨ x3), a tautology, and was dropped.
        assert_eq!(ctx.part(ClauseDbP).count(), 0);

        // The binary (¬x2 ∨ x4) became (x1 ∨ x4).
        let variables = ctx.part(VariablesP);
        let replacer = ctx.part(VarReplacerP);
        assert!(!replacer.is_identity(vars![2][0]));
        assert_eq!(replacer.replaced_with(lits![2][0]), lits![-1][0]);
        assert_eq!(replacer.replaced_with(lits![-2][0]), lits![1][0]);
        let _ = variables;

        assert_eq!(ctx.part(WatchlistsP).binary_count(), 1);
        assert_eq!(ctx.part(VariablesP).var_data(vars![2][0]).removed, Removed::Replaced);
    }

    #[test]
    fn replacement_aligns_assigned_values() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        add_clause_outside(ctx.borrow(), &lits![1], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![2, 3], false).unwrap();

        // Replace x2 by x1; x1 is true so x2 must become true as well.
        let pairs = vec![(vars![2][0], lits![1][0])];
        let ok = perform_replacements(ctx.borrow(), &pairs);
        assert!(ok);

        let variables = ctx.part(VariablesP);
        let inter = variables.inter_from_outer(variables.outer_from_outside(vars![2][0]).unwrap());
        assert_eq!(ctx.part(AssignmentP).var_value(inter), Some(true));
    }
}
