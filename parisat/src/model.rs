//! Model reconstruction over the outer namespace.
//!
//! After the searcher reports sat, the assignment only covers the live inter variables. The
//! extender rebuilds a model over all outer variables: eliminated variables consult the
//! elimination stack in reverse order, replaced variables copy their representative, and
//! variables flagged during admission (tautology with opposite literals in an irredundant
//! clause) get an arbitrary value.
use partial_ref::{partial, PartialRef};

use parisat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::occ::ElimedClauses;

/// The reconstructed model.
#[derive(Default)]
pub struct Model {
    /// Value per outer variable.
    ///
    /// Whenever the solver state is sat this is fully populated for non-BVA variables.
    assignment: Vec<Option<bool>>,
}

impl Model {
    /// Value per outer variable. Only valid if the solver state is sat.
    pub fn assignment(&self) -> &[Option<bool>] {
        &self.assignment
    }

    /// Whether an outer literal is true in the model.
    pub fn lit_is_true(&self, outer_lit: Lit) -> bool {
        self.assignment[outer_lit.index()] == Some(outer_lit.is_positive())
    }

    /// Value of an outer variable.
    pub fn var_value(&self, outer: Var) -> Option<bool> {
        self.assignment.get(outer.index()).cloned().flatten()
    }
}

/// Rebuild the model over all outer variables from the inter assignment.
pub fn reconstruct<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ModelP,
        AssignmentP,
        OccP,
        VariablesP,
        VarReplacerP,
    ),
    only_sampling_solution: bool,
) {
    let (model, ctx) = ctx.split_part_mut(ModelP);
    let variables = ctx.part(VariablesP);
    let assignment = ctx.part(AssignmentP);

    model.assignment.clear();
    model.assignment.resize(variables.count(), None);

    // Values of the live variables, translated from inter to outer positions.
    for index in 0..variables.count() {
        let inter = Var::from_index(index);
        let outer = variables.outer_from_inter(inter);
        model.assignment[outer.index()] = assignment.var_value(inter);
    }

    if only_sampling_solution {
        // Only the replacement equivalences are propagated; eliminated variables stay unset.
        extend_replacements(model, ctx.part(VarReplacerP).table());
        return;
    }

    extend_full(
        model,
        ctx.part(OccP).elim_stack(),
        ctx.part(VarReplacerP).table(),
        variables,
    );
}

/// Extend a model in place over the eliminated, replaced and must-set variables.
fn extend_full(
    model: &mut Model,
    elim_stack: &[ElimedClauses],
    replacer_table: &[Lit],
    variables: &crate::variables::Variables,
) {
    // Eliminated variables, most recently eliminated first. Each variable picks the polarity
    // that satisfies all of its stored clauses. A value provided by the caller wins.
    for entry in elim_stack.iter().rev() {
        if model.assignment[entry.var.index()].is_none() {
            let value = elimed_var_value(model, entry);
            model.assignment[entry.var.index()] = Some(value);
        }
    }

    extend_replacements(model, replacer_table);

    // Variables whose clauses vanished as opposite-literal tautologies still need a value.
    for index in 0..model.assignment.len() {
        let outer = Var::from_index(index);
        if variables.is_must_set(outer) && model.assignment[index].is_none() {
            model.assignment[index] = Some(false);
        }
    }
}

/// The polarity an eliminated variable needs to satisfy its stored clauses.
fn elimed_var_value(model: &Model, entry: &ElimedClauses) -> bool {
    for clause in entry.clauses.iter() {
        let mut own_polarity = None;
        let mut satisfied = false;

        for &lit in clause.iter() {
            if lit.var() == entry.var {
                own_polarity = Some(lit.is_positive());
            } else if model.assignment[lit.index()] == Some(lit.is_positive()) {
                satisfied = true;
                break;
            }
        }

        if !satisfied {
            // The variable itself must satisfy this clause.
            if let Some(polarity) = own_polarity {
                return polarity;
            }
        }
    }
    false
}

/// Copy representative values onto the replaced class members.
fn extend_replacements(model: &mut Model, replacer_table: &[Lit]) {
    // Chains always end at an unreplaced representative, so one pass per chain link suffices
    // when walking to the chain's end.
    for index in 0..replacer_table.len() {
        let entry = replacer_table[index];
        if entry == Var::from_index(index).positive() {
            continue;
        }

        let mut rep = entry;
        loop {
            let next = replacer_table[rep.index()] ^ rep.is_negative();
            if next == rep {
                break;
            }
            rep = next;
        }

        if let Some(value) = model.assignment[rep.index()] {
            model.assignment[index] = Some(value ^ rep.is_negative());
        }
    }
}

/// Extend a partial model over the solution reconstruction data.
///
/// The input maps outside variables to values; the result assigns every outside variable that
/// the stored reconstruction state can derive. This is the read-only counterpart of
/// [`reconstruct`] used by the snapshot interface.
pub fn extend_minimized_model<'a>(
    mut ctx: partial!(
        Context<'a>,
        OccP,
        VariablesP,
        VarReplacerP,
    ),
    minimized: &[Lit],
) -> Vec<Lit> {
    let variables = ctx.part(VariablesP);

    let mut model = Model {
        assignment: vec![None; variables.count()],
    };

    for &outside in minimized.iter() {
        if let Some(outer) = variables.outer_from_outside_lit(outside) {
            model.assignment[outer.index()] = Some(outer.is_positive());
        }
    }

    extend_full(
        &mut model,
        ctx.part(OccP).elim_stack(),
        ctx.part(VarReplacerP).table(),
        variables,
    );

    let mut result = vec![];
    for index in 0..model.assignment.len() {
        let outer = Var::from_index(index);
        if let Some(value) = model.assignment[index] {
            if let Some(outside) = variables.outside_from_outer(outer) {
                result.push(outside.lit(value));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eliminated_vars_satisfy_their_clauses() {
        let mut model = Model {
            assignment: vec![None, Some(false), Some(false)],
        };

        // x0 was eliminated with clauses (x0 ∨ x1) and (¬x0 ∨ x2): with x1 and x2 false the
        // first clause forces x0 true... but then the second is violated unless x2 holds.
        // The stack stores resolvent-complete sets, so the first unsatisfied clause decides.
        let entry = ElimedClauses {
            var: Var::from_index(0),
            clauses: vec![
                vec![Var::from_index(0).positive(), Var::from_index(1).positive()],
                vec![Var::from_index(0).negative(), Var::from_index(2).positive()],
            ],
        };

        // With x1 false, (x0 ∨ x1) forces x0 true.
        let value = elimed_var_value(&model, &entry);
        assert!(value);

        // With x1 true the clause is satisfied and the second clause decides x0 false.
        model.assignment[1] = Some(true);
        let value = elimed_var_value(&model, &entry);
        assert!(!value);
    }

    #[test]
    fn replacement_chain_values_compose() {
        // x1 ↦ ¬x0, x2 ↦ x1 (so x2 = ¬x0 as well).
        let table = vec![
            Var::from_index(0).positive(),
            Var::from_index(0).negative(),
            Var::from_index(1).positive(),
        ];

        let mut model = Model {
            assignment: vec![Some(true), None, None],
        };

        extend_replacements(&mut model, &table);

        assert_eq!(model.assignment[1], Some(false));
        assert_eq!(model.assignment[2], Some(false));
    }
}
