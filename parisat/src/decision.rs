//! Decision heuristics.
use partial_ref::{partial, PartialRef};

use parisat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, Reason};
use crate::variables::data::Removed;

pub mod vsids;

pub use vsids::Vsids;

/// Make a decision and enqueue it.
///
/// Branches on the unassigned active variable with the highest activity, using the saved phase
/// as polarity. Returns `false` if no decision was made because all active variables are
/// assigned.
pub fn make_decision<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut TrailP,
        mut VsidsP,
        SearcherP,
        VariablesP,
    ),
) -> bool {
    let decision_var = loop {
        match ctx.part_mut(VsidsP).pop() {
            None => return false,
            Some(var) => {
                if ctx.part(AssignmentP).var_value(var).is_some() {
                    continue;
                }
                let variables = ctx.part(VariablesP);
                let outer = variables.outer_from_inter(var);
                if variables.var_data(outer).removed != Removed::None {
                    continue;
                }
                break var;
            }
        }
    };

    let polarity = ctx.part(SearcherP).saved_phase(decision_var);
    let decision = Lit::from_var(decision_var, !polarity);

    ctx.part_mut(TrailP).new_decision_level();
    enqueue_assignment(ctx.borrow(), decision, Reason::Unit);

    true
}

/// Re-insert an unassigned variable into the decision heap.
pub fn make_available<'a>(mut ctx: partial!(Context<'a>, mut VsidsP), var: Var) {
    ctx.part_mut(VsidsP).make_available(var);
}

/// Rebuild the decision heap from scratch.
///
/// Used after renumbering invalidated the heap's variable indices.
pub fn rebuild_heap<'a>(
    mut ctx: partial!(Context<'a>, mut VsidsP, AssignmentP, VariablesP),
) {
    let (vsids, ctx) = ctx.split_part_mut(VsidsP);
    let variables = ctx.part(VariablesP);
    let assignment = ctx.part(AssignmentP);

    vsids.clear_heap();
    for index in 0..variables.count() {
        let var = Var::from_index(index);
        let outer = variables.outer_from_inter(var);
        if variables.var_data(outer).removed == Removed::None
            && assignment.var_value(var).is_none()
        {
            vsids.make_available(var);
        }
    }
}
