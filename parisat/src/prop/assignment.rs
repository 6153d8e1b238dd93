//! Assignment, trail and backtracking.
use partial_ref::{partial, PartialRef};

use parisat_formula::lit::LitIdx;
use parisat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::proof;

use super::Reason;

/// Current partial assignment.
#[derive(Default)]
pub struct Assignment {
    values: Vec<Option<bool>>,
}

impl Assignment {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.values.resize(count, None);
    }

    /// Value per variable.
    pub fn assignment(&self) -> &[Option<bool>] {
        &self.values
    }

    /// Value of a variable.
    pub fn var_value(&self, var: Var) -> Option<bool> {
        self.values[var.index()]
    }

    /// Value of a literal.
    pub fn lit_value(&self, lit: Lit) -> Option<bool> {
        self.values[lit.index()].map(|b| b ^ lit.is_negative())
    }

    pub fn lit_is_true(&self, lit: Lit) -> bool {
        self.values[lit.index()] == Some(lit.is_positive())
    }

    pub fn lit_is_false(&self, lit: Lit) -> bool {
        self.values[lit.index()] == Some(lit.is_negative())
    }

    pub fn lit_is_unk(&self, lit: Lit) -> bool {
        self.values[lit.index()].is_none()
    }

    pub fn assign_lit(&mut self, lit: Lit) {
        self.values[lit.index()] = lit.is_positive().into()
    }

    pub fn unassign_var(&mut self, var: Var) {
        self.values[var.index()] = None;
    }

    /// Permute the values through an inter variable mapping.
    pub fn map_vars(&mut self, map: impl Fn(usize) -> usize) {
        let mut new_values = self.values.clone();
        for (index, &value) in self.values.iter().enumerate() {
            new_values[map(index)] = value;
        }
        self.values = new_values;
    }
}

/// Decision and propagation history.
#[derive(Default)]
pub struct Trail {
    /// Stack of all propagated and all enqueued assignments.
    trail: Vec<Lit>,
    /// Next assignment in trail to propagate.
    queue_head_pos: usize,
    /// Decision levels as trail indices.
    decisions: Vec<LitIdx>,
}

impl Trail {
    /// Return the next assigned literal to propagate and advance the queue.
    pub fn pop_queue(&mut self) -> Option<Lit> {
        let lit = self.trail.get(self.queue_head_pos).cloned();
        if lit.is_some() {
            self.queue_head_pos += 1;
        }
        lit
    }

    /// Whether all enqueued assignments are propagated.
    pub fn fully_propagated(&self) -> bool {
        self.queue_head_pos == self.trail.len()
    }

    /// Assigned literals in assignment order.
    pub fn trail(&self) -> &[Lit] {
        &self.trail
    }

    /// Current decision level.
    pub fn current_level(&self) -> usize {
        self.decisions.len()
    }

    /// Start a new decision level.
    pub fn new_decision_level(&mut self) {
        self.decisions.push(self.trail.len() as LitIdx)
    }

    /// Number of assignments at decision level 0.
    pub fn top_level_len(&self) -> usize {
        match self.decisions.first() {
            Some(&len) => len as usize,
            None => self.trail.len(),
        }
    }

    /// The assignments at decision level 0.
    pub fn top_level_trail(&self) -> &[Lit] {
        &self.trail[..self.top_level_len()]
    }

    pub(crate) fn push_lit(&mut self, lit: Lit) {
        self.trail.push(lit);
    }

    /// Remap the trail's literals, used by the renumberer.
    pub fn map_lits(&mut self, map: impl Fn(Lit) -> Lit) {
        for lit in self.trail.iter_mut() {
            *lit = map(*lit);
        }
    }
}

/// Enqueues the assignment of true to a literal.
///
/// This updates the assignment and trail, but does not perform any propagation. The literal has
/// to be unassigned when calling this.
///
/// At decision level 0 this also allocates a unit clause proof ID for the variable unless it
/// already has one.
pub fn enqueue_assignment<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut TrailP,
        VariablesP,
    ),
    lit: Lit,
    reason: Reason,
) {
    let assignment = ctx.part_mut(AssignmentP);
    debug_assert!(assignment.lit_value(lit) == None);

    assignment.assign_lit(lit);

    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    trail.push_lit(lit);

    let level = trail.current_level();

    {
        let node = &mut ctx.part_mut(ImplGraphP).nodes[lit.index()];
        node.reason = reason;
        node.level = level as LitIdx;
    }

    if level == 0 {
        proof::emit_unit(ctx.borrow(), lit);
    }
}

/// Undo all assignments above the given decision level.
///
/// The polarity of unassigned variables is saved for phase saving, and the variables return to
/// the decision heap.
pub fn backtrack<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut SearcherP,
        mut TrailP,
        mut VsidsP,
    ),
    level: usize,
) {
    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    if level >= trail.decisions.len() {
        return;
    }

    let new_len = trail.decisions[level] as usize;
    trail.decisions.truncate(level);

    let (searcher, mut ctx) = ctx.split_part_mut(SearcherP);
    let (vsids, mut ctx) = ctx.split_part_mut(VsidsP);
    let assignment = ctx.part_mut(AssignmentP);

    for &lit in trail.trail[new_len..].iter() {
        searcher.save_phase(lit.var(), lit.is_positive());
        assignment.unassign_var(lit.var());
        vsids.make_available(lit.var());
    }

    trail.trail.truncate(new_len);
    trail.queue_head_pos = trail.queue_head_pos.min(new_len);
}

/// Undo all assignments above the current assumptions.
pub fn restart<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut SearcherP,
        mut TrailP,
        mut VsidsP,
        IncrementalP,
    ),
) {
    let level = ctx.part(IncrementalP).assumption_levels();
    backtrack(ctx.borrow(), level);
}

/// Undo all assignments above decision level 0, including assumptions.
pub fn full_restart<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut IncrementalP,
        mut SearcherP,
        mut TrailP,
        mut VsidsP,
    ),
) {
    ctx.part_mut(IncrementalP).full_restart();
    backtrack(ctx.borrow(), 0);
}
