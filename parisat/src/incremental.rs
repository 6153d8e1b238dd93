//! Assumption handling for incremental solving.
use partial_ref::{partial, PartialRef};

use parisat_formula::Lit;

use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, Reason};

/// Assumption state of the current solve call.
#[derive(Default)]
pub struct Incremental {
    /// Assumptions in the inter namespace, enqueued one decision level each.
    assumptions: Vec<Lit>,
    /// Assumptions in the outer namespace, kept for conflict translation.
    outer_assumptions: Vec<Lit>,
    /// Subset of the assumptions that made the formula unsatisfiable, in inter literals.
    failed_core: Vec<Lit>,
    /// Number of decision levels currently used for assumptions.
    assumption_levels: usize,
}

impl Incremental {
    /// Current number of decision levels used for assumptions.
    pub fn assumption_levels(&self) -> usize {
        self.assumption_levels
    }

    /// Resets assumption levels to zero on a full restart.
    pub fn full_restart(&mut self) {
        self.assumption_levels = 0;
    }

    /// Current assumptions in inter literals.
    pub fn assumptions(&self) -> &[Lit] {
        &self.assumptions
    }

    /// Current assumptions in outer literals.
    pub fn outer_assumptions(&self) -> &[Lit] {
        &self.outer_assumptions
    }

    /// Subset of the assumptions that made the formula unsatisfiable.
    pub fn failed_core(&self) -> &[Lit] {
        &self.failed_core
    }

    /// Replace the current assumption set.
    pub fn set_assumptions(&mut self, inter: Vec<Lit>, outer: Vec<Lit>) {
        self.assumptions = inter;
        self.outer_assumptions = outer;
        self.failed_core.clear();
        self.assumption_levels = 0;
    }

    /// Lower the assumption level count after backjumping below the assumptions.
    pub fn set_assumption_levels(&mut self, levels: usize) {
        self.assumption_levels = levels;
    }

    /// Remap the inter literals, used by the renumberer.
    pub fn map_inter_lits(&mut self, map: impl Fn(Lit) -> Lit) {
        for lit in self.assumptions.iter_mut() {
            *lit = map(*lit);
        }
        for lit in self.failed_core.iter_mut() {
            *lit = map(*lit);
        }
    }

    /// Forget all assumptions.
    pub fn clear(&mut self) {
        self.assumptions.clear();
        self.outer_assumptions.clear();
        self.failed_core.clear();
        self.assumption_levels = 0;
    }
}

/// Return type of [`enqueue_assumption`].
pub enum EnqueueAssumption {
    Done,
    Enqueued,
    Conflict,
}

/// Enqueue another assumption if possible.
///
/// Returns whether an assumption was enqueued, whether no assumptions are left or whether the
/// assumptions result in a conflict.
pub fn enqueue_assumption<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ProofP<'a>,
        mut TmpDataP,
        mut TrailP,
        ClauseAllocP,
        VariablesP,
    ),
) -> EnqueueAssumption {
    while let Some(&assumption) = ctx
        .part(IncrementalP)
        .assumptions
        .get(ctx.part(TrailP).current_level())
    {
        match ctx.part(AssignmentP).lit_value(assumption) {
            Some(false) => {
                analyze_assumption_conflict(ctx.borrow(), assumption);
                return EnqueueAssumption::Conflict;
            }
            Some(true) => {
                // The next assumption is already implied by the others, skip its level.
                let level = ctx.part(TrailP).current_level();
                let incremental = ctx.part_mut(IncrementalP);
                incremental.assumptions.swap_remove(level);
            }
            None => {
                ctx.part_mut(TrailP).new_decision_level();
                enqueue_assignment(ctx.borrow(), assumption, Reason::Unit);
                let (incremental, ctx) = ctx.split_part_mut(IncrementalP);
                incremental.assumption_levels = ctx.part(TrailP).current_level();
                return EnqueueAssumption::Enqueued;
            }
        }
    }
    EnqueueAssumption::Done
}

/// Analyze a conflicting set of assumptions.
///
/// Computes a set of incompatible assumptions given an assumption that is incompatible with the
/// assumptions enqueued so far.
fn analyze_assumption_conflict<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut IncrementalP,
        mut TmpDataP,
        ClauseAllocP,
        ImplGraphP,
        TrailP,
    ),
    assumption: Lit,
) {
    let (incremental, mut ctx) = ctx.split_part_mut(IncrementalP);
    let (tmp, mut ctx) = ctx.split_part_mut(TmpDataP);

    let flags = &mut tmp.flags;

    incremental.failed_core.clear();
    incremental.failed_core.push(assumption);

    flags[assumption.index() * 2] = true;
    let mut flag_count = 1;

    let (impl_graph, mut ctx) = ctx.split_part(ImplGraphP);
    let (alloc, ctx) = ctx.split_part(ClauseAllocP);

    for &lit in ctx.part(TrailP).trail().iter().rev() {
        if !flags[lit.index() * 2] {
            continue;
        }
        flags[lit.index() * 2] = false;
        flag_count -= 1;

        match impl_graph.reason(lit.var()) {
            Reason::Unit => {
                if impl_graph.level(lit.var()) > 0 {
                    incremental.failed_core.push(lit);
                }
            }
            reason => {
                for &reason_lit in reason.lits(alloc) {
                    if !flags[reason_lit.index() * 2] {
                        flags[reason_lit.index() * 2] = true;
                        flag_count += 1;
                    }
                }
            }
        }

        if flag_count == 0 {
            break;
        }
    }

    // Reset any flags that remain when the trail walk ended early.
    for &lit in incremental.failed_core.iter() {
        flags[lit.index() * 2] = false;
    }
    for flag in flags.iter_mut() {
        *flag = false;
    }
}
