//! Miscellaneous solver state.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parisat_internal_proof::ClauseId;

/// Satisfiability state.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SatState {
    Unknown,
    Sat,
    Unsat,
    UnsatUnderAssumptions,
}

impl Default for SatState {
    fn default() -> SatState {
        SatState::Unknown
    }
}

/// Miscellaneous solver state.
///
/// Anything larger or any larger group of related state variables should be moved into a separate
/// part of [`Context`](crate::context::Context).
pub struct SolverState {
    pub sat_state: SatState,
    /// False once a contradiction was derived at level 0.
    ///
    /// All admission and solve calls short-circuit to unsat when this is false.
    pub ok: bool,
    /// Proof ID of the empty clause when unsat was derived.
    pub unsat_id: Option<ClauseId>,
    /// Set once blocked clause elimination removed clauses.
    ///
    /// Adding clauses afterwards is a caller contract violation.
    pub clauses_blocked: bool,
    /// Number of solve calls so far.
    pub solve_count: u64,
    /// Number of simplification passes over the solver's lifetime.
    pub simplify_count: u64,
    /// Number of simplification passes during the current solve call.
    pub simplify_count_this_solve: u64,
    /// Whether the core tier glue cutoff was already lowered.
    pub adjusted_glue_cutoff: bool,
    /// Wall clock reference for the time budget, reset at the start of each solve call.
    pub solve_started: Instant,
    /// Cooperative interruption flag, polled at phase boundaries.
    interrupt: Arc<AtomicBool>,
}

impl Default for SolverState {
    fn default() -> SolverState {
        SolverState {
            sat_state: SatState::Unknown,
            ok: true,
            unsat_id: None,
            clauses_blocked: false,
            solve_count: 0,
            simplify_count: 0,
            simplify_count_this_solve: 0,
            adjusted_glue_cutoff: false,
            solve_started: Instant::now(),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SolverState {
    /// Handle that can be used to interrupt the solver from another thread.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// Request the solver to return at the next phase boundary.
    ///
    /// Setting the flag is idempotent.
    pub fn interrupt_asap(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    /// Whether an interruption was requested.
    pub fn must_interrupt(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    /// Clear the interruption flag.
    pub fn clear_interrupt(&self) {
        self.interrupt.store(false, Ordering::Relaxed);
    }
}
