//! The boolean satisfiability solver.
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use failure::Fail;

use partial_ref::{IntoPartialRefMut, PartialRef};

use serde::{Deserialize, Serialize};

use parisat_formula::{CnfFormula, ExtendFormula, Lit, Var};

use crate::admit;
use crate::config::SolverConfig;
use crate::context::{parts::*, Context};
use crate::datasync::SharedData;
use crate::model;
use crate::occ::{self, ElimedClauses, IteGate, OrGate};
use crate::outer;
use crate::prop::{backtrack, enqueue_assignment, propagate, Reason};
use crate::state::SatState;
use crate::variables::data::VarData;
use crate::variables::var_map::{VarBiMap, VarPerm};

/// Errors returned by the solver's public interface.
///
/// Contract violations that indicate a caller bug (unknown strategy tokens, adding clauses
/// after blocked clause elimination) abort with a diagnostic instead.
#[derive(Debug, Fail)]
pub enum SolverError {
    #[fail(display = "constraint of length {} exceeds the supported size", len)]
    TooLongClause { len: usize },
}

/// A boolean satisfiability solver with XOR and threshold constraint support.
#[derive(Default)]
pub struct Solver<'a> {
    ctx: Box<Context<'a>>,
    clause_query: Option<ClauseQuery>,
}

/// Snapshot state of a streaming clause export.
struct ClauseQuery {
    clauses: Vec<Vec<Lit>>,
    position: usize,
}

/// Serialized state needed to extend models in a fresh solver.
#[derive(Serialize, Deserialize)]
struct SolutionReconstructionData {
    ok: bool,
    outer_from_outside: VarBiMap,
    perm: VarPerm,
    var_data: Vec<VarData>,
    must_set: Vec<bool>,
    bva_count: usize,
    replacer_table: Vec<Lit>,
    elim_stack: Vec<ElimedClauses>,
}

impl<'a> Solver<'a> {
    /// Create a new solver.
    pub fn new() -> Solver<'a> {
        Solver::default()
    }

    /// Create a new solver with the given configuration.
    pub fn with_config(config: SolverConfig) -> Solver<'a> {
        let mut solver = Solver::default();
        solver.ctx.config = config;
        solver
    }

    /// Mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut SolverConfig {
        &mut self.ctx.config
    }

    /// Number of variables visible to the caller.
    pub fn num_vars(&self) -> usize {
        self.ctx.variables.outside_count()
    }

    /// Whether no contradiction was derived at level 0 yet.
    pub fn okay(&self) -> bool {
        self.ctx.solver_state.ok
    }

    /// Extend the variable space by one variable.
    pub fn new_var(&mut self) -> Var {
        let mut ctx = self.ctx.into_partial_ref_mut();
        crate::variables::new_outside_var(ctx.borrow())
    }

    /// Extend the variable space by `count` variables.
    pub fn new_vars(&mut self, count: usize) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        for _ in 0..count {
            crate::variables::new_outside_var(ctx.borrow());
        }
    }

    /// Add a clause over outside literals.
    pub fn add_clause(&mut self, lits: &[Lit]) -> Result<bool, SolverError> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        admit::add_clause_outside(ctx.borrow(), lits, false)
    }

    /// Add a redundant clause over outside literals.
    ///
    /// Redundant clauses may be deleted again without affecting satisfiability.
    pub fn add_red_clause(&mut self, lits: &[Lit]) -> Result<bool, SolverError> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        admit::add_clause_outside(ctx.borrow(), lits, true)
    }

    /// Add a whole formula.
    pub fn add_formula(&mut self, formula: &CnfFormula) {
        self.new_vars(formula.var_count().saturating_sub(self.num_vars()));
        for clause in formula.iter() {
            self.add_clause(clause).expect("formula clause too long");
        }
    }

    /// Add a parity constraint over outside variables.
    pub fn add_xor_clause(&mut self, vars: &[Var], rhs: bool) -> Result<bool, SolverError> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        admit::add_xor_clause_outside(ctx.borrow(), vars, rhs)
    }

    /// Add a threshold constraint over outside literals.
    ///
    /// With `out` given the constraint is reified: `out ↔ (Σ lits ≥ cutoff)`. Without it the
    /// threshold is asserted.
    pub fn add_bnn_clause(
        &mut self,
        lits: &[Lit],
        cutoff: u64,
        out: Option<Lit>,
    ) -> Result<bool, SolverError> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        admit::add_bnn_clause_outside(ctx.borrow(), lits, cutoff, out)
    }

    /// Check the satisfiability of the current formula.
    ///
    /// Returns `Some(true)` on sat, `Some(false)` on unsat and `None` when a budget ran out or
    /// the solver was interrupted.
    pub fn solve(&mut self) -> Option<bool> {
        self.solve_with_assumptions(&[], false)
    }

    /// Check satisfiability under the given assumptions.
    ///
    /// The assumptions hold for this call only. With `only_sampling_solution` the model is only
    /// extended over the replacement equivalences, skipping eliminated variables.
    pub fn solve_with_assumptions(
        &mut self,
        assumptions: &[Lit],
        only_sampling_solution: bool,
    ) -> Option<bool> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        outer::solve_with_assumptions(ctx.borrow(), assumptions, only_sampling_solution)
            .expect("assumption literal out of supported range")
    }

    /// Run one inprocessing pass without searching.
    ///
    /// Uses the configured non-startup schedule unless `strategy` overrides it.
    pub fn simplify(&mut self, strategy: Option<&str>) -> Option<bool> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        match outer::simplify_outside(ctx.borrow(), strategy) {
            Ok(Some(false)) => Some(false),
            Ok(_) => None,
            Err(_) => None,
        }
    }

    /// The satisfying assignment over outside literals, after sat.
    pub fn model(&self) -> Option<Vec<Lit>> {
        if self.ctx.solver_state.sat_state != SatState::Sat {
            return None;
        }

        let variables = &self.ctx.variables;
        let model = &self.ctx.model;

        let mut result = vec![];
        for index in 0..variables.count() {
            let outer = Var::from_index(index);
            let outside = match variables.outside_from_outer(outer) {
                Some(outside) => outside,
                None => continue,
            };
            if let Some(value) = model.var_value(outer) {
                result.push(outside.lit(value));
            }
        }
        result.sort_unstable();
        Some(result)
    }

    /// The conflict clause over the assumptions, after unsat under assumptions.
    ///
    /// Contains the negations of an incompatible subset of the assumptions. Not guaranteed to
    /// be minimal.
    pub fn get_conflict(&self) -> Vec<Lit> {
        if self.ctx.solver_state.sat_state != SatState::UnsatUnderAssumptions {
            return vec![];
        }

        let variables = &self.ctx.variables;
        self.ctx
            .incremental
            .failed_core()
            .iter()
            .filter_map(|&inter| {
                let outer = variables.outer_from_inter_lit(inter);
                variables.outside_from_outer_lit(outer).map(|lit| !lit)
            })
            .collect()
    }

    /// Literals implied by unit propagation under the given assumptions.
    ///
    /// The propagation is undone before returning. `None` when the assumptions are conflicting.
    pub fn implied_by(&mut self, lits: &[Lit]) -> Option<Vec<Lit>> {
        let mut ctx = self.ctx.into_partial_ref_mut();

        if !ctx.part(SolverStateP).ok {
            return None;
        }

        let mut inter_lits = lits.to_vec();
        match admit::add_clause_helper(ctx.borrow(), &mut inter_lits) {
            Ok(true) => {}
            _ => return None,
        }

        ctx.part_mut(TrailP).new_decision_level();
        let trail_start = ctx.part(TrailP).trail().len();

        let mut conflicted = false;
        for &lit in inter_lits.iter() {
            match ctx.part(AssignmentP).lit_value(lit) {
                Some(true) => continue,
                Some(false) => {
                    conflicted = true;
                    break;
                }
                None => {
                    enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
                    if propagate(ctx.borrow()).is_err() {
                        conflicted = true;
                        break;
                    }
                }
            }
        }

        let result = if conflicted {
            None
        } else {
            let variables = ctx.part(VariablesP);
            Some(
                ctx.part(TrailP).trail()[trail_start..]
                    .iter()
                    .filter_map(|&lit| {
                        let outer = variables.outer_from_inter_lit(lit);
                        variables.outside_from_outer_lit(outer)
                    })
                    .collect(),
            )
        };

        backtrack(ctx.borrow(), 0);

        result
    }

    /// Distillation-style one-shot minimization of a clause.
    ///
    /// Returns a subset of the input that is equivalent under the current formula.
    pub fn minimize_clause(&mut self, lits: &[Lit]) -> Vec<Lit> {
        let mut ctx = self.ctx.into_partial_ref_mut();

        if !ctx.part(SolverStateP).ok {
            return lits.to_vec();
        }

        let mut inter_lits = lits.to_vec();
        match admit::add_clause_helper(ctx.borrow(), &mut inter_lits) {
            Ok(true) => {}
            _ => return lits.to_vec(),
        }

        ctx.part_mut(TrailP).new_decision_level();

        let mut kept = vec![];
        for &lit in inter_lits.iter() {
            match ctx.part(AssignmentP).lit_value(lit) {
                Some(false) => continue,
                Some(true) => {
                    kept.push(lit);
                    break;
                }
                None => {
                    kept.push(lit);
                    enqueue_assignment(ctx.borrow(), !lit, Reason::Unit);
                    if propagate(ctx.borrow()).is_err() {
                        break;
                    }
                }
            }
        }

        backtrack(ctx.borrow(), 0);

        let variables = ctx.part(VariablesP);
        kept.iter()
            .filter_map(|&lit| {
                let outer = variables.outer_from_inter_lit(lit);
                variables.outside_from_outer_lit(outer)
            })
            .collect()
    }

    /// All literals assigned at decision level 0, in outside literals.
    pub fn get_zero_assigned_lits(&self) -> Vec<Lit> {
        let variables = &self.ctx.variables;
        let replacer = &self.ctx.var_replacer;
        let assignment = &self.ctx.assignment;

        let mut result = vec![];

        for &lit in self.ctx.trail.top_level_trail().iter() {
            let outer = variables.outer_from_inter_lit(lit);
            if let Some(outside) = variables.outside_from_outer_lit(outer) {
                result.push(outside);
            }
        }

        // Replaced variables inherit their representative's level 0 value.
        for (member, rep) in replacer.binary_xors() {
            let rep_inter = variables.inter_from_outer_lit(rep);
            if let Some(value) = assignment.lit_value(rep_inter) {
                if let Some(outside) = variables.outside_from_outer_lit(member) {
                    result.push(outside ^ !value);
                }
            }
        }

        result.sort_unstable();
        result.dedup();
        result
    }

    /// All variable equivalences as binary xors, in outside literals.
    pub fn get_all_binary_xors(&self) -> Vec<(Lit, Lit)> {
        let variables = &self.ctx.variables;
        self.ctx
            .var_replacer
            .binary_xors()
            .into_iter()
            .filter_map(|(member, rep)| {
                let member = variables.outside_from_outer_lit(member)?;
                let rep = variables.outside_from_outer_lit(rep)?;
                Some((member, rep))
            })
            .collect()
    }

    /// The stored parity constraints whose variables all have outside names.
    pub fn get_recovered_xors(&self) -> Vec<(Vec<Var>, bool)> {
        let variables = &self.ctx.variables;
        self.ctx
            .xors
            .xors()
            .iter()
            .filter_map(|xor| {
                let vars: Option<Vec<Var>> = xor
                    .vars
                    .iter()
                    .map(|&inter| {
                        let outer = variables.outer_from_inter(inter);
                        variables.outside_from_outer(outer)
                    })
                    .collect();
                Some((vars?, xor.rhs))
            })
            .collect()
    }

    /// OR gates recovered from the clause database, in outside literals.
    pub fn get_recovered_or_gates(&mut self) -> Vec<OrGate> {
        let gates = {
            let mut ctx = self.ctx.into_partial_ref_mut();
            occ::find_or_gates(ctx.borrow())
        };
        let variables = &self.ctx.variables;
        gates
            .into_iter()
            .filter_map(|gate| {
                let map = |lit: Lit| {
                    let outer = variables.outer_from_inter_lit(lit);
                    variables.outside_from_outer_lit(outer)
                };
                Some(OrGate {
                    out: map(gate.out)?,
                    ins: [map(gate.ins[0])?, map(gate.ins[1])?],
                })
            })
            .collect()
    }

    /// If-then-else gates recovered from the clause database, in outside literals.
    pub fn get_recovered_ite_gates(&mut self) -> Vec<IteGate> {
        let gates = {
            let mut ctx = self.ctx.into_partial_ref_mut();
            occ::find_ite_gates(ctx.borrow())
        };
        let variables = &self.ctx.variables;
        gates
            .into_iter()
            .filter_map(|gate| {
                let map = |lit: Lit| {
                    let outer = variables.outer_from_inter_lit(lit);
                    variables.outside_from_outer_lit(outer)
                };
                Some(IteGate {
                    out: map(gate.out)?,
                    cond: map(gate.cond)?,
                    then_lit: map(gate.then_lit)?,
                    else_lit: map(gate.else_lit)?,
                })
            })
            .collect()
    }

    /// Begin a streaming export of the current clauses.
    ///
    /// Clauses longer than `max_len` and redundant clauses above `max_glue` are skipped, as are
    /// clauses mentioning solver-internal variables.
    pub fn start_getting_small_clauses(&mut self, max_len: usize, max_glue: u32, red: bool) {
        assert!(
            self.clause_query.is_none(),
            "a clause export is already running"
        );

        let mut clauses = vec![];

        {
            let variables = &self.ctx.variables;
            let map_clause = |lits: &[Lit]| -> Option<Vec<Lit>> {
                lits.iter()
                    .map(|&lit| {
                        let outer = variables.outer_from_inter_lit(lit);
                        variables.outside_from_outer_lit(outer)
                    })
                    .collect()
            };

            // Units.
            for &lit in self.ctx.trail.top_level_trail().iter() {
                if let Some(clause) = map_clause(&[lit]) {
                    clauses.push(clause);
                }
            }

            // Binaries.
            for (lits, bin_red, _) in self.ctx.watchlists.collect_binaries() {
                if bin_red && !red {
                    continue;
                }
                if 2 <= max_len {
                    if let Some(clause) = map_clause(&lits) {
                        clauses.push(clause);
                    }
                }
            }

            // Long clauses.
            let alloc = &self.ctx.clause_alloc;
            for cref in crate::clause::db::clauses_iter(&self.ctx.clause_db, alloc) {
                let header = alloc.header(cref);
                if header.len() > max_len {
                    continue;
                }
                if header.redundant() && (!red || header.glue() > max_glue) {
                    continue;
                }
                if let Some(clause) = map_clause(alloc.clause(cref).lits()) {
                    clauses.push(clause);
                }
            }
        }

        self.clause_query = Some(ClauseQuery {
            clauses,
            position: 0,
        });
    }

    /// Fetch the next clause of a running export.
    pub fn get_next_small_clause(&mut self, out: &mut Vec<Lit>) -> bool {
        let query = self
            .clause_query
            .as_mut()
            .expect("no clause export is running");
        match query.clauses.get(query.position) {
            None => false,
            Some(clause) => {
                out.clear();
                out.extend_from_slice(clause);
                query.position += 1;
                true
            }
        }
    }

    /// Finish a streaming export.
    pub fn end_getting_small_clauses(&mut self) {
        self.clause_query = None;
    }

    /// All irredundant clauses, in outside literals.
    pub fn get_all_irred_clauses(&mut self) -> Vec<Vec<Lit>> {
        self.start_getting_small_clauses(usize::max_value(), 0, false);
        let mut result = vec![];
        let mut clause = vec![];
        while self.get_next_small_clause(&mut clause) {
            result.push(clause.clone());
        }
        self.end_getting_small_clauses();
        result
    }

    /// Limit the total number of conflicts for all following solve calls.
    pub fn set_max_confl(&mut self, max_confl: u64) {
        let spent = self.ctx.searcher.stats.sum_conflicts;
        self.ctx.config.max_conflicts = spent.saturating_add(max_confl);
    }

    /// Limit the wall clock time of each following solve call.
    pub fn set_timeout_all_calls(&mut self, seconds: f64) {
        self.ctx.config.max_time = seconds;
    }

    /// Change the verbosity of the `log` output.
    pub fn set_verbosity(&mut self, verbosity: u32) {
        self.ctx.config.verbosity = verbosity;
    }

    /// Connect this instance to a shared clause exchange bag.
    pub fn set_shared_data(&mut self, shared: Option<Arc<SharedData>>) {
        self.ctx.datasync.set_shared(shared);
    }

    /// Request the solver to return at the next phase boundary.
    ///
    /// Safe to call from another thread through [`Solver::interrupt_handle`].
    pub fn interrupt_asap(&self) {
        self.ctx.solver_state.interrupt_asap();
    }

    /// A handle that interrupts this solver when set to true.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.ctx.solver_state.interrupt_handle()
    }

    /// Generate a proof trace during solving.
    pub fn write_proof(&mut self, target: impl std::io::Write + 'a) {
        self.ctx.proof.write_proof(target);
    }

    /// Stop generating a proof trace and flush it.
    pub fn close_proof(&mut self) {
        self.ctx.proof.close_proof();
    }

    /// Serialize the state needed to extend models of the current formula.
    pub fn serialize_solution_reconstruction_data(&self) -> Vec<u8> {
        let (outer_from_outside, perm, var_data, must_set, bva_count) =
            self.ctx.variables.reconstruction_parts();

        let data = SolutionReconstructionData {
            ok: self.ctx.solver_state.ok,
            outer_from_outside: outer_from_outside.clone(),
            perm: perm.clone(),
            var_data: var_data.to_vec(),
            must_set: must_set.to_vec(),
            bva_count,
            replacer_table: self.ctx.var_replacer.table().to_vec(),
            elim_stack: self.ctx.occ.elim_stack().to_vec(),
        };

        bincode::serialize(&data).expect("serializing reconstruction data cannot fail")
    }

    /// Restore a solver that can extend models of the serialized formula.
    pub fn create_from_solution_reconstruction_data(data: &[u8]) -> Solver<'a> {
        let data: SolutionReconstructionData =
            bincode::deserialize(data).expect("invalid reconstruction data");

        let mut solver = Solver::new();
        solver.ctx.solver_state.ok = data.ok;
        solver.ctx.variables.restore_reconstruction_parts(
            data.outer_from_outside,
            data.perm,
            data.var_data,
            data.must_set,
            data.bva_count,
        );
        solver.ctx.var_replacer.restore_table(data.replacer_table);
        solver.ctx.occ.restore_elim_stack(data.elim_stack);
        solver
    }

    /// Extend a partial model over the solution reconstruction state.
    pub fn extend_minimized_model(&mut self, minimized: &[Lit]) -> Vec<Lit> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        model::extend_minimized_model(ctx.borrow(), minimized)
    }

    /// Enables a test schedule with tiny budgets that triggers inprocessing early.
    #[cfg(test)]
    pub(crate) fn enable_test_schedule(&mut self) {
        self.ctx.config.search_conflicts = 50;
        self.ctx.config.simplify_at_every_startup = true;
    }
}

impl<'a> ExtendFormula for Solver<'a> {
    fn add_clause(&mut self, clause: &[Lit]) {
        Solver::add_clause(self, clause).expect("clause too long");
    }

    fn new_var(&mut self) -> Var {
        Solver::new_var(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use parisat_formula::test::{conditional_pigeon_hole, sat_formula, sgen_unsat_formula};
    use parisat_formula::{lits, vars};

    #[test]
    fn empty_clause_is_unsat() {
        let mut solver = Solver::new();
        solver.add_clause(&[]).unwrap();
        assert!(!solver.okay());
        assert_eq!(solver.solve(), Some(false));
    }

    #[test]
    fn unit_then_contradiction() {
        let mut solver = Solver::new();

        assert!(solver.add_clause(&lits![1]).unwrap());
        assert_eq!(solver.get_zero_assigned_lits(), lits![1].to_vec());

        assert!(!solver.add_clause(&lits![-1]).unwrap());
        assert_eq!(solver.solve(), Some(false));
    }

    #[test]
    fn tautology_is_discarded_but_var_is_set() {
        let mut solver = Solver::new();

        solver.add_clause(&lits![1, -1, 2]).unwrap();
        solver.add_clause(&lits![2, 3]).unwrap();

        assert_eq!(solver.solve(), Some(true));

        let model = solver.model().unwrap();
        assert!(model.iter().any(|lit| lit.var() == vars![1][0]));
    }

    proptest! {
        #[test]
        fn sgen_unsat(
            formula in sgen_unsat_formula(1..5usize),
            test_schedule in proptest::bool::ANY,
        ) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            if test_schedule {
                solver.enable_test_schedule();
            }

            prop_assert_eq!(solver.solve(), Some(false));
        }

        #[test]
        fn sat(
            formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0),
            test_schedule in proptest::bool::ANY,
        ) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            if test_schedule {
                solver.enable_test_schedule();
            }

            prop_assert_eq!(solver.solve(), Some(true));

            let model = solver.model().unwrap();

            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }
        }

        #[test]
        fn pigeon_hole_unsat_assumption_core(
            (enable_row, columns, formula) in conditional_pigeon_hole(1..4usize, 1..4usize),
        ) {
            let mut solver = Solver::new();
            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), Some(true));

            prop_assert_eq!(
                solver.solve_with_assumptions(&enable_row, false),
                Some(false)
            );

            let mut candidates: Vec<Lit> =
                solver.get_conflict().iter().map(|&lit| !lit).collect();
            let mut core: Vec<Lit> = vec![];

            while !candidates.is_empty() {
                match solver.solve_with_assumptions(&candidates[0..candidates.len() - 1], false) {
                    None => unreachable!(),
                    Some(true) => {
                        let skipped = *candidates.last().unwrap();
                        core.push(skipped);
                        solver.add_clause(&[skipped]).unwrap();
                        candidates.pop();
                    }
                    Some(false) => {
                        let conflict = solver.get_conflict();
                        if conflict.is_empty() {
                            // Unsat without assumptions: the remaining core is complete.
                            break;
                        }
                        candidates = conflict.iter().map(|&lit| !lit).collect();
                    }
                }
            }

            prop_assert!(core.len() <= columns + 1);
        }
    }

    #[test]
    fn implied_by_is_transactional() {
        let mut solver = Solver::new();

        solver.add_clause(&lits![-1, 2]).unwrap();
        solver.add_clause(&lits![-2, 3]).unwrap();

        let implied = solver.implied_by(&lits![1]).unwrap();
        assert!(implied.contains(&lits![2][0]));
        assert!(implied.contains(&lits![3][0]));

        // The propagation was undone.
        assert!(solver.get_zero_assigned_lits().is_empty());

        // Conflicting assumptions yield None.
        solver.add_clause(&lits![-3]).unwrap();
        assert!(solver.implied_by(&lits![1]).is_none());
    }

    #[test]
    fn minimize_clause_drops_implied_literals() {
        let mut solver = Solver::new();

        // x3 → x1
        solver.add_clause(&lits![-3, 1]).unwrap();

        // In (1 ∨ 3), assuming ¬1 falsifies 3 as well, so the clause minimizes to (1).
        let minimized = solver.minimize_clause(&lits![1, 3]);
        assert_eq!(minimized, lits![1].to_vec());
    }

    #[test]
    fn small_clause_export_roundtrip() {
        let mut solver = Solver::new();

        solver.add_clause(&lits![1, 2, 3]).unwrap();
        solver.add_clause(&lits![-1, 2]).unwrap();
        solver.add_clause(&lits![3]).unwrap();

        let clauses = solver.get_all_irred_clauses();

        // The unit, the binary and the (still attached) long clause are all exported.
        assert_eq!(clauses.len(), 3);
        assert!(clauses.iter().any(|clause| clause.len() == 1));
        assert!(clauses.iter().any(|clause| clause.len() == 2));
    }

    #[test]
    fn reconstruction_snapshot_roundtrip() {
        let mut solver = Solver::new();

        solver.add_clause(&lits![1, 2]).unwrap();
        solver.add_clause(&lits![-1, 3]).unwrap();

        // Eliminate x1, then snapshot the reconstruction state.
        solver.simplify(Some("occ-bve"));

        let snapshot = solver.serialize_solution_reconstruction_data();
        let mut restored = Solver::create_from_solution_reconstruction_data(&snapshot);

        let minimized = lits![2, 3].to_vec();
        let extended_original = solver.extend_minimized_model(&minimized);
        let extended_restored = restored.extend_minimized_model(&minimized);

        assert_eq!(extended_original, extended_restored);
        // The eliminated variable received a value.
        assert!(extended_original
            .iter()
            .any(|lit| lit.var() == vars![1][0]));
    }
}
