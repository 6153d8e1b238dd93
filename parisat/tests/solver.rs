//! End to end tests against the public interface.
use std::fs::File;
use std::io::Read;

use tempfile::TempDir;

use parisat::{ExtendFormula, Lit, Solver, Var};

fn lit(number: isize) -> Lit {
    Lit::from_dimacs(number)
}

fn var(number: isize) -> Var {
    Var::from_dimacs(number)
}

#[test]
fn empty_clause_makes_everything_unsat() {
    let mut solver = Solver::new();

    solver.add_clause(&[]).unwrap();

    assert!(!solver.okay());
    assert_eq!(solver.solve(), Some(false));

    // Later additions stay unsat.
    assert!(!solver.add_clause(&[lit(1)]).unwrap());
    assert_eq!(solver.solve(), Some(false));
}

#[test]
fn single_unit_then_contradiction() {
    let mut solver = Solver::new();

    assert!(solver.add_clause(&[lit(1)]).unwrap());
    assert_eq!(solver.get_zero_assigned_lits(), vec![lit(1)]);

    assert!(!solver.add_clause(&[lit(-1)]).unwrap());
    assert_eq!(solver.solve(), Some(false));
}

#[test]
fn tautology_is_discarded_and_var_gets_model_value() {
    let mut solver = Solver::new();

    solver.add_clause(&[lit(1), lit(-1), lit(2)]).unwrap();
    solver.add_clause(&[lit(2), lit(3)]).unwrap();

    assert_eq!(solver.solve(), Some(true));

    let model = solver.model().unwrap();
    assert!(model.iter().any(|l| l.var() == var(1)));
    assert!(model.contains(&lit(2)) || model.contains(&lit(3)));
}

#[test]
fn equivalence_chain_is_detected() {
    let mut solver = Solver::new();

    solver.add_clause(&[lit(1), lit(-2)]).unwrap();
    solver.add_clause(&[lit(-1), lit(2)]).unwrap();
    solver.add_clause(&[lit(2), lit(-3)]).unwrap();
    solver.add_clause(&[lit(-2), lit(3)]).unwrap();

    assert!(solver.simplify(Some("must-scc-vrepl")).is_none());

    let xors = solver.get_all_binary_xors();
    assert_eq!(xors.len(), 2);
    for (member, rep) in xors {
        assert_eq!(rep.var(), var(1));
        assert!(member.var() == var(2) || member.var() == var(3));
    }

    // The formula is still satisfiable and all three variables agree.
    assert_eq!(solver.solve(), Some(true));
    let model = solver.model().unwrap();
    let value = model.contains(&lit(1));
    assert_eq!(model.contains(&lit(2)), value);
    assert_eq!(model.contains(&lit(3)), value);
}

#[test]
fn xor_triangle_is_unsat() {
    let mut solver = Solver::new();

    solver
        .add_xor_clause(&[var(1), var(2), var(3)], true)
        .unwrap();
    solver.add_xor_clause(&[var(1), var(2)], false).unwrap();
    solver.add_xor_clause(&[var(3)], false).unwrap();

    assert_eq!(solver.solve(), Some(false));
}

#[test]
fn xor_constraints_are_satisfied_by_models() {
    let mut solver = Solver::new();

    solver
        .add_xor_clause(&[var(1), var(2), var(3)], true)
        .unwrap();
    solver
        .add_xor_clause(&[var(3), var(4), var(5), var(6), var(7)], false)
        .unwrap();

    assert_eq!(solver.solve(), Some(true));

    let model = solver.model().unwrap();
    let value = |v: Var| model.contains(&v.positive());

    assert!(value(var(1)) ^ value(var(2)) ^ value(var(3)));
    assert!(
        !(value(var(3)) ^ value(var(4)) ^ value(var(5)) ^ value(var(6)) ^ value(var(7)))
    );
}

#[test]
fn bnn_threshold_forces_output() {
    let mut solver = Solver::new();

    // out ↔ (x1 + x2 + x3 ≥ 2), convertible to CNF at admission.
    solver
        .add_bnn_clause(&[lit(1), lit(2), lit(3)], 2, Some(lit(4)))
        .unwrap();

    solver.add_clause(&[lit(1)]).unwrap();
    solver.add_clause(&[lit(2)]).unwrap();

    assert!(solver.get_zero_assigned_lits().contains(&lit(4)));

    assert_eq!(solver.solve(), Some(true));
    assert!(solver.model().unwrap().contains(&lit(4)));
}

#[test]
fn wide_bnn_propagates_during_search() {
    let mut solver = Solver::new();

    // x1 + ... + x5 ≥ 4 asserted: at most one input may be false.
    solver
        .add_bnn_clause(&[lit(1), lit(2), lit(3), lit(4), lit(5)], 4, None)
        .unwrap();
    solver.add_clause(&[lit(-1)]).unwrap();

    assert_eq!(solver.solve(), Some(true));

    let model = solver.model().unwrap();
    for number in 2..=5 {
        assert!(model.contains(&lit(number)));
    }
}

#[test]
fn assumptions_and_conflict_core() {
    let mut solver = Solver::new();

    solver.add_clause(&[lit(-1), lit(-2)]).unwrap();
    solver.add_clause(&[lit(3), lit(4)]).unwrap();

    assert_eq!(solver.solve_with_assumptions(&[lit(1), lit(2)], false), Some(false));

    let conflict = solver.get_conflict();
    assert!(!conflict.is_empty());
    assert!(conflict.iter().all(|l| l.var() == var(1) || l.var() == var(2)));

    // The same solver is reusable without the assumptions.
    assert_eq!(solver.solve(), Some(true));
}

#[test]
fn model_covers_eliminated_variables() {
    let mut solver = Solver::new();

    solver.add_clause(&[lit(1), lit(2)]).unwrap();
    solver.add_clause(&[lit(-1), lit(3)]).unwrap();
    solver.add_clause(&[lit(2), lit(3), lit(4)]).unwrap();

    assert!(solver.simplify(Some("occ-bve")).is_none());
    assert_eq!(solver.solve(), Some(true));

    let model = solver.model().unwrap();
    for number in 1..=4 {
        assert!(
            model.iter().any(|l| l.var() == var(number)),
            "variable {} has no model value",
            number
        );
    }

    // The original clauses are all satisfied.
    assert!(model.contains(&lit(1)) || model.contains(&lit(2)));
    assert!(model.contains(&lit(-1)) || model.contains(&lit(3)));
}

#[test]
fn admitted_clauses_are_exported_back() {
    let mut solver = Solver::new();

    solver.add_clause(&[lit(1), lit(2), lit(3)]).unwrap();

    let clauses = solver.get_all_irred_clauses();
    assert!(clauses
        .iter()
        .any(|clause| {
            let mut sorted = clause.clone();
            sorted.sort_unstable();
            sorted == vec![lit(1), lit(2), lit(3)]
        }));
}

#[test]
fn proof_trace_pairs_additions_with_deletions() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("trace.frat");

    {
        let mut solver = Solver::new();
        solver.write_proof(File::create(&path).unwrap());

        solver.add_clause(&[lit(1)]).unwrap();
        assert!(!solver.add_clause(&[lit(-1)]).unwrap());
        assert_eq!(solver.solve(), Some(false));

        solver.close_proof();
    }

    let mut text = String::new();
    File::open(&path)
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();

    let mut live: std::collections::HashSet<u64> = Default::default();
    let mut finalized: std::collections::HashSet<u64> = Default::default();
    let mut last_id = 0u64;

    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let opcode = match parts.next() {
            Some(opcode) => opcode,
            None => continue,
        };
        let id: u64 = match opcode {
            "o" | "a" | "d" | "f" => parts.next().unwrap().parse().unwrap(),
            // Anything else is a comment line.
            _ => continue,
        };

        match opcode {
            "o" | "a" => {
                assert!(id > last_id, "clause IDs must be strictly increasing");
                last_id = id;
                assert!(live.insert(id), "duplicate clause ID {}", id);
            }
            "d" => {
                assert!(live.remove(&id), "deletion of unknown clause {}", id);
            }
            "f" => {
                assert!(live.contains(&id), "finalization of unknown clause {}", id);
                finalized.insert(id);
            }
            _ => unreachable!(),
        }
    }

    // Every live clause was finalized, including the empty clause.
    assert_eq!(live.len(), finalized.len());
    assert!(text.lines().any(|line| {
        let mut parts = line.split_whitespace();
        parts.next() == Some("f") && parts.nth(1) == Some("0")
    }));
}

#[test]
fn interrupting_returns_unknown() {
    let mut solver = Solver::new();

    let (x, y, z) = solver.new_lits();
    solver.add_clause(&[x, y, z]).unwrap();

    solver.interrupt_asap();
    assert_eq!(solver.solve(), None);

    // The flag is cleared on the next call, which then solves normally.
    assert_eq!(solver.solve(), Some(true));
}

#[test]
fn conflict_budget_returns_unknown() {
    let mut solver = Solver::new();

    // A formula that takes more than zero conflicts to solve.
    for a in 1..6isize {
        for b in (a + 1)..6 {
            solver.add_clause(&[lit(-a), lit(-b)]).unwrap();
        }
    }
    solver.add_clause(&[lit(1), lit(2), lit(3), lit(4), lit(5)]).unwrap();

    solver.set_max_confl(0);
    let result = solver.solve();
    assert!(result.is_none() || result == Some(true));
}

#[test]
fn renumber_keeps_solutions_intact() {
    let mut solver = Solver::new();

    solver.add_clause(&[lit(1)]).unwrap();
    solver.add_clause(&[lit(2)]).unwrap();
    solver.add_clause(&[lit(3), lit(4), lit(5)]).unwrap();
    solver.add_clause(&[lit(-3), lit(-4)]).unwrap();

    assert!(solver.simplify(Some("must-renumber")).is_none());
    assert_eq!(solver.solve(), Some(true));

    let model = solver.model().unwrap();
    assert!(model.contains(&lit(1)));
    assert!(model.contains(&lit(2)));
    assert!(model.contains(&lit(3)) || model.contains(&lit(4)) || model.contains(&lit(5)));
}

#[test]
fn implied_by_reports_propagations() {
    let mut solver = Solver::new();

    solver.add_clause(&[lit(-1), lit(2)]).unwrap();
    solver.add_clause(&[lit(-2), lit(3)]).unwrap();

    let implied = solver.implied_by(&[lit(1)]).unwrap();
    assert!(implied.contains(&lit(2)));
    assert!(implied.contains(&lit(3)));

    // Nothing sticks around.
    assert!(solver.get_zero_assigned_lits().is_empty());
    assert_eq!(solver.solve(), Some(true));
}

#[test]
fn xor_recovery_reports_encoded_constraints() {
    let mut solver = Solver::new();

    solver.add_clause(&[lit(1), lit(2), lit(3)]).unwrap();
    solver.add_clause(&[lit(1), lit(-2), lit(-3)]).unwrap();
    solver.add_clause(&[lit(-1), lit(2), lit(-3)]).unwrap();
    solver.add_clause(&[lit(-1), lit(-2), lit(3)]).unwrap();

    assert!(solver.simplify(Some("occ-xor")).is_none());

    let xors = solver.get_recovered_xors();
    assert!(xors
        .iter()
        .any(|(vars, rhs)| *rhs && vars.len() == 3));
}
