//! Parisat is a CDCL SAT solver with native parity (XOR) and threshold (BNN) constraints,
//! inprocessing and proof trace generation.
//!
//! The solver core is organized as one [`Context`](context::Context) owning every subsystem,
//! with cross-subsystem functions taking partial references. The public interface lives in
//! [`solver`].
pub mod config;
pub mod solver;

mod admit;
mod analyze;
mod bnn;
mod clause;
mod context;
mod datasync;
mod decision;
mod distill;
mod equiv;
mod gauss;
mod incremental;
mod model;
mod occ;
mod outer;
mod probe;
mod proof;
mod prop;
mod renumber;
mod scc;
mod search;
mod simplify;
mod state;
mod strategy;
mod tmp;
mod variables;
mod verify;
mod watch;
mod xor;

pub use config::SolverConfig;
pub use datasync::SharedData;
pub use occ::{IteGate, OrGate};
pub use solver::{Solver, SolverError};

pub use parisat_formula::{cnf, lit, CnfFormula, ExtendFormula, Lit, Var};
