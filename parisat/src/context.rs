//! Central solver data structure.
//!
//! This module defines the `Context` struct that contains all data kept by the solver. Most
//! functions operating on multiple subsystems take partial references provided by the
//! `partial_ref` crate. This documents the data dependencies and makes the borrow checker happy
//! without the overhead of passing many individual references.
use partial_ref::{part, PartialRefTarget};

use crate::analyze::AnalyzeConflict;
use crate::bnn::Bnns;
use crate::clause::{ClauseActivity, ClauseAlloc, ClauseDb};
use crate::config::SolverConfig;
use crate::datasync::Datasync;
use crate::decision::Vsids;
use crate::equiv::VarReplacer;
use crate::gauss::GaussState;
use crate::incremental::Incremental;
use crate::model::Model;
use crate::occ::OccSimplifier;
use crate::proof::Proof;
use crate::prop::{Assignment, ImplGraph, Trail};
use crate::search::Searcher;
use crate::state::SolverState;
use crate::tmp::TmpData;
use crate::variables::Variables;
use crate::watch::Watchlists;
use crate::xor::Xors;

/// Part declarations for the [`Context`] struct.
pub mod parts {
    use super::*;

    part!(pub AnalyzeConflictP: AnalyzeConflict);
    part!(pub AssignmentP: Assignment);
    part!(pub BnnsP: Bnns);
    part!(pub ClauseActivityP: ClauseActivity);
    part!(pub ClauseAllocP: ClauseAlloc);
    part!(pub ClauseDbP: ClauseDb);
    part!(pub ConfigP: SolverConfig);
    part!(pub DatasyncP: Datasync);
    part!(pub GaussP: GaussState);
    part!(pub ImplGraphP: ImplGraph);
    part!(pub IncrementalP: Incremental);
    part!(pub ModelP: Model);
    part!(pub OccP: OccSimplifier);
    part!(pub ProofP<'a>: Proof<'a>);
    part!(pub SearcherP: Searcher);
    part!(pub SolverStateP: SolverState);
    part!(pub TmpDataP: TmpData);
    part!(pub TrailP: Trail);
    part!(pub VariablesP: Variables);
    part!(pub VarReplacerP: VarReplacer);
    part!(pub VsidsP: Vsids);
    part!(pub WatchlistsP: Watchlists);
    part!(pub XorsP: Xors);
}

pub use parts::*;

/// Central solver data structure.
///
/// This struct contains all data kept by the solver. The solver's subsystems are owned here and
/// borrowed through partial references, which breaks what would otherwise be a cycle of
/// back-references.
#[derive(PartialRefTarget, Default)]
pub struct Context<'a> {
    #[part(AnalyzeConflictP)]
    pub analyze_conflict: AnalyzeConflict,
    #[part(AssignmentP)]
    pub assignment: Assignment,
    #[part(BnnsP)]
    pub bnns: Bnns,
    #[part(ClauseActivityP)]
    pub clause_activity: ClauseActivity,
    #[part(ClauseAllocP)]
    pub clause_alloc: ClauseAlloc,
    #[part(ClauseDbP)]
    pub clause_db: ClauseDb,
    #[part(ConfigP)]
    pub config: SolverConfig,
    #[part(DatasyncP)]
    pub datasync: Datasync,
    #[part(GaussP)]
    pub gauss: GaussState,
    #[part(ImplGraphP)]
    pub impl_graph: ImplGraph,
    #[part(IncrementalP)]
    pub incremental: Incremental,
    #[part(ModelP)]
    pub model: Model,
    #[part(OccP)]
    pub occ: OccSimplifier,
    #[part(ProofP<'a>)]
    pub proof: Proof<'a>,
    #[part(SearcherP)]
    pub searcher: Searcher,
    #[part(SolverStateP)]
    pub solver_state: SolverState,
    #[part(TmpDataP)]
    pub tmp: TmpData,
    #[part(TrailP)]
    pub trail: Trail,
    #[part(VariablesP)]
    pub variables: Variables,
    #[part(VarReplacerP)]
    pub var_replacer: VarReplacer,
    #[part(VsidsP)]
    pub vsids: Vsids,
    #[part(WatchlistsP)]
    pub watchlists: Watchlists,
    #[part(XorsP)]
    pub xors: Xors,
}
