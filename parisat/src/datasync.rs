//! Unit and binary clause exchange between solver instances.
//!
//! Instances share a [`SharedData`] message bag. Each solver appends its new level 0 units, and
//! imports everything other instances appended since its last sync. Sync points sit between
//! strategy tokens, always at decision level 0; the bag's lock is the only cross-instance
//! synchronization.
use std::sync::{Arc, Mutex};

use partial_ref::{partial, PartialRef};

use parisat_formula::Lit;

use crate::admit;
use crate::context::{parts::*, Context};

/// The shared message bag, in outside literals.
#[derive(Default)]
pub struct SharedData {
    inner: Mutex<SharedBag>,
}

#[derive(Default)]
struct SharedBag {
    units: Vec<Lit>,
    binaries: Vec<[Lit; 2]>,
}

impl SharedData {
    pub fn new() -> Arc<SharedData> {
        Arc::new(SharedData::default())
    }

    /// Share a binary clause with all connected instances.
    pub fn push_binary(&self, lits: [Lit; 2]) {
        self.inner.lock().unwrap().binaries.push(lits);
    }
}

/// Per-instance synchronization state.
#[derive(Default)]
pub struct Datasync {
    shared: Option<Arc<SharedData>>,
    /// Number of shared units this instance already imported.
    units_imported: usize,
    /// Number of shared binaries this instance already imported.
    binaries_imported: usize,
    /// Number of own level 0 trail entries already exported.
    units_exported: usize,
}

impl Datasync {
    /// Connect this instance to a shared message bag.
    pub fn set_shared(&mut self, shared: Option<Arc<SharedData>>) {
        self.shared = shared;
        self.units_imported = 0;
        self.binaries_imported = 0;
    }

    /// Whether a shared bag is connected.
    pub fn is_connected(&self) -> bool {
        self.shared.is_some()
    }
}

/// Exchange clauses with the other instances.
///
/// Invoked only at decision level 0 between strategy tokens. Returns the solver's `ok` flag.
pub fn sync<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut DatasyncP,
        mut ImplGraphP,
        mut OccP,
        mut ProofP<'a>,
        mut SearcherP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VarReplacerP,
        mut VsidsP,
        mut WatchlistsP,
        ConfigP,
    ),
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let shared = match &ctx.part(DatasyncP).shared {
        Some(shared) => shared.clone(),
        None => return ctx.part(SolverStateP).ok,
    };

    // Export new level 0 units, translated into outside literals. BVA variables have no
    // outside name and stay local.
    let exported_so_far = ctx.part(DatasyncP).units_exported;
    let mut exports: Vec<Lit> = vec![];
    {
        let trail = ctx.part(TrailP);
        let variables = ctx.part(VariablesP);
        for &lit in trail.top_level_trail().iter().skip(exported_so_far) {
            let outer = variables.outer_from_inter_lit(lit);
            if let Some(outside) = variables.outside_from_outer_lit(outer) {
                exports.push(outside);
            }
        }
    }
    ctx.part_mut(DatasyncP).units_exported = ctx.part(TrailP).top_level_len();

    let (import_units, import_binaries) = {
        let mut bag = shared.inner.lock().unwrap();
        let datasync = ctx.part(DatasyncP);
        let units: Vec<Lit> = bag.units[datasync.units_imported..].to_vec();
        let binaries: Vec<[Lit; 2]> = bag.binaries[datasync.binaries_imported..].to_vec();
        bag.units.extend_from_slice(&exports);

        let datasync = ctx.part_mut(DatasyncP);
        datasync.units_imported = bag.units.len();
        datasync.binaries_imported = bag.binaries.len();

        (units, binaries)
    };

    for unit in import_units {
        match admit::add_clause_outside(ctx.borrow(), &[unit], false) {
            Ok(true) => {}
            _ => return false,
        }
    }

    for binary in import_binaries {
        match admit::add_clause_outside(ctx.borrow(), &binary, true) {
            Ok(true) => {}
            _ => return false,
        }
    }

    ctx.part(SolverStateP).ok
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parisat_formula::lits;

    use crate::admit::add_clause_outside;

    #[test]
    fn units_flow_between_instances() {
        let shared = SharedData::new();

        let mut ctx_a = Context::default();
        let mut ctx_a = ctx_a.into_partial_ref_mut();
        let mut ctx_b = Context::default();
        let mut ctx_b = ctx_b.into_partial_ref_mut();

        ctx_a.part_mut(DatasyncP).set_shared(Some(shared.clone()));
        ctx_b.part_mut(DatasyncP).set_shared(Some(shared.clone()));

        add_clause_outside(ctx_a.borrow(), &lits![1], false).unwrap();
        add_clause_outside(ctx_b.borrow(), &lits![1, 2], false).unwrap();

        assert!(sync(ctx_a.borrow()));
        assert!(sync(ctx_b.borrow()));

        // Instance b imported the unit x1.
        let variables = ctx_b.part(VariablesP);
        let outer = variables
            .outer_from_outside(parisat_formula::vars![1][0])
            .unwrap();
        let inter = variables.inter_from_outer(outer);
        assert_eq!(ctx_b.part(AssignmentP).var_value(inter), Some(true));
    }
}
