//! Variable identity across the outside, outer and inter namespaces.
//!
//! Callers name *outside* variables. The solver extends this namespace with variables introduced
//! by bounded variable addition, yielding the dense and lifetime-stable *outer* namespace. During
//! search a permutation of outer, called *inter*, is used so that the active variables form a
//! dense prefix (see [`crate::renumber`]).
//!
//! The outside↔outer map is the identity except where BVA added variables. The outer↔inter
//! permutation is total and only rewritten by the renumberer. Literal translations derive from
//! the variable translations and the low sign bit.
use partial_ref::{partial, PartialRef};

use parisat_formula::{Lit, Var};

use crate::context::{parts::*, Context};

pub mod data;
pub mod var_map;

use data::VarData;
use var_map::{VarBiMap, VarPerm};

/// Variable mappings and metadata.
pub struct Variables {
    /// Bidirectional mapping from outside variables to outer variables.
    ///
    /// This is the identity until the first BVA variable is created.
    outer_from_outside: VarBiMap,
    /// Permutation between the outer and inter namespaces.
    perm: VarPerm,
    /// Variable metadata, indexed by outer variables.
    var_data: Vec<VarData>,
    /// Variables that must receive a value during model extension.
    ///
    /// Indexed by outer variables. Set when an irredundant clause was discarded as a tautology
    /// because it contained a literal in both polarities.
    must_set: Vec<bool>,
    /// Number of BVA variables.
    bva_count: usize,
}

impl Default for Variables {
    fn default() -> Variables {
        Variables {
            outer_from_outside: VarBiMap::default(),
            perm: VarPerm::default(),
            var_data: vec![],
            must_set: vec![],
            bva_count: 0,
        }
    }
}

impl Variables {
    /// Number of outer (and inter) variables.
    pub fn count(&self) -> usize {
        self.var_data.len()
    }

    /// Number of outside variables.
    pub fn outside_count(&self) -> usize {
        self.count() - self.bva_count
    }

    /// Number of BVA variables.
    pub fn bva_count(&self) -> usize {
        self.bva_count
    }

    /// The outer variable of an outside variable, if it was created already.
    pub fn outer_from_outside(&self, outside: Var) -> Option<Var> {
        self.outer_from_outside.fwd().get(outside)
    }

    /// The outside variable of an outer variable.
    ///
    /// BVA variables have no outside name.
    pub fn outside_from_outer(&self, outer: Var) -> Option<Var> {
        debug_assert!(outer.index() < self.count());
        if self.var_data[outer.index()].bva {
            None
        } else {
            self.outer_from_outside.bwd().get(outer)
        }
    }

    /// Translate an outer variable into the inter namespace.
    pub fn inter_from_outer(&self, outer: Var) -> Var {
        self.perm.fwd(outer)
    }

    /// Translate an inter variable into the outer namespace.
    pub fn outer_from_inter(&self, inter: Var) -> Var {
        self.perm.bwd(inter)
    }

    /// Translate an outer literal into the inter namespace.
    pub fn inter_from_outer_lit(&self, outer: Lit) -> Lit {
        outer.map_var(|var| self.inter_from_outer(var))
    }

    /// Translate an inter literal into the outer namespace.
    pub fn outer_from_inter_lit(&self, inter: Lit) -> Lit {
        inter.map_var(|var| self.outer_from_inter(var))
    }

    /// Translate an outside literal into the outer namespace.
    pub fn outer_from_outside_lit(&self, outside: Lit) -> Option<Lit> {
        let var = self.outer_from_outside(outside.var())?;
        Some(var.lit(outside.is_positive()))
    }

    /// Translate an outer literal into the outside namespace.
    pub fn outside_from_outer_lit(&self, outer: Lit) -> Option<Lit> {
        let var = self.outside_from_outer(outer.var())?;
        Some(var.lit(outer.is_positive()))
    }

    /// Metadata of an outer variable.
    pub fn var_data(&self, outer: Var) -> &VarData {
        &self.var_data[outer.index()]
    }

    /// Mutable metadata of an outer variable.
    pub fn var_data_mut(&mut self, outer: Var) -> &mut VarData {
        &mut self.var_data[outer.index()]
    }

    /// Metadata of an inter variable.
    pub fn var_data_inter(&self, inter: Var) -> &VarData {
        &self.var_data[self.outer_from_inter(inter).index()]
    }

    /// Record that an outer variable must be assigned during model extension.
    pub fn mark_must_set(&mut self, outer: Var) {
        self.must_set[outer.index()] = true;
    }

    /// Whether an outer variable is flagged for forced model assignment.
    pub fn is_must_set(&self, outer: Var) -> bool {
        self.must_set[outer.index()]
    }

    /// The outer↔inter permutation.
    pub fn perm_mut(&mut self) -> &mut VarPerm {
        &mut self.perm
    }

    /// Internal snapshot accessors used for solution reconstruction serialization.
    pub fn reconstruction_parts(&self) -> (&VarBiMap, &VarPerm, &[VarData], &[bool], usize) {
        (
            &self.outer_from_outside,
            &self.perm,
            &self.var_data,
            &self.must_set,
            self.bva_count,
        )
    }

    /// Replace the internal state from a solution reconstruction snapshot.
    pub fn restore_reconstruction_parts(
        &mut self,
        outer_from_outside: VarBiMap,
        perm: VarPerm,
        var_data: Vec<VarData>,
        must_set: Vec<bool>,
        bva_count: usize,
    ) {
        self.outer_from_outside = outer_from_outside;
        self.perm = perm;
        self.var_data = var_data;
        self.must_set = must_set;
        self.bva_count = bva_count;
    }

    fn push_var(&mut self, data: VarData) -> Var {
        let outer = Var::from_index(self.count());
        self.var_data.push(data);
        self.must_set.push(false);
        if data.bva {
            self.bva_count += 1;
        }
        self.perm.extend_identity(self.var_data.len());
        outer
    }
}

/// Update all per-variable structures for a new variable count.
pub fn set_var_count<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut SearcherP,
        mut TmpDataP,
        mut VarReplacerP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    count: usize,
) {
    ctx.part_mut(AnalyzeConflictP).set_var_count(count);
    ctx.part_mut(AssignmentP).set_var_count(count);
    ctx.part_mut(ImplGraphP).set_var_count(count);
    ctx.part_mut(ProofP).set_var_count(count);
    ctx.part_mut(SearcherP).set_var_count(count);
    ctx.part_mut(TmpDataP).set_var_count(count);
    ctx.part_mut(VarReplacerP).set_var_count(count);
    ctx.part_mut(VsidsP).set_var_count(count);
    ctx.part_mut(WatchlistsP).set_var_count(count);
}

/// Create a fresh variable named by the caller.
///
/// Returns the outside variable. The outer variable gets the same index unless BVA variables were
/// interleaved, in which case the next free outer slot is used.
pub fn new_outside_var<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut SearcherP,
        mut TmpDataP,
        mut VariablesP,
        mut VarReplacerP,
        mut VsidsP,
        mut WatchlistsP,
    ),
) -> Var {
    let variables = ctx.part_mut(VariablesP);
    let outside = Var::from_index(variables.outside_count());
    let outer = variables.push_var(VarData::default());
    variables.outer_from_outside.fwd_mut().insert(outer, outside);
    let count = variables.count();
    set_var_count(ctx.borrow(), count);
    outside
}

/// Create a variable the caller never named.
///
/// Returns the outer variable.
pub fn new_bva_var<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut SearcherP,
        mut TmpDataP,
        mut VariablesP,
        mut VsidsP,
        mut VarReplacerP,
        mut WatchlistsP,
    ),
) -> Var {
    let variables = ctx.part_mut(VariablesP);
    let outer = variables.push_var(VarData::bva_default());
    let count = variables.count();
    set_var_count(ctx.borrow(), count);
    outer
}

/// Make sure at least `count` outside variables exist.
pub fn ensure_outside_vars<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut SearcherP,
        mut TmpDataP,
        mut VariablesP,
        mut VarReplacerP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    count: usize,
) {
    while ctx.part(VariablesP).outside_count() < count {
        new_outside_var(ctx.borrow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    #[test]
    fn outside_outer_identity_without_bva() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        for _ in 0..5 {
            new_outside_var(ctx.borrow());
        }

        let variables = ctx.part(VariablesP);
        for index in 0..5 {
            let var = Var::from_index(index);
            assert_eq!(variables.outer_from_outside(var), Some(var));
            assert_eq!(variables.outside_from_outer(var), Some(var));
        }
    }

    #[test]
    fn bva_vars_have_no_outside_name() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        new_outside_var(ctx.borrow());
        let bva = new_bva_var(ctx.borrow());
        let outside = new_outside_var(ctx.borrow());

        let variables = ctx.part(VariablesP);
        assert_eq!(variables.outside_from_outer(bva), None);
        assert_eq!(variables.outside_count(), 2);
        assert_eq!(variables.count(), 3);

        let outer = variables.outer_from_outside(outside).unwrap();
        assert!(outer != bva);
        assert_eq!(variables.outside_from_outer(outer), Some(outside));
    }

    #[test]
    fn inter_outer_roundtrip_is_identity() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        for _ in 0..8 {
            new_outside_var(ctx.borrow());
        }

        let variables = ctx.part(VariablesP);
        for index in 0..variables.count() {
            let outer = Var::from_index(index);
            assert_eq!(variables.outer_from_inter(variables.inter_from_outer(outer)), outer);
        }
    }
}
