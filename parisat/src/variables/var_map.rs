//! Mappings between variable namespaces.
use serde::{Deserialize, Serialize};

use parisat_formula::lit::LitIdx;
use parisat_formula::Var;

const NO_VAR_IDX: LitIdx = Var::max_count() as LitIdx;

/// A partial mapping from variables to variables.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct VarMap {
    mapping: Vec<LitIdx>,
}

impl VarMap {
    /// Look up a variable in the mapping.
    pub fn get(&self, from: Var) -> Option<Var> {
        match self.mapping.get(from.index()).cloned() {
            Some(index) if index == NO_VAR_IDX => None,
            Some(index) => Some(Var::from_index(index as usize)),
            None => None,
        }
    }

    /// Insert a new mapping.
    ///
    /// Note that the parameters are reversed from the usual order, to match the naming convention
    /// used for maps.
    ///
    /// This has the precondition that `from` is not mapped.
    pub fn insert(&mut self, into: Var, from: Var) {
        self.ensure_mapping(from);
        debug_assert_eq!(self.mapping[from.index()], NO_VAR_IDX);
        self.mapping[from.index()] = into.index() as LitIdx
    }

    /// Remove a mapping.
    ///
    /// Does nothing if `from` is not mapped.
    pub fn remove(&mut self, from: Var) {
        self.ensure_mapping(from);
        self.mapping[from.index()] = NO_VAR_IDX;
    }

    /// Resize the internal mapping to cover `from`.
    fn ensure_mapping(&mut self, from: Var) {
        if self.mapping.len() <= from.index() {
            self.mapping.resize(from.index() + 1, NO_VAR_IDX);
        }
    }
}

/// A bidirectional mapping between two variable namespaces.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct VarBiMap {
    fwd: VarMap,
    bwd: VarMap,
}

impl VarBiMap {
    /// Access the forward mapping.
    pub fn fwd(&self) -> &VarMap {
        &self.fwd
    }

    /// Access the backward mapping.
    pub fn bwd(&self) -> &VarMap {
        &self.bwd
    }

    /// Mutate the mapping in forward direction.
    pub fn fwd_mut(&mut self) -> VarBiMapMut {
        VarBiMapMut {
            fwd: &mut self.fwd,
            bwd: &mut self.bwd,
        }
    }

    /// Mutate the mapping in backward direction.
    pub fn bwd_mut(&mut self) -> VarBiMapMut {
        VarBiMapMut {
            fwd: &mut self.bwd,
            bwd: &mut self.fwd,
        }
    }
}

/// Mutable view of a [`VarBiMap`].
///
/// Helper so `VarBiMap` mutating routines can work in both directions.
pub struct VarBiMapMut<'a> {
    fwd: &'a mut VarMap,
    bwd: &'a mut VarMap,
}

impl<'a> VarBiMapMut<'a> {
    /// Insert a new mapping.
    ///
    /// Note that the parameters are reversed from the usual order, to match the naming convention
    /// used for maps.
    ///
    /// This has the precondition that `into` and `from` are not mapped.
    pub fn insert(&mut self, into: Var, from: Var) {
        self.fwd.insert(into, from);
        self.bwd.insert(from, into);
    }

    /// Remove a mapping.
    ///
    /// Does nothing if `from` is not mapped.
    pub fn remove(&mut self, from: Var) {
        if let Some(into) = self.fwd.get(from) {
            self.fwd.remove(from);
            self.bwd.remove(into);
        }
    }
}

/// A permutation of the variable namespace.
///
/// Unlike [`VarBiMap`] this is total over a dense prefix of variables: both directions are stored
/// as arrays of the same length and stay inverse to each other.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct VarPerm {
    fwd: Vec<LitIdx>,
    bwd: Vec<LitIdx>,
}

impl VarPerm {
    /// Number of permuted variables.
    pub fn len(&self) -> usize {
        self.fwd.len()
    }

    /// Extend both directions with identity entries.
    pub fn extend_identity(&mut self, count: usize) {
        debug_assert!(count >= self.fwd.len());
        for index in self.fwd.len()..count {
            self.fwd.push(index as LitIdx);
            self.bwd.push(index as LitIdx);
        }
    }

    /// Map a variable in forward direction.
    pub fn fwd(&self, var: Var) -> Var {
        Var::from_index(self.fwd[var.index()] as usize)
    }

    /// Map a variable in backward direction.
    pub fn bwd(&self, var: Var) -> Var {
        Var::from_index(self.bwd[var.index()] as usize)
    }

    /// Replace the permutation by its composition with another forward mapping.
    ///
    /// `new_fwd[i]` is the new image of the variable that was so far mapped to `i`.
    pub fn compose(&mut self, new_fwd: &[LitIdx]) {
        debug_assert_eq!(new_fwd.len(), self.fwd.len());
        for entry in self.fwd.iter_mut() {
            *entry = new_fwd[*entry as usize];
        }
        for (index, &image) in self.fwd.iter().enumerate() {
            self.bwd[image as usize] = index as LitIdx;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bimap_roundtrip() {
        let mut map = VarBiMap::default();

        map.fwd_mut().insert(Var::from_index(3), Var::from_index(0));
        map.fwd_mut().insert(Var::from_index(0), Var::from_index(1));

        assert_eq!(map.fwd().get(Var::from_index(0)), Some(Var::from_index(3)));
        assert_eq!(map.bwd().get(Var::from_index(3)), Some(Var::from_index(0)));
        assert_eq!(map.bwd().get(Var::from_index(0)), Some(Var::from_index(1)));
        assert_eq!(map.fwd().get(Var::from_index(2)), None);

        map.bwd_mut().remove(Var::from_index(3));
        assert_eq!(map.fwd().get(Var::from_index(0)), None);
    }

    #[test]
    fn perm_compose_stays_inverse() {
        let mut perm = VarPerm::default();
        perm.extend_identity(4);

        perm.compose(&[2, 0, 3, 1]);
        perm.compose(&[1, 2, 3, 0]);

        for index in 0..4 {
            let var = Var::from_index(index);
            assert_eq!(perm.bwd(perm.fwd(var)), var);
            assert_eq!(perm.fwd(perm.bwd(var)), var);
        }
    }
}
