//! CNF formulas.
use std::cmp::max;
use std::fmt;
use std::ops::Range;

use crate::lit::{Lit, Var};

/// A formula in conjunctive normal form (CNF).
///
/// Equivalent to `Vec<Vec<Lit>>` but more efficient as it uses a single buffer for all literals.
#[derive(Default, Eq)]
pub struct CnfFormula {
    var_count: usize,
    literals: Vec<Lit>,
    clause_ranges: Vec<Range<usize>>,
}

impl CnfFormula {
    /// Create an empty CNF formula.
    pub fn new() -> CnfFormula {
        CnfFormula::default()
    }

    /// Number of variables in the formula.
    ///
    /// This also counts missing variables if a variable with a higher index is present.
    /// A vector of this length can be indexed with the variable indices present.
    pub fn var_count(&self) -> usize {
        self.var_count
    }

    /// Increase the number of variables in the formula.
    ///
    /// If the parameter is less than the current variable count do nothing.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_count = max(self.var_count, count)
    }

    /// Number of clauses in the formula.
    pub fn len(&self) -> usize {
        self.clause_ranges.len()
    }

    /// Whether the formula contains no clauses.
    pub fn is_empty(&self) -> bool {
        self.clause_ranges.is_empty()
    }

    /// Iterator over all clauses.
    pub fn iter(&self) -> impl Iterator<Item = &[Lit]> {
        let literals = &self.literals;
        self.clause_ranges
            .iter()
            .map(move |range| &literals[range.clone()])
    }
}

/// Extend a formula with new variables and clauses.
pub trait ExtendFormula: Sized {
    /// Appends a clause to the formula.
    fn add_clause(&mut self, literals: &[Lit]);

    /// Add a new variable to the formula and return it.
    fn new_var(&mut self) -> Var;

    /// Add a new variable to the formula and return it as a positive literal.
    fn new_lit(&mut self) -> Lit {
        self.new_var().positive()
    }

    /// Iterator over multiple new variables.
    fn new_var_iter(&mut self, count: usize) -> NewVarIter<Self> {
        NewVarIter {
            formula: self,
            vars_left: count,
        }
    }

    /// Add multiple new variables and return them.
    ///
    /// Convenience method for getting multiple variables at once, e.g.
    /// `let (x, y, z) = formula.new_vars();`
    fn new_vars<Vars: UniformTuple<Var>>(&mut self) -> Vars {
        Vars::tuple_from_iter(self.new_var_iter(Vars::tuple_len()))
    }

    /// Add multiple new variables and return them as positive literals.
    fn new_lits<Lits: UniformTuple<Lit>>(&mut self) -> Lits {
        Lits::tuple_from_iter(self.new_var_iter(Lits::tuple_len()).map(Var::positive))
    }
}

/// Iterator over new variables, see [`ExtendFormula::new_var_iter`].
pub struct NewVarIter<'a, F> {
    formula: &'a mut F,
    vars_left: usize,
}

impl<'a, F> Iterator for NewVarIter<'a, F>
where
    F: ExtendFormula,
{
    type Item = Var;

    fn next(&mut self) -> Option<Var> {
        if self.vars_left == 0 {
            None
        } else {
            self.vars_left -= 1;
            Some(self.formula.new_var())
        }
    }
}

/// Helper trait to initialize multiple values of a single type.
pub trait UniformTuple<Item> {
    fn tuple_len() -> usize;
    fn tuple_from_iter(items: impl Iterator<Item = Item>) -> Self;
}

macro_rules! uniform_tuple_impls {
    ( $( ( $($count:literal),* ) ),* ) => {
        $(
            impl<Item> UniformTuple<Item> for ( $(uniform_tuple_impls!(@type Item $count),)* ) {
                fn tuple_len() -> usize {
                    [$($count,)*].len()
                }
                fn tuple_from_iter(mut items: impl Iterator<Item = Item>) -> Self {
                    ( $(uniform_tuple_impls!(@take items $count),)* )
                }
            }
        )*
    };
    ( @type $item:ident $count:literal ) => { $item };
    ( @take $items:ident $count:literal ) => { $items.next().unwrap() };
}

uniform_tuple_impls!(
    (1),
    (1, 2),
    (1, 2, 3),
    (1, 2, 3, 4),
    (1, 2, 3, 4, 5),
    (1, 2, 3, 4, 5, 6),
    (1, 2, 3, 4, 5, 6, 7),
    (1, 2, 3, 4, 5, 6, 7, 8)
);

impl ExtendFormula for CnfFormula {
    fn add_clause(&mut self, clause: &[Lit]) {
        let begin = self.literals.len();
        self.literals.extend_from_slice(clause);
        let end = self.literals.len();

        for &lit in self.literals[begin..end].iter() {
            self.var_count = max(lit.index() + 1, self.var_count);
        }

        self.clause_ranges.push(begin..end);
    }

    fn new_var(&mut self) -> Var {
        let var = Var::from_index(self.var_count);
        self.var_count += 1;
        var
    }
}

/// Convert any iterable of [`Lit`] slices into a CnfFormula.
impl<Clauses, Item> From<Clauses> for CnfFormula
where
    Clauses: IntoIterator<Item = Item>,
    Item: std::borrow::Borrow<[Lit]>,
{
    fn from(clauses: Clauses) -> CnfFormula {
        let mut cnf_formula = CnfFormula::new();
        for clause in clauses {
            cnf_formula.add_clause(clause.borrow());
        }
        cnf_formula
    }
}

impl fmt::Debug for CnfFormula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.var_count(), f)?;
        f.debug_list().entries(self.iter()).finish()
    }
}

impl PartialEq for CnfFormula {
    fn eq(&self, other: &CnfFormula) -> bool {
        self.var_count() == other.var_count()
            && self.clause_ranges.len() == other.clause_ranges.len()
            && self
                .clause_ranges
                .iter()
                .zip(other.clause_ranges.iter())
                .all(|(range_a, range_b)| {
                    self.literals[range_a.clone()] == other.literals[range_b.clone()]
                })
    }
}

#[cfg(any(test, feature = "proptest-strategies"))]
#[doc(hidden)]
pub mod strategy {
    use super::*;

    use proptest::{collection::SizeRange, prelude::*, *};

    use crate::lit::strategy::lit;

    pub fn vec_formula(
        vars: impl Strategy<Value = usize>,
        clauses: impl Into<SizeRange>,
        clause_len: impl Into<SizeRange>,
    ) -> impl Strategy<Value = Vec<Vec<Lit>>> {
        let clauses = clauses.into();
        let clause_len = clause_len.into();

        // Not using ind_flat_map makes shrinking too expensive
        vars.prop_ind_flat_map(move |vars| {
            collection::vec(
                collection::vec(lit(0..vars), clause_len.clone()),
                clauses.clone(),
            )
        })
    }

    pub fn cnf_formula(
        vars: impl Strategy<Value = usize>,
        clauses: impl Into<SizeRange>,
        clause_len: impl Into<SizeRange>,
    ) -> impl Strategy<Value = CnfFormula> {
        vec_formula(vars, clauses, clause_len).prop_map(|clauses| {
            clauses
                .iter()
                .map(|clause| &clause[..])
                .collect::<Vec<_>>()
                .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_vars_are_dense() {
        let mut formula = CnfFormula::new();
        let (x, y, z) = formula.new_lits();
        formula.add_clause(&[x, !y]);
        formula.add_clause(&[y, z]);

        assert_eq!(formula.var_count(), 3);
        assert_eq!(formula.len(), 2);

        let clauses: Vec<Vec<Lit>> = formula.iter().map(|cl| cl.to_vec()).collect();
        assert_eq!(clauses, vec![vec![x, !y], vec![y, z]]);
    }

    #[test]
    fn var_count_includes_gaps() {
        let mut formula = CnfFormula::new();
        formula.add_clause(&[Lit::from_dimacs(1), Lit::from_dimacs(-7)]);
        assert_eq!(formula.var_count(), 7);
    }
}
