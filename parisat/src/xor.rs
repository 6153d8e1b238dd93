//! Parity (XOR) constraints.
//!
//! XOR constraints live in their own store and are visible to the Gaussian elimination layer.
//! They are not attached to the watch index during search. The only time an XOR constraint gets
//! a watch entry is while it is being matched against its clausal shadow during matrix
//! initialization (see [`crate::gauss`]).
//!
//! At admission every XOR is also encoded into CNF so the searcher can reason about it. Long
//! XORs are first cut into chunks connected by fresh BVA variables to keep the encoding size
//! bounded.
use partial_ref::{partial, PartialRef};

use parisat_formula::{Lit, Var};

use crate::admit;
use crate::context::{parts::*, Context};
use crate::variables;

/// A parity constraint: the variables must sum to `rhs` modulo 2.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Xor {
    /// The ordered variable set, in the inter namespace.
    pub vars: Vec<Var>,
    /// The right hand side bit.
    pub rhs: bool,
}

impl Xor {
    /// The smallest variable, used as the attachment point for shadow matching.
    pub fn min_var(&self) -> Var {
        *self.vars.iter().min().unwrap()
    }
}

/// The parity constraint store.
#[derive(Default)]
pub struct Xors {
    xors: Vec<Xor>,
    /// Whether the store changed since the last matrix initialization.
    pub updated: bool,
}

impl Xors {
    pub fn is_empty(&self) -> bool {
        self.xors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.xors.len()
    }

    pub fn xors(&self) -> &[Xor] {
        &self.xors
    }

    pub fn get(&self, idx: u32) -> &Xor {
        &self.xors[idx as usize]
    }

    pub fn push(&mut self, xor: Xor) -> u32 {
        let idx = self.xors.len() as u32;
        self.xors.push(xor);
        self.updated = true;
        idx
    }

    /// Whether any constraint mentions the given variable.
    pub fn mentions_var(&self, var: Var) -> bool {
        self.xors.iter().any(|xor| xor.vars.contains(&var))
    }

    /// Remap all variables, used by the renumberer.
    pub fn map_vars(&mut self, map: impl Fn(Var) -> Var) {
        for xor in self.xors.iter_mut() {
            for var in xor.vars.iter_mut() {
                *var = map(*var);
            }
        }
        self.updated = true;
    }

    /// Rewrite through the variable replacer: a variable is replaced by a representative
    /// literal, folding the sign into the right hand side.
    pub fn replace_var(&mut self, var: Var, rep: Lit) {
        for xor in self.xors.iter_mut() {
            if let Some(pos) = xor.vars.iter().position(|&v| v == var) {
                xor.vars[pos] = rep.var();
                xor.rhs ^= rep.is_negative();
                normalize_vars(&mut xor.vars, &mut xor.rhs);
                self.updated = true;
            }
        }
    }
}

/// Sort the variable set and cancel duplicate pairs.
///
/// `x ⊕ x` is always 0 and drops out of the constraint.
pub fn normalize_vars(vars: &mut Vec<Var>, _rhs: &mut bool) {
    vars.sort_unstable();
    let mut read = 0;
    let mut write = 0;
    while read < vars.len() {
        if read + 1 < vars.len() && vars[read] == vars[read + 1] {
            read += 2;
        } else {
            vars[write] = vars[read];
            write += 1;
            read += 1;
        }
    }
    vars.truncate(write);
}

/// Drop assigned variables, folding their value into the right hand side.
///
/// Must be called at decision level 0 with a normalized variable set.
pub fn drop_assigned<'a>(
    mut ctx: partial!(Context<'a>, AssignmentP),
    vars: &mut Vec<Var>,
    rhs: &mut bool,
) {
    let assignment = ctx.part(AssignmentP);
    vars.retain(|&var| match assignment.var_value(var) {
        Some(value) => {
            *rhs ^= value;
            false
        }
        None => true,
    });
}

/// Store a cleaned parity constraint and encode it into CNF.
///
/// The variable set must be normalized, free of assigned variables and have at least 3 entries.
/// Longer constraints are cut into chunks connected by fresh BVA variables; each chunk is stored
/// and encoded separately.
pub fn store_and_encode<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut SearcherP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VarReplacerP,
        mut VsidsP,
        mut WatchlistsP,
        mut XorsP,
        ConfigP,
    ),
    vars: Vec<Var>,
    rhs: bool,
) {
    debug_assert!(vars.len() >= 3);

    let chunk_payload = ctx.part(ConfigP).xor_var_per_cut.max(1) + 2;

    if vars.len() <= chunk_payload {
        encode_chunk(ctx.borrow(), &vars, rhs);
        ctx.part_mut(XorsP).push(Xor { vars, rhs });
        return;
    }

    // Cut into chunks of at most `chunk_payload` variables, chained by fresh connector
    // variables. Every chunk has an even parity except the last one, which carries the right
    // hand side.
    let mut rest = &vars[..];
    let mut carry: Option<Var> = None;

    while !rest.is_empty() {
        let mut chunk: Vec<Var> = vec![];
        chunk.extend(carry.take());

        let capacity = chunk_payload - chunk.len();
        let fits = rest.len() <= capacity;
        let take = if fits { rest.len() } else { capacity - 1 };
        chunk.extend_from_slice(&rest[..take]);
        rest = &rest[take..];

        let chunk_rhs = if fits {
            rhs
        } else {
            let connector = variables::new_bva_var(ctx.borrow());
            let connector = ctx.part(VariablesP).inter_from_outer(connector);
            chunk.push(connector);
            carry = Some(connector);
            false
        };

        let mut chunk_rhs = chunk_rhs;
        normalize_vars(&mut chunk, &mut chunk_rhs);
        encode_chunk(ctx.borrow(), &chunk, chunk_rhs);
        ctx.part_mut(XorsP).push(Xor {
            vars: chunk,
            rhs: chunk_rhs,
        });
    }
}

/// Emit the `2^(n-1)` clauses of one parity chunk.
fn encode_chunk<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BnnsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut WatchlistsP,
    ),
    vars: &[Var],
    rhs: bool,
) {
    debug_assert!(vars.len() < 32);

    let mut lits = Vec::with_capacity(vars.len());

    for negations in 0u32..(1 << vars.len()) {
        // A clause belongs to the encoding when the parity of its negations differs from the
        // right hand side.
        if (negations.count_ones() & 1 == 1) == rhs {
            continue;
        }

        lits.clear();
        for (bit, &var) in vars.iter().enumerate() {
            lits.push(var.lit((negations >> bit) & 1 == 1));
        }

        admit::add_clause_int(ctx.borrow(), &lits, false, admit::ClauseSource::Derived);
        if !ctx.part(SolverStateP).ok {
            return;
        }
    }
}

/// Whether a clause is the clausal shadow of the given XOR constraint.
///
/// The clause must have the same variable set and its negation parity must be compatible with
/// the right hand side.
pub fn clause_shadows_xor(xor: &Xor, clause_lits: &[Lit]) -> bool {
    if clause_lits.len() != xor.vars.len() {
        return false;
    }

    let mut negations = 0usize;
    for &lit in clause_lits.iter() {
        if !xor.vars.contains(&lit.var()) {
            return false;
        }
        negations += lit.is_negative() as usize;
    }

    (negations & 1 == 1) != xor.rhs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_cancels_pairs() {
        let mut vars: Vec<Var> = [3, 1, 2, 1, 3].iter().map(|&i| Var::from_index(i)).collect();
        let mut rhs = true;
        normalize_vars(&mut vars, &mut rhs);
        assert_eq!(vars, vec![Var::from_index(2)]);
        assert!(rhs);
    }

    #[test]
    fn shadow_check_matches_parity() {
        let xor = Xor {
            vars: vec![Var::from_index(0), Var::from_index(1), Var::from_index(2)],
            rhs: true,
        };

        // x0 ⊕ x1 ⊕ x2 = 1 contains the all-positive clause.
        let clause: Vec<Lit> = xor.vars.iter().map(|&v| v.positive()).collect();
        assert!(clause_shadows_xor(&xor, &clause));

        // A single negation flips the parity out of the encoding.
        let mut wrong = clause.clone();
        wrong[0] = !wrong[0];
        assert!(!clause_shadows_xor(&xor, &wrong));

        // Two negations are part of the encoding again.
        let mut right = clause.clone();
        right[0] = !right[0];
        right[1] = !right[1];
        assert!(clause_shadows_xor(&xor, &right));
    }
}
