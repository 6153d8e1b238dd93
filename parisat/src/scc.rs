//! Strongly connected components of the binary implication graph.
//!
//! Every binary clause `(a ∨ b)` contributes the implications `¬a → b` and `¬b → a`. Literals in
//! the same strongly connected component are pairwise equivalent; a component containing both
//! polarities of a variable makes the formula unsatisfiable.
use partial_ref::{partial, PartialRef};

use parisat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::equiv;
use crate::proof;
use crate::state::SatState;
use crate::variables::data::Removed;
use crate::watch::Watcher;

const UNSEEN: u32 = u32::max_value();

/// Tarjan's algorithm state, iterative to cope with deep implication chains.
struct SccSearch {
    index: Vec<u32>,
    lowlink: Vec<u32>,
    on_stack: Vec<bool>,
    stack: Vec<u32>,
    next_index: u32,
    components: Vec<Vec<Lit>>,
}

impl SccSearch {
    fn new(lit_count: usize) -> SccSearch {
        SccSearch {
            index: vec![UNSEEN; lit_count],
            lowlink: vec![UNSEEN; lit_count],
            on_stack: vec![false; lit_count],
            stack: vec![],
            next_index: 0,
            components: vec![],
        }
    }

    fn run(&mut self, root: u32, successors: &impl Fn(u32) -> Vec<u32>) {
        if self.index[root as usize] != UNSEEN {
            return;
        }

        // Explicit DFS frames: node and position in its successor list.
        let mut frames: Vec<(u32, Vec<u32>, usize)> = vec![(root, successors(root), 0)];

        self.index[root as usize] = self.next_index;
        self.lowlink[root as usize] = self.next_index;
        self.next_index += 1;
        self.stack.push(root);
        self.on_stack[root as usize] = true;

        while let Some((node, succs, pos)) = frames.last_mut() {
            if let Some(&next) = succs.get(*pos) {
                *pos += 1;
                if self.index[next as usize] == UNSEEN {
                    self.index[next as usize] = self.next_index;
                    self.lowlink[next as usize] = self.next_index;
                    self.next_index += 1;
                    self.stack.push(next);
                    self.on_stack[next as usize] = true;
                    frames.push((next, successors(next), 0));
                } else if self.on_stack[next as usize] {
                    let node = *node;
                    self.lowlink[node as usize] =
                        self.lowlink[node as usize].min(self.index[next as usize]);
                }
            } else {
                let node = *node;
                frames.pop();

                if let Some((parent, _, _)) = frames.last() {
                    let parent = *parent;
                    self.lowlink[parent as usize] =
                        self.lowlink[parent as usize].min(self.lowlink[node as usize]);
                }

                if self.lowlink[node as usize] == self.index[node as usize] {
                    let mut component = vec![];
                    loop {
                        let member = self.stack.pop().unwrap();
                        self.on_stack[member as usize] = false;
                        component.push(Lit::from_code(member as usize));
                        if member == node {
                            break;
                        }
                    }
                    if component.len() > 1 {
                        self.components.push(component);
                    }
                }
            }
        }
    }
}

/// Find equivalent literals and replace them when enough were discovered.
///
/// Replacement only happens when at least `min_found` variables can be collapsed, unless
/// `min_found` is zero. Returns the solver's `ok` flag.
pub fn find_equivs_and_replace<'a>(
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
        mut VarReplacerP,
        mut VsidsP,
        mut WatchlistsP,
        mut XorsP,
    ),
    min_found: usize,
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
    debug_assert!(ctx.part(TrailP).fully_propagated());

    let lit_count = ctx.part(WatchlistsP).len();
    let mut search = SccSearch::new(lit_count);

    {
        let watchlists = ctx.part(WatchlistsP);
        let successors = |code: u32| -> Vec<u32> {
            watchlists
                .watched_by(Lit::from_code(code as usize))
                .iter()
                .filter_map(|watch| match watch {
                    Watcher::Binary { implied, .. } => Some(implied.code() as u32),
                    _ => None,
                })
                .collect()
        };

        for code in 0..lit_count {
            search.run(code as u32, &successors);
        }
    }

    // Translate components into replacement pairs over outer variables.
    let mut pairs: Vec<(Var, Lit)> = vec![];

    for component in search.components.iter() {
        let rep = *component.iter().min().unwrap();

        if component.iter().any(|&lit| component.contains(&!lit)) {
            // l and ¬l equivalent: the formula is contradictory.
            let id = proof::next_id(ctx.borrow());
            proof::emit_add(ctx.borrow(), id, &[]);
            let state = ctx.part_mut(SolverStateP);
            state.ok = false;
            state.sat_state = SatState::Unsat;
            if state.unsat_id.is_none() {
                state.unsat_id = Some(id);
            }
            return false;
        }

        let variables = ctx.part(VariablesP);
        let rep_outer = variables.outer_from_inter_lit(rep);

        for &lit in component.iter() {
            if lit == rep {
                continue;
            }
            let outer = variables.outer_from_inter_lit(lit);
            if variables.var_data(outer.var()).removed != Removed::None {
                continue;
            }
            // Assumption variables keep their own identity for the current solve call.
            if variables.var_data(outer.var()).assumed.is_some() {
                continue;
            }
            if pairs.iter().any(|&(var, _)| var == outer.var()) {
                continue;
            }
            // lit ≡ rep, so var(lit) ≡ rep with lit's sign folded in.
            pairs.push((outer.var(), rep_outer ^ outer.is_negative()));
        }
    }

    log::debug!("scc-vrepl found {} replaceable variables", pairs.len());

    if pairs.is_empty() || (min_found > 0 && pairs.len() < min_found) {
        return ctx.part(SolverStateP).ok;
    }

    equiv::perform_replacements(ctx.borrow(), &pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parisat_formula::{lits, vars};

    use crate::admit::add_clause_outside;

    #[test]
    fn equivalence_chain_collapses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        // x1 ↔ x2 ↔ x3
        add_clause_outside(ctx.borrow(), &lits![1, -2], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-1, 2], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![2, -3], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-2, 3], false).unwrap();

        let ok = find_equivs_and_replace(ctx.borrow(), 0);
        assert!(ok);

        let replacer = ctx.part(VarReplacerP);
        let rep = replacer.replaced_with(lits![2][0]);
        assert_eq!(rep, lits![1][0]);
        assert_eq!(replacer.replaced_with(lits![3][0]), lits![1][0]);
        assert_eq!(replacer.replaced_count(), 2);

        // Both equivalences are observable as binary xors.
        let xors = replacer.binary_xors();
        assert_eq!(xors.len(), 2);

        // All binary clauses expressing the equivalences collapsed away.
        assert_eq!(ctx.part(WatchlistsP).binary_count(), 0);

        for &var in vars![2, 3].iter() {
            assert_eq!(ctx.part(VariablesP).var_data(var).removed, Removed::Replaced);
        }
    }

    #[test]
    fn contradictory_cycle_is_unsat() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        // x1 → x2 → ¬x1 and ¬x1 → x2? Build x1 ↔ ¬x2 and x1 ↔ x2.
        add_clause_outside(ctx.borrow(), &lits![1, 2], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-1, -2], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![1, -2], false).unwrap();
        add_clause_outside(ctx.borrow(), &lits![-1, 2], false).unwrap();

        let ok = find_equivs_and_replace(ctx.borrow(), 0);
        assert!(!ok);
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }
}
