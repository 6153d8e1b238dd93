//! The watch index.
//!
//! For every literal there is one list of watch entries. An entry is either a binary clause
//! (which is stored *only* here, on both of its literals), a long clause watch, an XOR index or a
//! BNN index.
//!
//! Entries are keyed by the literal whose assignment to true requires inspecting the entry. A
//! binary clause `(a, b)` puts `b` into the list of `¬a` and `a` into the list of `¬b`. A long
//! clause is watched on its first two literals, with the watch entries living in the lists of
//! their negations. Whenever the watches of a long clause move, the clause's literals are
//! permuted so the watched literals are in positions 0 and 1.
//!
//! When a clause is not unit under the current assignment, the watched literals point at two
//! non-false literals. When a clause is unit and thus propagating, the true literal is watched
//! and in position 0, the other watched literal is the one with the largest decision level and
//! kept in position 1. When a clause becomes satisfied before becoming unit the watches can be
//! kept as they were. There is no need to update watchlists on backtracking, as unassigning
//! variables cannot invalidate this invariant.
//!
//! Long clause watches carry a blocking literal of the same clause. When the blocking literal is
//! true the clause is satisfied and does not need to be inspected. This variant was introduced by
//! [Niklas Sörensson and Niklas Eén in "MINISAT 2.1 and MINISAT++ 1.0 — SAT Race 2008
//! Editions"][minisat-2.1].
//!
//! XOR entries are only present while XOR constraints are being matched against their clausal
//! shadow (see [`crate::gauss`]). BNN entries are present on both polarities of every literal of
//! a threshold constraint, so any assignment touching the constraint re-evaluates it.
//!
//! [minisat-2.1]: https://www.cril.univ-artois.fr/SAT09/solvers/booklet.pdf
use parisat_formula::Lit;
use parisat_internal_proof::ClauseId;

use crate::clause::ClauseRef;

/// A single watch index entry.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Watcher {
    /// A binary clause `(¬key ∨ implied)`, stored only in watchlists.
    Binary {
        implied: Lit,
        red: bool,
        id: ClauseId,
    },
    /// A watch on a long clause that has the negation of the key in position 0 or 1.
    Long { cref: ClauseRef, blocking: Lit },
    /// An XOR constraint index, used while matching XORs to CNF.
    Xor { idx: u32 },
    /// A threshold constraint index.
    Bnn { idx: u32 },
}

/// The watch index.
#[derive(Default)]
pub struct Watchlists {
    /// Watch entries per literal code.
    watches: Vec<Vec<Watcher>>,
    /// Number of irredundant binary clauses.
    irred_binary_count: usize,
    /// Number of redundant binary clauses.
    red_binary_count: usize,
}

impl Watchlists {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.watches.resize(count * 2, vec![]);
    }

    /// Number of binary clauses.
    pub fn binary_count(&self) -> usize {
        self.irred_binary_count + self.red_binary_count
    }

    /// Number of irredundant binary clauses.
    pub fn irred_binary_count(&self) -> usize {
        self.irred_binary_count
    }

    /// Number of redundant binary clauses.
    pub fn red_binary_count(&self) -> usize {
        self.red_binary_count
    }

    pub(crate) fn adjust_binary_count(&mut self, red: bool, delta: isize) {
        let count = if red {
            &mut self.red_binary_count
        } else {
            &mut self.irred_binary_count
        };
        *count = (*count as isize + delta) as usize;
    }

    /// Return watch entries for a given literal.
    pub fn watched_by(&self, lit: Lit) -> &[Watcher] {
        &self.watches[lit.code()]
    }

    /// Return mutable watch entries for a given literal.
    pub fn watched_by_mut(&mut self, lit: Lit) -> &mut Vec<Watcher> {
        &mut self.watches[lit.code()]
    }

    /// Add a watch entry to a literal's list.
    pub fn add_watch(&mut self, lit: Lit, watch: Watcher) {
        self.watches[lit.code()].push(watch)
    }

    /// Start watching a long clause.
    ///
    /// `lits` have to be the first two literals of the given clause.
    pub fn watch_clause(&mut self, cref: ClauseRef, lits: [Lit; 2]) {
        for i in 0..2 {
            let watch = Watcher::Long {
                cref,
                blocking: lits[i ^ 1],
            };
            self.watches[(!lits[i]).code()].push(watch);
        }
    }

    /// Stop watching a long clause.
    ///
    /// `lits` have to be the currently watched literals of the clause.
    pub fn unwatch_clause(&mut self, cref: ClauseRef, lits: [Lit; 2]) {
        for &lit in lits.iter() {
            self.watches[(!lit).code()].retain(|watch| match watch {
                Watcher::Long { cref: other, .. } => *other != cref,
                _ => true,
            });
        }
    }

    /// Attach a binary clause.
    pub fn add_binary(&mut self, lits: [Lit; 2], red: bool, id: ClauseId) {
        for i in 0..2 {
            let watch = Watcher::Binary {
                implied: lits[i ^ 1],
                red,
                id,
            };
            self.watches[(!lits[i]).code()].push(watch);
        }
        self.adjust_binary_count(red, 1);
    }

    /// Detach a binary clause by its ID.
    ///
    /// Returns whether the clause was present.
    pub fn remove_binary(&mut self, lits: [Lit; 2], id: ClauseId) -> bool {
        let mut removed = false;
        let mut red = false;
        for i in 0..2 {
            let list = &mut self.watches[(!lits[i]).code()];
            if let Some(pos) = list.iter().position(|watch| match watch {
                Watcher::Binary {
                    implied,
                    id: other_id,
                    ..
                } => *other_id == id && *implied == lits[i ^ 1],
                _ => false,
            }) {
                if let Watcher::Binary { red: is_red, .. } = list[pos] {
                    red = is_red;
                }
                list.swap_remove(pos);
                removed = true;
            }
        }
        if removed {
            self.adjust_binary_count(red, -1);
        }
        removed
    }

    /// Attach an XOR constraint index to the watchlist of a variable's positive literal.
    pub fn add_xor_watch(&mut self, lit: Lit, idx: u32) {
        self.watches[lit.code()].push(Watcher::Xor { idx });
    }

    /// Remove all XOR entries from all watchlists.
    pub fn clear_xor_watches(&mut self) {
        for list in self.watches.iter_mut() {
            list.retain(|watch| match watch {
                Watcher::Xor { .. } => false,
                _ => true,
            });
        }
    }

    /// Attach a BNN constraint on both polarities of a literal.
    pub fn add_bnn_watch(&mut self, lit: Lit, idx: u32) {
        self.watches[lit.code()].push(Watcher::Bnn { idx });
        self.watches[(!lit).code()].push(Watcher::Bnn { idx });
    }

    /// Remove all watch entries of a BNN constraint.
    pub fn remove_bnn_watches(&mut self, idx: u32) {
        for list in self.watches.iter_mut() {
            list.retain(|watch| match watch {
                Watcher::Bnn { idx: other } => *other != idx,
                _ => true,
            });
        }
    }

    /// Collect every binary clause exactly once.
    ///
    /// The result contains `(lits, red, id)` entries where `lits` are the two literals of the
    /// clause in unspecified order.
    pub fn collect_binaries(&self) -> Vec<([Lit; 2], bool, ClauseId)> {
        let mut result = vec![];
        for (code, list) in self.watches.iter().enumerate() {
            let key = Lit::from_code(code);
            for watch in list.iter() {
                if let Watcher::Binary { implied, red, id } = watch {
                    // Each binary clause has two entries, pick the one where the clause's first
                    // literal is smaller.
                    if !key < *implied {
                        result.push(([!key, *implied], *red, *id));
                    }
                }
            }
        }
        result
    }

    /// Number of literal slots in the index.
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    /// Rebuild the index through a literal mapping.
    ///
    /// `map` has to be a bijection over the current literal codes.
    pub fn map_lits(&mut self, map: impl Fn(Lit) -> Lit) {
        let mut new_watches = vec![vec![]; self.watches.len()];
        for (code, list) in self.watches.iter_mut().enumerate() {
            let new_key = map(Lit::from_code(code));
            let entries: Vec<_> = list
                .drain(..)
                .map(|watch| match watch {
                    Watcher::Binary { implied, red, id } => Watcher::Binary {
                        implied: map(implied),
                        red,
                        id,
                    },
                    Watcher::Long { cref, blocking } => Watcher::Long {
                        cref,
                        blocking: map(blocking),
                    },
                    other => other,
                })
                .collect();
            new_watches[new_key.code()] = entries;
        }
        self.watches = new_watches;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use parisat_formula::lits;

    #[test]
    fn binary_attachment_is_symmetric() {
        let mut watchlists = Watchlists::default();
        watchlists.set_var_count(4);

        let [a, b] = lits![1, -2];
        watchlists.add_binary([a, b], false, 3);

        assert_eq!(
            watchlists.watched_by(!a),
            &[Watcher::Binary {
                implied: b,
                red: false,
                id: 3
            }]
        );
        assert_eq!(
            watchlists.watched_by(!b),
            &[Watcher::Binary {
                implied: a,
                red: false,
                id: 3
            }]
        );
        assert_eq!(watchlists.binary_count(), 1);
        assert_eq!(watchlists.collect_binaries().len(), 1);

        assert!(watchlists.remove_binary([a, b], 3));
        assert_eq!(watchlists.binary_count(), 0);
        assert!(watchlists.watched_by(!a).is_empty());
        assert!(watchlists.watched_by(!b).is_empty());
    }

    #[test]
    fn bnn_watches_cover_both_polarities() {
        let mut watchlists = Watchlists::default();
        watchlists.set_var_count(3);

        let [l] = lits![2];
        watchlists.add_bnn_watch(l, 0);

        assert_eq!(watchlists.watched_by(l), &[Watcher::Bnn { idx: 0 }]);
        assert_eq!(watchlists.watched_by(!l), &[Watcher::Bnn { idx: 0 }]);

        watchlists.remove_bnn_watches(0);
        assert!(watchlists.watched_by(l).is_empty());
    }
}
