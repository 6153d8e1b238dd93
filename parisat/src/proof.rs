//! Proof trace emission.
//!
//! Every clause carries an ID that is unique and strictly increasing within the solver instance.
//! IDs are allocated even when no trace is written, as they double as stable clause identities.
//!
//! The trace is totally ordered. Every `add` (or `orig`) record is eventually matched by exactly
//! one `del` or `finalcl` record; the finalization trailer emitted at the end of a solve closes
//! all still-live clauses.
use std::io::{sink, BufWriter, Write};

use partial_ref::{partial, PartialRef};

use parisat_formula::{Lit, Var};
use parisat_internal_proof::{text_format, ClauseId, ProofStep};

use crate::clause::db;
use crate::context::{parts::*, Context};
use crate::equiv;
use crate::state::SatState;

/// Proof trace emission.
pub struct Proof<'a> {
    target: BufWriter<Box<dyn Write + 'a>>,
    enabled: bool,
    /// The next clause ID to hand out. IDs start at 1.
    next_id: ClauseId,
    /// Proof ID of the unit clause per outer variable, 0 when there is none.
    unit_ids: Vec<ClauseId>,
}

impl<'a> Default for Proof<'a> {
    fn default() -> Proof<'a> {
        Proof {
            target: BufWriter::new(Box::new(sink())),
            enabled: false,
            next_id: 1,
            unit_ids: vec![],
        }
    }
}

macro_rules! handle_io_errors {
    ($s:expr, $e:expr) => {{
        let res = $e;
        $s.handle_io_errors(res)
    }};
}

impl<'a> Proof<'a> {
    /// Start writing the proof trace to the given target.
    pub fn write_proof(&mut self, target: impl Write + 'a) {
        self.enabled = true;
        self.target = BufWriter::new(Box::new(target));
    }

    /// Stop writing the proof trace.
    ///
    /// This also flushes internal buffers and closes the target file.
    pub fn close_proof(&mut self) {
        // We need to explicitly flush to handle IO errors.
        handle_io_errors!(self, self.target.flush());
        self.enabled = false;
        self.target = BufWriter::new(Box::new(sink()));
    }

    /// Whether trace records are written.
    pub fn is_active(&self) -> bool {
        self.enabled
    }

    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.unit_ids.resize(count, 0);
    }

    /// Proof ID of the unit clause of an outer variable, if any.
    pub fn unit_id(&self, outer: Var) -> Option<ClauseId> {
        match self.unit_ids.get(outer.index()) {
            Some(0) | None => None,
            Some(&id) => Some(id),
        }
    }

    /// Flush buffered records, called at phase boundaries.
    pub fn flush(&mut self) {
        handle_io_errors!(self, self.target.flush());
    }

    fn write_step(&mut self, step: &ProofStep) {
        if self.enabled {
            handle_io_errors!(self, text_format::write_step(&mut self.target, step));
        }
    }

    /// Handles IO errors.
    ///
    /// Right now this panics. In the future it should set an error flag that will be checked in
    /// the solver main loop to abort when proof writing failed.
    fn handle_io_errors<V, E: std::fmt::Debug>(&self, result: Result<V, E>) -> Option<V> {
        Some(result.expect("unable to write to proof file"))
    }
}

/// Allocate the next clause ID.
pub fn next_id<'a>(mut ctx: partial!(Context<'a>, mut ProofP<'a>)) -> ClauseId {
    let proof = ctx.part_mut(ProofP);
    let id = proof.next_id;
    proof.next_id += 1;
    id
}

/// Translate inter literals to the outer namespace for the trace.
fn outer_lits<'a>(
    mut ctx: partial!(Context<'a>, ProofP<'a>, VariablesP),
    lits: &[Lit],
) -> Vec<Lit> {
    let variables = ctx.part(VariablesP);
    lits.iter()
        .map(|&lit| variables.outer_from_inter_lit(lit))
        .collect()
}

/// Record an admitted clause for provenance.
pub fn emit_orig<'a>(
    mut ctx: partial!(Context<'a>, mut ProofP<'a>, VariablesP),
    id: ClauseId,
    lits: &[Lit],
) {
    if !ctx.part(ProofP).is_active() {
        return;
    }
    let clause = outer_lits(ctx.borrow(), lits);
    ctx.part_mut(ProofP)
        .write_step(&ProofStep::OrigClause { id, clause: &clause });
}

/// Record a derived clause.
pub fn emit_add<'a>(
    mut ctx: partial!(Context<'a>, mut ProofP<'a>, VariablesP),
    id: ClauseId,
    lits: &[Lit],
) {
    if !ctx.part(ProofP).is_active() {
        return;
    }
    let clause = outer_lits(ctx.borrow(), lits);
    ctx.part_mut(ProofP)
        .write_step(&ProofStep::AddClause { id, clause: &clause });
}

/// Record the retraction of a clause.
pub fn emit_del<'a>(
    mut ctx: partial!(Context<'a>, mut ProofP<'a>, VariablesP),
    id: ClauseId,
    lits: &[Lit],
) {
    if !ctx.part(ProofP).is_active() {
        return;
    }
    let clause = outer_lits(ctx.borrow(), lits);
    ctx.part_mut(ProofP)
        .write_step(&ProofStep::DeleteClause { id, clause: &clause });
}

/// Record the final state of a clause that is live at the end of a solve.
pub fn emit_final<'a>(
    mut ctx: partial!(Context<'a>, mut ProofP<'a>, VariablesP),
    id: ClauseId,
    lits: &[Lit],
) {
    if !ctx.part(ProofP).is_active() {
        return;
    }
    let clause = outer_lits(ctx.borrow(), lits);
    ctx.part_mut(ProofP)
        .write_step(&ProofStep::FinalClause { id, clause: &clause });
}

/// Record a derived clause that is already expressed in outer literals.
pub fn emit_add_outer<'a>(
    mut ctx: partial!(Context<'a>, mut ProofP<'a>),
    id: ClauseId,
    outer_lits: &[Lit],
) {
    ctx.part_mut(ProofP).write_step(&ProofStep::AddClause {
        id,
        clause: outer_lits,
    });
}

/// Record the retraction of a clause that is already expressed in outer literals.
pub fn emit_del_outer<'a>(
    mut ctx: partial!(Context<'a>, mut ProofP<'a>),
    id: ClauseId,
    outer_lits: &[Lit],
) {
    ctx.part_mut(ProofP).write_step(&ProofStep::DeleteClause {
        id,
        clause: outer_lits,
    });
}

/// Record a derived unit clause for a literal newly assigned at level 0.
///
/// Allocates and records the variable's unit ID unless it already has one.
pub fn emit_unit<'a>(
    mut ctx: partial!(Context<'a>, mut ProofP<'a>, VariablesP),
    lit: Lit,
) {
    let outer = ctx.part(VariablesP).outer_from_inter_lit(lit);
    let proof = ctx.part_mut(ProofP);
    if proof.unit_ids[outer.index()] != 0 {
        return;
    }
    let id = proof.next_id;
    proof.next_id += 1;
    proof.unit_ids[outer.index()] = id;
    proof.write_step(&ProofStep::AddClause {
        id,
        clause: &[outer],
    });
}

/// Write a comment line into the trace.
pub fn emit_comment<'a>(mut ctx: partial!(Context<'a>, mut ProofP<'a>), text: &str) {
    let proof = ctx.part_mut(ProofP);
    if proof.enabled {
        let result = text_format::write_comment(&mut proof.target, text);
        proof.handle_io_errors(result);
    }
}

/// Emit the finalization trailer at the end of a solve.
///
/// Order: variable-replacer internal clauses, Gaussian matrix residuals, the empty clause when
/// unsat was derived, unit clauses, binary clauses, long redundant clauses, long irredundant
/// clauses.
pub fn write_final_trace<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ProofP<'a>,
        mut VarReplacerP,
        AssignmentP,
        ClauseAllocP,
        ClauseDbP,
        GaussP,
        SolverStateP,
        TrailP,
        VariablesP,
        WatchlistsP,
    ),
) {
    if !ctx.part(ProofP).is_active() {
        return;
    }

    emit_comment(ctx.borrow(), "finalization start");

    equiv::delete_frat_cls(ctx.borrow());

    // The Gaussian layer owns no live clauses: derived units were already recorded through the
    // unit path and rejected matrices left nothing behind.
    emit_comment(ctx.borrow(), "gauss residuals");

    if ctx.part(SolverStateP).sat_state == SatState::Unsat {
        if let Some(unsat_id) = ctx.part(SolverStateP).unsat_id {
            ctx.part_mut(ProofP).write_step(&ProofStep::FinalClause {
                id: unsat_id,
                clause: &[],
            });
        }
    }

    // Unit clauses.
    let unit_finals: Vec<(ClauseId, Lit)> = {
        let variables = ctx.part(VariablesP);
        let assignment = ctx.part(AssignmentP);
        let proof = ctx.part(ProofP);
        (0..variables.count())
            .filter_map(|outer_index| {
                let outer = Var::from_index(outer_index);
                let id = proof.unit_id(outer)?;
                let inter = variables.inter_from_outer(outer);
                let value = assignment.var_value(inter)?;
                Some((id, outer.lit(value)))
            })
            .collect()
    };
    for (id, lit) in unit_finals {
        ctx.part_mut(ProofP).write_step(&ProofStep::FinalClause {
            id,
            clause: &[lit],
        });
    }

    // Binary clauses.
    for (lits, _red, id) in ctx.part(WatchlistsP).collect_binaries() {
        let clause = outer_lits(ctx.borrow(), &lits);
        ctx.part_mut(ProofP)
            .write_step(&ProofStep::FinalClause { id, clause: &clause });
    }

    // Long clauses, redundant tiers first.
    let mut crefs = vec![];
    {
        let mut seen = hashbrown::HashSet::new();
        let alloc = ctx.part(ClauseAllocP);
        let clause_db = ctx.part(ClauseDbP);
        for &tier in &[
            db::Tier::Core,
            db::Tier::Mid,
            db::Tier::Local,
            db::Tier::Irred,
        ] {
            for &cref in clause_db.by_tier[tier as usize].iter() {
                let header = alloc.header(cref);
                if !header.deleted() && header.tier() == tier && seen.insert(cref) {
                    crefs.push(cref);
                }
            }
        }
    }
    for cref in crefs {
        let (id, lits) = {
            let clause = ctx.part(ClauseAllocP).clause(cref);
            (clause.header().id(), clause.lits().to_vec())
        };
        emit_final(ctx.borrow(), id, &lits);
    }

    ctx.part_mut(ProofP).flush();
}
