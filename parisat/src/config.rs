//! Solver configuration.

/// Configurable parameters used during solving.
///
/// The inprocessing schedules are comma separated token strings interpreted by the strategy
/// interpreter (see [`crate::strategy`]).
#[derive(Clone)]
pub struct SolverConfig {
    /// Multiplicative decay for the VSIDS decision heuristic.
    pub vsids_decay: f32,

    /// Multiplicative decay for clause activities.
    pub clause_activity_decay: f32,

    /// Scaling factor for luby sequence based restarts (number of conflicts).
    pub luby_restart_interval_scale: u64,

    /// Number of conflicts between local tier clause reductions.
    pub reduce_locals_interval: u64,

    /// Number of conflicts between mid tier clause reductions.
    pub reduce_mids_interval: u64,

    /// Conflict budget of the first search iteration.
    pub search_conflicts: u64,

    /// Growth factor of the per-iteration conflict budget.
    pub search_conflicts_inc: f64,

    /// Upper bound on the budget growth factor.
    pub search_conflicts_inc_max: f64,

    /// Never interleave simplification, search until the global budget runs out.
    pub never_stop_search: bool,

    /// Global conflict budget over all iterations.
    pub max_conflicts: u64,

    /// Wall clock budget for a single solve call in seconds.
    pub max_time: f64,

    /// Learned clauses with a glue up to this value go to the core tier.
    pub glue_core_cutoff: u32,

    /// Learned clauses with a glue up to this value go to the mid tier.
    pub glue_mid_cutoff: u32,

    /// Fraction of conflicts allowed to produce core tier clauses before the core cutoff is
    /// lowered.
    pub adjust_glue_cutoff_above: f64,

    /// Number of conflicts before the glue cutoff adjustment check is enabled.
    pub adjust_glue_cutoff_min_conflicts: u64,

    /// Use recursive minimization for learned clauses.
    pub recursive_minimization: bool,

    /// Disable recursive minimization when it removes less than this fraction of literals.
    pub recursive_minimization_min_gain: f64,

    /// Run inprocessing between search iterations.
    pub do_simplify: bool,

    /// Run a simplification pass before the first search iteration.
    pub simplify_at_startup: bool,

    /// Run the startup simplification on every solve call, not just the first.
    pub simplify_at_every_startup: bool,

    /// Upper bound on simplification passes per solve call.
    pub max_simplify_per_solve: u64,

    /// Inprocessing schedule used at startup.
    pub schedule_startup: String,

    /// Inprocessing schedule used between search iterations.
    pub schedule_nonstartup: String,

    /// Find and replace equivalent literals.
    pub do_equiv_replace: bool,

    /// Distill long clauses by temporary propagation.
    pub do_distill: bool,

    /// Distill binary clauses.
    pub do_distill_bins: bool,

    /// Subsume and strengthen implicit (binary) clauses.
    pub do_str_sub_implicit: bool,

    /// Probe every active variable at level 1.
    pub do_full_probe: bool,

    /// Tree structured probing.
    pub do_intree_probe: bool,

    /// Occurrence based simplification (subsumption, variable elimination).
    pub do_occ_simp: bool,

    /// Bounded variable elimination inside occurrence simplification.
    pub do_bve: bool,

    /// Bounded variable addition inside occurrence simplification.
    pub do_bva: bool,

    /// Blocked clause elimination inside occurrence simplification.
    ///
    /// Once clauses have been blocked no further clauses may be added to the solver.
    pub do_blocked_clause: bool,

    /// Renumber variables when enough of them are dead.
    pub do_renumber: bool,

    /// Renumber on every `renumber` token, ignoring the savings estimate.
    pub must_renumber: bool,

    /// Initialize Gaussian matrices from the XOR store.
    pub do_gauss: bool,

    /// Minimum number of XOR constraints in a Gaussian matrix.
    pub gauss_min_xors: usize,

    /// Number of variables in a cut XOR chunk, on top of the two connecting variables.
    pub xor_var_per_cut: usize,

    /// Run the BreakID symmetry breaker when compiled in.
    pub do_breakid: bool,

    /// Run BreakID on every n-th simplification.
    pub breakid_every_n: u64,

    /// Run the Bosphorus ANF simplifier when compiled in.
    pub do_bosphorus: bool,

    /// Run Bosphorus on every n-th simplification.
    pub bosphorus_every_n: u64,

    /// Search for cardinality constraints.
    pub do_card_find: bool,

    /// Variable elimination may grow the clause count by this many clauses.
    pub bve_growth_limit: usize,

    /// Upper bound on resolvent size during variable elimination.
    pub bve_max_resolvent_len: usize,

    /// Upper bound on clause size considered for XOR recovery.
    pub xor_recover_max_len: usize,

    /// Propagation budget for a single probing pass.
    pub probe_propagation_budget: u64,

    /// Verbosity of `log` output. Zero disables the per-phase summaries.
    pub verbosity: u32,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            vsids_decay: 0.95,
            clause_activity_decay: 0.999,
            luby_restart_interval_scale: 128,
            reduce_locals_interval: 15_000,
            reduce_mids_interval: 10_000,
            search_conflicts: 50_000,
            search_conflicts_inc: 1.4,
            search_conflicts_inc_max: 3.0,
            never_stop_search: false,
            max_conflicts: u64::max_value(),
            max_time: std::f64::INFINITY,
            glue_core_cutoff: 4,
            glue_mid_cutoff: 6,
            adjust_glue_cutoff_above: 0.15,
            adjust_glue_cutoff_min_conflicts: 150_000,
            recursive_minimization: true,
            recursive_minimization_min_gain: 0.04,
            do_simplify: true,
            simplify_at_startup: true,
            simplify_at_every_startup: false,
            max_simplify_per_solve: 25,
            schedule_startup: "sub-impl, occ-backw-sub-str, occ-clean-implicit, occ-bve, \
                               scc-vrepl, sub-cls-with-bin, distill-cls, clean-cls"
                .to_string(),
            schedule_nonstartup: "sub-impl, scc-vrepl, distill-bins, distill-cls, \
                                  sub-str-cls-with-bin, str-impl, occ-backw-sub-str, occ-xor, \
                                  occ-bve, intree-probe, clean-cls, renumber, cl-consolidate"
                .to_string(),
            do_equiv_replace: true,
            do_distill: true,
            do_distill_bins: true,
            do_str_sub_implicit: true,
            do_full_probe: true,
            do_intree_probe: true,
            do_occ_simp: true,
            do_bve: true,
            do_bva: false,
            do_blocked_clause: false,
            do_renumber: true,
            must_renumber: false,
            do_gauss: false,
            gauss_min_xors: 2,
            xor_var_per_cut: 2,
            do_breakid: false,
            breakid_every_n: 8,
            do_bosphorus: false,
            bosphorus_every_n: 8,
            do_card_find: false,
            bve_growth_limit: 0,
            bve_max_resolvent_len: 16,
            xor_recover_max_len: 6,
            probe_propagation_budget: 2_000_000,
            verbosity: 0,
        }
    }
}
