//! Variable metadata.
use serde::{Deserialize, Serialize};

/// Why a variable no longer takes part in the search.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum Removed {
    /// The variable is live.
    None,
    /// Removed by occurrence based variable elimination.
    Eliminated,
    /// Replaced by its equivalence class representative.
    Replaced,
    /// Removed by component decomposition.
    Decomposed,
}

impl Default for Removed {
    fn default() -> Removed {
        Removed::None
    }
}

/// Metadata for a single variable, indexed by outer variables.
#[derive(Copy, Clone, Default, Serialize, Deserialize)]
pub struct VarData {
    pub removed: Removed,
    /// Value required by the current assumption set, if any.
    pub assumed: Option<bool>,
    /// Whether this variable was introduced by bounded variable addition.
    ///
    /// Such variables have no outside name.
    pub bva: bool,
}

impl VarData {
    pub fn bva_default() -> VarData {
        VarData {
            bva: true,
            ..VarData::default()
        }
    }
}

/// Diagnostic name of a removal kind.
pub fn removed_kind_name(removed: Removed) -> &'static str {
    match removed {
        Removed::None => "none",
        Removed::Eliminated => "eliminated",
        Removed::Replaced => "replaced",
        Removed::Decomposed => "decomposed",
    }
}
