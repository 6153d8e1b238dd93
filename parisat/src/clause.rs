//! Long clause storage.
use std::slice;

use parisat_formula::lit::LitIdx;
use parisat_formula::Lit;

pub mod activity;
pub mod alloc;
pub mod consolidate;
pub mod db;
pub mod header;
pub mod reduce;

pub use activity::ClauseActivity;
pub use alloc::{ClauseAlloc, ClauseRef};
pub use db::{ClauseDb, Tier};
pub use header::ClauseHeader;

use header::HEADER_LEN;

/// A clause stored in the [`ClauseAlloc`].
///
/// This is a dynamically sized type, accessed through [`ClauseRef`] handles.
#[repr(transparent)]
pub struct Clause {
    data: [LitIdx],
}

impl Clause {
    /// The clause's header.
    pub fn header(&self) -> &ClauseHeader {
        unsafe {
            // Safe as ClauseHeader is repr(transparent) over the header prefix
            &*(self.data.as_ptr() as *const ClauseHeader)
        }
    }

    /// Mutable access to the clause's header.
    pub fn header_mut(&mut self) -> &mut ClauseHeader {
        unsafe {
            // Safe as ClauseHeader is repr(transparent) over the header prefix
            &mut *(self.data.as_mut_ptr() as *mut ClauseHeader)
        }
    }

    /// The clause's literals.
    pub fn lits(&self) -> &[Lit] {
        unsafe {
            // Safe as Lit is repr(transparent) over LitIdx
            slice::from_raw_parts(
                self.data.as_ptr().add(HEADER_LEN) as *const Lit,
                self.data.len() - HEADER_LEN,
            )
        }
    }

    /// Mutable access to the clause's literals.
    pub fn lits_mut(&mut self) -> &mut [Lit] {
        unsafe {
            // Safe as Lit is repr(transparent) over LitIdx
            slice::from_raw_parts_mut(
                self.data.as_mut_ptr().add(HEADER_LEN) as *mut Lit,
                self.data.len() - HEADER_LEN,
            )
        }
    }
}
