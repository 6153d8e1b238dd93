//! Textual framing of the proof trace.
//!
//! Each record is one line: an opcode, the clause ID, the clause literals in DIMACS encoding and
//! a terminating `0`. The newline acts as the record separator. Lines that start with anything
//! other than a known opcode are comments and must be tolerated by readers.
use std::io::{self, Write};

use parisat_formula::Lit;

use crate::ProofStep;

/// Opcode of an original clause record.
pub const ORIG: &[u8] = b"o";
/// Opcode of an added clause record.
pub const ADD: &[u8] = b"a";
/// Opcode of a deleted clause record.
pub const DELETE: &[u8] = b"d";
/// Opcode of a finalized clause record.
pub const FINAL: &[u8] = b"f";

/// Write a single proof record.
pub fn write_step(target: &mut impl Write, step: &ProofStep) -> io::Result<()> {
    let opcode = match step {
        ProofStep::OrigClause { .. } => ORIG,
        ProofStep::AddClause { .. } => ADD,
        ProofStep::DeleteClause { .. } => DELETE,
        ProofStep::FinalClause { .. } => FINAL,
    };

    target.write_all(opcode)?;
    target.write_all(b" ")?;
    itoa::write(&mut *target, step.id())?;
    write_lits(target, step.clause())?;
    target.write_all(b" 0\n")
}

/// Write a comment line.
///
/// The text must not contain a newline.
pub fn write_comment(target: &mut impl Write, text: &str) -> io::Result<()> {
    debug_assert!(!text.contains('\n'));
    target.write_all(b"c ")?;
    target.write_all(text.as_bytes())?;
    target.write_all(b"\n")
}

fn write_lits(target: &mut impl Write, lits: &[Lit]) -> io::Result<()> {
    for &lit in lits {
        target.write_all(b" ")?;
        itoa::write(&mut *target, lit.to_dimacs())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parisat_formula::Var;

    #[test]
    fn records_are_line_framed() {
        let x = Var::from_index(0).positive();
        let y = Var::from_index(1).negative();

        let mut buf = vec![];
        write_step(
            &mut buf,
            &ProofStep::OrigClause {
                id: 1,
                clause: &[x, y],
            },
        )
        .unwrap();
        write_comment(&mut buf, "phase boundary").unwrap();
        write_step(
            &mut buf,
            &ProofStep::FinalClause {
                id: 1,
                clause: &[x, y],
            },
        )
        .unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "o 1 1 -2 0\nc phase boundary\nf 1 1 -2 0\n");
    }
}
