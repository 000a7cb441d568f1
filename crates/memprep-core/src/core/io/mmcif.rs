//! mmCIF writer that encodes a [`MolecularSystem`] as a single `_atom_site` loop.
//!
//! Only coordinates and identity columns are emitted; there is no reader, as the
//! pipeline consumes PDB-formatted OPM entries and uses mmCIF purely as an output
//! option for structures whose serials or residue numbers overflow PDB columns.

use crate::core::models::system::MolecularSystem;
use std::io::{self, Write};

const ATOM_SITE_COLUMNS: &[&str] = &[
    "group_PDB",
    "id",
    "type_symbol",
    "label_atom_id",
    "label_alt_id",
    "label_comp_id",
    "label_asym_id",
    "label_seq_id",
    "pdbx_PDB_ins_code",
    "Cartn_x",
    "Cartn_y",
    "Cartn_z",
    "occupancy",
    "B_iso_or_equiv",
    "auth_seq_id",
    "auth_asym_id",
    "pdbx_PDB_model_num",
];

/// Serializes `system` into an mmCIF data block named `data_<block_name>`.
///
/// Atom IDs are renumbered from 1 in traversal order; missing optional values use
/// the mmCIF placeholders `.` and `?`.
pub fn write_system(
    system: &MolecularSystem,
    block_name: &str,
    writer: &mut impl Write,
) -> io::Result<()> {
    writeln!(writer, "data_{}", sanitize_token(block_name))?;
    writeln!(writer, "#")?;
    writeln!(writer, "loop_")?;
    for column in ATOM_SITE_COLUMNS {
        writeln!(writer, "_atom_site.{}", column)?;
    }

    let mut id = 1usize;
    for (_, chain) in system.chains_iter() {
        let asym_id = chain_label(chain.id);
        for &residue_id in chain.residues() {
            let Some(residue) = system.residue(residue_id) else {
                continue;
            };
            for &atom_id in residue.atoms() {
                let Some(atom) = system.atom(atom_id) else {
                    continue;
                };
                let symbol = match atom.element.symbol() {
                    "" => "?",
                    s => s,
                };
                writeln!(
                    writer,
                    "{} {} {} {} {} {} {} {} {} {:.3} {:.3} {:.3} {:.2} {:.2} {} {} 1",
                    if residue.is_hetero { "HETATM" } else { "ATOM" },
                    id,
                    symbol,
                    quote_atom_name(&atom.name),
                    atom.alt_loc.map_or(".".to_string(), |c| c.to_string()),
                    sanitize_token(&residue.name),
                    asym_id,
                    residue.number,
                    residue.insertion_code.map_or("?".to_string(), |c| c.to_string()),
                    atom.position.x,
                    atom.position.y,
                    atom.position.z,
                    atom.occupancy,
                    atom.b_factor,
                    residue.number,
                    asym_id,
                )?;
                id += 1;
            }
        }
    }

    writeln!(writer, "#")?;
    Ok(())
}

fn chain_label(id: char) -> String {
    if id.is_whitespace() {
        ".".to_string()
    } else {
        id.to_string()
    }
}

// Atom names with primes (nucleic acids, some ligands) must be double-quoted.
fn quote_atom_name(name: &str) -> String {
    if name.contains('\'') {
        format!("\"{}\"", name)
    } else {
        sanitize_token(name)
    }
}

fn sanitize_token(token: &str) -> String {
    let cleaned: String = token
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "?".to_string()
    } else {
        cleaned
    }
}
