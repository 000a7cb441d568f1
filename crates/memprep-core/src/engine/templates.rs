use crate::core::models::residue::is_water_name;
use phf::{Map, phf_map};

/// Heavy atoms expected in each standard amino acid (terminal OXT excluded).
static HEAVY_ATOMS: Map<&'static str, &'static [&'static str]> = phf_map! {
    "ALA" => &["N", "CA", "C", "O", "CB"],
    "ARG" => &["N", "CA", "C", "O", "CB", "CG", "CD", "NE", "CZ", "NH1", "NH2"],
    "ASN" => &["N", "CA", "C", "O", "CB", "CG", "OD1", "ND2"],
    "ASP" => &["N", "CA", "C", "O", "CB", "CG", "OD1", "OD2"],
    "CYS" => &["N", "CA", "C", "O", "CB", "SG"],
    "GLN" => &["N", "CA", "C", "O", "CB", "CG", "CD", "OE1", "NE2"],
    "GLU" => &["N", "CA", "C", "O", "CB", "CG", "CD", "OE1", "OE2"],
    "GLY" => &["N", "CA", "C", "O"],
    "HIS" => &["N", "CA", "C", "O", "CB", "CG", "ND1", "CD2", "CE1", "NE2"],
    "ILE" => &["N", "CA", "C", "O", "CB", "CG1", "CG2", "CD1"],
    "LEU" => &["N", "CA", "C", "O", "CB", "CG", "CD1", "CD2"],
    "LYS" => &["N", "CA", "C", "O", "CB", "CG", "CD", "CE", "NZ"],
    "MET" => &["N", "CA", "C", "O", "CB", "CG", "SD", "CE"],
    "PHE" => &["N", "CA", "C", "O", "CB", "CG", "CD1", "CD2", "CE1", "CE2", "CZ"],
    "PRO" => &["N", "CA", "C", "O", "CB", "CG", "CD"],
    "SER" => &["N", "CA", "C", "O", "CB", "OG"],
    "THR" => &["N", "CA", "C", "O", "CB", "OG1", "CG2"],
    "TRP" => &["N", "CA", "C", "O", "CB", "CG", "CD1", "CD2", "NE1", "CE2", "CE3", "CZ2", "CZ3", "CH2"],
    "TYR" => &["N", "CA", "C", "O", "CB", "CG", "CD1", "CD2", "CE1", "CE2", "CZ", "OH"],
    "VAL" => &["N", "CA", "C", "O", "CB", "CG1", "CG2"],
};

pub fn heavy_atoms(canonical: &str) -> Option<&'static [&'static str]> {
    HEAVY_ATOMS.get(canonical).copied()
}

/// Hydrogen-bonding capability of a polar atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolarRole {
    pub donor: bool,
    pub acceptor: bool,
}

const DONOR: PolarRole = PolarRole {
    donor: true,
    acceptor: false,
};
const ACCEPTOR: PolarRole = PolarRole {
    donor: false,
    acceptor: true,
};
const BOTH: PolarRole = PolarRole {
    donor: true,
    acceptor: true,
};

/// Classifies an N or O atom by its hydrogen-bonding role.
///
/// `canonical` is the standard residue name. Atoms of unknown residues (waters,
/// ligands, lipids) are treated as both donor and acceptor.
pub fn polar_role(canonical: &str, atom_name: &str) -> PolarRole {
    match (canonical, atom_name) {
        (residue, _) if is_water_name(residue) => BOTH,
        (_, "N") => DONOR,
        (_, "O" | "OXT") => ACCEPTOR,
        ("ASP", "OD1" | "OD2") | ("GLU", "OE1" | "OE2") => ACCEPTOR,
        ("ASN", "OD1") | ("GLN", "OE1") => ACCEPTOR,
        ("ASN", "ND2") | ("GLN", "NE2") => DONOR,
        ("LYS", "NZ") | ("ARG", "NE" | "NH1" | "NH2") | ("TRP", "NE1") => DONOR,
        ("HIS", "ND1" | "NE2") => BOTH,
        ("SER", "OG") | ("THR", "OG1") | ("TYR", "OH") => BOTH,
        _ => BOTH,
    }
}
