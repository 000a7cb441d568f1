use super::ids::{AtomId, ChainId};
use phf::{Set, phf_set};
use std::collections::HashMap;

/// Residue names recognized as amino acids, including the protonation and tautomer
/// variants produced by preparation tools (AMBER and CHARMM naming).
static AMINO_ACID_NAMES: Set<&'static str> = phf_set! {
    "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE",
    "LEU", "LYS", "MET", "PHE", "PRO", "SER", "THR", "TRP", "TYR", "VAL",
    // Protonation / tautomer variants
    "ASH", "GLH", "HID", "HIE", "HIP", "HSD", "HSE", "HSP", "LYN", "CYX",
    "CYM", "ARN", "TYM",
    // Common modified residues kept as protein
    "MSE", "SEP", "TPO", "PTR",
};

static WATER_NAMES: Set<&'static str> = phf_set! {
    "HOH", "WAT", "H2O", "TIP", "TIP3", "SOL", "DOD",
};

static BACKBONE_ATOM_NAMES: Set<&'static str> = phf_set! {
    "N", "CA", "C", "O", "OXT", "H", "HA", "HA2", "HA3", "H1", "H2", "H3", "HN",
};

pub fn is_amino_acid_name(name: &str) -> bool {
    AMINO_ACID_NAMES.contains(name.trim())
}

pub fn is_water_name(name: &str) -> bool {
    WATER_NAMES.contains(name.trim())
}

pub fn is_backbone_atom_name(name: &str) -> bool {
    BACKBONE_ATOM_NAMES.contains(name.trim())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Residue {
    pub number: isize,                      // Residue sequence number from source file
    pub insertion_code: Option<char>,       // PDB insertion code, if any
    pub name: String,                       // Name of the residue (e.g., "ALA", "HIE")
    pub chain_id: ChainId,                  // ID of the parent chain
    pub is_hetero: bool,                    // Read from a HETATM record
    pub(crate) atoms: Vec<AtomId>,          // Ordered atoms belonging to this residue
    atom_name_map: HashMap<String, AtomId>, // Map from atom name to its stable ID
}

impl Residue {
    pub(crate) fn new(
        number: isize,
        insertion_code: Option<char>,
        name: &str,
        chain_id: ChainId,
        is_hetero: bool,
    ) -> Self {
        Self {
            number,
            insertion_code,
            name: name.to_string(),
            chain_id,
            is_hetero,
            atoms: Vec::new(),
            atom_name_map: HashMap::new(),
        }
    }

    pub(crate) fn add_atom(&mut self, atom_name: &str, atom_id: AtomId) {
        self.atoms.push(atom_id);
        self.atom_name_map.insert(atom_name.to_string(), atom_id);
    }

    pub(crate) fn remove_atom(&mut self, atom_name: &str, atom_id: AtomId) {
        self.atoms.retain(|&id| id != atom_id);
        if self.atom_name_map.get(atom_name) == Some(&atom_id) {
            self.atom_name_map.remove(atom_name);
        }
    }

    pub(crate) fn rename_atom(&mut self, old_name: &str, new_name: &str, atom_id: AtomId) {
        if self.atom_name_map.get(old_name) == Some(&atom_id) {
            self.atom_name_map.remove(old_name);
        }
        self.atom_name_map.insert(new_name.to_string(), atom_id);
    }

    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    pub fn get_atom_id_by_name(&self, name: &str) -> Option<AtomId> {
        self.atom_name_map.get(name).copied()
    }

    pub fn is_amino_acid(&self) -> bool {
        is_amino_acid_name(&self.name)
    }

    pub fn is_water(&self) -> bool {
        is_water_name(&self.name)
    }

    /// Formats the residue as `NAME number[icode]`, e.g. `HIS 57A`.
    pub fn label(&self) -> String {
        match self.insertion_code {
            Some(icode) => format!("{} {}{}", self.name, self.number, icode),
            None => format!("{} {}", self.name, self.number),
        }
    }
}
