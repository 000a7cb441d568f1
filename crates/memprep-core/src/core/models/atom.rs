use super::ids::ResidueId;
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Chemical element of an atom.
///
/// Only the elements that matter for protein preparation get their own variant;
/// everything else is carried as [`Element::Other`] with its upper-cased symbol so
/// it survives a read/write cycle unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Element {
    H,
    C,
    N,
    O,
    S,
    P,
    Se,
    Other(String),
    #[default]
    Unknown,
}

impl Element {
    /// Returns the element symbol as written in the PDB element column.
    pub fn symbol(&self) -> &str {
        match self {
            Element::H => "H",
            Element::C => "C",
            Element::N => "N",
            Element::O => "O",
            Element::S => "S",
            Element::P => "P",
            Element::Se => "SE",
            Element::Other(symbol) => symbol,
            Element::Unknown => "",
        }
    }

    pub fn is_hydrogen(&self) -> bool {
        matches!(self, Element::H)
    }

    /// Guesses the element from a PDB atom name when the element column is blank.
    ///
    /// Leading digits are skipped (`1HB` → `H`), and the first alphabetic character
    /// decides, with the exception of selenium in selenomethionine (`SE`).
    pub fn infer_from_atom_name(name: &str) -> Self {
        let trimmed = name.trim_start_matches(|c: char| c.is_ascii_digit());
        if trimmed.eq_ignore_ascii_case("SE") {
            return Element::Se;
        }
        match trimmed.chars().next() {
            Some(c) => Element::from_str(&c.to_string()).unwrap_or_default(),
            None => Element::Unknown,
        }
    }
}

impl FromStr for Element {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let symbol = s.trim().to_ascii_uppercase();
        match symbol.as_str() {
            "" => Err(()),
            "H" | "D" => Ok(Element::H),
            "C" => Ok(Element::C),
            "N" => Ok(Element::N),
            "O" => Ok(Element::O),
            "S" => Ok(Element::S),
            "P" => Ok(Element::P),
            "SE" => Ok(Element::Se),
            other if other.chars().all(|c| c.is_ascii_alphabetic()) && other.len() <= 2 => {
                Ok(Element::Other(other.to_string()))
            }
            _ => Err(()),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Represents an atom of an atomic model.
///
/// Besides the fixed crystallographic fields, every atom carries an ordered map of
/// free-form attributes (segment identifier, formal charge, anything a collaborator
/// wants to attach). The map is ordered so that serialization stays deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Serial number from the source file (renumbered on write).
    pub serial: usize,
    /// The name of the atom (e.g., "CA", "N", "OD1").
    pub name: String,
    /// Chemical element.
    pub element: Element,
    /// The ID of the parent residue this atom belongs to.
    pub residue_id: ResidueId,
    /// Cartesian coordinates in Angstroms.
    pub position: Point3<f64>,
    /// Crystallographic occupancy.
    pub occupancy: f64,
    /// Isotropic temperature factor.
    pub b_factor: f64,
    /// Alternate location indicator, if the source listed one.
    pub alt_loc: Option<char>,
    /// Arbitrary per-atom attributes, keyed by attribute name.
    pub attributes: BTreeMap<String, String>,
}

impl Atom {
    /// Creates a new `Atom` with unit occupancy and no attributes.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the atom.
    /// * `element` - The chemical element.
    /// * `residue_id` - The ID of the residue this atom belongs to.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(name: &str, element: Element, residue_id: ResidueId, position: Point3<f64>) -> Self {
        Self {
            serial: 0,
            name: name.to_string(),
            element,
            residue_id,
            position,
            occupancy: 1.0,
            b_factor: 0.0,
            alt_loc: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: &str, value: impl Into<String>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn distance_squared(&self, other: &Atom) -> f64 {
        (self.position - other.position).norm_squared()
    }
}
