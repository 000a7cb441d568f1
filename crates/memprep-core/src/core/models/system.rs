use super::atom::Atom;
use super::chain::Chain;
use super::ids::{AtomId, ChainId, ResidueId};
use super::residue::Residue;
use slotmap::SlotMap;
use std::collections::HashMap;

type ResidueKey = (ChainId, isize, Option<char>);

/// Represents a complete atomic model with chains, residues, and atoms.
///
/// Storage uses slot maps for stable identifiers, while an explicit chain order and
/// the per-chain / per-residue ordered ID lists define the canonical iteration order.
/// Every traversal helper (`chains_iter`, `residues_iter`, `atoms_iter`) follows that
/// order, which keeps file output deterministic across runs.
#[derive(Debug, Clone, Default)]
pub struct MolecularSystem {
    /// Primary storage for atoms.
    atoms: SlotMap<AtomId, Atom>,
    /// Primary storage for residues.
    residues: SlotMap<ResidueId, Residue>,
    /// Primary storage for chains.
    chains: SlotMap<ChainId, Chain>,
    /// Chains in the order they were first added.
    chain_order: Vec<ChainId>,
    /// Residues sharing a chain, sequence number and insertion code, in insertion order.
    /// More than one entry means distinct residues (e.g. a ligand numbered like an
    /// amino acid) that reuse the same label.
    residue_id_map: HashMap<ResidueKey, Vec<ResidueId>>,
    /// Lookup map for finding chains by their single-character identifier.
    chain_id_map: HashMap<char, ChainId>,
}

impl MolecularSystem {
    /// Creates a new, empty molecular system.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    pub fn residue(&self, id: ResidueId) -> Option<&Residue> {
        self.residues.get(id)
    }

    pub fn residue_mut(&mut self, id: ResidueId) -> Option<&mut Residue> {
        self.residues.get_mut(id)
    }

    pub fn chain(&self, id: ChainId) -> Option<&Chain> {
        self.chains.get(id)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Returns an iterator over chains in insertion order.
    pub fn chains_iter(&self) -> impl Iterator<Item = (ChainId, &Chain)> + '_ {
        self.chain_order
            .iter()
            .filter_map(move |&id| self.chains.get(id).map(|chain| (id, chain)))
    }

    /// Returns an iterator over residues, chain by chain, in insertion order.
    pub fn residues_iter(&self) -> impl Iterator<Item = (ResidueId, &Residue)> + '_ {
        self.chains_iter().flat_map(move |(_, chain)| {
            chain
                .residues
                .iter()
                .filter_map(move |&id| self.residues.get(id).map(|residue| (id, residue)))
        })
    }

    /// Returns an iterator over atoms following the chain → residue → atom order.
    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> + '_ {
        self.residues_iter().flat_map(move |(_, residue)| {
            residue
                .atoms
                .iter()
                .filter_map(move |&id| self.atoms.get(id).map(|atom| (id, atom)))
        })
    }

    /// Looks up an atom of a residue by its name.
    pub fn residue_atom(&self, residue_id: ResidueId, name: &str) -> Option<&Atom> {
        let atom_id = self.residues.get(residue_id)?.get_atom_id_by_name(name)?;
        self.atoms.get(atom_id)
    }

    pub fn find_chain_by_id(&self, id: char) -> Option<ChainId> {
        self.chain_id_map.get(&id).copied()
    }

    pub fn find_residue(
        &self,
        chain_id: ChainId,
        number: isize,
        insertion_code: Option<char>,
    ) -> Option<ResidueId> {
        self.residue_id_map
            .get(&(chain_id, number, insertion_code))
            .and_then(|ids| ids.first())
            .copied()
    }

    /// Adds a new chain to the system or returns the existing one.
    ///
    /// This method is idempotent; a chain identifier seen before maps back to the
    /// same chain, so residues listed after a `TER` record are merged.
    pub fn add_chain(&mut self, id: char) -> ChainId {
        if let Some(&existing) = self.chain_id_map.get(&id) {
            return existing;
        }
        let chain_id = self.chains.insert(Chain::new(id));
        self.chain_id_map.insert(id, chain_id);
        self.chain_order.push(chain_id);
        chain_id
    }

    /// Adds a new residue to a chain or returns the existing one.
    ///
    /// An existing residue is reused only when its name and record type also match;
    /// otherwise a separate residue is created under the same label.
    ///
    /// # Return
    ///
    /// Returns `None` if the chain does not exist.
    pub fn add_residue(
        &mut self,
        chain_id: ChainId,
        number: isize,
        insertion_code: Option<char>,
        name: &str,
        is_hetero: bool,
    ) -> Option<ResidueId> {
        let chain = self.chains.get_mut(chain_id)?;
        let key = (chain_id, number, insertion_code);

        let candidates = self.residue_id_map.entry(key).or_default();
        let existing = candidates.iter().copied().find(|&id| {
            self.residues
                .get(id)
                .is_some_and(|r| r.name == name && r.is_hetero == is_hetero)
        });
        let residue_id = match existing {
            Some(id) => id,
            None => {
                let residue = Residue::new(number, insertion_code, name, chain_id, is_hetero);
                let id = self.residues.insert(residue);
                candidates.push(id);
                id
            }
        };

        if !chain.residues.contains(&residue_id) {
            chain.residues.push(residue_id);
        }

        Some(residue_id)
    }

    /// Adds an atom to a residue, overriding the atom's `residue_id` field.
    ///
    /// # Return
    ///
    /// Returns `None` if the residue does not exist.
    pub fn add_atom_to_residue(&mut self, residue_id: ResidueId, mut atom: Atom) -> Option<AtomId> {
        let residue = self.residues.get_mut(residue_id)?;
        atom.residue_id = residue_id;
        let name = atom.name.clone();
        let atom_id = self.atoms.insert(atom);
        residue.add_atom(&name, atom_id);
        Some(atom_id)
    }

    /// Removes an atom and unregisters it from its residue.
    pub fn remove_atom(&mut self, atom_id: AtomId) -> Option<Atom> {
        let atom = self.atoms.remove(atom_id)?;
        if let Some(residue) = self.residues.get_mut(atom.residue_id) {
            residue.remove_atom(&atom.name, atom_id);
        }
        Some(atom)
    }

    /// Removes a residue with all of its atoms.
    pub fn remove_residue(&mut self, residue_id: ResidueId) -> Option<Residue> {
        let atom_ids = self.residues.get(residue_id)?.atoms.clone();
        for atom_id in atom_ids {
            self.atoms.remove(atom_id);
        }
        let residue = self.residues.remove(residue_id)?;
        if let Some(chain) = self.chains.get_mut(residue.chain_id) {
            chain.residues.retain(|&id| id != residue_id);
        }
        let key = (residue.chain_id, residue.number, residue.insertion_code);
        if let Some(ids) = self.residue_id_map.get_mut(&key) {
            ids.retain(|&id| id != residue_id);
            if ids.is_empty() {
                self.residue_id_map.remove(&key);
            }
        }
        Some(residue)
    }

    fn remove_chain(&mut self, chain_id: ChainId) -> Option<Chain> {
        let chain = self.chains.remove(chain_id)?;
        self.chain_order.retain(|&id| id != chain_id);
        self.chain_id_map.remove(&chain.id);
        Some(chain)
    }

    pub fn rename_residue(&mut self, residue_id: ResidueId, name: &str) -> Option<()> {
        let residue = self.residues.get_mut(residue_id)?;
        residue.name = name.to_string();
        Some(())
    }

    pub fn rename_atom(&mut self, atom_id: AtomId, name: &str) -> Option<()> {
        let atom = self.atoms.get_mut(atom_id)?;
        let old_name = std::mem::replace(&mut atom.name, name.to_string());
        let residue = self.residues.get_mut(atom.residue_id)?;
        residue.rename_atom(&old_name, name, atom_id);
        Some(())
    }

    /// Keeps only the atoms for which `keep` returns `true`.
    ///
    /// Residues and chains left without atoms are removed as well, so the result
    /// never contains empty containers. Relative order of the survivors is unchanged.
    ///
    /// # Return
    ///
    /// The number of atoms removed.
    pub fn retain_atoms<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Atom, &Residue, &Chain) -> bool,
    {
        let mut doomed = Vec::new();
        for (atom_id, atom) in self.atoms_iter() {
            let Some(residue) = self.residues.get(atom.residue_id) else {
                doomed.push(atom_id);
                continue;
            };
            let Some(chain) = self.chains.get(residue.chain_id) else {
                doomed.push(atom_id);
                continue;
            };
            if !keep(atom, residue, chain) {
                doomed.push(atom_id);
            }
        }

        for &atom_id in &doomed {
            self.remove_atom(atom_id);
        }

        let empty_residues: Vec<ResidueId> = self
            .residues
            .iter()
            .filter(|(_, residue)| residue.atoms.is_empty())
            .map(|(id, _)| id)
            .collect();
        for residue_id in empty_residues {
            self.remove_residue(residue_id);
        }

        let empty_chains: Vec<ChainId> = self
            .chains
            .iter()
            .filter(|(_, chain)| chain.residues.is_empty())
            .map(|(id, _)| id)
            .collect();
        for chain_id in empty_chains {
            self.remove_chain(chain_id);
        }

        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Element;
    use nalgebra::Point3;

    fn atom(name: &str, element: Element, x: f64) -> Atom {
        Atom::new(name, element, ResidueId::default(), Point3::new(x, 0.0, 0.0))
    }

    fn two_chain_system() -> MolecularSystem {
        let mut system = MolecularSystem::new();
        let chain_a = system.add_chain('A');
        let ala = system.add_residue(chain_a, 1, None, "ALA", false).unwrap();
        system.add_atom_to_residue(ala, atom("N", Element::N, 0.0)).unwrap();
        system.add_atom_to_residue(ala, atom("CA", Element::C, 1.0)).unwrap();
        let hoh = system.add_residue(chain_a, 2, None, "HOH", true).unwrap();
        system.add_atom_to_residue(hoh, atom("O", Element::O, 5.0)).unwrap();

        let chain_b = system.add_chain('B');
        let gly = system.add_residue(chain_b, 1, None, "GLY", false).unwrap();
        system.add_atom_to_residue(gly, atom("CA", Element::C, 9.0)).unwrap();
        system
    }

    #[test]
    fn add_chain_and_residue_are_idempotent() {
        let mut system = MolecularSystem::new();
        let first = system.add_chain('A');
        let second = system.add_chain('A');
        assert_eq!(first, second);
        assert_eq!(system.chain_count(), 1);

        let r1 = system.add_residue(first, 5, None, "SER", false).unwrap();
        let r2 = system.add_residue(first, 5, None, "SER", false).unwrap();
        let r3 = system.add_residue(first, 5, Some('A'), "SER", false).unwrap();
        assert_eq!(r1, r2);
        assert_ne!(r1, r3);
        assert_eq!(system.chain(first).unwrap().residues().len(), 2);
    }

    #[test]
    fn residues_with_shared_label_but_different_names_stay_separate() {
        let mut system = MolecularSystem::new();
        let chain = system.add_chain('A');
        let ala = system.add_residue(chain, 1, None, "ALA", false).unwrap();
        system.add_atom_to_residue(ala, atom("O", Element::O, 1.0)).unwrap();
        let hoh = system.add_residue(chain, 1, None, "HOH", true).unwrap();
        system.add_atom_to_residue(hoh, atom("O", Element::O, 30.0)).unwrap();

        assert_ne!(ala, hoh);
        assert_eq!(system.add_residue(chain, 1, None, "ALA", false), Some(ala));
        assert_eq!(system.residue_atom(ala, "O").unwrap().position.x, 1.0);
        assert_eq!(system.find_residue(chain, 1, None), Some(ala));

        system.remove_residue(ala).unwrap();
        assert_eq!(system.find_residue(chain, 1, None), Some(hoh));
    }

    #[test]
    fn add_residue_to_missing_chain_returns_none() {
        let mut system = MolecularSystem::new();
        let chain = system.add_chain('A');
        system.remove_chain(chain);
        assert!(system.add_residue(chain, 1, None, "ALA", false).is_none());
    }

    #[test]
    fn atoms_iter_follows_insertion_order() {
        let system = two_chain_system();
        let names: Vec<_> = system
            .atoms_iter()
            .map(|(_, atom)| (atom.name.clone(), atom.position.x))
            .collect();
        assert_eq!(
            names,
            vec![
                ("N".to_string(), 0.0),
                ("CA".to_string(), 1.0),
                ("O".to_string(), 5.0),
                ("CA".to_string(), 9.0)
            ]
        );
    }

    #[test]
    fn retain_atoms_prunes_empty_residues_and_chains() {
        let mut system = two_chain_system();
        let removed = system.retain_atoms(|_, residue, chain| {
            residue.name != "HOH" && chain.id == 'A'
        });

        assert_eq!(removed, 2);
        assert_eq!(system.atom_count(), 2);
        assert_eq!(system.residue_count(), 1);
        assert_eq!(system.chain_count(), 1);
        assert!(system.find_chain_by_id('B').is_none());
        let chain_a = system.find_chain_by_id('A').unwrap();
        assert!(system.find_residue(chain_a, 2, None).is_none());
    }

    #[test]
    fn rename_atom_updates_residue_lookup() {
        let mut system = two_chain_system();
        let chain_a = system.find_chain_by_id('A').unwrap();
        let ala = system.find_residue(chain_a, 1, None).unwrap();
        let ca = system.residue(ala).unwrap().get_atom_id_by_name("CA").unwrap();

        system.rename_atom(ca, "CX").unwrap();

        assert!(system.residue_atom(ala, "CA").is_none());
        assert_eq!(system.residue_atom(ala, "CX").unwrap().position.x, 1.0);
    }

    #[test]
    fn remove_residue_drops_its_atoms() {
        let mut system = two_chain_system();
        let chain_a = system.find_chain_by_id('A').unwrap();
        let hoh = system.find_residue(chain_a, 2, None).unwrap();

        let removed = system.remove_residue(hoh).unwrap();

        assert_eq!(removed.name, "HOH");
        assert_eq!(system.atom_count(), 3);
        assert_eq!(system.chain(chain_a).unwrap().residues().len(), 1);
    }
}
