use super::config::{HisStrategy, PreparationConfig};
use super::error::PreparationError;
use super::progress::ProgressReporter;
use super::report::{PreparationReport, PreparationSummary, ResidueRecord};
use super::templates::{PolarRole, heavy_atoms, polar_role};
use super::titration::{canonical_name, titration_site};
use crate::core::fetch::OrientationMetadata;
use crate::core::models::atom::Element;
use crate::core::models::ids::ResidueId;
use crate::core::models::system::MolecularSystem;
use nalgebra::Point3;
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
struct PolarAtom {
    residue_id: ResidueId,
    position: Point3<f64>,
    role: PolarRole,
}

/// Assigns protonation states, tautomers, disulfides and amide orientations.
///
/// The input model is consumed and returned corrected together with a per-residue
/// report. Orientation data only feeds the membrane-exposure annotation.
///
/// # Errors
///
/// Returns [`PreparationError::NoProtein`] when the model has no amino-acid residue
/// and [`PreparationError::MissingAtoms`] when an amino acid has no `CA` atom.
pub fn prepare(
    mut system: MolecularSystem,
    orientation: &OrientationMetadata,
    config: &PreparationConfig,
    reporter: &ProgressReporter,
) -> Result<(MolecularSystem, PreparationReport), PreparationError> {
    let narrate = |text: String| {
        debug!("{}", text);
        if config.verbose {
            reporter.message(text);
        }
    };

    validate(&system)?;

    let mut summary = PreparationSummary::default();
    if config.strip_hydrogens {
        summary.hydrogens_removed = system.retain_atoms(|atom, _, _| !atom.element.is_hydrogen());
        if summary.hydrogens_removed > 0 {
            narrate(format!("Removed {} hydrogen atoms", summary.hydrogens_removed));
        }
    }

    let disulfides = find_disulfides(&system, config.disulfide_cutoff);
    let polar = collect_polar_atoms(&system);

    let flipped = if config.flip_amides {
        flip_amides(&mut system, &polar, config.hbond_cutoff)
    } else {
        HashSet::new()
    };

    let residue_ids: Vec<ResidueId> = system.residues_iter().map(|(id, _)| id).collect();
    let mut records = Vec::with_capacity(residue_ids.len());

    for residue_id in residue_ids {
        let Some(residue) = system.residue(residue_id) else {
            return Err(PreparationError::Internal(format!(
                "residue {:?} vanished during preparation",
                residue_id
            )));
        };
        let chain = system.chain(residue.chain_id).map_or(' ', |c| c.id);
        let original_name = residue.name.clone();
        let label = format!("{}:{}", chain, residue.label());
        let ca_z = system.residue_atom(residue_id, "CA").map(|atom| atom.position.z);

        let mut record = ResidueRecord {
            chain,
            residue_number: residue.number,
            insertion_code: residue.insertion_code,
            original_name: original_name.clone(),
            protonation: original_name.clone(),
            pka: None,
            flipped: flipped.contains(&residue_id),
            disulfide: false,
            membrane_exposed: None,
            ca_z,
            notes: Vec::new(),
        };

        if residue.is_amino_acid() {
            let canonical = canonical_name(&original_name).to_string();

            if disulfides.contains(&residue_id) || original_name == "CYX" {
                record.disulfide = true;
                record.protonation = "CYX".to_string();
                record.notes.push("disulfide bridge".to_string());
            } else if let Some(site) = titration_site(&canonical) {
                record.pka = Some(site.pka);
                let state = site.state_at(config.ph);
                if canonical == "HIS" && state == "HIS" {
                    let (tautomer, reason) =
                        choose_his_tautomer(&system, residue_id, &polar, config);
                    record.protonation = tautomer.to_string();
                    record.notes.push(reason);
                } else {
                    record.protonation = state.to_string();
                }
            }

            if record.flipped {
                record.notes.push("amide flipped".to_string());
            }

            if let Some(template) = heavy_atoms(&canonical) {
                let missing: Vec<&str> = template
                    .iter()
                    .copied()
                    .filter(|name| system.residue_atom(residue_id, name).is_none())
                    .collect();
                if !missing.is_empty() {
                    record
                        .notes
                        .push(format!("missing heavy atoms: {}", missing.join(", ")));
                }
            }

            record.membrane_exposed = orientation
                .membrane_half_thickness
                .zip(ca_z)
                .map(|(half, z)| z.abs() <= half);
        }

        if record.protonation != original_name {
            system.rename_residue(residue_id, &record.protonation);
            summary.protonation_changes += 1;
            narrate(format!(
                "{}: {} -> {}",
                label, original_name, record.protonation
            ));
        }
        if record.flipped {
            summary.amide_flips += 1;
            narrate(format!("{}: flipped amide group", label));
        }
        if record.disulfide {
            summary.disulfide_residues += 1;
        }
        summary.residues += 1;
        records.push(record);
    }

    info!(
        "Prepared {} residues: {} renamed, {} amide flips, {} disulfide residues",
        summary.residues, summary.protonation_changes, summary.amide_flips, summary.disulfide_residues
    );

    if !config.return_details {
        records.clear();
    }
    Ok((system, PreparationReport::new(records, summary)))
}

fn validate(system: &MolecularSystem) -> Result<(), PreparationError> {
    let mut any_protein = false;
    for (residue_id, residue) in system.residues_iter() {
        if !residue.is_amino_acid() {
            continue;
        }
        any_protein = true;
        if system.residue_atom(residue_id, "CA").is_none() {
            return Err(PreparationError::MissingAtoms {
                chain: system.chain(residue.chain_id).map_or(' ', |c| c.id),
                residue: residue.label(),
                atom: "CA",
            });
        }
    }
    if any_protein {
        Ok(())
    } else {
        Err(PreparationError::NoProtein)
    }
}

fn find_disulfides(system: &MolecularSystem, cutoff: f64) -> HashSet<ResidueId> {
    let sulfurs: Vec<(ResidueId, Point3<f64>)> = system
        .residues_iter()
        .filter(|(_, residue)| canonical_name(&residue.name) == "CYS")
        .filter_map(|(id, _)| system.residue_atom(id, "SG").map(|sg| (id, sg.position)))
        .collect();

    let cutoff_sq = cutoff * cutoff;
    let mut bonded = HashSet::new();
    for (i, (id_i, pos_i)) in sulfurs.iter().enumerate() {
        for (id_j, pos_j) in &sulfurs[i + 1..] {
            if (*pos_i - *pos_j).norm_squared() <= cutoff_sq {
                bonded.insert(*id_i);
                bonded.insert(*id_j);
            }
        }
    }
    bonded
}

fn collect_polar_atoms(system: &MolecularSystem) -> Vec<PolarAtom> {
    system
        .atoms_iter()
        .filter(|(_, atom)| matches!(atom.element, Element::N | Element::O))
        .filter_map(|(_, atom)| {
            let residue = system.residue(atom.residue_id)?;
            Some(PolarAtom {
                residue_id: atom.residue_id,
                position: atom.position,
                role: polar_role(canonical_name(&residue.name), &atom.name),
            })
        })
        .collect()
}

fn neighbors<'a>(
    polar: &'a [PolarAtom],
    owner: ResidueId,
    position: &'a Point3<f64>,
    cutoff: f64,
) -> impl Iterator<Item = &'a PolarAtom> + 'a {
    let cutoff_sq = cutoff * cutoff;
    polar.iter().filter(move |p| {
        p.residue_id != owner && (p.position - *position).norm_squared() <= cutoff_sq
    })
}

// +1 for each complementary partner, -1 for each partner of the same kind.
fn acceptor_score(polar: &[PolarAtom], owner: ResidueId, at: &Point3<f64>, cutoff: f64) -> i32 {
    neighbors(polar, owner, at, cutoff)
        .map(|p| match (p.role.donor, p.role.acceptor) {
            (true, false) => 1,
            (false, true) => -1,
            _ => 0,
        })
        .sum()
}

fn donor_score(polar: &[PolarAtom], owner: ResidueId, at: &Point3<f64>, cutoff: f64) -> i32 {
    -acceptor_score(polar, owner, at, cutoff)
}

/// Swaps the amide O/N of Asn and Gln when the swapped labels fit the surrounding
/// hydrogen-bond network better. Every decision is scored against the unflipped
/// input network.
fn flip_amides(
    system: &mut MolecularSystem,
    polar: &[PolarAtom],
    cutoff: f64,
) -> HashSet<ResidueId> {
    let amides: Vec<(ResidueId, &'static str, &'static str)> = system
        .residues_iter()
        .filter_map(|(id, residue)| match canonical_name(&residue.name) {
            "ASN" => Some((id, "OD1", "ND2")),
            "GLN" => Some((id, "OE1", "NE2")),
            _ => None,
        })
        .collect();

    let mut flipped = HashSet::new();
    for (residue_id, o_name, n_name) in amides {
        let Some(residue) = system.residue(residue_id) else {
            continue;
        };
        let (Some(o_id), Some(n_id)) = (
            residue.get_atom_id_by_name(o_name),
            residue.get_atom_id_by_name(n_name),
        ) else {
            continue;
        };
        let (Some(o_pos), Some(n_pos)) = (
            system.atom(o_id).map(|a| a.position),
            system.atom(n_id).map(|a| a.position),
        ) else {
            continue;
        };

        let current = acceptor_score(polar, residue_id, &o_pos, cutoff)
            + donor_score(polar, residue_id, &n_pos, cutoff);
        let swapped = acceptor_score(polar, residue_id, &n_pos, cutoff)
            + donor_score(polar, residue_id, &o_pos, cutoff);

        if swapped > current {
            if let Some(atom) = system.atom_mut(o_id) {
                atom.position = n_pos;
            }
            if let Some(atom) = system.atom_mut(n_id) {
                atom.position = o_pos;
            }
            flipped.insert(residue_id);
        }
    }
    flipped
}

fn choose_his_tautomer(
    system: &MolecularSystem,
    residue_id: ResidueId,
    polar: &[PolarAtom],
    config: &PreparationConfig,
) -> (&'static str, String) {
    match config.his_strategy {
        HisStrategy::Hid => ("HID", "neutral HIS, ND1 protonated by strategy".to_string()),
        HisStrategy::Hie => ("HIE", "neutral HIS, NE2 protonated by strategy".to_string()),
        HisStrategy::HbNetwork => {
            let donates = |atom_name: &str| {
                system.residue_atom(residue_id, atom_name).is_some_and(|atom| {
                    neighbors(polar, residue_id, &atom.position, config.hbond_cutoff)
                        .any(|p| p.role.acceptor)
                })
            };
            match (donates("ND1"), donates("NE2")) {
                (true, false) => ("HID", "ND1 donates to a nearby acceptor".to_string()),
                (false, true) => ("HIE", "NE2 donates to a nearby acceptor".to_string()),
                (true, true) => (
                    "HIE",
                    "both ring nitrogens near acceptors, NE2 tautomer kept".to_string(),
                ),
                (false, false) => (
                    "HIE",
                    "no hydrogen-bond partner, NE2 tautomer kept".to_string(),
                ),
            }
        }
    }
}
