use crate::core::io::traits::MolecularFile;
use crate::core::models::atom::{Atom, Element};
use crate::core::models::residue::Residue;
use crate::core::models::system::MolecularSystem;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use thiserror::Error;

const HEADER_RECORDS: &[&str] = &["HEADER", "TITLE", "COMPND", "REMARK", "CRYST1"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdbMetadata {
    /// Header records (`HEADER`, `TITLE`, `REMARK`, `CRYST1`, ...) kept verbatim.
    pub header_lines: Vec<String>,
}

impl PdbMetadata {
    /// Returns the `REMARK` lines only.
    pub fn remarks(&self) -> impl Iterator<Item = &str> {
        self.header_lines
            .iter()
            .filter(|line| line.starts_with("REMARK"))
            .map(String::as_str)
    }
}

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: String },
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn column_char(line: &str, index: usize) -> Option<char> {
    line.get(index..index + 1)
        .and_then(|s| s.chars().next())
        .filter(|c| !c.is_whitespace())
}

fn parse_float(line: &str, line_num: usize, start: usize, end: usize) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: value.into(),
        },
    })
}

fn parse_optional_float(line: &str, start: usize, end: usize, default: f64) -> f64 {
    slice_and_trim(line, start, end).parse().unwrap_or(default)
}

pub struct PdbFile;

impl MolecularFile for PdbFile {
    type Metadata = PdbMetadata;
    type Error = PdbError;

    fn read_from(
        reader: &mut impl BufRead,
    ) -> Result<(MolecularSystem, Self::Metadata), Self::Error> {
        let mut system = MolecularSystem::new();
        let mut metadata = PdbMetadata::default();
        let mut atom_count = 0usize;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let record_type = slice_and_trim(&line, 0, 6);

            match record_type {
                "ATOM" | "HETATM" => {
                    if line.len() < 54 {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::LineTooShort,
                        });
                    }

                    let name = slice_and_trim(&line, 12, 16);
                    if name.is_empty() {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::MissingRequiredField {
                                columns: "13-16".into(),
                            },
                        });
                    }
                    let res_name = slice_and_trim(&line, 17, 20);
                    let chain_char = line.get(21..22).and_then(|s| s.chars().next()).unwrap_or(' ');
                    let res_seq_str = slice_and_trim(&line, 22, 26);
                    let res_seq: isize = res_seq_str.parse().map_err(|_| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidInt {
                            columns: "23-26".into(),
                            value: res_seq_str.into(),
                        },
                    })?;
                    let insertion_code = column_char(&line, 26);
                    let alt_loc = column_char(&line, 16);

                    let x = parse_float(&line, line_num, 30, 38)?;
                    let y = parse_float(&line, line_num, 38, 46)?;
                    let z = parse_float(&line, line_num, 46, 54)?;

                    let chain_id = system.add_chain(chain_char);
                    let residue_id = system
                        .add_residue(
                            chain_id,
                            res_seq,
                            insertion_code,
                            res_name,
                            record_type == "HETATM",
                        )
                        .ok_or_else(|| {
                            PdbError::Inconsistency(format!(
                                "chain '{}' vanished while reading line {}",
                                chain_char, line_num
                            ))
                        })?;

                    // Only the first conformer of an alternate-location atom is kept.
                    if alt_loc.is_some()
                        && system
                            .residue(residue_id)
                            .and_then(|r| r.get_atom_id_by_name(name))
                            .is_some()
                    {
                        continue;
                    }

                    atom_count += 1;
                    let serial = slice_and_trim(&line, 6, 11).parse().unwrap_or(atom_count);
                    let element = Element::from_str(slice_and_trim(&line, 76, 78))
                        .unwrap_or_else(|_| Element::infer_from_atom_name(name));

                    let mut atom = Atom::new(name, element, residue_id, Point3::new(x, y, z));
                    atom.serial = serial;
                    atom.alt_loc = alt_loc;
                    atom.occupancy = parse_optional_float(&line, 54, 60, 1.0);
                    atom.b_factor = parse_optional_float(&line, 60, 66, 0.0);
                    let segid = slice_and_trim(&line, 72, 76);
                    if !segid.is_empty() {
                        atom.set_attribute("segid", segid);
                    }
                    let charge = slice_and_trim(&line, 78, 80);
                    if !charge.is_empty() {
                        atom.set_attribute("charge", charge);
                    }

                    system.add_atom_to_residue(residue_id, atom);
                }
                "ENDMDL" | "END" => break,
                record if HEADER_RECORDS.contains(&record) => {
                    metadata.header_lines.push(line.clone());
                }
                _ => {}
            }
        }

        if system.is_empty() {
            return Err(PdbError::MissingRecord("ATOM/HETATM records".into()));
        }
        Ok((system, metadata))
    }

    fn write_to(
        system: &MolecularSystem,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        for line in &metadata.header_lines {
            writeln!(writer, "{}", line)?;
        }

        let mut serial = 1usize;
        for (_, chain) in system.chains_iter() {
            let mut last_amino_acid: Option<&Residue> = None;
            for &residue_id in chain.residues() {
                let Some(residue) = system.residue(residue_id) else {
                    continue;
                };
                for &atom_id in residue.atoms() {
                    let atom = system.atom(atom_id).ok_or_else(|| {
                        PdbError::Inconsistency(format!(
                            "residue {} references a missing atom",
                            residue.label()
                        ))
                    })?;
                    write_atom_record(writer, serial, atom, residue, chain.id)?;
                    serial += 1;
                }
                if residue.is_amino_acid() {
                    last_amino_acid = Some(residue);
                }
            }
            if let Some(residue) = last_amino_acid {
                write_ter_record(writer, serial, residue, chain.id)?;
                serial += 1;
            }
        }

        writeln!(writer, "END")?;
        Ok(())
    }

    fn write_system_to(
        system: &MolecularSystem,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        let metadata = PdbMetadata {
            header_lines: vec!["REMARK   1 GENERATED BY MEMPREP".to_string()],
        };
        Self::write_to(system, &metadata, writer)
    }
}

fn format_atom_name(atom: &Atom) -> String {
    if atom.name.len() >= 4 {
        atom.name[..4].to_string()
    } else if atom.element.symbol().len() == 2 {
        format!("{:<4}", atom.name)
    } else {
        format!(" {:<3}", atom.name)
    }
}

fn write_atom_record(
    writer: &mut impl Write,
    serial: usize,
    atom: &Atom,
    residue: &Residue,
    chain_id: char,
) -> Result<(), PdbError> {
    let record_type = if residue.is_hetero { "HETATM" } else { "ATOM" };
    let res_name = residue.name.get(..3).unwrap_or(&residue.name);
    writeln!(
        writer,
        "{:<6}{:>5} {}{}{:>3} {}{:>4}{}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}      {:<4}{:>2}{:<2}",
        record_type,
        serial % 100_000,
        format_atom_name(atom),
        atom.alt_loc.unwrap_or(' '),
        res_name,
        chain_id,
        residue.number % 10_000,
        residue.insertion_code.unwrap_or(' '),
        atom.position.x,
        atom.position.y,
        atom.position.z,
        atom.occupancy,
        atom.b_factor,
        atom.attribute("segid").unwrap_or(""),
        atom.element.symbol(),
        atom.attribute("charge").unwrap_or(""),
    )?;
    Ok(())
}

fn write_ter_record(
    writer: &mut impl Write,
    serial: usize,
    residue: &Residue,
    chain_id: char,
) -> Result<(), PdbError> {
    let res_name = residue.name.get(..3).unwrap_or(&residue.name);
    writeln!(
        writer,
        "TER   {:>5}      {:>3} {}{:>4}{}",
        serial % 100_000,
        res_name,
        chain_id,
        residue.number % 10_000,
        residue.insertion_code.unwrap_or(' ')
    )?;
    Ok(())
}
