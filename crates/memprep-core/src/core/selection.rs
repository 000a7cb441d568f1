//! A small atom-selection language for carving components out of a structure.
//!
//! ```text
//! expr    := and ("or" and)*
//! and     := unary ("and" unary)*
//! unary   := "not" unary | primary
//! primary := "(" expr ")" | KEYWORD | FIELD value+
//! ```
//!
//! Keywords are `all`, `none`, `protein`, `water`, `hetero`, `hydrogen`, `backbone`
//! and `sidechain`. Fields take one or more values: `chain A B`, `resname ALA GLY`,
//! `resid 10 12:20`, `name CA CB`, `element C N`. Matching of names is exact and
//! case-sensitive except for element symbols.

use crate::core::models::atom::{Atom, Element};
use crate::core::models::chain::Chain;
use crate::core::models::residue::{Residue, is_backbone_atom_name};
use crate::core::models::system::MolecularSystem;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid selection '{expression}': {message}")]
    Syntax { expression: String, message: String },
    #[error("Selection '{expression}' matched no atoms")]
    EmptySelection { expression: String },
}

/// An inclusive residue-number range; a single number is a range of length one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidRange {
    pub start: isize,
    pub end: isize,
}

impl ResidRange {
    fn contains(&self, number: isize) -> bool {
        (self.start..=self.end).contains(&number)
    }
}

/// Parsed selection predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    All,
    None,
    Protein,
    Water,
    Hetero,
    Hydrogen,
    Backbone,
    Sidechain,
    Chain(Vec<char>),
    ResName(Vec<String>),
    ResId(Vec<ResidRange>),
    Name(Vec<String>),
    Element(Vec<Element>),
    Not(Box<Selection>),
    And(Box<Selection>, Box<Selection>),
    Or(Box<Selection>, Box<Selection>),
}

impl Selection {
    pub fn parse(expression: &str) -> Result<Self, FilterError> {
        let tokens = tokenize(expression);
        let mut parser = Parser {
            expression,
            tokens: &tokens,
            pos: 0,
            depth: 0,
        };
        let selection = parser.parse_or()?;
        match parser.peek() {
            None => Ok(selection),
            Some(token) => Err(parser.error(format!("unexpected '{}'", token))),
        }
    }

    /// Evaluates the predicate for one atom in its residue and chain context.
    pub fn matches(&self, atom: &Atom, residue: &Residue, chain: &Chain) -> bool {
        match self {
            Selection::All => true,
            Selection::None => false,
            Selection::Protein => residue.is_amino_acid(),
            Selection::Water => residue.is_water(),
            Selection::Hetero => residue.is_hetero,
            Selection::Hydrogen => atom.element.is_hydrogen(),
            Selection::Backbone => residue.is_amino_acid() && is_backbone_atom_name(&atom.name),
            Selection::Sidechain => residue.is_amino_acid() && !is_backbone_atom_name(&atom.name),
            Selection::Chain(ids) => ids.contains(&chain.id),
            Selection::ResName(names) => names.iter().any(|n| *n == residue.name),
            Selection::ResId(ranges) => ranges.iter().any(|r| r.contains(residue.number)),
            Selection::Name(names) => names.iter().any(|n| *n == atom.name),
            Selection::Element(elements) => elements.contains(&atom.element),
            Selection::Not(inner) => !inner.matches(atom, residue, chain),
            Selection::And(lhs, rhs) => {
                lhs.matches(atom, residue, chain) && rhs.matches(atom, residue, chain)
            }
            Selection::Or(lhs, rhs) => {
                lhs.matches(atom, residue, chain) || rhs.matches(atom, residue, chain)
            }
        }
    }
}

impl FromStr for Selection {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(values: &[T]) -> String {
            values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        }
        match self {
            Selection::All => f.write_str("all"),
            Selection::None => f.write_str("none"),
            Selection::Protein => f.write_str("protein"),
            Selection::Water => f.write_str("water"),
            Selection::Hetero => f.write_str("hetero"),
            Selection::Hydrogen => f.write_str("hydrogen"),
            Selection::Backbone => f.write_str("backbone"),
            Selection::Sidechain => f.write_str("sidechain"),
            Selection::Chain(ids) => write!(f, "chain {}", join(ids)),
            Selection::ResName(names) => write!(f, "resname {}", join(names)),
            Selection::ResId(ranges) => {
                let parts: Vec<String> = ranges
                    .iter()
                    .map(|r| {
                        if r.start == r.end {
                            r.start.to_string()
                        } else {
                            format!("{}:{}", r.start, r.end)
                        }
                    })
                    .collect();
                write!(f, "resid {}", parts.join(" "))
            }
            Selection::Name(names) => write!(f, "name {}", join(names)),
            Selection::Element(elements) => write!(f, "element {}", join(elements)),
            Selection::Not(inner) => write!(f, "not ({})", inner),
            Selection::And(lhs, rhs) => write!(f, "({}) and ({})", lhs, rhs),
            Selection::Or(lhs, rhs) => write!(f, "({}) or ({})", lhs, rhs),
        }
    }
}

/// Keeps the atoms of `system` matching `expression`.
///
/// # Errors
///
/// [`FilterError::Syntax`] if the expression does not parse and
/// [`FilterError::EmptySelection`] if no atom survives.
pub fn select(mut system: MolecularSystem, expression: &str) -> Result<MolecularSystem, FilterError> {
    let selection = Selection::parse(expression)?;
    system.retain_atoms(|atom, residue, chain| selection.matches(atom, residue, chain));
    if system.is_empty() {
        return Err(FilterError::EmptySelection {
            expression: expression.to_string(),
        });
    }
    Ok(system)
}

const FIELDS: &[&str] = &["chain", "resname", "resid", "name", "element"];
const OPERATORS: &[&str] = &["and", "or", "not", "(", ")"];
/// Combined limit on `not` and parenthesis nesting.
const MAX_NESTING: usize = 64;

fn tokenize(expression: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in expression.chars() {
        if c == '(' || c == ')' || c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            if !c.is_whitespace() {
                tokens.push(c.to_string());
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

struct Parser<'a> {
    expression: &'a str,
    tokens: &'a [String],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Option<&'a str> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> FilterError {
        FilterError::Syntax {
            expression: self.expression.to_string(),
            message: message.into(),
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, FilterError>,
    ) -> Result<T, FilterError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {} levels", MAX_NESTING)));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_or(&mut self) -> Result<Selection, FilterError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some("or") {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Selection::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Selection, FilterError> {
        let mut lhs = self.parse_unary()?;
        while self.peek() == Some("and") {
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Selection::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Selection, FilterError> {
        if self.peek() == Some("not") {
            self.pos += 1;
            let inner = self.nested(Self::parse_unary)?;
            return Ok(Selection::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Selection, FilterError> {
        let token = self
            .next()
            .ok_or_else(|| self.error("unexpected end of expression"))?;
        let selection = match token {
            "(" => {
                let inner = self.nested(Self::parse_or)?;
                if self.next() != Some(")") {
                    return Err(self.error("missing closing parenthesis"));
                }
                inner
            }
            "all" => Selection::All,
            "none" => Selection::None,
            "protein" => Selection::Protein,
            "water" => Selection::Water,
            "hetero" => Selection::Hetero,
            "hydrogen" => Selection::Hydrogen,
            "backbone" => Selection::Backbone,
            "sidechain" => Selection::Sidechain,
            field if FIELDS.contains(&field) => self.parse_field(field)?,
            other => return Err(self.error(format!("unknown keyword '{}'", other))),
        };
        Ok(selection)
    }

    fn parse_field(&mut self, field: &str) -> Result<Selection, FilterError> {
        let mut values = Vec::new();
        while let Some(token) = self.peek() {
            if OPERATORS.contains(&token) {
                break;
            }
            values.push(token);
            self.pos += 1;
        }
        if values.is_empty() {
            return Err(self.error(format!("'{}' requires at least one value", field)));
        }

        match field {
            "chain" => values
                .iter()
                .map(|v| {
                    let mut chars = v.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Ok(c),
                        _ => Err(self.error(format!("chain identifier '{}' must be one character", v))),
                    }
                })
                .collect::<Result<_, _>>()
                .map(Selection::Chain),
            "resname" => Ok(Selection::ResName(values.iter().map(|v| v.to_string()).collect())),
            "name" => Ok(Selection::Name(values.iter().map(|v| v.to_string()).collect())),
            "resid" => values
                .iter()
                .map(|v| self.parse_resid(v))
                .collect::<Result<_, _>>()
                .map(Selection::ResId),
            "element" => values
                .iter()
                .map(|v| {
                    Element::from_str(v)
                        .map_err(|_| self.error(format!("unknown element symbol '{}'", v)))
                })
                .collect::<Result<_, _>>()
                .map(Selection::Element),
            _ => Err(self.error(format!("unknown field '{}'", field))),
        }
    }

    fn parse_resid(&self, value: &str) -> Result<ResidRange, FilterError> {
        let parse = |s: &str| {
            s.parse::<isize>()
                .map_err(|_| self.error(format!("invalid residue number '{}'", value)))
        };
        match value.split_once(':') {
            Some((start, end)) => {
                let range = ResidRange {
                    start: parse(start)?,
                    end: parse(end)?,
                };
                if range.start > range.end {
                    return Err(self.error(format!("empty residue range '{}'", value)));
                }
                Ok(range)
            }
            None => {
                let number = parse(value)?;
                Ok(ResidRange {
                    start: number,
                    end: number,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::ResidueId;
    use nalgebra::Point3;

    fn membrane_system() -> MolecularSystem {
        let mut system = MolecularSystem::new();
        let chain_a = system.add_chain('A');
        let ala = system.add_residue(chain_a, 10, None, "ALA", false).unwrap();
        for (name, element) in [("N", Element::N), ("CA", Element::C), ("CB", Element::C), ("HB1", Element::H)] {
            system
                .add_atom_to_residue(ala, Atom::new(name, element, ResidueId::default(), Point3::origin()))
                .unwrap();
        }
        let lipid = system.add_residue(chain_a, 501, None, "POPC", true).unwrap();
        system
            .add_atom_to_residue(lipid, Atom::new("P", Element::P, ResidueId::default(), Point3::origin()))
            .unwrap();
        let chain_b = system.add_chain('B');
        let gly = system.add_residue(chain_b, 11, None, "GLY", false).unwrap();
        system
            .add_atom_to_residue(gly, Atom::new("CA", Element::C, ResidueId::default(), Point3::origin()))
            .unwrap();
        let dum = system.add_residue(chain_b, 900, None, "DUM", true).unwrap();
        system
            .add_atom_to_residue(dum, Atom::new("O", Element::O, ResidueId::default(), Point3::origin()))
            .unwrap();
        let hoh = system.add_residue(chain_b, 901, None, "HOH", true).unwrap();
        system
            .add_atom_to_residue(hoh, Atom::new("O", Element::O, ResidueId::default(), Point3::origin()))
            .unwrap();
        system
    }

    fn selected_names(expression: &str) -> Vec<String> {
        let system = select(membrane_system(), expression).unwrap();
        system
            .atoms_iter()
            .map(|(_, atom)| {
                let residue = system.residue(atom.residue_id).unwrap();
                format!("{}:{}", residue.name, atom.name)
            })
            .collect()
    }

    #[test]
    fn protein_keeps_only_amino_acid_atoms_in_order() {
        assert_eq!(
            selected_names("protein"),
            vec!["ALA:N", "ALA:CA", "ALA:CB", "ALA:HB1", "GLY:CA"]
        );
    }

    #[test]
    fn boolean_combinators_follow_precedence() {
        assert_eq!(
            selected_names("protein and not hydrogen and chain A or resname HOH"),
            vec!["ALA:N", "ALA:CA", "ALA:CB", "HOH:O"]
        );
        assert_eq!(
            selected_names("protein and (chain B or name CB)"),
            vec!["ALA:CB", "GLY:CA"]
        );
    }

    #[test]
    fn field_selectors_accept_multiple_values() {
        assert_eq!(selected_names("resid 10:11 and name CA"), vec!["ALA:CA", "GLY:CA"]);
        assert_eq!(selected_names("element p O"), vec!["POPC:P", "DUM:O", "HOH:O"]);
        assert_eq!(selected_names("backbone"), vec!["ALA:N", "ALA:CA", "GLY:CA"]);
        assert_eq!(selected_names("sidechain"), vec!["ALA:CB", "ALA:HB1"]);
        assert_eq!(selected_names("hetero and not water"), vec!["POPC:P", "DUM:O"]);
    }

    #[test]
    fn selection_prunes_emptied_residues_and_chains() {
        let system = select(membrane_system(), "chain A and protein").unwrap();
        assert_eq!(system.chain_count(), 1);
        assert_eq!(system.residue_count(), 1);
    }

    #[test]
    fn empty_result_is_an_error() {
        let mut system = MolecularSystem::new();
        let chain = system.add_chain('X');
        let dum = system.add_residue(chain, 1, None, "DUM", true).unwrap();
        system
            .add_atom_to_residue(dum, Atom::new("O", Element::O, ResidueId::default(), Point3::origin()))
            .unwrap();

        assert_eq!(
            select(system, "protein").unwrap_err(),
            FilterError::EmptySelection {
                expression: "protein".to_string()
            }
        );
    }

    #[test]
    fn malformed_expressions_are_syntax_errors() {
        for expression in ["", "protein and", "(protein", "protein)", "chain", "chain AB", "resid x", "resid 5:1", "element 9", "lipid", "protein water"] {
            assert!(
                matches!(Selection::parse(expression), Err(FilterError::Syntax { .. })),
                "expected syntax error for {:?}",
                expression
            );
        }
    }

    #[test]
    fn excessive_nesting_is_a_syntax_error() {
        let negations = format!("{}protein", "not ".repeat(100_000));
        assert!(matches!(Selection::parse(&negations), Err(FilterError::Syntax { .. })));

        let parens = format!("{}protein{}", "( ".repeat(100_000), " )".repeat(100_000));
        assert!(matches!(Selection::parse(&parens), Err(FilterError::Syntax { .. })));

        let shallow = format!("{}protein{}", "( ".repeat(10), " )".repeat(10));
        assert_eq!(Selection::parse(&shallow).unwrap(), Selection::Protein);
    }

    #[test]
    fn display_output_parses_to_the_same_selection() {
        let selection = Selection::parse("not (chain A B or resid -3:4 7) and element C").unwrap();
        let reparsed = Selection::parse(&selection.to_string()).unwrap();
        assert_eq!(selection, reparsed);
    }
}
