use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PreparationError {
    #[error("Structure contains no amino-acid residues")]
    NoProtein,

    #[error("Residue {residue} in chain '{chain}' is missing required atom '{atom}'")]
    MissingAtoms {
        chain: char,
        residue: String,
        atom: &'static str,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
