use phf::{Map, phf_map};

/// A titratable side chain with its model pKa and the residue names of both states.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TitrationSite {
    pub pka: f64,
    pub protonated: &'static str,
    pub deprotonated: &'static str,
    /// Name used when pH equals the pKa.
    pub standard: &'static str,
}

impl TitrationSite {
    /// Residue name for the given pH. Histidine's deprotonated state is the
    /// placeholder `HIS` and has to be resolved to a tautomer by the caller.
    pub fn state_at(&self, ph: f64) -> &'static str {
        if ph < self.pka {
            self.protonated
        } else if ph > self.pka {
            self.deprotonated
        } else {
            self.standard
        }
    }
}

static TITRATION_SITES: Map<&'static str, TitrationSite> = phf_map! {
    "ASP" => TitrationSite { pka: 3.9, protonated: "ASH", deprotonated: "ASP", standard: "ASP" },
    "GLU" => TitrationSite { pka: 4.2, protonated: "GLH", deprotonated: "GLU", standard: "GLU" },
    "HIS" => TitrationSite { pka: 6.0, protonated: "HIP", deprotonated: "HIS", standard: "HIS" },
    "CYS" => TitrationSite { pka: 8.3, protonated: "CYS", deprotonated: "CYM", standard: "CYS" },
    "TYR" => TitrationSite { pka: 10.0, protonated: "TYR", deprotonated: "TYM", standard: "TYR" },
    "LYS" => TitrationSite { pka: 10.5, protonated: "LYS", deprotonated: "LYN", standard: "LYS" },
    "ARG" => TitrationSite { pka: 12.5, protonated: "ARG", deprotonated: "ARN", standard: "ARG" },
};

// Protonation and tautomer variants mapped back to the residue they derive from.
static CANONICAL_NAMES: Map<&'static str, &'static str> = phf_map! {
    "ASH" => "ASP",
    "GLH" => "GLU",
    "HID" => "HIS", "HIE" => "HIS", "HIP" => "HIS",
    "HSD" => "HIS", "HSE" => "HIS", "HSP" => "HIS",
    "LYN" => "LYS",
    "CYX" => "CYS", "CYM" => "CYS",
    "ARN" => "ARG",
    "TYM" => "TYR",
};

/// Maps a residue name to its standard amino-acid name (`HIE` → `HIS`).
pub fn canonical_name(name: &str) -> &str {
    CANONICAL_NAMES.get(name).copied().unwrap_or(name)
}

pub fn titration_site(canonical: &str) -> Option<&'static TitrationSite> {
    TITRATION_SITES.get(canonical)
}
