use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// How a neutral histidine tautomer is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HisStrategy {
    /// Always protonate ND1.
    Hid,
    /// Always protonate NE2.
    Hie,
    /// Protonate the ring nitrogen that donates a hydrogen bond to a nearby acceptor.
    #[default]
    HbNetwork,
}

impl FromStr for HisStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hid" => Ok(Self::Hid),
            "hie" => Ok(Self::Hie),
            "hb-network" => Ok(Self::HbNetwork),
            other => Err(ConfigError::InvalidParameter {
                name: "his_strategy",
                reason: format!("'{}' is not one of hid, hie, hb-network", other),
            }),
        }
    }
}

impl fmt::Display for HisStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hid => "hid",
            Self::Hie => "hie",
            Self::HbNetwork => "hb-network",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparationConfig {
    pub ph: f64,
    pub his_strategy: HisStrategy,
    pub flip_amides: bool,
    pub strip_hydrogens: bool,
    /// Donor–acceptor distance (Å) counted as a hydrogen bond.
    pub hbond_cutoff: f64,
    /// Maximum SG–SG distance (Å) for a disulfide bridge.
    pub disulfide_cutoff: f64,
    /// Narrate every change through the progress reporter.
    pub verbose: bool,
    /// Include one record per residue in the report (otherwise only the summary).
    pub return_details: bool,
}

impl Default for PreparationConfig {
    fn default() -> Self {
        Self {
            ph: 7.0,
            his_strategy: HisStrategy::HbNetwork,
            flip_amides: true,
            strip_hydrogens: true,
            hbond_cutoff: 3.5,
            disulfide_cutoff: 2.2,
            verbose: false,
            return_details: true,
        }
    }
}

/// Builds a validated [`PreparationConfig`]; unset fields keep their defaults.
#[derive(Default)]
pub struct PreparationConfigBuilder {
    ph: Option<f64>,
    his_strategy: Option<HisStrategy>,
    flip_amides: Option<bool>,
    strip_hydrogens: Option<bool>,
    hbond_cutoff: Option<f64>,
    disulfide_cutoff: Option<f64>,
    verbose: Option<bool>,
    return_details: Option<bool>,
}

impl PreparationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ph(mut self, ph: f64) -> Self {
        self.ph = Some(ph);
        self
    }
    pub fn his_strategy(mut self, strategy: HisStrategy) -> Self {
        self.his_strategy = Some(strategy);
        self
    }
    pub fn flip_amides(mut self, enabled: bool) -> Self {
        self.flip_amides = Some(enabled);
        self
    }
    pub fn strip_hydrogens(mut self, enabled: bool) -> Self {
        self.strip_hydrogens = Some(enabled);
        self
    }
    pub fn hbond_cutoff(mut self, angstroms: f64) -> Self {
        self.hbond_cutoff = Some(angstroms);
        self
    }
    pub fn disulfide_cutoff(mut self, angstroms: f64) -> Self {
        self.disulfide_cutoff = Some(angstroms);
        self
    }
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }
    pub fn return_details(mut self, details: bool) -> Self {
        self.return_details = Some(details);
        self
    }

    pub fn build(self) -> Result<PreparationConfig, ConfigError> {
        let defaults = PreparationConfig::default();
        let config = PreparationConfig {
            ph: self.ph.unwrap_or(defaults.ph),
            his_strategy: self.his_strategy.unwrap_or(defaults.his_strategy),
            flip_amides: self.flip_amides.unwrap_or(defaults.flip_amides),
            strip_hydrogens: self.strip_hydrogens.unwrap_or(defaults.strip_hydrogens),
            hbond_cutoff: self.hbond_cutoff.unwrap_or(defaults.hbond_cutoff),
            disulfide_cutoff: self.disulfide_cutoff.unwrap_or(defaults.disulfide_cutoff),
            verbose: self.verbose.unwrap_or(defaults.verbose),
            return_details: self.return_details.unwrap_or(defaults.return_details),
        };

        if !(0.0..=14.0).contains(&config.ph) {
            return Err(ConfigError::InvalidParameter {
                name: "ph",
                reason: format!("{} is outside 0-14", config.ph),
            });
        }
        for (name, value) in [
            ("hbond_cutoff", config.hbond_cutoff),
            ("disulfide_cutoff", config.disulfide_cutoff),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("{} must be a positive distance", value),
                });
            }
        }
        Ok(config)
    }
}
