//! Solver configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is
//! a valid configuration. Command-line flags are applied on top.

use crate::core::types::LengthPolicy;
use crate::error::{Result, SolverError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete configuration for a solver run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// How token and word Lengths are counted
    pub policy: LengthPolicy,

    /// Relaxation stage run after the round scheduler stalls (None = off)
    pub sweep: Option<SweepConfig>,
}

/// Parameters of the descending-threshold relaxation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// First threshold, in percent
    pub start: u8,

    /// Last threshold (inclusive), in percent
    pub floor: u8,

    /// Decrement between thresholds, in percentage points
    pub step: u8,

    /// Re-run the round scheduler over still-unresolved tokens after every
    /// threshold pass that committed something
    pub revisit_exhausted: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            start: 100,
            floor: 34,
            step: 2,
            revisit_exhausted: false,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.step == 0 {
            return Err(SolverError::InvalidConfig("sweep step must be positive".into()));
        }
        if self.start > 100 {
            return Err(SolverError::InvalidConfig(format!(
                "sweep start {}% exceeds 100%",
                self.start
            )));
        }
        if self.floor > self.start {
            return Err(SolverError::InvalidConfig(format!(
                "sweep floor {}% is above start {}%",
                self.floor, self.start
            )));
        }
        Ok(())
    }

    /// Thresholds from `start` down to `floor` inclusive, `step` apart.
    pub fn thresholds(&self) -> Vec<u8> {
        if self.step == 0 || self.floor > self.start {
            return Vec::new();
        }
        (self.floor..=self.start)
            .rev()
            .step_by(self.step as usize)
            .collect()
    }
}

impl SolverConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SolverError::MissingInputFile(path.to_path_buf()));
        }
        let config: SolverConfig = serde_json::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match &self.sweep {
            Some(sweep) => sweep.validate(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_descend_to_floor() {
        let thresholds = SweepConfig::default().thresholds();
        assert_eq!(thresholds.first(), Some(&100));
        assert_eq!(thresholds.last(), Some(&34));
        assert_eq!(thresholds.len(), 34);
        assert!(thresholds.windows(2).all(|w| w[0] - w[1] == 2));
    }

    #[test]
    fn floor_off_the_step_grid_is_not_reached() {
        let sweep = SweepConfig {
            start: 100,
            floor: 45,
            step: 10,
            revisit_exhausted: false,
        };
        assert_eq!(sweep.thresholds(), vec![100, 90, 80, 70, 60, 50]);
    }

    #[test]
    fn invalid_sweeps_are_rejected() {
        let zero_step = SweepConfig {
            step: 0,
            ..SweepConfig::default()
        };
        assert!(zero_step.validate().is_err());
        assert!(zero_step.thresholds().is_empty());

        let inverted = SweepConfig {
            start: 40,
            floor: 60,
            ..SweepConfig::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: SolverConfig =
            serde_json::from_str(r#"{"policy": "all-printable", "sweep": {"floor": 50}}"#).unwrap();
        assert_eq!(config.policy, LengthPolicy::AllPrintable);
        let sweep = config.sweep.unwrap();
        assert_eq!((sweep.start, sweep.floor, sweep.step), (100, 50, 2));

        let empty: SolverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, SolverConfig::default());
    }
}
