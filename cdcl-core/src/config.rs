//! Solver configuration.
//!
//! Mirrors the shape of the teacher crate's `SolverConfig`, but exposes exactly the options this
//! core recognizes instead of search/heuristic tuning knobs (those belong to the decision and
//! restart collaborators, out of scope here).

use thiserror::Error;

/// Chronological backtracking mode.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Chrono {
    /// Assignment level always equals the current decision level.
    Off,
    /// Chronological backtracking: out-of-order assignments can survive a backtrack.
    Level1,
    /// Like `Level1`, and additionally rewatches units to their true (lower) level.
    Level2,
}

impl Chrono {
    fn enabled(self) -> bool {
        !matches!(self, Chrono::Off)
    }
}

impl Default for Chrono {
    fn default() -> Self {
        Chrono::Off
    }
}

/// Configurable parameters recognized by the core.
#[derive(Default, Clone)]
pub struct SolverConfig {
    pub chrono: Chrono,
    pub multitrail: bool,
    pub multitrail_repair: bool,
    pub lrat: bool,
    pub lrat_external: bool,
    pub arena: bool,
    pub checkprooflrat: bool,
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.multitrail && !self.chrono.enabled() {
            return Err(ConfigError::MultitrailRequiresChrono);
        }
        if self.multitrail_repair && !self.multitrail {
            return Err(ConfigError::MultitrailRepairRequiresMultitrail);
        }
        if self.checkprooflrat && !self.lrat {
            return Err(ConfigError::CheckProofLratRequiresLrat);
        }
        Ok(())
    }
}

/// A partial update applied to a [`SolverConfig`], validated as a whole before taking effect.
#[derive(Default, Clone)]
pub struct SolverConfigUpdate {
    pub chrono: Option<Chrono>,
    pub multitrail: Option<bool>,
    pub multitrail_repair: Option<bool>,
    pub lrat: Option<bool>,
    pub lrat_external: Option<bool>,
    pub arena: Option<bool>,
    pub checkprooflrat: Option<bool>,
}

impl SolverConfigUpdate {
    /// Applies this update to `config`, rejecting the result if it is inconsistent.
    ///
    /// On error `config` is left unchanged.
    pub fn apply(&self, config: &mut SolverConfig) -> Result<(), ConfigError> {
        let mut candidate = config.clone();
        if let Some(chrono) = self.chrono {
            candidate.chrono = chrono;
        }
        if let Some(v) = self.multitrail {
            candidate.multitrail = v;
        }
        if let Some(v) = self.multitrail_repair {
            candidate.multitrail_repair = v;
        }
        if let Some(v) = self.lrat {
            candidate.lrat = v;
        }
        if let Some(v) = self.lrat_external {
            candidate.lrat_external = v;
        }
        if let Some(v) = self.arena {
            candidate.arena = v;
        }
        if let Some(v) = self.checkprooflrat {
            candidate.checkprooflrat = v;
        }
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }
}

/// Errors raised when an option combination does not make sense.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("multitrail requires chrono to be enabled")]
    MultitrailRequiresChrono,
    #[error("multitrailrepair requires multitrail")]
    MultitrailRepairRequiresMultitrail,
    #[error("checkprooflrat requires lrat")]
    CheckProofLratRequiresLrat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multitrail_without_chrono_is_rejected() {
        let mut config = SolverConfig::default();
        let update = SolverConfigUpdate {
            multitrail: Some(true),
            ..Default::default()
        };
        assert!(matches!(
            update.apply(&mut config),
            Err(ConfigError::MultitrailRequiresChrono)
        ));
    }

    #[test]
    fn chrono_then_multitrail_is_accepted() {
        let mut config = SolverConfig::default();
        SolverConfigUpdate {
            chrono: Some(Chrono::Level1),
            ..Default::default()
        }
        .apply(&mut config)
        .unwrap();
        SolverConfigUpdate {
            multitrail: Some(true),
            ..Default::default()
        }
        .apply(&mut config)
        .unwrap();
        assert!(config.multitrail);
    }

    #[test]
    fn checkprooflrat_without_lrat_is_rejected() {
        let mut config = SolverConfig::default();
        let update = SolverConfigUpdate {
            checkprooflrat: Some(true),
            ..Default::default()
        };
        assert!(matches!(
            update.apply(&mut config),
            Err(ConfigError::CheckProofLratRequiresLrat)
        ));
    }
}
