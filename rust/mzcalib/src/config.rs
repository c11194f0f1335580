use crate::models::CovariateSchema;
use serde::{
    Deserialize,
    Serialize,
};

/// Thresholds and limits for one calibration run, supplied at
/// orchestration start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Minimum observations per ms level before a fit is attempted.
    pub min_points_per_level: usize,
    /// Residuals beyond this multiple of the scaled median absolute
    /// deviation are rejected as outliers.
    pub outlier_threshold_factor: f64,
    /// Minimum relative reduction of the residual spread for a fit to
    /// be accepted.
    pub min_improvement_ratio: f64,
    /// Upper bound on reject-and-refit rounds.
    pub max_fit_iterations: usize,
    /// Override for the survey-scan covariate set.
    pub ms1_schema: Option<CovariateSchema>,
    /// Override for the fragmentation-scan covariate set.
    pub ms2_schema: Option<CovariateSchema>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_points_per_level: 400,
            outlier_threshold_factor: 4.0,
            min_improvement_ratio: 0.05,
            max_fit_iterations: 10,
            ms1_schema: None,
            ms2_schema: None,
        }
    }
}

impl CalibrationConfig {
    /// Schema used for `ms_level`; all fragmentation levels share the
    /// MS2 schema.
    pub fn schema_for(&self, ms_level: u8) -> CovariateSchema {
        if ms_level <= 1 {
            self.ms1_schema
                .clone()
                .unwrap_or_else(CovariateSchema::ms1_default)
        } else {
            self.ms2_schema
                .clone()
                .unwrap_or_else(CovariateSchema::ms2_default)
        }
    }
}
