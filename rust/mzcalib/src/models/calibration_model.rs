use crate::models::data_point::CalibrationDataPoint;
use crate::models::spectrum::Spectrum;
use serde::{
    Deserialize,
    Serialize,
};

/// A scan is missing an attribute the fitted schema requires.
/// Recovered per scan; the corrector passes the scan through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaMismatch {
    pub covariate: Covariate,
    pub scan_number: u32,
}

/// One regression term of the error model.
///
/// Intensity-like quantities enter through `ln(1 + x)` so the model
/// stays linear in its terms while spanning several orders of
/// magnitude of signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Covariate {
    Intercept,
    RetentionTime,
    LogTotalIonCurrent,
    LogInjectionTime,
    LogIntensity,
    IsolationMz,
    RelativeMz,
    ChargeState,
}

impl Covariate {
    /// Value of this term for a training observation.
    pub fn of_point(&self, p: &CalibrationDataPoint) -> f64 {
        match self {
            Covariate::Intercept => 1.0,
            Covariate::RetentionTime => p.retention_time,
            Covariate::LogTotalIonCurrent => p.total_ion_current.ln_1p(),
            Covariate::LogInjectionTime => p.injection_time.ln_1p(),
            Covariate::LogIntensity => p.intensity.ln_1p(),
            Covariate::IsolationMz => p.isolation_mz,
            Covariate::RelativeMz => p.relative_mz,
            Covariate::ChargeState => p.precursor_charge as f64,
        }
    }

    /// Value of this term for a whole scan, evaluated once and applied
    /// to every peak in it. Peak-resolved terms evaluate at their
    /// neutral position (isolation-window center for `RelativeMz`,
    /// base peak for `LogIntensity`).
    pub fn of_scan(&self, s: &Spectrum) -> Result<f64, SchemaMismatch> {
        let mismatch = |covariate| SchemaMismatch {
            covariate,
            scan_number: s.scan_number,
        };
        match self {
            Covariate::Intercept => Ok(1.0),
            Covariate::RetentionTime => Ok(s.retention_time_minutes),
            Covariate::LogTotalIonCurrent => Ok(s.total_ion_current.ln_1p()),
            Covariate::LogInjectionTime => Ok(s.injection_time_ms.ln_1p()),
            Covariate::LogIntensity => Ok(s.base_peak_intensity().ln_1p()),
            Covariate::IsolationMz => match &s.precursor {
                Some(prec) if prec.isolation_mz > 0.0 => Ok(prec.isolation_mz),
                _ => Err(mismatch(*self)),
            },
            Covariate::RelativeMz => Ok(0.0),
            Covariate::ChargeState => match &s.precursor {
                Some(prec) => Ok(prec.charge as f64),
                None => Err(mismatch(*self)),
            },
        }
    }
}

/// Ordered list of regression terms a model is trained on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovariateSchema {
    terms: Vec<Covariate>,
}

impl CovariateSchema {
    pub fn new(terms: Vec<Covariate>) -> Self {
        Self { terms }
    }

    /// Default schema for survey scans.
    pub fn ms1_default() -> Self {
        Self::new(vec![
            Covariate::Intercept,
            Covariate::RetentionTime,
            Covariate::LogTotalIonCurrent,
            Covariate::LogInjectionTime,
        ])
    }

    /// Default schema for fragmentation scans; adds the isolation
    /// window center, which tracks mass-dependent error across the
    /// fragmented range.
    pub fn ms2_default() -> Self {
        Self::new(vec![
            Covariate::Intercept,
            Covariate::RetentionTime,
            Covariate::LogTotalIonCurrent,
            Covariate::LogInjectionTime,
            Covariate::IsolationMz,
        ])
    }

    pub fn terms(&self) -> &[Covariate] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Design-matrix row for a training observation.
    pub fn row_for_point(&self, p: &CalibrationDataPoint) -> Vec<f64> {
        self.terms.iter().map(|t| t.of_point(p)).collect()
    }

    /// Covariate vector for a scan at application time.
    pub fn row_for_scan(&self, s: &Spectrum) -> Result<Vec<f64>, SchemaMismatch> {
        self.terms.iter().map(|t| t.of_scan(s)).collect()
    }
}

/// A fitted per-file, per-ms-level correction function.
///
/// Owns its coefficients and the schema it was trained on; the
/// corrector routes scans by ms level so a model is only ever
/// evaluated on the level it was fitted for. Read-only once built and
/// safe to share across parallel correction workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    ms_level: u8,
    schema: CovariateSchema,
    coefficients: Vec<f64>,
}

impl CalibrationModel {
    pub(crate) fn new(ms_level: u8, schema: CovariateSchema, coefficients: Vec<f64>) -> Self {
        debug_assert_eq!(schema.len(), coefficients.len());
        Self {
            ms_level,
            schema,
            coefficients,
        }
    }

    pub fn ms_level(&self) -> u8 {
        self.ms_level
    }

    pub fn schema(&self) -> &CovariateSchema {
        &self.schema
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Predicted mass error for a training observation.
    pub fn correction_for_point(&self, p: &CalibrationDataPoint) -> f64 {
        self.schema
            .terms()
            .iter()
            .zip(self.coefficients.iter())
            .map(|(t, c)| t.of_point(p) * c)
            .sum()
    }

    /// Predicted mass error for a whole scan.
    pub fn correction_for_scan(&self, s: &Spectrum) -> Result<f64, SchemaMismatch> {
        let row = self.schema.row_for_scan(s)?;
        Ok(row
            .iter()
            .zip(self.coefficients.iter())
            .map(|(x, c)| x * c)
            .sum())
    }
}
