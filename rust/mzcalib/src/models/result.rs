use serde::Serialize;

/// Outcome of one per-level fit attempt.
///
/// None of these are errors; an unaccepted level is simply left
/// uncalibrated and its scans pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FitVerdict {
    Accepted,
    /// Too few observations to fit reliably.
    InsufficientData,
    /// The fit converged but did not meaningfully reduce the residual
    /// spread.
    NoImprovement,
    /// The least-squares solve was rank deficient or produced
    /// non-finite coefficients.
    DegenerateFit,
}

/// Summary of one fit attempt, consumed by the orchestrator and the
/// reporting sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationResult {
    pub ms_level: u8,
    pub points_offered: usize,
    pub points_used: usize,
    pub points_rejected: usize,
    pub iterations: usize,
    /// Scaled median absolute deviation of the raw errors.
    pub pre_spread: f64,
    /// Scaled median absolute deviation of the residuals on the
    /// retained points. Equal to `pre_spread` when nothing was fitted.
    pub post_spread: f64,
    pub pre_mean_abs_error: f64,
    pub post_mean_abs_error: f64,
    pub verdict: FitVerdict,
}

impl CalibrationResult {
    /// Result for a level that never reached the solver.
    pub(crate) fn unfitted(
        ms_level: u8,
        points_offered: usize,
        pre_spread: f64,
        pre_mean_abs_error: f64,
        verdict: FitVerdict,
    ) -> Self {
        Self {
            ms_level,
            points_offered,
            points_used: 0,
            points_rejected: 0,
            iterations: 0,
            pre_spread,
            post_spread: pre_spread,
            pre_mean_abs_error,
            post_mean_abs_error: pre_mean_abs_error,
            verdict,
        }
    }
}

/// Per-file verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileOutcome {
    /// Every ms level present in the file got an accepted model.
    Calibrated,
    /// At least one level was corrected, at least one was skipped.
    PartiallyCalibrated,
    /// No level met the quality gates; original spectra retained.
    Uncalibrated,
    /// The run was cancelled before this file started.
    Cancelled,
}

/// Everything the reporting sink gets to see about one file's run.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file_id: String,
    pub outcome: FileOutcome,
    pub level_results: Vec<CalibrationResult>,
    pub scans_corrected: usize,
    pub scans_passed_through: usize,
    /// Scans whose covariates did not match the fitted schema.
    pub schema_mismatches: usize,
    /// Identifications dropped during feature extraction.
    pub observations_dropped: usize,
}

impl FileReport {
    pub(crate) fn cancelled(file_id: String) -> Self {
        Self {
            file_id,
            outcome: FileOutcome::Cancelled,
            level_results: Vec::new(),
            scans_corrected: 0,
            scans_passed_through: 0,
            schema_mismatches: 0,
            observations_dropped: 0,
        }
    }
}
