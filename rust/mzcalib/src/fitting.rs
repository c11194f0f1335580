//! Robust regression of observed mass error against the covariate
//! schema, one model per ms level.
//!
//! The fit alternates ordinary least squares with MAD-based outlier
//! rejection until the rejected set stabilizes, then gates the model
//! on relative spread improvement before accepting it.

use crate::config::CalibrationConfig;
use crate::models::{
    CalibrationDataPoint,
    CalibrationModel,
    CalibrationResult,
    CovariateSchema,
    FitVerdict,
};
use nalgebra::{
    DMatrix,
    DVector,
};
use tracing::{
    debug,
    info,
    warn,
};

/// Residual spreads below this are treated as already converged; the
/// data carries no correctable signal at that scale.
const MIN_RESIDUAL_SPREAD: f64 = 1e-12;

/// Consistency factor relating the median absolute deviation to the
/// standard deviation of a normal distribution.
const MAD_SCALE: f64 = 1.4826;

/// Singular values below this are treated as zero by the SVD solve.
const SVD_EPSILON: f64 = 1e-10;

/// A fit attempt's output: the model when accepted, always a summary.
#[derive(Debug, Clone)]
pub struct FitOutput {
    pub model: Option<CalibrationModel>,
    pub result: CalibrationResult,
}

/// Fits the error model for one ms level.
///
/// Never fails: unfit levels come back with `model: None` and a
/// verdict explaining why.
pub fn fit_level(
    ms_level: u8,
    observations: &[(CalibrationDataPoint, f64)],
    schema: &CovariateSchema,
    config: &CalibrationConfig,
) -> FitOutput {
    let n = observations.len();
    let errors: Vec<f64> = observations.iter().map(|(_, e)| e).copied().collect();
    let pre_spread = scaled_mad(&errors);
    let pre_mae = mean_abs(&errors);

    if n < config.min_points_per_level {
        debug!(
            "ms level {}: {} observations, below the minimum of {}",
            ms_level, n, config.min_points_per_level
        );
        return FitOutput {
            model: None,
            result: CalibrationResult::unfitted(
                ms_level,
                n,
                pre_spread,
                pre_mae,
                FitVerdict::InsufficientData,
            ),
        };
    }

    let rows: Vec<Vec<f64>> = observations
        .iter()
        .map(|(p, _)| schema.row_for_point(p))
        .collect();

    // Minimum retained set for the solve to stay overdetermined.
    let min_survivors = schema.len() + 1;

    let mut active = vec![true; n];
    let mut coefficients: Vec<f64> = Vec::new();
    let mut iterations = 0;

    // At least one solve even with a zero iteration budget.
    let max_iterations = config.max_fit_iterations.max(1);

    while iterations < max_iterations {
        iterations += 1;

        let Some(beta) = solve_least_squares(&rows, &errors, &active) else {
            warn!("ms level {}: degenerate least-squares solve", ms_level);
            return FitOutput {
                model: None,
                result: CalibrationResult::unfitted(
                    ms_level,
                    n,
                    pre_spread,
                    pre_mae,
                    FitVerdict::DegenerateFit,
                ),
            };
        };
        coefficients = beta;

        // Residuals over all offered points so a point rejected early
        // can re-enter once the fit tightens.
        let residuals: Vec<f64> = rows
            .iter()
            .zip(errors.iter())
            .map(|(row, e)| e - predict(row, &coefficients))
            .collect();

        let active_residuals: Vec<f64> = residuals
            .iter()
            .zip(active.iter())
            .filter(|(_, &a)| a)
            .map(|(r, _)| *r)
            .collect();
        let spread = scaled_mad(&active_residuals);
        if spread < MIN_RESIDUAL_SPREAD {
            break;
        }

        // Rejection centered on the median residual so a skewed
        // contaminated first fit cannot sweep the clean points out.
        let center = median(&active_residuals);
        let threshold = config.outlier_threshold_factor * spread;
        let new_active: Vec<bool> = residuals
            .iter()
            .map(|r| (r - center).abs() <= threshold)
            .collect();
        if new_active.iter().filter(|&&a| a).count() < min_survivors {
            warn!(
                "ms level {}: outlier rejection left fewer than {} points",
                ms_level, min_survivors
            );
            return FitOutput {
                model: None,
                result: CalibrationResult::unfitted(
                    ms_level,
                    n,
                    pre_spread,
                    pre_mae,
                    FitVerdict::DegenerateFit,
                ),
            };
        }
        if new_active == active {
            break;
        }
        active = new_active;
    }

    let model = CalibrationModel::new(ms_level, schema.clone(), coefficients);

    let used_residuals: Vec<f64> = rows
        .iter()
        .zip(errors.iter())
        .zip(active.iter())
        .filter(|(_, &a)| a)
        .map(|((row, e), _)| e - predict(row, model.coefficients()))
        .collect();
    let points_used = used_residuals.len();
    let post_spread = scaled_mad(&used_residuals);
    let post_mae = mean_abs(&used_residuals);

    // A degenerate pre-fit spread means the errors are all but
    // identical around their center; the spread ratio is meaningless
    // there, so the gate falls back to mean absolute error, which
    // still sees a constant bias.
    let improvement = if pre_spread >= MIN_RESIDUAL_SPREAD {
        1.0 - post_spread / pre_spread
    } else if pre_mae >= MIN_RESIDUAL_SPREAD {
        1.0 - post_mae / pre_mae
    } else {
        0.0
    };

    let verdict = if improvement < config.min_improvement_ratio {
        FitVerdict::NoImprovement
    } else {
        FitVerdict::Accepted
    };

    let result = CalibrationResult {
        ms_level,
        points_offered: n,
        points_used,
        points_rejected: n - points_used,
        iterations,
        pre_spread,
        post_spread,
        pre_mean_abs_error: pre_mae,
        post_mean_abs_error: post_mae,
        verdict,
    };

    match verdict {
        FitVerdict::Accepted => {
            info!(
                "ms level {}: accepted model on {}/{} points after {} iterations, \
                 spread {:.2e} -> {:.2e}",
                ms_level, points_used, n, iterations, pre_spread, post_spread
            );
            FitOutput {
                model: Some(model),
                result,
            }
        }
        _ => {
            info!(
                "ms level {}: fit rejected ({:?}), spread {:.2e} -> {:.2e}",
                ms_level, verdict, pre_spread, post_spread
            );
            FitOutput {
                model: None,
                result,
            }
        }
    }
}

fn predict(row: &[f64], coefficients: &[f64]) -> f64 {
    row.iter()
        .zip(coefficients.iter())
        .map(|(x, c)| x * c)
        .sum()
}

/// Least squares over the active subset via SVD. None when the system
/// is rank deficient or produces non-finite coefficients.
fn solve_least_squares(rows: &[Vec<f64>], y: &[f64], active: &[bool]) -> Option<Vec<f64>> {
    let picked: Vec<usize> = (0..rows.len()).filter(|&i| active[i]).collect();
    let n = picked.len();
    let p = rows.first()?.len();
    if n < p {
        return None;
    }

    let x = DMatrix::from_fn(n, p, |i, j| rows[picked[i]][j]);
    let yv = DVector::from_fn(n, |i, _| y[picked[i]]);

    let svd = x.svd(true, true);
    let beta = svd.solve(&yv, SVD_EPSILON).ok()?;
    if beta.iter().any(|b| !b.is_finite()) {
        return None;
    }
    Some(beta.iter().copied().collect())
}

/// Scaled median absolute deviation, 0 for an empty slice.
pub fn scaled_mad(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let center = median(values);
    let abs_dev: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    MAD_SCALE * median(&abs_dev)
}

pub fn mean_abs(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.partial_cmp(b).expect("residuals must not be NaN"));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
