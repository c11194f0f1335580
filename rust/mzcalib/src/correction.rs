//! Applies fitted models back onto the scan collection.
//!
//! One correction value per scan: systematic error drifts slowly
//! enough within a single scan that every peak in it shares the same
//! delta. This is a documented simplifying assumption, not a physical
//! law.

use crate::models::{
    CalibrationModel,
    Spectrum,
};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{
    debug,
    warn,
};

/// Tallies from one application pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionStats {
    pub corrected: usize,
    /// Scans at a level without an accepted model.
    pub passed_through: usize,
    /// Scans whose covariates did not match the model schema; also
    /// passed through unchanged.
    pub schema_mismatches: usize,
}

enum ScanFate {
    Corrected,
    PassedThrough,
    SchemaMismatch,
}

/// Applies the per-level models to every scan, returning a new scan
/// collection in the original order. The originals are never mutated.
///
/// Each scan only reads itself and the shared immutable models, so the
/// per-scan map runs on the rayon pool.
pub fn correct_spectra(
    scans: &[Spectrum],
    models: &BTreeMap<u8, CalibrationModel>,
) -> (Vec<Spectrum>, CorrectionStats) {
    let ms1_model = models.get(&1);

    let corrected: Vec<(Spectrum, ScanFate)> = scans
        .par_iter()
        .map(|scan| correct_scan(scan, models, ms1_model))
        .collect();

    let mut stats = CorrectionStats::default();
    let mut out = Vec::with_capacity(corrected.len());
    for (scan, fate) in corrected {
        match fate {
            ScanFate::Corrected => stats.corrected += 1,
            ScanFate::PassedThrough => stats.passed_through += 1,
            ScanFate::SchemaMismatch => stats.schema_mismatches += 1,
        }
        out.push(scan);
    }

    if stats.schema_mismatches > 0 {
        warn!(
            "{} scans passed through due to schema mismatches",
            stats.schema_mismatches
        );
    }
    debug!(
        "Corrected {} scans, passed through {}",
        stats.corrected, stats.passed_through
    );

    (out, stats)
}

fn correct_scan(
    scan: &Spectrum,
    models: &BTreeMap<u8, CalibrationModel>,
    ms1_model: Option<&CalibrationModel>,
) -> (Spectrum, ScanFate) {
    let Some(model) = models.get(&scan.ms_level) else {
        return (scan.clone(), ScanFate::PassedThrough);
    };

    let delta = match model.correction_for_scan(scan) {
        Ok(delta) => delta,
        Err(mismatch) => {
            debug!(
                "Scan {} lacks {:?}; passing through uncorrected",
                mismatch.scan_number, mismatch.covariate
            );
            return (scan.clone(), ScanFate::SchemaMismatch);
        }
    };

    let mut out = scan.clone();
    for peak in &mut out.peaks {
        peak.mz -= delta;
    }

    // The precursor mz in a fragmentation-scan header originates from
    // the survey scan, so it takes the MS1 model's correction.
    if scan.ms_level >= 2 {
        if let (Some(prec), Some(ms1)) = (&mut out.precursor, ms1_model) {
            if let Ok(prec_delta) = ms1.correction_for_scan(scan) {
                prec.mz -= prec_delta;
            }
        }
    }

    (out, ScanFate::Corrected)
}
