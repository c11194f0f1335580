//! Sequences one file's calibration and fans batches out over the
//! rayon pool.
//!
//! Per file the stages run strictly in order:
//! `Collecting -> Fitting -> {Applying | SkippedLowQuality} -> Done`.
//! Poor calibration quality is never an error; every file comes back
//! with a [`FileReport`].

use crate::config::CalibrationConfig;
use crate::correction::correct_spectra;
use crate::extraction::{
    Identification,
    extract_observations,
};
use crate::fitting::fit_level;
use crate::models::{
    CalibrationModel,
    CalibrationResult,
    FileOutcome,
    FileReport,
    FitVerdict,
    Spectrum,
};
use crate::observations::ObservationStore;
use crate::traits::{
    ProgressObserver,
    SpectrumSource,
    TheoreticalMz,
};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{
    BTreeMap,
    BTreeSet,
};
use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use tracing::info;

/// Per-file calibration stage, reported through
/// [`ProgressObserver::stage_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CalibrationStage {
    Collecting,
    Fitting,
    Applying,
    /// Terminal: no level met the quality gates, originals retained.
    SkippedLowQuality,
    Done,
}

/// Cooperative cancellation for a multi-file run. Checked between
/// files and between stages; a file that reached `Applying` always
/// finishes so no file is left with partially applied corrections.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One file's output: the corrected (or retained original) scans plus
/// the report. A cancelled file produces no scans.
#[derive(Debug)]
pub struct CalibratedFile {
    pub spectra: Vec<Spectrum>,
    pub report: FileReport,
}

/// One file of a batch run.
pub struct BatchItem<S> {
    pub file_id: String,
    pub source: S,
    pub identifications: Vec<Identification>,
}

/// Runs the full state machine for one raw file.
pub fn calibrate_file<S: SpectrumSource, C: TheoreticalMz>(
    file_id: &str,
    source: &S,
    identifications: &[Identification],
    theoretical: &C,
    config: &CalibrationConfig,
    token: &CancellationToken,
    progress: &dyn ProgressObserver,
) -> CalibratedFile {
    if token.is_cancelled() {
        return CalibratedFile {
            spectra: Vec::new(),
            report: FileReport::cancelled(file_id.to_string()),
        };
    }

    progress.stage_changed(file_id, CalibrationStage::Collecting);
    let mut store = ObservationStore::new();
    let extraction = extract_observations(identifications, source, theoretical, &mut store);

    if token.is_cancelled() {
        return CalibratedFile {
            spectra: Vec::new(),
            report: FileReport::cancelled(file_id.to_string()),
        };
    }

    progress.stage_changed(file_id, CalibrationStage::Fitting);
    let (models, level_results) = fit_all_levels(source.scans(), &store, config);

    if models.is_empty() {
        progress.stage_changed(file_id, CalibrationStage::SkippedLowQuality);
        info!("{}: no level met the quality gates, leaving file uncalibrated", file_id);
        let report = FileReport {
            file_id: file_id.to_string(),
            outcome: FileOutcome::Uncalibrated,
            level_results,
            scans_corrected: 0,
            scans_passed_through: source.scans().len(),
            schema_mismatches: 0,
            observations_dropped: extraction.dropped(),
        };
        progress.stage_changed(file_id, CalibrationStage::Done);
        return CalibratedFile {
            spectra: source.scans().to_vec(),
            report,
        };
    }

    if token.is_cancelled() {
        return CalibratedFile {
            spectra: Vec::new(),
            report: FileReport::cancelled(file_id.to_string()),
        };
    }

    progress.stage_changed(file_id, CalibrationStage::Applying);
    let (spectra, stats) = correct_spectra(source.scans(), &models);

    let attempted = level_results.len();
    let outcome = if models.len() == attempted {
        FileOutcome::Calibrated
    } else {
        FileOutcome::PartiallyCalibrated
    };

    let report = FileReport {
        file_id: file_id.to_string(),
        outcome,
        level_results,
        scans_corrected: stats.corrected,
        scans_passed_through: stats.passed_through,
        schema_mismatches: stats.schema_mismatches,
        observations_dropped: extraction.dropped(),
    };
    info!(
        "{}: {:?}, {} corrected / {} passed through / {} mismatched scans",
        file_id, report.outcome, stats.corrected, stats.passed_through, stats.schema_mismatches
    );
    progress.stage_changed(file_id, CalibrationStage::Done);

    CalibratedFile { spectra, report }
}

/// Fits every ms level present in either the scans or the store, so a
/// level with scans but no usable observations still shows up in the
/// report as `InsufficientData`.
fn fit_all_levels(
    scans: &[Spectrum],
    store: &ObservationStore,
    config: &CalibrationConfig,
) -> (BTreeMap<u8, CalibrationModel>, Vec<CalibrationResult>) {
    let levels: BTreeSet<u8> = scans
        .iter()
        .map(|s| s.ms_level)
        .chain(store.levels())
        .collect();

    let mut models = BTreeMap::new();
    let mut results = Vec::with_capacity(levels.len());
    for level in levels {
        let schema = config.schema_for(level);
        let out = fit_level(level, store.points_for(level), &schema, config);
        if let Some(model) = out.model {
            debug_assert_eq!(out.result.verdict, FitVerdict::Accepted);
            models.insert(level, model);
        }
        results.push(out.result);
    }
    (models, results)
}

/// Calibrates independent files on the rayon pool. Each file's state
/// is private to its run; files queued after a cancel come back as
/// `Cancelled` while in-flight files complete normally.
pub fn calibrate_batch<S, C>(
    items: &[BatchItem<S>],
    theoretical: &C,
    config: &CalibrationConfig,
    token: &CancellationToken,
    progress: &dyn ProgressObserver,
) -> Vec<CalibratedFile>
where
    S: SpectrumSource + Sync,
    C: TheoreticalMz + Sync,
{
    items
        .par_iter()
        .map(|item| {
            calibrate_file(
                &item.file_id,
                &item.source,
                &item.identifications,
                theoretical,
                config,
                token,
                progress,
            )
        })
        .collect()
}
