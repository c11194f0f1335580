use mzcalib::{
    BatchItem,
    CalibrationConfig,
    CalibrationDataPoint,
    CancellationToken,
    Covariate,
    CovariateSchema,
    FileOutcome,
    FitVerdict,
    Identification,
    InMemorySource,
    NoProgress,
    ObservationStore,
    Peak,
    PrecursorInfo,
    Spectrum,
    SpectrumSource,
    TheoreticalMz,
    calibrate_batch,
    calibrate_file,
    extract_observations,
    fit_level,
};
use rand::prelude::*;
use rand_distr_free_normal::sample_gaussian;
use std::collections::HashMap;

/// Box-Muller gaussian so the test suite does not need a distribution
/// crate on top of rand.
mod rand_distr_free_normal {
    use rand::Rng;

    pub fn sample_gaussian<R: Rng>(rng: &mut R, sigma: f64) -> f64 {
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen_range(0.0..1.0);
        sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

struct Table(HashMap<String, f64>);

impl TheoreticalMz for Table {
    fn theoretical_mz(&self, identification: &Identification) -> Option<f64> {
        self.0.get(&identification.species).copied()
    }
}

struct SyntheticRun {
    source: InMemorySource,
    identifications: Vec<Identification>,
    table: Table,
    /// Theoretical mz keyed by MS1 scan number, for post-correction
    /// error measurement.
    truth: HashMap<u32, f64>,
}

/// MS1 scans whose measured mz drifts by `0.01 + 0.0001 * rt` plus
/// gaussian noise, optionally interleaved with unidentified MS2 scans.
fn synthetic_run(n_ms1: usize, with_ms2: bool, noise_sigma: f64, seed: u64) -> SyntheticRun {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut scans = Vec::new();
    let mut identifications = Vec::new();
    let mut table = HashMap::new();
    let mut truth = HashMap::new();

    for i in 0..n_ms1 {
        let scan_number = (i * 2) as u32;
        let rt = i as f64 * 0.05;
        let theoretical = 400.0 + (i % 200) as f64 * 2.0;
        let error = 0.01 + 0.0001 * rt + sample_gaussian(&mut rng, noise_sigma);
        let measured = theoretical + error;
        let species = format!("sp_{}", i);

        scans.push(Spectrum {
            scan_number,
            ms_level: 1,
            retention_time_minutes: rt,
            total_ion_current: 1e8 * (1.0 + rng.gen_range(-0.2..0.2)),
            injection_time_ms: 20.0 + rng.gen_range(0.0..10.0),
            precursor: None,
            peaks: vec![Peak {
                mz: measured,
                intensity: 1e4,
            }],
        });
        identifications.push(Identification {
            scan_number,
            charge: 2,
            matched_mz: measured,
            species: species.clone(),
        });
        table.insert(species, theoretical);
        truth.insert(scan_number, theoretical);

        if with_ms2 {
            scans.push(Spectrum {
                scan_number: scan_number + 1,
                ms_level: 2,
                retention_time_minutes: rt + 0.01,
                total_ion_current: 1e6,
                injection_time_ms: 50.0,
                precursor: Some(PrecursorInfo {
                    mz: measured,
                    charge: 2,
                    isolation_mz: theoretical,
                    isolation_width: 2.0,
                }),
                peaks: vec![Peak {
                    mz: 300.0,
                    intensity: 1e3,
                }],
            });
        }
    }

    SyntheticRun {
        source: InMemorySource::new(scans),
        identifications,
        table: Table(table),
        truth,
    }
}

fn mean_abs_error_on_ms1(run: &SyntheticRun, spectra: &[Spectrum]) -> f64 {
    let mut total = 0.0;
    let mut n = 0usize;
    for scan in spectra.iter().filter(|s| s.ms_level == 1) {
        let theoretical = run.truth[&scan.scan_number];
        total += (scan.peaks[0].mz - theoretical).abs();
        n += 1;
    }
    total / n as f64
}

#[test]
fn test_fitter_recovers_known_linear_drift() {
    let run = synthetic_run(1000, false, 0.0005, 1);
    let mut store = ObservationStore::new();
    extract_observations(
        &run.identifications,
        &run.source,
        &run.table,
        &mut store,
    );

    let schema = CovariateSchema::new(vec![Covariate::Intercept, Covariate::RetentionTime]);
    let out = fit_level(1, store.points_for(1), &schema, &CalibrationConfig::default());
    let model = out.model.expect("clean drift must be fittable");

    assert!(
        (model.coefficients()[0] - 0.01).abs() < 1e-3,
        "intercept off: {:?}",
        model.coefficients()
    );
    assert!(
        (model.coefficients()[1] - 0.0001).abs() < 1e-4,
        "rt slope off: {:?}",
        model.coefficients()
    );
    assert!(out.result.post_spread < out.result.pre_spread);
}

#[test]
fn test_outlier_minority_barely_shifts_the_model() {
    let run = synthetic_run(1000, false, 0.0005, 2);
    let mut store = ObservationStore::new();
    extract_observations(
        &run.identifications,
        &run.source,
        &run.table,
        &mut store,
    );
    let clean: Vec<(CalibrationDataPoint, f64)> = store.points_for(1).to_vec();

    // Contaminate 8% of the observations with wild errors.
    let mut rng = StdRng::seed_from_u64(3);
    let mut dirty = clean.clone();
    for (_, e) in dirty.iter_mut().take(80) {
        *e += if rng.gen_bool(0.5) { 0.5 } else { -0.5 };
    }

    let schema = CovariateSchema::new(vec![Covariate::Intercept, Covariate::RetentionTime]);
    let config = CalibrationConfig::default();
    let clean_model = fit_level(1, &clean, &schema, &config)
        .model
        .expect("clean fit");
    let dirty_model = fit_level(1, &dirty, &schema, &config)
        .model
        .expect("contaminated fit");

    let max_shift = clean
        .iter()
        .map(|(p, _)| {
            (clean_model.correction_for_point(p) - dirty_model.correction_for_point(p)).abs()
        })
        .fold(0.0, f64::max);
    assert!(
        max_shift < 5e-4,
        "outliers shifted corrections by {}",
        max_shift
    );
}

#[test]
fn test_insufficient_data_never_produces_a_model() {
    let run = synthetic_run(100, false, 0.0005, 4);
    let mut store = ObservationStore::new();
    extract_observations(
        &run.identifications,
        &run.source,
        &run.table,
        &mut store,
    );
    let out = fit_level(
        1,
        store.points_for(1),
        &CovariateSchema::ms1_default(),
        &CalibrationConfig::default(),
    );
    assert!(out.model.is_none());
    assert_eq!(out.result.verdict, FitVerdict::InsufficientData);
}

#[test]
fn test_end_to_end_drift_correction() {
    let run = synthetic_run(1000, false, 0.0005, 5);

    let before = mean_abs_error_on_ms1(&run, run.source.scans());
    assert!(
        (0.005..0.03).contains(&before),
        "synthetic drift out of expected band: {}",
        before
    );

    let out = calibrate_file(
        "synthetic_run",
        &run.source,
        &run.identifications,
        &run.table,
        &CalibrationConfig::default(),
        &CancellationToken::new(),
        &NoProgress,
    );
    assert_eq!(out.report.outcome, FileOutcome::Calibrated);

    let after = mean_abs_error_on_ms1(&run, &out.spectra);
    assert!(
        after < 0.001,
        "mean absolute error after correction: {} (before: {})",
        after,
        before
    );
}

#[test]
fn test_correction_is_a_stable_fixed_point() {
    let run = synthetic_run(1000, false, 0.0005, 6);
    let out = calibrate_file(
        "first_pass",
        &run.source,
        &run.identifications,
        &run.table,
        &CalibrationConfig::default(),
        &CancellationToken::new(),
        &NoProgress,
    );
    assert_eq!(out.report.outcome, FileOutcome::Calibrated);

    // Re-fit on the corrected output: residual errors are near zero,
    // so any second model must correct by next to nothing.
    let corrected_source = InMemorySource::new(out.spectra.clone());
    let corrected_idents: Vec<Identification> = out
        .spectra
        .iter()
        .zip(run.identifications.iter())
        .map(|(scan, ident)| Identification {
            matched_mz: scan.peaks[0].mz,
            ..ident.clone()
        })
        .collect();

    let mut store = ObservationStore::new();
    extract_observations(
        &corrected_idents,
        &corrected_source,
        &run.table,
        &mut store,
    );
    let second = fit_level(
        1,
        store.points_for(1),
        &CovariateSchema::new(vec![Covariate::Intercept, Covariate::RetentionTime]),
        &CalibrationConfig::default(),
    );
    match second.model {
        // Noise-only residuals usually fail the improvement gate.
        None => assert_ne!(second.result.verdict, FitVerdict::Accepted),
        Some(model) => {
            let max_correction = store
                .points_for(1)
                .iter()
                .map(|(p, _)| model.correction_for_point(p).abs())
                .fold(0.0, f64::max);
            assert!(
                max_correction < 5e-4,
                "second pass still corrects by {}",
                max_correction
            );
        }
    }
}

#[test]
fn test_empty_ms2_level_passes_through_unchanged() {
    let run = synthetic_run(1000, true, 0.0005, 7);
    let out = calibrate_file(
        "mixed_run",
        &run.source,
        &run.identifications,
        &run.table,
        &CalibrationConfig::default(),
        &CancellationToken::new(),
        &NoProgress,
    );

    assert_eq!(out.report.outcome, FileOutcome::PartiallyCalibrated);
    let ms2_result = out
        .report
        .level_results
        .iter()
        .find(|r| r.ms_level == 2)
        .expect("ms2 must be reported");
    assert_eq!(ms2_result.verdict, FitVerdict::InsufficientData);

    // MS1 corrected
    let after = mean_abs_error_on_ms1(&run, &out.spectra);
    assert!(after < 0.001, "ms1 error after correction: {}", after);

    // MS2 byte-for-byte identical, header included
    for (orig, new) in run
        .source
        .scans()
        .iter()
        .zip(out.spectra.iter())
        .filter(|(s, _)| s.ms_level == 2)
    {
        assert_eq!(orig, new);
    }
}

#[test]
fn test_cancelled_batch_reports_every_file() {
    let runs: Vec<SyntheticRun> = (0..3).map(|i| synthetic_run(50, false, 0.0005, 10 + i)).collect();
    let table = Table(HashMap::new());
    let items: Vec<BatchItem<InMemorySource>> = runs
        .into_iter()
        .enumerate()
        .map(|(i, run)| BatchItem {
            file_id: format!("file_{}", i),
            source: run.source,
            identifications: run.identifications,
        })
        .collect();

    let token = CancellationToken::new();
    token.cancel();
    let results = calibrate_batch(
        &items,
        &table,
        &CalibrationConfig::default(),
        &token,
        &NoProgress,
    );
    assert_eq!(results.len(), 3);
    for file in &results {
        assert_eq!(file.report.outcome, FileOutcome::Cancelled);
        assert!(file.spectra.is_empty());
    }
}
