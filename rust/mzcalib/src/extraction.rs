//! Turns confidently identified matches into calibration observations.
//!
//! Confidence filtering (FDR control) happens upstream; everything
//! handed in here is assumed trustworthy enough to train on. Matches
//! that cannot yield a usable observation are dropped and counted,
//! never error-signalled, since patchy calibration coverage is normal.

use crate::models::CalibrationDataPoint;
use crate::observations::ObservationStore;
use crate::traits::{
    SpectrumSource,
    TheoreticalMz,
};
use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    warn,
};

/// One confidently matched species observation, as supplied by the
/// identification collaborator. `species` is an opaque key the
/// theoretical-mz collaborator interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    pub scan_number: u32,
    pub charge: i32,
    /// Observed mz of the matched peak.
    pub matched_mz: f64,
    pub species: String,
}

/// Where the dropped identifications went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    pub observations: usize,
    pub dropped_no_theoretical: usize,
    pub dropped_missing_scan: usize,
    pub dropped_no_isolation: usize,
}

impl ExtractionSummary {
    pub fn dropped(&self) -> usize {
        self.dropped_no_theoretical + self.dropped_missing_scan + self.dropped_no_isolation
    }
}

/// Converts identifications into `(point, error)` observations,
/// partitioned by ms level inside the store.
pub fn extract_observations<S: SpectrumSource, C: TheoreticalMz>(
    identifications: &[Identification],
    source: &S,
    theoretical: &C,
    store: &mut ObservationStore,
) -> ExtractionSummary {
    let mut summary = ExtractionSummary::default();

    for ident in identifications {
        let Some(scan) = source.scan(ident.scan_number) else {
            summary.dropped_missing_scan += 1;
            continue;
        };
        let Some(theo_mz) = theoretical.theoretical_mz(ident) else {
            summary.dropped_no_theoretical += 1;
            continue;
        };
        let error = ident.matched_mz - theo_mz;
        let intensity = scan
            .nearest_peak(ident.matched_mz)
            .map(|p| p.intensity)
            .unwrap_or(0.0);

        let point = if scan.ms_level <= 1 {
            CalibrationDataPoint::survey(
                ident.matched_mz,
                scan.retention_time_minutes,
                intensity,
                scan.total_ion_current,
                scan.injection_time_ms,
            )
        } else {
            let Some(prec) = scan.precursor.filter(|p| p.isolation_mz > 0.0) else {
                summary.dropped_no_isolation += 1;
                continue;
            };
            CalibrationDataPoint::fragmentation(
                ident.matched_mz,
                scan.retention_time_minutes,
                scan.ms_level,
                intensity,
                scan.total_ion_current,
                scan.injection_time_ms,
                ident.charge,
                prec.isolation_mz,
                relative_mz(ident.matched_mz, prec.isolation_mz, prec.isolation_width),
            )
        };
        store.add(point, error);
        summary.observations += 1;
    }

    debug!(
        "Extracted {} observations ({} dropped) from {} identifications",
        summary.observations,
        summary.dropped(),
        identifications.len()
    );
    if !identifications.is_empty() && summary.dropped() * 2 > identifications.len() {
        warn!(
            "More than half of the identifications were dropped during extraction: {:?}",
            summary
        );
    }

    summary
}

/// Offset of the matched mz from the isolation-window center,
/// normalized by the half window width when one is recorded.
fn relative_mz(matched_mz: f64, isolation_mz: f64, isolation_width: f64) -> f64 {
    let offset = matched_mz - isolation_mz;
    let half_width = isolation_width / 2.0;
    if half_width > 0.0 {
        offset / half_width
    } else {
        offset
    }
}
