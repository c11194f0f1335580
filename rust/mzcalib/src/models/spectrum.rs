use serde::{
    Deserialize,
    Serialize,
};

/// A single centroided peak.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Peak {
    pub mz: f64,
    pub intensity: f64,
}

/// Precursor selection recorded in a fragmentation-scan header.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecursorInfo {
    /// Selected precursor mz as recorded by the instrument.
    pub mz: f64,
    /// 0 when the charge could not be determined.
    pub charge: i32,
    /// Center of the isolation window.
    pub isolation_mz: f64,
    /// Full width of the isolation window.
    pub isolation_width: f64,
}

/// One scan as handed over by the raw-spectrum-reader collaborator.
///
/// Correction never mutates a `Spectrum` in place; the corrector
/// produces new values so calibration can be re-run from the
/// unmodified source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub scan_number: u32,
    pub ms_level: u8,
    pub retention_time_minutes: f64,
    pub total_ion_current: f64,
    pub injection_time_ms: f64,
    /// Present for ms_level >= 2 scans with a recorded selection.
    pub precursor: Option<PrecursorInfo>,
    pub peaks: Vec<Peak>,
}

impl Spectrum {
    /// Intensity of the most intense peak, 0 for an empty scan.
    pub fn base_peak_intensity(&self) -> f64 {
        self.peaks
            .iter()
            .map(|p| p.intensity)
            .fold(0.0, f64::max)
    }

    /// The peak closest in mz to `mz`, None for an empty scan.
    pub fn nearest_peak(&self, mz: f64) -> Option<&Peak> {
        self.peaks.iter().min_by(|a, b| {
            (a.mz - mz)
                .abs()
                .partial_cmp(&(b.mz - mz).abs())
                .expect("peak mz values must not be NaN")
        })
    }
}
