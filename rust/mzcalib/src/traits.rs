//! Boundary contracts for the collaborators the engine does not own:
//! raw spectrum IO, theoretical mass calculation, and progress
//! reporting.

use crate::errors::Result;
use crate::extraction::Identification;
use crate::models::Spectrum;
use crate::orchestrator::CalibrationStage;
use std::collections::HashMap;

/// A raw file already loaded by the IO collaborator, addressable by
/// scan number.
pub trait SpectrumSource {
    fn scan(&self, scan_number: u32) -> Option<&Spectrum>;
    fn scans(&self) -> &[Spectrum];
}

/// External chemistry collaborator. Returns None when the theoretical
/// mz cannot be computed (unsupported modification, ambiguous charge);
/// the extractor drops such identifications rather than failing.
pub trait TheoreticalMz {
    fn theoretical_mz(&self, identification: &Identification) -> Option<f64>;
}

/// Serializes a corrected scan collection; the output format is the
/// collaborator's concern.
pub trait SpectrumSink {
    fn write_spectra(&mut self, spectra: &[Spectrum]) -> Result<()>;
}

/// Structured stage-transition events, consumable by a GUI, a CLI
/// progress bar, or a log with no engine coupling.
pub trait ProgressObserver: Sync {
    fn stage_changed(&self, _file_id: &str, _stage: CalibrationStage) {}
}

/// Observer that discards all events.
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

/// In-memory [`SpectrumSource`] backed by a scan-number index.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    scans: Vec<Spectrum>,
    by_number: HashMap<u32, usize>,
}

impl InMemorySource {
    pub fn new(scans: Vec<Spectrum>) -> Self {
        let by_number = scans
            .iter()
            .enumerate()
            .map(|(i, s)| (s.scan_number, i))
            .collect();
        Self { scans, by_number }
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }
}

impl SpectrumSource for InMemorySource {
    fn scan(&self, scan_number: u32) -> Option<&Spectrum> {
        self.by_number.get(&scan_number).map(|&i| &self.scans[i])
    }

    fn scans(&self) -> &[Spectrum] {
        &self.scans
    }
}
