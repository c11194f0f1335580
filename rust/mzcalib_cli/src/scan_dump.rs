//! JSON interchange hosting the engine's IO collaborators: a scan
//! dump per raw file plus an identifications file that doubles as the
//! theoretical-mz lookup.

use crate::errors::CliError;
use mzcalib::{
    Identification,
    Spectrum,
    TheoreticalMz,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::{
    BufReader,
    BufWriter,
    Write,
};
use std::path::Path;

/// One identification record as stored on disk. Carries the
/// theoretical mz alongside so the CLI does not need a chemistry
/// library; a production deployment would plug a real calculator into
/// [`TheoreticalMz`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentRecord {
    pub scan_number: u32,
    pub charge: i32,
    pub matched_mz: f64,
    pub species: String,
    pub theoretical_mz: f64,
}

/// Species-keyed theoretical-mz lookup built from identification
/// files.
#[derive(Debug, Default)]
pub struct TheoreticalTable {
    by_species: HashMap<String, f64>,
}

impl TheoreticalTable {
    pub fn absorb(&mut self, records: &[IdentRecord]) {
        for rec in records {
            self.by_species
                .insert(rec.species.clone(), rec.theoretical_mz);
        }
    }
}

impl TheoreticalMz for TheoreticalTable {
    fn theoretical_mz(&self, identification: &Identification) -> Option<f64> {
        self.by_species.get(&identification.species).copied()
    }
}

/// [`SpectrumSink`] writing the corrected scan collection as JSON.
#[derive(Debug)]
pub struct JsonSink {
    path: std::path::PathBuf,
}

impl JsonSink {
    pub fn new(path: std::path::PathBuf) -> Self {
        Self { path }
    }
}

impl mzcalib::SpectrumSink for JsonSink {
    fn write_spectra(&mut self, spectra: &[Spectrum]) -> mzcalib::Result<()> {
        let file = File::create(&self.path).map_err(|e| mzcalib::MzCalibError::Io {
            source: e,
            path: Some(self.path.clone()),
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, spectra).map_err(mzcalib::MzCalibError::custom)?;
        // An implicit drop would swallow a failed final flush.
        writer.flush().map_err(|e| mzcalib::MzCalibError::Io {
            source: e,
            path: Some(self.path.clone()),
        })?;
        Ok(())
    }
}

pub fn load_spectra(path: &Path) -> Result<Vec<Spectrum>, CliError> {
    let file = File::open(path).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(path.to_string_lossy().to_string()),
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

pub fn load_identifications(path: &Path) -> Result<Vec<IdentRecord>, CliError> {
    let file = File::open(path).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(path.to_string_lossy().to_string()),
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

impl From<&IdentRecord> for Identification {
    fn from(rec: &IdentRecord) -> Self {
        Identification {
            scan_number: rec.scan_number,
            charge: rec.charge,
            matched_mz: rec.matched_mz,
            species: rec.species.clone(),
        }
    }
}
