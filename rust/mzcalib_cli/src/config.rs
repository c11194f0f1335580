use mzcalib::CalibrationConfig;
use serde::{
    Deserialize,
    Serialize,
};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Files to calibrate; independent of one another.
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FileEntry {
    /// Scan-dump JSON with the file's spectra.
    pub scans: PathBuf,
    /// Confidently filtered identifications for that file.
    pub identifications: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
}
