//! Mass recalibration engine for LC-MS runs.
//!
//! Builds a per-file systematic mass-error model from confidently
//! identified spectral features and applies it to every scan of the
//! file. Raw file IO, identification, and theoretical mass calculation
//! are collaborators reached through the traits in [`traits`].

pub mod config;
pub mod correction;
pub mod errors;
pub mod extraction;
pub mod fitting;
pub mod models;
pub mod observations;
pub mod orchestrator;
pub mod traits;

pub use config::CalibrationConfig;
pub use correction::{
    CorrectionStats,
    correct_spectra,
};
pub use errors::{
    MzCalibError,
    Result,
};
pub use extraction::{
    ExtractionSummary,
    Identification,
    extract_observations,
};
pub use fitting::{
    FitOutput,
    fit_level,
};
pub use models::{
    CalibrationDataPoint,
    CalibrationModel,
    CalibrationResult,
    Covariate,
    CovariateSchema,
    FileOutcome,
    FileReport,
    FitVerdict,
    Peak,
    PrecursorInfo,
    SchemaMismatch,
    Spectrum,
};
pub use observations::ObservationStore;
pub use orchestrator::{
    BatchItem,
    CalibratedFile,
    CalibrationStage,
    CancellationToken,
    calibrate_batch,
    calibrate_file,
};
pub use traits::{
    InMemorySource,
    NoProgress,
    ProgressObserver,
    SpectrumSink,
    SpectrumSource,
    TheoreticalMz,
};
