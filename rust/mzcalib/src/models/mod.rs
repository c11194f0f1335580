pub mod calibration_model;
pub mod data_point;
pub mod result;
pub mod spectrum;

pub use calibration_model::{
    CalibrationModel,
    Covariate,
    CovariateSchema,
    SchemaMismatch,
};
pub use data_point::CalibrationDataPoint;
pub use result::{
    CalibrationResult,
    FileOutcome,
    FileReport,
    FitVerdict,
};
pub use spectrum::{
    Peak,
    PrecursorInfo,
    Spectrum,
};
