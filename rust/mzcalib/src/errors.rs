use std::fmt::Display;
use std::path::PathBuf;

/// Collaborator-level failures. Poor calibration quality is never an
/// error; it is reported through [`crate::models::FitVerdict`] and
/// [`crate::models::FileReport`] instead.
#[derive(Debug)]
pub enum MzCalibError {
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    Other(String),
}

impl Display for MzCalibError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for MzCalibError {}

impl MzCalibError {
    pub fn custom(msg: impl Display) -> Self {
        Self::Other(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MzCalibError>;

impl From<std::io::Error> for MzCalibError {
    fn from(x: std::io::Error) -> Self {
        Self::Io {
            source: x,
            path: None,
        }
    }
}
