use serde::{
    Deserialize,
    Serialize,
};

/// One training observation for the mass-error model.
///
/// A point is created once per confidently matched precursor or
/// fragment observation and is immutable afterwards; the training
/// label (measured minus theoretical mz) travels alongside it in the
/// [`crate::ObservationStore`], never inside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationDataPoint {
    /// Observed mass-to-charge ratio.
    pub measured_mz: f64,
    /// Chromatographic elution time in minutes.
    pub retention_time: f64,
    /// 1 = precursor/survey scan, >= 2 = fragmentation scan.
    pub ms_level: u8,
    /// Intensity of the matched peak.
    pub intensity: f64,
    pub total_ion_current: f64,
    /// Ion accumulation time in milliseconds.
    pub injection_time: f64,
    /// 0 when unknown. Only meaningful for ms_level >= 2.
    pub precursor_charge: i32,
    /// Center of the isolation window. Only meaningful for ms_level >= 2.
    pub isolation_mz: f64,
    /// Offset of the matched mz from the isolation-window center,
    /// normalized by the half window width. 0 for survey scans.
    pub relative_mz: f64,
}

impl CalibrationDataPoint {
    /// Point taken from a survey (MS1) scan. Fragmentation-only
    /// attributes are zeroed.
    pub fn survey(
        measured_mz: f64,
        retention_time: f64,
        intensity: f64,
        total_ion_current: f64,
        injection_time: f64,
    ) -> Self {
        Self {
            measured_mz,
            retention_time,
            ms_level: 1,
            intensity,
            total_ion_current,
            injection_time,
            precursor_charge: 0,
            isolation_mz: 0.0,
            relative_mz: 0.0,
        }
    }

    /// Point taken from a fragmentation (MS2+) scan, carrying the full
    /// attribute set.
    #[allow(clippy::too_many_arguments)]
    pub fn fragmentation(
        measured_mz: f64,
        retention_time: f64,
        ms_level: u8,
        intensity: f64,
        total_ion_current: f64,
        injection_time: f64,
        precursor_charge: i32,
        isolation_mz: f64,
        relative_mz: f64,
    ) -> Self {
        Self {
            measured_mz,
            retention_time,
            ms_level,
            intensity,
            total_ion_current,
            injection_time,
            precursor_charge,
            isolation_mz,
            relative_mz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survey_zeroes_fragmentation_fields() {
        let p = CalibrationDataPoint::survey(500.25, 34.2, 1e5, 1e8, 12.0);
        assert_eq!(p.ms_level, 1);
        assert_eq!(p.precursor_charge, 0);
        assert_eq!(p.isolation_mz, 0.0);
        assert_eq!(p.relative_mz, 0.0);
    }

    #[test]
    fn test_fragmentation_carries_full_set() {
        let p = CalibrationDataPoint::fragmentation(
            450.1, 12.0, 2, 5e4, 2e7, 50.0, 2, 451.0, -0.6,
        );
        assert_eq!(p.ms_level, 2);
        assert_eq!(p.precursor_charge, 2);
        assert!((p.isolation_mz - 451.0).abs() < f64::EPSILON);
    }
}
