use crate::models::CalibrationDataPoint;
use std::collections::BTreeMap;

/// Calibration observations for one raw file, grouped by ms level.
///
/// Each entry pairs an immutable [`CalibrationDataPoint`] with its
/// training label (measured minus theoretical mz). Points are kept in
/// insertion order and never deduplicated; an empty level simply
/// signals insufficient data to the fitter.
#[derive(Debug, Default)]
pub struct ObservationStore {
    by_level: BTreeMap<u8, Vec<(CalibrationDataPoint, f64)>>,
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, point: CalibrationDataPoint, error: f64) {
        self.by_level
            .entry(point.ms_level)
            .or_default()
            .push((point, error));
    }

    /// All observations at `ms_level` in insertion order.
    pub fn points_for(&self, ms_level: u8) -> &[(CalibrationDataPoint, f64)] {
        self.by_level
            .get(&ms_level)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len_for(&self, ms_level: u8) -> usize {
        self.points_for(ms_level).len()
    }

    pub fn total_len(&self) -> usize {
        self.by_level.values().map(Vec::len).sum()
    }

    /// Ms levels with at least one observation, ascending.
    pub fn levels(&self) -> impl Iterator<Item = u8> + '_ {
        self.by_level.keys().copied()
    }
}
