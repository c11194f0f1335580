use crate::config::{
    Config,
    OutputConfig,
};
use crate::errors::CliError;
use crate::scan_dump::{
    self,
    JsonSink,
    TheoreticalTable,
};
use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use mzcalib::{
    BatchItem,
    CalibrationStage,
    CancellationToken,
    FileOutcome,
    InMemorySource,
    ProgressObserver,
    SpectrumSink,
    calibrate_batch,
};
use std::path::Path;
use std::time::Instant;
use tracing::{
    debug,
    info,
    warn,
};

/// Ticks the file bar when a file reaches a terminal stage and mirrors
/// every transition into the log.
struct BarProgress {
    bar: ProgressBar,
}

impl ProgressObserver for BarProgress {
    fn stage_changed(&self, file_id: &str, stage: CalibrationStage) {
        debug!("{}: entering {:?}", file_id, stage);
        if stage == CalibrationStage::Done {
            self.bar.inc(1);
        }
    }
}

/// Runs the whole batch. The caller owns the cancellation token: an
/// embedding front-end keeps a clone and trips it to stop the run
/// between files, while the standalone binary passes a fresh token and
/// runs to completion.
pub fn run(
    config: &Config,
    output: &OutputConfig,
    token: &CancellationToken,
) -> Result<(), CliError> {
    let start = Instant::now();

    let mut table = TheoreticalTable::default();
    let mut items = Vec::with_capacity(config.files.len());
    for entry in &config.files {
        let spectra = scan_dump::load_spectra(&entry.scans)?;
        let records = scan_dump::load_identifications(&entry.identifications)?;
        table.absorb(&records);
        info!(
            "Loaded {} scans and {} identifications from {}",
            spectra.len(),
            records.len(),
            entry.scans.display()
        );
        items.push(BatchItem {
            file_id: file_stem(&entry.scans),
            source: InMemorySource::new(spectra),
            identifications: records.iter().map(Into::into).collect(),
        });
    }

    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .unwrap();
    let progress = BarProgress {
        bar: ProgressBar::new(items.len() as u64).with_style(style),
    };

    let results = calibrate_batch(
        &items,
        &table,
        &config.calibration,
        token,
        &progress,
    );
    progress.bar.finish();

    let mut calibrated = 0;
    for file in &results {
        match file.report.outcome {
            FileOutcome::Cancelled => {
                warn!("{}: cancelled before start", file.report.file_id);
                continue;
            }
            outcome => {
                info!("{}: {:?}", file.report.file_id, outcome);
                if outcome != FileOutcome::Uncalibrated {
                    calibrated += 1;
                }
            }
        }
        let spectra_path = output
            .directory
            .join(format!("{}.calibrated.json", file.report.file_id));
        let mut sink = JsonSink::new(spectra_path);
        sink.write_spectra(&file.spectra)?;

        let report_path = output
            .directory
            .join(format!("{}.report.json", file.report.file_id));
        let report_file = std::fs::File::create(&report_path).map_err(|e| CliError::Io {
            source: e.to_string(),
            path: Some(report_path.to_string_lossy().to_string()),
        })?;
        serde_json::to_writer_pretty(report_file, &file.report)?;
    }

    println!(
        "Calibrated {}/{} files in {:?}",
        calibrated,
        results.len(),
        start.elapsed()
    );
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileEntry;
    use mzcalib::{
        Peak,
        Spectrum,
    };

    #[test]
    fn test_pre_cancelled_token_stops_the_whole_batch() {
        let dir = std::env::temp_dir().join(format!("mzcalib_cancel_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let scans_path = dir.join("run.json");
        let idents_path = dir.join("run.ids.json");
        let spectra = vec![Spectrum {
            scan_number: 1,
            ms_level: 1,
            retention_time_minutes: 1.0,
            total_ion_current: 1e8,
            injection_time_ms: 20.0,
            precursor: None,
            peaks: vec![Peak {
                mz: 400.0,
                intensity: 1e4,
            }],
        }];
        std::fs::write(&scans_path, serde_json::to_string(&spectra).unwrap()).unwrap();
        std::fs::write(&idents_path, "[]").unwrap();

        let config = Config {
            files: vec![FileEntry {
                scans: scans_path,
                identifications: idents_path,
            }],
            calibration: Default::default(),
            output: None,
        };
        let output = OutputConfig {
            directory: dir.clone(),
        };

        let token = CancellationToken::new();
        token.cancel();
        run(&config, &output, &token).unwrap();

        let report: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.join("run.report.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(report["outcome"], "Cancelled");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
