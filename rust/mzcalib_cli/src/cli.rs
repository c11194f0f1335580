use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Path to a scan-dump JSON file (replaces the config file list)
    #[arg(short, long)]
    pub scans_file: Option<PathBuf>,

    /// Path to the identifications JSON file for --scans-file
    #[arg(short, long)]
    pub identifications_file: Option<PathBuf>,

    /// Path to the output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}
