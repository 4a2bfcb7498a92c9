use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "emittance")]
#[command(about = "Transverse emittance from a solenoid focusing scan")]
#[command(version)]
pub struct Cli {
    /// Scan description (JSON): optics, conventions and measurement files
    #[arg(short, long)]
    pub config: PathBuf,

    /// Overrides the data folder of the configuration
    #[arg(short, long)]
    pub data_folder: Option<PathBuf>,

    /// Writes every estimate to this file (pretty JSON)
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Plots variance versus w and the fitted curves (HTML)
    #[arg(short, long)]
    pub plot: Option<PathBuf>,

    /// Keep going when one sample set cannot be estimated
    #[arg(long)]
    pub keep_going: bool,
}
