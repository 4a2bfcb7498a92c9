//! Emittance scan analysis
mod cli;
mod config;
mod plot;

use anyhow::{bail, Context};
use clap::Parser;
use itertools::Itertools;
use log::{error, info, warn};
use std::{
    collections::HashSet,
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};
use walkdir::WalkDir;

use emittance::prelude::{EmittanceEstimator, Estimate, FieldMeasurement, Table};

use cli::Cli;
use config::Config;

/// Lists the regular files of the data folder, and reports those
/// that the configuration does not refer to.
fn check_data_folder(folder: &Path, config: &Config) -> anyhow::Result<()> {
    let listed: HashSet<&str> = config.measurements.iter().map(|m| m.file.as_str()).collect();

    let found: HashSet<String> = WalkDir::new(folder)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(|name| name.to_string()))
        .filter(|name| !name.starts_with('.'))
        .collect();

    for name in found.iter().sorted() {
        if !listed.contains(name.as_str()) {
            warn!("{}: not referenced by the configuration", name);
        }
    }

    let missing = config
        .measurements
        .iter()
        .filter(|m| !found.contains(&m.file))
        .map(|m| m.file.as_str())
        .join(", ");

    if !missing.is_empty() {
        bail!("missing measurement file(s) in {}: {}", folder.display(), missing);
    }

    Ok(())
}

fn load_measurements(folder: &Path, config: &Config) -> anyhow::Result<Vec<FieldMeasurement>> {
    config
        .measurements
        .iter()
        .map(|m| {
            let path = folder.join(&m.file);
            let table = Table::from_file(&path, config.data_type)
                .with_context(|| format!("failed to parse {}", path.display()))?;

            for set in table.sets.iter() {
                info!(
                    "{} (field={}) - set {}: {} samples",
                    m.file,
                    m.field,
                    set.name,
                    set.samples.len()
                );
            }

            table
                .into_measurement(m.field)
                .with_context(|| format!("invalid measurement {}", path.display()))
        })
        .collect()
}

fn log_estimate(estimate: &Estimate) {
    for (field, point) in estimate.fields.iter().zip(estimate.points.iter()) {
        info!(
            "{} - field={} w={:.6} σ²={:.6e} ± {:.3e} m²",
            estimate.set, field, point.w, point.variance, point.uncertainty
        );
    }

    let fit = &estimate.fit;
    info!(
        "{} - σ²(w) = {:.6e}·w² + {:.6e}·w + {:.6e} (R²={:.6}, χ²/dof={})",
        estimate.set,
        fit.a,
        fit.b,
        fit.c,
        fit.r_squared,
        fit.reduced_chi_squared()
            .map(|chi2| format!("{:.3}", chi2))
            .unwrap_or_else(|| "n/a".to_string()),
    );

    let result = &estimate.result;
    info!(
        "{} - σ11={:.6e} m² σ12={:.6e} m.rad σ22={:.6e} rad²",
        estimate.set, result.sigma11, result.sigma12, result.sigma22
    );

    match result.uncertainty {
        Some(err) => {
            info!(
                "{} - ε={:.6e} ± {:.2e} m.rad, εn={:.6e} ± {:.2e} m.rad",
                estimate.set,
                result.emittance,
                err.emittance,
                result.normalized_emittance,
                err.normalized_emittance
            );
            info!(
                "{} - β={:.6} ± {:.2e} m, α={:.6} ± {:.2e}, γ={:.6} ± {:.2e} m⁻¹",
                estimate.set,
                result.beta,
                err.beta,
                result.alpha,
                err.alpha,
                result.gamma,
                err.gamma
            );
        },
        None => {
            info!(
                "{} - ε={:.6e} m.rad, εn={:.6e} m.rad, β={:.6} m, α={:.6}, γ={:.6} m⁻¹",
                estimate.set,
                result.emittance,
                result.normalized_emittance,
                result.beta,
                result.alpha,
                result.gamma
            );
        },
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    let folder = cli
        .data_folder
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.data_folder));

    check_data_folder(&folder, &config)?;

    let optics = Arc::new(config.optics.beam_optics()?);

    for m in config.measurements.iter() {
        match optics.field_to_w(m.field) {
            Ok(w) => info!("{}: field={} w={:.6}", m.file, m.field, w),
            Err(e) => warn!("{}: {}", m.file, e),
        }
    }

    let measurements = load_measurements(&folder, &config)?;

    let estimator =
        EmittanceEstimator::new(optics, config.weighting).with_fit_weighting(config.fit_weighting);

    info!(
        "{} weighting, {} fit over {} field settings",
        estimator.convention(),
        estimator.fit_weighting(),
        measurements.len()
    );

    let mut estimates = Vec::new();

    for set in estimator.set_names(&measurements)? {
        match estimator.estimate_set(&measurements, &set) {
            Ok(estimate) => {
                log_estimate(&estimate);
                estimates.push(estimate);
            },
            Err(e) => {
                if cli.keep_going {
                    error!("{}", e);
                } else {
                    return Err(e.into());
                }
            },
        }
    }

    if estimates.is_empty() {
        bail!("no sample set could be estimated");
    }

    if let Some(report) = &cli.report {
        let fd = File::create(report)
            .with_context(|| format!("failed to create {}", report.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(fd), &estimates)?;
        info!("report generated: {}", report.display());
    }

    if let Some(path) = &cli.plot {
        plot::plot_estimates(&estimates, path);
        info!("plot generated: {}", path.display());
    }

    Ok(())
}
