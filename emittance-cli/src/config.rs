use serde::Deserialize;
use std::{fs::File, io::BufReader, path::Path};

use emittance::prelude::{
    BeamOptics, DataType, FitWeighting, OpticsConstants, OpticsError, WeightingConvention,
};

/// Beam line description, energy in eV
#[derive(Debug, Clone, Deserialize)]
pub struct OpticsConfig {
    pub drift_length_m: f64,
    pub lens_length_m: f64,
    pub total_energy_ev: f64,
    #[serde(default = "default_charge_number")]
    pub charge_number: f64,
    pub rest_mass_kg: Option<f64>,
}

fn default_charge_number() -> f64 {
    1.0
}

fn default_data_folder() -> String {
    "data".to_string()
}

/// One measurement file and its field setting
#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementConfig {
    pub file: String,
    pub field: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub optics: OpticsConfig,
    /// Always explicit: there is no default convention
    pub weighting: WeightingConvention,
    #[serde(default)]
    pub fit_weighting: FitWeighting,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default = "default_data_folder")]
    pub data_folder: String,
    pub measurements: Vec<MeasurementConfig>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let fd = File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(fd))?;
        Ok(config)
    }
}

impl OpticsConfig {
    pub fn beam_optics(&self) -> Result<BeamOptics, OpticsError> {
        let mut constants = OpticsConstants::default()
            .with_drift_length(self.drift_length_m)
            .with_lens_length(self.lens_length_m)
            .with_charge_number(self.charge_number)
            .with_total_energy_ev(self.total_energy_ev);

        if let Some(mass) = self.rest_mass_kg {
            constants = constants.with_rest_mass(mass);
        }

        BeamOptics::new(constants)
    }
}
