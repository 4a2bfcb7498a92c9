//! Beam optics: relativistic factors and field to `w` transport mapping
use log::info;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod constants;

use constants::{ev_to_joules, rest_energy, ELECTRON_MASS, ELEMENTARY_CHARGE, SPEED_OF_LIGHT};

/// Optics errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpticsError {
    #[error("invalid optics constant {name}={value}")]
    InvalidConstant { name: &'static str, value: f64 },
    /// The field would imply a negative or undefined transport coefficient
    #[error("field {field} is out of range (w={w})")]
    OutOfRange { field: f64, w: f64 },
}

/// [OpticsConstants] describe the beam line once and for all.
/// They are validated when building [BeamOptics].
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OpticsConstants {
    /// Drift length `d` from lens to screen (m)
    pub drift_length_m: f64,
    /// Effective length `l` of the focusing element (m)
    pub lens_length_m: f64,
    /// Charge number `Z`
    pub charge_number: f64,
    /// Total particle energy (J)
    pub total_energy_j: f64,
    /// Particle rest mass (kg)
    pub rest_mass_kg: f64,
}

impl Default for OpticsConstants {
    /// Electron beam, with all lengths and the energy left to define.
    fn default() -> Self {
        Self {
            drift_length_m: 0.0,
            lens_length_m: 0.0,
            charge_number: 1.0,
            total_energy_j: 0.0,
            rest_mass_kg: ELECTRON_MASS,
        }
    }
}

impl OpticsConstants {
    /// Returns new [OpticsConstants] with desired drift length (m)
    pub fn with_drift_length(&self, drift_length_m: f64) -> Self {
        let mut s = *self;
        s.drift_length_m = drift_length_m;
        s
    }

    /// Returns new [OpticsConstants] with desired lens effective length (m)
    pub fn with_lens_length(&self, lens_length_m: f64) -> Self {
        let mut s = *self;
        s.lens_length_m = lens_length_m;
        s
    }

    /// Returns new [OpticsConstants] with desired charge number
    pub fn with_charge_number(&self, charge_number: f64) -> Self {
        let mut s = *self;
        s.charge_number = charge_number;
        s
    }

    /// Returns new [OpticsConstants] with desired total energy (J)
    pub fn with_total_energy_j(&self, total_energy_j: f64) -> Self {
        let mut s = *self;
        s.total_energy_j = total_energy_j;
        s
    }

    /// Returns new [OpticsConstants] with desired total energy (eV)
    pub fn with_total_energy_ev(&self, total_energy_ev: f64) -> Self {
        self.with_total_energy_j(ev_to_joules(total_energy_ev))
    }

    /// Returns new [OpticsConstants] with desired rest mass (kg)
    pub fn with_rest_mass(&self, rest_mass_kg: f64) -> Self {
        let mut s = *self;
        s.rest_mass_kg = rest_mass_kg;
        s
    }

    fn validate(&self) -> Result<(), OpticsError> {
        let checks = [
            ("drift_length", self.drift_length_m),
            ("lens_length", self.lens_length_m),
            ("charge_number", self.charge_number),
            ("total_energy", self.total_energy_j),
            ("rest_mass", self.rest_mass_kg),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(OpticsError::InvalidConstant { name, value });
            }
        }
        Ok(())
    }
}

/// [BeamOptics] maps a focusing field to the thin lens transport parameter
///
/// ```text
/// w = 1 - d·l·k²,  k = Z·e·B / (2·m·c·γ·β)
/// ```
///
/// which is the `R11` element of the lens + drift transport matrix.
/// `w` decreases monotonically with |B|, and `1 - w` scales linearly
/// with both the drift length and the lens length.
/// [BeamOptics] is immutable once built: share it (by reference or [std::sync::Arc])
/// between all the measurements of a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamOptics {
    constants: OpticsConstants,
    /// Lorentz factor
    gamma: f64,
    /// Relative velocity v/c
    beta: f64,
    /// `K` in `w = 1 - K·B²` (T⁻²)
    focusing_constant: f64,
}

impl BeamOptics {
    /// Builds [BeamOptics] from validated [OpticsConstants].
    /// Fails if any constant is not strictly positive, or if the total
    /// energy does not exceed the rest energy.
    pub fn new(constants: OpticsConstants) -> Result<Self, OpticsError> {
        constants.validate()?;

        let gamma = constants.total_energy_j / rest_energy(constants.rest_mass_kg);
        if gamma <= 1.0 {
            return Err(OpticsError::InvalidConstant {
                name: "total_energy",
                value: constants.total_energy_j,
            });
        }

        let beta = (1.0 - 1.0 / gamma.powi(2)).sqrt();

        let k_per_tesla = constants.charge_number * ELEMENTARY_CHARGE
            / (2.0 * constants.rest_mass_kg * SPEED_OF_LIGHT * gamma * beta);

        let focusing_constant =
            constants.drift_length_m * constants.lens_length_m * k_per_tesla.powi(2);

        let optics = Self {
            constants,
            gamma,
            beta,
            focusing_constant,
        };

        info!(
            "optics: d={:.6e} m l={:.6e} m E={:.6e} J Z={} gamma={:.6} beta={:.6}",
            constants.drift_length_m,
            constants.lens_length_m,
            constants.total_energy_j,
            constants.charge_number,
            gamma,
            beta
        );

        Ok(optics)
    }

    /// Read only access to the [OpticsConstants]
    pub fn constants(&self) -> &OpticsConstants {
        &self.constants
    }

    /// Lorentz factor γ
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Relative velocity β = v/c
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Beam rigidity Bρ = p / (Z·e), in T.m
    pub fn rigidity(&self) -> f64 {
        self.gamma * self.beta * self.constants.rest_mass_kg * SPEED_OF_LIGHT
            / (self.constants.charge_number * ELEMENTARY_CHARGE)
    }

    /// `K = d·l / (2·Bρ)²` such that `w = 1 - K·B²`
    pub fn focusing_constant(&self) -> f64 {
        self.focusing_constant
    }

    /// Maps a field setting (T) to the transport parameter `w`.
    pub fn field_to_w(&self, field: f64) -> Result<f64, OpticsError> {
        let w = 1.0 - self.focusing_constant * field.powi(2);
        if !w.is_finite() || w < 0.0 {
            return Err(OpticsError::OutOfRange { field, w });
        }
        Ok(w)
    }

    /// Inverse of [Self::field_to_w] over positive fields.
    pub fn field_for_w(&self, w: f64) -> Result<f64, OpticsError> {
        if !w.is_finite() || !(0.0..=1.0).contains(&w) {
            return Err(OpticsError::OutOfRange { field: f64::NAN, w });
        }
        Ok(((1.0 - w) / self.focusing_constant).sqrt())
    }
}
