//! CODATA 2018 physical constants (SI)

/// Speed of light in vacuum (m.s⁻¹)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Electron rest mass (kg)
pub const ELECTRON_MASS: f64 = 9.109_383_701_5E-31;

/// Elementary charge (C)
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634E-19;

/// Rest energy (J) of a particle of mass `m` (kg)
pub fn rest_energy(m: f64) -> f64 {
    m * SPEED_OF_LIGHT.powi(2)
}

/// Converts electron-volts to Joules
pub fn ev_to_joules(ev: f64) -> f64 {
    ev * ELEMENTARY_CHARGE
}
