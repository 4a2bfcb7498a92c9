#![cfg_attr(docsrs, feature(doc_cfg))]

//! Emittance estimation from a focusing scan.
//!
//! A scan measures the transverse spread of the beam at a screen for several
//! settings of a focusing element (solenoid or quadrupole field). The squared
//! spread is a quadratic function of the thin lens transport parameter `w`,
//! whose coefficients are the beam matrix elements at the lens:
//!
//! ```text
//! σ²(w) = σ11·w² + 2·d·σ12·w + d²·σ22
//! ```
//!
//! The pipeline is:
//! - [WeightedSpread] reduces each measured distribution to a spread
//! - [BeamOptics] maps each field setting to `w`
//! - [QuadraticFit] fits the (w, σ²) points
//! - [EmittanceEstimator] combines the fit with the optics into an [EmittanceResult]
//!
//! ```
//! use emittance::prelude::*;
//! use std::sync::Arc;
//!
//! let constants = OpticsConstants::default()
//!     .with_drift_length(1.0)
//!     .with_lens_length(0.1)
//!     .with_total_energy_ev(5.0E6);
//!
//! let optics = Arc::new(BeamOptics::new(constants).unwrap());
//! let estimator = EmittanceEstimator::new(optics, WeightingConvention::Frequency);
//! assert_eq!(estimator.convention(), WeightingConvention::Frequency);
//! ```

pub mod errors;
pub mod estimator;
pub mod fit;
pub mod ingest;
pub mod optics;
pub mod spread;

#[cfg(test)]
mod tests;

pub mod prelude {
    pub use crate::{
        errors::{Error, ParsingError},
        estimator::{
            EmittanceEstimator, EmittanceResult, EmittanceUncertainty, Estimate,
            FieldMeasurement, FitWeighting, SampleSet, EXPERIMENT_A, EXPERIMENT_B,
        },
        fit::{FitError, FitPoint, FitResult, QuadraticFit},
        ingest::{DataType, Table},
        optics::{BeamOptics, OpticsConstants, OpticsError},
        spread::{Sample, Spread, SpreadError, WeightedSpread, WeightingConvention},
    };
}
