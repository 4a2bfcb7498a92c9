//! Emittance estimation from a complete scan
use log::{debug, info};
use std::sync::Arc;
use strum_macros::{Display, EnumString};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod measurement;
mod result;

pub use measurement::{FieldMeasurement, SampleSet, EXPERIMENT_A, EXPERIMENT_B};
pub use result::{EmittanceResult, EmittanceUncertainty, Estimate};

use crate::{
    errors::Error,
    fit::{FitPoint, FitResult, QuadraticFit},
    optics::BeamOptics,
    spread::{Spread, WeightedSpread, WeightingConvention},
};

/// How each point contributes to the quadratic fit
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Display, EnumString)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[strum(serialize_all = "lowercase")]
pub enum FitWeighting {
    /// Points are weighted by the standard error of their variance,
    /// `σ(s²) = s²·sqrt(2 / (n_eff - 1))` for a normal parent distribution.
    #[default]
    Propagated,
    /// Unweighted least squares
    Uniform,
}

/// [EmittanceEstimator] runs the whole scan analysis:
/// spread of each distribution, field to `w` mapping,
/// quadratic fit and conversion to emittance and Twiss parameters.
/// It does not hold any mutable state and may be shared between threads.
#[derive(Debug, Clone)]
pub struct EmittanceEstimator {
    optics: Arc<BeamOptics>,
    spread: WeightedSpread,
    weighting: FitWeighting,
    fit: QuadraticFit,
}

impl EmittanceEstimator {
    /// Creates a new [EmittanceEstimator] sharing these [BeamOptics].
    pub fn new(optics: Arc<BeamOptics>, convention: WeightingConvention) -> Self {
        Self {
            optics,
            spread: WeightedSpread::new(convention),
            weighting: FitWeighting::default(),
            fit: QuadraticFit::default(),
        }
    }

    /// Returns a new [EmittanceEstimator] with desired [FitWeighting]
    pub fn with_fit_weighting(&self, weighting: FitWeighting) -> Self {
        let mut s = self.clone();
        s.weighting = weighting;
        s
    }

    /// Returns a new [EmittanceEstimator] using this [QuadraticFit] solver
    pub fn with_quadratic_fit(&self, fit: QuadraticFit) -> Self {
        let mut s = self.clone();
        s.fit = fit;
        s
    }

    /// [BeamOptics] in use
    pub fn optics(&self) -> &BeamOptics {
        &self.optics
    }

    /// [WeightingConvention] in use
    pub fn convention(&self) -> WeightingConvention {
        self.spread.convention()
    }

    /// [FitWeighting] in use
    pub fn fit_weighting(&self) -> FitWeighting {
        self.weighting
    }

    /// Reduces each [FieldMeasurement] to one [FitPoint] for that sample set.
    pub fn fit_points(
        &self,
        measurements: &[FieldMeasurement],
        set: &str,
    ) -> Result<(Vec<Spread>, Vec<FitPoint>), Error> {
        if !measurements.is_empty() && measurements.iter().all(|m| m.set(set).is_none()) {
            return Err(Error::UnknownSampleSet(set.to_string()));
        }

        let mut spreads = Vec::with_capacity(measurements.len());
        let mut points = Vec::with_capacity(measurements.len());

        for measurement in measurements.iter() {
            let field = measurement.field();

            let samples = measurement
                .set(set)
                .ok_or_else(|| Error::MismatchedSampleSets {
                    field,
                    expected: vec![set.to_string()],
                    found: measurement.set_names(),
                })?;

            let spread = self
                .spread
                .compute(&samples.samples)
                .map_err(|source| Error::Spread {
                    set: set.to_string(),
                    field,
                    source,
                })?;

            let w = self
                .optics
                .field_to_w(field)
                .map_err(|source| Error::Optics { field, source })?;

            let uncertainty = match self.weighting {
                FitWeighting::Propagated => spread.variance_error(),
                FitWeighting::Uniform => 0.0,
            };

            let point = FitPoint::new(w, spread.variance(), uncertainty);

            debug!(
                "{}({}) - w={:.6} std={:.6e} m variance={:.6e} ± {:.3e} m²",
                set, field, w, spread.std, point.variance, point.uncertainty
            );

            spreads.push(spread);
            points.push(point);
        }

        Ok((spreads, points))
    }

    /// Converts a [FitResult] to an [EmittanceResult], rejecting
    /// fits that do not describe a physical beam.
    pub fn emittance(&self, set: &str, fit: &FitResult) -> Result<EmittanceResult, Error> {
        EmittanceResult::from_fit(fit, &self.optics).ok_or_else(|| Error::NonPhysicalFit {
            set: set.to_string(),
            determinant: EmittanceResult::determinant(fit),
            a: fit.a,
        })
    }

    /// Fits these points and converts the result.
    pub fn estimate_points(
        &self,
        set: &str,
        points: &[FitPoint],
    ) -> Result<(FitResult, EmittanceResult), Error> {
        let fit = self.fit.fit(points).map_err(|source| Error::Fit {
            set: set.to_string(),
            source,
        })?;

        let result = self.emittance(set, &fit)?;

        info!(
            "{} - emittance={:.6e} m.rad (normalized {:.6e}) beta={:.6} m alpha={:.6} R²={:.6}",
            set,
            result.emittance,
            result.normalized_emittance,
            result.beta,
            result.alpha,
            fit.r_squared,
        );

        Ok((fit, result))
    }

    /// Runs the analysis of a single sample set of the scan.
    pub fn estimate_set(
        &self,
        measurements: &[FieldMeasurement],
        set: &str,
    ) -> Result<Estimate, Error> {
        if measurements.is_empty() {
            return Err(Error::NoMeasurement);
        }

        let (spreads, points) = self.fit_points(measurements, set)?;
        let (fit, result) = self.estimate_points(set, &points)?;

        Ok(Estimate {
            set: set.to_string(),
            fields: measurements.iter().map(|m| m.field()).collect(),
            spreads,
            points,
            fit,
            result,
        })
    }

    /// Runs the analysis of every sample set of the scan, independently.
    /// Returns one [Estimate] per sample set, in order. Results of independent
    /// experiments are never averaged. Fails on the first error: use
    /// [Self::estimate_set] to decide what to do with each set.
    pub fn estimate(&self, measurements: &[FieldMeasurement]) -> Result<Vec<Estimate>, Error> {
        let names = self.set_names(measurements)?;
        names
            .iter()
            .map(|name| self.estimate_set(measurements, name))
            .collect()
    }

    /// Returns the sample set names shared by every measurement of the scan.
    pub fn set_names(&self, measurements: &[FieldMeasurement]) -> Result<Vec<String>, Error> {
        let first = measurements.first().ok_or(Error::NoMeasurement)?;
        let expected = first.set_names();

        if expected.is_empty() {
            return Err(Error::InvalidSampleSets {
                field: first.field(),
                names: expected,
            });
        }

        for measurement in measurements.iter().skip(1) {
            let found = measurement.set_names();
            if found != expected {
                return Err(Error::MismatchedSampleSets {
                    field: measurement.field(),
                    expected,
                    found,
                });
            }
        }

        Ok(expected)
    }
}
