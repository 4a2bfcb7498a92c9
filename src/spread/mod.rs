//! Weighted spread of a measured distribution
use itertools::Itertools;
use log::debug;
use strum_macros::{Display, EnumString};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Spread computation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpreadError {
    #[error("empty sample")]
    EmptySample,
    /// NaN, infinite value or negative weight
    #[error("invalid sample #{index}")]
    InvalidSample { index: usize },
    #[error("total weight is zero")]
    ZeroTotalWeight,
    /// Fewer than 2 distinct values carry a positive weight,
    /// or the bias correction leaves nothing to divide by.
    #[error("degenerate sample: variance is undefined")]
    DegenerateSample,
}

/// How sample weights should be interpreted. There is no default:
/// the convention is always chosen by the caller.
/// Both bias corrected conventions reproduce the classical `n - 1`
/// sample standard deviation whenever all weights share the same value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[strum(serialize_all = "lowercase")]
pub enum WeightingConvention {
    /// Weights are occurrence counts.
    /// Denominator is `Σw - Σw²/Σw`, effective sample size is `Σw`.
    Frequency,
    /// Weights are relative reliabilities.
    /// Denominator is `Σw - Σw²/Σw`, effective sample size is `(Σw)²/Σw²`.
    Reliability,
    /// Biased estimator, denominator is `Σw`.
    /// Effective sample size is `(Σw)²/Σw²`.
    Population,
}

/// One measured value and its weight.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    /// Measured value (usually a distance, in meters)
    pub value: f64,
    /// Occurrence count or reliability weight
    pub weight: f64,
}

impl Sample {
    pub fn new(value: f64, weight: f64) -> Self {
        Self { value, weight }
    }
}

impl From<(f64, f64)> for Sample {
    fn from((value, weight): (f64, f64)) -> Self {
        Self { value, weight }
    }
}

/// [Spread] of a weighted sample
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spread {
    /// Weighted mean
    pub mean: f64,
    /// Weighted standard deviation
    pub std: f64,
    /// Effective number of independent samples
    pub effective_n: f64,
    /// Σw
    pub total_weight: f64,
}

impl Spread {
    /// Weighted variance (std²)
    pub fn variance(&self) -> f64 {
        self.std.powi(2)
    }

    /// Standard error of the standard deviation for a normal
    /// parent distribution: `std / sqrt(2·n_eff - 2)`.
    pub fn std_error(&self) -> f64 {
        self.std / (2.0 * self.effective_n - 2.0).sqrt()
    }

    /// Standard error of the variance, propagated from [Self::std_error]:
    /// `2·std·σ(std) = std²·sqrt(2 / (n_eff - 1))`.
    pub fn variance_error(&self) -> f64 {
        2.0 * self.std * self.std_error()
    }
}

/// [WeightedSpread] reduces a weighted sample to its [Spread].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WeightedSpread {
    convention: WeightingConvention,
}

impl WeightedSpread {
    /// Builds a new [WeightedSpread] following this [WeightingConvention].
    pub fn new(convention: WeightingConvention) -> Self {
        Self { convention }
    }

    /// Returns the [WeightingConvention] in use.
    pub fn convention(&self) -> WeightingConvention {
        self.convention
    }

    /// Computes the [Spread] of this weighted sample.
    /// Samples with a null weight do not contribute.
    pub fn compute(&self, samples: &[Sample]) -> Result<Spread, SpreadError> {
        if samples.is_empty() {
            return Err(SpreadError::EmptySample);
        }

        for (index, sample) in samples.iter().enumerate() {
            if !sample.value.is_finite() || !sample.weight.is_finite() || sample.weight < 0.0 {
                return Err(SpreadError::InvalidSample { index });
            }
        }

        let (v1, v2) = samples.iter().fold((0.0_f64, 0.0_f64), |(v1, v2), s| {
            (v1 + s.weight, v2 + s.weight.powi(2))
        });

        if v1 <= 0.0 {
            return Err(SpreadError::ZeroTotalWeight);
        }

        let distinct = samples
            .iter()
            .filter(|s| s.weight > 0.0)
            .map(|s| s.value)
            .sorted_by(f64::total_cmp)
            .dedup()
            .count();

        if distinct < 2 {
            return Err(SpreadError::DegenerateSample);
        }

        let mean = samples.iter().map(|s| s.value * s.weight).sum::<f64>() / v1;

        let sum_sq = samples
            .iter()
            .map(|s| s.weight * (s.value - mean).powi(2))
            .sum::<f64>();

        let kish = v1.powi(2) / v2;
        let corrected = v1 - v2 / v1;

        let (denominator, effective_n) = match self.convention {
            WeightingConvention::Frequency => (corrected, v1),
            WeightingConvention::Reliability => (corrected, kish),
            WeightingConvention::Population => (v1, kish),
        };

        if denominator <= 0.0 || effective_n <= 1.0 {
            return Err(SpreadError::DegenerateSample);
        }

        let std = (sum_sq / denominator).sqrt();

        debug!(
            "{} spread: mean={:.6e} std={:.6e} n_eff={:.1}",
            self.convention, mean, std, effective_n
        );

        Ok(Spread {
            mean,
            std,
            effective_n,
            total_weight: v1,
        })
    }
}
