use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    fit::{FitPoint, FitResult},
    optics::BeamOptics,
    spread::Spread,
};

/// 1σ uncertainties of an [EmittanceResult], propagated to first
/// order from the fit covariance.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EmittanceUncertainty {
    /// Geometric emittance (m.rad)
    pub emittance: f64,
    /// Normalized emittance (m.rad)
    pub normalized_emittance: f64,
    /// Twiss β (m)
    pub beta: f64,
    /// Twiss α
    pub alpha: f64,
    /// Twiss γ (m⁻¹)
    pub gamma: f64,
}

/// [EmittanceResult] of one scan, expressed at the focusing element.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EmittanceResult {
    /// Geometric (rms) emittance (m.rad)
    pub emittance: f64,
    /// Normalized emittance βγε (m.rad)
    pub normalized_emittance: f64,
    /// Twiss β (m)
    pub beta: f64,
    /// Twiss α
    pub alpha: f64,
    /// Twiss γ (m⁻¹)
    pub gamma: f64,
    /// <x²> (m²)
    pub sigma11: f64,
    /// <xx'> (m.rad)
    pub sigma12: f64,
    /// <x'²> (rad²)
    pub sigma22: f64,
    /// None when the fit did not provide a covariance
    pub uncertainty: Option<EmittanceUncertainty>,
}

impl EmittanceResult {
    /// `a·c - b²/4`: must be strictly positive for a physical beam matrix
    pub fn determinant(fit: &FitResult) -> f64 {
        fit.a * fit.c - fit.b.powi(2) / 4.0
    }

    /// Converts the fitted `σ²(w) = a·w² + b·w + c` into beam matrix
    /// and Twiss parameters, identifying
    ///
    /// ```text
    /// a = σ11,  b = 2·d·σ12,  c = d²·σ22
    /// ε = sqrt(a·c - b²/4) / d
    /// ```
    ///
    /// Returns None if the fit does not describe a physical beam.
    pub fn from_fit(fit: &FitResult, optics: &BeamOptics) -> Option<Self> {
        let (a, b, c) = (fit.a, fit.b, fit.c);
        let d = optics.constants().drift_length_m;

        let det = Self::determinant(fit);
        if !det.is_finite() || det <= 0.0 || a <= 0.0 {
            return None;
        }

        let s = det.sqrt();
        let s3 = s * det;
        let emittance = s / d;
        let relativistic = optics.beta() * optics.gamma();

        let uncertainty = fit.covariance_matrix().map(|cov| {
            let emittance = propagate(
                &cov,
                Vector3::new(c / (2.0 * d * s), -b / (4.0 * d * s), a / (2.0 * d * s)),
            );
            EmittanceUncertainty {
                emittance,
                normalized_emittance: relativistic * emittance,
                beta: propagate(
                    &cov,
                    Vector3::new(
                        d / s - a * d * c / (2.0 * s3),
                        a * d * b / (4.0 * s3),
                        -a.powi(2) * d / (2.0 * s3),
                    ),
                ),
                alpha: propagate(
                    &cov,
                    Vector3::new(
                        b * c / (4.0 * s3),
                        -1.0 / (2.0 * s) - b.powi(2) / (8.0 * s3),
                        a * b / (4.0 * s3),
                    ),
                ),
                gamma: propagate(
                    &cov,
                    Vector3::new(
                        -c.powi(2) / (2.0 * d * s3),
                        c * b / (4.0 * d * s3),
                        1.0 / (d * s) - a * c / (2.0 * d * s3),
                    ),
                ),
            }
        });

        Some(Self {
            emittance,
            normalized_emittance: relativistic * emittance,
            beta: a * d / s,
            alpha: -b / (2.0 * s),
            gamma: c / (d * s),
            sigma11: a,
            sigma12: b / (2.0 * d),
            sigma22: c / d.powi(2),
            uncertainty,
        })
    }
}

/// Linearized error propagation: sqrt(∇ᵀ·Σ·∇)
fn propagate(cov: &Matrix3<f64>, gradient: Vector3<f64>) -> f64 {
    gradient.dot(&(cov * gradient)).max(0.0).sqrt()
}

/// [Estimate] gathers everything produced for one [super::SampleSet]
/// of the scan, ordered like the input measurements.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Estimate {
    /// Name of the sample set
    pub set: String,
    /// Field settings
    pub fields: Vec<f64>,
    /// Spread at each field setting
    pub spreads: Vec<Spread>,
    /// Fitted points
    pub points: Vec<FitPoint>,
    /// Quadratic fit
    pub fit: FitResult,
    /// Final result
    pub result: EmittanceResult,
}

#[cfg(test)]
mod test {
    use super::EmittanceResult;
    use crate::{
        fit::FitResult,
        optics::{BeamOptics, OpticsConstants},
    };

    fn optics(d: f64) -> BeamOptics {
        BeamOptics::new(
            OpticsConstants::default()
                .with_drift_length(d)
                .with_lens_length(0.1)
                .with_total_energy_ev(5.0E6),
        )
        .unwrap()
    }

    fn fit(a: f64, b: f64, c: f64, covariance: Option<[[f64; 3]; 3]>) -> FitResult {
        FitResult {
            a,
            b,
            c,
            covariance,
            chi_squared: 0.0,
            r_squared: 1.0,
            dof: 1,
            weighted: covariance.is_some(),
        }
    }

    #[test]
    fn beam_matrix() {
        // ε = 2, β = 3, α = -1, γ = (1 + α²)/β, d = 0.5
        let (eps, beta, alpha, d) = (2.0, 3.0, -1.0, 0.5);
        let gamma = (1.0 + alpha * alpha) / beta;
        let (s11, s12, s22) = (eps * beta, -eps * alpha, eps * gamma);

        let result = EmittanceResult::from_fit(
            &fit(s11, 2.0 * d * s12, d * d * s22, None),
            &optics(d),
        )
        .unwrap();

        assert!((result.emittance - eps).abs() < 1e-12);
        assert!((result.beta - beta).abs() < 1e-12);
        assert!((result.alpha - alpha).abs() < 1e-12);
        assert!((result.gamma - gamma).abs() < 1e-12);
        assert!((result.sigma12 - s12).abs() < 1e-12);
        assert!((result.gamma * result.beta - result.alpha.powi(2) - 1.0).abs() < 1e-12);
        assert!(result.uncertainty.is_none());
    }

    #[test]
    fn non_physical() {
        let optics = optics(1.0);
        // a·c - b²/4 < 0
        assert!(EmittanceResult::from_fit(&fit(1.0, 4.0, 1.0, None), &optics).is_none());
        // concave
        assert!(EmittanceResult::from_fit(&fit(-1.0, 0.0, -1.0, None), &optics).is_none());
        // degenerate
        assert!(EmittanceResult::from_fit(&fit(1.0, 2.0, 1.0, None), &optics).is_none());
    }

    #[test]
    fn propagation() {
        // independent coefficients: compare against finite differences
        let (a, b, c) = (4.0, -1.0, 2.0);
        let var = [1.0E-4, 4.0E-4, 9.0E-4];
        let mut cov = [[0.0; 3]; 3];
        for i in 0..3 {
            cov[i][i] = var[i];
        }

        let optics = optics(2.0);
        let result = EmittanceResult::from_fit(&fit(a, b, c, Some(cov)), &optics).unwrap();
        let uncertainty = result.uncertainty.unwrap();

        let h = 1.0E-6;
        let mut expected = [0.0_f64; 4];
        for i in 0..3 {
            let mut coefs = [a, b, c];
            coefs[i] += h;
            let plus = EmittanceResult::from_fit(&fit(coefs[0], coefs[1], coefs[2], None), &optics)
                .unwrap();
            coefs[i] -= 2.0 * h;
            let minus =
                EmittanceResult::from_fit(&fit(coefs[0], coefs[1], coefs[2], None), &optics)
                    .unwrap();

            let derivatives = [
                (plus.emittance - minus.emittance) / (2.0 * h),
                (plus.beta - minus.beta) / (2.0 * h),
                (plus.alpha - minus.alpha) / (2.0 * h),
                (plus.gamma - minus.gamma) / (2.0 * h),
            ];
            for (k, dk) in derivatives.iter().enumerate() {
                expected[k] += dk.powi(2) * var[i];
            }
        }

        let computed = [
            uncertainty.emittance,
            uncertainty.beta,
            uncertainty.alpha,
            uncertainty.gamma,
        ];
        for (computed, expected) in computed.iter().zip(expected.iter()) {
            let expected = expected.sqrt();
            assert!(
                (computed - expected).abs() < 1e-6 * expected.max(1.0),
                "{} != {}",
                computed,
                expected
            );
        }

        let relativistic = optics.beta() * optics.gamma();
        assert!(
            (uncertainty.normalized_emittance - relativistic * uncertainty.emittance).abs()
                < 1e-15
        );
    }
}
