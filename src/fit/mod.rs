//! Weighted quadratic fit of the beam size scan
use itertools::Itertools;
use log::debug;
use nalgebra::{DMatrix, DVector, Matrix3};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default relative threshold on the R diagonal, below which
/// the design matrix is considered rank deficient.
const DEFAULT_RANK_TOLERANCE: f64 = 1.0E-10;

/// Quadratic fit errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// At least 3 points, spread over 3 distinct `w`, are required
    #[error("quadratic fit requires at least 3 distinct w values")]
    InsufficientData,
    /// Design matrix is rank deficient
    #[error("singular fit: design matrix is rank deficient")]
    SingularFit,
    /// Zero and non zero uncertainties within the same point set
    #[error("mixed null and non null uncertainties")]
    InconsistentUncertainty,
    /// NaN, infinite or negative value
    #[error("invalid fit point #{index}")]
    InvalidPoint { index: usize },
}

/// One point of the `σ²(w)` curve
#[derive(Debug, Copy, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitPoint {
    /// Transport parameter
    pub w: f64,
    /// Measured variance (m²)
    pub variance: f64,
    /// 1σ uncertainty on the variance (m²).
    /// Null for every point of an unweighted fit.
    pub uncertainty: f64,
}

impl FitPoint {
    pub fn new(w: f64, variance: f64, uncertainty: f64) -> Self {
        Self {
            w,
            variance,
            uncertainty,
        }
    }
}

/// [FitResult] of `σ²(w) = a·w² + b·w + c`
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitResult {
    /// w² coefficient
    pub a: f64,
    /// w coefficient
    pub b: f64,
    /// Constant term
    pub c: f64,
    /// Covariance of (a, b, c). Absolute for weighted fits,
    /// scaled by the residual variance for unweighted fits, and
    /// unavailable for an unweighted fit without degrees of freedom.
    pub covariance: Option<[[f64; 3]; 3]>,
    /// Σ((y - f)/σ)² for weighted fits, residual sum of squares otherwise
    pub chi_squared: f64,
    /// Coefficient of determination on the variances
    pub r_squared: f64,
    /// Number of points minus 3
    pub dof: usize,
    /// True if points were weighted by their uncertainties
    pub weighted: bool,
}

impl FitResult {
    /// Returns (a, b, c)
    pub fn coefficients(&self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }

    /// Evaluates the fitted curve
    pub fn predict(&self, w: f64) -> f64 {
        (self.a * w + self.b) * w + self.c
    }

    /// Residuals (measured minus fitted) of these points
    pub fn residuals(&self, points: &[FitPoint]) -> Vec<f64> {
        points
            .iter()
            .map(|p| p.variance - self.predict(p.w))
            .collect()
    }

    /// Covariance matrix of (a, b, c), if known
    pub fn covariance_matrix(&self) -> Option<Matrix3<f64>> {
        self.covariance.map(|cov| Matrix3::from_fn(|i, j| cov[i][j]))
    }

    /// 1σ standard errors on (a, b, c), if known
    pub fn std_errors(&self) -> Option<[f64; 3]> {
        self.covariance
            .map(|cov| [cov[0][0].sqrt(), cov[1][1].sqrt(), cov[2][2].sqrt()])
    }

    /// χ² per degree of freedom
    pub fn reduced_chi_squared(&self) -> Option<f64> {
        if self.dof > 0 {
            Some(self.chi_squared / self.dof as f64)
        } else {
            None
        }
    }
}

/// [QuadraticFit] solves the (weighted) linear least squares problem
/// over `[w², w, 1]` with a Householder QR decomposition.
/// Each point is weighted by `1/uncertainty²`, or uniformly when
/// all uncertainties are null.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QuadraticFit {
    rank_tolerance: f64,
}

impl Default for QuadraticFit {
    fn default() -> Self {
        Self {
            rank_tolerance: DEFAULT_RANK_TOLERANCE,
        }
    }
}

impl QuadraticFit {
    /// Returns a [QuadraticFit] with desired relative rank tolerance
    pub fn with_rank_tolerance(&self, rank_tolerance: f64) -> Self {
        let mut s = *self;
        s.rank_tolerance = rank_tolerance;
        s
    }

    /// Fits these points.
    pub fn fit(&self, points: &[FitPoint]) -> Result<FitResult, FitError> {
        for (index, p) in points.iter().enumerate() {
            let valid = p.w.is_finite()
                && p.variance.is_finite()
                && p.variance >= 0.0
                && p.uncertainty.is_finite()
                && p.uncertainty >= 0.0;
            if !valid {
                return Err(FitError::InvalidPoint { index });
            }
        }

        if points.len() < 3 {
            return Err(FitError::InsufficientData);
        }

        let distinct = points
            .iter()
            .map(|p| p.w)
            .sorted_by(f64::total_cmp)
            .dedup()
            .count();

        match distinct {
            1 => return Err(FitError::SingularFit),
            2 => return Err(FitError::InsufficientData),
            _ => {},
        }

        let nb_weighted = points.iter().filter(|p| p.uncertainty > 0.0).count();
        let weighted = match nb_weighted {
            0 => false,
            n if n == points.len() => true,
            _ => return Err(FitError::InconsistentUncertainty),
        };

        let n = points.len();
        let sqrt_weights: Vec<f64> = points
            .iter()
            .map(|p| if weighted { 1.0 / p.uncertainty } else { 1.0 })
            .collect();

        let design = DMatrix::from_fn(n, 3, |i, j| {
            let w = points[i].w;
            let x = match j {
                0 => w * w,
                1 => w,
                _ => 1.0,
            };
            sqrt_weights[i] * x
        });

        let rhs = DVector::from_fn(n, |i, _| sqrt_weights[i] * points[i].variance);

        let qr = design.qr();
        let r = qr.r();

        let diag_max = r.diagonal().iter().fold(0.0_f64, |m, d| m.max(d.abs()));
        let rank_deficient = r
            .diagonal()
            .iter()
            .any(|d| d.abs() <= self.rank_tolerance * diag_max);

        if diag_max == 0.0 || rank_deficient {
            return Err(FitError::SingularFit);
        }

        let qtb = qr.q().transpose() * &rhs;
        let coefs = r.solve_upper_triangular(&qtb).ok_or(FitError::SingularFit)?;
        let r_inv = r
            .solve_upper_triangular(&DMatrix::identity(3, 3))
            .ok_or(FitError::SingularFit)?;

        let (a, b, c) = (coefs[0], coefs[1], coefs[2]);
        let predict = |w: f64| (a * w + b) * w + c;

        let chi_squared = points
            .iter()
            .zip(sqrt_weights.iter())
            .map(|(p, sw)| (sw * (p.variance - predict(p.w))).powi(2))
            .sum::<f64>();

        let dof = n - 3;

        let scale = if weighted {
            Some(1.0)
        } else if dof > 0 {
            Some(chi_squared / dof as f64)
        } else {
            None
        };

        let covariance = scale.map(|scale| {
            let cov = (&r_inv * r_inv.transpose()) * scale;
            let mut out = [[0.0_f64; 3]; 3];
            for (i, row) in out.iter_mut().enumerate() {
                for (j, value) in row.iter_mut().enumerate() {
                    *value = cov[(i, j)];
                }
            }
            out
        });

        let mean = points.iter().map(|p| p.variance).sum::<f64>() / n as f64;
        let ss_tot = points
            .iter()
            .map(|p| (p.variance - mean).powi(2))
            .sum::<f64>();
        let ss_res = points
            .iter()
            .map(|p| (p.variance - predict(p.w)).powi(2))
            .sum::<f64>();

        // a flat scan that is fitted exactly is a perfect fit
        let r_squared = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else {
            1.0
        };

        debug!(
            "quadratic fit: a={:.6e} b={:.6e} c={:.6e} chi2={:.3e} dof={} R²={:.6}",
            a, b, c, chi_squared, dof, r_squared
        );

        Ok(FitResult {
            a,
            b,
            c,
            covariance,
            chi_squared,
            r_squared,
            dof,
            weighted,
        })
    }
}
