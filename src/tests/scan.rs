#[cfg(test)]
mod test {
    use crate::{
        prelude::{EmittanceEstimator, Error, FitPoint, FitWeighting, WeightingConvention},
        tests::toolkit::{assert_close, optics, scan, scan_from_stds, Twiss},
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const SCAN_W: [f64; 8] = [0.05, 0.15, 0.3, 0.42, 0.55, 0.7, 0.85, 0.95];

    #[test]
    fn twiss_recovery() {
        let optics = optics();
        let ellipse = Twiss {
            alpha: 1.5,
            beta: 5.0,
            emittance: 1.0E-6,
        };

        let measurements = scan(&optics, &[("A", ellipse)], &SCAN_W);

        for weighting in [FitWeighting::Propagated, FitWeighting::Uniform] {
            let estimator = EmittanceEstimator::new(optics.clone(), WeightingConvention::Frequency)
                .with_fit_weighting(weighting);

            let estimates = estimator.estimate(&measurements).unwrap();
            assert_eq!(estimates.len(), 1);

            let estimate = &estimates[0];
            assert_eq!(estimate.set, "A");
            assert_eq!(estimate.points.len(), SCAN_W.len());
            assert_eq!(estimate.fit.weighted, weighting == FitWeighting::Propagated);

            for (point, w) in estimate.points.iter().zip(SCAN_W.iter()) {
                assert!((point.w - w).abs() < 1e-12);
            }

            let result = estimate.result;
            assert_close(result.emittance, ellipse.emittance, 1e-7, "emittance");
            assert_close(result.beta, ellipse.beta, 1e-7, "beta");
            assert_close(result.alpha, ellipse.alpha, 1e-7, "alpha");
            assert_close(result.gamma, ellipse.gamma(), 1e-7, "gamma");
            assert_close(
                result.normalized_emittance,
                optics.beta() * optics.gamma() * ellipse.emittance,
                1e-7,
                "normalized emittance",
            );

            let uncertainty = result.uncertainty.unwrap();
            match weighting {
                // noiseless points: residual variance vanishes
                FitWeighting::Uniform => {
                    assert!(uncertainty.emittance < 1e-6 * ellipse.emittance)
                },
                FitWeighting::Propagated => assert!(uncertainty.emittance > 0.0),
            }
        }
    }

    #[test]
    fn independent_experiments() {
        let optics = optics();
        let a = Twiss {
            alpha: 0.8,
            beta: 3.0,
            emittance: 2.0E-6,
        };
        let b = Twiss {
            alpha: -0.3,
            beta: 1.2,
            emittance: 0.5E-6,
        };

        let measurements = scan(&optics, &[("A", a), ("B", b)], &SCAN_W);
        let estimator = EmittanceEstimator::new(optics, WeightingConvention::Frequency);
        let estimates = estimator.estimate(&measurements).unwrap();

        assert_eq!(estimates.len(), 2);
        assert_eq!(estimates[0].set, "A");
        assert_eq!(estimates[1].set, "B");

        assert_close(estimates[0].result.emittance, a.emittance, 1e-7, "A emittance");
        assert_close(estimates[0].result.beta, a.beta, 1e-7, "A beta");
        assert_close(estimates[1].result.emittance, b.emittance, 1e-7, "B emittance");
        assert_close(estimates[1].result.alpha, b.alpha, 1e-6, "B alpha");

        let single = estimator.estimate_set(&measurements, "B").unwrap();
        assert_eq!(single, estimates[1]);

        assert!(matches!(
            estimator.estimate_set(&measurements, "C"),
            Err(Error::UnknownSampleSet(_))
        ));
    }

    #[test]
    fn reliability_convention() {
        // with binomial counts read as reliabilities: same spread, Kish sample size
        let optics = optics();
        let ellipse = Twiss {
            alpha: 1.0,
            beta: 2.0,
            emittance: 1.5E-6,
        };
        let measurements = scan(&optics, &[("A", ellipse)], &SCAN_W);
        let estimator = EmittanceEstimator::new(optics, WeightingConvention::Reliability);
        let estimate = estimator.estimate_set(&measurements, "A").unwrap();

        // Σw = 16, Σw² = 70
        let n_eff = 256.0 / 70.0;
        for spread in estimate.spreads.iter() {
            assert!((spread.effective_n - n_eff).abs() < 1e-12);
        }

        // same variances as occurrence counts, only the fit weights differ
        assert_close(estimate.result.emittance, ellipse.emittance, 1e-7, "emittance");
        assert_close(estimate.result.alpha, ellipse.alpha, 1e-7, "alpha");
        assert_close(estimate.result.beta, ellipse.beta, 1e-7, "beta");
    }

    #[test]
    fn regression_fixture() {
        // w = 0.1 .. 0.4, std = 1.0, 1.05, 1.2, 1.45 mm
        let optics = optics();
        let ws = [0.1, 0.2, 0.3, 0.4];
        let stds = [1.0E-3, 1.05E-3, 1.2E-3, 1.45E-3];
        let measurements = scan_from_stds(&optics, &ws, &stds);

        let estimator = EmittanceEstimator::new(optics.clone(), WeightingConvention::Frequency);
        let estimate = estimator.estimate_set(&measurements, "A").unwrap();

        for (spread, std) in estimate.spreads.iter().zip(stds.iter()) {
            assert_close(spread.std, *std, 1e-12, "std");
            assert_eq!(spread.effective_n, 16.0);
        }

        assert_close(estimate.fit.a, 1.3614867975802672e-05, 1e-9, "a");
        assert_close(estimate.fit.b, -3.1788656708533856e-06, 1e-9, "b");
        assert_close(estimate.fit.c, 1.1843076666510815e-06, 1e-9, "c");

        let result = estimate.result;
        assert_close(result.emittance, 3.687532479294638e-06, 1e-9, "emittance");
        assert_close(result.beta, 3.692135066538306, 1e-9, "beta");
        assert_close(result.alpha, 0.43102883685806187, 1e-9, "alpha");
        assert!(result.emittance > 0.0);

        let uniform = estimator
            .with_fit_weighting(FitWeighting::Uniform)
            .estimate_set(&measurements, "A")
            .unwrap();

        assert_close(uniform.fit.a, 1.4E-5, 1e-9, "a");
        assert_close(uniform.fit.b, -3.355E-6, 1e-9, "b");
        assert_close(uniform.fit.c, 1.2E-6, 1e-9, "c");
        assert_close(uniform.result.emittance, 3.7397852545299972e-06, 1e-9, "emittance");
        assert_close(uniform.result.beta, 3.7435304562051566, 1e-9, "beta");
    }

    #[test]
    fn non_physical_scan() {
        // beam size peaks inside the scan: concave parabola
        let optics = optics();
        let ws = [0.1, 0.3, 0.5, 0.7, 0.9];
        let stds: Vec<f64> = [2.0E-6, 2.3E-6, 2.4E-6, 2.3E-6, 2.0E-6]
            .iter()
            .map(|v: &f64| v.sqrt())
            .collect();

        let measurements = scan_from_stds(&optics, &ws, &stds);
        let estimator = EmittanceEstimator::new(optics, WeightingConvention::Frequency);

        match estimator.estimate(&measurements) {
            Err(Error::NonPhysicalFit { set, determinant, a }) => {
                assert_eq!(set, "A");
                assert!(determinant < 0.0);
                assert!(a < 0.0);
            },
            other => panic!("expected non physical fit, got {:?}", other),
        }
    }

    #[test]
    fn too_few_fields() {
        let optics = optics();
        let measurements = scan_from_stds(&optics, &[0.2, 0.6], &[1.0E-3, 1.5E-3]);
        let estimator = EmittanceEstimator::new(optics, WeightingConvention::Frequency);
        match estimator.estimate(&measurements) {
            Err(Error::Fit { set, .. }) => assert_eq!(set, "A"),
            other => panic!("expected fit error, got {:?}", other),
        }
    }

    #[test]
    fn noisy_scan() {
        let optics = optics();
        let d = optics.constants().drift_length_m;
        let ellipse = Twiss {
            alpha: 1.5,
            beta: 5.0,
            emittance: 1.0E-6,
        };

        let estimator = EmittanceEstimator::new(optics, WeightingConvention::Frequency);
        let mut rng = StdRng::seed_from_u64(2024);

        for _ in 0..20 {
            let points: Vec<FitPoint> = (0..=10)
                .map(|i| {
                    let w = i as f64 / 10.0;
                    let variance = ellipse.variance(w, d);
                    let noise = rng.gen_range(-0.01..0.01);
                    FitPoint::new(w, variance * (1.0 + noise), variance * 0.01 / 3.0_f64.sqrt())
                })
                .collect();

            let (fit, result) = estimator.estimate_points("A", &points).unwrap();
            assert_eq!(fit.dof, 8);
            assert_close(result.emittance, ellipse.emittance, 0.05, "emittance");
            assert_close(result.beta, ellipse.beta, 0.1, "beta");

            let uncertainty = result.uncertainty.unwrap();
            assert!(uncertainty.emittance > 0.0);
            assert!(uncertainty.emittance < 0.05 * result.emittance);
        }
    }
}
