use itertools::{Itertools, MinMaxResult};
use plotly::{
    common::{Mode, Title},
    layout::{Axis, Layout},
    Plot, Scatter,
};
use std::path::Path;

use emittance::prelude::Estimate;

/// Number of points drawn along each fitted curve
const CURVE_POINTS: usize = 128;

/// Draws the measured variances (mm²) and fitted curves of every [Estimate].
pub fn plot_estimates<P: AsRef<Path>>(estimates: &[Estimate], path: P) {
    let mut plot = Plot::new();

    for estimate in estimates.iter() {
        let (w, variance): (Vec<f64>, Vec<f64>) = estimate
            .points
            .iter()
            .map(|p| (p.w, p.variance * 1.0E6))
            .unzip();

        let (w_min, w_max) = match w.iter().copied().minmax() {
            MinMaxResult::MinMax(min, max) => (min, max),
            _ => continue,
        };

        let label = format!("{} measured", estimate.set);

        let measured = Scatter::new(w, variance)
            .mode(Mode::Markers)
            .name(&label);

        plot.add_trace(measured);

        let step = (w_max - w_min) / (CURVE_POINTS - 1) as f64;

        let (w_fit, variance_fit): (Vec<f64>, Vec<f64>) = (0..CURVE_POINTS)
            .map(|i| {
                let w = w_min + i as f64 * step;
                (w, estimate.fit.predict(w) * 1.0E6)
            })
            .unzip();

        let label = format!(
            "{} fit (ε={:.3e} m.rad)",
            estimate.set, estimate.result.emittance
        );

        let fitted = Scatter::new(w_fit, variance_fit)
            .mode(Mode::Lines)
            .name(&label);

        plot.add_trace(fitted);
    }

    let layout = Layout::new()
        .title(Title::from("Beam size scan"))
        .x_axis(Axis::new().title(Title::from("w")))
        .y_axis(Axis::new().title(Title::from("σ² (mm²)")));

    plot.set_layout(layout);
    plot.write_html(path);
}
