//! Descriptive statistics and goodness-of-fit helpers.

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation (n − 1 denominator). NaN for fewer than 2 values.
pub fn sample_sd(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(xs);
    (xs.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
}

/// Center to zero mean and scale to unit sample standard deviation.
/// A constant column maps to all zeros.
pub fn standardize(xs: &[f64]) -> Vec<f64> {
    let m = mean(xs);
    let sd = sample_sd(xs);
    if !sd.is_finite() || sd < 1e-12 {
        return vec![0.0; xs.len()];
    }
    xs.iter().map(|&v| (v - m) / sd).collect()
}

pub fn pearson_r(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let num: f64 = x.iter().zip(y.iter()).map(|(&a, &b)| (a - mx) * (b - my)).sum();
    let vx = x.iter().map(|&a| (a - mx).powi(2)).sum::<f64>().sqrt();
    let vy = y.iter().map(|&b| (b - my).powi(2)).sum::<f64>().sqrt();
    if vx < 1e-12 || vy < 1e-12 {
        return 0.0;
    }
    (num / (vx * vy)).clamp(-1.0, 1.0)
}

/// Coefficient of determination R² = 1 − SS_res / SS_tot of `predicted`
/// against `truth`. Negative when worse than predicting the mean; 0 when the
/// truth has no variance.
pub fn r_squared(truth: &[f64], predicted: &[f64]) -> f64 {
    let m = mean(truth);
    let ss_tot: f64 = truth.iter().map(|&t| (t - m).powi(2)).sum();
    let ss_res: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(&t, &p)| (t - p).powi(2))
        .sum();
    if ss_tot < 1e-12 { 0.0 } else { 1.0 - ss_res / ss_tot }
}

pub fn rmse(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() {
        return f64::NAN;
    }
    let mse = truth
        .iter()
        .zip(predicted)
        .map(|(&t, &p)| (t - p).powi(2))
        .sum::<f64>()
        / truth.len() as f64;
    mse.sqrt()
}

/// Linear-interpolated quantile of already sorted values, `q` in [0, 1].
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Silverman's rule-of-thumb bandwidth: 0.9 · min(sd, IQR/1.34) · n^(−1/5).
/// Falls back to whichever spread measure is positive, then to 1.
pub fn silverman_bandwidth(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 1.0;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let sd = sample_sd(xs);
    let iqr = (quantile_sorted(&sorted, 0.75) - quantile_sorted(&sorted, 0.25)) / 1.34;
    let spread = match (sd > 0.0, iqr > 0.0) {
        (true, true) => sd.min(iqr),
        (true, false) => sd,
        (false, true) => iqr,
        (false, false) => return 1.0,
    };
    0.9 * spread * (n as f64).powf(-0.2)
}

/// Gaussian kernel density estimate of `xs` evaluated at every point of `grid`.
pub fn gaussian_kde(xs: &[f64], grid: &[f64], bandwidth: f64) -> Vec<f64> {
    if xs.is_empty() {
        return vec![0.0; grid.len()];
    }
    let norm = 1.0 / (xs.len() as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    grid.iter()
        .map(|&g| {
            xs.iter()
                .map(|&x| {
                    let u = (g - x) / bandwidth;
                    (-0.5 * u * u).exp()
                })
                .sum::<f64>()
                * norm
        })
        .collect()
}
