//! Regression and unit-root routines used to qualify pairs.
//!
//! The Dickey-Fuller p-values use MacKinnon's (1994) response-surface
//! approximation, which is what the usual econometrics packages report.

use nalgebra::{DMatrix, DVector};
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

/// Fewest joined rows the Engle-Granger step accepts.
pub const MIN_COINT_OBSERVATIONS: usize = 10;

/// Result of `y = intercept + slope * x + residual`.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub intercept: f64,
    pub slope: f64,
    pub residuals: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdfResult {
    pub statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
    pub nobs: usize,
}

/// Deterministic terms of a Dickey-Fuller regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfTrend {
    NoConstant,
    Constant,
}

/// Statistics collaborator consumed by the pair evaluator.
pub trait Statistics: Send + Sync {
    fn pearson_correlation(&self, a: &[f64], b: &[f64]) -> f64;
    /// Engle-Granger p-value, `None` when the series are too short or degenerate.
    fn cointegration_test(&self, a: &[f64], b: &[f64]) -> Option<f64>;
    fn ordinary_least_squares(&self, y: &[f64], x: &[f64]) -> Option<OlsFit>;
    /// ADF with a constant and BIC lag selection.
    fn augmented_dickey_fuller(&self, residuals: &[f64]) -> Option<AdfResult>;

    /// Rows below which `cointegration_test` cannot produce a p-value.
    fn min_observations(&self) -> usize {
        3
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EngleGranger;

impl Statistics for EngleGranger {
    fn pearson_correlation(&self, a: &[f64], b: &[f64]) -> f64 {
        pearson(a, b)
    }

    fn cointegration_test(&self, a: &[f64], b: &[f64]) -> Option<f64> {
        engle_granger_p(a, b)
    }

    fn ordinary_least_squares(&self, y: &[f64], x: &[f64]) -> Option<OlsFit> {
        ols(y, x)
    }

    fn augmented_dickey_fuller(&self, residuals: &[f64]) -> Option<AdfResult> {
        adf_test(residuals, DfTrend::Constant)
    }

    fn min_observations(&self) -> usize {
        MIN_COINT_OBSERVATIONS
    }
}

/// Mean and population standard deviation.
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    Some((mean, var.max(0.0).sqrt()))
}

/// Pearson correlation over the common prefix; 0.0 when either side is flat.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a < 1e-12 || var_b < 1e-12 {
        return 0.0;
    }
    (cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0)
}

/// OLS of `y` on `x` with an intercept. `None` for a singular design.
pub fn ols(y: &[f64], x: &[f64]) -> Option<OlsFit> {
    let n = y.len();
    if n != x.len() || n < 3 {
        return None;
    }
    let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { x[i] });
    let y_vec = DVector::from_column_slice(y);
    let xtx = design.tr_mul(&design);
    let xty = design.tr_mul(&y_vec);
    let (coef, _) = solve(&xtx, &xty)?;
    let (intercept, slope) = (coef[0], coef[1]);
    if !intercept.is_finite() || !slope.is_finite() {
        return None;
    }
    let residuals = y
        .iter()
        .zip(x.iter())
        .map(|(yi, xi)| yi - (intercept + slope * xi))
        .collect();
    Some(OlsFit {
        intercept,
        slope,
        residuals,
    })
}

/// Solves the normal equations, returning the coefficients and `(X'X)^-1`.
/// Columns are rescaled to unit diagonal first so the collinearity check
/// does not depend on price levels.
fn solve(xtx: &DMatrix<f64>, xty: &DVector<f64>) -> Option<(DVector<f64>, DMatrix<f64>)> {
    let k = xtx.nrows();
    let mut scale: DVector<f64> = DVector::zeros(k);
    for i in 0..k {
        let d = xtx[(i, i)];
        if d <= 0.0 || !d.is_finite() {
            return None;
        }
        scale[i] = 1.0 / d.sqrt();
    }
    let normed = DMatrix::from_fn(k, k, |i, j| xtx[(i, j)] * scale[i] * scale[j]);
    let chol = normed.cholesky()?;
    let l = chol.l();
    // Squared pivot = share of a column not explained by the columns before it.
    if (0..k).any(|i| l[(i, i)] * l[(i, i)] < 1e-10) {
        return None;
    }
    let rhs = DVector::from_fn(k, |i, _| xty[i] * scale[i]);
    let z = chol.solve(&rhs);
    let coef = DVector::from_fn(k, |i, _| z[i] * scale[i]);
    let inv_normed = chol.inverse();
    let inv = DMatrix::from_fn(k, k, |i, j| inv_normed[(i, j)] * scale[i] * scale[j]);
    Some((coef, inv))
}

/// Engle-Granger two-step test: no deterministic term in the cointegrating
/// regression and no augmentation lags in the residual Dickey-Fuller step.
pub fn engle_granger_p(y: &[f64], x: &[f64]) -> Option<f64> {
    let n = y.len();
    if n != x.len() || n < MIN_COINT_OBSERVATIONS {
        return None;
    }
    let sxx: f64 = x.iter().map(|v| v * v).sum();
    if sxx <= 1e-12 {
        return None;
    }
    let sxy: f64 = x.iter().zip(y.iter()).map(|(a, b)| a * b).sum();
    let beta = sxy / sxx;
    let resid: Vec<f64> = y
        .iter()
        .zip(x.iter())
        .map(|(yi, xi)| yi - beta * xi)
        .collect();
    let stat = df_statistic(&resid, DfTrend::NoConstant, 0)?.0;
    Some(mackinnon_p(stat, DfTrend::NoConstant, 2))
}

/// Augmented Dickey-Fuller test with the lag count picked by BIC.
pub fn adf_test(series: &[f64], trend: DfTrend) -> Option<AdfResult> {
    let n = series.len();
    let n_trend = match trend {
        DfTrend::NoConstant => 0,
        DfTrend::Constant => 1,
    };
    if n < 8 {
        return None;
    }
    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
    let cap = (n / 2).checked_sub(n_trend + 1)?;
    let max_lag = schwert.min(cap);
    let best_lag = select_lag_bic(series, trend, max_lag)?;
    let (statistic, nobs) = df_statistic(series, trend, best_lag)?;
    Some(AdfResult {
        statistic,
        p_value: mackinnon_p(statistic, trend, 1),
        used_lag: best_lag,
        nobs,
    })
}

/// Rows `[const?, y_{t-1}, dy_{t-1}, .., dy_{t-lags}]` against `dy_t`,
/// using the sample that starts after `skip` leading differences.
fn df_design(
    series: &[f64],
    trend: DfTrend,
    lags: usize,
    skip: usize,
) -> (DMatrix<f64>, DVector<f64>) {
    let diff: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
    let nobs = diff.len() - skip;
    let offset = usize::from(trend == DfTrend::Constant);
    let cols = offset + 1 + lags;
    let x = DMatrix::from_fn(nobs, cols, |row, col| {
        let t = skip + row;
        if col < offset {
            1.0
        } else if col == offset {
            series[t]
        } else {
            diff[t - (col - offset)]
        }
    });
    let y = DVector::from_fn(nobs, |row, _| diff[skip + row]);
    (x, y)
}

fn select_lag_bic(series: &[f64], trend: DfTrend, max_lag: usize) -> Option<usize> {
    if max_lag == 0 {
        return Some(0);
    }
    // Every candidate is scored on the common sample of the longest lag.
    let (x, y) = df_design(series, trend, max_lag, max_lag);
    let nobs = y.len();
    let xtx = x.tr_mul(&x);
    let xty = x.tr_mul(&y);
    let yty = y.dot(&y);
    let offset = usize::from(trend == DfTrend::Constant);

    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=max_lag {
        let k = offset + 1 + lag;
        if nobs <= k {
            break;
        }
        let sub_xtx = xtx.view((0, 0), (k, k)).into_owned();
        let sub_xty = xty.rows(0, k).into_owned();
        let Some((coef, _)) = solve(&sub_xtx, &sub_xty) else {
            continue;
        };
        let ssr = (yty - coef.dot(&sub_xty)).max(1e-300);
        let n = nobs as f64;
        let llf = -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (ssr / n).ln() + 1.0);
        let bic = -2.0 * llf + (k as f64) * n.ln();
        if best.map(|(b, _)| bic < b).unwrap_or(true) {
            best = Some((bic, lag));
        }
    }
    best.map(|(_, lag)| lag)
}

/// t-statistic on the lagged level and the number of observations used.
fn df_statistic(series: &[f64], trend: DfTrend, lags: usize) -> Option<(f64, usize)> {
    if series.len() < lags + 3 {
        return None;
    }
    let (x, y) = df_design(series, trend, lags, lags);
    let nobs = y.len();
    let k = x.ncols();
    if nobs <= k {
        return None;
    }
    let xtx = x.tr_mul(&x);
    let xty = x.tr_mul(&y);
    let (coef, inv) = solve(&xtx, &xty)?;
    let resid = &y - &x * &coef;
    let ssr = resid.dot(&resid);
    let sigma2 = ssr / (nobs - k) as f64;
    let level = usize::from(trend == DfTrend::Constant);
    let se = (sigma2 * inv[(level, level)]).sqrt();
    if !se.is_finite() || se < 1e-300 {
        return None;
    }
    let t = coef[level] / se;
    t.is_finite().then_some((t, nobs))
}

// MacKinnon (1994) tables, rows indexed by the number of integrated variables.
const TAU_STAR_NC: [f64; 6] = [-1.04, -1.53, -2.68, -3.09, -3.07, -3.77];
const TAU_MIN_NC: [f64; 6] = [-19.04, -19.62, -21.21, -23.25, -21.63, -25.74];
const TAU_MAX_NC: [f64; 6] = [f64::INFINITY, 1.51, 0.86, 0.88, 1.05, 1.24];
const TAU_NC_SMALLP: [[f64; 3]; 6] = [
    [0.6344, 1.2378, 3.2496e-2],
    [1.9129, 1.3857, 3.5322e-2],
    [2.7648, 1.4502, 3.4186e-2],
    [3.4336, 1.4835, 3.19e-2],
    [4.0999, 1.5533, 3.59e-2],
    [4.5388, 1.5344, 2.9807e-2],
];
const TAU_NC_LARGEP: [[f64; 4]; 6] = [
    [0.4797, 9.3557e-1, -0.6999e-1, 3.3066e-2],
    [1.5578, 8.558e-1, -2.083e-1, -3.3549e-2],
    [2.2268, 6.8093e-1, -3.2362e-1, -5.4448e-2],
    [2.7654, 6.4502e-1, -3.0811e-1, -4.4946e-2],
    [3.2684, 6.8051e-1, -2.6778e-1, -3.4972e-2],
    [3.7268, 7.167e-1, -2.3648e-1, -2.8288e-2],
];

const TAU_STAR_C: [f64; 6] = [-1.61, -2.62, -3.13, -3.47, -3.78, -3.93];
const TAU_MIN_C: [f64; 6] = [-18.83, -18.86, -23.48, -28.07, -25.96, -23.27];
const TAU_MAX_C: [f64; 6] = [2.74, 0.92, 0.55, 0.61, 0.79, 1.0];
const TAU_C_SMALLP: [[f64; 3]; 6] = [
    [2.1659, 1.4412, 3.8269e-2],
    [2.92, 1.5012, 3.9796e-2],
    [3.4699, 1.4856, 3.164e-2],
    [3.9673, 1.4777, 2.6315e-2],
    [4.5509, 1.5338, 2.9545e-2],
    [5.1399, 1.6036, 3.4445e-2],
];
const TAU_C_LARGEP: [[f64; 4]; 6] = [
    [1.7339, 9.3202e-1, -1.2745e-1, -1.0368e-2],
    [2.1945, 6.4695e-1, -2.9198e-1, -4.2377e-2],
    [2.5893, 4.5168e-1, -3.6529e-1, -5.0074e-2],
    [3.0387, 4.5452e-1, -3.3666e-1, -4.1921e-2],
    [3.5049, 5.2098e-1, -2.9158e-1, -3.3468e-2],
    [3.9489, 5.8933e-1, -2.5359e-1, -2.721e-2],
];

/// Approximate p-value of a Dickey-Fuller statistic; `n_vars` is 1 for a
/// plain unit-root test and 2 for a two-series cointegration residual.
pub fn mackinnon_p(stat: f64, trend: DfTrend, n_vars: usize) -> f64 {
    if stat.is_nan() {
        return 1.0;
    }
    let idx = n_vars.clamp(1, 6) - 1;
    let (star, min, max) = match trend {
        DfTrend::NoConstant => (TAU_STAR_NC[idx], TAU_MIN_NC[idx], TAU_MAX_NC[idx]),
        DfTrend::Constant => (TAU_STAR_C[idx], TAU_MIN_C[idx], TAU_MAX_C[idx]),
    };
    if stat > max {
        return 1.0;
    }
    if stat < min {
        return 0.0;
    }
    let poly = if stat <= star {
        let c = match trend {
            DfTrend::NoConstant => TAU_NC_SMALLP[idx],
            DfTrend::Constant => TAU_C_SMALLP[idx],
        };
        c[0] + c[1] * stat + c[2] * stat * stat
    } else {
        let c = match trend {
            DfTrend::NoConstant => TAU_NC_LARGEP[idx],
            DfTrend::Constant => TAU_C_LARGEP[idx],
        };
        c[0] + c[1] * stat + c[2] * stat * stat + c[3] * stat * stat * stat
    };
    normal_cdf(poly)
}

fn normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // Deterministic zero-mean innovations in [-0.1, 0.1).
    fn noise(i: usize, prime: usize) -> f64 {
        ((i * prime) % 1000) as f64 / 5000.0 - 0.1
    }

    fn random_walk(n: usize, prime: usize) -> Vec<f64> {
        let mut out = vec![100.0];
        for i in 1..n {
            out.push(out[i - 1] + noise(i, prime));
        }
        out
    }

    #[test]
    fn ols_recovers_exact_line() {
        let x: Vec<f64> = (0..50).map(|i| (i as f64 * 0.37).sin() * 10.0 + i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 + 2.0 * v).collect();
        let fit = ols(&y, &x).unwrap();
        assert_abs_diff_eq!(fit.intercept, 3.0, epsilon = 1e-8);
        assert_abs_diff_eq!(fit.slope, 2.0, epsilon = 1e-10);
        assert!(fit.residuals.iter().all(|r| r.abs() < 1e-8));
    }

    #[test]
    fn ols_rejects_constant_regressor() {
        let x = vec![5.0; 20];
        let y: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert!(ols(&y, &x).is_none());
    }

    #[test]
    fn pearson_handles_sign_and_flat_series() {
        let a: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let b: Vec<f64> = a.iter().map(|v| 2.0 * v + 1.0).collect();
        let c: Vec<f64> = a.iter().map(|v| -v).collect();
        assert_abs_diff_eq!(pearson(&a, &b), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pearson(&a, &c), -1.0, epsilon = 1e-12);
        assert_eq!(pearson(&a, &[3.0; 10]), 0.0);
    }

    #[test]
    fn mean_std_is_population_std() {
        let (mean, std) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_abs_diff_eq!(mean, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(std, 2.0, epsilon = 1e-12);
        assert!(mean_std(&[]).is_none());
    }

    #[test]
    fn mackinnon_matches_reference_points() {
        // 5% critical value of the constant-only unit root test.
        assert_abs_diff_eq!(mackinnon_p(-2.86, DfTrend::Constant, 1), 0.05, epsilon = 0.002);
        assert_eq!(mackinnon_p(-30.0, DfTrend::Constant, 1), 0.0);
        assert_eq!(mackinnon_p(3.0, DfTrend::Constant, 1), 1.0);
        assert_eq!(mackinnon_p(2.0, DfTrend::NoConstant, 2), 1.0);
        let lo = mackinnon_p(-4.0, DfTrend::NoConstant, 2);
        let hi = mackinnon_p(-1.0, DfTrend::NoConstant, 2);
        assert!(lo < 0.01 && hi > 0.3);
    }

    #[test]
    fn adf_separates_stationary_and_explosive_series() {
        let stationary: Vec<f64> = (0..400).map(|i| noise(i, 1237)).collect();
        let res = adf_test(&stationary, DfTrend::Constant).unwrap();
        assert!(res.p_value < 0.01, "p={}", res.p_value);

        let explosive: Vec<f64> = (0..200)
            .map(|i| 1.03_f64.powi(i as i32) + noise(i, 1237))
            .collect();
        let res = adf_test(&explosive, DfTrend::Constant).unwrap();
        assert!(res.p_value > 0.5, "p={}", res.p_value);
    }

    #[test]
    fn adf_needs_enough_observations() {
        assert!(adf_test(&[1.0, 2.0, 1.0], DfTrend::Constant).is_none());
    }

    #[test]
    fn engle_granger_needs_min_observations() {
        let x = random_walk(MIN_COINT_OBSERVATIONS - 1, 7919);
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        assert!(engle_granger_p(&y, &x).is_none());
        assert_eq!(EngleGranger.min_observations(), MIN_COINT_OBSERVATIONS);
    }

    #[test]
    fn engle_granger_detects_shared_stochastic_trend() {
        let x = random_walk(500, 7919);
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| 1.5 * v + noise(i, 1237))
            .collect();
        let p = engle_granger_p(&y, &x).unwrap();
        assert!(p < 0.01, "p={}", p);
    }

    #[test]
    fn engle_granger_rejects_independent_drift() {
        let x = random_walk(500, 7919);
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| v + 0.002 * (i * i) as f64 / 100.0)
            .collect();
        let p = engle_granger_p(&y, &x).unwrap();
        assert!(p > 0.05, "p={}", p);
    }
}
