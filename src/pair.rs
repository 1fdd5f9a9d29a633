use crate::series::{synchronize, synchronize_resampled, SymbolSeries};
use crate::stats::{mean_std, Statistics};
use std::fmt;
use std::sync::Arc;

/// Live hedge model of a pair, replaced on every successful evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedModel {
    pub intercept: f64,
    pub slope: f64,
    pub mean_error: f64,
    pub epsilon: f64,
    pub stationary_p: f64,
}

impl FittedModel {
    pub fn spread(&self, price_a: f64, price_b: f64) -> f64 {
        price_a - (self.intercept + self.slope * price_b)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationError {
    InsufficientData { available: usize, required: usize },
    StatisticalTestFailure { test: &'static str, p_value: f64, threshold: f64 },
    DegenerateModel(String),
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvaluationError::InsufficientData {
                available,
                required,
            } => write!(
                f,
                "insufficient data: {} overlapping rows, need {}",
                available, required
            ),
            EvaluationError::StatisticalTestFailure {
                test,
                p_value,
                threshold,
            } => write!(
                f,
                "{} test failed: p={:.4} >= {:.4}",
                test, p_value, threshold
            ),
            EvaluationError::DegenerateModel(reason) => write!(f, "degenerate model: {}", reason),
        }
    }
}

impl std::error::Error for EvaluationError {}

/// Unordered pair of universe symbols, `a` first in universe order.
#[derive(Debug, Clone)]
pub struct PairCandidate {
    pub a: String,
    pub b: String,
    name: String,
    model: Option<FittedModel>,
    last_correlation: Option<f64>,
    last_coint_p: Option<f64>,
}

impl PairCandidate {
    pub fn new(a: &str, b: &str) -> Self {
        Self {
            a: a.to_string(),
            b: b.to_string(),
            name: format!("{}:{}", a, b),
            model: None,
            last_correlation: None,
            last_coint_p: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> Option<&FittedModel> {
        self.model.as_ref()
    }

    pub fn last_correlation(&self) -> Option<f64> {
        self.last_correlation
    }

    pub fn last_coint_p(&self) -> Option<f64> {
        self.last_coint_p
    }

    #[cfg(test)]
    pub(crate) fn with_model(mut self, model: FittedModel) -> Self {
        self.model = Some(model);
        self
    }
}

/// All unordered pairs of the universe, in universe order.
pub fn build_candidates(universe: &[String]) -> Vec<PairCandidate> {
    let mut out = Vec::new();
    for i in 0..universe.len() {
        for j in (i + 1)..universe.len() {
            out.push(PairCandidate::new(&universe[i], &universe[j]));
        }
    }
    out
}

#[derive(Clone)]
pub struct PairEvaluator {
    stats: Arc<dyn Statistics>,
    min_overlap: usize,
    coint_p_threshold: f64,
}

impl PairEvaluator {
    pub fn new(stats: Arc<dyn Statistics>, min_overlap: usize, coint_p_threshold: f64) -> Self {
        Self {
            stats,
            min_overlap,
            coint_p_threshold,
        }
    }

    /// Pearson correlation of the raw closes joined on bar timestamp.
    pub fn correlation(
        &self,
        candidate: &mut PairCandidate,
        a: &SymbolSeries,
        b: &SymbolSeries,
    ) -> f64 {
        let (xa, xb) = synchronize(&a.closes(), &b.closes());
        let corr = self.stats.pearson_correlation(&xa, &xb);
        let corr = if corr.is_finite() { corr } else { 0.0 };
        candidate.last_correlation = Some(corr);
        corr
    }

    /// Engle-Granger on the joined rows resampled from the newest shared bar,
    /// then the hedge regression and residual stationarity on the raw closes.
    /// The candidate's model is only replaced when every step succeeds.
    pub fn cointegration_test(
        &self,
        candidate: &mut PairCandidate,
        a: &SymbolSeries,
        b: &SymbolSeries,
    ) -> Result<FittedModel, EvaluationError> {
        let (ra, rb) = synchronize_resampled(&a.closes(), &b.closes(), a.resample_interval());
        let required = self.min_overlap.max(self.stats.min_observations());
        if ra.len() < required {
            return Err(EvaluationError::InsufficientData {
                available: ra.len(),
                required,
            });
        }

        let coint_p = self.stats.cointegration_test(&ra, &rb).ok_or_else(|| {
            EvaluationError::DegenerateModel("cointegration regression is singular".to_string())
        })?;
        candidate.last_coint_p = Some(coint_p);
        if !(coint_p < self.coint_p_threshold) {
            return Err(EvaluationError::StatisticalTestFailure {
                test: "cointegration",
                p_value: coint_p,
                threshold: self.coint_p_threshold,
            });
        }

        let (xa, xb) = synchronize(&a.closes(), &b.closes());
        let fit = self
            .stats
            .ordinary_least_squares(&xa, &xb)
            .ok_or_else(|| EvaluationError::DegenerateModel("singular hedge regression".to_string()))?;
        if !fit.intercept.is_finite() || !fit.slope.is_finite() {
            return Err(EvaluationError::DegenerateModel(
                "non-finite hedge coefficients".to_string(),
            ));
        }
        let adf = self
            .stats
            .augmented_dickey_fuller(&fit.residuals)
            .ok_or_else(|| {
                EvaluationError::DegenerateModel("residual unit-root test failed".to_string())
            })?;
        let (mean_error, epsilon) = mean_std(&fit.residuals)
            .ok_or_else(|| EvaluationError::DegenerateModel("empty residuals".to_string()))?;

        let model = FittedModel {
            intercept: fit.intercept,
            slope: fit.slope,
            mean_error,
            epsilon,
            stationary_p: adf.p_value,
        };
        log::debug!(
            "[EVAL] {} coint_p={:.4} rows={} intercept={:.4} slope={:.4} mean={:.4} eps={:.4} stationary_p={:.4} adf_lag={} adf_nobs={}",
            candidate.name(),
            coint_p,
            ra.len(),
            model.intercept,
            model.slope,
            model.mean_error,
            model.epsilon,
            model.stationary_p,
            adf.used_lag,
            adf.nobs
        );
        candidate.model = Some(model);
        Ok(model)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::series::Bar;
    use crate::stats::{AdfResult, EngleGranger, OlsFit};
    use approx::assert_abs_diff_eq;

    /// Canned statistics so selection and trading can be driven exactly.
    pub(crate) struct StubStatistics {
        pub correlation: f64,
        pub coint_p: Option<f64>,
        pub fit: Option<(f64, f64)>,
        pub residuals: Vec<f64>,
        pub stationary_p: Option<f64>,
    }

    impl Default for StubStatistics {
        fn default() -> Self {
            Self {
                correlation: 0.99,
                coint_p: Some(0.01),
                fit: Some((0.0, 1.0)),
                residuals: vec![1.0, -1.0, 1.0, -1.0],
                stationary_p: Some(0.01),
            }
        }
    }

    impl Statistics for StubStatistics {
        fn pearson_correlation(&self, _a: &[f64], _b: &[f64]) -> f64 {
            self.correlation
        }

        fn cointegration_test(&self, _a: &[f64], _b: &[f64]) -> Option<f64> {
            self.coint_p
        }

        fn ordinary_least_squares(&self, _y: &[f64], _x: &[f64]) -> Option<OlsFit> {
            self.fit.map(|(intercept, slope)| OlsFit {
                intercept,
                slope,
                residuals: self.residuals.clone(),
            })
        }

        fn augmented_dickey_fuller(&self, residuals: &[f64]) -> Option<AdfResult> {
            self.stationary_p.map(|p_value| AdfResult {
                statistic: -5.0,
                p_value,
                used_lag: 0,
                nobs: residuals.len(),
            })
        }
    }

    fn noise(i: usize, prime: usize) -> f64 {
        ((i * prime) % 1000) as f64 / 5000.0 - 0.1
    }

    fn series_from(symbol: &str, closes: &[f64], interval: usize) -> SymbolSeries {
        let mut series = SymbolSeries::new(symbol, closes.len(), 1, interval);
        for (i, close) in closes.iter().enumerate() {
            series.update(Bar::from_close(i as i64 * 60_000, *close));
        }
        series
    }

    fn evaluator(stats: impl Statistics + 'static) -> PairEvaluator {
        PairEvaluator::new(Arc::new(stats), 30, 0.05)
    }

    #[test]
    fn candidates_cover_every_unordered_pair_once() {
        let universe: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        let names: Vec<String> = build_candidates(&universe)
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["A:B", "A:C", "A:D", "B:C", "B:D", "C:D"]);
    }

    #[test]
    fn cointegrated_pair_recovers_hedge_model() {
        let mut walk = 50.0;
        let mut xb = Vec::new();
        let mut xa = Vec::new();
        for i in 0..500 {
            walk += noise(i, 7919) * 5.0;
            xb.push(walk);
            xa.push(1.5 * walk + noise(i, 1237));
        }
        let a = series_from("A", &xa, 1);
        let b = series_from("B", &xb, 1);
        let eval = evaluator(EngleGranger);
        let mut candidate = PairCandidate::new("A", "B");

        let corr = eval.correlation(&mut candidate, &a, &b);
        assert!(corr > 0.9, "corr={}", corr);

        let model = eval.cointegration_test(&mut candidate, &a, &b).unwrap();
        assert_abs_diff_eq!(model.slope, 1.5, epsilon = 0.01);
        assert_abs_diff_eq!(model.intercept, 0.0, epsilon = 0.5);
        assert_abs_diff_eq!(model.mean_error, 0.0, epsilon = 1e-6);
        assert!(model.epsilon > 0.0);
        assert!(model.stationary_p < 0.05);
        assert_eq!(candidate.model(), Some(&model));
    }

    #[test]
    fn short_overlap_is_insufficient_data() {
        let a = series_from("A", &[1.0, 2.0, 3.0, 4.0], 1);
        let b = series_from("B", &[2.0, 3.0, 4.0, 5.0], 1);
        let mut candidate = PairCandidate::new("A", "B");
        let err = evaluator(EngleGranger)
            .cointegration_test(&mut candidate, &a, &b)
            .unwrap_err();
        assert_eq!(
            err,
            EvaluationError::InsufficientData {
                available: 4,
                required: 30
            }
        );
        assert!(candidate.model().is_none());
    }

    #[test]
    fn overlap_below_test_minimum_is_insufficient_data() {
        let closes: Vec<f64> = (0..8).map(|i| 100.0 + i as f64).collect();
        let a = series_from("A", &closes, 1);
        let b = series_from("B", &closes, 1);
        let eval = PairEvaluator::new(Arc::new(EngleGranger), 3, 0.05);
        let mut candidate = PairCandidate::new("A", "B");
        let err = eval.cointegration_test(&mut candidate, &a, &b).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::InsufficientData {
                available: 8,
                required: 10
            }
        );
    }

    #[test]
    fn missing_bar_keeps_resampled_overlap() {
        let closes: Vec<f64> = (0..600).map(|i| 100.0 + i as f64).collect();
        let a = series_from("A", &closes, 10);
        let mut b = SymbolSeries::new("B", 600, 1, 10);
        for (i, close) in closes.iter().enumerate().filter(|(i, _)| *i != 590) {
            b.update(Bar::from_close(i as i64 * 60_000, *close));
        }
        let mut candidate = PairCandidate::new("A", "B");
        let model = evaluator(StubStatistics::default())
            .cointegration_test(&mut candidate, &a, &b)
            .unwrap();
        assert_eq!(candidate.model(), Some(&model));
    }

    #[test]
    fn failed_cointegration_keeps_previous_model() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let a = series_from("A", &closes, 1);
        let b = series_from("B", &closes, 1);
        let previous = FittedModel {
            intercept: 1.0,
            slope: 2.0,
            mean_error: 0.0,
            epsilon: 0.5,
            stationary_p: 0.01,
        };
        let mut candidate = PairCandidate::new("A", "B").with_model(previous);
        let stats = StubStatistics {
            correlation: 0.95,
            coint_p: Some(0.5),
            ..StubStatistics::default()
        };
        let err = evaluator(stats)
            .cointegration_test(&mut candidate, &a, &b)
            .unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::StatisticalTestFailure { p_value, .. } if p_value == 0.5
        ));
        assert_eq!(candidate.model(), Some(&previous));
        assert_eq!(candidate.last_coint_p(), Some(0.5));
    }

    #[test]
    fn singular_regression_is_degenerate() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let a = series_from("A", &closes, 1);
        let b = series_from("B", &closes, 1);
        let stats = StubStatistics {
            fit: None,
            ..StubStatistics::default()
        };
        let mut candidate = PairCandidate::new("A", "B");
        let err = evaluator(stats)
            .cointegration_test(&mut candidate, &a, &b)
            .unwrap_err();
        assert!(matches!(err, EvaluationError::DegenerateModel(_)));
        assert!(candidate.model().is_none());
    }

    #[test]
    fn epsilon_is_population_std_of_residuals() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let a = series_from("A", &closes, 1);
        let b = series_from("B", &closes, 1);
        let stats = StubStatistics {
            residuals: vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0],
            ..StubStatistics::default()
        };
        let mut candidate = PairCandidate::new("A", "B");
        let model = evaluator(stats)
            .cointegration_test(&mut candidate, &a, &b)
            .unwrap();
        assert_abs_diff_eq!(model.mean_error, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(model.epsilon, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn correlation_uses_only_shared_timestamps() {
        let mut a = SymbolSeries::new("A", 10, 1, 1);
        let mut b = SymbolSeries::new("B", 10, 1, 1);
        for (ts, close) in [(1, 1.0), (2, 2.0), (3, 3.0), (5, 50.0)] {
            a.update(Bar::from_close(ts, close));
        }
        for (ts, close) in [(1, 10.0), (2, 20.0), (3, 30.0), (4, 1.0)] {
            b.update(Bar::from_close(ts, close));
        }
        let mut candidate = PairCandidate::new("A", "B");
        let corr = evaluator(EngleGranger).correlation(&mut candidate, &a, &b);
        assert_abs_diff_eq!(corr, 1.0, epsilon = 1e-12);
        assert_eq!(candidate.last_correlation(), Some(corr));
    }
}
