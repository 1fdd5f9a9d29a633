use crate::config::PairTradeConfig;
use crate::pair::{EvaluationError, PairCandidate, PairEvaluator};
use crate::series::SymbolSeries;
use std::collections::HashMap;

/// Pairs allowed to trade until the next regeneration, highest priority first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivePairSet {
    names: Vec<String>,
}

impl ActivePairSet {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionReport {
    pub evaluated: usize,
    pub not_ready: usize,
    pub low_correlation: usize,
    pub insufficient_data: usize,
    pub not_cointegrated: usize,
    pub degenerate: usize,
    pub not_stationary: usize,
    pub truncated: usize,
    pub selected: usize,
}

struct Survivor {
    index: usize,
    correlation: f64,
    stationary_p: f64,
}

pub struct PairSelector {
    evaluator: PairEvaluator,
    min_corr_threshold: f64,
    stationary_p_threshold: f64,
    max_active_pairs: usize,
    interval_ms: i64,
    next_regeneration: Option<i64>,
}

impl PairSelector {
    pub fn new(evaluator: PairEvaluator, cfg: &PairTradeConfig) -> Self {
        Self {
            evaluator,
            min_corr_threshold: cfg.min_corr_threshold,
            stationary_p_threshold: cfg.stationary_p_threshold,
            max_active_pairs: cfg.max_active_pairs.max(1),
            interval_ms: cfg.regenerate_interval_ms(),
            next_regeneration: None,
        }
    }

    pub fn next_regeneration(&self) -> Option<i64> {
        self.next_regeneration
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        self.next_regeneration.map_or(true, |next| now_ms > next)
    }

    /// Recomputes the active set. Returns `None` while no candidate has two
    /// ready series; the schedule is only armed once a pass evaluated something.
    pub fn regenerate(
        &mut self,
        now_ms: i64,
        candidates: &mut [PairCandidate],
        series: &HashMap<String, SymbolSeries>,
    ) -> Option<(ActivePairSet, SelectionReport)> {
        let mut report = SelectionReport::default();
        let mut survivors = Vec::new();

        for (index, candidate) in candidates.iter_mut().enumerate() {
            let (a, b) = match (series.get(&candidate.a), series.get(&candidate.b)) {
                (Some(a), Some(b)) if a.is_ready() && b.is_ready() => (a, b),
                _ => {
                    report.not_ready += 1;
                    continue;
                }
            };
            report.evaluated += 1;

            let correlation = self.evaluator.correlation(candidate, a, b);
            if correlation < self.min_corr_threshold {
                report.low_correlation += 1;
                continue;
            }

            match self.evaluator.cointegration_test(candidate, a, b) {
                Ok(model) if model.stationary_p < self.stationary_p_threshold => {
                    survivors.push(Survivor {
                        index,
                        correlation,
                        stationary_p: model.stationary_p,
                    });
                }
                Ok(model) => {
                    log::debug!(
                        "[SELECT] {} residuals not stationary p={:.4}",
                        candidate.name(),
                        model.stationary_p
                    );
                    report.not_stationary += 1;
                }
                Err(err) => {
                    log::debug!("[SELECT] {} rejected: {}", candidate.name(), err);
                    match err {
                        EvaluationError::InsufficientData { .. } => report.insufficient_data += 1,
                        EvaluationError::StatisticalTestFailure { .. } => {
                            report.not_cointegrated += 1
                        }
                        EvaluationError::DegenerateModel(_) => report.degenerate += 1,
                    }
                }
            }
        }

        if report.evaluated == 0 {
            return None;
        }
        self.next_regeneration = Some(now_ms.saturating_add(self.interval_ms));

        let names = rank_survivors(survivors, self.max_active_pairs, &mut report)
            .into_iter()
            .map(|index| candidates[index].name().to_string())
            .collect::<Vec<_>>();
        report.selected = names.len();

        if names.is_empty() {
            log::info!("[SELECT] no selected pair ({:?})", report);
        } else {
            log::info!("[SELECT] {} pairs selected: {:?} ({:?})", names.len(), names, report);
        }
        Some((ActivePairSet::new(names), report))
    }
}

/// Best correlations first, capped, then re-ordered by residual stationarity.
fn rank_survivors(
    mut survivors: Vec<Survivor>,
    cap: usize,
    report: &mut SelectionReport,
) -> Vec<usize> {
    survivors.sort_by(|x, y| y.correlation.total_cmp(&x.correlation));
    if survivors.len() > cap {
        report.truncated = survivors.len() - cap;
        survivors.truncate(cap);
    }
    survivors.sort_by(|x, y| x.stationary_p.total_cmp(&y.stationary_p));
    survivors.into_iter().map(|s| s.index).collect()
}
