//! Composite branch score: a sum of capped sub-scores driven entirely by
//! [`ScoringConfig`].
//!
//! Scoring never fails. A record that produces a non-finite intermediate
//! value scores as the `N/A` sentinel so dashboards can still render it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use vista_core::{Criterion, CriterionRule, Grade, MetricsRecord, ScoringConfig};

/// One criterion's contribution to the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    pub criterion: String,
    pub label: String,
    pub score: f64,
    pub cap: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub total: f64,
    pub grade: Grade,
    /// Same order as the config's criteria.
    pub components: Vec<ComponentScore>,
}

impl ScoreResult {
    pub fn unavailable() -> Self {
        Self {
            total: 0.0,
            grade: Grade::NotAvailable,
            components: Vec::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.grade != Grade::NotAvailable
    }

    pub fn component(&self, criterion: &str) -> Option<&ComponentScore> {
        self.components.iter().find(|c| c.criterion == criterion)
    }
}

/// Score one record against a config.
pub fn score(record: &MetricsRecord, config: &ScoringConfig) -> ScoreResult {
    let mut components = Vec::with_capacity(config.criteria.len());
    for criterion in &config.criteria {
        match criterion_score(criterion, record) {
            Some(score) => components.push(ComponentScore {
                criterion: criterion.id.clone(),
                label: criterion.label.clone(),
                score,
                cap: criterion.cap,
            }),
            None => {
                debug!(
                    branch = %record.id,
                    criterion = %criterion.id,
                    "non-finite sub-score, returning N/A"
                );
                return ScoreResult::unavailable();
            }
        }
    }

    let raw: f64 = components.iter().map(|c| c.score).sum();
    if !raw.is_finite() {
        return ScoreResult::unavailable();
    }
    let total = config.round_total(raw);

    ScoreResult {
        total,
        grade: config.grade_cutoffs.grade_for(total),
        components,
    }
}

/// Sub-score for one criterion, or `None` when an input is not finite.
pub fn criterion_score(criterion: &Criterion, record: &MetricsRecord) -> Option<f64> {
    let cap = criterion.cap;
    let value = match &criterion.rule {
        CriterionRule::Achievement { actual, target } => {
            let actual = actual.value(record);
            let target = target.value(record);
            if !actual.is_finite() || !target.is_finite() {
                return None;
            }
            if target <= 0.0 {
                0.0
            } else {
                (actual / target * cap).min(cap).max(0.0)
            }
        }
        CriterionRule::Tiered {
            metric,
            direction,
            tiers,
            otherwise,
        } => {
            let v = metric.value(record);
            if !v.is_finite() {
                return None;
            }
            tiers
                .iter()
                .find(|t| direction.satisfied(v, t.threshold))
                .map(|t| t.points)
                .unwrap_or(*otherwise)
        }
        CriterionRule::Band {
            metric,
            low,
            high,
            inside,
            outside,
        } => {
            let v = metric.value(record);
            if !v.is_finite() {
                return None;
            }
            if *low <= v && v <= *high {
                *inside
            } else {
                *outside
            }
        }
    };
    value.is_finite().then_some(value)
}

/// A config bound to the scoring function, shared by reports and chat.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, record: &MetricsRecord) -> ScoreResult {
        score(record, &self.config)
    }

    /// Dashboard status label ("Excellent" / "Good" / "Review") for a result.
    pub fn status_label(&self, result: &ScoreResult) -> &'static str {
        if !result.is_available() {
            return "Review";
        }
        self.config.status_cutoffs.label_for(result.total)
    }

    pub fn score_all<'a>(
        &self,
        records: &'a [MetricsRecord],
    ) -> Vec<(&'a MetricsRecord, ScoreResult)> {
        records.iter().map(|r| (r, self.score(r))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vista_core::Metric;

    fn record(npa: f64, profit: f64, casa: f64, cd: f64) -> MetricsRecord {
        MetricsRecord::builder("B9", "Test", "Z")
            .deposits(100.0, 100.0)
            .advances(100.0, 100.0)
            .npa_percent(npa)
            .profit_per_staff(profit)
            .casa_percent(casa)
            .cd_ratio(cd)
            .build()
            .unwrap()
    }

    #[test]
    fn perfect_record_scores_max() {
        let r = record(1.0, 6.0, 45.0, 70.0);
        let result = score(&r, &ScoringConfig::canonical());
        assert_eq!(result.total, 100.0);
        assert_eq!(result.grade, Grade::APlus);
        assert_eq!(result.components.len(), 6);
    }

    #[test]
    fn tier_boundaries_are_inclusive() {
        let cfg = ScoringConfig::canonical();
        let at = score(&record(3.0, 5.0, 40.0, 60.0), &cfg);
        assert_eq!(at.component("asset_quality").unwrap().score, 20.0);
        assert_eq!(at.component("profitability").unwrap().score, 15.0);
        assert_eq!(at.component("casa").unwrap().score, 10.0);
        assert_eq!(at.component("cd_balance").unwrap().score, 5.0);

        let past = score(&record(3.01, 4.99, 39.99, 80.01), &cfg);
        assert_eq!(past.component("asset_quality").unwrap().score, 12.0);
        assert_eq!(past.component("profitability").unwrap().score, 10.0);
        assert_eq!(past.component("casa").unwrap().score, 5.0);
        assert_eq!(past.component("cd_balance").unwrap().score, 2.0);
    }

    #[test]
    fn lowest_tiers_fall_through_to_otherwise() {
        let result = score(&record(9.0, 1.0, 10.0, 95.0), &ScoringConfig::canonical());
        let scores: Vec<f64> = result.components.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![25.0, 25.0, 5.0, 5.0, 2.0, 2.0]);
        assert_eq!(result.total, 64.0);
        assert_eq!(result.grade, Grade::C);
    }

    #[test]
    fn achievement_is_capped() {
        let r = MetricsRecord::builder("B1", "Over", "Z")
            .deposits(500.0, 100.0)
            .advances(50.0, 100.0)
            .build()
            .unwrap();
        let result = score(&r, &ScoringConfig::canonical());
        assert_eq!(result.component("deposits").unwrap().score, 25.0);
        assert!((result.component("advances").unwrap().score - 12.5).abs() < 1e-12);
    }

    #[test]
    fn non_finite_field_yields_sentinel() {
        let mut r = record(1.0, 6.0, 45.0, 70.0);
        r.casa_percent = f64::NAN;
        let result = score(&r, &ScoringConfig::canonical());
        assert_eq!(result, ScoreResult::unavailable());
        assert_eq!(result.grade.label(), "N/A");
    }

    #[test]
    fn zero_target_scores_zero_for_that_criterion() {
        let mut r = record(1.0, 6.0, 45.0, 70.0);
        r.deposit_target = 0.0;
        let result = score(&r, &ScoringConfig::canonical());
        assert_eq!(result.component("deposits").unwrap().score, 0.0);
        assert_eq!(result.total, 75.0);
    }

    #[test]
    fn engine_status_labels() {
        let engine = ScoringEngine::default();
        let great = engine.score(&record(1.0, 6.0, 45.0, 70.0));
        assert_eq!(engine.status_label(&great), "Excellent");
        let weak = engine.score(&record(9.0, 1.0, 10.0, 95.0));
        assert_eq!(engine.status_label(&weak), "Review");
        assert_eq!(engine.status_label(&ScoreResult::unavailable()), "Review");
    }

    #[test]
    fn criteria_can_be_dropped_by_profile() {
        let mut cfg = ScoringConfig::canonical();
        cfg.criteria.retain(|c| c.id != "profitability" && c.id != "cd_balance");
        cfg.max_total = cfg.sum_of_caps();
        let r = record(1.0, 0.0, 45.0, 200.0);
        let result = score(&r, &cfg);
        assert_eq!(result.components.len(), 4);
        assert_eq!(result.total, 80.0);
        assert!(result.component("profitability").is_none());
        assert_eq!(Metric::CdRatio.value(&r), 200.0);
    }
}
