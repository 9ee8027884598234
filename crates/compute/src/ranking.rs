//! Rankings and portfolio aggregates used by reports and chat answers.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use vista_core::{Grade, Metric, MetricsRecord};

use crate::scoring::{ScoreResult, ScoringEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankOrder {
    /// Largest value first.
    Descending,
    Ascending,
}

impl RankOrder {
    /// Order that puts the best performers first for this metric.
    pub fn best_first(metric: Metric) -> Self {
        if metric.higher_is_better() {
            RankOrder::Descending
        } else {
            RankOrder::Ascending
        }
    }

    pub fn worst_first(metric: Metric) -> Self {
        match Self::best_first(metric) {
            RankOrder::Descending => RankOrder::Ascending,
            RankOrder::Ascending => RankOrder::Descending,
        }
    }

    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            RankOrder::Descending => ord.reverse(),
            RankOrder::Ascending => ord,
        }
    }
}

/// Top `n` records by a metric. Ties break on branch name for a stable order.
pub fn rank_by_metric(
    records: &[MetricsRecord],
    metric: Metric,
    order: RankOrder,
    n: usize,
) -> Vec<&MetricsRecord> {
    let mut ranked: Vec<&MetricsRecord> = records.iter().collect();
    ranked.sort_by(|a, b| {
        order
            .apply(metric.value(a).total_cmp(&metric.value(b)))
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(n);
    ranked
}

/// Top `n` records by composite score. Unscorable records always sort last.
pub fn rank_by_score<'a>(
    records: &'a [MetricsRecord],
    engine: &ScoringEngine,
    order: RankOrder,
    n: usize,
) -> Vec<(&'a MetricsRecord, ScoreResult)> {
    let mut scored = engine.score_all(records);
    scored.sort_by(|(ra, a), (rb, b)| {
        b.is_available()
            .cmp(&a.is_available())
            .then_with(|| order.apply(a.total.total_cmp(&b.total)))
            .then_with(|| ra.name.cmp(&rb.name))
    });
    scored.truncate(n);
    scored
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSummary {
    pub zone: String,
    pub branches: usize,
    pub avg_score: f64,
    pub avg_npa: f64,
    pub total_deposits: f64,
    pub total_advances: f64,
}

/// Per-zone aggregates, sorted by zone name.
pub fn zone_summaries(records: &[MetricsRecord], engine: &ScoringEngine) -> Vec<ZoneSummary> {
    let mut zones: BTreeMap<&str, Vec<&MetricsRecord>> = BTreeMap::new();
    for r in records {
        zones.entry(r.zone.as_str()).or_default().push(r);
    }

    zones
        .into_iter()
        .map(|(zone, members)| {
            let n = members.len() as f64;
            ZoneSummary {
                zone: zone.to_string(),
                branches: members.len(),
                avg_score: members.iter().map(|r| engine.score(r).total).sum::<f64>() / n,
                avg_npa: members.iter().map(|r| r.npa_percent).sum::<f64>() / n,
                total_deposits: members.iter().map(|r| r.total_deposits).sum(),
                total_advances: members.iter().map(|r| r.advances).sum(),
            }
        })
        .collect()
}

/// Whole-portfolio headline numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioOverview {
    pub branches: usize,
    pub avg_score: f64,
    pub avg_npa: f64,
    pub avg_casa: f64,
    pub total_deposits: f64,
    pub deposit_target: f64,
    pub total_advances: f64,
    pub advance_target: f64,
    pub grade_distribution: BTreeMap<Grade, usize>,
}

impl PortfolioOverview {
    pub fn compute(records: &[MetricsRecord], engine: &ScoringEngine) -> Self {
        let n = records.len().max(1) as f64;
        let mut grade_distribution = BTreeMap::new();
        let mut score_sum = 0.0;
        for r in records {
            let s = engine.score(r);
            score_sum += s.total;
            *grade_distribution.entry(s.grade).or_insert(0) += 1;
        }

        Self {
            branches: records.len(),
            avg_score: score_sum / n,
            avg_npa: records.iter().map(|r| r.npa_percent).sum::<f64>() / n,
            avg_casa: records.iter().map(|r| r.casa_percent).sum::<f64>() / n,
            total_deposits: records.iter().map(|r| r.total_deposits).sum(),
            deposit_target: records.iter().map(|r| r.deposit_target).sum(),
            total_advances: records.iter().map(|r| r.advances).sum(),
            advance_target: records.iter().map(|r| r.advance_target).sum(),
            grade_distribution,
        }
    }

    pub fn deposit_achievement_pct(&self) -> f64 {
        if self.deposit_target > 0.0 {
            self.total_deposits / self.deposit_target * 100.0
        } else {
            0.0
        }
    }

    pub fn advance_achievement_pct(&self) -> f64 {
        if self.advance_target > 0.0 {
            self.total_advances / self.advance_target * 100.0
        } else {
            0.0
        }
    }
}
