//! Z-score outlier detection across a branch population.
//!
//! For each metric of interest the population mean and standard deviation
//! are computed over every record, then each record whose absolute z-score
//! exceeds the threshold is flagged HIGH or LOW.

pub mod population;

use serde::{Deserialize, Serialize};
use tracing::debug;

use vista_core::config::DEFAULT_Z_THRESHOLD;
use vista_core::{Metric, MetricsRecord};

pub use population::{compute_population_stats, PopulationStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    High,
    Low,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::High => f.write_str("HIGH"),
            Direction::Low => f.write_str("LOW"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub entity_id: String,
    pub entity_name: String,
    pub metric: Metric,
    pub value: f64,
    pub mean: f64,
    pub z_score: f64,
    pub direction: Direction,
}

impl AnomalyRecord {
    /// Whether this outlier is on the unfavourable side of the mean.
    pub fn is_adverse(&self) -> bool {
        match self.direction {
            Direction::High => !self.metric.higher_is_better(),
            Direction::Low => self.metric.higher_is_better(),
        }
    }
}

/// Flag outliers for each metric, in metric order then input order.
pub fn detect(
    records: &[MetricsRecord],
    metrics: &[Metric],
    z_threshold: f64,
) -> Vec<AnomalyRecord> {
    let threshold = if z_threshold.is_finite() {
        z_threshold.max(0.0)
    } else {
        DEFAULT_Z_THRESHOLD
    };

    let mut out = Vec::new();
    if records.is_empty() {
        return out;
    }

    for &metric in metrics {
        let values: Vec<f64> = records.iter().map(|r| metric.value(r)).collect();
        let stats = match compute_population_stats(&values) {
            Some(s) => s,
            None => continue,
        };
        if stats.is_degenerate() {
            debug!(metric = metric.key(), mean = stats.mean, "zero variance, skipping metric");
            continue;
        }

        for (record, &value) in records.iter().zip(&values) {
            if !value.is_finite() {
                continue;
            }
            let z = stats.z_score(value);
            if z.abs() > threshold {
                out.push(AnomalyRecord {
                    entity_id: record.id.clone(),
                    entity_name: record.name.clone(),
                    metric,
                    value,
                    mean: stats.mean,
                    z_score: z,
                    direction: if value > stats.mean {
                        Direction::High
                    } else {
                        Direction::Low
                    },
                });
            }
        }
    }

    debug!(records = records.len(), anomalies = out.len(), threshold, "anomaly scan complete");
    out
}

/// Threshold and metric selection bundled for reuse.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    pub z_threshold: f64,
    pub metrics: Vec<Metric>,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self {
            z_threshold: DEFAULT_Z_THRESHOLD,
            metrics: Metric::ANOMALY_DEFAULTS.to_vec(),
        }
    }
}

impl AnomalyDetector {
    pub fn new(z_threshold: f64) -> Self {
        Self {
            z_threshold,
            ..Self::default()
        }
    }

    pub fn with_metrics(mut self, metrics: Vec<Metric>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn detect(&self, records: &[MetricsRecord]) -> Vec<AnomalyRecord> {
        detect(records, &self.metrics, self.z_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_npa(id: &str, npa: f64) -> MetricsRecord {
        MetricsRecord::builder(id, format!("Branch {id}"), "Z")
            .npa_percent(npa)
            .casa_percent(40.0)
            .build()
            .unwrap()
    }

    fn npa_population() -> Vec<MetricsRecord> {
        [2.8, 5.4, 1.9, 3.2, 8.5, 2.3, 1.8, 4.1, 3.0, 3.0]
            .iter()
            .enumerate()
            .map(|(i, &v)| with_npa(&format!("B{i}"), v))
            .collect()
    }

    #[test]
    fn flags_high_npa_outlier() {
        let found = detect(&npa_population(), &[Metric::NpaPercent], 2.0);
        assert_eq!(found.len(), 1);
        let a = &found[0];
        assert_eq!(a.entity_id, "B4");
        assert_eq!(a.direction, Direction::High);
        assert!((a.mean - 3.6).abs() < 1e-9);
        assert!(a.z_score > 2.5 && a.z_score < 2.6);
        assert!(a.is_adverse());
    }

    #[test]
    fn zero_variance_metric_is_skipped() {
        let found = detect(&npa_population(), &[Metric::CasaPercent], 0.0);
        assert!(found.is_empty());
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(detect(&[], &Metric::ANOMALY_DEFAULTS, 2.0).is_empty());
    }

    #[test]
    fn ordered_by_metric_then_input() {
        let mut records = npa_population();
        records[1].casa_percent = 90.0;
        records[7].casa_percent = 5.0;
        let found = detect(&records, &[Metric::CasaPercent, Metric::NpaPercent], 1.0);
        let keys: Vec<(Metric, &str)> =
            found.iter().map(|a| (a.metric, a.entity_id.as_str())).collect();
        assert_eq!(keys.first(), Some(&(Metric::CasaPercent, "B1")));
        assert_eq!(keys.get(1), Some(&(Metric::CasaPercent, "B7")));
        assert!(keys[2..].iter().all(|(m, _)| *m == Metric::NpaPercent));
        assert_eq!(found[1].direction, Direction::Low);
    }

    #[test]
    fn detector_defaults() {
        let d = AnomalyDetector::default();
        assert_eq!(d.z_threshold, 2.0);
        assert_eq!(d.metrics.len(), Metric::ANOMALY_DEFAULTS.len());
        let found = AnomalyDetector::new(2.0)
            .with_metrics(vec![Metric::NpaPercent])
            .detect(&npa_population());
        assert_eq!(found.len(), 1);
    }
}
