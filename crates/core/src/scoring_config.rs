//! ScoringConfig: criterion weights, tier thresholds and grade cutoffs.
//!
//! This one object drives both the native scoring engine and the formula
//! compiler. Neither of them hardcodes a threshold. A change here moves
//! both, and `validate()` rejects tables whose caps and cutoffs disagree.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::VistaError;
use crate::record::Metric;

const CAP_EPSILON: f64 = 1e-9;

// ── YAML document ───────────────────────────────────────────────────

/// Top-level scoring config document as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfigDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ConfigMetadata,
    pub spec: ScoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ── Spec ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Ceiling the grade cutoffs are expressed against. Must equal the
    /// sum of criterion caps.
    pub max_total: f64,
    /// Decimal places the total is rounded to.
    #[serde(default = "default_round_digits")]
    pub round_digits: u32,
    /// Ordered criteria; the order is the component order in results.
    pub criteria: Vec<Criterion>,
    pub grade_cutoffs: GradeCutoffs,
    #[serde(default)]
    pub status_cutoffs: StatusCutoffs,
}

fn default_round_digits() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Criterion {
    pub id: String,
    pub label: String,
    pub cap: f64,
    pub rule: CriterionRule,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriterionRule {
    /// `min(actual / target * cap, cap)`
    Achievement { actual: Metric, target: Metric },
    /// Step function: first tier whose threshold the value satisfies wins.
    Tiered {
        metric: Metric,
        direction: TierDirection,
        tiers: Vec<Tier>,
        otherwise: f64,
    },
    /// `inside` when `low <= value <= high`, else `outside`.
    Band {
        metric: Metric,
        low: f64,
        high: f64,
        inside: f64,
        outside: f64,
    },
}

/// Comparison used by every tier of a table. Both are inclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TierDirection {
    /// `value <= threshold` (lower is better, e.g. NPA).
    AtMost,
    /// `value >= threshold`.
    AtLeast,
}

impl TierDirection {
    pub fn satisfied(self, value: f64, threshold: f64) -> bool {
        match self {
            TierDirection::AtMost => value <= threshold,
            TierDirection::AtLeast => value >= threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Tier {
    pub threshold: f64,
    pub points: f64,
}

// ── Grades ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    /// Sentinel for a record that could not be scored.
    #[serde(rename = "N/A")]
    NotAvailable,
    D,
    C,
    B,
    A,
    #[serde(rename = "A+")]
    APlus,
}

impl Grade {
    pub fn label(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::NotAvailable => "N/A",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Ascending lower bounds (inclusive) for each grade above D.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GradeCutoffs {
    pub a_plus: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl GradeCutoffs {
    /// Cutoffs from best grade to worst, as nested conditionals read them.
    pub fn descending(&self) -> [(Grade, f64); 4] {
        [
            (Grade::APlus, self.a_plus),
            (Grade::A, self.a),
            (Grade::B, self.b),
            (Grade::C, self.c),
        ]
    }

    pub fn grade_for(&self, total: f64) -> Grade {
        self.descending()
            .into_iter()
            .find(|(_, cutoff)| total >= *cutoff)
            .map(|(grade, _)| grade)
            .unwrap_or(Grade::D)
    }
}

/// Dashboard status label thresholds (inclusive lower bounds).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StatusCutoffs {
    pub excellent: f64,
    pub good: f64,
}

impl Default for StatusCutoffs {
    fn default() -> Self {
        Self {
            excellent: 80.0,
            good: 65.0,
        }
    }
}

impl StatusCutoffs {
    pub fn label_for(&self, total: f64) -> &'static str {
        if total >= self.excellent {
            "Excellent"
        } else if total >= self.good {
            "Good"
        } else {
            "Review"
        }
    }
}

// ── Construction / loading ──────────────────────────────────────────

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::canonical()
    }
}

impl ScoringConfig {
    /// The canonical 100-point table: deposits 25, advances 25, NPA 20,
    /// profitability 15, CASA 10, CD band 5; cutoffs 90/80/65/50.
    pub fn canonical() -> Self {
        Self {
            max_total: 100.0,
            round_digits: 1,
            criteria: vec![
                Criterion {
                    id: "deposits".into(),
                    label: "Deposit achievement".into(),
                    cap: 25.0,
                    rule: CriterionRule::Achievement {
                        actual: Metric::TotalDeposits,
                        target: Metric::DepositTarget,
                    },
                },
                Criterion {
                    id: "advances".into(),
                    label: "Advance achievement".into(),
                    cap: 25.0,
                    rule: CriterionRule::Achievement {
                        actual: Metric::Advances,
                        target: Metric::AdvanceTarget,
                    },
                },
                Criterion {
                    id: "asset_quality".into(),
                    label: "Asset quality (NPA)".into(),
                    cap: 20.0,
                    rule: CriterionRule::Tiered {
                        metric: Metric::NpaPercent,
                        direction: TierDirection::AtMost,
                        tiers: vec![
                            Tier { threshold: 3.0, points: 20.0 },
                            Tier { threshold: 6.0, points: 12.0 },
                        ],
                        otherwise: 5.0,
                    },
                },
                Criterion {
                    id: "profitability".into(),
                    label: "Profit per staff".into(),
                    cap: 15.0,
                    rule: CriterionRule::Tiered {
                        metric: Metric::ProfitPerStaff,
                        direction: TierDirection::AtLeast,
                        tiers: vec![
                            Tier { threshold: 5.0, points: 15.0 },
                            Tier { threshold: 3.0, points: 10.0 },
                        ],
                        otherwise: 5.0,
                    },
                },
                Criterion {
                    id: "casa".into(),
                    label: "CASA ratio".into(),
                    cap: 10.0,
                    rule: CriterionRule::Tiered {
                        metric: Metric::CasaPercent,
                        direction: TierDirection::AtLeast,
                        tiers: vec![
                            Tier { threshold: 40.0, points: 10.0 },
                            Tier { threshold: 30.0, points: 5.0 },
                        ],
                        otherwise: 2.0,
                    },
                },
                Criterion {
                    id: "cd_balance".into(),
                    label: "Credit/deposit balance".into(),
                    cap: 5.0,
                    rule: CriterionRule::Band {
                        metric: Metric::CdRatio,
                        low: 60.0,
                        high: 80.0,
                        inside: 5.0,
                        outside: 2.0,
                    },
                },
            ],
            grade_cutoffs: GradeCutoffs {
                a_plus: 90.0,
                a: 80.0,
                b: 65.0,
                c: 50.0,
            },
            status_cutoffs: StatusCutoffs::default(),
        }
    }

    /// Parse a scoring config document and validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, VistaError> {
        let doc: ScoringConfigDocument = serde_yaml::from_str(yaml)?;
        if doc.kind != "ScoringConfig" {
            return Err(VistaError::InvalidConfig(format!(
                "expected kind 'ScoringConfig', got '{}'",
                doc.kind
            )));
        }
        doc.spec.validate()?;
        Ok(doc.spec)
    }

    pub fn from_path(path: &Path) -> Result<Self, VistaError> {
        let yaml = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading scoring config");
        Self::from_yaml_str(&yaml)
    }

    pub fn sum_of_caps(&self) -> f64 {
        self.criteria.iter().map(|c| c.cap).sum()
    }

    pub fn criterion(&self, id: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.id == id)
    }

    /// Round a raw total the way the engine reports it.
    pub fn round_total(&self, total: f64) -> f64 {
        let factor = 10f64.powi(self.round_digits as i32);
        (total * factor).round() / factor
    }

    /// Check internal consistency of caps, tiers and cutoffs.
    pub fn validate(&self) -> Result<(), VistaError> {
        let invalid = |msg: String| Err(VistaError::InvalidConfig(msg));

        if self.criteria.is_empty() {
            return invalid("no criteria defined".into());
        }
        if (self.sum_of_caps() - self.max_total).abs() > CAP_EPSILON {
            return invalid(format!(
                "criterion caps sum to {} but max_total is {}",
                self.sum_of_caps(),
                self.max_total
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for c in &self.criteria {
            if !seen.insert(c.id.as_str()) {
                return invalid(format!("duplicate criterion id '{}'", c.id));
            }
            if !(c.cap.is_finite() && c.cap > 0.0) {
                return invalid(format!("criterion '{}' has non-positive cap", c.id));
            }
            validate_rule(c)?;
        }

        let g = &self.grade_cutoffs;
        if !(0.0 < g.c && g.c < g.b && g.b < g.a && g.a < g.a_plus && g.a_plus <= self.max_total) {
            return invalid(format!(
                "grade cutoffs must ascend within (0, {}]: C={} B={} A={} A+={}",
                self.max_total, g.c, g.b, g.a, g.a_plus
            ));
        }
        let s = &self.status_cutoffs;
        if !(s.good < s.excellent && s.excellent <= self.max_total) {
            return invalid("status cutoffs must ascend within max_total".into());
        }
        Ok(())
    }
}

fn validate_rule(c: &Criterion) -> Result<(), VistaError> {
    let invalid = |msg: String| Err(VistaError::InvalidConfig(format!("criterion '{}': {}", c.id, msg)));
    let in_cap = |p: f64| p.is_finite() && (0.0..=c.cap).contains(&p);

    match &c.rule {
        CriterionRule::Achievement { actual, target } => {
            if !actual.is_stored() || !target.is_stored() {
                return invalid("achievement metrics must be stored fields".into());
            }
        }
        CriterionRule::Tiered { metric, direction, tiers, otherwise } => {
            if !metric.is_stored() {
                return invalid(format!("tier metric '{}' is not a stored field", metric));
            }
            if tiers.is_empty() {
                return invalid("tier table is empty".into());
            }
            for pair in tiers.windows(2) {
                let ordered = match direction {
                    TierDirection::AtMost => pair[0].threshold < pair[1].threshold,
                    TierDirection::AtLeast => pair[0].threshold > pair[1].threshold,
                };
                if !ordered {
                    return invalid("tier thresholds are out of order".into());
                }
                if pair[1].points > pair[0].points {
                    return invalid("tier points must not increase down the table".into());
                }
            }
            if tiers.iter().any(|t| !in_cap(t.points)) || !in_cap(*otherwise) {
                return invalid("tier points must lie within [0, cap]".into());
            }
            if tiers.last().map_or(false, |t| *otherwise > t.points) {
                return invalid("fallback points exceed the last tier".into());
            }
        }
        CriterionRule::Band { metric, low, high, inside, outside } => {
            if !metric.is_stored() {
                return invalid(format!("band metric '{}' is not a stored field", metric));
            }
            if low > high {
                return invalid("band low bound exceeds high bound".into());
            }
            if !in_cap(*inside) || !in_cap(*outside) {
                return invalid("band points must lie within [0, cap]".into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipped_yaml() -> &'static str {
        include_str!("../../../data/scoring/scoring-config.yml")
    }

    #[test]
    fn canonical_is_valid() {
        ScoringConfig::canonical().validate().unwrap();
        assert_eq!(ScoringConfig::canonical().sum_of_caps(), 100.0);
    }

    #[test]
    fn shipped_yaml_matches_canonical() {
        let parsed = ScoringConfig::from_yaml_str(shipped_yaml()).unwrap();
        assert_eq!(parsed, ScoringConfig::canonical());
    }

    #[test]
    fn grade_boundaries_are_inclusive() {
        let g = ScoringConfig::canonical().grade_cutoffs;
        assert_eq!(g.grade_for(90.0), Grade::APlus);
        assert_eq!(g.grade_for(89.9), Grade::A);
        assert_eq!(g.grade_for(80.0), Grade::A);
        assert_eq!(g.grade_for(65.0), Grade::B);
        assert_eq!(g.grade_for(50.0), Grade::C);
        assert_eq!(g.grade_for(49.9), Grade::D);
        assert_eq!(g.grade_for(0.0), Grade::D);
    }

    #[test]
    fn caps_must_match_ceiling() {
        let mut cfg = ScoringConfig::canonical();
        cfg.criteria[0].cap = 30.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("max_total"));
    }

    #[test]
    fn cutoffs_must_ascend() {
        let mut cfg = ScoringConfig::canonical();
        cfg.grade_cutoffs.b = 85.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn tier_points_above_cap_are_rejected() {
        let mut cfg = ScoringConfig::canonical();
        if let CriterionRule::Tiered { tiers, .. } = &mut cfg.criteria[2].rule {
            tiers[0].points = 25.0;
        }
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let yaml = shipped_yaml().replace("kind: ScoringConfig", "kind: Other");
        assert!(ScoringConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn round_trip() {
        let doc: ScoringConfigDocument = serde_yaml::from_str(shipped_yaml()).unwrap();
        let serialized = serde_yaml::to_string(&doc).unwrap();
        let doc2: ScoringConfigDocument = serde_yaml::from_str(&serialized).unwrap();
        assert_eq!(doc, doc2);
    }

    #[test]
    fn grade_order_is_monotone() {
        assert!(Grade::APlus > Grade::A);
        assert!(Grade::A > Grade::B);
        assert!(Grade::C > Grade::D);
        assert!(Grade::D > Grade::NotAvailable);
    }
}
