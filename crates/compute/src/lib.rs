//! Deterministic analytics over branch metrics: composite scoring, z-score
//! outliers, per-branch diagnostics and portfolio rankings.

pub mod anomaly;
pub mod diagnostics;
pub mod ranking;
pub mod scoring;

pub use anomaly::{detect, AnomalyDetector, AnomalyRecord, Direction};
pub use diagnostics::{
    diagnose, executive_summary, key_takeaways, risks_and_focus, Diagnosis, Insight, Priority,
    RiskProfile, Severity,
};
pub use ranking::{PortfolioOverview, RankOrder, ZoneSummary};
pub use scoring::{score, ComponentScore, ScoreResult, ScoringEngine};
