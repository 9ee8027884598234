pub mod config;
pub mod error;
pub mod record;
pub mod scoring_config;

pub use config::Config;
pub use error::*;
pub use record::{ensure_unique, load_records, parse_records, Metric, MetricsRecord, MetricsRecordBuilder, RawMetricsRecord};
pub use scoring_config::{
    Criterion, CriterionRule, Grade, GradeCutoffs, ScoringConfig, StatusCutoffs, Tier,
    TierDirection,
};
