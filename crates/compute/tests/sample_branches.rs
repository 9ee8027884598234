//! Scenario checks against the bundled sample branches.

use vista_compute::ranking::{rank_by_score, RankOrder};
use vista_compute::{detect, diagnose, score, AnomalyDetector, Direction, ScoringEngine, Severity};
use vista_core::{parse_records, Grade, Metric, MetricsRecord, ScoringConfig};

fn sample() -> Vec<MetricsRecord> {
    parse_records(include_str!("../../../data/sample/branches.json")).unwrap()
}

fn by_name<'a>(records: &'a [MetricsRecord], name: &str) -> &'a MetricsRecord {
    records.iter().find(|r| r.name == name).unwrap()
}

#[test]
fn sample_scores_and_grades() {
    let records = sample();
    let cfg = ScoringConfig::canonical();
    let expected = [
        ("Mansoorabad", 100.0, Grade::APlus),
        ("Adilabad", 73.9, Grade::B),
        ("Hyderabad Main", 98.8, Grade::APlus),
        ("Secunderabad", 80.8, Grade::A),
        ("Warangal", 59.1, Grade::C),
        ("Vijayawada", 98.7, Grade::APlus),
        ("Visakhapatnam", 99.6, Grade::APlus),
        ("Guntur", 80.4, Grade::A),
    ];
    for (name, total, grade) in expected {
        let result = score(by_name(&records, name), &cfg);
        assert!((result.total - total).abs() < 1e-9, "{name}: {}", result.total);
        assert_eq!(result.grade, grade, "{name}");
    }
}

#[test]
fn a_grade_record_components() {
    let records = sample();
    let result = score(by_name(&records, "Secunderabad"), &ScoringConfig::canonical());
    let ids: Vec<&str> = result.components.iter().map(|c| c.criterion.as_str()).collect();
    assert_eq!(
        ids,
        vec!["deposits", "advances", "asset_quality", "profitability", "casa", "cd_balance"]
    );
    assert_eq!(result.component("asset_quality").unwrap().score, 12.0);
    assert_eq!(result.component("casa").unwrap().score, 5.0);
    assert_eq!(result.grade, Grade::A);
}

#[test]
fn warangal_is_the_npa_outlier() {
    let records = sample();
    let found = detect(&records, &[Metric::NpaPercent], 1.7);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].entity_name, "Warangal");
    assert_eq!(found[0].direction, Direction::High);
    assert!(found[0].z_score > 1.7);
}

#[test]
fn default_detector_runs_over_sample() {
    let records = sample();
    let found = AnomalyDetector::default().detect(&records);
    for a in &found {
        assert!(a.z_score.abs() > 2.0);
    }
}

#[test]
fn weakest_branch_has_p1_priorities() {
    let records = sample();
    let engine = ScoringEngine::default();
    let worst = rank_by_score(&records, &engine, RankOrder::Ascending, 1);
    assert_eq!(worst[0].0.name, "Warangal");
    let d = diagnose(worst[0].0);
    assert!(d.count(Severity::Critical) >= 1);
    assert_eq!(d.priorities[0].level, "P1");
}
