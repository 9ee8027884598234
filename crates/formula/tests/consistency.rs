//! The compiled workbook must agree with the native engine for every record.

use vista_compute::ScoringEngine;
use vista_core::{parse_records, CriterionRule, Metric, MetricsRecord, ScoringConfig};
use vista_formula::layout::{DASHBOARD_SHEET, DATA_SHEET};
use vista_formula::{build_workbook, compile, parse, render, CellAddr, LayoutBindings, Value, Workbook};

fn sample() -> Vec<MetricsRecord> {
    parse_records(include_str!("../../../data/sample/branches.json")).unwrap()
}

fn boundary_records() -> Vec<MetricsRecord> {
    let mk = |id: &str, npa: f64, profit: f64, casa: f64, cd: f64| {
        MetricsRecord::builder(id, format!("Edge {id}"), "Edge")
            .deposits(95.0, 100.0)
            .advances(100.0, 80.0)
            .npa_percent(npa)
            .profit_per_staff(profit)
            .casa_percent(casa)
            .cd_ratio(cd)
            .build()
            .unwrap()
    };
    vec![
        mk("E1", 3.0, 5.0, 40.0, 60.0),
        mk("E2", 6.0, 3.0, 30.0, 80.0),
        mk("E3", 6.000001, 2.999999, 29.999999, 80.000001),
        mk("E4", 2.999999, 4.999999, 39.999999, 59.999999),
    ]
}

fn score_cell() -> CellAddr {
    CellAddr::new(2, 9)
}

fn select(wb: &mut Workbook, name: &str) {
    wb.set_value(DASHBOARD_SHEET, CellAddr::new(1, 3), name).unwrap();
}

fn assert_close(actual: &Value, expected: f64, who: &str) {
    let n = actual
        .as_number()
        .unwrap_or_else(|| panic!("{who}: not a number: {actual:?}"));
    let tolerance = 1e-6 * expected.abs().max(1.0);
    assert!((n - expected).abs() <= tolerance, "{who}: {n} vs {expected}");
}

fn check_all(records: &[MetricsRecord]) {
    check_with(records, &ScoringEngine::default());
}

fn check_with(records: &[MetricsRecord], engine: &ScoringEngine) {
    let mut wb = build_workbook(records, engine).unwrap();
    let compiled = compile(&LayoutBindings::standard(records.len()), engine.config()).unwrap();
    let reparsed = parse(&render(&compiled.score)).unwrap();

    for r in records {
        let expected = engine.score(r);
        select(&mut wb, &r.name);

        let tree = wb.value(DASHBOARD_SHEET, score_cell());
        assert_close(&tree, expected.total, &r.name);

        let text = wb.evaluate(DASHBOARD_SHEET, &reparsed);
        assert_close(&text, expected.total, &r.name);

        assert_eq!(
            wb.value(DASHBOARD_SHEET, CellAddr::new(0, 9)),
            Value::Text(expected.grade.label().to_string()),
            "{}",
            r.name
        );
        assert_eq!(
            wb.value(DASHBOARD_SHEET, CellAddr::new(6, 9)),
            Value::Text(engine.status_label(&expected).to_string()),
            "{}",
            r.name
        );
        assert_eq!(
            wb.value(DASHBOARD_SHEET, CellAddr::new(1, 5)),
            Value::Text(r.id.clone())
        );
    }
}

#[test]
fn sample_records_match_engine() {
    check_all(&sample());
}

#[test]
fn tier_boundaries_match_engine() {
    check_all(&boundary_records());
}

fn engine_for(config: ScoringConfig) -> ScoringEngine {
    config.validate().unwrap();
    ScoringEngine::new(config)
}

/// Records with zero, negative and positive values in the fields that
/// are not sanitized at construction.
fn signed_records() -> Vec<MetricsRecord> {
    let mk = |id: &str, profit: f64, business: f64| {
        MetricsRecord::builder(id, format!("Signed {id}"), "Edge")
            .deposits(80.0, 100.0)
            .advances(0.0, 100.0)
            .npa_percent(4.0)
            .profit_per_staff(profit)
            .business_per_staff(business)
            .casa_percent(35.0)
            .cd_ratio(70.0)
            .build()
            .unwrap()
    };
    vec![
        mk("N1", -2.0, 10.0),
        mk("N2", 3.0, 0.0),
        mk("N3", 4.0, -5.0),
        mk("N4", 6.0, 4.0),
        mk("N5", 0.0, 0.0),
    ]
}

#[test]
fn historical_branch_profile_table_matches_engine() {
    let config = ScoringConfig::from_yaml_str(include_str!(
        "../../../data/scoring/branch-profile-config.yml"
    ))
    .unwrap();
    assert_eq!(config.criteria.len(), 4);
    let engine = engine_for(config);
    check_with(&sample(), &engine);
    check_with(&boundary_records(), &engine);
}

#[test]
fn reduced_profile_matches_engine() {
    let mut config = ScoringConfig::canonical();
    config.criteria.retain(|c| c.id != "profitability" && c.id != "cd_balance");
    config.max_total = config.sum_of_caps();
    config.grade_cutoffs.a_plus = 72.0;
    config.grade_cutoffs.a = 64.0;
    config.grade_cutoffs.b = 52.0;
    config.grade_cutoffs.c = 40.0;
    config.status_cutoffs.excellent = 64.0;
    config.status_cutoffs.good = 52.0;
    let engine = engine_for(config);
    check_with(&sample(), &engine);
    check_with(&signed_records(), &engine);
}

#[test]
fn achievement_on_signed_metrics_matches_engine() {
    let mut config = ScoringConfig::canonical();
    config.criteria[0].rule = CriterionRule::Achievement {
        actual: Metric::ProfitPerStaff,
        target: Metric::BusinessPerStaff,
    };
    let engine = engine_for(config);
    let records = signed_records();
    check_with(&records, &engine);

    // negative profit and a zero target both score nothing
    for id in ["N1", "N2", "N3", "N5"] {
        let r = records.iter().find(|r| r.id == id).unwrap();
        assert_eq!(engine.score(r).components[0].score, 0.0, "{id}");
    }
}

#[test]
fn each_component_matches_engine() {
    let records = sample();
    let engine = ScoringEngine::default();
    let mut wb = build_workbook(&records, &engine).unwrap();
    let compiled = compile(
        &LayoutBindings::standard(records.len()),
        engine.config(),
    )
    .unwrap();

    for r in &records {
        select(&mut wb, &r.name);
        let expected = engine.score(r);
        for ((id, expr), component) in compiled.components.iter().zip(&expected.components) {
            assert_eq!(id, &component.criterion);
            let v = wb.evaluate(DASHBOARD_SHEET, expr);
            assert_close(&v, component.score, &format!("{} {}", r.name, id));
        }
    }
}

#[test]
fn exported_json_reloads_and_recalculates() {
    let records = sample();
    let engine = ScoringEngine::default();
    let wb = build_workbook(&records, &engine).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dashboard.json");
    std::fs::write(&path, wb.to_json().unwrap()).unwrap();
    let mut back = Workbook::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(back, wb);

    let warangal = records.iter().find(|r| r.name == "Warangal").unwrap();
    select(&mut back, "Warangal");
    assert_close(
        &back.value(DASHBOARD_SHEET, score_cell()),
        engine.score(warangal).total,
        "Warangal",
    );
}

#[test]
fn selector_list_reads_search_column() {
    let records = sample();
    let mut wb = build_workbook(&records, &ScoringEngine::default()).unwrap();
    let dash = wb.sheet(DASHBOARD_SHEET).unwrap();
    assert_eq!(
        render(&vista_formula::Expr::Range(dash.validations[0].source.clone())),
        "=_Data!$N$2:$N$9"
    );

    select(&mut wb, "vi");
    let matches: Vec<Value> = (2..=9)
        .map(|row| wb.value(DATA_SHEET, CellAddr::new(13, row)))
        .filter(|v| v != &Value::Text(String::new()))
        .collect();
    assert_eq!(matches, vec![Value::Text("Vijayawada".into()), Value::Text("Visakhapatnam".into())]);
}
