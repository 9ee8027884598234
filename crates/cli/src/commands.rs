//! Subcommand bodies. Output goes to a caller-supplied writer.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use vista_compute::{
    diagnose, executive_summary, key_takeaways, risks_and_focus, AnomalyDetector, ScoreResult,
    ScoringEngine, Severity,
};
use vista_core::{Config, Metric, MetricsRecord, VistaError};
use vista_formula::{build_workbook, compile, render, Expr, LayoutBindings};

#[derive(Serialize)]
struct ScoredBranch<'a> {
    id: &'a str,
    name: &'a str,
    zone: &'a str,
    status: &'static str,
    #[serde(flatten)]
    result: ScoreResult,
}

pub fn score(records: &[MetricsRecord], engine: &ScoringEngine, json: bool, out: &mut dyn Write) -> Result<()> {
    let rows: Vec<ScoredBranch> = engine
        .score_all(records)
        .into_iter()
        .map(|(r, result)| ScoredBranch {
            id: &r.id,
            name: &r.name,
            zone: &r.zone,
            status: engine.status_label(&result),
            result,
        })
        .collect();

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
        return Ok(());
    }

    writeln!(out, "{:<8} {:<18} {:<16} {:>6}  {:<5} {}", "ID", "Branch", "Zone", "Score", "Grade", "Status")?;
    for row in &rows {
        writeln!(
            out,
            "{:<8} {:<18} {:<16} {:>6.1}  {:<5} {}",
            row.id, row.name, row.zone, row.result.total, row.result.grade, row.status
        )?;
    }
    Ok(())
}

/// Look a branch up by id or (case-insensitive) name.
pub fn find_branch<'a>(records: &'a [MetricsRecord], key: &str) -> Result<&'a MetricsRecord, VistaError> {
    records
        .iter()
        .find(|r| r.id.eq_ignore_ascii_case(key) || r.name.eq_ignore_ascii_case(key))
        .ok_or_else(|| VistaError::BranchNotFound(key.to_string()))
}

pub fn branch_report(record: &MetricsRecord, engine: &ScoringEngine, out: &mut dyn Write) -> Result<()> {
    let result = engine.score(record);
    writeln!(out, "{} ({}, {})", record.name, record.id, record.zone)?;
    writeln!(
        out,
        "Score {:.1}  Grade {}  Status {}",
        result.total,
        result.grade,
        engine.status_label(&result)
    )?;
    for c in &result.components {
        writeln!(out, "  {:<22} {:>5.1} / {}", c.label, c.score, c.cap)?;
    }

    let d = diagnose(record);
    for (severity, heading) in [
        (Severity::Critical, "Critical"),
        (Severity::Warning, "Warnings"),
        (Severity::Success, "Strengths"),
    ] {
        let items: Vec<_> = d.by_severity(severity).collect();
        if items.is_empty() {
            continue;
        }
        writeln!(out, "\n{heading}:")?;
        for i in items {
            writeln!(out, "  - {}: {}", i.title, i.detail)?;
        }
    }
    if !d.recommendations.is_empty() {
        writeln!(out, "\nRecommendations:")?;
        for (n, rec) in d.recommendations.iter().enumerate() {
            writeln!(out, "  {}. {rec}", n + 1)?;
        }
    }
    writeln!(out, "\nPriorities:")?;
    for p in &d.priorities {
        writeln!(out, "  {} {:<18} gap {:<10} {} ({})", p.level, p.area.label(), p.gap, p.action, p.timeline)?;
    }
    writeln!(out, "\n{}", executive_summary(record))?;
    Ok(())
}

/// Branch profile: headline score, key takeaways, risks and focus areas.
pub fn profile(record: &MetricsRecord, engine: &ScoringEngine, out: &mut dyn Write) -> Result<()> {
    let result = engine.score(record);
    writeln!(out, "BRANCH PROFILE: {} ({}, {} zone)", record.name, record.id, record.zone)?;
    writeln!(
        out,
        "Overall Grade: {}  |  Score: {:.1}/{}",
        result.grade,
        result.total,
        engine.config().max_total
    )?;

    writeln!(out, "\nExecutive summary:\n  {}", executive_summary(record))?;
    writeln!(out, "\nKey takeaways:")?;
    for t in key_takeaways(record) {
        writeln!(out, "  - {t}")?;
    }
    let p = risks_and_focus(record);
    writeln!(out, "\nRisks:")?;
    for r in &p.risks {
        writeln!(out, "  - {r}")?;
    }
    writeln!(out, "\nFocus areas:")?;
    for f in &p.focus {
        writeln!(out, "  - {f}")?;
    }
    Ok(())
}

pub fn anomalies(
    records: &[MetricsRecord],
    detector: &AnomalyDetector,
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let found = detector.detect(records);
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&found)?)?;
        return Ok(());
    }
    if found.is_empty() {
        writeln!(out, "No outliers beyond |z| > {}", detector.z_threshold)?;
        return Ok(());
    }
    for a in &found {
        writeln!(
            out,
            "{:<18} {:<22} {:>9.2}  mean {:>9.2}  z {:>+6.2}  {}",
            a.entity_name,
            a.metric.label(),
            a.value,
            a.mean,
            a.z_score,
            a.direction
        )?;
    }
    Ok(())
}

/// Parse `--metric` keys; empty means the detector defaults.
pub fn parse_metrics(keys: &[String]) -> Result<Vec<Metric>> {
    if keys.is_empty() {
        return Ok(Metric::ANOMALY_DEFAULTS.to_vec());
    }
    keys.iter()
        .map(|k| Metric::from_key(k).with_context(|| format!("unknown metric '{k}'")))
        .collect()
}

pub fn formula(rows: usize, engine: &ScoringEngine, out: &mut dyn Write) -> Result<()> {
    let compiled = compile(&LayoutBindings::standard(rows), engine.config())?;
    let mut line = |name: &str, expr: &Expr| writeln!(out, "{name:<14} {}", render(expr));

    line("score", &compiled.score)?;
    for (id, expr) in &compiled.components {
        line(id.as_str(), expr)?;
    }
    line("grade", &compiled.grade)?;
    line("status", &compiled.status)?;
    line("display", &compiled.score_display)?;
    line("branch_id", &compiled.id_lookup)?;
    line("zone", &compiled.zone_lookup)?;
    line("selector", &Expr::Range(compiled.selector_source.clone()))?;
    for row in &compiled.metric_rows {
        line(format!("{}.actual", row.criterion).as_str(), &row.actual)?;
        line(format!("{}.status", row.criterion).as_str(), &row.status)?;
    }
    Ok(())
}

pub fn export(records: &[MetricsRecord], engine: &ScoringEngine, path: &Path) -> Result<()> {
    let workbook = build_workbook(records, engine)?;
    std::fs::write(path, workbook.to_json()?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), sheets = workbook.sheets.len(), "workbook exported");
    Ok(())
}

pub fn show_config(config: &Config, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(&config.redacted_summary())?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vista_core::parse_records;
    use vista_formula::{CellAddr, Value, Workbook};

    fn sample() -> Vec<MetricsRecord> {
        parse_records(include_str!("../../../data/sample/branches.json")).unwrap()
    }

    fn run(f: impl FnOnce(&mut dyn Write) -> Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn score_table_lists_every_branch() {
        let text = run(|out| score(&sample(), &ScoringEngine::default(), false, out));
        assert_eq!(text.lines().count(), 9);
        let warangal = text.lines().find(|l| l.contains("Warangal")).unwrap();
        assert!(warangal.contains("59.1") && warangal.contains("Review"), "{warangal}");
    }

    #[test]
    fn score_json_flattens_result() {
        let text = run(|out| score(&sample(), &ScoringEngine::default(), true, out));
        let rows: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(rows[0]["id"], "B1001");
        assert_eq!(rows[0]["grade"], "A+");
        assert_eq!(rows[0]["components"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn branch_lookup_by_name_or_id() {
        let records = sample();
        assert_eq!(find_branch(&records, "warangal").unwrap().id, "B1005");
        assert_eq!(find_branch(&records, "b2003").unwrap().name, "Guntur");
        assert!(matches!(find_branch(&records, "Atlantis"), Err(VistaError::BranchNotFound(_))));
    }

    #[test]
    fn branch_report_includes_priorities() {
        let records = sample();
        let text = run(|out| branch_report(find_branch(&records, "Warangal")?, &ScoringEngine::default(), out));
        assert!(text.contains("Critical:"));
        assert!(text.contains("P1"));
    }

    #[test]
    fn profile_lists_takeaways_risks_and_focus() {
        let records = sample();
        let text = run(|out| profile(find_branch(&records, "B1005")?, &ScoringEngine::default(), out));
        assert!(text.starts_with("BRANCH PROFILE: Warangal (B1005"), "{text}");
        assert!(text.contains("Score: 59.1/100"), "{text}");
        assert!(text.contains("  - High NPA posing asset quality risk."));
        assert!(text.contains("  - Immediate recovery actions and SMA monitoring."));

        let text = run(|out| profile(find_branch(&records, "Mansoorabad")?, &ScoringEngine::default(), out));
        assert!(text.contains("  - No major risk drivers identified."), "{text}");
    }

    #[test]
    fn anomalies_at_lower_threshold() {
        let detector = AnomalyDetector::new(1.7).with_metrics(parse_metrics(&["npa_percent".into()]).unwrap());
        let text = run(|out| anomalies(&sample(), &detector, false, out));
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("Warangal"));
        assert!(parse_metrics(&["bogus".into()]).is_err());
    }

    #[test]
    fn formula_listing_starts_with_score() {
        let text = run(|out| formula(8, &ScoringEngine::default(), out));
        assert!(text.lines().next().unwrap().starts_with("score          =ROUND("));
        assert!(text.contains("selector       =_Data!$N$2:$N$9"));
    }

    #[test]
    fn export_writes_reloadable_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.json");
        export(&sample(), &ScoringEngine::default(), &path).unwrap();

        let wb = Workbook::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(wb.sheets.len(), 3);
        assert!(matches!(
            wb.value("Dashboard", CellAddr::new(2, 9)),
            Value::Number(_)
        ));
    }
}
