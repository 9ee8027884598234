//! Assemble the portable dashboard workbook for a set of branches.

use tracing::info;

use vista_compute::ScoringEngine;
use vista_core::{MetricsRecord, VistaError};

use crate::address::CellAddr;
use crate::compiler::{compile, search_assist};
use crate::error::FormulaError;
use crate::layout::{LayoutBindings, SEARCH_HEADER, SUMMARY_SHEET};
use crate::workbook::{ListValidation, Sheet, Workbook};

const SUMMARY_HEADERS: [&str; 9] = [
    "Branch",
    "Zone",
    "Deposits %",
    "Advances %",
    "NPA %",
    "CASA %",
    "Score",
    "Grade",
    "Status",
];

/// Build the three-sheet workbook: visible dashboard, hidden data sheet and
/// a natively computed summary.
pub fn build_workbook(
    records: &[MetricsRecord],
    engine: &ScoringEngine,
) -> Result<Workbook, FormulaError> {
    if records.is_empty() {
        return Err(FormulaError::EmptyDataset);
    }
    vista_core::ensure_unique(records).map_err(|e| match e {
        VistaError::InvalidRecord { id, reason } => FormulaError::AmbiguousKey { id, reason },
        other => FormulaError::AmbiguousKey {
            id: String::new(),
            reason: other.to_string(),
        },
    })?;

    let mut sorted: Vec<&MetricsRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let layout = LayoutBindings::standard(sorted.len());
    let data = data_sheet(&layout, &sorted);
    let dashboard = dashboard_sheet(&layout, engine, sorted[0])?;
    let summary = summary_sheet(engine, &sorted);

    info!(branches = sorted.len(), "built dashboard workbook");
    Ok(Workbook {
        sheets: vec![dashboard, data, summary],
    })
}

fn data_sheet(layout: &LayoutBindings, rows: &[&MetricsRecord]) -> Sheet {
    let mut sheet = Sheet::new(layout.data_sheet.clone());
    sheet.hidden = true;

    sheet.set_value(CellAddr::new(layout.id_column, 1), "Branch_ID");
    sheet.set_value(CellAddr::new(layout.key_column, 1), "Branch_Name");
    sheet.set_value(CellAddr::new(layout.zone_column, 1), "Zone");
    for (metric, column) in &layout.metric_columns {
        sheet.set_value(CellAddr::new(*column, 1), header_for(*metric));
    }
    sheet.set_value(CellAddr::new(layout.search_column, 1), SEARCH_HEADER);

    for (i, r) in rows.iter().enumerate() {
        let row = layout.first_row + i as u32;
        sheet.set_value(CellAddr::new(layout.id_column, row), r.id.as_str());
        sheet.set_value(CellAddr::new(layout.key_column, row), r.name.as_str());
        sheet.set_value(CellAddr::new(layout.zone_column, row), r.zone.as_str());
        for (metric, column) in &layout.metric_columns {
            sheet.set_value(CellAddr::new(*column, row), metric.value(r));
        }
        sheet.set_formula(
            CellAddr::new(layout.search_column, row),
            search_assist(layout, row),
        );
    }
    sheet
}

/// Data-sheet header for a stored metric.
fn header_for(metric: vista_core::Metric) -> &'static str {
    use vista_core::Metric::*;
    match metric {
        TotalDeposits => "Total_Deposits",
        DepositTarget => "Deposit_Target",
        Advances => "Advances",
        AdvanceTarget => "Advance_Target",
        NpaPercent => "NPA_Percent",
        ProfitPerStaff => "Profit_Per_Staff",
        CasaPercent => "CASA_Percent",
        CdRatio => "CD_Ratio",
        BusinessPerStaff => "Business_Per_Staff",
        StaffCount => "Staff_Count",
        DepositAchievement => "Deposit_Achievement",
        AdvanceAchievement => "Advance_Achievement",
    }
}

fn dashboard_sheet(
    layout: &LayoutBindings,
    engine: &ScoringEngine,
    first: &MetricsRecord,
) -> Result<Sheet, FormulaError> {
    let compiled = compile(layout, engine.config())?;
    let mut sheet = Sheet::new(layout.dashboard_sheet.clone());
    let at = |col: &str, row: u32| CellAddr::parse(&format!("{col}{row}"));

    sheet.set_value(at("A", 1)?, "BANKVISTA DYNAMIC DASHBOARD");
    sheet.set_value(at("A", 3)?, "Type Branch Name:");
    sheet.set_value(layout.selector, first.name.as_str());
    sheet.set_value(at("B", 4)?, "Type a few letters, then pick from the list");
    sheet.validations.push(ListValidation {
        cell: layout.selector,
        source: compiled.selector_source.clone(),
        allow_blank: false,
    });

    sheet.set_value(at("A", 5)?, "Branch ID:");
    sheet.set_formula(at("B", 5)?, compiled.id_lookup);
    sheet.set_value(at("A", 6)?, "Zone:");
    sheet.set_formula(at("B", 6)?, compiled.zone_lookup);

    sheet.set_value(at("A", 8)?, "GRADE");
    sheet.set_formula(at("A", 9)?, compiled.grade);
    sheet.set_formula(layout.score_cell, compiled.score);
    sheet.hide_cell(layout.score_cell);
    sheet.set_value(at("D", 8)?, "SCORE");
    sheet.set_formula(at("D", 9)?, compiled.score_display);
    sheet.set_value(at("G", 8)?, "STATUS");
    sheet.set_formula(at("G", 9)?, compiled.status);

    sheet.set_value(at("A", 11)?, "KEY FINANCIAL METRICS");
    let header_row = layout.metric_table_row - 1;
    for (i, h) in ["Metric", "Actual", "Target", "Gap", "Achievement %", "Status"]
        .iter()
        .enumerate()
    {
        sheet.set_value(CellAddr::new(i as u32, header_row), *h);
    }
    for row in compiled.metric_rows {
        let r = row.row;
        sheet.set_value(CellAddr::new(0, r), row.label);
        sheet.set_formula(CellAddr::new(1, r), row.actual);
        match row.target {
            crate::expr::Expr::Number(n) => sheet.set_value(CellAddr::new(2, r), n),
            other => sheet.set_formula(CellAddr::new(2, r), other),
        }
        if let Some(gap) = row.gap {
            sheet.set_formula(CellAddr::new(3, r), gap);
        }
        if let Some(ach) = row.achievement {
            sheet.set_formula(CellAddr::new(4, r), ach);
        }
        sheet.set_formula(CellAddr::new(5, r), row.status);
    }

    Ok(sheet)
}

fn summary_sheet(engine: &ScoringEngine, rows: &[&MetricsRecord]) -> Sheet {
    let mut sheet = Sheet::new(SUMMARY_SHEET);
    sheet.set_value(CellAddr::new(0, 1), "ALL BRANCHES PERFORMANCE SUMMARY");
    for (i, h) in SUMMARY_HEADERS.iter().enumerate() {
        sheet.set_value(CellAddr::new(i as u32, 3), *h);
    }

    for (i, r) in rows.iter().enumerate() {
        let row = 4 + i as u32;
        let result = engine.score(r);
        sheet.set_value(CellAddr::new(0, row), r.name.as_str());
        sheet.set_value(CellAddr::new(1, row), r.zone.as_str());
        sheet.set_value(CellAddr::new(2, row), round1(r.deposit_achievement_pct()));
        sheet.set_value(CellAddr::new(3, row), round1(r.advance_achievement_pct()));
        sheet.set_value(CellAddr::new(4, row), r.npa_percent);
        sheet.set_value(CellAddr::new(5, row), r.casa_percent);
        sheet.set_value(CellAddr::new(6, row), result.total);
        sheet.set_value(CellAddr::new(7, row), result.grade.label());
        sheet.set_value(CellAddr::new(8, row), engine.status_label(&result));
    }
    sheet
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Value;
    use crate::layout::{DASHBOARD_SHEET, DATA_SHEET};

    fn records() -> Vec<MetricsRecord> {
        vec![
            MetricsRecord::builder("B2", "Zeta", "South")
                .deposits(90.0, 100.0)
                .advances(100.0, 100.0)
                .npa_percent(4.0)
                .profit_per_staff(3.5)
                .casa_percent(31.0)
                .cd_ratio(85.0)
                .build()
                .unwrap(),
            MetricsRecord::builder("B1", "Alpha", "North")
                .deposits(100.0, 100.0)
                .advances(100.0, 100.0)
                .npa_percent(1.0)
                .profit_per_staff(6.0)
                .casa_percent(45.0)
                .cd_ratio(70.0)
                .build()
                .unwrap(),
        ]
    }

    #[test]
    fn data_sheet_is_hidden_and_sorted() {
        let wb = build_workbook(&records(), &ScoringEngine::default()).unwrap();
        assert_eq!(wb.sheets.len(), 3);
        let data = wb.sheet(DATA_SHEET).unwrap();
        assert!(data.hidden);
        assert_eq!(
            wb.value(DATA_SHEET, CellAddr::new(1, 2)),
            Value::Text("Alpha".into())
        );
        assert_eq!(
            wb.value(DATA_SHEET, CellAddr::new(13, 1)),
            Value::Text("SearchMatch".into())
        );
    }

    #[test]
    fn dashboard_defaults_to_first_branch() {
        let wb = build_workbook(&records(), &ScoringEngine::default()).unwrap();
        assert_eq!(wb.value(DASHBOARD_SHEET, CellAddr::new(1, 5)), Value::Text("B1".into()));
        assert_eq!(wb.value(DASHBOARD_SHEET, CellAddr::new(2, 9)), Value::Number(100.0));
        assert_eq!(wb.value(DASHBOARD_SHEET, CellAddr::new(0, 9)), Value::Text("A+".into()));
        assert_eq!(
            wb.value(DASHBOARD_SHEET, CellAddr::new(3, 9)),
            Value::Text("100/100".into())
        );
        let dash = wb.sheet(DASHBOARD_SHEET).unwrap();
        assert!(dash.get(CellAddr::new(2, 9)).unwrap().hidden);
        assert_eq!(dash.validations.len(), 1);
    }

    #[test]
    fn switching_selector_updates_everything() {
        let mut wb = build_workbook(&records(), &ScoringEngine::default()).unwrap();
        wb.set_value(DASHBOARD_SHEET, CellAddr::new(1, 3), "Zeta").unwrap();
        // 22.5 + 25 + 12 + 10 + 5 + 2
        assert_eq!(wb.value(DASHBOARD_SHEET, CellAddr::new(2, 9)), Value::Number(76.5));
        assert_eq!(wb.value(DASHBOARD_SHEET, CellAddr::new(0, 9)), Value::Text("B".into()));
        assert_eq!(wb.value(DASHBOARD_SHEET, CellAddr::new(6, 9)), Value::Text("Good".into()));
        assert_eq!(wb.value(DASHBOARD_SHEET, CellAddr::new(5, 13)), Value::Text("Gap".into()));
        assert_eq!(wb.value(DASHBOARD_SHEET, CellAddr::new(3, 13)), Value::Number(-10.0));
    }

    #[test]
    fn search_column_filters_on_partial_text() {
        let mut wb = build_workbook(&records(), &ScoringEngine::default()).unwrap();
        wb.set_value(DASHBOARD_SHEET, CellAddr::new(1, 3), "et").unwrap();
        assert_eq!(wb.value(DATA_SHEET, CellAddr::new(13, 2)), Value::Text(String::new()));
        assert_eq!(wb.value(DATA_SHEET, CellAddr::new(13, 3)), Value::Text("Zeta".into()));
    }

    #[test]
    fn summary_uses_native_engine() {
        let wb = build_workbook(&records(), &ScoringEngine::default()).unwrap();
        assert_eq!(wb.value(SUMMARY_SHEET, CellAddr::new(6, 5)), Value::Number(76.5));
        assert_eq!(wb.value(SUMMARY_SHEET, CellAddr::new(8, 4)), Value::Text("Excellent".into()));
    }

    #[test]
    fn names_differing_only_in_case_are_rejected() {
        let mut rows = records();
        rows[0].name = "alpha".into();
        let err = build_workbook(&rows, &ScoringEngine::default()).unwrap_err();
        assert!(matches!(err, FormulaError::AmbiguousKey { ref id, .. } if id == "B1"), "{err:?}");
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(
            build_workbook(&[], &ScoringEngine::default()).unwrap_err(),
            FormulaError::EmptyDataset
        );
    }
}
