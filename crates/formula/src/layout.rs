//! Where things live in the exported workbook.

use vista_core::Metric;

use crate::address::{CellAddr, CellRef, RangeRef};
use crate::error::FormulaError;

pub const DATA_SHEET: &str = "_Data";
pub const DASHBOARD_SHEET: &str = "Dashboard";
pub const SUMMARY_SHEET: &str = "All Branches Summary";
pub const SEARCH_HEADER: &str = "SearchMatch";

/// Data-sheet columns in header order, after id, name and zone.
pub const DATA_METRICS: [Metric; 10] = [
    Metric::TotalDeposits,
    Metric::DepositTarget,
    Metric::Advances,
    Metric::AdvanceTarget,
    Metric::NpaPercent,
    Metric::ProfitPerStaff,
    Metric::CasaPercent,
    Metric::CdRatio,
    Metric::BusinessPerStaff,
    Metric::StaffCount,
];

/// Sheet names, data columns and dashboard cells the compiler binds to.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBindings {
    pub data_sheet: String,
    pub dashboard_sheet: String,
    /// First data row under the header.
    pub first_row: u32,
    pub last_row: u32,
    pub id_column: u32,
    /// Lookup key (branch name).
    pub key_column: u32,
    pub zone_column: u32,
    pub metric_columns: Vec<(Metric, u32)>,
    pub search_column: u32,
    /// Selector cell on the dashboard.
    pub selector: CellAddr,
    /// Hidden cell holding the compiled score.
    pub score_cell: CellAddr,
    /// Dashboard row of the first metric-table entry.
    pub metric_table_row: u32,
}

impl LayoutBindings {
    /// The standard layout for `rows` records: `A` id, `B` name, `C` zone,
    /// then [`DATA_METRICS`] from `D`, then the search-assist column.
    pub fn standard(rows: usize) -> Self {
        let metric_columns: Vec<(Metric, u32)> = DATA_METRICS
            .iter()
            .enumerate()
            .map(|(i, m)| (*m, 3 + i as u32))
            .collect();
        let search_column = 3 + DATA_METRICS.len() as u32;
        Self {
            data_sheet: DATA_SHEET.into(),
            dashboard_sheet: DASHBOARD_SHEET.into(),
            first_row: 2,
            last_row: 1 + rows.max(1) as u32,
            id_column: 0,
            key_column: 1,
            zone_column: 2,
            metric_columns,
            search_column,
            selector: CellAddr::new(1, 3),
            score_cell: CellAddr::new(2, 9),
            metric_table_row: 13,
        }
    }

    pub fn column_of(&self, metric: Metric) -> Result<u32, FormulaError> {
        self.metric_columns
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, c)| *c)
            .ok_or(FormulaError::UnboundMetric(metric))
    }

    pub fn data_column(&self, column: u32) -> RangeRef {
        RangeRef::whole_column(self.data_sheet.clone(), column)
    }

    /// Selector as seen from dashboard formulas.
    pub fn selector_local(&self) -> CellRef {
        CellRef::local(self.selector)
    }

    /// Selector as seen from the data sheet.
    pub fn selector_qualified(&self) -> CellRef {
        CellRef::on(self.dashboard_sheet.clone(), self.selector)
    }

    pub fn score_local(&self) -> CellRef {
        CellRef::local(self.score_cell)
    }

    /// The helper column the selector's list validation reads.
    pub fn search_range(&self) -> RangeRef {
        RangeRef::bounded(
            self.data_sheet.clone(),
            self.search_column,
            self.first_row,
            self.last_row,
        )
    }
}
