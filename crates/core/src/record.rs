//! Branch metrics snapshot, the typed record every other crate consumes.
//!
//! Records are validated exactly once, at construction. Consumers can rely
//! on every numeric field being finite and every target being positive.

use serde::{Deserialize, Serialize};

use crate::error::VistaError;

/// Default used for a missing or non-positive target, so achievement
/// ratios never divide by zero.
pub const DEFAULT_TARGET: f64 = 1.0;

/// Characters spreadsheet MATCH and SEARCH read as wildcards. Names are
/// lookup keys on the dashboard, so they may not contain these.
pub const LOOKUP_WILDCARDS: [char; 3] = ['*', '?', '~'];

/// One branch's metric snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMetricsRecord")]
pub struct MetricsRecord {
    pub id: String,
    pub name: String,
    pub zone: String,
    /// Total deposits (crores).
    pub total_deposits: f64,
    pub deposit_target: f64,
    /// Total advances (crores).
    pub advances: f64,
    pub advance_target: f64,
    pub npa_percent: f64,
    /// Profit per staff (lakhs).
    pub profit_per_staff: f64,
    pub casa_percent: f64,
    pub cd_ratio: f64,
    /// Business per staff (crores).
    pub business_per_staff: f64,
    pub staff_count: u32,
}

impl MetricsRecord {
    /// Start building a record for the given identity.
    pub fn builder(
        id: impl Into<String>,
        name: impl Into<String>,
        zone: impl Into<String>,
    ) -> MetricsRecordBuilder {
        MetricsRecordBuilder {
            raw: RawMetricsRecord {
                id: id.into(),
                name: name.into(),
                zone: zone.into(),
                ..RawMetricsRecord::default()
            },
        }
    }

    /// Deposit achievement as a percentage of target.
    pub fn deposit_achievement_pct(&self) -> f64 {
        self.total_deposits / self.deposit_target * 100.0
    }

    /// Advance achievement as a percentage of target.
    pub fn advance_achievement_pct(&self) -> f64 {
        self.advances / self.advance_target * 100.0
    }

    pub fn deposit_gap(&self) -> f64 {
        self.deposit_target - self.total_deposits
    }

    pub fn advance_gap(&self) -> f64 {
        self.advance_target - self.advances
    }
}

// ── Raw (unvalidated) form ────────────────────────────────────────

/// Wire form of a record. Field names follow the branch sheet headers
/// (`Branch_Name`, `NPA_Percent`, ...) with snake_case aliases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMetricsRecord {
    #[serde(rename = "Branch_ID", alias = "id", alias = "branch_id")]
    pub id: String,
    #[serde(rename = "Branch_Name", alias = "name", alias = "branch_name")]
    pub name: String,
    #[serde(rename = "Zone", alias = "zone", default)]
    pub zone: String,
    #[serde(rename = "Total_Deposits", alias = "total_deposits", default)]
    pub total_deposits: f64,
    #[serde(rename = "Deposit_Target", alias = "deposit_target", default)]
    pub deposit_target: Option<f64>,
    #[serde(rename = "Advances", alias = "advances", default)]
    pub advances: f64,
    #[serde(rename = "Advance_Target", alias = "advance_target", default)]
    pub advance_target: Option<f64>,
    #[serde(rename = "NPA_Percent", alias = "npa_percent", default)]
    pub npa_percent: f64,
    #[serde(rename = "Profit_Per_Staff", alias = "profit_per_staff", default)]
    pub profit_per_staff: f64,
    #[serde(rename = "CASA_Percent", alias = "casa_percent", default)]
    pub casa_percent: f64,
    #[serde(rename = "CD_Ratio", alias = "cd_ratio", default)]
    pub cd_ratio: f64,
    #[serde(rename = "Business_Per_Staff", alias = "business_per_staff", default)]
    pub business_per_staff: f64,
    #[serde(rename = "Staff_Count", alias = "staff_count", default)]
    pub staff_count: u32,
}

impl TryFrom<RawMetricsRecord> for MetricsRecord {
    type Error = VistaError;

    fn try_from(raw: RawMetricsRecord) -> Result<Self, Self::Error> {
        let id = raw.id.trim().to_string();
        let name = raw.name.trim().to_string();
        if id.is_empty() {
            return Err(VistaError::InvalidRecord {
                id: name,
                reason: "branch id is empty".into(),
            });
        }
        if name.is_empty() {
            return Err(VistaError::InvalidRecord {
                id,
                reason: "branch name is empty".into(),
            });
        }
        if let Some(c) = name.chars().find(|c| LOOKUP_WILDCARDS.contains(c)) {
            return Err(VistaError::InvalidRecord {
                id,
                reason: format!("branch name contains lookup wildcard '{c}'"),
            });
        }

        let checked = [
            ("total_deposits", raw.total_deposits),
            ("advances", raw.advances),
            ("npa_percent", raw.npa_percent),
            ("profit_per_staff", raw.profit_per_staff),
            ("casa_percent", raw.casa_percent),
            ("cd_ratio", raw.cd_ratio),
            ("business_per_staff", raw.business_per_staff),
        ];
        for (field, value) in checked {
            if !value.is_finite() {
                return Err(VistaError::InvalidRecord {
                    id,
                    reason: format!("{} is not a finite number", field),
                });
            }
        }

        for (field, value) in [("total_deposits", raw.total_deposits), ("advances", raw.advances)] {
            if value < 0.0 {
                return Err(VistaError::InvalidRecord {
                    id,
                    reason: format!("{} is negative", field),
                });
            }
        }

        Ok(Self {
            id,
            name,
            zone: raw.zone.trim().to_string(),
            total_deposits: raw.total_deposits,
            deposit_target: sanitize_target(raw.deposit_target),
            advances: raw.advances,
            advance_target: sanitize_target(raw.advance_target),
            npa_percent: raw.npa_percent,
            profit_per_staff: raw.profit_per_staff,
            casa_percent: raw.casa_percent,
            cd_ratio: raw.cd_ratio,
            business_per_staff: raw.business_per_staff,
            staff_count: raw.staff_count,
        })
    }
}

impl From<MetricsRecord> for RawMetricsRecord {
    fn from(r: MetricsRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            zone: r.zone,
            total_deposits: r.total_deposits,
            deposit_target: Some(r.deposit_target),
            advances: r.advances,
            advance_target: Some(r.advance_target),
            npa_percent: r.npa_percent,
            profit_per_staff: r.profit_per_staff,
            casa_percent: r.casa_percent,
            cd_ratio: r.cd_ratio,
            business_per_staff: r.business_per_staff,
            staff_count: r.staff_count,
        }
    }
}

fn sanitize_target(target: Option<f64>) -> f64 {
    match target {
        Some(t) if t.is_finite() && t > 0.0 => t,
        _ => DEFAULT_TARGET,
    }
}

// ── Builder ───────────────────────────────────────────────────────

/// Fluent builder; validation happens in [`MetricsRecordBuilder::build`].
#[derive(Debug, Clone)]
pub struct MetricsRecordBuilder {
    raw: RawMetricsRecord,
}

impl MetricsRecordBuilder {
    pub fn deposits(mut self, actual: f64, target: f64) -> Self {
        self.raw.total_deposits = actual;
        self.raw.deposit_target = Some(target);
        self
    }

    pub fn advances(mut self, actual: f64, target: f64) -> Self {
        self.raw.advances = actual;
        self.raw.advance_target = Some(target);
        self
    }

    pub fn npa_percent(mut self, v: f64) -> Self {
        self.raw.npa_percent = v;
        self
    }

    pub fn profit_per_staff(mut self, v: f64) -> Self {
        self.raw.profit_per_staff = v;
        self
    }

    pub fn casa_percent(mut self, v: f64) -> Self {
        self.raw.casa_percent = v;
        self
    }

    pub fn cd_ratio(mut self, v: f64) -> Self {
        self.raw.cd_ratio = v;
        self
    }

    pub fn business_per_staff(mut self, v: f64) -> Self {
        self.raw.business_per_staff = v;
        self
    }

    pub fn staff_count(mut self, v: u32) -> Self {
        self.raw.staff_count = v;
        self
    }

    pub fn build(self) -> Result<MetricsRecord, VistaError> {
        MetricsRecord::try_from(self.raw)
    }
}

// ── Metric ────────────────────────────────────────────────────────

/// Numeric fields addressable by name (anomaly detection, rankings, charts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalDeposits,
    DepositTarget,
    Advances,
    AdvanceTarget,
    NpaPercent,
    ProfitPerStaff,
    CasaPercent,
    CdRatio,
    BusinessPerStaff,
    StaffCount,
    DepositAchievement,
    AdvanceAchievement,
}

impl Metric {
    pub const ALL: [Metric; 12] = [
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
        Metric::DepositAchievement,
        Metric::AdvanceAchievement,
    ];

    /// Metrics scanned for outliers when the caller does not choose.
    pub const ANOMALY_DEFAULTS: [Metric; 6] = [
        Metric::NpaPercent,
        Metric::CasaPercent,
        Metric::ProfitPerStaff,
        Metric::CdRatio,
        Metric::DepositAchievement,
        Metric::AdvanceAchievement,
    ];

    pub fn value(self, r: &MetricsRecord) -> f64 {
        match self {
            Metric::TotalDeposits => r.total_deposits,
            Metric::DepositTarget => r.deposit_target,
            Metric::Advances => r.advances,
            Metric::AdvanceTarget => r.advance_target,
            Metric::NpaPercent => r.npa_percent,
            Metric::ProfitPerStaff => r.profit_per_staff,
            Metric::CasaPercent => r.casa_percent,
            Metric::CdRatio => r.cd_ratio,
            Metric::BusinessPerStaff => r.business_per_staff,
            Metric::StaffCount => f64::from(r.staff_count),
            Metric::DepositAchievement => r.deposit_achievement_pct(),
            Metric::AdvanceAchievement => r.advance_achievement_pct(),
        }
    }

    /// Stable snake_case key (matches the serde form).
    pub fn key(self) -> &'static str {
        match self {
            Metric::TotalDeposits => "total_deposits",
            Metric::DepositTarget => "deposit_target",
            Metric::Advances => "advances",
            Metric::AdvanceTarget => "advance_target",
            Metric::NpaPercent => "npa_percent",
            Metric::ProfitPerStaff => "profit_per_staff",
            Metric::CasaPercent => "casa_percent",
            Metric::CdRatio => "cd_ratio",
            Metric::BusinessPerStaff => "business_per_staff",
            Metric::StaffCount => "staff_count",
            Metric::DepositAchievement => "deposit_achievement",
            Metric::AdvanceAchievement => "advance_achievement",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::TotalDeposits => "Deposits (Cr)",
            Metric::DepositTarget => "Deposit Target (Cr)",
            Metric::Advances => "Advances (Cr)",
            Metric::AdvanceTarget => "Advance Target (Cr)",
            Metric::NpaPercent => "NPA %",
            Metric::ProfitPerStaff => "Profit/Staff (L)",
            Metric::CasaPercent => "CASA %",
            Metric::CdRatio => "CD Ratio %",
            Metric::BusinessPerStaff => "Business/Staff (Cr)",
            Metric::StaffCount => "Staff",
            Metric::DepositAchievement => "Deposit Achievement %",
            Metric::AdvanceAchievement => "Advance Achievement %",
        }
    }

    /// Direction of "good". NPA is the only metric where lower wins.
    pub fn higher_is_better(self) -> bool {
        !matches!(self, Metric::NpaPercent)
    }

    /// True for fields held directly on the record (as opposed to ratios
    /// derived from two fields). Only stored metrics have a data column.
    pub fn is_stored(self) -> bool {
        !matches!(self, Metric::DepositAchievement | Metric::AdvanceAchievement)
    }

    /// Always > 0 after validation (targets are sanitized).
    pub fn is_always_positive(self) -> bool {
        matches!(self, Metric::DepositTarget | Metric::AdvanceTarget)
    }

    /// Never < 0 after validation.
    pub fn is_never_negative(self) -> bool {
        self.is_always_positive()
            || matches!(
                self,
                Metric::TotalDeposits
                    | Metric::Advances
                    | Metric::StaffCount
                    | Metric::DepositAchievement
                    | Metric::AdvanceAchievement
            )
    }

    pub fn from_key(key: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.key() == key)
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

// ── Loading ───────────────────────────────────────────────────────

/// Parse a JSON array of records. Duplicate branch ids and names are
/// rejected.
pub fn parse_records(json: &str) -> Result<Vec<MetricsRecord>, VistaError> {
    let records: Vec<MetricsRecord> = serde_json::from_str(json)?;
    ensure_unique(&records)?;
    Ok(records)
}

/// Ids must be unique, and names unique ignoring case: the dashboard looks
/// branches up by name with a case-insensitive first-hit match.
pub fn ensure_unique(records: &[MetricsRecord]) -> Result<(), VistaError> {
    let mut ids = std::collections::HashSet::new();
    let mut names = std::collections::HashSet::new();
    for r in records {
        if !ids.insert(r.id.as_str()) {
            return Err(VistaError::InvalidRecord {
                id: r.id.clone(),
                reason: "duplicate branch id".into(),
            });
        }
        if !names.insert(r.name.trim().to_lowercase()) {
            return Err(VistaError::InvalidRecord {
                id: r.id.clone(),
                reason: format!("duplicate branch name '{}'", r.name),
            });
        }
    }
    Ok(())
}

pub fn load_records(path: &std::path::Path) -> Result<Vec<MetricsRecord>, VistaError> {
    let json = std::fs::read_to_string(path)?;
    let records = parse_records(&json)?;
    tracing::info!(path = %path.display(), count = records.len(), "loaded branch records");
    Ok(records)
}
