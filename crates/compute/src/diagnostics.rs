//! Per-branch diagnostics: graded findings, action recommendations and a
//! priority list, plus the branch-profile texts (executive summary, key
//! takeaways, risks and focus areas).

use serde::{Deserialize, Serialize};

use vista_core::MetricsRecord;

// ── Thresholds ──────────────────────────────────────────────────────

/// Achievement below this percentage is critical.
const ACHIEVEMENT_CRITICAL_PCT: f64 = 85.0;
/// Achievement below this percentage is a warning.
const ACHIEVEMENT_WARNING_PCT: f64 = 95.0;
pub const NPA_CRITICAL: f64 = 6.0;
pub const NPA_WARNING: f64 = 3.0;
const PROFIT_CRITICAL: f64 = 2.0;
const PROFIT_WARNING: f64 = 3.0;
const PROFIT_BENCHMARK: f64 = 5.0;
pub const CASA_LOW: f64 = 30.0;
pub const CASA_STRONG: f64 = 40.0;
const CD_LOW: f64 = 60.0;
const CD_HIGH: f64 = 80.0;
const PRODUCTIVITY_LOW: f64 = 50.0;
const PRODUCTIVITY_HIGH: f64 = 80.0;

// ── Types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    Deposits,
    Advances,
    Npa,
    Profitability,
    Casa,
    CdRatio,
    Productivity,
    Overall,
}

impl Area {
    pub fn label(self) -> &'static str {
        match self {
            Area::Deposits => "Deposits",
            Area::Advances => "Advances",
            Area::Npa => "NPA",
            Area::Profitability => "Profitability",
            Area::Casa => "CASA",
            Area::CdRatio => "CD Ratio",
            Area::Productivity => "Staff Productivity",
            Area::Overall => "Overall",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub severity: Severity,
    pub area: Area,
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Priority {
    /// "P1" for immediate action, "P3" for steady state.
    pub level: String,
    pub area: Area,
    pub gap: String,
    pub action: String,
    pub timeline: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub insights: Vec<Insight>,
    pub recommendations: Vec<String>,
    pub priorities: Vec<Priority>,
}

impl Diagnosis {
    pub fn by_severity(&self, severity: Severity) -> impl Iterator<Item = &Insight> {
        self.insights.iter().filter(move |i| i.severity == severity)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.by_severity(severity).count()
    }

    fn insight(&mut self, severity: Severity, area: Area, title: &str, detail: String) {
        self.insights.push(Insight {
            severity,
            area,
            title: title.to_string(),
            detail,
        });
    }

    fn recommend<I, S>(&mut self, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recommendations.extend(items.into_iter().map(Into::into));
    }

    fn urgent(&mut self, area: Area, gap: String, action: &str, timeline: &str) {
        self.priorities.push(Priority {
            level: "P1".into(),
            area,
            gap,
            action: action.into(),
            timeline: timeline.into(),
        });
    }
}

// ── Analysis ────────────────────────────────────────────────────────

/// Run every check against one record.
pub fn diagnose(r: &MetricsRecord) -> Diagnosis {
    let mut d = Diagnosis::default();
    check_achievement(&mut d, Area::Deposits, r.deposit_achievement_pct(), r.deposit_gap());
    check_achievement(&mut d, Area::Advances, r.advance_achievement_pct(), r.advance_gap());
    check_npa(&mut d, r.npa_percent);
    check_profit(&mut d, r.profit_per_staff);
    check_casa(&mut d, r.casa_percent);
    check_cd_ratio(&mut d, r.cd_ratio);
    check_productivity(&mut d, r.business_per_staff);

    if d.priorities.is_empty() {
        d.priorities.push(Priority {
            level: "P3".into(),
            area: Area::Overall,
            gap: "-".into(),
            action: "Maintain performance".into(),
            timeline: "Ongoing".into(),
        });
    }
    d
}

fn check_achievement(d: &mut Diagnosis, area: Area, pct: f64, gap: f64) {
    let shortfall = gap.abs();
    let deposits = area == Area::Deposits;
    let noun = area.label();

    if pct < ACHIEVEMENT_CRITICAL_PCT {
        let title = if deposits { "Deposits Severely Low" } else { "Advances Critical" };
        d.insight(
            Severity::Critical,
            area,
            title,
            format!("{pct:.1}% achievement ({shortfall:.1} Cr shortfall)"),
        );
        if deposits {
            d.recommend([
                format!("Mobilize {:.2} Cr daily for the next 7 days", shortfall / 7.0),
                "Launch a CASA-focused deposit campaign".into(),
                "Run customer meet programs".into(),
                "Target bulk deposits from corporates".into(),
            ]);
            d.urgent(area, format!("{shortfall:.1} Cr"), "Urgent mobilization drive", "7 days");
        } else {
            d.recommend([
                format!("Disburse {:.2} Cr daily for the next 7 days", shortfall / 7.0),
                "Focus on MSME lending".into(),
                "Run home loan campaigns".into(),
                "Fast-track sanctioned files".into(),
            ]);
            d.urgent(area, format!("{shortfall:.1} Cr"), "Aggressive disbursement", "7 days");
        }
    } else if pct < ACHIEVEMENT_WARNING_PCT {
        d.insight(
            Severity::Warning,
            area,
            &format!("{noun} Below Target"),
            format!("{pct:.1}% ({shortfall:.1} Cr gap)"),
        );
        let verb = if deposits { "Mobilize" } else { "Disburse" };
        d.recommend([format!("{verb} {:.2} Cr daily for 14 days", shortfall / 14.0)]);
    } else {
        let title = if deposits { "Deposits Excellent" } else { "Advances Strong" };
        d.insight(Severity::Success, area, title, format!("{pct:.1}% achievement"));
    }
}

fn check_npa(d: &mut Diagnosis, npa: f64) {
    if npa > NPA_CRITICAL {
        d.insight(
            Severity::Critical,
            Area::Npa,
            "NPA Critical",
            format!("{npa:.2}%, urgent action required"),
        );
        d.recommend([
            "Hold daily recovery task force meetings",
            "Initiate legal action on the top 10 defaulters",
            "Launch one-time settlement schemes",
            "Call all overdue accounts daily",
        ]);
        d.urgent(Area::Npa, format!("{npa:.1}%"), "Recovery war room", "Immediate");
    } else if npa > NPA_WARNING {
        d.insight(
            Severity::Warning,
            Area::Npa,
            "NPA Elevated",
            format!("{npa:.2}%, monitor closely"),
        );
        d.recommend(["Weekly recovery reviews"]);
    } else {
        d.insight(Severity::Success, Area::Npa, "NPA Healthy", format!("{npa:.2}%"));
    }
}

fn check_profit(d: &mut Diagnosis, profit: f64) {
    if profit < PROFIT_CRITICAL {
        d.insight(
            Severity::Critical,
            Area::Profitability,
            "Profitability Low",
            format!("{profit:.2} L per staff"),
        );
        d.recommend([
            "Increase fee-based income",
            "Cross-sell insurance and mutual funds",
            "Optimize operating costs",
        ]);
    } else if profit < PROFIT_WARNING {
        d.insight(
            Severity::Warning,
            Area::Profitability,
            "Profit Below Par",
            format!("{profit:.2} L per staff"),
        );
        d.recommend(["Focus on high-margin products"]);
    } else {
        d.insight(
            Severity::Success,
            Area::Profitability,
            "Profitability Good",
            format!("{profit:.2} L per staff"),
        );
    }
}

fn check_casa(d: &mut Diagnosis, casa: f64) {
    if casa < CASA_LOW {
        d.insight(
            Severity::Warning,
            Area::Casa,
            "CASA Low",
            format!("{casa:.1}% (target {CASA_STRONG:.0}%+)"),
        );
        d.recommend([
            "Launch a salary account campaign",
            "Offer CASA account opening incentives",
        ]);
    } else if casa >= CASA_STRONG {
        d.insight(Severity::Success, Area::Casa, "CASA Excellent", format!("{casa:.1}%"));
    }
}

fn check_cd_ratio(d: &mut Diagnosis, cd: f64) {
    if cd > CD_HIGH {
        d.insight(
            Severity::Warning,
            Area::CdRatio,
            "CD Ratio High",
            format!("{cd:.1}%, liquidity pressure"),
        );
        d.recommend(["Prioritise deposit mobilization"]);
    } else if cd < CD_LOW {
        d.insight(
            Severity::Warning,
            Area::CdRatio,
            "CD Ratio Low",
            format!("{cd:.1}%, underutilized funds"),
        );
        d.recommend(["Increase lending activity"]);
    } else {
        d.insight(Severity::Success, Area::CdRatio, "CD Ratio Optimal", format!("{cd:.1}%"));
    }
}

fn check_productivity(d: &mut Diagnosis, business_per_staff: f64) {
    if business_per_staff < PRODUCTIVITY_LOW {
        d.insight(
            Severity::Warning,
            Area::Productivity,
            "Staff Productivity Low",
            format!("{business_per_staff:.1} Cr per staff"),
        );
        d.recommend(["Staff training programs", "Individual performance targets"]);
    } else if business_per_staff >= PRODUCTIVITY_HIGH {
        d.insight(
            Severity::Success,
            Area::Productivity,
            "Staff Highly Productive",
            format!("{business_per_staff:.1} Cr per staff"),
        );
    }
}

// ── Executive summary ───────────────────────────────────────────────

/// Key takeaways for one branch as a single paragraph.
pub fn executive_summary(r: &MetricsRecord) -> String {
    let deposits_met = r.total_deposits >= r.deposit_target;
    let advances_met = r.advances >= r.advance_target;

    let mut parts = vec![format!(
        "{} ({}, {} zone) has shown {} business performance during the review period.",
        r.name,
        r.id,
        r.zone,
        if deposits_met { "strong" } else { "moderate" }
    )];

    parts.push(if deposits_met {
        "Deposit mobilisation is above target, indicating healthy customer acquisition and retention."
            .to_string()
    } else {
        "Deposit mobilisation remains below target and requires focused efforts.".to_string()
    });

    parts.push(if advances_met {
        "Advances growth is robust and supports overall balance sheet expansion.".to_string()
    } else {
        "Advances growth is lagging and needs acceleration.".to_string()
    });

    parts.push(if r.npa_percent < NPA_WARNING {
        "Asset quality remains healthy with NPAs well within acceptable limits.".to_string()
    } else if r.npa_percent < NPA_CRITICAL {
        "Asset quality shows moderately elevated NPAs, requiring close monitoring.".to_string()
    } else {
        "Asset quality is under stress with high NPAs, requiring immediate corrective measures."
            .to_string()
    });

    parts.push(if r.profit_per_staff >= PROFIT_BENCHMARK {
        "Profitability is satisfactory with healthy profit per staff.".to_string()
    } else {
        "Profit per staff is below benchmark, leaving room for efficiency gains.".to_string()
    });

    parts.join(" ")
}

// ── Branch profile ──────────────────────────────────────────────────

/// Most takeaways a profile lists.
pub const MAX_TAKEAWAYS: usize = 4;

/// Short bullet points on targets, asset quality and profitability.
pub fn key_takeaways(r: &MetricsRecord) -> Vec<String> {
    let mut out = Vec::with_capacity(MAX_TAKEAWAYS);
    out.push(if r.total_deposits >= r.deposit_target {
        format!(
            "Deposit performance is ahead of target by {:.1}%.",
            r.deposit_achievement_pct() - 100.0
        )
    } else {
        "Deposit growth is below target and needs focused mobilisation.".to_string()
    });
    out.push(if r.advances >= r.advance_target {
        "Advances growth is strong and above target.".to_string()
    } else {
        "Advances growth is lagging and needs acceleration.".to_string()
    });
    out.push(if r.npa_percent < NPA_WARNING {
        "Asset quality is healthy with controlled NPAs.".to_string()
    } else if r.npa_percent < NPA_CRITICAL {
        "NPAs are moderately elevated; close monitoring required.".to_string()
    } else {
        "High NPAs observed; immediate corrective action required.".to_string()
    });
    out.push(if r.profit_per_staff >= PROFIT_BENCHMARK {
        "Profitability per staff is healthy.".to_string()
    } else {
        "Profitability per staff is low, indicating efficiency gaps.".to_string()
    });
    out.truncate(MAX_TAKEAWAYS);
    out
}

/// Risk drivers and focus areas for one branch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub risks: Vec<String>,
    pub focus: Vec<String>,
}

pub const NO_MAJOR_RISKS: &str = "No major risk drivers identified.";

pub fn risks_and_focus(r: &MetricsRecord) -> RiskProfile {
    let mut p = RiskProfile::default();
    let mut add = |risk: Option<&str>, focus: &str| {
        if let Some(risk) = risk {
            p.risks.push(risk.to_string());
        }
        p.focus.push(focus.to_string());
    };

    if r.profit_per_staff < PROFIT_WARNING {
        add(
            Some("Low profit per staff impacting overall efficiency."),
            "Improve staff productivity and cross-selling.",
        );
    } else if r.profit_per_staff < PROFIT_BENCHMARK {
        add(None, "Enhance fee income and operational efficiency.");
    }

    if r.npa_percent > NPA_CRITICAL {
        add(
            Some("High NPA posing asset quality risk."),
            "Immediate recovery actions and SMA monitoring.",
        );
    } else if r.npa_percent > NPA_WARNING {
        add(
            Some("Moderately elevated NPA requiring close monitoring."),
            "Strengthen credit monitoring and early warning systems.",
        );
    }

    if r.casa_percent < CASA_STRONG {
        add(
            Some("Low CASA ratio affecting cost of funds."),
            "Focused CASA mobilisation drives.",
        );
    }

    if r.advances < r.advance_target {
        add(
            Some("Advances growth below target."),
            "Push quality retail and MSME credit growth.",
        );
    }

    if p.risks.is_empty() {
        p.risks.push(NO_MAJOR_RISKS.to_string());
        p.focus.push("Sustain current performance levels.".to_string());
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warangal() -> MetricsRecord {
        MetricsRecord::builder("B1005", "Warangal", "Telangana")
            .deposits(67.89, 75.0)
            .advances(98.76, 110.0)
            .npa_percent(8.5)
            .profit_per_staff(1.8)
            .casa_percent(25.4)
            .cd_ratio(82.3)
            .business_per_staff(45.6)
            .staff_count(15)
            .build()
            .unwrap()
    }

    fn mansoorabad() -> MetricsRecord {
        MetricsRecord::builder("B1001", "Mansoorabad", "Telangana")
            .deposits(110.97, 105.46)
            .advances(232.29, 218.16)
            .npa_percent(2.8)
            .profit_per_staff(5.44)
            .casa_percent(42.3)
            .cd_ratio(72.5)
            .business_per_staff(85.2)
            .staff_count(25)
            .build()
            .unwrap()
    }

    #[test]
    fn weak_branch_gets_critical_findings() {
        let d = diagnose(&warangal());
        assert_eq!(d.count(Severity::Critical), 2);
        assert!(d.by_severity(Severity::Critical).any(|i| i.area == Area::Npa));
        assert!(d.by_severity(Severity::Critical).any(|i| i.area == Area::Profitability));
        assert_eq!(d.count(Severity::Warning), 5);
        assert_eq!(d.priorities.len(), 1);
        assert_eq!(d.priorities[0].level, "P1");
        assert_eq!(d.priorities[0].area, Area::Npa);
        assert!(!d.recommendations.is_empty());
    }

    #[test]
    fn strong_branch_only_maintains() {
        let d = diagnose(&mansoorabad());
        assert_eq!(d.count(Severity::Critical), 0);
        assert_eq!(d.count(Severity::Warning), 0);
        assert_eq!(d.count(Severity::Success), 7);
        assert_eq!(d.priorities.len(), 1);
        assert_eq!(d.priorities[0].level, "P3");
        assert!(d.recommendations.is_empty());
    }

    #[test]
    fn deposit_shortfall_is_p1() {
        let r = MetricsRecord::builder("B1", "Low", "Z")
            .deposits(70.0, 100.0)
            .advances(100.0, 100.0)
            .npa_percent(1.0)
            .profit_per_staff(6.0)
            .casa_percent(45.0)
            .cd_ratio(70.0)
            .business_per_staff(90.0)
            .build()
            .unwrap();
        let d = diagnose(&r);
        assert_eq!(d.priorities[0].area, Area::Deposits);
        assert_eq!(d.priorities[0].gap, "30.0 Cr");
        assert!(d.recommendations[0].contains("4.29 Cr daily"));
    }

    #[test]
    fn weak_branch_risks_and_focus() {
        let p = risks_and_focus(&warangal());
        assert_eq!(
            p.risks,
            vec![
                "Low profit per staff impacting overall efficiency.",
                "High NPA posing asset quality risk.",
                "Low CASA ratio affecting cost of funds.",
                "Advances growth below target.",
            ]
        );
        assert_eq!(p.focus.len(), 4);
        assert_eq!(p.focus[1], "Immediate recovery actions and SMA monitoring.");
    }

    #[test]
    fn strong_branch_has_no_major_risks() {
        let p = risks_and_focus(&mansoorabad());
        assert_eq!(p.risks, vec![NO_MAJOR_RISKS]);
        assert_eq!(p.focus, vec!["Sustain current performance levels."]);
    }

    #[test]
    fn mid_profit_adds_focus_without_risk() {
        let r = MetricsRecord::builder("B1", "Mid", "Z")
            .deposits(100.0, 100.0)
            .advances(100.0, 100.0)
            .npa_percent(1.0)
            .profit_per_staff(4.0)
            .casa_percent(45.0)
            .build()
            .unwrap();
        let p = risks_and_focus(&r);
        assert_eq!(p.risks, vec![NO_MAJOR_RISKS]);
        assert_eq!(
            p.focus,
            vec!["Enhance fee income and operational efficiency.", "Sustain current performance levels."]
        );
    }

    #[test]
    fn takeaways_are_capped_and_specific() {
        let t = key_takeaways(&mansoorabad());
        assert_eq!(t.len(), MAX_TAKEAWAYS);
        // 110.97 / 105.46 = 105.22%
        assert_eq!(t[0], "Deposit performance is ahead of target by 5.2%.");
        assert_eq!(t[2], "Asset quality is healthy with controlled NPAs.");
        let t = key_takeaways(&warangal());
        assert_eq!(t[0], "Deposit growth is below target and needs focused mobilisation.");
        assert_eq!(t[2], "High NPAs observed; immediate corrective action required.");
    }

    #[test]
    fn summary_mentions_stress() {
        let text = executive_summary(&warangal());
        assert!(text.starts_with("Warangal (B1005, Telangana zone)"));
        assert!(text.contains("moderate"));
        assert!(text.contains("under stress"));
        let text = executive_summary(&mansoorabad());
        assert!(text.contains("above target"));
        assert!(text.contains("healthy"));
    }
}
