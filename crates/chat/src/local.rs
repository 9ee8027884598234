//! Deterministic answers built from the scoring engine and anomaly
//! detector. Always succeeds; used whenever no backend answers.

use serde::{Deserialize, Serialize};

use vista_compute::diagnostics::{CASA_LOW, CASA_STRONG, NPA_CRITICAL, NPA_WARNING};
use vista_compute::ranking::{rank_by_metric, rank_by_score, zone_summaries};
use vista_compute::{
    diagnose, executive_summary, risks_and_focus, AnomalyDetector, PortfolioOverview, RankOrder,
    ScoringEngine, Severity,
};
use vista_core::{Metric, MetricsRecord};

use crate::intent::Intent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Pie,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

/// Chart description for the front-end; rendering is not done here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub categories: Vec<String>,
    pub series: Vec<Series>,
    /// Category to emphasise, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted: Option<String>,
}

impl ChartSpec {
    fn bar(title: impl Into<String>, categories: Vec<String>, series: Vec<Series>) -> Self {
        Self {
            kind: ChartKind::Bar,
            title: title.into(),
            categories,
            series,
            highlighted: None,
        }
    }

    fn highlight(mut self, category: Option<String>) -> Self {
        self.highlighted = category;
        self
    }
}

fn series(name: &str, values: Vec<f64>) -> Series {
    Series {
        name: name.to_string(),
        values,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
}

impl Reply {
    fn text(lines: Vec<String>) -> Self {
        Self {
            text: lines.join("\n"),
            chart: None,
        }
    }

    fn with_chart(mut self, chart: ChartSpec) -> Self {
        self.chart = Some(chart);
        self
    }
}

const HELP_EXAMPLES: [&str; 8] = [
    "Which loans are bad? (NPA)",
    "How is our CASA?",
    "Who are the top performers?",
    "Which branches need attention?",
    "Deposits / advances against target",
    "Any anomalies?",
    "Zone wise summary",
    "Or name a branch, e.g. the first one in your data",
];

#[derive(Debug, Clone)]
pub struct LocalResponder {
    records: Vec<MetricsRecord>,
    engine: ScoringEngine,
    detector: AnomalyDetector,
    top_n: usize,
}

impl LocalResponder {
    pub fn new(
        records: Vec<MetricsRecord>,
        engine: ScoringEngine,
        detector: AnomalyDetector,
        top_n: usize,
    ) -> Self {
        Self {
            records,
            engine,
            detector,
            top_n: top_n.max(1),
        }
    }

    pub fn records(&self) -> &[MetricsRecord] {
        &self.records
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    pub fn find(&self, id: &str) -> Option<&MetricsRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Answer for an effective intent. `entity` is a branch id.
    pub fn answer(&self, intent: Intent, entity: Option<&str>) -> Reply {
        if intent == Intent::Help {
            return self.help(None);
        }
        if self.records.is_empty() {
            return Reply::text(vec!["No branch data is loaded yet.".into()]);
        }
        let focus = entity.and_then(|id| self.find(id));

        match intent {
            Intent::Npa => self.npa(focus),
            Intent::Casa => self.casa(focus),
            Intent::TopPerformers => self.by_score(RankOrder::Descending),
            Intent::Weak => self.by_score(RankOrder::Ascending),
            Intent::Deposits => self.achievement(Metric::DepositAchievement, focus),
            Intent::Advances => self.achievement(Metric::AdvanceAchievement, focus),
            Intent::Staff => self.staff(focus),
            Intent::Target => self.targets(),
            Intent::Anomaly => self.anomalies(),
            Intent::Zone => self.zones(),
            Intent::EntityReference => match focus {
                Some(r) => self.entity_detail(r),
                None => self.overview(),
            },
            Intent::Unknown => self.help(Some("I couldn't tie that to a topic or a branch.")),
            Intent::Overview | Intent::FollowUp | Intent::Help => self.overview(),
        }
    }

    // ── Topics ──────────────────────────────────────────────────────

    fn npa(&self, focus: Option<&MetricsRecord>) -> Reply {
        let metric = Metric::NpaPercent;
        let ranked = rank_by_metric(&self.records, metric, RankOrder::worst_first(metric), self.top_n);
        let critical = self.count(|r| r.npa_percent > NPA_CRITICAL);
        let elevated = self.count(|r| r.npa_percent > NPA_WARNING && r.npa_percent <= NPA_CRITICAL);

        let mut lines = self.focus_line(metric, focus);
        lines.push(format!(
            "Average NPA is {:.2}%. {critical} branch(es) above {NPA_CRITICAL:.0}%, {elevated} between {NPA_WARNING:.0}% and {NPA_CRITICAL:.0}%.",
            self.mean(metric)
        ));
        lines.push("Highest NPA:".into());
        lines.extend(ranked.iter().map(|r| format!("- {} ({}): {:.2}%", r.name, r.zone, r.npa_percent)));

        Reply::text(lines).with_chart(self.metric_chart("NPA % by branch", metric, &ranked, focus))
    }

    fn casa(&self, focus: Option<&MetricsRecord>) -> Reply {
        let metric = Metric::CasaPercent;
        let ranked = rank_by_metric(&self.records, metric, RankOrder::best_first(metric), self.top_n);
        let low = self.count(|r| r.casa_percent < CASA_LOW);
        let strong = self.count(|r| r.casa_percent >= CASA_STRONG);

        let mut lines = self.focus_line(metric, focus);
        lines.push(format!(
            "Average CASA is {:.1}%. {strong} branch(es) at {CASA_STRONG:.0}% or more, {low} below {CASA_LOW:.0}%.",
            self.mean(metric)
        ));
        lines.push("Strongest CASA:".into());
        lines.extend(ranked.iter().map(|r| format!("- {}: {:.1}%", r.name, r.casa_percent)));

        Reply::text(lines).with_chart(self.metric_chart("CASA % by branch", metric, &ranked, focus))
    }

    fn by_score(&self, order: RankOrder) -> Reply {
        let ranked = rank_by_score(&self.records, &self.engine, order, self.top_n);
        let best = order == RankOrder::Descending;

        let mut lines = vec![if best {
            "Top performers by composite score:".to_string()
        } else {
            "Branches that need attention, lowest score first:".to_string()
        }];
        for (r, s) in &ranked {
            let mut line = format!("- {}: {:.1} ({})", r.name, s.total, s.grade);
            if !best {
                let d = diagnose(r);
                if let Some(issue) = d
                    .by_severity(Severity::Critical)
                    .chain(d.by_severity(Severity::Warning))
                    .next()
                {
                    line.push_str(&format!(", main issue: {}", issue.title));
                };
            }
            lines.push(line);
        }

        let chart = ChartSpec::bar(
            if best { "Top scores" } else { "Lowest scores" },
            ranked.iter().map(|(r, _)| r.name.clone()).collect(),
            vec![series("Score", ranked.iter().map(|(_, s)| s.total).collect())],
        )
        .highlight(ranked.first().map(|(r, _)| r.name.clone()));
        Reply::text(lines).with_chart(chart)
    }

    fn achievement(&self, metric: Metric, focus: Option<&MetricsRecord>) -> Reply {
        let deposits = metric == Metric::DepositAchievement;
        let (noun, actual, target_metric) = if deposits {
            ("Deposits", Metric::TotalDeposits, Metric::DepositTarget)
        } else {
            ("Advances", Metric::Advances, Metric::AdvanceTarget)
        };

        let overview = PortfolioOverview::compute(&self.records, &self.engine);
        let (total, target, pct) = if deposits {
            (overview.total_deposits, overview.deposit_target, overview.deposit_achievement_pct())
        } else {
            (overview.total_advances, overview.advance_target, overview.advance_achievement_pct())
        };
        let below = self.count(|r| metric.value(r) < 100.0);
        let ranked = rank_by_metric(&self.records, metric, RankOrder::worst_first(metric), self.top_n);

        let mut lines = self.focus_line(metric, focus);
        lines.push(format!(
            "{noun}: {total:.2} Cr against a target of {target:.2} Cr ({pct:.1}%). {below} of {} branches are below target.",
            self.records.len()
        ));
        lines.push("Furthest from target:".into());
        lines.extend(ranked.iter().map(|r| {
            format!(
                "- {}: {:.1}% of target ({:+.2} Cr)",
                r.name,
                metric.value(r),
                actual.value(r) - target_metric.value(r)
            )
        }));

        let chart = ChartSpec::bar(
            format!("{noun} vs target"),
            ranked.iter().map(|r| r.name.clone()).collect(),
            vec![
                series("Actual", ranked.iter().map(|r| actual.value(r)).collect()),
                series("Target", ranked.iter().map(|r| target_metric.value(r)).collect()),
            ],
        )
        .highlight(focus.map(|r| r.name.clone()));
        Reply::text(lines).with_chart(chart)
    }

    fn staff(&self, focus: Option<&MetricsRecord>) -> Reply {
        let metric = Metric::BusinessPerStaff;
        let ranked = rank_by_metric(&self.records, metric, RankOrder::best_first(metric), self.top_n);
        let staff: u32 = self.records.iter().map(|r| r.staff_count).sum();

        let mut lines = self.focus_line(metric, focus);
        lines.push(format!(
            "{staff} staff across {} branches. Average business per staff {:.1} Cr, profit per staff {:.2} L.",
            self.records.len(),
            self.mean(metric),
            self.mean(Metric::ProfitPerStaff)
        ));
        lines.push("Most productive:".into());
        lines.extend(ranked.iter().map(|r| {
            format!(
                "- {}: {:.1} Cr per staff, {:.2} L profit per staff ({} staff)",
                r.name, r.business_per_staff, r.profit_per_staff, r.staff_count
            )
        }));

        Reply::text(lines).with_chart(self.metric_chart("Business per staff (Cr)", metric, &ranked, focus))
    }

    fn targets(&self) -> Reply {
        let both = self.count(|r| r.total_deposits >= r.deposit_target && r.advances >= r.advance_target);
        let mut lines = vec![format!(
            "{both} of {} branches met both deposit and advance targets.",
            self.records.len()
        )];

        let mut missed: Vec<&MetricsRecord> = self
            .records
            .iter()
            .filter(|r| r.total_deposits < r.deposit_target || r.advances < r.advance_target)
            .collect();
        missed.sort_by(|a, b| {
            let worst = |r: &MetricsRecord| r.deposit_achievement_pct().min(r.advance_achievement_pct());
            worst(a).total_cmp(&worst(b)).then_with(|| a.name.cmp(&b.name))
        });
        if !missed.is_empty() {
            lines.push("Below target:".into());
        }
        lines.extend(missed.iter().take(self.top_n).map(|r| {
            format!(
                "- {}: deposits {:.1}%, advances {:.1}%",
                r.name,
                r.deposit_achievement_pct(),
                r.advance_achievement_pct()
            )
        }));

        let chart = ChartSpec::bar(
            "Achievement % of target",
            self.records.iter().map(|r| r.name.clone()).collect(),
            vec![
                series("Deposits", self.records.iter().map(|r| r.deposit_achievement_pct()).collect()),
                series("Advances", self.records.iter().map(|r| r.advance_achievement_pct()).collect()),
            ],
        )
        .highlight(missed.first().map(|r| r.name.clone()));
        Reply::text(lines).with_chart(chart)
    }

    fn anomalies(&self) -> Reply {
        let found = self.detector.detect(&self.records);
        let z = self.detector.z_threshold;
        if found.is_empty() {
            return Reply::text(vec![format!(
                "No statistical outliers beyond |z| > {z:.1} across {} branches.",
                self.records.len()
            )]);
        }

        let mut lines = vec![format!("{} outlier(s) beyond |z| > {z:.1}:", found.len())];
        lines.extend(found.iter().map(|a| {
            format!(
                "- {}: {} {:.2} vs mean {:.2} (z {:+.2}, {}){}",
                a.entity_name,
                a.metric.label(),
                a.value,
                a.mean,
                a.z_score,
                a.direction,
                if a.is_adverse() { ", needs review" } else { "" }
            )
        }));

        let chart = ChartSpec::bar(
            "Outlier z-scores",
            found.iter().map(|a| format!("{} / {}", a.entity_name, a.metric.label())).collect(),
            vec![series("z-score", found.iter().map(|a| a.z_score).collect())],
        )
        .highlight(
            found
                .iter()
                .find(|a| a.is_adverse())
                .map(|a| format!("{} / {}", a.entity_name, a.metric.label())),
        );
        Reply::text(lines).with_chart(chart)
    }

    fn zones(&self) -> Reply {
        let zones = zone_summaries(&self.records, &self.engine);
        let mut lines = vec![format!("{} zone(s):", zones.len())];
        lines.extend(zones.iter().map(|z| {
            format!(
                "- {}: {} branches, average score {:.1}, average NPA {:.2}%, deposits {:.2} Cr, advances {:.2} Cr",
                z.zone, z.branches, z.avg_score, z.avg_npa, z.total_deposits, z.total_advances
            )
        }));

        let chart = ChartSpec::bar(
            "Average score by zone",
            zones.iter().map(|z| z.zone.clone()).collect(),
            vec![series("Average score", zones.iter().map(|z| z.avg_score).collect())],
        );
        Reply::text(lines).with_chart(chart)
    }

    fn overview(&self) -> Reply {
        let o = PortfolioOverview::compute(&self.records, &self.engine);
        let grades: Vec<String> = o
            .grade_distribution
            .iter()
            .map(|(g, n)| format!("{g} {n}"))
            .collect();

        let lines = vec![
            format!("Portfolio of {} branches, average score {:.1}.", o.branches, o.avg_score),
            format!(
                "Deposits {:.2} Cr ({:.1}% of target), advances {:.2} Cr ({:.1}% of target).",
                o.total_deposits,
                o.deposit_achievement_pct(),
                o.total_advances,
                o.advance_achievement_pct()
            ),
            format!("Average NPA {:.2}%, average CASA {:.1}%.", o.avg_npa, o.avg_casa),
            format!("Grades: {}.", grades.join(", ")),
        ];

        let chart = ChartSpec {
            kind: ChartKind::Pie,
            title: "Grade distribution".into(),
            categories: o.grade_distribution.keys().map(|g| g.label().to_string()).collect(),
            series: vec![series(
                "Branches",
                o.grade_distribution.values().map(|n| *n as f64).collect(),
            )],
            highlighted: None,
        };
        Reply::text(lines).with_chart(chart)
    }

    fn help(&self, lead: Option<&str>) -> Reply {
        let mut lines: Vec<String> = lead.map(str::to_string).into_iter().collect();
        lines.push("You can ask about:".into());
        lines.extend(HELP_EXAMPLES.iter().map(|e| format!("- {e}")));
        Reply::text(lines)
    }

    fn entity_detail(&self, r: &MetricsRecord) -> Reply {
        let result = self.engine.score(r);
        let chart = ChartSpec::bar(
            format!("{} score breakdown", r.name),
            result.components.iter().map(|c| c.label.clone()).collect(),
            vec![
                series("Score", result.components.iter().map(|c| c.score).collect()),
                series("Max", result.components.iter().map(|c| c.cap).collect()),
            ],
        );
        Reply {
            text: self.entity_card(r),
            chart: Some(chart),
        }
    }

    /// Multi-line description of one branch: score, components, key
    /// metrics, executive summary, risks and focus, and the top priority.
    pub fn entity_card(&self, r: &MetricsRecord) -> String {
        let result = self.engine.score(r);
        let mut lines = Vec::new();
        if result.is_available() {
            lines.push(format!(
                "{} ({}, {} zone): score {:.1}/{}, grade {}, status {}.",
                r.name,
                r.id,
                r.zone,
                result.total,
                trim_number(self.engine.config().max_total),
                result.grade,
                self.engine.status_label(&result)
            ));
            let parts: Vec<String> = result
                .components
                .iter()
                .map(|c| format!("{} {}/{}", c.label, trim_number(c.score), trim_number(c.cap)))
                .collect();
            lines.push(format!("Components: {}.", parts.join(", ")));
        } else {
            lines.push(format!("{} ({}, {} zone): score unavailable.", r.name, r.id, r.zone));
        }
        lines.push(format!(
            "Deposits {:.2} Cr vs target {:.2} Cr ({:.1}%), advances {:.2} Cr vs target {:.2} Cr ({:.1}%).",
            r.total_deposits,
            r.deposit_target,
            r.deposit_achievement_pct(),
            r.advances,
            r.advance_target,
            r.advance_achievement_pct()
        ));
        lines.push(format!(
            "NPA {:.2}%, CASA {:.1}%, CD ratio {:.1}%, profit per staff {:.2} L.",
            r.npa_percent, r.casa_percent, r.cd_ratio, r.profit_per_staff
        ));
        lines.push(executive_summary(r));
        let profile = risks_and_focus(r);
        lines.push(format!("Risks: {}", profile.risks.join(" ")));
        lines.push(format!("Focus: {}", profile.focus.join(" ")));
        if let Some(p) = diagnose(r).priorities.first() {
            lines.push(format!(
                "Top priority ({}): {}, {} ({}).",
                p.level,
                p.area.label(),
                p.action,
                p.timeline
            ));
        }
        lines.join("\n")
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn count(&self, pred: impl Fn(&MetricsRecord) -> bool) -> usize {
        self.records.iter().filter(|r| pred(r)).count()
    }

    fn mean(&self, metric: Metric) -> f64 {
        let n = self.records.len().max(1) as f64;
        self.records.iter().map(|r| metric.value(r)).sum::<f64>() / n
    }

    /// Where the carried-over branch stands on this metric, best = 1.
    fn focus_line(&self, metric: Metric, focus: Option<&MetricsRecord>) -> Vec<String> {
        let Some(r) = focus else {
            return Vec::new();
        };
        let all = rank_by_metric(&self.records, metric, RankOrder::best_first(metric), self.records.len());
        let rank = all.iter().position(|x| x.id == r.id).map_or(0, |p| p + 1);
        vec![format!(
            "{}: {} {:.2} (rank {rank} of {}).",
            r.name,
            metric.label(),
            metric.value(r),
            all.len()
        )]
    }

    fn metric_chart(
        &self,
        title: &str,
        metric: Metric,
        ranked: &[&MetricsRecord],
        focus: Option<&MetricsRecord>,
    ) -> ChartSpec {
        let highlighted = focus.or(ranked.first().copied()).map(|r| r.name.clone());
        ChartSpec::bar(
            title,
            ranked.iter().map(|r| r.name.clone()).collect(),
            vec![series(metric.label(), ranked.iter().map(|r| metric.value(r)).collect())],
        )
        .highlight(highlighted)
    }
}

/// `22.5` stays `22.5`, `25.0` becomes `25`.
fn trim_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}
