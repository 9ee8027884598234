//! ScoringConfig to dashboard formulas.
//!
//! Every criterion becomes a literal formula counterpart of the engine's
//! rule, reading its inputs through `INDEX`/`MATCH` keyed by the selector
//! cell. Tier comparisons keep the config's inclusivity (`AtMost` is `<=`,
//! `AtLeast` is `>=`) and the summed score is rounded exactly as the engine
//! rounds it, so the workbook shows the same number the engine reports.

use tracing::debug;

use vista_core::{Criterion, CriterionRule, Metric, ScoringConfig, TierDirection};

use crate::address::{CellAddr, CellRef, RangeRef};
use crate::error::FormulaError;
use crate::expr::{BinaryOp, Expr, Function};
use crate::layout::LayoutBindings;
use crate::render::format_number;

/// One row of the dashboard's metric table, formulas for columns B..F.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub criterion: String,
    pub label: String,
    pub row: u32,
    pub actual: Expr,
    pub target: Expr,
    pub gap: Option<Expr>,
    pub achievement: Option<Expr>,
    pub status: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFormulas {
    /// Rounded total for the hidden score cell.
    pub score: Expr,
    /// Unrounded sub-score per criterion id, in config order.
    pub components: Vec<(String, Expr)>,
    /// Nested IF over the score cell.
    pub grade: Expr,
    pub status: Expr,
    /// `ROUND(score,0)&"/100"`
    pub score_display: Expr,
    pub id_lookup: Expr,
    pub zone_lookup: Expr,
    pub metric_rows: Vec<MetricRow>,
    /// Range the selector's list validation is bound to.
    pub selector_source: RangeRef,
}

/// Compile a config against a layout. The config is expected to have
/// passed `ScoringConfig::validate()`.
pub fn compile(
    layout: &LayoutBindings,
    config: &ScoringConfig,
) -> Result<CompiledFormulas, FormulaError> {
    let components = config
        .criteria
        .iter()
        .map(|c| Ok((c.id.clone(), criterion_expr(layout, c)?)))
        .collect::<Result<Vec<_>, FormulaError>>()?;

    let score = Expr::round(
        Expr::sum(components.iter().map(|(_, e)| e.clone())),
        config.round_digits,
    );

    let score_cell = Expr::cell(layout.score_local());
    let grade = grade_ladder(&score_cell, config);
    let status = Expr::if_then(
        score_cell.clone().cmp(BinaryOp::Ge, Expr::num(config.status_cutoffs.excellent)),
        Expr::text("Excellent"),
        Expr::if_then(
            score_cell.clone().cmp(BinaryOp::Ge, Expr::num(config.status_cutoffs.good)),
            Expr::text("Good"),
            Expr::text("Review"),
        ),
    );
    let score_display = Expr::round(score_cell, 0)
        .concat(Expr::text(format!("/{}", format_number(config.max_total))));

    let mut metric_rows = Vec::with_capacity(config.criteria.len());
    for (i, criterion) in config.criteria.iter().enumerate() {
        let row = layout.metric_table_row + i as u32;
        metric_rows.push(metric_row(layout, criterion, row)?);
    }

    debug!(
        criteria = config.criteria.len(),
        rows = metric_rows.len(),
        "compiled scoring formulas"
    );

    Ok(CompiledFormulas {
        score,
        components,
        grade,
        status,
        score_display,
        id_lookup: key_lookup(layout, layout.id_column),
        zone_lookup: key_lookup(layout, layout.zone_column),
        metric_rows,
        selector_source: layout.search_range(),
    })
}

/// `IF(ISNUMBER(SEARCH(selector, key)), key, "")` for one data row.
pub fn search_assist(layout: &LayoutBindings, row: u32) -> Expr {
    let key = Expr::cell(CellRef::local(CellAddr::new(layout.key_column, row)));
    Expr::if_then(
        Expr::call(
            Function::IsNumber,
            vec![Expr::call(
                Function::Search,
                vec![Expr::cell(layout.selector_qualified()), key.clone()],
            )],
        ),
        key,
        Expr::text(""),
    )
}

// ── Pieces ──────────────────────────────────────────────────────────

fn key_lookup(layout: &LayoutBindings, column: u32) -> Expr {
    Expr::lookup(
        layout.data_column(column),
        Expr::cell(layout.selector_local()),
        layout.data_column(layout.key_column),
    )
}

fn metric_lookup(layout: &LayoutBindings, metric: Metric) -> Result<Expr, FormulaError> {
    Ok(key_lookup(layout, layout.column_of(metric)?))
}

fn criterion_expr(layout: &LayoutBindings, criterion: &Criterion) -> Result<Expr, FormulaError> {
    let cap = criterion.cap;
    Ok(match &criterion.rule {
        CriterionRule::Achievement { actual, target } => {
            let actual_value = metric_lookup(layout, *actual)?;
            let target_value = metric_lookup(layout, *target)?;
            let capped = Expr::min(
                actual_value.clone() / target_value.clone() * Expr::num(cap),
                Expr::num(cap),
            );
            // The engine scores 0 for a non-positive target and floors at 0.
            let mut guards = Vec::new();
            if !target.is_always_positive() {
                guards.push(target_value.cmp(BinaryOp::Gt, Expr::num(0.0)));
            }
            if !actual.is_never_negative() {
                guards.push(actual_value.cmp(BinaryOp::Gt, Expr::num(0.0)));
            }
            match guards.len() {
                0 => capped,
                1 => Expr::if_then(guards.remove(0), capped, Expr::num(0.0)),
                _ => Expr::if_then(Expr::and(guards), capped, Expr::num(0.0)),
            }
        }
        CriterionRule::Tiered {
            metric,
            direction,
            tiers,
            otherwise,
        } => {
            let value = metric_lookup(layout, *metric)?;
            let op = comparison_for(*direction);
            tiers.iter().rev().fold(Expr::num(*otherwise), |rest, tier| {
                Expr::if_then(
                    value.clone().cmp(op, Expr::num(tier.threshold)),
                    Expr::num(tier.points),
                    rest,
                )
            })
        }
        CriterionRule::Band {
            metric,
            low,
            high,
            inside,
            outside,
        } => {
            let value = metric_lookup(layout, *metric)?;
            Expr::if_then(
                Expr::and(vec![
                    value.clone().cmp(BinaryOp::Ge, Expr::num(*low)),
                    value.cmp(BinaryOp::Le, Expr::num(*high)),
                ]),
                Expr::num(*inside),
                Expr::num(*outside),
            )
        }
    })
}

fn comparison_for(direction: TierDirection) -> BinaryOp {
    match direction {
        TierDirection::AtMost => BinaryOp::Le,
        TierDirection::AtLeast => BinaryOp::Ge,
    }
}

fn grade_ladder(score_cell: &Expr, config: &ScoringConfig) -> Expr {
    config
        .grade_cutoffs
        .descending()
        .iter()
        .rev()
        .fold(Expr::text("D"), |rest, (grade, cutoff)| {
            Expr::if_then(
                score_cell.clone().cmp(BinaryOp::Ge, Expr::num(*cutoff)),
                Expr::text(grade.label()),
                rest,
            )
        })
}

fn metric_row(
    layout: &LayoutBindings,
    criterion: &Criterion,
    row: u32,
) -> Result<MetricRow, FormulaError> {
    let b = Expr::cell(CellRef::local(CellAddr::new(1, row)));
    let c = Expr::cell(CellRef::local(CellAddr::new(2, row)));

    let (metric, target, gap, achievement, status) = match &criterion.rule {
        CriterionRule::Achievement { actual, target } => (
            *actual,
            metric_lookup(layout, *target)?,
            Some(b.clone() - c.clone()),
            Some(if target.is_always_positive() {
                b.clone() / c.clone()
            } else {
                Expr::if_then(
                    c.clone().cmp(BinaryOp::Gt, Expr::num(0.0)),
                    b.clone() / c.clone(),
                    Expr::text(""),
                )
            }),
            Expr::if_then(
                b.cmp(BinaryOp::Ge, c),
                Expr::text("On Track"),
                Expr::text("Gap"),
            ),
        ),
        CriterionRule::Tiered {
            metric,
            direction,
            tiers,
            otherwise,
        } => {
            let benchmark = tiers.first().map(|t| t.threshold).unwrap_or(*otherwise);
            let op = comparison_for(*direction);
            let status = match (direction, tiers.as_slice()) {
                (_, []) => Expr::text("-"),
                (TierDirection::AtMost, [first, ..]) => Expr::if_then(
                    b.cmp(op, Expr::num(first.threshold)),
                    Expr::text("Good"),
                    Expr::text("High"),
                ),
                (TierDirection::AtLeast, [first]) => Expr::if_then(
                    b.cmp(op, Expr::num(first.threshold)),
                    Expr::text("Excellent"),
                    Expr::text("Low"),
                ),
                (TierDirection::AtLeast, [first, second, ..]) => Expr::if_then(
                    b.clone().cmp(op, Expr::num(first.threshold)),
                    Expr::text("Excellent"),
                    Expr::if_then(
                        b.cmp(op, Expr::num(second.threshold)),
                        Expr::text("Good"),
                        Expr::text("Low"),
                    ),
                ),
            };
            (*metric, Expr::num(benchmark), None, None, status)
        }
        CriterionRule::Band {
            metric, low, high, ..
        } => (
            *metric,
            Expr::num((low + high) / 2.0),
            None,
            None,
            Expr::if_then(
                Expr::and(vec![
                    b.clone().cmp(BinaryOp::Ge, Expr::num(*low)),
                    b.cmp(BinaryOp::Le, Expr::num(*high)),
                ]),
                Expr::text("Optimal"),
                Expr::text("Review"),
            ),
        ),
    };

    Ok(MetricRow {
        criterion: criterion.id.clone(),
        label: metric.label().to_string(),
        row,
        actual: metric_lookup(layout, metric)?,
        target,
        gap,
        achievement,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render;

    fn compiled() -> CompiledFormulas {
        compile(&LayoutBindings::standard(8), &ScoringConfig::canonical()).unwrap()
    }

    #[test]
    fn npa_tiers_stay_inclusive() {
        let c = compiled();
        let (_, npa) = c.components.iter().find(|(id, _)| id == "asset_quality").unwrap();
        let lookup = "INDEX(_Data!$H:$H,MATCH(B3,_Data!$B:$B,0))";
        assert_eq!(
            render(npa),
            format!("=IF({lookup}<=3,20,IF({lookup}<=6,12,5))")
        );
    }

    #[test]
    fn deposits_are_capped_ratio() {
        let c = compiled();
        let (_, dep) = &c.components[0];
        assert_eq!(
            render(dep),
            "=MIN(INDEX(_Data!$D:$D,MATCH(B3,_Data!$B:$B,0))/INDEX(_Data!$E:$E,MATCH(B3,_Data!$B:$B,0))*25,25)"
        );
    }

    #[test]
    fn achievement_on_unsanitized_metrics_is_guarded() {
        let mut config = ScoringConfig::canonical();
        config.criteria[0].rule = CriterionRule::Achievement {
            actual: Metric::ProfitPerStaff,
            target: Metric::BusinessPerStaff,
        };
        let c = compile(&LayoutBindings::standard(8), &config).unwrap();
        let profit = "INDEX(_Data!$I:$I,MATCH(B3,_Data!$B:$B,0))";
        let business = "INDEX(_Data!$L:$L,MATCH(B3,_Data!$B:$B,0))";
        assert_eq!(
            render(&c.components[0].1),
            format!("=IF(AND({business}>0,{profit}>0),MIN({profit}/{business}*25,25),0)")
        );
    }

    #[test]
    fn cd_band_uses_and() {
        let c = compiled();
        let (_, cd) = c.components.last().unwrap();
        let lookup = "INDEX(_Data!$K:$K,MATCH(B3,_Data!$B:$B,0))";
        assert_eq!(render(cd), format!("=IF(AND({lookup}>=60,{lookup}<=80),5,2)"));
    }

    #[test]
    fn grade_status_and_display() {
        let c = compiled();
        assert_eq!(
            render(&c.grade),
            r#"=IF(C9>=90,"A+",IF(C9>=80,"A",IF(C9>=65,"B",IF(C9>=50,"C","D"))))"#
        );
        assert_eq!(
            render(&c.status),
            r#"=IF(C9>=80,"Excellent",IF(C9>=65,"Good","Review"))"#
        );
        assert_eq!(render(&c.score_display), r#"=ROUND(C9,0)&"/100""#);
    }

    #[test]
    fn score_uses_only_allowed_functions() {
        let c = compiled();
        let allowed = [
            Function::Index,
            Function::Match,
            Function::Min,
            Function::If,
            Function::And,
            Function::Round,
        ];
        assert!(c.score.functions().iter().all(|f| allowed.contains(f)));
        assert!(render(&c.score).starts_with("=ROUND("));
        assert!(render(&c.score).ends_with(",1)"));
    }

    #[test]
    fn every_selection_dependent_cell_reads_the_selector() {
        let c = compiled();
        let selector = CellRef::local(CellAddr::new(1, 3));
        for e in [&c.id_lookup, &c.zone_lookup, &c.score] {
            assert!(e.references().contains(&&selector));
        }
        for row in &c.metric_rows {
            assert!(row.actual.references().contains(&&selector));
        }
    }

    #[test]
    fn metric_rows_follow_criteria() {
        let c = compiled();
        assert_eq!(c.metric_rows.len(), 6);
        assert_eq!(c.metric_rows[0].label, "Deposits (Cr)");
        assert_eq!(c.metric_rows[0].row, 13);
        assert_eq!(render(c.metric_rows[0].gap.as_ref().unwrap()), "=B13-C13");
        assert_eq!(render(&c.metric_rows[2].status), r#"=IF(B15<=3,"Good","High")"#);
        assert_eq!(
            render(&c.metric_rows[3].status),
            r#"=IF(B16>=5,"Excellent",IF(B16>=3,"Good","Low"))"#
        );
        assert_eq!(c.metric_rows[5].target, Expr::num(70.0));
    }

    #[test]
    fn search_assist_formula() {
        let e = search_assist(&LayoutBindings::standard(8), 4);
        assert_eq!(render(&e), r#"=IF(ISNUMBER(SEARCH(Dashboard!$B$3,B4)),B4,"")"#);
    }

    #[test]
    fn unbound_metric_is_an_error() {
        let mut layout = LayoutBindings::standard(3);
        layout.metric_columns.retain(|(m, _)| *m != Metric::CasaPercent);
        assert_eq!(
            compile(&layout, &ScoringConfig::canonical()).unwrap_err(),
            FormulaError::UnboundMetric(Metric::CasaPercent)
        );
    }
}
