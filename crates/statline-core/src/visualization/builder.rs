use std::sync::Arc;
use thiserror::Error;

use super::{AxisValue, ChartKind, ChartOptions, Series, VisualizationSpec, chart_title, humanize_column};
use crate::catalog::SchemaCatalog;
use crate::intent::Intent;
use crate::result::{ResultSet, Scalar};
use crate::stats::{ColumnRoles, DerivedMetrics};

const MIN_POINTS: usize = 2;
const MAX_GROUPED_SERIES: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VisualizationError {
    #[error("result set is inconsistent: {0}")]
    Inconsistent(String),
}

/// Maps results onto a chart. `Ok(None)` means no chart suits the answer.
pub trait ChartBuilder: Send + Sync {
    fn build(
        &self,
        results: &ResultSet,
        metrics: &DerivedMetrics,
        intent: &Intent,
    ) -> Result<Option<VisualizationSpec>, VisualizationError>;
}

/// Chooses the chart kind from the result shape:
/// temporal x gives a line, labelled categories give bars, a single row with
/// several metrics gives a stat card, and a single value gives nothing.
pub struct DefaultChartBuilder {
    catalog: Arc<SchemaCatalog>,
}

impl DefaultChartBuilder {
    pub fn new(catalog: Arc<SchemaCatalog>) -> Self {
        Self { catalog }
    }

    fn is_team(&self, name: &str) -> bool {
        self.catalog.team_color(name).is_some()
    }

    fn options(&self, title: String, x: Option<&str>, y: Option<&str>, results: &ResultSet) -> ChartOptions {
        ChartOptions {
            title: Some(title),
            x_axis_title: x.map(humanize_column),
            y_axis_title: y.map(humanize_column),
            truncated: results.truncated,
            ..Default::default()
        }
    }

    fn stat_card(&self, results: &ResultSet, roles: &ColumnRoles, intent: &Intent) -> Option<VisualizationSpec> {
        let row = results.rows.first()?;
        let series: Vec<Series> = roles
            .metrics
            .iter()
            .filter_map(|&i| {
                let value = row.get(i).and_then(Scalar::as_f64)?;
                Some(Series {
                    name: humanize_column(&results.columns[i]),
                    x: Vec::new(),
                    y: vec![value],
                    color: None,
                })
            })
            .collect();
        if series.len() < MIN_POINTS {
            return None;
        }
        let title = match roles.entity.and_then(|e| row.get(e)) {
            Some(Scalar::Text(name)) => name.clone(),
            _ => chart_title(intent, &results.columns[roles.metrics[0]]),
        };
        Some(VisualizationSpec {
            kind: ChartKind::Scalar,
            series,
            options: self.options(title, None, None, results),
        })
    }

    fn line(
        &self,
        results: &ResultSet,
        roles: &ColumnRoles,
        intent: &Intent,
        temporal: usize,
        primary: usize,
    ) -> Option<VisualizationSpec> {
        let entities = roles.entity.map(|e| distinct_labels(results, e)).unwrap_or_default();

        let series: Vec<Series> = match roles.entity {
            Some(entity) if entities.len() >= 2 => entities
                .iter()
                .map(|name| {
                    let (x, y) = points(results, temporal, primary, |row| {
                        row.get(entity).is_some_and(|v| v.to_string() == *name)
                    });
                    Series {
                        name: name.clone(),
                        x,
                        y,
                        color: self.catalog.team_color(name).map(str::to_string),
                    }
                })
                .collect(),
            _ => requested_metrics(results, roles, intent, primary)
                .into_iter()
                .map(|metric| {
                    let (x, y) = points(results, temporal, metric, |_| true);
                    Series {
                        name: humanize_column(&results.columns[metric]),
                        x,
                        y,
                        color: None,
                    }
                })
                .collect(),
        };
        let series: Vec<Series> = series.into_iter().filter(|s| !s.is_empty()).collect();
        if series.iter().map(Series::len).max().unwrap_or(0) < MIN_POINTS {
            return None;
        }

        let mut options = self.options(
            chart_title(intent, &results.columns[primary]),
            Some(&results.columns[temporal]),
            Some(&results.columns[primary]),
            results,
        );
        if series.iter().all(|s| s.color.is_some()) {
            options.palette = "team_colors".to_string();
        }
        Some(VisualizationSpec {
            kind: ChartKind::Line,
            series,
            options,
        })
    }

    fn bar(
        &self,
        results: &ResultSet,
        roles: &ColumnRoles,
        intent: &Intent,
        entity: usize,
        primary: usize,
    ) -> Option<VisualizationSpec> {
        let grouped = intent.is_comparison() && roles.metrics.len() >= 2;
        let metrics: Vec<usize> = if grouped {
            roles.metrics.iter().copied().take(MAX_GROUPED_SERIES).collect()
        } else {
            vec![primary]
        };

        let series: Vec<Series> = metrics
            .iter()
            .map(|&metric| {
                let (x, y) = points(results, entity, metric, |_| true);
                Series {
                    name: humanize_column(&results.columns[metric]),
                    x,
                    y,
                    color: None,
                }
            })
            .filter(|s| !s.is_empty())
            .collect();
        let categories = series.first().map(|s| s.x.clone()).unwrap_or_default();
        if categories.len() < MIN_POINTS {
            return None;
        }

        let y_title = if grouped { None } else { Some(results.columns[primary].as_str()) };
        let mut options = self.options(
            chart_title(intent, &results.columns[primary]),
            Some(&results.columns[entity]),
            y_title,
            results,
        );
        if grouped {
            options.barmode = Some("group".to_string());
        }
        let team_colors: Vec<String> = categories
            .iter()
            .filter_map(|c| match c {
                AxisValue::Text(name) => self.catalog.team_color(name).map(str::to_string),
                AxisValue::Number(_) => None,
            })
            .collect();
        if team_colors.len() == categories.len() && !grouped {
            options.palette = "team_colors".to_string();
            options.category_colors = team_colors;
        }

        Some(VisualizationSpec {
            kind: ChartKind::Bar,
            series,
            options,
        })
    }
}

impl ChartBuilder for DefaultChartBuilder {
    fn build(
        &self,
        results: &ResultSet,
        _metrics: &DerivedMetrics,
        intent: &Intent,
    ) -> Result<Option<VisualizationSpec>, VisualizationError> {
        if let Some(width) = results
            .rows
            .iter()
            .map(Vec::len)
            .find(|&w| w != results.columns.len())
        {
            return Err(VisualizationError::Inconsistent(format!(
                "row has {} values for {} columns",
                width,
                results.columns.len()
            )));
        }
        if results.is_empty() {
            return Ok(None);
        }

        let roles = ColumnRoles::infer(results);
        let Some(primary) = roles.primary_metric(results, intent) else {
            return Ok(None);
        };

        if results.len() == 1 {
            // A single number reads better as text than as a chart.
            return Ok(if roles.metrics.len() > 1 {
                self.stat_card(results, &roles, intent)
            } else {
                None
            });
        }

        // A season column holding one value is a filter echo, not an axis.
        let temporal = roles
            .temporal
            .or_else(|| {
                (0..results.columns.len()).find(|&i| {
                    i != primary && self.catalog.is_temporal(&results.columns[i]) && !roles.metrics.contains(&i)
                })
            })
            .filter(|&t| distinct_labels(results, t).len() >= MIN_POINTS);

        let spec = match (temporal, roles.entity) {
            (Some(t), entity) => self
                .line(results, &roles, intent, t, primary)
                .or_else(|| entity.and_then(|e| self.bar(results, &roles, intent, e, primary))),
            (None, Some(e)) => self.bar(results, &roles, intent, e, primary),
            (None, None) => None,
        };
        Ok(spec
            .filter(|s| s.point_count() >= MIN_POINTS)
            .map(|mut s| {
                if s.series.iter().all(|series| self.is_team(&series.name)) {
                    s.options.palette = "team_colors".to_string();
                }
                s
            }))
    }
}

fn distinct_labels(results: &ResultSet, column: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in results.column_values(column) {
        if !value.is_null() {
            let name = value.to_string();
            if !out.contains(&name) {
                out.push(name);
            }
        }
    }
    out
}

fn axis_value(value: &Scalar) -> AxisValue {
    match value {
        Scalar::Integer(v) => AxisValue::Number(*v as f64),
        Scalar::Real(v) => AxisValue::Number(*v),
        other => AxisValue::Text(other.to_string()),
    }
}

/// Collects (x, y) pairs, skipping rows where either side is missing.
fn points(
    results: &ResultSet,
    x: usize,
    y: usize,
    keep: impl Fn(&[Scalar]) -> bool,
) -> (Vec<AxisValue>, Vec<f64>) {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for row in results.rows.iter().filter(|r| keep(r)) {
        let (Some(xv), Some(yv)) = (row.get(x), row.get(y).and_then(Scalar::as_f64)) else {
            continue;
        };
        if xv.is_null() {
            continue;
        }
        xs.push(axis_value(xv));
        ys.push(yv);
    }
    (xs, ys)
}

fn requested_metrics(results: &ResultSet, roles: &ColumnRoles, intent: &Intent, primary: usize) -> Vec<usize> {
    let mut out = vec![primary];
    for wanted in &intent.metrics {
        let wanted = wanted.to_ascii_lowercase();
        if let Some(i) = roles
            .metrics
            .iter()
            .copied()
            .find(|&i| results.columns[i].to_ascii_lowercase().contains(&wanted))
        {
            if !out.contains(&i) {
                out.push(i);
            }
        }
    }
    out
}
