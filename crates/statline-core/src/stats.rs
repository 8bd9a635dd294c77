//! Statistics over fetched rows: averages, trends, comparisons and rankings.
//!
//! Everything here is a pure function of the result set and intent. Values
//! are rounded to one decimal place.

use serde::{Deserialize, Serialize};

use crate::intent::{AnalysisType, Intent, IntentKind, OutputShape};
use crate::result::{ResultSet, Scalar};

/// Relative fitted change below which a trend counts as stable.
const STABLE_TREND_RATIO: f64 = 0.05;
const MAX_RANKED: usize = 10;
const RECENT_WINDOW: usize = 3;

/// Rounds to the display precision of one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Formats a number at display precision, dropping a trailing `.0`.
pub fn format_number(value: f64) -> String {
    let rounded = round1(value);
    if rounded.fract() == 0.0 {
        format!("{:.0}", rounded)
    } else {
        format!("{:.1}", rounded)
    }
}

/// Column names that order observations in time.
pub fn is_temporal_name(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    matches!(
        name.as_str(),
        "season" | "year" | "round" | "match_date" | "date" | "debut_year"
    ) || name.ends_with("_date")
        || name.ends_with("_season")
}

fn is_key_name(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name == "id" || name.ends_with("_id")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricSummary {
    /// The column had no numeric values; nothing to average.
    NoData,
    Data {
        count: usize,
        total: f64,
        mean: f64,
        median: f64,
        min: f64,
        max: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub column: String,
    pub summary: MetricSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub metric: String,
    pub over: String,
    pub points: Vec<TrendPoint>,
    pub direction: TrendDirection,
    pub change_pct: Option<f64>,
    pub recent_average: Option<f64>,
    pub historical_average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricLeader {
    pub metric: String,
    pub entity: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub entity_column: String,
    pub entities: Vec<String>,
    pub leaders: Vec<MetricLeader>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub rank: usize,
    pub entity: String,
    pub value: f64,
    pub percentile: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub metric: String,
    pub entity_column: String,
    pub entries: Vec<RankEntry>,
}

/// Summaries derived from one result set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub row_count: usize,
    pub averages: Vec<ColumnSummary>,
    pub primary_metric: Option<String>,
    pub trend: Option<TrendSummary>,
    pub comparison: Option<ComparisonSummary>,
    pub ranking: Option<Ranking>,
}

impl DerivedMetrics {
    pub fn average_of(&self, column: &str) -> Option<&MetricSummary> {
        self.averages
            .iter()
            .find(|c| c.column.eq_ignore_ascii_case(column))
            .map(|c| &c.summary)
    }

    /// Every number these metrics would put in front of a reader.
    pub fn reported_numbers(&self) -> Vec<f64> {
        let mut out = Vec::new();
        for column in &self.averages {
            if let MetricSummary::Data {
                count,
                total,
                mean,
                median,
                min,
                max,
            } = column.summary
            {
                out.extend([count as f64, total, mean, median, min, max]);
            }
        }
        if let Some(trend) = &self.trend {
            out.extend(trend.points.iter().map(|p| p.value));
            out.extend(trend.change_pct.map(f64::abs));
            out.extend(trend.recent_average);
            out.extend(trend.historical_average);
        }
        if let Some(comparison) = &self.comparison {
            out.extend(comparison.leaders.iter().map(|l| l.value));
        }
        if let Some(ranking) = &self.ranking {
            for entry in &ranking.entries {
                out.extend([entry.rank as f64, entry.value, entry.percentile]);
            }
        }
        out.push(self.row_count as f64);
        out
    }
}

/// Column roles inferred from a result set.
#[derive(Debug, Clone, Default)]
pub struct ColumnRoles {
    pub temporal: Option<usize>,
    pub entity: Option<usize>,
    pub metrics: Vec<usize>,
}

impl ColumnRoles {
    pub fn infer(results: &ResultSet) -> Self {
        let temporal = (0..results.columns.len()).find(|&i| is_temporal_name(&results.columns[i]));
        let entity = results
            .label_columns()
            .into_iter()
            .find(|&i| Some(i) != temporal);
        let metrics = results
            .numeric_columns()
            .into_iter()
            .filter(|&i| Some(i) != temporal && !is_key_name(&results.columns[i]))
            .collect();
        Self {
            temporal,
            entity,
            metrics,
        }
    }

    /// The metric the question is about: the first requested metric present
    /// in the results, else the first metric column.
    pub fn primary_metric(&self, results: &ResultSet, intent: &Intent) -> Option<usize> {
        intent
            .metrics
            .iter()
            .find_map(|wanted| {
                let wanted = wanted.to_ascii_lowercase();
                self.metrics
                    .iter()
                    .copied()
                    .find(|&i| results.columns[i].to_ascii_lowercase().contains(&wanted))
            })
            .or_else(|| self.metrics.first().copied())
    }
}

/// Computes the analyses the intent asks for.
pub fn summarize(results: &ResultSet, intent: &Intent) -> DerivedMetrics {
    let roles = ColumnRoles::infer(results);
    let primary = roles.primary_metric(results, intent);

    let averages = roles
        .metrics
        .iter()
        .map(|&i| ColumnSummary {
            column: results.columns[i].clone(),
            summary: summarize_column(results, i),
        })
        .collect();

    let wants_trend = intent.wants(AnalysisType::Trend)
        || intent.kind == IntentKind::Trend
        || intent.shape == OutputShape::Trend;
    let trend = match (wants_trend, roles.temporal, primary) {
        (true, Some(t), Some(m)) => trend(results, t, m),
        _ => None,
    };

    let comparison = match roles.entity {
        Some(e) if intent.wants(AnalysisType::Comparison) || intent.is_comparison() => {
            comparison(results, e, &roles.metrics)
        }
        _ => None,
    };

    let ranking = match (roles.entity, primary) {
        (Some(e), Some(m)) if intent.wants(AnalysisType::Rank) => ranking(results, e, m),
        _ => None,
    };

    DerivedMetrics {
        row_count: results.len(),
        averages,
        primary_metric: primary.map(|i| results.columns[i].clone()),
        trend,
        comparison,
        ranking,
    }
}

fn numbers(results: &ResultSet, column: usize) -> Vec<f64> {
    results
        .column_values(column)
        .filter_map(Scalar::as_f64)
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn summarize_column(results: &ResultSet, column: usize) -> MetricSummary {
    let mut values = numbers(results, column);
    let Some(avg) = mean(&values) else {
        return MetricSummary::NoData;
    };
    values.sort_by(f64::total_cmp);
    let n = values.len();
    let median = if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    };
    MetricSummary::Data {
        count: n,
        total: round1(values.iter().sum()),
        mean: round1(avg),
        median: round1(median),
        min: round1(values[0]),
        max: round1(values[n - 1]),
    }
}

fn label(value: &Scalar) -> String {
    value.to_string()
}

fn trend(results: &ResultSet, over: usize, metric: usize) -> Option<TrendSummary> {
    // Several entities per period collapse to the period mean.
    let mut buckets: Vec<(String, Option<f64>, Vec<f64>)> = Vec::new();
    for row in &results.rows {
        let (Some(x), Some(y)) = (row.get(over), row.get(metric).and_then(Scalar::as_f64)) else {
            continue;
        };
        if x.is_null() {
            continue;
        }
        let key = label(x);
        match buckets.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, values)) => values.push(y),
            None => buckets.push((key, x.as_f64(), vec![y])),
        }
    }
    if buckets.len() < 2 {
        return None;
    }
    if buckets.iter().all(|(_, order, _)| order.is_some()) {
        buckets.sort_by(|a, b| a.1.unwrap_or(0.0).total_cmp(&b.1.unwrap_or(0.0)));
    }

    let points: Vec<TrendPoint> = buckets
        .into_iter()
        .filter_map(|(label, _, values)| {
            mean(&values).map(|value| TrendPoint {
                label,
                value: round1(value),
            })
        })
        .collect();
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let n = values.len() as f64;
    let avg = mean(&values)?;

    let x_mean = (n - 1.0) / 2.0;
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - avg);
        den += dx * dx;
    }
    let slope = if den == 0.0 { 0.0 } else { num / den };
    let fitted_change = slope * (n - 1.0);
    let direction = if avg == 0.0 {
        if fitted_change.abs() < f64::EPSILON {
            TrendDirection::Stable
        } else if fitted_change > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        }
    } else if (fitted_change / avg.abs()).abs() < STABLE_TREND_RATIO {
        TrendDirection::Stable
    } else if fitted_change > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    let first = values[0];
    let last = values[values.len() - 1];
    let change_pct = (first != 0.0).then(|| round1((last - first) / first.abs() * 100.0));

    let (recent_average, historical_average) = if values.len() > RECENT_WINDOW {
        let split = values.len() - RECENT_WINDOW;
        (
            mean(&values[split..]).map(round1),
            mean(&values[..split]).map(round1),
        )
    } else {
        (None, None)
    };

    Some(TrendSummary {
        metric: results.columns[metric].clone(),
        over: results.columns[over].clone(),
        points,
        direction,
        change_pct,
        recent_average,
        historical_average,
    })
}

fn comparison(results: &ResultSet, entity: usize, metrics: &[usize]) -> Option<ComparisonSummary> {
    let mut entities: Vec<String> = Vec::new();
    for value in results.column_values(entity) {
        if !value.is_null() {
            let name = label(value);
            if !entities.contains(&name) {
                entities.push(name);
            }
        }
    }
    if entities.len() < 2 {
        return None;
    }

    let leaders = metrics
        .iter()
        .filter_map(|&m| {
            let mut best: Option<(String, f64)> = None;
            for row in &results.rows {
                let (Some(name), Some(value)) =
                    (row.get(entity), row.get(m).and_then(Scalar::as_f64))
                else {
                    continue;
                };
                if best.as_ref().is_none_or(|(_, v)| value > *v) {
                    best = Some((label(name), value));
                }
            }
            best.map(|(entity, value)| MetricLeader {
                metric: results.columns[m].clone(),
                entity,
                value: round1(value),
            })
        })
        .collect();

    Some(ComparisonSummary {
        entity_column: results.columns[entity].clone(),
        entities,
        leaders,
    })
}

fn ranking(results: &ResultSet, entity: usize, metric: usize) -> Option<Ranking> {
    let mut rows: Vec<(String, f64)> = results
        .rows
        .iter()
        .filter_map(|row| {
            let name = row.get(entity).filter(|v| !v.is_null())?;
            let value = row.get(metric).and_then(Scalar::as_f64)?;
            Some((label(name), value))
        })
        .collect();
    if rows.len() < 2 {
        return None;
    }
    rows.sort_by(|a, b| b.1.total_cmp(&a.1));
    let n = rows.len();
    let entries = rows
        .into_iter()
        .take(MAX_RANKED)
        .enumerate()
        .map(|(i, (entity, value))| RankEntry {
            rank: i + 1,
            entity,
            value: round1(value),
            percentile: round1((n - 1 - i) as f64 / (n - 1) as f64 * 100.0),
        })
        .collect();
    Some(Ranking {
        metric: results.columns[metric].clone(),
        entity_column: results.columns[entity].clone(),
        entries,
    })
}
