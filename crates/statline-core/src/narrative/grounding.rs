use once_cell::sync::Lazy;
use regex::Regex;

use super::NarrativeRequest;
use crate::result::Scalar;
use crate::stats::round1;

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-?\d{1,3}(?:,\d{3})+(?:\.\d+)?|-?\d+(?:\.\d+)?")
        .expect("number pattern is valid")
});

/// Small counts ("top 3", "2 teams") are never treated as claims.
const FREE_INTEGERS: std::ops::RangeInclusive<i64> = 0..=10;
const TOLERANCE: f64 = 0.051;

/// Numbers a narrative may state: every cell, every derived figure, the
/// question's own numbers and the seasons and rounds it resolved to.
pub fn grounded_numbers(request: &NarrativeRequest<'_>) -> Vec<f64> {
    let mut out = request.metrics.reported_numbers();
    for row in &request.results.rows {
        for cell in row {
            match cell {
                Scalar::Integer(v) => out.push(*v as f64),
                Scalar::Real(v) => {
                    out.push(*v);
                    out.push(round1(*v));
                }
                Scalar::Text(text) => out.extend(numbers_in(text)),
                Scalar::Null => {}
            }
        }
    }
    out.extend(numbers_in(request.question));
    out.extend(request.intent.seasons.iter().map(|s| f64::from(*s)));
    for round in &request.intent.rounds {
        out.extend(numbers_in(round));
    }
    out.push(request.results.len() as f64);
    out
}

/// Numbers in `text` that nothing in the request backs.
pub fn ungrounded_numbers(text: &str, request: &NarrativeRequest<'_>) -> Vec<String> {
    let allowed = grounded_numbers(request);
    NUMBER
        .find_iter(text)
        .filter(|m| {
            let Some(value) = parse(m.as_str()) else {
                return false;
            };
            if value.fract() == 0.0 && FREE_INTEGERS.contains(&(value as i64)) {
                return false;
            }
            !allowed
                .iter()
                .any(|a| (a - value).abs() < TOLERANCE || (a.abs() - value.abs()).abs() < TOLERANCE)
        })
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Catalog teams named in `text` that neither the rows, the question nor the
/// resolved intent mention. Longer names are matched first so "North
/// Melbourne" does not also count as "Melbourne".
pub fn ungrounded_teams(text: &str, request: &NarrativeRequest<'_>) -> Vec<String> {
    let mut names: Vec<&str> = request.catalog.teams.iter().map(|t| t.name.as_str()).collect();
    names.sort_by_key(|name| std::cmp::Reverse(name.len()));

    let cells: Vec<String> = request
        .results
        .rows
        .iter()
        .flatten()
        .filter_map(|cell| match cell {
            Scalar::Text(text) => Some(text.to_lowercase()),
            _ => None,
        })
        .collect();
    let question = request.question.to_lowercase();

    let mut remaining = text.to_string();
    let mut out = Vec::new();
    for name in names {
        if !blank_mentions(&mut remaining, name) {
            continue;
        }
        let lower = name.to_lowercase();
        let backed = cells.iter().any(|cell| cell.contains(&lower))
            || question.contains(&lower)
            || request.intent.teams.iter().any(|t| t.as_str() == name);
        if !backed {
            out.push(name.to_string());
        }
    }
    out
}

/// Replaces whole-word occurrences of `name` with spaces. True if any was found.
fn blank_mentions(text: &mut String, name: &str) -> bool {
    let mut found = false;
    let mut from = 0;
    while let Some(offset) = text[from..].find(name) {
        let start = from + offset;
        let end = start + name.len();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        let whole = !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric);
        if whole {
            text.replace_range(start..end, &" ".repeat(name.len()));
            found = true;
        }
        from = end;
    }
    found
}

fn parse(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

fn numbers_in(text: &str) -> Vec<f64> {
    NUMBER.find_iter(text).filter_map(|m| parse(m.as_str())).collect()
}
