//! Tabular results returned by the executor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Numeric view of the value. Text is only numeric when it parses cleanly.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(v) => Some(*v as f64),
            Scalar::Real(v) if v.is_finite() => Some(*v),
            Scalar::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "n/a"),
            Scalar::Integer(v) => write!(f, "{}", v),
            Scalar::Real(v) => write!(f, "{}", crate::stats::format_number(*v)),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Ordered rows with a shared column list.
///
/// `truncated` is set by the executor when the underlying query produced more
/// rows than the cap; the rows kept are the first `rows.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
    pub truncated: bool,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Scalar>>, truncated: bool) -> Self {
        Self {
            columns,
            rows,
            truncated,
        }
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self::new(columns, Vec::new(), false)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn value(&self, row: usize, column: usize) -> Option<&Scalar> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Iterates one column top to bottom.
    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &Scalar> {
        self.rows.iter().filter_map(move |r| r.get(column))
    }

    /// A column is numeric when it holds at least one number and every
    /// non-null value is a number.
    pub fn is_numeric_column(&self, column: usize) -> bool {
        let mut seen = false;
        for value in self.column_values(column) {
            match value {
                Scalar::Null => {}
                Scalar::Integer(_) | Scalar::Real(_) => seen = true,
                Scalar::Text(_) => return false,
            }
        }
        seen
    }

    pub fn numeric_columns(&self) -> Vec<usize> {
        (0..self.columns.len())
            .filter(|&i| self.is_numeric_column(i))
            .collect()
    }

    /// Columns holding text labels (team names, player names, rounds).
    pub fn label_columns(&self) -> Vec<usize> {
        (0..self.columns.len())
            .filter(|&i| {
                self.column_values(i).any(|v| matches!(v, Scalar::Text(_)))
                    && !self.is_numeric_column(i)
            })
            .collect()
    }

    /// True when every cell is `Null`.
    pub fn all_null(&self) -> bool {
        self.rows.iter().flatten().all(Scalar::is_null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        ResultSet::new(
            vec!["team".into(), "wins".into(), "note".into()],
            vec![
                vec![Scalar::Text("Collingwood".into()), Scalar::Integer(18), Scalar::Null],
                vec![Scalar::Text("Brisbane Lions".into()), Scalar::Null, Scalar::Null],
            ],
            false,
        )
    }

    #[test]
    fn classifies_columns() {
        let rs = sample();
        assert_eq!(rs.numeric_columns(), vec![1]);
        assert_eq!(rs.label_columns(), vec![0]);
        assert_eq!(rs.column_index("WINS"), Some(1));
        assert!(!rs.all_null());
    }

    #[test]
    fn scalars_serialize_without_tags() {
        let json = serde_json::to_string(&vec![
            Scalar::Integer(3),
            Scalar::Text("x".into()),
            Scalar::Null,
        ])
        .unwrap();
        assert_eq!(json, r#"[3,"x",null]"#);
    }

    #[test]
    fn numeric_text_is_readable_as_number() {
        assert_eq!(Scalar::Text(" 12.5 ".into()).as_f64(), Some(12.5));
        assert_eq!(Scalar::Text("Round 1".into()).as_f64(), None);
        assert_eq!(Scalar::Real(f64::NAN).as_f64(), None);
    }
}
