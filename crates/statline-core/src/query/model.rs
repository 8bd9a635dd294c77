use serde::{Deserialize, Serialize};

use crate::intent::{Intent, IntentKind};

/// Query text as produced by a generator. Untrusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuery {
    pub sql: String,
    /// 1-based generation attempt that produced this text.
    pub attempt: u32,
}

impl GeneratedQuery {
    pub fn new(sql: impl Into<String>, attempt: u32) -> Self {
        Self {
            sql: sql.into(),
            attempt,
        }
    }
}

/// A query that passed validation, re-rendered from its parsed form with a
/// row limit in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    sql: String,
    row_limit: u64,
    attempt: u32,
}

impl ValidatedQuery {
    pub(super) fn new(sql: String, row_limit: u64, attempt: u32) -> Self {
        Self {
            sql,
            row_limit,
            attempt,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn row_limit(&self) -> u64 {
        self.row_limit
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueryStrategy {
    /// One lookup, usually a filtered select with at most a single aggregate.
    DirectLookup,
    /// Grouping, joins across several tables, or derived per-period figures.
    Aggregation,
}

impl QueryStrategy {
    pub fn for_intent(intent: &Intent) -> Self {
        match intent.kind {
            IntentKind::SimpleStat if intent.entity_count() <= 1 => QueryStrategy::DirectLookup,
            _ => QueryStrategy::Aggregation,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            QueryStrategy::DirectLookup => {
                "Direct lookup: answer with one filtered SELECT returning as few rows as possible."
            }
            QueryStrategy::Aggregation => {
                "Aggregation: group and aggregate (per team, player or season) so each row is one entity or period."
            }
        }
    }
}
