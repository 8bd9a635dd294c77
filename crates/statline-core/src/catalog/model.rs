use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

const BUILTIN_AFL_CATALOG: &str = include_str!("../../catalog/afl.toml");

/// Errors raised while loading a catalog.
///
/// Both variants are fatal at startup: nothing downstream can run without a
/// catalog to ground generation and validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("schema catalog not configured: {0}")]
    NotConfigured(String),

    #[error("schema catalog is invalid: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Date,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Real)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnType,
    #[serde(default)]
    pub description: String,
    /// Columns that order observations in time (season, round, dates).
    #[serde(default)]
    pub temporal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A join path, written as `table.column` on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRange {
    pub first: i32,
    pub last: i32,
}

impl SeasonRange {
    pub fn contains(&self, season: i32) -> bool {
        (self.first..=self.last).contains(&season)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamEntry {
    pub name: String,
    pub abbreviation: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub secondary_color: Option<String>,
}

impl TeamEntry {
    /// Every spelling that maps to this team without fuzzy matching.
    pub fn spellings(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(std::iter::once(self.abbreviation.as_str()))
            .chain(self.aliases.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Static, read-only description of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    pub name: String,
    /// Citation strings attached to data-backed answers.
    #[serde(default)]
    pub sources: Vec<String>,
    pub seasons: SeasonRange,
    #[serde(default)]
    pub tables: Vec<TableDef>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub teams: Vec<TeamEntry>,
    #[serde(default)]
    pub metrics: Vec<MetricEntry>,
}

impl SchemaCatalog {
    /// The AFL catalog compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(BUILTIN_AFL_CATALOG)
    }

    /// Loads a catalog from a TOML file.
    ///
    /// A missing or empty file is `NotConfigured`; a file that parses but
    /// contradicts itself is `Invalid`.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::NotConfigured(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        if content.trim().is_empty() {
            return Err(CatalogError::NotConfigured("catalog document is empty".into()));
        }
        let catalog: SchemaCatalog =
            toml::from_str(content).map_err(|e| CatalogError::Invalid(e.to_string()))?;
        catalog.check()?;
        Ok(catalog)
    }

    fn check(&self) -> Result<(), CatalogError> {
        if self.tables.is_empty() {
            return Err(CatalogError::NotConfigured(
                "catalog declares no tables".into(),
            ));
        }
        if self.seasons.first > self.seasons.last {
            return Err(CatalogError::Invalid(format!(
                "season range {}..{} is empty",
                self.seasons.first, self.seasons.last
            )));
        }
        for (i, table) in self.tables.iter().enumerate() {
            if table.columns.is_empty() {
                return Err(CatalogError::Invalid(format!(
                    "table '{}' has no columns",
                    table.name
                )));
            }
            if self.tables[..i]
                .iter()
                .any(|t| t.name.eq_ignore_ascii_case(&table.name))
            {
                return Err(CatalogError::Invalid(format!(
                    "table '{}' declared twice",
                    table.name
                )));
            }
        }
        for rel in &self.relationships {
            for end in [&rel.from, &rel.to] {
                let known = end
                    .split_once('.')
                    .is_some_and(|(t, c)| self.has_column(t, c));
                if !known {
                    return Err(CatalogError::Invalid(format!(
                        "relationship endpoint '{}' is not a catalog column",
                        end
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.table(table).and_then(|t| t.column(column)).is_some()
    }

    /// True when any table declares `column`.
    pub fn column_anywhere(&self, column: &str) -> bool {
        self.tables.iter().any(|t| t.column(column).is_some())
    }

    pub fn is_temporal(&self, column: &str) -> bool {
        self.tables
            .iter()
            .filter_map(|t| t.column(column))
            .any(|c| c.temporal)
    }

    pub fn season_range(&self) -> SeasonRange {
        self.seasons
    }

    /// Exact (case-insensitive) lookup on name, abbreviation or alias.
    pub fn resolve_team(&self, text: &str) -> Option<&TeamEntry> {
        let needle = text.trim();
        self.teams
            .iter()
            .find(|team| team.spellings().any(|s| s.eq_ignore_ascii_case(needle)))
    }

    pub fn resolve_metric(&self, text: &str) -> Option<&MetricEntry> {
        let needle = text.trim().replace('_', " ");
        self.metrics.iter().find(|m| {
            m.name.replace('_', " ").eq_ignore_ascii_case(&needle)
                || m.aliases.iter().any(|a| a.eq_ignore_ascii_case(&needle))
        })
    }

    pub fn team_color(&self, name: &str) -> Option<&str> {
        self.teams
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .and_then(|t| t.primary_color.as_deref())
    }

    pub fn team_names(&self) -> Vec<&str> {
        self.teams.iter().map(|t| t.name.as_str()).collect()
    }

    /// Renders the catalog as compact text for language model prompts.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Dataset: {} (seasons {}-{})",
            self.name, self.seasons.first, self.seasons.last
        );
        out.push_str("\nTables:\n");
        for table in &self.tables {
            let _ = writeln!(out, "- {}: {}", table.name, table.description);
            for column in &table.columns {
                let _ = write!(out, "    {} {}", column.name, column.kind);
                if !column.description.is_empty() {
                    let _ = write!(out, " -- {}", column.description);
                }
                out.push('\n');
            }
        }
        if !self.relationships.is_empty() {
            out.push_str("\nJoins:\n");
            for rel in &self.relationships {
                let _ = writeln!(out, "- {} = {}", rel.from, rel.to);
            }
        }
        if !self.teams.is_empty() {
            let _ = writeln!(out, "\nTeams (teams.name): {}", self.team_names().join(", "));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_loads() {
        let catalog = SchemaCatalog::builtin().unwrap();
        assert_eq!(catalog.teams.len(), 18);
        assert!(catalog.has_column("matches", "home_score"));
        assert!(catalog.has_column("MATCHES", "Season"));
        assert!(!catalog.has_column("teams", "season"));
        assert!(catalog.is_temporal("season"));
        assert!(!catalog.is_temporal("home_score"));
        assert!(catalog.season_range().contains(2023));
        assert!(!catalog.season_range().contains(1989));
    }

    #[test]
    fn empty_document_is_not_configured() {
        let err = SchemaCatalog::from_toml_str("   \n").unwrap_err();
        assert!(matches!(err, CatalogError::NotConfigured(_)));
    }

    #[test]
    fn missing_file_is_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let err = SchemaCatalog::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CatalogError::NotConfigured(_)));
    }

    #[test]
    fn catalog_without_tables_is_not_configured() {
        let doc = "name = \"x\"\n[seasons]\nfirst = 2000\nlast = 2001\n";
        let err = SchemaCatalog::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, CatalogError::NotConfigured(_)));
    }

    #[test]
    fn relationship_to_unknown_column_is_invalid() {
        let doc = r#"
name = "x"
[seasons]
first = 2000
last = 2001
[[tables]]
name = "a"
[[tables.columns]]
name = "id"
type = "integer"
[[relationships]]
from = "a.id"
to = "b.id"
"#;
        let err = SchemaCatalog::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, CatalogError::Invalid(_)));
    }

    #[test]
    fn team_lookup_uses_aliases_and_abbreviations() {
        let catalog = SchemaCatalog::builtin().unwrap();
        assert_eq!(catalog.resolve_team("cats").unwrap().name, "Geelong");
        assert_eq!(catalog.resolve_team("RIC").unwrap().name, "Richmond");
        assert_eq!(catalog.resolve_team(" Collingwood ").unwrap().name, "Collingwood");
        assert!(catalog.resolve_team("Foobar FC").is_none());
        assert_eq!(catalog.team_color("collingwood"), Some("#000000"));
    }

    #[test]
    fn metric_lookup_uses_aliases() {
        let catalog = SchemaCatalog::builtin().unwrap();
        assert_eq!(catalog.resolve_metric("victories").unwrap().name, "wins");
        assert_eq!(catalog.resolve_metric("brownlow votes").unwrap().name, "brownlow_votes");
        assert!(catalog.resolve_metric("vibes").is_none());
    }

    #[test]
    fn describe_lists_tables_and_joins() {
        let text = SchemaCatalog::builtin().unwrap().describe();
        assert!(text.contains("- matches:"));
        assert!(text.contains("matches.home_team_id = teams.id"));
        assert!(text.contains("Collingwood"));
    }
}
