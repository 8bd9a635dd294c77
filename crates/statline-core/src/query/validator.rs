use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::Arc;

use sqlparser::ast::{
    Expr, ObjectName, Query, SelectItem, SetExpr, Statement, TableFactor, Value, Visit, Visitor,
};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};

use super::{GeneratedQuery, Rejection, ValidatedQuery};
use crate::catalog::SchemaCatalog;

/// Verbs that mutate data or schema, or reach outside the dataset.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE",
    "EXEC", "EXECUTE", "CALL", "DECLARE", "ATTACH", "DETACH", "PRAGMA", "VACUUM", "REINDEX",
    "MERGE", "UPSERT",
];

const DANGEROUS_FUNCTIONS: &[&str] = &[
    "load_extension",
    "readfile",
    "writefile",
    "edit",
    "fts3_tokenizer",
];

const SYSTEM_PREFIXES: &[&str] = &["sqlite_", "pragma_", "pg_"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorLimits {
    pub max_query_length: usize,
    pub max_subquery_depth: usize,
    /// Row cap of the executor. The injected LIMIT is one more than this so
    /// the executor can tell a full page from a truncated one.
    pub max_rows: u64,
}

impl Default for ValidatorLimits {
    fn default() -> Self {
        Self {
            max_query_length: 4000,
            max_subquery_depth: 3,
            max_rows: 500,
        }
    }
}

/// Static gate between generated SQL and the executor.
///
/// Checks run in a fixed order: statement type, references, structural
/// limits, then the blocklist. The first failure wins. Nothing is repaired
/// except the row limit, which is injected or lowered.
#[derive(Debug, Clone)]
pub struct QueryValidator {
    catalog: Arc<SchemaCatalog>,
    limits: ValidatorLimits,
}

impl QueryValidator {
    pub fn new(catalog: Arc<SchemaCatalog>, limits: ValidatorLimits) -> Self {
        Self { catalog, limits }
    }

    pub fn limits(&self) -> ValidatorLimits {
        self.limits
    }

    pub fn validate(&self, query: &GeneratedQuery) -> Result<ValidatedQuery, Rejection> {
        self.check(&query.sql, query.attempt)
    }

    /// Validates raw SQL outside of a generation attempt.
    pub fn validate_sql(&self, sql: &str) -> Result<ValidatedQuery, Rejection> {
        self.check(sql, 0)
    }

    fn check(&self, sql: &str, attempt: u32) -> Result<ValidatedQuery, Rejection> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(Rejection::EmptyQuery);
        }
        let length = sql.chars().count();
        if length > self.limits.max_query_length {
            return Err(Rejection::TooLong {
                length,
                max: self.limits.max_query_length,
            });
        }

        let dialect = SQLiteDialect {};
        let tokens = Tokenizer::new(&dialect, sql)
            .tokenize()
            .map_err(|e| Rejection::ParseError(e.to_string()))?;

        // 1. statement type
        for token in &tokens {
            if let Token::Word(word) = token {
                if word.quote_style.is_none() {
                    let upper = word.value.to_ascii_uppercase();
                    if FORBIDDEN_KEYWORDS.contains(&upper.as_str()) {
                        return Err(Rejection::ForbiddenKeyword(upper));
                    }
                }
            }
        }
        let mut statements =
            Parser::parse_sql(&dialect, sql).map_err(|e| Rejection::ParseError(e.to_string()))?;
        for statement in &statements {
            if !matches!(statement, Statement::Query(_)) {
                let verb = statement
                    .to_string()
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_ascii_uppercase();
                return Err(Rejection::NotSelect(verb));
            }
        }
        let mut facts = QueryFacts::default();
        for statement in &statements {
            let _ = statement.visit(&mut facts);
        }
        if let Some(violation) = facts.shape_violations.first() {
            return Err(violation.clone());
        }

        // 2. references
        self.check_references(&facts)?;

        // 3. structural limits
        if statements.len() != 1 {
            return Err(Rejection::MultipleStatements(statements.len()));
        }
        let nesting = facts.max_depth.saturating_sub(1);
        if nesting > self.limits.max_subquery_depth {
            return Err(Rejection::TooDeep {
                depth: nesting,
                max: self.limits.max_subquery_depth,
            });
        }
        if let Some(violation) = facts.structural_violations.first() {
            return Err(violation.clone());
        }
        let Some(Statement::Query(query)) = statements.first_mut() else {
            return Err(Rejection::NotSelect(String::new()));
        };
        let row_limit = self.apply_row_limit(query)?;

        // 4. blocklist
        for token in &tokens {
            match token {
                Token::Whitespace(Whitespace::SingleLineComment { .. })
                | Token::Whitespace(Whitespace::MultiLineComment(_)) => {
                    return Err(Rejection::Comment);
                }
                Token::SemiColon => return Err(Rejection::StatementSeparator),
                _ => {}
            }
        }
        if let Some(function) = facts.functions.iter().find(|f| is_dangerous_function(f)) {
            return Err(Rejection::DangerousFunction(function.clone()));
        }

        let rendered = statements
            .first()
            .map(|s| s.to_string())
            .unwrap_or_default();
        tracing::debug!(target: "statline::validator", row_limit, "[Validator] accepted query");
        Ok(ValidatedQuery::new(rendered, row_limit, attempt))
    }

    fn check_references(&self, facts: &QueryFacts) -> Result<(), Rejection> {
        for parts in &facts.relations {
            let name = parts.join(".");
            if parts.iter().any(|p| is_system_name(p)) {
                return Err(Rejection::SystemTable(name));
            }
            let table = match parts.as_slice() {
                [table] => table,
                [schema, table] if schema == "main" => table,
                _ => return Err(Rejection::UnknownTable(name)),
            };
            let is_cte = parts.len() == 1 && facts.ctes.contains(table);
            if !is_cte && !self.catalog.has_table(table) {
                return Err(Rejection::UnknownTable(name));
            }
        }

        let loose = |column: &str| {
            self.catalog.column_anywhere(column) || facts.output_names.contains(column)
        };
        for (qualifier, column) in &facts.columns {
            let known = match qualifier {
                None => loose(column),
                Some(q) => match facts.aliases.get(q) {
                    Some(Some(table)) if self.catalog.has_table(table) => {
                        self.catalog.has_column(table, column)
                    }
                    // derived tables and aliased CTEs expose computed columns
                    Some(_) => loose(column),
                    None if facts.ctes.contains(q) => loose(column),
                    None => self.catalog.has_column(q, column),
                },
            };
            if !known {
                let name = match qualifier {
                    Some(q) => format!("{}.{}", q, column),
                    None => column.clone(),
                };
                return Err(Rejection::UnknownColumn(name));
            }
        }
        Ok(())
    }

    /// Injects `LIMIT max_rows + 1`, or lowers a larger literal limit.
    fn apply_row_limit(&self, query: &mut Query) -> Result<u64, Rejection> {
        let cap = self.limits.max_rows.saturating_add(1);
        if let Some(offset) = &query.offset {
            if !matches!(offset.value, Expr::Value(Value::Number(_, _))) {
                return Err(Rejection::UnsupportedLimit);
            }
        }
        let requested = match &query.limit {
            None => None,
            Some(Expr::Value(Value::Number(n, _))) => {
                Some(n.parse::<u64>().map_err(|_| Rejection::UnsupportedLimit)?)
            }
            Some(_) => return Err(Rejection::UnsupportedLimit),
        };
        match requested {
            Some(n) if n <= cap => Ok(n),
            _ => {
                query.limit = Some(Expr::Value(Value::Number(cap.to_string(), false)));
                Ok(cap)
            }
        }
    }
}

fn is_system_name(name: &str) -> bool {
    name == "information_schema" || SYSTEM_PREFIXES.iter().any(|p| name.starts_with(p))
}

fn is_dangerous_function(name: &str) -> bool {
    DANGEROUS_FUNCTIONS.contains(&name) || name.starts_with("sqlite_")
}

fn lower(value: &str) -> String {
    value.to_ascii_lowercase()
}

/// Everything the checks need, gathered in one walk of the AST.
#[derive(Default)]
struct QueryFacts {
    depth: usize,
    max_depth: usize,
    shape_violations: Vec<Rejection>,
    structural_violations: Vec<Rejection>,
    relations: Vec<Vec<String>>,
    /// alias -> aliased relation, `None` for derived tables
    aliases: HashMap<String, Option<String>>,
    ctes: HashSet<String>,
    output_names: HashSet<String>,
    columns: Vec<(Option<String>, String)>,
    functions: Vec<String>,
}

impl QueryFacts {
    fn inspect_body(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => {
                if select.into.is_some() {
                    self.shape_violations.push(Rejection::SelectInto);
                }
                for item in &select.projection {
                    if let SelectItem::ExprWithAlias { alias, .. } = item {
                        self.output_names.insert(lower(&alias.value));
                    }
                }
            }
            SetExpr::Query(_) => {}
            SetExpr::SetOperation { left, right, .. } => {
                self.inspect_body(left);
                self.inspect_body(right);
            }
            SetExpr::Values(_) => self
                .shape_violations
                .push(Rejection::NotSelect("VALUES".into())),
            other => {
                let verb = other
                    .to_string()
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_ascii_uppercase();
                self.shape_violations.push(Rejection::NotSelect(verb));
            }
        }
    }
}

impl Visitor for QueryFacts {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
        if let Some(with) = &query.with {
            if with.recursive {
                self.shape_violations.push(Rejection::RecursiveCte);
            }
            for cte in &with.cte_tables {
                self.ctes.insert(lower(&cte.alias.name.value));
            }
        }
        if !query.locks.is_empty() {
            self.shape_violations.push(Rejection::RowLocking);
        }
        if query.for_clause.is_some() {
            self.shape_violations
                .push(Rejection::UnsupportedConstruct("FOR clause".into()));
        }
        if query.fetch.is_some() || !query.limit_by.is_empty() {
            self.structural_violations.push(Rejection::UnsupportedLimit);
        }
        self.inspect_body(&query.body);
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.depth = self.depth.saturating_sub(1);
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        self.relations
            .push(relation.0.iter().map(|ident| lower(&ident.value)).collect());
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, factor: &TableFactor) -> ControlFlow<Self::Break> {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                if let Some(alias) = alias {
                    let table = name.0.last().map(|ident| lower(&ident.value));
                    self.aliases.insert(lower(&alias.name.value), table);
                }
            }
            TableFactor::Derived { alias, .. } => {
                if let Some(alias) = alias {
                    self.aliases.insert(lower(&alias.name.value), None);
                }
            }
            TableFactor::NestedJoin { .. } => {}
            _ => self
                .shape_violations
                .push(Rejection::UnsupportedConstruct("table function".into())),
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        match expr {
            Expr::Identifier(ident) => self.columns.push((None, lower(&ident.value))),
            Expr::CompoundIdentifier(parts) => {
                if let [.., qualifier, column] = parts.as_slice() {
                    self.columns
                        .push((Some(lower(&qualifier.value)), lower(&column.value)));
                }
            }
            Expr::Function(function) => {
                if let Some(name) = function.name.0.last() {
                    self.functions.push(lower(&name.value));
                }
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }
}
