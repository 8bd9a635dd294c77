use thiserror::Error;

/// The only text a user ever sees about a rejected query.
pub const REJECTION_USER_MESSAGE: &str = "I can't run that query safely.";

/// Why the validator refused a query.
///
/// `code()` is the machine-readable reason for logs; `Display` carries the
/// detail. Neither leaves the server.
#[derive(Error, Debug, Clone, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Rejection {
    #[error("query is empty")]
    EmptyQuery,

    #[error("query is {length} characters, limit is {max}")]
    TooLong { length: usize, max: usize },

    #[error("forbidden keyword {0}")]
    ForbiddenKeyword(String),

    #[error("query does not parse: {0}")]
    ParseError(String),

    #[error("only SELECT statements are allowed, found {0}")]
    NotSelect(String),

    #[error("SELECT INTO is not allowed")]
    SelectInto,

    #[error("row locking clauses are not allowed")]
    RowLocking,

    #[error("recursive common table expressions are not allowed")]
    RecursiveCte,

    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),

    #[error("unknown table {0}")]
    UnknownTable(String),

    #[error("unknown column {0}")]
    UnknownColumn(String),

    #[error("system table {0}")]
    SystemTable(String),

    #[error("{0} statements found, exactly one is allowed")]
    MultipleStatements(usize),

    #[error("subqueries nested {depth} deep, limit is {max}")]
    TooDeep { depth: usize, max: usize },

    #[error("LIMIT/OFFSET must be integer literals")]
    UnsupportedLimit,

    #[error("comments are not allowed")]
    Comment,

    #[error("statement separators are not allowed")]
    StatementSeparator,

    #[error("function {0} is not allowed")]
    DangerousFunction(String),
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        self.into()
    }

    /// Constraint handed back to the generator on the next attempt.
    pub fn feedback(&self) -> String {
        match self {
            Rejection::UnknownTable(name) => format!(
                "The previous query used table `{}`, which does not exist. Use only the listed tables.",
                name
            ),
            Rejection::UnknownColumn(name) => format!(
                "The previous query used column `{}`, which does not exist. Use only the listed columns and single quotes for text values.",
                name
            ),
            Rejection::ParseError(_) => {
                "The previous query was not valid SQLite. Return one plain SELECT statement.".to_string()
            }
            Rejection::Comment | Rejection::StatementSeparator | Rejection::MultipleStatements(_) => {
                "Return exactly one SELECT statement with no comments and no semicolons.".to_string()
            }
            Rejection::TooLong { max, .. } => {
                format!("The previous query was too long. Keep it under {} characters.", max)
            }
            Rejection::TooDeep { max, .. } => {
                format!("The previous query nested too many subqueries. Use at most {} levels.", max)
            }
            other => format!(
                "The previous query was rejected ({}). Return one read-only SELECT over the listed tables.",
                other.code()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_snake_case() {
        assert_eq!(Rejection::ForbiddenKeyword("DROP".into()).code(), "forbidden_keyword");
        assert_eq!(Rejection::TooDeep { depth: 5, max: 3 }.code(), "too_deep");
        assert_eq!(Rejection::SystemTable("sqlite_master".into()).code(), "system_table");
    }

    #[test]
    fn user_message_never_carries_detail() {
        let rejection = Rejection::UnknownColumn("password".into());
        assert!(!REJECTION_USER_MESSAGE.contains("password"));
        assert!(rejection.to_string().contains("password"));
    }
}
