use anyhow::{Result, bail};
use colored::Colorize;
use statline_application::build_validator;
use statline_core::config::AppConfig;

/// Prints the query as it would be executed, or why it would be refused.
pub fn check(config: &AppConfig, sql: &str) -> Result<()> {
    let validator = build_validator(config)?;
    match validator.validate_sql(sql) {
        Ok(query) => {
            println!("{}", query.sql());
            Ok(())
        }
        Err(rejection) => {
            eprintln!("{}", rejection.feedback().yellow());
            bail!("query rejected ({}): {}", rejection.code(), rejection)
        }
    }
}
