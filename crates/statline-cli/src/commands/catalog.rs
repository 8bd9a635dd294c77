use anyhow::Result;
use statline_application::load_catalog;
use statline_core::config::AppConfig;

pub fn describe(config: &AppConfig) -> Result<()> {
    let catalog = load_catalog(&config.catalog)?;
    print!("{}", catalog.describe());
    Ok(())
}
