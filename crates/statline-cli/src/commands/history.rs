//! Offline access to stored conversations. Needs neither the database nor
//! model credentials.

use anyhow::{Result, bail};
use colored::Colorize;
use statline_core::conversation::{ConversationRepository, Turn, TurnRole};
use statline_infrastructure::TomlConversationRepository;

use super::render;

pub async fn show(id: Option<&str>) -> Result<()> {
    let repository = TomlConversationRepository::default_location()?;
    match id {
        Some(id) => match repository.find_by_id(id).await? {
            Some(conversation) => print_turns(&conversation.redacted_turns()),
            None => bail!("no conversation '{}'", id),
        },
        None => {
            let conversations = repository.list_all().await?;
            if conversations.is_empty() {
                println!("{}", "No conversations yet.".bright_black());
            }
            for conversation in conversations {
                let opening = conversation
                    .turns
                    .iter()
                    .find(|t| t.role == TurnRole::User)
                    .map(|t| t.text.as_str())
                    .unwrap_or("");
                println!(
                    "{}  {}  {} turns  {}",
                    conversation.id.bright_magenta(),
                    conversation.updated_at.format("%Y-%m-%d %H:%M"),
                    conversation.turns.len(),
                    opening
                );
            }
        }
    }
    Ok(())
}

pub async fn forget(id: &str) -> Result<()> {
    TomlConversationRepository::default_location()?
        .delete(id)
        .await?;
    println!("{}", format!("Deleted conversation {}", id).green());
    Ok(())
}

pub fn print_turns(turns: &[Turn]) {
    for turn in turns {
        let stamp = turn.timestamp.format("%H:%M:%S").to_string();
        match turn.role {
            TurnRole::User => println!("{} {}", stamp.bright_black(), format!("> {}", turn.text).green()),
            TurnRole::Agent => {
                println!("{}", stamp.bright_black());
                for line in turn.text.lines() {
                    println!("{}", line.bright_blue());
                }
                if let Some(chart) = turn.visualization() {
                    println!("{}", render::chart_summary(chart).cyan());
                }
            }
        }
    }
}
