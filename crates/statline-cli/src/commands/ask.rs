use anyhow::{Result, bail};
use statline_application::App;
use statline_core::event::AskEvent;

use super::render;

/// Streams one answer. A workflow error becomes the command's error.
pub async fn run(app: &App, question: &str, conversation: Option<&str>, json: bool) -> Result<()> {
    let mut handle = app.service.ask(question, conversation);
    while let Some(event) = handle.recv().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        }
        if let AskEvent::Error { message } = &event {
            bail!("{}", message);
        }
        if !json {
            render::print_event(&event);
        }
        if event.is_terminal() {
            break;
        }
    }
    Ok(())
}
