//! Cleanup for raw model replies.

use statline_core::intent::UnderstandError;

const EXCERPT_CHARS: usize = 200;

/// Returns the body of the first fenced block, or the trimmed reply when it
/// has no fence.
pub(crate) fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };
    let after_open = &trimmed[open + 3..];
    // Skip the info string (`json`, `sql`, ...) up to the end of the line.
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

pub(crate) fn excerpt(text: &str) -> String {
    let mut out: String = text.chars().take(EXCERPT_CHARS).collect();
    if text.chars().count() > EXCERPT_CHARS {
        out.push_str("...");
    }
    out
}

pub(crate) fn unreadable(reason: &str, reply: &str) -> UnderstandError {
    UnderstandError::Unreadable(format!("{}: {}", reason, excerpt(reply)))
}
