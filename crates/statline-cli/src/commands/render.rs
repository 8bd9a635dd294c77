//! Terminal rendering of ask events.

use colored::Colorize;
use statline_core::event::AskEvent;
use statline_core::visualization::{ChartKind, VisualizationSpec};

/// Prints one event. Progress goes to stderr so answers can be piped.
pub fn print_event(event: &AskEvent) {
    match event {
        AskEvent::Progress { message, .. } => {
            eprintln!("{}", message.bright_black());
        }
        AskEvent::Response {
            text,
            visualization,
            sources,
            truncated,
            ..
        } => {
            for line in text.lines() {
                println!("{}", line.bright_blue());
            }
            if let Some(chart) = visualization {
                println!("{}", chart_summary(chart).cyan());
            }
            if *truncated {
                println!("{}", "(results were truncated)".yellow());
            }
            if !sources.is_empty() {
                println!("{}", format!("Sources: {}", sources.join(", ")).bright_black());
            }
        }
        AskEvent::Complete { conversation_id } => {
            eprintln!("{}", format!("conversation: {}", conversation_id).bright_black());
        }
        AskEvent::Error { message } => {
            eprintln!("{}", message.red());
        }
    }
}

/// One-line description of a chart for terminals that cannot draw it.
pub fn chart_summary(chart: &VisualizationSpec) -> String {
    let kind = match chart.kind {
        ChartKind::Line => "line chart",
        ChartKind::Bar => "bar chart",
        ChartKind::Scalar => "stat card",
    };
    let series = chart.series.len();
    let mut summary = format!(
        "[{}: {} series, {} points",
        kind,
        series,
        chart.point_count()
    );
    if let Some(title) = &chart.options.title {
        summary.push_str(&format!(", \"{}\"", title));
    }
    summary.push(']');
    summary
}
