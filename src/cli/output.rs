//! Output formatting utilities for the CLI.
//!
//! Every command result is `Serialize` and renders either as pretty JSON
//! (`--json`) or as human text built from comfy-table tables.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use crate::domain::models::{PhaseStatus, SessionStatus, TaskStatus};

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum number of characters, appending "..."
/// if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Table with the shared preset and a bold header row.
pub fn table<I, S>(header: I) -> Table
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .into_iter()
                .map(|h| Cell::new(h.into()).add_attribute(Attribute::Bold)),
        );
    table
}

/// Cell coloured by `color` when the terminal supports it.
pub fn colored(text: impl ToString, color: Color) -> Cell {
    let cell = Cell::new(text.to_string());
    if console::colors_enabled() {
        cell.fg(color)
    } else {
        cell
    }
}

pub const fn task_status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Completed => Color::Green,
        TaskStatus::InProgress => Color::Cyan,
        TaskStatus::Blocked => Color::Magenta,
        TaskStatus::Pending => Color::White,
    }
}

pub const fn phase_status_color(status: PhaseStatus) -> Color {
    match status {
        PhaseStatus::Completed => Color::Green,
        PhaseStatus::Active => Color::Cyan,
        PhaseStatus::Blocked => Color::Magenta,
        PhaseStatus::Failed => Color::Red,
        PhaseStatus::Pending => Color::White,
    }
}

pub const fn session_status_color(status: SessionStatus) -> Color {
    match status {
        SessionStatus::Completed => Color::Green,
        SessionStatus::Active => Color::Cyan,
        SessionStatus::Blocked => Color::Magenta,
        SessionStatus::Failed => Color::Red,
        SessionStatus::Cancelled => Color::DarkGrey,
    }
}
