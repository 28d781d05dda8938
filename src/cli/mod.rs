//! Command-line interface.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use crate::cli::output::CommandOutput;

#[derive(Debug, serde::Serialize)]
struct ErrorOutput {
    error: String,
    causes: Vec<String>,
}

impl CommandOutput for ErrorOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("Error: {}", self.error)];
        for cause in &self.causes {
            lines.push(format!("  caused by: {cause}"));
        }
        lines.join("\n")
    }
}

/// Report a command failure and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let out = ErrorOutput {
        error: err.to_string(),
        causes: err.chain().skip(1).map(ToString::to_string).collect(),
    };
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&out.to_json()).unwrap_or_default());
    } else {
        eprintln!("{}", out.to_human());
    }
    std::process::exit(1);
}
