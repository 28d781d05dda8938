//! `conductor validate`: traceability report for tagged files.

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::output::{colored, output, table, CommandOutput};
use crate::domain::models::{ArtifactKind, Config, ValidationReport};
use crate::infrastructure::stores::FsArtifactStore;
use crate::services::TraceabilityValidator;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Root scanned for @SPEC/@TEST/@CODE/@DOC tags
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Labels to check; every tagged label under the root when omitted
    pub labels: Vec<String>,

    /// Report documentation-only gaps as advisories
    #[arg(long)]
    pub advisory_docs: bool,
}

#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub root: PathBuf,
    pub clean: bool,
    #[serde(flatten)]
    pub report: ValidationReport,
}

fn kinds_text(kinds: &[ArtifactKind]) -> String {
    kinds.iter().map(ArtifactKind::as_str).collect::<Vec<_>>().join(", ")
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        let total = self.report.complete.len() + self.report.incomplete.len() + self.report.advisories.len();
        if total == 0 {
            return format!("No labels found under {}", self.root.display());
        }

        let mut t = table(["Label", "Status", "Missing", "Locations"]);
        for unit in &self.report.complete {
            let locations: Vec<String> = unit
                .locations
                .values()
                .flatten()
                .map(ToString::to_string)
                .collect();
            t.add_row(vec![
                Cell::new(&unit.label),
                colored("complete", Color::Green),
                Cell::new("-"),
                Cell::new(locations.join("\n")),
            ]);
        }
        for finding in &self.report.advisories {
            t.add_row(vec![
                Cell::new(&finding.label),
                colored("advisory", Color::Yellow),
                Cell::new(kinds_text(&finding.missing)),
                Cell::new(format!("has {}", kinds_text(&finding.found))),
            ]);
        }
        for finding in &self.report.incomplete {
            t.add_row(vec![
                Cell::new(&finding.label),
                colored("incomplete", Color::Red),
                Cell::new(kinds_text(&finding.missing)),
                Cell::new(format!("has {}", kinds_text(&finding.found))),
            ]);
        }

        let verdict = if self.clean {
            "Traceability complete."
        } else {
            "Traceability incomplete."
        };
        format!("{t}\n{verdict}")
    }
}

async fn labels_under(store: &FsArtifactStore) -> Result<Vec<String>> {
    let index = store
        .scan()
        .await
        .with_context(|| format!("Failed to scan {}", store.root().display()))?;
    Ok(index.labels().into_iter().map(ToString::to_string).collect())
}

pub async fn execute(args: ValidateArgs, config: Config, json_mode: bool) -> Result<()> {
    let store = FsArtifactStore::new(&args.root).context("Failed to build artifact store")?;
    let labels = if args.labels.is_empty() {
        labels_under(&store).await?
    } else {
        args.labels.clone()
    };

    let require_documentation = config.traceability.require_documentation && !args.advisory_docs;
    let validator = TraceabilityValidator::new(vec![Arc::new(store)])
        .with_required_documentation(require_documentation);
    let report = validator
        .validate(&labels)
        .await
        .context("Traceability validation failed")?;

    let out = ValidateOutput {
        root: args.root,
        clean: report.is_clean(),
        report,
    };
    output(&out, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Finding;

    #[test]
    fn test_human_output_lists_missing_kinds() {
        let out = ValidateOutput {
            root: PathBuf::from("."),
            clean: false,
            report: ValidationReport {
                complete: Vec::new(),
                incomplete: vec![Finding {
                    label: "AUTH-001".to_string(),
                    missing: vec![ArtifactKind::Documentation],
                    found: vec![
                        ArtifactKind::Requirement,
                        ArtifactKind::Verification,
                        ArtifactKind::Implementation,
                    ],
                }],
                advisories: Vec::new(),
            },
        };
        let text = out.to_human();
        assert!(text.contains("AUTH-001"));
        assert!(text.contains("documentation"));
        assert!(text.contains("Traceability incomplete."));
    }

    #[tokio::test]
    async fn test_execute_discovers_labels() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        std::fs::write(
            dir.path().join("auth.md"),
            "@SPEC:AUTH-001\n@TEST:AUTH-001\n@CODE:AUTH-001\n@DOC:AUTH-001\n",
        )
        .expect("write");

        let store = FsArtifactStore::new(dir.path()).expect("store");
        assert_eq!(labels_under(&store).await.expect("scan"), vec!["AUTH-001".to_string()]);

        let args = ValidateArgs {
            root: dir.path().to_path_buf(),
            labels: Vec::new(),
            advisory_docs: false,
        };
        execute(args, Config::default(), true).await.expect("validate runs");
    }
}
