//! `drift detect`: show how a file splits into fragments without touching
//! the schema database.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use schema_drift_core::detect;
use schema_drift_core::models::{Fragment, FragmentCounts, Warning};

use crate::config::Config;
use crate::ingest::read_text;

/// Width of the text preview printed per fragment.
const PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, Serialize)]
pub struct DetectReport {
    pub fragments: Vec<Fragment>,
    pub fragment_counts: FragmentCounts,
    pub warnings: Vec<Warning>,
}

pub fn detect_text(config: &Config, text: &str) -> DetectReport {
    let detection = detect::detect_with(text, &config.pipeline_options().detection);
    DetectReport {
        fragment_counts: FragmentCounts::from_fragments(&detection.fragments),
        fragments: detection.fragments,
        warnings: detection.warnings,
    }
}

pub fn run_detect(config: &Config, path: &Path, json: bool) -> Result<()> {
    let text = read_text(path)?;
    let report = detect_text(config, &text);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{:<4} {:<11} {:<16} TEXT", "#", "KIND", "SPAN");
    for (i, fragment) in report.fragments.iter().enumerate() {
        let span = format!("{}..{}", fragment.span.start, fragment.span.end);
        println!(
            "{:<4} {:<11} {:<16} {}",
            i,
            fragment.kind().as_str(),
            span,
            preview(fragment.text(&text))
        );
    }
    for w in &report.warnings {
        println!("warning: {}", w.message);
    }
    println!("fragments: {}", report.fragment_counts.total());
    Ok(())
}

fn preview(text: &str) -> String {
    let flat: String = text
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}
