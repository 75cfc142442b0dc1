//! Ingest command: files → text → pipeline → schema history.
//!
//! `drift ingest` accepts a single file or a directory. Directories are
//! walked with the `[ingest]` include/exclude globs; `.git`, `target`, and
//! `node_modules` are always skipped. Files are processed in sorted path
//! order so repeated runs record versions in the same order.
//!
//! Input bytes are decoded as UTF-8 lossily; text extraction from PDFs or
//! images happens upstream.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use schema_drift_core::evolve::SchemaTracker;
use schema_drift_core::pipeline::{self, IngestReport};
use schema_drift_core::store::SchemaStore;

use crate::config::Config;
use crate::sqlite_store::SqliteSchemaStore;

/// One file to ingest and the source it is recorded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub source_id: String,
}

/// Options for [`run_ingest`], mirroring the command-line flags.
#[derive(Debug, Clone, Default)]
pub struct IngestArgs {
    pub source: Option<String>,
    pub version: Option<u32>,
    pub dry_run: bool,
    pub json: bool,
}

pub async fn run_ingest(config: &Config, path: &Path, args: &IngestArgs) -> Result<()> {
    let inputs = collect_inputs(config, path, args.source.as_deref())?;
    if inputs.is_empty() {
        bail!("No ingestible files found under {}", path.display());
    }
    if args.version.is_some() && inputs.len() > 1 {
        bail!("--version can only be used when ingesting a single file");
    }

    let store = SqliteSchemaStore::open(config).await?;

    let mut reports = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let text = read_text(&input.path)?;
        let report = if args.dry_run {
            preview_text(&store, config, &input.source_id, &text).await?
        } else {
            ingest_text(&store, config, &input.source_id, &text, args.version).await?
        };
        if !args.json {
            print_report(&input.path, &report, args.dry_run);
        }
        reports.push(report);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!("ok");
    }

    store.close().await;
    Ok(())
}

/// Ingest already-decoded text as the next version of `source_id`.
pub async fn ingest_text<S: SchemaStore + ?Sized>(
    store: &S,
    config: &Config,
    source_id: &str,
    text: &str,
    version_hint: Option<u32>,
) -> Result<IngestReport> {
    let tracker = SchemaTracker::new(store, config.tracker_options());
    let report = pipeline::ingest(
        &tracker,
        source_id,
        text,
        version_hint,
        &config.pipeline_options(),
    )
    .await
    .with_context(|| format!("Failed to ingest source '{}'", source_id))?;
    Ok(report)
}

/// What [`ingest_text`] would record, without recording it.
pub async fn preview_text<S: SchemaStore + ?Sized>(
    store: &S,
    config: &Config,
    source_id: &str,
    text: &str,
) -> Result<IngestReport> {
    let tracker = SchemaTracker::new(store, config.tracker_options());
    let report = pipeline::preview(&tracker, source_id, text, &config.pipeline_options())
        .await
        .with_context(|| format!("Failed to preview source '{}'", source_id))?;
    Ok(report)
}

/// Read a file as text, replacing invalid UTF-8 sequences.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Resolve `path` to the files to ingest.
///
/// A file is ingested as-is, under `source` or its file name. A directory
/// is walked; each match is recorded under `source`, or under its path
/// relative to the directory.
pub fn collect_inputs(config: &Config, path: &Path, source: Option<&str>) -> Result<Vec<InputFile>> {
    if !path.exists() {
        bail!("Input path does not exist: {}", path.display());
    }

    if path.is_file() {
        let source_id = match source {
            Some(s) => s.to_string(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
        };
        return Ok(vec![InputFile {
            path: path.to_path_buf(),
            source_id,
        }]);
    }

    let include_set = build_globset(&config.ingest.include_globs)?;

    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(config.ingest.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut inputs = Vec::new();
    let walker = WalkDir::new(path)
        .follow_links(config.ingest.follow_symlinks)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file = entry.path();
        let relative = file.strip_prefix(path).unwrap_or(file);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            tracing::debug!(path = %rel_str, "skipping file");
            continue;
        }

        inputs.push(InputFile {
            path: file.to_path_buf(),
            source_id: source.map(str::to_string).unwrap_or(rel_str),
        });
    }

    inputs.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(inputs)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

fn print_report(path: &Path, report: &IngestReport, dry_run: bool) {
    let counts = &report.fragment_counts;
    if dry_run {
        println!("ingest {} (dry-run)", path.display());
    } else {
        println!("ingest {}", path.display());
    }
    println!("  source: {}", report.schema.source_id);
    println!("  version: {}", report.schema.version);
    println!(
        "  fragments: {} (json {}, html_table {}, csv {}, key_value {}, raw_text {})",
        counts.total(),
        counts.json,
        counts.html_table,
        counts.csv,
        counts.key_value,
        counts.raw_text
    );
    println!("  records: {}", report.record_count);
    println!("  fields: {}", report.schema.summary.field_count);
    println!("  changes: {}", report.diff.migration_notes);
    if !report.warnings.is_empty() {
        println!("  warnings: {}", report.warnings.len());
        for w in &report.warnings {
            println!("    [{:?}] {}", w.kind, w.message);
        }
    }
}
