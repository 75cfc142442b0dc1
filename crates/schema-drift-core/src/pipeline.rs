//! End-to-end ingest: detect → normalize → infer → record.
//!
//! [`run_pipeline`] is the synchronous, side-effect-free part. [`ingest`]
//! adds the one step that touches shared state: appending the inferred
//! schema to the source's history through a [`SchemaTracker`].

use serde::Serialize;

use crate::detect::{self, DetectOptions};
use crate::error::EvolutionError;
use crate::evolve::SchemaTracker;
use crate::infer::{self, InferOptions};
use crate::models::{
    Fragment, FragmentCounts, InferredSchema, NormalizedRecord, Schema, SchemaDiff, Warning,
    WarningKind,
};
use crate::normalize;
use crate::store::SchemaStore;

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub detection: DetectOptions,
    pub inference: InferOptions,
}

/// Everything the pure stages produce for one buffer.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub fragments: Vec<Fragment>,
    pub records: Vec<NormalizedRecord>,
    pub schema: InferredSchema,
    pub fragment_counts: FragmentCounts,
    /// Detection, normalization, and inference warnings, in stage order.
    pub warnings: Vec<Warning>,
}

/// Result of a successful ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub schema: Schema,
    pub diff: SchemaDiff,
    pub fragment_counts: FragmentCounts,
    pub record_count: usize,
    pub warnings: Vec<Warning>,
}

pub fn run_pipeline(text: &str, opts: &PipelineOptions) -> Extraction {
    let detection = detect::detect_with(text, &opts.detection);
    let normalized = normalize::normalize_all(&detection.fragments);
    let inference = infer::infer_with(&normalized.records, &opts.inference);

    let mut warnings = detection.warnings;
    warnings.extend(normalized.warnings);
    warnings.extend(inference.warnings);
    for w in &warnings {
        match w.kind {
            WarningKind::Normalization => tracing::warn!(message = %w.message, "record dropped"),
            WarningKind::Detection | WarningKind::InferenceConflict => {
                tracing::debug!(kind = ?w.kind, message = %w.message, "pipeline warning")
            }
        }
    }

    let fragment_counts = FragmentCounts::from_fragments(&detection.fragments);
    tracing::debug!(
        fragments = fragment_counts.total(),
        records = normalized.records.len(),
        fields = inference.schema.fields.len(),
        "pipeline finished"
    );

    Extraction {
        fragments: detection.fragments,
        records: normalized.records,
        schema: inference.schema,
        fragment_counts,
        warnings,
    }
}

/// Run the pipeline over `text` and record the result as the next version
/// of `source_id`.
///
/// Stage warnings never fail the ingest. Only store errors, an unusable
/// `version_hint`, and exhausted conflict retries do; in those cases
/// nothing is recorded.
pub async fn ingest<S: SchemaStore + ?Sized>(
    tracker: &SchemaTracker<'_, S>,
    source_id: &str,
    text: &str,
    version_hint: Option<u32>,
    opts: &PipelineOptions,
) -> Result<IngestReport, EvolutionError> {
    let extraction = run_pipeline(text, opts);
    let entry = tracker
        .record(source_id, &extraction.schema, version_hint)
        .await?;
    Ok(IngestReport {
        schema: entry.schema,
        diff: entry.diff,
        fragment_counts: extraction.fragment_counts,
        record_count: extraction.records.len(),
        warnings: extraction.warnings,
    })
}

/// Like [`ingest`], but only computes the version and diff that would be
/// recorded. Nothing is appended.
pub async fn preview<S: SchemaStore + ?Sized>(
    tracker: &SchemaTracker<'_, S>,
    source_id: &str,
    text: &str,
    opts: &PipelineOptions,
) -> Result<IngestReport, EvolutionError> {
    let extraction = run_pipeline(text, opts);
    let entry = tracker.preview(source_id, &extraction.schema).await?;
    Ok(IngestReport {
        schema: entry.schema,
        diff: entry.diff,
        fragment_counts: extraction.fragment_counts,
        record_count: extraction.records.len(),
        warnings: extraction.warnings,
    })
}
