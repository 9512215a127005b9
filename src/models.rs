//! Core data models used throughout Originscan.
//!
//! These types represent the submission, the materialized source files, and
//! the match records that flow through the analysis pipeline. All of them are
//! request-scoped values: nothing here is persisted or shared between calls.

use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// The kind of submission presented for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionKind {
    /// An uploaded `.zip` archive, extracted into the work directory.
    Archive,
    /// A literal code snippet pasted by the submitter.
    Paste,
    /// A remote git repository, shallow-cloned into the work directory.
    Url,
}

impl SubmissionKind {
    /// Parse a kind string as used on the CLI and in stored reports.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "archive" => Ok(Self::Archive),
            "paste" => Ok(Self::Paste),
            "url" => Ok(Self::Url),
            other => bail!(
                "Unknown submission kind: '{}'. Available: archive, paste, url",
                other
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Paste => "paste",
            Self::Url => "url",
        }
    }
}

/// One materialized file of a submission.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the submission root (or a synthetic name for pastes).
    pub path: String,
    /// UTF-8 file content.
    pub content: String,
}

/// The materialized submission: an ordered set of readable source files.
///
/// Ordering is deterministic (sorted by relative path) so that downstream
/// match concatenation is reproducible across runs.
#[derive(Debug, Clone)]
pub struct SourceSet {
    pub root: PathBuf,
    pub files: Vec<SourceFile>,
}

impl SourceSet {
    /// The leading files used as representative content for remote lookups.
    pub fn probe_files(&self, count: usize) -> &[SourceFile] {
        &self.files[..count.min(self.files.len())]
    }
}

/// A reported correspondence between submitted code and some source.
///
/// Produced by the local duplicate detector or by a remote search service;
/// the shape is uniform regardless of origin. Matches are not deduplicated
/// across services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityMatch {
    /// URL or file path of the matched source.
    pub source_location: String,
    /// Human-readable label (a title, or a path within a repository).
    pub label: String,
    /// Relevance metric as reported by the producing service.
    pub score: f64,
}

/// The aggregated outcome of one analysis request.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub id: Uuid,
    pub kind: SubmissionKind,
    /// The raw payload the request was made with (text, path, or URL).
    pub payload: String,
    /// Aggregate score in `[0, 100]`; see `analyze::similarity_score`.
    pub similarity_score: u32,
    /// All matches, in collaborator concatenation order.
    pub matches: Vec<SimilarityMatch>,
    /// Classifier verdict, verbatim, or `None` when no detection ran.
    pub ai_detection: Option<serde_json::Value>,
    pub analyzed_at: DateTime<Utc>,
}
