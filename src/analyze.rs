//! The submission analyzer.
//!
//! Orchestrates one analysis request: materialize the submission, run the
//! local similarity detector (archive submissions), query each snippet-search
//! service with representative content, invoke the AI-authorship classifier,
//! and fold everything into an [`AnalysisReport`].
//!
//! Collaborator failures are recovered per collaborator: a failing service is
//! logged and contributes zero matches (or an absent verdict) while the rest
//! of the pipeline proceeds. Only acquisition failure aborts the request.

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use crate::acquire;
use crate::classify::{create_classifier, AuthorshipClassifier};
use crate::config::Config;
use crate::detector::{FingerprintDetector, SimilarityDetector};
use crate::models::{AnalysisReport, SourceSet, SubmissionKind};
use crate::search::SearchRegistry;

/// Orchestrator for analysis requests.
///
/// Holds the collaborators for its lifetime; each [`analyze`](Self::analyze)
/// call is independent and shares no state with other calls.
pub struct Analyzer {
    config: Config,
    detector: Box<dyn SimilarityDetector>,
    searches: SearchRegistry,
    classifier: Option<Box<dyn AuthorshipClassifier>>,
}

impl Analyzer {
    /// Build an analyzer with explicit collaborators.
    pub fn new(
        config: Config,
        detector: Box<dyn SimilarityDetector>,
        searches: SearchRegistry,
        classifier: Option<Box<dyn AuthorshipClassifier>>,
    ) -> Self {
        Self {
            config,
            detector,
            searches,
            classifier,
        }
    }

    /// Build an analyzer with the configured collaborators: the fingerprint
    /// detector, the enabled search services, and the configured classifier.
    pub fn from_config(config: &Config) -> Result<Self> {
        let detector = Box::new(FingerprintDetector::new(&config.similarity));
        let searches = SearchRegistry::from_config(config);
        let classifier = create_classifier(&config.ai)?;
        Ok(Self::new(config.clone(), detector, searches, classifier))
    }

    /// Analyze one submission.
    ///
    /// `payload` is the pasted text, the archive path, or the repository URL
    /// depending on `kind`. Returns an error only when the submission cannot
    /// be materialized; every collaborator failure degrades the report
    /// instead of failing the call.
    pub async fn analyze(&self, kind: SubmissionKind, payload: &str) -> Result<AnalysisReport> {
        let sources = acquire::materialize(&self.config, kind, payload)?;
        self.analyze_sources(kind, payload, &sources).await
    }

    /// Run the collaborator pipeline over an already-materialized file set.
    pub async fn analyze_sources(
        &self,
        kind: SubmissionKind,
        payload: &str,
        sources: &SourceSet,
    ) -> Result<AnalysisReport> {
        tracing::debug!(
            kind = kind.as_str(),
            files = sources.files.len(),
            "starting analysis"
        );

        let mut matches = Vec::new();

        // Local similarity scan: only archives carry a file set worth
        // cross-comparing. Pastes have a single file; url submissions are
        // probed remotely only.
        if kind == SubmissionKind::Archive {
            match self.detector.scan(&sources.files) {
                Ok(found) => {
                    tracing::debug!(
                        detector = self.detector.name(),
                        matches = found.len(),
                        "local similarity scan complete"
                    );
                    matches.extend(found);
                }
                Err(e) => {
                    tracing::warn!(
                        detector = self.detector.name(),
                        "local similarity scan failed: {:#}",
                        e
                    );
                }
            }
        }

        let probes = sources.probe_files(self.config.workspace.probe_files);

        // Remote searches, in registry order; their matches concatenate
        // after the local ones.
        for service in self.searches.services() {
            for file in probes {
                match service.search(&file.content).await {
                    Ok(found) => {
                        tracing::debug!(
                            service = service.name(),
                            path = %file.path,
                            matches = found.len(),
                            "snippet search complete"
                        );
                        matches.extend(found);
                    }
                    Err(e) => {
                        tracing::warn!(
                            service = service.name(),
                            path = %file.path,
                            "snippet search failed: {}",
                            e
                        );
                    }
                }
            }
        }

        let ai_detection = match (&self.classifier, probes.first()) {
            (Some(classifier), Some(file)) => match classifier.classify(&file.content).await {
                Ok(verdict) => Some(verdict),
                Err(e) => {
                    tracing::warn!(
                        classifier = classifier.name(),
                        "authorship classification failed: {:#}",
                        e
                    );
                    None
                }
            },
            _ => None,
        };

        Ok(AnalysisReport {
            id: Uuid::new_v4(),
            kind,
            payload: payload.to_string(),
            similarity_score: similarity_score(matches.len()),
            matches,
            ai_detection,
            analyzed_at: Utc::now(),
        })
    }
}

/// Aggregate score: 10 points per match, saturating at 100.
///
/// A deliberately blunt heuristic — it counts matches without weighting
/// their individual relevance. The per-match scores stay in the report so a
/// weighted policy can replace this without a data-model change.
pub fn similarity_score(match_count: usize) -> u32 {
    u32::try_from(match_count)
        .unwrap_or(u32::MAX)
        .saturating_mul(10)
        .min(100)
}
