//! End-to-end analyzer behavior with in-process collaborators.
//!
//! These tests drive the full pipeline — materialization through report
//! aggregation — with mock search and classification services, so they run
//! without network access or credentials.

use async_trait::async_trait;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use originscan::analyze::Analyzer;
use originscan::classify::AuthorshipClassifier;
use originscan::config::Config;
use originscan::detector::{FingerprintDetector, SimilarityDetector};
use originscan::models::{SimilarityMatch, SubmissionKind};
use originscan::search::{SearchError, SearchRegistry, SnippetSearch};

struct StubSearch {
    service: &'static str,
    results: Vec<SimilarityMatch>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SnippetSearch for StubSearch {
    fn name(&self) -> &str {
        self.service
    }
    async fn search(&self, _snippet: &str) -> Result<Vec<SimilarityMatch>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }
}

struct BrokenSearch;

#[async_trait]
impl SnippetSearch for BrokenSearch {
    fn name(&self) -> &str {
        "broken"
    }
    async fn search(&self, _snippet: &str) -> Result<Vec<SimilarityMatch>, SearchError> {
        Err(SearchError::Api {
            status: 503,
            message: "service unavailable".to_string(),
        })
    }
}

struct StubClassifier {
    verdict: serde_json::Value,
}

#[async_trait]
impl AuthorshipClassifier for StubClassifier {
    fn name(&self) -> &str {
        "stub"
    }
    async fn classify(&self, _text: &str) -> anyhow::Result<serde_json::Value> {
        Ok(self.verdict.clone())
    }
}

struct BrokenClassifier;

#[async_trait]
impl AuthorshipClassifier for BrokenClassifier {
    fn name(&self) -> &str {
        "broken"
    }
    async fn classify(&self, _text: &str) -> anyhow::Result<serde_json::Value> {
        anyhow::bail!("connection refused")
    }
}

fn stub_match(location: &str) -> SimilarityMatch {
    SimilarityMatch {
        source_location: location.to_string(),
        label: location.to_string(),
        score: 1.0,
    }
}

fn stub_matches(prefix: &str, count: usize) -> Vec<SimilarityMatch> {
    (0..count)
        .map(|i| stub_match(&format!("{}-{}", prefix, i)))
        .collect()
}

fn test_config(work_dir: &Path) -> Config {
    let mut config = Config::minimal();
    config.workspace.work_dir = work_dir.to_path_buf();
    config
}

fn registry_with(services: Vec<Box<dyn SnippetSearch>>) -> SearchRegistry {
    let mut registry = SearchRegistry::new();
    for service in services {
        registry.register(service);
    }
    registry
}

fn default_detector(config: &Config) -> Box<dyn SimilarityDetector> {
    Box::new(FingerprintDetector::new(&config.similarity))
}

/// Paste with A→2 matches, B→3 matches, and a passing classifier.
#[tokio::test]
async fn paste_end_to_end_aggregates_all_collaborators() {
    let config = Config::minimal();
    let searches = registry_with(vec![
        Box::new(StubSearch {
            service: "a",
            results: stub_matches("a", 2),
            calls: Arc::new(AtomicUsize::new(0)),
        }),
        Box::new(StubSearch {
            service: "b",
            results: stub_matches("b", 3),
            calls: Arc::new(AtomicUsize::new(0)),
        }),
    ]);
    let verdict = serde_json::json!({"label": "human", "confidence": 0.8});
    let analyzer = Analyzer::new(
        config.clone(),
        default_detector(&config),
        searches,
        Some(Box::new(StubClassifier {
            verdict: verdict.clone(),
        })),
    );

    let report = analyzer
        .analyze(SubmissionKind::Paste, "print(1)")
        .await
        .unwrap();

    assert_eq!(report.kind, SubmissionKind::Paste);
    assert_eq!(report.payload, "print(1)");
    assert_eq!(report.matches.len(), 5);
    assert_eq!(report.similarity_score, 50);
    assert_eq!(report.ai_detection, Some(verdict));
}

/// Archive of unique files with empty remote results: score 0, no matches.
#[tokio::test]
async fn archive_with_no_duplicates_scores_zero() {
    let tmp = TempDir::new().unwrap();
    let submission = tmp.path().join("submission");
    fs::create_dir_all(&submission).unwrap();
    fs::write(
        submission.join("alpha.py"),
        "import sys\nprint(sys.argv[1])\n",
    )
    .unwrap();
    fs::write(
        submission.join("beta.rs"),
        "fn main() { println!(\"{}\", 6 * 7); }\n",
    )
    .unwrap();

    let config = test_config(&tmp.path().join("work"));
    let searches = registry_with(vec![
        Box::new(StubSearch {
            service: "a",
            results: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }),
        Box::new(StubSearch {
            service: "b",
            results: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }),
    ]);
    let analyzer = Analyzer::new(config.clone(), default_detector(&config), searches, None);

    let report = analyzer
        .analyze(SubmissionKind::Archive, submission.to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(report.similarity_score, 0);
    assert!(report.matches.is_empty());
    assert!(report.ai_detection.is_none());
}

/// Archive match ordering: local detector pairs first, then remote results.
#[tokio::test]
async fn archive_matches_lead_with_local_detector_results() {
    let tmp = TempDir::new().unwrap();
    let submission = tmp.path().join("submission");
    fs::create_dir_all(&submission).unwrap();
    let copied = "def mean(xs):\n    return sum(xs) / len(xs)\n";
    fs::write(submission.join("a.py"), copied).unwrap();
    fs::write(submission.join("b.py"), copied).unwrap();

    let config = test_config(&tmp.path().join("work"));
    let searches = registry_with(vec![Box::new(StubSearch {
        service: "a",
        results: vec![stub_match("https://remote.example/hit")],
        calls: Arc::new(AtomicUsize::new(0)),
    })]);
    let analyzer = Analyzer::new(config.clone(), default_detector(&config), searches, None);

    let report = analyzer
        .analyze(SubmissionKind::Archive, submission.to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(report.matches.len(), 2);
    assert_eq!(report.matches[0].label, "a.py ~ b.py");
    assert_eq!(report.matches[1].source_location, "https://remote.example/hit");
    assert_eq!(report.similarity_score, 20);
}

/// A zip payload goes through extraction before analysis.
#[tokio::test]
async fn zip_archive_is_extracted_and_analyzed() {
    let tmp = TempDir::new().unwrap();
    let zip_path = tmp.path().join("submission.zip");

    let file = fs::File::create(&zip_path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    let copied = "SELECT id, name FROM users WHERE active = 1 ORDER BY name;\n";
    writer.start_file("one.sql", options).unwrap();
    writer.write_all(copied.as_bytes()).unwrap();
    writer.start_file("two.sql", options).unwrap();
    writer.write_all(copied.as_bytes()).unwrap();
    writer.finish().unwrap();

    let config = test_config(&tmp.path().join("work"));
    let analyzer = Analyzer::new(
        config.clone(),
        default_detector(&config),
        SearchRegistry::new(),
        None,
    );

    let report = analyzer
        .analyze(SubmissionKind::Archive, zip_path.to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].label, "one.sql ~ two.sql");
    assert_eq!(report.similarity_score, 10);
}

/// A url payload pointing at a cloned checkout skips the local pair scan.
#[tokio::test]
async fn url_submission_is_probed_remotely_only() {
    let tmp = TempDir::new().unwrap();
    let checkout = tmp.path().join("checkout");
    fs::create_dir_all(&checkout).unwrap();
    let copied = "for i in range(10):\n    print(i * i)\n";
    fs::write(checkout.join("a.py"), copied).unwrap();
    fs::write(checkout.join("b.py"), copied).unwrap();

    let config = test_config(&tmp.path().join("work"));
    let calls = Arc::new(AtomicUsize::new(0));
    let searches = registry_with(vec![Box::new(StubSearch {
        service: "a",
        results: vec![stub_match("https://remote.example/hit")],
        calls: calls.clone(),
    })]);
    let analyzer = Analyzer::new(config.clone(), default_detector(&config), searches, None);

    let report = analyzer
        .analyze(SubmissionKind::Url, checkout.to_str().unwrap())
        .await
        .unwrap();

    // The duplicate pair is there, but url submissions never run the local scan
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].source_location, "https://remote.example/hit");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// One broken search service must not take down the analysis.
#[tokio::test]
async fn broken_search_service_is_recovered() {
    let config = Config::minimal();
    let searches = registry_with(vec![
        Box::new(BrokenSearch),
        Box::new(StubSearch {
            service: "b",
            results: stub_matches("b", 3),
            calls: Arc::new(AtomicUsize::new(0)),
        }),
    ]);
    let analyzer = Analyzer::new(config.clone(), default_detector(&config), searches, None);

    let report = analyzer
        .analyze(SubmissionKind::Paste, "print(1)")
        .await
        .unwrap();

    assert_eq!(report.matches.len(), 3);
    assert_eq!(report.similarity_score, 30);
}

/// A broken classifier leaves matches and score untouched.
#[tokio::test]
async fn broken_classifier_leaves_detection_absent() {
    let config = Config::minimal();
    let searches = registry_with(vec![Box::new(StubSearch {
        service: "a",
        results: stub_matches("a", 4),
        calls: Arc::new(AtomicUsize::new(0)),
    })]);
    let analyzer = Analyzer::new(
        config.clone(),
        default_detector(&config),
        searches,
        Some(Box::new(BrokenClassifier)),
    );

    let report = analyzer
        .analyze(SubmissionKind::Paste, "print(1)")
        .await
        .unwrap();

    assert!(report.ai_detection.is_none());
    assert_eq!(report.matches.len(), 4);
    assert_eq!(report.similarity_score, 40);
}

/// Probing more files multiplies the search calls, in file order.
#[tokio::test]
async fn probe_files_setting_widens_remote_coverage() {
    let tmp = TempDir::new().unwrap();
    let submission = tmp.path().join("submission");
    fs::create_dir_all(&submission).unwrap();
    for name in ["a.py", "b.py", "c.py"] {
        fs::write(submission.join(name), format!("print('{}')\n", name)).unwrap();
    }

    let mut config = test_config(&tmp.path().join("work"));
    config.workspace.probe_files = 2;

    let calls = Arc::new(AtomicUsize::new(0));
    let searches = registry_with(vec![Box::new(StubSearch {
        service: "a",
        results: vec![stub_match("hit")],
        calls: calls.clone(),
    })]);
    let analyzer = Analyzer::new(config.clone(), default_detector(&config), searches, None);

    let report = analyzer
        .analyze(SubmissionKind::Url, submission.to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.matches.len(), 2);
}

/// An unreadable submission is the one fatal case.
#[tokio::test]
async fn missing_submission_fails_the_request() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let analyzer = Analyzer::new(
        config.clone(),
        default_detector(&config),
        SearchRegistry::new(),
        None,
    );

    let missing: PathBuf = tmp.path().join("no-such-submission.zip");
    let result = analyzer
        .analyze(SubmissionKind::Archive, missing.to_str().unwrap())
        .await;
    assert!(result.is_err());
}
