//! Local similarity detection over a submission's file set.
//!
//! The detector boundary is a trait so the default fingerprint scan can be
//! swapped for an external tool without touching the analyzer. The built-in
//! [`FingerprintDetector`] hashes token windows per file and reports file
//! pairs whose fingerprint sets overlap beyond a configured threshold —
//! enough to catch copied and lightly-reformatted files within one
//! submission.

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::config::SimilarityConfig;
use crate::models::{SimilarityMatch, SourceFile};

/// A detector that compares the files of one submission against each other.
///
/// Given the ordered file set, returns one [`SimilarityMatch`] per suspicious
/// file pair, in deterministic order.
pub trait SimilarityDetector: Send + Sync {
    /// Returns the detector name used in logs and the services listing.
    fn name(&self) -> &str;

    /// Scan the file set and report suspicious pairs.
    fn scan(&self, files: &[SourceFile]) -> Result<Vec<SimilarityMatch>>;
}

/// Token n-gram fingerprint detector.
///
/// Each file is reduced to a set of hashed `ngram`-token windows; a file pair
/// is reported when the Jaccard overlap of the two sets reaches `threshold`.
/// Comments and formatting differences largely disappear in tokenization, so
/// whitespace-shuffled copies still score near 1.0.
pub struct FingerprintDetector {
    threshold: f64,
    ngram: usize,
}

impl FingerprintDetector {
    pub fn new(config: &SimilarityConfig) -> Self {
        Self {
            threshold: config.threshold,
            ngram: config.ngram,
        }
    }

    fn fingerprints(&self, content: &str) -> HashSet<u64> {
        let tokens: Vec<&str> = content
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.is_empty() {
            return HashSet::new();
        }

        // Short files fall back to a single whole-file window.
        let window = self.ngram.min(tokens.len());

        tokens
            .windows(window)
            .map(|w| hash_window(w))
            .collect()
    }
}

impl SimilarityDetector for FingerprintDetector {
    fn name(&self) -> &str {
        "fingerprint"
    }

    fn scan(&self, files: &[SourceFile]) -> Result<Vec<SimilarityMatch>> {
        let sets: Vec<HashSet<u64>> = files.iter().map(|f| self.fingerprints(&f.content)).collect();

        let mut matches = Vec::new();

        for i in 0..files.len() {
            for j in (i + 1)..files.len() {
                let overlap = jaccard(&sets[i], &sets[j]);
                if overlap >= self.threshold {
                    matches.push(SimilarityMatch {
                        source_location: files[j].path.clone(),
                        label: format!("{} ~ {}", files[i].path, files[j].path),
                        score: overlap,
                    });
                }
            }
        }

        Ok(matches)
    }
}

fn hash_window(tokens: &[&str]) -> u64 {
    let mut hasher = Sha256::new();
    for token in tokens {
        hasher.update(token.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Jaccard overlap of two fingerprint sets, in `[0.0, 1.0]`.
///
/// Returns `0.0` when either set is empty.
fn jaccard(a: &HashSet<u64>, b: &HashSet<u64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}
