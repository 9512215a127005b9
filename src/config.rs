use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    /// Directory where archives are extracted and repositories cloned.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Files larger than this are skipped during materialization.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// How many leading files stand in as representative content for
    /// remote search and classification.
    #[serde(default = "default_probe_files")]
    pub probe_files: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_file_bytes: default_max_file_bytes(),
            probe_files: default_probe_files(),
        }
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./work")
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}

fn default_max_file_bytes() -> u64 {
    512 * 1024
}

fn default_probe_files() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimilarityConfig {
    /// Pairs at or above this Jaccard overlap are reported.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Token window size used when fingerprinting files.
    #[serde(default = "default_ngram")]
    pub ngram: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            ngram: default_ngram(),
        }
    }
}

fn default_threshold() -> f64 {
    0.5
}

fn default_ngram() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub github: GithubSearchConfig,
    #[serde(default)]
    pub stackexchange: StackExchangeSearchConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            github: GithubSearchConfig::default(),
            stackexchange: StackExchangeSearchConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubSearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_github_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for GithubSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_github_endpoint(),
            max_results: default_max_results(),
        }
    }
}

fn default_github_endpoint() -> String {
    "https://api.github.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StackExchangeSearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_stackexchange_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_site")]
    pub site: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for StackExchangeSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_stackexchange_endpoint(),
            site: default_site(),
            max_results: default_max_results(),
        }
    }
}

fn default_stackexchange_endpoint() -> String {
    "https://api.stackexchange.com".to_string()
}

fn default_site() -> String {
    "stackoverflow".to_string()
}

fn default_max_results() -> usize {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    /// Classifier provider: `gptzero` or `disabled`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: default_ai_endpoint(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}

fn default_ai_endpoint() -> String {
    "https://api.gptzero.me/v2/predict/text".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl AiConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// A default configuration for commands that can run without a config file.
    pub fn minimal() -> Self {
        Self {
            workspace: WorkspaceConfig::default(),
            similarity: SimilarityConfig::default(),
            search: SearchConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate workspace
    if config.workspace.max_file_bytes == 0 {
        anyhow::bail!("workspace.max_file_bytes must be > 0");
    }
    if config.workspace.probe_files == 0 {
        anyhow::bail!("workspace.probe_files must be >= 1");
    }

    // Validate similarity
    if !(0.0..=1.0).contains(&config.similarity.threshold) {
        anyhow::bail!("similarity.threshold must be in [0.0, 1.0]");
    }
    if config.similarity.ngram == 0 {
        anyhow::bail!("similarity.ngram must be > 0");
    }

    // Validate search
    if config.search.github.max_results == 0 || config.search.stackexchange.max_results == 0 {
        anyhow::bail!("search.*.max_results must be >= 1");
    }

    match config.ai.provider.as_str() {
        "disabled" | "gptzero" => {}
        other => anyhow::bail!(
            "Unknown ai provider: '{}'. Must be disabled or gptzero.",
            other
        ),
    }

    Ok(config)
}
