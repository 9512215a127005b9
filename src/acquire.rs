//! Submission materialization.
//!
//! Turns a submission descriptor into a [`SourceSet`]: pastes become a single
//! synthetic file, archives are extracted into the work directory, and remote
//! repositories are shallow-cloned into a URL-keyed cache. A failure here is
//! fatal to the analysis request — without readable content there is nothing
//! to analyze.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::{SourceFile, SourceSet, SubmissionKind};

/// Maximum decompressed bytes accepted from a single archive entry
/// (zip-bomb protection).
const MAX_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Synthetic path assigned to pasted snippets.
const PASTE_PATH: &str = "paste.txt";

/// Materialize a submission payload into an ordered set of source files.
///
/// * `paste` — the payload is the literal code text.
/// * `archive` — the payload is a path to a `.zip` file (extracted under
///   `workspace.work_dir`) or to an already-extracted directory.
/// * `url` — the payload is a git URL (shallow-cloned under
///   `workspace.work_dir`) or a path to an already-cloned directory.
pub fn materialize(config: &Config, kind: SubmissionKind, payload: &str) -> Result<SourceSet> {
    match kind {
        SubmissionKind::Paste => {
            if payload.trim().is_empty() {
                bail!("Pasted submission is empty");
            }
            Ok(SourceSet {
                root: PathBuf::from("."),
                files: vec![SourceFile {
                    path: PASTE_PATH.to_string(),
                    content: payload.to_string(),
                }],
            })
        }
        SubmissionKind::Archive => {
            let path = Path::new(payload);
            let root = if path.is_dir() {
                path.to_path_buf()
            } else {
                extract_archive(config, path)?
            };
            scan_source_set(config, &root)
        }
        SubmissionKind::Url => {
            let path = Path::new(payload);
            let root = if path.is_dir() {
                path.to_path_buf()
            } else {
                clone_repository(config, payload)?
            };
            scan_source_set(config, &root)
        }
    }
}

/// Scan a materialized directory into a [`SourceSet`].
///
/// Fatal if the directory yields no readable files at all.
pub fn scan_source_set(config: &Config, root: &Path) -> Result<SourceSet> {
    let files = scan_files(config, root)?;
    if files.is_empty() {
        bail!(
            "Submission at {} contains no readable source files",
            root.display()
        );
    }
    Ok(SourceSet {
        root: root.to_path_buf(),
        files,
    })
}

/// Walk `root` and collect readable files, in deterministic path order.
pub fn scan_files(config: &Config, root: &Path) -> Result<Vec<SourceFile>> {
    if !root.exists() {
        bail!("Submission root does not exist: {}", root.display());
    }

    let ws = &config.workspace;
    let include_set = build_globset(&ws.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(ws.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(ws.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        let metadata = std::fs::metadata(path)?;
        if metadata.len() > ws.max_file_bytes {
            tracing::debug!(path = %rel_str, bytes = metadata.len(), "skipping oversized file");
            continue;
        }

        // Binary files are not analyzable; skip anything that isn't UTF-8.
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                tracing::debug!(path = %rel_str, "skipping non-UTF-8 file");
                continue;
            }
        };

        files.push(SourceFile {
            path: rel_str,
            content,
        });
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(files)
}

/// Extract a `.zip` archive into the work directory.
///
/// The destination is keyed by a short hash of the archive path, so repeated
/// analyses of the same archive reuse one directory. Entries that escape the
/// destination (absolute or `..` paths) fail the extraction.
pub fn extract_archive(config: &Config, archive_path: &Path) -> Result<PathBuf> {
    if !archive_path.exists() {
        bail!("Archive does not exist: {}", archive_path.display());
    }

    let dest = config
        .workspace
        .work_dir
        .join("archives")
        .join(short_hash(&archive_path.to_string_lossy()));
    std::fs::create_dir_all(&dest)
        .with_context(|| format!("Failed to create extraction directory: {}", dest.display()))?;

    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive =
        zip::ZipArchive::new(file).with_context(|| "Failed to read zip archive")?;

    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;

        let Some(enclosed) = entry.enclosed_name() else {
            bail!("Archive entry escapes extraction root: {}", entry.name());
        };
        let out_path = dest.join(enclosed);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut bytes = Vec::new();
        entry.take(MAX_ENTRY_BYTES).read_to_end(&mut bytes)?;
        if bytes.len() as u64 >= MAX_ENTRY_BYTES {
            bail!(
                "Archive entry {} exceeds size limit ({} bytes)",
                out_path.display(),
                MAX_ENTRY_BYTES
            );
        }
        std::fs::write(&out_path, &bytes)?;
    }

    Ok(dest)
}

/// Shallow-clone a git repository into the work directory, or refresh an
/// existing clone of the same URL.
pub fn clone_repository(config: &Config, url: &str) -> Result<PathBuf> {
    let dest = config
        .workspace
        .work_dir
        .join("repos")
        .join(short_hash(url));

    if dest.join(".git").exists() {
        git_refresh(&dest)?;
    } else {
        git_clone(url, &dest)?;
    }

    Ok(dest)
}

fn git_clone(url: &str, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create clone directory: {}", dest.display()))?;

    let output = Command::new("git")
        .args(["clone", "--depth", "1"])
        .arg(url)
        .arg(dest)
        .output()
        .with_context(|| "Failed to execute 'git clone'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone failed: {}", stderr.trim());
    }

    Ok(())
}

fn git_refresh(repo_dir: &Path) -> Result<()> {
    let output = Command::new("git")
        .args(["fetch", "--depth", "1", "origin"])
        .current_dir(repo_dir)
        .output()
        .with_context(|| "Failed to execute 'git fetch'")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git fetch failed: {}", stderr.trim());
    }

    let output = Command::new("git")
        .args(["reset", "--hard", "FETCH_HEAD"])
        .current_dir(repo_dir)
        .output()
        .with_context(|| "Failed to execute 'git reset'")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git reset failed: {}", stderr.trim());
    }

    Ok(())
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
