//! File scanner with gitignore support and include/exclude globs

use crate::domain::{language_for_path, DiscoveredFile, Source};
use crate::error::{ContextError, Result};
use crate::utils::{decode_bytes, is_binary_bytes, relative_path, sha256_hex};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Counters collected during one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files_seen: usize,
    pub files_discovered: usize,
    pub files_skipped_glob: usize,
    pub files_skipped_size: usize,
    pub files_skipped_binary: usize,
    pub files_unreadable: usize,
    /// Relative paths of files or directories that could not be read
    pub skipped_paths: Vec<String>,
}

impl ScanStats {
    pub fn files_skipped(&self) -> usize {
        self.files_skipped_binary + self.files_unreadable
    }
}

/// Walks a source root and reads every file that passes the filters.
pub struct FileScanner {
    root_path: PathBuf,
    include: Vec<String>,
    exclude: Vec<String>,
    max_file_bytes: u64,
    respect_gitignore: bool,
    stats: ScanStats,
}

impl FileScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            include: Vec::new(),
            exclude: Vec::new(),
            max_file_bytes: 1_048_576,
            respect_gitignore: true,
            stats: ScanStats::default(),
        }
    }

    /// Scanner configured from a source's patterns.
    pub fn for_source(source: &Source) -> Self {
        Self::new(source.root.clone())
            .include(source.include.clone())
            .exclude(source.exclude.clone())
    }

    /// Globs a file must match; empty accepts every file
    pub fn include(mut self, globs: Vec<String>) -> Self {
        self.include = globs;
        self
    }

    pub fn exclude(mut self, globs: Vec<String>) -> Self {
        self.exclude = globs;
        self
    }

    pub fn max_file_bytes(mut self, max_bytes: u64) -> Self {
        self.max_file_bytes = max_bytes;
        self
    }

    pub fn respect_gitignore(mut self, respect: bool) -> Self {
        self.respect_gitignore = respect;
        self
    }

    fn build_globset(&self, patterns: &[String]) -> Result<Option<GlobSet>> {
        if patterns.is_empty() {
            return Ok(None);
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| ContextError::ConfigValidation(vec![format!("glob '{pattern}': {e}")]))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| ContextError::ConfigValidation(vec![format!("glob set: {e}")]))?;
        Ok(Some(set))
    }

    /// Discover and read files under the root.
    ///
    /// Files are returned in deterministic order by relative path. Unreadable
    /// files are skipped with a warning and recorded in [`ScanStats`].
    pub fn scan(&mut self) -> Result<Vec<DiscoveredFile>> {
        self.stats = ScanStats::default();

        if !self.root_path.is_dir() {
            return Err(ContextError::discovery(&self.root_path, "source root is not a directory"));
        }

        let include_set = self.build_globset(&self.include)?;
        let exclude_set = self.build_globset(&self.exclude)?;

        let mut builder = WalkBuilder::new(&self.root_path);
        builder
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .require_git(false)
            .hidden(false)
            .filter_entry(|entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                if !is_dir {
                    return true;
                }
                match entry.file_name().to_str() {
                    Some(".git" | "node_modules" | "__pycache__" | ".venv" | "venv") => false,
                    Some(name) => !(name.starts_with('.') && name != ".github"),
                    None => true,
                }
            });

        let mut candidates: Vec<(PathBuf, String)> = Vec::new();
        for entry_result in builder.build() {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    warn!("skipping unwalkable entry: {err}");
                    self.stats.files_unreadable += 1;
                    if let Some(rel) = walk_error_path(&err).and_then(|p| relative_path(&self.root_path, p)) {
                        self.stats.skipped_paths.push(rel);
                    }
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            self.stats.files_seen += 1;

            let path = entry.path();
            let Some(rel_path) = relative_path(&self.root_path, path) else {
                continue;
            };

            if exclude_set.as_ref().is_some_and(|set| set.is_match(&rel_path)) {
                self.stats.files_skipped_glob += 1;
                continue;
            }
            if include_set.as_ref().is_some_and(|set| !set.is_match(&rel_path)) {
                self.stats.files_skipped_glob += 1;
                continue;
            }

            candidates.push((path.to_path_buf(), rel_path));
        }

        candidates.sort_by(|a, b| a.1.cmp(&b.1));

        let mut files = Vec::with_capacity(candidates.len());
        for (path, rel_path) in candidates {
            let size = match fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(err) => {
                    self.skip_unreadable(&rel_path, &err);
                    continue;
                }
            };
            if size > self.max_file_bytes {
                self.stats.files_skipped_size += 1;
                continue;
            }

            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    self.skip_unreadable(&rel_path, &err);
                    continue;
                }
            };
            if is_binary_bytes(&bytes) {
                self.stats.files_skipped_binary += 1;
                continue;
            }

            let content_hash = sha256_hex(&bytes);
            let (content, encoding) = decode_bytes(&bytes);
            debug!(path = %rel_path, encoding, "discovered");

            files.push(DiscoveredFile {
                language: language_for_path(&rel_path),
                relative_path: rel_path,
                absolute_path: path,
                content,
                content_hash,
            });
        }

        self.stats.files_discovered = files.len();
        Ok(files)
    }

    fn skip_unreadable(&mut self, rel_path: &str, err: &std::io::Error) {
        warn!(path = %rel_path, "skipping unreadable file: {err}");
        self.stats.files_unreadable += 1;
        self.stats.skipped_paths.push(rel_path.to_string());
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }
}

/// Path a walk error refers to, if the walker attached one.
fn walk_error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_error_path(err)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn scans_sorted_and_hashes_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("b.rs"), "fn b() {}").unwrap();
        fs::write(root.join("a.py"), "print('hello')").unwrap();

        let mut scanner = FileScanner::new(root.to_path_buf());
        let files = scanner.scan().unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].relative_path, "a.py");
        assert_eq!(files[0].language, "python");
        assert_eq!(files[1].content_hash, sha256_hex(b"fn b() {}"));
    }

    #[test]
    fn include_and_exclude_globs_apply_to_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src/gen")).unwrap();
        fs::write(root.join("src/main.ts"), "export const a = 1;").unwrap();
        fs::write(root.join("src/gen/out.ts"), "export const b = 2;").unwrap();
        fs::write(root.join("notes.txt"), "text").unwrap();

        let mut scanner = FileScanner::new(root.to_path_buf())
            .include(vec!["**/*.ts".to_string()])
            .exclude(vec!["src/gen/**".to_string()]);
        let files = scanner.scan().unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, ["src/main.ts"]);
        assert_eq!(scanner.stats().files_skipped_glob, 2);
    }

    #[test]
    fn binary_and_oversized_files_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("blob.bin"), [0u8, 1, 2, 3]).unwrap();
        fs::write(root.join("large.rs"), "a".repeat(2_000)).unwrap();
        fs::write(root.join("small.rs"), "fn main() {}").unwrap();

        let mut scanner = FileScanner::new(root.to_path_buf()).max_file_bytes(1_000);
        let files = scanner.scan().unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "small.rs");
        assert_eq!(scanner.stats().files_skipped_binary, 1);
        assert_eq!(scanner.stats().files_skipped_size, 1);
    }

    #[test]
    fn noise_and_hidden_dirs_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for dir in ["node_modules", ".cache", ".git"] {
            fs::create_dir_all(root.join(dir)).unwrap();
            fs::write(root.join(dir).join("x.js"), "var x;").unwrap();
        }
        fs::write(root.join("main.js"), "var y;").unwrap();

        let mut scanner = FileScanner::new(root.to_path_buf()).respect_gitignore(false);
        let files = scanner.scan().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "main.js");
    }

    #[test]
    fn missing_root_is_a_discovery_error() {
        let mut scanner = FileScanner::new(PathBuf::from("/definitely/not/here"));
        assert!(matches!(scanner.scan(), Err(ContextError::Discovery { .. })));
    }
}
