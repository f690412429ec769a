//! Regex search across search roots using ripgrep internals.
//!
//! Candidate files are enumerated first with a sorted, sequential `ignore`
//! walk (no gitignore or hidden-file filtering: project configuration is
//! the only filter). The candidates are then searched in fixed-size batches
//! on the rayon pool, one `Searcher` per batch. Batches are collected in
//! order, so the output is ordered by root, then path, then line.
//!
//! # Security
//!
//! User patterns are checked with
//! [`crate::security::validate_regex_pattern`] before any file is touched.

use crate::error::{SearchError, SearchResult};
use crate::protocol::LineMatch;
use crate::security;
use crate::services::elements::LinePattern;
use grep_matcher::Matcher;
use grep_regex::RegexMatcher;
use grep_searcher::sinks::Lossy;
use grep_searcher::{BinaryDetection, Searcher, SearcherBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Files searched by one `Searcher` before the next batch is picked up.
pub const BATCH_SIZE: usize = 100;

/// Configuration for grep operations.
#[derive(Debug, Clone)]
pub struct GrepConfig {
    /// Maximum matches to return (0 = unlimited)
    pub max_matches: usize,
    /// Files per parallel batch
    pub batch_size: usize,
    /// Follow symlinks while walking
    pub follow_symlinks: bool,
}

impl Default for GrepConfig {
    fn default() -> Self {
        Self {
            max_matches: 10_000,
            batch_size: BATCH_SIZE,
            follow_symlinks: false,
        }
    }
}

/// Which files of a root take part in a search.
///
/// A file is a candidate when its path ends in one of the extension
/// patterns and no exclusion pattern matches anywhere in its path.
/// Exclusion wins over inclusion. Directories are never excluded, only
/// the files below them.
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: Option<Regex>,
    exclude: Vec<Regex>,
}

impl FileFilter {
    /// Builds a filter from extension and exclusion patterns.
    ///
    /// An empty extension list accepts every file.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::InvalidPattern` if a pattern does not compile.
    pub fn new<S: AsRef<str>>(exts: &[S], excluded: &[S]) -> SearchResult<Self> {
        let include = if exts.is_empty() {
            None
        } else {
            let alternation = exts
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join("|");
            Some(compile(&format!("(?:{alternation})$"))?)
        };
        let exclude = excluded
            .iter()
            .map(|p| compile(p.as_ref()))
            .collect::<SearchResult<Vec<_>>>()?;
        Ok(Self { include, exclude })
    }

    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        if self.exclude.iter().any(|re| re.is_match(&path)) {
            return false;
        }
        self.include.as_ref().is_none_or(|re| re.is_match(&path))
    }
}

fn compile(pattern: &str) -> SearchResult<Regex> {
    Regex::new(pattern).map_err(|e| SearchError::InvalidPattern(e.to_string()))
}

/// Result of a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrepOutcome {
    pub matches: Vec<LineMatch>,
    /// Whether `max_matches` cut the result short
    pub truncated: bool,
    /// Number of candidate files searched
    pub files_searched: usize,
}

/// Batched parallel grep using ripgrep internals.
#[derive(Debug, Clone, Default)]
pub struct GrepService {
    config: GrepConfig,
}

impl GrepService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: GrepConfig) -> Self {
        Self { config }
    }

    /// Searches every candidate file under `roots` for `pattern`.
    ///
    /// A root that cannot be walked is logged and skipped, as is a file
    /// that cannot be read. Cancellation is checked between walk entries
    /// and before each file; a cancelled search returns no partial output.
    ///
    /// When more than `max_matches` lines match, the output is cut to its
    /// first `max_matches` lines and `truncated` is set. Batches whose
    /// matches would all land past the cap stop early.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::InvalidPattern` if the pattern is invalid or
    /// potentially dangerous, `SearchError::Cancelled` if `cancel` fires.
    pub fn search(
        &self,
        pattern: &LinePattern,
        roots: &[PathBuf],
        filter: &FileFilter,
        cancel: &CancellationToken,
    ) -> SearchResult<GrepOutcome> {
        security::validate_regex_pattern(&pattern.regex)
            .map_err(|e| SearchError::InvalidPattern(e.to_string()))?;
        let matcher = pattern.matcher()?;

        let files = self.candidates(roots, filter, cancel)?;
        tracing::debug!(
            "Searching {} files under {} roots for {}",
            files.len(),
            roots.len(),
            pattern.regex
        );

        let limit = if self.config.max_matches > 0 {
            self.config.max_matches
        } else {
            usize::MAX
        };
        let chunks = files.par_chunks(self.config.batch_size.max(1));
        let cutoff = Cutoff::new(limit, chunks.len());
        let batches = chunks
            .enumerate()
            .map(|(index, batch)| search_batch(&matcher, batch, index, cancel, &cutoff))
            .collect::<Vec<_>>();

        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let mut matches = Vec::new();
        for batch in batches {
            matches.extend(batch?);
        }
        let truncated = matches.len() > limit;
        matches.truncate(limit);

        Ok(GrepOutcome {
            matches,
            truncated,
            files_searched: files.len(),
        })
    }

    /// Enumerates the files to search, in root order then path order.
    fn candidates(
        &self,
        roots: &[PathBuf],
        filter: &FileFilter,
        cancel: &CancellationToken,
    ) -> SearchResult<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for root in roots {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled);
            }
            if !root.is_dir() {
                tracing::warn!("Skipping search root {}: not a directory", root.display());
                continue;
            }

            let walker = WalkBuilder::new(root)
                .standard_filters(false)
                .follow_links(self.config.follow_symlinks)
                .sort_by_file_path(|a, b| a.cmp(b))
                .build();

            for entry in walker {
                if cancel.is_cancelled() {
                    return Err(SearchError::Cancelled);
                }
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!("Walk error under {}: {e}", root.display());
                        continue;
                    }
                };
                if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                    continue;
                }
                let path = entry.into_path();
                if filter.accepts(&path) && seen.insert(path.clone()) {
                    files.push(path);
                }
            }
        }

        Ok(files)
    }
}

pub(crate) fn searcher() -> Searcher {
    SearcherBuilder::new()
        .line_number(true)
        .binary_detection(BinaryDetection::quit(b'\x00'))
        .build()
}

/// Decides which batches may stop early once the match cap is reached.
///
/// Batch `i` may stop only when everything it would still add lies past
/// the cap in the ordered output: the complete batches `0..=k` for some
/// `k < i` already hold more than `limit` matches, or batch `i` itself
/// does. Batches up to the cutoff always run to completion, so the
/// truncated output is a prefix of the full one.
struct Cutoff {
    limit: usize,
    /// Lowest batch index whose prefix is already over the limit
    index: AtomicUsize,
    /// Match count of each finished batch
    counts: Mutex<Vec<Option<usize>>>,
}

impl Cutoff {
    fn new(limit: usize, batches: usize) -> Self {
        Self {
            limit,
            index: AtomicUsize::new(usize::MAX),
            counts: Mutex::new(vec![None; batches]),
        }
    }

    fn passed(&self, batch: usize) -> bool {
        batch > self.index.load(Ordering::Relaxed)
    }

    fn reached(&self, batch: usize) {
        self.index.fetch_min(batch, Ordering::Relaxed);
    }

    /// Records that `batch` finished with `count` matches.
    fn finish(&self, batch: usize, count: usize) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts[batch] = Some(count);

        let mut total = 0usize;
        for (index, count) in counts.iter().enumerate() {
            let Some(count) = count else { break };
            total = total.saturating_add(*count);
            if total > self.limit {
                self.reached(index);
                break;
            }
        }
    }
}

/// Searches one batch of files with a single reused `Searcher`.
fn search_batch(
    matcher: &RegexMatcher,
    batch: &[PathBuf],
    index: usize,
    cancel: &CancellationToken,
    cutoff: &Cutoff,
) -> SearchResult<Vec<LineMatch>> {
    let mut searcher = searcher();
    let mut out = Vec::new();

    for path in batch {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        if cutoff.passed(index) {
            break;
        }

        let mut file_matches = Vec::new();
        let result = searcher.search_path(
            matcher,
            path,
            Lossy(|line_number, line| {
                let column = match matcher.find(line.as_bytes()) {
                    Ok(Some(m)) => m.start() as u64 + 1,
                    _ => 1,
                };
                file_matches.push(LineMatch {
                    path: path.clone(),
                    line: line_number,
                    column,
                    text: line.trim_end_matches(['\n', '\r']).to_string(),
                });
                Ok(true)
            }),
        );

        if let Err(e) = result {
            tracing::warn!("Cannot search {}: {e}", path.display());
            continue;
        }
        out.extend(file_matches);
        // One past the limit is enough to know the output was cut
        if out.len() > cutoff.limit {
            cutoff.reached(index);
            break;
        }
    }

    cutoff.finish(index, out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pkg/gen")).unwrap();
        fs::write(
            dir.path().join("pkg/b.go"),
            "package pkg\n\nfunc Serve() {}\nfunc Stop() {}\n",
        )
        .unwrap();
        fs::write(dir.path().join("pkg/a.go"), "package pkg\n\nfunc Start() {}\n").unwrap();
        fs::write(dir.path().join("pkg/gen/z.go"), "func Generated() {}\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "func Serve in prose\n").unwrap();
        dir
    }

    fn go_filter(excluded: &[&str]) -> FileFilter {
        FileFilter::new(&[r"\.go"], excluded).unwrap()
    }

    fn search(root: &Path, pattern: &str, filter: &FileFilter) -> SearchResult<GrepOutcome> {
        GrepService::new().search(
            &LinePattern::new(pattern),
            &[root.to_path_buf()],
            filter,
            &CancellationToken::new(),
        )
    }

    #[test]
    fn test_grep_basic_ordered() {
        let dir = setup_test_dir();
        let out = search(dir.path(), "^func", &go_filter(&[])).unwrap();
        let got: Vec<_> = out
            .matches
            .iter()
            .map(|m| (m.path.strip_prefix(dir.path()).unwrap().to_path_buf(), m.line))
            .collect();
        assert_eq!(
            got,
            vec![
                (PathBuf::from("pkg/a.go"), 3),
                (PathBuf::from("pkg/b.go"), 3),
                (PathBuf::from("pkg/b.go"), 4),
                (PathBuf::from("pkg/gen/z.go"), 1),
            ]
        );
        assert!(!out.truncated);
    }

    #[test]
    fn test_extension_filter() {
        let dir = setup_test_dir();
        let out = search(dir.path(), "Serve", &go_filter(&[])).unwrap();
        assert_eq!(out.matches.len(), 1);
        assert!(out.matches[0].path.ends_with("pkg/b.go"));
        assert_eq!(out.matches[0].column, 6);
        assert_eq!(out.matches[0].text, "func Serve() {}");
    }

    #[test]
    fn test_exclusion_wins_over_extension() {
        let dir = setup_test_dir();
        let out = search(dir.path(), "Generated", &go_filter(&["/gen/"])).unwrap();
        assert!(out.matches.is_empty());
    }

    #[test]
    fn test_empty_exts_accept_everything() {
        let dir = setup_test_dir();
        let filter = FileFilter::new::<&str>(&[], &[]).unwrap();
        let out = search(dir.path(), "Serve", &filter).unwrap();
        assert_eq!(out.matches.len(), 2);
    }

    #[test]
    fn test_match_cap_sets_truncated() {
        let dir = setup_test_dir();
        let service = GrepService::with_config(GrepConfig {
            max_matches: 2,
            ..GrepConfig::default()
        });
        let out = service
            .search(
                &LinePattern::new("func"),
                &[dir.path().to_path_buf()],
                &go_filter(&[]),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(out.matches.len(), 2);
        assert!(out.truncated);
    }

    #[test]
    fn test_truncated_output_is_prefix_of_full_output() {
        let dir = TempDir::new().unwrap();
        for i in 0..60 {
            let body: String = (0..(i % 4)).map(|n| format!("func F{i}_{n}() {{}}\n")).collect();
            fs::write(dir.path().join(format!("f{i:02}.go")), body).unwrap();
        }
        let roots = [dir.path().to_path_buf()];
        let pattern = LinePattern::new("^func");
        let cancel = CancellationToken::new();

        let full = GrepService::new()
            .search(&pattern, &roots, &go_filter(&[]), &cancel)
            .unwrap();
        assert_eq!(full.matches.len(), 90);

        let capped = GrepService::with_config(GrepConfig {
            max_matches: 7,
            batch_size: 1,
            ..GrepConfig::default()
        });
        for _ in 0..20 {
            let out = capped.search(&pattern, &roots, &go_filter(&[]), &cancel).unwrap();
            assert!(out.truncated);
            assert_eq!(out.matches, full.matches[..7]);
        }
    }

    #[test]
    fn test_cutoff_waits_for_earlier_batches() {
        let cutoff = Cutoff::new(5, 4);
        cutoff.finish(1, 10);
        // Batch 0 is still running: its matches come first
        assert!(!cutoff.passed(2));

        cutoff.finish(0, 0);
        assert!(cutoff.passed(2));
        assert!(!cutoff.passed(1));
    }

    #[test]
    fn test_cancelled_search_returns_nothing() {
        let dir = setup_test_dir();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = GrepService::new().search(
            &LinePattern::new("func"),
            &[dir.path().to_path_buf()],
            &go_filter(&[]),
            &cancel,
        );
        assert!(matches!(result, Err(SearchError::Cancelled)));
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let dir = setup_test_dir();
        let out = GrepService::new()
            .search(
                &LinePattern::new("Start"),
                &[dir.path().join("missing"), dir.path().to_path_buf()],
                &go_filter(&[]),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(out.matches.len(), 1);
    }

    #[test]
    fn test_overlapping_roots_report_once() {
        let dir = setup_test_dir();
        let out = GrepService::new()
            .search(
                &LinePattern::new("Start"),
                &[dir.path().to_path_buf(), dir.path().join("pkg")],
                &go_filter(&[]),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(out.matches.len(), 1);
    }

    #[test]
    fn test_redos_pattern_rejected() {
        let dir = setup_test_dir();
        for pattern in ["(a+)+", "(.*)*", "(.+)+"] {
            let result = search(dir.path(), pattern, &go_filter(&[]));
            assert!(matches!(result, Err(SearchError::InvalidPattern(_))));
        }
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let dir = setup_test_dir();
        let result = search(dir.path(), "func (", &go_filter(&[]));
        assert!(matches!(result, Err(SearchError::InvalidPattern(_))));
    }
}
