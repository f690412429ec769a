//! Single-file pattern scan.

use crate::error::{SearchError, SearchResult};
use crate::services::elements::LinePattern;
use crate::services::grep::searcher;
use grep_searcher::sinks::Lossy;
use std::path::Path;

/// Returns the 1-based number of the first line of `path` matching
/// `pattern`, or `None` if no line matches.
///
/// # Errors
///
/// Returns `SearchError::InvalidPattern` if the pattern does not compile,
/// `SearchError::FileRead` if the file cannot be read.
pub fn first_match(path: &Path, pattern: &LinePattern) -> SearchResult<Option<u64>> {
    let matcher = pattern.matcher()?;
    let mut found = None;
    searcher()
        .search_path(
            &matcher,
            path,
            Lossy(|line_number, _line| {
                found = Some(line_number);
                Ok(false)
            }),
        )
        .map_err(|source| SearchError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_first_match_reports_first_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Foo.cc");
        fs::write(
            &path,
            "#include \"Foo.h\"\n\nint Foo::bar() { return 1; }\nint Foo::bar(int) { return 2; }\n",
        )
        .unwrap();

        let line = first_match(&path, &LinePattern::new(r"Foo.*::bar\b")).unwrap();
        assert_eq!(line, Some(3));
        let none = first_match(&path, &LinePattern::new("baz")).unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn test_case_insensitive_pattern() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("solver.f90");
        fs::write(&path, "! solver\nSUBROUTINE SOLVE(a, b)\nend\n").unwrap();
        let pattern = LinePattern::case_insensitive(r"^subroutine solve *\(");
        assert_eq!(first_match(&path, &pattern).unwrap(), Some(2));
    }

    #[test]
    fn test_first_match_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = first_match(&dir.path().join("nope.cc"), &LinePattern::new("x"));
        assert!(matches!(result, Err(SearchError::FileRead { .. })));
    }
}
