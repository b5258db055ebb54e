//! Exclusion filter
//!
//! A list of regular expressions searched (unanchored) against the full
//! candidate path. Excluded entries are dropped before set comparison on
//! both sides, so they are never uploaded, compared or pruned.

use std::path::Path;

use regex::Regex;

use crate::domain::errors::DomainError;

/// Compiled set of exclusion patterns
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    patterns: Vec<Regex>,
}

impl ExclusionFilter {
    /// Compiles every pattern
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidPattern`] naming the first pattern
    /// that fails to compile
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, DomainError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref())
                    .map_err(|e| DomainError::InvalidPattern(format!("{}: {e}", p.as_ref())))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// A filter that excludes nothing
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns the first pattern matching `path`, if any
    #[must_use]
    pub fn matching_pattern(&self, path: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.is_match(path))
            .map(Regex::as_str)
    }

    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.matching_pattern(path).is_some()
    }

    /// Convenience wrapper for filesystem paths
    #[must_use]
    pub fn is_path_excluded(&self, path: &Path) -> bool {
        self.is_excluded(&path.to_string_lossy())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_excludes_nothing() {
        let filter = ExclusionFilter::none();
        assert!(!filter.is_excluded("/any/path"));
        assert!(filter.is_empty());
    }

    #[test]
    fn test_search_is_unanchored() {
        let filter = ExclusionFilter::new(&[r"\.tmp$", "node_modules"]).unwrap();
        assert!(filter.is_excluded("/home/u/work/file.tmp"));
        assert!(filter.is_excluded("/home/u/proj/node_modules/x/index.js"));
        assert!(!filter.is_excluded("/home/u/work/file.tmp.txt"));
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn test_matching_pattern_reports_first_hit() {
        let filter = ExclusionFilter::new(&["cache", "ca"]).unwrap();
        assert_eq!(filter.matching_pattern("/x/cache/y"), Some("cache"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let result = ExclusionFilter::new(&["(unclosed"]);
        assert!(matches!(result, Err(DomainError::InvalidPattern(_))));
    }

    #[test]
    fn test_path_helper() {
        let filter = ExclusionFilter::new(&["/\\.git/"]).unwrap();
        assert!(filter.is_path_excluded(Path::new("/repo/.git/HEAD")));
    }
}
