use regex::Regex;

use crate::errors::FilterError;

/// Anchors raw listing entries at the configured base directory.
///
/// An entry is kept from the first occurrence of `/<base_dir>` to its end;
/// entries that never mention the base directory are out of scope. The match is
/// textual, so a base of `data` also matches inside `/data2/`.
#[derive(Debug, Clone)]
pub struct PathFilter {
    base_dir: String,
    pattern: Regex,
}

impl PathFilter {
    pub fn new(base_dir: &str) -> Result<Self, FilterError> {
        let base_dir = base_dir.trim_matches('/');
        if base_dir.is_empty() {
            return Err(FilterError::EmptyBaseDir);
        }

        let pattern = Regex::new(&format!("/{}.*", regex::escape(base_dir))).map_err(|source| {
            FilterError::InvalidPattern {
                base_dir: base_dir.to_string(),
                source,
            }
        })?;

        Ok(Self {
            base_dir: base_dir.to_string(),
            pattern,
        })
    }

    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    /// Relative path of `raw_entry` starting at `/<base_dir>`, or `None` when
    /// the entry lies outside the base directory
    pub fn filter(&self, raw_entry: &str) -> Option<String> {
        self.pattern.find(raw_entry).map(|m| m.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_server_prefix() {
        let filter = PathFilter::new("data").unwrap();
        assert_eq!(
            filter.filter("/remote.php/webdav/data/sub/b.txt").as_deref(),
            Some("/data/sub/b.txt")
        );
        assert_eq!(filter.filter("/data/").as_deref(), Some("/data/"));
    }

    #[test]
    fn test_entries_outside_base_are_dropped() {
        let filter = PathFilter::new("data").unwrap();
        assert_eq!(filter.filter("/remote.php/webdav/"), None);
        assert_eq!(filter.filter("/other/file.txt"), None);
        assert_eq!(filter.filter(""), None);
        assert_eq!(filter.filter("data/no-leading-slash"), None);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let filter = PathFilter::new("data").unwrap();
        assert_eq!(
            filter.filter("/mnt/data/archive/data/x.bin").as_deref(),
            Some("/data/archive/data/x.bin")
        );
    }

    #[test]
    fn test_special_characters_match_literally() {
        let filter = PathFilter::new("run.v1+(final)").unwrap();
        assert_eq!(
            filter.filter("/dav/run.v1+(final)/out.csv").as_deref(),
            Some("/run.v1+(final)/out.csv")
        );
        // '.' must not act as a wildcard
        assert_eq!(filter.filter("/dav/runXv1+(final)/out.csv"), None);
    }

    #[test]
    fn test_prefix_sibling_matches_textually() {
        let filter = PathFilter::new("data").unwrap();
        assert_eq!(filter.filter("/dav/data2/x.txt").as_deref(), Some("/data2/x.txt"));
    }

    #[test]
    fn test_surrounding_slashes_ignored_and_empty_rejected() {
        let filter = PathFilter::new("/data/").unwrap();
        assert_eq!(filter.base_dir(), "data");
        assert!(matches!(PathFilter::new("/"), Err(FilterError::EmptyBaseDir)));
    }
}
