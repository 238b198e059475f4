//! Match/exclude filters applied to discovered object names and paths
//! during listing. Objects rejected here are never fetched in detail.

use regex::Regex;

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("invalid match pattern '{pattern}': {source}")]
    InvalidMatch {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid exclude pattern '{pattern}': {source}")]
    InvalidExclude {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Listing-time name filter. The substring match is case-insensitive; the
/// regex forms are applied verbatim. Exclusion wins over matching.
#[derive(Debug, Default)]
pub struct NameFilter {
    match_substring: Option<String>,
    match_regex: Option<Regex>,
    exclude_regex: Option<Regex>,
}

impl NameFilter {
    pub fn new(
        match_substring: Option<&str>,
        match_regex: Option<&str>,
        exclude_regex: Option<&str>,
    ) -> Result<Self, FilterError> {
        let match_regex = match_regex
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| FilterError::InvalidMatch {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .transpose()?;
        let exclude_regex = exclude_regex
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| FilterError::InvalidExclude {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .transpose()?;
        Ok(Self {
            match_substring: match_substring.map(str::to_lowercase),
            match_regex,
            exclude_regex,
        })
    }

    pub fn accepts(&self, name: &str) -> bool {
        if self.excluded(name) {
            return false;
        }
        if let Some(regex) = &self.match_regex {
            if !regex.is_match(name) {
                return false;
            }
        }
        if let Some(substring) = &self.match_substring {
            if !name.to_lowercase().contains(substring) {
                return false;
            }
        }
        true
    }

    /// Exclusion check alone, without the match side. Directory walks use
    /// this when deciding whether to descend: a directory whose own path
    /// does not match may still hold objects that do.
    pub fn excluded(&self, name: &str) -> bool {
        self.exclude_regex
            .as_ref()
            .is_some_and(|exclude| exclude.is_match(name))
    }
}
