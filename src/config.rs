//! Configuration surface: environment variables plus the bounded knobs
//! exposed on the `recommend` pipeline.

use crate::error::JintelError;
use crate::query::SearchMode;

pub const DEFAULT_PER_PAGE: usize = 100;
pub const DEFAULT_MAX_PAGES: usize = 2;
pub const DEFAULT_TOP_N_JOURNALS: usize = 10;
pub const DEFAULT_TOP_N_ARTICLES: usize = 200;
pub const DEFAULT_KEYWORD_COUNT: usize = 10;

/// Only the most frequent journals get the expensive per-source lookup,
/// bounding provider calls to O(top-N) per run.
pub const ENRICH_LIMIT: usize = 30;

/// An abstract submitted without a title must reach this length to be
/// considered informative.
pub const MIN_ABSTRACT_LEN: usize = 50;

const SJR_CSV_ENV: &str = "JINTEL_SJR_CSV";
const OPENALEX_EMAIL_ENV: &str = "OPENALEX_EMAIL";

/// Knobs for one recommendation run. Every numeric field is range-checked by
/// [`RecommendOptions::validate`] before the pipeline touches the network.
#[derive(Debug, Clone)]
pub struct RecommendOptions {
    pub per_page: usize,
    pub max_pages: usize,
    pub top_n_journals: usize,
    pub top_n_articles: usize,
    pub keyword_count: usize,
    pub mode: SearchMode,
    pub include_editorial_types: bool,
    pub include_nonjournal_sources: bool,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            max_pages: DEFAULT_MAX_PAGES,
            top_n_journals: DEFAULT_TOP_N_JOURNALS,
            top_n_articles: DEFAULT_TOP_N_ARTICLES,
            keyword_count: DEFAULT_KEYWORD_COUNT,
            mode: SearchMode::Auto,
            include_editorial_types: false,
            include_nonjournal_sources: false,
        }
    }
}

impl RecommendOptions {
    pub fn validate(&self) -> Result<(), JintelError> {
        if !(50..=200).contains(&self.per_page) {
            return Err(JintelError::InvalidArgument(
                "--per-page must be between 50 and 200".into(),
            ));
        }
        if !(1..=5).contains(&self.max_pages) {
            return Err(JintelError::InvalidArgument(
                "--max-pages must be between 1 and 5".into(),
            ));
        }
        if !(5..=20).contains(&self.top_n_journals) {
            return Err(JintelError::InvalidArgument(
                "--top-n must be between 5 and 20".into(),
            ));
        }
        if !(5..=20).contains(&self.keyword_count) {
            return Err(JintelError::InvalidArgument(
                "--keywords must be between 5 and 20".into(),
            ));
        }
        if self.top_n_articles == 0 || self.top_n_articles > 1000 {
            return Err(JintelError::InvalidArgument(
                "--top-articles must be between 1 and 1000".into(),
            ));
        }
        Ok(())
    }
}

/// Email for the OpenAlex polite pool, sent as `mailto` on every request
/// when set.
pub fn openalex_email() -> Option<String> {
    std::env::var(OPENALEX_EMAIL_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Default quartile table location when `--sjr` is not passed.
pub fn sjr_csv_path() -> Option<std::path::PathBuf> {
    std::env::var(SJR_CSV_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(std::path::PathBuf::from)
}

/// Reference year for activity metrics: current UTC year minus 4, a fixed
/// lag chosen so the provider's citation window for that year is mature.
pub fn reference_year() -> i32 {
    time::OffsetDateTime::now_utc().year() - 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_range() {
        RecommendOptions::default()
            .validate()
            .expect("defaults should validate");
    }

    #[test]
    fn per_page_bounds_enforced() {
        let mut options = RecommendOptions {
            per_page: 49,
            ..RecommendOptions::default()
        };
        assert!(options.validate().is_err());
        options.per_page = 201;
        assert!(options.validate().is_err());
        options.per_page = 200;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn top_n_bounds_enforced() {
        let mut options = RecommendOptions {
            top_n_journals: 4,
            ..RecommendOptions::default()
        };
        assert!(options.validate().is_err());
        options.top_n_journals = 21;
        assert!(options.validate().is_err());
        options.top_n_journals = 20;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn reference_year_lags_by_four() {
        let now = time::OffsetDateTime::now_utc().year();
        assert_eq!(reference_year(), now - 4);
    }
}
