//! Folds raw works into deduplicated article candidates and per-journal
//! frequency counts.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::sources::openalex::OpenAlexWork;

use super::{ArticleCandidate, JournalCandidate};

/// Work types dropped by default: non-research front matter.
const EXCLUDED_WORK_TYPES: [&str; 4] = ["editorial", "letter", "correction", "paratext"];

/// Accumulates one run's result pages. Works are deduplicated by ID across
/// pages; journal frequency counts one retained work per parent source.
pub struct Aggregator {
    include_editorial_types: bool,
    include_nonjournal_sources: bool,
    seen_works: HashSet<String>,
    journals: HashMap<String, JournalCandidate>,
    journal_order: Vec<String>,
    articles: Vec<ArticleCandidate>,
}

impl Aggregator {
    pub fn new(include_editorial_types: bool, include_nonjournal_sources: bool) -> Self {
        Self {
            include_editorial_types,
            include_nonjournal_sources,
            seen_works: HashSet::new(),
            journals: HashMap::new(),
            journal_order: Vec::new(),
            articles: Vec::new(),
        }
    }

    pub fn ingest(&mut self, works: &[OpenAlexWork]) {
        for work in works {
            self.ingest_one(work);
        }
    }

    fn ingest_one(&mut self, work: &OpenAlexWork) {
        let Some(article) = ArticleCandidate::from_work(work) else {
            debug!("Dropping work without an identifier");
            return;
        };
        if !self.seen_works.insert(article.work_id.clone()) {
            return;
        }
        if !self.include_editorial_types
            && let Some(kind) = article.work_type.as_deref()
            && EXCLUDED_WORK_TYPES.contains(&kind)
        {
            return;
        }

        self.count_parent_journal(work);
        self.articles.push(article);
    }

    /// Counts the work toward its parent journal. Works without a resolvable
    /// parent stay in the article list but add no journal signal; sources
    /// that declare a non-journal type are skipped unless opted in. A source
    /// without a declared type is given the benefit of the doubt.
    fn count_parent_journal(&mut self, work: &OpenAlexWork) {
        let Some(source) = work.parent_source() else {
            return;
        };
        let Some(source_id) = source
            .id
            .as_deref()
            .map(|id| id.rsplit('/').next().unwrap_or(id))
            .filter(|id| !id.is_empty())
        else {
            return;
        };
        if !self.include_nonjournal_sources
            && let Some(kind) = source.source_type.as_deref()
            && kind != "journal"
        {
            return;
        }

        if let Some(existing) = self.journals.get_mut(source_id) {
            existing.frequency += 1;
            if existing.display_name.is_empty()
                && let Some(name) = source.display_name.as_deref()
            {
                existing.display_name = name.to_string();
            }
            return;
        }

        self.journal_order.push(source_id.to_string());
        self.journals.insert(
            source_id.to_string(),
            JournalCandidate {
                source_id: source_id.to_string(),
                display_name: source.display_name.clone().unwrap_or_default(),
                issn_l: None,
                country_code: None,
                publisher: None,
                source_type: source.source_type.clone(),
                works_count: None,
                cited_by_count: None,
                two_yr_mean_citedness: None,
                works_ref_year: None,
                cites_ref_year: None,
                topics: Vec::new(),
                frequency: 1,
                quartile: None,
            },
        );
    }

    /// Finishes the fold. Journals come out in first-seen order so that
    /// downstream stable sorts break ties by discovery.
    pub fn into_candidates(mut self) -> (Vec<JournalCandidate>, Vec<ArticleCandidate>) {
        let journals = self
            .journal_order
            .iter()
            .filter_map(|id| self.journals.remove(id))
            .collect();
        (journals, self.articles)
    }
}
