//! Retrieval-and-ranking pipeline: query → paged works search (with
//! precise→broad fallback) → aggregation → enrichment → scoring.
//!
//! Each run owns its own aggregator and candidate set; nothing is shared or
//! cached across runs.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{ENRICH_LIMIT, RecommendOptions, reference_year};
use crate::error::JintelError;
use crate::query::{self, ModeUsed, SearchRequest};
use crate::quartile::{QuartileRecord, QuartileTable};
use crate::sources::openalex::{OpenAlexClient, OpenAlexSource, OpenAlexWork, SourceTopic};
use crate::utils::issn;

pub mod aggregate;
pub mod rank;
pub mod similarity;

pub use aggregate::Aggregator;
pub use rank::{ScoredArticle, ScoredJournal, score_articles, score_journals};
pub use similarity::{SimilarJournal, find_similar};

/// A journal observed in the result set, with enrichment fields attached
/// once per run for the most frequent candidates.
#[derive(Debug, Clone, Serialize)]
pub struct JournalCandidate {
    pub source_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issn_l: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub works_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cited_by_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub two_yr_mean_citedness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub works_ref_year: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cites_ref_year: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<SourceTopic>,
    /// Retained result-set occurrences whose parent journal is this one.
    pub frequency: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quartile: Option<QuartileRecord>,
}

/// Topic sets are compared over the top slice only.
const TOPIC_SET_LIMIT: usize = 10;

impl JournalCandidate {
    /// Builds a full candidate from a source record, e.g. for similarity
    /// pools. Returns `None` when the record carries no identifier.
    pub fn from_source(source: &OpenAlexSource, ref_year: i32) -> Option<Self> {
        let source_id = source.short_id()?.to_string();
        let mut candidate = Self {
            source_id,
            display_name: source.display_name.clone().unwrap_or_default(),
            issn_l: None,
            country_code: None,
            publisher: None,
            source_type: None,
            works_count: None,
            cited_by_count: None,
            two_yr_mean_citedness: None,
            works_ref_year: None,
            cites_ref_year: None,
            topics: Vec::new(),
            frequency: 0,
            quartile: None,
        };
        candidate.merge_source(source, ref_year);
        Some(candidate)
    }

    /// Attaches enrichment fields from a full source record. Fields the
    /// record lacks are left as they were.
    pub fn merge_source(&mut self, source: &OpenAlexSource, ref_year: i32) {
        if let Some(name) = source.display_name.as_deref().filter(|n| !n.is_empty()) {
            self.display_name = name.to_string();
        }
        if source.issn_l.is_some() {
            self.issn_l = source.issn_l.clone();
        }
        if source.country_code.is_some() {
            self.country_code = source.country_code.clone();
        }
        if source.host_organization_name.is_some() {
            self.publisher = source.host_organization_name.clone();
        }
        if source.source_type.is_some() {
            self.source_type = source.source_type.clone();
        }
        if source.works_count.is_some() {
            self.works_count = source.works_count;
        }
        if source.cited_by_count.is_some() {
            self.cited_by_count = source.cited_by_count;
        }
        if let Some(stats) = source.summary_stats.as_ref()
            && stats.two_yr_mean_citedness.is_some()
        {
            self.two_yr_mean_citedness = stats.two_yr_mean_citedness;
        }
        let (works_ref, cites_ref) = source.counts_for_year(ref_year);
        if works_ref.is_some() {
            self.works_ref_year = works_ref;
        }
        if cites_ref.is_some() {
            self.cites_ref_year = cites_ref;
        }
        if !source.topics.is_empty() {
            self.topics = source.topics.iter().take(TOPIC_SET_LIMIT).cloned().collect();
        }
    }

    /// Top topic IDs as a set, for Jaccard overlap.
    pub fn topic_ids(&self) -> std::collections::HashSet<&str> {
        self.topics
            .iter()
            .filter_map(SourceTopic::short_id)
            .collect()
    }

    pub fn normalized_issn(&self) -> Option<String> {
        self.issn_l.as_deref().and_then(issn::normalize_issn)
    }

    pub fn attach_quartile(&mut self, table: &QuartileTable) {
        if let Some(normalized) = self.normalized_issn() {
            self.quartile = table.lookup(&normalized).cloned();
        }
    }
}

/// An article retained from the result set.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleCandidate {
    pub work_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<i32>,
    pub cited_by_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl ArticleCandidate {
    pub fn from_work(work: &OpenAlexWork) -> Option<Self> {
        let work_id = work
            .id
            .as_deref()
            .map(|id| id.rsplit('/').next().unwrap_or(id))
            .filter(|id| !id.is_empty())?
            .to_string();
        Some(Self {
            work_id,
            title: work.title.clone().or_else(|| work.display_name.clone()),
            publication_year: work.publication_year,
            cited_by_count: work.cited_by_count.unwrap_or(0),
            relevance_score: work.relevance_score,
            work_type: work.work_type.clone(),
            source_id: work
                .parent_source()
                .and_then(|s| s.id.as_deref())
                .map(|id| id.rsplit('/').next().unwrap_or(id).to_string()),
        })
    }
}

/// The persistence contract of a completed run: callers store this record
/// as-is (the CLI's `--save` writes it as pretty JSON).
#[derive(Debug, Serialize)]
pub struct RecommendationRun {
    /// The query actually sent to the provider.
    pub query_text: String,
    pub mode_used: ModeUsed,
    pub created_at: String,
    pub journals: Vec<ScoredJournal>,
    pub articles: Vec<ScoredArticle>,
}

impl RecommendationRun {
    pub fn is_empty(&self) -> bool {
        self.journals.is_empty() && self.articles.is_empty()
    }
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

/// Pages through a works search. A rate limit that survives retries stops
/// paging but keeps already-fetched pages; with nothing fetched yet it
/// aborts the run.
async fn fetch_works(
    client: &OpenAlexClient,
    query: &str,
    mode: ModeUsed,
    options: &RecommendOptions,
) -> Result<Vec<OpenAlexWork>, JintelError> {
    let mut works: Vec<OpenAlexWork> = Vec::new();
    for page in 1..=options.max_pages {
        debug!(page, mode = mode.as_str(), "Fetching works page");
        let result = client
            .search_works(query, mode, page, options.per_page)
            .await;
        let page_results = match result {
            Ok(resp) => resp.results,
            Err(JintelError::RateLimited { api }) if !works.is_empty() => {
                warn!(%api, page, "Rate limited mid-paging; keeping fetched pages");
                break;
            }
            Err(err) => return Err(err),
        };
        if page_results.is_empty() {
            break;
        }
        let short_page = page_results.len() < options.per_page;
        works.extend(page_results);
        if short_page {
            break;
        }
    }
    Ok(works)
}

/// Runs the full recommendation pipeline for one request.
///
/// The precise→broad fallback is an explicit two-step machine: attempt
/// precise, transition to broad on zero results, terminate on whatever the
/// final attempt returns. An empty final result set is a successful empty
/// run, not an error.
pub async fn recommend(
    client: &OpenAlexClient,
    request: &SearchRequest,
    options: &RecommendOptions,
    quartiles: Option<&QuartileTable>,
) -> Result<RecommendationRun, JintelError> {
    options.validate()?;
    let built = query::build_query(request, options.keyword_count)?;

    let (works, mode_used, query_sent) = match built.forced {
        Some(ModeUsed::Precise) => {
            let works = fetch_works(client, &built.precise, ModeUsed::Precise, options).await?;
            (works, ModeUsed::Precise, built.precise.clone())
        }
        Some(ModeUsed::Broad) => {
            let works = fetch_works(client, &built.broad, ModeUsed::Broad, options).await?;
            (works, ModeUsed::Broad, built.broad.clone())
        }
        None => {
            let works = fetch_works(client, &built.precise, ModeUsed::Precise, options).await?;
            if works.is_empty() {
                warn!(
                    precise_query = %built.precise,
                    broad_query = %built.broad,
                    "Precise search returned nothing; falling back to full-text"
                );
                let works = fetch_works(client, &built.broad, ModeUsed::Broad, options).await?;
                (works, ModeUsed::Broad, built.broad.clone())
            } else {
                (works, ModeUsed::Precise, built.precise.clone())
            }
        }
    };
    debug!(works = works.len(), mode = mode_used.as_str(), "Works fetched");

    let mut aggregator = Aggregator::new(
        options.include_editorial_types,
        options.include_nonjournal_sources,
    );
    aggregator.ingest(&works);
    let (mut journals, articles) = aggregator.into_candidates();

    enrich_top_journals(client, &mut journals).await;

    if let Some(table) = quartiles {
        for journal in &mut journals {
            journal.attach_quartile(table);
        }
    }

    let journals = score_journals(journals, options.top_n_journals);
    let articles = score_articles(articles, mode_used, options.top_n_articles);

    Ok(RecommendationRun {
        query_text: query_sent,
        mode_used,
        created_at: now_rfc3339(),
        journals,
        articles,
    })
}

/// Enriches the most frequent journals with full source records. Lookup
/// failures are isolated per journal; the candidate stays rankable without
/// its enrichment fields.
async fn enrich_top_journals(client: &OpenAlexClient, journals: &mut [JournalCandidate]) {
    let ref_year = reference_year();

    let mut order: Vec<usize> = (0..journals.len()).collect();
    order.sort_by(|&a, &b| journals[b].frequency.cmp(&journals[a].frequency));

    for &idx in order.iter().take(ENRICH_LIMIT) {
        let source_id = journals[idx].source_id.clone();
        match client.get_source(&source_id).await {
            Ok(Some(source)) => journals[idx].merge_source(&source, ref_year),
            Ok(None) => debug!(%source_id, "Source not found during enrichment"),
            Err(err) => warn!(%source_id, error = %err, "Source enrichment failed"),
        }
    }
}

/// Fetches a candidate pool for similarity ranking, seeded with the
/// reference journal's top topic labels (its display name when it has no
/// topics).
pub async fn similarity_pool(
    client: &OpenAlexClient,
    reference: &JournalCandidate,
    pool_size: usize,
) -> Result<Vec<JournalCandidate>, JintelError> {
    let seed: String = {
        let labels: Vec<&str> = reference
            .topics
            .iter()
            .filter_map(|t| t.display_name.as_deref())
            .take(3)
            .collect();
        if labels.is_empty() {
            reference.display_name.clone()
        } else {
            labels.join(" ")
        }
    };
    if seed.trim().is_empty() {
        return Ok(Vec::new());
    }

    let ref_year = reference_year();
    let sources = client.search_sources(&seed, pool_size).await?;
    Ok(sources
        .iter()
        .filter_map(|s| JournalCandidate::from_source(s, ref_year))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SearchMode;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn work_json(id: &str, source_id: &str, source_name: &str) -> serde_json::Value {
        serde_json::json!({
            "id": format!("https://openalex.org/{id}"),
            "title": format!("Work {id}"),
            "publication_year": 2023,
            "cited_by_count": 5,
            "relevance_score": 12.5,
            "type": "article",
            "primary_location": {
                "source": {
                    "id": format!("https://openalex.org/{source_id}"),
                    "display_name": source_name,
                    "type": "journal"
                }
            }
        })
    }

    fn default_options() -> RecommendOptions {
        RecommendOptions {
            max_pages: 1,
            ..RecommendOptions::default()
        }
    }

    #[tokio::test]
    async fn precise_zero_results_falls_back_to_broad() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param(
                "filter",
                "title_and_abstract.search:graphene oxide membrane desalination performance",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [], "meta": { "count": 0 }
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param(
                "search",
                "graphene oxide membrane desalination performance",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    work_json("W1", "S1", "Desalination"),
                    work_json("W2", "S1", "Desalination"),
                    work_json("W3", "S2", "Membranes")
                ],
                "meta": { "count": 3 }
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/sources/S1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "https://openalex.org/S1",
                "display_name": "Desalination",
                "issn_l": "0011-9164",
                "works_count": 9000,
                "cited_by_count": 250000,
                "summary_stats": { "2yr_mean_citedness": 6.1 },
                "counts_by_year": [
                    { "year": reference_year(), "works_count": 400, "cited_by_count": 21000 }
                ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/sources/S2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = OpenAlexClient::new_for_test(server.uri()).unwrap();
        let request = SearchRequest {
            title: Some("Graphene oxide membrane desalination performance".into()),
            ..SearchRequest::default()
        };
        let run = recommend(&client, &request, &default_options(), None)
            .await
            .expect("run should succeed");

        assert_eq!(run.mode_used, ModeUsed::Broad);
        assert_eq!(run.journals.len(), 2);
        assert_eq!(run.journals[0].journal.source_id, "S1");
        assert_eq!(run.journals[0].journal.frequency, 2);
        assert_eq!(run.journals[0].rank, 1);
        // Enrichment merged for S1, survived the 404 for S2.
        assert_eq!(run.journals[0].journal.two_yr_mean_citedness, Some(6.1));
        assert!(run.journals[1].journal.two_yr_mean_citedness.is_none());
        assert_eq!(run.articles.len(), 3);
    }

    #[tokio::test]
    async fn precise_results_skip_fallback() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param(
                "filter",
                "title_and_abstract.search:wetland restoration hydrology",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [ work_json("W1", "S9", "Wetlands") ],
                "meta": { "count": 1 }
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/sources/S9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = OpenAlexClient::new_for_test(server.uri()).unwrap();
        let request = SearchRequest {
            title: Some("Wetland restoration hydrology".into()),
            ..SearchRequest::default()
        };
        let run = recommend(&client, &request, &default_options(), None)
            .await
            .expect("run should succeed");

        assert_eq!(run.mode_used, ModeUsed::Precise);
        assert_eq!(run.query_text, "wetland restoration hydrology");
        assert_eq!(run.journals.len(), 1);
    }

    #[tokio::test]
    async fn empty_broad_results_make_an_empty_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [], "meta": { "count": 0 }
            })))
            .mount(&server)
            .await;

        let client = OpenAlexClient::new_for_test(server.uri()).unwrap();
        let request = SearchRequest {
            title: Some("Wetland restoration hydrology".into()),
            mode: SearchMode::Broad,
            ..SearchRequest::default()
        };
        let run = recommend(&client, &request, &default_options(), None)
            .await
            .expect("zero matches is a successful empty run");
        assert!(run.is_empty());
        assert_eq!(run.mode_used, ModeUsed::Broad);
    }

    #[tokio::test]
    async fn similarity_pool_seeds_with_topic_labels() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sources"))
            .and(query_param("search", "Hydrology Ecology"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    { "id": "https://openalex.org/S5", "display_name": "Pool Journal",
                      "works_count": 100, "cited_by_count": 2000 }
                ]
            })))
            .mount(&server)
            .await;

        let client = OpenAlexClient::new_for_test(server.uri()).unwrap();
        let reference = JournalCandidate {
            source_id: "S1".into(),
            display_name: "Reference".into(),
            issn_l: None,
            country_code: None,
            publisher: None,
            source_type: None,
            works_count: Some(10),
            cited_by_count: Some(100),
            two_yr_mean_citedness: None,
            works_ref_year: None,
            cites_ref_year: None,
            topics: vec![
                SourceTopic {
                    id: Some("https://openalex.org/T1".into()),
                    display_name: Some("Hydrology".into()),
                },
                SourceTopic {
                    id: Some("https://openalex.org/T2".into()),
                    display_name: Some("Ecology".into()),
                },
            ],
            frequency: 0,
            quartile: None,
        };

        let pool = similarity_pool(&client, &reference, 50).await.unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].source_id, "S5");
    }

    #[test]
    fn article_candidate_tolerates_missing_fields() {
        let work: OpenAlexWork = serde_json::from_value(serde_json::json!({
            "id": "https://openalex.org/W77"
        }))
        .unwrap();
        let article = ArticleCandidate::from_work(&work).expect("id is enough");
        assert_eq!(article.work_id, "W77");
        assert_eq!(article.cited_by_count, 0);
        assert!(article.title.is_none());
        assert!(article.source_id.is_none());
    }
}
