//! OpenAlex gateway: works (article) and sources (journal) search.
//!
//! Every record field is optional; absence is data, not an error. Callers
//! substitute neutral defaults instead of failing on incomplete records.

use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::JintelError;
use crate::query::ModeUsed;
use crate::utils::issn;

const OPENALEX_BASE: &str = "https://api.openalex.org";
const OPENALEX_API: &str = "api.openalex.org";
const OPENALEX_BASE_ENV: &str = "JINTEL_OPENALEX_BASE";

/// OpenAlex caps `per_page` at 200.
pub const MAX_PER_PAGE: usize = 200;

#[derive(Clone)]
pub struct OpenAlexClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: Cow<'static, str>,
    email: Option<String>,
}

impl OpenAlexClient {
    pub fn new() -> Result<Self, JintelError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: crate::sources::env_base(OPENALEX_BASE, OPENALEX_BASE_ENV),
            email: crate::config::openalex_email(),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base: String) -> Result<Self, JintelError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: Cow::Owned(base),
            email: None,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_ref().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn with_mailto(
        &self,
        req: reqwest_middleware::RequestBuilder,
    ) -> reqwest_middleware::RequestBuilder {
        match self.email.as_deref() {
            Some(email) => req.query(&[("mailto", email)]),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        req: reqwest_middleware::RequestBuilder,
    ) -> Result<T, JintelError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            // The retry middleware already backed off and gave up.
            return Err(JintelError::RateLimited {
                api: OPENALEX_API.to_string(),
            });
        }
        let bytes = crate::sources::read_limited_body(resp, OPENALEX_API).await?;
        if !status.is_success() {
            let excerpt = crate::sources::body_excerpt(&bytes);
            return Err(JintelError::Api {
                api: OPENALEX_API.to_string(),
                message: format!("HTTP {status}: {excerpt}"),
            });
        }
        serde_json::from_slice(&bytes).map_err(|source| JintelError::ApiJson {
            api: OPENALEX_API.to_string(),
            source,
        })
    }

    /// Fetches one page of works. Precise mode queries the title+abstract
    /// index via a `filter`; broad mode queries the full-text index via
    /// `search`. Both sort by provider relevance.
    pub async fn search_works(
        &self,
        query: &str,
        mode: ModeUsed,
        page: usize,
        per_page: usize,
    ) -> Result<WorksPage, JintelError> {
        let url = self.endpoint("works");
        let mut req = self.client.get(&url);

        req = match mode {
            ModeUsed::Precise => {
                let filter = format!("title_and_abstract.search:{query}");
                req.query(&[("filter", filter.as_str())])
            }
            ModeUsed::Broad => req.query(&[("search", query)]),
        };

        let page_str = page.to_string();
        let per_page_str = per_page.min(MAX_PER_PAGE).to_string();
        req = req.query(&[
            ("sort", "relevance_score:desc"),
            ("per_page", per_page_str.as_str()),
            ("page", page_str.as_str()),
        ]);

        self.get_json(self.with_mailto(req)).await
    }

    /// Fetches one source by OpenAlex ID (a bare `S…` ID or a full
    /// `https://openalex.org/S…` URL). A 404 yields `None`: enrichment must
    /// survive sources the provider no longer knows.
    pub async fn get_source(&self, source_id: &str) -> Result<Option<OpenAlexSource>, JintelError> {
        let id = source_id.rsplit('/').next().unwrap_or(source_id).trim();
        if id.is_empty() {
            return Ok(None);
        }
        self.get_source_at(&format!("sources/{id}")).await
    }

    /// Resolves a source through the `issn:` external-ID endpoint. Accepts
    /// any ISSN spelling; invalid ISSNs resolve to `None` without a network
    /// round trip.
    pub async fn get_source_by_issn(
        &self,
        raw_issn: &str,
    ) -> Result<Option<OpenAlexSource>, JintelError> {
        let Some(normalized) = issn::normalize_issn(raw_issn) else {
            return Ok(None);
        };
        let dashed = issn::dashed(&normalized);
        self.get_source_at(&format!("sources/issn:{dashed}")).await
    }

    async fn get_source_at(&self, path: &str) -> Result<Option<OpenAlexSource>, JintelError> {
        let url = self.endpoint(path);
        let req = self.with_mailto(self.client.get(&url));

        let resp = req.send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(JintelError::RateLimited {
                api: OPENALEX_API.to_string(),
            });
        }
        let bytes = crate::sources::read_limited_body(resp, OPENALEX_API).await?;
        if !status.is_success() {
            let excerpt = crate::sources::body_excerpt(&bytes);
            return Err(JintelError::Api {
                api: OPENALEX_API.to_string(),
                message: format!("HTTP {status}: {excerpt}"),
            });
        }
        let source: OpenAlexSource =
            serde_json::from_slice(&bytes).map_err(|source| JintelError::ApiJson {
                api: OPENALEX_API.to_string(),
                source,
            })?;
        Ok(Some(source))
    }

    /// Full-text search over sources, used for name lookups and for building
    /// similarity candidate pools.
    pub async fn search_sources(
        &self,
        text: &str,
        per_page: usize,
    ) -> Result<Vec<OpenAlexSource>, JintelError> {
        let url = self.endpoint("sources");
        let per_page_str = per_page.min(MAX_PER_PAGE).to_string();
        let req = self.client.get(&url).query(&[
            ("search", text),
            ("per_page", per_page_str.as_str()),
        ]);
        let page: SourcesPage = self.get_json(self.with_mailto(req)).await?;
        Ok(page.results)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorksPage {
    #[serde(default)]
    pub results: Vec<OpenAlexWork>,
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PageMeta {
    pub count: Option<u64>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAlexWork {
    pub id: Option<String>,
    pub title: Option<String>,
    pub display_name: Option<String>,
    pub publication_year: Option<i32>,
    pub cited_by_count: Option<u64>,
    pub relevance_score: Option<f64>,
    #[serde(rename = "type")]
    pub work_type: Option<String>,
    pub primary_location: Option<WorkLocation>,
    #[serde(default)]
    pub locations: Vec<WorkLocation>,
}

impl OpenAlexWork {
    /// The work's parent source, preferring `primary_location` and falling
    /// back to the first location that names one.
    pub fn parent_source(&self) -> Option<&LocationSource> {
        if let Some(source) = self
            .primary_location
            .as_ref()
            .and_then(|loc| loc.source.as_ref())
            .filter(|s| s.id.is_some())
        {
            return Some(source);
        }
        self.locations
            .iter()
            .filter_map(|loc| loc.source.as_ref())
            .find(|s| s.id.is_some())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkLocation {
    pub source: Option<LocationSource>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocationSource {
    pub id: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub source_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesPage {
    #[serde(default)]
    pub results: Vec<OpenAlexSource>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAlexSource {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub issn_l: Option<String>,
    pub country_code: Option<String>,
    pub host_organization_name: Option<String>,
    #[serde(rename = "type")]
    pub source_type: Option<String>,
    pub works_count: Option<u64>,
    pub cited_by_count: Option<u64>,
    pub summary_stats: Option<SummaryStats>,
    #[serde(default)]
    pub counts_by_year: Vec<YearCount>,
    #[serde(default)]
    pub topics: Vec<SourceTopic>,
}

impl OpenAlexSource {
    /// Bare `S…` identifier, stripped of the `https://openalex.org/` prefix.
    pub fn short_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(|id| id.rsplit('/').next().unwrap_or(id))
            .filter(|id| !id.is_empty())
    }

    /// Works/citations counted for one specific year, if reported.
    pub fn counts_for_year(&self, year: i32) -> (Option<u64>, Option<u64>) {
        for entry in &self.counts_by_year {
            if entry.year == Some(year) {
                return (entry.works_count, entry.cited_by_count);
            }
        }
        (None, None)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SummaryStats {
    #[serde(rename = "2yr_mean_citedness")]
    pub two_yr_mean_citedness: Option<f64>,
    pub h_index: Option<u64>,
    pub i10_index: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YearCount {
    pub year: Option<i32>,
    pub works_count: Option<u64>,
    pub cited_by_count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceTopic {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

impl SourceTopic {
    /// Bare `T…` topic identifier.
    pub fn short_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(|id| id.rsplit('/').next().unwrap_or(id))
            .filter(|id| id.starts_with('T'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn empty_works_body() -> serde_json::Value {
        serde_json::json!({ "results": [], "meta": { "count": 0, "page": 1, "per_page": 100 } })
    }

    #[tokio::test]
    async fn precise_search_uses_title_abstract_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param(
                "filter",
                "title_and_abstract.search:graphene membranes",
            ))
            .and(query_param("sort", "relevance_score:desc"))
            .and(query_param("per_page", "100"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(empty_works_body()))
            .mount(&server)
            .await;

        let client = OpenAlexClient::new_for_test(server.uri()).unwrap();
        let page = client
            .search_works("graphene membranes", ModeUsed::Precise, 1, 100)
            .await
            .unwrap();
        assert!(page.results.is_empty());
        assert_eq!(page.meta.and_then(|m| m.count), Some(0));
    }

    #[tokio::test]
    async fn broad_search_uses_fulltext_param() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("search", "\"machine learning\" AND (crop OR yield)"))
            .respond_with(ResponseTemplate::new(200).set_body_json(empty_works_body()))
            .mount(&server)
            .await;

        let client = OpenAlexClient::new_for_test(server.uri()).unwrap();
        let page = client
            .search_works(
                "\"machine learning\" AND (crop OR yield)",
                ModeUsed::Broad,
                1,
                100,
            )
            .await
            .unwrap();
        assert!(page.results.is_empty());
    }

    #[tokio::test]
    async fn per_page_is_capped_at_provider_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("per_page", "200"))
            .respond_with(ResponseTemplate::new(200).set_body_json(empty_works_body()))
            .mount(&server)
            .await;

        let client = OpenAlexClient::new_for_test(server.uri()).unwrap();
        client
            .search_works("wetland", ModeUsed::Broad, 1, 999)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn get_source_strips_url_prefix_and_maps_404_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sources/S123"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = OpenAlexClient::new_for_test(server.uri()).unwrap();
        let source = client
            .get_source("https://openalex.org/S123")
            .await
            .unwrap();
        assert!(source.is_none());
    }

    #[tokio::test]
    async fn get_source_by_issn_rejects_invalid_locally() {
        // No mock mounted: an invalid ISSN must not hit the network.
        let server = MockServer::start().await;
        let client = OpenAlexClient::new_for_test(server.uri()).unwrap();
        let source = client.get_source_by_issn("not-an-issn").await.unwrap();
        assert!(source.is_none());
    }

    #[tokio::test]
    async fn get_source_by_issn_uses_dashed_form() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sources/issn:1234-5678"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "https://openalex.org/S42",
                "display_name": "Journal of Examples",
                "issn_l": "1234-5678",
                "works_count": 10,
                "cited_by_count": 100
            })))
            .mount(&server)
            .await;

        let client = OpenAlexClient::new_for_test(server.uri()).unwrap();
        let source = client
            .get_source_by_issn("12345678")
            .await
            .unwrap()
            .expect("source should resolve");
        assert_eq!(source.short_id(), Some("S42"));
        assert_eq!(source.display_name.as_deref(), Some("Journal of Examples"));
    }

    #[tokio::test]
    async fn server_error_surfaces_with_excerpt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream capacity"))
            .mount(&server)
            .await;

        let client = OpenAlexClient::new_for_test(server.uri()).unwrap();
        let err = client
            .search_works("wetland", ModeUsed::Broad, 1, 100)
            .await
            .expect_err("503 should surface");
        let message = err.to_string();
        assert!(message.contains("503"));
    }

    #[test]
    fn parent_source_prefers_primary_location() {
        let work: OpenAlexWork = serde_json::from_value(serde_json::json!({
            "id": "https://openalex.org/W1",
            "primary_location": { "source": { "id": "https://openalex.org/S1", "display_name": "Primary" } },
            "locations": [ { "source": { "id": "https://openalex.org/S2", "display_name": "Secondary" } } ]
        }))
        .unwrap();
        assert_eq!(
            work.parent_source().and_then(|s| s.display_name.as_deref()),
            Some("Primary")
        );
    }

    #[test]
    fn parent_source_falls_back_to_locations() {
        let work: OpenAlexWork = serde_json::from_value(serde_json::json!({
            "id": "https://openalex.org/W1",
            "primary_location": { "source": null },
            "locations": [
                { "source": null },
                { "source": { "id": "https://openalex.org/S2", "display_name": "Fallback" } }
            ]
        }))
        .unwrap();
        assert_eq!(
            work.parent_source().and_then(|s| s.display_name.as_deref()),
            Some("Fallback")
        );
    }

    #[test]
    fn counts_for_year_picks_matching_entry() {
        let source: OpenAlexSource = serde_json::from_value(serde_json::json!({
            "id": "https://openalex.org/S1",
            "counts_by_year": [
                { "year": 2022, "works_count": 120, "cited_by_count": 3400 },
                { "year": 2021, "works_count": 95, "cited_by_count": 2800 }
            ]
        }))
        .unwrap();
        assert_eq!(source.counts_for_year(2021), (Some(95), Some(2800)));
        assert_eq!(source.counts_for_year(1999), (None, None));
    }

    #[test]
    fn topic_short_id_strips_prefix() {
        let topic = SourceTopic {
            id: Some("https://openalex.org/T10521".into()),
            display_name: Some("Hydrology".into()),
        };
        assert_eq!(topic.short_id(), Some("T10521"));
    }
}
