//! Weighted scoring of aggregated candidates. All normalization is
//! max-scaling within the run's own candidate set, so scores are
//! comparable inside a run but not across runs.

use serde::Serialize;

use crate::query::ModeUsed;

use super::{ArticleCandidate, JournalCandidate};

const W_FREQUENCY: f64 = 0.75;
const W_CITEDNESS: f64 = 0.15;
const W_WORKS_REF: f64 = 0.05;
const W_CITES_REF: f64 = 0.05;

const W_ARTICLE_RELEVANCE: f64 = 0.7;
const W_ARTICLE_CITATIONS: f64 = 0.3;

#[derive(Debug, Clone, Serialize)]
pub struct ScoredJournal {
    pub rank: usize,
    pub score: f64,
    pub explanation: String,
    #[serde(flatten)]
    pub journal: JournalCandidate,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredArticle {
    pub rank: usize,
    pub score: f64,
    #[serde(flatten)]
    pub article: ArticleCandidate,
}

/// `x / max`, or 0 when the set's max is 0. Output stays in [0, 1].
fn max_scale(value: f64, max: f64) -> f64 {
    if max > 0.0 { value / max } else { 0.0 }
}

fn fold_max(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0_f64, f64::max)
}

/// Scores journals by weighted frequency and activity metrics, returning
/// the top slice ranked from 1. Missing enrichment fields contribute zero
/// rather than disqualifying the candidate.
pub fn score_journals(journals: Vec<JournalCandidate>, top_n: usize) -> Vec<ScoredJournal> {
    let max_freq = fold_max(journals.iter().map(|j| j.frequency as f64));
    let max_citedness = fold_max(
        journals
            .iter()
            .filter_map(|j| j.two_yr_mean_citedness),
    );
    let max_works = fold_max(journals.iter().filter_map(|j| j.works_ref_year).map(|v| v as f64));
    let max_cites = fold_max(journals.iter().filter_map(|j| j.cites_ref_year).map(|v| v as f64));

    let mut scored: Vec<ScoredJournal> = journals
        .into_iter()
        .map(|journal| {
            let score = W_FREQUENCY * max_scale(journal.frequency as f64, max_freq)
                + W_CITEDNESS
                    * max_scale(journal.two_yr_mean_citedness.unwrap_or(0.0), max_citedness)
                + W_WORKS_REF
                    * max_scale(journal.works_ref_year.unwrap_or(0) as f64, max_works)
                + W_CITES_REF
                    * max_scale(journal.cites_ref_year.unwrap_or(0) as f64, max_cites);
            let explanation = format!(
                "Appears {} times in results | {} works (reference year), {} citations (reference year)",
                journal.frequency,
                journal.works_ref_year.unwrap_or(0),
                journal.cites_ref_year.unwrap_or(0),
            );
            ScoredJournal {
                rank: 0,
                score,
                explanation,
                journal,
            }
        })
        .collect();

    // Stable: equal scores keep discovery order.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_n);
    for (i, entry) in scored.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    scored
}

/// Scores articles by the strategy matching the mode that produced them:
/// precise results trust the provider's relevance ordering, broad results
/// blend normalized relevance with normalized citations. Ties break by
/// citation count, then discovery order.
pub fn score_articles(
    articles: Vec<ArticleCandidate>,
    mode: ModeUsed,
    top_n: usize,
) -> Vec<ScoredArticle> {
    let mut scored: Vec<ScoredArticle> = match mode {
        ModeUsed::Precise => articles
            .into_iter()
            .map(|article| ScoredArticle {
                rank: 0,
                score: article.relevance_score.unwrap_or(0.0),
                article,
            })
            .collect(),
        ModeUsed::Broad => {
            let max_relevance = fold_max(articles.iter().filter_map(|a| a.relevance_score));
            let max_cited = fold_max(articles.iter().map(|a| a.cited_by_count as f64));
            articles
                .into_iter()
                .map(|article| {
                    let score = W_ARTICLE_RELEVANCE
                        * max_scale(article.relevance_score.unwrap_or(0.0), max_relevance)
                        + W_ARTICLE_CITATIONS
                            * max_scale(article.cited_by_count as f64, max_cited);
                    ScoredArticle {
                        rank: 0,
                        score,
                        article,
                    }
                })
                .collect()
        }
    };

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.article.cited_by_count.cmp(&a.article.cited_by_count))
    });
    scored.truncate(top_n);
    for (i, entry) in scored.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    scored
}
