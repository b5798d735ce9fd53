//! Output rendering. Every command produces either pretty JSON (`--json`)
//! or a Markdown view of the same data.

use serde::Serialize;

use crate::engine::{JournalCandidate, RecommendationRun, ScoredArticle, ScoredJournal, SimilarJournal};
use crate::error::JintelError;

pub fn json<T: Serialize>(value: &T) -> Result<String, JintelError> {
    serde_json::to_string_pretty(value).map_err(JintelError::OutputJson)
}

fn quartile_cell(journal: &JournalCandidate) -> String {
    journal
        .quartile
        .as_ref()
        .map(|q| q.quartile.as_str().to_string())
        .unwrap_or_else(|| "—".to_string())
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

pub fn recommendation_run(run: &RecommendationRun, article_limit: usize) -> String {
    let mut out = String::new();
    out.push_str("# Journal Recommendations\n\n");
    out.push_str(&format!(
        "Query: `{}` (mode: {})\n\n",
        run.query_text,
        run.mode_used.as_str()
    ));

    if run.is_empty() {
        out.push_str("No matching works found. Try a broader query or `--mode broad`.\n");
        return out;
    }

    out.push_str(&journal_table(&run.journals));
    if !run.articles.is_empty() {
        out.push_str("\n## Related Articles\n\n");
        out.push_str(&article_table(&run.articles, article_limit));
    }
    out
}

fn journal_table(journals: &[ScoredJournal]) -> String {
    let mut out = String::new();
    out.push_str("## Journals\n\n");
    out.push_str("| # | Journal | Score | Freq | Quartile | Why |\n");
    out.push_str("|---|---------|-------|------|----------|-----|\n");
    for entry in journals {
        out.push_str(&format!(
            "| {} | {} | {:.4} | {} | {} | {} |\n",
            entry.rank,
            escape_cell(&entry.journal.display_name),
            entry.score,
            entry.journal.frequency,
            quartile_cell(&entry.journal),
            escape_cell(&entry.explanation),
        ));
    }
    out
}

fn article_table(articles: &[ScoredArticle], limit: usize) -> String {
    let mut out = String::new();
    out.push_str("| # | Title | Year | Citations |\n");
    out.push_str("|---|-------|------|-----------|\n");
    for entry in articles.iter().take(limit) {
        let title = entry.article.title.as_deref().unwrap_or("(untitled)");
        let year = entry
            .article
            .publication_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "—".to_string());
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            entry.rank,
            escape_cell(title),
            year,
            entry.article.cited_by_count,
        ));
    }
    if articles.len() > limit {
        out.push_str(&format!(
            "\n{} more articles omitted; use `--json` for the full list.\n",
            articles.len() - limit
        ));
    }
    out
}

pub fn similar_journals(reference: &JournalCandidate, results: &[SimilarJournal]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# Journals Similar to {}\n\n",
        escape_cell(&reference.display_name)
    ));
    if results.is_empty() {
        out.push_str("No comparable journals found (candidates need enough metric coverage).\n");
        return out;
    }

    let thematic = results.iter().any(|r| r.thematic_similarity.is_some());
    if thematic {
        out.push_str("| # | Journal | Combined | Numeric | Thematic | Quartile |\n");
        out.push_str("|---|---------|----------|---------|----------|----------|\n");
    } else {
        out.push_str("| # | Journal | Similarity | Quartile |\n");
        out.push_str("|---|---------|------------|----------|\n");
    }
    for entry in results {
        if thematic {
            let thematic_cell = entry
                .thematic_similarity
                .map(|t| format!("{t:.4}"))
                .unwrap_or_else(|| "—".to_string());
            out.push_str(&format!(
                "| {} | {} | {:.4} | {:.4} | {} | {} |\n",
                entry.rank,
                escape_cell(&entry.journal.display_name),
                entry.combined_similarity,
                entry.numeric_similarity,
                thematic_cell,
                quartile_cell(&entry.journal),
            ));
        } else {
            out.push_str(&format!(
                "| {} | {} | {:.4} | {} |\n",
                entry.rank,
                escape_cell(&entry.journal.display_name),
                entry.combined_similarity,
                quartile_cell(&entry.journal),
            ));
        }
    }
    out
}

pub fn journal_card(journal: &JournalCandidate) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", escape_cell(&journal.display_name)));
    out.push_str(&format!("- ID: {}\n", journal.source_id));
    if let Some(issn) = &journal.issn_l {
        out.push_str(&format!("- ISSN-L: {issn}\n"));
    }
    if let Some(publisher) = &journal.publisher {
        out.push_str(&format!("- Publisher: {}\n", escape_cell(publisher)));
    }
    if let Some(country) = &journal.country_code {
        out.push_str(&format!("- Country: {country}\n"));
    }
    if let Some(record) = &journal.quartile {
        match record.sjr {
            Some(sjr) => out.push_str(&format!(
                "- SJR: {} ({sjr:.3})\n",
                record.quartile.as_str()
            )),
            None => out.push_str(&format!("- SJR: {}\n", record.quartile.as_str())),
        }
    }
    if let Some(works) = journal.works_count {
        out.push_str(&format!("- Works: {works}\n"));
    }
    if let Some(cited) = journal.cited_by_count {
        out.push_str(&format!("- Citations: {cited}\n"));
    }
    if let Some(citedness) = journal.two_yr_mean_citedness {
        out.push_str(&format!("- 2-year mean citedness: {citedness:.3}\n"));
    }
    if let (Some(works), Some(cites)) = (journal.works_ref_year, journal.cites_ref_year) {
        out.push_str(&format!(
            "- Reference-year activity: {works} works, {cites} citations\n"
        ));
    }
    if !journal.topics.is_empty() {
        let labels: Vec<&str> = journal
            .topics
            .iter()
            .filter_map(|t| t.display_name.as_deref())
            .collect();
        if !labels.is_empty() {
            out.push_str(&format!("- Topics: {}\n", labels.join(", ")));
        }
    }
    out
}
