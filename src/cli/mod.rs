//! Top-level CLI parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{debug, info};

use crate::config::{self, RecommendOptions};
use crate::engine::{self, JournalCandidate};
use crate::error::JintelError;
use crate::query::{SearchMode, SearchRequest};
use crate::quartile::QuartileTable;
use crate::render;
use crate::sources::openalex::OpenAlexClient;
use crate::utils::issn;

#[derive(Parser, Debug)]
#[command(
    name = "jintel",
    about = "Journal and article recommendations for manuscripts, journal similarity, and SJR quartiles (OpenAlex)",
    version,
    after_help = "Set OPENALEX_EMAIL to join the OpenAlex polite pool; set JINTEL_SJR_CSV to a Scimago CSV export for quartile columns."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON instead of Markdown
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Recommend journals and related articles for a manuscript
    #[command(after_help = "\
EXAMPLES:
  jintel recommend \"graphene oxide membranes for desalination\"
  jintel recommend --title \"...\" --abstract \"...\" --top-n 15
  jintel recommend -q \"urban heat islands\" --mode broad --sjr scimagojr.csv
  jintel recommend --title \"...\" --save run.json")]
    Recommend {
        /// Manuscript title
        #[arg(short, long)]
        title: Option<String>,

        /// Manuscript abstract (alone, must be at least 50 characters)
        #[arg(short, long = "abstract")]
        abstract_text: Option<String>,

        /// Free-text query sent verbatim (bypasses keyword extraction)
        #[arg(short, long)]
        query: Option<String>,
        /// Optional positional query alias for -q/--query
        #[arg(value_name = "QUERY")]
        positional_query: Option<String>,

        /// Search mode: auto (precise with broad fallback), precise, broad
        #[arg(long, default_value = "auto")]
        mode: String,

        /// Results per provider page (50-200)
        #[arg(long = "per-page", default_value_t = config::DEFAULT_PER_PAGE)]
        per_page: usize,
        /// Provider pages to fetch (1-5)
        #[arg(long = "max-pages", default_value_t = config::DEFAULT_MAX_PAGES)]
        max_pages: usize,
        /// Journals to return (5-20)
        #[arg(long = "top-n", default_value_t = config::DEFAULT_TOP_N_JOURNALS)]
        top_n: usize,
        /// Keywords extracted from title/abstract (5-20)
        #[arg(long, default_value_t = config::DEFAULT_KEYWORD_COUNT)]
        keywords: usize,

        /// Keep editorials, letters, corrections, and paratext
        #[arg(long = "include-editorial")]
        include_editorial: bool,
        /// Count conference series, repositories, and other non-journal venues
        #[arg(long = "include-nonjournal")]
        include_nonjournal: bool,

        /// Scimago CSV export for quartile enrichment (overrides JINTEL_SJR_CSV)
        #[arg(long)]
        sjr: Option<PathBuf>,

        /// Write the full run record as JSON to this path
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Rank journals similar to a reference journal
    #[command(after_help = "\
EXAMPLES:
  jintel similar S139312396
  jintel similar 0043-1354 --thematic --top-n 15
  jintel similar S139312396 --pool-size 100 --sjr scimagojr.csv")]
    Similar {
        /// Reference journal: OpenAlex source ID (S…) or ISSN
        id: String,

        /// Similar journals to return (5-20)
        #[arg(long = "top-n", default_value_t = config::DEFAULT_TOP_N_JOURNALS)]
        top_n: usize,
        /// Blend topic overlap into the score (0.7 numeric + 0.3 thematic)
        #[arg(long)]
        thematic: bool,
        /// Candidate journals fetched for comparison (10-200)
        #[arg(long = "pool-size", default_value_t = 50)]
        pool_size: usize,

        /// Scimago CSV export for quartile enrichment (overrides JINTEL_SJR_CSV)
        #[arg(long)]
        sjr: Option<PathBuf>,
    },
    /// Show one journal's profile card
    #[command(after_help = "\
EXAMPLES:
  jintel journal 0043-1354
  jintel journal \"Water Research\"
  jintel journal S139312396 --sjr scimagojr.csv")]
    Journal {
        /// OpenAlex source ID (S…), ISSN, or journal name
        id_or_name: String,

        /// Scimago CSV export for quartile enrichment (overrides JINTEL_SJR_CSV)
        #[arg(long)]
        sjr: Option<PathBuf>,
    },
    /// Check provider connectivity
    Health,
}

fn normalize_cli_query(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn resolve_query_input(
    flag_query: Option<String>,
    positional_query: Option<String>,
) -> Result<Option<String>, JintelError> {
    let flag_query = normalize_cli_query(flag_query);
    let positional_query = normalize_cli_query(positional_query);
    match (flag_query, positional_query) {
        (Some(_), Some(_)) => Err(JintelError::InvalidArgument(
            "Use either positional QUERY or -q/--query, not both".to_string(),
        )),
        (Some(value), None) | (None, Some(value)) => Ok(Some(value)),
        (None, None) => Ok(None),
    }
}

fn load_quartiles(flag: Option<&PathBuf>) -> Result<Option<QuartileTable>, JintelError> {
    let path = flag.cloned().or_else(config::sjr_csv_path);
    match path {
        Some(path) => {
            let table = QuartileTable::load_csv(&path)?;
            info!(path = %path.display(), entries = table.len(), "Quartile table loaded");
            Ok(Some(table))
        }
        None => Ok(None),
    }
}

/// Resolves a journal reference that may be an OpenAlex source ID, an ISSN,
/// or free text (name search, first hit wins).
async fn resolve_journal(
    client: &OpenAlexClient,
    raw: &str,
    allow_name_search: bool,
) -> Result<JournalCandidate, JintelError> {
    let trimmed = raw.trim();
    let ref_year = config::reference_year();

    let source = if trimmed.starts_with('S') && trimmed[1..].chars().all(|c| c.is_ascii_digit()) {
        client.get_source(trimmed).await?
    } else if let Some(normalized) = issn::normalize_issn(trimmed) {
        client.get_source_by_issn(&normalized).await?
    } else if allow_name_search {
        debug!(query = trimmed, "Resolving journal by name search");
        client.search_sources(trimmed, 10).await?.into_iter().next()
    } else {
        return Err(JintelError::InvalidArgument(format!(
            "\"{trimmed}\" is not an OpenAlex source ID (S…) or a valid ISSN"
        )));
    };

    let source = source.ok_or_else(|| JintelError::NotFound {
        entity: "Journal".to_string(),
        id: trimmed.to_string(),
        suggestion: "Try the OpenAlex source ID, the ISSN-L, or a name search via `jintel journal <name>`."
            .to_string(),
    })?;
    JournalCandidate::from_source(&source, ref_year).ok_or_else(|| JintelError::NotFound {
        entity: "Journal".to_string(),
        id: trimmed.to_string(),
        suggestion: "The provider returned a record without an identifier.".to_string(),
    })
}

/// Related-article rows shown in the Markdown view; `--json` carries them all.
const ARTICLE_DISPLAY_LIMIT: usize = 20;

pub async fn run(cli: Cli) -> anyhow::Result<String> {
    let json_output = cli.json;
    match cli.command {
        Commands::Recommend {
            title,
            abstract_text,
            query,
            positional_query,
            mode,
            per_page,
            max_pages,
            top_n,
            keywords,
            include_editorial,
            include_nonjournal,
            sjr,
            save,
        } => {
            let free_query = resolve_query_input(query, positional_query)?;
            let request = SearchRequest {
                title: normalize_cli_query(title),
                abstract_text: normalize_cli_query(abstract_text),
                free_query,
                mode: SearchMode::from_flag(&mode)?,
            };
            let options = RecommendOptions {
                per_page,
                max_pages,
                top_n_journals: top_n,
                keyword_count: keywords,
                mode: request.mode,
                include_editorial_types: include_editorial,
                include_nonjournal_sources: include_nonjournal,
                ..RecommendOptions::default()
            };
            let quartiles = load_quartiles(sjr.as_ref())?;

            let client = OpenAlexClient::new()?;
            let run = engine::recommend(&client, &request, &options, quartiles.as_ref()).await?;

            if let Some(path) = save {
                let body = render::json(&run)?;
                tokio::fs::write(&path, body).await.map_err(JintelError::Io)?;
                info!(path = %path.display(), "Run record saved");
            }

            if json_output {
                Ok(render::json(&run)?)
            } else {
                Ok(render::recommendation_run(&run, ARTICLE_DISPLAY_LIMIT))
            }
        }
        Commands::Similar {
            id,
            top_n,
            thematic,
            pool_size,
            sjr,
        } => {
            if !(5..=20).contains(&top_n) {
                return Err(JintelError::InvalidArgument(
                    "--top-n must be between 5 and 20".to_string(),
                )
                .into());
            }
            if !(10..=200).contains(&pool_size) {
                return Err(JintelError::InvalidArgument(
                    "--pool-size must be between 10 and 200".to_string(),
                )
                .into());
            }
            let quartiles = load_quartiles(sjr.as_ref())?;

            let client = OpenAlexClient::new()?;
            let mut reference = resolve_journal(&client, &id, false).await?;
            let pool = engine::similarity_pool(&client, &reference, pool_size).await?;
            debug!(pool = pool.len(), "Similarity pool fetched");
            let mut results = engine::find_similar(&reference, pool, top_n, thematic);

            if let Some(table) = &quartiles {
                reference.attach_quartile(table);
                for entry in &mut results {
                    entry.journal.attach_quartile(table);
                }
            }

            if json_output {
                Ok(render::json(&results)?)
            } else {
                Ok(render::similar_journals(&reference, &results))
            }
        }
        Commands::Journal { id_or_name, sjr } => {
            let quartiles = load_quartiles(sjr.as_ref())?;
            let client = OpenAlexClient::new()?;
            let mut journal = resolve_journal(&client, &id_or_name, true).await?;
            if let Some(table) = &quartiles {
                journal.attach_quartile(table);
            }
            if json_output {
                Ok(render::json(&journal)?)
            } else {
                Ok(render::journal_card(&journal))
            }
        }
        Commands::Health => {
            let client = OpenAlexClient::new()?;
            let status = match client.search_sources("nature", 10).await {
                Ok(_) => "ok",
                Err(_) => "unreachable",
            };
            if json_output {
                Ok(render::json(&serde_json::json!({ "openalex": status }))?)
            } else {
                Ok(format!("# Health\n\n- OpenAlex: {status}\n"))
            }
        }
    }
}
