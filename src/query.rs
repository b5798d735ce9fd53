//! Query construction: turns manuscript text into OpenAlex search strings.
//!
//! Two tiers are prepared up front. The precise tier targets the
//! title+abstract index; the broad tier is a boolean full-text query used
//! when the precise tier finds nothing (or when the caller forces it).

use serde::{Deserialize, Serialize};

use crate::config::MIN_ABSTRACT_LEN;
use crate::error::JintelError;

/// Hard cap on tokens sent to the precise title+abstract filter.
const PRECISE_TOKEN_CAP: usize = 15;
/// OR-group size in the broad boolean query.
const BROAD_OR_GROUP: usize = 5;
/// Free-text queries are passed through verbatim but length-capped.
const FREE_QUERY_CAP: usize = 400;

/// English stop words.
const STOP_WORDS_EN: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "has", "have",
    "her", "was", "one", "our", "out", "his", "its", "that", "this", "these", "those", "with",
    "from", "they", "them", "then", "than", "were", "been", "being", "will", "would", "could",
    "should", "into", "onto", "over", "under", "about", "above", "below", "between", "among",
    "through", "during", "before", "after", "each", "which", "what", "when", "where", "while",
    "who", "whom", "whose", "how", "why", "also", "such", "some", "more", "most", "other",
    "only", "own", "same", "both", "does", "did", "doing", "because", "very", "there", "here",
];

/// Spanish stop words. Manuscript metadata in this system's corpus is
/// bilingual, so both sets are always applied.
const STOP_WORDS_ES: &[&str] = &[
    "los", "las", "una", "uno", "unos", "unas", "del", "por", "para", "con", "sin", "sobre",
    "entre", "hasta", "desde", "este", "esta", "estos", "estas", "ese", "esa", "esos", "esas",
    "como", "donde", "cuando", "que", "qué", "más", "menos", "muy", "pero", "tambien", "también",
    "ser", "son", "está", "están", "fue", "fueron", "hay", "sus", "les", "nos",
];

/// Generic scholarly vocabulary that carries no topical signal.
const GENERIC_TERMS: &[&str] = &[
    "scholarly",
    "journal",
    "study",
    "research",
    "analysis",
    "paper",
    "review",
    "article",
    "publication",
    "science",
    "scientific",
    "academic",
    "data",
    "results",
    "method",
    "approach",
    "using",
    "based",
    "new",
    "model",
];

/// Known multi-word phrases whose words must not be matched independently.
/// When one appears in the retained terms it becomes a quoted exact-phrase
/// anchor in the broad query; this suppresses noise such as journal "about"
/// pages matching on "editorial" and "board" separately.
const STRONG_BIGRAMS: &[(&str, &str)] = &[
    ("editorial", "board"),
    ("machine", "learning"),
    ("artificial", "intelligence"),
    ("climate", "change"),
    ("deep", "learning"),
    ("neural", "network"),
    ("systematic", "review"),
    ("meta", "analysis"),
    ("randomized", "controlled"),
    ("double", "blind"),
];

/// Requested search mode. `Auto` attempts precise first and falls back to
/// broad on zero results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Auto,
    Precise,
    Broad,
}

impl SearchMode {
    pub fn from_flag(value: &str) -> Result<Self, JintelError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "precise" => Ok(Self::Precise),
            "broad" => Ok(Self::Broad),
            _ => Err(JintelError::InvalidArgument(
                "Invalid mode. Expected one of: auto, precise, broad".into(),
            )),
        }
    }
}

/// The mode that ultimately produced a result set. Downstream article
/// scoring weights depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeUsed {
    Precise,
    Broad,
}

impl ModeUsed {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Precise => "precise",
            Self::Broad => "broad",
        }
    }
}

/// Manuscript description entering the pipeline.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub free_query: Option<String>,
    pub mode: SearchMode,
}

/// Both query tiers, built once per request. `forced` is `Some` when the
/// request rules out the automatic precise→broad fallback.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub precise: String,
    pub broad: String,
    pub forced: Option<ModeUsed>,
}

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS_EN.contains(&token) || STOP_WORDS_ES.contains(&token)
}

fn is_generic(token: &str) -> bool {
    GENERIC_TERMS.contains(&token)
}

fn keeps_token(token: &str) -> bool {
    token.len() >= 3
        && token.chars().any(|c| c.is_alphabetic())
        && !is_stop_word(token)
        && !is_generic(token)
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_strong_bigram(first: &str, second: &str) -> bool {
    STRONG_BIGRAMS
        .iter()
        .any(|(a, b)| first == *a && second == *b)
}

/// A candidate term with its in-text frequency and first-seen position.
struct Term {
    text: String,
    count: usize,
    first_seen: usize,
    is_bigram: bool,
}

/// Extracts the top-K terms (unigrams and adjacent bigrams) from the raw
/// token stream, ranked by frequency with first occurrence breaking ties.
fn rank_terms(tokens: &[String], keyword_count: usize) -> Vec<Term> {
    let mut terms: Vec<Term> = Vec::new();

    let mut bump = |text: String, position: usize, is_bigram: bool| {
        if let Some(term) = terms.iter_mut().find(|t| t.text == text) {
            term.count += 1;
        } else {
            terms.push(Term {
                text,
                count: 1,
                first_seen: position,
                is_bigram,
            });
        }
    };

    for (i, token) in tokens.iter().enumerate() {
        if keeps_token(token) {
            bump(token.clone(), i, false);
        }
    }
    for (i, pair) in tokens.windows(2).enumerate() {
        let (first, second) = (pair[0].as_str(), pair[1].as_str());
        // A strong bigram is a term even when one of its words would be
        // filtered on its own; ordinary bigrams need both words to survive.
        if is_strong_bigram(first, second) || (keeps_token(first) && keeps_token(second)) {
            bump(format!("{first} {second}"), i, true);
        }
    }

    terms.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.first_seen.cmp(&b.first_seen))
    });
    terms.truncate(keyword_count);
    terms
}

fn cap_chars(text: &str, cap: usize) -> &str {
    match text.char_indices().nth(cap) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn validate(request: &SearchRequest) -> Result<(), JintelError> {
    let title = request.title.as_deref().map(str::trim).unwrap_or_default();
    let abstract_text = request
        .abstract_text
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    let free = request
        .free_query
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();

    if title.is_empty() && abstract_text.is_empty() && free.is_empty() {
        return Err(JintelError::InvalidArgument(
            "Provide at least one of --title, --abstract, or --query".into(),
        ));
    }
    if free.is_empty() && title.is_empty() && abstract_text.len() < MIN_ABSTRACT_LEN {
        return Err(JintelError::InvalidArgument(format!(
            "An abstract used alone must be at least {MIN_ABSTRACT_LEN} characters"
        )));
    }
    Ok(())
}

/// Builds both query tiers from a request.
///
/// # Errors
///
/// Returns `InvalidArgument` for an unusable request shape and `EmptyQuery`
/// when stop-word and generic-term filtering leaves nothing to search for.
pub fn build_query(
    request: &SearchRequest,
    keyword_count: usize,
) -> Result<BuiltQuery, JintelError> {
    validate(request)?;

    if let Some(free) = request
        .free_query
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        let text = cap_chars(free, FREE_QUERY_CAP).trim().to_string();
        let forced = match request.mode {
            SearchMode::Precise => Some(ModeUsed::Precise),
            // Free-form queries go against the full-text index by default.
            SearchMode::Auto | SearchMode::Broad => Some(ModeUsed::Broad),
        };
        return Ok(BuiltQuery {
            precise: text.clone(),
            broad: text,
            forced,
        });
    }

    let mut source = String::new();
    if let Some(title) = request.title.as_deref() {
        source.push_str(title);
        source.push(' ');
    }
    if let Some(abstract_text) = request.abstract_text.as_deref() {
        source.push_str(abstract_text);
    }

    let tokens = tokenize(&source);
    let terms = rank_terms(&tokens, keyword_count);
    if terms.is_empty() {
        return Err(JintelError::EmptyQuery);
    }

    let anchor = terms.iter().find(|t| {
        t.is_bigram
            && t.text
                .split_once(' ')
                .is_some_and(|(a, b)| is_strong_bigram(a, b))
    });

    let mut precise_tokens: Vec<&str> = Vec::new();
    for term in &terms {
        for word in term.text.split(' ') {
            if precise_tokens.len() >= PRECISE_TOKEN_CAP {
                break;
            }
            if !precise_tokens.contains(&word) {
                precise_tokens.push(word);
            }
        }
    }
    let precise = precise_tokens.join(" ");

    let broad = match anchor {
        Some(anchor_term) => {
            let anchor_words: Vec<&str> = anchor_term.text.split(' ').collect();
            let or_group: Vec<&str> = terms
                .iter()
                .filter(|t| !t.is_bigram && !anchor_words.contains(&t.text.as_str()))
                .take(BROAD_OR_GROUP)
                .map(|t| t.text.as_str())
                .collect();
            if or_group.is_empty() {
                format!("\"{}\"", anchor_term.text)
            } else {
                format!("\"{}\" AND ({})", anchor_term.text, or_group.join(" OR "))
            }
        }
        None => precise.clone(),
    };

    let forced = match request.mode {
        SearchMode::Auto => None,
        SearchMode::Precise => Some(ModeUsed::Precise),
        SearchMode::Broad => Some(ModeUsed::Broad),
    };

    Ok(BuiltQuery {
        precise,
        broad,
        forced,
    })
}
