use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// A query that parses but matches nothing is not an error; the pipeline
/// returns an empty run instead. Malformed individual provider records are
/// recovered locally and never surface here.
#[derive(Debug, Error)]
pub enum JintelError {
    #[error(
        "No usable search terms remain after stop-word filtering. Provide a more specific title, abstract, or query."
    )]
    EmptyQuery,

    #[error("{api} rate limit exceeded after retries")]
    RateLimited { api: String },

    #[error("{api} request failed: {message}")]
    Api { api: String, message: String },

    #[error("{api} returned malformed JSON")]
    ApiJson {
        api: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{entity} \"{id}\" not found. {suggestion}")]
    NotFound {
        entity: String,
        id: String,
        suggestion: String,
    },

    #[error("Failed to read quartile table {path}")]
    QuartileCsv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to initialize HTTP client")]
    HttpClientInit(#[source] reqwest::Error),

    #[error(transparent)]
    Http(#[from] reqwest_middleware::Error),

    #[error(transparent)]
    HttpTransport(#[from] reqwest::Error),

    #[error("Failed to serialize output")]
    OutputJson(#[source] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
