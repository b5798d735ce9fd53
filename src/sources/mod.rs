//! Shared HTTP plumbing for provider clients: one retrying client, base-URL
//! overrides for tests, and bounded body reads.

use std::borrow::Cow;
use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};

use crate::error::JintelError;

pub mod openalex;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
const BODY_EXCERPT_LEN: usize = 200;

/// Builds the shared client: 30s timeout, gzip, and exponential backoff on
/// transient failures (429/5xx/network). Retry exhaustion surfaces to the
/// caller as the final response or transport error.
pub fn shared_client() -> Result<ClientWithMiddleware, JintelError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("jintel/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(JintelError::HttpClientInit)?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);
    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// Resolves a client base URL, preferring a non-empty environment override.
pub fn env_base(default_base: &'static str, env_var: &str) -> Cow<'static, str> {
    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Cow::Owned(value.trim().to_string()),
        _ => Cow::Borrowed(default_base),
    }
}

/// Reads a response body with a hard size cap so a misbehaving endpoint
/// cannot balloon memory.
pub async fn read_limited_body(
    mut resp: reqwest::Response,
    api: &str,
) -> Result<Vec<u8>, JintelError> {
    if let Some(len) = resp.content_length()
        && len as usize > MAX_BODY_BYTES
    {
        return Err(JintelError::Api {
            api: api.to_string(),
            message: format!("response body too large ({len} bytes)"),
        });
    }

    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        if out.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(JintelError::Api {
                api: api.to_string(),
                message: "response body too large".to_string(),
            });
        }
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

/// Short printable excerpt of an error body for diagnostics.
pub fn body_excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let flat: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let trimmed = flat.trim();
    if trimmed.len() <= BODY_EXCERPT_LEN {
        trimmed.to_string()
    } else {
        let mut end = BODY_EXCERPT_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}
