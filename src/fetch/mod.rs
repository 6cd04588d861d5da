//! HTTP boundary for retrieving the raw dataset export.
//!
//! A fetch failure is fatal to the run: the pipeline never consumes a
//! partial payload.

mod basic;

pub use basic::BasicClient;

use async_trait::async_trait;
use reqwest::{Request, Response};
use thiserror::Error;

/// Seam for the HTTP boundary, so the dataset loader can be driven by a
/// stub in tests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// Failure at the dataset fetch boundary.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid source URL: {0}")]
    InvalidUrl(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request failed with status {0}")]
    Status(reqwest::StatusCode),
}

/// Fetches `url` and returns the response body as UTF-8 text.
///
/// # Errors
///
/// Returns [`FetchError`] on a malformed URL, a transport failure, or a
/// non-success HTTP status.
pub async fn fetch_text<C: HttpClient>(client: &C, url: &str) -> Result<String, FetchError> {
    let url: reqwest::Url = url
        .parse()
        .map_err(|e| FetchError::InvalidUrl(format!("{e}")))?;
    let req = Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;
    if !resp.status().is_success() {
        return Err(FetchError::Status(resp.status()));
    }
    Ok(resp.text().await?)
}
