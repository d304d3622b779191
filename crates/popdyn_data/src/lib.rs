//! Data-access layer for the two live dashboard pages.
//!
//! The core models never touch the network; these clients fetch and parse
//! the upstream payloads into plain `(timestamp, value)` sequences. Missing
//! data inside a successful response is an empty sequence, not an error;
//! transport and upstream failures surface as [`DataError`] for the page
//! layer to render as an on-chart message.

pub mod covid;
pub mod weather;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned status {status} for {url}")]
    UpstreamStatus { status: u16, url: String },
    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),
}

pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, DataError> {
    let status = response.status();
    if !status.is_success() {
        return Err(DataError::UpstreamStatus {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response)
}
