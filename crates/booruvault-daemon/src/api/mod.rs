//! Client for the remote booru JSON API.

mod client;
mod dto;

pub use client::{BooruClient, SearchQuery};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid remote data: {0}")]
    Invalid(String),
}
