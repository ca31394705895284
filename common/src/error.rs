use std::path::PathBuf;

use crate::gob::GobError;
use crate::lzw::LzwError;

/// Anything that can go wrong between reading the template file and
/// rendering the decoded payload. Every stage returns one of these; the
/// CLI maps them all to exit code 1.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read {path:?}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0:?} does not end in .ctmpl")]
    BadExtension(PathBuf),

    #[error("could not construct HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("could not parse KV response: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("no dedup entry stored for fingerprint {fingerprint}")]
    NoEntry { fingerprint: String },

    #[error("KV value is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decompression failed: {0}")]
    Decompression(#[from] LzwError),

    #[error("payload deserialization failed: {0}")]
    Deserialization(#[from] GobError),

    #[error("payload does not look like template data: {0}")]
    UnexpectedShape(String),
}
