use thiserror::Error;

use crate::Side;

#[derive(Error, Debug)]
pub enum Error {
    #[error("request '{name}' has no URL for the {side} side")]
    MissingUrl { name: String, side: Side },

    #[error("invalid input file: {0}")]
    InvalidInput(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid placeholder pattern: {0}")]
    Placeholder(#[from] regex::Error),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
