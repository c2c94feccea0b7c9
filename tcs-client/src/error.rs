use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid {field} {input:?}: {reason}")]
    UrlParse {
        field: &'static str,
        input: String,
        reason: String,
    },

    #[error("error creating request: {0}")]
    RequestBuild(#[source] reqwest::Error),

    #[error("error sending request: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("request failed with status: {status_line}")]
    RemoteRejected { status_line: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("bind callback listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("callback listener failed: {0}")]
    Serve(#[source] std::io::Error),
}

impl Error {
    /// Status line of a response that was received but rejected.
    pub fn status_line(&self) -> Option<&str> {
        match self {
            Self::RemoteRejected { status_line } => Some(status_line),
            _ => None,
        }
    }

    pub(crate) fn config_read(path: &Path, e: std::io::Error) -> Self {
        Self::Config(format!("read config {}: {e}", path.display()))
    }

    pub(crate) fn config_parse(path: &Path, e: impl std::fmt::Display) -> Self {
        Self::Config(format!("parse config {}: {e}", path.display()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
