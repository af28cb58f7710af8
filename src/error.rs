use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("ClickUp API unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Malformed ClickUp response: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{provider} access token not found for org_id={org_id}")]
    MissingCredential { provider: String, org_id: i64 },

    #[error("No ClickUp team found for org_id={0}")]
    MissingTeam(i64),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Board {board_id} belongs to org_id={board_org_id}, not org_id={org_id}")]
    OrgMismatch {
        board_id: i64,
        board_org_id: i64,
        org_id: i64,
    },

    #[error("Server error: {0}")]
    Server(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<rusqlite_migration::Error> for Error {
    fn from(e: rusqlite_migration::Error) -> Self {
        Error::Migration(e.to_string())
    }
}

impl<E: fmt::Display> From<tokio_rusqlite::Error<E>> for Error {
    fn from(e: tokio_rusqlite::Error<E>) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Decode(e.to_string())
        } else {
            Error::SourceUnavailable(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
