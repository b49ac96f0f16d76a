//! Error types for the career progress engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Read or write against the persistent store failed
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Navigation into a locked course
    #[error("course {course} is locked")]
    RejectedNavigation { course: String },

    #[error("unknown course: {0}")]
    UnknownCourse(String),

    #[error("unknown post: {0}")]
    UnknownPost(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}
