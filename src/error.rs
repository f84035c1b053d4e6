use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("gps worker: {0}")]
    Gps(String),
}

pub type Result<T> = std::result::Result<T, Error>;
