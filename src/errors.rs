use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type DiResult<T> = Result<T, DiError>;

#[derive(Error, Debug)]
pub enum DiError {
    #[error("could not load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("missing citation data for source {0}")]
    MissingSource(String),

    #[error("delimited file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_path_to_error::Error<serde_json::Error>),

    #[error("a worker crashed while processing source {source_name}")]
    WorkerPanicked { source_name: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl DiError {
    pub fn load<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        DiError::Load {
            path: path.into(),
            source,
        }
    }
}
