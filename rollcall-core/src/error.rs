use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RollcallError>;

#[derive(Debug, Error)]
pub enum RollcallError {
    #[error("roster not loaded")]
    RosterNotLoaded,

    #[error("recognition is already running")]
    AlreadyRunning,

    #[error("failed to read roster {path:?}: {source}")]
    RosterIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse roster: {0}")]
    RosterParse(#[from] csv::Error),

    #[error("roster is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("model file not found: {0:?}")]
    ModelMissing(PathBuf),

    #[error("vision error: {0}")]
    Vision(String),

    #[error("camera error: {0}")]
    Camera(String),

    #[error("failed to spawn recognition thread: {0}")]
    Spawn(#[source] std::io::Error),
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for RollcallError {
    fn from(e: opencv::Error) -> Self {
        RollcallError::Vision(e.to_string())
    }
}
