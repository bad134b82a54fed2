use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("timed out waiting for the datastore lock")]
    LockTimeout,

    #[error("datastore I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("datastore document is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}
