use thiserror::Error;

#[derive(Error, Debug)]
pub enum PicError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Mesh topology error: {0}")]
    MeshTopology(String),

    #[error("Relocation walk starting at cell {start_cell} exceeded {hops} hops without terminating")]
    WalkDidNotTerminate { start_cell: usize, hops: usize },

    #[error("Population bookkeeping error: {0}")]
    Bookkeeping(String),

    #[error("Snapshot parse error at line {line}: {message}")]
    SnapshotParse { line: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PicResult<T> = Result<T, PicError>;
