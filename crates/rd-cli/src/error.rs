use rd_core::error::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config '{path}': {source}")]
    Config {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid event on line {line}: {source}")]
    Event {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to start tokio runtime: {0}")]
    Runtime(std::io::Error),
    #[error("Replay task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
