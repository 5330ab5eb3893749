use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("pulse code {code} for event `{event}` is outside 1..=8")]
    CodeOutOfRange { event: String, code: u8 },

    #[error("pulse code {code} is used by both `{first}` and `{second}`")]
    DuplicateCode {
        code: u8,
        first: String,
        second: String,
    },

    #[error("event `{event}` has pulse code {table} in the code table but {requested} was requested")]
    CodeMismatch { event: String, table: u8, requested: u8 },

    #[error("cannot open pulse port {port:?} at {baud} baud: {source}")]
    PortOpen {
        port: PathBuf,
        baud: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("pulse write failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("pulse write did not complete within {0:?}")]
    Timeout(Duration),

    #[error("pulse writer thread is gone")]
    WriterGone,
}
