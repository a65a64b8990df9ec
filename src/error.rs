/* ------------------------------------------------------------------ */
/* Crate-wide error type                                              */
/* ------------------------------------------------------------------ */
//
// Unknown tokens during encoding are NOT errors — they map to the
// reserved unknown id. A corpus too short to fill one window is NOT an
// error either — the pipeline just yields nothing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Corpus bytes are not valid UTF-8.
    #[error("corpus is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// Rejected before any work begins: non-positive temperature,
    /// zero window/batch/buffer sizes, undersized vocabulary cap.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Sampler method called in the wrong phase (e.g. result() before Done).
    #[error("sampler phase error: {0}")]
    Phase(&'static str),

    #[error("model error: {0}")]
    Model(#[from] candle_core::Error),

    #[error("vocabulary file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
