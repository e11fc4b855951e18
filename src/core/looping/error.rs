use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoopError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] json5::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Frame {key} is {width}x{height}, needs at least {min_width}x{min_height} for hashing")]
    FrameTooSmall {
        key: String,
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },
    #[error("Frame buffer for {key} has {actual} bytes, expected {expected}")]
    FrameBuffer {
        key: String,
        expected: usize,
        actual: usize,
    },
    #[error("No frames to process")]
    EmptyInput,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Frames out of order: {current} does not follow {previous}")]
    UnorderedFrames { previous: String, current: String },
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Signature for {key} has {actual} bytes, expected {expected}")]
    SignatureLength {
        key: String,
        expected: usize,
        actual: usize,
    },
    #[error("Signature of {bits} bits cannot be packed into {bytes} bytes")]
    MalformedSignature { bits: usize, bytes: usize },
    #[error("No signature for frame {0}")]
    MissingSignature(String),
    #[error("Frame budget exceeded: {frames} frames sampled, limit {limit}")]
    FrameBudgetExceeded { frames: usize, limit: usize },
    #[error("Time budget exceeded during {stage}: {elapsed_ms}ms elapsed, limit {limit_ms}ms")]
    TimeBudgetExceeded {
        stage: &'static str,
        elapsed_ms: u128,
        limit_ms: u64,
    },
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}
