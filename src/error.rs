use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors produced by the analysis engine. Silence is not an error; silent
/// inputs come back as a flagged result instead.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("invalid analysis configuration: {0}")]
    InvalidConfiguration(String),

    #[error("sample rate mismatch: before {before} Hz, after {after} Hz (enable resampling or supply matching files)")]
    SampleRateMismatch { before: u32, after: u32 },

    #[error("unsupported channel layout: {0} channels (expected mono or stereo)")]
    UnsupportedChannelLayout(usize),

    #[error("resampling failed: {0}")]
    Resample(String),
}
