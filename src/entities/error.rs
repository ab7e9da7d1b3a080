//! Error taxonomy for the frame engine.
//!
//! - `SourceError`: the container itself cannot be played. Terminal, surfaced
//!   synchronously from `play`.
//! - `FrameError`: one frame failed to decode or filter. Recovered locally
//!   (the slot stays a placeholder) and surfaced only as a decode warning.
//! - `OptionsError`: rejected configuration.
//!
//! Stale background results (superseded session generation) are not errors:
//! they are dropped where they arrive and never reach the host.

/// Container-level failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Zero-byte input
    Empty,
    /// Recognized container that could not be parsed
    Corrupt(String),
    /// Not an image format the decoder understands
    Unsupported(String),
    /// Decoder reports zero frames
    NoFrames,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Empty => write!(f, "Source is empty"),
            SourceError::Corrupt(e) => write!(f, "Corrupt source: {}", e),
            SourceError::Unsupported(e) => write!(f, "Unsupported source: {}", e),
            SourceError::NoFrames => write!(f, "Source has no frames"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Per-frame failure. The frame stays a placeholder for the rest of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    Decode { index: usize, message: String },
    Filter { index: usize, message: String },
    OutOfRange { index: usize, frame_count: usize },
}

impl FrameError {
    /// Frame index the failure belongs to
    pub fn index(&self) -> usize {
        match self {
            FrameError::Decode { index, .. }
            | FrameError::Filter { index, .. }
            | FrameError::OutOfRange { index, .. } => *index,
        }
    }
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Decode { index, message } => {
                write!(f, "Frame {} decode error: {}", index, message)
            }
            FrameError::Filter { index, message } => {
                write!(f, "Frame {} filter error: {}", index, message)
            }
            FrameError::OutOfRange { index, frame_count } => {
                write!(f, "Frame {} out of range ({} frames)", index, frame_count)
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Invalid `AnimatedOptions`
#[derive(Debug, Clone, PartialEq)]
pub enum OptionsError {
    ZeroBufferCapacity,
    InvalidMaxTimeStep(f64),
    ZeroLoopCount,
}

impl std::fmt::Display for OptionsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionsError::ZeroBufferCapacity => write!(f, "buffer_capacity must be > 0"),
            OptionsError::InvalidMaxTimeStep(v) => {
                write!(f, "max_time_step must be finite and > 0 (got {})", v)
            }
            OptionsError::ZeroLoopCount => write!(f, "loop count must be > 0"),
        }
    }
}

impl std::error::Error for OptionsError {}

/// Why `play` refused to start a session
#[derive(Debug, Clone, PartialEq)]
pub enum PlayError {
    Source(SourceError),
    Options(OptionsError),
    /// Decode queue thread could not be spawned
    Worker(String),
}

impl std::fmt::Display for PlayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayError::Source(e) => write!(f, "{}", e),
            PlayError::Options(e) => write!(f, "Invalid options: {}", e),
            PlayError::Worker(e) => write!(f, "Decode queue unavailable: {}", e),
        }
    }
}

impl std::error::Error for PlayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlayError::Source(e) => Some(e),
            PlayError::Options(e) => Some(e),
            PlayError::Worker(_) => None,
        }
    }
}

impl From<SourceError> for PlayError {
    fn from(e: SourceError) -> Self {
        PlayError::Source(e)
    }
}

impl From<OptionsError> for PlayError {
    fn from(e: OptionsError) -> Self {
        PlayError::Options(e)
    }
}
