//! Entities module - data types and collaborator interfaces of the frame engine
//!
//! - `frame`: window slots, image handle, duration normalization
//! - `options`: loop policy, display mode, buffer/time-step configuration
//! - `traits`: `Decoder` and `FilterPipeline` capabilities
//! - `decoder`: `image`-crate backed `Decoder` (GIF/APNG/WebP)
//! - `effects`: CPU `FilterPipeline` and its filters
//! - `error`: source/frame/options error taxonomy

pub mod decoder;
pub mod effects;
pub mod error;
pub mod frame;
pub mod options;
pub mod traits;

pub use decoder::ContainerDecoder;
pub use effects::{CpuFilterPipeline, Filter, ScaleMode};
pub use error::{FrameError, OptionsError, PlayError, SourceError};
pub use frame::{Frame, FrameImage, FrameStatus};
pub use options::{AnimatedOptions, FrameDisplayMode, LoopPolicy};
pub use traits::{Decoder, FilterPipeline};
