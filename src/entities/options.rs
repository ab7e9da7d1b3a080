//! Playback options (loop policy, buffer size, time step, display mode)
//!
//! Serializable so hosts can keep them in their own settings files:
//!
//! ```json
//! { "loop_policy": { "count": 3 }, "buffer_capacity": 24, "max_time_step": 0.5 }
//! ```
//!
//! Missing keys fall back to defaults (`#[serde(default)]`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::OptionsError;

/// Default number of decoded frames kept resident
pub const DEFAULT_BUFFER_CAPACITY: usize = 50;

/// Default cap on a single tick / frame duration (seconds)
pub const DEFAULT_MAX_TIME_STEP: f64 = 1.0;

/// How many times the animation plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoopPolicy {
    #[default]
    Infinite,
    Once,
    Count(u32),
}

impl LoopPolicy {
    /// Numeric loop target: 0 = unbounded, 1 = once, N = N
    pub fn loop_target(&self) -> u32 {
        match self {
            LoopPolicy::Infinite => 0,
            LoopPolicy::Once => 1,
            LoopPolicy::Count(n) => *n,
        }
    }
}

/// Which frame(s) the host gets to see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FrameDisplayMode {
    #[default]
    Animated,
    FirstFrameOnly,
    LastFrameOnly,
    FixedIndex(usize),
}

impl FrameDisplayMode {
    /// Frame shown first for a source with `frame_count` frames
    pub fn start_index(&self, frame_count: usize) -> usize {
        let last = frame_count.saturating_sub(1);
        match self {
            FrameDisplayMode::Animated | FrameDisplayMode::FirstFrameOnly => 0,
            FrameDisplayMode::LastFrameOnly => last,
            FrameDisplayMode::FixedIndex(i) => (*i).min(last),
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, FrameDisplayMode::Animated)
    }
}

/// Options for one playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatedOptions {
    pub loop_policy: LoopPolicy,
    /// Decoded frames kept resident. Higher = more memory, less decode work.
    pub buffer_capacity: usize,
    /// Cap on tick `dt` and on every frame duration (seconds)
    pub max_time_step: f64,
    pub display_mode: FrameDisplayMode,
}

impl Default for AnimatedOptions {
    fn default() -> Self {
        Self {
            loop_policy: LoopPolicy::Infinite,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_time_step: DEFAULT_MAX_TIME_STEP,
            display_mode: FrameDisplayMode::Animated,
        }
    }
}

impl AnimatedOptions {
    pub fn with_loop(mut self, loop_policy: LoopPolicy) -> Self {
        self.loop_policy = loop_policy;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_max_time_step(mut self, seconds: f64) -> Self {
        self.max_time_step = seconds;
        self
    }

    pub fn with_display_mode(mut self, mode: FrameDisplayMode) -> Self {
        self.display_mode = mode;
        self
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.buffer_capacity == 0 {
            return Err(OptionsError::ZeroBufferCapacity);
        }
        if !self.max_time_step.is_finite() || self.max_time_step <= 0.0 {
            return Err(OptionsError::InvalidMaxTimeStep(self.max_time_step));
        }
        if self.loop_policy == LoopPolicy::Count(0) {
            return Err(OptionsError::ZeroLoopCount);
        }
        Ok(())
    }

    /// Parse and validate options from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json).context("Failed to parse options JSON")?;
        options.validate()?;
        Ok(options)
    }

    /// Load and validate options from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read options: {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("Invalid options file: {}", path.display()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize options")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_targets() {
        assert_eq!(LoopPolicy::Infinite.loop_target(), 0);
        assert_eq!(LoopPolicy::Once.loop_target(), 1);
        assert_eq!(LoopPolicy::Count(4).loop_target(), 4);
    }

    #[test]
    fn test_display_mode_start_index() {
        assert_eq!(FrameDisplayMode::Animated.start_index(10), 0);
        assert_eq!(FrameDisplayMode::FirstFrameOnly.start_index(10), 0);
        assert_eq!(FrameDisplayMode::LastFrameOnly.start_index(10), 9);
        assert_eq!(FrameDisplayMode::FixedIndex(4).start_index(10), 4);
        assert_eq!(FrameDisplayMode::FixedIndex(40).start_index(10), 9);
        assert_eq!(FrameDisplayMode::LastFrameOnly.start_index(0), 0);
    }

    #[test]
    fn test_defaults() {
        let options = AnimatedOptions::default();
        assert_eq!(options.buffer_capacity, 50);
        assert_eq!(options.max_time_step, 1.0);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = AnimatedOptions::default();
        assert_eq!(
            base.clone().with_buffer_capacity(0).validate(),
            Err(OptionsError::ZeroBufferCapacity)
        );
        assert!(matches!(
            base.clone().with_max_time_step(0.0).validate(),
            Err(OptionsError::InvalidMaxTimeStep(_))
        ));
        assert!(base.clone().with_max_time_step(f64::INFINITY).validate().is_err());
        assert_eq!(
            base.with_loop(LoopPolicy::Count(0)).validate(),
            Err(OptionsError::ZeroLoopCount)
        );
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let options =
            AnimatedOptions::from_json_str(r#"{ "loop_policy": { "count": 3 }, "buffer_capacity": 8 }"#)
                .unwrap();
        assert_eq!(options.loop_policy, LoopPolicy::Count(3));
        assert_eq!(options.buffer_capacity, 8);
        assert_eq!(options.max_time_step, DEFAULT_MAX_TIME_STEP);
        assert_eq!(options.display_mode, FrameDisplayMode::Animated);
    }

    #[test]
    fn test_json_unit_variants() {
        let options = AnimatedOptions::from_json_str(
            r#"{ "loop_policy": "once", "display_mode": "last_frame_only" }"#,
        )
        .unwrap();
        assert_eq!(options.loop_policy, LoopPolicy::Once);
        assert_eq!(options.display_mode, FrameDisplayMode::LastFrameOnly);

        let saved = options.to_json_string().unwrap();
        assert_eq!(AnimatedOptions::from_json_str(&saved).unwrap(), options);
    }

    #[test]
    fn test_json_invalid_rejected() {
        assert!(AnimatedOptions::from_json_str(r#"{ "buffer_capacity": 0 }"#).is_err());
        assert!(AnimatedOptions::from_json_str("not json").is_err());
        assert!(AnimatedOptions::load("/nonexistent/framereel.json").is_err());
    }
}
