//! Test doubles shared by the unit tests
//!
//! - `ScriptedDecoder`: fixed durations, failing frames, decode counters and
//!   an optional gate that blocks one frame's decode until released
//! - `RecordingHost`: records every host callback
//! - `encode_gif` / `encode_png`: tiny in-memory containers
//!
//! Scripted frames are 1-pixel-identifiable: pixel (0,0) is
//! `[tag, index, 0, 255]`, see `pixel_id`.

use crossbeam_channel::{Receiver, Sender, unbounded};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame as ImageFrame, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::PlaybackHost;
use crate::entities::{Decoder, FrameError, FrameImage};

const GATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Decoder side of a gate: blocks the gated decode until released
pub struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

/// Test side of a gate
pub struct GateControl {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl Gate {
    pub fn new() -> (Gate, GateControl) {
        let (entered_tx, entered_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        (
            Gate {
                entered: entered_tx,
                release: release_rx,
            },
            GateControl {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }

    fn pass(&self) {
        let _ = self.entered.send(());
        let _ = self.release.recv_timeout(GATE_TIMEOUT);
    }
}

impl GateControl {
    /// Wait until the gated decode has started
    pub fn wait_entered(&self, timeout: Duration) -> bool {
        self.entered.recv_timeout(timeout).is_ok()
    }

    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

pub struct ScriptedDecoder {
    durations: Vec<f64>,
    failing: Vec<usize>,
    counts: Vec<AtomicUsize>,
    gate: Option<(usize, Gate)>,
    tag: u8,
    size: (u32, u32),
}

impl ScriptedDecoder {
    pub fn new(durations: Vec<f64>) -> Self {
        let counts = durations.iter().map(|_| AtomicUsize::new(0)).collect();
        Self {
            durations,
            failing: Vec::new(),
            counts,
            gate: None,
            tag: 0,
            size: (2, 2),
        }
    }

    pub fn with_failures(mut self, indices: &[usize]) -> Self {
        self.failing = indices.to_vec();
        self
    }

    pub fn with_gate(mut self, index: usize, gate: Gate) -> Self {
        self.gate = Some((index, gate));
        self
    }

    pub fn with_tag(mut self, tag: u8) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Times each frame has been decoded
    pub fn decode_counts(&self) -> Vec<usize> {
        self.counts.iter().map(|c| c.load(Ordering::SeqCst)).collect()
    }
}

impl Decoder for ScriptedDecoder {
    fn frame_count(&self) -> usize {
        self.durations.len()
    }

    fn frame_duration(&self, index: usize) -> f64 {
        self.durations[index]
    }

    fn decode_frame(&self, index: usize) -> Result<RgbaImage, FrameError> {
        let frame_count = self.durations.len();
        if index >= frame_count {
            return Err(FrameError::OutOfRange { index, frame_count });
        }
        self.counts[index].fetch_add(1, Ordering::SeqCst);
        if let Some((gated, gate)) = &self.gate {
            if *gated == index {
                gate.pass();
            }
        }
        if self.failing.contains(&index) {
            return Err(FrameError::Decode {
                index,
                message: "scripted failure".to_string(),
            });
        }
        let (w, h) = self.size;
        Ok(RgbaImage::from_pixel(w, h, Rgba([self.tag, index as u8, 0, 255])))
    }
}

/// `(tag, frame index)` of a scripted frame
pub fn pixel_id(image: &FrameImage) -> (u8, u8) {
    let px = image.get_pixel(0, 0).0;
    (px[0], px[1])
}

/// Records every callback. Frame images are stored by scripted index.
#[derive(Default)]
pub struct RecordingHost {
    pub ready: Vec<(f64, Option<u8>)>,
    pub frames: Vec<Option<u8>>,
    pub finished: Vec<f64>,
    pub warnings: Vec<usize>,
    pub presented: Vec<FrameImage>,
}

impl PlaybackHost for RecordingHost {
    fn present(&mut self, image: &FrameImage) {
        self.presented.push(FrameImage::clone(image));
    }

    fn on_ready(&mut self, total_loop_duration: f64, first_frame: Option<&FrameImage>) {
        self.ready
            .push((total_loop_duration, first_frame.map(|img| pixel_id(img).1)));
        if let Some(image) = first_frame {
            self.present(image);
        }
    }

    fn on_frame_changed(&mut self, image: Option<&FrameImage>) {
        self.frames.push(image.map(|img| pixel_id(img).1));
        if let Some(image) = image {
            self.present(image);
        }
    }

    fn on_playback_finished(&mut self, total_loop_duration: f64) {
        self.finished.push(total_loop_duration);
    }

    fn on_decode_warning(&mut self, frame_index: usize) {
        self.warnings.push(frame_index);
    }
}

/// Animated GIF with one solid `width x height` frame per delay
pub fn encode_gif(delays_ms: &[u32], width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder.set_repeat(Repeat::Infinite).unwrap();
        let frames = delays_ms.iter().enumerate().map(|(idx, delay_ms)| {
            let shade = ((idx * 60) % 256) as u8;
            let rgba = RgbaImage::from_pixel(width, height, Rgba([shade, 0, 0, 255]));
            ImageFrame::from_parts(rgba, 0, 0, Delay::from_numer_denom_ms(*delay_ms, 1))
        });
        encoder.encode_frames(frames).unwrap();
    }
    out
}

/// Still PNG
pub fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}
