//! Default `Decoder` built on the `image` crate (GIF, APNG, animated WebP).
//!
//! **Why**: Hosts that do not bring their own container parser still need a
//! random-access decoder for the frame engine.
//!
//! # Random Access
//!
//! GIF/APNG/WebP frames are deltas against the previous canvas (disposal and
//! blending), so frame `i` can only be produced by walking frames `0..=i`.
//! A walker thread keeps one open frame iterator per decoder and resumes it
//! for every request at or past its position. Playback asks for indices in
//! ring order, so a whole loop costs one walk; only a backward request (loop
//! wrap, reset, a new session on the same decoder) restarts from frame 0.
//!
//! The iterator lives on its own thread because `image::Frames` is not
//! `Send` and the decoder is shared across threads.
//!
//! # Delays
//!
//! Container delays follow browser conventions (`normalize_container_delay`):
//! - missing or `<= 0` → 1/15 s
//! - below 20 ms → 100 ms (legacy "as fast as possible" GIFs)

use crossbeam_channel::{Sender, bounded, unbounded};
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, Frames, ImageFormat, ImageResult, RgbaImage};
use log::{debug, trace, warn};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use super::error::{FrameError, SourceError};
use super::frame::DEFAULT_FRAME_DURATION;
use super::traits::Decoder;

/// Delays under this are treated as unset by browsers
const MIN_CONTAINER_DELAY: f64 = 0.02 - f64::EPSILON;

/// Replacement for delays under `MIN_CONTAINER_DELAY`
const FAST_FRAME_DELAY: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Gif,
    Apng,
    WebP,
    Still,
}

/// Container bytes, shared with the walker thread
#[derive(Clone)]
struct Container {
    data: Arc<[u8]>,
    format: ImageFormat,
    kind: ContainerKind,
}

impl Container {
    fn frames(&self) -> ImageResult<Frames<'static>> {
        let cursor = Cursor::new(Arc::clone(&self.data));
        match self.kind {
            ContainerKind::Gif => Ok(GifDecoder::new(cursor)?.into_frames()),
            ContainerKind::Apng => Ok(PngDecoder::new(cursor)?.apng()?.into_frames()),
            ContainerKind::WebP => Ok(WebPDecoder::new(cursor)?.into_frames()),
            ContainerKind::Still => Err(image::ImageError::Unsupported(
                image::error::UnsupportedError::from_format_and_kind(
                    self.format.into(),
                    image::error::UnsupportedErrorKind::GenericFeature("animation".into()),
                ),
            )),
        }
    }
}

/// Open frame iterator; `next` is the index it yields next
struct Walk {
    next: usize,
    frames: Frames<'static>,
}

/// Resumable walk over a container's frames
struct FrameWalker {
    container: Container,
    walk: Option<Walk>,
    restarts: Arc<AtomicUsize>,
}

impl FrameWalker {
    fn new(container: Container, restarts: Arc<AtomicUsize>) -> Self {
        Self {
            container,
            walk: None,
            restarts,
        }
    }

    /// Composited frame `index`. Continues the open walk when it has not
    /// passed `index` yet, otherwise reopens the container.
    fn frame(&mut self, index: usize) -> Result<RgbaImage, String> {
        let walk = match self.walk.take() {
            Some(walk) if walk.next <= index => walk,
            _ => {
                self.restarts.fetch_add(1, Ordering::Relaxed);
                trace!("Walk restarts from frame 0 for frame {}", index);
                Walk {
                    next: 0,
                    frames: self.container.frames().map_err(|e| e.to_string())?,
                }
            }
        };
        let Walk { mut next, mut frames } = walk;

        while let Some(frame) = frames.next() {
            let current = next;
            next += 1;
            match frame {
                // Later frames are deltas on a broken canvas: drop the walk
                Err(e) => return Err(e.to_string()),
                Ok(frame) if current == index => {
                    self.walk = Some(Walk { next, frames });
                    return Ok(frame.into_buffer());
                }
                Ok(_) => {}
            }
        }
        Err("container ended early".to_string())
    }
}

struct WalkRequest {
    index: usize,
    reply: Sender<Result<RgbaImage, String>>,
}

/// Start the walker thread. It ends when the request sender is dropped.
fn spawn_walker(container: Container, restarts: Arc<AtomicUsize>) -> std::io::Result<Sender<WalkRequest>> {
    let (sender, receiver) = unbounded::<WalkRequest>();
    thread::Builder::new()
        .name("framereel-walk".to_string())
        .spawn(move || {
            let mut walker = FrameWalker::new(container, restarts);
            for request in receiver.iter() {
                let _ = request.reply.send(walker.frame(request.index));
            }
            trace!("Frame walker stopped");
        })?;
    Ok(sender)
}

/// In-memory container plus its frame table.
pub struct ContainerDecoder {
    container: Container,
    durations: Vec<f64>,
    /// Spawned on the first animated decode
    walker: Mutex<Option<Sender<WalkRequest>>>,
    restarts: Arc<AtomicUsize>,
}

impl ContainerDecoder {
    /// Sniff, validate and index a container.
    ///
    /// # Errors
    ///
    /// - `SourceError::Empty`: zero bytes
    /// - `SourceError::Unsupported`: not an image format `image` recognizes
    /// - `SourceError::Corrupt`: recognized but not even frame 0 decodes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SourceError> {
        if bytes.is_empty() {
            return Err(SourceError::Empty);
        }
        let format = image::guess_format(bytes).map_err(|e| SourceError::Unsupported(e.to_string()))?;
        let data: Arc<[u8]> = Arc::from(bytes);

        let kind = match format {
            ImageFormat::Gif => ContainerKind::Gif,
            ImageFormat::Png => {
                let png = PngDecoder::new(Cursor::new(&data[..])).map_err(corrupt)?;
                if png.is_apng().map_err(corrupt)? {
                    ContainerKind::Apng
                } else {
                    ContainerKind::Still
                }
            }
            ImageFormat::WebP => {
                let webp = WebPDecoder::new(Cursor::new(&data[..])).map_err(corrupt)?;
                if webp.has_animation() {
                    ContainerKind::WebP
                } else {
                    ContainerKind::Still
                }
            }
            _ => ContainerKind::Still,
        };

        let container = Container { data, format, kind };
        let durations = scan_durations(&container)?;

        debug!("ContainerDecoder: {:?} ({:?}), {} frames", format, kind, durations.len());
        Ok(Self {
            container,
            durations,
            walker: Mutex::new(None),
            restarts: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn format(&self) -> ImageFormat {
        self.container.format
    }

    /// True for multi-frame capable containers (GIF/APNG/animated WebP)
    pub fn is_animated_container(&self) -> bool {
        self.container.kind != ContainerKind::Still
    }

    /// Times a frame walk started over from frame 0
    pub fn walk_restarts(&self) -> usize {
        self.restarts.load(Ordering::Relaxed)
    }

    fn walker(&self) -> Option<Sender<WalkRequest>> {
        let mut walker = self.walker.lock().unwrap_or_else(|e| e.into_inner());
        if walker.is_none() {
            match spawn_walker(self.container.clone(), Arc::clone(&self.restarts)) {
                Ok(sender) => *walker = Some(sender),
                Err(e) => warn!("Frame walker unavailable, decoding in place: {}", e),
            }
        }
        walker.clone()
    }

    fn walk_to(&self, index: usize) -> Result<RgbaImage, String> {
        if let Some(walker) = self.walker() {
            let (reply, response) = bounded(1);
            if walker.send(WalkRequest { index, reply }).is_ok() {
                if let Ok(result) = response.recv() {
                    return result;
                }
            }
        }
        FrameWalker::new(self.container.clone(), Arc::clone(&self.restarts)).frame(index)
    }
}

/// Walk the container once, collecting normalized delays.
///
/// A frame that fails to decode ends the sequence: every later frame
/// depends on it. Zero decodable frames is a corrupt source.
fn scan_durations(container: &Container) -> Result<Vec<f64>, SourceError> {
    if container.kind == ContainerKind::Still {
        image::load_from_memory_with_format(&container.data, container.format).map_err(corrupt)?;
        return Ok(vec![DEFAULT_FRAME_DURATION]);
    }

    let mut durations = Vec::new();
    for (idx, frame) in container.frames().map_err(corrupt)?.enumerate() {
        match frame {
            Ok(frame) => {
                let (numer, denom) = frame.delay().numer_denom_ms();
                let seconds = if denom == 0 {
                    0.0
                } else {
                    numer as f64 / denom as f64 / 1000.0
                };
                durations.push(normalize_container_delay(seconds));
            }
            Err(e) if idx == 0 => return Err(corrupt(e)),
            Err(e) => {
                warn!("Container truncated at frame {}: {}", idx, e);
                break;
            }
        }
    }

    if durations.is_empty() {
        return Err(SourceError::NoFrames);
    }
    Ok(durations)
}

impl Decoder for ContainerDecoder {
    fn frame_count(&self) -> usize {
        self.durations.len()
    }

    fn frame_duration(&self, index: usize) -> f64 {
        self.durations.get(index).copied().unwrap_or(DEFAULT_FRAME_DURATION)
    }

    fn decode_frame(&self, index: usize) -> Result<RgbaImage, FrameError> {
        let frame_count = self.frame_count();
        if index >= frame_count {
            return Err(FrameError::OutOfRange { index, frame_count });
        }

        let result = if self.container.kind == ContainerKind::Still {
            image::load_from_memory_with_format(&self.container.data, self.container.format)
                .map(|img| img.to_rgba8())
                .map_err(|e| e.to_string())
        } else {
            self.walk_to(index)
        };
        result.map_err(|message| FrameError::Decode { index, message })
    }
}

/// Browser-style delay normalization (seconds).
pub fn normalize_container_delay(seconds: f64) -> f64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        DEFAULT_FRAME_DURATION
    } else if seconds < MIN_CONTAINER_DELAY {
        FAST_FRAME_DELAY
    } else {
        seconds
    }
}

fn corrupt(e: image::ImageError) -> SourceError {
    SourceError::Corrupt(e.to_string())
}
