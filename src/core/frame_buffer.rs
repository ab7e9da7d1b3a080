//! Sliding decode window over a container's frames
//!
//! **Why**: Decoding every frame of a long animation up front costs
//! `w * h * 4 * frame_count` bytes. The window keeps at most `capacity`
//! decoded frames, positioned ahead of the playhead.
//!
//! **Used by**: PlaybackController (one buffer per session)
//!
//! # Residency
//!
//! With `W = min(capacity, frame_count)` and playhead `i`, the resident set
//! is the `W` indices starting at `i`, wrapping modulo `frame_count`:
//!
//! ```text
//! frame_count = 10, W = 4, i = 8:   [8, 9, 0, 1]
//! ```
//!
//! Position decides residency, not recency. Frames that leave the ring are
//! dropped back to placeholders (no secondary cache).
//!
//! # Threads
//!
//! - Decode queue: sole writer. Decodes and filters without the lock, then
//!   locks only to store the finished slot.
//! - Presentation thread: `frame_image` reads under the lock and
//!   `on_advance` only enqueues work.
//!
//! Refills are coalesced: `on_advance` records the latest playhead and
//! enqueues one refill job unless one is already waiting. The job reads
//! the most recent playhead when it starts.

use log::{debug, trace, warn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;

use super::events::SessionEvent;
use super::workers::QueueHandle;
use crate::entities::frame::{compute_durations, image_cost};
use crate::entities::{Decoder, Filter, FilterPipeline, Frame, FrameError, FrameImage, FrameStatus};

/// Fixed-size ring of frame slots
#[derive(Debug)]
pub struct FrameWindow {
    /// `slots[k]` holds frame `(start + k) % frame_count`
    slots: Vec<Frame>,
    start: usize,
    frame_count: usize,
    durations: Arc<[f64]>,
    /// Frames that failed once stay placeholders for the session
    failed: HashSet<usize>,
}

impl FrameWindow {
    /// Empty window of `min(capacity, frame_count)` placeholders starting at `start`
    pub fn new(durations: Arc<[f64]>, capacity: usize, start: usize) -> Self {
        let frame_count = durations.len();
        let size = capacity.min(frame_count);
        let start = if frame_count == 0 { 0 } else { start % frame_count };
        let slots = (0..size)
            .map(|k| {
                let index = (start + k) % frame_count;
                Frame::placeholder(index, durations[index])
            })
            .collect();
        Self {
            slots,
            start,
            frame_count,
            durations,
            failed: HashSet::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Slot position of frame `index`, if it is inside the ring
    fn position(&self, index: usize) -> Option<usize> {
        if index >= self.frame_count {
            return None;
        }
        let k = (index + self.frame_count - self.start) % self.frame_count;
        (k < self.slots.len()).then_some(k)
    }

    pub fn slot(&self, index: usize) -> Option<&Frame> {
        self.position(index).map(|k| &self.slots[k])
    }

    /// O(1) lookup; `None` for placeholders and frames outside the ring
    pub fn image(&self, index: usize) -> Option<FrameImage> {
        self.slot(index).and_then(|frame| frame.image().cloned())
    }

    /// Move the ring to start at `start`.
    ///
    /// Frames leaving the ring are dropped; frames staying keep their image.
    /// Returns indices inside the new ring that still need decoding, in ring
    /// order (failed frames excluded).
    pub fn retarget(&mut self, start: usize) -> Vec<usize> {
        if self.frame_count == 0 {
            return Vec::new();
        }
        let start = start % self.frame_count;

        let mut old: HashMap<usize, Frame> =
            self.slots.drain(..).map(|frame| (frame.index(), frame)).collect();

        let size = old.len();
        for k in 0..size {
            let index = (start + k) % self.frame_count;
            let frame = old.remove(&index).unwrap_or_else(|| {
                if self.failed.contains(&index) {
                    Frame::failed(index, self.durations[index])
                } else {
                    Frame::placeholder(index, self.durations[index])
                }
            });
            self.slots.push(frame);
        }

        let evicted = old.values().filter(|frame| !frame.is_placeholder()).count();
        if evicted > 0 {
            trace!("Window {} -> {}: evicted {} frame(s)", self.start, start, evicted);
        }
        self.start = start;
        self.missing()
    }

    /// Placeholder slots that have not failed, in ring order
    pub fn missing(&self) -> Vec<usize> {
        self.slots
            .iter()
            .filter(|frame| frame.status() == FrameStatus::Placeholder)
            .map(Frame::index)
            .collect()
    }

    /// Store a decoded frame. Returns false if `index` left the ring meanwhile.
    pub fn store(&mut self, index: usize, image: FrameImage) -> bool {
        match self.position(index) {
            Some(k) => {
                self.slots[k] = Frame::loaded(index, image, self.durations[index]);
                true
            }
            None => false,
        }
    }

    pub fn mark_failed(&mut self, index: usize) {
        self.failed.insert(index);
        if let Some(k) = self.position(index) {
            self.slots[k] = Frame::failed(index, self.durations[index]);
        }
    }

    pub fn is_failed(&self, index: usize) -> bool {
        self.failed.contains(&index)
    }

    /// Indices currently holding a decoded image, in ring order
    pub fn resident_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .filter(|frame| !frame.is_placeholder())
            .map(Frame::index)
            .collect()
    }

    /// Lowest-index resident image
    pub fn first_resident(&self) -> Option<FrameImage> {
        self.slots
            .iter()
            .filter_map(|frame| frame.image().map(|img| (frame.index(), img)))
            .min_by_key(|(index, _)| *index)
            .map(|(_, img)| Arc::clone(img))
    }

    /// Bitmap bytes held by the window
    pub fn mem(&self) -> usize {
        self.slots.iter().map(Frame::mem).sum()
    }
}

/// Session identity shared by every background job of one `play` call
#[derive(Clone)]
pub struct SessionLink {
    pub generation: u64,
    pub epoch: Arc<AtomicU64>,
    pub queue: QueueHandle,
    pub events: Sender<SessionEvent>,
}

impl SessionLink {
    /// False once `prepare_for_reuse` or a newer `play` bumped the epoch
    pub fn is_current(&self) -> bool {
        self.epoch.load(Ordering::Acquire) == self.generation
    }

    pub(crate) fn send(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            trace!("Session event dropped: controller gone");
        }
    }
}

/// Inputs for `FrameBuffer::prepare`
pub struct BufferSource {
    pub decoder: Arc<dyn Decoder>,
    pub pipeline: Arc<dyn FilterPipeline>,
    pub filters: Vec<Filter>,
    pub capacity: usize,
    pub max_time_step: f64,
    /// Ring start for the initial window (display mode)
    pub start_index: usize,
}

/// Result of a finished prepare, delivered to the presentation thread
pub struct Prepared {
    pub buffer: FrameBuffer,
    /// Image at the start index (or the first resident one if that failed)
    pub first_frame: Option<FrameImage>,
}

struct BufferShared {
    decoder: Arc<dyn Decoder>,
    pipeline: Arc<dyn FilterPipeline>,
    filters: Vec<Filter>,
    window: Mutex<FrameWindow>,
    /// Latest playhead requested by `on_advance`
    requested: AtomicUsize,
    /// A refill job is queued and has not started yet
    refill_pending: AtomicBool,
    link: SessionLink,
}

impl BufferShared {
    fn lock_window(&self) -> std::sync::MutexGuard<'_, FrameWindow> {
        self.window.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decode + filter one frame (no lock held)
    fn load_frame(&self, index: usize) -> Result<FrameImage, FrameError> {
        let image = self.decoder.decode_frame(index)?;
        let image = self
            .pipeline
            .apply(image, &self.filters)
            .map_err(|message| FrameError::Filter { index, message })?;
        Ok(Arc::new(image))
    }

    /// Decode `index` and publish it into the window if the session is still live
    fn fill(&self, index: usize) {
        let result = self.load_frame(index);

        let mut window = self.lock_window();
        if !self.link.is_current() {
            trace!("Discarding frame {} of stale session {}", index, self.link.generation);
            return;
        }
        match result {
            Ok(image) => {
                if !window.store(index, image) {
                    trace!("Frame {} left the window before it was stored", index);
                }
            }
            Err(error) => {
                window.mark_failed(index);
                drop(window);
                warn!("{}", error);
                self.link.send(SessionEvent::DecodeWarning {
                    generation: self.link.generation,
                    index,
                    error,
                });
            }
        }
    }

    /// Decode every missing frame, in order, stopping if the session goes stale
    fn fill_all(&self, missing: Vec<usize>) {
        for index in missing {
            if !self.link.is_current() {
                trace!("Stopping fill: session {} superseded", self.link.generation);
                return;
            }
            self.fill(index);
        }
    }

    /// Background refill job body
    fn refill(&self) {
        self.refill_pending.store(false, Ordering::Release);
        let start = self.requested.load(Ordering::Acquire);
        let missing = self.lock_window().retarget(start);
        if !missing.is_empty() {
            debug!("Refill at {}: decoding {:?}", start, missing);
        }
        self.fill_all(missing);
    }
}

/// Bounded decode window for one session
pub struct FrameBuffer {
    shared: Arc<BufferShared>,
    durations: Arc<[f64]>,
    total_duration: f64,
    capacity: usize,
}

impl FrameBuffer {
    /// Compute durations and decode the initial window.
    ///
    /// Blocking: runs on the decode queue, never on the presentation thread.
    /// Returns once every slot of the initial window is decoded or failed
    /// (or the session was superseded).
    pub fn prepare(source: BufferSource, link: SessionLink) -> Prepared {
        let (total_duration, durations) = compute_durations(source.decoder.as_ref(), source.max_time_step);
        let durations: Arc<[f64]> = Arc::from(durations);
        let window = FrameWindow::new(Arc::clone(&durations), source.capacity, source.start_index);
        let missing = window.missing();

        debug!(
            "Preparing session {}: {} frames, window {} at {}, loop {:.3}s",
            link.generation,
            durations.len(),
            window.size(),
            window.start(),
            total_duration
        );

        let shared = Arc::new(BufferShared {
            decoder: source.decoder,
            pipeline: source.pipeline,
            filters: source.filters,
            window: Mutex::new(window),
            requested: AtomicUsize::new(source.start_index),
            refill_pending: AtomicBool::new(false),
            link,
        });
        shared.fill_all(missing);

        let buffer = FrameBuffer {
            shared,
            durations,
            total_duration,
            capacity: source.capacity,
        };
        let first_frame = buffer
            .frame_image(source.start_index)
            .or_else(|| buffer.shared.lock_window().first_resident());
        Prepared { buffer, first_frame }
    }

    pub fn generation(&self) -> u64 {
        self.shared.link.generation
    }

    pub fn frame_count(&self) -> usize {
        self.durations.len()
    }

    pub fn durations(&self) -> Arc<[f64]> {
        Arc::clone(&self.durations)
    }

    /// Sum of clamped durations (one loop, seconds)
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Effective window size `min(capacity, frame_count)`
    pub fn window_size(&self) -> usize {
        self.capacity.min(self.frame_count())
    }

    /// Decoded image for `index`, or `None` for a placeholder. Never blocks on decode.
    pub fn frame_image(&self, index: usize) -> Option<FrameImage> {
        self.shared.lock_window().image(index)
    }

    /// Playhead moved: slide the window (async, coalesced).
    ///
    /// No-op when the whole sequence fits the window.
    pub fn on_advance(&self, previous: usize, current: usize) {
        if self.window_size() >= self.frame_count() {
            return;
        }
        trace!("on_advance {} -> {}", previous, current);
        self.shared.requested.store(current, Ordering::Release);
        if self.shared.refill_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let link = &self.shared.link;
        link.queue
            .execute_with_epoch(link.generation, move || shared.refill());
    }

    pub fn resident_indices(&self) -> Vec<usize> {
        self.shared.lock_window().resident_indices()
    }

    pub fn first_resident(&self) -> Option<FrameImage> {
        self.shared.lock_window().first_resident()
    }

    pub fn is_failed(&self, index: usize) -> bool {
        self.shared.lock_window().is_failed(index)
    }

    /// Bitmap bytes currently resident
    pub fn mem(&self) -> usize {
        self.shared.lock_window().mem()
    }

    /// Estimated bytes for the whole sequence at `index`'s resolution
    pub fn cost_estimate(&self, index: usize) -> usize {
        self.frame_image(index)
            .or_else(|| self.first_resident())
            .map_or(0, |img| image_cost(&img) * self.frame_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::workers::DecodeQueue;
    use crate::entities::CpuFilterPipeline;
    use crate::testing::ScriptedDecoder;
    use crossbeam_channel::{Receiver, unbounded};
    use std::time::Duration;

    fn durations(n: usize) -> Arc<[f64]> {
        Arc::from(vec![0.1; n])
    }

    fn sorted(mut v: Vec<usize>) -> Vec<usize> {
        v.sort_unstable();
        v
    }

    struct Harness {
        queue: DecodeQueue,
        epoch: Arc<AtomicU64>,
        events: Receiver<SessionEvent>,
        link: SessionLink,
    }

    fn harness() -> Harness {
        let epoch = Arc::new(AtomicU64::new(1));
        let queue = DecodeQueue::new("buffer-test", Arc::clone(&epoch)).unwrap();
        let (tx, rx) = unbounded();
        let link = SessionLink {
            generation: 1,
            epoch: Arc::clone(&epoch),
            queue: queue.handle(),
            events: tx,
        };
        Harness { queue, epoch, events: rx, link }
    }

    fn source(decoder: &Arc<ScriptedDecoder>, capacity: usize) -> BufferSource {
        BufferSource {
            decoder: decoder.clone(),
            pipeline: Arc::new(CpuFilterPipeline),
            filters: Vec::new(),
            capacity,
            max_time_step: 1.0,
            start_index: 0,
        }
    }

    #[test]
    fn test_window_ring_wraps() {
        let mut window = FrameWindow::new(durations(10), 4, 0);
        assert_eq!(window.missing(), vec![0, 1, 2, 3]);
        assert_eq!(window.retarget(8), vec![8, 9, 0, 1]);
        assert!(window.slot(5).is_none());
        assert_eq!(window.slot(9).map(Frame::index), Some(9));
    }

    #[test]
    fn test_window_retarget_keeps_and_evicts() {
        let mut window = FrameWindow::new(durations(10), 3, 0);
        for i in 0..3 {
            window.store(i, Arc::new(image::RgbaImage::new(1, 1)));
        }
        assert_eq!(window.resident_indices(), vec![0, 1, 2]);
        assert_eq!(window.mem(), 12);

        // 0 leaves, 3 enters as a placeholder
        assert_eq!(window.retarget(1), vec![3]);
        assert_eq!(window.resident_indices(), vec![1, 2]);
        assert!(window.image(0).is_none());
        assert!(!window.store(0, Arc::new(image::RgbaImage::new(1, 1))));
    }

    #[test]
    fn test_window_failed_frames_not_retried() {
        let mut window = FrameWindow::new(durations(4), 2, 0);
        window.mark_failed(1);
        assert_eq!(window.missing(), vec![0]);
        window.retarget(2);
        // Back in the ring later: still failed, not missing
        assert_eq!(window.retarget(1), vec![2]);
        assert_eq!(window.slot(1).map(Frame::status), Some(FrameStatus::Error));
    }

    #[test]
    fn test_window_capacity_larger_than_sequence() {
        let window = FrameWindow::new(durations(3), 50, 0);
        assert_eq!(window.size(), 3);
    }

    /// Test: capacity 2 over 10 frames
    ///
    /// Validates: {0,1} resident after prepare, {1,2} after advancing to 1
    #[test]
    fn test_prepare_and_slide() {
        let h = harness();
        let decoder = Arc::new(ScriptedDecoder::new(vec![0.1; 10]));
        let prepared = FrameBuffer::prepare(source(&decoder, 2), h.link.clone());
        let buffer = prepared.buffer;

        assert!(prepared.first_frame.is_some());
        assert_eq!(sorted(buffer.resident_indices()), vec![0, 1]);
        assert!((buffer.total_duration() - 1.0).abs() < 1e-9);

        buffer.on_advance(0, 1);
        assert!(h.queue.flush(Duration::from_secs(5)));
        assert_eq!(sorted(buffer.resident_indices()), vec![1, 2]);
        assert!(buffer.frame_image(0).is_none());
        assert!(buffer.frame_image(2).is_some());
    }

    /// Test: capacity >= frame_count over several loops
    ///
    /// Validates: every frame decoded exactly once
    #[test]
    fn test_full_window_never_redecodes() {
        let h = harness();
        let decoder = Arc::new(ScriptedDecoder::new(vec![0.1; 5]));
        let buffer = FrameBuffer::prepare(source(&decoder, 5), h.link.clone()).buffer;

        for _ in 0..3 {
            for i in 0..5 {
                buffer.on_advance(i, (i + 1) % 5);
            }
        }
        assert!(h.queue.flush(Duration::from_secs(5)));
        assert_eq!(decoder.decode_counts(), vec![1; 5]);
        assert_eq!(sorted(buffer.resident_indices()), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_failure_stays_placeholder() {
        let h = harness();
        let decoder = Arc::new(ScriptedDecoder::new(vec![0.1; 4]).with_failures(&[1]));
        let buffer = FrameBuffer::prepare(source(&decoder, 4), h.link.clone()).buffer;

        assert!(buffer.frame_image(1).is_none());
        assert!(buffer.is_failed(1));
        match h.events.try_recv() {
            Ok(SessionEvent::DecodeWarning { index, generation, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(generation, 1);
            }
            _ => panic!("expected a decode warning"),
        }
    }

    #[test]
    fn test_failed_frame_not_redecoded_on_refill() {
        let h = harness();
        let decoder = Arc::new(ScriptedDecoder::new(vec![0.1; 4]).with_failures(&[2]));
        let buffer = FrameBuffer::prepare(source(&decoder, 3), h.link.clone()).buffer;

        for i in 0..8 {
            buffer.on_advance(i % 4, (i + 1) % 4);
            assert!(h.queue.flush(Duration::from_secs(5)));
        }
        assert_eq!(decoder.decode_counts()[2], 1);
    }

    #[test]
    fn test_filter_failure_is_frame_error() {
        let h = harness();
        let decoder = Arc::new(ScriptedDecoder::new(vec![0.1; 2]));
        let mut src = source(&decoder, 2);
        src.filters = vec![Filter::Resize { width: 0, height: 0, mode: Default::default() }];
        let buffer = FrameBuffer::prepare(src, h.link.clone()).buffer;

        assert!(buffer.resident_indices().is_empty());
        let warnings: Vec<_> = h.events.try_iter().collect();
        assert_eq!(warnings.len(), 2);
        assert!(matches!(
            &warnings[0],
            SessionEvent::DecodeWarning { error: FrameError::Filter { .. }, .. }
        ));
    }

    #[test]
    fn test_stale_refill_discarded() {
        let h = harness();
        let decoder = Arc::new(ScriptedDecoder::new(vec![0.1; 10]));
        let buffer = FrameBuffer::prepare(source(&decoder, 2), h.link.clone()).buffer;

        h.epoch.fetch_add(1, Ordering::AcqRel);
        buffer.on_advance(0, 1);
        assert!(h.queue.flush(Duration::from_secs(5)));
        // Job skipped: no retarget happened
        assert_eq!(sorted(buffer.resident_indices()), vec![0, 1]);
        assert_eq!(decoder.decode_counts()[2], 0);
    }

    #[test]
    fn test_cost_estimate() {
        let h = harness();
        let decoder = Arc::new(ScriptedDecoder::new(vec![0.1; 3]).with_size(4, 2));
        let buffer = FrameBuffer::prepare(source(&decoder, 3), h.link.clone()).buffer;
        assert_eq!(buffer.cost_estimate(0), 4 * 2 * 4 * 3);
        assert_eq!(buffer.mem(), 4 * 2 * 4 * 3);
    }
}
