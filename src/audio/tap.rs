// Taps carry sample blocks off the audio thread. Buffers come from a fixed
// pool and go back to it once the control thread is done with them, so the
// callback never allocates; an empty pool or a full queue drops the block.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender};

use super::frame::StereoFrame;
use crate::recording::{CapturedAudio, RecordingSession};

// blocks in flight are bounded by the pool, so the queue keeps this much
// room for start/stop markers
const MARKER_HEADROOM: usize = 4;

#[derive(Clone)]
pub struct BufferPool {
    free_tx: Sender<Vec<f32>>,
    free_rx: Receiver<Vec<f32>>,
}

impl BufferPool {
    pub fn new(count: usize, capacity: usize) -> Self {
        let (free_tx, free_rx) = crossbeam_channel::bounded(count.max(1));
        for _ in 0..count {
            let _ = free_tx.try_send(Vec::with_capacity(capacity));
        }
        Self { free_tx, free_rx }
    }

    pub fn take(&self) -> Option<Vec<f32>> {
        let mut buf = self.free_rx.try_recv().ok()?;
        buf.clear();
        Some(buf)
    }

    pub fn give_back(&self, buf: Vec<f32>) {
        let _ = self.free_tx.try_send(buf);
    }

    #[cfg(test)]
    fn available(&self) -> usize {
        self.free_rx.len()
    }
}

// ── Analysis ─────────────────────────────────────────────────────

pub struct AnalysisTap {
    tx: Sender<Vec<f32>>,
    pool: BufferPool,
}

pub struct AnalysisSink {
    rx: Receiver<Vec<f32>>,
    pool: BufferPool,
}

pub fn analysis_tap(blocks: usize, block_len: usize) -> (AnalysisTap, AnalysisSink) {
    let (tx, rx) = crossbeam_channel::bounded(blocks.max(1));
    let pool = BufferPool::new(blocks, block_len);
    (
        AnalysisTap { tx, pool: pool.clone() },
        AnalysisSink { rx, pool },
    )
}

impl AnalysisTap {
    // mono mix of the block
    pub fn write(&self, frames: &[StereoFrame]) {
        let Some(mut buf) = self.pool.take() else {
            return;
        };
        buf.extend(frames.iter().map(|f| f.mid()));
        if let Err(e) = self.tx.try_send(buf) {
            self.pool.give_back(e.into_inner());
        }
    }
}

impl AnalysisSink {
    pub fn drain(&self, mut f: impl FnMut(&[f32])) {
        while let Ok(buf) = self.rx.try_recv() {
            f(&buf);
            self.pool.give_back(buf);
        }
    }
}

// ── Capture ──────────────────────────────────────────────────────

#[derive(Debug)]
pub enum CaptureEvent {
    Started,
    Block(Vec<f32>), // interleaved stereo
    Stopped,
}

/// Audio-thread half: decides which blocks belong to a take and ships them.
pub struct CaptureTap {
    tx: Sender<CaptureEvent>,
    pool: BufferPool,
    active: bool,
    dropped: Arc<AtomicU64>,
}

/// Control-thread half: assembles the blocks into a `RecordingSession`.
pub struct CaptureSink {
    rx: Receiver<CaptureEvent>,
    pool: BufferPool,
    session: RecordingSession,
    dropped: Arc<AtomicU64>,
}

pub fn capture_tap(blocks: usize, block_len: usize, sample_rate: u32) -> (CaptureTap, CaptureSink) {
    let (tx, rx) = crossbeam_channel::bounded(blocks + MARKER_HEADROOM);
    let pool = BufferPool::new(blocks, block_len);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        CaptureTap {
            tx,
            pool: pool.clone(),
            active: false,
            dropped: Arc::clone(&dropped),
        },
        CaptureSink {
            rx,
            pool,
            session: RecordingSession::new(2, sample_rate),
            dropped,
        },
    )
}

impl CaptureTap {
    /// Returns false when a take is already running.
    pub fn start(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.send_marker(CaptureEvent::Started);
        true
    }

    /// Returns false when nothing was running.
    pub fn stop(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.send_marker(CaptureEvent::Stopped);
        true
    }

    fn send_marker(&self, event: CaptureEvent) {
        if self.tx.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn write(&self, frames: &[StereoFrame]) {
        if !self.active || frames.is_empty() {
            return;
        }
        let Some(mut buf) = self.pool.take() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        for frame in frames {
            buf.push(frame.left);
            buf.push(frame.right);
        }
        if let Err(e) = self.tx.try_send(CaptureEvent::Block(buf)) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            if let CaptureEvent::Block(buf) = e.into_inner() {
                self.pool.give_back(buf);
            }
        }
    }
}

impl CaptureSink {
    /// Fold everything the audio thread sent into the session; returns the
    /// take as soon as a stop marker completes one. Later events stay queued
    /// for the next call.
    pub fn poll(&mut self) -> Option<CapturedAudio> {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                CaptureEvent::Started => {
                    self.session.start();
                }
                CaptureEvent::Block(buf) => {
                    self.session.capture(&buf);
                    self.pool.give_back(buf);
                }
                CaptureEvent::Stopped => {
                    if let Some(captured) = self.session.stop() {
                        return Some(captured);
                    }
                }
            }
        }
        None
    }

    /// Blocks or markers lost since the last call.
    pub fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::decode;

    fn frames(n: usize, value: f32) -> Vec<StereoFrame> {
        vec![StereoFrame::mono(value); n]
    }

    #[test]
    fn test_pool_hands_out_each_buffer_once() {
        let pool = BufferPool::new(2, 16);
        let a = pool.take().unwrap();
        let _b = pool.take().unwrap();
        assert!(pool.take().is_none());
        pool.give_back(a);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_analysis_buffers_come_back() {
        let (tap, sink) = analysis_tap(2, 64);
        for _ in 0..10 {
            tap.write(&frames(64, 0.5));
            let mut seen = 0;
            sink.drain(|block| {
                assert_eq!(block.len(), 64);
                seen += 1;
            });
            assert_eq!(seen, 1);
        }
        assert_eq!(sink.pool.available(), 2);
    }

    #[test]
    fn test_analysis_reuses_allocations() {
        let (tap, sink) = analysis_tap(1, 64);
        tap.write(&frames(32, 0.1));
        let first = sink.rx.try_recv().unwrap();
        let ptr = first.as_ptr();
        sink.pool.give_back(first);
        tap.write(&frames(32, 0.1));
        let second = sink.rx.try_recv().unwrap();
        assert_eq!(second.as_ptr(), ptr);
    }

    #[test]
    fn test_analysis_drops_when_sink_is_slow() {
        let (tap, sink) = analysis_tap(2, 8);
        for _ in 0..5 {
            tap.write(&frames(8, 0.0));
        }
        let mut seen = 0;
        sink.drain(|_| seen += 1);
        assert_eq!(seen, 2);
        assert_eq!(sink.pool.available(), 2);
    }

    #[test]
    fn test_capture_take_round_trip() {
        let (mut tap, mut sink) = capture_tap(8, 64, 8000);
        tap.write(&frames(10, 0.9)); // before start, ignored
        assert!(tap.start());
        assert!(!tap.start());
        tap.write(&frames(20, 0.25));
        tap.write(&frames(12, 0.25));
        assert!(tap.stop());
        assert!(!tap.stop());

        let captured = sink.poll().unwrap();
        let decoded = decode(&captured).unwrap();
        assert_eq!(decoded.frames(), 32);
        assert!(decoded.channels[0].iter().all(|s| *s == 0.25));
        assert_eq!(sink.take_dropped(), 0);
        assert_eq!(sink.pool.available(), 8);
    }

    #[test]
    fn test_stop_marker_fits_even_when_blocks_back_up() {
        let (mut tap, mut sink) = capture_tap(2, 16, 8000);
        tap.start();
        for _ in 0..10 {
            tap.write(&frames(4, 0.5));
        }
        tap.stop();

        let captured = sink.poll().unwrap();
        assert_eq!(decode(&captured).unwrap().frames(), 8);
        assert_eq!(sink.take_dropped(), 8);
        assert_eq!(sink.take_dropped(), 0);
    }

    #[test]
    fn test_second_take_starts_clean() {
        let (mut tap, mut sink) = capture_tap(8, 64, 8000);
        tap.start();
        tap.write(&frames(30, 0.5));
        tap.stop();
        tap.start();
        tap.write(&frames(5, 0.5));
        tap.stop();

        assert_eq!(decode(&sink.poll().unwrap()).unwrap().frames(), 30);
        assert_eq!(decode(&sink.poll().unwrap()).unwrap().frames(), 5);
        assert!(sink.poll().is_none());
    }
}
