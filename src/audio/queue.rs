//! Bounded frame queue between the capture callback and the frame producer.
//!
//! The capture side never blocks: when the queue is full the newest frame is
//! discarded and counted. The consumer side suspends while the queue is empty.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::frame::{f32_to_i16, AudioFrame, AudioParams};

/// Default number of frames held between capture and the producer
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Counters shared by both ends of a frame queue
#[derive(Debug, Default)]
pub struct QueueStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
}

impl QueueStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Frames discarded because the queue was full (monotonic)
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Result of offering a frame to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Enqueued,
    /// Queue full, frame discarded
    Dropped,
    /// Producer side has gone away
    Closed,
}

/// Create a bounded FIFO frame queue
pub fn frame_queue(capacity: usize) -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let stats = Arc::new(QueueStats::default());

    (
        FrameSender {
            tx,
            stats: Arc::clone(&stats),
        },
        FrameReceiver { rx, stats },
    )
}

/// Capture-side handle. Safe to call from a real-time audio thread.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<AudioFrame>,
    stats: Arc<QueueStats>,
}

impl FrameSender {
    /// Non-blocking enqueue; drops the frame if the queue is full
    pub fn offer(&self, frame: AudioFrame) -> Offer {
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Offer::Enqueued
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Offer::Dropped
            }
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

/// Producer-side handle
#[derive(Debug)]
pub struct FrameReceiver {
    rx: mpsc::Receiver<AudioFrame>,
    stats: Arc<QueueStats>,
}

impl FrameReceiver {
    /// Wait for the next frame; `None` once every sender is gone and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<AudioFrame> {
        self.rx.recv().await
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

/// Cuts arbitrary capture callback buffers into fixed-size frames.
///
/// Platform callbacks do not always honour the requested block size, so the
/// assembler carries leftover samples across callbacks.
pub struct FrameAssembler {
    params: AudioParams,
    pending: Vec<i16>,
    sequence: u64,
    sender: FrameSender,
}

impl FrameAssembler {
    pub fn new(params: AudioParams, sender: FrameSender) -> Self {
        Self {
            params,
            pending: Vec::with_capacity(params.frame_len()),
            sequence: 0,
            sender,
        }
    }

    /// Convert float samples and emit every completed frame.
    ///
    /// Returns the number of frames completed during this call.
    pub fn push_f32(&mut self, data: &[f32]) -> usize {
        let frame_len = self.params.frame_len();
        if frame_len == 0 {
            return 0;
        }

        let mut completed = 0;
        for &sample in data {
            self.pending.push(f32_to_i16(sample));
            if self.pending.len() == frame_len {
                let frame = AudioFrame::from_slice(
                    &self.pending,
                    self.params.sample_rate,
                    self.params.channels,
                    self.sequence,
                );
                self.pending.clear();
                self.sequence += 1;
                self.sender.offer(frame);
                completed += 1;
            }
        }

        completed
    }

    /// Frames completed so far (enqueued or dropped)
    pub fn frames_completed(&self) -> u64 {
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u64) -> AudioFrame {
        AudioFrame::new(vec![0; 4], 16000, 1, seq)
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest() {
        let (tx, mut rx) = frame_queue(2);

        assert_eq!(tx.offer(frame(0)), Offer::Enqueued);
        assert_eq!(tx.offer(frame(1)), Offer::Enqueued);
        assert_eq!(tx.offer(frame(2)), Offer::Dropped);
        assert_eq!(tx.offer(frame(3)), Offer::Dropped);
        assert_eq!(tx.stats().dropped(), 2);

        // Oldest frames survive, in order
        assert_eq!(rx.recv().await.unwrap().sequence, 0);
        assert_eq!(rx.recv().await.unwrap().sequence, 1);

        assert_eq!(tx.offer(frame(4)), Offer::Enqueued);
        assert_eq!(rx.recv().await.unwrap().sequence, 4);
        assert_eq!(rx.stats().enqueued(), 3);
    }

    #[test]
    fn test_dropped_counter_is_monotonic() {
        let (tx, _rx) = frame_queue(1);
        tx.offer(frame(0));

        let mut last = 0;
        for seq in 1..50 {
            assert_eq!(tx.offer(frame(seq)), Offer::Dropped);
            let dropped = tx.stats().dropped();
            assert!(dropped > last);
            last = dropped;
        }
    }

    #[test]
    fn test_offer_after_receiver_dropped() {
        let (tx, rx) = frame_queue(4);
        drop(rx);
        assert_eq!(tx.offer(frame(0)), Offer::Closed);
        assert_eq!(tx.stats().dropped(), 0);
    }

    #[tokio::test]
    async fn test_one_second_yields_fifty_frames() {
        let params = AudioParams {
            sample_rate: 16000,
            channels: 1,
            frame_ms: 20,
        };
        let (tx, mut rx) = frame_queue(64);
        let mut assembler = FrameAssembler::new(params, tx);

        // Uneven callback sizes, 16000 samples total
        let mut remaining = 16000usize;
        let sizes = [256usize, 441, 512, 97, 1024];
        let mut i = 0;
        while remaining > 0 {
            let n = sizes[i % sizes.len()].min(remaining);
            assembler.push_f32(&vec![0.25f32; n]);
            remaining -= n;
            i += 1;
        }

        assert_eq!(assembler.frames_completed(), 50);
        drop(assembler);

        let mut received = 0;
        while let Some(frame) = rx.recv().await {
            assert_eq!(frame.samples().len(), 320);
            assert_eq!(frame.sequence, received);
            received += 1;
        }
        assert_eq!(received, 50);
    }

    #[test]
    fn test_assembler_reuses_scratch_buffer() {
        let params = AudioParams::default();
        let (tx, _rx) = frame_queue(8);
        let mut assembler = FrameAssembler::new(params, tx);
        let scratch = assembler.pending.as_ptr();

        assert_eq!(assembler.push_f32(&vec![0.5f32; params.frame_len() * 3]), 3);
        assert_eq!(assembler.pending.as_ptr(), scratch);
    }

    #[test]
    fn test_assembler_interleaves_channels() {
        let params = AudioParams {
            sample_rate: 1000,
            channels: 2,
            frame_ms: 2,
        };
        let (tx, _rx) = frame_queue(8);
        let mut assembler = FrameAssembler::new(params, tx);

        // 2 samples per channel per frame = 4 interleaved values
        assert_eq!(assembler.push_f32(&[0.0, 0.0, 0.0]), 0);
        assert_eq!(assembler.push_f32(&[0.0, 0.0, 0.0, 0.0, 0.0]), 2);
    }
}
