//! Growable FIFO of interleaved sample frames.

/// Compact the backing storage once this many stale samples sit at the front.
const COMPACT_THRESHOLD: usize = 16384;

/// FIFO of interleaved multi-channel frames.
///
/// All counts in the public API are in frames (one value per channel).
/// Data is read from the front and appended at the back; consumed samples
/// are reclaimed lazily so that reads never shift memory on every call.
#[derive(Debug, Clone)]
pub struct SampleFifo {
    data: Vec<f32>,
    head: usize,
    channels: usize,
}

impl SampleFifo {
    /// Creates an empty FIFO for the given channel count.
    pub fn new(channels: usize) -> Self {
        Self {
            data: Vec::new(),
            head: 0,
            channels: channels.max(1),
        }
    }

    /// Number of interleaved channels per frame.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Changes the channel layout. Any buffered data is dropped.
    pub fn set_channels(&mut self, channels: usize) {
        self.channels = channels.max(1);
        self.clear();
    }

    /// Returns the number of frames currently stored.
    #[inline]
    pub fn len(&self) -> usize {
        (self.data.len() - self.head) / self.channels
    }

    /// Returns true when no frames are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all buffered frames.
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
        self.head = 0;
    }

    /// Interleaved view of every buffered frame.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data[self.head..]
    }

    /// Appends interleaved samples. Trailing samples that do not fill a
    /// whole frame are ignored.
    pub fn push(&mut self, samples: &[f32]) {
        let whole = samples.len() - samples.len() % self.channels;
        self.data.extend_from_slice(&samples[..whole]);
    }

    /// Copies frames from the front into `out` and removes them.
    ///
    /// Returns the number of frames transferred.
    pub fn pop_into(&mut self, out: &mut [f32]) -> usize {
        let frames = (out.len() / self.channels).min(self.len());
        let n = frames * self.channels;
        out[..n].copy_from_slice(&self.data[self.head..self.head + n]);
        self.discard(frames)
    }

    /// Discards up to `frames` frames from the front.
    ///
    /// Returns the number of frames discarded.
    pub fn discard(&mut self, frames: usize) -> usize {
        let to_drop = frames.min(self.len());
        self.head += to_drop * self.channels;
        if self.head == self.data.len() {
            self.clear();
        } else if self.head >= COMPACT_THRESHOLD {
            self.data.drain(..self.head);
            self.head = 0;
        }
        to_drop
    }

    /// Removes up to `frames` frames from the back.
    ///
    /// Returns the number of frames removed.
    pub fn truncate_back(&mut self, frames: usize) -> usize {
        let to_drop = frames.min(self.len());
        let new_len = self.data.len() - to_drop * self.channels;
        self.data.truncate(new_len);
        if self.head == self.data.len() {
            self.clear();
        }
        to_drop
    }

    /// Moves every frame of `other` to the back of this FIFO.
    pub fn append(&mut self, other: &mut SampleFifo) {
        debug_assert_eq!(self.channels, other.channels);
        self.data.extend_from_slice(other.as_slice());
        other.clear();
    }

    /// Removes and returns every buffered frame.
    pub fn take_all(&mut self) -> Vec<f32> {
        let out = self.as_slice().to_vec();
        self.clear();
        out
    }
}
