pub mod file;

use num_complex::Complex32;

pub use file::FileSource;

/// Outcome of one read from a capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// `buf` now holds this many freshly-read samples.
    Samples(usize),
    /// No samples arrived within the source's wait budget; the stream
    /// is considered stalled.
    Timeout,
    /// The source is exhausted and will never yield more samples.
    EndOfStream,
}

/// A source of complex baseband samples. Implementations run on the
/// capture worker thread, so they must be Send; they do not need Sync.
pub trait CaptureSource: Send {
    /// Fill `buf` with up to `capacity` samples. The implementation
    /// clears and refills `buf`; callers reuse the allocation.
    fn read(&mut self, buf: &mut Vec<Complex32>, capacity: usize) -> ReadStatus;

    /// Sample rate of the stream in Hz.
    fn sample_rate(&self) -> f64;

    /// Retune the source's center frequency. Sources with a fixed
    /// recording frequency ignore this.
    fn set_freq(&mut self, _freq: f64) -> Result<(), String> {
        Ok(())
    }

    /// Release the underlying device or file.
    fn close(&mut self);
}
