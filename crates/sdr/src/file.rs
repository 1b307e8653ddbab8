use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use num_complex::Complex32;

use crate::{CaptureSource, ReadStatus};

/// Replays a CF32 capture file (interleaved f32 I/Q, little-endian)
/// at a caller-declared sample rate.
pub struct FileSource {
    reader: Option<BufReader<File>>,
    sample_rate: f64,
    byte_buf: Vec<u8>,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P, sample_rate: f64) -> Result<Self, String> {
        let file = File::open(path.as_ref())
            .map_err(|e| format!("cannot open {}: {}", path.as_ref().display(), e))?;
        log::info!(
            "replaying {} at {} Msps",
            path.as_ref().display(),
            sample_rate / 1e6
        );
        Ok(FileSource {
            reader: Some(BufReader::with_capacity(1 << 20, file)),
            sample_rate,
            byte_buf: Vec::new(),
        })
    }
}

impl CaptureSource for FileSource {
    fn read(&mut self, buf: &mut Vec<Complex32>, capacity: usize) -> ReadStatus {
        let reader = match self.reader.as_mut() {
            Some(r) => r,
            None => return ReadStatus::EndOfStream,
        };

        self.byte_buf.resize(capacity * 8, 0);
        let mut filled = 0;
        while filled < self.byte_buf.len() {
            match reader.read(&mut self.byte_buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) => {
                    log::error!("capture file read failed: {}", e);
                    break;
                }
            }
        }

        let n_samples = filled / 8;
        if n_samples == 0 {
            self.reader = None;
            return ReadStatus::EndOfStream;
        }

        buf.clear();
        buf.reserve(n_samples);
        for chunk in self.byte_buf[..n_samples * 8].chunks_exact(8) {
            let re = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let im = f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
            buf.push(Complex32::new(re, im));
        }
        ReadStatus::Samples(n_samples)
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn close(&mut self) {
        self.reader = None;
    }
}
