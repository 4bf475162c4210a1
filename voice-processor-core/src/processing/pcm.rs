//! Sample conversions for backends whose native mix format is not
//! mono 16-bit PCM at the requested rate.
//!
//! Every function writes into a caller-owned buffer. The buffer is cleared
//! first and keeps its capacity, so a capture loop that reuses its scratch
//! vectors stops allocating once they have grown to packet size.

/// Downmix interleaved multi-channel audio to mono by averaging channels per frame.
pub fn downmix_to_mono_into(samples: &[f32], channels: usize, out: &mut Vec<f32>) {
    out.clear();
    if channels <= 1 {
        out.extend_from_slice(samples);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

/// Convert f32 samples in `[-1.0, 1.0]` to signed 16-bit, clamping out-of-range values.
pub fn f32_to_i16_into(samples: &[f32], out: &mut Vec<i16>) {
    out.clear();
    out.extend(
        samples
            .iter()
            .map(|&sample| (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
    );
}

/// Decode little-endian 16-bit PCM bytes. A trailing odd byte is ignored.
pub fn i16_from_le_bytes_into(bytes: &[u8], out: &mut Vec<i16>) {
    out.clear();
    out.extend(
        bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
    );
}

/// Linear interpolation resampler for a mono stream fed one packet at a time.
///
/// The read position and the last sample of the previous packet carry over
/// between calls, so output neither loses the fractional remainder of each
/// packet nor restarts interpolation at packet boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearResampler {
    pub source_rate: f64,
    pub target_rate: f64,
    /// Read position in source samples, relative to `last` when it is set.
    position: f64,
    last: Option<f32>,
}

impl LinearResampler {
    pub fn new(source_rate: f64, target_rate: f64) -> Self {
        Self {
            source_rate,
            target_rate,
            position: 0.0,
            last: None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        (self.source_rate - self.target_rate).abs() < 0.01
    }

    /// Forget the stream history, as if nothing had been processed yet.
    pub fn reset(&mut self) {
        self.position = 0.0;
        self.last = None;
    }

    /// Resample the next packet of the stream. Copies the input unchanged if
    /// the rates match.
    ///
    /// An output sample is only produced once both of its neighbours have
    /// arrived, so the tail of one packet may appear at the head of the next.
    pub fn process_into(&mut self, samples: &[f32], out: &mut Vec<f32>) {
        out.clear();
        if self.is_passthrough() || samples.is_empty() {
            out.extend_from_slice(samples);
            return;
        }

        // Source view: the previous packet's last sample, then this packet.
        let offset = usize::from(self.last.is_some());
        let len = samples.len() + offset;
        let previous = self.last.unwrap_or_default();
        let at = |index: usize| {
            if index < offset {
                previous
            } else {
                samples[index - offset]
            }
        };

        let step = self.source_rate / self.target_rate;
        while self.position + 1.0 < len as f64 {
            let index = self.position as usize;
            let fraction = (self.position - index as f64) as f32;
            out.push(at(index) * (1.0 - fraction) + at(index + 1) * fraction);
            self.position += step;
        }

        self.position -= (len - 1) as f64;
        self.last = samples.last().copied();
    }
}
