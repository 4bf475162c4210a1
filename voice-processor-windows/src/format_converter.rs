//! Conversion from the endpoint's shared-mode mix format to the mono
//! 16-bit PCM stream the core expects.

use voice_processor_core::processing::pcm::{
    downmix_to_mono_into, f32_to_i16_into, i16_from_le_bytes_into, LinearResampler,
};

use crate::error::WindowsAudioError;

/// Sample encoding of the mix format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixSampleFormat {
    /// IEEE float, what shared mode delivers on practically every endpoint.
    Float32,
    Int16,
}

impl MixSampleFormat {
    pub fn from_bits(bits_per_sample: u16) -> Result<Self, WindowsAudioError> {
        match bits_per_sample {
            32 => Ok(Self::Float32),
            16 => Ok(Self::Int16),
            other => Err(WindowsAudioError::UnsupportedFormat(other)),
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Int16 => 2,
        }
    }
}

/// Packet converter with reusable scratch buffers.
///
/// Allocates only while the scratch vectors grow to the largest packet seen.
pub struct MixFormatConverter {
    format: MixSampleFormat,
    channels: usize,
    resampler: LinearResampler,
    decoded: Vec<i16>,
    interleaved: Vec<f32>,
    mono: Vec<f32>,
    resampled: Vec<f32>,
    out: Vec<i16>,
}

impl MixFormatConverter {
    pub fn new(format: MixSampleFormat, channels: u16, source_rate: u32, target_rate: u32) -> Self {
        Self {
            format,
            channels: channels.max(1) as usize,
            resampler: LinearResampler::new(source_rate as f64, target_rate as f64),
            decoded: Vec::new(),
            interleaved: Vec::new(),
            mono: Vec::new(),
            resampled: Vec::new(),
            out: Vec::new(),
        }
    }

    /// Bytes per interleaved frame of the mix format.
    pub fn block_align(&self) -> usize {
        self.format.bytes_per_sample() * self.channels
    }

    /// Convert one packet of raw mix-format bytes.
    pub fn convert(&mut self, bytes: &[u8]) -> &[i16] {
        match self.format {
            MixSampleFormat::Float32 => {
                self.interleaved.clear();
                self.interleaved.extend(
                    bytes
                        .chunks_exact(4)
                        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
                );
            }
            MixSampleFormat::Int16 => {
                i16_from_le_bytes_into(bytes, &mut self.decoded);
                if self.channels == 1 && self.resampler.is_passthrough() {
                    return &self.decoded;
                }
                self.interleaved.clear();
                self.interleaved
                    .extend(self.decoded.iter().map(|&s| s as f32 / 32768.0));
            }
        }

        downmix_to_mono_into(&self.interleaved, self.channels, &mut self.mono);
        self.resampler.process_into(&self.mono, &mut self.resampled);
        f32_to_i16_into(&self.resampled, &mut self.out);
        &self.out
    }

    /// Zeros standing in for a packet of `frames` frames flagged silent.
    ///
    /// The zeros go through the resampler so its stream position advances
    /// exactly as it would for an audible packet.
    pub fn silence(&mut self, frames: usize) -> &[i16] {
        self.mono.clear();
        self.mono.resize(frames, 0.0);
        self.resampler.process_into(&self.mono, &mut self.resampled);
        f32_to_i16_into(&self.resampled, &mut self.out);
        &self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn mix_format_is_chosen_by_bit_depth() {
        assert_eq!(MixSampleFormat::from_bits(32), Ok(MixSampleFormat::Float32));
        assert_eq!(MixSampleFormat::from_bits(16), Ok(MixSampleFormat::Int16));
        assert_eq!(
            MixSampleFormat::from_bits(24),
            Err(WindowsAudioError::UnsupportedFormat(24))
        );
    }

    #[test]
    fn stereo_float_is_downmixed_to_mono_pcm() {
        let mut converter = MixFormatConverter::new(MixSampleFormat::Float32, 2, 16000, 16000);
        assert_eq!(converter.block_align(), 8);

        let out = converter.convert(&f32_bytes(&[0.5, 0.5, -1.0, 1.0, 1.0, 1.0]));
        assert_eq!(out, &[(0.5 * i16::MAX as f32) as i16, 0, i16::MAX]);
    }

    #[test]
    fn float_is_resampled_to_target_rate() {
        let mut converter = MixFormatConverter::new(MixSampleFormat::Float32, 1, 48000, 16000);
        let out = converter.convert(&f32_bytes(&[0.25; 480])).len();
        assert_eq!(out, 160);
    }

    #[test]
    fn mono_int16_at_target_rate_passes_through() {
        let mut converter = MixFormatConverter::new(MixSampleFormat::Int16, 1, 16000, 16000);
        let bytes: Vec<u8> = [1i16, -2, 300].iter().flat_map(|s| s.to_le_bytes()).collect();
        assert_eq!(converter.convert(&bytes), &[1, -2, 300]);
    }

    #[test]
    fn silent_packets_keep_their_converted_length() {
        let mut converter = MixFormatConverter::new(MixSampleFormat::Float32, 2, 48000, 16000);
        assert_eq!(converter.silence(480), vec![0i16; 160].as_slice());

        let mut same_rate = MixFormatConverter::new(MixSampleFormat::Float32, 2, 16000, 16000);
        assert_eq!(same_rate.silence(7).len(), 7);
    }

    #[test]
    fn silent_packets_advance_the_resampler() {
        let frames = 448;
        let mut split = MixFormatConverter::new(MixSampleFormat::Float32, 1, 44100, 16000);
        let mut total = split.convert(&f32_bytes(&vec![0.0; frames])).len();
        total += split.silence(frames).len();
        total += split.convert(&f32_bytes(&vec![0.0; frames])).len();

        let mut whole = MixFormatConverter::new(MixSampleFormat::Float32, 1, 44100, 16000);
        let expected = whole.convert(&f32_bytes(&vec![0.0; frames * 3])).len();

        assert_eq!(total, expected);
    }
}
