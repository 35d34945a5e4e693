//! Audio decoding and resampling
//!
//! Recordings arrive as raw bytes. The container is identified from its magic
//! bytes, decoded with a pure Rust decoder, folded to mono and resampled to the
//! canonical rate.

mod decoder;
mod probe;
mod resample;

pub use decoder::decode_audio;
pub use resample::resample_to_target;

/// Mono PCM signal at a known sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Supported audio containers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    Ogg,
    Mp4,
    Matroska,
    Unknown,
}

impl AudioFormat {
    /// Detect format from the leading magic bytes
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            return AudioFormat::Wav;
        }
        if bytes.starts_with(b"fLaC") {
            return AudioFormat::Flac;
        }
        if bytes.starts_with(b"OggS") {
            return AudioFormat::Ogg;
        }
        if bytes.starts_with(b"ID3") {
            return AudioFormat::Mp3;
        }
        if bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0 {
            return AudioFormat::Mp3;
        }
        if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            return AudioFormat::Mp4;
        }
        if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return AudioFormat::Matroska;
        }
        AudioFormat::Unknown
    }

    /// File extension hint for the container prober
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            AudioFormat::Wav => Some("wav"),
            AudioFormat::Mp3 => Some("mp3"),
            AudioFormat::Flac => Some("flac"),
            AudioFormat::Ogg => Some("ogg"),
            AudioFormat::Mp4 => Some("m4a"),
            AudioFormat::Matroska => Some("mkv"),
            AudioFormat::Unknown => None,
        }
    }
}

/// Interleaved PCM straight out of a decoder
#[derive(Debug, Clone)]
pub(crate) struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    /// Convert to mono by averaging channels
    pub fn to_mono(self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples;
        }
        self.samples
            .chunks(self.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }
}
