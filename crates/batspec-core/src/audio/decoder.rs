//! Audio decoding for multiple formats

use super::probe::decode_with_symphonia;
use super::{resample_to_target, AudioFormat, DecodedAudio, Waveform};
use crate::error::{PipelineError, Result};
use std::io::Cursor;

fn corrupt(context: &str, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::CorruptAudio(format!("{}: {}", context, err))
}

/// Decode an in-memory recording to mono PCM at `target_sample_rate`
pub fn decode_audio(bytes: &[u8], target_sample_rate: u32) -> Result<Waveform> {
    if target_sample_rate == 0 {
        return Err(PipelineError::InvalidParameters(
            "target sample rate must be > 0".to_string(),
        ));
    }

    let format = AudioFormat::sniff(bytes);
    log::debug!("Detected {:?} ({} bytes)", format, bytes.len());

    let decoded = match format {
        AudioFormat::Wav => decode_wav(bytes)?,
        AudioFormat::Mp3 => decode_mp3(bytes)?,
        AudioFormat::Flac => decode_flac(bytes)?,
        AudioFormat::Ogg => decode_ogg(bytes)?,
        AudioFormat::Mp4 | AudioFormat::Matroska | AudioFormat::Unknown => {
            decode_with_symphonia(bytes, format)?
        }
    };

    if decoded.samples.is_empty() {
        return Err(PipelineError::CorruptAudio("no samples decoded".to_string()));
    }
    if decoded.sample_rate == 0 || decoded.channels == 0 {
        return Err(PipelineError::CorruptAudio(format!(
            "invalid stream parameters: {} Hz, {} channels",
            decoded.sample_rate, decoded.channels
        )));
    }

    let source_rate = decoded.sample_rate;
    let mono = decoded.to_mono();
    let samples = resample_to_target(&mono, source_rate, target_sample_rate)?;

    log::debug!(
        "Decoded {} samples at {} Hz -> {} samples at {} Hz",
        mono.len(),
        source_rate,
        samples.len(),
        target_sample_rate
    );

    Ok(Waveform::new(samples, target_sample_rate))
}

/// Decode WAV
fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|e| corrupt("invalid WAV", e))?;

    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| corrupt("WAV decode error", e))?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| corrupt("WAV decode error", e))?
        }
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Decode MP3
fn decode_mp3(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(bytes);
    let mut samples = Vec::new();
    let mut sample_rate = 0;
    let mut channels = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = frame.sample_rate as u32;
                    channels = frame.channels as u16;
                }
                samples.extend(frame.data.iter().map(|&s| s as f32 / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(e) => return Err(corrupt("MP3 decode error", e)),
        }
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Decode FLAC
fn decode_flac(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut reader = claxon::FlacReader::new(Cursor::new(bytes)).map_err(|e| corrupt("invalid FLAC", e))?;

    let info = reader.streaminfo();
    let max_val = (1i64 << (info.bits_per_sample - 1)) as f32;
    let samples: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|v| v as f32 / max_val))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| corrupt("FLAC decode error", e))?;

    Ok(DecodedAudio {
        samples,
        sample_rate: info.sample_rate,
        channels: info.channels as u16,
    })
}

/// Decode Ogg Vorbis
fn decode_ogg(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut reader = lewton::inside_ogg::OggStreamReader::new(Cursor::new(bytes))
        .map_err(|e| corrupt("invalid Ogg Vorbis", e))?;

    let sample_rate = reader.ident_hdr.audio_sample_rate;
    let channels = reader.ident_hdr.audio_channels as u16;

    let mut samples = Vec::new();
    while let Some(packet) = reader
        .read_dec_packet_itl()
        .map_err(|e| corrupt("Ogg Vorbis decode error", e))?
    {
        samples.extend(packet.iter().map(|&s| s as f32 / 32768.0));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(spec: hound::WavSpec, frames: &[Vec<i16>]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for frame in frames {
                for &s in frame {
                    writer.write_sample(s).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn spec(channels: u16, sample_rate: u32) -> hound::WavSpec {
        hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    #[test]
    fn test_decode_mono_wav_at_native_rate() {
        let frames: Vec<Vec<i16>> = (0..1000).map(|i| vec![(i % 100) as i16 * 100]).collect();
        let bytes = wav_bytes(spec(1, 8_000), &frames);

        let waveform = decode_audio(&bytes, 8_000).unwrap();
        assert_eq!(waveform.sample_rate(), 8_000);
        assert_eq!(waveform.len(), 1000);
        assert!((waveform.samples()[1] - 100.0 / 32768.0).abs() < 1e-6);
    }

    #[test]
    fn test_stereo_wav_is_folded_to_mono() {
        let frames: Vec<Vec<i16>> = (0..500).map(|_| vec![16384, -16384]).collect();
        let bytes = wav_bytes(spec(2, 16_000), &frames);

        let waveform = decode_audio(&bytes, 16_000).unwrap();
        assert_eq!(waveform.len(), 500);
        assert!(waveform.samples().iter().all(|&s| s.abs() < 1e-6));
    }

    #[test]
    fn test_wav_resampled_to_target_rate() {
        let frames: Vec<Vec<i16>> = (0..4410).map(|_| vec![0]).collect();
        let bytes = wav_bytes(spec(1, 44_100), &frames);

        let waveform = decode_audio(&bytes, 250_000).unwrap();
        assert_eq!(waveform.sample_rate(), 250_000);
        assert_eq!(waveform.len(), 25_000);
        assert!((waveform.duration() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_truncated_wav_is_corrupt() {
        let frames: Vec<Vec<i16>> = (0..2000).map(|i| vec![i as i16]).collect();
        let bytes = wav_bytes(spec(1, 8_000), &frames);
        let truncated = &bytes[..bytes.len() / 2 + 1];

        assert!(matches!(
            decode_audio(truncated, 8_000),
            Err(PipelineError::CorruptAudio(_))
        ));
    }

    #[test]
    fn test_wav_header_with_garbage_body_is_corrupt() {
        let mut bytes = b"RIFF\x40\x00\x00\x00WAVE".to_vec();
        bytes.extend_from_slice(&[0xAB; 52]);
        assert!(matches!(
            decode_audio(&bytes, 8_000),
            Err(PipelineError::CorruptAudio(_))
        ));
    }

    #[test]
    fn test_empty_wav_is_corrupt() {
        let bytes = wav_bytes(spec(1, 8_000), &[]);
        assert!(matches!(
            decode_audio(&bytes, 8_000),
            Err(PipelineError::CorruptAudio(_))
        ));
    }

    #[test]
    fn test_unknown_bytes_are_unsupported() {
        let bytes = b"this is a plain text file, definitely not audio at all".repeat(20);
        assert!(matches!(
            decode_audio(&bytes, 8_000),
            Err(PipelineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_flac_magic_with_garbage_is_corrupt() {
        let mut bytes = b"fLaC".to_vec();
        bytes.extend_from_slice(&[0x00; 8]);
        assert!(matches!(
            decode_audio(&bytes, 8_000),
            Err(PipelineError::CorruptAudio(_))
        ));
    }
}
