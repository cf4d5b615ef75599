//! Mono PCM WAV decoding and encoding on top of `hound`.

use std::io::Cursor;

use crate::error::{Error, Result};

/// Sample rate of every synthesized waveform. The dialect checkpoints all
/// emit 24 kHz audio.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Decode WAV bytes into mono f32 samples in [-1, 1].
///
/// Multi-channel input is downmixed by averaging the frame; non-finite
/// samples are zeroed. Anything `hound` cannot parse is a validation error
/// since this is only ever fed client payloads or daemon replies.
pub fn decode_wav_bytes(wav_bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    let cursor = Cursor::new(wav_bytes);
    let mut reader = hound::WavReader::new(cursor)
        .map_err(|e| Error::Validation(format!("Not a decodable WAV payload: {}", e)))?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels.max(1) as usize;

    let mut samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample.max(1) as u32;
            let max_val = if bits > 1 {
                ((1i64 << (bits - 1)) - 1) as f32
            } else {
                1.0
            };
            reader
                .samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| (s as f32 / max_val).clamp(-1.0, 1.0))
                .collect()
        }
        hound::SampleFormat::Float => reader.samples::<f32>().filter_map(|s| s.ok()).collect(),
    };

    if samples.is_empty() {
        return Err(Error::Validation(
            "WAV payload contains no samples".to_string(),
        ));
    }

    if channels > 1 {
        let mut mono = Vec::with_capacity(samples.len() / channels + 1);
        for frame in samples.chunks(channels) {
            let sum: f32 = frame.iter().copied().sum();
            mono.push(sum / frame.len() as f32);
        }
        samples = mono;
    }

    for sample in &mut samples {
        if !sample.is_finite() {
            *sample = 0.0;
        } else {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    Ok((samples, sample_rate))
}

/// Encode mono f32 samples as 16-bit PCM WAV bytes, peak-normalized.
pub fn encode_wav_bytes(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    if samples.is_empty() {
        return Err(Error::Synthesis("Empty waveform".to_string()));
    }

    let peak = samples
        .iter()
        .map(|s| if s.is_finite() { s.abs() } else { 0.0 })
        .fold(0.0f32, f32::max);
    let scale = if peak > 0.0 { 1.0 / peak } else { 0.0 };

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::Synthesis(format!("Failed to create WAV writer: {}", e)))?;
        for &sample in samples {
            let normalized = if sample.is_finite() { sample * scale } else { 0.0 };
            let quantized = (normalized.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(quantized)
                .map_err(|e| Error::Synthesis(format!("Failed to write WAV sample: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| Error::Synthesis(format!("Failed to finalize WAV: {}", e)))?;
    }

    Ok(cursor.into_inner())
}
