//! Audio transforms: silence, trim, pad, overlay, gain, fade, concatenation.
//!
//! All functions take buffers by reference and return new ones.

use super::buffer::{ms_to_frames, AudioBuffer, SampleSpec};
use super::io::resample_normalize;
use crate::error::{GreetError, Result};

/// Generate silence of the given duration.
pub fn silence(duration_ms: u64, sample_rate: u32, channels: u16) -> AudioBuffer {
    silence_like(duration_ms, SampleSpec::new(sample_rate, channels, 16))
}

/// Silence in an existing buffer's format.
pub fn silence_like(duration_ms: u64, spec: SampleSpec) -> AudioBuffer {
    AudioBuffer::silent_frames(ms_to_frames(duration_ms, spec.sample_rate), spec)
}

/// Truncate to `end_ms`. No-op when the buffer is already that short.
pub fn trim(buf: &AudioBuffer, end_ms: u64) -> AudioBuffer {
    let end = ms_to_frames(end_ms, buf.sample_rate());
    if end >= buf.frames() {
        return buf.clone();
    }
    let channels = buf.channels() as usize;
    AudioBuffer::new(buf.samples()[..end * channels].to_vec(), buf.spec())
}

/// Append trailing silence up to `target_ms`. No-op when already that long.
pub fn pad_with_silence(buf: &AudioBuffer, target_ms: u64) -> AudioBuffer {
    let target = ms_to_frames(target_ms, buf.sample_rate());
    if target <= buf.frames() {
        return buf.clone();
    }
    let channels = buf.channels() as usize;
    let mut samples = Vec::with_capacity(target * channels);
    samples.extend_from_slice(buf.samples());
    samples.resize(target * channels, 0.0);
    AudioBuffer::new(samples, buf.spec())
}

/// Trim or pad so the buffer is exactly `target_ms` long.
pub fn fit_to(buf: &AudioBuffer, target_ms: u64) -> AudioBuffer {
    pad_with_silence(&trim(buf, target_ms), target_ms)
}

/// Sample-wise additive mix of two equal-length, same-format tracks.
///
/// Trimming/padding both tracks to a common length is the caller's job;
/// mismatched inputs are rejected rather than silently truncated.
pub fn overlay(base: &AudioBuffer, top: &AudioBuffer) -> Result<AudioBuffer> {
    if base.spec() != top.spec() {
        return Err(GreetError::TrackMismatch(format!(
            "format {:?} vs {:?}",
            base.spec(),
            top.spec()
        )));
    }
    if base.frames() != top.frames() {
        return Err(GreetError::TrackMismatch(format!(
            "length {} vs {} frames",
            base.frames(),
            top.frames()
        )));
    }

    let samples = base
        .samples()
        .iter()
        .zip(top.samples())
        .map(|(a, b)| a + b)
        .collect();
    Ok(AudioBuffer::new(samples, base.spec()))
}

/// Adjust volume by `db` decibels.
pub fn gain(buf: &AudioBuffer, db: f64) -> AudioBuffer {
    let mut out = buf.clone();
    adjust_volume(out.samples_mut(), db);
    out
}

/// Adjust volume by dB amount. Modifies samples in place.
pub fn adjust_volume(samples: &mut [f64], db: f64) {
    if db.abs() < 0.01 {
        return;
    }
    let gain = db_to_gain(db);
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
}

pub fn db_to_gain(db: f64) -> f64 {
    10.0f64.powf(db / 20.0)
}

/// Linear fade to silence over the trailing `duration_ms`.
///
/// A fade longer than the buffer covers the whole buffer.
pub fn fade_out(buf: &AudioBuffer, duration_ms: u64) -> AudioBuffer {
    let fade_frames = ms_to_frames(duration_ms, buf.sample_rate()).min(buf.frames());
    if fade_frames == 0 {
        return buf.clone();
    }

    let mut out = buf.clone();
    let channels = buf.channels() as usize;
    let start = buf.frames() - fade_frames;
    for (i, frame) in out.samples_mut()[start * channels..]
        .chunks_exact_mut(channels)
        .enumerate()
    {
        let g = 1.0 - (i + 1) as f64 / fade_frames as f64;
        for s in frame.iter_mut() {
            *s *= g;
        }
    }
    out
}

/// Join buffers in order with `gap_ms` of silence between neighbours.
///
/// Later buffers are converted to the first buffer's format. A single
/// buffer is returned unchanged whatever the gap.
pub fn concatenate(buffers: &[AudioBuffer], gap_ms: u64) -> Result<AudioBuffer> {
    let first = buffers
        .first()
        .ok_or_else(|| GreetError::EmptyInput("no audio to concatenate".into()))?;
    if buffers.len() == 1 {
        return Ok(first.clone());
    }

    let spec = first.spec();
    let gap = silence_like(gap_ms, spec);
    let total: usize = buffers.iter().map(|b| b.samples().len()).sum::<usize>()
        + gap.samples().len() * (buffers.len() - 1);

    let mut samples = Vec::with_capacity(total);
    for (i, buf) in buffers.iter().enumerate() {
        if i > 0 {
            samples.extend_from_slice(gap.samples());
        }
        if buf.spec() == spec {
            samples.extend_from_slice(buf.samples());
        } else {
            samples.extend_from_slice(resample_normalize(buf, spec)?.samples());
        }
    }

    Ok(AudioBuffer::new(samples, spec))
}
