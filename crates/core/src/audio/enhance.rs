//! Post-processing for synthesized speech.
//!
//! Softens the "digital" edge of TTS output: a one-pole low-pass above
//! 6.5 kHz, gentle compression, then peak normalisation with headroom.

use super::buffer::{ms_to_frames, AudioBuffer};
use super::effects::{db_to_gain, gain};
use crate::error::EnhanceError;

pub const LOW_PASS_CUTOFF_HZ: f64 = 6500.0;
pub const COMPRESSOR_THRESHOLD_DB: f64 = -20.0;
pub const COMPRESSOR_RATIO: f64 = 2.5;
pub const COMPRESSOR_ATTACK_MS: f64 = 5.0;
pub const COMPRESSOR_RELEASE_MS: f64 = 50.0;
pub const NORMALIZE_HEADROOM_DB: f64 = 0.5;

/// Run the full enhancement chain.
pub fn enhance(buf: &AudioBuffer) -> Result<AudioBuffer, EnhanceError> {
    if buf.is_empty() {
        return Err(EnhanceError::Empty);
    }
    if buf.samples().iter().any(|s| !s.is_finite()) {
        return Err(EnhanceError::NonFinite);
    }

    let filtered = low_pass_filter(buf, LOW_PASS_CUTOFF_HZ);
    let compressed = compress_dynamic_range(
        &filtered,
        COMPRESSOR_THRESHOLD_DB,
        COMPRESSOR_RATIO,
        COMPRESSOR_ATTACK_MS,
        COMPRESSOR_RELEASE_MS,
    );
    Ok(normalize(&compressed, NORMALIZE_HEADROOM_DB))
}

/// [`enhance`], falling back to the input on failure.
pub fn enhance_or_passthrough(buf: &AudioBuffer) -> AudioBuffer {
    match enhance(buf) {
        Ok(out) => out,
        Err(e) => {
            log::warn!("Enhancement skipped: {}", e);
            buf.clone()
        }
    }
}

/// Single-pole RC low-pass filter, applied per channel.
///
/// A cutoff at or above Nyquist has nothing to remove, so the buffer comes
/// back unchanged, as does an empty buffer.
pub fn low_pass_filter(buf: &AudioBuffer, cutoff_hz: f64) -> AudioBuffer {
    let nyquist_hz = buf.sample_rate() as f64 / 2.0;
    if buf.is_empty() || cutoff_hz >= nyquist_hz {
        return buf.clone();
    }

    let rc = 1.0 / (cutoff_hz * std::f64::consts::TAU);
    let dt = 1.0 / buf.sample_rate() as f64;
    let alpha = dt / (rc + dt);

    let mut out = buf.clone();
    let channels = buf.channels() as usize;
    let samples = out.samples_mut();
    for ch in 0..channels {
        let mut prev = samples[ch];
        for i in (ch + channels..samples.len()).step_by(channels) {
            prev += alpha * (samples[i] - prev);
            samples[i] = prev;
        }
    }
    out
}

/// Feed-forward compressor with RMS detection over the attack window.
///
/// Attenuation ramps up over `attack_ms` while the signal sits above the
/// threshold and decays over `release_ms` once it drops below.
pub fn compress_dynamic_range(
    buf: &AudioBuffer,
    threshold_db: f64,
    ratio: f64,
    attack_ms: f64,
    release_ms: f64,
) -> AudioBuffer {
    let sr = buf.sample_rate();
    let channels = buf.channels() as usize;
    let frames = buf.frames();
    let thresh_rms = db_to_gain(threshold_db);
    let attack_frames = (ms_to_frames(attack_ms.round() as u64, sr)).max(1);
    let release_frames = (ms_to_frames(release_ms.round() as u64, sr)).max(1);
    let look = attack_frames;

    let input = buf.samples();
    let mut out = buf.clone();
    let output = out.samples_mut();

    // Running sum of squares over frames [i - look, i)
    let mut window_sum = 0.0f64;
    let mut attenuation = 0.0f64;

    for i in 0..frames {
        let window_start = i.saturating_sub(look);
        let window_len = (i - window_start) * channels;
        let rms_now = if window_len == 0 {
            0.0
        } else {
            (window_sum.max(0.0) / window_len as f64).sqrt()
        };

        let over_db = if rms_now <= 0.0 {
            0.0
        } else {
            (20.0 * (rms_now / thresh_rms).log10()).max(0.0)
        };
        let max_attenuation = (1.0 - 1.0 / ratio) * over_db;

        if rms_now > thresh_rms && attenuation <= max_attenuation {
            attenuation = (attenuation + max_attenuation / attack_frames as f64).min(max_attenuation);
        } else {
            attenuation = (attenuation - max_attenuation / release_frames as f64).max(0.0);
        }

        let frame = &mut output[i * channels..(i + 1) * channels];
        if attenuation != 0.0 {
            let g = db_to_gain(-attenuation);
            for s in frame.iter_mut() {
                *s *= g;
            }
        }

        // Slide the detector window using the unprocessed input
        for &s in &input[i * channels..(i + 1) * channels] {
            window_sum += s * s;
        }
        if i + 1 > look {
            let drop = i + 1 - look - 1;
            for &s in &input[drop * channels..(drop + 1) * channels] {
                window_sum -= s * s;
            }
        }
    }

    out
}

/// Scale so the peak sits `headroom_db` below full scale.
///
/// Silent buffers are returned unchanged.
pub fn normalize(buf: &AudioBuffer, headroom_db: f64) -> AudioBuffer {
    let peak = buf.peak();
    if peak <= 0.0 {
        return buf.clone();
    }
    let target = db_to_gain(-headroom_db);
    gain(buf, 20.0 * (target / peak).log10())
}
