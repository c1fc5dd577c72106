//! In-memory audio buffer with format metadata.

/// Format of an audio buffer: rate, channel count and bit depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl SampleSpec {
    pub const fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }
}

/// 22.05 kHz mono 16-bit, the format voice references are normalised to.
pub const REFERENCE_SPEC: SampleSpec = SampleSpec::new(22050, 1, 16);

/// Decoded audio: interleaved samples normalised to [-1, 1].
///
/// Value type. Every operation in [`crate::audio::effects`] returns a new
/// buffer rather than mutating one that may be shared.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f64>,
    spec: SampleSpec,
}

impl AudioBuffer {
    /// Wrap interleaved samples.
    ///
    /// A trailing partial frame (fewer samples than `channels`) is dropped.
    pub fn new(mut samples: Vec<f64>, spec: SampleSpec) -> Self {
        let channels = spec.channels.max(1) as usize;
        let whole = samples.len() - samples.len() % channels;
        samples.truncate(whole);
        Self {
            samples,
            spec: SampleSpec {
                channels: channels as u16,
                ..spec
            },
        }
    }

    /// Mono 16-bit buffer, the common case for synthesized speech.
    pub fn mono(samples: Vec<f64>, sample_rate: u32) -> Self {
        Self::new(samples, SampleSpec::new(sample_rate, 1, 16))
    }

    /// All-zero buffer of `frames` frames.
    pub fn silent_frames(frames: usize, spec: SampleSpec) -> Self {
        Self::new(vec![0.0; frames * spec.channels.max(1) as usize], spec)
    }

    pub fn spec(&self) -> SampleSpec {
        self.spec
    }

    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.spec.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.spec.bits_per_sample
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.spec.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in milliseconds, rounded to the nearest ms.
    pub fn duration_ms(&self) -> u64 {
        frames_to_ms(self.frames(), self.spec.sample_rate)
    }

    pub fn duration_s(&self) -> f64 {
        if self.spec.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.spec.sample_rate as f64
    }

    /// Peak absolute sample value.
    pub fn peak(&self) -> f64 {
        self.samples.iter().fold(0.0f64, |acc, s| acc.max(s.abs()))
    }

    /// Split interleaved samples into one Vec per channel.
    pub fn deinterleave(&self) -> Vec<Vec<f64>> {
        let channels = self.spec.channels as usize;
        let mut planes = vec![Vec::with_capacity(self.frames()); channels];
        for frame in self.samples.chunks_exact(channels) {
            for (ch, &s) in frame.iter().enumerate() {
                planes[ch].push(s);
            }
        }
        planes
    }

    /// Inverse of [`deinterleave`](Self::deinterleave). Planes are cut to the
    /// shortest one.
    pub fn from_planes(planes: &[Vec<f64>], spec: SampleSpec) -> Self {
        if planes.is_empty() {
            return Self::new(vec![], spec);
        }
        let frames = planes.iter().map(|p| p.len()).min().unwrap_or(0);
        let mut samples = Vec::with_capacity(frames * planes.len());
        for i in 0..frames {
            for plane in planes {
                samples.push(plane[i]);
            }
        }
        Self::new(
            samples,
            SampleSpec {
                channels: planes.len() as u16,
                ..spec
            },
        )
    }
}

/// Convert a millisecond count to a frame count at `sample_rate` (rounded).
pub fn ms_to_frames(ms: u64, sample_rate: u32) -> usize {
    ((ms as u128 * sample_rate as u128 + 500) / 1000) as usize
}

/// Convert a frame count to milliseconds at `sample_rate` (rounded).
pub fn frames_to_ms(frames: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    let rate = sample_rate as u128;
    ((frames as u128 * 1000 + rate / 2) / rate) as u64
}

/// Seconds (possibly fractional or negative) to whole milliseconds.
pub fn secs_to_ms(secs: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * 1000.0).round() as u64
}
