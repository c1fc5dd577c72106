//! In-memory collaborators for unit tests.
//!
//! `FakeCodec` treats a "video file" as a JSON-encoded [`FakeClip`], so the
//! mixer and assembler can be exercised without ffmpeg.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::audio::buffer::{AudioBuffer, SampleSpec};
use crate::audio::effects::{concatenate, fade_out, fit_to, silence_like, trim};
use crate::catalog::{BlobStore, Template, TemplateStore};
use crate::error::{GreetError, Result};
use crate::tts::SpeechSynthesizer;
use crate::video::{ConcatJob, FadeOut, RenderJob, VideoCodec, VideoInfo};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FakeAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f64>,
}

impl FakeAudio {
    fn to_buffer(&self) -> AudioBuffer {
        AudioBuffer::new(
            self.samples.clone(),
            SampleSpec::new(self.sample_rate, self.channels, 16),
        )
    }

    fn from_buffer(buf: &AudioBuffer) -> Self {
        Self {
            sample_rate: buf.sample_rate(),
            channels: buf.channels(),
            samples: buf.samples().to_vec(),
        }
    }
}

/// Stand-in for an encoded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FakeClip {
    pub duration_ms: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub audio: Option<FakeAudio>,
    /// Picture fades baked into this clip, in clip time.
    pub fades: Vec<FadeOut>,
}

impl FakeClip {
    pub fn new(duration_ms: u64, width: u32, height: u32) -> Self {
        Self {
            duration_ms,
            width,
            height,
            fps: 25.0,
            audio: None,
            fades: Vec::new(),
        }
    }

    pub fn with_audio(mut self, audio: &AudioBuffer) -> Self {
        self.audio = Some(FakeAudio::from_buffer(audio));
        self
    }

    pub fn audio_buffer(&self) -> Option<AudioBuffer> {
        self.audio.as_ref().map(FakeAudio::to_buffer)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap()
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        serde_json::from_slice(bytes).unwrap()
    }

    fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| GreetError::Decode(e.to_string()))
    }

    fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }

    fn info(&self) -> VideoInfo {
        VideoInfo {
            duration_ms: self.duration_ms,
            width: self.width,
            height: self.height,
            fps: self.fps,
            has_audio: self.audio.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CodecCall {
    Probe,
    ExtractAudio,
    Render {
        end_ms: Option<u64>,
        fade: Option<FadeOut>,
        audio_frames: Option<usize>,
    },
    Concat {
        inputs: usize,
        fade: Option<FadeOut>,
    },
}

/// Codec over [`FakeClip`] files that records every call.
#[derive(Default)]
pub struct FakeCodec {
    calls: Mutex<Vec<CodecCall>>,
}

impl FakeCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<CodecCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: CodecCall) {
        self.calls.lock().unwrap().push(call);
    }
}

const CONCAT_SPEC: SampleSpec = SampleSpec::new(1000, 1, 16);

impl VideoCodec for FakeCodec {
    fn name(&self) -> &str {
        "fake"
    }

    fn probe(&self, path: &Path) -> Result<VideoInfo> {
        self.record(CodecCall::Probe);
        Ok(FakeClip::read(path)?.info())
    }

    fn extract_audio(&self, path: &Path) -> Result<Option<AudioBuffer>> {
        self.record(CodecCall::ExtractAudio);
        Ok(FakeClip::read(path)?.audio_buffer())
    }

    fn render(&self, job: &RenderJob<'_>, output: &Path) -> Result<()> {
        self.record(CodecCall::Render {
            end_ms: job.end_ms,
            fade: job.fade,
            audio_frames: job.audio.map(|a| a.frames()),
        });
        let mut clip = FakeClip::read(job.input)?;
        if let Some(audio) = job.audio {
            clip.audio = Some(FakeAudio::from_buffer(audio));
        }
        if let Some(end) = job.end_ms {
            clip.duration_ms = clip.duration_ms.min(end);
            clip.fades.retain(|f| f.start_ms < end);
        }
        let duration = clip.duration_ms;
        if let Some(audio) = clip.audio_buffer() {
            clip.audio = Some(FakeAudio::from_buffer(&trim(&audio, duration)));
        }
        if let Some(fade) = job.fade {
            clip.fades.push(fade);
        }
        clip.write(output)
    }

    fn concat(&self, job: &ConcatJob<'_>, output: &Path) -> Result<()> {
        self.record(CodecCall::Concat {
            inputs: job.inputs.len(),
            fade: job.fade,
        });
        let mut offset = 0u64;
        let mut fades = Vec::new();
        let mut tracks = Vec::new();
        for input in &job.inputs {
            let clip = FakeClip::read(input.path)?;
            fades.extend(clip.fades.iter().map(|f| FadeOut {
                start_ms: f.start_ms + offset,
                duration_ms: f.duration_ms,
            }));
            let audio = clip
                .audio_buffer()
                .and_then(|a| crate::audio::io::resample_normalize(&a, CONCAT_SPEC).ok())
                .unwrap_or_else(|| silence_like(clip.duration_ms, CONCAT_SPEC));
            tracks.push(fit_to(&audio, clip.duration_ms));
            offset += clip.duration_ms;
        }
        let mut audio = concatenate(&tracks, 0)?;
        if let Some(fade) = job.fade {
            fades.push(fade);
            audio = fade_out(&audio, fade.duration_ms);
        }
        let clip = FakeClip {
            duration_ms: offset,
            width: job.canvas.width,
            height: job.canvas.height,
            fps: job.canvas.fps,
            audio: Some(FakeAudio::from_buffer(&audio)),
            fades,
        };
        clip.write(output)
    }
}

/// Synthesizer producing a constant tone whose length depends on the text.
#[derive(Clone)]
pub struct FakeSynthesizer {
    ms_per_char: u64,
    fixed_ms: Option<u64>,
    failures_left: Arc<Mutex<usize>>,
    texts: Arc<Mutex<Vec<String>>>,
}

pub const FAKE_TTS_RATE: u32 = 22050;

impl FakeSynthesizer {
    pub fn new(ms_per_char: u64) -> Self {
        Self {
            ms_per_char,
            fixed_ms: None,
            failures_left: Arc::new(Mutex::new(0)),
            texts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every call returns exactly `ms` of speech.
    pub fn fixed(ms: u64) -> Self {
        Self {
            fixed_ms: Some(ms),
            ..Self::new(0)
        }
    }

    /// Fail the next `n` calls with a transient error.
    pub fn failing_first(self, n: usize) -> Self {
        *self.failures_left.lock().unwrap() = n;
        self
    }

    /// Texts of successful calls, in call order.
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.texts.lock().unwrap().len()
    }
}

impl SpeechSynthesizer for FakeSynthesizer {
    fn name(&self) -> &str {
        "fake"
    }

    fn synthesize(&self, text: &str, _reference: &AudioBuffer, _language: &str) -> Result<AudioBuffer> {
        {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(GreetError::Synthesis("fake model busy".into()));
            }
        }
        self.texts.lock().unwrap().push(text.to_string());
        let ms = self
            .fixed_ms
            .unwrap_or(self.ms_per_char * text.chars().count() as u64);
        let frames = crate::audio::buffer::ms_to_frames(ms, FAKE_TTS_RATE);
        Ok(AudioBuffer::mono(vec![0.5; frames], FAKE_TTS_RATE))
    }
}

/// Template and blob store backed by hash maps.
#[derive(Default)]
pub struct FakeStore {
    pub templates: HashMap<String, Template>,
    pub blobs: HashMap<String, Vec<u8>>,
}

impl TemplateStore for FakeStore {
    fn template(&self, id: &str) -> Result<Template> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| GreetError::not_found("template", id))
    }
}

impl BlobStore for FakeStore {
    fn get(&self, id: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(id)
            .cloned()
            .ok_or_else(|| GreetError::not_found("blob", id))
    }
}
