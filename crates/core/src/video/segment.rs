//! Encoded video held in a scratch file.
//!
//! A [`VideoSegment`] owns its backing file and removes it on drop, so every
//! intermediate produced while mixing and assembling is released on every
//! exit path. Segments are values: editing one yields a new segment and
//! leaves the source untouched.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use super::codec::{ConcatInput, ConcatJob, RenderJob, VideoCodec};
use super::{Canvas, FadeOut, VideoInfo};
use crate::audio::AudioBuffer;
use crate::error::{GreetError, Result};

/// Changes applied by [`VideoSegment::edit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Edit<'a> {
    pub end_ms: Option<u64>,
    pub fade: Option<FadeOut>,
    pub audio: Option<&'a AudioBuffer>,
}

/// A decoded-on-demand video with its own (optional) audio track.
#[derive(Debug)]
pub struct VideoSegment {
    file: NamedTempFile,
    info: VideoInfo,
}

fn scratch_mp4() -> Result<NamedTempFile> {
    Ok(tempfile::Builder::new()
        .prefix("greetcast-")
        .suffix(".mp4")
        .tempfile()?)
}

impl VideoSegment {
    /// Wrap encoded bytes. The codec probes them once here.
    pub fn from_bytes(codec: &dyn VideoCodec, bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(GreetError::Decode("empty video".into()));
        }
        let mut file = scratch_mp4()?;
        file.write_all(bytes)?;
        file.flush()?;
        Self::adopt(codec, file)
    }

    /// Load a video file from disk.
    pub fn open(codec: &dyn VideoCodec, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(codec, &bytes)
    }

    fn adopt(codec: &dyn VideoCodec, file: NamedTempFile) -> Result<Self> {
        let info = codec.probe(file.path())?;
        log::debug!(
            "Segment {}: {}ms {}x{} @{:.2}fps audio={}",
            file.path().display(),
            info.duration_ms,
            info.width,
            info.height,
            info.fps,
            info.has_audio
        );
        Ok(Self { file, info })
    }

    pub fn info(&self) -> VideoInfo {
        self.info
    }

    pub fn duration_ms(&self) -> u64 {
        self.info.duration_ms
    }

    pub fn has_audio(&self) -> bool {
        self.info.has_audio
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Decode this segment's audio track.
    pub fn audio(&self, codec: &dyn VideoCodec) -> Result<Option<AudioBuffer>> {
        if !self.info.has_audio {
            return Ok(None);
        }
        codec.extract_audio(self.path())
    }

    /// Re-encode with `edit` applied.
    pub fn edit(&self, codec: &dyn VideoCodec, edit: &Edit<'_>) -> Result<VideoSegment> {
        let out = scratch_mp4()?;
        let job = RenderJob {
            input: self.path(),
            end_ms: edit.end_ms,
            fade: edit.fade,
            audio: edit.audio,
        };
        codec.render(&job, out.path())?;
        Self::adopt(codec, out)
    }

    /// Replace the audio track. The previous track is discarded with `self`.
    pub fn set_audio(self, codec: &dyn VideoCodec, audio: &AudioBuffer) -> Result<VideoSegment> {
        self.edit(
            codec,
            &Edit {
                audio: Some(audio),
                ..Edit::default()
            },
        )
    }

    /// Join segments in order on `canvas`, with an optional fade over the
    /// joined timeline.
    pub fn concat(
        codec: &dyn VideoCodec,
        segments: &[VideoSegment],
        canvas: Canvas,
        fade: Option<FadeOut>,
    ) -> Result<VideoSegment> {
        if segments.is_empty() {
            return Err(GreetError::EmptyAssembly);
        }
        let job = ConcatJob {
            inputs: segments
                .iter()
                .map(|s| ConcatInput {
                    path: s.path(),
                    info: s.info,
                })
                .collect(),
            canvas,
            fade,
        };
        let out = scratch_mp4()?;
        codec.concat(&job, out.path())?;
        Self::adopt(codec, out)
    }

    /// Encoded bytes. The scratch file is removed afterwards.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.file.path())?)
    }
}
