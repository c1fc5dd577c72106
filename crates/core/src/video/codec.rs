//! The encoder collaborator interface.

use std::path::Path;

use super::{Canvas, FadeOut, VideoInfo};
use crate::audio::AudioBuffer;
use crate::error::Result;

/// Re-encode one input: optional cut, optional picture fade, optional
/// replacement audio track.
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    pub input: &'a Path,
    /// Keep `[0, end_ms)`. `None` keeps the whole input.
    pub end_ms: Option<u64>,
    /// Picture fade. Audio is faded by the caller before it is attached.
    pub fade: Option<FadeOut>,
    /// Replaces every audio stream of the input when set.
    pub audio: Option<&'a AudioBuffer>,
}

/// One entry of a concatenation.
#[derive(Debug, Clone, Copy)]
pub struct ConcatInput<'a> {
    pub path: &'a Path,
    pub info: VideoInfo,
}

/// Join inputs in order on a shared canvas, fading picture and sound
/// together over `fade` of the joined timeline.
#[derive(Debug, Clone)]
pub struct ConcatJob<'a> {
    pub inputs: Vec<ConcatInput<'a>>,
    pub canvas: Canvas,
    pub fade: Option<FadeOut>,
}

/// Video container encode/decode backend trait.
pub trait VideoCodec: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Read stream properties.
    fn probe(&self, path: &Path) -> Result<VideoInfo>;

    /// Decode the first audio stream.
    ///
    /// Callers check [`VideoInfo::has_audio`] first; a file without audio
    /// may be reported as `None` or as an error, depending on the codec.
    fn extract_audio(&self, path: &Path) -> Result<Option<AudioBuffer>>;

    /// Write the result of `job` to `output`.
    fn render(&self, job: &RenderJob<'_>, output: &Path) -> Result<()>;

    /// Write the concatenation described by `job` to `output`.
    fn concat(&self, job: &ConcatJob<'_>, output: &Path) -> Result<()>;
}
