//! Speech-onto-video mixing and timing reconciliation.
//!
//! The mixed clip runs until the speech has finished plus a fixed trailing
//! pad, but never past the end of the source footage:
//!
//! ```text
//! target = min(video, speech + post_speech_padding)
//! ```
//!
//! Both audio tracks are brought to exactly `target` before they are
//! overlaid. All timing is integer milliseconds; buffers are cut and padded
//! at frame resolution so the two tracks always have identical frame counts.

use crate::audio::buffer::{secs_to_ms, AudioBuffer};
use crate::audio::effects::{fade_out, fit_to, gain, overlay, pad_with_silence, silence_like, trim};
use crate::audio::io::resample_normalize;
use crate::config::MixConfig;
use crate::error::Result;
use crate::video::{fade_window, Edit, VideoCodec, VideoSegment};

/// Parameters of one mix, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixParams {
    pub fade_duration_ms: u64,
    pub speech_gain_db: f64,
    pub post_speech_padding_ms: u64,
}

impl MixParams {
    pub fn from_config(config: &MixConfig) -> Self {
        Self {
            fade_duration_ms: secs_to_ms(config.fade_duration_s),
            speech_gain_db: config.speech_gain_db,
            post_speech_padding_ms: secs_to_ms(config.post_speech_padding_s),
        }
    }

    /// Same parameters with the fade left to a later stage.
    pub fn without_fade(self) -> Self {
        Self {
            fade_duration_ms: 0,
            ..self
        }
    }
}

impl Default for MixParams {
    fn default() -> Self {
        Self::from_config(&MixConfig::default())
    }
}

/// Length of the mixed clip.
pub fn target_duration_ms(video_ms: u64, speech_ms: u64, post_speech_padding_ms: u64) -> u64 {
    video_ms.min(speech_ms.saturating_add(post_speech_padding_ms))
}

/// Original and speech tracks cut to a common length and format.
#[derive(Debug, Clone)]
pub struct AlignedTracks {
    pub target_ms: u64,
    pub original: AudioBuffer,
    pub speech: AudioBuffer,
}

/// Bring both tracks to `target` length in the original track's format.
///
/// `original` is the video's own audio, or `None` for a silent video, in
/// which case a silent track in the speech format stands in. Speech is cut
/// at the target and never extended past its own content; only trailing
/// silence fills the rest of the timeline.
pub fn align_tracks(
    original: Option<AudioBuffer>,
    video_ms: u64,
    speech: &AudioBuffer,
    params: &MixParams,
) -> Result<AlignedTracks> {
    let speech_ms = speech.duration_ms();
    let target_ms = target_duration_ms(video_ms, speech_ms, params.post_speech_padding_ms);

    let original = original.unwrap_or_else(|| silence_like(video_ms, speech.spec()));
    let spec = original.spec();

    let speech = if speech.spec() == spec {
        speech.clone()
    } else {
        resample_normalize(speech, spec)?
    };
    let speech = trim(&speech, speech_ms.min(target_ms));
    let speech = gain(&pad_with_silence(&speech, target_ms), params.speech_gain_db);

    log::debug!(
        "Aligning tracks: video={}ms speech={}ms pad={}ms -> target={}ms",
        video_ms,
        speech_ms,
        params.post_speech_padding_ms,
        target_ms
    );

    Ok(AlignedTracks {
        target_ms,
        original: fit_to(&original, target_ms),
        speech,
    })
}

/// Overlay the aligned tracks and apply the audio side of the fade.
pub fn mix_audio(tracks: &AlignedTracks, fade_duration_ms: u64) -> Result<AudioBuffer> {
    let mixed = overlay(&tracks.original, &tracks.speech)?;
    Ok(match fade_window(tracks.target_ms, fade_duration_ms) {
        Some(fade) => fade_out(&mixed, fade.duration_ms),
        None => mixed,
    })
}

/// Lay `speech` over `video`.
///
/// The returned segment is cut to the target duration and carries the
/// mixed track in place of the video's own audio. `video` is consumed; its
/// original track goes with it.
pub fn mix(
    codec: &dyn VideoCodec,
    video: VideoSegment,
    speech: &AudioBuffer,
    params: &MixParams,
) -> Result<VideoSegment> {
    let original = video.audio(codec)?;
    let tracks = align_tracks(original, video.duration_ms(), speech, params)?;
    let mixed = mix_audio(&tracks, params.fade_duration_ms)?;
    let fade = fade_window(tracks.target_ms, params.fade_duration_ms);

    log::info!(
        "Mixing {}ms of speech onto {}ms of video -> {}ms{}",
        speech.duration_ms(),
        video.duration_ms(),
        tracks.target_ms,
        if fade.is_some() { " with fade" } else { "" }
    );

    // Full-length clip without a fade: only the soundtrack changes
    if tracks.target_ms == video.duration_ms() && fade.is_none() {
        return video.set_audio(codec, &mixed);
    }

    video.edit(
        codec,
        &Edit {
            end_ms: Some(tracks.target_ms),
            fade,
            audio: Some(&mixed),
        },
    )
}
