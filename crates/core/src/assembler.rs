//! Intro + main + outro concatenation.
//!
//! Segments may differ in resolution and frame rate; they are letterboxed
//! onto a shared canvas rather than rejected. The terminal fade-out is
//! applied here, once, over the fully joined timeline.

use crate::error::{GreetError, Result};
use crate::video::{fade_window, Canvas, VideoCodec, VideoSegment};

/// Join the optional intro, the main segment and the optional outro.
pub fn assemble(
    codec: &dyn VideoCodec,
    intro: Option<VideoSegment>,
    main: VideoSegment,
    outro: Option<VideoSegment>,
    fade_duration_ms: u64,
) -> Result<VideoSegment> {
    let sequence: Vec<VideoSegment> = intro
        .into_iter()
        .chain(std::iter::once(main))
        .chain(outro)
        .collect();
    assemble_sequence(codec, sequence, fade_duration_ms)
}

/// Join any ordered sequence of segments.
///
/// The inputs are dropped (and their scratch files removed) when this
/// returns, whether or not the join succeeded.
pub fn assemble_sequence(
    codec: &dyn VideoCodec,
    segments: Vec<VideoSegment>,
    fade_duration_ms: u64,
) -> Result<VideoSegment> {
    let infos: Vec<_> = segments.iter().map(VideoSegment::info).collect();
    let canvas = Canvas::covering(&infos).ok_or(GreetError::EmptyAssembly)?;
    let total_ms: u64 = infos.iter().map(|i| i.duration_ms).sum();
    let fade = fade_window(total_ms, fade_duration_ms);

    log::info!(
        "Assembling {} segment(s): {}ms on {}x{} @{:.2}fps{}",
        segments.len(),
        total_ms,
        canvas.width,
        canvas.height,
        canvas.fps,
        match fade {
            Some(f) => format!(", fade from {}ms", f.start_ms),
            None => String::new(),
        }
    );

    VideoSegment::concat(codec, &segments, canvas, fade)
}
