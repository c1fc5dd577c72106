//! Video segments and the encoder collaborator.
//!
//! Container encode/decode is delegated to an external codec behind the
//! [`VideoCodec`] trait. This module owns the timing rules shared by the
//! mixer and the assembler.

pub mod codec;
pub mod ffmpeg;
pub mod segment;

pub use codec::{ConcatInput, ConcatJob, RenderJob, VideoCodec};
pub use ffmpeg::FfmpegCodec;
pub use segment::{Edit, VideoSegment};

use serde::{Deserialize, Serialize};

/// Stream properties of an encoded video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub duration_ms: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub has_audio: bool,
}

/// A linear fade to black/silence over `[start_ms, start_ms + duration_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FadeOut {
    pub start_ms: u64,
    pub duration_ms: u64,
}

impl FadeOut {
    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }
}

/// The fade that ends a clip of `total_ms`, if one applies.
///
/// A fade is only applied when `0 < fade_ms < total_ms`; anything else
/// means no fade rather than a clamped or negative-length one.
pub fn fade_window(total_ms: u64, fade_ms: u64) -> Option<FadeOut> {
    if fade_ms == 0 || fade_ms >= total_ms {
        return None;
    }
    Some(FadeOut {
        start_ms: total_ms - fade_ms,
        duration_ms: fade_ms,
    })
}

/// Output frame geometry for a composed concatenation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

const FALLBACK_FPS: f64 = 30.0;

impl Canvas {
    /// Smallest canvas every input fits on: max width, height and frame
    /// rate. Dimensions are rounded up to even numbers for yuv420p.
    pub fn covering(infos: &[VideoInfo]) -> Option<Canvas> {
        if infos.is_empty() {
            return None;
        }
        let width = infos.iter().map(|i| i.width).max().unwrap_or(0);
        let height = infos.iter().map(|i| i.height).max().unwrap_or(0);
        let fps = infos
            .iter()
            .map(|i| i.fps)
            .filter(|f| f.is_finite() && *f > 0.0)
            .fold(0.0f64, f64::max);
        Some(Canvas {
            width: round_up_even(width.max(2)),
            height: round_up_even(height.max(2)),
            fps: if fps > 0.0 { fps } else { FALLBACK_FPS },
        })
    }
}

fn round_up_even(n: u32) -> u32 {
    n + n % 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32, fps: f64) -> VideoInfo {
        VideoInfo {
            duration_ms: 1000,
            width,
            height,
            fps,
            has_audio: true,
        }
    }

    #[test]
    fn test_fade_window_bounds() {
        assert_eq!(fade_window(5000, 0), None);
        assert_eq!(fade_window(5000, 5000), None);
        assert_eq!(fade_window(5000, 9000), None);
        assert_eq!(
            fade_window(5000, 1000),
            Some(FadeOut {
                start_ms: 4000,
                duration_ms: 1000
            })
        );
        assert_eq!(fade_window(0, 1000), None);
    }

    #[test]
    fn test_fade_ends_at_clip_end() {
        for total in [1, 999, 1000, 10_000] {
            if let Some(f) = fade_window(total, 500) {
                assert_eq!(f.end_ms(), total);
            }
        }
    }

    #[test]
    fn test_canvas_takes_maxima() {
        let canvas =
            Canvas::covering(&[info(1280, 720, 25.0), info(720, 1280, 30.0), info(640, 480, 24.0)])
                .unwrap();
        assert_eq!(canvas.width, 1280);
        assert_eq!(canvas.height, 1280);
        assert_eq!(canvas.fps, 30.0);
    }

    #[test]
    fn test_canvas_even_dimensions_and_fallback_fps() {
        let canvas = Canvas::covering(&[info(641, 361, 0.0)]).unwrap();
        assert_eq!((canvas.width, canvas.height), (642, 362));
        assert_eq!(canvas.fps, FALLBACK_FPS);
        assert!(Canvas::covering(&[]).is_none());
    }
}
