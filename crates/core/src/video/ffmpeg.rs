//! [`VideoCodec`] backed by the ffmpeg and ffprobe command-line tools.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::codec::{ConcatInput, ConcatJob, RenderJob, VideoCodec};
use super::{Canvas, FadeOut, VideoInfo};
use crate::audio::buffer::secs_to_ms;
use crate::audio::io::{read_audio_file, write_wav};
use crate::audio::AudioBuffer;
use crate::config::EncoderConfig;
use crate::error::{GreetError, Result};
use crate::process::{run_with_timeout, stderr_tail};
use crate::retry::{with_retry, RetryConfig};

/// Sample rate every concatenated audio stream is brought to.
const CONCAT_SAMPLE_RATE: u32 = 48000;

/// Builder for FFmpeg commands with any number of inputs.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input files, in `-i` order
    inputs: Vec<PathBuf>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            log_level: "error".to_string(),
        }
    }

    /// Add an input file.
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(path.as_ref().to_path_buf());
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Limit output duration.
    pub fn duration_ms(self, ms: u64) -> Self {
        self.output_arg("-t").output_arg(format_secs(ms))
    }

    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-v".to_string(),
            self.log_level.clone(),
        ];

        for path in &self.inputs {
            args.push("-i".to_string());
            args.push(path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Seconds with millisecond precision, as ffmpeg time arguments.
fn format_secs(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// `fade`/`afade` arguments for a fade-out.
fn fade_args(fade: FadeOut) -> String {
    format!(
        "t=out:st={}:d={}",
        format_secs(fade.start_ms),
        format_secs(fade.duration_ms)
    )
}

/// Encoder that shells out to ffmpeg/ffprobe.
pub struct FfmpegCodec {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    video_codec: String,
    audio_codec: String,
    preset: String,
    crf: u8,
    timeout: Option<Duration>,
    retry: RetryConfig,
}

impl FfmpegCodec {
    /// Locate both binaries on PATH.
    pub fn from_config(config: &EncoderConfig, retry: &RetryConfig) -> Result<Self> {
        let ffmpeg = which::which(&config.ffmpeg)
            .map_err(|_| GreetError::encode(format!("'{}' not found on PATH", config.ffmpeg), None))?;
        let ffprobe = which::which(&config.ffprobe)
            .map_err(|_| GreetError::encode(format!("'{}' not found on PATH", config.ffprobe), None))?;
        Ok(Self {
            ffmpeg,
            ffprobe,
            video_codec: config.video_codec.clone(),
            audio_codec: config.audio_codec.clone(),
            preset: config.preset.clone(),
            crf: config.crf,
            timeout: config.timeout_secs.map(Duration::from_secs),
            retry: retry.clone(),
        })
    }

    fn encode_settings(&self, cmd: FfmpegCommand) -> FfmpegCommand {
        cmd.video_codec(&self.video_codec)
            .preset(&self.preset)
            .crf(self.crf)
            .output_arg("-pix_fmt")
            .output_arg("yuv420p")
            .audio_codec(&self.audio_codec)
            .output_arg("-movflags")
            .output_arg("+faststart")
    }

    fn run_ffmpeg(&self, cmd: &FfmpegCommand, what: &str) -> Result<()> {
        let args = cmd.build_args();
        log::debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        with_retry(&self.retry, what, || {
            let output = run_with_timeout(&self.ffmpeg, &args, self.timeout, what)?;
            if output.success() {
                Ok(())
            } else {
                Err(GreetError::encode(
                    format!("{} failed ({})", what, output.status),
                    Some(stderr_tail(&output.stderr, 20)),
                ))
            }
        })
    }
}

impl VideoCodec for FfmpegCodec {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn probe(&self, path: &Path) -> Result<VideoInfo> {
        let args: [&OsStr; 7] = [
            OsStr::new("-v"),
            OsStr::new("quiet"),
            OsStr::new("-print_format"),
            OsStr::new("json"),
            OsStr::new("-show_format"),
            OsStr::new("-show_streams"),
            path.as_os_str(),
        ];
        let output = with_retry(&self.retry, "ffprobe", || {
            let output = run_with_timeout(&self.ffprobe, args, self.timeout, "ffprobe")?;
            if output.success() {
                Ok(output)
            } else {
                Err(GreetError::encode(
                    "FFprobe failed",
                    Some(stderr_tail(&output.stderr, 20)),
                ))
            }
        })?;
        parse_probe_output(&output.stdout)
    }

    fn extract_audio(&self, path: &Path) -> Result<Option<AudioBuffer>> {
        let wav = tempfile::Builder::new()
            .prefix("greetcast-audio-")
            .suffix(".wav")
            .tempfile()?;
        let cmd = FfmpegCommand::new(wav.path())
            .input(path)
            .output_arg("-vn")
            .map("0:a:0")
            .audio_codec("pcm_s16le")
            .output_arg("-f")
            .output_arg("wav");
        self.run_ffmpeg(&cmd, "audio extraction")?;
        Ok(Some(read_audio_file(wav.path())?))
    }

    fn render(&self, job: &RenderJob<'_>, output: &Path) -> Result<()> {
        let audio_file = match job.audio {
            Some(buf) => {
                let tmp = tempfile::Builder::new()
                    .prefix("greetcast-mix-")
                    .suffix(".wav")
                    .tempfile()?;
                write_wav(tmp.path(), buf)?;
                Some(tmp)
            }
            None => None,
        };

        let mut cmd = FfmpegCommand::new(output).input(job.input);
        if let Some(file) = &audio_file {
            cmd = cmd.input(file.path());
        }
        if let Some(end) = job.end_ms {
            cmd = cmd.duration_ms(end);
        }
        cmd = cmd.map("0:v:0");
        cmd = if audio_file.is_some() {
            cmd.map("1:a:0")
        } else {
            cmd.map("0:a:0?")
        };
        if let Some(fade) = job.fade {
            cmd = cmd.video_filter(format!("fade={}", fade_args(fade)));
        }
        let cmd = self.encode_settings(cmd);

        self.run_ffmpeg(&cmd, "render")
    }

    fn concat(&self, job: &ConcatJob<'_>, output: &Path) -> Result<()> {
        if job.inputs.is_empty() {
            return Err(GreetError::EmptyAssembly);
        }
        let mut cmd = FfmpegCommand::new(output);
        for input in &job.inputs {
            cmd = cmd.input(input.path);
        }
        let cmd = cmd
            .filter_complex(concat_filter_graph(&job.inputs, job.canvas, job.fade))
            .map("[outv]")
            .map("[outa]");
        let cmd = self.encode_settings(cmd);

        self.run_ffmpeg(&cmd, "concat")
    }
}

/// Compose-mode concatenation graph.
///
/// Every input is letterboxed onto `canvas` and its audio is resampled to a
/// common layout and padded or cut to the input's own duration, so neither
/// stream drifts across joins. Inputs without audio get generated silence.
pub fn concat_filter_graph(inputs: &[ConcatInput<'_>], canvas: Canvas, fade: Option<FadeOut>) -> String {
    let Canvas { width: w, height: h, fps } = canvas;
    let mut graph = String::new();

    for (i, input) in inputs.iter().enumerate() {
        let duration = format_secs(input.info.duration_ms);
        graph.push_str(&format!(
            "[{i}:v:0]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p[v{i}];"
        ));
        if input.info.has_audio {
            graph.push_str(&format!(
                "[{i}:a:0]aresample={CONCAT_SAMPLE_RATE},\
                 aformat=sample_fmts=fltp:channel_layouts=stereo,\
                 apad,atrim=duration={duration}[a{i}];"
            ));
        } else {
            graph.push_str(&format!(
                "anullsrc=r={CONCAT_SAMPLE_RATE}:cl=stereo,atrim=duration={duration}[a{i}];"
            ));
        }
    }

    for i in 0..inputs.len() {
        graph.push_str(&format!("[v{i}][a{i}]"));
    }
    let n = inputs.len();
    match fade {
        Some(fade) => {
            let args = fade_args(fade);
            graph.push_str(&format!(
                "concat=n={n}:v=1:a=1[cv][ca];[cv]fade={args}[outv];[ca]afade={args}[outa]"
            ));
        }
        None => graph.push_str(&format!("concat=n={n}:v=1:a=1[outv][outa]")),
    }
    graph
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

/// Parse `ffprobe -show_format -show_streams` JSON.
pub fn parse_probe_output(json: &[u8]) -> Result<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)
        .map_err(|e| GreetError::Decode(format!("unreadable ffprobe output: {}", e)))?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| GreetError::Decode("No video stream found".to_string()))?;
    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    let duration = probe
        .format
        .duration
        .as_ref()
        .or(video_stream.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    // avg_frame_rate is "0/0" for some containers
    let fps = [&video_stream.avg_frame_rate, &video_stream.r_frame_rate]
        .into_iter()
        .flatten()
        .filter_map(|r| parse_frame_rate(r))
        .find(|f| *f > 0.0)
        .unwrap_or(30.0);

    Ok(VideoInfo {
        duration_ms: secs_to_ms(duration),
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps,
        has_audio,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {"codec_type": "video", "width": 1920, "height": 1080,
             "r_frame_rate": "30000/1001", "avg_frame_rate": "30000/1001"},
            {"codec_type": "audio", "sample_rate": "48000"}
        ],
        "format": {"duration": "10.010000", "size": "123456"}
    }"#;

    fn info(duration_ms: u64, has_audio: bool) -> VideoInfo {
        VideoInfo {
            duration_ms,
            width: 1280,
            height: 720,
            fps: 25.0,
            has_audio,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_audio_runs_ffmpeg_only() {
        let codec = FfmpegCodec {
            ffmpeg: PathBuf::from("false"),
            ffprobe: PathBuf::from("/nonexistent/greetcast-ffprobe"),
            video_codec: "libx264".into(),
            audio_codec: "aac".into(),
            preset: "veryfast".into(),
            crf: 23,
            timeout: Some(Duration::from_secs(10)),
            retry: RetryConfig::none(),
        };
        // Only ffmpeg runs: its failure surfaces as an encoder error rather
        // than a spawn error for the missing ffprobe.
        let err = codec.extract_audio(Path::new("clip.mp4")).unwrap_err();
        assert!(matches!(err, GreetError::Encode { .. }), "{}", err);
    }

    #[test]
    fn test_parse_probe_output() {
        let info = parse_probe_output(PROBE_JSON.as_bytes()).unwrap();
        assert_eq!(info.duration_ms, 10010);
        assert_eq!((info.width, info.height), (1920, 1080));
        assert!((info.fps - 29.97).abs() < 0.01);
        assert!(info.has_audio);
    }

    #[test]
    fn test_parse_probe_silent_video() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 640, "height": 480,
                       "avg_frame_rate": "0/0", "r_frame_rate": "25/1", "duration": "2.5"}],
                       "format": {}}"#;
        let info = parse_probe_output(json.as_bytes()).unwrap();
        assert!(!info.has_audio);
        assert_eq!(info.duration_ms, 2500);
        assert_eq!(info.fps, 25.0);
    }

    #[test]
    fn test_parse_probe_requires_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "1.0"}}"#;
        assert!(matches!(
            parse_probe_output(json.as_bytes()),
            Err(GreetError::Decode(_))
        ));
        assert!(parse_probe_output(b"not json").is_err());
    }

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(0), "0.000");
        assert_eq!(format_secs(4000), "4.000");
        assert_eq!(format_secs(12345), "12.345");
    }

    #[test]
    fn test_command_builder_multiple_inputs() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input("video.mp4")
            .input("speech.wav")
            .duration_ms(5000)
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("libx264");

        let args = cmd.build_args();
        let joined = args.join(" ");
        assert!(joined.starts_with("-y -hide_banner -v error"));
        assert!(joined.contains("-i video.mp4 -i speech.wav -t 5.000 -map 0:v:0 -map 1:a:0"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_concat_graph_without_fade() {
        let a = Path::new("a.mp4");
        let b = Path::new("b.mp4");
        let inputs = [
            ConcatInput { path: a, info: info(2000, true) },
            ConcatInput { path: b, info: info(3000, false) },
        ];
        let canvas = Canvas { width: 1280, height: 720, fps: 25.0 };
        let graph = concat_filter_graph(&inputs, canvas, None);

        assert!(graph.contains("[0:v:0]scale=1280:720:force_original_aspect_ratio=decrease"));
        assert!(graph.contains("[0:a:0]aresample=48000"));
        assert!(graph.contains("atrim=duration=2.000[a0]"));
        assert!(graph.contains("anullsrc=r=48000:cl=stereo,atrim=duration=3.000[a1]"));
        assert!(!graph.contains("[1:a:0]"));
        assert!(graph.ends_with("[v0][a0][v1][a1]concat=n=2:v=1:a=1[outv][outa]"));
        assert!(!graph.contains("fade"));
    }

    #[test]
    fn test_concat_graph_single_terminal_fade() {
        let p = Path::new("x.mp4");
        let inputs = [
            ConcatInput { path: p, info: info(2000, true) },
            ConcatInput { path: p, info: info(5000, true) },
            ConcatInput { path: p, info: info(3000, true) },
        ];
        let canvas = Canvas { width: 1280, height: 720, fps: 25.0 };
        let fade = FadeOut { start_ms: 9000, duration_ms: 1000 };
        let graph = concat_filter_graph(&inputs, canvas, Some(fade));

        assert_eq!(graph.matches("fade=t=out").count(), 2); // one video, one audio
        assert!(graph.contains("[cv]fade=t=out:st=9.000:d=1.000[outv]"));
        assert!(graph.contains("[ca]afade=t=out:st=9.000:d=1.000[outa]"));
    }
}
