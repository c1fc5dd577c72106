//! Runtime configuration.
//!
//! Every section is defaulted, so a config file only needs the keys it
//! overrides. Files are JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::retry::RetryConfig;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreetConfig {
    pub synthesis: SynthesisConfig,
    pub mix: MixConfig,
    pub tts: TtsConfig,
    pub encoder: EncoderConfig,
    pub retry: RetryConfig,
}

impl GreetConfig {
    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write the config as pretty JSON, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Sentence synthesis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Language code passed to the segmenter and the TTS backend.
    pub language: String,
    /// Run the enhancement chain on each chunk.
    pub enhance: bool,
    /// Longest chunk (in characters) sent to the TTS backend in one call.
    pub max_chunk_len: usize,
    /// Silence inserted between chunks.
    pub sentence_pause_ms: u64,
    /// Synthesize chunks on a worker pool.
    pub parallel_chunks: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            language: "ru".to_string(),
            enhance: true,
            max_chunk_len: 180,
            sentence_pause_ms: 0,
            parallel_chunks: false,
        }
    }
}

/// Speech-onto-video mixing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Terminal fade-out of the assembled video.
    pub fade_duration_s: f64,
    pub speech_gain_db: f64,
    /// Footage kept after the speech ends.
    pub post_speech_padding_s: f64,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            fade_duration_s: 1.0,
            speech_gain_db: 0.0,
            post_speech_padding_s: 1.0,
        }
    }
}

/// External TTS program settings.
///
/// `args` is a template; `{text}`, `{model}`, `{speaker_wav}`, `{language}`
/// and `{out_path}` are substituted per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub backend: String,
    pub program: String,
    pub args: Vec<String>,
    pub model: String,
    pub timeout_secs: Option<u64>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            backend: "command".to_string(),
            program: "tts".to_string(),
            args: [
                "--text",
                "{text}",
                "--model_name",
                "{model}",
                "--speaker_wav",
                "{speaker_wav}",
                "--language_idx",
                "{language}",
                "--out_path",
                "{out_path}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            model: "tts_models/multilingual/multi-dataset/xtts_v2".to_string(),
            timeout_secs: Some(600),
        }
    }
}

/// ffmpeg / ffprobe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub crf: u8,
    pub timeout_secs: Option<u64>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            timeout_secs: Some(900),
        }
    }
}

/// Data directory for the catalog and stored media.
///
/// Uses `GREETCAST_HOME` if set, otherwise `~/.local/share/greetcast`.
pub fn home_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("GREETCAST_HOME") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("greetcast")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GreetConfig::default();
        assert_eq!(config.synthesis.language, "ru");
        assert_eq!(config.synthesis.max_chunk_len, 180);
        assert_eq!(config.synthesis.sentence_pause_ms, 0);
        assert!(config.synthesis.enhance);
        assert_eq!(config.mix.fade_duration_s, 1.0);
        assert_eq!(config.mix.post_speech_padding_s, 1.0);
        assert_eq!(config.encoder.video_codec, "libx264");
        assert_eq!(config.retry.max_retries, 2);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: GreetConfig =
            serde_json::from_str(r#"{"mix": {"fade_duration_s": 0.5}, "synthesis": {"language": "en"}}"#)
                .unwrap();
        assert_eq!(config.mix.fade_duration_s, 0.5);
        assert_eq!(config.mix.post_speech_padding_s, 1.0);
        assert_eq!(config.synthesis.language, "en");
        assert_eq!(config.synthesis.max_chunk_len, 180);
        assert_eq!(config.tts, TtsConfig::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("greetcast_config_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let mut config = GreetConfig::default();
        config.synthesis.parallel_chunks = true;
        config.encoder.timeout_secs = None;
        config.save(&path).unwrap();

        assert_eq!(GreetConfig::load(&path).unwrap(), config);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_creates_parent_dir() {
        let dir = std::env::temp_dir().join(format!("greetcast_config_home_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("nested").join("config.json");

        GreetConfig::default().save(&path).unwrap();
        assert_eq!(GreetConfig::load(&path).unwrap(), GreetConfig::default());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_malformed_json_is_error() {
        let dir = std::env::temp_dir().join(format!("greetcast_config_bad_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(GreetConfig::load(&path).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
