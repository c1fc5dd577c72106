//! TTS backend that shells out to an external program.
//!
//! Defaults to the Coqui `tts` CLI with the multilingual XTTS model. The
//! reference and output travel through scratch WAV files that are removed
//! when their handles drop, whichever way the call exits.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::SpeechSynthesizer;
use crate::audio::io::{read_audio_file, write_wav};
use crate::audio::AudioBuffer;
use crate::config::TtsConfig;
use crate::error::{GreetError, Result};
use crate::process::{run_with_timeout, stderr_tail};

/// Runs one TTS process per chunk.
pub struct CommandSynthesizer {
    program: PathBuf,
    args: Vec<String>,
    model: String,
    timeout: Option<Duration>,
}

impl CommandSynthesizer {
    /// Locate the program on PATH and capture the argument template.
    pub fn from_config(config: &TtsConfig) -> Result<Self> {
        let program = which::which(&config.program).map_err(|_| {
            GreetError::Synthesis(format!("TTS program '{}' not found on PATH", config.program))
        })?;
        log::info!("Using TTS program {} ({})", program.display(), config.model);
        Ok(Self {
            program,
            args: config.args.clone(),
            model: config.model.clone(),
            timeout: config.timeout_secs.map(Duration::from_secs),
        })
    }

    fn expand_args(&self, text: &str, speaker_wav: &Path, language: &str, out_path: &Path) -> Vec<String> {
        let speaker_wav = speaker_wav.to_string_lossy();
        let out_path = out_path.to_string_lossy();
        expand_template(
            &self.args,
            &[
                ("{model}", self.model.as_str()),
                ("{speaker_wav}", speaker_wav.as_ref()),
                ("{language}", language),
                ("{out_path}", out_path.as_ref()),
                // User text goes last and is never re-scanned
                ("{text}", text),
            ],
        )
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn name(&self) -> &str {
        "command"
    }

    fn synthesize(&self, text: &str, reference: &AudioBuffer, language: &str) -> Result<AudioBuffer> {
        let speaker = scratch_wav("greetcast-ref-")?;
        write_wav(speaker.path(), reference)?;
        let out = scratch_wav("greetcast-tts-")?;

        let args = self.expand_args(text, speaker.path(), language, out.path());
        log::debug!("TTS: {} {}", self.program.display(), args.join(" "));

        let output = run_with_timeout(&self.program, &args, self.timeout, "TTS synthesis")?;
        if !output.success() {
            return Err(GreetError::Synthesis(format!(
                "TTS exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr, 5)
            )));
        }

        let speech = read_audio_file(out.path())
            .map_err(|e| GreetError::Synthesis(format!("unreadable TTS output: {}", e)))?;
        if speech.is_empty() {
            return Err(GreetError::Synthesis(format!(
                "TTS produced no audio for {:?}",
                text
            )));
        }
        Ok(speech)
    }
}

fn scratch_wav(prefix: &str) -> Result<tempfile::NamedTempFile> {
    Ok(tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".wav")
        .tempfile()?)
}

/// Substitute `{placeholder}` tokens in each argument.
pub fn expand_template(args: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            vars.iter()
                .fold(arg.clone(), |acc, (key, value)| acc.replace(key, value))
        })
        .collect()
}
