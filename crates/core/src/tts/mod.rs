//! Text-to-speech collaborators.
//!
//! The voice-cloning model is an external black box. Backends implement
//! [`SpeechSynthesizer`]; [`SharedSynthesizer`] adds lazy loading and
//! serialised access on top of any of them.

pub mod command;
pub mod shared;

pub use command::CommandSynthesizer;
pub use shared::SharedSynthesizer;

use crate::audio::AudioBuffer;
use crate::config::TtsConfig;
use crate::error::{GreetError, Result};

/// Speech synthesis backend trait.
pub trait SpeechSynthesizer: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Speak `text` in the voice of `reference` (already in the reference
    /// format) for the given language code.
    fn synthesize(&self, text: &str, reference: &AudioBuffer, language: &str) -> Result<AudioBuffer>;
}

/// Build a synthesizer backend by name.
///
/// The model is not touched here; the returned [`SharedSynthesizer`] loads
/// the backend on first use.
pub fn get_synthesizer(config: &TtsConfig) -> Result<SharedSynthesizer> {
    match config.backend.as_str() {
        "command" | "coqui" => {
            let config = config.clone();
            Ok(SharedSynthesizer::lazy("command", move || {
                let synth = CommandSynthesizer::from_config(&config)?;
                Ok(Box::new(synth) as Box<dyn SpeechSynthesizer>)
            }))
        }
        other => Err(GreetError::Synthesis(format!(
            "Unknown TTS backend: '{}'. Use 'command'",
            other
        ))),
    }
}
