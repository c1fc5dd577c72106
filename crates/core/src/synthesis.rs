//! Sentence-level speech synthesis.
//!
//! Text is segmented into sentences, over-long sentences are re-packed into
//! bounded chunks, each chunk is spoken by the TTS collaborator and the
//! results are joined in order.

use rayon::prelude::*;

use crate::audio::buffer::{AudioBuffer, REFERENCE_SPEC};
use crate::audio::effects::concatenate;
use crate::audio::enhance::enhance_or_passthrough;
use crate::audio::io::to_reference_format;
use crate::config::SynthesisConfig;
use crate::error::{GreetError, Result};
use crate::retry::{with_retry, RetryConfig};
use crate::text::{chunk_sentences, SentenceChunk, SentenceSegmenter};
use crate::tts::SpeechSynthesizer;

/// Per-call synthesis options.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOptions {
    pub language: String,
    pub enhance: bool,
    pub max_chunk_len: usize,
    pub sentence_pause_ms: u64,
    pub parallel: bool,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self::from(&SynthesisConfig::default())
    }
}

impl From<&SynthesisConfig> for SynthesisOptions {
    fn from(config: &SynthesisConfig) -> Self {
        Self {
            language: config.language.clone(),
            enhance: config.enhance,
            max_chunk_len: config.max_chunk_len,
            sentence_pause_ms: config.sentence_pause_ms,
            parallel: config.parallel_chunks,
        }
    }
}

/// Drives the segmenter and synthesizer for one piece of text at a time.
pub struct SentencePipeline<'a> {
    synthesizer: &'a dyn SpeechSynthesizer,
    segmenter: &'a dyn SentenceSegmenter,
    retry: RetryConfig,
}

impl<'a> SentencePipeline<'a> {
    pub fn new(synthesizer: &'a dyn SpeechSynthesizer, segmenter: &'a dyn SentenceSegmenter) -> Self {
        Self {
            synthesizer,
            segmenter,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Segment and chunk `text`.
    ///
    /// Fails with `EmptyInput` when nothing speakable remains.
    pub fn plan_chunks(&self, text: &str, options: &SynthesisOptions) -> Result<Vec<SentenceChunk>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GreetError::EmptyInput("text is empty".into()));
        }

        let sentences = self.segmenter.segment(text, &options.language);
        let chunks = chunk_sentences(&sentences, options.max_chunk_len);
        if chunks.is_empty() {
            return Err(GreetError::EmptyInput(
                "no speakable chunks after segmentation".into(),
            ));
        }

        log::info!(
            "Segmented {} chars into {} sentence(s), {} chunk(s) [{}]",
            text.chars().count(),
            sentences.len(),
            chunks.len(),
            self.segmenter.name()
        );
        Ok(chunks)
    }

    /// Speak `text` in the voice of `voice_reference`.
    ///
    /// The reference is converted to the reference format once per call.
    /// Chunk outputs are joined in chunk order whether they were produced
    /// sequentially or on the worker pool.
    pub fn synthesize_text(
        &self,
        text: &str,
        voice_reference: &AudioBuffer,
        options: &SynthesisOptions,
    ) -> Result<AudioBuffer> {
        let chunks = self.plan_chunks(text, options)?;

        let reference = if voice_reference.spec() == REFERENCE_SPEC {
            voice_reference.clone()
        } else {
            to_reference_format(voice_reference)?
        };
        if reference.is_empty() {
            return Err(GreetError::Synthesis("voice reference is empty".into()));
        }

        let outputs: Vec<AudioBuffer> = if options.parallel && chunks.len() > 1 {
            chunks
                .par_iter()
                .map(|chunk| self.synthesize_chunk(chunk, &reference, options))
                .collect::<Result<_>>()?
        } else {
            chunks
                .iter()
                .map(|chunk| self.synthesize_chunk(chunk, &reference, options))
                .collect::<Result<_>>()?
        };

        let speech = concatenate(&outputs, options.sentence_pause_ms)?;
        log::info!(
            "Synthesized {:.2}s of speech with {}",
            speech.duration_s(),
            self.synthesizer.name()
        );
        Ok(speech)
    }

    fn synthesize_chunk(
        &self,
        chunk: &SentenceChunk,
        reference: &AudioBuffer,
        options: &SynthesisOptions,
    ) -> Result<AudioBuffer> {
        log::debug!("Chunk {}: {:?}", chunk.index, chunk.text);
        let speech = with_retry(&self.retry, "TTS synthesis", || {
            self.synthesizer
                .synthesize(&chunk.text, reference, &options.language)
        })?;
        Ok(if options.enhance {
            enhance_or_passthrough(&speech)
        } else {
            speech
        })
    }
}
