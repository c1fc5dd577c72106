//! End-to-end greeting generation.
//!
//! ```text
//! template ─┬─ reference ──> speech ──┐
//!           ├─ main video ────────────┴─> mix ──┐
//!           ├─ intro (optional) ────────────────┼─> assemble ──> bytes
//!           └─ outro (optional) ────────────────┘
//! ```

use crate::assembler::assemble;
use crate::audio::io::{decode, encode, to_reference_format, AudioFormat};
use crate::audio::AudioBuffer;
use crate::cache::{bytes_hash, ReferenceCache};
use crate::catalog::{BlobStore, TemplateStore};
use crate::config::GreetConfig;
use crate::error::Result;
use crate::mixer::{mix, MixParams};
use crate::synthesis::{SentencePipeline, SynthesisOptions};
use crate::text::SentenceSegmenter;
use crate::tts::SpeechSynthesizer;
use crate::video::{VideoCodec, VideoSegment};

/// Anything that can serve templates and the media they point at.
pub trait MediaStore: TemplateStore + BlobStore {}

impl<T: TemplateStore + BlobStore> MediaStore for T {}

/// Decode a voice sample and bring it to the reference format.
///
/// With a cache, the normalised sample is looked up by the hash of the raw
/// bytes first and stored after conversion. A failed cache write is logged
/// and otherwise ignored.
pub fn prepare_reference(
    bytes: &[u8],
    format_hint: Option<&str>,
    cache: Option<&ReferenceCache>,
) -> Result<AudioBuffer> {
    let hash = cache.map(|_| bytes_hash(bytes));
    if let (Some(cache), Some(hash)) = (cache, &hash) {
        if let Some(buf) = cache.get(hash) {
            return Ok(buf);
        }
    }

    let reference = to_reference_format(&decode(bytes, format_hint)?)?;
    log::info!("Voice reference: {:.2}s", reference.duration_s());

    if let (Some(cache), Some(hash)) = (cache, &hash) {
        if let Err(e) = cache.store(hash, &reference) {
            log::warn!("Could not cache voice reference: {}", e);
        }
    }
    Ok(reference)
}

/// Speech and video generation over a fixed set of collaborators.
pub struct GreetingService<'a> {
    synthesizer: &'a dyn SpeechSynthesizer,
    segmenter: &'a dyn SentenceSegmenter,
    config: GreetConfig,
    cache: Option<ReferenceCache>,
}

impl<'a> GreetingService<'a> {
    pub fn new(
        synthesizer: &'a dyn SpeechSynthesizer,
        segmenter: &'a dyn SentenceSegmenter,
        config: GreetConfig,
    ) -> Self {
        Self {
            synthesizer,
            segmenter,
            config,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: ReferenceCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &GreetConfig {
        &self.config
    }

    fn pipeline(&self) -> SentencePipeline<'a> {
        SentencePipeline::new(self.synthesizer, self.segmenter).with_retry(self.config.retry.clone())
    }

    /// Speak `text` in the voice of an already prepared reference.
    pub fn synthesize(&self, text: &str, reference: &AudioBuffer) -> Result<AudioBuffer> {
        let options = SynthesisOptions::from(&self.config.synthesis);
        self.pipeline().synthesize_text(text, reference, &options)
    }

    /// Audio-only greeting: WAV bytes of `text` spoken in the voice of the
    /// given sample.
    pub fn generate_speech(
        &self,
        text: &str,
        reference_bytes: &[u8],
        format_hint: Option<&str>,
    ) -> Result<Vec<u8>> {
        let reference = prepare_reference(reference_bytes, format_hint, self.cache.as_ref())?;
        let speech = self.synthesize(text, &reference)?;
        encode(&speech, AudioFormat::Wav)
    }

    /// Full greeting video for a stored template.
    ///
    /// The main clip is mixed without a fade; the single terminal fade is
    /// applied over the assembled intro + main + outro timeline.
    pub fn generate_from_template(
        &self,
        store: &dyn MediaStore,
        codec: &dyn VideoCodec,
        template_id: &str,
        text: &str,
    ) -> Result<Vec<u8>> {
        let template = store.template(template_id)?;
        log::info!(
            "Template {}: main={} intro={} outro={}",
            template.id,
            template.video_id,
            template.intro_id.as_deref().unwrap_or("-"),
            template.outro_id.as_deref().unwrap_or("-")
        );

        let load = |id: &str| -> Result<VideoSegment> { VideoSegment::from_bytes(codec, &store.get(id)?) };
        let main = load(&template.video_id)?;
        let intro = template.intro_id.as_deref().map(load).transpose()?;
        let outro = template.outro_id.as_deref().map(load).transpose()?;

        let reference_bytes = store.get(&template.reference_id)?;
        let reference = prepare_reference(&reference_bytes, Some("wav"), self.cache.as_ref())?;
        let speech = self.synthesize(text, &reference)?;

        let params = MixParams::from_config(&self.config.mix);
        let mixed = mix(codec, main, &speech, &params.without_fade())?;
        let greeting = assemble(codec, intro, mixed, outro, params.fade_duration_ms)?;

        log::info!("Greeting ready: {}ms", greeting.duration_ms());
        greeting.into_bytes()
    }
}
