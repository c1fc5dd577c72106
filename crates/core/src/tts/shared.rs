//! Lazily-loaded, mutually-exclusive synthesizer handle.
//!
//! A loaded voice model is one instance that cannot serve concurrent
//! inference calls. The handle is cheap to clone and hand to every
//! request; the first call loads the backend and every call holds the lock
//! for the duration of inference.

use std::sync::{Arc, Mutex, MutexGuard};

use super::SpeechSynthesizer;
use crate::audio::AudioBuffer;
use crate::error::{GreetError, Result};

type Loader = Box<dyn Fn() -> Result<Box<dyn SpeechSynthesizer>> + Send + Sync>;

struct Inner {
    name: String,
    loader: Loader,
    slot: Mutex<Option<Box<dyn SpeechSynthesizer>>>,
}

/// Reference-counted handle around a single synthesizer instance.
#[derive(Clone)]
pub struct SharedSynthesizer {
    inner: Arc<Inner>,
}

impl SharedSynthesizer {
    /// Defer construction until the first synthesis call.
    ///
    /// A failed load is returned to that caller and retried on the next one.
    pub fn lazy<F>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn SpeechSynthesizer>> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                loader: Box::new(loader),
                slot: Mutex::new(None),
            }),
        }
    }

    /// Wrap an already constructed backend.
    pub fn new(synth: Box<dyn SpeechSynthesizer>) -> Self {
        let name = synth.name().to_string();
        Self {
            inner: Arc::new(Inner {
                name,
                loader: Box::new(|| {
                    Err(GreetError::Synthesis(
                        "synthesizer was provided preloaded".into(),
                    ))
                }),
                slot: Mutex::new(Some(synth)),
            }),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn SpeechSynthesizer>>> {
        // A panic mid-inference leaves no partial state worth discarding
        self.inner
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SpeechSynthesizer for SharedSynthesizer {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn synthesize(&self, text: &str, reference: &AudioBuffer, language: &str) -> Result<AudioBuffer> {
        let mut slot = self.lock();
        let synth = match &mut *slot {
            Some(synth) => synth,
            empty => {
                log::info!("Loading TTS backend '{}'", self.inner.name);
                empty.insert((self.inner.loader)()?)
            }
        };
        synth.synthesize(text, reference, language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeSynthesizer;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_loads_once_on_first_use() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let shared = SharedSynthesizer::lazy("fake", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSynthesizer::new(10)) as Box<dyn SpeechSynthesizer>)
        });
        assert!(!shared.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        let reference = AudioBuffer::mono(vec![0.0; 10], 22050);
        let clone = shared.clone();
        shared.synthesize("one", &reference, "ru").unwrap();
        clone.synthesize("two", &reference, "ru").unwrap();

        assert!(shared.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let shared = SharedSynthesizer::lazy("flaky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(GreetError::Synthesis("model download failed".into()))
            } else {
                Ok(Box::new(FakeSynthesizer::new(10)) as Box<dyn SpeechSynthesizer>)
            }
        });
        let reference = AudioBuffer::mono(vec![0.0; 10], 22050);
        assert!(shared.synthesize("x", &reference, "ru").is_err());
        assert!(shared.synthesize("x", &reference, "ru").is_ok());
    }

    struct ExclusiveCheck {
        busy: AtomicBool,
        overlaps: AtomicUsize,
    }

    impl SpeechSynthesizer for Arc<ExclusiveCheck> {
        fn name(&self) -> &str {
            "exclusive"
        }

        fn synthesize(&self, _: &str, reference: &AudioBuffer, _: &str) -> Result<AudioBuffer> {
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
            self.busy.store(false, Ordering::SeqCst);
            Ok(reference.clone())
        }
    }

    #[test]
    fn test_calls_are_serialised() {
        let check = Arc::new(ExclusiveCheck {
            busy: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
        });
        let shared = SharedSynthesizer::new(Box::new(check.clone()));
        assert_eq!(shared.name(), "exclusive");

        let reference = AudioBuffer::mono(vec![0.0; 10], 22050);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let shared = shared.clone();
                let reference = reference.clone();
                scope.spawn(move || {
                    for _ in 0..5 {
                        shared.synthesize("x", &reference, "en").unwrap();
                    }
                });
            }
        });
        assert_eq!(check.overlaps.load(Ordering::SeqCst), 0);
    }
}
