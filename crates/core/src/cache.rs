//! File-based cache of normalised voice references.
//!
//! Every greeting request converts its voice sample to the reference format
//! before synthesis. The converted audio is cached under the SHA-256 of the
//! original bytes, so repeat requests with the same sample skip decoding and
//! resampling.

use std::io::Write;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::audio::io::{read_audio_file, write_wav};
use crate::audio::AudioBuffer;
use crate::error::Result;

/// Get the default cache directory.
///
/// Uses `GREETCAST_CACHE_DIR` env var if set, otherwise `~/.cache/greetcast`.
pub fn cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("GREETCAST_CACHE_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".cache").join("greetcast")
}

/// Compute SHA-256 hash of a byte slice.
///
/// Returns a 64-character hex string.
pub fn bytes_hash(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

fn short(hash: &str) -> &str {
    &hash[..12.min(hash.len())]
}

/// Normalised references keyed by source hash.
#[derive(Debug, Clone)]
pub struct ReferenceCache {
    root: PathBuf,
}

impl ReferenceCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache rooted at [`cache_dir`].
    pub fn default_location() -> Self {
        Self::new(cache_dir())
    }

    fn entry_path(&self, hash: &str) -> PathBuf {
        self.root.join("references").join(format!("{}.wav", hash))
    }

    /// Return the cached reference, or None if absent or unreadable.
    pub fn get(&self, hash: &str) -> Option<AudioBuffer> {
        let path = self.entry_path(hash);
        if !path.metadata().map(|m| m.len() > 0).unwrap_or(false) {
            return None;
        }
        match read_audio_file(&path) {
            Ok(buf) => {
                log::info!("Cache hit: voice reference ({}...)", short(hash));
                Some(buf)
            }
            Err(e) => {
                log::warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Store a normalised reference. The write is atomic.
    pub fn store(&self, hash: &str, buf: &AudioBuffer) -> Result<()> {
        let dest = self.entry_path(hash);
        let parent = dest.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent)?;

        let tmp = tempfile::Builder::new()
            .prefix(".ref-")
            .suffix(".wav")
            .tempfile_in(parent)?;
        write_wav(tmp.path(), buf)?;
        tmp.as_file().flush()?;
        tmp.persist(&dest).map_err(|e| e.error)?;

        log::info!("Cached voice reference ({}...)", short(hash));
        Ok(())
    }
}
