//! Catalog of voice references, videos and greeting templates.
//!
//! Persisted as a single JSON document next to the stored media:
//!
//! ```text
//! <root>/catalog.json
//! <root>/references/<name>.wav
//! <root>/videos/<id>.<ext>
//! ```
//!
//! Deleting a video used as a template's main video deletes the template;
//! deleting one used as intro or outro only clears that link. Deleting a
//! voice reference deletes the templates that use it.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audio::io::{decode, to_reference_format, write_wav};
use crate::error::{GreetError, Result};

const CATALOG_FILE: &str = "catalog.json";
const REFERENCES_DIR: &str = "references";
const VIDEOS_DIR: &str = "videos";

/// A stored voice sample, always in the reference format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFile {
    pub id: String,
    pub file_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFile {
    pub id: String,
    pub file_name: String,
    pub description: Option<String>,
}

/// A greeting recipe: main video and voice, with optional bookends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub intro_id: Option<String>,
    pub video_id: String,
    pub outro_id: Option<String>,
    pub reference_id: String,
    pub description: Option<String>,
}

/// Keyed template lookup.
pub trait TemplateStore {
    fn template(&self, id: &str) -> Result<Template>;
}

/// Keyed media lookup for voice references and videos.
pub trait BlobStore {
    fn get(&self, id: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct CatalogData {
    #[serde(default)]
    references: Vec<ReferenceFile>,
    #[serde(default)]
    videos: Vec<VideoFile>,
    #[serde(default)]
    templates: Vec<Template>,
}

/// File-backed catalog rooted at a data directory.
#[derive(Debug)]
pub struct Catalog {
    root: PathBuf,
    data: CatalogData,
}

impl Catalog {
    /// Open (or initialise) the catalog under `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(REFERENCES_DIR))?;
        std::fs::create_dir_all(root.join(VIDEOS_DIR))?;

        let index = root.join(CATALOG_FILE);
        let data = if index.exists() {
            serde_json::from_str(&std::fs::read_to_string(&index)?)?
        } else {
            CatalogData::default()
        };
        log::debug!(
            "Opened catalog {}: {} reference(s), {} video(s), {} template(s)",
            root.display(),
            data.references.len(),
            data.videos.len(),
            data.templates.len()
        );
        Ok(Self { root, data })
    }

    /// Write the index atomically.
    fn save(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.data)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.persist(self.root.join(CATALOG_FILE))
            .map_err(|e| e.error)?;
        Ok(())
    }

    /// Save, or restore `before` and run `undo` on the media files if the
    /// index cannot be written.
    fn commit(&mut self, before: CatalogData, undo: impl FnOnce()) -> Result<()> {
        if let Err(e) = self.save() {
            log::warn!("Catalog write failed, rolling back: {}", e);
            self.data = before;
            undo();
            return Err(e);
        }
        Ok(())
    }

    // --- Voice references ---

    /// Decode a voice sample, convert it to the reference format and store
    /// it as `<name>.wav`.
    pub fn add_reference(
        &mut self,
        name: &str,
        bytes: &[u8],
        format_hint: Option<&str>,
        description: Option<&str>,
    ) -> Result<ReferenceFile> {
        let file_name = validate_reference_name(name)?;
        self.ensure_reference_name_free(&file_name, None)?;

        let converted = to_reference_format(&decode(bytes, format_hint)?)?;
        let path = self.root.join(REFERENCES_DIR).join(&file_name);
        write_wav(&path, &converted)?;

        let reference = ReferenceFile {
            id: Uuid::new_v4().to_string(),
            file_name,
            description: description.map(str::to_string),
        };
        let before = self.data.clone();
        self.data.references.push(reference.clone());
        self.commit(before, || remove_file_if_present(&path))?;
        log::info!("Added reference {} ({})", reference.file_name, reference.id);
        Ok(reference)
    }

    /// Rename a stored reference file. The id stays the same.
    pub fn rename_reference(&mut self, id: &str, new_name: &str) -> Result<ReferenceFile> {
        let file_name = validate_reference_name(new_name)?;
        self.ensure_reference_name_free(&file_name, Some(id))?;

        let dir = self.root.join(REFERENCES_DIR);
        let before = self.data.clone();
        let reference = self
            .data
            .references
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| GreetError::not_found("reference", id))?;
        if reference.file_name == file_name {
            return Ok(reference.clone());
        }

        let (old, new) = (dir.join(&reference.file_name), dir.join(&file_name));
        std::fs::rename(&old, &new)?;
        reference.file_name = file_name;
        let reference = reference.clone();

        self.commit(before, || {
            if let Err(e) = std::fs::rename(&new, &old) {
                log::warn!("Could not restore {}: {}", old.display(), e);
            }
        })?;
        log::info!("Renamed reference {} -> {}", id, reference.file_name);
        Ok(reference)
    }

    fn ensure_reference_name_free(&self, file_name: &str, except_id: Option<&str>) -> Result<()> {
        let taken = self
            .data
            .references
            .iter()
            .any(|r| r.file_name == file_name && Some(r.id.as_str()) != except_id);
        if taken {
            return Err(GreetError::InvalidName(format!("{} already exists", file_name)));
        }
        Ok(())
    }

    pub fn list_references(&self) -> &[ReferenceFile] {
        &self.data.references
    }

    pub fn reference_path(&self, id: &str) -> Result<PathBuf> {
        self.data
            .references
            .iter()
            .find(|r| r.id == id)
            .map(|r| self.root.join(REFERENCES_DIR).join(&r.file_name))
            .ok_or_else(|| GreetError::not_found("reference", id))
    }

    /// Remove a reference and every template that speaks with it.
    ///
    /// Returns the ids of deleted templates.
    pub fn delete_reference(&mut self, id: &str) -> Result<Vec<String>> {
        let path = self.reference_path(id)?;
        let before = self.data.clone();
        self.data.references.retain(|r| r.id != id);

        let (dropped, kept): (Vec<Template>, Vec<Template>) = std::mem::take(&mut self.data.templates)
            .into_iter()
            .partition(|t| t.reference_id == id);
        self.data.templates = kept;

        self.commit(before, || {})?;
        remove_file_if_present(&path);
        Ok(dropped.into_iter().map(|t| t.id).collect())
    }

    // --- Videos ---

    /// Store encoded video bytes under a fresh id.
    pub fn add_video(
        &mut self,
        bytes: &[u8],
        extension: &str,
        description: Option<&str>,
    ) -> Result<VideoFile> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        if extension.is_empty()
            || extension.len() > 5
            || !extension.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(GreetError::InvalidName(format!("video extension '{}'", extension)));
        }
        if bytes.is_empty() {
            return Err(GreetError::Decode("empty video".into()));
        }

        let id = Uuid::new_v4().to_string();
        let file_name = format!("{}.{}", id, extension);
        let path = self.root.join(VIDEOS_DIR).join(&file_name);
        std::fs::write(&path, bytes)?;

        let video = VideoFile {
            id,
            file_name,
            description: description.map(str::to_string),
        };
        let before = self.data.clone();
        self.data.videos.push(video.clone());
        self.commit(before, || remove_file_if_present(&path))?;
        log::info!("Added video {}", video.id);
        Ok(video)
    }

    pub fn list_videos(&self) -> &[VideoFile] {
        &self.data.videos
    }

    pub fn video_path(&self, id: &str) -> Result<PathBuf> {
        self.data
            .videos
            .iter()
            .find(|v| v.id == id)
            .map(|v| self.root.join(VIDEOS_DIR).join(&v.file_name))
            .ok_or_else(|| GreetError::not_found("video", id))
    }

    /// Remove a video.
    ///
    /// Templates using it as the main video are deleted (their ids are
    /// returned); templates using it as intro or outro lose that link.
    pub fn delete_video(&mut self, id: &str) -> Result<Vec<String>> {
        let path = self.video_path(id)?;
        let before = self.data.clone();
        self.data.videos.retain(|v| v.id != id);

        let (dropped, mut kept): (Vec<Template>, Vec<Template>) =
            std::mem::take(&mut self.data.templates)
                .into_iter()
                .partition(|t| t.video_id == id);
        for template in kept.iter_mut() {
            if template.intro_id.as_deref() == Some(id) {
                template.intro_id = None;
            }
            if template.outro_id.as_deref() == Some(id) {
                template.outro_id = None;
            }
        }
        self.data.templates = kept;

        self.commit(before, || {})?;
        remove_file_if_present(&path);
        Ok(dropped.into_iter().map(|t| t.id).collect())
    }

    // --- Templates ---

    /// Create a template. Every referenced id must already exist.
    pub fn add_template(
        &mut self,
        video_id: &str,
        reference_id: &str,
        intro_id: Option<&str>,
        outro_id: Option<&str>,
        description: Option<&str>,
    ) -> Result<Template> {
        self.video_path(video_id)?;
        self.reference_path(reference_id)?;
        for id in intro_id.iter().chain(outro_id.iter()) {
            self.video_path(id)?;
        }

        let template = Template {
            id: Uuid::new_v4().to_string(),
            intro_id: intro_id.map(str::to_string),
            video_id: video_id.to_string(),
            outro_id: outro_id.map(str::to_string),
            reference_id: reference_id.to_string(),
            description: description.map(str::to_string),
        };
        let before = self.data.clone();
        self.data.templates.push(template.clone());
        self.commit(before, || {})?;
        log::info!("Added template {}", template.id);
        Ok(template)
    }

    pub fn get_template(&self, id: &str) -> Result<Template> {
        self.data
            .templates
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| GreetError::not_found("template", id))
    }

    pub fn list_templates(&self) -> &[Template] {
        &self.data.templates
    }
}

impl TemplateStore for Catalog {
    fn template(&self, id: &str) -> Result<Template> {
        self.get_template(id)
    }
}

impl BlobStore for Catalog {
    /// Bytes of the reference or video with this id.
    fn get(&self, id: &str) -> Result<Vec<u8>> {
        let path = self
            .reference_path(id)
            .or_else(|_| self.video_path(id))
            .map_err(|_| GreetError::not_found("media file", id))?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GreetError::not_found("media file", path.display().to_string()),
            _ => GreetError::Io(e),
        })
    }
}

fn remove_file_if_present(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}

/// Check a user-supplied reference file name.
///
/// Rejects path traversal and separators. Names without an extension get
/// `.wav`; any other extension is refused.
pub fn validate_reference_name(name: &str) -> Result<String> {
    let name = name.trim();
    let unsafe_name = name.is_empty()
        || name.contains("..")
        || name.starts_with('/')
        || name.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(GreetError::InvalidName(name.to_string()));
    }

    match Path::new(name).extension().and_then(|e| e.to_str()) {
        None => Ok(format!("{}.wav", name)),
        Some(ext) if ext.eq_ignore_ascii_case("wav") => {
            let stem = &name[..name.len() - ext.len()];
            Ok(format!("{}wav", stem))
        }
        Some(_) => Err(GreetError::InvalidName(format!("{} (only .wav is allowed)", name))),
    }
}
