use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use image::{DynamicImage, ImageFormat, ImageReader};
use uuid::Uuid;

const MEDIA_DIR_NAME: &str = "media";
const SLOT_FILE_NAME: &str = "taken_photo.png";

/// Where the slot lives and whether it currently holds a photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPhotoSlot {
    pub path: PathBuf,
    pub present: bool,
}

/// Writable target handed to a capture collaborator.
///
/// The slot is already empty when the handle is created; whatever gets written
/// through it becomes the cached photo.
#[derive(Debug)]
pub struct SlotHandle {
    path: PathBuf,
}

impl SlotHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write already-encoded image bytes into the slot.
    pub fn write_bytes(&self, bytes: &[u8]) -> anyhow::Result<()> {
        let mut file = File::create(&self.path)
            .with_context(|| format!("Failed to create cached photo {:?}", self.path))?;
        file.write_all(bytes)
            .with_context(|| format!("Failed to write cached photo {:?}", self.path))?;
        Ok(())
    }
}

/// Single-slot photo store under `<root>/media/taken_photo.png`.
///
/// Not synchronized: one producer and one consumer, sequenced by the caller.
#[derive(Debug, Clone)]
pub struct PhotoCache {
    root: PathBuf,
}

impl PhotoCache {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn media_dir(&self) -> PathBuf {
        self.root.join(MEDIA_DIR_NAME)
    }

    fn slot_path(&self) -> PathBuf {
        self.media_dir().join(SLOT_FILE_NAME)
    }

    /// Create the media directory on first access.
    fn ensure_media_dir(&self) -> anyhow::Result<PathBuf> {
        let media_dir = self.media_dir();
        if !media_dir.is_dir() {
            fs::create_dir_all(&media_dir)
                .with_context(|| format!("Failed to create cache directory {:?}", media_dir))?;
            log::debug!("created cache directory {:?}", media_dir);
        }
        Ok(media_dir)
    }

    fn remove_slot_if_exists(&self) -> anyhow::Result<()> {
        let slot_path = self.slot_path();
        match fs::remove_file(&slot_path) {
            Ok(()) => {
                log::debug!("removed previous cached photo {:?}", slot_path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove cached photo {:?}", slot_path)),
        }
    }

    pub fn slot(&self) -> anyhow::Result<CachedPhotoSlot> {
        self.ensure_media_dir()?;
        let path = self.slot_path();
        let present = path.is_file();
        Ok(CachedPhotoSlot { path, present })
    }

    /// Decode the cached photo, or `None` when the slot is empty.
    pub fn load(&self) -> anyhow::Result<Option<DynamicImage>> {
        self.ensure_media_dir()?;
        let slot_path = self.slot_path();
        if !slot_path.is_file() {
            return Ok(None);
        }
        let image = ImageReader::open(&slot_path)
            .with_context(|| format!("Failed to open cached photo {:?}", slot_path))?
            .with_guessed_format()
            .with_context(|| format!("Failed to read cached photo {:?}", slot_path))?
            .decode()
            .with_context(|| format!("Failed to decode cached photo {:?}", slot_path))?;
        Ok(Some(image))
    }

    /// Clear the slot and hand out a target for a capture to write into.
    pub fn reserve_writable_slot(&self) -> anyhow::Result<SlotHandle> {
        self.ensure_media_dir()?;
        self.remove_slot_if_exists()?;
        Ok(SlotHandle {
            path: self.slot_path(),
        })
    }

    /// Replace the cached photo with `image`, PNG-encoded.
    ///
    /// The bytes go to a uniquely named sibling first and are renamed into
    /// place, so a reader sees either no photo or the complete new one.
    pub fn save(&self, image: &DynamicImage) -> anyhow::Result<()> {
        let media_dir = self.ensure_media_dir()?;

        let mut encoded = Cursor::new(Vec::new());
        image
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(|e| anyhow::anyhow!("Failed to encode photo: {}", e))?;

        self.remove_slot_if_exists()?;

        let staging_path = media_dir.join(format!("{}.tmp", Uuid::new_v4()));
        fs::write(&staging_path, encoded.get_ref())
            .with_context(|| format!("Failed to write staging photo {:?}", staging_path))?;
        let slot_path = self.slot_path();
        if let Err(e) = fs::rename(&staging_path, &slot_path) {
            let _ = fs::remove_file(&staging_path);
            return Err(e).with_context(|| {
                format!("Failed to move {:?} into {:?}", staging_path, slot_path)
            });
        }

        log::info!(
            "cached {}x{} photo at {:?}",
            image.width(),
            image.height(),
            slot_path
        );
        Ok(())
    }
}
