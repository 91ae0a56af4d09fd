use std::path::PathBuf;

use image::{DynamicImage, ImageReader};
use thiserror::Error;
use url::Url;

use super::cache::PhotoCache;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no photo available: {0}")]
    NotFound(String),
    #[error("failed to read {reference}: {source}")]
    Unreadable {
        reference: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode photo: {0}")]
    Decode(#[from] image::ImageError),
    #[error("photo cache error: {0:#}")]
    Cache(anyhow::Error),
    #[error("photo load task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("missing required argument: {0}")]
    MissingRequiredArgument(&'static str),
}

/// Where a photo comes from. Each variant knows how to materialize it.
#[derive(Debug, Clone)]
pub enum PhotoSource {
    /// The photo handed over through the cache slot.
    CachedPhoto(PhotoCache),
    /// A filesystem path or `file://` URL.
    ExternalReference(String),
    /// Encoded image bytes already in memory.
    RawBytes(Vec<u8>),
}

impl PhotoSource {
    pub fn load(&self) -> Result<DynamicImage, SourceError> {
        match self {
            PhotoSource::CachedPhoto(cache) => cache
                .load()
                .map_err(SourceError::Cache)?
                .ok_or_else(|| SourceError::NotFound("photo cache is empty".to_string())),
            PhotoSource::ExternalReference(reference) => load_reference(reference),
            PhotoSource::RawBytes(bytes) => {
                if bytes.is_empty() {
                    return Err(SourceError::NotFound("empty byte buffer".to_string()));
                }
                Ok(image::load_from_memory(bytes)?)
            }
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            PhotoSource::CachedPhoto(cache) => format!("cached photo in {:?}", cache.root()),
            PhotoSource::ExternalReference(reference) => format!("reference {}", reference),
            PhotoSource::RawBytes(bytes) => format!("{} raw bytes", bytes.len()),
        }
    }
}

/// Resolve a reference string into a filesystem path.
fn reference_path(reference: &str) -> Result<PathBuf, SourceError> {
    if reference.trim().is_empty() {
        return Err(SourceError::NotFound("empty reference".to_string()));
    }
    match Url::parse(reference) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map_err(|_| SourceError::NotFound(format!("invalid file URL {}", reference))),
        // Single letters are Windows drive prefixes, not schemes.
        Ok(url) if url.scheme().len() > 1 => Err(SourceError::NotFound(format!(
            "unsupported reference scheme '{}'",
            url.scheme()
        ))),
        _ => Ok(PathBuf::from(reference)),
    }
}

fn load_reference(reference: &str) -> Result<DynamicImage, SourceError> {
    let path = reference_path(reference)?;
    if !path.is_file() {
        return Err(SourceError::NotFound(format!("{:?} does not exist", path)));
    }
    let reader = ImageReader::open(&path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|source| SourceError::Unreadable {
            reference: reference.to_string(),
            source,
        })?;
    Ok(reader.decode()?)
}

/// Arguments choosing a photo source, as passed to the review step.
#[derive(Debug, Clone, Default)]
pub struct SourceSelection {
    pub taken_photo: Option<bool>,
    pub external_reference: Option<String>,
    pub raw_bytes: Option<Vec<u8>>,
}

impl SourceSelection {
    pub fn taken_photo() -> Self {
        Self {
            taken_photo: Some(true),
            ..Self::default()
        }
    }

    pub fn reference(reference: impl Into<String>) -> Self {
        Self {
            taken_photo: Some(false),
            external_reference: Some(reference.into()),
            ..Self::default()
        }
    }

    pub fn bytes(bytes: Vec<u8>) -> Self {
        Self {
            raw_bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// Pick the source. Fails immediately when the selection is incomplete.
    pub fn resolve(self, cache: &PhotoCache) -> Result<PhotoSource, SelectionError> {
        if let Some(bytes) = self.raw_bytes {
            return Ok(PhotoSource::RawBytes(bytes));
        }
        match self.taken_photo {
            None => Err(SelectionError::MissingRequiredArgument("taken_photo")),
            Some(true) => Ok(PhotoSource::CachedPhoto(cache.clone())),
            Some(false) => match self.external_reference {
                Some(reference) if !reference.trim().is_empty() => {
                    Ok(PhotoSource::ExternalReference(reference))
                }
                _ => Err(SelectionError::MissingRequiredArgument("external_reference")),
            },
        }
    }
}
