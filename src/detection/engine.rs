use std::path::{Path, PathBuf};

use anyhow::Result;
use image::RgbImage;

use super::detector::DetectorConfig;
use super::runtime::RuntimeHandle;
use crate::models::Detection;

/// Fixed file name of the bundled detection model.
pub const MODEL_ASSET_NAME: &str = "detection_model.rten";
/// Label map shipped next to the model, one label per line.
pub const LABELS_ASSET_NAME: &str = "labels.txt";

/// Location of the bundled model asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAsset {
    dir: PathBuf,
}

impl ModelAsset {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_ASSET_NAME)
    }

    pub fn labels_path(&self) -> PathBuf {
        self.dir.join(LABELS_ASSET_NAME)
    }

    /// Read the label map. A missing file yields an empty map; labels then fall back to class ids.
    pub fn load_labels(&self) -> Result<Vec<String>> {
        let path = self.labels_path();
        if !path.is_file() {
            log::warn!("no label map at {:?}; using numeric class ids", path);
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read label map {}: {}", path.display(), e))?;
        Ok(raw.lines().map(|line| line.trim().to_string()).collect())
    }
}

/// A constructed inference engine.
///
/// Implementations own score filtering, ranking and truncation: the returned
/// detections are already ordered by confidence, each with categories sorted
/// highest first, at most `max_results` long, and in the pixel space of `image`.
pub trait InferenceEngine: Send {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>>;
}

/// Builds engines from the model asset.
///
/// Called lazily by the detector; a failed build is not remembered.
pub trait EngineFactory: Send {
    fn build(
        &self,
        asset: &ModelAsset,
        config: &DetectorConfig,
        runtime: &RuntimeHandle,
    ) -> Result<Box<dyn InferenceEngine>>;
}
