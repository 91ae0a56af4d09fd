use std::sync::Arc;

use image::DynamicImage;
use tokio::sync::watch;
use tokio::task::JoinError;

use crate::core::{PhotoSource, SourceError};
use crate::detection::{DetectError, DetectOutcome, SharedDetector};
use crate::models::DetectionResult;
use crate::scaling;

/// Consumer side of the latest-result slot.
pub type ResultReceiver = watch::Receiver<Option<Arc<DetectionResult>>>;

/// Review step glue: display preparation plus off-thread detection.
///
/// Results land in a single-value slot; each publish replaces the previous
/// value whether or not it was read.
pub struct ReviewSession {
    detector: SharedDetector,
    display_max_dimension: u32,
    results: watch::Sender<Option<Arc<DetectionResult>>>,
}

impl ReviewSession {
    pub fn new(detector: SharedDetector, display_max_dimension: u32) -> (Self, ResultReceiver) {
        let (results, receiver) = watch::channel(None);
        (
            Self {
                detector,
                display_max_dimension,
                results,
            },
            receiver,
        )
    }

    /// Another handle on the result slot.
    pub fn subscribe(&self) -> ResultReceiver {
        self.results.subscribe()
    }

    /// The most recently published result.
    pub fn latest(&self) -> Option<Arc<DetectionResult>> {
        self.results.borrow().clone()
    }

    /// Load the photo from `source` on a blocking worker.
    pub async fn load(&self, source: PhotoSource) -> Result<DynamicImage, SourceError> {
        log::debug!("loading {}", source.describe());
        loaded_photo(tokio::task::spawn_blocking(move || source.load()).await)
    }

    /// Downscale for on-screen display.
    pub fn prepare_display(&self, image: DynamicImage) -> DynamicImage {
        scaling::resize_to_max_dimension(image, self.display_max_dimension)
    }

    /// Run detection off the caller's thread and publish a `Ready` result.
    ///
    /// `NotReady` and `Failed` are returned but not published; the slot keeps its last value.
    pub async fn submit(&self, image: DynamicImage) -> DetectOutcome {
        let detector = self.detector.clone();
        let joined = tokio::task::spawn_blocking(move || match detector.lock() {
            Ok(mut guard) => guard.detect(&image),
            Err(_) => DetectOutcome::Failed(DetectError::Inference(
                "detector lock poisoned".to_string(),
            )),
        })
        .await;

        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => DetectOutcome::Failed(DetectError::Inference(format!(
                "detection task failed: {}",
                e
            ))),
        };

        match &outcome {
            DetectOutcome::Ready(result) => {
                log::info!(
                    "publishing {} detections ({}x{})",
                    result.detections.len(),
                    result.image_width,
                    result.image_height
                );
                self.results.send_replace(Some(Arc::new(result.clone())));
            }
            DetectOutcome::NotReady => log::warn!("detector not ready; nothing published"),
            DetectOutcome::Failed(e) => log::warn!("detection failed: {}", e),
        }
        outcome
    }
}

/// A panicked or cancelled load is a task failure, never "no photo".
fn loaded_photo(
    joined: Result<Result<DynamicImage, SourceError>, JoinError>,
) -> Result<DynamicImage, SourceError> {
    match joined {
        Ok(loaded) => loaded,
        Err(e) => {
            log::error!("photo load task failed: {}", e);
            Err(SourceError::Task(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panicked_load_is_a_task_failure() {
        let joined = tokio::task::spawn_blocking(|| -> Result<DynamicImage, SourceError> {
            panic!("decoder crashed")
        })
        .await;

        let loaded = loaded_photo(joined);
        assert!(matches!(loaded, Err(SourceError::Task(_))));
    }

    #[tokio::test]
    async fn load_errors_pass_through() {
        let joined = tokio::task::spawn_blocking(|| {
            Err::<DynamicImage, _>(SourceError::NotFound("photo cache is empty".to_string()))
        })
        .await;

        assert!(matches!(loaded_photo(joined), Err(SourceError::NotFound(_))));
    }
}
