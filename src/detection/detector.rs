use std::sync::{Arc, Mutex};

use image::DynamicImage;
use thiserror::Error;

use super::engine::{EngineFactory, InferenceEngine, ModelAsset};
use super::runtime::InferenceRuntime;
use crate::models::DetectionResult;
use crate::scaling;

/// Whether, and how far, images are downscaled before inference.
///
/// Changing this changes the pixel space of every returned box and the
/// dimensions reported in [`DetectionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceResize {
    Disabled,
    MaxDimension(u32),
}

impl Default for InferenceResize {
    fn default() -> Self {
        InferenceResize::MaxDimension(800)
    }
}

/// Detector configuration, fixed for the lifetime of a [`Detector`].
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub score_threshold: f32,
    pub max_results: usize,
    pub num_threads: usize,
    pub inference_resize: InferenceResize,
    /// Square input edge the model expects.
    pub model_input_size: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.4,
            max_results: 5,
            num_threads: 2,
            inference_resize: InferenceResize::default(),
            model_input_size: 320,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// No engine yet (never built, last build failed, or reset).
    Uninitialized,
    Ready,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetectError {
    #[error("failed to construct inference engine: {0}")]
    EngineConstruction(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Result of one [`Detector::detect`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectOutcome {
    Ready(DetectionResult),
    /// The inference runtime has not been initialized.
    NotReady,
    Failed(DetectError),
}

impl DetectOutcome {
    /// Collapse to "result or nothing", discarding the failure cause.
    pub fn into_option(self) -> Option<DetectionResult> {
        match self {
            DetectOutcome::Ready(result) => Some(result),
            DetectOutcome::NotReady | DetectOutcome::Failed(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, DetectOutcome::Ready(_))
    }
}

/// Detector guarded for use from several tasks; the mutex serializes `detect`.
pub type SharedDetector = Arc<Mutex<Detector>>;

/// Owns the inference engine and its configuration.
///
/// `detect` takes `&mut self`: a single caller at a time. Wrap in
/// [`SharedDetector`] to share across threads.
pub struct Detector {
    config: DetectorConfig,
    asset: ModelAsset,
    runtime: Arc<InferenceRuntime>,
    factory: Box<dyn EngineFactory>,
    engine: Option<Box<dyn InferenceEngine>>,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("config", &self.config)
            .field("asset", &self.asset)
            .field("state", &self.state())
            .finish()
    }
}

impl Detector {
    pub fn new(
        config: DetectorConfig,
        asset: ModelAsset,
        runtime: Arc<InferenceRuntime>,
        factory: Box<dyn EngineFactory>,
    ) -> Self {
        Self {
            config,
            asset,
            runtime,
            factory,
            engine: None,
        }
    }

    pub fn into_shared(self) -> SharedDetector {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn state(&self) -> DetectorState {
        if self.engine.is_some() {
            DetectorState::Ready
        } else {
            DetectorState::Uninitialized
        }
    }

    /// Drop the engine; the next `detect` rebuilds it.
    pub fn reset(&mut self) {
        if self.engine.take().is_some() {
            log::debug!("detector reset; engine will be rebuilt on next detect");
        }
    }

    /// Run detection on `image`. Blocking; call it off any latency-sensitive thread.
    pub fn detect(&mut self, image: &DynamicImage) -> DetectOutcome {
        let Some(runtime) = self.runtime.handle() else {
            log::warn!("detect called before the inference runtime was initialized");
            return DetectOutcome::NotReady;
        };

        if self.engine.is_none() {
            match self.factory.build(&self.asset, &self.config, &runtime) {
                Ok(engine) => {
                    log::info!(
                        "inference engine ready (threshold {}, max results {}, threads {})",
                        self.config.score_threshold,
                        self.config.max_results,
                        self.config.num_threads
                    );
                    self.engine = Some(engine);
                }
                Err(e) => {
                    log::error!("failed to load model from {:?}: {:#}", self.asset.dir(), e);
                    return DetectOutcome::Failed(DetectError::EngineConstruction(format!(
                        "{:#}",
                        e
                    )));
                }
            }
        }

        let input = match self.config.inference_resize {
            InferenceResize::Disabled => image.to_rgb8(),
            InferenceResize::MaxDimension(bound) => match scaling::downscaled(image, bound) {
                Some(resized) => resized.to_rgb8(),
                None => image.to_rgb8(),
            },
        };
        let (image_width, image_height) = input.dimensions();

        let Some(engine) = self.engine.as_mut() else {
            return DetectOutcome::Failed(DetectError::EngineConstruction(
                "engine missing after construction".to_string(),
            ));
        };

        match engine.detect(&input) {
            Ok(detections) => {
                log::debug!(
                    "{} detections on {}x{} input",
                    detections.len(),
                    image_width,
                    image_height
                );
                DetectOutcome::Ready(DetectionResult {
                    detections,
                    image_width,
                    image_height,
                })
            }
            Err(e) => {
                log::error!("inference failed: {:#}", e);
                DetectOutcome::Failed(DetectError::Inference(format!("{:#}", e)))
            }
        }
    }
}
