pub mod detector;
pub mod engine;
pub mod mapper;
pub mod rten_engine;
pub mod runtime;

pub use detector::{
    DetectError, DetectOutcome, Detector, DetectorConfig, DetectorState, InferenceResize,
    SharedDetector,
};
pub use engine::{EngineFactory, InferenceEngine, LABELS_ASSET_NAME, MODEL_ASSET_NAME, ModelAsset};
pub use mapper::map_detections;
pub use rten_engine::{RtenEngine, RtenEngineFactory};
pub use runtime::{InferenceRuntime, RuntimeHandle};
