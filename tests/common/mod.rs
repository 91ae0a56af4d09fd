mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from snapdetect for tests
pub use snapdetect::detection::{
    DetectError, DetectOutcome, Detector, DetectorConfig, DetectorState, EngineFactory,
    InferenceEngine, InferenceResize, InferenceRuntime, ModelAsset, RuntimeHandle,
};
pub use snapdetect::models::{Category, DetectedObject, Detection, DetectionResult, Rect};
