pub mod config;
pub mod core;
pub mod detection;
pub mod models;
pub mod overlay;
pub mod pipeline;
pub mod scaling;
pub mod viewport;

pub use config::AppConfig;
pub use core::{PhotoCache, PhotoSource, SourceSelection};
pub use detection::{DetectOutcome, Detector, DetectorConfig, InferenceRuntime};
pub use models::{Category, DetectedObject, Detection, DetectionResult, ImageSize, Rect};
pub use pipeline::ReviewSession;
pub use scaling::resize_to_max_dimension;
pub use viewport::{OverlayState, ViewportSize, ViewportTransform, compute_viewport_transform, project};
