use crate::models::{DetectedObject, DetectionResult};

/// Convert raw detections into domain objects.
///
/// Order is the engine's order and each object takes the first (top-ranked)
/// category as-is; nothing is re-sorted. Detections without any category are dropped.
pub fn map_detections(result: &DetectionResult) -> Vec<DetectedObject> {
    result
        .detections
        .iter()
        .filter_map(|detection| {
            let Some(top) = detection.categories.first() else {
                log::warn!("dropping detection without categories");
                return None;
            };
            Some(DetectedObject {
                category: top.label.clone(),
                bounds: detection.bounding_box,
            })
        })
        .collect()
}
