mod common;

use common::*;
use snapdetect::detection::map_detections;

fn result_of(detections: Vec<Detection>) -> DetectionResult {
    DetectionResult {
        detections,
        image_width: 800,
        image_height: 600,
    }
}

#[test]
fn test_order_is_preserved() {
    let result = result_of(vec![
        detection(&[("dog", 0.5)], Rect::new(0.0, 0.0, 10.0, 10.0)),
        detection(&[("cat", 0.9)], Rect::new(20.0, 20.0, 40.0, 40.0)),
        detection(&[("bird", 0.7)], Rect::new(5.0, 5.0, 6.0, 6.0)),
    ]);

    let objects = map_detections(&result);
    let labels: Vec<&str> = objects.iter().map(|o| o.category.as_str()).collect();
    assert_eq!(labels, vec!["dog", "cat", "bird"]);
    assert_eq!(objects[1].bounds, Rect::new(20.0, 20.0, 40.0, 40.0));
}

#[test]
fn test_first_category_wins() {
    // The lower-scored first entry is still the one taken
    let result = result_of(vec![detection(
        &[("cup", 0.45), ("bowl", 0.8)],
        Rect::new(1.0, 2.0, 3.0, 4.0),
    )]);

    let objects = map_detections(&result);
    assert_eq!(
        objects,
        vec![DetectedObject {
            category: "cup".to_string(),
            bounds: Rect::new(1.0, 2.0, 3.0, 4.0),
        }]
    );
}

#[test]
fn test_detections_without_categories_are_dropped() {
    let result = result_of(vec![
        detection(&[], Rect::new(0.0, 0.0, 1.0, 1.0)),
        detection(&[("person", 0.6)], Rect::new(2.0, 2.0, 3.0, 3.0)),
    ]);

    let objects = map_detections(&result);
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].category, "person");
}

#[test]
fn test_empty_result_maps_to_nothing() {
    assert!(map_detections(&result_of(Vec::new())).is_empty());
    assert!(result_of(Vec::new()).objects().is_empty());
}
