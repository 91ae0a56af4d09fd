//! Rendering of boxes onto a letterboxed viewport canvas.

mod common;

use common::*;
use image::{DynamicImage, Rgb, RgbImage, Rgba};
use snapdetect::models::ImageSize;
use snapdetect::overlay::{LabelFont, render_overlay};
use snapdetect::viewport::{OverlayBox, ViewportSize, ViewportTransform};

const BOX_COLOR: Rgba<u8> = Rgba([204, 204, 204, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn white_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
}

#[test]
fn test_letterboxed_canvas() {
    let viewport = ViewportSize::new(100, 200);
    let size = ImageSize::new(100, 50);
    let canvas = render_overlay(&white_image(100, 50), size, viewport, &[], None);

    assert_eq!(canvas.dimensions(), (100, 200));
    // Bars above and below, photo in the middle band [75, 125)
    assert_eq!(*canvas.get_pixel(50, 10), BLACK);
    assert_eq!(*canvas.get_pixel(50, 190), BLACK);
    assert_eq!(*canvas.get_pixel(50, 100), WHITE);
}

#[test]
fn test_boxes_are_stroked_in_viewport_space() {
    let viewport = ViewportSize::new(100, 200);
    let size = ImageSize::new(100, 50);
    let transform = ViewportTransform::compute(viewport, size);
    let boxes = vec![OverlayBox {
        category: String::new(),
        screen_bounds: transform.project(&Rect::new(10.0, 10.0, 40.0, 40.0)),
    }];
    assert_rect_approx(&boxes[0].screen_bounds, &Rect::new(10.0, 85.0, 40.0, 115.0));

    let canvas = render_overlay(&white_image(100, 50), size, viewport, &boxes, None);

    assert_eq!(*canvas.get_pixel(39, 100), BOX_COLOR);
    assert_eq!(*canvas.get_pixel(25, 100), WHITE);
    assert_eq!(*canvas.get_pixel(70, 100), WHITE);
}

#[test]
fn test_label_tab_without_font_is_drawn_at_box_corner() {
    let viewport = ViewportSize::new(200, 100);
    let size = ImageSize::new(200, 100);
    let boxes = vec![OverlayBox {
        category: "cat".to_string(),
        screen_bounds: Rect::new(50.0, 20.0, 150.0, 90.0),
    }];

    let canvas = render_overlay(&white_image(200, 100), size, viewport, &boxes, None);

    // Tab covers the corner, past the stroke
    assert_eq!(*canvas.get_pixel(60, 35), BLACK);
    assert_eq!(*canvas.get_pixel(100, 60), WHITE);
}

#[test]
fn test_degenerate_viewport_renders_blank() {
    let canvas = render_overlay(
        &white_image(10, 10),
        ImageSize::new(0, 0),
        ViewportSize::new(20, 20),
        &[],
        None,
    );
    assert_eq!(canvas.dimensions(), (20, 20));
    assert!(canvas.pixels().all(|p| *p == BLACK));
}

#[test]
fn test_label_text_is_drawn_in_tab() {
    let Some(font) = label_font() else {
        eprintln!("no system font found; skipping label text rendering");
        return;
    };
    let viewport = ViewportSize::new(400, 200);
    let size = ImageSize::new(400, 200);
    let boxes = vec![OverlayBox {
        category: "cat".to_string(),
        screen_bounds: Rect::new(50.0, 20.0, 350.0, 190.0),
    }];

    let canvas = render_overlay(&white_image(400, 200), size, viewport, &boxes, Some(&font));

    // Tab is sized from the measured text plus 8px padding
    let (text_width, text_height) = font.measure("cat");
    assert!(text_width > 0 && text_height > 0);
    let tab_right = 50 + text_width + 8;
    let tab_bottom = 20 + text_height + 8;
    assert_eq!(*canvas.get_pixel(51, 21), BLACK);
    assert_eq!(*canvas.get_pixel(tab_right - 1, 21), BLACK);

    // Anti-aliased glyphs; anything near white inside the black tab is text
    let white_in_tab = (20..tab_bottom)
        .flat_map(|y| (50..tab_right).map(move |x| (x, y)))
        .filter(|&(x, y)| canvas.get_pixel(x, y).0[..3].iter().all(|&c| c > 230))
        .count();
    assert!(white_in_tab > 0, "label text missing from tab");

    // An empty label leaves the tab plain black
    let plain = vec![OverlayBox {
        category: String::new(),
        ..boxes[0].clone()
    }];
    let canvas = render_overlay(&white_image(400, 200), size, viewport, &plain, Some(&font));
    assert_eq!(*canvas.get_pixel(54, 24), BLACK);
}

#[test]
fn test_label_font_rejects_invalid_data() {
    assert!(LabelFont::from_bytes(b"not a font".to_vec()).is_err());
    assert!(LabelFont::load("/nonexistent/label_font.ttf").is_err());
}
