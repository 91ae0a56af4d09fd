use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::Context;
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect as PixelRect;

use crate::models::{ImageSize, Rect};
use crate::viewport::{OverlayBox, ViewportSize, ViewportTransform};

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
const BOX_COLOR: Rgba<u8> = Rgba([204, 204, 204, 255]);
const LABEL_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
const LABEL_TEXT: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BOX_STROKE: i32 = 8;
const LABEL_TEXT_SCALE: f32 = 50.0;
const LABEL_TAB_PADDING: u32 = 8;
/// Tab size used when no font is available to measure the label.
const FALLBACK_TAB_HEIGHT: u32 = 24;
const FALLBACK_CHAR_WIDTH: u32 = 14;

/// TrueType/OpenType font used for category labels.
#[derive(Clone)]
pub struct LabelFont {
    font: FontArc,
}

impl LabelFont {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read label font {:?}", path))?;
        Self::from_bytes(data).with_context(|| format!("Invalid label font {:?}", path))
    }

    pub fn from_bytes(data: Vec<u8>) -> anyhow::Result<Self> {
        let font = FontArc::try_from_vec(data).map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(Self { font })
    }

    /// Pixel extent of `label` at the overlay text scale.
    pub fn measure(&self, label: &str) -> (u32, u32) {
        text_size(PxScale::from(LABEL_TEXT_SCALE), &self.font, label)
    }
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LabelFont")
    }
}

/// Render `display` letterboxed into a viewport-sized canvas and draw `boxes` on top.
///
/// `detection_size` is the pixel space the boxes' source result was computed in;
/// the transform comes from it, not from `display`, which may be a different size.
/// Without a `font` the label tabs are drawn empty.
pub fn render_overlay(
    display: &DynamicImage,
    detection_size: ImageSize,
    viewport: ViewportSize,
    boxes: &[OverlayBox],
    font: Option<&LabelFont>,
) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(viewport.width, viewport.height, BACKGROUND);
    let transform = ViewportTransform::compute(viewport, detection_size);
    if transform.is_degenerate() {
        log::warn!("skipping overlay render: degenerate transform");
        return canvas;
    }

    let (fit_width, fit_height) = transform.fitted_size(detection_size);
    let fit_width = (fit_width.round() as u32).clamp(1, viewport.width);
    let fit_height = (fit_height.round() as u32).clamp(1, viewport.height);
    let fitted = display
        .resize_exact(fit_width, fit_height, FilterType::Triangle)
        .to_rgba8();
    image::imageops::overlay(
        &mut canvas,
        &fitted,
        transform.offset_x as i64,
        transform.offset_y as i64,
    );

    for overlay_box in boxes {
        draw_box(&mut canvas, &overlay_box.screen_bounds);
        draw_label_tab(&mut canvas, &overlay_box.screen_bounds, &overlay_box.category, font);
    }
    canvas
}

fn pixel_rect(left: i32, top: i32, right: i32, bottom: i32) -> Option<PixelRect> {
    let width = right - left;
    let height = bottom - top;
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(PixelRect::at(left, top).of_size(width as u32, height as u32))
}

/// Stroke centred on the box edges.
fn draw_box(canvas: &mut RgbaImage, bounds: &Rect) {
    let left = bounds.left.round() as i32;
    let top = bounds.top.round() as i32;
    let right = bounds.right.round() as i32;
    let bottom = bounds.bottom.round() as i32;
    let half = BOX_STROKE / 2;
    for inset in -half..(BOX_STROKE - half) {
        if let Some(rect) = pixel_rect(left + inset, top + inset, right - inset, bottom - inset) {
            draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
        }
    }
}

fn draw_label_tab(canvas: &mut RgbaImage, bounds: &Rect, label: &str, font: Option<&LabelFont>) {
    let (text_width, text_height) = match font {
        Some(font) => font.measure(label),
        None => (
            label.chars().count() as u32 * FALLBACK_CHAR_WIDTH,
            FALLBACK_TAB_HEIGHT,
        ),
    };
    let left = bounds.left.round() as i32;
    let top = bounds.top.round() as i32;
    if let Some(rect) = pixel_rect(
        left,
        top,
        left + (text_width + LABEL_TAB_PADDING) as i32,
        top + (text_height + LABEL_TAB_PADDING) as i32,
    ) {
        draw_filled_rect_mut(canvas, rect, LABEL_BACKGROUND);
    }

    if let Some(font) = font {
        let inset = (LABEL_TAB_PADDING / 2) as i32;
        draw_text_mut(
            canvas,
            LABEL_TEXT,
            left + inset,
            top + inset,
            PxScale::from(LABEL_TEXT_SCALE),
            &font.font,
            label,
        );
    }
}
