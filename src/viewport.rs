use std::sync::Arc;

use crate::models::{DetectedObject, DetectionResult, ImageSize, Rect};

/// Measured size of the display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::str::FromStr for ViewportSize {
    type Err = anyhow::Error;

    /// Parses `WIDTHxHEIGHT`, e.g. `1080x1920`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| anyhow::anyhow!("expected WIDTHxHEIGHT, got '{}'", s))?;
        Ok(Self {
            width: w.trim().parse()?,
            height: h.trim().parse()?,
        })
    }
}

/// Letterbox-fit mapping from image pixel space into a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl ViewportTransform {
    /// The all-zero transform produced for empty viewports or images.
    pub const DEGENERATE: ViewportTransform = ViewportTransform {
        scale_x: 0.0,
        scale_y: 0.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    /// Fit `image` inside `viewport` preserving aspect ratio, centred, letterboxed on one axis.
    pub fn compute(viewport: ViewportSize, image: ImageSize) -> Self {
        if viewport.is_empty() || image.width == 0 || image.height == 0 {
            return Self::DEGENERATE;
        }

        let viewport_width = viewport.width as f32;
        let viewport_height = viewport.height as f32;
        let image_aspect = image.width as f32 / image.height as f32;
        let viewport_aspect = viewport_width / viewport_height;

        let (fit_width, fit_height) = if image_aspect > viewport_aspect {
            // Relatively wider: bars above and below.
            (viewport_width, viewport_width / image_aspect)
        } else {
            (viewport_height * image_aspect, viewport_height)
        };

        Self {
            scale_x: fit_width / image.width as f32,
            scale_y: fit_height / image.height as f32,
            // max(0) absorbs float noise when the aspects match exactly.
            offset_x: ((viewport_width - fit_width) / 2.0).floor().max(0.0),
            offset_y: ((viewport_height - fit_height) / 2.0).floor().max(0.0),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.scale_x == 0.0 || self.scale_y == 0.0
    }

    /// Map image-space bounds into viewport space.
    pub fn project(&self, bounds: &Rect) -> Rect {
        Rect {
            left: self.offset_x + bounds.left * self.scale_x,
            top: self.offset_y + bounds.top * self.scale_y,
            right: self.offset_x + bounds.right * self.scale_x,
            bottom: self.offset_y + bounds.bottom * self.scale_y,
        }
    }

    /// Size the image occupies inside the viewport.
    pub fn fitted_size(&self, image: ImageSize) -> (f32, f32) {
        (
            image.width as f32 * self.scale_x,
            image.height as f32 * self.scale_y,
        )
    }
}

/// Free-function form of [`ViewportTransform::compute`].
pub fn compute_viewport_transform(viewport: ViewportSize, image: ImageSize) -> ViewportTransform {
    ViewportTransform::compute(viewport, image)
}

/// Free-function form of [`ViewportTransform::project`].
pub fn project(bounds: &Rect, transform: &ViewportTransform) -> Rect {
    transform.project(bounds)
}

/// A detected object placed in viewport coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
    pub category: String,
    pub screen_bounds: Rect,
}

/// Overlay bookkeeping: the transform waits until both a measured viewport
/// and a detection result are present, and is recomputed when either changes.
#[derive(Debug, Default)]
pub struct OverlayState {
    viewport: Option<ViewportSize>,
    result: Option<Arc<DetectionResult>>,
    objects: Vec<DetectedObject>,
    transform: Option<ViewportTransform>,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the viewport once the display surface has been measured.
    pub fn set_viewport(&mut self, viewport: ViewportSize) {
        if self.viewport == Some(viewport) {
            return;
        }
        self.viewport = Some(viewport);
        self.recompute();
    }

    /// Replace the current result. The previous one is discarded, never merged.
    pub fn apply_result(&mut self, result: Arc<DetectionResult>) {
        self.objects = result.objects();
        self.result = Some(result);
        self.recompute();
    }

    pub fn viewport(&self) -> Option<ViewportSize> {
        self.viewport
    }

    pub fn result(&self) -> Option<&Arc<DetectionResult>> {
        self.result.as_ref()
    }

    pub fn objects(&self) -> &[DetectedObject] {
        &self.objects
    }

    /// Current transform, if both inputs are known.
    pub fn transform(&self) -> Option<ViewportTransform> {
        self.transform
    }

    /// Boxes ready to draw, or `None` while waiting on inputs or when the transform is degenerate.
    pub fn boxes(&self) -> Option<Vec<OverlayBox>> {
        let transform = self.transform.filter(|t| !t.is_degenerate())?;
        Some(
            self.objects
                .iter()
                .map(|object| OverlayBox {
                    category: object.category.clone(),
                    screen_bounds: transform.project(&object.bounds),
                })
                .collect(),
        )
    }

    fn recompute(&mut self) {
        self.transform = match (self.viewport, self.result.as_ref()) {
            (Some(viewport), Some(result)) => {
                let transform = ViewportTransform::compute(viewport, result.image_size());
                if transform.is_degenerate() {
                    log::warn!(
                        "degenerate overlay transform for viewport {}x{} and image {}x{}",
                        viewport.width,
                        viewport.height,
                        result.image_width,
                        result.image_height
                    );
                }
                Some(transform)
            }
            _ => None,
        };
    }
}
