/// Axis-aligned box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Clamp all edges into `[0, width] x [0, height]`.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let w = width as f32;
        let h = height as f32;
        Self {
            left: self.left.clamp(0.0, w),
            top: self.top.clamp(0.0, h),
            right: self.right.clamp(0.0, w),
            bottom: self.bottom.clamp(0.0, h),
        }
    }

    pub fn is_within(&self, width: u32, height: u32) -> bool {
        let w = width as f32;
        let h = height as f32;
        self.left >= 0.0
            && self.top >= 0.0
            && self.right <= w
            && self.bottom <= h
    }
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &image::DynamicImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

/// One label candidate for a detection, as ranked by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub label: String,
    pub score: f32,
    pub index: usize,
}

/// Raw engine output for a single box. Categories arrive sorted by score, highest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bounding_box: Rect,
    pub categories: Vec<Category>,
}

/// Domain object handed to the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedObject {
    pub category: String,
    pub bounds: Rect,
}

/// Output of one detect call.
///
/// `image_width`/`image_height` are the dimensions of the bitmap the engine
/// actually processed (after any inference-side resize), never the capture size.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    pub image_width: u32,
    pub image_height: u32,
}

impl DetectionResult {
    pub fn image_size(&self) -> ImageSize {
        ImageSize::new(self.image_width, self.image_height)
    }

    /// Domain objects in engine order.
    pub fn objects(&self) -> Vec<DetectedObject> {
        crate::detection::map_detections(self)
    }
}
