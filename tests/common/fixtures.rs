use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use snapdetect::detection::{
    Detector, DetectorConfig, EngineFactory, InferenceEngine, InferenceRuntime, ModelAsset,
    RuntimeHandle,
};
use snapdetect::models::{Category, Detection, Rect};
use snapdetect::overlay::LabelFont;
use tempfile::NamedTempFile;

/// Deterministic RGB pattern so round-trips can be compared pixel by pixel.
pub fn pattern_image(width: u32, height: u32) -> DynamicImage {
    let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x * 7 + y * 13) % 256) as u8])
    });
    DynamicImage::ImageRgb8(img)
}

/// Writes a PNG test image to a temp file. The file is removed when dropped.
pub fn create_test_image(width: u32, height: u32) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    pattern_image(width, height)
        .save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// PNG-encoded bytes of a pattern image.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    pattern_image(width, height)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("Failed to encode test image");
    out.into_inner()
}

pub fn detection(categories: &[(&str, f32)], bounds: Rect) -> Detection {
    Detection {
        bounding_box: bounds,
        categories: categories
            .iter()
            .enumerate()
            .map(|(index, (label, score))| Category {
                label: label.to_string(),
                score: *score,
                index,
            })
            .collect(),
    }
}

pub fn ready_runtime() -> Arc<InferenceRuntime> {
    let runtime = Arc::new(InferenceRuntime::new());
    runtime.initialize();
    runtime
}

/// Counters shared between a test and the fake engines it hands out.
#[derive(Debug, Default, Clone)]
pub struct EngineProbe {
    pub builds: Arc<AtomicUsize>,
    pub runs: Arc<AtomicUsize>,
    pub seen_sizes: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl EngineProbe {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn last_size(&self) -> Option<(u32, u32)> {
        self.seen_sizes.lock().unwrap().last().copied()
    }
}

/// Factory that fails its first `failures` builds, then returns engines
/// replaying `detections` (or failing every run when `fail_runs` is set).
pub struct ScriptedFactory {
    pub probe: EngineProbe,
    pub failures: AtomicUsize,
    pub detections: Vec<Detection>,
    pub fail_runs: bool,
}

impl ScriptedFactory {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            probe: EngineProbe::default(),
            failures: AtomicUsize::new(0),
            detections,
            fail_runs: false,
        }
    }

    pub fn failing_first(mut self, failures: usize) -> Self {
        self.failures = AtomicUsize::new(failures);
        self
    }

    pub fn failing_runs(mut self) -> Self {
        self.fail_runs = true;
        self
    }
}

impl EngineFactory for ScriptedFactory {
    fn build(
        &self,
        _asset: &ModelAsset,
        _config: &DetectorConfig,
        _runtime: &RuntimeHandle,
    ) -> anyhow::Result<Box<dyn InferenceEngine>> {
        self.probe.builds.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("model asset unavailable");
        }
        Ok(Box::new(ScriptedEngine {
            probe: self.probe.clone(),
            detections: self.detections.clone(),
            fail_runs: self.fail_runs,
        }))
    }
}

struct ScriptedEngine {
    probe: EngineProbe,
    detections: Vec<Detection>,
    fail_runs: bool,
}

impl InferenceEngine for ScriptedEngine {
    fn detect(&mut self, image: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        self.probe.runs.fetch_add(1, Ordering::SeqCst);
        self.probe
            .seen_sizes
            .lock()
            .unwrap()
            .push(image.dimensions());
        if self.fail_runs {
            anyhow::bail!("tensor shape mismatch");
        }
        Ok(self.detections.clone())
    }
}

/// Detector over a scripted factory; returns the probe for assertions.
pub fn scripted_detector(
    config: DetectorConfig,
    runtime: Arc<InferenceRuntime>,
    factory: ScriptedFactory,
) -> (Detector, EngineProbe) {
    let probe = factory.probe.clone();
    let detector = Detector::new(
        config,
        ModelAsset::new("assets"),
        runtime,
        Box::new(factory),
    );
    (detector, probe)
}

pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

pub fn assert_rect_approx(actual: &Rect, expected: &Rect) {
    assert!(
        approx_eq(actual.left, expected.left)
            && approx_eq(actual.top, expected.top)
            && approx_eq(actual.right, expected.right)
            && approx_eq(actual.bottom, expected.bottom),
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}

/// A system TrueType font for label rendering, if one is installed.
pub fn label_font() -> Option<LabelFont> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ]
    .iter()
    .find_map(|path| LabelFont::load(path).ok())
}
