use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use serde::Deserialize;

use crate::detection::{DetectorConfig, InferenceResize};

const DEFAULT_SCORE_THRESHOLD: f32 = 0.4;
const DEFAULT_MAX_RESULTS: usize = 5;
const DEFAULT_NUM_THREADS: usize = 2;
const DEFAULT_INFERENCE_MAX_DIMENSION: u32 = 800;
const DEFAULT_DISPLAY_MAX_DIMENSION: u32 = 1000;
const DEFAULT_MODEL_INPUT_SIZE: u32 = 320;
const CACHE_DIR_NAME: &str = ".cache/snapdetect";
const MODELS_DIR_NAME: &str = "models";
const LABEL_FONT_NAME: &str = "label_font.ttf";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    assets_dir: Option<PathBuf>,
    cache_root: Option<PathBuf>,
    detector: Option<DetectorConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    score_threshold: Option<f32>,
    max_results: Option<usize>,
    num_threads: Option<usize>,
    /// `0` disables the inference-side resize.
    inference_max_dimension: Option<u32>,
    model_input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DisplayConfigFile {
    max_dimension: Option<u32>,
    label_font: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the bundled model and label map.
    pub assets_dir: PathBuf,
    /// Root of the photo cache.
    pub cache_root: PathBuf,
    pub detector: DetectorConfig,
    pub display_max_dimension: u32,
    /// Font for overlay labels; `None` means `label_font.ttf` in the assets dir.
    pub label_font: Option<PathBuf>,
}

impl AppConfig {
    /// Defaults, then the file at `path` (or `SNAPDETECT_CONFIG`), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("SNAPDETECT_CONFIG").ok().map(PathBuf::from);
        let file_cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => read_config_file(&path)?,
            None => ConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document on top of the defaults. No environment lookups.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(raw).map_err(|e| anyhow!("invalid config: {}", e))?;
        let cfg = Self::from_file(file);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConfigFile) -> Self {
        let cache_root = file.cache_root.unwrap_or_else(default_cache_root);
        let assets_dir = file
            .assets_dir
            .unwrap_or_else(|| default_cache_root().join(MODELS_DIR_NAME));
        let detector_file = file.detector.unwrap_or_default();
        let inference_resize = match detector_file
            .inference_max_dimension
            .unwrap_or(DEFAULT_INFERENCE_MAX_DIMENSION)
        {
            0 => InferenceResize::Disabled,
            bound => InferenceResize::MaxDimension(bound),
        };
        let detector = DetectorConfig {
            score_threshold: detector_file
                .score_threshold
                .unwrap_or(DEFAULT_SCORE_THRESHOLD),
            max_results: detector_file.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
            num_threads: detector_file.num_threads.unwrap_or(DEFAULT_NUM_THREADS),
            inference_resize,
            model_input_size: detector_file
                .model_input_size
                .unwrap_or(DEFAULT_MODEL_INPUT_SIZE),
        };
        let display_file = file.display.unwrap_or_default();
        let display_max_dimension = display_file
            .max_dimension
            .unwrap_or(DEFAULT_DISPLAY_MAX_DIMENSION);

        Self {
            assets_dir,
            cache_root,
            detector,
            display_max_dimension,
            label_font: display_file.label_font,
        }
    }

    pub fn label_font_path(&self) -> PathBuf {
        self.label_font
            .clone()
            .unwrap_or_else(|| self.assets_dir.join(LABEL_FONT_NAME))
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("SNAPDETECT_ASSETS_DIR") {
            if !dir.trim().is_empty() {
                self.assets_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("SNAPDETECT_CACHE_DIR") {
            if !dir.trim().is_empty() {
                self.cache_root = PathBuf::from(dir);
            }
        }
        if let Ok(value) = std::env::var("SNAPDETECT_SCORE_THRESHOLD") {
            self.detector.score_threshold = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("SNAPDETECT_SCORE_THRESHOLD must be a number"))?;
        }
        if let Ok(value) = std::env::var("SNAPDETECT_MAX_RESULTS") {
            self.detector.max_results = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("SNAPDETECT_MAX_RESULTS must be a positive integer"))?;
        }
        if let Ok(value) = std::env::var("SNAPDETECT_NUM_THREADS") {
            self.detector.num_threads = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("SNAPDETECT_NUM_THREADS must be a positive integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let threshold = self.detector.score_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!(
                "score_threshold must be within [0, 1], got {}",
                threshold
            ));
        }
        if self.detector.max_results == 0 {
            return Err(anyhow!("max_results must be greater than zero"));
        }
        if self.detector.num_threads == 0 {
            return Err(anyhow!("num_threads must be greater than zero"));
        }
        if self.detector.model_input_size == 0 {
            return Err(anyhow!("model_input_size must be greater than zero"));
        }
        if self.display_max_dimension == 0 {
            return Err(anyhow!("display max_dimension must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_file(ConfigFile::default())
    }
}

/// `$HOME/.cache/snapdetect`, falling back to `USERPROFILE`, then the temp dir.
fn default_cache_root() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(|home| Path::new(&home).join(CACHE_DIR_NAME))
        .unwrap_or_else(|_| std::env::temp_dir().join("snapdetect"))
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
}
