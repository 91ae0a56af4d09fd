use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use image::imageops::FilterType;
use rten::{Model, RunOptions, ThreadPool};
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;

use super::detector::DetectorConfig;
use super::engine::{EngineFactory, InferenceEngine, ModelAsset};
use super::runtime::RuntimeHandle;
use crate::models::{Category, Detection, Rect};

/// Builds [`RtenEngine`]s from the bundled `.rten` model.
#[derive(Debug, Default, Clone, Copy)]
pub struct RtenEngineFactory;

impl EngineFactory for RtenEngineFactory {
    fn build(
        &self,
        asset: &ModelAsset,
        config: &DetectorConfig,
        _runtime: &RuntimeHandle,
    ) -> Result<Box<dyn InferenceEngine>> {
        let model_path = asset.model_path();
        if !model_path.is_file() {
            anyhow::bail!("detection model not found at {}", model_path.display());
        }

        let model = Model::load_file(&model_path)
            .with_context(|| format!("Failed to load detection model {:?}", model_path))?;
        if model.input_ids().is_empty() {
            anyhow::bail!("model {:?} declares no inputs", model_path);
        }
        if model.output_ids().len() < 3 {
            anyhow::bail!(
                "model {:?} has {} outputs; expected boxes, classes and scores",
                model_path,
                model.output_ids().len()
            );
        }

        log::debug!(
            "loaded {:?} (input edge {}, {} inference threads)",
            model_path,
            config.model_input_size,
            config.num_threads
        );

        Ok(Box::new(RtenEngine {
            model,
            pool: inference_pool(config.num_threads),
            labels: asset.load_labels()?,
            input_size: config.model_input_size,
            score_threshold: config.score_threshold,
            max_results: config.max_results,
        }))
    }
}

/// SSD-style detector running on rten.
///
/// Input: NHWC `f32` in `[0, 1]`. Outputs: boxes `[1, N, 4]` as normalized
/// `ymin, xmin, ymax, xmax`, then classes `[1, N]`, then scores `[1, N]`.
pub struct RtenEngine {
    model: Model,
    pool: Arc<ThreadPool>,
    labels: Vec<String>,
    input_size: u32,
    score_threshold: f32,
    max_results: usize,
}

/// Dedicated pool sized from the detector config, so runs never land on rten's global pool.
fn inference_pool(num_threads: usize) -> Arc<ThreadPool> {
    Arc::new(ThreadPool::with_num_threads(num_threads.max(1)))
}

impl RtenEngine {
    fn run_options(&self) -> RunOptions {
        RunOptions::default().with_thread_pool(Some(self.pool.clone()))
    }

    fn build_input(&self, image: &RgbImage) -> NdTensor<f32, 4> {
        let size = self.input_size;
        let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
        let data: Vec<f32> = resized
            .pixels()
            .flat_map(|pixel| pixel.0)
            .map(|v| v as f32 / 255.0)
            .collect();
        NdTensor::from_data([1, size as usize, size as usize, 3], data)
    }
}

impl InferenceEngine for RtenEngine {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let input = self.build_input(image);
        let input_id = self.model.input_ids()[0];
        let output_ids = self.model.output_ids()[..3].to_vec();
        let mut outputs = self
            .model
            .run(
                vec![(input_id, input.view().into())],
                &output_ids,
                Some(self.run_options()),
            )
            .map_err(|e| anyhow!("model run failed: {}", e))?;

        let scores: NdTensor<f32, 2> = outputs
            .remove(2)
            .try_into()
            .map_err(|e| anyhow!("scores output has unexpected type: {:?}", e))?;
        let classes: NdTensor<f32, 2> = outputs
            .remove(1)
            .try_into()
            .map_err(|e| anyhow!("classes output has unexpected type: {:?}", e))?;
        let boxes: NdTensor<f32, 3> = outputs
            .remove(0)
            .try_into()
            .map_err(|e| anyhow!("boxes output has unexpected type: {:?}", e))?;

        let raw = SsdOutputs {
            boxes: boxes.to_vec(),
            classes: classes.to_vec(),
            scores: scores.to_vec(),
        };
        raw.decode(
            &self.labels,
            image.width(),
            image.height(),
            self.score_threshold,
            self.max_results,
        )
    }
}

/// Flattened SSD output tensors for a batch of one.
pub(crate) struct SsdOutputs {
    pub boxes: Vec<f32>,
    pub classes: Vec<f32>,
    pub scores: Vec<f32>,
}

impl SsdOutputs {
    /// Filter by threshold, rank by score (stable), keep the top `max_results`,
    /// and scale boxes into the `width x height` pixel space.
    pub(crate) fn decode(
        &self,
        labels: &[String],
        width: u32,
        height: u32,
        score_threshold: f32,
        max_results: usize,
    ) -> Result<Vec<Detection>> {
        let count = self.scores.len();
        if self.classes.len() != count || self.boxes.len() != count * 4 {
            anyhow::bail!(
                "inconsistent output sizes: {} boxes, {} classes, {} scores",
                self.boxes.len() / 4,
                self.classes.len(),
                count
            );
        }

        let mut ranked: Vec<(usize, f32)> = self
            .scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, score)| score.is_finite() && *score >= score_threshold)
            .filter(|(i, _)| self.boxes[i * 4..i * 4 + 4].iter().all(|v| v.is_finite()))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked.truncate(max_results);

        let w = width as f32;
        let h = height as f32;
        Ok(ranked
            .into_iter()
            .map(|(i, score)| {
                let b = &self.boxes[i * 4..i * 4 + 4];
                let bounding_box = Rect::new(b[1] * w, b[0] * h, b[3] * w, b[2] * h)
                    .clamp_to(width, height);
                let index = self.classes[i].max(0.0) as usize;
                let label = labels
                    .get(index)
                    .filter(|label| !label.is_empty())
                    .cloned()
                    .unwrap_or_else(|| index.to_string());
                Detection {
                    bounding_box,
                    categories: vec![Category {
                        label,
                        score,
                        index,
                    }],
                }
            })
            .collect())
    }
}
