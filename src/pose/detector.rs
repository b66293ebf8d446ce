use anyhow::{Context, Result};
use ndarray::Array4;
use opencv::core::Mat;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use tracing::{debug, info};

use super::keypoint::{HandLandmark, KeypointSet};
use super::preprocess::preprocess_for_hand_landmarks;
use super::source::{PoseBackend, PoseEstimator};
use crate::config::DetectorConfig;
use crate::error::{EngineError, TransientEstimationError};

const INPUT_NAME: &str = "input_1";
/// [1, 63] = 21 x (x, y, z) 入力ピクセル座標
const LANDMARKS_OUTPUT: &str = "Identity";
/// [1, 1] 手の存在スコア
const PRESENCE_OUTPUT: &str = "Identity_1";

/// ONNX ハンドランドマークモデルによる手の検出器
pub struct HandDetector {
    session: Session,
    input_size: i32,
    min_presence: f32,
}

impl HandDetector {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: i32, min_presence: f32) -> Result<Self> {
        let builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?;

        #[cfg(feature = "cuda")]
        let builder = {
            info!("attempting CUDA execution provider");
            builder.with_execution_providers([
                ort::execution_providers::CUDAExecutionProvider::default().build(),
            ])?
        };

        let session = builder
            .commit_from_file(model_path.as_ref())
            .context("Failed to load ONNX model")?;

        Ok(Self {
            session,
            input_size,
            min_presence,
        })
    }

    /// 前処理済みテンソルから手を検出
    ///
    /// 入力: [1, size, size, 3] の f32 テンソル
    /// 出力: 入力座標系の 21 点、存在スコアが閾値未満なら None
    pub fn detect(&mut self, input: Array4<f32>) -> Result<Option<Vec<[f32; 3]>>> {
        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![INPUT_NAME => input_tensor])
            .context("Inference failed")?;

        let presence: ndarray::ArrayViewD<f32> = outputs[PRESENCE_OUTPUT]
            .try_extract_array()
            .context("Failed to extract presence tensor")?;
        let score = presence.iter().next().copied().unwrap_or(0.0);
        if score < self.min_presence {
            debug!(score, "hand presence below threshold");
            return Ok(None);
        }

        let landmarks: ndarray::ArrayViewD<f32> = outputs[LANDMARKS_OUTPUT]
            .try_extract_array()
            .context("Failed to extract landmark tensor")?;
        let flat: Vec<f32> = landmarks.iter().copied().collect();
        anyhow::ensure!(
            flat.len() >= HandLandmark::COUNT * 3,
            "landmark tensor has {} values",
            flat.len()
        );

        let points = (0..HandLandmark::COUNT)
            .map(|i| [flat[i * 3], flat[i * 3 + 1], flat[i * 3 + 2]])
            .collect();
        Ok(Some(points))
    }
}

impl PoseEstimator<Mat> for HandDetector {
    async fn estimate(&mut self, frame: &Mat) -> Result<Option<KeypointSet>, TransientEstimationError> {
        let (input, letterbox) = preprocess_for_hand_landmarks(frame, self.input_size)?;
        let raw = self.detect(input)?;
        Ok(raw.map(|points| letterbox.unletterbox(&points)))
    }
}

/// 検出器を必要になった時点で生成するバックエンド
pub struct OnnxHandBackend {
    config: DetectorConfig,
}

impl OnnxHandBackend {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }
}

impl PoseBackend for OnnxHandBackend {
    type Estimator = HandDetector;

    fn initialize(&mut self) -> Result<HandDetector, EngineError> {
        let detector = HandDetector::new(
            &self.config.model_path,
            self.config.input_size,
            self.config.min_presence,
        )
        .map_err(|e| EngineError::ResourceInit(format!("{e:#}")))?;
        info!(model = %self.config.model_path, "hand landmark model loaded");
        Ok(detector)
    }

    fn release(&mut self, detector: HandDetector) {
        drop(detector);
        info!("hand landmark model released");
    }
}
