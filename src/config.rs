use anyhow::{bail, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::camera::{CaptureConstraints, FacingMode};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 練習するサインのテンプレート (JSON ランドマーク配列)
    #[serde(default = "default_template_path")]
    pub template_path: String,
    /// tracing のレベル (RUST_LOG が優先)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_template_path() -> String { "templates/hello.json".to_string() }
fn default_log_level() -> String { "info".to_string() }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            template_path: default_template_path(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default)]
    pub index: i32,
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
    #[serde(default)]
    pub facing: FacingMode,
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
}

fn default_camera_width() -> u32 { 640 }
fn default_camera_height() -> u32 { 480 }
fn default_camera_fps() -> u32 { 30 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_camera_width(),
            height: default_camera_height(),
            facing: FacingMode::default(),
            fps: default_camera_fps(),
        }
    }
}

impl CameraConfig {
    pub fn constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            device_index: self.index,
            width: self.width,
            height: self.height,
            facing: self.facing,
            fps: Some(self.fps),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    #[serde(default = "default_model_path")]
    pub model_path: String,
    /// モデル入力の一辺 (px)
    #[serde(default = "default_input_size")]
    pub input_size: i32,
    /// これ未満の存在スコアは「手なし」
    #[serde(default = "default_min_presence")]
    pub min_presence: f32,
}

fn default_model_path() -> String { "models/hand_landmark_full.onnx".to_string() }
fn default_input_size() -> i32 { 224 }
fn default_min_presence() -> f32 { 0.5 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            input_size: default_input_size(),
            min_presence: default_min_presence(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    /// 正規化座標での平均距離がこの値以上で confidence 0
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
}

fn default_max_distance() -> f32 { 0.5 }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_distance: default_max_distance(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedbackConfig {
    /// NearMatch の下限
    #[serde(default = "default_near_match")]
    pub near_match: u8,
    /// Mastered の下限
    #[serde(default = "default_mastery")]
    pub mastery: u8,
    /// Mastered 表示を保持する時間
    #[serde(default = "default_display_window_ms")]
    pub display_window_ms: u64,
    /// クイズのジェスチャー問題の合格ライン
    #[serde(default = "default_check_pass")]
    pub check_pass: u8,
}

fn default_near_match() -> u8 { 60 }
fn default_mastery() -> u8 { 85 }
fn default_display_window_ms() -> u64 { 3000 }
fn default_check_pass() -> u8 { 80 }

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            near_match: default_near_match(),
            mastery: default_mastery(),
            display_window_ms: default_display_window_ms(),
            check_pass: default_check_pass(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    #[serde(default = "default_render_enabled")]
    pub enabled: bool,
    #[serde(default = "default_title")]
    pub title: String,
    /// 描画ループ (= フレームスケジューラ) の上限 FPS
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
}

fn default_render_enabled() -> bool { true }
fn default_title() -> String { "Sign Practice".to_string() }
fn default_target_fps() -> u32 { 60 }

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: default_render_enabled(),
            title: default_title(),
            target_fps: default_target_fps(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 読めなければデフォルト設定で続行
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config not loaded, using defaults");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fb = &self.feedback;
        if fb.mastery > 100 || fb.check_pass > 100 {
            bail!("feedback thresholds must be within 0..=100");
        }
        if fb.near_match > fb.mastery {
            bail!(
                "feedback.near_match ({}) must not exceed feedback.mastery ({})",
                fb.near_match,
                fb.mastery
            );
        }
        if !(self.scoring.max_distance > 0.0) {
            bail!("scoring.max_distance must be positive");
        }
        if self.render.target_fps == 0 {
            bail!("render.target_fps must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.height, 480);
        assert_eq!(config.camera.facing, FacingMode::User);
        assert_eq!(config.feedback.near_match, 60);
        assert_eq!(config.feedback.mastery, 85);
        assert_eq!(config.feedback.check_pass, 80);
        assert_eq!(config.scoring.max_distance, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [camera]
            index = 2
            facing = "environment"

            [feedback]
            mastery = 90
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.index, 2);
        assert_eq!(config.camera.facing, FacingMode::Environment);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.feedback.mastery, 90);
        assert_eq!(config.feedback.near_match, 60);
        assert_eq!(config.detector.input_size, 224);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scoring]\nmax_distance = 0.4").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert!((config.scoring.max_distance - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_load_rejects_invalid_thresholds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[feedback]\nnear_match = 90\nmastery = 80").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("does/not/exist.toml");
        assert_eq!(config.render.title, "Sign Practice");
    }

    #[test]
    fn test_constraints_from_camera_config() {
        let c = CameraConfig::default().constraints();
        assert_eq!((c.width, c.height), (640, 480));
        assert_eq!(c.facing, FacingMode::User);
        assert_eq!(c.fps, Some(30));
    }
}
