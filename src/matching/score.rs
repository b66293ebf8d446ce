use crate::config::ScoringConfig;
use crate::error::EngineError;
use crate::pose::KeypointSet;

use super::normalize::{normalize, NormalizedKeypointSet};

/// 信頼度が 0 になる平均正規化距離
///
/// 経験的な調整値。`[scoring] max_distance` で変更できる。
pub const D_MAX: f32 = 0.5;

/// 正規化した 2 つの手の距離を 0..=100 の信頼度に変換
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scorer {
    max_distance: f32,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(D_MAX)
    }
}

impl Scorer {
    pub fn new(max_distance: f32) -> Self {
        Self { max_distance }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(config.max_distance)
    }

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    /// 同じインデックス同士のユークリッド距離の平均
    pub fn average_distance(
        current: &NormalizedKeypointSet,
        target: &NormalizedKeypointSet,
    ) -> Result<f32, EngineError> {
        if current.len() != target.len() || current.is_empty() {
            return Err(EngineError::MismatchedTopology {
                expected: target.len(),
                actual: current.len(),
            });
        }

        let total: f32 = current
            .points()
            .iter()
            .zip(target.points())
            .map(|(c, t)| c.distance(t))
            .sum();
        Ok(total / current.len() as f32)
    }

    /// `clamp(round((1 - d / max_distance) * 100), 0, 100)`
    pub fn confidence_for_distance(&self, avg_distance: f32) -> u8 {
        let raw = ((1.0 - avg_distance / self.max_distance) * 100.0).round();
        raw.clamp(0.0, 100.0) as u8
    }

    pub fn score(
        &self,
        current: &NormalizedKeypointSet,
        target: &NormalizedKeypointSet,
    ) -> Result<u8, EngineError> {
        let d = Self::average_distance(current, target)?;
        Ok(self.confidence_for_distance(d))
    }

    /// ライブの点群を正規化し、正規化済みテンプレートと比較
    pub fn score_live(
        &self,
        live: &KeypointSet,
        target: &NormalizedKeypointSet,
    ) -> Result<u8, EngineError> {
        self.score(&normalize(live), target)
    }
}
