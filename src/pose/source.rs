use crate::error::{EngineError, TransientEstimationError};

use super::keypoint::KeypointSet;

/// フレーム型 `F` に対する手の姿勢推定
///
/// モデルはブラックボックスで、1 フレームにつき手を 0 個か 1 個返す。
/// 呼び出しは中断し得るが、スケジューラは完了まで待つ。`Ok(None)` は手なし。
#[allow(async_fn_in_trait)]
pub trait PoseEstimator<F> {
    async fn estimate(&mut self, frame: &F)
        -> Result<Option<KeypointSet>, TransientEstimationError>;
}

/// 姿勢推定リソース (モデル + ランタイム) の生成と解放
///
/// セッションは確保に成功するたびに `initialize` を高々 1 回呼び、推定器は `release` でちょうど 1 回返す。
pub trait PoseBackend {
    type Estimator;

    fn initialize(&mut self) -> Result<Self::Estimator, EngineError>;

    fn release(&mut self, estimator: Self::Estimator) {
        drop(estimator);
    }
}
