/// エンジンの呼び出し側に返るエラー
///
/// フレーム単位の推定失敗や遅れて届いた結果はスケジューラ内で吸収され、「手なし」として扱われる。
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// 姿勢推定のバックエンド / ランタイムを用意できなかった (セッションにとって致命的)
    #[error("pose estimation backend could not be initialized: {0}")]
    ResourceInit(String),
    /// ユーザーまたは OS がカメラへのアクセスを拒否
    #[error("camera access denied: {0}")]
    DeviceAccessDenied(String),
    /// 条件に合うカメラがない
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    /// テンプレートとライブのキーポイント数が異なる (またはどちらかが空)
    #[error("keypoint topology mismatch (expected {expected} points, got {actual})")]
    MismatchedTopology { expected: usize, actual: usize },
}

impl EngineError {
    /// ユーザーに見せる固定文言 (復旧手段は常にアクティベーションのやり直し)
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ResourceInit(_) => {
                "Failed to initialize hand detection. Please refresh the page."
            }
            Self::DeviceAccessDenied(_) => "Unable to access camera. Please check permissions.",
            Self::DeviceUnavailable(_) => "No camera found. Please connect a camera and try again.",
            Self::MismatchedTopology { .. } => {
                "This sign cannot be checked right now. Please try another lesson."
            }
        }
    }

    /// デバイス系はユーザー操作で回復可能、それ以外はアクティベーション終了
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::DeviceAccessDenied(_) | Self::DeviceUnavailable(_))
    }
}

/// カメラを取得できなかった理由
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<DeviceError> for EngineError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::AccessDenied(msg) => Self::DeviceAccessDenied(msg),
            DeviceError::Unavailable(msg) => Self::DeviceUnavailable(msg),
        }
    }
}

/// 1 フレーム分の推定失敗 (スケジューラの外には出ない)
#[derive(thiserror::Error, Debug)]
#[error("pose estimation failed: {0}")]
pub struct TransientEstimationError(pub String);

impl From<anyhow::Error> for TransientEstimationError {
    fn from(err: anyhow::Error) -> Self {
        Self(format!("{err:#}"))
    }
}
