#[cfg(feature = "desktop")]
pub mod capture;

#[cfg(feature = "desktop")]
pub use capture::{OpenCvCamera, OpenCvDevice, ThreadedCamera};

use serde::Deserialize;

use crate::error::DeviceError;

/// 複数カメラがある場合の優先向き
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

/// デバイス要求ごとに渡す明示的な制約
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConstraints {
    pub device_index: i32,
    pub width: u32,
    pub height: u32,
    pub facing: FacingMode,
    pub fps: Option<u32>,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            facing: FacingMode::User,
            fps: None,
        }
    }
}

/// 開いているカメラのストリーム
pub trait VideoStream {
    type Frame;

    /// 最新のフレーム (デバイス準備中は `None`)
    fn current_frame(&mut self) -> Option<Self::Frame>;

    /// 全トラックを停止 (ストリーム破棄の直前に 1 回だけ呼ばれる)
    fn stop_tracks(&mut self);
}

pub trait CaptureDevice {
    type Stream: VideoStream;

    fn acquire(&mut self, constraints: &CaptureConstraints) -> Result<Self::Stream, DeviceError>;

    fn release(&mut self, mut stream: Self::Stream) {
        stream.stop_tracks();
    }
}
