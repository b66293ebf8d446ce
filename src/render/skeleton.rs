use crate::feedback::{ConfidenceBand, FeedbackPhase};
use crate::pose::HandLandmark;

use HandLandmark::*;

/// 手の骨格の接続定義 (開始ランドマーク, 終了ランドマーク)
pub const HAND_CONNECTIONS: [(HandLandmark, HandLandmark); 23] = [
    // 親指
    (Wrist, ThumbCmc),
    (ThumbCmc, ThumbMcp),
    (ThumbMcp, ThumbIp),
    (ThumbIp, ThumbTip),
    // 人差し指
    (Wrist, IndexMcp),
    (IndexMcp, IndexPip),
    (IndexPip, IndexDip),
    (IndexDip, IndexTip),
    // 中指
    (Wrist, MiddleMcp),
    (MiddleMcp, MiddlePip),
    (MiddlePip, MiddleDip),
    (MiddleDip, MiddleTip),
    // 薬指
    (Wrist, RingMcp),
    (RingMcp, RingPip),
    (RingPip, RingDip),
    (RingDip, RingTip),
    // 小指
    (Wrist, PinkyMcp),
    (PinkyMcp, PinkyPip),
    (PinkyPip, PinkyDip),
    (PinkyDip, PinkyTip),
    // 手のひら
    (IndexMcp, MiddleMcp),
    (MiddleMcp, RingMcp),
    (RingMcp, PinkyMcp),
];

/// キーポイントの色 (RGB)
pub const KEYPOINT_COLOR: u32 = 0x0EA5E9; // 水色

/// 骨格線の色 (RGB)
pub const SKELETON_COLOR: u32 = 0x0EA5E9; // 水色

/// 習得時のフラッシュ枠の色 (RGB)
pub const MASTERED_COLOR: u32 = 0xFFD700; // 金

/// 信頼度バーの色
pub fn band_color(band: ConfidenceBand) -> u32 {
    match band {
        ConfidenceBand::High => 0x22C55E,
        ConfidenceBand::Medium => 0xEAB308,
        ConfidenceBand::Low => 0xEF4444,
    }
}

/// フィードバック状態に応じたオーバーレイ色
pub fn phase_color(phase: FeedbackPhase) -> u32 {
    match phase {
        FeedbackPhase::Mastered(_) => MASTERED_COLOR,
        FeedbackPhase::Idle | FeedbackPhase::NoHandDetected => SKELETON_COLOR,
        FeedbackPhase::Tracking(s) | FeedbackPhase::NearMatch(s) => {
            band_color(ConfidenceBand::of(s))
        }
    }
}
