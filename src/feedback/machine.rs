use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::FeedbackConfig;

/// 1 フレーム分の信頼度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceSample {
    /// 0..=100
    pub value: u8,
    pub frame_index: u64,
    pub captured_at: Instant,
    /// 手が検出されなかった (または推定失敗) フレームでは false
    pub hand_present: bool,
}

impl ConfidenceSample {
    pub fn hand(value: u8, frame_index: u64, captured_at: Instant) -> Self {
        Self {
            value,
            frame_index,
            captured_at,
            hand_present: true,
        }
    }

    pub fn no_hand(frame_index: u64, captured_at: Instant) -> Self {
        Self {
            value: 0,
            frame_index,
            captured_at,
            hand_present: false,
        }
    }
}

/// UI 向けの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackPhase {
    Idle,
    NoHandDetected,
    Tracking(u8),
    NearMatch(u8),
    Mastered(u8),
}

impl FeedbackPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::NoHandDetected => "no-hand",
            Self::Tracking(_) => "tracking",
            Self::NearMatch(_) => "near-match",
            Self::Mastered(_) => "mastered",
        }
    }

    pub fn score(&self) -> Option<u8> {
        match self {
            Self::Tracking(s) | Self::NearMatch(s) | Self::Mastered(s) => Some(*s),
            Self::Idle | Self::NoHandDetected => None,
        }
    }
}

/// 状態機械のスナップショット (アクティベーションごとにリセット)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackState {
    pub phase: FeedbackPhase,
    pub best_score: u8,
    pub attempts: u32,
    pub mastery_fired: bool,
}

impl Default for FeedbackState {
    fn default() -> Self {
        Self {
            phase: FeedbackPhase::Idle,
            best_score: 0,
            attempts: 0,
            mastery_fired: false,
        }
    }
}

/// 習得イベント (1 アクティベーションにつき最大 1 回)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasteryEvent {
    pub score: u8,
    pub best_score: u8,
    pub attempts: u32,
}

/// 練習・習得の状態機械
///
/// `Idle -> Tracking <-> NearMatch -> Mastered`。手が消えればいつでも `NoHandDetected`。
/// 習得イベントは一度きりのフラグで守られ、表示期間が過ぎた後は閾値以上でも `NearMatch` に戻る。
#[derive(Debug, Clone)]
pub struct FeedbackMachine {
    near_match: u8,
    mastery: u8,
    display_window: Duration,
    state: FeedbackState,
    mastered_at: Option<Instant>,
}

impl Default for FeedbackMachine {
    fn default() -> Self {
        Self::from_config(&FeedbackConfig::default())
    }
}

impl FeedbackMachine {
    pub fn new(near_match: u8, mastery: u8, display_window: Duration) -> Self {
        Self {
            near_match,
            mastery,
            display_window,
            state: FeedbackState::default(),
            mastered_at: None,
        }
    }

    pub fn from_config(config: &FeedbackConfig) -> Self {
        Self::new(
            config.near_match,
            config.mastery,
            Duration::from_millis(config.display_window_ms),
        )
    }

    pub fn state(&self) -> &FeedbackState {
        &self.state
    }

    /// `Idle`、最高スコア 0、試行 0、フラグ解除
    pub fn reset(&mut self) {
        self.state = FeedbackState::default();
        self.mastered_at = None;
    }

    fn showing_mastery(&self, now: Instant) -> bool {
        self.mastered_at
            .map(|t| now.saturating_duration_since(t) < self.display_window)
            .unwrap_or(false)
    }

    fn classify(&self, score: u8) -> FeedbackPhase {
        if score < self.near_match {
            FeedbackPhase::Tracking(score)
        } else {
            FeedbackPhase::NearMatch(score)
        }
    }

    /// サンプルを 1 つ取り込み、このアクティベーションで初めて閾値を超えたら習得イベントを返す
    pub fn observe(&mut self, sample: &ConfidenceSample) -> Option<MasteryEvent> {
        if !sample.hand_present {
            if !self.showing_mastery(sample.captured_at) {
                self.state.phase = FeedbackPhase::NoHandDetected;
            }
            return None;
        }

        let score = sample.value;
        self.state.best_score = self.state.best_score.max(score);

        if score >= self.mastery && !self.state.mastery_fired {
            self.state.mastery_fired = true;
            self.state.attempts += 1;
            self.state.phase = FeedbackPhase::Mastered(score);
            self.mastered_at = Some(sample.captured_at);

            let event = MasteryEvent {
                score,
                best_score: self.state.best_score,
                attempts: self.state.attempts,
            };
            info!(
                score,
                best_score = event.best_score,
                attempts = event.attempts,
                frame = sample.frame_index,
                "sign mastered"
            );
            return Some(event);
        }

        if self.showing_mastery(sample.captured_at) {
            return None;
        }

        let phase = self.classify(score);
        if phase.as_str() != self.state.phase.as_str() {
            debug!(from = self.state.phase.as_str(), to = phase.as_str(), score, "feedback phase");
        }
        self.state.phase = phase;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> FeedbackMachine {
        FeedbackMachine::new(60, 85, Duration::from_millis(3000))
    }

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn test_starts_idle() {
        let m = machine();
        assert_eq!(*m.state(), FeedbackState::default());
        assert_eq!(m.state().phase, FeedbackPhase::Idle);
    }

    #[test]
    fn test_thresholds() {
        let t0 = Instant::now();
        let mut m = machine();
        m.observe(&ConfidenceSample::hand(59, 0, t0));
        assert_eq!(m.state().phase, FeedbackPhase::Tracking(59));
        m.observe(&ConfidenceSample::hand(60, 1, t0));
        assert_eq!(m.state().phase, FeedbackPhase::NearMatch(60));
        m.observe(&ConfidenceSample::hand(84, 2, t0));
        assert_eq!(m.state().phase, FeedbackPhase::NearMatch(84));
        m.observe(&ConfidenceSample::hand(30, 3, t0));
        assert_eq!(m.state().phase, FeedbackPhase::Tracking(30));
        let event = m.observe(&ConfidenceSample::hand(85, 4, t0));
        assert_eq!(m.state().phase, FeedbackPhase::Mastered(85));
        assert_eq!(
            event,
            Some(MasteryEvent {
                score: 85,
                best_score: 85,
                attempts: 1
            })
        );
    }

    #[test]
    fn test_mastery_fires_once_for_1000_frames() {
        let t0 = Instant::now();
        let mut m = machine();
        let fired = (0..1000)
            .filter_map(|i| m.observe(&ConfidenceSample::hand(95, i, at(t0, i * 16))))
            .count();
        assert_eq!(fired, 1);
        assert_eq!(m.state().attempts, 1);
        assert!(m.state().mastery_fired);
    }

    #[test]
    fn test_mastered_clears_to_near_match_after_window() {
        let t0 = Instant::now();
        let mut m = machine();
        m.observe(&ConfidenceSample::hand(90, 0, t0));
        m.observe(&ConfidenceSample::hand(97, 1, at(t0, 1000)));
        assert_eq!(m.state().phase, FeedbackPhase::Mastered(90));

        m.observe(&ConfidenceSample::hand(97, 2, at(t0, 3000)));
        assert_eq!(m.state().phase, FeedbackPhase::NearMatch(97));
        assert_eq!(m.state().best_score, 97);

        m.observe(&ConfidenceSample::hand(40, 3, at(t0, 3100)));
        assert_eq!(m.state().phase, FeedbackPhase::Tracking(40));
    }

    #[test]
    fn test_no_hand_preserves_best_score() {
        let t0 = Instant::now();
        let mut m = machine();
        m.observe(&ConfidenceSample::hand(72, 0, t0));
        m.observe(&ConfidenceSample::no_hand(1, t0));
        assert_eq!(m.state().phase, FeedbackPhase::NoHandDetected);
        assert_eq!(m.state().best_score, 72);

        m.observe(&ConfidenceSample::hand(20, 2, t0));
        assert_eq!(m.state().phase, FeedbackPhase::Tracking(20));
        assert_eq!(m.state().best_score, 72);
    }

    #[test]
    fn test_no_hand_during_display_window_keeps_mastered() {
        let t0 = Instant::now();
        let mut m = machine();
        m.observe(&ConfidenceSample::hand(88, 0, t0));
        m.observe(&ConfidenceSample::no_hand(1, at(t0, 500)));
        assert_eq!(m.state().phase, FeedbackPhase::Mastered(88));
        m.observe(&ConfidenceSample::no_hand(2, at(t0, 3500)));
        assert_eq!(m.state().phase, FeedbackPhase::NoHandDetected);
    }

    #[test]
    fn test_reset_clears_everything() {
        let t0 = Instant::now();
        let mut m = machine();
        m.observe(&ConfidenceSample::hand(99, 0, t0));
        assert_eq!(m.state().attempts, 1);

        m.reset();
        assert_eq!(m.state().attempts, 0);
        assert!(!m.state().mastery_fired);
        assert_eq!(m.state().best_score, 0);
        assert_eq!(m.state().phase, FeedbackPhase::Idle);

        // 新しいアクティベーションでは再び発火できる
        assert!(m.observe(&ConfidenceSample::hand(99, 1, t0)).is_some());
    }

    #[test]
    fn test_best_score_reported_in_event() {
        let t0 = Instant::now();
        let mut m = FeedbackMachine::new(60, 85, Duration::ZERO);
        m.observe(&ConfidenceSample::hand(70, 0, t0));
        let event = m.observe(&ConfidenceSample::hand(86, 1, t0)).unwrap();
        assert_eq!(event.best_score, 86);
        // 表示期間 0: 次のフレームは通常どおり分類
        m.observe(&ConfidenceSample::hand(86, 2, t0));
        assert_eq!(m.state().phase, FeedbackPhase::NearMatch(86));
    }
}
