use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::camera::{CaptureDevice, VideoStream};
use crate::error::{EngineError, TransientEstimationError};
use crate::feedback::{ConfidenceSample, FeedbackMachine, FeedbackState, MasteryEvent};
use crate::matching::{normalize, NormalizedKeypointSet, Scorer};
use crate::pose::{KeypointSet, PoseBackend, PoseEstimator};
use crate::session::{CaptureSession, FrameOf};

/// 描画タイミング (再描画の機会ごとに `next_frame` が 1 回返る)
#[allow(async_fn_in_trait)]
pub trait FrameClock {
    async fn next_frame(&mut self);
}

/// 固定レートの描画クロック
///
/// 取りこぼした tick はスキップするので、遅いフレームはまとめて追いかけずにレートが下がる。
pub struct IntervalClock {
    period: Duration,
    interval: Option<Interval>,
}

impl IntervalClock {
    pub fn new(fps: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl FrameClock for IntervalClock {
    async fn next_frame(&mut self) {
        let period = self.period;
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        interval.tick().await;
    }
}

/// 処理済みフレームごとにレンダラーへ渡す内容
#[derive(Debug, Clone, Copy)]
pub struct FrameReport<'a> {
    /// オーバーレイ用のキーポイント (手が見つかった場合のみ)
    pub keypoints: Option<&'a KeypointSet>,
    pub sample: ConfidenceSample,
    pub feedback: FeedbackState,
}

pub trait Renderer<F> {
    fn render(&mut self, frame: &F, report: &FrameReport<'_>);
}

/// 習得の記録先 (エンジン自身は何も保存しない)
pub trait ProgressRecorder {
    fn record_mastery(&mut self, event: &MasteryEvent);
}

impl<F> Renderer<F> for () {
    fn render(&mut self, _frame: &F, _report: &FrameReport<'_>) {}
}

impl ProgressRecorder for () {
    fn record_mastery(&mut self, _event: &MasteryEvent) {}
}

/// ループ実行中に呼び出し側から積まれる操作
#[derive(Debug, Clone)]
pub enum Command {
    Activate(Arc<KeypointSet>),
    Deactivate,
    Stop,
    Dispose,
}

struct ActiveTemplate {
    source: Arc<KeypointSet>,
    normalized: NormalizedKeypointSet,
}

pub struct FrameScheduler {
    scorer: Scorer,
    feedback: FeedbackMachine,
    template: Option<ActiveTemplate>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// テンプレート変更ごとに増える。古い世代の推定結果は捨てる
    generation: u64,
    frame_index: u64,
    failed_frames: u32,
}

impl FrameScheduler {
    pub fn new(
        scorer: Scorer,
        feedback: FeedbackMachine,
    ) -> (Self, mpsc::UnboundedSender<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            scorer,
            feedback,
            template: None,
            commands: rx,
            generation: 0,
            frame_index: 0,
            failed_frames: 0,
        };
        (scheduler, tx)
    }

    pub fn feedback_state(&self) -> &FeedbackState {
        self.feedback.state()
    }

    pub fn template(&self) -> Option<&Arc<KeypointSet>> {
        self.template.as_ref().map(|t| &t.source)
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// テンプレートを差し替え、次のフレームより前にフィードバックを `Idle` に戻す
    pub fn activate(&mut self, template: Arc<KeypointSet>) {
        let normalized = normalize(&template);
        info!(
            points = template.len(),
            max_distance = self.scorer.max_distance(),
            "template activated"
        );
        self.template = Some(ActiveTemplate {
            source: template,
            normalized,
        });
        self.feedback.reset();
        self.generation += 1;
    }

    pub fn deactivate(&mut self) {
        if self.template.take().is_some() {
            info!("template deactivated");
        }
        self.feedback.reset();
        self.generation += 1;
    }

    /// 溜まっているコマンドを順に適用
    pub(crate) fn drain_commands<D, B>(&mut self, session: &mut CaptureSession<D, B>)
    where
        D: CaptureDevice,
        B: PoseBackend,
    {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Activate(template) => self.activate(template),
                Command::Deactivate => self.deactivate(),
                Command::Stop if !session.is_capturing() => {
                    debug!("stop ignored, not capturing");
                }
                Command::Stop => session.stop(),
                Command::Dispose => session.dispose(),
            }
        }
    }

    /// セッションのキャプチャが止まるまでフレームループを回す
    ///
    /// フレーム単位の推定失敗は吸収する。テンプレートとライブの点数が食い違った場合は
    /// カメラを解放してエラーを返す。
    pub async fn run<D, B, C, R, P>(
        &mut self,
        session: &mut CaptureSession<D, B>,
        clock: &mut C,
        renderer: &mut R,
        progress: &mut P,
    ) -> Result<(), EngineError>
    where
        D: CaptureDevice,
        B: PoseBackend,
        B::Estimator: PoseEstimator<FrameOf<D>>,
        C: FrameClock,
        R: Renderer<FrameOf<D>>,
        P: ProgressRecorder,
    {
        debug!("frame loop started");
        loop {
            self.drain_commands(session);
            if !session.is_capturing() {
                break;
            }

            clock.next_frame().await;

            self.drain_commands(session);
            let Some((stream, estimator)) = session.capture_parts() else {
                break;
            };
            // デバイスがまだ準備中。次の再描画で再試行
            let Some(frame) = stream.current_frame() else {
                continue;
            };

            let generation = self.generation;
            let result = estimator.estimate(&frame).await;

            self.drain_commands(session);
            if !session.is_capturing() || generation != self.generation {
                debug!(frame = self.frame_index, "discarding late estimate");
                continue;
            }

            self.frame_index += 1;
            if let Err(err) = self.process(result, &frame, renderer, progress) {
                error!(error = %err, "activation failed");
                session.record_error(err.clone());
                session.stop();
                return Err(err);
            }
        }
        debug!(frames = self.frame_index, "frame loop finished");
        Ok(())
    }

    fn process<F, R, P>(
        &mut self,
        result: Result<Option<KeypointSet>, TransientEstimationError>,
        frame: &F,
        renderer: &mut R,
        progress: &mut P,
    ) -> Result<(), EngineError>
    where
        R: Renderer<F>,
        P: ProgressRecorder,
    {
        let captured_at = Instant::now();
        let keypoints = match result {
            Ok(found) => {
                self.failed_frames = 0;
                found
            }
            Err(e) => {
                if self.failed_frames == 0 {
                    warn!(error = %e, frame = self.frame_index, "pose estimate failed, treating as no hand");
                } else {
                    debug!(error = %e, frame = self.frame_index, "pose estimate failed");
                }
                self.failed_frames += 1;
                None
            }
        };

        let sample = match (&keypoints, &self.template) {
            (Some(live), Some(template)) => {
                let value = self.scorer.score_live(live, &template.normalized)?;
                ConfidenceSample::hand(value, self.frame_index, captured_at)
            }
            // テンプレートなし: オーバーレイのみ
            (Some(_), None) => ConfidenceSample::hand(0, self.frame_index, captured_at),
            (None, _) => ConfidenceSample::no_hand(self.frame_index, captured_at),
        };

        if self.template.is_some() {
            if let Some(event) = self.feedback.observe(&sample) {
                progress.record_mastery(&event);
            }
        }

        let report = FrameReport {
            keypoints: keypoints.as_ref(),
            sample,
            feedback: *self.feedback.state(),
        };
        renderer.render(frame, &report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::FeedbackPhase;
    use crate::testing::{circle_hand, RecordingProgress, RecordingRenderer};

    fn scheduler() -> FrameScheduler {
        FrameScheduler::new(Scorer::default(), FeedbackMachine::default()).0
    }

    #[test]
    fn test_process_without_template_reports_overlay_only() {
        let mut s = scheduler();
        let mut renderer = RecordingRenderer::default();
        let mut progress = RecordingProgress::default();
        s.process(Ok(Some(circle_hand(50.0, 0.0, 0.0))), &7u64, &mut renderer, &mut progress)
            .unwrap();

        let frame = &renderer.frames[0];
        assert_eq!(frame.frame, 7);
        assert!(frame.hand_present);
        assert_eq!(frame.value, 0);
        assert!(frame.keypoints.is_some());
        assert_eq!(frame.phase, FeedbackPhase::Idle);
        assert!(progress.events.is_empty());
    }

    #[test]
    fn test_process_error_is_no_hand() {
        let mut s = scheduler();
        s.activate(Arc::new(circle_hand(50.0, 0.0, 0.0)));
        let mut renderer = RecordingRenderer::default();
        s.process(
            Err(TransientEstimationError("backend hiccup".into())),
            &1u64,
            &mut renderer,
            &mut (),
        )
        .unwrap();
        assert!(!renderer.frames[0].hand_present);
        assert_eq!(renderer.frames[0].phase, FeedbackPhase::NoHandDetected);
    }

    #[test]
    fn test_process_scores_against_template() {
        let mut s = scheduler();
        s.activate(Arc::new(circle_hand(50.0, 0.0, 0.0)));
        let mut renderer = RecordingRenderer::default();
        let mut progress = RecordingProgress::default();
        s.process(
            Ok(Some(circle_hand(120.0, 300.0, 200.0))),
            &1u64,
            &mut renderer,
            &mut progress,
        )
        .unwrap();
        assert_eq!(renderer.frames[0].value, 100);
        assert_eq!(progress.events.len(), 1);
    }

    #[test]
    fn test_activate_resets_feedback_and_bumps_generation() {
        let mut s = scheduler();
        s.activate(Arc::new(circle_hand(50.0, 0.0, 0.0)));
        s.process(Ok(Some(circle_hand(50.0, 0.0, 0.0))), &1u64, &mut (), &mut ())
            .unwrap();
        assert_eq!(s.feedback_state().attempts, 1);

        let before = s.generation;
        s.activate(Arc::new(circle_hand(10.0, 0.0, 0.0)));
        assert_eq!(s.feedback_state().attempts, 0);
        assert!(!s.feedback_state().mastery_fired);
        assert!(s.generation > before);

        s.deactivate();
        assert!(s.template().is_none());
    }

    #[test]
    fn test_interval_clock_period() {
        let clock = IntervalClock::new(60);
        let expected = Duration::from_secs_f64(1.0 / 60.0);
        assert_eq!(clock.period(), expected);
        assert_eq!(IntervalClock::new(0).period(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_interval_clock_ticks() {
        let mut clock = IntervalClock::new(200);
        let start = Instant::now();
        for _ in 0..3 {
            clock.next_frame().await;
        }
        // 最初の tick は即時、残り 2 回は 1 周期ずつ待つ
        assert!(start.elapsed() >= Duration::from_millis(9));
    }
}
