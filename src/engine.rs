use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::camera::CaptureDevice;
use crate::config::Config;
use crate::error::EngineError;
use crate::feedback::{FeedbackMachine, FeedbackState};
use crate::matching::Scorer;
use crate::pose::{KeypointSet, PoseBackend, PoseEstimator};
use crate::scheduler::{Command, FrameClock, FrameScheduler, ProgressRecorder, Renderer};
use crate::session::{CaptureSession, FrameOf, SessionPhase, SessionState};

/// 実行中のエンジンを外から操作するハンドル
///
/// `run` がエンジンを借用している間はこちらから操作する。コマンドはループの各ステップの間、
/// またはエンジンへの次の直接呼び出しの前に適用される。
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    pub fn activate(&self, template: impl Into<Arc<KeypointSet>>) {
        self.send(Command::Activate(template.into()));
    }

    pub fn deactivate(&self) {
        self.send(Command::Deactivate);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn dispose(&self) {
        self.send(Command::Dispose);
    }

    pub fn send(&self, command: Command) {
        // エンジン破棄済み
        let _ = self.tx.send(command);
    }
}

/// カメラセッションとフレームスケジューラを束ねるジェスチャー照合エンジン
pub struct GestureEngine<D: CaptureDevice, B: PoseBackend> {
    session: CaptureSession<D, B>,
    scheduler: FrameScheduler,
    commands: mpsc::UnboundedSender<Command>,
}

impl<D: CaptureDevice, B: PoseBackend> GestureEngine<D, B> {
    pub fn new(device: D, backend: B, config: &Config) -> Self {
        let session = CaptureSession::new(device, backend, config.camera.constraints());
        let (scheduler, commands) = FrameScheduler::new(
            Scorer::from_config(&config.scoring),
            FeedbackMachine::from_config(&config.feedback),
        );
        Self {
            session,
            scheduler,
            commands,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            tx: self.commands.clone(),
        }
    }

    pub fn session_state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn feedback_state(&self) -> &FeedbackState {
        self.scheduler.feedback_state()
    }

    pub fn template(&self) -> Option<&Arc<KeypointSet>> {
        self.scheduler.template()
    }

    /// ハンドル経由で溜まったコマンドを、直接呼び出しより先に順番どおり適用する
    ///
    /// ループ外で送られた stop は停止中なら何もしない。dispose はここで即座に反映される。
    pub fn apply_pending(&mut self) {
        self.scheduler.drain_commands(&mut self.session);
    }

    /// `start` の前に姿勢推定リソースを用意する
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        self.apply_pending();
        self.session.initialize().map(|_| ())
    }

    /// テンプレートを設定し、フィードバックをリセット
    pub fn activate(&mut self, template: impl Into<Arc<KeypointSet>>) {
        self.apply_pending();
        self.scheduler.activate(template.into());
    }

    pub fn deactivate(&mut self) {
        self.apply_pending();
        self.scheduler.deactivate();
    }

    /// 必要なら初期化してからカメラを取得
    pub fn start(&mut self) -> Result<(), EngineError> {
        self.apply_pending();
        self.session.start()
    }

    pub fn stop(&mut self) {
        self.apply_pending();
        self.session.stop();
    }

    pub fn dispose(&mut self) {
        self.apply_pending();
        self.session.dispose();
        info!("engine disposed");
    }

    /// 停止されるまでフレームループを回す
    ///
    /// キャプチャ中でなければ即座に戻る (カメラ拒否時は 1 回も回らない)。
    pub async fn run<C, R, P>(
        &mut self,
        clock: &mut C,
        renderer: &mut R,
        progress: &mut P,
    ) -> Result<(), EngineError>
    where
        B::Estimator: PoseEstimator<FrameOf<D>>,
        C: FrameClock,
        R: Renderer<FrameOf<D>>,
        P: ProgressRecorder,
    {
        self.scheduler
            .run(&mut self.session, clock, renderer, progress)
            .await
    }
}
