use tracing::{debug, info, warn};

use crate::camera::{CaptureConstraints, CaptureDevice, VideoStream};
use crate::error::EngineError;
use crate::pose::PoseBackend;

/// デバイスのストリームが返すフレーム型
pub type FrameOf<D> = <<D as CaptureDevice>::Stream as VideoStream>::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Ready,
    Capturing,
    Stopped,
    Disposed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Capturing => "capturing",
            Self::Stopped => "stopped",
            Self::Disposed => "disposed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub last_error: Option<EngineError>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            last_error: None,
        }
    }
}

pub struct CaptureSession<D: CaptureDevice, B: PoseBackend> {
    device: D,
    backend: B,
    constraints: CaptureConstraints,
    estimator: Option<B::Estimator>,
    stream: Option<D::Stream>,
    state: SessionState,
}

impl<D: CaptureDevice, B: PoseBackend> CaptureSession<D, B> {
    pub fn new(device: D, backend: B, constraints: CaptureConstraints) -> Self {
        Self {
            device,
            backend,
            constraints,
            estimator: None,
            stream: None,
            state: SessionState::default(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn is_capturing(&self) -> bool {
        self.state.phase == SessionPhase::Capturing
    }

    pub fn constraints(&self) -> &CaptureConstraints {
        &self.constraints
    }

    fn transition(&mut self, to: SessionPhase) {
        if self.state.phase != to {
            debug!(from = self.state.phase.as_str(), to = to.as_str(), "session phase");
            self.state.phase = to;
        }
    }

    pub(crate) fn record_error(&mut self, err: EngineError) {
        self.state.last_error = Some(err);
    }

    /// 姿勢推定リソースを確保 (初期化済みならそのまま返す)
    pub fn initialize(&mut self) -> Result<&mut B::Estimator, EngineError> {
        if self.state.phase == SessionPhase::Disposed {
            return Err(EngineError::ResourceInit("session disposed".to_string()));
        }

        if self.estimator.is_none() {
            self.transition(SessionPhase::Initializing);
            match self.backend.initialize() {
                Ok(estimator) => {
                    self.estimator = Some(estimator);
                    self.state.last_error = None;
                    self.transition(SessionPhase::Ready);
                    info!("pose estimator ready");
                }
                Err(err) => {
                    warn!(error = %err, "pose estimator initialization failed");
                    self.record_error(err.clone());
                    self.transition(SessionPhase::Uninitialized);
                    return Err(err);
                }
            }
        }

        self.estimator
            .as_mut()
            .ok_or_else(|| EngineError::ResourceInit("estimator missing".to_string()))
    }

    /// カメラを要求する
    ///
    /// キャプチャ中なら何もしない。拒否やデバイス不在のときは `Ready` のまま。
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.is_capturing() {
            debug!("start ignored, already capturing");
            return Ok(());
        }
        self.initialize()?;

        match self.device.acquire(&self.constraints) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state.last_error = None;
                self.transition(SessionPhase::Capturing);
                info!(
                    width = self.constraints.width,
                    height = self.constraints.height,
                    "capture started"
                );
                Ok(())
            }
            Err(e) => {
                let err = EngineError::from(e);
                warn!(error = %err, "camera request failed");
                self.record_error(err.clone());
                Err(err)
            }
        }
    }

    /// カメラを解放して `Ready` に戻る (どの状態からでも呼べる)
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.device.release(stream);
            info!("capture stopped");
        }
        if self.is_capturing() {
            self.transition(SessionPhase::Ready);
        }
    }

    /// キャプチャを止めてから姿勢推定リソースを解放 (終端状態)
    pub fn dispose(&mut self) {
        if self.state.phase == SessionPhase::Disposed {
            return;
        }
        self.stop();
        self.transition(SessionPhase::Stopped);
        if let Some(estimator) = self.estimator.take() {
            self.backend.release(estimator);
            info!("pose estimator released");
        }
        self.transition(SessionPhase::Disposed);
    }

    /// キャプチャ中のみストリームと推定器を返す
    pub(crate) fn capture_parts(&mut self) -> Option<(&mut D::Stream, &mut B::Estimator)> {
        if !self.is_capturing() {
            return None;
        }
        match (self.stream.as_mut(), self.estimator.as_mut()) {
            (Some(stream), Some(estimator)) => Some((stream, estimator)),
            _ => None,
        }
    }
}

impl<D: CaptureDevice, B: PoseBackend> Drop for CaptureSession<D, B> {
    fn drop(&mut self) {
        self.dispose();
    }
}
