use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use tokio::sync::oneshot;

use crate::camera::{CaptureConstraints, CaptureDevice, VideoStream};
use crate::engine::EngineHandle;
use crate::error::{DeviceError, EngineError, TransientEstimationError};
use crate::feedback::MasteryEvent;
use crate::pose::{KeypointSet, PoseBackend, PoseEstimator, Point2D};
use crate::scheduler::{Command, FrameClock, FrameReport, ProgressRecorder, Renderer};

#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub initialized: Rc<Cell<usize>>,
    pub estimators_released: Rc<Cell<usize>>,
    pub acquired: Rc<Cell<usize>>,
    pub released: Rc<Cell<usize>>,
    pub tracks_stopped: Rc<Cell<usize>>,
    pub estimates: Rc<Cell<usize>>,
}

fn bump(c: &Cell<usize>) {
    c.set(c.get() + 1);
}

pub struct FakeStream {
    warmup: usize,
    next: u64,
    counters: Counters,
}

impl VideoStream for FakeStream {
    type Frame = u64;

    fn current_frame(&mut self) -> Option<u64> {
        if self.warmup > 0 {
            self.warmup -= 1;
            return None;
        }
        self.next += 1;
        Some(self.next)
    }

    fn stop_tracks(&mut self) {
        bump(&self.counters.tracks_stopped);
    }
}

pub struct FakeDevice {
    counters: Counters,
    deny: Option<DeviceError>,
    warmup: usize,
}

impl FakeDevice {
    pub fn new(counters: Counters) -> Self {
        Self {
            counters,
            deny: None,
            warmup: 0,
        }
    }

    pub fn denying(mut self, err: DeviceError) -> Self {
        self.deny = Some(err);
        self
    }

    /// 最初の `frames` 回はフレームなし
    pub fn warming_up(mut self, frames: usize) -> Self {
        self.warmup = frames;
        self
    }
}

impl CaptureDevice for FakeDevice {
    type Stream = FakeStream;

    fn acquire(&mut self, _constraints: &CaptureConstraints) -> Result<FakeStream, DeviceError> {
        if let Some(err) = &self.deny {
            return Err(err.clone());
        }
        bump(&self.counters.acquired);
        Ok(FakeStream {
            warmup: self.warmup,
            next: 0,
            counters: self.counters.clone(),
        })
    }

    fn release(&mut self, mut stream: FakeStream) {
        stream.stop_tracks();
        bump(&self.counters.released);
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    Hand(KeypointSet),
    NoHand,
    Fail,
}

pub struct ScriptedEstimator {
    steps: VecDeque<Step>,
    gate: Option<oneshot::Receiver<()>>,
    counters: Counters,
}

impl PoseEstimator<u64> for ScriptedEstimator {
    async fn estimate(&mut self, _frame: &u64) -> Result<Option<KeypointSet>, TransientEstimationError> {
        bump(&self.counters.estimates);
        if let Some(gate) = self.gate.take() {
            let _ = gate.await;
        }
        match self.steps.pop_front() {
            Some(Step::Hand(set)) => Ok(Some(set)),
            Some(Step::Fail) => Err(TransientEstimationError("scripted failure".into())),
            Some(Step::NoHand) | None => Ok(None),
        }
    }
}

pub struct ScriptedBackend {
    steps: VecDeque<Step>,
    gate: Option<oneshot::Receiver<()>>,
    init_error: Option<EngineError>,
    counters: Counters,
}

impl ScriptedBackend {
    pub fn new(counters: Counters) -> Self {
        Self {
            steps: VecDeque::new(),
            gate: None,
            init_error: None,
            counters,
        }
    }

    pub fn with_steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// 最初の推定は `gate` が発火するまで止まる
    pub fn gated(mut self, gate: oneshot::Receiver<()>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn failing_init(mut self, err: EngineError) -> Self {
        self.init_error = Some(err);
        self
    }
}

impl PoseBackend for ScriptedBackend {
    type Estimator = ScriptedEstimator;

    fn initialize(&mut self) -> Result<ScriptedEstimator, EngineError> {
        if let Some(err) = &self.init_error {
            return Err(err.clone());
        }
        bump(&self.counters.initialized);
        Ok(ScriptedEstimator {
            steps: std::mem::take(&mut self.steps),
            gate: self.gate.take(),
            counters: self.counters.clone(),
        })
    }

    fn release(&mut self, estimator: ScriptedEstimator) {
        drop(estimator);
        bump(&self.counters.estimators_released);
    }
}

/// `limit` 回 tick したらエンジンを止める描画クロック (指定 tick でコマンドも送れる)
pub struct ManualClock {
    handle: EngineHandle,
    limit: usize,
    pub ticks: usize,
    scheduled: Vec<(usize, Command)>,
}

impl ManualClock {
    pub fn new(handle: EngineHandle, limit: usize) -> Self {
        Self {
            handle,
            limit,
            ticks: 0,
            scheduled: Vec::new(),
        }
    }

    /// `tick` 回目 (1 始まり) の開始時に `command` を送る
    pub fn at(mut self, tick: usize, command: Command) -> Self {
        self.scheduled.push((tick, command));
        self
    }
}

impl FrameClock for ManualClock {
    async fn next_frame(&mut self) {
        self.ticks += 1;
        let tick = self.ticks;
        for (_, command) in self.scheduled.iter().filter(|(t, _)| *t == tick) {
            self.handle.send(command.clone());
        }
        if tick > self.limit {
            self.handle.stop();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub frame: u64,
    pub keypoints: Option<KeypointSet>,
    pub value: u8,
    pub hand_present: bool,
    pub phase: crate::feedback::FeedbackPhase,
    pub attempts: u32,
}

#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub frames: Vec<RenderedFrame>,
}

impl Renderer<u64> for RecordingRenderer {
    fn render(&mut self, frame: &u64, report: &FrameReport<'_>) {
        self.frames.push(RenderedFrame {
            frame: *frame,
            keypoints: report.keypoints.cloned(),
            value: report.sample.value,
            hand_present: report.sample.hand_present,
            phase: report.feedback.phase,
            attempts: report.feedback.attempts,
        });
    }
}

#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub events: Vec<MasteryEvent>,
}

impl ProgressRecorder for RecordingProgress {
    fn record_mastery(&mut self, event: &MasteryEvent) {
        self.events.push(*event);
    }
}

/// (`cx`, `cy`) を中心とする半径 `radius` px の円周上の 21 点
pub fn circle_hand(radius: f32, cx: f32, cy: f32) -> KeypointSet {
    (0..21)
        .map(|i| {
            let a = i as f32 / 21.0 * std::f32::consts::TAU;
            Point2D::new(cx + radius * a.cos(), cy + radius * a.sin())
        })
        .collect()
}

/// 開いた手: 手首が下、5 本の指がまっすぐ上に広がる
pub fn open_hand() -> KeypointSet {
    let mut points = vec![Point2D::new(0.0, 0.0)];
    for finger in 0..5 {
        let x = -40.0 + finger as f32 * 20.0;
        for joint in 1..=4 {
            points.push(Point2D::new(x, -(joint as f32) * 25.0));
        }
    }
    points.into_iter().collect()
}
