use anyhow::{Context, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs, VideoCaptureTrait},
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{CaptureConstraints, CaptureDevice, FacingMode, VideoStream};
use crate::error::DeviceError;

/// OpenCVを使用したカメラキャプチャ
pub struct OpenCvCamera {
    capture: VideoCapture,
    width: u32,
    height: u32,
}

impl OpenCvCamera {
    /// 制約を指定してカメラを開く
    pub fn open(constraints: &CaptureConstraints) -> Result<Self, DeviceError> {
        let mut capture = VideoCapture::new(constraints.device_index, VideoCaptureAPIs::CAP_ANY as i32)
            .map_err(|e| DeviceError::AccessDenied(e.to_string()))?;

        if !capture.is_opened().unwrap_or(false) {
            return Err(DeviceError::Unavailable(format!(
                "camera {} is not available",
                constraints.device_index
            )));
        }

        // OpenCV には向きの概念がないので index で選ぶ
        if constraints.facing == FacingMode::Environment {
            debug!("facing mode is ignored by the OpenCV backend");
        }

        let (width, height) = Self::configure(&mut capture, constraints)
            .map_err(|e| DeviceError::Unavailable(format!("{e:#}")))?;

        Ok(Self {
            capture,
            width,
            height,
        })
    }

    /// 解像度とFPSを設定し、実際の解像度を返す
    fn configure(capture: &mut VideoCapture, constraints: &CaptureConstraints) -> Result<(u32, u32)> {
        capture.set(videoio::CAP_PROP_FRAME_WIDTH, constraints.width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, constraints.height as f64)?;
        if let Some(f) = constraints.fps {
            capture.set(videoio::CAP_PROP_FPS, f as f64)?;
        }
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        let actual_width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let actual_height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        let actual_fps = capture.get(videoio::CAP_PROP_FPS)?;
        info!(width = actual_width, height = actual_height, fps = actual_fps, "camera opened");

        Ok((actual_width, actual_height))
    }

    /// 解像度を取得
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// フレームを読み込む（BGR形式）
    pub fn read_frame(&mut self) -> Result<Mat> {
        let mut frame = Mat::default();
        self.capture
            .read(&mut frame)
            .context("Failed to read frame")?;

        if frame.empty() {
            anyhow::bail!("Empty frame received");
        }

        Ok(frame)
    }

    fn release(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!(error = %e, "camera release failed");
        }
    }
}

/// 別スレッドでカメラキャプチャを行い、最新フレームを提供する
///
/// `stop_tracks` でスレッドを止めて join し、デバイスを解放する。
pub struct ThreadedCamera {
    latest: Arc<Mutex<Option<Mat>>>,
    frame_id: Arc<AtomicU64>,
    last_taken: u64,
    running: Arc<AtomicBool>,
    width: u32,
    height: u32,
    handle: Option<thread::JoinHandle<()>>,
}

impl ThreadedCamera {
    pub fn start(constraints: &CaptureConstraints) -> Result<Self, DeviceError> {
        let mut camera = OpenCvCamera::open(constraints)?;
        let (w, h) = camera.resolution();
        let latest = Arc::new(Mutex::new(None::<Mat>));
        let latest_ref = latest.clone();
        let frame_id = Arc::new(AtomicU64::new(0));
        let frame_id_ref = frame_id.clone();
        let running = Arc::new(AtomicBool::new(true));
        let running_ref = running.clone();

        let handle = thread::spawn(move || {
            while running_ref.load(Ordering::Acquire) {
                match camera.read_frame() {
                    Ok(frame) => {
                        if let Ok(mut slot) = latest_ref.lock() {
                            *slot = Some(frame);
                        }
                        frame_id_ref.fetch_add(1, Ordering::Release);
                    }
                    Err(_) => thread::sleep(Duration::from_millis(5)),
                }
            }
            camera.release();
        });

        Ok(Self {
            latest,
            frame_id,
            last_taken: 0,
            running,
            width: w,
            height: h,
            handle: Some(handle),
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// 現在のフレームIDを取得。新フレームが到着するたびにインクリメントされる。
    pub fn frame_id(&self) -> u64 {
        self.frame_id.load(Ordering::Acquire)
    }

    /// 前回取得後に新しいフレームが届いていれば返す
    pub fn take_new_frame(&mut self) -> Option<Mat> {
        let id = self.frame_id();
        if id == self.last_taken {
            return None;
        }
        let guard = self.latest.lock().ok()?;
        let frame = guard.as_ref().map(|m| m.clone())?;
        self.last_taken = id;
        Some(frame)
    }
}

impl VideoStream for ThreadedCamera {
    type Frame = Mat;

    fn current_frame(&mut self) -> Option<Mat> {
        self.take_new_frame()
    }

    fn stop_tracks(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("camera thread panicked");
            }
            info!("camera released");
        }
    }
}

impl Drop for ThreadedCamera {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

/// OpenCV の VideoCapture をデバイスとして扱う
#[derive(Debug, Default)]
pub struct OpenCvDevice;

impl CaptureDevice for OpenCvDevice {
    type Stream = ThreadedCamera;

    fn acquire(&mut self, constraints: &CaptureConstraints) -> Result<ThreadedCamera, DeviceError> {
        ThreadedCamera::start(constraints)
    }
}
