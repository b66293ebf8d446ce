use anyhow::{Context, Result};
use opencv::core::Mat;
use std::time::Instant;
use tracing::{error, info, warn};

use sign_practice::camera::OpenCvDevice;
use sign_practice::config::Config;
use sign_practice::engine::{EngineHandle, GestureEngine};
use sign_practice::feedback::{hint_for, passes_check, FeedbackPhase, MasteryEvent};
use sign_practice::logging;
use sign_practice::pose::{load_template, OnnxHandBackend};
use sign_practice::render::MinifbRenderer;
use sign_practice::scheduler::{FrameReport, IntervalClock, ProgressRecorder, Renderer};

const CONFIG_PATH: &str = "config.toml";

/// ウィンドウ描画 + 閉じたらエンジンを止める
struct PracticeView {
    window: Option<MinifbRenderer>,
    handle: EngineHandle,
    last_hint: &'static str,
    frame_count: u32,
    fps_timer: Instant,
}

impl PracticeView {
    fn new(window: Option<MinifbRenderer>, handle: EngineHandle) -> Self {
        Self {
            window,
            handle,
            last_hint: "",
            frame_count: 0,
            fps_timer: Instant::now(),
        }
    }
}

impl Renderer<Mat> for PracticeView {
    fn render(&mut self, frame: &Mat, report: &FrameReport<'_>) {
        if let Some(window) = self.window.as_mut() {
            window.render(frame, report);
            if !window.is_open() {
                info!("window closed");
                self.handle.stop();
            }
        }

        let hint = match report.feedback.phase {
            FeedbackPhase::Idle => hint_for(report.sample.value),
            phase => hint_for(phase.score().unwrap_or(0)),
        };
        if hint != self.last_hint {
            info!(score = report.sample.value, "{}", hint);
            self.last_hint = hint;
        }

        // FPS計算
        self.frame_count += 1;
        let elapsed = self.fps_timer.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            info!(
                fps = (self.frame_count as f32 / elapsed) as f64,
                best = report.feedback.best_score,
                "practice"
            );
            self.frame_count = 0;
            self.fps_timer = Instant::now();
        }
    }
}

/// 習得イベントをログに残す
struct LoggedProgress {
    check_pass: u8,
}

impl ProgressRecorder for LoggedProgress {
    fn record_mastery(&mut self, event: &MasteryEvent) {
        info!(
            best_score = event.best_score,
            attempts = event.attempts,
            passed = passes_check(event.best_score, self.check_pass),
            "progress recorded"
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH);
    logging::init(&config.app.log_level);

    let template = load_template(&config.app.template_path)
        .with_context(|| format!("loading template {}", config.app.template_path))?;
    if !template.is_full_hand() {
        warn!(points = template.len(), "template is not a full 21-point hand");
    }

    let mut engine = GestureEngine::new(
        OpenCvDevice,
        OnnxHandBackend::new(config.detector.clone()),
        &config,
    );
    engine.activate(template);

    if let Err(e) = engine.initialize().and_then(|_| engine.start()) {
        error!(error = %e, "{}", e.user_message());
        engine.dispose();
        return Err(e.into());
    }

    let window = if config.render.enabled {
        Some(MinifbRenderer::new(
            &config.render.title,
            config.camera.width as usize,
            config.camera.height as usize,
        )?)
    } else {
        None
    };
    info!("press ESC to exit");

    let mut view = PracticeView::new(window, engine.handle());
    let mut progress = LoggedProgress {
        check_pass: config.feedback.check_pass,
    };
    let mut clock = IntervalClock::new(config.render.target_fps);

    let result = tokio::select! {
        r = engine.run(&mut clock, &mut view, &mut progress) => r,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        }
    };

    let feedback = *engine.feedback_state();
    engine.dispose();
    info!(
        best_score = feedback.best_score,
        attempts = feedback.attempts,
        "shutting down"
    );

    if let Err(e) = result {
        error!(error = %e, "{}", e.user_message());
        return Err(e.into());
    }
    Ok(())
}
