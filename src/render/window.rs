use anyhow::Result;
use minifb::{Key, Window, WindowOptions};
use opencv::core::{Mat, Vec3b};
use opencv::prelude::*;
use tracing::warn;

use crate::feedback::{ConfidenceBand, FeedbackPhase};
use crate::pose::{HandLandmark, KeypointSet, Point2D};
use crate::render::skeleton::{band_color, phase_color, HAND_CONNECTIONS, KEYPOINT_COLOR, MASTERED_COLOR};
use crate::scheduler::{FrameReport, Renderer};

const BAR_HEIGHT: usize = 12;
const BAR_BACKGROUND: u32 = 0x202020;
const FLASH_BORDER: i32 = 8;
const KEYPOINT_RADIUS: i32 = 4;
const FINGERTIP_RADIUS: i32 = 6;

/// minifbを使用したレンダラー
pub struct MinifbRenderer {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
    title: String,
    /// ウィンドウ / フレームの拡大率
    frame_scale: (f32, f32),
    last_phase: FeedbackPhase,
}

impl MinifbRenderer {
    /// ウィンドウを作成
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        let buffer = vec![0u32; width * height];

        Ok(Self {
            window,
            buffer,
            width,
            height,
            title: title.to_string(),
            frame_scale: (1.0, 1.0),
            last_phase: FeedbackPhase::Idle,
        })
    }

    /// ウィンドウが開いているか (Esc で閉じる)
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// BGR Mat をウィンドウサイズへ最近傍で拡縮してバッファにコピー
    pub fn draw_frame(&mut self, frame: &Mat) -> Result<()> {
        let frame_width = frame.cols().max(1) as usize;
        let frame_height = frame.rows().max(1) as usize;
        self.frame_scale = (
            self.width as f32 / frame_width as f32,
            self.height as f32 / frame_height as f32,
        );

        for y in 0..self.height {
            let src_y = (y * frame_height / self.height) as i32;
            for x in 0..self.width {
                let src_x = (x * frame_width / self.width) as i32;
                let bgr = frame.at_2d::<Vec3b>(src_y, src_x)?;
                self.buffer[y * self.width + x] =
                    ((bgr[2] as u32) << 16) | ((bgr[1] as u32) << 8) | bgr[0] as u32;
            }
        }

        Ok(())
    }

    /// フレーム座標 → ウィンドウ座標
    fn to_window(&self, p: &Point2D) -> (i32, i32) {
        let (sx, sy) = self.frame_scale;
        Point2D::new(p.x * sx, p.y * sy).to_pixel()
    }

    /// 手の骨格を描画
    pub fn draw_hand(&mut self, hand: &KeypointSet, line_color: u32) {
        for (start, end) in HAND_CONNECTIONS.iter() {
            if let (Some(a), Some(b)) = (hand.get(*start), hand.get(*end)) {
                let (x1, y1) = self.to_window(a);
                let (x2, y2) = self.to_window(b);
                self.draw_line(x1, y1, x2, y2, line_color);
            }
        }

        for p in hand.iter() {
            let (px, py) = self.to_window(p);
            self.draw_circle(px, py, KEYPOINT_RADIUS, KEYPOINT_COLOR);
        }

        // 指先は大きめに強調
        for tip in HandLandmark::fingertips() {
            if let Some(p) = hand.get(tip) {
                let (px, py) = self.to_window(p);
                self.draw_circle(px, py, FINGERTIP_RADIUS, line_color);
            }
        }
    }

    /// 画面下部に信頼度バーを描画
    pub fn draw_confidence_bar(&mut self, value: u8) {
        let top = self.height.saturating_sub(BAR_HEIGHT);
        let filled = self.width * value as usize / 100;
        let color = band_color(ConfidenceBand::of(value));
        for y in top..self.height {
            for x in 0..self.width {
                self.buffer[y * self.width + x] = if x < filled { color } else { BAR_BACKGROUND };
            }
        }
    }

    /// 習得時の枠
    fn draw_border(&mut self, color: u32) {
        let (w, h) = (self.width as i32, self.height as i32);
        for y in 0..h {
            for x in 0..w {
                if x < FLASH_BORDER || y < FLASH_BORDER || x >= w - FLASH_BORDER || y >= h - FLASH_BORDER {
                    self.set_pixel(x, y, color);
                }
            }
        }
    }

    /// バッファをウィンドウに表示
    pub fn update(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }

    /// Bresenhamのアルゴリズムで線を描画
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            self.set_pixel(x, y, color);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// 円を描画（塗りつぶし）
    fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, color: u32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// ピクセルをセット（境界チェック付き）
    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize * self.width + x as usize] = color;
        }
    }
}

impl Renderer<Mat> for MinifbRenderer {
    fn render(&mut self, frame: &Mat, report: &FrameReport<'_>) {
        if let Err(e) = self.draw_frame(frame) {
            warn!(error = %e, "failed to copy camera frame");
        }

        let phase = report.feedback.phase;
        if let Some(hand) = report.keypoints {
            self.draw_hand(hand, phase_color(phase));
        }
        self.draw_confidence_bar(report.sample.value);
        if matches!(phase, FeedbackPhase::Mastered(_)) {
            self.draw_border(MASTERED_COLOR);
        }

        if phase.as_str() != self.last_phase.as_str() {
            self.window.set_title(&format!("{} - {}", self.title, phase.as_str()));
            self.last_phase = phase;
        }

        if let Err(e) = self.update() {
            warn!(error = %e, "failed to present frame");
        }
    }
}
