use anyhow::Result;
use ndarray::Array4;
use opencv::{
    core::{self, AlgorithmHint, Mat, Scalar, Size, CV_32FC3},
    imgproc,
    prelude::*,
};

use super::keypoint::{KeypointSet, Point2D, Point3D};

/// ハンドランドマークモデルの入力サイズ（正方形）
pub const HAND_INPUT_SIZE: i32 = 224;

/// レターボックス変換の情報（入力座標 → フレーム座標の逆変換用）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxInfo {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl LetterboxInfo {
    /// 元フレーム (width x height) を size x size に収める変換
    pub fn fit(width: i32, height: i32, size: i32) -> Self {
        let scale = size as f32 / width.max(height).max(1) as f32;
        let new_w = (width as f32 * scale).round();
        let new_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((size as f32 - new_w) / 2.0).floor(),
            pad_y: ((size as f32 - new_h) / 2.0).floor(),
        }
    }

    /// モデル入力のピクセル座標をフレームのピクセル座標に戻す
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }

    /// (x, y, z) 入力座標列を KeypointSet に変換
    ///
    /// 2D はフレームのピクセル座標、3D はモデル座標のまま保持する。
    pub fn unletterbox(&self, raw: &[[f32; 3]]) -> KeypointSet {
        let points = raw
            .iter()
            .map(|[x, y, _]| {
                let (fx, fy) = self.to_frame(*x, *y);
                Point2D::new(fx, fy)
            })
            .collect();
        let points_3d = raw.iter().map(|[x, y, z]| Point3D::new(*x, *y, *z)).collect();
        KeypointSet::new(points).with_3d(points_3d)
    }
}

/// OpenCV Mat をハンドランドマーク用の入力テンソルに変換
///
/// - BGR -> RGB
/// - アスペクト比を保って size x size にレターボックス
/// - [1, size, size, 3] の f32 テンソル (0.0-1.0)
pub fn preprocess_for_hand_landmarks(frame: &Mat, size: i32) -> Result<(Array4<f32>, LetterboxInfo)> {
    let info = LetterboxInfo::fit(frame.cols(), frame.rows(), size);

    let mut rgb = Mat::default();
    imgproc::cvt_color(frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0, AlgorithmHint::ALGO_HINT_DEFAULT)?;

    let new_w = (frame.cols() as f32 * info.scale).round() as i32;
    let new_h = (frame.rows() as f32 * info.scale).round() as i32;
    let mut resized = Mat::default();
    imgproc::resize(
        &rgb,
        &mut resized,
        Size::new(new_w, new_h),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    // 余白は黒で埋める
    let top = info.pad_y as i32;
    let left = info.pad_x as i32;
    let mut padded = Mat::default();
    core::copy_make_border(
        &resized,
        &mut padded,
        top,
        size - new_h - top,
        left,
        size - new_w - left,
        core::BORDER_CONSTANT,
        Scalar::all(0.0),
    )?;

    let mut float_mat = Mat::default();
    padded.convert_to(&mut float_mat, CV_32FC3, 1.0 / 255.0, 0.0)?;

    let mut tensor = Array4::<f32>::zeros((1, size as usize, size as usize, 3));
    for y in 0..size {
        for x in 0..size {
            let pixel = float_mat.at_2d::<core::Vec3f>(y, x)?;
            tensor[[0, y as usize, x as usize, 0]] = pixel[0];
            tensor[[0, y as usize, x as usize, 1]] = pixel[1];
            tensor[[0, y as usize, x as usize, 2]] = pixel[2];
        }
    }

    Ok((tensor, info))
}
