use serde::{Deserialize, Serialize};

/// 手のランドマーク 21 点のインデックス (手首 → 親指 → 人差し指 → 中指 → 薬指 → 小指)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum HandLandmark {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexMcp = 5,
    IndexPip = 6,
    IndexDip = 7,
    IndexTip = 8,
    MiddleMcp = 9,
    MiddlePip = 10,
    MiddleDip = 11,
    MiddleTip = 12,
    RingMcp = 13,
    RingPip = 14,
    RingDip = 15,
    RingTip = 16,
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

impl HandLandmark {
    pub const COUNT: usize = 21;

    const ALL: [HandLandmark; Self::COUNT] = [
        Self::Wrist,
        Self::ThumbCmc,
        Self::ThumbMcp,
        Self::ThumbIp,
        Self::ThumbTip,
        Self::IndexMcp,
        Self::IndexPip,
        Self::IndexDip,
        Self::IndexTip,
        Self::MiddleMcp,
        Self::MiddlePip,
        Self::MiddleDip,
        Self::MiddleTip,
        Self::RingMcp,
        Self::RingPip,
        Self::RingDip,
        Self::RingTip,
        Self::PinkyMcp,
        Self::PinkyPip,
        Self::PinkyDip,
        Self::PinkyTip,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// 指先 5 点
    pub fn fingertips() -> [HandLandmark; 5] {
        [
            Self::ThumbTip,
            Self::IndexTip,
            Self::MiddleTip,
            Self::RingTip,
            Self::PinkyTip,
        ]
    }
}

/// フレームのピクセル座標系の 2D 点
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// ユークリッド距離
    pub fn distance(&self, other: &Point2D) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// ピクセル座標に丸める（描画用）
    pub fn to_pixel(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

/// モデル座標系の 3D 点（推定器が出す場合のみ）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// 1 つの手のキーポイント列
///
/// 順序は推定器が決めるもので、エンジン側で並べ替えることはない。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeypointSet {
    pub points: Vec<Point2D>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_3d: Option<Vec<Point3D>>,
}

impl KeypointSet {
    pub fn new(points: Vec<Point2D>) -> Self {
        Self {
            points,
            points_3d: None,
        }
    }

    pub fn with_3d(mut self, points_3d: Vec<Point3D>) -> Self {
        self.points_3d = Some(points_3d);
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 21 点の手として扱えるか
    pub fn is_full_hand(&self) -> bool {
        self.points.len() == HandLandmark::COUNT
    }

    /// ランドマークで取得（点数が足りなければ None）
    pub fn get(&self, landmark: HandLandmark) -> Option<&Point2D> {
        self.points.get(landmark as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point2D> {
        self.points.iter()
    }

    /// 全点を平行移動
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| Point2D::new(p.x + dx, p.y + dy))
                .collect(),
            points_3d: self.points_3d.clone(),
        }
    }

    /// 原点基準で拡大縮小
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| Point2D::new(p.x * factor, p.y * factor))
                .collect(),
            points_3d: self.points_3d.clone(),
        }
    }
}

impl FromIterator<Point2D> for KeypointSet {
    fn from_iter<I: IntoIterator<Item = Point2D>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
