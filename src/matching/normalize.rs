use crate::pose::{KeypointSet, Point2D};

/// 点群の軸平行バウンディングボックス
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point2D,
    pub max: Point2D,
}

impl BoundingBox {
    pub fn of(points: &[Point2D]) -> Option<Self> {
        let first = points.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(Self { min, max })
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// 長辺 (縦横比を保つための除数)
    pub fn extent(&self) -> f32 {
        self.width().max(self.height())
    }
}

/// 自身のバウンディングボックスに正規化したキーポイント
///
/// 最小角が原点、長辺が 1。フレームごとに算出し、保存はしない。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedKeypointSet {
    points: Vec<Point2D>,
}

impl NormalizedKeypointSet {
    /// 正規化済みの点をそのまま包む
    pub fn from_points(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 正規化済みの集合を再度正規化しても変わらない
    pub fn renormalize(&self) -> Self {
        Self::from_points(normalize_points(&self.points))
    }
}

/// `(p - box_min) / max(box_w, box_h)`
///
/// 大きさ 0 のボックス (1 点、または全点が一致) は平行移動のみ。空の入力は空のまま返す。
pub fn normalize_points(points: &[Point2D]) -> Vec<Point2D> {
    let Some(bbox) = BoundingBox::of(points) else {
        return Vec::new();
    };
    let extent = bbox.extent();
    let scale = if extent > 0.0 { extent } else { 1.0 };

    points
        .iter()
        .map(|p| Point2D::new((p.x - bbox.min.x) / scale, (p.y - bbox.min.y) / scale))
        .collect()
}

pub fn normalize(set: &KeypointSet) -> NormalizedKeypointSet {
    NormalizedKeypointSet::from_points(normalize_points(&set.points))
}
