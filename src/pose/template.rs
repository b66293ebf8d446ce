use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use super::keypoint::{KeypointSet, Point2D, Point3D};

/// レッスンの手ランドマーク (`[[x, y], ...]` または `[[x, y, z], ...]`) から KeypointSet を作る
///
/// z がある場合は 3D 点としても保持する。混在は不可。
pub fn from_landmarks(landmarks: &[Vec<f32>]) -> Result<KeypointSet> {
    let mut points = Vec::with_capacity(landmarks.len());
    let mut points_3d = Vec::new();
    let has_z = landmarks.first().map(|l| l.len() == 3).unwrap_or(false);

    for (i, lm) in landmarks.iter().enumerate() {
        match (lm.as_slice(), has_z) {
            ([x, y], false) => points.push(Point2D::new(*x, *y)),
            ([x, y, z], true) => {
                points.push(Point2D::new(*x, *y));
                points_3d.push(Point3D::new(*x, *y, *z));
            }
            _ => bail!("landmark {} has {} coordinates", i, lm.len()),
        }
    }

    let set = KeypointSet::new(points);
    Ok(if has_z { set.with_3d(points_3d) } else { set })
}

/// KeypointSet をランドマーク配列に戻す
pub fn to_landmarks(set: &KeypointSet) -> Vec<Vec<f32>> {
    match &set.points_3d {
        Some(p3) => p3.iter().map(|p| vec![p.x, p.y, p.z]).collect(),
        None => set.points.iter().map(|p| vec![p.x, p.y]).collect(),
    }
}

pub fn load_template<P: AsRef<Path>>(path: P) -> Result<KeypointSet> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read template {}", path.display()))?;
    let landmarks: Vec<Vec<f32>> =
        serde_json::from_str(&content).context("Template is not a landmark array")?;
    if landmarks.is_empty() {
        bail!("Template {} has no landmarks", path.display());
    }
    from_landmarks(&landmarks)
}

pub fn save_template<P: AsRef<Path>>(path: P, set: &KeypointSet) -> Result<()> {
    let json = serde_json::to_string_pretty(&to_landmarks(set))?;
    fs::write(path, json).context("Failed to write template file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_landmarks_2d() {
        let set = from_landmarks(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.points[1], Point2D::new(3.0, 4.0));
        assert!(set.points_3d.is_none());
    }

    #[test]
    fn test_from_landmarks_3d() {
        let set = from_landmarks(&[vec![1.0, 2.0, 0.5]]).unwrap();
        assert_eq!(set.points[0], Point2D::new(1.0, 2.0));
        assert_eq!(set.points_3d.as_ref().unwrap()[0].z, 0.5);
    }

    #[test]
    fn test_from_landmarks_rejects_mixed() {
        assert!(from_landmarks(&[vec![1.0, 2.0], vec![1.0, 2.0, 3.0]]).is_err());
        assert!(from_landmarks(&[vec![1.0]]).is_err());
    }

    #[test]
    fn test_save_and_load_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.json");
        let set = KeypointSet::new(vec![Point2D::new(0.5, 0.25), Point2D::new(10.0, 20.0)]);
        save_template(&path, &set).unwrap();

        let loaded = load_template(&path).unwrap();
        assert_eq!(loaded, set);
    }

    #[test]
    fn test_load_template_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(load_template(&missing).is_err());

        let empty = dir.path().join("empty.json");
        fs::write(&empty, "[]").unwrap();
        assert!(load_template(&empty).is_err());

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "{\"sign\": \"hello\"}").unwrap();
        assert!(load_template(&garbage).is_err());
    }
}
