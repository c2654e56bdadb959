//! Output artifacts: timestamped PNG images and their JSON metadata siblings.
//!
//! Stems have one-second granularity; two artifacts produced within the same
//! second by the same controller overwrite each other.

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// `YYYYMMDD_HHMMSS` in local time, UTC when the local offset cannot be determined.
pub fn timestamp_stem() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_stem(now)
}

fn format_stem(t: OffsetDateTime) -> String {
    t.format(time::macros::format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))
    .unwrap_or_else(|_| "00000000_000000".into())
}

pub fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    Ok(dir.to_path_buf())
}

pub fn save_image(image: &DynamicImage, dir: &Path, stem: &str) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(format!("{stem}.png"));
    image
        .save_with_format(&path, ImageFormat::Png)
        .with_context(|| format!("write image {}", path.display()))?;
    Ok(path)
}

pub fn save_json<T: Serialize + ?Sized>(record: &T, dir: &Path, stem: &str) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(format!("{stem}.json"));
    let body = serde_json::to_string_pretty(record).context("serialize metadata")?;
    std::fs::write(&path, body).with_context(|| format!("write metadata {}", path.display()))?;
    Ok(path)
}

/// Persistence helper owned by a controller: a fixed output directory and a
/// stem prefix (`t2i`, `clf`).
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
    prefix: &'static str,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: &'static str) -> Self {
        Self {
            dir: dir.into(),
            prefix,
        }
    }

    pub fn next_stem(&self) -> String {
        format!("{}_{}", self.prefix, timestamp_stem())
    }

    /// Path `write_json` will produce for `stem`, known before anything is written.
    pub fn json_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.json"))
    }

    pub fn write_image(&self, image: &DynamicImage, stem: &str) -> Result<PathBuf> {
        save_image(image, &self.dir, stem)
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, record: &T, stem: &str) -> Result<PathBuf> {
        save_json(record, &self.dir, stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn stem_format_is_second_granular() {
        let t = datetime!(2024-03-07 09:05:01 UTC);
        assert_eq!(format_stem(t), "20240307_090501");
        let live = timestamp_stem();
        assert_eq!(live.len(), 15);
        assert_eq!(&live[8..9], "_");
    }

    #[test]
    fn ensure_dir_creates_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let p = ensure_dir(&tmp.path().join("x").join("y")).unwrap();
        assert!(p.is_dir());
    }

    #[test]
    fn json_is_indented_and_named_after_stem() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("outputs");
        let record = serde_json::json!({"ok": true, "task": "image-classification"});
        let p = save_json(&record, &out, "clf_20240101_000000").unwrap();
        assert_eq!(p, out.join("clf_20240101_000000.json"));
        let body = std::fs::read_to_string(&p).unwrap();
        assert!(body.contains("\n  \"ok\": true"));
    }

    #[test]
    fn image_is_written_as_png() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(tmp.path().join("out"), "t2i");
        let stem = writer.next_stem();
        assert!(stem.starts_with("t2i_"));
        let img = DynamicImage::new_rgb8(4, 3);
        let p = writer.write_image(&img, &stem).unwrap();
        assert_eq!(p, tmp.path().join("out").join(format!("{stem}.png")));
        let back = image::open(&p).unwrap();
        assert_eq!((back.width(), back.height()), (4, 3));
    }
}
