//! Image → NCHW tensor, driven by a Hugging Face `preprocessor_config.json`.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use serde::Deserialize;
use std::path::Path;

// ImageNet normalization, used when no preprocessor config ships with the model
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    ShortestEdge { shortest_edge: u32 },
    Exact { height: u32, width: u32 },
    Square(u32),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Preprocess {
    #[serde(default = "enabled")]
    pub do_resize: bool,
    pub size: Option<SizeSpec>,
    #[serde(default = "enabled")]
    pub do_center_crop: bool,
    pub crop_size: Option<SizeSpec>,
    #[serde(default = "enabled")]
    pub do_rescale: bool,
    #[serde(default = "default_rescale_factor")]
    pub rescale_factor: f32,
    #[serde(default)]
    pub do_normalize: bool,
    pub image_mean: Option<Vec<f32>>,
    pub image_std: Option<Vec<f32>>,
    /// MobileViT checkpoints expect BGR input.
    #[serde(default)]
    pub do_flip_channel_order: bool,
}

fn enabled() -> bool {
    true
}

fn default_rescale_factor() -> f32 {
    1.0 / 255.0
}

impl Default for Preprocess {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: Some(SizeSpec::ShortestEdge { shortest_edge: 256 }),
            do_center_crop: true,
            crop_size: Some(SizeSpec::Square(224)),
            do_rescale: true,
            rescale_factor: default_rescale_factor(),
            do_normalize: true,
            image_mean: Some(IMAGENET_MEAN.to_vec()),
            image_std: Some(IMAGENET_STD.to_vec()),
            do_flip_channel_order: false,
        }
    }
}

impl Preprocess {
    /// Read `preprocessor_config.json` from `model_dir`, defaults when absent.
    pub fn from_model_dir(model_dir: &Path) -> Result<Self> {
        let path = model_dir.join("preprocessor_config.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
    }

    fn resized(&self, img: &DynamicImage) -> DynamicImage {
        if !self.do_resize {
            return img.clone();
        }
        let (w, h) = (img.width().max(1), img.height().max(1));
        let (new_w, new_h) = match self.size {
            Some(SizeSpec::ShortestEdge { shortest_edge }) => {
                let target = shortest_edge as f32;
                if w < h {
                    (shortest_edge, ((h as f32 / w as f32) * target).round() as u32)
                } else {
                    (((w as f32 / h as f32) * target).round() as u32, shortest_edge)
                }
            }
            Some(SizeSpec::Exact { height, width }) => (width, height),
            Some(SizeSpec::Square(s)) => (s, s),
            None => (w, h),
        };
        img.resize_exact(new_w.max(1), new_h.max(1), FilterType::Triangle)
    }

    fn crop_dims(&self, img: &DynamicImage) -> (u32, u32) {
        match (self.do_center_crop, self.crop_size) {
            (true, Some(SizeSpec::Exact { height, width })) => (width, height),
            (true, Some(SizeSpec::Square(s))) => (s, s),
            (true, Some(SizeSpec::ShortestEdge { shortest_edge })) => {
                (shortest_edge, shortest_edge)
            }
            _ => (img.width(), img.height()),
        }
    }

    /// Resize, center-crop and normalize into a `[1, 3, H, W]` tensor.
    pub fn tensor(&self, img: &DynamicImage) -> Result<Array4<f32>> {
        let resized = self.resized(img);
        let (crop_w, crop_h) = self.crop_dims(&resized);
        let x = resized.width().saturating_sub(crop_w) / 2;
        let y = resized.height().saturating_sub(crop_h) / 2;
        let cropped = resized.crop_imm(x, y, crop_w, crop_h);
        // crop_imm clamps to the image; pad smaller images back up to the crop
        let rgb = if cropped.width() != crop_w || cropped.height() != crop_h {
            cropped
                .resize_exact(crop_w, crop_h, FilterType::Triangle)
                .to_rgb8()
        } else {
            cropped.to_rgb8()
        };

        let scale = if self.do_rescale { self.rescale_factor } else { 1.0 };
        let (mean, std) = match (self.do_normalize, &self.image_mean, &self.image_std) {
            (true, Some(m), Some(s)) if m.len() == 3 && s.len() == 3 => {
                ([m[0], m[1], m[2]], [s[0], s[1], s[2]])
            }
            _ => ([0.0; 3], [1.0; 3]),
        };
        let order: [usize; 3] = if self.do_flip_channel_order {
            [2, 1, 0]
        } else {
            [0, 1, 2]
        };

        let (w, h) = (crop_w as usize, crop_h as usize);
        let mut tensor = Array4::<f32>::zeros((1, 3, h, w));
        for (px, py, pixel) in rgb.enumerate_pixels() {
            for (c, &src) in order.iter().enumerate() {
                let v = pixel.0[src] as f32 * scale;
                tensor[[0, c, py as usize, px as usize]] = (v - mean[c]) / std[c];
            }
        }
        Ok(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn parses_mobilevit_style_config() {
        let raw = r#"{
            "crop_size": {"height": 256, "width": 256},
            "do_center_crop": true,
            "do_flip_channel_order": true,
            "do_rescale": true,
            "do_resize": true,
            "resample": 2,
            "rescale_factor": 0.00392156862745098,
            "size": {"shortest_edge": 288}
        }"#;
        let p: Preprocess = serde_json::from_str(raw).unwrap();
        assert_eq!(p.size, Some(SizeSpec::ShortestEdge { shortest_edge: 288 }));
        assert_eq!(p.crop_size, Some(SizeSpec::Exact { height: 256, width: 256 }));
        assert!(p.do_flip_channel_order);
        assert!(!p.do_normalize);
    }

    #[test]
    fn tensor_has_crop_shape_for_any_aspect_ratio() {
        let p = Preprocess::default();
        for (w, h) in [(640, 480), (100, 300), (224, 224)] {
            let img = DynamicImage::new_rgb8(w, h);
            let t = p.tensor(&img).unwrap();
            assert_eq!(t.shape(), &[1, 3, 224, 224]);
        }
    }

    #[test]
    fn channel_flip_swaps_red_and_blue() {
        let mut raw = RgbImage::new(2, 2);
        for px in raw.pixels_mut() {
            *px = Rgb([255, 0, 0]);
        }
        let img = DynamicImage::ImageRgb8(raw);
        let p = Preprocess {
            size: Some(SizeSpec::Square(2)),
            crop_size: Some(SizeSpec::Square(2)),
            do_normalize: false,
            do_flip_channel_order: true,
            ..Preprocess::default()
        };
        let t = p.tensor(&img).unwrap();
        assert_eq!(t[[0, 0, 0, 0]], 0.0);
        assert!((t[[0, 2, 0, 0]] - 1.0).abs() < 1e-6);
    }
}
