//! Text-to-image over an OpenAI-compatible `/images/generations` endpoint.

use super::{GenerationRequest, TextToImagePipeline};
use anyhow::{anyhow, bail, Context, Result};
use base64::Engine;
use image::DynamicImage;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;

// Diffusion on CPU can take minutes per image.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ImageServerPipeline {
    base_url: String,
    model: String,
    device: String,
    client: Client,
}

impl ImageServerPipeline {
    /// Build the client and check that the server answers and serves `model`.
    pub fn connect(base_url: &str, model: &str, device: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build HTTP client")?;

        let url = format!("{base_url}/models");
        let resp = client
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .with_context(|| {
                format!("Could not reach image server at {url}. Verify the server is running.")
            })?;
        if !resp.status().is_success() {
            bail!("Image server at {url} answered with status {}", resp.status());
        }
        let listing: Value = resp.json().unwrap_or(Value::Null);
        if !serves_model(&listing, model) {
            bail!("Model {model} is not served by {base_url}");
        }

        Ok(Self {
            base_url,
            model: model.to_string(),
            device: device.to_string(),
            client,
        })
    }
}

/// At most `max` characters of a response body, for error messages.
fn snippet(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// An empty or unparseable listing is taken as "serves anything".
fn serves_model(listing: &Value, model: &str) -> bool {
    match listing["data"].as_array() {
        Some(models) if !models.is_empty() => models
            .iter()
            .any(|m| m["id"].as_str() == Some(model)),
        _ => true,
    }
}

fn request_body(model: &str, req: &GenerationRequest<'_>) -> Value {
    let mut body = json!({
        "model": model,
        "prompt": req.prompt,
        "size": format!("{}x{}", req.width, req.height),
        "width": req.width,
        "height": req.height,
        "n": 1,
        "num_inference_steps": req.steps,
        "guidance_scale": req.guidance_scale,
        "response_format": "b64_json",
    });
    if let Some(negative) = req.negative_prompt {
        body["negative_prompt"] = json!(negative);
    }
    body
}

fn decode_base64_image(b64: &str) -> Result<DynamicImage> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .context("decode base64 image data")?;
    image::load_from_memory(&bytes).context("decode generated image")
}

impl TextToImagePipeline for ImageServerPipeline {
    fn generate(&mut self, request: &GenerationRequest<'_>) -> Result<DynamicImage> {
        let url = format!("{}/images/generations", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&request_body(&self.model, request))
            .send()
            .with_context(|| format!("Could not send request to {url}"))?;

        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        if !status.is_success() {
            bail!("Request to {url} failed with status {status}: {text}");
        }

        let body: Value = serde_json::from_str(&text).with_context(|| {
            format!(
                "Failed to parse response from {url}: {}",
                snippet(&text, 200)
            )
        })?;
        let first = &body["data"][0];
        if let Some(b64) = first["b64_json"].as_str() {
            return decode_base64_image(b64);
        }
        if let Some(image_url) = first["url"].as_str() {
            let bytes = self
                .client
                .get(image_url)
                .send()
                .and_then(|r| r.error_for_status())
                .and_then(|r| r.bytes())
                .with_context(|| format!("Failed to fetch image from {image_url}"))?;
            return image::load_from_memory(&bytes).context("decode generated image");
        }
        Err(anyhow!(
            "Response from {url} does not contain image data in a recognized format"
        ))
    }

    fn device(&self) -> &str {
        &self.device
    }
}
