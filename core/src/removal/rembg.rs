use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;

use crate::config::MattingParams;
use crate::error::ProcessingError;
use crate::removal::CutoutModel;

/// Default address of `rembg s`.
pub const DEFAULT_REMBG_URL: &str = "http://127.0.0.1:7000";

/// Cutout model served by a rembg HTTP server (`POST /api/remove`).
pub struct RembgClient {
    endpoint: String,
    client: Client,
}

impl RembgClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProcessingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProcessingError::BackgroundRemoval(format!("HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: format!("{}/api/remove", base_url.trim_end_matches('/')),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl CutoutModel for RembgClient {
    fn cut_out(&self, png: &[u8], params: &MattingParams) -> Result<Vec<u8>, ProcessingError> {
        let request_err = |e: reqwest::Error| ProcessingError::BackgroundRemoval(e.to_string());

        let file = Part::bytes(png.to_vec())
            .file_name("input.png")
            .mime_str("image/png")
            .map_err(request_err)?;

        let form = Form::new()
            .part("file", file)
            .text("a", params.alpha_matting.to_string())
            .text("af", params.foreground_threshold.to_string())
            .text("ab", params.background_threshold.to_string())
            .text("ae", params.erode_size.to_string());

        log::debug!("POST {} ({} bytes)", self.endpoint, png.len());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .map_err(request_err)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ProcessingError::BackgroundRemoval(format!(
                "model server returned {}: {}",
                status,
                body.trim()
            )));
        }

        let bytes = response.bytes().map_err(request_err)?;
        Ok(bytes.to_vec())
    }
}
