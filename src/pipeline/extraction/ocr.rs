use serde::Deserialize;

use super::{ExtractionError, OcrEngine};

/// OCR over HTTP: multipart POST with the image in a `file` part.
pub struct HttpOcrClient {
    url: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

/// Either `{"text": "..."}` or `{"lines": ["...", ...]}`.
#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    lines: Option<Vec<String>>,
}

impl OcrResponse {
    fn into_text(self) -> Result<String, ExtractionError> {
        match (self.text, self.lines) {
            (Some(text), _) => Ok(text),
            (None, Some(lines)) => Ok(lines.join("\n")),
            (None, None) => Err(ExtractionError::OcrProcessing(
                "response has neither `text` nor `lines`".into(),
            )),
        }
    }
}

impl HttpOcrClient {
    pub fn new(
        url: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ExtractionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractionError::HttpClient(e.to_string()))?;

        Ok(Self {
            url: url.to_string(),
            api_key,
            client,
            timeout_secs,
        })
    }
}

impl OcrEngine for HttpOcrClient {
    fn ocr_image(&self, filename: &str, image_bytes: &[u8]) -> Result<String, ExtractionError> {
        let mime = mime_guess::from_path(filename).first_or_octet_stream();
        let part = reqwest::blocking::multipart::Part::bytes(image_bytes.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime.essence_str())
            .map_err(|e| ExtractionError::HttpClient(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new().part("file", part);

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(|e| {
            if e.is_connect() {
                ExtractionError::OcrConnection(self.url.clone())
            } else if e.is_timeout() {
                ExtractionError::HttpClient(format!(
                    "Request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                ExtractionError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::OcrUpstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OcrResponse = response
            .json()
            .map_err(|e| ExtractionError::OcrProcessing(e.to_string()))?;
        let text = parsed.into_text()?;
        tracing::debug!(filename, chars = text.len(), "OCR complete");
        Ok(text)
    }
}
