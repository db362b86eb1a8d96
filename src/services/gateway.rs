use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::models::evidence::StillImage;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Returned when the model answers with no text.
pub const DEFECT_FALLBACK_TEXT: &str = "Unable to analyze defect at this time.";
/// Returned when the defect call itself fails.
pub const DEFECT_FAILURE_TEXT: &str = "Error analyzing image. Please describe the defect manually.";
/// `extracted_info` of a document check that could not run.
pub const DOCUMENT_FAILURE_TEXT: &str = "Analysis failed.";

const VERIFIED_TOKEN: &str = "VERIFIED: YES";

const DEFECT_PROMPT: &str = concat!(
    "Analyze this vehicle image and identify any specific physical defects like scratches, ",
    "dents, or cracks. Provide a professional description and estimate the severity ",
    "(Low/Medium/High)."
);

/// Outcome of a registration document check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentCheck {
    pub verified: bool,
    pub extracted_info: String,
}

impl DocumentCheck {
    /// Verified iff the model's own text carries the affirmative token.
    pub fn from_text(text: String) -> Self {
        Self {
            verified: text.to_uppercase().contains(VERIFIED_TOKEN),
            extracted_info: text,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            verified: false,
            extracted_info: DOCUMENT_FAILURE_TEXT.to_string(),
        }
    }
}

/// External vision model used during an inspection.
///
/// Neither call fails: transport or quota problems come back as sentinel
/// values so a capture is never lost because the model was unreachable.
pub trait VisionGateway: Send + Sync {
    fn analyze_defect(&self, image: &StillImage) -> impl Future<Output = String> + Send;

    fn verify_document(
        &self,
        image: &StillImage,
        expected_plate: &str,
        expected_model: &str,
    ) -> impl Future<Output = DocumentCheck> + Send;
}

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Send one image plus a text prompt and return the model's text.
    async fn generate(
        &self,
        image: &StillImage,
        prompt: &str,
        config: Option<GenerationConfig>,
    ) -> Result<String, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::MissingApiKey);
        }

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let mut request_body = serde_json::json!({
            "contents": [{
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": image.mime_type(),
                            "data": image.to_base64(),
                        }
                    },
                    { "text": prompt }
                ]
            }]
        });
        if let Some(config) = config {
            request_body["generationConfig"] = serde_json::to_value(config)?;
        }

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;

        let body: GenerateResponse = response.json().await?;
        Ok(body.text())
    }
}

impl VisionGateway for GeminiClient {
    async fn analyze_defect(&self, image: &StillImage) -> String {
        let start = Instant::now();
        let config = GenerationConfig {
            temperature: 0.4,
            top_p: 0.8,
        };
        let result = self.generate(image, DEFECT_PROMPT, Some(config)).await;
        record_call("analyze_defect", result.is_ok(), start);

        defect_text(result)
    }

    async fn verify_document(
        &self,
        image: &StillImage,
        expected_plate: &str,
        expected_model: &str,
    ) -> DocumentCheck {
        let start = Instant::now();
        let prompt = format!(
            "This is a vehicle registration document. Verify if the License Plate \
             (Registration No) is \"{expected_plate}\" and the Car Model is related to \
             \"{expected_model}\". Return \"VERIFIED: YES\" if both match or are highly \
             similar, otherwise \"VERIFIED: NO\". Also list the extracted registration \
             number and model."
        );
        let result = self.generate(image, &prompt, None).await;
        record_call("verify_document", result.is_ok(), start);

        match result {
            Ok(text) => DocumentCheck::from_text(text),
            Err(e) => {
                error!(error = %e, plate = %expected_plate, "Registration verification failed");
                DocumentCheck::unavailable()
            }
        }
    }
}

/// Map a defect reply onto its sentinels. Only a reply with no text at all
/// gets the fallback; whitespace is passed through as the model sent it.
fn defect_text(result: Result<String, GatewayError>) -> String {
    match result {
        Ok(text) if text.is_empty() => DEFECT_FALLBACK_TEXT.to_string(),
        Ok(text) => {
            debug!(chars = text.len(), "Defect analysis received");
            text
        }
        Err(e) => {
            error!(error = %e, "Defect analysis failed");
            DEFECT_FAILURE_TEXT.to_string()
        }
    }
}

fn record_call(operation: &'static str, ok: bool, start: Instant) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!("gateway_calls_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("gateway_call_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Gemini API key is not configured")]
    MissingApiKey,
}
