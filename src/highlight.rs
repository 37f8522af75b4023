use crate::llm::{CompanionError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Language id used when the language is unknown (javascript)
pub const DEFAULT_LANGUAGE_ID: u32 = 63;

/// Map a language name to the highlighting service's numeric id
pub fn language_id(language: &str) -> u32 {
    match language.to_lowercase().as_str() {
        "javascript" => 63,
        "python" => 71,
        "java" => 62,
        "cpp" => 54,
        "c" => 50,
        "ruby" => 72,
        "go" => 60,
        "rust" => 73,
        "typescript" => 74,
        _ => DEFAULT_LANGUAGE_ID,
    }
}

#[derive(Debug, Serialize)]
struct ServiceRequest<'a> {
    source_code: &'a str,
    language_id: u32,
}

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Highlighted markup returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightResult {
    pub html: String,
    pub language: String,
    pub success: bool,
}

/// Client for the third-party syntax highlighting service
pub struct HighlightClient {
    client: Client,
    url: String,
    host: String,
    api_key: Option<String>,
}

impl HighlightClient {
    pub fn new(url: String, host: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url,
            host,
            api_key,
        }
    }

    pub async fn highlight(&self, code: &str, language: &str) -> Result<HighlightResult> {
        if code.is_empty() {
            return Err(CompanionError::Validation("Code is required".to_string()));
        }

        let request = ServiceRequest {
            source_code: code,
            language_id: language_id(language),
        };
        debug!(
            "Highlighting {} bytes as language {}",
            code.len(),
            request.language_id
        );

        let mut builder = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .header("X-RapidAPI-Host", &self.host)
            .json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("X-RapidAPI-Key", api_key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            warn!("Highlight service returned {}", response.status());
            return Err(CompanionError::Upstream(
                "Failed to highlight code".to_string(),
            ));
        }

        let data: ServiceResponse = response
            .json()
            .await
            .map_err(|e| CompanionError::Upstream(format!("Failed to parse response: {e}")))?;

        if let Some(error) = data.error {
            return Err(CompanionError::Upstream(error));
        }

        Ok(HighlightResult {
            html: data.html.unwrap_or_default(),
            language: language.to_string(),
            success: true,
        })
    }
}
