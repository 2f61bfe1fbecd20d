use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fast tier, used for the grounded summary and the conversational explanation.
pub const FLASH_MODEL: &str = "gemini-2.5-flash";
/// High-capability tier, used for the deep analysis.
pub const PRO_MODEL: &str = "gemini-2.5-pro";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const ANALYSIS_INSTRUCTION: &str = "You are an expert analyst. Provide a deep, structured, and comprehensive analysis of the user's query. Use markdown for formatting, including headings, lists, and bold text to improve readability.";

const CONVERSATIONAL_INSTRUCTION: &str = "You are a friendly and helpful AI assistant. Explain the user's query in a clear, conversational, and easy-to-understand way. Use analogies and simple language where helpful.";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("No Gemini API key configured. Set GEMINI_API_KEY or add gemini_api_key to the config file.")]
    MissingApiKey,
    #[error("Request to the Gemini API failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Gemini API error {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("The Gemini API returned no candidates.")]
    EmptyResponse,
}

/// A web source reference attached to a grounded answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub uri: String,
    pub title: Option<String>,
}

/// Normalized result of one backend call: flattened text plus any citations.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub text: String,
    pub citations: Vec<Citation>,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Instruction>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Instruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct Tool {
    #[serde(rename = "googleSearch")]
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(rename = "groundingMetadata", default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GroundingMetadata {
    #[serde(rename = "groundingChunks", default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    title: String,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    flash_model: String,
    pro_model: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            flash_model: FLASH_MODEL.to_string(),
            pro_model: PRO_MODEL.to_string(),
        }
    }

    /// Override the model ids for the fast and high-capability tiers.
    pub fn with_models(mut self, flash: Option<String>, pro: Option<String>) -> Self {
        if let Some(model) = flash {
            self.flash_model = model;
        }
        if let Some(model) = pro {
            self.pro_model = model;
        }
        self
    }

    /// Factual, concise summary grounded with web search.
    pub async fn grounded_search(&self, query: &str, url: &str) -> Result<SearchResponse, GeminiError> {
        self.generate(&self.flash_model, grounded_request(query, url)).await
    }

    /// Structured, comprehensive markdown analysis. No grounding.
    pub async fn deep_analysis(&self, query: &str, url: &str) -> Result<SearchResponse, GeminiError> {
        self.generate(&self.pro_model, analysis_request(query, url)).await
    }

    /// Friendly, analogy-driven plain-language explanation. No grounding.
    pub async fn conversational_explanation(
        &self,
        query: &str,
        url: &str,
    ) -> Result<SearchResponse, GeminiError> {
        self.generate(&self.flash_model, conversational_request(query, url)).await
    }

    async fn generate(
        &self,
        model: &str,
        request: GenerateRequest,
    ) -> Result<SearchResponse, GeminiError> {
        let endpoint = format!("{}/{}:generateContent", API_BASE, model);
        tracing::debug!(model, "sending generateContent request");

        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(GeminiError::Api { status, message });
        }

        let body: GenerateResponse = response.json().await?;
        normalize(body)
    }
}

/// Append the contextual-URL instruction when a URL was supplied.
fn with_url_context(prompt: &str, url: &str) -> String {
    if url.trim().is_empty() {
        return prompt.to_string();
    }
    format!(
        "{}\n\nPlease use the content from the following URL as additional context. If it's a social media link, consider the conversational tone and public sentiment in your response: {}",
        prompt, url
    )
}

fn user_content(text: String) -> Vec<Content> {
    vec![Content {
        role: "user".to_string(),
        parts: vec![Part { text }],
    }]
}

fn grounded_request(query: &str, url: &str) -> GenerateRequest {
    let prompt = format!("Provide a factual, concise summary for the query: \"{}\".", query);
    GenerateRequest {
        contents: user_content(with_url_context(&prompt, url)),
        tools: Some(vec![Tool {
            google_search: GoogleSearch {},
        }]),
        system_instruction: None,
    }
}

fn analysis_request(query: &str, url: &str) -> GenerateRequest {
    GenerateRequest {
        contents: user_content(with_url_context(query, url)),
        tools: None,
        system_instruction: Some(Instruction {
            parts: vec![Part {
                text: ANALYSIS_INSTRUCTION.to_string(),
            }],
        }),
    }
}

fn conversational_request(query: &str, url: &str) -> GenerateRequest {
    GenerateRequest {
        contents: user_content(with_url_context(query, url)),
        tools: None,
        system_instruction: Some(Instruction {
            parts: vec![Part {
                text: CONVERSATIONAL_INSTRUCTION.to_string(),
            }],
        }),
    }
}

/// Flatten the raw response into display shape. Only the first candidate is
/// read; missing grounding metadata yields an empty citation list.
fn normalize(response: GenerateResponse) -> Result<SearchResponse, GeminiError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(GeminiError::EmptyResponse)?;

    let text: String = candidate
        .content
        .unwrap_or_default()
        .parts
        .into_iter()
        .map(|part| part.text)
        .collect();

    let citations = candidate
        .grounding_metadata
        .map(|meta| meta.grounding_chunks)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|chunk| chunk.web)
        .filter(|web| !web.uri.is_empty())
        .map(|web| Citation {
            uri: web.uri,
            title: if web.title.is_empty() { None } else { Some(web.title) },
        })
        .collect();

    Ok(SearchResponse { text, citations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const URL_MARKER: &str = "Please use the content from the following URL as additional context";

    #[test]
    fn url_context_appends_instruction_verbatim() {
        let prompt = with_url_context("capital of France", "https://example.com/post");
        assert!(prompt.starts_with("capital of France\n\n"));
        assert!(prompt.contains(URL_MARKER));
        assert!(prompt.contains("conversational tone and public sentiment"));
        assert!(prompt.ends_with("https://example.com/post"));
    }

    #[test]
    fn blank_url_leaves_prompt_untouched() {
        assert_eq!(with_url_context("a question", ""), "a question");
        assert_eq!(with_url_context("a question", "   "), "a question");
    }

    fn first_prompt(request: &GenerateRequest) -> String {
        let value = serde_json::to_value(request).unwrap();
        value["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn grounded_request_wraps_query_and_enables_search() {
        let request = grounded_request("capital of France", "");
        assert_eq!(
            first_prompt(&request),
            "Provide a factual, concise summary for the query: \"capital of France\"."
        );

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["tools"][0]["googleSearch"], json!({}));
        assert!(value.get("systemInstruction").is_none());
    }

    #[test]
    fn analysis_request_sets_instruction_and_no_tools() {
        let request = analysis_request("why is the sky blue", "");
        assert_eq!(first_prompt(&request), "why is the sky blue");

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        let instruction = value["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(instruction.contains("expert analyst"));
        assert!(instruction.contains("markdown"));
    }

    #[test]
    fn conversational_request_sets_instruction_and_no_tools() {
        let request = conversational_request("why is the sky blue", "");
        assert_eq!(first_prompt(&request), "why is the sky blue");

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        let instruction = value["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(instruction.contains("friendly"));
        assert!(instruction.contains("analogies"));
    }

    #[test]
    fn all_variants_carry_the_url_suffix() {
        let url = "https://example.com/post";
        for request in [
            grounded_request("capital of France", url),
            analysis_request("capital of France", url),
            conversational_request("capital of France", url),
        ] {
            let prompt = first_prompt(&request);
            assert!(prompt.contains(URL_MARKER));
            assert!(prompt.ends_with(url));
        }
    }

    fn parse(value: Value) -> GenerateResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn normalize_concatenates_parts_of_first_candidate() {
        let response = parse(json!({
            "candidates": [
                { "content": { "parts": [ { "text": "Paris " }, { "text": "is the capital." } ] } },
                { "content": { "parts": [ { "text": "ignored" } ] } }
            ]
        }));
        let normalized = normalize(response).unwrap();
        assert_eq!(normalized.text, "Paris is the capital.");
        assert!(normalized.citations.is_empty());
    }

    #[test]
    fn normalize_filters_citations_without_uri() {
        let response = parse(json!({
            "candidates": [{
                "content": { "parts": [ { "text": "answer" } ] },
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://a.example", "title": "A" } },
                        { "web": { "uri": "", "title": "dropped" } },
                        { },
                        { "web": { "uri": "https://b.example", "title": "" } }
                    ]
                }
            }]
        }));
        let normalized = normalize(response).unwrap();
        assert_eq!(
            normalized.citations,
            vec![
                Citation {
                    uri: "https://a.example".to_string(),
                    title: Some("A".to_string()),
                },
                Citation {
                    uri: "https://b.example".to_string(),
                    title: None,
                },
            ]
        );
    }

    #[test]
    fn normalize_treats_missing_metadata_as_no_citations() {
        let response = parse(json!({
            "candidates": [ { "content": { "parts": [ { "text": "plain" } ] } } ]
        }));
        let normalized = normalize(response).unwrap();
        assert_eq!(normalized.text, "plain");
        assert!(normalized.citations.is_empty());
    }

    #[test]
    fn normalize_rejects_empty_candidate_list() {
        let response = parse(json!({ "candidates": [] }));
        assert!(matches!(normalize(response), Err(GeminiError::EmptyResponse)));

        let response = parse(json!({}));
        assert!(matches!(normalize(response), Err(GeminiError::EmptyResponse)));
    }

    #[test]
    fn error_messages_read_as_single_line_text() {
        let missing = GeminiError::MissingApiKey.to_string();
        assert!(missing.contains("GEMINI_API_KEY"));

        let api = GeminiError::Api {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "Quota exceeded".to_string(),
        };
        let rendered = api.to_string();
        assert!(rendered.contains("429"));
        assert!(rendered.contains("Quota exceeded"));
    }
}
