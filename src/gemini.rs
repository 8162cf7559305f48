use anyhow::Result;
use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{Locale, PredictionConfig, PredictionVariant};
use crate::error::{PredictionError, classify_provider_failure};
use crate::http_client::http_client;
use crate::prompt::{build_prompt, response_schema};
use crate::state::{
    DATE_FORMAT, GroundingSource, Match, Outcome, Pick, PredictionBatch,
};

/// Anything that can turn a calendar day into a batch of predictions.
pub trait PredictionSource: Send + Sync {
    fn fetch(&self, date: NaiveDate) -> Result<PredictionBatch, PredictionError>;
}

/// Client for the Gemini `generateContent` endpoint with Google Search
/// grounding enabled. Exactly one provider call per `fetch`, no retries and
/// no caching.
#[derive(Debug)]
pub struct GeminiClient {
    client: Client,
    config: PredictionConfig,
}

impl GeminiClient {
    pub fn new(config: PredictionConfig) -> Result<Self> {
        let client = http_client(config.timeout)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }
}

impl PredictionSource for GeminiClient {
    fn fetch(&self, date: NaiveDate) -> Result<PredictionBatch, PredictionError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            warn!("prediction fetch skipped: no provider credential configured");
            return Err(PredictionError::CredentialMissing);
        };

        let prompt = build_prompt(
            date,
            self.config.variant,
            self.config.match_count,
            self.config.locale,
        );
        let body = build_request_body(&prompt, self.config.variant, self.config.thinking_budget);
        let url = generate_content_url(&self.config.api_base, &self.config.model);
        info!(
            date = %date.format(DATE_FORMAT),
            model = %self.config.model,
            "requesting predictions"
        );

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .map_err(transport_error)?;
        let status = resp.status();
        let raw = resp.text().map_err(transport_error)?;
        if !status.is_success() {
            let err = parse_error_body(status.as_u16(), &raw);
            warn!(status = status.as_u16(), code = err.kind_code(), "provider call failed: {err}");
            return Err(err);
        }

        match parse_generate_response(&raw, self.config.variant, self.config.locale) {
            Ok(batch) => {
                info!(
                    matches = batch.matches.len(),
                    sources = batch.sources.len(),
                    "predictions received"
                );
                Ok(batch)
            }
            Err(err) => {
                warn!(code = err.kind_code(), "provider response rejected: {err}");
                Err(err)
            }
        }
    }
}

pub fn generate_content_url(api_base: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        api_base.trim_end_matches('/'),
        model
    )
}

#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<RequestContent>,
    pub tools: Vec<Tool>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct RequestContent {
    pub role: &'static str,
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
pub struct RequestPart {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct Tool {
    pub google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
pub struct GoogleSearch {}

#[derive(Debug, Serialize)]
pub struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    pub response_mime_type: &'static str,
    #[serde(rename = "responseSchema")]
    pub response_schema: Value,
    #[serde(rename = "thinkingConfig", skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
pub struct ThinkingConfig {
    #[serde(rename = "thinkingBudget")]
    pub thinking_budget: u32,
}

pub fn build_request_body(
    prompt: &str,
    variant: PredictionVariant,
    thinking_budget: u32,
) -> GenerateRequest {
    GenerateRequest {
        contents: vec![RequestContent {
            role: "user",
            parts: vec![RequestPart {
                text: prompt.to_string(),
            }],
        }],
        tools: vec![Tool {
            google_search: GoogleSearch {},
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: response_schema(variant).clone(),
            thinking_config: (thinking_budget > 0).then_some(ThinkingConfig { thinking_budget }),
        },
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
    #[serde(rename = "groundingMetadata")]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroundingMetadata {
    #[serde(rename = "groundingChunks", default)]
    grounding_chunks: Vec<GroundingChunk>,
}

/// One citation entry from `groundingMetadata.groundingChunks`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    pub web: Option<WebChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebChunk {
    pub uri: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct MatchPayload {
    #[serde(default)]
    matches: Option<Vec<WireMatch>>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMatch {
    id: Option<Value>,
    home_team: Option<String>,
    away_team: Option<String>,
    league: Option<String>,
    prediction: Option<String>,
    start_time: Option<String>,
    market1: Option<String>,
    market2: Option<String>,
    confidence: Option<Value>,
    reasoning: Option<String>,
}

/// Turns a raw `generateContent` body into a validated batch.
///
/// Either every match validates against `variant` or the whole body is
/// rejected; a half-parsed list is never returned.
pub fn parse_generate_response(
    raw: &str,
    variant: PredictionVariant,
    locale: Locale,
) -> Result<PredictionBatch, PredictionError> {
    if raw.trim().is_empty() {
        return Err(PredictionError::EmptyResponse);
    }
    let envelope: GenerateResponse = serde_json::from_str(raw.trim())
        .map_err(|err| PredictionError::MalformedResponse(format!("invalid envelope: {err}")))?;

    if let Some(reason) = envelope
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        debug!(reason, "prompt blocked by provider");
        return Err(PredictionError::SafetyBlocked);
    }

    let Some(candidate) = envelope.candidates.into_iter().next() else {
        return Err(PredictionError::EmptyResponse);
    };

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(PredictionError::SafetyBlocked);
        }
        return Err(PredictionError::EmptyResponse);
    }

    let (matches, summary) = parse_match_payload(&text, variant)?;
    let chunks = candidate
        .grounding_metadata
        .map(|meta| meta.grounding_chunks)
        .unwrap_or_default();
    let sources = grounding_sources(&chunks, default_source_title(locale));

    Ok(PredictionBatch {
        matches,
        sources,
        summary,
    })
}

/// Parses the model's JSON text. A missing `matches` array is an empty list.
pub fn parse_match_payload(
    text: &str,
    variant: PredictionVariant,
) -> Result<(Vec<Match>, Option<String>), PredictionError> {
    let payload: MatchPayload = serde_json::from_str(text.trim())
        .map_err(|err| PredictionError::MalformedResponse(format!("invalid payload: {err}")))?;

    let matches = payload
        .matches
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(idx, wire)| convert_match(idx, wire, variant))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((matches, payload.summary))
}

fn convert_match(
    idx: usize,
    wire: WireMatch,
    variant: PredictionVariant,
) -> Result<Match, PredictionError> {
    let id = wire
        .id
        .as_ref()
        .and_then(id_string)
        .unwrap_or_else(|| format!("match-{idx}"));
    let home_team = required(wire.home_team, idx, "homeTeam")?;
    let away_team = required(wire.away_team, idx, "awayTeam")?;
    let league = required(wire.league, idx, "league")?;
    let reasoning = required(wire.reasoning, idx, "reasoning")?;
    let confidence = wire
        .confidence
        .as_ref()
        .and_then(parse_confidence)
        .ok_or_else(|| malformed_field(idx, "confidence"))?;

    let pick = match variant {
        PredictionVariant::CustomBet => Pick::CustomBet {
            market1: required(wire.market1, idx, "market1")?,
            market2: required(wire.market2, idx, "market2")?,
        },
        PredictionVariant::Outcome => {
            let code = required(wire.prediction, idx, "prediction")?;
            let outcome = Outcome::from_code(&code).ok_or_else(|| {
                PredictionError::MalformedResponse(format!(
                    "match {idx}: unknown prediction '{code}'"
                ))
            })?;
            Pick::Outcome {
                outcome,
                start_time: required(wire.start_time, idx, "startTime")?,
            }
        }
    };

    Ok(Match {
        id,
        home_team,
        away_team,
        league,
        pick,
        confidence,
        reasoning,
    })
}

fn required(value: Option<String>, idx: usize, field: &str) -> Result<String, PredictionError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| malformed_field(idx, field))
}

fn malformed_field(idx: usize, field: &str) -> PredictionError {
    PredictionError::MalformedResponse(format!("match {idx}: missing or invalid {field}"))
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts numbers and numeric strings ("85", "85%"), rounded into 0..=100.
pub fn parse_confidence(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}

/// Keeps every citation with a non-empty URI, in order and without dedup.
pub fn grounding_sources(chunks: &[GroundingChunk], default_title: &str) -> Vec<GroundingSource> {
    chunks
        .iter()
        .filter_map(|chunk| chunk.web.as_ref())
        .filter_map(|web| {
            let uri = web.uri.as_deref().map(str::trim).unwrap_or_default();
            if uri.is_empty() {
                return None;
            }
            let title = web
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(default_title);
            Some(GroundingSource {
                uri: uri.to_string(),
                title: title.to_string(),
            })
        })
        .collect()
}

pub fn default_source_title(locale: Locale) -> &'static str {
    match locale {
        Locale::Pt => "Fonte de Dados",
        Locale::En => "Data source",
    }
}

/// Classifies a non-2xx provider answer.
pub fn parse_error_body(status: u16, raw: &str) -> PredictionError {
    let text = match serde_json::from_str::<ErrorEnvelope>(raw.trim()) {
        Ok(envelope) if !envelope.error.status.is_empty() => {
            format!("{}: {}", envelope.error.status, envelope.error.message)
        }
        Ok(envelope) => envelope.error.message,
        Err(_) => raw.trim().to_string(),
    };
    classify_provider_failure(Some(status), &text)
}

fn transport_error(err: reqwest::Error) -> PredictionError {
    if err.is_timeout() {
        return PredictionError::Timeout;
    }
    classify_provider_failure(err.status().map(|s| s.as_u16()), &err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn confidence_is_rounded_and_clamped() {
        assert_eq!(parse_confidence(&json!(72.6)), Some(73));
        assert_eq!(parse_confidence(&json!(140)), Some(100));
        assert_eq!(parse_confidence(&json!(-3)), Some(0));
        assert_eq!(parse_confidence(&json!("85%")), Some(85));
        assert_eq!(parse_confidence(&json!("high")), None);
        assert_eq!(parse_confidence(&json!(null)), None);
    }

    #[test]
    fn request_body_enables_search_and_schema() {
        let body = build_request_body("hello", PredictionVariant::CustomBet, 2000);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["tools"][0]["google_search"], json!({}));
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            value["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            2000
        );
        assert_eq!(
            value["generationConfig"]["responseSchema"]["required"],
            json!(["matches"])
        );
    }

    #[test]
    fn zero_budget_omits_thinking_config() {
        let body = build_request_body("hello", PredictionVariant::Outcome, 0);
        let value = serde_json::to_value(&body).unwrap();
        assert!(value["generationConfig"].get("thinkingConfig").is_none());
    }

    #[test]
    fn url_joins_base_and_model() {
        assert_eq!(
            generate_content_url("https://example.test/v1beta/", "gemini-3-pro-preview"),
            "https://example.test/v1beta/models/gemini-3-pro-preview:generateContent"
        );
    }

    #[test]
    fn error_body_status_feeds_classifier() {
        let raw = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(parse_error_body(400, raw), PredictionError::CredentialInvalid);

        let raw = r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#;
        assert_eq!(
            parse_error_body(503, raw),
            PredictionError::Unknown("UNAVAILABLE: The model is overloaded.".to_string())
        );

        assert_eq!(
            parse_error_body(502, "<html>bad gateway</html>"),
            PredictionError::Unknown("<html>bad gateway</html>".to_string())
        );
    }

    #[test]
    fn credential_missing_fails_before_any_request() {
        let config = PredictionConfig {
            api_key: None,
            api_base: "http://127.0.0.1:9".to_string(),
            ..PredictionConfig::default()
        };
        let client = GeminiClient::new(config).expect("client builds");
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(client.fetch(date), Err(PredictionError::CredentialMissing));
    }
}
