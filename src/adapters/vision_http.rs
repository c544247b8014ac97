use crate::core::decoder::{self, DecodeError};
use crate::domain::model::RawLabels;
use crate::domain::ports::VisionOracle;
use crate::utils::error::{AgentError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_PROMPT: &str = r#"Analyze this chess board image and identify all pieces.

For each piece, provide its square location (a1-h8), piece type (pawn, knight, bishop, rook, queen, king), and color (white, black).

Return ONLY a JSON object like this:
{"a1": {"piece": "rook", "color": "white"}, "e4": {"piece": "pawn", "color": "black"}}

Use lowercase, algebraic notation, and only include occupied squares."#;

/// Hosted vision-language model behind an inference HTTP endpoint.
pub struct HttpVisionOracle {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
    prompt: String,
    timeout: Duration,
    loading_retry_delay: Duration,
}

impl HttpVisionOracle {
    pub fn new(endpoint: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_token,
            prompt: DEFAULT_PROMPT.to_string(),
            timeout: Duration::from_secs(30),
            loading_retry_delay: Duration::from_secs(20),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait before the single retry when the model is still loading (503).
    pub fn with_loading_retry_delay(mut self, delay: Duration) -> Self {
        self.loading_retry_delay = delay;
        self
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(payload);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }
}

#[async_trait]
impl VisionOracle for HttpVisionOracle {
    async fn read_board(&self, frame: &[u8]) -> Result<RawLabels> {
        let payload = json!({
            "inputs": {
                "image": STANDARD.encode(frame),
                "question": self.prompt,
            },
            "parameters": {
                "max_new_tokens": 1024,
                "temperature": 0.1,
            }
        });

        tracing::debug!("Making vision request to: {}", self.endpoint);
        let mut response = self.post(&payload).await?;
        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!(
                "⏳ Vision model is loading, retrying in {:?}",
                self.loading_retry_delay
            );
            tokio::time::sleep(self.loading_retry_delay).await;
            response = self.post(&payload).await?;
        }

        let status = response.status();
        tracing::debug!("Vision response status: {}", status);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::VisionError {
                message: format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>()),
            });
        }

        let body: Value = response.json().await?;
        let text = generated_text(&body);
        tracing::debug!(preview = %text.chars().take(200).collect::<String>(), "vision reply");
        let labels = parse_reply(&text)?;
        tracing::info!("👁️ Vision oracle reported {} squares", labels.len());
        Ok(labels)
    }
}

/// Pulls the generated text out of the usual inference response shapes.
fn generated_text(body: &Value) -> String {
    let field = |v: &Value| {
        v.get("generated_text")
            .or_else(|| v.get("answer"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    match body {
        Value::Array(items) => items.first().and_then(field).unwrap_or_default(),
        Value::Object(_) => field(body).unwrap_or_else(|| body.to_string()),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Parses a model reply into square labels.
///
/// The first `{` to the last `}` is tried as a JSON object whose values are
/// either label strings or `{"piece": .., "color": ..}` objects. When that
/// fails, lines such as `e4: black pawn` are read instead.
pub fn parse_reply(text: &str) -> std::result::Result<RawLabels, DecodeError> {
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text[start..=end]) {
                let mut raw = BTreeMap::new();
                for (square, value) in map {
                    raw.insert(square.trim().to_ascii_lowercase(), json_label(&square, &value)?);
                }
                return decoder::parse_squares(raw);
            }
        }
        tracing::warn!("Could not parse JSON from vision reply, trying text parsing");
    }
    parse_text_reply(text)
}

fn json_label(square: &str, value: &Value) -> std::result::Result<String, DecodeError> {
    match value {
        Value::String(label) => Ok(label.clone()),
        Value::Null => Ok("empty".to_string()),
        Value::Object(fields) => {
            let piece = fields.get("piece").and_then(Value::as_str);
            let color = fields.get("color").and_then(Value::as_str);
            match (color, piece) {
                (Some(color), Some(piece)) => Ok(format!("{}_{}", color, piece)),
                _ => Err(DecodeError::Malformed(format!(
                    "square {} has no piece/color: {}",
                    square, value
                ))),
            }
        }
        other => Err(DecodeError::Malformed(format!(
            "unexpected label for {}: {}",
            square, other
        ))),
    }
}

fn parse_text_reply(text: &str) -> std::result::Result<RawLabels, DecodeError> {
    let pattern = Regex::new(r"\b([a-h][1-8])\b\s*[:=\-]?\s*(white|black)\s+(pawn|knight|bishop|rook|queen|king)\b")
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let lowered = text.to_ascii_lowercase();
    let mut raw = BTreeMap::new();
    for caps in pattern.captures_iter(&lowered) {
        raw.insert(caps[1].to_string(), format!("{}_{}", &caps[2], &caps[3]));
    }
    if raw.is_empty() && !text.trim().is_empty() {
        return Err(DecodeError::Malformed(format!(
            "no board found in reply: {}",
            text.chars().take(120).collect::<String>()
        )));
    }
    decoder::parse_squares(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Square;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn test_both_json_shapes() {
        let reply = r#"Sure! Here is the board:
{"e2": "white pawn", "E8": {"piece": "king", "color": "black"}, "d4": null}
Hope that helps."#;
        let labels = parse_reply(reply).unwrap();
        assert_eq!(labels[&sq("e2")], "white pawn");
        assert_eq!(labels[&sq("e8")], "black_king");
        assert_eq!(labels[&sq("d4")], "empty");
    }

    #[test]
    fn test_text_fallback() {
        let reply = "I see:\ne4: black pawn\nWhite King on... g1 - white king\nnothing else";
        let labels = parse_reply(reply).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[&sq("e4")], "black_pawn");
        assert_eq!(labels[&sq("g1")], "white_king");
    }

    #[test]
    fn test_unknown_square_rejected() {
        assert_eq!(
            parse_reply(r#"{"z9": "white pawn"}"#),
            Err(DecodeError::UnknownSquare("z9".to_string()))
        );
    }

    #[test]
    fn test_prose_without_board_is_malformed() {
        assert!(matches!(
            parse_reply("I cannot see a chess board in this image."),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_generated_text_shapes() {
        assert_eq!(generated_text(&json!([{"generated_text": "{}"}])), "{}");
        assert_eq!(generated_text(&json!({"answer": "e4: white pawn"})), "e4: white pawn");
        assert_eq!(generated_text(&json!("raw")), "raw");
    }
}
