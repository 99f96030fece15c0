pub mod chat;
pub mod response;

use serde::{ Deserialize, Serialize };
use serde_json::{ Map, Value };
use thiserror::Error;

#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("API key is required for the Gemini client")]
    MissingApiKey,
    #[error("invalid model endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("request to model failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model returned {status}: {message}")]
    Status {
        status: u16,
        message: String,
    },
    #[error("could not decode model response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("model stream broke off: {0}")]
    Stream(String),
}

/// A turn in the gateway's native shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<Part>>,
}

impl Content {
    pub fn new(role: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            role: role.into(),
            parts: Some(parts),
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new("user", vec![Part::text(text)])
    }
}

/// A content part. Anything that is not a plain text part (function calls,
/// inline data, executable code...) is kept as its raw JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    Other(Map<String, Value>),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<Value>,
}

impl GenerateContentResponse {
    /// Response with a single candidate holding the given parts.
    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content::new("model", parts)),
                finish_reason: None,
            }],
            prompt_feedback: None,
        }
    }
}
