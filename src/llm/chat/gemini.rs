use async_trait::async_trait;
use eventsource_stream::{ EventStreamError, Eventsource };
use futures::{ Stream, StreamExt };
use log::{ debug, info };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::fmt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use url::Url;

use super::{ create_streaming_response, GenerativeModel, ResponseStream };
use crate::llm::{ Content, GatewayError, GenerateContentResponse, LlmConfig };

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

type ResponseItem = Result<GenerateContentResponse, GatewayError>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    candidate_count: u32,
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    message: String,
}

pub struct GeminiClient {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, GatewayError> {
        if api_key.trim().is_empty() {
            return Err(GatewayError::MissingApiKey);
        }
        let model = model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = Self {
            http: HttpClient::new(),
            api_key,
            model,
            base_url,
        };
        // Fail at startup rather than on the first request.
        client.endpoint("generateContent")?;
        Ok(client)
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, GatewayError> {
        let api_key = config.api_key.clone().ok_or(GatewayError::MissingApiKey)?;
        Self::new(api_key, config.model.clone(), config.base_url.clone())
    }

    fn endpoint(&self, method: &str) -> Result<Url, GatewayError> {
        let url = Url::parse(
            &format!("{}/models/{}:{}", self.base_url.trim_end_matches('/'), self.model, method)
        )?;
        Ok(url)
    }

    async fn post(&self, url: Url, contents: &[Content]) -> Result<reqwest::Response, GatewayError> {
        let body = GenerateContentRequest {
            contents,
            generation_config: GenerationConfig { candidate_count: 1 },
        };
        let resp = self.http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate_content(
        &self,
        contents: &[Content]
    ) -> Result<GenerateContentResponse, GatewayError> {
        let url = self.endpoint("generateContent")?;
        debug!("GeminiClient::generate_content() → model={} turns={}", self.model, contents.len());

        let resp = self.post(url, contents).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn generate_content_stream(
        &self,
        contents: &[Content]
    ) -> Result<ResponseStream, GatewayError> {
        let mut url = self.endpoint("streamGenerateContent")?;
        url.query_pairs_mut().append_pair("alt", "sse");
        debug!(
            "GeminiClient::generate_content_stream() → model={} turns={}",
            self.model,
            contents.len()
        );

        let resp = self.post(url, contents).await?;
        info!("Streaming response from {}", self.model);
        Ok(Box::pin(sse_responses(resp.bytes_stream())))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<GoogleErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn stream_error<E>(err: EventStreamError<E>) -> GatewayError
where
    E: fmt::Display,
    GatewayError: From<E>,
{
    match err {
        EventStreamError::Transport(e) => GatewayError::from(e),
        other => GatewayError::Stream(other.to_string()),
    }
}

/// Decodes each SSE event's data into a response. Stops reading upstream
/// after the first error or once the receiver is dropped.
fn sse_responses<S, B, E>(bytes: S) -> ReceiverStream<ResponseItem>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
    GatewayError: From<E>,
{
    create_streaming_response(32, move |tx: mpsc::Sender<ResponseItem>| async move {
        let mut events = Box::pin(bytes.eventsource());

        while let Some(event) = events.next().await {
            let item = match event {
                Ok(event) if event.data.trim().is_empty() => continue,
                Ok(event) => serde_json::from_str(&event.data).map_err(<GatewayError as From<serde_json::Error>>::from),
                Err(e) => Err(stream_error(e)),
            };
            let failed = item.is_err();
            if tx.send(item).await.is_err() {
                debug!("SSE consumer went away, closing upstream stream");
                return;
            }
            if failed {
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::response::response_string;
    use futures::stream;
    use serde_json::json;

    fn client() -> GeminiClient {
        GeminiClient::new("key".into(), None, Some("http://localhost:8080/v1beta/".into())).unwrap()
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(
            GeminiClient::new("  ".into(), None, None),
            Err(GatewayError::MissingApiKey)
        ));
        assert!(matches!(
            GeminiClient::from_config(&LlmConfig::default()),
            Err(GatewayError::MissingApiKey)
        ));
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let res = GeminiClient::new("key".into(), None, Some("not a url".into()));
        assert!(matches!(res, Err(GatewayError::Endpoint(_))));
    }

    #[test]
    fn endpoint_includes_model_and_method() {
        let c = client();
        assert_eq!(c.model_name(), DEFAULT_MODEL);
        assert_eq!(
            c.endpoint("generateContent").unwrap().as_str(),
            "http://localhost:8080/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn request_body_asks_for_one_candidate() {
        let contents = vec![Content::user_text("hi")];
        let body = GenerateContentRequest {
            contents: &contents,
            generation_config: GenerationConfig { candidate_count: 1 },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hi" }] }],
                "generationConfig": { "candidateCount": 1 }
            })
        );
    }

    #[test]
    fn error_message_prefers_google_error_field() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(error_message(body), "API key not valid.");
        assert_eq!(error_message("  upstream down \n"), "upstream down");
    }

    async fn collect_items(raw: &[&'static str]) -> Vec<ResponseItem> {
        let chunks: Vec<Result<&'static [u8], GatewayError>> = raw
            .iter()
            .map(|c| Ok(c.as_bytes()))
            .collect();
        sse_responses(stream::iter(chunks)).collect().await
    }

    #[tokio::test]
    async fn sse_responses_joins_multi_line_data() {
        let items = collect_items(&[
            "data: {\"candidates\":\n",
            "data: [{\"content\":{\"parts\":[{\"text\":\"a\"}]}}]}\n\n",
        ]).await;

        assert_eq!(items.len(), 1);
        assert_eq!(response_string(items[0].as_ref().unwrap()).unwrap(), "a");
    }

    #[tokio::test]
    async fn sse_responses_skips_comments_and_empty_events() {
        let items = collect_items(&[
            ": keep-alive\n\n",
            "event: message\ndata:\n\n",
            "data: {\"candidates\":[]}\n\n",
        ]).await;

        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap().candidates.is_empty());
    }

    #[tokio::test]
    async fn sse_responses_stops_at_undecodable_event() {
        let items = collect_items(&[
            "data: {oops\n\n",
            "data: {\"candidates\":[]}\n\n",
        ]).await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(GatewayError::Decode(_))));
    }

    #[tokio::test]
    async fn sse_responses_handles_lines_split_across_chunks() {
        let chunks: Vec<Result<&'static [u8], GatewayError>> = vec![
            Ok(&b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"a\"}]}}]}\r\n\r\nda"[..]),
            Ok(&b"ta: {\"candidates\":[{\"content\":{\"parts\":[{\"te"[..]),
            Ok(&b"xt\":\"b\"}]}}]}\n\n"[..]),
        ];
        let texts: Vec<String> = sse_responses(stream::iter(chunks))
            .map(|r| response_string(&r.unwrap()).unwrap())
            .collect().await;

        assert_eq!(texts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn sse_responses_stops_after_upstream_error() {
        let chunks: Vec<Result<&'static [u8], GatewayError>> = vec![
            Ok(&b"data: {\"candidates\":[]}\n\n"[..]),
            Err(GatewayError::Status { status: 503, message: "gone".into() }),
            Ok(&b"data: {\"candidates\":[]}\n\n"[..]),
        ];
        let items: Vec<_> = sse_responses(stream::iter(chunks)).collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(GatewayError::Status { status: 503, .. })));
    }
}
