pub mod gemini;

use async_trait::async_trait;
use futures::{ Future, Stream };
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ Content, GatewayError, GenerateContentResponse, LlmConfig };
use self::gemini::GeminiClient;

/// Cursor over partial responses. `None` means the stream is exhausted; an
/// `Err` item ends it with a failure.
pub type ResponseStream = Pin<
    Box<dyn Stream<Item = Result<GenerateContentResponse, GatewayError>> + Send>
>;

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate_content(
        &self,
        contents: &[Content]
    ) -> Result<GenerateContentResponse, GatewayError>;

    async fn generate_content_stream(
        &self,
        contents: &[Content]
    ) -> Result<ResponseStream, GatewayError>;

    fn model_name(&self) -> &str;
}

/// Per-request conversation with the model, seeded with prior turns.
pub struct ChatSession {
    model: Arc<dyn GenerativeModel>,
    pub history: Vec<Content>,
}

impl ChatSession {
    pub fn new(model: Arc<dyn GenerativeModel>, history: Vec<Content>) -> Self {
        Self { model, history }
    }

    pub async fn send_message(
        &mut self,
        text: &str
    ) -> Result<GenerateContentResponse, GatewayError> {
        let turn = Content::user_text(text);
        let contents = self.contents_with(turn.clone());
        let resp = self.model.generate_content(&contents).await?;

        if let Some(reply) = resp.candidates.first().and_then(|c| c.content.clone()) {
            self.history.push(turn);
            self.history.push(reply);
        }
        Ok(resp)
    }

    pub async fn send_message_stream(self, text: &str) -> Result<ResponseStream, GatewayError> {
        let contents = self.contents_with(Content::user_text(text));
        self.model.generate_content_stream(&contents).await
    }

    fn contents_with(&self, turn: Content) -> Vec<Content> {
        let mut contents = Vec::with_capacity(self.history.len() + 1);
        contents.extend(self.history.iter().cloned());
        contents.push(turn);
        contents
    }
}

pub fn create_streaming_response<T, F, Fut>(
    capacity: usize,
    response_fn: F
) -> ReceiverStream<T>
where
    T: Send + 'static,
    F: FnOnce(mpsc::Sender<T>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    ReceiverStream::new(rx)
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn GenerativeModel>, GatewayError> {
    let client = GeminiClient::from_config(config)?;
    Ok(Arc::new(client))
}
