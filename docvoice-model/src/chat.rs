//! Plain request/response chat used outside a live call.

use crate::model::TextModel;
use docvoice_core::Message;
use futures::{Stream, StreamExt};
use std::sync::Arc;

pub const EMPTY_REPLY: &str = "I'm sorry, I didn't catch that.";
pub const REQUEST_FAILED_REPLY: &str =
    "I am having trouble connecting to the server. Please try again.";
pub const STREAM_FAILED_REPLY: &str = "I am having trouble connecting to the server.";

/// Wraps a [`TextModel`] so that callers always get displayable text back.
#[derive(Clone)]
pub struct ChatClient {
    model: Arc<dyn TextModel>,
}

impl ChatClient {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<dyn TextModel> {
        &self.model
    }

    /// One completion. Failures and empty answers become fixed fallback replies.
    pub async fn send(&self, history: &[Message], text: &str) -> String {
        match self.model.generate(history, text).await {
            Ok(reply) if !reply.trim().is_empty() => reply,
            Ok(_) => EMPTY_REPLY.to_string(),
            Err(err) => {
                tracing::error!(model = self.model.model_id(), error = %err, "chat request failed");
                REQUEST_FAILED_REPLY.to_string()
            }
        }
    }

    /// Streaming completion as plain tokens.
    ///
    /// If the request fails before any text arrives the stream yields
    /// [`STREAM_FAILED_REPLY`] once; a failure after that just ends it.
    pub fn stream(
        &self,
        history: Vec<Message>,
        text: String,
    ) -> impl Stream<Item = String> + Send + 'static {
        let model = Arc::clone(&self.model);
        async_stream::stream! {
            let mut tokens = match model.stream(&history, &text).await {
                Ok(tokens) => tokens,
                Err(err) => {
                    tracing::error!(error = %err, "chat stream request failed");
                    yield STREAM_FAILED_REPLY.to_string();
                    return;
                }
            };
            let mut produced = false;
            while let Some(token) = tokens.next().await {
                match token {
                    Ok(token) => {
                        produced = true;
                        yield token;
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "chat stream interrupted");
                        if !produced {
                            yield STREAM_FAILED_REPLY.to_string();
                        }
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextStream;
    use async_trait::async_trait;
    use docvoice_core::{Result, VoiceError};

    struct Scripted {
        reply: Result<String>,
        tokens: Vec<std::result::Result<&'static str, &'static str>>,
    }

    #[async_trait]
    impl TextModel for Scripted {
        fn model_id(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _history: &[Message], _text: &str) -> Result<String> {
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(err) => Err(VoiceError::model(err.to_string())),
            }
        }

        async fn stream(&self, _history: &[Message], _text: &str) -> Result<TextStream> {
            let items: Vec<Result<String>> = self
                .tokens
                .iter()
                .map(|t| t.map(str::to_string).map_err(VoiceError::model))
                .collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    fn client(reply: Result<String>, tokens: Vec<std::result::Result<&'static str, &'static str>>) -> ChatClient {
        ChatClient::new(Arc::new(Scripted { reply, tokens }))
    }

    #[tokio::test]
    async fn test_send_fallbacks() {
        assert_eq!(client(Ok("Dr. Rao".into()), vec![]).send(&[], "hi").await, "Dr. Rao");
        assert_eq!(client(Ok(String::new()), vec![]).send(&[], "hi").await, EMPTY_REPLY);
        assert_eq!(
            client(Err(VoiceError::model("503")), vec![]).send(&[], "hi").await,
            REQUEST_FAILED_REPLY
        );
    }

    #[tokio::test]
    async fn test_stream_failure_before_text_yields_notice() {
        let tokens: Vec<String> =
            client(Ok(String::new()), vec![Err("reset")]).stream(vec![], "hi".into()).collect().await;
        assert_eq!(tokens, vec![STREAM_FAILED_REPLY.to_string()]);
    }

    #[tokio::test]
    async fn test_stream_failure_after_text_just_ends() {
        let tokens: Vec<String> = client(Ok(String::new()), vec![Ok("Dr. "), Ok("Rao"), Err("reset")])
            .stream(vec![], "hi".into())
            .collect()
            .await;
        assert_eq!(tokens, vec!["Dr. ".to_string(), "Rao".to_string()]);
    }
}
