use super::config::GeminiConfig;
use super::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
    SpeechConfig, Tool, history_contents,
};
use crate::model::{SpeechError, SpeechSynthesizer, TextModel, TextStream};
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use docvoice_core::{Message, Result, VoiceError};
use eventsource_stream::Eventsource;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use secrecy::ExposeSecret;
use tracing::Instrument;
use url::Url;

/// Gemini REST client implementing both [`TextModel`] and [`SpeechSynthesizer`].
pub struct GeminiClient {
    http: Client,
    base_url: Url,
    text_model: String,
    tts_model: String,
    voice: String,
    temperature: f32,
    search_tool: bool,
    system_instruction: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let base = if config.base_url.ends_with('/') {
            config.base_url.clone()
        } else {
            format!("{}/", config.base_url)
        };
        let base_url = Url::parse(&base)
            .map_err(|e| VoiceError::config(format!("invalid base url {base}: {e}")))?;

        let mut key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|_| VoiceError::config("API key contains invalid header characters"))?;
        key.set_sensitive(true);
        let headers = HeaderMap::from_iter([(HeaderName::from_static("x-goog-api-key"), key)]);

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| VoiceError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            text_model: config.text_model,
            tts_model: config.tts_model,
            voice: config.voice,
            temperature: config.temperature,
            search_tool: config.search_tool,
            system_instruction: config.system_instruction,
        })
    }

    fn build_url(&self, model: &str, method: &str) -> Result<Url> {
        self.base_url
            .join(&format!("models/{model}:{method}"))
            .map_err(|e| VoiceError::config(format!("invalid request url: {e}")))
    }

    fn chat_request(&self, history: &[Message], text: &str) -> GenerateContentRequest {
        let mut contents = history_contents(history);
        contents.push(Content::with_role("user", text));
        GenerateContentRequest {
            contents,
            system_instruction: Some(Content { role: None, parts: vec![Part::text(&self.system_instruction)] }),
            generation_config: Some(GenerationConfig {
                temperature: Some(self.temperature),
                ..Default::default()
            }),
            tools: self.search_tool.then(|| vec![Tool::google_search()]),
        }
    }

    fn speech_request(&self, text: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content { role: None, parts: vec![Part::text(text)] }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig::prebuilt(&self.voice)),
                ..Default::default()
            }),
            tools: None,
        }
    }

    async fn check_response(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(VoiceError::model(format!("HTTP {}: {}", status.as_u16(), body.trim())))
    }
}

#[async_trait]
impl TextModel for GeminiClient {
    fn model_id(&self) -> &str {
        &self.text_model
    }

    async fn generate(&self, history: &[Message], text: &str) -> Result<String> {
        let span = docvoice_telemetry::model_call_span(&self.text_model);
        async {
            let url = self.build_url(&self.text_model, "generateContent")?;
            let request = self.chat_request(history, text);
            let response = self
                .http
                .post(url)
                .json(&request)
                .send()
                .await
                .map_err(|e| VoiceError::model(format!("request failed: {e}")))?;
            let response = Self::check_response(response).await?;
            let body: GenerateContentResponse = response
                .json()
                .await
                .map_err(|e| VoiceError::model(format!("invalid response body: {e}")))?;
            Ok(body.text().unwrap_or_default())
        }
        .instrument(span)
        .await
    }

    async fn stream(&self, history: &[Message], text: &str) -> Result<TextStream> {
        let mut url = self.build_url(&self.text_model, "streamGenerateContent")?;
        url.query_pairs_mut().append_pair("alt", "sse");
        let request = self.chat_request(history, text);

        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| VoiceError::model(format!("stream request failed: {e}")))?;
        let response = Self::check_response(response).await?;

        let tokens = response
            .bytes_stream()
            .eventsource()
            .map(|event| -> Result<Option<String>> {
                let event = event.map_err(|e| VoiceError::model(format!("bad stream event: {e}")))?;
                let chunk: GenerateContentResponse = serde_json::from_str(&event.data)?;
                Ok(chunk.text())
            })
            .try_filter_map(|text| async move { Ok(text) });

        Ok(Box::pin(tokens))
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiClient {
    async fn synthesize(&self, text: &str) -> std::result::Result<Option<Bytes>, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::Rejected("empty input".to_string()));
        }

        let span = docvoice_telemetry::synthesis_span(&self.tts_model, text.chars().count());
        async {
            let url = self
                .build_url(&self.tts_model, "generateContent")
                .map_err(|e| SpeechError::Other(e.to_string()))?;
            let response = self
                .http
                .post(url)
                .json(&self.speech_request(text))
                .send()
                .await
                .map_err(|e| SpeechError::Other(format!("request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SpeechError::from_status(status.as_u16(), &body));
            }

            let body: GenerateContentResponse = response
                .json()
                .await
                .map_err(|e| SpeechError::Other(format!("invalid response body: {e}")))?;
            let Some(inline) = body.inline_audio() else {
                tracing::debug!("speech response carried no audio");
                return Ok(None);
            };
            let pcm = base64::engine::general_purpose::STANDARD
                .decode(&inline.data)
                .map_err(|e| SpeechError::Other(format!("invalid audio payload: {e}")))?;
            Ok(Some(Bytes::from(pcm)))
        }
        .instrument(span)
        .await
    }
}
