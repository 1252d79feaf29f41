use docvoice_core::{Result, SYSTEM_INSTRUCTION, VoiceError};
use secrecy::SecretString;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Kore";

/// Settings for the Gemini REST client.
#[derive(Debug)]
pub struct GeminiConfig {
    pub(crate) api_key: SecretString,
    pub base_url: String,
    pub text_model: String,
    pub tts_model: String,
    pub voice: String,
    pub temperature: f32,
    pub search_tool: bool,
    pub system_instruction: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            temperature: 0.7,
            search_tool: true,
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
        }
    }

    /// Read the key from `GOOGLE_API_KEY`, falling back to `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        api_key_from_env().map(Self::new)
    }

    /// Point the client at another endpoint, e.g. a local mock.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    pub fn with_tts_model(mut self, model: impl Into<String>) -> Self {
        self.tts_model = model.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_search_tool(mut self, enabled: bool) -> Self {
        self.search_tool = enabled;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }
}

/// API key from the environment, `GOOGLE_API_KEY` first.
pub fn api_key_from_env() -> Result<String> {
    std::env::var("GOOGLE_API_KEY")
        .or_else(|_| std::env::var("GEMINI_API_KEY"))
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| VoiceError::config("GOOGLE_API_KEY or GEMINI_API_KEY must be set"))
}
