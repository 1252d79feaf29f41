//! Configuration types for live calls.

use crate::codec::INPUT_SAMPLE_RATE;
use docvoice_core::{LanguageCode, SYSTEM_INSTRUCTION};
use docvoice_model::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Setup parameters for one duplex session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Model to use (provider-specific).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// System instruction, including any replayed conversation context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,

    /// Prebuilt voice for audio output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Output modalities; the transport defaults to `["AUDIO"]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// Ask the server to transcribe the user's audio.
    #[serde(default)]
    pub input_transcription: bool,

    /// Ask the server to transcribe its own spoken output.
    #[serde(default)]
    pub output_transcription: bool,

    /// Expose the web search tool to the model.
    #[serde(default)]
    pub search_tool: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl RealtimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_modalities(mut self, modalities: Vec<String>) -> Self {
        self.modalities = Some(modalities);
        self
    }

    /// Transcribe both directions.
    pub fn with_transcription(mut self) -> Self {
        self.input_transcription = true;
        self.output_transcription = true;
        self
    }

    pub fn with_search_tool(mut self, enabled: bool) -> Self {
        self.search_tool = enabled;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }
}

/// Microphone capture parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Rate of the frames sent upstream.
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per upstream frame. 2048 at 16 kHz is 128 ms.
    pub block_size: usize,
    /// How often the pipeline checks for a suspended device.
    pub resume_check_interval: Duration,
    /// Gain applied to frame RMS before clamping to [0, 1] for the volume signal.
    pub volume_gain: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: INPUT_SAMPLE_RATE,
            channels: 1,
            block_size: 2048,
            resume_check_interval: Duration::from_millis(250),
            volume_gain: 5.0,
        }
    }
}

impl CaptureConfig {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / self.sample_rate as f64)
    }
}

/// Which strategy drives a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallMode {
    /// Persistent bidirectional audio channel; the server detects turns.
    #[default]
    Duplex,
    /// Local recognizer, streamed text completion and per-sentence synthesis.
    TurnBased,
}

impl std::str::FromStr for CallMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "duplex" | "live" => Ok(Self::Duplex),
            "turn-based" | "turn_based" | "fallback" => Ok(Self::TurnBased),
            other => Err(format!("unknown call mode: {other}")),
        }
    }
}

/// Filter for user-role transcript fragments coming back from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptPolicy {
    /// Drop user fragments containing letters outside the Latin blocks.
    #[default]
    LatinOnly,
    /// Keep every fragment.
    Any,
}

impl ScriptPolicy {
    /// Whether a user transcript fragment may enter the transcript.
    pub fn admits(&self, text: &str) -> bool {
        match self {
            Self::Any => true,
            Self::LatinOnly => text.chars().filter(|c| c.is_alphabetic()).all(is_latin_letter),
        }
    }
}

/// Basic Latin, Latin-1 Supplement, Extended-A/B and Extended Additional.
fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic()
        || ('\u{00C0}'..='\u{024F}').contains(&c)
        || ('\u{1E00}'..='\u{1EFF}').contains(&c)
}

/// Settings for the turn orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub mode: CallMode,
    pub language: LanguageCode,
    pub system_instruction: String,
    pub voice: String,
    /// Duplex model id; `None` uses the transport default.
    pub live_model: Option<String>,
    /// Calls at or below this length are not recorded.
    pub min_call_duration: Duration,
    /// Pause between tearing a channel down and reopening it.
    pub settle_delay: Duration,
    /// Pause before the recognizer listens again.
    pub listen_restart_delay: Duration,
    /// Cleaned sentences must be strictly longer than this to be spoken.
    pub min_sentence_chars: usize,
    /// Sentence synthesis requests allowed in flight at once.
    pub synthesis_concurrency: usize,
    pub user_script_policy: ScriptPolicy,
    pub speech_retry: RetryConfig,
    pub capture: CaptureConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: CallMode::Duplex,
            language: LanguageCode::default(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            voice: "Kore".to_string(),
            live_model: None,
            min_call_duration: Duration::from_secs(1),
            settle_delay: Duration::from_millis(500),
            listen_restart_delay: Duration::from_millis(300),
            min_sentence_chars: 4,
            synthesis_concurrency: 3,
            user_script_policy: ScriptPolicy::LatinOnly,
            speech_retry: RetryConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_mode(mut self, mode: CallMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_language(mut self, language: LanguageCode) -> Self {
        self.language = language;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_live_model(mut self, model: impl Into<String>) -> Self {
        self.live_model = Some(model.into());
        self
    }

    pub fn with_user_script_policy(mut self, policy: ScriptPolicy) -> Self {
        self.user_script_policy = policy;
        self
    }

    pub fn with_speech_retry(mut self, retry: RetryConfig) -> Self {
        self.speech_retry = retry;
        self
    }

    pub fn with_capture(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }
}
