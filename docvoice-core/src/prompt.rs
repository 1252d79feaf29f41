//! Assistant persona, speech-text cleaning and reconnect context.

use crate::types::Message;
use regex::Regex;
use std::sync::LazyLock;

/// Persona and output-format rules sent to every model integration.
pub const SYSTEM_INSTRUCTION: &str = r#"
Assistant Role: Doctor Availability Voice Assistant (Indian Healthcare Context)

CRITICAL: DIRECT RESPONSE POLICY (STRICTEST PRIORITY)
1. **NO HEADERS OR TITLES**: Never start a response with a bolded header describing your action.
2. **NO META-COMMENTARY**: Do not describe what you are doing. Just do it.
3. **NO STATUS UPDATES**: Do not say "Searching..." or "One moment...".

--------------------------------------------------

**LANGUAGE & VOICE INSTRUCTIONS**:
- **Adapt to the User**: You support multiple Indian languages. Reply in the user's language:
  * English (India)
  * Hindi (हिंदी)
  * Telugu (తెలుగు)
  * Tamil (தமிழ்)
  * Bengali (বাংলা)
  * Marathi (मराठी)
  * Gujarati (ગુજરાતી)
- **Mixed language**: If the user mixes languages (e.g. "Doctor ka appointment chahiye"), reply in
  the same natural mixed style.
- **Output Script**:
  - For English: use Latin script.
  - For Indian languages: you MAY use the native script. Speech generation handles these scripts.

--------------------------------------------------

**ROLE & TOOLS**:
1. **USE GOOGLE SEARCH**:
   - You MUST use the 'googleSearch' tool to find real-world doctors and clinic information.
   - When asked about doctors, report: Location, Availability, Fees, Experience, and **Ratings**.

2. **FORMATTING RULES (FOR TEXT DISPLAY)**:
   - **Separators**: Use `---` to separate doctor cards.
   - **Google Maps**: Provide links: `[View Map](https://www.google.com/maps/search/?api=1&query=Hospital+Name+City)`
   - **Structure**:
     * **Dr. Name** (Specialty)
     * 📍 **Location**: Hospital Name
     * 👨‍⚕️ **Experience**: X years
     * ⭐ **Rating**: X/5
     * 💰 **Fee**: ₹XXX

MAINTAIN CONTEXT. BE CONCISE. BE HELPFUL.
"#;

/// Delimiter between doctor cards in model output.
pub const CARD_SEPARATOR: &str = "---";

/// Map link template; `{query}` is the `+`-joined hospital name and city.
pub const MAP_LINK_TEMPLATE: &str = "https://www.google.com/maps/search/?api=1&query={query}";

/// Number of trailing transcript messages replayed into a new duplex session.
pub const CONTEXT_WINDOW: usize = 6;

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid regex"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid regex"));
static RULES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"---|___").expect("valid regex"));
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[*\-•] ").expect("valid regex"));
static CARD_EMOJI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"📍|⭐|👨‍⚕️|💰|🕒").expect("valid regex"));
static STRAY_SYMBOLS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[#@]").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static CONTEXT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*?\]\(.*?\)").expect("valid regex"));

/// Strip display-only markdown so a sentence reads naturally when synthesized.
pub fn clean_text_for_speech(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let clean = MARKDOWN_LINK.replace_all(text, "$1");
    let clean = BOLD.replace_all(&clean, "$1");
    let clean = RULES.replace_all(&clean, " ");
    let clean = BULLET.replace_all(&clean, " ");
    let clean = CARD_EMOJI.replace_all(&clean, "");
    let clean = clean.replace('₹', " Rupees ");
    let clean = STRAY_SYMBOLS.replace_all(&clean, "");
    let clean = WHITESPACE.replace_all(&clean, " ");
    clean.trim().to_string()
}

/// Render the tail of a transcript as extra system context for a fresh session.
///
/// Returns an empty string when there is nothing to replay.
pub fn build_context_prompt(messages: &[Message]) -> String {
    let start = messages.len().saturating_sub(CONTEXT_WINDOW);
    let recent = messages[start..]
        .iter()
        .map(|m| {
            let text = m.text.replace("**", "");
            let text = CONTEXT_LINK.replace_all(&text, "Link");
            format!("{}: {}", m.role.as_str().to_uppercase(), text)
        })
        .collect::<Vec<_>>()
        .join("\n");

    if recent.is_empty() {
        return String::new();
    }
    format!(
        "PREVIOUS CONVERSATION HISTORY:\n{recent}\n\nContinue the conversation naturally from here."
    )
}

/// System prompt with an optional context block appended.
pub fn compose_instruction(base: &str, extra_context: Option<&str>) -> String {
    match extra_context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(context) => format!("{}\n\n{}", base.trim_end(), context),
        None => base.to_string(),
    }
}

/// Map link for a hospital, following [`MAP_LINK_TEMPLATE`].
pub fn map_link(hospital: &str, city: &str) -> String {
    let query = format!("{hospital} {city}").split_whitespace().collect::<Vec<_>>().join("+");
    MAP_LINK_TEMPLATE.replace("{query}", &query)
}
