use crate::model::{SpeechError, SpeechSynthesizer};
use bytes::Bytes;
use std::{fmt::Display, future::Future, time::Duration};

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub enabled: bool,
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    #[must_use]
    pub fn with_backoff_multiplier(mut self, backoff_multiplier: f32) -> Self {
        self.backoff_multiplier = backoff_multiplier;
        self
    }
}

fn next_retry_delay(current: Duration, retry_config: &RetryConfig) -> Duration {
    if current >= retry_config.max_delay {
        return retry_config.max_delay;
    }

    let multiplier = retry_config.backoff_multiplier.max(1.0) as f64;
    let scaled = Duration::from_secs_f64(current.as_secs_f64() * multiplier);
    scaled.min(retry_config.max_delay)
}

/// Run `operation`, retrying with exponential backoff while `classify_error` says so.
pub async fn execute_with_retry<T, E, Op, Fut, Classify>(
    retry_config: &RetryConfig,
    classify_error: Classify,
    mut operation: Op,
) -> Result<T, E>
where
    E: Display,
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Classify: Fn(&E) -> bool,
{
    if !retry_config.enabled {
        return operation().await;
    }

    let mut attempt: u32 = 0;
    let mut delay = retry_config.initial_delay;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < retry_config.max_retries && classify_error(&error) => {
                attempt += 1;
                tracing::warn!(
                    attempt = attempt,
                    max_retries = retry_config.max_retries,
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "request failed with retryable error; retrying"
                );
                tokio::time::sleep(delay).await;
                delay = next_retry_delay(delay, retry_config);
            }
            Err(error) => return Err(error),
        }
    }
}

/// Synthesize one sentence, retrying only on rate limiting.
///
/// Every failure is swallowed: the caller simply gets no audio for that sentence.
pub async fn synthesize_with_retry(
    synthesizer: &dyn SpeechSynthesizer,
    text: &str,
    retry_config: &RetryConfig,
) -> Option<Bytes> {
    let result =
        execute_with_retry(retry_config, SpeechError::is_rate_limited, || {
            synthesizer.synthesize(text)
        })
        .await;

    match result {
        Ok(audio) => audio,
        Err(SpeechError::Rejected(reason)) => {
            tracing::warn!(reason = %reason, chars = text.len(), "speech input rejected; skipping sentence");
            None
        }
        Err(error) => {
            tracing::warn!(error = %error, "speech synthesis gave up; sentence stays text-only");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Plays back a fixed list of outcomes, one per call.
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<Option<Bytes>, SpeechError>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<Option<Bytes>, SpeechError>>) -> Self {
            Self { outcomes: Mutex::new(outcomes.into()), calls: Mutex::new(0) }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for Scripted {
        async fn synthesize(&self, _text: &str) -> Result<Option<Bytes>, SpeechError> {
            *self.calls.lock() += 1;
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(SpeechError::RateLimited("HTTP 429".into())))
        }
    }

    fn quick() -> RetryConfig {
        RetryConfig::default().with_initial_delay(Duration::ZERO).with_max_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn rate_limited_sentence_recovers() {
        let synth = Scripted::new(vec![
            Err(SpeechError::RateLimited("HTTP 429".into())),
            Err(SpeechError::RateLimited("RESOURCE_EXHAUSTED".into())),
            Ok(Some(Bytes::from_static(&[1, 0, 2, 0]))),
        ]);

        let audio = synthesize_with_retry(&synth, "Dr. Rao is available.", &quick()).await;

        assert_eq!(audio.as_deref(), Some(&[1u8, 0, 2, 0][..]));
        assert_eq!(synth.calls(), 3);
    }

    #[tokio::test]
    async fn rejected_sentence_is_not_retried() {
        let synth = Scripted::new(vec![Err(SpeechError::Rejected("HTTP 400".into()))]);

        let audio = synthesize_with_retry(&synth, "---", &quick()).await;

        assert!(audio.is_none());
        assert_eq!(synth.calls(), 1);
    }

    #[tokio::test]
    async fn disabled_retry_makes_one_attempt() {
        let synth = Scripted::new(vec![]);
        let config = RetryConfig::disabled().with_max_retries(10);

        let err = execute_with_retry(&config, SpeechError::is_rate_limited, || {
            synth.synthesize("Call now!")
        })
        .await
        .expect_err("first failure is returned");

        assert!(err.is_rate_limited());
        assert_eq!(synth.calls(), 1);
    }

    #[test]
    fn backoff_doubles_until_cap() {
        let config = RetryConfig::default();
        let mut delay = config.initial_delay;
        let mut seen = vec![delay];
        for _ in 0..4 {
            delay = next_retry_delay(delay, &config);
            seen.push(delay);
        }
        assert_eq!(seen, [1, 2, 4, 8, 8].map(Duration::from_secs).to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn synthesis_gives_up_after_bounded_attempts() {
        let synth = Scripted::new(vec![]);
        let started = tokio::time::Instant::now();

        let audio =
            synthesize_with_retry(&synth, "Dr. Rao is available.", &RetryConfig::default()).await;

        assert!(audio.is_none());
        assert_eq!(synth.calls(), 4);
        // 1s + 2s + 4s of backoff
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }
}
