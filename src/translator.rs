use tracing::{debug, info, warn};

use crate::client::{GeminiClient, ImageEditModel};
use crate::config::TranslatorConfig;
use crate::error::{ConfigError, Result};
use crate::prompt;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::types::{SourceImage, TargetLanguage, TranslatedImage};

/// Translates the text inside one image, retrying transient model failures.
pub struct Translator<M> {
    model: M,
    policy: RetryPolicy,
}

impl Translator<GeminiClient> {
    /// Build a Gemini-backed translator using the config's retry policy.
    pub fn from_config(config: TranslatorConfig) -> std::result::Result<Self, ConfigError> {
        let policy = config.retry;
        Ok(Self::new(GeminiClient::new(config)?).with_policy(policy))
    }
}

impl<M: ImageEditModel> Translator<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Translate all visible text in `image` into `language`.
    ///
    /// On exhaustion the error from the last attempt is returned.
    pub async fn translate(
        &self,
        image: &SourceImage,
        language: TargetLanguage,
    ) -> Result<TranslatedImage> {
        let instruction = prompt::build_instruction(language);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(file = %image.file_name, attempt, "calling image model");

            let err = match self.model.edit_image(image, &instruction).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(file = %image.file_name, attempt, "model call succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(err) => err,
            };

            warn!(
                file = %image.file_name,
                attempt,
                max_attempts = self.policy.max_attempts,
                kind = ?err.kind(),
                error = %err,
                "model call failed"
            );

            match self.policy.decide(attempt, err.kind()) {
                RetryDecision::Retry(delay) => {
                    warn!(delay_ms = delay.as_millis() as u64, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranslateError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct FlakyModel {
        failures: Mutex<Vec<TranslateError>>,
        calls: AtomicU32,
    }

    impl FlakyModel {
        fn new(mut failures: Vec<TranslateError>) -> Self {
            failures.reverse();
            Self {
                failures: Mutex::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    impl ImageEditModel for FlakyModel {
        async fn edit_image(&self, image: &SourceImage, _instruction: &str) -> Result<TranslatedImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.failures.lock().unwrap().pop() {
                Some(err) => Err(err),
                None => Ok(TranslatedImage::new("image/png", image.bytes.clone())),
            }
        }
    }

    fn internal() -> TranslateError {
        TranslateError::Transient {
            status: Some(500),
            message: "Internal error encountered.".into(),
        }
    }

    fn image() -> SourceImage {
        SourceImage::new("menu.png", "image/png", vec![9, 9, 9])
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let translator = Translator::new(FlakyModel::new(vec![internal(), internal()]));
        let started = tokio::time::Instant::now();

        let result = translator.translate(&image(), TargetLanguage::French).await;

        assert!(result.is_ok());
        assert_eq!(translator.model().calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_attempts() {
        let last = TranslateError::Transient {
            status: Some(503),
            message: "The model is overloaded.".into(),
        };
        let translator = Translator::new(FlakyModel::new(vec![internal(), internal(), last.clone(), internal()]));

        let err = translator
            .translate(&image(), TargetLanguage::French)
            .await
            .unwrap_err();

        assert_eq!(err, last);
        assert_eq!(translator.model().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_bad_request_not_retried() {
        let translator = Translator::new(FlakyModel::new(vec![TranslateError::InvalidRequest {
            status: 400,
            message: "Request contains an invalid argument.".into(),
        }]));

        let err = translator
            .translate(&image(), TargetLanguage::German)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Request contains an invalid argument.");
        assert_eq!(translator.model().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_policy_disables_retry() {
        let translator = Translator::new(FlakyModel::new(vec![internal()])).with_policy(RetryPolicy::no_retry());
        assert!(translator.translate(&image(), TargetLanguage::Thai).await.is_err());
        assert_eq!(translator.model().calls.load(Ordering::SeqCst), 1);
    }
}
