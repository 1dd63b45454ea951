//! HTTP client for the content generation service

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{
    ChatTurn, ContentService, FollowUpAnswer, PronunciationGrade, SentenceVerdict, WordExtras,
};
use crate::config::ContentConfig;
use crate::voice::AudioClip;
use crate::{Error, Result};

#[derive(serde::Deserialize)]
struct SpeechResponse {
    #[serde(default)]
    audio: Option<String>,
}

/// Content service reached over JSON/HTTP
pub struct HttpContentService {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpContentService {
    /// Create a client for the configured service
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is empty or the HTTP client cannot be built
    pub fn new(config: &ContentConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(Error::Config(
                "content service URL required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(url = %url, "content service request");

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, path, "content service request failed");
            Error::Generation(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, path, "content service error");
            return Err(Error::Generation(format!("{path} returned {status}: {body}")));
        }

        response.json().await.map_err(|e| {
            tracing::error!(error = %e, path, "failed to parse content service response");
            Error::Generation(e.to_string())
        })
    }
}

#[async_trait]
impl ContentService for HttpContentService {
    async fn synthesize_speech(&self, text: &str) -> Result<Option<String>> {
        #[derive(Serialize)]
        struct SpeechRequest<'a> {
            text: &'a str,
        }

        let response: SpeechResponse = self.post("/speech", &SpeechRequest { text }).await?;
        Ok(response.audio.filter(|a| !a.is_empty()))
    }

    async fn grade_sentence(&self, word: &str, sentence: &str) -> Result<SentenceVerdict> {
        #[derive(Serialize)]
        struct GradeRequest<'a> {
            word: &'a str,
            sentence: &'a str,
        }

        self.post("/grade/sentence", &GradeRequest { word, sentence })
            .await
    }

    async fn grade_pronunciation(
        &self,
        clip: &AudioClip,
        target: &str,
    ) -> Result<PronunciationGrade> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct PronunciationRequest<'a> {
            audio: String,
            mime_type: &'a str,
            target_text: &'a str,
        }

        let request = PronunciationRequest {
            audio: STANDARD.encode(&clip.bytes),
            mime_type: &clip.mime_type,
            target_text: target,
        };
        let grade: PronunciationGrade = self.post("/grade/pronunciation", &request).await?;

        tracing::info!(score = grade.score(), "pronunciation graded");
        Ok(grade)
    }

    async fn answer_follow_up(
        &self,
        context: &str,
        history: &[ChatTurn],
        question: &str,
    ) -> Result<FollowUpAnswer> {
        #[derive(Serialize)]
        struct FollowUpRequest<'a> {
            context: &'a str,
            history: &'a [ChatTurn],
            question: &'a str,
        }

        self.post(
            "/follow-up",
            &FollowUpRequest {
                context,
                history,
                question,
            },
        )
        .await
    }

    async fn word_extras(&self, word: &str) -> Result<WordExtras> {
        #[derive(Serialize)]
        struct ExtrasRequest<'a> {
            word: &'a str,
        }

        self.post("/extras", &ExtrasRequest { word }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_base_url() {
        let config = ContentConfig {
            base_url: "  ".to_string(),
            ..ContentConfig::default()
        };
        assert!(matches!(
            HttpContentService::new(&config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_trims_trailing_slash() {
        let config = ContentConfig {
            base_url: "http://localhost:7070/".to_string(),
            ..ContentConfig::default()
        };
        let service = HttpContentService::new(&config).unwrap();
        assert_eq!(service.base_url, "http://localhost:7070");
    }
}
